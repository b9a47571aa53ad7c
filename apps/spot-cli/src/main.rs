mod config;
mod console;
mod status;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser};
use command_supervisor::{
    reference_registry, ActionRegistry, InputSource, InterpreterClient, MainLoop, OutputSink,
    TaskSupervisor,
};
use config::{Backend, ControlConfig, InterpreterKind};
use console::{ConsoleInput, ConsoleOutput};
use llm_interpreter::{KeywordInterpreter, OpenAiConfig, OpenAiInterpreter};
use robot_gateway::{BridgeCredentials, HttpBridgeGateway, MockRobot, RobotGateway};
use status::StatusChannel;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "spot-cli")]
#[command(about = "Natural-language remote control for a legged robot")]
struct Args {
    /// JSON config file, created with defaults if missing
    #[arg(long, default_value = "spot-cli.json")]
    config: String,

    /// Robot backend (overrides the config file)
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Command interpreter (overrides the config file)
    #[arg(long, value_enum)]
    interpreter: Option<InterpreterKind>,

    /// Robot or bridge address
    #[arg(long, env = "SPOT_ADDRESS")]
    address: Option<String>,

    #[arg(long, env = "SPOT_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "SPOT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Longest movement accepted, in seconds
    #[arg(long)]
    max_duration: Option<f64>,

    /// Write each raw completion to this file
    #[arg(long)]
    dump_completions: Option<PathBuf>,

    /// Mirror status messages to this WebSocket (e.g. ws://localhost:8001/)
    #[arg(long)]
    ws_url: Option<String>,

    /// -v for info, -vv for debug (RUST_LOG wins when set)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn apply(self, config: &mut ControlConfig) {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(kind) = self.interpreter {
            config.interpreter.kind = kind;
        }
        if let Some(address) = self.address {
            config.robot.address = address;
        }
        if let Some(username) = self.username {
            config.robot.username = username;
        }
        if self.password.is_some() {
            config.robot.password = self.password;
        }
        if self.api_key.is_some() {
            config.interpreter.api_key = self.api_key;
        }
        if let Some(model) = self.model {
            config.interpreter.model = model;
        }
        if let Some(max) = self.max_duration {
            config.limits.max_duration_s = max;
        }
        if self.dump_completions.is_some() {
            config.interpreter.dump_path = self.dump_completions;
        }
        if self.ws_url.is_some() {
            config.status_ws_url = self.ws_url;
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = ControlConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    args.apply(&mut config);

    let gateway = build_gateway(&config)?;
    let status = config.status_ws_url.as_deref().map(StatusChannel::connect);
    if let Some(channel) = &status {
        if !channel.is_connected() {
            println!("Status channel unavailable, continuing without it");
        }
    }

    session(
        &config,
        gateway,
        &mut ConsoleInput::new(),
        &mut ConsoleOutput::new(status),
    )
}

/// Authenticate, wire up the command stack and run turns until the user quits.
fn session(
    config: &ControlConfig,
    gateway: Arc<dyn RobotGateway>,
    input: &mut dyn InputSource,
    output: &mut dyn OutputSink,
) -> Result<()> {
    gateway
        .authenticate()
        .context("Failed to authenticate with the robot")?;
    info!("Authenticated with robot");

    let registry = reference_registry(&config.catalog_limits()?)?;
    info!(
        commands = registry.commands().count(),
        max_duration = ?registry.max_duration(),
        "Command catalog ready"
    );
    let supervisor = TaskSupervisor::new(gateway);
    let mut interpreter = build_interpreter(config, &registry)?;

    output.say("Hello, welcome to the robot control program!");
    MainLoop::new(&registry, &supervisor, interpreter.as_mut()).run(input, output);

    info!("spot-cli exiting");
    Ok(())
}

fn build_gateway(config: &ControlConfig) -> Result<Arc<dyn RobotGateway>> {
    match config.backend {
        Backend::Mock => {
            warn!("Using the in-process mock robot; no hardware will move");
            Ok(Arc::new(MockRobot::new()))
        }
        Backend::HttpBridge => {
            let password = config
                .robot
                .password
                .clone()
                .ok_or_else(|| anyhow!("No robot password; set SPOT_PASSWORD or --password"))?;
            let credentials = BridgeCredentials {
                username: config.robot.username.clone(),
                password,
            };
            let bridge =
                HttpBridgeGateway::new(&config.robot.address, credentials, config.request_timeout()?)?;
            info!(url = %bridge.base_url(), "Using robot bridge");
            Ok(Arc::new(bridge))
        }
    }
}

fn build_interpreter(
    config: &ControlConfig,
    registry: &ActionRegistry,
) -> Result<Box<dyn InterpreterClient>> {
    match config.interpreter.kind {
        InterpreterKind::Keyword => Ok(Box::new(KeywordInterpreter::new()?)),
        InterpreterKind::OpenAi => {
            let Some(api_key) = config.interpreter.api_key.as_deref() else {
                bail!("No OpenAI API key; set OPENAI_API_KEY or use --interpreter keyword");
            };
            let mut openai = OpenAiConfig::new(api_key);
            openai.model = config.interpreter.model.clone();
            openai.base_url = config.interpreter.base_url.clone();
            openai.max_history = config.interpreter.max_history;
            openai.dump_path = config.interpreter.dump_path.clone();
            Ok(Box::new(OpenAiInterpreter::new(openai, registry.tools())?))
        }
    }
}

fn setup_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use robot_gateway::{GatewayCallKind, GatewayError};
    use std::collections::VecDeque;

    struct Lines(VecDeque<&'static str>);

    impl InputSource for Lines {
        fn read_line(&mut self, _prompt: &str) -> Option<String> {
            self.0.pop_front().map(str::to_string)
        }
    }

    #[derive(Default)]
    struct Transcript(Vec<String>);

    impl OutputSink for Transcript {
        fn say(&mut self, message: &str) {
            self.0.push(message.to_string());
        }
    }

    fn offline_config() -> ControlConfig {
        let mut config = ControlConfig::default();
        config.backend = Backend::Mock;
        config.interpreter.kind = InterpreterKind::Keyword;
        config
    }

    #[test]
    fn refused_authentication_ends_the_session_with_an_error() {
        let robot = Arc::new(MockRobot::powered_on());
        robot.fail_on(
            GatewayCallKind::Authenticate,
            GatewayError::Auth("bad password".to_string()),
        );
        let mut out = Transcript::default();
        let err = session(
            &offline_config(),
            robot.clone(),
            &mut Lines(VecDeque::from(["move forward for 5 seconds"])),
            &mut out,
        )
        .unwrap_err();

        assert!(format!("{err:#}").contains("bad password"));
        assert!(!robot.is_authenticated());
        assert_eq!(robot.call_kinds(), vec![GatewayCallKind::Authenticate]);
        assert!(out.0.is_empty());
    }

    #[test]
    fn keyword_session_runs_until_quit() {
        let robot = Arc::new(MockRobot::new());
        let mut out = Transcript::default();
        session(
            &offline_config(),
            robot.clone(),
            &mut Lines(VecDeque::from(["power on", "quit"])),
            &mut out,
        )
        .unwrap();

        assert!(robot.is_authenticated());
        assert!(out.0.iter().any(|m| m == "starting task power_on"));
        assert_eq!(out.0.last().map(String::as_str), Some("Quitting program"));
    }

    #[test]
    fn openai_without_a_key_is_a_startup_error() {
        let mut config = offline_config();
        config.interpreter.kind = InterpreterKind::OpenAi;
        let registry = reference_registry(&config.catalog_limits().unwrap()).unwrap();
        assert!(build_interpreter(&config, &registry).is_err());
    }
}
