use anyhow::{bail, Result};
use clap::ValueEnum;
use command_supervisor::{CatalogLimits, HandlerTimings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// In-process fake robot
    Mock,
    /// JSON bridge service in front of the vendor SDK
    HttpBridge,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpreterKind {
    /// Chat-completions model with tool calling
    OpenAi,
    /// Offline phrase matching
    Keyword,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub address: String,
    pub username: String,
    /// Never written back to disk; prefer SPOT_PASSWORD.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub request_timeout_s: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            address: "192.168.80.3".to_string(),
            username: "admin".to_string(),
            password: None,
            request_timeout_s: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    pub kind: InterpreterKind,
    pub model: String,
    pub base_url: String,
    /// Never written back to disk; prefer OPENAI_API_KEY.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub max_history: usize,
    pub dump_path: Option<PathBuf>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            kind: InterpreterKind::OpenAi,
            model: llm_interpreter::DEFAULT_MODEL.to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            max_history: 4,
            dump_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_duration_s: f64,
    pub stand_timeout_s: f64,
    pub power_on_timeout_s: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_duration_s: 30.0,
            stand_timeout_s: 10.0,
            power_on_timeout_s: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub backend: Backend,
    pub robot: RobotConfig,
    pub interpreter: InterpreterConfig,
    pub limits: LimitsConfig,
    /// WebSocket that mirrors status messages, e.g. `ws://localhost:8001/`.
    pub status_ws_url: Option<String>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            backend: Backend::HttpBridge,
            robot: RobotConfig::default(),
            interpreter: InterpreterConfig::default(),
            limits: LimitsConfig::default(),
            status_ws_url: None,
        }
    }
}

fn secs(name: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        bail!("{name} must be a positive number of seconds, got {value}");
    }
    match Duration::try_from_secs_f64(value) {
        Ok(d) => Ok(d),
        Err(_) => bail!("{name} is too large: {value} seconds"),
    }
}

impl ControlConfig {
    /// Load from `path`, writing the defaults there first if it does not exist.
    pub fn load(path: &str) -> Result<Self> {
        if std::path::Path::new(path).exists() {
            let contents = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn catalog_limits(&self) -> Result<CatalogLimits> {
        Ok(CatalogLimits {
            max_duration: secs("max_duration_s", self.limits.max_duration_s)?,
            timings: HandlerTimings {
                stand_timeout: secs("stand_timeout_s", self.limits.stand_timeout_s)?,
                power_on_timeout: secs("power_on_timeout_s", self.limits.power_on_timeout_s)?,
            },
        })
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        secs("request_timeout_s", self.robot.request_timeout_s)
    }
}
