//! The interactive dispatch loop

use crate::interpret::{Interpretation, InterpreterClient};
use crate::registry::{Action, ActionRegistry};
use crate::supervisor::TaskSupervisor;
use crate::{CommandError, Result};
use tracing::{debug, info, warn};

pub const PROMPT: &str = "What do you want to do? ";

/// Source of user turns (console, speech-to-text, scripted input).
pub trait InputSource {
    /// Next line of input, or `None` once the source is exhausted.
    fn read_line(&mut self, prompt: &str) -> Option<String>;
}

/// Where replies and status messages go (console, text-to-speech, socket).
pub trait OutputSink {
    fn say(&mut self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Continue,
    Quit,
}

pub struct MainLoop<'a> {
    registry: &'a ActionRegistry,
    supervisor: &'a TaskSupervisor,
    interpreter: &'a mut dyn InterpreterClient,
}

impl<'a> MainLoop<'a> {
    pub fn new(
        registry: &'a ActionRegistry,
        supervisor: &'a TaskSupervisor,
        interpreter: &'a mut dyn InterpreterClient,
    ) -> Self {
        Self {
            registry,
            supervisor,
            interpreter,
        }
    }

    /// Run turns until the user quits or the input ends. End of input quits.
    pub fn run(&mut self, input: &mut dyn InputSource, output: &mut dyn OutputSink) {
        loop {
            let Some(line) = input.read_line(PROMPT) else {
                info!("input closed, shutting down");
                self.stop(output, true);
                return;
            };
            if self.handle_line(&line, output) == Turn::Quit {
                return;
            }
        }
    }

    /// Handle one line of input.
    pub fn handle_line(&mut self, line: &str, output: &mut dyn OutputSink) -> Turn {
        let text = line.trim().to_lowercase();
        if text.is_empty() {
            return Turn::Continue;
        }

        if let Some(report) = self.supervisor.reap_finished() {
            output.say(&report.to_string());
        }

        match text.as_str() {
            "stop" => return self.stop(output, false),
            "quit" => return self.stop(output, true),
            _ => {}
        }

        match self.dispatch(&text, output) {
            Ok(turn) => turn,
            Err(err) => {
                report_error(&err, output);
                Turn::Continue
            }
        }
    }

    fn dispatch(&mut self, text: &str, output: &mut dyn OutputSink) -> Result<Turn> {
        let invocation = match self.interpreter.interpret(text)? {
            Interpretation::PlainText(reply) => {
                debug!("interpreter replied without a command");
                output.say(&reply);
                return Ok(Turn::Continue);
            }
            Interpretation::Invocation(invocation) => invocation,
        };
        debug!(command = %invocation.name, args = ?invocation.arguments, "interpreted");

        let validated = self.registry.resolve(&invocation)?;
        match validated.action {
            Action::Stop => return Ok(self.stop(output, false)),
            Action::Quit => return Ok(self.stop(output, true)),
            Action::Task(_) => {}
        }
        let name = validated.name.clone();
        let submission = self.supervisor.submit(validated)?;
        if let Some(report) = submission.preempted {
            output.say(&report.to_string());
        }
        output.say(&format!("starting task {name}"));
        Ok(Turn::Continue)
    }

    fn stop(&mut self, output: &mut dyn OutputSink, quit: bool) -> Turn {
        let outcome = self.supervisor.stop();
        if let Some(report) = outcome.report {
            output.say(&report.to_string());
        }
        if let Err(err) = outcome.result {
            report_error(&err, output);
        }
        if quit {
            output.say("Quitting program");
            Turn::Quit
        } else {
            Turn::Continue
        }
    }
}

fn report_error(err: &CommandError, output: &mut dyn OutputSink) {
    match err {
        CommandError::Gateway(_) => warn!("robot error: {}", err),
        _ => info!("turn rejected: {}", err),
    }
    output.say(&format!("Error: {err}"));
}
