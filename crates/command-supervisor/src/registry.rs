//! Typed command table: name → schema + action

use crate::handlers::CommandHandler;
use crate::schema::{ArgValue, Command, TimeUnit};
use crate::{CommandError, Result};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Ceiling applied to every duration argument unless configured otherwise.
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(30);

/// What a resolved command does.
#[derive(Clone)]
pub enum Action {
    /// Long-running robot work executed by the supervisor on a worker thread.
    Task(Arc<dyn CommandHandler>),
    /// Cancel whatever runs and stop the robot.
    Stop,
    /// Stop, then end the session.
    Quit,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Task(_) => f.write_str("Task"),
            Action::Stop => f.write_str("Stop"),
            Action::Quit => f.write_str("Quit"),
        }
    }
}

/// A command request as produced by the interpreter, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub name: String,
    pub arguments: Map<String, Value>,
    pub raw_text: String,
}

impl Invocation {
    pub fn new(name: &str, arguments: Map<String, Value>, raw_text: &str) -> Self {
        Self {
            name: name.to_string(),
            arguments,
            raw_text: raw_text.to_string(),
        }
    }

    /// Build from a `json!({...})` literal; non-object values give no arguments.
    pub fn from_json(name: &str, arguments: Value, raw_text: &str) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(name, arguments, raw_text)
    }
}

/// An invocation that passed schema validation and carries its action.
#[derive(Debug, Clone)]
pub struct ValidatedInvocation {
    pub name: String,
    pub args: BTreeMap<String, ArgValue>,
    /// Normalized run time for commands that declare one.
    pub duration: Option<Duration>,
    pub raw_text: String,
    pub action: Action,
}

impl ValidatedInvocation {
    pub fn number(&self, name: &str) -> Option<f64> {
        self.args.get(name).and_then(ArgValue::as_f64)
    }
}

struct Entry {
    command: Command,
    action: Action,
}

pub struct ActionRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    max_duration: Duration,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DURATION)
    }
}

impl ActionRegistry {
    pub fn new(max_duration: Duration) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            max_duration,
        }
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    pub fn register(&mut self, command: Command, action: Action) -> Result<()> {
        if self.index.contains_key(&command.name) {
            return Err(CommandError::DuplicateCommand(command.name));
        }
        tracing::debug!(command = %command.name, ?action, "registered command");
        self.index.insert(command.name.clone(), self.entries.len());
        self.entries.push(Entry { command, action });
        Ok(())
    }

    /// Registered commands in registration order.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.entries.iter().map(|e| &e.command)
    }

    /// The tool catalog advertised to the interpreter.
    pub fn tools(&self) -> Vec<Value> {
        self.commands().map(Command::to_tool).collect()
    }

    /// Validate an invocation against its command's schema. Never touches the robot.
    pub fn resolve(&self, invocation: &Invocation) -> Result<ValidatedInvocation> {
        let entry = self
            .index
            .get(&invocation.name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| CommandError::UnknownCommand(invocation.name.clone()))?;
        let command = &entry.command;

        if let Some(extra) = invocation
            .arguments
            .keys()
            .find(|k| command.param_spec(k).is_none())
        {
            return Err(CommandError::schema(extra, "unexpected argument"));
        }

        let mut args = BTreeMap::new();
        for spec in &command.params {
            match invocation.arguments.get(&spec.name) {
                Some(Value::Null) | None => {
                    if spec.required {
                        return Err(CommandError::schema(&spec.name, "required argument missing"));
                    }
                }
                Some(raw) => {
                    let value = spec
                        .check(raw)
                        .map_err(|reason| CommandError::schema(&spec.name, reason))?;
                    args.insert(spec.name.clone(), value);
                }
            }
        }

        let duration = match &command.duration {
            Some(spec) => {
                let value = args
                    .get(&spec.value_param)
                    .and_then(ArgValue::as_f64)
                    .ok_or_else(|| {
                        CommandError::schema(&spec.value_param, "required argument missing")
                    })?;
                let unit = match &spec.unit_param {
                    Some(unit_param) => {
                        let name = args
                            .get(unit_param)
                            .and_then(ArgValue::as_str)
                            .unwrap_or("seconds");
                        TimeUnit::parse(name).ok_or_else(|| {
                            CommandError::schema(unit_param, format!("unsupported unit \"{name}\""))
                        })?
                    }
                    None => TimeUnit::Seconds,
                };
                Some(self.check_duration(&spec.value_param, unit.to_seconds(value))?)
            }
            None => None,
        };

        Ok(ValidatedInvocation {
            name: command.name.clone(),
            args,
            duration,
            raw_text: invocation.raw_text.clone(),
            action: entry.action.clone(),
        })
    }

    fn check_duration(&self, field: &str, seconds: f64) -> Result<Duration> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(CommandError::schema(field, "duration must be positive"));
        }
        let ceiling = self.max_duration.as_secs_f64();
        if seconds > ceiling {
            return Err(CommandError::schema(
                field,
                format!("{seconds}s exceeds the {ceiling}s limit"),
            ));
        }
        Ok(Duration::from_secs_f64(seconds))
    }
}
