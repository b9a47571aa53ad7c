use robot_gateway::GatewayError;
use thiserror::Error;

pub type Result<T, E = CommandError> = core::result::Result<T, E>;

/// Every way a user turn or a task can go wrong.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("command already registered: {0}")]
    DuplicateCommand(String),
    #[error("invalid argument `{field}`: {reason}")]
    SchemaViolation { field: String, reason: String },
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("robot gateway: {0}")]
    Gateway(#[from] GatewayError),
    #[error("interpreter: {0}")]
    Interpreter(#[from] InterpreterError),
    #[error("`{0}` is handled by the supervisor directly and cannot run as a task")]
    NotSubmittable(String),
    #[error("failed to start task worker: {0}")]
    Worker(String),
}

impl CommandError {
    pub(crate) fn schema(field: &str, reason: impl Into<String>) -> Self {
        CommandError::SchemaViolation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures of the language-model interpreter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InterpreterError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("service returned an error: {0}")]
    Api(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}
