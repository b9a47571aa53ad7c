use thiserror::Error;

pub type Result<T, E = GatewayError> = core::result::Result<T, E>;

/// Failures talking to the robot. The gateway never retries; callers decide.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("command rejected by robot: {0}")]
    Rejected(String),
}
