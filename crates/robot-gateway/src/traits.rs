use crate::{Result, VelocityCommand};
use std::time::{Duration, SystemTime};

/// A minimal blocking facade over the robot vendor stack.
///
/// Implementations own the robot session (connection, lease, power state) and
/// must be shareable across the coordinator and the single worker thread.
pub trait RobotGateway: Send + Sync {
    /// Authenticate and acquire whatever lease/e-stop relationship the robot needs.
    fn authenticate(&self) -> Result<()>;

    fn is_powered_on(&self) -> Result<bool>;

    /// Request motor power, waiting at most `timeout` for it to come up.
    fn power_on(&self, timeout: Duration) -> Result<()>;

    /// Safe power off (the robot sits down before cutting power).
    fn power_off(&self) -> Result<()>;

    /// Return to an upright resting posture.
    fn self_right(&self) -> Result<()>;

    /// Stand up, blocking until standing or `timeout` elapses.
    fn stand(&self, timeout: Duration) -> Result<()>;

    /// Issue a body velocity that the robot holds until `end_time` unless stopped earlier.
    fn set_velocity(&self, command: VelocityCommand, end_time: SystemTime) -> Result<()>;

    /// Stop any motion immediately.
    fn stop(&self) -> Result<()>;
}
