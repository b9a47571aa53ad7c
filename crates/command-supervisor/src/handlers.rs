//! Robot-facing command handlers
//!
//! Handlers run on the supervisor's worker thread. They must observe the
//! [`CancelToken`] at every suspension point, and any handler that raised a
//! velocity command must leave the robot stopped when it returns.

use crate::cancel::CancelToken;
use crate::registry::ValidatedInvocation;
use crate::{CommandError, Result};
use robot_gateway::{GatewayError, RobotGateway, VelocityCommand};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a handler finished when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    Completed,
    Cancelled,
}

/// What a running handler may touch.
pub struct TaskContext<'a> {
    pub task_id: Uuid,
    pub gateway: &'a dyn RobotGateway,
    pub cancel: &'a CancelToken,
}

pub trait CommandHandler: Send + Sync {
    fn run(
        &self,
        ctx: &TaskContext<'_>,
        invocation: &ValidatedInvocation,
    ) -> Result<HandlerOutcome>;
}

/// Blocking-call timeouts used by the handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerTimings {
    pub stand_timeout: Duration,
    pub power_on_timeout: Duration,
}

impl Default for HandlerTimings {
    fn default() -> Self {
        Self {
            stand_timeout: Duration::from_secs(10),
            power_on_timeout: Duration::from_secs(20),
        }
    }
}

fn require_powered(gateway: &dyn RobotGateway) -> Result<()> {
    if gateway.is_powered_on()? {
        Ok(())
    } else {
        Err(CommandError::PreconditionFailed("robot off".to_string()))
    }
}

/// Sends exactly one stop: explicitly through [`StopGuard::release`], or on drop
/// if the handler unwinds before reaching it.
struct StopGuard<'a> {
    gateway: &'a dyn RobotGateway,
    armed: bool,
}

impl<'a> StopGuard<'a> {
    fn arm(gateway: &'a dyn RobotGateway) -> Self {
        Self {
            gateway,
            armed: true,
        }
    }

    fn release(mut self) -> Result<(), GatewayError> {
        self.armed = false;
        self.gateway.stop()
    }
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.gateway.stop() {
                warn!("stop during unwind failed: {}", e);
            }
        }
    }
}

/// Where a movement handler takes its velocity from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VelocitySource {
    /// Fixed direction and speed (`move_forward` and friends).
    Fixed(VelocityCommand),
    /// `v_x`, `v_y`, `v_rot` arguments of the invocation.
    Arguments,
}

/// Stand, hold a velocity for the invocation's duration, then stop.
pub struct MoveHandler {
    velocity: VelocitySource,
    timings: HandlerTimings,
}

impl MoveHandler {
    pub fn new(velocity: VelocitySource, timings: HandlerTimings) -> Self {
        Self { velocity, timings }
    }

    fn velocity(&self, invocation: &ValidatedInvocation) -> Result<VelocityCommand> {
        match self.velocity {
            VelocitySource::Fixed(v) => Ok(v),
            VelocitySource::Arguments => {
                let component = |name: &str| {
                    invocation
                        .number(name)
                        .ok_or_else(|| CommandError::schema(name, "required argument missing"))
                };
                Ok(VelocityCommand::new(
                    component("v_x")?,
                    component("v_y")?,
                    component("v_rot")?,
                ))
            }
        }
    }

    fn drive(
        &self,
        ctx: &TaskContext<'_>,
        velocity: VelocityCommand,
        duration: Duration,
    ) -> Result<HandlerOutcome> {
        if ctx.cancel.is_cancelled() {
            return Ok(HandlerOutcome::Cancelled);
        }
        ctx.gateway.stand(self.timings.stand_timeout)?;
        if ctx.cancel.is_cancelled() {
            return Ok(HandlerOutcome::Cancelled);
        }

        let end_time = SystemTime::now() + duration;
        ctx.gateway.set_velocity(velocity, end_time)?;
        debug!(task = %ctx.task_id, %velocity, ?duration, "velocity issued");

        if ctx.cancel.wait_timeout(duration) {
            Ok(HandlerOutcome::Cancelled)
        } else {
            Ok(HandlerOutcome::Completed)
        }
    }
}

impl CommandHandler for MoveHandler {
    fn run(
        &self,
        ctx: &TaskContext<'_>,
        invocation: &ValidatedInvocation,
    ) -> Result<HandlerOutcome> {
        let velocity = self.velocity(invocation)?;
        let duration = invocation
            .duration
            .ok_or_else(|| CommandError::schema("duration", "required argument missing"))?;

        // A task cancelled before it starts still owes the robot its stop.
        if !ctx.cancel.is_cancelled() {
            require_powered(ctx.gateway)?;
        }

        let guard = StopGuard::arm(ctx.gateway);
        let outcome = self.drive(ctx, velocity, duration);
        let stopped = guard.release();

        match outcome {
            Ok(outcome) => {
                stopped?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(stop_err) = stopped {
                    warn!(task = %ctx.task_id, "stop after failed move also failed: {}", stop_err);
                }
                Err(e)
            }
        }
    }
}

/// Power the motors on unless they already are. Never retried.
pub struct PowerOnHandler {
    timings: HandlerTimings,
}

impl PowerOnHandler {
    pub fn new(timings: HandlerTimings) -> Self {
        Self { timings }
    }
}

impl CommandHandler for PowerOnHandler {
    fn run(
        &self,
        ctx: &TaskContext<'_>,
        _invocation: &ValidatedInvocation,
    ) -> Result<HandlerOutcome> {
        if ctx.cancel.is_cancelled() {
            return Ok(HandlerOutcome::Cancelled);
        }
        if ctx.gateway.is_powered_on()? {
            info!("robot is already powered on");
            return Ok(HandlerOutcome::Completed);
        }
        ctx.gateway.power_on(self.timings.power_on_timeout)?;
        info!("robot powered on");
        Ok(HandlerOutcome::Completed)
    }
}

/// Orderly shutdown: stop, self-right, cut power.
///
/// Best effort rather than transactional: every step is attempted even when an
/// earlier one fails, and the first failure is reported once all have run.
/// Cancellation is not observed mid-sequence.
pub struct PowerOffHandler;

impl CommandHandler for PowerOffHandler {
    fn run(
        &self,
        ctx: &TaskContext<'_>,
        _invocation: &ValidatedInvocation,
    ) -> Result<HandlerOutcome> {
        if !ctx.gateway.is_powered_on()? {
            info!("robot is already powered off");
            return Ok(HandlerOutcome::Completed);
        }

        let steps: [(&str, fn(&dyn RobotGateway) -> Result<(), GatewayError>); 3] = [
            ("stop", |gw| gw.stop()),
            ("self_right", |gw| gw.self_right()),
            ("power_off", |gw| gw.power_off()),
        ];

        let mut first_error = None;
        for (step, call) in steps {
            if let Err(e) = call(ctx.gateway) {
                warn!(task = %ctx.task_id, step, "power off step failed: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => {
                info!("robot powered off");
                Ok(HandlerOutcome::Completed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Action;
    use robot_gateway::{GatewayCallKind, MockRobot};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn invocation(duration: Duration) -> ValidatedInvocation {
        ValidatedInvocation {
            name: "move_forward".to_string(),
            args: BTreeMap::new(),
            duration: Some(duration),
            raw_text: String::new(),
            action: Action::Stop,
        }
    }

    fn forward() -> MoveHandler {
        MoveHandler::new(
            VelocitySource::Fixed(VelocityCommand::new(0.5, 0.0, 0.0)),
            HandlerTimings::default(),
        )
    }

    fn ctx<'a>(robot: &'a MockRobot, cancel: &'a CancelToken) -> TaskContext<'a> {
        TaskContext {
            task_id: Uuid::new_v4(),
            gateway: robot,
            cancel,
        }
    }

    #[test]
    fn move_completes_with_stand_velocity_stop() {
        let robot = MockRobot::powered_on();
        let cancel = CancelToken::new();
        let outcome = forward()
            .run(&ctx(&robot, &cancel), &invocation(Duration::from_millis(20)))
            .unwrap();
        assert_eq!(outcome, HandlerOutcome::Completed);
        assert_eq!(
            robot.command_kinds(),
            vec![
                GatewayCallKind::Stand,
                GatewayCallKind::SetVelocity,
                GatewayCallKind::Stop
            ]
        );
    }

    #[test]
    fn move_requires_power() {
        let robot = MockRobot::new();
        let cancel = CancelToken::new();
        let err = forward()
            .run(&ctx(&robot, &cancel), &invocation(Duration::from_millis(20)))
            .unwrap_err();
        assert!(matches!(err, CommandError::PreconditionFailed(_)));
        assert_eq!(robot.count(GatewayCallKind::SetVelocity), 0);
    }

    #[test]
    fn cancelled_before_start_still_stops_once() {
        let robot = MockRobot::powered_on();
        let cancel = CancelToken::new();
        cancel.cancel("stop");
        let outcome = forward()
            .run(&ctx(&robot, &cancel), &invocation(Duration::from_secs(5)))
            .unwrap();
        assert_eq!(outcome, HandlerOutcome::Cancelled);
        assert_eq!(robot.command_kinds(), vec![GatewayCallKind::Stop]);
    }

    #[test]
    fn gateway_failure_mid_move_still_stops() {
        let robot = MockRobot::powered_on();
        robot.fail_on(
            GatewayCallKind::SetVelocity,
            GatewayError::Transport("link down".to_string()),
        );
        let cancel = CancelToken::new();
        let err = forward()
            .run(&ctx(&robot, &cancel), &invocation(Duration::from_secs(5)))
            .unwrap_err();
        assert!(matches!(err, CommandError::Gateway(GatewayError::Transport(_))));
        assert_eq!(robot.count(GatewayCallKind::Stop), 1);
    }

    #[test]
    fn power_on_is_idempotent() {
        let robot = MockRobot::new();
        let cancel = CancelToken::new();
        let handler = PowerOnHandler::new(HandlerTimings::default());
        let inv = invocation(Duration::ZERO);
        handler.run(&ctx(&robot, &cancel), &inv).unwrap();
        handler.run(&ctx(&robot, &cancel), &inv).unwrap();
        assert_eq!(robot.count(GatewayCallKind::PowerOn), 1);
    }

    #[test]
    fn power_off_attempts_every_step() {
        let robot = MockRobot::powered_on();
        robot.fail_on(
            GatewayCallKind::SelfRight,
            GatewayError::Rejected("fallen".to_string()),
        );
        let cancel = CancelToken::new();
        let err = PowerOffHandler
            .run(&ctx(&robot, &cancel), &invocation(Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, CommandError::Gateway(GatewayError::Rejected(_))));
        assert_eq!(
            robot.command_kinds(),
            vec![
                GatewayCallKind::Stop,
                GatewayCallKind::SelfRight,
                GatewayCallKind::PowerOff
            ]
        );
        assert!(!robot.is_powered_on().unwrap());
    }

    #[test]
    fn power_off_when_off_does_nothing() {
        let robot = MockRobot::new();
        let cancel = CancelToken::new();
        PowerOffHandler
            .run(&ctx(&robot, &cancel), &invocation(Duration::ZERO))
            .unwrap();
        assert!(robot.command_kinds().is_empty());
    }

    #[test]
    fn handlers_are_shareable() {
        fn assert_send_sync<T: Send + Sync>(_: &T) {}
        let handler: Arc<dyn CommandHandler> = Arc::new(forward());
        assert_send_sync(&handler);
    }
}
