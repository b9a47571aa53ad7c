//! The reference command set

use crate::handlers::{
    HandlerTimings, MoveHandler, PowerOffHandler, PowerOnHandler, VelocitySource,
};
use crate::registry::{Action, ActionRegistry, DEFAULT_MAX_DURATION};
use crate::schema::{Command, ParamSpec, TimeUnit};
use crate::Result;
use robot_gateway::VelocityCommand;
use std::sync::Arc;
use std::time::Duration;

/// Speed used by the fixed-direction moves, in m/s.
pub const DIRECTIONAL_SPEED: f64 = 0.5;

/// Largest magnitude accepted for any velocity component.
pub const MAX_VELOCITY: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogLimits {
    pub max_duration: Duration,
    pub timings: HandlerTimings,
}

impl Default for CatalogLimits {
    fn default() -> Self {
        Self {
            max_duration: DEFAULT_MAX_DURATION,
            timings: HandlerTimings::default(),
        }
    }
}

const DIRECTIONS: [(&str, VelocityCommand); 4] = [
    ("forward", VelocityCommand::new(DIRECTIONAL_SPEED, 0.0, 0.0)),
    ("backward", VelocityCommand::new(-DIRECTIONAL_SPEED, 0.0, 0.0)),
    ("left", VelocityCommand::new(0.0, DIRECTIONAL_SPEED, 0.0)),
    ("right", VelocityCommand::new(0.0, -DIRECTIONAL_SPEED, 0.0)),
];

/// Build the registry with `move`, the directional moves, power and stop/quit.
pub fn reference_registry(limits: &CatalogLimits) -> Result<ActionRegistry> {
    let mut registry = ActionRegistry::new(limits.max_duration);
    let ceiling = limits.max_duration.as_secs_f64();

    let velocity = |name: &str, what: &str| {
        ParamSpec::number(name, what).range(-MAX_VELOCITY, MAX_VELOCITY)
    };
    registry.register(
        Command::new(
            "move",
            "Command the robot to walk with a body velocity for a number of seconds",
        )
        .param(velocity("v_x", "Forward velocity in m/s, negative walks backward"))
        .param(velocity("v_y", "Sideways velocity in m/s, positive is to the left"))
        .param(velocity(
            "v_rot",
            "Turn rate in rad/s, positive turns counter-clockwise",
        ))
        .param(
            ParamSpec::number(
                "duration",
                &format!("How long to walk in seconds, at most {ceiling}"),
            )
            .range_exclusive_min(0.0, ceiling),
        )
        .duration_from("duration", None),
        Action::Task(Arc::new(MoveHandler::new(
            VelocitySource::Arguments,
            limits.timings,
        ))),
    )?;

    for (direction, velocity) in DIRECTIONS {
        registry.register(
            Command::new(
                &format!("move_{direction}"),
                &format!("Command the robot to move {direction}"),
            )
            .param(ParamSpec::integer(
                "time",
                &format!("How long the robot moves {direction}"),
            ))
            .param(
                ParamSpec::string(
                    "time_format",
                    &format!(
                        "The unit of time for this command, either seconds or minutes. \
                         The total time must not exceed {ceiling} seconds"
                    ),
                )
                .one_of(&TimeUnit::NAMES),
            )
            .duration_from("time", Some("time_format")),
            Action::Task(Arc::new(MoveHandler::new(
                VelocitySource::Fixed(velocity),
                limits.timings,
            ))),
        )?;
    }

    registry.register(
        Command::new("power_on", "Command the robot to power on"),
        Action::Task(Arc::new(PowerOnHandler::new(limits.timings))),
    )?;
    registry.register(
        Command::new("power_off", "Command the robot to power off"),
        Action::Task(Arc::new(PowerOffHandler)),
    )?;
    registry.register(
        Command::new("stop", "Command the robot to stop the current action"),
        Action::Stop,
    )?;
    registry.register(
        Command::new(
            "quit",
            "Stop the robot from the current action and quit the program",
        ),
        Action::Quit,
    )?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Invocation;
    use crate::CommandError;
    use serde_json::json;

    fn registry() -> ActionRegistry {
        reference_registry(&CatalogLimits::default()).unwrap()
    }

    fn resolve(name: &str, args: serde_json::Value) -> crate::Result<crate::ValidatedInvocation> {
        registry().resolve(&Invocation::from_json(name, args, ""))
    }

    fn is_schema_violation(result: crate::Result<crate::ValidatedInvocation>, field: &str) -> bool {
        matches!(result, Err(CommandError::SchemaViolation { field: f, .. }) if f == field)
    }

    #[test]
    fn catalog_names_in_order() {
        let names: Vec<String> = registry().commands().map(|c| c.name.clone()).collect();
        assert_eq!(
            names,
            vec![
                "move",
                "move_forward",
                "move_backward",
                "move_left",
                "move_right",
                "power_on",
                "power_off",
                "stop",
                "quit"
            ]
        );
    }

    #[test]
    fn move_duration_bounds() {
        let args = |d: f64| json!({"v_x": 0.5, "v_y": 0, "v_rot": 0, "duration": d});
        assert!(is_schema_violation(resolve("move", args(31.0)), "duration"));
        assert!(is_schema_violation(resolve("move", args(0.0)), "duration"));
        let ok = resolve("move", args(30.0)).unwrap();
        assert_eq!(ok.duration, Some(Duration::from_secs(30)));
    }

    #[test]
    fn move_velocity_band() {
        let result = resolve(
            "move",
            json!({"v_x": 1.5, "v_y": 0, "v_rot": 0, "duration": 2}),
        );
        assert!(is_schema_violation(result, "v_x"));
        assert!(resolve(
            "move",
            json!({"v_x": -1, "v_y": 1, "v_rot": -0.3, "duration": 2})
        )
        .is_ok());
    }

    #[test]
    fn directional_units() {
        assert!(is_schema_violation(
            resolve("move_forward", json!({"time": 2, "time_format": "hours"})),
            "time_format"
        ));
        assert!(is_schema_violation(
            resolve("move_left", json!({"time": 1, "time_format": "minutes"})),
            "time"
        ));
        let ok = resolve("move_right", json!({"time": 12, "time_format": "seconds"})).unwrap();
        assert_eq!(ok.duration, Some(Duration::from_secs(12)));
    }

    #[test]
    fn raised_ceiling_accepts_a_minute() {
        let limits = CatalogLimits {
            max_duration: Duration::from_secs(120),
            ..CatalogLimits::default()
        };
        let reg = reference_registry(&limits).unwrap();
        let ok = reg
            .resolve(&Invocation::from_json(
                "move_backward",
                json!({"time": 1, "time_format": "minutes"}),
                "",
            ))
            .unwrap();
        assert_eq!(ok.duration, Some(Duration::from_secs(60)));
    }

    #[test]
    fn stop_and_quit_are_control_actions() {
        assert!(matches!(resolve("stop", json!({})).unwrap().action, Action::Stop));
        assert!(matches!(resolve("quit", json!({})).unwrap().action, Action::Quit));
    }

    #[test]
    fn tools_advertise_the_unit_enum() {
        let tools = registry().tools();
        let forward = tools
            .iter()
            .find(|t| t["function"]["name"] == "move_forward")
            .unwrap();
        assert_eq!(
            forward["function"]["parameters"]["properties"]["time_format"]["enum"],
            json!(["seconds", "minutes"])
        );
    }
}
