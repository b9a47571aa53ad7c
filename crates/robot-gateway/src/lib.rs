//! robot-gateway: the boundary object wrapping a quadruped robot's vendor SDK
//!
//! The crate exposes a small blocking [`RobotGateway`] trait covering the
//! operations the command layer needs (authenticate, power, stand, velocity,
//! stop). The default build enables a `mock` backend so the rest of the
//! workspace can run and be tested without a robot on the network.

mod types;
pub use types::{CallRecord, GatewayCall, GatewayCallKind, VelocityCommand};

mod error;
pub use error::{GatewayError, Result};

mod traits;
pub use traits::RobotGateway;

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::MockRobot;

#[cfg(feature = "http-bridge")]
mod http_bridge;
#[cfg(feature = "http-bridge")]
pub use http_bridge::{BridgeCredentials, HttpBridgeGateway};
