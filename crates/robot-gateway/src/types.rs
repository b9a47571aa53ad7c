use core::fmt;
use std::time::{Duration, SystemTime};

/// Body-frame velocity: `v_x` forward, `v_y` left, `v_rot` counter-clockwise.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VelocityCommand {
    pub v_x: f64,
    pub v_y: f64,
    pub v_rot: f64,
}

impl VelocityCommand {
    pub const fn new(v_x: f64, v_y: f64, v_rot: f64) -> Self {
        Self { v_x, v_y, v_rot }
    }
}

impl fmt::Display for VelocityCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v_x={:.2} v_y={:.2} v_rot={:.2}",
            self.v_x, self.v_y, self.v_rot
        )
    }
}

/// One gateway operation with its arguments, as seen by an instrumented backend.
#[derive(Clone, Debug, PartialEq)]
pub enum GatewayCall {
    Authenticate,
    IsPoweredOn,
    PowerOn { timeout: Duration },
    PowerOff,
    SelfRight,
    Stand { timeout: Duration },
    SetVelocity { command: VelocityCommand, end_time: SystemTime },
    Stop,
}

impl GatewayCall {
    pub fn kind(&self) -> GatewayCallKind {
        match self {
            GatewayCall::Authenticate => GatewayCallKind::Authenticate,
            GatewayCall::IsPoweredOn => GatewayCallKind::IsPoweredOn,
            GatewayCall::PowerOn { .. } => GatewayCallKind::PowerOn,
            GatewayCall::PowerOff => GatewayCallKind::PowerOff,
            GatewayCall::SelfRight => GatewayCallKind::SelfRight,
            GatewayCall::Stand { .. } => GatewayCallKind::Stand,
            GatewayCall::SetVelocity { .. } => GatewayCallKind::SetVelocity,
            GatewayCall::Stop => GatewayCallKind::Stop,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum GatewayCallKind {
    Authenticate,
    IsPoweredOn,
    PowerOn,
    PowerOff,
    SelfRight,
    Stand,
    SetVelocity,
    Stop,
}

/// A recorded gateway call with the interval it was in flight.
#[derive(Clone, Debug)]
pub struct CallRecord {
    pub call: GatewayCall,
    pub started: std::time::Instant,
    pub finished: std::time::Instant,
    pub ok: bool,
}

impl CallRecord {
    pub fn kind(&self) -> GatewayCallKind {
        self.call.kind()
    }

    /// True when the two calls were in flight at the same time.
    pub fn overlaps(&self, other: &CallRecord) -> bool {
        self.started < other.finished && other.started < self.finished
    }
}
