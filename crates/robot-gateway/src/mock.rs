use crate::{
    CallRecord, GatewayCall, GatewayCallKind, GatewayError, Result, RobotGateway,
    VelocityCommand,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

/// An in-process fake robot. Every call is recorded with the interval it was in
/// flight so tests can assert ordering and overlap.
pub struct MockRobot {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    authenticated: bool,
    powered_on: bool,
    standing: bool,
    velocity: Option<(VelocityCommand, SystemTime)>,
    calls: Vec<CallRecord>,
    failures: HashMap<GatewayCallKind, GatewayError>,
    latency: HashMap<GatewayCallKind, Duration>,
    in_flight: usize,
    max_in_flight: usize,
}

impl Default for MockRobot {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRobot {
    /// A robot that is reachable but powered off.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn powered_on() -> Self {
        let robot = Self::new();
        robot.lock().powered_on = true;
        robot
    }

    /// Make every subsequent call of `kind` fail with `error` until cleared.
    pub fn fail_on(&self, kind: GatewayCallKind, error: GatewayError) {
        self.lock().failures.insert(kind, error);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Hold every call of `kind` in flight for `latency` before it completes.
    pub fn set_latency(&self, kind: GatewayCallKind, latency: Duration) {
        self.lock().latency.insert(kind, latency);
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.lock().calls.clone()
    }

    pub fn call_kinds(&self) -> Vec<GatewayCallKind> {
        self.lock().calls.iter().map(CallRecord::kind).collect()
    }

    /// Call kinds without the read-only power queries, which handlers issue freely.
    pub fn command_kinds(&self) -> Vec<GatewayCallKind> {
        self.call_kinds()
            .into_iter()
            .filter(|k| *k != GatewayCallKind::IsPoweredOn)
            .collect()
    }

    pub fn count(&self, kind: GatewayCallKind) -> usize {
        self.lock().calls.iter().filter(|c| c.kind() == kind).count()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().authenticated
    }

    pub fn is_standing(&self) -> bool {
        self.lock().standing
    }

    /// True while a velocity command is outstanding and its end time has not passed.
    pub fn is_moving(&self) -> bool {
        match self.lock().velocity {
            Some((_, end)) => end > SystemTime::now(),
            None => false,
        }
    }

    /// Largest number of gateway calls that were ever in flight together.
    pub fn max_concurrent_calls(&self) -> usize {
        self.lock().max_in_flight
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn invoke<T>(
        &self,
        call: GatewayCall,
        apply: impl FnOnce(&mut MockState) -> Result<T>,
    ) -> Result<T> {
        let kind = call.kind();
        let started = Instant::now();
        let latency = {
            let mut state = self.lock();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.latency.get(&kind).copied()
        };
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }

        let mut state = self.lock();
        state.in_flight -= 1;
        let result = match state.failures.get(&kind).cloned() {
            Some(err) => Err(err),
            None => apply(&mut state),
        };
        tracing::trace!(?call, ok = result.is_ok(), "mock robot call");
        state.calls.push(CallRecord {
            call,
            started,
            finished: Instant::now(),
            ok: result.is_ok(),
        });
        result
    }
}

impl RobotGateway for MockRobot {
    fn authenticate(&self) -> Result<()> {
        self.invoke(GatewayCall::Authenticate, |s| {
            s.authenticated = true;
            Ok(())
        })
    }

    fn is_powered_on(&self) -> Result<bool> {
        self.invoke(GatewayCall::IsPoweredOn, |s| Ok(s.powered_on))
    }

    fn power_on(&self, timeout: Duration) -> Result<()> {
        self.invoke(GatewayCall::PowerOn { timeout }, |s| {
            s.powered_on = true;
            Ok(())
        })
    }

    fn power_off(&self) -> Result<()> {
        self.invoke(GatewayCall::PowerOff, |s| {
            s.powered_on = false;
            s.standing = false;
            s.velocity = None;
            Ok(())
        })
    }

    fn self_right(&self) -> Result<()> {
        self.invoke(GatewayCall::SelfRight, |s| {
            s.standing = false;
            Ok(())
        })
    }

    fn stand(&self, timeout: Duration) -> Result<()> {
        self.invoke(GatewayCall::Stand { timeout }, |s| {
            if !s.powered_on {
                return Err(GatewayError::Rejected("robot is powered off".to_string()));
            }
            s.standing = true;
            Ok(())
        })
    }

    fn set_velocity(&self, command: VelocityCommand, end_time: SystemTime) -> Result<()> {
        self.invoke(GatewayCall::SetVelocity { command, end_time }, |s| {
            if !s.powered_on {
                return Err(GatewayError::Rejected("robot is powered off".to_string()));
            }
            s.velocity = Some((command, end_time));
            Ok(())
        })
    }

    fn stop(&self) -> Result<()> {
        self.invoke(GatewayCall::Stop, |s| {
            s.velocity = None;
            Ok(())
        })
    }
}
