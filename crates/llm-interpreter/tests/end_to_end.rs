use command_supervisor::{
    reference_registry, CatalogLimits, MainLoop, OutputSink, SlotView, TaskStatus, TaskSupervisor,
    Turn,
};
use llm_interpreter::KeywordInterpreter;
use robot_gateway::{GatewayCall, GatewayCallKind, MockRobot, VelocityCommand};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Transcript(Vec<String>);

impl OutputSink for Transcript {
    fn say(&mut self, message: &str) {
        self.0.push(message.to_string());
    }
}

#[test]
fn move_forward_runs_to_completion() {
    let robot = Arc::new(MockRobot::powered_on());
    let sup = TaskSupervisor::new(robot.clone());
    let registry = reference_registry(&CatalogLimits::default()).unwrap();
    let mut interp = KeywordInterpreter::new().unwrap();
    let mut out = Transcript::default();

    let started = Instant::now();
    let turn = MainLoop::new(&registry, &sup, &mut interp)
        .handle_line("move forward for 5 seconds", &mut out);
    assert_eq!(turn, Turn::Continue);
    assert_eq!(out.0, vec!["starting task move"]);

    let deadline = Instant::now() + Duration::from_secs(8);
    let report = loop {
        if let Some(report) = sup.reap_finished() {
            break report;
        }
        assert!(Instant::now() < deadline, "move never finished");
        thread::sleep(Duration::from_millis(20));
    };
    assert_eq!(report.status, TaskStatus::Completed);
    assert!(started.elapsed() >= Duration::from_secs(5));

    let calls = robot.calls();
    let velocity = calls
        .iter()
        .find(|c| c.kind() == GatewayCallKind::SetVelocity)
        .unwrap();
    let stop = calls
        .iter()
        .find(|c| c.kind() == GatewayCallKind::Stop)
        .unwrap();
    match &velocity.call {
        GatewayCall::SetVelocity { command, .. } => {
            assert_eq!(*command, VelocityCommand::new(0.5, 0.0, 0.0))
        }
        other => panic!("unexpected call {other:?}"),
    }
    let held = stop.started.duration_since(velocity.finished);
    assert!(held <= Duration::from_millis(5_500), "held for {held:?}");
    assert!(held >= Duration::from_millis(4_900), "held for {held:?}");
    assert_eq!(robot.count(GatewayCallKind::Stop), 1);
    assert!(!robot.is_moving());
}

#[test]
fn stop_preempts_a_running_move() {
    let robot = Arc::new(MockRobot::powered_on());
    let sup = TaskSupervisor::new(robot.clone());
    let registry = reference_registry(&CatalogLimits::default()).unwrap();
    let mut interp = KeywordInterpreter::new().unwrap();
    let mut out = Transcript::default();
    let mut main = MainLoop::new(&registry, &sup, &mut interp);

    main.handle_line("move forward for 5 seconds", &mut out);
    thread::sleep(Duration::from_secs(2));
    assert!(robot.is_moving());

    let asked = Instant::now();
    assert_eq!(main.handle_line("stop", &mut out), Turn::Continue);
    let latency = asked.elapsed();

    assert!(latency < Duration::from_millis(500), "stop took {latency:?}");
    assert_eq!(sup.status(), SlotView::Idle);
    assert!(out.0.iter().any(|m| m == "task move cancelled (stop)"));
    // one from the cancelled handler, one unconditional from the supervisor
    assert_eq!(robot.count(GatewayCallKind::Stop), 2);
    assert!(!robot.is_moving());
}

#[test]
fn a_minute_is_over_the_default_limit() {
    let robot = Arc::new(MockRobot::powered_on());
    let sup = TaskSupervisor::new(robot.clone());
    let registry = reference_registry(&CatalogLimits::default()).unwrap();
    let mut interp = KeywordInterpreter::new().unwrap();
    let mut out = Transcript::default();

    MainLoop::new(&registry, &sup, &mut interp).handle_line("walk left for 1 minute", &mut out);
    assert!(out.0[0].contains("invalid argument `duration`"), "{:?}", out.0);
    assert!(robot.calls().is_empty());
}
