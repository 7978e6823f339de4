use crate::harness::{Conformance, ServiceBehavior, TestWorkspace};
use pairtest_core::ScenarioKind;

#[test]
fn test_all_scenarios_against_running_service() {
    let summary = Conformance::new("full_run")
        .all_scenarios()
        .run()
        .expect("conforming service should pass every scenario");

    let order: Vec<_> = summary.passed.iter().map(|o| o.scenario).collect();
    assert_eq!(order, ScenarioKind::ALL.to_vec());
    assert!(summary.service_pid.is_none());
}

#[test]
fn test_run_stops_at_first_failure() {
    let result = Conformance::new("stops_early")
        .against(ServiceBehavior::conforming().max_data(None))
        .all_scenarios()
        .run();

    assert_eq!(
        result.passed,
        vec![ScenarioKind::SimpleRelay, ScenarioKind::FullExchange]
    );
    assert_eq!(result.started.last(), Some(&ScenarioKind::MaxData));
    result.expect_failure("max_data:");
}

#[test]
fn test_unknown_override_rejected_before_scenarios() {
    let result = Conformance::new("bad_override")
        .with_override("max_bandwidth", "1")
        .all_scenarios()
        .run();
    assert!(result.started.is_empty());
    result.expect_failure("unknown option: max_bandwidth");
}

#[cfg(target_os = "linux")]
#[test]
fn test_launched_service_stopped_after_run() {
    use pairtest_core::process_is_running;

    let workspace = TestWorkspace::empty().unwrap();
    let summary = Conformance::new("launch_and_stop")
        .launching(&workspace.pid_file_command())
        .scenario(ScenarioKind::SimpleRelay)
        .run()
        .unwrap();

    let pid = workspace.read_pid().unwrap();
    assert_eq!(summary.service_pid, Some(pid));
    assert!(!process_is_running(pid));
}

#[cfg(target_os = "linux")]
#[test]
fn test_launched_service_stopped_after_failure() {
    use pairtest_core::process_is_running;

    let workspace = TestWorkspace::empty().unwrap();
    let result = Conformance::new("launch_and_fail")
        .against(ServiceBehavior::conforming().max_exchanges(None).lifetime(None))
        .launching(&workspace.pid_file_command())
        .scenario(ScenarioKind::MaxExchange)
        .run();
    result.expect_failure("exchange limit");

    let pid = workspace.read_pid().unwrap();
    assert!(!process_is_running(pid));
}

#[test]
fn test_startup_failure_runs_no_scenarios() {
    let result = Conformance::new("startup_failure")
        .launching("exit 1")
        .all_scenarios()
        .run();
    assert!(result.started.is_empty());
    result.expect_failure("failed to start service");
}
