use crate::harness::TestWorkspace;
use pairtest_core::{Config, HarnessError, Overrides, Supervisor};
use std::time::Duration;

fn config_for(app_path: String) -> Config {
    Config {
        app_path,
        ..Config::default()
    }
}

#[test]
fn test_service_receives_launch_environment() {
    let workspace = TestWorkspace::empty().unwrap();
    let mut overrides = Overrides::new();
    overrides.insert("max_data".into(), "2048".into());
    overrides.insert("timeout".into(), "30".into());

    let mut supervisor = Supervisor::new();
    supervisor
        .start(&config_for(workspace.env_dump_command()), &overrides)
        .unwrap();
    let env = workspace.read_env_dump().unwrap();
    supervisor.stop();

    assert_eq!(env.get("PAIR_MAX_DATA").map(String::as_str), Some("2048"));
    assert_eq!(env.get("PAIR_TIMEOUT").map(String::as_str), Some("30"));
    assert_eq!(env.get("PAIR_MAX_EXCHANGES").map(String::as_str), Some("5"));
    assert_eq!(env.get("PAIR_PORT").map(String::as_str), Some("8000"));
    assert!(env.contains_key("PATH"));
    assert!(!env.contains_key("PAIR_APP_PATH"));
    assert!(env.keys().all(|key| !key.starts_with("TEST_")));
}

#[test]
fn test_service_exiting_during_startup() {
    let mut supervisor = Supervisor::new();
    let err = supervisor
        .start(&config_for("exit 3".to_string()), &Overrides::new())
        .unwrap_err();
    assert!(matches!(err, HarnessError::Startup(_)));
    assert!(err.hint().is_some());
    assert!(supervisor.pid().is_none());
}

#[cfg(target_os = "linux")]
#[test]
fn test_stop_terminates_process_tree() {
    use pairtest_core::{descendant_pids, process_is_running};

    let workspace = TestWorkspace::empty().unwrap();
    let mut supervisor = Supervisor::new();
    let pid = supervisor
        .start(&config_for(workspace.process_tree_command()), &Overrides::new())
        .unwrap();
    assert_eq!(workspace.read_pid().unwrap(), pid);

    let children = descendant_pids(pid);
    assert_eq!(children.len(), 2, "children: {children:?}");
    assert!(supervisor.uptime().unwrap() >= Duration::from_millis(250));

    supervisor.stop();
    std::thread::sleep(Duration::from_millis(100));
    assert!(!process_is_running(pid));
    for child in children {
        assert!(!process_is_running(child), "child {child} survived stop");
    }
}
