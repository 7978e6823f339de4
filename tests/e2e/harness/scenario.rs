use super::mock_service::{MockService, ServiceBehavior};
use pairtest_core::{
    Harness, HarnessError, Overrides, RunObserver, RunSummary, ScenarioKind, ScenarioTiming,
};
use std::time::Duration;

/// Timing short enough for the suite; the mock reacts within milliseconds.
pub fn fast_timing() -> ScenarioTiming {
    ScenarioTiming {
        settle: Duration::from_millis(50),
        period_interval: Duration::from_millis(100),
        period_max_iterations: 15,
        close_grace: Duration::from_millis(500),
    }
}

/// Fluent DSL for running harness scenarios against a mock service
pub struct Conformance {
    name: String,
    behavior: ServiceBehavior,
    scenarios: Vec<ScenarioKind>,
    overrides: Overrides,
    timing: ScenarioTiming,
    app_path: Option<String>,
}

impl Conformance {
    /// Create a new run against a conforming service
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            behavior: ServiceBehavior::conforming(),
            scenarios: Vec::new(),
            overrides: Overrides::new(),
            timing: fast_timing(),
            app_path: None,
        }
    }

    // ===== Service under test =====

    /// Replace the mock service's behavior
    pub fn against(mut self, behavior: ServiceBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Have the harness launch (and later stop) this command alongside the mock
    pub fn launching(mut self, app_path: &str) -> Self {
        self.app_path = Some(app_path.to_string());
        self
    }

    // ===== Harness options =====

    /// Add a scenario to the run
    pub fn scenario(mut self, kind: ScenarioKind) -> Self {
        self.scenarios.push(kind);
        self
    }

    /// Run every scenario in canonical order
    pub fn all_scenarios(mut self) -> Self {
        self.scenarios = ScenarioKind::ALL.to_vec();
        self
    }

    /// Add a launch override
    pub fn with_override(mut self, name: &str, value: &str) -> Self {
        self.overrides.insert(name.to_string(), value.to_string());
        self
    }

    pub fn timing(mut self, timing: ScenarioTiming) -> Self {
        self.timing = timing;
        self
    }

    // ===== Execution =====

    /// Start the mock, run the harness, and collect the results
    pub fn run(self) -> ScenarioResult {
        let service = match MockService::start(self.behavior) {
            Ok(service) => service,
            Err(e) => {
                return ScenarioResult {
                    name: self.name,
                    started: Vec::new(),
                    passed: Vec::new(),
                    outcome: Err(format!("Failed to start mock service: {e:#}")),
                }
            }
        };

        let mut config = service.config();
        if let Some(app_path) = self.app_path {
            config.app_path = app_path;
        }
        let harness = Harness::new(config)
            .overrides(self.overrides)
            .timing(self.timing)
            .startup_grace(Duration::from_millis(100));

        let mut recorder = Recorder::default();
        let outcome = harness
            .run(&self.scenarios, &mut recorder)
            .map_err(|e| match e {
                HarnessError::ScenarioFailed { scenario, source } => {
                    format!("{scenario}: {source}")
                }
                other => other.to_string(),
            });

        ScenarioResult {
            name: self.name,
            started: recorder.started,
            passed: recorder.passed,
            outcome,
        }
    }
}

#[derive(Default)]
struct Recorder {
    started: Vec<ScenarioKind>,
    passed: Vec<ScenarioKind>,
}

impl RunObserver for Recorder {
    fn scenario_started(&mut self, kind: ScenarioKind) {
        self.started.push(kind);
    }

    fn scenario_passed(&mut self, kind: ScenarioKind, _elapsed: Duration) {
        self.passed.push(kind);
    }
}

/// Result of a conformance run
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub started: Vec<ScenarioKind>,
    pub passed: Vec<ScenarioKind>,
    /// Summary on success; `scenario: cause` on failure
    pub outcome: Result<RunSummary, String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) -> RunSummary {
        match self.outcome {
            Ok(summary) => summary,
            Err(e) => panic!("Run '{}' failed: {}", self.name, e),
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) -> RunSummary {
        match self.outcome {
            Ok(summary) => summary,
            Err(e) => panic!("{}: Run '{}' failed: {}", msg, self.name, e),
        }
    }

    /// Expect the run to fail with an error mentioning `needle`
    pub fn expect_failure(self, needle: &str) -> String {
        match self.outcome {
            Ok(_) => panic!("Run '{}' passed but was expected to fail", self.name),
            Err(e) => {
                assert!(
                    e.contains(needle),
                    "Run '{}' failed with {:?}, expected it to mention {:?}",
                    self.name,
                    e,
                    needle
                );
                e
            }
        }
    }
}
