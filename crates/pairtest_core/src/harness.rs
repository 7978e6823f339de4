//! Harness entry point: launch the service, run scenarios, tear down.

use crate::config::{Config, Overrides};
use crate::error::{HarnessError, Result};
use crate::scenario::{ScenarioKind, ScenarioRunner, ScenarioTiming};
use crate::supervisor::{Supervisor, DEFAULT_STARTUP_GRACE};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Progress callbacks for a harness run.
///
/// All methods default to doing nothing.
pub trait RunObserver {
    /// A scenario is about to run.
    fn scenario_started(&mut self, _kind: ScenarioKind) {}

    /// A scenario passed.
    fn scenario_passed(&mut self, _kind: ScenarioKind, _elapsed: Duration) {}

    /// A scenario failed; the run stops after this call.
    fn scenario_failed(&mut self, _kind: ScenarioKind, _error: &HarnessError) {}
}

impl RunObserver for () {}

/// A scenario that passed and how long it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioOutcome {
    pub scenario: ScenarioKind,
    pub elapsed: Duration,
}

/// Result of a run in which every scenario passed.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Passed scenarios in execution order.
    pub passed: Vec<ScenarioOutcome>,
    /// PID of the launched service, if the harness launched one.
    pub service_pid: Option<u32>,
    /// Wall time of the whole run, including service startup.
    pub elapsed: Duration,
}

/// Runs a sequence of scenarios against one service instance.
///
/// The service is launched once before the first scenario (unless
/// `app_path` is empty) and stopped after the last one, whether the run
/// passed or not.
#[derive(Debug, Clone)]
pub struct Harness {
    config: Config,
    overrides: Overrides,
    timing: ScenarioTiming,
    startup_grace: Duration,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            overrides: Overrides::new(),
            timing: ScenarioTiming::default(),
            startup_grace: DEFAULT_STARTUP_GRACE,
        }
    }

    /// Launch overrides, applied to both the service and the scenarios.
    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn timing(mut self, timing: ScenarioTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// Configuration with overrides applied.
    pub fn effective_config(&self) -> Result<Config> {
        self.config.with_overrides(&self.overrides)
    }

    /// Run `scenarios` in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// - Configuration errors from the overrides
    /// - `Startup` if the service cannot be launched
    /// - `ScenarioFailed` for the first failing scenario
    pub fn run(&self, scenarios: &[ScenarioKind], observer: &mut dyn RunObserver) -> Result<RunSummary> {
        let started = Instant::now();
        let effective = self.effective_config()?;

        let mut supervisor = Supervisor::new().with_startup_grace(self.startup_grace);
        let service_pid = if effective.launches_service() {
            Some(supervisor.start(&effective, &self.overrides)?)
        } else {
            info!(url = %effective.base_url(), "app_path is empty; using a running service");
            None
        };

        let runner = ScenarioRunner::new(effective).with_timing(self.timing.clone());
        let result = run_scenarios(&runner, scenarios, observer);
        supervisor.stop();

        let passed = result?;
        info!(
            scenarios = passed.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "all scenarios passed"
        );
        Ok(RunSummary {
            passed,
            service_pid,
            elapsed: started.elapsed(),
        })
    }
}

fn run_scenarios(
    runner: &ScenarioRunner,
    scenarios: &[ScenarioKind],
    observer: &mut dyn RunObserver,
) -> Result<Vec<ScenarioOutcome>> {
    let mut passed = Vec::with_capacity(scenarios.len());
    for &kind in scenarios {
        observer.scenario_started(kind);
        let started = Instant::now();
        match runner.run(kind) {
            Ok(()) => {
                let elapsed = started.elapsed();
                observer.scenario_passed(kind, elapsed);
                passed.push(ScenarioOutcome {
                    scenario: kind,
                    elapsed,
                });
            }
            Err(e) => {
                warn!(scenario = kind.name(), error = %e, "scenario failed");
                observer.scenario_failed(kind, &e);
                return Err(e);
            }
        }
    }
    Ok(passed)
}
