//! Scenario run command.

use anyhow::{bail, Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use pairtest_core::{
    Config, Harness, HarnessError, Overrides, RunObserver, ScenarioKind, ScenarioTiming,
};
use std::time::Duration;

/// Flags of the `run` subcommand.
pub struct RunArgs {
    pub scenarios: Vec<String>,
    pub overrides: Vec<String>,
    pub settle_ms: u64,
    pub period_interval_ms: u64,
    pub period_max_iterations: u32,
    pub close_grace_ms: u64,
    pub startup_grace_ms: u64,
}

/// Run the selected scenarios against a freshly launched service.
pub fn run(args: RunArgs) -> Result<()> {
    let scenarios = select_scenarios(&args.scenarios)?;
    let overrides = parse_overrides(&args.overrides)?;
    let timing = ScenarioTiming {
        settle: Duration::from_millis(args.settle_ms),
        period_interval: Duration::from_millis(args.period_interval_ms),
        period_max_iterations: args.period_max_iterations,
        close_grace: Duration::from_millis(args.close_grace_ms),
    };

    tracing::debug!(?scenarios, ?overrides, ?timing, "run requested");

    let config = Config::resolve();
    let harness = Harness::new(config)
        .overrides(overrides)
        .timing(timing)
        .startup_grace(Duration::from_millis(args.startup_grace_ms));

    let effective = harness.effective_config()?;
    if effective.launches_service() {
        println!(
            "Launching {} on {}",
            style(&effective.app_path).cyan(),
            style(effective.base_url()).cyan()
        );
    } else {
        println!("Testing running service at {}", style(effective.base_url()).cyan());
    }

    let mut progress = Progress::default();
    match harness.run(&scenarios, &mut progress) {
        Ok(summary) => {
            println!();
            println!(
                "{} {} ({} scenarios in {:.1}s)",
                style("✓").green(),
                style("All scenarios passed").green().bold(),
                summary.passed.len(),
                summary.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            progress.clear();
            println!();
            println!("{} {}", style("ERR::").red().bold(), e);
            if let Some(hint) = e.hint() {
                println!("  {} {}", style("→").cyan(), hint);
            }
            bail!("conformance run failed")
        }
    }
}

/// Scenario names from the command line, or every scenario if none given.
fn select_scenarios(names: &[String]) -> Result<Vec<ScenarioKind>> {
    if names.is_empty() {
        return Ok(ScenarioKind::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| {
            name.parse::<ScenarioKind>()
                .with_context(|| "Run 'pairtest list' to see available scenarios".to_string())
        })
        .collect()
}

fn parse_overrides(pairs: &[String]) -> Result<Overrides> {
    let mut overrides = Overrides::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid override {pair:?}: expected KEY=VALUE");
        };
        overrides.insert(key.trim().to_ascii_lowercase(), value.to_string());
    }
    Ok(overrides)
}

/// One spinner per scenario, replaced by a result line when it finishes.
#[derive(Default)]
struct Progress {
    spinner: Option<ProgressBar>,
}

impl Progress {
    fn clear(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

impl RunObserver for Progress {
    fn scenario_started(&mut self, kind: ScenarioKind) {
        self.clear();
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(format!("{} - {}", kind.name(), kind.description()));
        pb.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(pb);
    }

    fn scenario_passed(&mut self, kind: ScenarioKind, elapsed: Duration) {
        self.clear();
        println!(
            "  {} {:<14} {}",
            style("✓").green(),
            kind.name(),
            style(format!("{:.1}s", elapsed.as_secs_f64())).dim()
        );
    }

    fn scenario_failed(&mut self, kind: ScenarioKind, error: &HarnessError) {
        self.clear();
        let cause = match error {
            HarnessError::ScenarioFailed { source, .. } => source.to_string(),
            other => other.to_string(),
        };
        println!("  {} {:<14} {}", style("×").red(), kind.name(), style(cause).red());
    }
}
