//! Scenario listing command.

use anyhow::Result;
use console::style;
use pairtest_core::ScenarioKind;

/// Print every scenario in run order.
pub fn run() -> Result<()> {
    println!("{}", style("Scenarios:").bold());
    for kind in ScenarioKind::ALL {
        println!("  {:<14} {}", style(kind.name()).cyan(), kind.description());
    }
    Ok(())
}
