//! Pairtest CLI - conformance tests for WebSocket pairing services.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(name = "pairtest")]
#[command(about = "Conformance tests for two-party WebSocket pairing services", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the service and run scenarios against it
    Run {
        /// Scenario to run (repeatable; all scenarios if omitted)
        #[arg(short, long = "scenario")]
        scenarios: Vec<String>,
        /// Override an option for this run (key=value, repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
        /// Pause after an oversize payload, in milliseconds
        #[arg(long, default_value = "500")]
        settle_ms: u64,
        /// Pause between messages in the lifetime scenario, in milliseconds
        #[arg(long, default_value = "2000")]
        period_interval_ms: u64,
        /// Exchanges after which the lifetime scenario fails
        #[arg(long, default_value = "15")]
        period_max_iterations: u32,
        /// How long to wait for a close that must be immediate, in milliseconds
        #[arg(long, default_value = "2000")]
        close_grace_ms: u64,
        /// How long the service must survive after launch, in milliseconds
        #[arg(long, default_value = "250")]
        startup_grace_ms: u64,
    },
    /// List available scenarios
    List,
    /// Show the resolved configuration
    Config {
        /// Output format
        #[arg(long, value_enum, default_value_t = ConfigFormat::Toml)]
        format: ConfigFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ConfigFormat {
    /// Harness options as TOML
    Toml,
    /// Environment handed to the service
    Env,
}

fn main() -> Result<()> {
    // Respects RUST_LOG (e.g. RUST_LOG=pairtest_core=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenarios,
            overrides,
            settle_ms,
            period_interval_ms,
            period_max_iterations,
            close_grace_ms,
            startup_grace_ms,
        } => commands::run::run(commands::run::RunArgs {
            scenarios,
            overrides,
            settle_ms,
            period_interval_ms,
            period_max_iterations,
            close_grace_ms,
            startup_grace_ms,
        }),
        Commands::List => commands::list::run(),
        Commands::Config { format } => match format {
            ConfigFormat::Toml => commands::config::show_toml(),
            ConfigFormat::Env => commands::config::show_env(),
        },
    }
}
