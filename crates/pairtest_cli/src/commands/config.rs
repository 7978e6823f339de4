//! Configuration inspection command.

use anyhow::Result;
use pairtest_core::Config;

/// Print the resolved harness options as TOML.
pub fn show_toml() -> Result<()> {
    let config = Config::resolve();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Print the environment the service would be launched with.
pub fn show_env() -> Result<()> {
    let config = Config::resolve();
    for (key, value) in config.as_launch_env() {
        println!("{key}={value}");
    }
    Ok(())
}
