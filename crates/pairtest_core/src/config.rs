//! Harness configuration resolved from defaults and the environment.
//!
//! Options are read from `TEST_`-prefixed environment variables and handed to
//! the service under test as `PAIR_`-prefixed variables, so the harness's own
//! settings never collide with the child's configuration namespace.

use crate::error::{HarnessError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Prefix of environment variables that configure the harness.
pub const HARNESS_PREFIX: &str = "TEST_";

/// Prefix of environment variables passed to the service under test.
pub const LAUNCH_PREFIX: &str = "PAIR_";

/// Option names the harness recognizes, in rendering order.
pub const OPTION_NAMES: &[&str] = &[
    "port",
    "protocol",
    "app_path",
    "host",
    "max_exchanges",
    "max_data",
    "mmdb_loc",
    "timeout",
];

/// Scenario-specific launch overrides, keyed by option name.
pub type Overrides = BTreeMap<String, String>;

/// Resolved harness options.
///
/// Numeric options are kept as the raw strings they were configured with and
/// validated when a consumer asks for the typed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Port the service listens on.
    pub port: String,

    /// Transport scheme (`ws`).
    pub protocol: String,

    /// Shell command that launches the service. Empty means the service is
    /// already running and must not be launched.
    pub app_path: String,

    /// Host the service listens on.
    pub host: String,

    /// Exchange ceiling the service enforces per channel.
    pub max_exchanges: String,

    /// Byte ceiling the service enforces per channel.
    pub max_data: String,

    /// Geolocation database path, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mmdb_loc: Option<String>,

    /// Channel lifetime in seconds, if the harness should set one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: "8000".to_string(),
            protocol: "ws".to_string(),
            app_path: "../target/debug/channelserver".to_string(),
            host: "localhost".to_string(),
            max_exchanges: "5".to_string(),
            max_data: "3096".to_string(),
            mmdb_loc: Some("../mmdb/latest/GeoLite2-City.mmdb".to_string()),
            timeout: None,
        }
    }
}

impl Config {
    /// Resolve configuration from defaults and the process environment.
    pub fn resolve() -> Self {
        Self::from_vars(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Resolve configuration from defaults and the given variables.
    ///
    /// Keys without the `TEST_` prefix, and prefixed keys that do not name a
    /// known option, are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(HARNESS_PREFIX) else {
                continue;
            };
            let name = name.to_ascii_lowercase();
            if config.set(&name, value.into()).is_err() {
                debug!(key = key.as_ref(), "ignoring unrecognized harness variable");
            }
        }
        config
    }

    /// Return a copy with the given overrides applied.
    ///
    /// # Errors
    ///
    /// Returns `UnknownOption` if an override does not name a known option.
    pub fn with_overrides(&self, overrides: &Overrides) -> Result<Self> {
        let mut config = self.clone();
        for (name, value) in overrides {
            config.set(&name.to_ascii_lowercase(), value.clone())?;
        }
        Ok(config)
    }

    fn set(&mut self, name: &str, value: String) -> Result<()> {
        match name {
            "port" => self.port = value,
            "protocol" => self.protocol = value,
            "app_path" => self.app_path = value,
            "host" => self.host = value,
            "max_exchanges" => self.max_exchanges = value,
            "max_data" => self.max_data = value,
            "mmdb_loc" => self.mmdb_loc = non_empty(value),
            "timeout" => self.timeout = non_empty(value),
            _ => return Err(HarnessError::UnknownOption(name.to_string())),
        }
        Ok(())
    }

    /// Look up an option's current value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "port" => Some(&self.port),
            "protocol" => Some(&self.protocol),
            "app_path" => Some(&self.app_path),
            "host" => Some(&self.host),
            "max_exchanges" => Some(&self.max_exchanges),
            "max_data" => Some(&self.max_data),
            "mmdb_loc" => self.mmdb_loc.as_deref(),
            "timeout" => self.timeout.as_deref(),
            _ => None,
        }
    }

    /// Environment for the service under test.
    ///
    /// Every set option except `app_path` is rendered as `PAIR_<OPTION>`.
    pub fn as_launch_env(&self) -> BTreeMap<String, String> {
        OPTION_NAMES
            .iter()
            .filter(|name| **name != "app_path")
            .filter_map(|name| Some((launch_var(name), self.get(name)?.to_string())))
            .collect()
    }

    /// Base URL of the service, `scheme://host:port`.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// Whether the harness should launch the service itself.
    pub fn launches_service(&self) -> bool {
        !self.app_path.trim().is_empty()
    }

    /// Port as a number.
    pub fn port(&self) -> Result<u16> {
        self.port
            .trim()
            .parse()
            .map_err(|e| invalid("port", &self.port, e))
    }

    /// Exchange ceiling as a positive number.
    pub fn max_exchanges(&self) -> Result<u32> {
        positive("max_exchanges", &self.max_exchanges)
    }

    /// Byte ceiling as a positive number.
    pub fn max_data(&self) -> Result<usize> {
        positive("max_data", &self.max_data)
    }

    /// Channel lifetime, if configured.
    pub fn timeout(&self) -> Result<Option<Duration>> {
        self.timeout
            .as_deref()
            .map(|raw| positive::<u64>("timeout", raw).map(Duration::from_secs))
            .transpose()
    }
}

/// Name of the launch variable for an option (`max_data` → `PAIR_MAX_DATA`).
pub fn launch_var(name: &str) -> String {
    format!("{}{}", LAUNCH_PREFIX, name.to_ascii_uppercase())
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn positive<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value: T = raw.trim().parse().map_err(|e| invalid(name, raw, e))?;
    if value <= T::default() {
        return Err(HarnessError::InvalidOption {
            name: name.to_string(),
            value: raw.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn invalid(name: &str, raw: &str, err: impl std::fmt::Display) -> HarnessError {
    HarnessError::InvalidOption {
        name: name.to_string(),
        value: raw.to_string(),
        reason: err.to_string(),
    }
}
