//! Pairtest Core Library
//!
//! A black-box conformance harness for two-party WebSocket pairing services,
//! providing:
//! - Configuration resolved from `TEST_*` environment variables
//! - Supervision of the service under test (launch, health check, teardown)
//! - A blocking client for one side of a paired channel
//! - Scenarios covering relay, resource limits and channel isolation
//!
//! # Quick Start
//!
//! ```no_run
//! use pairtest_core::{Config, Harness, ScenarioKind};
//!
//! let config = Config::resolve();
//! let summary = Harness::new(config)
//!     .run(&ScenarioKind::ALL, &mut ())
//!     .unwrap();
//! println!("{} scenarios passed", summary.passed.len());
//! ```
//!
//! # Pairing a connection by hand
//!
//! ```no_run
//! use pairtest_core::{PairedConnection, Received};
//!
//! let mut initiator = PairedConnection::connect("ws://localhost:8000/v1/ws/").unwrap();
//! let url = format!("ws://localhost:8000{}", initiator.link());
//! let mut peer = PairedConnection::connect(&url).unwrap();
//!
//! initiator.send("hello").unwrap();
//! if let Received::Message(frame) = peer.receive().unwrap() {
//!     println!("relayed: {frame}");
//! }
//! ```

mod config;
mod connection;
mod error;
mod frame;
mod harness;
mod scenario;
mod supervisor;

pub mod payload;

pub use config::{launch_var, Config, Overrides, HARNESS_PREFIX, LAUNCH_PREFIX, OPTION_NAMES};
pub use connection::{PairedConnection, Received};
pub use error::{HarnessError, Result};
pub use frame::{link_tail, Handshake, RelayFrame};
pub use harness::{Harness, RunObserver, RunSummary, ScenarioOutcome};
pub use scenario::{ScenarioKind, ScenarioRunner, ScenarioTiming, INITIATE_PATH};
pub use supervisor::{
    descendant_pids, launch_env, Supervisor, DEFAULT_REAP_TIMEOUT, DEFAULT_STARTUP_GRACE,
};
#[cfg(unix)]
pub use supervisor::process_is_running;
