//! E2E test harness for pairtest.
//!
//! Builders and knobs here are shared by all scenario files; not every one is
//! used by every test.

#![allow(dead_code)]

pub mod scenario;
pub mod workspace;

// Re-export commonly used types
pub use mock_service::{CloseStyle, MockService, ServiceBehavior, UnknownChannel};
pub use scenario::{fast_timing, Conformance};
pub use workspace::TestWorkspace;
