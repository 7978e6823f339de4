//! End-to-end tests: the harness driven against an in-process pairing service.

mod harness;
