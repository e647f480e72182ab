//! Logging setup shared by the reconciliation binaries and test suites.

pub mod tracing;
