//! Helpers shared by the integration test suites.
//!
//! [`schema`] holds canned tables for every kind of effective key, [`peer`] runs a source endpoint
//! (real or scripted) over an in-memory pipe.

#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod peer;
pub mod schema;
