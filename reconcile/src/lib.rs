//! Table reconciliation over a command protocol.
//!
//! A destination ("to") endpoint converges one or more of its tables onto the contents of a
//! source ("from") endpoint by exchanging range hashes and fetching only the rows whose hashes
//! disagree. [`sync::SyncToSession`] drives the exchange and [`sync::SyncFromSession`] answers it;
//! both operate on a [`store::TableStore`] and speak the framed protocol in [`protocol`].

pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod hash;
mod macros;
pub mod protocol;
pub mod schema;
pub mod store;
pub mod sync;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod types;
