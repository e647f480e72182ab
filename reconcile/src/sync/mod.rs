//! Both endpoints of a reconciliation session.
//!
//! [`SyncToSession`] runs on the destination and drives the exchange; [`SyncFromSession`] runs on
//! the source and answers it.

mod apply;
mod config;
mod from;
mod handshake;
mod hashing;
mod table_sync;
mod to;

pub use apply::{ApplyStats, RowApplier};
pub use config::SessionConfig;
pub use from::SyncFromSession;
pub use handshake::{accept_protocol_version, negotiate};
pub use hashing::{RangeHash, hash_range};
pub use table_sync::{TableSyncStats, sync_table};
pub use to::{SyncReport, SyncToSession, TableReport};

use crate::error::{ErrorKind, SyncError};
use crate::protocol::Response;
use crate::sync_error;

fn unexpected_response(expected: &str, received: &Response) -> SyncError {
    sync_error!(
        ErrorKind::UnexpectedCommand,
        "Received an unexpected response",
        format!("expected {expected}, received {}", received.verb())
    )
}
