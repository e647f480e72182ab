use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};

pub const TABLE_SYNC__BEFORE_HASH: &str = "table_sync.before_hash";
pub const TABLE_SYNC__BEFORE_ROWS_APPLY: &str = "table_sync.before_rows_apply";

/// Fails with [`ErrorKind::WithFailpoint`] when the named fail point is configured to return.
pub fn sync_fail_point(name: &str) -> SyncResult<()> {
    fail_point!(name, |_| {
        bail!(
            ErrorKind::WithFailpoint,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
