use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{TABLE_SYNC__BEFORE_HASH, TABLE_SYNC__BEFORE_ROWS_APPLY, sync_fail_point};
use crate::protocol::{Channel, HashRequest, Request, Response};
use crate::schema::TableLayout;
use crate::store::TableStore;
use crate::sync::apply::RowApplier;
use crate::sync::config::SessionConfig;
use crate::sync::hashing::hash_range;
use crate::sync::unexpected_response;
use crate::types::{KeyRange, TableRow};

/// Commands issued and rows changed while reconciling one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableSyncStats {
    pub hash_commands: u64,
    pub rows_commands: u64,
    pub rows_changed: u64,
}

/// A range waiting to be compared by hash.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CheckRange {
    range: KeyRange,
    /// Known number of rows when hunting down a mismatch; `None` while scanning forward.
    estimated_rows: Option<u64>,
    rows_to_hash: u64,
}

impl CheckRange {
    fn scan_forward(range: KeyRange, rows_to_hash: u64) -> Self {
        Self {
            range,
            estimated_rows: None,
            rows_to_hash,
        }
    }

    fn hunt(range: KeyRange, estimated_rows: u64, rows_to_hash: u64) -> Self {
        Self {
            range,
            estimated_rows: Some(estimated_rows),
            rows_to_hash,
        }
    }
}

/// Converges one local table onto the source's copy of it.
///
/// Tables with a key are compared by hashing key ranges on both sides and only the rows of
/// mismatching ranges are fetched. Tables without a key are reloaded as a whole.
pub async fn sync_table<R, W, S>(
    channel: &mut Channel<R, W>,
    store: &S,
    layout: &TableLayout,
    session: &SessionConfig,
) -> SyncResult<TableSyncStats>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    S: TableStore,
{
    info!(table = %layout.name(), "starting table sync");

    let mut job = TableJob {
        channel,
        store,
        layout,
        session,
        ranges_to_retrieve: VecDeque::new(),
        ranges_to_check: VecDeque::new(),
        stats: TableSyncStats::default(),
    };

    if layout.is_keyed() {
        job.establish_range().await?;
        job.run_queues().await?;
    } else {
        job.reload_table().await?;
    }

    let stats = job.stats;
    info!(
        table = %layout.name(),
        hash_commands = stats.hash_commands,
        rows_commands = stats.rows_commands,
        rows_changed = stats.rows_changed,
        "table sync completed"
    );

    Ok(stats)
}

struct TableJob<'a, R, W, S> {
    channel: &'a mut Channel<R, W>,
    store: &'a S,
    layout: &'a TableLayout,
    session: &'a SessionConfig,
    ranges_to_retrieve: VecDeque<KeyRange>,
    ranges_to_check: VecDeque<CheckRange>,
    stats: TableSyncStats,
}

impl<R, W, S> TableJob<'_, R, W, S>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    S: TableStore,
{
    fn table(&self) -> &str {
        self.layout.name()
    }

    /// Asks the source for its key bounds, trims local rows outside them and seeds the queues.
    async fn establish_range(&mut self) -> SyncResult<()> {
        let request = Request::Range {
            table: self.table().to_string(),
        };
        self.channel.send_request(&request).await?;

        let (first_key, last_key) = match self.channel.recv_response().await? {
            Response::Range {
                table,
                first_key,
                last_key,
            } => {
                self.check_table_echo(&table)?;
                (first_key, last_key)
            }
            other => return Err(unexpected_response("RANGE", &other)),
        };
        debug!(table = %self.table(), %first_key, %last_key, "received source key range");

        if first_key.is_unbounded() != last_key.is_unbounded() || first_key > last_key {
            bail!(
                ErrorKind::ProtocolViolation,
                "The source reported an invalid key range",
                format!("table {}, first {first_key}, last {last_key}", self.table())
            );
        }

        if first_key.is_unbounded() {
            let deleted = self.store.delete_all(self.table()).await?;
            self.stats.rows_changed += deleted;
            debug!(table = %self.table(), deleted, "source table is empty");
            return Ok(());
        }

        let mut deleted = self.store.delete_below(self.table(), &first_key).await?;
        deleted += self
            .store
            .delete_range(self.table(), &KeyRange::after(last_key.clone()))
            .await?;
        self.stats.rows_changed += deleted;

        let our_last_key = self.store.last_key(self.table()).await?;
        if our_last_key != last_key {
            // Rows past our last key are new on the source; no point hashing them.
            self.ranges_to_retrieve
                .push_back(KeyRange::new(our_last_key.clone(), last_key));
        }
        if our_last_key.is_unbounded() {
            return Ok(());
        }

        let ours = KeyRange::up_to(our_last_key.clone());
        let our_row_count = self.store.count_rows(self.table(), &ours).await?;
        let split_key = if our_row_count >= 2 {
            self.store
                .nth_key(self.table(), &ours, our_row_count.div_ceil(2))
                .await?
        } else {
            None
        };

        match split_key {
            Some(split_key) if split_key != our_last_key => {
                self.ranges_to_check.push_back(CheckRange::scan_forward(
                    KeyRange::up_to(split_key.clone()),
                    1,
                ));
                self.ranges_to_check.push_back(CheckRange::scan_forward(
                    KeyRange::new(split_key, our_last_key),
                    1,
                ));
            }
            _ => {
                self.ranges_to_check
                    .push_back(CheckRange::scan_forward(ours, 1));
            }
        }

        Ok(())
    }

    /// Works through the queues, serving pending fetches before any further hashing.
    async fn run_queues(&mut self) -> SyncResult<()> {
        loop {
            if let Some(range) = self.ranges_to_retrieve.pop_front() {
                self.retrieve_range(range).await?;
            } else if let Some(check) = self.ranges_to_check.pop_front() {
                self.check_range(check).await?;
            } else {
                return Ok(());
            }
        }
    }

    async fn check_range(&mut self, check: CheckRange) -> SyncResult<()> {
        #[cfg(feature = "failpoints")]
        sync_fail_point(TABLE_SYNC__BEFORE_HASH)?;

        let request = HashRequest {
            table: self.table().to_string(),
            range: check.range.clone(),
            rows_to_hash: check.rows_to_hash,
        };
        self.channel
            .send_request(&Request::Hash(request.clone()))
            .await?;
        self.stats.hash_commands += 1;

        let ours = hash_range(
            self.store,
            self.layout,
            &check.range,
            check.rows_to_hash,
            self.session.hash_algorithm,
            self.session.max_rows_to_select,
        )
        .await?;

        let theirs = match self.channel.recv_response().await? {
            Response::Hash(response) if response.request == request => response,
            Response::Hash(response) => bail!(
                ErrorKind::ProtocolViolation,
                "HASH response does not match the request",
                format!("sent {request:?}, received {:?}", response.request)
            ),
            other => return Err(unexpected_response("HASH", &other)),
        };
        if theirs.row_count > check.rows_to_hash {
            bail!(
                ErrorKind::ProtocolViolation,
                "The source hashed more rows than requested",
                format!(
                    "requested {}, hashed {}",
                    check.rows_to_hash, theirs.row_count
                )
            );
        }

        debug!(
            table = %self.table(),
            range = %check.range,
            rows_to_hash = check.rows_to_hash,
            our_rows = ours.row_count,
            their_rows = theirs.row_count,
            "compared range hashes"
        );

        if theirs.row_count == 0 {
            let deleted = self.store.delete_range(self.table(), &check.range).await?;
            self.stats.rows_changed += deleted;
            return Ok(());
        }

        let matched = ours.row_count == theirs.row_count && ours.digest == theirs.digest;

        // Fewer rows than asked for means we hashed through to the end of the range.
        let hashed_to = if ours.row_count < check.rows_to_hash {
            check.range.last_key.clone()
        } else {
            ours.last_key.clone()
        };

        if hashed_to != check.range.last_key {
            let rest = KeyRange::new(hashed_to.clone(), check.range.last_key.clone());
            match check.estimated_rows {
                None => {
                    let rows_to_hash =
                        self.rows_to_scan_forward_next(matched, ours.row_count, ours.size);
                    self.ranges_to_check
                        .push_back(CheckRange::scan_forward(rest, rows_to_hash));
                }
                Some(estimated_rows) => {
                    let remaining = estimated_rows.saturating_sub(ours.row_count).max(1);
                    self.ranges_to_check
                        .push_front(CheckRange::hunt(rest, remaining, remaining));
                }
            }
        }

        if !matched {
            let prefix = KeyRange::new(check.range.prev_key, hashed_to);
            if ours.row_count > 1
                && theirs.row_count > 1
                && ours.size > self.session.min_block_size
            {
                let rows_to_hash = halve(theirs.row_count.min(ours.row_count));
                self.ranges_to_check
                    .push_front(CheckRange::hunt(prefix, ours.row_count, rows_to_hash));
            } else {
                self.ranges_to_retrieve.push_back(prefix);
            }
        }

        Ok(())
    }

    /// Next row limit for a range scanning forward, aiming at the configured block sizes.
    fn rows_to_scan_forward_next(&self, matched: bool, row_count: u64, size: u64) -> u64 {
        let min_block_size = self.session.min_block_size;
        let max_block_size = self.session.max_block_size;

        if size == 0 {
            return 1;
        }

        let next = if matched {
            if size <= max_block_size / 2 {
                row_count.saturating_mul(2)
            } else {
                row_count.saturating_mul(max_block_size) / size
            }
        } else if size >= min_block_size.saturating_mul(2) {
            row_count / 2
        } else {
            row_count.saturating_mul(min_block_size) / size
        };

        next.max(1)
    }

    async fn retrieve_range(&mut self, range: KeyRange) -> SyncResult<()> {
        #[cfg(feature = "failpoints")]
        sync_fail_point(TABLE_SYNC__BEFORE_ROWS_APPLY)?;

        self.send_rows_request(&range).await?;

        let mut applier = RowApplier::new(
            self.store,
            self.layout,
            range,
            self.session.max_buffered_bytes,
            self.session.max_rows_to_select,
        );
        while let Some(values) = self.channel.recv_row().await? {
            let row = TableRow::from_wire(
                values,
                self.layout.is_counted(),
                self.layout.column_count(),
            )?;
            applier.receive(row).await?;
        }

        let applied = applier.finish().await?;
        self.stats.rows_changed += applied.rows_changed();

        Ok(())
    }

    /// Replaces every local row of a table without a key by the source's rows.
    async fn reload_table(&mut self) -> SyncResult<()> {
        #[cfg(feature = "failpoints")]
        sync_fail_point(TABLE_SYNC__BEFORE_ROWS_APPLY)?;

        self.send_rows_request(&KeyRange::all()).await?;

        let deleted = self.store.delete_all(self.table()).await?;
        let mut inserted = 0;
        while let Some(values) = self.channel.recv_row().await? {
            let row = TableRow::from_wire(values, false, self.layout.column_count())?;
            self.store.insert_row(self.table(), row).await?;
            inserted += 1;
        }

        debug!(table = %self.table(), deleted, inserted, "reloaded table without a key");
        self.stats.rows_changed += deleted + inserted;

        Ok(())
    }

    async fn send_rows_request(&mut self, range: &KeyRange) -> SyncResult<()> {
        let request = Request::Rows {
            table: self.table().to_string(),
            range: range.clone(),
        };
        self.channel.send_request(&request).await?;
        self.stats.rows_commands += 1;

        match self.channel.recv_response().await? {
            Response::Rows {
                table,
                range: echoed,
            } if table == self.table() && &echoed == range => {
                debug!(table = %self.table(), %range, "receiving rows");
                Ok(())
            }
            Response::Rows { table, range: echoed } => bail!(
                ErrorKind::ProtocolViolation,
                "ROWS response does not match the request",
                format!(
                    "sent {} {range}, received {table} {echoed}",
                    self.table()
                )
            ),
            other => Err(unexpected_response("ROWS", &other)),
        }
    }

    fn check_table_echo(&self, table: &str) -> SyncResult<()> {
        if table != self.table() {
            bail!(
                ErrorKind::ProtocolViolation,
                "Response names a different table",
                format!("expected {}, received {table}", self.table())
            );
        }

        Ok(())
    }
}

/// Row limit for re-hashing the first half of a mismatching range of `row_count` rows.
fn halve(row_count: u64) -> u64 {
    if row_count > 3 { row_count / 2 } else { 1 }
}
