use std::collections::BTreeMap;
use std::mem;

use tracing::{debug, trace};

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::schema::TableLayout;
use crate::store::{RowScanner, TableStore};
use crate::types::{Key, KeyRange, TableRow, Value};

/// Row-level changes written to the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub rows_inserted: u64,
    pub rows_updated: u64,
    pub rows_deleted: u64,
}

impl ApplyStats {
    pub fn rows_changed(&self) -> u64 {
        self.rows_inserted + self.rows_updated + self.rows_deleted
    }

    fn add(&mut self, other: ApplyStats) {
        self.rows_inserted += other.rows_inserted;
        self.rows_updated += other.rows_updated;
        self.rows_deleted += other.rows_deleted;
    }
}

/// Writes still needed after the deletes of a segment have been applied.
#[derive(Debug, Default)]
struct PendingWrites {
    rows: Vec<TableRow>,
    updates: u64,
    deleted: u64,
}

/// Replaces the destination's rows in a key range with the rows of a ROWS response.
///
/// Rows are buffered by key as they arrive. Whenever the buffer grows past `max_buffered_bytes`
/// the received prefix of the range is reconciled against local data, so memory stays bounded
/// however many rows the response carries.
///
/// Within a segment, deletes are applied batch by batch while local rows are scanned, and the
/// remaining writes follow in key order.
/// Before each write, rows under a different key that still hold one of the row's unique values
/// are deleted; such a row is either absent from the source or will be fetched again when its own
/// range is compared.
pub struct RowApplier<'a, S> {
    store: &'a S,
    layout: &'a TableLayout,
    range: KeyRange,
    /// Everything up to and including this key has been applied.
    applied_to: Key,
    last_received: Option<Key>,
    buffer: BTreeMap<Key, TableRow>,
    buffered_bytes: usize,
    max_buffered_bytes: usize,
    max_rows_to_select: usize,
    stats: ApplyStats,
}

impl<'a, S> RowApplier<'a, S>
where
    S: TableStore,
{
    pub fn new(
        store: &'a S,
        layout: &'a TableLayout,
        range: KeyRange,
        max_buffered_bytes: usize,
        max_rows_to_select: usize,
    ) -> Self {
        Self {
            store,
            layout,
            applied_to: range.prev_key.clone(),
            range,
            last_received: None,
            buffer: BTreeMap::new(),
            buffered_bytes: 0,
            max_buffered_bytes,
            max_rows_to_select,
            stats: ApplyStats::default(),
        }
    }

    /// Buffers one received row.
    ///
    /// Rows must arrive in strictly ascending key order and fall inside the requested range.
    pub async fn receive(&mut self, row: TableRow) -> SyncResult<()> {
        let key = self.layout.key_of(row.values());

        if !self.range.contains(&key) {
            bail!(
                ErrorKind::ProtocolViolation,
                "Received a row outside of the requested range",
                format!("table {}, key {key}, range {}", self.layout.name(), self.range)
            );
        }
        if let Some(previous) = &self.last_received
            && &key <= previous
        {
            bail!(
                ErrorKind::ProtocolViolation,
                "Received rows out of key order",
                format!(
                    "table {}, key {key} after {previous}",
                    self.layout.name()
                )
            );
        }

        self.buffered_bytes += row.payload_len();
        self.last_received = Some(key.clone());
        self.buffer.insert(key.clone(), row);

        if self.buffered_bytes > self.max_buffered_bytes {
            let segment = KeyRange::new(self.applied_to.clone(), key.clone());
            self.apply_segment(segment).await?;
            self.applied_to = key;
        }

        Ok(())
    }

    /// Applies whatever is still buffered and clears the rest of the range.
    pub async fn finish(mut self) -> SyncResult<ApplyStats> {
        let segment = KeyRange::new(self.applied_to.clone(), self.range.last_key.clone());
        self.apply_segment(segment).await?;

        Ok(self.stats)
    }

    async fn apply_segment(&mut self, segment: KeyRange) -> SyncResult<()> {
        let incoming = mem::take(&mut self.buffer);
        self.buffered_bytes = 0;

        trace!(
            table = %self.layout.name(),
            %segment,
            rows = incoming.len(),
            "applying received rows"
        );

        let pending = self.delete_stale_rows(&segment, incoming).await?;
        let stats = self.write_rows(pending).await?;

        debug!(
            table = %self.layout.name(),
            %segment,
            inserted = stats.rows_inserted,
            updated = stats.rows_updated,
            deleted = stats.rows_deleted,
            "applied segment"
        );
        self.stats.add(stats);

        Ok(())
    }

    /// Scans the local rows of `segment` in batches, deleting rows and surplus copies the source
    /// no longer has as each batch is read. Returns the rows left to write, in key order.
    async fn delete_stale_rows(
        &self,
        segment: &KeyRange,
        mut incoming: BTreeMap<Key, TableRow>,
    ) -> SyncResult<PendingWrites> {
        let table = self.layout.name();
        let mut pending = PendingWrites::default();
        let mut scanner = RowScanner::new(self.store, self.layout, segment.clone());

        while let Some(local_rows) = scanner.next_batch(self.max_rows_to_select).await? {
            let mut deletes = Vec::new();
            let mut copy_deletes = Vec::new();

            for local in local_rows {
                let key = self.layout.key_of(local.values());
                let Some(remote) = incoming.remove(&key) else {
                    deletes.push((key, local.count()));
                    continue;
                };

                if self.layout.is_counted() {
                    let (held, count) = (local.count(), remote.count());
                    if count > held {
                        pending.rows.push(TableRow::WithCount {
                            values: remote.into_values(),
                            count: count - held,
                        });
                    } else if count < held {
                        copy_deletes.push((key, held - count));
                    }
                } else if local.values() != remote.values() {
                    pending.updates += 1;
                    pending.rows.push(remote);
                }
            }

            for (key, copies) in deletes {
                self.store.delete_row(table, &key).await?;
                pending.deleted += copies;
            }
            for (key, copies) in copy_deletes {
                self.store.delete_copies(table, &key, copies).await?;
                pending.deleted += copies;
            }
        }

        // What is left was not found locally.
        pending.rows.extend(incoming.into_values());
        pending
            .rows
            .sort_by_cached_key(|row| self.layout.key_of(row.values()));

        Ok(pending)
    }

    async fn write_rows(&self, pending: PendingWrites) -> SyncResult<ApplyStats> {
        let table = self.layout.name();
        let mut stats = ApplyStats {
            rows_deleted: pending.deleted,
            ..ApplyStats::default()
        };
        let mut plain_writes = 0;

        for row in pending.rows {
            let key = self.layout.key_of(row.values());
            stats.rows_deleted += self.clear_unique_holders(&key, row.values()).await?;

            match row {
                TableRow::WithCount { .. } => {
                    stats.rows_inserted += row.count();
                    self.store.insert_row(table, row).await?;
                }
                TableRow::Plain(values) => {
                    self.store.upsert_row(table, values).await?;
                    plain_writes += 1;
                }
            }
        }

        stats.rows_updated = pending.updates;
        stats.rows_inserted += plain_writes - pending.updates;

        Ok(stats)
    }

    /// Deletes rows under other keys that hold one of `values`' unique index values.
    async fn clear_unique_holders(&self, key: &Key, values: &[Value]) -> SyncResult<u64> {
        let mut deleted = 0;

        for columns in self.layout.unique_constraints() {
            let held: Vec<Value> = columns
                .iter()
                .filter_map(|column| values.get(*column).cloned())
                .collect();
            if held.len() != columns.len() || held.iter().any(Value::is_null) {
                continue;
            }

            let holders = self
                .store
                .keys_holding(self.layout.name(), columns, &held)
                .await?;
            for holder in holders.iter().filter(|holder| *holder != key) {
                trace!(
                    table = %self.layout.name(),
                    %holder,
                    %key,
                    "deleting row holding a unique value"
                );
                self.store.delete_row(self.layout.name(), holder).await?;
                deleted += 1;
            }
        }

        Ok(deleted)
    }
}
