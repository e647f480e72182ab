use std::future::Future;

use crate::error::SyncResult;
use crate::schema::DatabaseSchema;
use crate::types::{Key, KeyRange, TableRow, Value};

/// Local table data seen by either endpoint of a reconciliation session.
///
/// [`TableStore`] implementations address rows by the effective key of each table, as computed by
/// [`crate::schema::TableLayout`]. Keys passed in and out are in effective key column order and
/// row values are in replicated column order. Every read returns rows in ascending key order.
///
/// Tables keyed by a non-unique index report collapsed [`TableRow::WithCount`] rows. Tables
/// without any usable key ignore key ranges on reads and return their rows in storage order.
///
/// Transaction control belongs to the implementation; the reconciliation core only issues the
/// operations below, one at a time per table.
pub trait TableStore {
    /// Returns the schema of every table in the store, in a stable order.
    fn schema(&self) -> impl Future<Output = SyncResult<DatabaseSchema>> + Send;

    /// Returns the lowest key of the table, or the unbounded key if the table is empty.
    fn first_key(&self, table: &str) -> impl Future<Output = SyncResult<Key>> + Send;

    /// Returns the highest key of the table, or the unbounded key if the table is empty.
    fn last_key(&self, table: &str) -> impl Future<Output = SyncResult<Key>> + Send;

    /// Counts the logical rows inside `range`.
    fn count_rows(
        &self,
        table: &str,
        range: &KeyRange,
    ) -> impl Future<Output = SyncResult<u64>> + Send;

    /// Returns the key of the `n`-th logical row (1-based) inside `range`, if there are that many.
    fn nth_key(
        &self,
        table: &str,
        range: &KeyRange,
        n: u64,
    ) -> impl Future<Output = SyncResult<Option<Key>>> + Send;

    /// Reads at most `limit` logical rows inside `range`.
    fn fetch_rows(
        &self,
        table: &str,
        range: &KeyRange,
        limit: usize,
    ) -> impl Future<Output = SyncResult<Vec<TableRow>>> + Send;

    /// Returns the keys of the rows holding `values` in the given row positions.
    fn keys_holding(
        &self,
        table: &str,
        columns: &[usize],
        values: &[Value],
    ) -> impl Future<Output = SyncResult<Vec<Key>>> + Send;

    /// Inserts a row that must not exist yet. Counted rows insert as many copies as their count.
    fn insert_row(&self, table: &str, row: TableRow) -> impl Future<Output = SyncResult<()>> + Send;

    /// Replaces the row holding the key of `values`, or inserts it.
    fn upsert_row(
        &self,
        table: &str,
        values: Vec<Value>,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Deletes every copy of the row with `key`.
    fn delete_row(&self, table: &str, key: &Key) -> impl Future<Output = SyncResult<()>> + Send;

    /// Deletes up to `copies` physical copies of the row with `key`.
    fn delete_copies(
        &self,
        table: &str,
        key: &Key,
        copies: u64,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Deletes every row whose key is strictly below `key`, returning the number of physical rows
    /// removed.
    fn delete_below(&self, table: &str, key: &Key) -> impl Future<Output = SyncResult<u64>> + Send;

    /// Deletes every row inside `range`, returning the number of physical rows removed.
    fn delete_range(
        &self,
        table: &str,
        range: &KeyRange,
    ) -> impl Future<Output = SyncResult<u64>> + Send;

    /// Deletes every row of the table, returning the number of physical rows removed.
    fn delete_all(&self, table: &str) -> impl Future<Output = SyncResult<u64>> + Send;
}
