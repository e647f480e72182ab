use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::schema::{DatabaseSchema, TableLayout};
use crate::store::base::TableStore;
use crate::sync_error;
use crate::types::{Key, KeyRange, TableRow, Value};

/// Rows of one table.
#[derive(Debug)]
struct TableData {
    layout: TableLayout,
    /// Physical rows grouped by effective key. Only duplicate-count tables hold more than one
    /// copy per key.
    keyed: BTreeMap<Key, Vec<Vec<Value>>>,
    /// Rows of tables without a usable key, in insertion order.
    unkeyed: Vec<Vec<Value>>,
}

impl TableData {
    fn new(layout: TableLayout) -> Self {
        Self {
            layout,
            keyed: BTreeMap::new(),
            unkeyed: Vec::new(),
        }
    }

    fn entries<'a>(
        &'a self,
        range: &KeyRange,
    ) -> impl Iterator<Item = (&'a Key, &'a Vec<Vec<Value>>)> + 'a {
        (!range.is_empty())
            .then(|| self.keyed.range(range_bounds(range)))
            .into_iter()
            .flatten()
    }

    fn logical_row(&self, copies: &[Vec<Value>]) -> Option<TableRow> {
        let values = copies.first()?.clone();
        if self.layout.is_counted() {
            return Some(TableRow::WithCount {
                values,
                count: copies.len() as u64,
            });
        }

        Some(TableRow::Plain(values))
    }

    fn check_width(&self, values: &[Value]) -> SyncResult<()> {
        if values.len() != self.layout.column_count() {
            bail!(
                ErrorKind::StoreError,
                "Row has the wrong number of columns",
                format!(
                    "table {} has {} replicated columns, row has {}",
                    self.layout.name(),
                    self.layout.column_count(),
                    values.len()
                )
            );
        }

        Ok(())
    }

    /// Rejects `values` if another row already holds the same non-null values in a unique index.
    fn check_unique(&self, key: &Key, values: &[Value]) -> SyncResult<()> {
        for columns in self.layout.unique_constraints() {
            let held: Vec<&Value> = columns.iter().filter_map(|c| values.get(*c)).collect();
            if held.iter().any(|value| value.is_null()) {
                continue;
            }

            let collides = |row: &Vec<Value>| {
                columns
                    .iter()
                    .zip(&held)
                    .all(|(column, value)| row.get(*column) == Some(*value))
            };

            let keyed_collision = self
                .keyed
                .iter()
                .any(|(other, copies)| other != key && copies.iter().any(collides));
            let unkeyed_collision = self.unkeyed.iter().any(collides);

            if keyed_collision || unkeyed_collision {
                bail!(
                    ErrorKind::UniqueViolation,
                    "Row would violate a unique index",
                    format!(
                        "table {}, columns {:?}, key {key}",
                        self.layout.name(),
                        columns
                            .iter()
                            .filter_map(|c| self.layout.column_names().get(*c))
                            .collect::<Vec<_>>()
                    )
                );
            }
        }

        Ok(())
    }

    fn remove_range(&mut self, range: &KeyRange) -> u64 {
        if !self.layout.is_keyed() {
            let removed = self.unkeyed.len() as u64;
            self.unkeyed.clear();
            return removed;
        }

        let keys: Vec<Key> = self.entries(range).map(|(key, _)| key.clone()).collect();
        keys.iter()
            .filter_map(|key| self.keyed.remove(key))
            .map(|copies| copies.len() as u64)
            .sum()
    }
}

fn range_bounds(range: &KeyRange) -> (Bound<Key>, Bound<Key>) {
    let lower = if range.prev_key.is_unbounded() {
        Bound::Unbounded
    } else {
        Bound::Excluded(range.prev_key.clone())
    };
    let upper = if range.last_key.is_unbounded() {
        Bound::Unbounded
    } else {
        Bound::Included(range.last_key.clone())
    };

    (lower, upper)
}

/// Inner state of [`MemoryStore`].
#[derive(Debug)]
struct Inner {
    schema: DatabaseSchema,
    tables: HashMap<String, TableData>,
}

impl Inner {
    fn table(&self, name: &str) -> SyncResult<&TableData> {
        self.tables.get(name).ok_or_else(|| missing_table(name))
    }

    fn table_mut(&mut self, name: &str) -> SyncResult<&mut TableData> {
        self.tables.get_mut(name).ok_or_else(|| missing_table(name))
    }
}

fn missing_table(name: &str) -> SyncError {
    sync_error!(
        ErrorKind::MissingTable,
        "Table does not exist in the store",
        name.to_string()
    )
}

/// In-memory [`TableStore`] over ordered maps.
///
/// Declared unique indexes are enforced on every write, so an apply order that would transiently
/// hold the same unique value twice fails with [`ErrorKind::UniqueViolation`] just like a real
/// database would.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Creates an empty store holding the tables of `schema`.
    pub fn new(schema: DatabaseSchema) -> Self {
        let tables = schema
            .tables
            .iter()
            .map(|table| {
                (
                    table.name.clone(),
                    TableData::new(TableLayout::from_schema(table)),
                )
            })
            .collect();

        Self {
            inner: Arc::new(Mutex::new(Inner { schema, tables })),
        }
    }

    /// Inserts physical rows. Rows of duplicate-count tables may repeat.
    pub async fn insert_values(&self, table: &str, rows: Vec<Vec<Value>>) -> SyncResult<()> {
        for values in rows {
            self.insert_row(table, TableRow::Plain(values)).await?;
        }

        Ok(())
    }

    /// Returns every physical row of the table, in key order.
    pub async fn rows(&self, table: &str) -> SyncResult<Vec<Vec<Value>>> {
        let inner = self.inner.lock().await;
        let data = inner.table(table)?;

        if !data.layout.is_keyed() {
            return Ok(data.unkeyed.clone());
        }

        Ok(data.keyed.values().flatten().cloned().collect())
    }
}

impl TableStore for MemoryStore {
    async fn schema(&self) -> SyncResult<DatabaseSchema> {
        let inner = self.inner.lock().await;

        Ok(inner.schema.clone())
    }

    async fn first_key(&self, table: &str) -> SyncResult<Key> {
        let inner = self.inner.lock().await;
        let data = inner.table(table)?;

        Ok(data
            .keyed
            .first_key_value()
            .map(|(key, _)| key.clone())
            .unwrap_or_default())
    }

    async fn last_key(&self, table: &str) -> SyncResult<Key> {
        let inner = self.inner.lock().await;
        let data = inner.table(table)?;

        Ok(data
            .keyed
            .last_key_value()
            .map(|(key, _)| key.clone())
            .unwrap_or_default())
    }

    async fn count_rows(&self, table: &str, range: &KeyRange) -> SyncResult<u64> {
        let inner = self.inner.lock().await;
        let data = inner.table(table)?;

        if !data.layout.is_keyed() {
            return Ok(data.unkeyed.len() as u64);
        }

        Ok(data.entries(range).count() as u64)
    }

    async fn nth_key(&self, table: &str, range: &KeyRange, n: u64) -> SyncResult<Option<Key>> {
        let inner = self.inner.lock().await;
        let data = inner.table(table)?;

        let Some(skip) = n.checked_sub(1) else {
            return Ok(None);
        };

        Ok(data
            .entries(range)
            .nth(skip as usize)
            .map(|(key, _)| key.clone()))
    }

    async fn fetch_rows(
        &self,
        table: &str,
        range: &KeyRange,
        limit: usize,
    ) -> SyncResult<Vec<TableRow>> {
        let inner = self.inner.lock().await;
        let data = inner.table(table)?;

        if !data.layout.is_keyed() {
            return Ok(data
                .unkeyed
                .iter()
                .take(limit)
                .cloned()
                .map(TableRow::Plain)
                .collect());
        }

        Ok(data
            .entries(range)
            .take(limit)
            .filter_map(|(_, copies)| data.logical_row(copies))
            .collect())
    }

    async fn keys_holding(
        &self,
        table: &str,
        columns: &[usize],
        values: &[Value],
    ) -> SyncResult<Vec<Key>> {
        let inner = self.inner.lock().await;
        let data = inner.table(table)?;

        Ok(data
            .keyed
            .iter()
            .filter(|(_, copies)| {
                copies.iter().any(|row| {
                    columns
                        .iter()
                        .zip(values)
                        .all(|(column, value)| row.get(*column) == Some(value))
                })
            })
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn insert_row(&self, table: &str, row: TableRow) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let data = inner.table_mut(table)?;
        data.check_width(row.values())?;

        let copies = row.count();
        let values = row.into_values();

        if !data.layout.is_keyed() {
            data.check_unique(&Key::unbounded(), &values)?;
            data.unkeyed
                .extend(std::iter::repeat_n(values, copies as usize));
            return Ok(());
        }

        let key = data.layout.key_of(&values);
        data.check_unique(&key, &values)?;

        if data.layout.is_counted() {
            data.keyed
                .entry(key)
                .or_default()
                .extend(std::iter::repeat_n(values, copies as usize));
            return Ok(());
        }

        if data.keyed.contains_key(&key) {
            bail!(
                ErrorKind::UniqueViolation,
                "Row would duplicate an existing key",
                format!("table {table}, key {key}")
            );
        }
        data.keyed.insert(key, vec![values]);

        Ok(())
    }

    async fn upsert_row(&self, table: &str, values: Vec<Value>) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let data = inner.table_mut(table)?;
        data.check_width(&values)?;

        if !data.layout.is_keyed() {
            bail!(
                ErrorKind::InvalidState,
                "Rows of a table without a key cannot be replaced",
                table.to_string()
            );
        }

        let key = data.layout.key_of(&values);
        data.check_unique(&key, &values)?;
        data.keyed.insert(key, vec![values]);

        Ok(())
    }

    async fn delete_row(&self, table: &str, key: &Key) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let data = inner.table_mut(table)?;
        data.keyed.remove(key);

        Ok(())
    }

    async fn delete_copies(&self, table: &str, key: &Key, copies: u64) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let data = inner.table_mut(table)?;

        if let Some(held) = data.keyed.get_mut(key) {
            let keep = held.len().saturating_sub(copies as usize);
            held.truncate(keep);
            if held.is_empty() {
                data.keyed.remove(key);
            }
        }

        Ok(())
    }

    async fn delete_below(&self, table: &str, key: &Key) -> SyncResult<u64> {
        let mut inner = self.inner.lock().await;
        let data = inner.table_mut(table)?;

        if key.is_unbounded() {
            return Ok(0);
        }

        let below: Vec<Key> = data
            .keyed
            .range(..key.clone())
            .map(|(key, _)| key.clone())
            .collect();

        Ok(below
            .iter()
            .filter_map(|key| data.keyed.remove(key))
            .map(|copies| copies.len() as u64)
            .sum())
    }

    async fn delete_range(&self, table: &str, range: &KeyRange) -> SyncResult<u64> {
        let mut inner = self.inner.lock().await;
        let data = inner.table_mut(table)?;

        Ok(data.remove_range(range))
    }

    async fn delete_all(&self, table: &str) -> SyncResult<u64> {
        let mut inner = self.inner.lock().await;
        let data = inner.table_mut(table)?;

        Ok(data.remove_range(&KeyRange::all()))
    }
}
