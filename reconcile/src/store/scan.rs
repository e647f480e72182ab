use crate::error::SyncResult;
use crate::schema::TableLayout;
use crate::store::base::TableStore;
use crate::types::{KeyRange, TableRow};

/// Reads the rows of a key range in ascending key order, one bounded batch at a time.
///
/// Each batch resumes after the key of the last row returned, so the whole range is never
/// materialized at once. Tables without a key are read in a single batch.
pub struct RowScanner<'a, S> {
    store: &'a S,
    layout: &'a TableLayout,
    range: KeyRange,
    done: bool,
}

impl<'a, S> RowScanner<'a, S>
where
    S: TableStore,
{
    pub fn new(store: &'a S, layout: &'a TableLayout, range: KeyRange) -> Self {
        Self {
            store,
            layout,
            range,
            done: false,
        }
    }

    /// Returns up to `max_rows` further rows, or `None` once the range is exhausted.
    pub async fn next_batch(&mut self, max_rows: usize) -> SyncResult<Option<Vec<TableRow>>> {
        if self.done || max_rows == 0 {
            return Ok(None);
        }

        let limit = if self.layout.is_keyed() {
            max_rows
        } else {
            usize::MAX
        };
        let rows = self
            .store
            .fetch_rows(self.layout.name(), &self.range, limit)
            .await?;

        match rows.last() {
            Some(last) if self.layout.is_keyed() && rows.len() == limit => {
                self.range.prev_key = self.layout.key_of(last.values());
            }
            _ => self.done = true,
        }

        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(rows))
    }
}
