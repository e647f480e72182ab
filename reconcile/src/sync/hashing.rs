use crate::error::SyncResult;
use crate::hash::{Digest, HashAlgorithm, RowHasher};
use crate::schema::TableLayout;
use crate::store::{RowScanner, TableStore};
use crate::types::{Key, KeyRange};

/// Digest of the leading rows of a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeHash {
    pub row_count: u64,
    /// Encoded bytes folded into the digest.
    pub size: u64,
    pub digest: Digest,
    /// Key of the last row hashed; unbounded when no row was hashed.
    pub last_key: Key,
}

/// Hashes at most `rows_to_hash` rows of `range`, reading the store in batches of `batch_rows`.
pub async fn hash_range<S>(
    store: &S,
    layout: &TableLayout,
    range: &KeyRange,
    rows_to_hash: u64,
    algorithm: HashAlgorithm,
    batch_rows: usize,
) -> SyncResult<RangeHash>
where
    S: TableStore,
{
    let mut hasher = RowHasher::new(algorithm);
    let mut last_key = Key::unbounded();
    let mut scanner = RowScanner::new(store, layout, range.clone());

    while hasher.row_count() < rows_to_hash {
        let remaining = rows_to_hash - hasher.row_count();
        let batch = usize::try_from(remaining).map_or(batch_rows, |r| r.min(batch_rows));
        let Some(rows) = scanner.next_batch(batch).await? else {
            break;
        };

        for row in rows.iter().take(batch) {
            hasher.update(row)?;
        }
        if let Some(row) = rows.iter().take(batch).last() {
            last_key = layout.key_of(row.values());
        }
    }

    Ok(RangeHash {
        row_count: hasher.row_count(),
        size: hasher.size(),
        digest: hasher.finish(),
        last_key,
    })
}
