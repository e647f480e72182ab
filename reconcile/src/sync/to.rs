use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{error, info, warn};

use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::protocol::{Channel, Request, Response};
use crate::schema::{SchemaMismatch, TableLayout, compare_schemas};
use crate::store::TableStore;
use crate::sync::config::SessionConfig;
use crate::sync::handshake::negotiate;
use crate::sync::table_sync::{TableSyncStats, sync_table};
use crate::sync::unexpected_response;
use crate::sync_error;

/// Outcome of reconciling one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub table: String,
    pub stats: TableSyncStats,
}

/// Outcome of a whole session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Reconciled tables, in local schema order.
    pub tables: Vec<TableReport>,
    /// Schema differences that kept tables from being reconciled.
    pub schema_mismatches: Vec<SchemaMismatch>,
}

impl SyncReport {
    pub fn rows_changed(&self) -> u64 {
        self.tables.iter().map(|table| table.stats.rows_changed).sum()
    }

    pub fn table(&self, name: &str) -> Option<&TableSyncStats> {
        self.tables
            .iter()
            .find(|report| report.table == name)
            .map(|report| &report.stats)
    }
}

/// The destination endpoint: converges the local store onto the source's tables.
#[derive(Debug, Clone)]
pub struct SyncToSession<S> {
    store: S,
    config: SessionConfig,
}

impl<S> SyncToSession<S>
where
    S: TableStore,
{
    pub fn new(store: S, config: SessionConfig) -> Self {
        Self { store, config }
    }

    /// Runs one session: handshake, schema check, every table in turn, then QUIT.
    ///
    /// A schema mismatch aborts the session before any table is touched, unless
    /// [`SessionConfig::continue_on_mismatch`] is set, in which case only the tables without a
    /// mismatch are reconciled.
    pub async fn run<R, W>(&self, reader: R, writer: W) -> SyncResult<SyncReport>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut channel = Channel::new(reader, writer, self.config.max_frame_bytes);
        let session = negotiate(&mut channel, &self.config).await?;

        channel.send_request(&Request::Schema).await?;
        let their_schema = match channel.recv_response().await? {
            Response::Schema(schema) => schema,
            other => return Err(unexpected_response("SCHEMA", &other)),
        };
        let our_schema = self.store.schema().await?;

        let mismatches = compare_schemas(&their_schema, &our_schema);
        for mismatch in &mismatches {
            warn!(table = %mismatch.table(), "{mismatch}");
        }

        if !mismatches.is_empty() && !session.continue_on_mismatch {
            error!(
                mismatches = mismatches.len(),
                "schema mismatch, not reconciling any table"
            );
            channel.send_request(&Request::Quit).await?;
            channel.shutdown().await?;

            return Err(schema_mismatch_error(mismatches));
        }

        let mut report = SyncReport::default();
        for table in &our_schema.tables {
            let skipped = their_schema.table(&table.name).is_none()
                || mismatches.iter().any(|m| m.table() == table.name);
            if skipped {
                continue;
            }

            let layout = TableLayout::from_schema(table);
            let stats = sync_table(&mut channel, &self.store, &layout, &session).await?;
            report.tables.push(TableReport {
                table: table.name.clone(),
                stats,
            });
        }

        channel.send_request(&Request::Quit).await?;
        channel.shutdown().await?;

        info!(
            tables = report.tables.len(),
            rows_changed = report.rows_changed(),
            "reconciliation session finished"
        );
        report.schema_mismatches = mismatches;

        Ok(report)
    }
}

/// Folds schema mismatches into one error whose details are the mismatch messages in order.
fn schema_mismatch_error(mismatches: Vec<SchemaMismatch>) -> SyncError {
    let errors: Vec<_> = mismatches
        .into_iter()
        .map(|mismatch| {
            let kind = match mismatch {
                SchemaMismatch::MissingTable { .. } => ErrorKind::MissingTable,
                _ => ErrorKind::SchemaMismatch,
            };
            sync_error!(kind, "Schema mismatch", mismatch.to_string(), source: mismatch)
        })
        .collect();

    errors.into()
}
