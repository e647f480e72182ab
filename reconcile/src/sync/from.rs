use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::error::{ErrorKind, SyncResult};
use crate::hash::HashAlgorithm;
use crate::protocol::{Channel, HashResponse, Request, Response};
use crate::schema::TableLayout;
use crate::store::{RowScanner, TableStore};
use crate::sync::config::SessionConfig;
use crate::sync::handshake::accept_protocol_version;
use crate::sync::hashing::hash_range;
use crate::sync_error;
use crate::types::KeyRange;

/// The source endpoint: answers commands from a [`crate::sync::SyncToSession`] until QUIT.
#[derive(Debug, Clone)]
pub struct SyncFromSession<S> {
    store: S,
    max_rows_to_select: usize,
    max_frame_bytes: usize,
}

impl<S> SyncFromSession<S>
where
    S: TableStore,
{
    pub fn new(store: S, config: &SessionConfig) -> Self {
        Self {
            store,
            max_rows_to_select: config.max_rows_to_select,
            max_frame_bytes: config.max_frame_bytes,
        }
    }

    /// Serves one session over the given stream halves.
    pub async fn run<R, W>(&self, reader: R, writer: W) -> SyncResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut channel = Channel::new(reader, writer, self.max_frame_bytes);
        let schema = self.store.schema().await?;
        let layouts: HashMap<String, TableLayout> = schema
            .tables
            .iter()
            .map(|table| (table.name.clone(), TableLayout::from_schema(table)))
            .collect();
        let mut algorithm = HashAlgorithm::default();

        info!(tables = layouts.len(), "serving reconciliation session");

        loop {
            let request = channel.recv_request().await?;
            debug!(verb = %request.verb(), "handling command");

            match request {
                Request::Protocol { version } => {
                    let version = accept_protocol_version(version)?;
                    channel.send_response(&Response::Protocol { version }).await?;
                }
                Request::TargetBlockSize { bytes } => {
                    channel
                        .send_response(&Response::TargetBlockSize { bytes })
                        .await?;
                }
                Request::HashAlgorithm { id } => {
                    algorithm = HashAlgorithm::from_wire_id(id)?;
                    channel
                        .send_response(&Response::HashAlgorithm { id })
                        .await?;
                }
                Request::Schema => {
                    channel
                        .send_response(&Response::Schema(schema.clone()))
                        .await?;
                }
                Request::Range { table } => {
                    lookup(&layouts, &table)?;
                    let first_key = self.store.first_key(&table).await?;
                    let last_key = self.store.last_key(&table).await?;
                    channel
                        .send_response(&Response::Range {
                            table,
                            first_key,
                            last_key,
                        })
                        .await?;
                }
                Request::Hash(request) => {
                    let layout = lookup(&layouts, &request.table)?;
                    let hashed = hash_range(
                        &self.store,
                        layout,
                        &request.range,
                        request.rows_to_hash,
                        algorithm,
                        self.max_rows_to_select,
                    )
                    .await?;
                    channel
                        .send_response(&Response::Hash(HashResponse {
                            request,
                            row_count: hashed.row_count,
                            digest: hashed.digest,
                        }))
                        .await?;
                }
                Request::Rows { table, range } => {
                    let layout = lookup(&layouts, &table)?;
                    self.send_rows(&mut channel, layout, range).await?;
                }
                Request::Quit => {
                    info!("peer ended the session");
                    channel.flush().await?;
                    return Ok(());
                }
            }

            channel.flush().await?;
        }
    }

    async fn send_rows<R, W>(
        &self,
        channel: &mut Channel<R, W>,
        layout: &TableLayout,
        range: KeyRange,
    ) -> SyncResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        channel
            .send_response(&Response::Rows {
                table: layout.name().to_string(),
                range: range.clone(),
            })
            .await?;

        let mut sent = 0u64;
        let mut scanner = RowScanner::new(&self.store, layout, range);
        while let Some(rows) = scanner.next_batch(self.max_rows_to_select).await? {
            for row in &rows {
                channel.send_row(&row.to_wire()).await?;
            }
            sent += rows.len() as u64;
        }
        channel.send_rows_end().await?;

        debug!(table = %layout.name(), rows = sent, "sent rows");

        Ok(())
    }
}

fn lookup<'a>(layouts: &'a HashMap<String, TableLayout>, table: &str) -> SyncResult<&'a TableLayout> {
    layouts.get(table).ok_or_else(|| {
        sync_error!(
            ErrorKind::MissingTable,
            "The peer asked for an unknown table",
            table.to_string()
        )
    })
}
