//! In-memory peers for exercising the destination endpoint.

use std::collections::VecDeque;

use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

use crate::error::SyncResult;
use crate::protocol::{Channel, LATEST_PROTOCOL_VERSION, Request, Response};
use crate::schema::DatabaseSchema;
use crate::store::MemoryStore;
use crate::sync::{SessionConfig, SyncFromSession, SyncReport, SyncToSession};
use crate::types::Value;

const PIPE_CAPACITY: usize = 64 * 1024;

/// The destination's ends of a pipe whose other end is served by a spawned task.
pub struct SpawnedPeer<T> {
    pub reader: ReadHalf<DuplexStream>,
    pub writer: WriteHalf<DuplexStream>,
    pub handle: JoinHandle<T>,
}

/// Spawns a [`SyncFromSession`] serving `store` over an in-memory pipe.
pub fn spawn_from_peer(store: MemoryStore, config: &SessionConfig) -> SpawnedPeer<SyncResult<()>> {
    let (near, far) = tokio::io::duplex(PIPE_CAPACITY);
    let (reader, writer) = tokio::io::split(near);
    let (far_reader, far_writer) = tokio::io::split(far);

    let session = SyncFromSession::new(store, config);
    let handle = tokio::spawn(async move { session.run(far_reader, far_writer).await });

    SpawnedPeer {
        reader,
        writer,
        handle,
    }
}

/// Reconciles `to` onto `from` through a spawned source endpoint and returns the report.
pub async fn run_sync(
    from: &MemoryStore,
    to: &MemoryStore,
    config: SessionConfig,
) -> SyncResult<SyncReport> {
    let peer = spawn_from_peer(from.clone(), &config);
    let report = SyncToSession::new(to.clone(), config)
        .run(peer.reader, peer.writer)
        .await;

    let served = peer
        .handle
        .await
        .expect("source endpoint task panicked");
    let report = report?;
    served?;

    Ok(report)
}

/// One reply frame sent by a [`ScriptedPeer`].
#[derive(Debug, Clone)]
pub enum Reply {
    Response(Response),
    Row(Vec<Value>),
    RowsEnd,
}

/// A source endpoint that expects an exact sequence of commands and answers each with canned
/// frames.
///
/// Any command differing from the script fails the spawned task, which surfaces when its handle
/// is awaited.
#[derive(Debug, Default)]
pub struct ScriptedPeer {
    script: VecDeque<(Request, Vec<Reply>)>,
}

impl ScriptedPeer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script starting with the handshake for `config` and a SCHEMA exchange returning `schema`.
    pub fn with_handshake(config: &SessionConfig, schema: DatabaseSchema) -> Self {
        Self::new()
            .expect(
                Request::Protocol {
                    version: config.protocol_version,
                },
                Response::Protocol {
                    version: config.protocol_version.min(LATEST_PROTOCOL_VERSION),
                },
            )
            .expect(
                Request::TargetBlockSize {
                    bytes: config.min_block_size,
                },
                Response::TargetBlockSize {
                    bytes: config.min_block_size,
                },
            )
            .expect(
                Request::HashAlgorithm {
                    id: config.hash_algorithm.wire_id(),
                },
                Response::HashAlgorithm {
                    id: config.hash_algorithm.wire_id(),
                },
            )
            .expect(Request::Schema, Response::Schema(schema))
    }

    /// Expects `request` and answers it with `response`.
    pub fn expect(self, request: Request, response: Response) -> Self {
        self.expect_replies(request, vec![Reply::Response(response)])
    }

    /// Expects a ROWS `request` and answers with its echo, `rows` and the terminator.
    pub fn expect_rows(self, request: Request, rows: Vec<Vec<Value>>) -> Self {
        let Request::Rows { table, range } = request.clone() else {
            panic!("expect_rows needs a ROWS request, got {request:?}");
        };

        let mut replies = vec![Reply::Response(Response::Rows { table, range })];
        replies.extend(rows.into_iter().map(Reply::Row));
        replies.push(Reply::RowsEnd);

        self.expect_replies(request, replies)
    }

    /// Expects `request` and sends nothing back, as for QUIT.
    pub fn expect_silent(self, request: Request) -> Self {
        self.expect_replies(request, Vec::new())
    }

    pub fn expect_replies(mut self, request: Request, replies: Vec<Reply>) -> Self {
        self.script.push_back((request, replies));
        self
    }

    /// Serves the script over an in-memory pipe. The task returns every command it received.
    pub fn spawn(self) -> SpawnedPeer<Vec<Request>> {
        let (near, far) = tokio::io::duplex(PIPE_CAPACITY);
        let (reader, writer) = tokio::io::split(near);
        let (far_reader, far_writer) = tokio::io::split(far);

        let handle = tokio::spawn(async move {
            let mut channel = Channel::new(far_reader, far_writer, usize::MAX);
            let mut received = Vec::new();

            for (expected, replies) in self.script {
                let request = channel
                    .recv_request()
                    .await
                    .unwrap_or_else(|err| panic!("expected {expected:?}, got error {err}"));
                assert_eq!(
                    request, expected,
                    "unexpected command after {received:?}"
                );
                received.push(request);

                for reply in replies {
                    let sent = match reply {
                        Reply::Response(response) => channel.send_response(&response).await,
                        Reply::Row(values) => channel.send_row(&values).await,
                        Reply::RowsEnd => channel.send_rows_end().await,
                    };
                    sent.expect("failed to send scripted reply");
                }
                channel.flush().await.expect("failed to flush scripted reply");
            }

            received
        });

        SpawnedPeer {
            reader,
            writer,
            handle,
        }
    }
}
