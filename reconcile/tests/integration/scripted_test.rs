use reconcile::error::ErrorKind;
use reconcile::hash::{HashAlgorithm, hash_rows};
use reconcile::protocol::{
    EARLIEST_PROTOCOL_VERSION, HashRequest, HashResponse, LATEST_PROTOCOL_VERSION, Request,
    Response,
};
use reconcile::store::MemoryStore;
use reconcile::sync::{SessionConfig, SyncToSession};
use reconcile::test_utils::peer::ScriptedPeer;
use reconcile::test_utils::schema::{footbl, nokeytbl, schema_of};
use reconcile::types::{Key, KeyRange, TableRow, Value};
use telemetry::tracing::init_test_tracing;

fn footbl_row(col1: i64, another_col: i64, col3: &str) -> Vec<Value> {
    vec![
        Value::Integer(col1),
        Value::Integer(another_col),
        Value::Text(col3.to_string()),
    ]
}

fn footbl_key(col1: i64, another_col: i64) -> Key {
    Key::new(vec![Value::Integer(col1), Value::Integer(another_col)])
}

fn range_request() -> Request {
    Request::Range {
        table: "footbl".to_string(),
    }
}

fn range_response(first_key: Key, last_key: Key) -> Response {
    Response::Range {
        table: "footbl".to_string(),
        first_key,
        last_key,
    }
}

fn numbered_rows(ids: impl IntoIterator<Item = i64>) -> Vec<Vec<Value>> {
    ids.into_iter()
        .map(|id| footbl_row(id, id * 10, &format!("row {id}")))
        .collect()
}

fn numbered_key(id: i64) -> Key {
    footbl_key(id, id * 10)
}

fn between(prev: i64, last: i64) -> KeyRange {
    KeyRange::new(numbered_key(prev), numbered_key(last))
}

fn source_rows_in(source: &[Vec<Value>], range: &KeyRange) -> Vec<Vec<Value>> {
    source
        .iter()
        .filter(|row| range.contains(&Key::new(row[..2].to_vec())))
        .cloned()
        .collect()
}

/// Expects a HASH of `range` and answers as a source holding `source` would.
fn expect_hash(
    peer: ScriptedPeer,
    source: &[Vec<Value>],
    range: KeyRange,
    rows_to_hash: u64,
) -> ScriptedPeer {
    let hashed: Vec<TableRow> = source_rows_in(source, &range)
        .into_iter()
        .take(rows_to_hash as usize)
        .map(TableRow::Plain)
        .collect();
    let (row_count, digest) = hash_rows(HashAlgorithm::Md5, &hashed).unwrap();
    let request = HashRequest {
        table: "footbl".to_string(),
        range,
        rows_to_hash,
    };

    peer.expect(
        Request::Hash(request.clone()),
        Response::Hash(HashResponse {
            request,
            row_count,
            digest,
        }),
    )
}

fn expect_source_rows(peer: ScriptedPeer, source: &[Vec<Value>], range: KeyRange) -> ScriptedPeer {
    let rows = source_rows_in(source, &range);
    peer.expect_rows(
        Request::Rows {
            table: "footbl".to_string(),
            range,
        },
        rows,
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_tables_only_exchange_their_range() {
    init_test_tracing();
    let config = SessionConfig::default();
    let schema = schema_of(vec![footbl()]);
    let peer = ScriptedPeer::with_handshake(&config, schema.clone())
        .expect(
            range_request(),
            range_response(Key::unbounded(), Key::unbounded()),
        )
        .expect_silent(Request::Quit)
        .spawn();

    let to = MemoryStore::new(schema);
    let report = SyncToSession::new(to, config)
        .run(peer.reader, peer.writer)
        .await
        .unwrap();

    let received = peer.handle.await.unwrap();
    assert_eq!(received.len(), 6);
    assert_eq!(report.rows_changed(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_destination_requests_the_whole_range_once() {
    init_test_tracing();
    let config = SessionConfig::default();
    let schema = schema_of(vec![footbl()]);
    let rows = vec![footbl_row(2, 10, "test"), footbl_row(4, 40, "more")];
    let peer = ScriptedPeer::with_handshake(&config, schema.clone())
        .expect(
            range_request(),
            range_response(footbl_key(2, 10), footbl_key(4, 40)),
        )
        .expect_rows(
            Request::Rows {
                table: "footbl".to_string(),
                range: KeyRange::up_to(footbl_key(4, 40)),
            },
            rows.clone(),
        )
        .expect_silent(Request::Quit)
        .spawn();

    let to = MemoryStore::new(schema);
    let report = SyncToSession::new(to.clone(), config)
        .run(peer.reader, peer.writer)
        .await
        .unwrap();

    peer.handle.await.unwrap();
    assert_eq!(report.rows_changed(), 2);
    assert_eq!(to.rows("footbl").await.unwrap(), rows);
}

#[tokio::test(flavor = "multi_thread")]
async fn matching_single_row_is_settled_by_one_hash() {
    init_test_tracing();
    let config = SessionConfig::default();
    let schema = schema_of(vec![footbl()]);
    let row = footbl_row(2, 10, "test");
    let (row_count, digest) =
        hash_rows(HashAlgorithm::Md5, &[TableRow::Plain(row.clone())]).unwrap();
    let hash_request = HashRequest {
        table: "footbl".to_string(),
        range: KeyRange::up_to(footbl_key(2, 10)),
        rows_to_hash: 1,
    };

    let peer = ScriptedPeer::with_handshake(&config, schema.clone())
        .expect(
            range_request(),
            range_response(footbl_key(2, 10), footbl_key(2, 10)),
        )
        .expect(
            Request::Hash(hash_request.clone()),
            Response::Hash(HashResponse {
                request: hash_request,
                row_count,
                digest,
            }),
        )
        .expect_silent(Request::Quit)
        .spawn();

    let to = MemoryStore::new(schema);
    to.insert_values("footbl", vec![row.clone()]).await.unwrap();
    let report = SyncToSession::new(to.clone(), config)
        .run(peer.reader, peer.writer)
        .await
        .unwrap();

    peer.handle.await.unwrap();
    let stats = report.table("footbl").unwrap();
    assert_eq!(stats.hash_commands, 1);
    assert_eq!(stats.rows_commands, 0);
    assert_eq!(to.rows("footbl").await.unwrap(), vec![row]);
}

#[tokio::test(flavor = "multi_thread")]
async fn tables_without_a_key_skip_the_range_exchange() {
    init_test_tracing();
    let config = SessionConfig::default();
    let schema = schema_of(vec![nokeytbl()]);
    let rows = vec![
        vec![Value::Integer(1), Value::Text("one".to_string())],
        vec![Value::Null, Value::Null],
    ];
    let peer = ScriptedPeer::with_handshake(&config, schema.clone())
        .expect_rows(
            Request::Rows {
                table: "nokeytbl".to_string(),
                range: KeyRange::all(),
            },
            rows.clone(),
        )
        .expect_silent(Request::Quit)
        .spawn();

    let to = MemoryStore::new(schema);
    SyncToSession::new(to.clone(), config)
        .run(peer.reader, peer.writer)
        .await
        .unwrap();

    peer.handle.await.unwrap();
    assert_eq!(to.rows("nokeytbl").await.unwrap(), rows);
}

#[tokio::test(flavor = "multi_thread")]
async fn range_response_for_another_table_is_a_protocol_violation() {
    init_test_tracing();
    let config = SessionConfig::default();
    let schema = schema_of(vec![footbl()]);
    let peer = ScriptedPeer::with_handshake(&config, schema.clone())
        .expect(
            range_request(),
            Response::Range {
                table: "othertbl".to_string(),
                first_key: Key::unbounded(),
                last_key: Key::unbounded(),
            },
        )
        .spawn();

    let err = SyncToSession::new(MemoryStore::new(schema), config)
        .run(peer.reader, peer.writer)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
}

#[tokio::test(flavor = "multi_thread")]
async fn inverted_source_range_is_a_protocol_violation() {
    init_test_tracing();
    let config = SessionConfig::default();
    let schema = schema_of(vec![footbl()]);
    let peer = ScriptedPeer::with_handshake(&config, schema.clone())
        .expect(
            range_request(),
            range_response(footbl_key(9, 0), footbl_key(1, 0)),
        )
        .spawn();

    let err = SyncToSession::new(MemoryStore::new(schema), config)
        .run(peer.reader, peer.writer)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
}

#[tokio::test(flavor = "multi_thread")]
async fn rows_out_of_key_order_are_rejected() {
    init_test_tracing();
    let config = SessionConfig::default();
    let schema = schema_of(vec![footbl()]);
    let peer = ScriptedPeer::with_handshake(&config, schema.clone())
        .expect(
            range_request(),
            range_response(footbl_key(1, 0), footbl_key(3, 0)),
        )
        .expect_rows(
            Request::Rows {
                table: "footbl".to_string(),
                range: KeyRange::up_to(footbl_key(3, 0)),
            },
            vec![footbl_row(3, 0, "c"), footbl_row(1, 0, "a")],
        )
        .spawn();

    let err = SyncToSession::new(MemoryStore::new(schema), config)
        .run(peer.reader, peer.writer)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
}

#[tokio::test(flavor = "multi_thread")]
async fn source_may_answer_with_an_older_protocol_version() {
    init_test_tracing();
    let config = SessionConfig::default();
    let schema = schema_of(vec![footbl()]);
    let peer = ScriptedPeer::new()
        .expect(
            Request::Protocol {
                version: LATEST_PROTOCOL_VERSION,
            },
            Response::Protocol {
                version: EARLIEST_PROTOCOL_VERSION,
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
            Request::HashAlgorithm { id: 0 },
            Response::HashAlgorithm { id: 0 },
        )
        .expect(Request::Schema, Response::Schema(schema.clone()))
        .expect(
            range_request(),
            range_response(Key::unbounded(), Key::unbounded()),
        )
        .expect_silent(Request::Quit)
        .spawn();

    SyncToSession::new(MemoryStore::new(schema), config)
        .run(peer.reader, peer.writer)
        .await
        .unwrap();

    peer.handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn unsupported_protocol_version_aborts_the_handshake() {
    init_test_tracing();
    let peer = ScriptedPeer::new()
        .expect(
            Request::Protocol {
                version: LATEST_PROTOCOL_VERSION,
            },
            Response::Protocol {
                version: EARLIEST_PROTOCOL_VERSION - 1,
            },
        )
        .spawn();

    let err = SyncToSession::new(
        MemoryStore::new(schema_of(vec![footbl()])),
        SessionConfig::default(),
    )
    .run(peer.reader, peer.writer)
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedProtocolVersion);
}

#[tokio::test(flavor = "multi_thread")]
async fn hash_algorithm_must_be_echoed() {
    init_test_tracing();
    let config = SessionConfig {
        hash_algorithm: HashAlgorithm::Xxh64,
        ..SessionConfig::default()
    };
    let peer = ScriptedPeer::new()
        .expect(
            Request::Protocol {
                version: LATEST_PROTOCOL_VERSION,
            },
            Response::Protocol {
                version: LATEST_PROTOCOL_VERSION,
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
                id: HashAlgorithm::Xxh64.wire_id(),
            },
            Response::HashAlgorithm {
                id: HashAlgorithm::Md5.wire_id(),
            },
        )
        .spawn();

    let err = SyncToSession::new(MemoryStore::new(schema_of(vec![footbl()])), config)
        .run(peer.reader, peer.writer)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedHashAlgorithm);
}

#[tokio::test(flavor = "multi_thread")]
async fn single_changed_row_is_fetched_after_one_hash() {
    init_test_tracing();
    let config = SessionConfig::default();
    let schema = schema_of(vec![footbl()]);
    let source = vec![footbl_row(2, 10, "test")];

    let peer = ScriptedPeer::with_handshake(&config, schema.clone()).expect(
        range_request(),
        range_response(footbl_key(2, 10), footbl_key(2, 10)),
    );
    let peer = expect_hash(peer, &source, KeyRange::up_to(footbl_key(2, 10)), 1);
    let peer = expect_source_rows(peer, &source, KeyRange::up_to(footbl_key(2, 10)))
        .expect_silent(Request::Quit)
        .spawn();

    let to = MemoryStore::new(schema);
    to.insert_values("footbl", vec![footbl_row(2, 10, "different")])
        .await
        .unwrap();
    let report = SyncToSession::new(to.clone(), config)
        .run(peer.reader, peer.writer)
        .await
        .unwrap();

    peer.handle.await.unwrap();
    let stats = report.table("footbl").unwrap();
    assert_eq!(stats.hash_commands, 1);
    assert_eq!(stats.rows_commands, 1);
    assert_eq!(stats.rows_changed, 1);
    assert_eq!(to.rows("footbl").await.unwrap(), source);
}

#[tokio::test(flavor = "multi_thread")]
async fn scanning_forward_doubles_after_matches_and_halves_after_a_mismatch() {
    init_test_tracing();
    let config = SessionConfig::default();
    let schema = schema_of(vec![footbl()]);
    let source = numbered_rows([1, 2, 4, 5, 7, 9]);
    let mut destination = source.clone();
    destination[3][2] = Value::Text("stale".to_string());

    // Split at the third of six keys; both halves start with a single row.
    let peer = ScriptedPeer::with_handshake(&config, schema.clone())
        .expect(range_request(), range_response(numbered_key(1), numbered_key(9)));
    let peer = expect_hash(peer, &source, KeyRange::up_to(numbered_key(4)), 1);
    let peer = expect_hash(peer, &source, between(4, 9), 1);
    let peer = expect_source_rows(peer, &source, between(4, 5));
    let peer = expect_hash(peer, &source, between(1, 4), 2);
    let peer = expect_hash(peer, &source, between(5, 9), 1);
    let peer = expect_hash(peer, &source, between(7, 9), 2)
        .expect_silent(Request::Quit)
        .spawn();

    let to = MemoryStore::new(schema);
    to.insert_values("footbl", destination).await.unwrap();
    let report = SyncToSession::new(to.clone(), config)
        .run(peer.reader, peer.writer)
        .await
        .unwrap();

    peer.handle.await.unwrap();
    let stats = report.table("footbl").unwrap();
    assert_eq!(stats.hash_commands, 5);
    assert_eq!(stats.rows_commands, 1);
    assert_eq!(stats.rows_changed, 1);
    assert_eq!(to.rows("footbl").await.unwrap(), source);
}

#[tokio::test(flavor = "multi_thread")]
async fn mismatching_block_is_hunted_down_by_halving() {
    init_test_tracing();
    let config = SessionConfig::default();
    let schema = schema_of(vec![footbl()]);
    let source = numbered_rows(1..=14);
    let mut destination = source.clone();
    destination[5][2] = Value::Null;

    let peer = ScriptedPeer::with_handshake(&config, schema.clone())
        .expect(range_request(), range_response(numbered_key(1), numbered_key(14)));
    let peer = expect_hash(peer, &source, KeyRange::up_to(numbered_key(7)), 1);
    let peer = expect_hash(peer, &source, between(7, 14), 1);
    let peer = expect_hash(peer, &source, between(1, 7), 2);
    let peer = expect_hash(peer, &source, between(8, 14), 2);
    // Four rows mismatch, so the block is rehashed two rows at a time.
    let peer = expect_hash(peer, &source, between(3, 7), 4);
    let peer = expect_hash(peer, &source, between(3, 7), 2);
    let peer = expect_hash(peer, &source, between(5, 7), 2);
    let peer = expect_hash(peer, &source, between(5, 7), 1);
    let peer = expect_source_rows(peer, &source, between(5, 6));
    let peer = expect_hash(peer, &source, between(6, 7), 1);
    let peer = expect_hash(peer, &source, between(10, 14), 4)
        .expect_silent(Request::Quit)
        .spawn();

    let to = MemoryStore::new(schema);
    to.insert_values("footbl", destination).await.unwrap();
    let report = SyncToSession::new(to.clone(), config)
        .run(peer.reader, peer.writer)
        .await
        .unwrap();

    let received = peer.handle.await.unwrap();
    assert_eq!(received.last(), Some(&Request::Quit));
    let stats = report.table("footbl").unwrap();
    assert_eq!(stats.hash_commands, 10);
    assert_eq!(stats.rows_commands, 1);
    assert_eq!(stats.rows_changed, 1);
    assert_eq!(to.rows("footbl").await.unwrap(), source);
}
