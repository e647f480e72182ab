use reconcile::error::ErrorKind;
use reconcile::schema::{ColumnSchema, ColumnType, SchemaMismatch, TableSchema};
use reconcile::store::MemoryStore;
use reconcile::sync::SessionConfig;
use reconcile::test_utils::peer::run_sync;
use reconcile::test_utils::schema::{footbl, schema_of, secondtbl};
use reconcile::types::Value;
use telemetry::tracing::init_test_tracing;

fn footbl_with_columns(columns: &[&str], primary_key: Vec<usize>) -> TableSchema {
    TableSchema::new(
        "footbl",
        columns
            .iter()
            .map(|name| ColumnSchema::new(*name, ColumnType::Integer, true))
            .collect(),
    )
    .with_primary_key(primary_key)
}

fn footbl_row(col1: i64) -> Vec<Value> {
    vec![
        Value::Integer(col1),
        Value::Integer(col1 * 10),
        Value::Text(format!("row {col1}")),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_table_aborts_the_session() {
    init_test_tracing();
    let from = MemoryStore::new(schema_of(vec![footbl(), secondtbl()]));
    let to = MemoryStore::new(schema_of(vec![footbl()]));
    from.insert_values("footbl", vec![footbl_row(1)]).await.unwrap();

    let err = run_sync(&from, &to, SessionConfig::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingTable);
    assert_eq!(err.details(), vec!["Missing table secondtbl"]);
    assert!(to.rows("footbl").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn extra_table_aborts_the_session() {
    init_test_tracing();
    let from = MemoryStore::new(schema_of(vec![footbl()]));
    let to = MemoryStore::new(schema_of(vec![footbl(), secondtbl()]));

    let err = run_sync(&from, &to, SessionConfig::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    assert_eq!(err.details(), vec!["Extra table secondtbl"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn column_differences_are_reported_verbatim() {
    init_test_tracing();
    let cases = [
        (
            footbl_with_columns(&["col1", "another_col"], vec![0, 1]),
            "Missing column col3 on table footbl",
        ),
        (
            footbl_with_columns(&["col1", "another_col", "col3", "col4"], vec![0, 1]),
            "Extra column col4 on table footbl",
        ),
        (
            footbl_with_columns(&["col1", "col3", "another_col"], vec![0, 2]),
            "Misordered column another_col on table footbl, should have col3 first",
        ),
    ];

    for (local_table, expected) in cases {
        let from = MemoryStore::new(schema_of(vec![footbl()]));
        let to = MemoryStore::new(schema_of(vec![local_table]));

        let err = run_sync(&from, &to, SessionConfig::default())
            .await
            .unwrap_err();

        assert_eq!(err.kinds(), vec![ErrorKind::SchemaMismatch]);
        assert_eq!(err.details(), vec![expected]);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn mismatching_primary_key_is_reported() {
    init_test_tracing();
    let from = MemoryStore::new(schema_of(vec![footbl()]));
    let to = MemoryStore::new(schema_of(vec![footbl_with_columns(
        &["col1", "another_col", "col3"],
        vec![0],
    )]));

    let err = run_sync(&from, &to, SessionConfig::default())
        .await
        .unwrap_err();

    assert_eq!(
        err.details(),
        vec!["Mismatching primary key (col1) on table footbl, should have (col1, another_col)"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn every_mismatch_is_collected_before_aborting() {
    init_test_tracing();
    let from = MemoryStore::new(schema_of(vec![footbl(), secondtbl()]));
    let to = MemoryStore::new(schema_of(vec![footbl_with_columns(
        &["col1", "another_col", "col3", "col4"],
        vec![0],
    )]));

    let err = run_sync(&from, &to, SessionConfig::default())
        .await
        .unwrap_err();

    assert_eq!(
        err.kinds(),
        vec![
            ErrorKind::SchemaMismatch,
            ErrorKind::SchemaMismatch,
            ErrorKind::MissingTable
        ]
    );
    assert_eq!(
        err.details(),
        vec![
            "Extra column col4 on table footbl",
            "Mismatching primary key (col1) on table footbl, should have (col1, another_col)",
            "Missing table secondtbl",
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn continuing_past_mismatches_reconciles_the_compatible_tables() {
    init_test_tracing();
    let mut local_secondtbl = secondtbl();
    local_secondtbl.columns.pop();

    let from = MemoryStore::new(schema_of(vec![footbl(), secondtbl()]));
    let to = MemoryStore::new(schema_of(vec![footbl(), local_secondtbl]));
    from.insert_values("footbl", vec![footbl_row(1), footbl_row(2)])
        .await
        .unwrap();
    let config = SessionConfig {
        continue_on_mismatch: true,
        ..SessionConfig::default()
    };

    let report = run_sync(&from, &to, config).await.unwrap();

    assert_eq!(report.tables.len(), 1);
    assert_eq!(report.tables[0].table, "footbl");
    assert_eq!(
        report.schema_mismatches,
        vec![SchemaMismatch::MissingColumn {
            column: "sec".to_string(),
            table: "secondtbl".to_string(),
        }]
    );
    assert_eq!(
        to.rows("footbl").await.unwrap(),
        vec![footbl_row(1), footbl_row(2)]
    );
}
