//! Canned table schemas covering every kind of effective key.

use crate::schema::{ColumnSchema, ColumnType, DatabaseSchema, IndexSchema, TableSchema};

fn column(name: &str, column_type: ColumnType, nullable: bool) -> ColumnSchema {
    ColumnSchema::new(name, column_type, nullable)
}

/// Composite primary key `(col1, another_col)` plus a nullable text column.
pub fn footbl() -> TableSchema {
    TableSchema::new(
        "footbl",
        vec![
            column("col1", ColumnType::Integer, false),
            column("another_col", ColumnType::Integer, false),
            column("col3", ColumnType::Text, true),
        ],
    )
    .with_primary_key(vec![0, 1])
}

/// Primary key `(pri2, pri1)`, declared in a different order than the columns.
pub fn secondtbl() -> TableSchema {
    TableSchema::new(
        "secondtbl",
        vec![
            column("tri", ColumnType::Integer, true),
            column("pri1", ColumnType::Integer, false),
            column("pri2", ColumnType::Text, false),
            column("sec", ColumnType::Integer, true),
        ],
    )
    .with_primary_key(vec![2, 1])
}

/// Primary key `pri` and a unique index over the nullable `sec`.
pub fn uniquetbl() -> TableSchema {
    TableSchema::new(
        "uniquetbl",
        vec![
            column("pri", ColumnType::Integer, false),
            column("sec", ColumnType::Text, true),
            column("tri", ColumnType::Integer, true),
        ],
    )
    .with_primary_key(vec![0])
    .with_index(IndexSchema::new("uniquetbl_sec", true, vec![1]))
}

/// No primary key; keyed by the unique index over the non-nullable `version`.
pub fn noprimarytbl() -> TableSchema {
    TableSchema::new(
        "noprimarytbl",
        vec![
            column("nullable", ColumnType::Integer, true),
            column("version", ColumnType::Text, false),
            column("name", ColumnType::Text, true),
        ],
    )
    .with_index(IndexSchema::new("noprimarytbl_version", true, vec![1]))
}

/// Join table keyed by a non-unique index, so identical rows carry a duplicate count.
pub fn noprimaryjointbl() -> TableSchema {
    TableSchema::new(
        "noprimaryjointbl",
        vec![
            column("table1_id", ColumnType::Integer, false),
            column("table2_id", ColumnType::Integer, false),
        ],
    )
    .with_index(IndexSchema::new("noprimaryjointbl_table1_id", false, vec![0]))
}

/// Table without any usable key.
pub fn nokeytbl() -> TableSchema {
    TableSchema::new(
        "nokeytbl",
        vec![
            column("a", ColumnType::Integer, true),
            column("b", ColumnType::Text, true),
        ],
    )
}

/// Text key and a text payload column, used for large values.
pub fn texttbl() -> TableSchema {
    TableSchema::new(
        "texttbl",
        vec![
            column("pri", ColumnType::Text, false),
            column("textfield", ColumnType::Text, true),
            column("blob", ColumnType::Binary, true),
        ],
    )
    .with_primary_key(vec![0])
}

/// Has a generated column, which never travels.
pub fn generatedtbl() -> TableSchema {
    TableSchema::new(
        "generatedtbl",
        vec![
            column("id", ColumnType::Integer, false),
            column("x", ColumnType::Integer, true),
            column("doubled", ColumnType::Integer, true).generated(),
        ],
    )
    .with_primary_key(vec![0])
}

/// Every canned table, in name order.
pub fn full_schema() -> DatabaseSchema {
    DatabaseSchema::new(vec![
        footbl(),
        generatedtbl(),
        nokeytbl(),
        noprimaryjointbl(),
        noprimarytbl(),
        secondtbl(),
        texttbl(),
        uniquetbl(),
    ])
}

/// A schema holding only `tables`, in the given order.
pub fn schema_of(tables: Vec<TableSchema>) -> DatabaseSchema {
    DatabaseSchema::new(tables)
}
