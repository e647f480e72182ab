use std::collections::HashSet;

use thiserror::Error;

use crate::schema::{DatabaseSchema, TableLayout, TableSchema};

/// A structural difference between the source schema and the local schema.
///
/// "Missing" items exist on the source but not locally; "extra" items exist only locally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaMismatch {
    #[error("Missing table {table}")]
    MissingTable { table: String },

    #[error("Extra table {table}")]
    ExtraTable { table: String },

    #[error("Missing column {column} on table {table}")]
    MissingColumn { column: String, table: String },

    #[error("Extra column {column} on table {table}")]
    ExtraColumn { column: String, table: String },

    #[error("Misordered column {column} on table {table}, should have {expected} first")]
    MisorderedColumn {
        column: String,
        table: String,
        expected: String,
    },

    #[error(
        "Mismatching primary key ({}) on table {table}, should have ({})",
        .actual.join(", "),
        .expected.join(", ")
    )]
    MismatchingKey {
        actual: Vec<String>,
        table: String,
        expected: Vec<String>,
    },
}

impl SchemaMismatch {
    /// Name of the table the mismatch was found on.
    pub fn table(&self) -> &str {
        match self {
            SchemaMismatch::MissingTable { table }
            | SchemaMismatch::ExtraTable { table }
            | SchemaMismatch::MissingColumn { table, .. }
            | SchemaMismatch::ExtraColumn { table, .. }
            | SchemaMismatch::MisorderedColumn { table, .. }
            | SchemaMismatch::MismatchingKey { table, .. } => table,
        }
    }
}

/// Compares the source schema (`from`) against the local schema (`to`).
///
/// Tables are walked in order on both sides; at most one column mismatch and one key mismatch
/// are reported per table. A table listed at a different position on each side is compared
/// where the source lists it. An empty result means the schemas are compatible.
pub fn compare_schemas(from: &DatabaseSchema, to: &DatabaseSchema) -> Vec<SchemaMismatch> {
    let mut mismatches = Vec::new();
    let mut compared = HashSet::new();
    let mut from_tables = from.tables.iter().peekable();
    let mut to_tables = to.tables.iter().peekable();

    loop {
        while from_tables
            .next_if(|table| compared.contains(table.name.as_str()))
            .is_some()
        {}
        while to_tables
            .next_if(|table| compared.contains(table.name.as_str()))
            .is_some()
        {}

        match (from_tables.peek(), to_tables.peek()) {
            (None, None) => break,
            (Some(from_table), None) => {
                mismatches.push(SchemaMismatch::MissingTable {
                    table: from_table.name.clone(),
                });
                from_tables.next();
            }
            (None, Some(to_table)) => {
                mismatches.push(SchemaMismatch::ExtraTable {
                    table: to_table.name.clone(),
                });
                to_tables.next();
            }
            (Some(from_table), Some(to_table)) if from_table.name == to_table.name => {
                mismatches.extend(compare_tables(from_table, to_table));
                from_tables.next();
                to_tables.next();
            }
            (Some(from_table), Some(to_table)) => {
                if from.table(&to_table.name).is_none() {
                    mismatches.push(SchemaMismatch::ExtraTable {
                        table: to_table.name.clone(),
                    });
                    to_tables.next();
                } else if let Some(local_table) = to.table(&from_table.name) {
                    mismatches.extend(compare_tables(from_table, local_table));
                    compared.insert(local_table.name.as_str());
                    from_tables.next();
                } else {
                    mismatches.push(SchemaMismatch::MissingTable {
                        table: from_table.name.clone(),
                    });
                    from_tables.next();
                }
            }
        }
    }

    mismatches
}

/// Compares one table present on both sides.
pub fn compare_tables(from: &TableSchema, to: &TableSchema) -> Vec<SchemaMismatch> {
    let mut mismatches = Vec::new();

    if let Some(mismatch) = compare_columns(from, to) {
        mismatches.push(mismatch);
    }

    let expected = TableLayout::from_schema(from).key_column_names();
    let actual = TableLayout::from_schema(to).key_column_names();
    if expected != actual {
        mismatches.push(SchemaMismatch::MismatchingKey {
            actual,
            table: to.name.clone(),
            expected,
        });
    }

    mismatches
}

fn compare_columns(from: &TableSchema, to: &TableSchema) -> Option<SchemaMismatch> {
    let table = &to.name;
    let has_column =
        |schema: &TableSchema, name: &str| schema.columns.iter().any(|column| column.name == name);

    let mut from_columns = from.columns.iter();
    let mut to_columns = to.columns.iter();

    loop {
        match (from_columns.next(), to_columns.next()) {
            (None, None) => return None,
            (Some(from_column), None) => {
                return Some(SchemaMismatch::MissingColumn {
                    column: from_column.name.clone(),
                    table: table.clone(),
                });
            }
            (None, Some(to_column)) => {
                return Some(SchemaMismatch::ExtraColumn {
                    column: to_column.name.clone(),
                    table: table.clone(),
                });
            }
            (Some(from_column), Some(to_column)) if from_column.name == to_column.name => {}
            (Some(from_column), Some(to_column)) => {
                let mismatch = if !has_column(to, &from_column.name) {
                    SchemaMismatch::MissingColumn {
                        column: from_column.name.clone(),
                        table: table.clone(),
                    }
                } else if !has_column(from, &to_column.name) {
                    SchemaMismatch::ExtraColumn {
                        column: to_column.name.clone(),
                        table: table.clone(),
                    }
                } else {
                    SchemaMismatch::MisorderedColumn {
                        column: from_column.name.clone(),
                        table: table.clone(),
                        expected: to_column.name.clone(),
                    }
                };
                return Some(mismatch);
            }
        }
    }
}
