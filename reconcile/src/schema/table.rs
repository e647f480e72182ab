use std::fmt;

use serde::{Deserialize, Serialize};

/// Storage class of a column, as far as reconciliation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Text,
    Binary,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Integer => f.write_str("integer"),
            ColumnType::Text => f.write_str("text"),
            ColumnType::Binary => f.write_str("binary"),
        }
    }
}

/// Schema of a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// Generated columns are computed by the database and never transmitted or compared.
    #[serde(default)]
    pub generated: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable,
            generated: false,
        }
    }

    /// Marks the column as computed by the database.
    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }
}

/// A secondary index, referencing columns by their position in [`TableSchema::columns`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<usize>,
}

impl IndexSchema {
    pub fn new(name: impl Into<String>, unique: bool, columns: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            unique,
            columns,
        }
    }
}

/// Schema of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    /// Primary key columns in key order, as positions in [`TableSchema::columns`].
    #[serde(default)]
    pub primary_key_columns: Vec<usize>,
    #[serde(default)]
    pub indexes: Vec<IndexSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            name: name.into(),
            columns,
            primary_key_columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, columns: Vec<usize>) -> Self {
        self.primary_key_columns = columns;
        self
    }

    pub fn with_index(mut self, index: IndexSchema) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn column_names(&self, positions: &[usize]) -> Vec<String> {
        positions
            .iter()
            .filter_map(|position| self.columns.get(*position))
            .map(|column| column.name.clone())
            .collect()
    }
}

/// Schema of every table taking part in a session, in sync order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub tables: Vec<TableSchema>,
}

impl DatabaseSchema {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|table| table.name == name)
    }
}
