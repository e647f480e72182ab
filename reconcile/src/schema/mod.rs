mod compare;
mod layout;
mod table;

pub use compare::{SchemaMismatch, compare_schemas, compare_tables};
pub use layout::{KeyKind, TableLayout};
pub use table::{ColumnSchema, ColumnType, DatabaseSchema, IndexSchema, TableSchema};
