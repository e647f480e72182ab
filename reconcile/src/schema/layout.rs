use crate::schema::TableSchema;
use crate::types::{Key, Value};

/// How rows of a table are addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyKind {
    /// The table's primary key.
    PrimaryKey,
    /// The first unique index whose columns are all non-nullable.
    UniqueIndex(String),
    /// A non-unique index extended with the remaining columns. Identical rows are collapsed and
    /// carry a trailing duplicate count.
    DuplicateCount(String),
    /// No usable key; the table is reloaded as a whole.
    None,
}

/// The replicated shape of a table: which columns travel in a row and which of them form the
/// effective key.
///
/// Computed once per table from its [`TableSchema`]. All positions stored here are positions
/// within a row, which skips generated columns, not positions in the schema's column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    name: String,
    column_names: Vec<String>,
    key_kind: KeyKind,
    key_columns: Vec<usize>,
    unique_constraints: Vec<Vec<usize>>,
}

impl TableLayout {
    pub fn from_schema(schema: &TableSchema) -> Self {
        let replicated: Vec<usize> = schema
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| !column.generated)
            .map(|(position, _)| position)
            .collect();

        let row_position =
            |schema_position: &usize| replicated.iter().position(|p| p == schema_position);
        let to_row_positions = |columns: &[usize]| -> Option<Vec<usize>> {
            columns.iter().map(row_position).collect()
        };
        let non_nullable = |columns: &[usize]| {
            columns
                .iter()
                .all(|position| schema.columns.get(*position).is_some_and(|c| !c.nullable))
        };

        let mut key_kind = KeyKind::None;
        let mut key_columns = Vec::new();
        let mut key_index = None;

        if let Some(columns) = (!schema.primary_key_columns.is_empty())
            .then(|| to_row_positions(&schema.primary_key_columns))
            .flatten()
        {
            key_kind = KeyKind::PrimaryKey;
            key_columns = columns;
        } else if let Some((index, columns)) = schema
            .indexes
            .iter()
            .filter(|index| index.unique && !index.columns.is_empty())
            .filter(|index| non_nullable(&index.columns))
            .find_map(|index| to_row_positions(&index.columns).map(|columns| (index, columns)))
        {
            key_kind = KeyKind::UniqueIndex(index.name.clone());
            key_columns = columns;
            key_index = Some(index.name.clone());
        } else if non_nullable(&replicated)
            && let Some((index, mut columns)) = schema
                .indexes
                .iter()
                .filter(|index| !index.columns.is_empty())
                .find_map(|index| to_row_positions(&index.columns).map(|columns| (index, columns)))
        {
            for position in 0..replicated.len() {
                if !columns.contains(&position) {
                    columns.push(position);
                }
            }
            key_kind = KeyKind::DuplicateCount(index.name.clone());
            key_columns = columns;
        }

        let unique_constraints = schema
            .indexes
            .iter()
            .filter(|index| index.unique && Some(&index.name) != key_index.as_ref())
            .filter_map(|index| to_row_positions(&index.columns))
            .collect();

        Self {
            name: schema.name.clone(),
            column_names: schema.column_names(&replicated),
            key_kind,
            key_columns,
            unique_constraints,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_kind(&self) -> &KeyKind {
        &self.key_kind
    }

    /// Returns `true` unless the table has no usable key.
    pub fn is_keyed(&self) -> bool {
        self.key_kind != KeyKind::None
    }

    /// Returns `true` if rows carry a trailing duplicate count.
    pub fn is_counted(&self) -> bool {
        matches!(self.key_kind, KeyKind::DuplicateCount(_))
    }

    /// Number of values in a row, excluding any duplicate count.
    pub fn column_count(&self) -> usize {
        self.column_names.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Row positions of the effective key columns, in key order.
    pub fn key_columns(&self) -> &[usize] {
        &self.key_columns
    }

    pub fn key_column_names(&self) -> Vec<String> {
        self.key_columns
            .iter()
            .map(|position| self.column_names[*position].clone())
            .collect()
    }

    /// Row positions of every unique index other than the effective key.
    pub fn unique_constraints(&self) -> &[Vec<usize>] {
        &self.unique_constraints
    }

    /// Extracts the effective key of a row.
    pub fn key_of(&self, values: &[Value]) -> Key {
        Key::new(
            self.key_columns
                .iter()
                .filter_map(|position| values.get(*position).cloned())
                .collect(),
        )
    }
}
