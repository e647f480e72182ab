use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::types::Value;

/// A logical table row as exchanged between the two endpoints.
///
/// Rows of tables keyed by a non-unique index collapse identical physical rows into a single
/// [`TableRow::WithCount`] whose count is the number of copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRow {
    Plain(Vec<Value>),
    WithCount { values: Vec<Value>, count: u64 },
}

impl TableRow {
    pub fn values(&self) -> &[Value] {
        match self {
            TableRow::Plain(values) => values,
            TableRow::WithCount { values, .. } => values,
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        match self {
            TableRow::Plain(values) => values,
            TableRow::WithCount { values, .. } => values,
        }
    }

    /// Number of physical rows this logical row stands for.
    pub fn count(&self) -> u64 {
        match self {
            TableRow::Plain(_) => 1,
            TableRow::WithCount { count, .. } => *count,
        }
    }

    /// Approximate in-memory size, used for buffering limits.
    pub fn payload_len(&self) -> usize {
        self.values().iter().map(Value::payload_len).sum::<usize>()
            + match self {
                TableRow::Plain(_) => 0,
                TableRow::WithCount { .. } => 8,
            }
    }

    /// Returns the values sent on the wire, with the count appended for counted rows.
    pub fn to_wire(&self) -> Vec<Value> {
        match self {
            TableRow::Plain(values) => values.clone(),
            TableRow::WithCount { values, count } => {
                let mut wire = Vec::with_capacity(values.len() + 1);
                wire.extend_from_slice(values);
                wire.push(Value::Integer(*count as i64));
                wire
            }
        }
    }

    /// Parses a row received on the wire.
    ///
    /// For counted rows the trailing value must be a positive integer.
    pub fn from_wire(mut values: Vec<Value>, counted: bool, column_count: usize) -> SyncResult<Self> {
        let expected = column_count + usize::from(counted);
        if values.len() != expected {
            bail!(
                ErrorKind::ProtocolViolation,
                "Row has the wrong number of values",
                format!("expected {expected} values, received {}", values.len())
            );
        }

        if !counted {
            return Ok(TableRow::Plain(values));
        }

        match values.pop() {
            Some(Value::Integer(count)) if count > 0 => Ok(TableRow::WithCount {
                values,
                count: count as u64,
            }),
            other => bail!(
                ErrorKind::ProtocolViolation,
                "Row count must be a positive integer",
                format!("received {other:?}")
            ),
        }
    }
}
