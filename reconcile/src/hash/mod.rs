//! Content hashing of ordered row sequences.
//!
//! Every row is folded into the digest as a MessagePack array of its values (with the duplicate
//! count appended for counted rows). MessagePack gives `nil` its own marker and length-prefixes
//! strings and binaries, so two different row sequences never produce the same byte stream.

use std::fmt;
use std::io;

use config::shared::HashAlgorithmConfig;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::Xxh64;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::types::{TableRow, Value};

/// Digest algorithm negotiated for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashAlgorithm {
    #[default]
    Md5,
    Xxh64,
}

impl HashAlgorithm {
    /// Identifier sent in the `HASH_ALGORITHM` handshake command.
    pub fn wire_id(&self) -> u8 {
        match self {
            HashAlgorithm::Md5 => 0,
            HashAlgorithm::Xxh64 => 1,
        }
    }

    pub fn from_wire_id(id: u8) -> SyncResult<Self> {
        match id {
            0 => Ok(HashAlgorithm::Md5),
            1 => Ok(HashAlgorithm::Xxh64),
            other => bail!(
                ErrorKind::UnsupportedHashAlgorithm,
                "Unsupported hash algorithm",
                format!("algorithm id {other}")
            ),
        }
    }
}

impl From<HashAlgorithmConfig> for HashAlgorithm {
    fn from(config: HashAlgorithmConfig) -> Self {
        match config {
            HashAlgorithmConfig::Md5 => HashAlgorithm::Md5,
            HashAlgorithmConfig::Xxh64 => HashAlgorithm::Xxh64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Md5 => f.write_str("md5"),
            HashAlgorithm::Xxh64 => f.write_str("xxh64"),
        }
    }
}

/// Digest bytes: 16 for MD5, 8 (big-endian) for xxHash64.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(#[serde(with = "serde_bytes")] Vec<u8>);

impl Digest {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

enum HashState {
    Md5(md5::Context),
    Xxh64(Xxh64),
}

impl io::Write for HashState {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            HashState::Md5(context) => context.consume(buf),
            HashState::Xxh64(state) => state.update(buf),
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Counts the bytes passing through to the digest state.
struct CountingWriter<'a> {
    state: &'a mut HashState,
    written: u64,
}

impl io::Write for CountingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = io::Write::write(&mut *self.state, buf)?;
        self.written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Incremental hasher over rows in key order.
pub struct RowHasher {
    state: HashState,
    row_count: u64,
    size: u64,
}

impl RowHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Md5 => HashState::Md5(md5::Context::new()),
            HashAlgorithm::Xxh64 => HashState::Xxh64(Xxh64::new(0)),
        };

        Self {
            state,
            row_count: 0,
            size: 0,
        }
    }

    /// Folds one logical row into the digest.
    pub fn update(&mut self, row: &TableRow) -> SyncResult<()> {
        let mut writer = CountingWriter {
            state: &mut self.state,
            written: 0,
        };

        let values = row.values();
        match row {
            TableRow::Plain(_) => {
                rmp::encode::write_array_len(&mut writer, values.len() as u32)?;
            }
            TableRow::WithCount { .. } => {
                rmp::encode::write_array_len(&mut writer, values.len() as u32 + 1)?;
            }
        }

        for value in values {
            write_value(&mut writer, value)?;
        }

        if let TableRow::WithCount { count, .. } = row {
            rmp::encode::write_uint(&mut writer, *count)?;
        }

        self.size += writer.written;
        self.row_count += 1;

        Ok(())
    }

    /// Number of logical rows folded in so far.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Number of encoded bytes folded in so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn finish(self) -> Digest {
        match self.state {
            HashState::Md5(context) => Digest(context.compute().0.to_vec()),
            HashState::Xxh64(state) => Digest(state.digest().to_be_bytes().to_vec()),
        }
    }
}

fn write_value<W: io::Write>(writer: &mut W, value: &Value) -> SyncResult<()> {
    match value {
        Value::Null => {
            rmp::encode::write_nil(writer)?;
        }
        Value::Integer(value) => {
            rmp::encode::write_sint(writer, *value)?;
        }
        Value::Text(text) => {
            rmp::encode::write_str(writer, text)?;
        }
        Value::Binary(bytes) => {
            rmp::encode::write_bin(writer, bytes)?;
        }
    }

    Ok(())
}

/// Hashes a complete row sequence, returning the row count and digest.
pub fn hash_rows<'a, I>(algorithm: HashAlgorithm, rows: I) -> SyncResult<(u64, Digest)>
where
    I: IntoIterator<Item = &'a TableRow>,
{
    let mut hasher = RowHasher::new(algorithm);
    for row in rows {
        hasher.update(row)?;
    }

    Ok((hasher.row_count(), hasher.finish()))
}
