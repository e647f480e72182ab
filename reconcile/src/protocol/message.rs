//! Request and response messages.
//!
//! A message is the MessagePack array `[verb, [arguments...]]`. Requests travel from the
//! destination to the source and responses back; both use the same verbs, so the receiving side
//! decides which of the two it expects.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::hash::Digest;
use crate::protocol::Verb;
use crate::schema::DatabaseSchema;
use crate::types::{Key, KeyRange, Value};

const NO_ARGUMENTS: [u8; 0] = [];

/// Arguments of a HASH request, echoed back in the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRequest {
    pub table: String,
    pub range: KeyRange,
    pub rows_to_hash: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashResponse {
    pub request: HashRequest,
    pub row_count: u64,
    pub digest: Digest,
}

/// Messages sent by the initiating (destination) side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Protocol { version: u32 },
    TargetBlockSize { bytes: u64 },
    HashAlgorithm { id: u8 },
    Schema,
    Range { table: String },
    Hash(HashRequest),
    Rows { table: String, range: KeyRange },
    Quit,
}

impl Request {
    pub fn verb(&self) -> Verb {
        match self {
            Request::Protocol { .. } => Verb::Protocol,
            Request::TargetBlockSize { .. } => Verb::TargetBlockSize,
            Request::HashAlgorithm { .. } => Verb::HashAlgorithm,
            Request::Schema => Verb::Schema,
            Request::Range { .. } => Verb::Range,
            Request::Hash(_) => Verb::Hash,
            Request::Rows { .. } => Verb::Rows,
            Request::Quit => Verb::Quit,
        }
    }

    pub fn encode(&self) -> SyncResult<Vec<u8>> {
        let verb = self.verb();
        match self {
            Request::Protocol { version } => encode_message(verb, &(version,)),
            Request::TargetBlockSize { bytes } => encode_message(verb, &(bytes,)),
            Request::HashAlgorithm { id } => encode_message(verb, &(id,)),
            Request::Schema | Request::Quit => encode_message(verb, &NO_ARGUMENTS),
            Request::Range { table } => encode_message(verb, &(table,)),
            Request::Hash(request) => encode_message(
                verb,
                &(
                    &request.table,
                    &request.range.prev_key,
                    &request.range.last_key,
                    request.rows_to_hash,
                ),
            ),
            Request::Rows { table, range } => {
                encode_message(verb, &(table, &range.prev_key, &range.last_key))
            }
        }
    }

    pub fn decode(payload: &[u8]) -> SyncResult<Self> {
        let (verb, arguments) = split_message(payload)?;

        let request = match verb {
            Verb::Protocol => {
                let (version,): (u32,) = decode_arguments(verb, arguments)?;
                Request::Protocol { version }
            }
            Verb::TargetBlockSize => {
                let (bytes,): (u64,) = decode_arguments(verb, arguments)?;
                Request::TargetBlockSize { bytes }
            }
            Verb::HashAlgorithm => {
                let (id,): (u8,) = decode_arguments(verb, arguments)?;
                Request::HashAlgorithm { id }
            }
            Verb::Schema => {
                let _: [u8; 0] = decode_arguments(verb, arguments)?;
                Request::Schema
            }
            Verb::Quit => {
                let _: [u8; 0] = decode_arguments(verb, arguments)?;
                Request::Quit
            }
            Verb::Range => {
                let (table,): (String,) = decode_arguments(verb, arguments)?;
                Request::Range { table }
            }
            Verb::Hash => {
                let (table, prev_key, last_key, rows_to_hash): (String, Key, Key, u64) =
                    decode_arguments(verb, arguments)?;
                Request::Hash(HashRequest {
                    table,
                    range: KeyRange::new(prev_key, last_key),
                    rows_to_hash,
                })
            }
            Verb::Rows => {
                let (table, prev_key, last_key): (String, Key, Key) =
                    decode_arguments(verb, arguments)?;
                Request::Rows {
                    table,
                    range: KeyRange::new(prev_key, last_key),
                }
            }
        };

        Ok(request)
    }
}

/// Messages sent by the responding (source) side.
///
/// A [`Response::Rows`] header is followed by row frames and an empty-array terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Protocol { version: u32 },
    TargetBlockSize { bytes: u64 },
    HashAlgorithm { id: u8 },
    Schema(DatabaseSchema),
    Range {
        table: String,
        first_key: Key,
        last_key: Key,
    },
    Hash(HashResponse),
    Rows { table: String, range: KeyRange },
}

impl Response {
    pub fn verb(&self) -> Verb {
        match self {
            Response::Protocol { .. } => Verb::Protocol,
            Response::TargetBlockSize { .. } => Verb::TargetBlockSize,
            Response::HashAlgorithm { .. } => Verb::HashAlgorithm,
            Response::Schema(_) => Verb::Schema,
            Response::Range { .. } => Verb::Range,
            Response::Hash(_) => Verb::Hash,
            Response::Rows { .. } => Verb::Rows,
        }
    }

    pub fn encode(&self) -> SyncResult<Vec<u8>> {
        let verb = self.verb();
        match self {
            Response::Protocol { version } => encode_message(verb, &(version,)),
            Response::TargetBlockSize { bytes } => encode_message(verb, &(bytes,)),
            Response::HashAlgorithm { id } => encode_message(verb, &(id,)),
            Response::Schema(schema) => encode_message(verb, &(schema,)),
            Response::Range {
                table,
                first_key,
                last_key,
            } => encode_message(verb, &(table, first_key, last_key)),
            Response::Hash(response) => encode_message(
                verb,
                &(
                    &response.request.table,
                    &response.request.range.prev_key,
                    &response.request.range.last_key,
                    response.request.rows_to_hash,
                    response.row_count,
                    &response.digest,
                ),
            ),
            Response::Rows { table, range } => {
                encode_message(verb, &(table, &range.prev_key, &range.last_key))
            }
        }
    }

    pub fn decode(payload: &[u8]) -> SyncResult<Self> {
        let (verb, arguments) = split_message(payload)?;

        let response = match verb {
            Verb::Protocol => {
                let (version,): (u32,) = decode_arguments(verb, arguments)?;
                Response::Protocol { version }
            }
            Verb::TargetBlockSize => {
                let (bytes,): (u64,) = decode_arguments(verb, arguments)?;
                Response::TargetBlockSize { bytes }
            }
            Verb::HashAlgorithm => {
                let (id,): (u8,) = decode_arguments(verb, arguments)?;
                Response::HashAlgorithm { id }
            }
            Verb::Schema => {
                let (schema,): (DatabaseSchema,) = decode_arguments(verb, arguments)?;
                Response::Schema(schema)
            }
            Verb::Range => {
                let (table, first_key, last_key): (String, Key, Key) =
                    decode_arguments(verb, arguments)?;
                Response::Range {
                    table,
                    first_key,
                    last_key,
                }
            }
            Verb::Hash => {
                let (table, prev_key, last_key, rows_to_hash, row_count, digest): (
                    String,
                    Key,
                    Key,
                    u64,
                    u64,
                    Digest,
                ) = decode_arguments(verb, arguments)?;
                Response::Hash(HashResponse {
                    request: HashRequest {
                        table,
                        range: KeyRange::new(prev_key, last_key),
                        rows_to_hash,
                    },
                    row_count,
                    digest,
                })
            }
            Verb::Rows => {
                let (table, prev_key, last_key): (String, Key, Key) =
                    decode_arguments(verb, arguments)?;
                Response::Rows {
                    table,
                    range: KeyRange::new(prev_key, last_key),
                }
            }
            Verb::Quit => bail!(
                ErrorKind::UnexpectedCommand,
                "QUIT is never sent as a response"
            ),
        };

        Ok(response)
    }
}

/// Encodes one row frame: an array of column values.
pub fn encode_row(values: &[Value]) -> SyncResult<Vec<u8>> {
    Ok(rmp_serde::to_vec(values)?)
}

/// Decodes one row frame. The empty array terminates a ROWS response and yields `None`.
pub fn decode_row(payload: &[u8]) -> SyncResult<Option<Vec<Value>>> {
    let values: Vec<Value> = rmp_serde::from_slice(payload)?;
    if values.is_empty() {
        return Ok(None);
    }

    Ok(Some(values))
}

/// Encodes the frame terminating a ROWS response.
pub fn encode_rows_end() -> SyncResult<Vec<u8>> {
    Ok(rmp_serde::to_vec(&NO_ARGUMENTS)?)
}

fn encode_message<A>(verb: Verb, arguments: &A) -> SyncResult<Vec<u8>>
where
    A: Serialize + ?Sized,
{
    let mut buffer = Vec::new();
    rmp::encode::write_array_len(&mut buffer, 2)?;
    rmp::encode::write_uint(&mut buffer, u64::from(verb.code()))?;
    rmp_serde::encode::write_named(&mut buffer, arguments)?;

    Ok(buffer)
}

fn split_message(payload: &[u8]) -> SyncResult<(Verb, &[u8])> {
    let mut cursor = payload;

    let length = rmp::decode::read_array_len(&mut cursor)?;
    if length != 2 {
        bail!(
            ErrorKind::ProtocolViolation,
            "Malformed command frame",
            format!("expected a verb and an argument list, got {length} elements")
        );
    }

    let code: u32 = rmp::decode::read_int(&mut cursor)?;
    let verb = Verb::try_from(code)?;

    Ok((verb, cursor))
}

fn decode_arguments<T>(verb: Verb, arguments: &[u8]) -> SyncResult<T>
where
    T: DeserializeOwned,
{
    rmp_serde::from_slice(arguments).map_err(|err| {
        crate::sync_error!(
            ErrorKind::ProtocolViolation,
            "Unexpected command arguments",
            format!("{verb}: {err}"),
            source: err
        )
    })
}
