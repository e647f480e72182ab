use std::fmt;

use crate::error::{ErrorKind, SyncError};
use crate::sync_error;

/// Command verbs, identified on the wire by their numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Quit,
    Rows,
    Hash,
    Range,
    Protocol,
    Schema,
    TargetBlockSize,
    HashAlgorithm,
}

impl Verb {
    pub fn code(&self) -> u32 {
        match self {
            Verb::Quit => 0,
            Verb::Rows => 2,
            Verb::Hash => 7,
            Verb::Range => 8,
            Verb::Protocol => 32,
            Verb::Schema => 37,
            Verb::TargetBlockSize => 38,
            Verb::HashAlgorithm => 39,
        }
    }
}

impl TryFrom<u32> for Verb {
    type Error = SyncError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        let verb = match code {
            0 => Verb::Quit,
            2 => Verb::Rows,
            7 => Verb::Hash,
            8 => Verb::Range,
            32 => Verb::Protocol,
            37 => Verb::Schema,
            38 => Verb::TargetBlockSize,
            39 => Verb::HashAlgorithm,
            other => {
                return Err(sync_error!(
                    ErrorKind::ProtocolViolation,
                    "Unknown command",
                    format!("verb {other}")
                ));
            }
        };

        Ok(verb)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verb::Quit => "QUIT",
            Verb::Rows => "ROWS",
            Verb::Hash => "HASH",
            Verb::Range => "RANGE",
            Verb::Protocol => "PROTOCOL",
            Verb::Schema => "SCHEMA",
            Verb::TargetBlockSize => "TARGET_BLOCK_SIZE",
            Verb::HashAlgorithm => "HASH_ALGORITHM",
        };
        f.write_str(name)
    }
}
