use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::ValidationError;

/// Digest algorithm requested by the destination during the handshake.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithmConfig {
    /// MD5 over the canonical row encoding.
    #[default]
    Md5,
    /// 64-bit xxHash over the canonical row encoding.
    Xxh64,
}

/// Bounds used when deciding how many rows a single HASH command may cover.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct BlockSizeConfig {
    /// Mismatching ranges hashing to this many bytes or fewer are fetched instead of subdivided.
    #[serde(default = "default_minimum_bytes")]
    pub minimum_bytes: u64,
    /// Matching ranges stop doubling once their hashed size passes half of this value.
    #[serde(default = "default_maximum_bytes")]
    pub maximum_bytes: u64,
}

impl BlockSizeConfig {
    /// Default lower bound, which lets subdivision go all the way down to single rows.
    pub const DEFAULT_MINIMUM_BYTES: u64 = 1;

    /// Default upper bound for the bytes folded into one digest.
    pub const DEFAULT_MAXIMUM_BYTES: u64 = 256 * 1024;
}

impl Default for BlockSizeConfig {
    fn default() -> Self {
        Self {
            minimum_bytes: default_minimum_bytes(),
            maximum_bytes: default_maximum_bytes(),
        }
    }
}

fn default_minimum_bytes() -> u64 {
    BlockSizeConfig::DEFAULT_MINIMUM_BYTES
}

fn default_maximum_bytes() -> u64 {
    BlockSizeConfig::DEFAULT_MAXIMUM_BYTES
}

/// Limits applied while writing fetched rows into the destination.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ApplyConfig {
    /// Received rows are reconciled against local data once this many bytes are buffered.
    #[serde(default = "default_max_buffered_bytes")]
    pub max_buffered_bytes: usize,
    /// Number of rows read from the local store per scan batch.
    #[serde(default = "default_max_rows_to_select")]
    pub max_rows_to_select: usize,
}

impl ApplyConfig {
    pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 16 * 1024 * 1024;

    pub const DEFAULT_MAX_ROWS_TO_SELECT: usize = 10_000;
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            max_buffered_bytes: default_max_buffered_bytes(),
            max_rows_to_select: default_max_rows_to_select(),
        }
    }
}

fn default_max_buffered_bytes() -> usize {
    ApplyConfig::DEFAULT_MAX_BUFFERED_BYTES
}

fn default_max_rows_to_select() -> usize {
    ApplyConfig::DEFAULT_MAX_ROWS_TO_SELECT
}

/// Wire-level limits.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ProtocolConfig {
    /// Largest frame sent to or accepted from the peer.
    ///
    /// Each row of a ROWS response travels in its own frame, so this also caps the encoded size
    /// of a single row. A row larger than this fails the session with a frame size error.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl ProtocolConfig {
    pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

fn default_max_frame_bytes() -> usize {
    ProtocolConfig::DEFAULT_MAX_FRAME_BYTES
}

/// Behaviour of the schema check that precedes reconciliation.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct SchemaCheckConfig {
    /// Keep reconciling tables with matching schemas after another table failed the check.
    #[serde(default)]
    pub continue_on_mismatch: bool,
}

/// Configuration of one reconciliation session on the destination side.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    #[serde(default)]
    pub hash_algorithm: HashAlgorithmConfig,
    #[serde(default)]
    pub block_size: BlockSizeConfig,
    #[serde(default)]
    pub apply: ApplyConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub schema: SchemaCheckConfig,
}

impl SyncConfig {
    /// Validates the configuration.
    ///
    /// Every size must be non-zero and the block size bounds must not be inverted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_zero("block_size.minimum_bytes", self.block_size.minimum_bytes)?;
        non_zero("block_size.maximum_bytes", self.block_size.maximum_bytes)?;
        non_zero(
            "apply.max_buffered_bytes",
            self.apply.max_buffered_bytes as u64,
        )?;
        non_zero(
            "apply.max_rows_to_select",
            self.apply.max_rows_to_select as u64,
        )?;
        non_zero(
            "protocol.max_frame_bytes",
            self.protocol.max_frame_bytes as u64,
        )?;

        if self.block_size.minimum_bytes > self.block_size.maximum_bytes {
            return Err(ValidationError::BlockSizeRangeInverted {
                minimum: self.block_size.minimum_bytes,
                maximum: self.block_size.maximum_bytes,
            });
        }

        Ok(())
    }
}

impl Config for SyncConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

fn non_zero(field: &str, value: u64) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::InvalidFieldValue {
            field: field.to_string(),
            constraint: "must be greater than 0".to_string(),
        });
    }

    Ok(())
}
