use config::shared::{ApplyConfig, BlockSizeConfig, ProtocolConfig, SyncConfig};

use crate::error::SyncResult;
use crate::hash::HashAlgorithm;
use crate::protocol::LATEST_PROTOCOL_VERSION;

/// Settings of one reconciliation session.
///
/// Built from a validated [`SyncConfig`] and then narrowed by the handshake, so every component
/// receives the negotiated values explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub protocol_version: u32,
    pub hash_algorithm: HashAlgorithm,
    /// Mismatching ranges hashing to this many bytes or fewer are fetched instead of subdivided.
    pub min_block_size: u64,
    /// Matching ranges stop doubling their row limit once they hash more than half of this.
    pub max_block_size: u64,
    pub max_buffered_bytes: usize,
    pub max_rows_to_select: usize,
    pub max_frame_bytes: usize,
    pub continue_on_mismatch: bool,
}

impl SessionConfig {
    /// Validates `config` and converts it into the settings requested by the destination.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        config.validate()?;

        Ok(Self {
            protocol_version: LATEST_PROTOCOL_VERSION,
            hash_algorithm: config.hash_algorithm.into(),
            min_block_size: config.block_size.minimum_bytes,
            max_block_size: config.block_size.maximum_bytes,
            max_buffered_bytes: config.apply.max_buffered_bytes,
            max_rows_to_select: config.apply.max_rows_to_select,
            max_frame_bytes: config.protocol.max_frame_bytes,
            continue_on_mismatch: config.schema.continue_on_mismatch,
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            protocol_version: LATEST_PROTOCOL_VERSION,
            hash_algorithm: HashAlgorithm::default(),
            min_block_size: BlockSizeConfig::DEFAULT_MINIMUM_BYTES,
            max_block_size: BlockSizeConfig::DEFAULT_MAXIMUM_BYTES,
            max_buffered_bytes: ApplyConfig::DEFAULT_MAX_BUFFERED_BYTES,
            max_rows_to_select: ApplyConfig::DEFAULT_MAX_ROWS_TO_SELECT,
            max_frame_bytes: ProtocolConfig::DEFAULT_MAX_FRAME_BYTES,
            continue_on_mismatch: false,
        }
    }
}
