//! Shared configuration types for reconciliation sessions.

mod base;
mod sync;

pub use base::ValidationError;
pub use sync::{
    ApplyConfig, BlockSizeConfig, HashAlgorithmConfig, ProtocolConfig, SchemaCheckConfig,
    SyncConfig,
};
