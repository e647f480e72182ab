use thiserror::Error;

/// Errors raised when a configuration is structurally valid but semantically unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A numeric field holds a value outside of its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// The minimum block size is larger than the maximum block size.
    #[error(
        "`block_size.minimum_bytes` ({minimum}) must not exceed `block_size.maximum_bytes` ({maximum})"
    )]
    BlockSizeRangeInverted { minimum: u64, maximum: u64 },
}
