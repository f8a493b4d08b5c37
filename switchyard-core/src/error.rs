use thiserror::Error;

/// Errors raised by pool operations.
///
/// Duplicates and policy drops are reported through `Ok(false)`, never through
/// this type. Only the `RaiseError` overflow policy surfaces here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("Pool '{pool}' is full (max_size={max_size})")]
    Overflow { pool: String, max_size: usize },
}

/// Errors raised while decoding or validating an event at the transport boundary.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Missing required routing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid routing field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Malformed event body: {0}")]
    Decode(#[from] serde_json::Error),
}
