/// Unified error types for the HCS DID resolver
use thiserror::Error;

/// Main error type for DID resolution
#[derive(Error, Debug)]
pub enum DidError {
    /// Malformed constructor arguments, bad id formats, unsupported types
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed base64, JSON, multibase or event payloads
    #[error("Decode error: {0}")]
    Decode(String),

    /// Stored multicodec prefix does not match the expected codec
    #[error("Multicodec mismatch: expected {expected}, found {actual}")]
    CodecMismatch { expected: String, actual: String },

    /// Raw public key bytes of a length/prefix no supported key type uses
    #[error("Unsupported public key length: {0} bytes")]
    UnsupportedKeyLength(usize),

    /// Structurally invalid DID string
    #[error("DID string is invalid: {0}")]
    InvalidDid(String),

    /// DID string without the `_<topicId>` suffix
    #[error("DID string is invalid: topic ID is missing")]
    TopicIdMissing,

    /// Mirror node failures
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Registration-state conflicts (duplicate owner, unauthorized owner change)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Signing or signature verification errors
    #[error("Signature error: {0}")]
    Signature(String),

    /// Invalid resolver configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resolution abandoned through a cancellation handle
    #[error("Resolution cancelled")]
    Cancelled,

    /// Resolution ran past the configured hard deadline
    #[error("Resolution exceeded hard deadline of {0:?}")]
    DeadlineExceeded(std::time::Duration),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for DID operations
pub type DidResult<T> = Result<T, DidError>;
