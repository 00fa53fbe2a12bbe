use thiserror::Error;

/// Errors surfaced across the SDK boundary.
///
/// Classifiers never appear here: a duplicate or unmatched raw event is
/// steady-state behavior and is answered with `None`/no-op, not an error.
#[derive(Debug, Error)]
pub enum Error {
    /// No secret has ever been stored under this alias.
    #[error("no secret stored for alias '{alias}'")]
    KeyNotFound { alias: String },

    /// Stored ciphertext failed authentication (corrupted data or wrong
    /// key). Callers must treat this as "not authenticated" and re-auth.
    #[error("stored ciphertext failed authentication")]
    CryptoFailure,

    /// Some chunks were accepted and their rows deleted before a later
    /// chunk failed. The deleted chunks are gone; the remainder is retried
    /// on the next scheduled trigger.
    #[error("upload stopped after {posted_chunks}/{total_chunks} chunks: {cause}")]
    UploadPartialFailure {
        posted_chunks: usize,
        total_chunks: usize,
        #[source]
        cause: ApiError,
    },

    #[error(transparent)]
    Transport(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),

    #[error("timestamp out of representable range: {0}")]
    InvalidTimestamp(i64),
}

/// Failures reported by the network collaborator.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("server returned HTTP {status}")]
    Http { status: u16 },

    #[error("transport error: {message}")]
    Transport { message: String },
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Http { status: 401 })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
