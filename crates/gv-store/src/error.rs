use gv_types::{ContentAddress, TypeError};

/// Errors from bundle store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The upload listing could not be produced.
    #[error("listing failed: {0}")]
    Listing(String),

    /// A bundle submission was not committed.
    #[error("put failed: {0}")]
    Put(String),

    /// A bundle download failed before any content was returned.
    #[error("fetch of {address} failed: {reason}")]
    Fetch {
        address: ContentAddress,
        reason: String,
    },

    /// The bundle was fetched but reported not-ok by the store.
    #[error("bundle {0} is unavailable")]
    Unavailable(ContentAddress),

    /// The fetched files no longer hash to the bundle's address: the
    /// bundle is partial or cut short.
    #[error("bundle {address} is truncated (content hashes to {computed})")]
    Truncated {
        address: ContentAddress,
        computed: ContentAddress,
    },

    /// A blob's bytes are not valid UTF-8.
    #[error("blob {name} is not valid UTF-8")]
    Encoding { name: String },

    /// The configured credential does not match the store.
    #[error("access denied: {0}")]
    Unauthorized(String),

    /// Serialization or deserialization failure of store metadata.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid identifier: {0}")]
    Type(#[from] TypeError),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` if this error is the truncated-bundle signature.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
