use gv_docs::DocsError;
use gv_store::StoreError;
use gv_types::ContentAddress;

/// Category of a failed load attempt.
///
/// The recovery loop branches on this, never on message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecoveryErrorKind {
    /// Listing failed or returned fewer uploads than requested.
    Listing,
    /// The selected bundle could not be downloaded.
    Fetch,
    /// The downloaded bundle is partial or corrupt.
    Truncation,
    /// A blob is not valid JSON or not a valid community file.
    Parse,
    /// The local document backing failed.
    Local,
}

/// Errors from a single snapshot load attempt.
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    /// The listing call itself failed.
    #[error("listing uploads failed: {0}")]
    Listing(#[source] StoreError),

    /// The listing returned fewer uploads than the attempt needs.
    #[error("listing returned {found} uploads, need at least {needed}")]
    InsufficientHistory { needed: usize, found: usize },

    /// Download failed, or the store answered not-ok.
    #[error("fetching bundle {address} failed: {reason}")]
    Fetch {
        address: ContentAddress,
        reason: String,
    },

    /// The bundle no longer matches its content address.
    #[error("bundle {address} is truncated")]
    Truncated {
        address: ContentAddress,
        #[source]
        source: StoreError,
    },

    /// A blob could not be turned into a community document.
    #[error("blob {name} in bundle {address} is unreadable: {reason}")]
    Parse {
        address: ContentAddress,
        name: String,
        reason: String,
    },

    /// Flushing the recovered documents failed.
    #[error("local document store error: {0}")]
    Local(#[from] DocsError),
}

impl RecoveryError {
    pub fn kind(&self) -> RecoveryErrorKind {
        match self {
            Self::Listing(_) | Self::InsufficientHistory { .. } => RecoveryErrorKind::Listing,
            Self::Fetch { .. } => RecoveryErrorKind::Fetch,
            Self::Truncated { .. } => RecoveryErrorKind::Truncation,
            Self::Parse { .. } => RecoveryErrorKind::Parse,
            Self::Local(_) => RecoveryErrorKind::Local,
        }
    }

    /// Returns `true` if the next attempt should skip to the penultimate
    /// snapshot.
    pub fn is_truncation(&self) -> bool {
        self.kind() == RecoveryErrorKind::Truncation
    }

    /// Classify an error raised while fetching or unpacking `address`.
    pub(crate) fn from_fetch(address: ContentAddress, err: StoreError) -> Self {
        match err {
            e if e.is_truncation() => Self::Truncated { address, source: e },
            StoreError::Encoding { name } => Self::Parse {
                address,
                name,
                reason: "not valid UTF-8".into(),
            },
            e => Self::Fetch {
                address,
                reason: e.to_string(),
            },
        }
    }
}

/// Errors from a snapshot write.
///
/// [`SnapshotWriter::persist`](crate::SnapshotWriter::persist) logs these
/// and reports a boolean; they surface only through
/// [`try_persist`](crate::SnapshotWriter::try_persist).
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("local document store error: {0}")]
    Local(#[from] DocsError),

    #[error("serializing community {id}: {reason}")]
    Serialization { id: String, reason: String },

    #[error("bundle upload failed: {0}")]
    Store(#[from] StoreError),
}
