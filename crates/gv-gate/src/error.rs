use gv_docs::DocsError;
use gv_types::CommunityId;

/// Errors from guarded document sequences.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// No document is registered under the identifier.
    #[error("unknown community {0}")]
    UnknownCommunity(CommunityId),

    /// The validation step refused the update; nothing was written.
    #[error("update of community {0} rejected by validation")]
    Rejected(CommunityId),

    /// The community is already registered.
    #[error("community {0} already exists")]
    AlreadyExists(CommunityId),

    /// Reload or flush of the local backing failed.
    #[error("document store error: {0}")]
    Docs(#[from] DocsError),
}

pub type GateResult<T> = Result<T, GateError>;
