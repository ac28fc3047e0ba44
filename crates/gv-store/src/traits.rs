use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gv_types::{ContentAddress, UploadRecord};

use crate::bundle::{BlobFile, Bundle};
use crate::error::StoreResult;

/// Source of upload creation timestamps for local backends.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Client contract of a remote content-addressed bundle store.
///
/// All implementations must satisfy these invariants:
/// - A bundle is committed atomically by [`put`](Self::put): either the
///   returned address is listed afterwards, or nothing new is listed.
/// - Committed bundles are immutable and never deleted through this trait.
/// - The store never interprets blob contents.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// The `size` most recent uploads.
    ///
    /// Backends are not required to return them sorted; callers order the
    /// response with [`UploadRecord::sort_newest_first`].
    async fn list(&self, size: usize) -> StoreResult<Vec<UploadRecord>>;

    /// Commit `files` as one bundle and return its content address.
    async fn put(&self, files: Vec<BlobFile>) -> StoreResult<ContentAddress>;

    /// Fetch the bundle committed under `address`.
    ///
    /// An address the store cannot serve yields a not-ok [`Bundle`] rather
    /// than an error.
    async fn get(&self, address: &ContentAddress) -> StoreResult<Bundle>;
}

#[async_trait]
impl<S: BlobStore + ?Sized> BlobStore for Arc<S> {
    async fn list(&self, size: usize) -> StoreResult<Vec<UploadRecord>> {
        (**self).list(size).await
    }

    async fn put(&self, files: Vec<BlobFile>) -> StoreResult<ContentAddress> {
        (**self).put(files).await
    }

    async fn get(&self, address: &ContentAddress) -> StoreResult<Bundle> {
        (**self).get(address).await
    }
}
