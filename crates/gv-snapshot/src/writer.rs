use std::sync::Arc;

use gv_docs::DocumentStore;
use gv_gate::ExclusivityGate;
use gv_store::{BlobFile, BlobStore};
use gv_types::ContentAddress;
use tracing::{debug, error, info};

use crate::error::PersistError;

/// Serializes the whole document store into one bundle and commits it.
pub struct SnapshotWriter<S> {
    gate: Arc<ExclusivityGate>,
    store: Arc<S>,
}

impl<S> Clone for SnapshotWriter<S> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: BlobStore> SnapshotWriter<S> {
    pub fn new(gate: Arc<ExclusivityGate>, store: Arc<S>) -> Self {
        Self { gate, store }
    }

    /// Take one snapshot. Returns `false` on failure.
    ///
    /// Failures are logged and swallowed: the next periodic call is the
    /// retry. The document store is never modified.
    pub async fn persist(&self) -> bool {
        match self.try_persist().await {
            Ok(address) => {
                info!(address = %address.short_hex(), "snapshot committed");
                true
            }
            Err(e) => {
                error!(error = %e, "snapshot failed");
                false
            }
        }
    }

    /// Take one snapshot, returning the committed content address.
    ///
    /// Runs entirely inside the gate, across the upload round-trip.
    pub async fn try_persist(&self) -> Result<ContentAddress, PersistError> {
        let mut guard = self.gate.acquire().await;
        guard.reload()?;

        let files = bundle_documents(&guard)?;
        debug!(communities = files.len(), "uploading snapshot bundle");
        let address = self.store.put(files).await?;
        Ok(address)
    }
}

/// One `{id}.json` blob per community, ordered by file name.
pub fn bundle_documents(documents: &DocumentStore) -> Result<Vec<BlobFile>, PersistError> {
    let mut files = documents
        .entries()
        .map(|(id, document)| {
            let data = serde_json::to_vec(document).map_err(|e| PersistError::Serialization {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
            Ok(BlobFile::new(id.file_name(), data))
        })
        .collect::<Result<Vec<_>, PersistError>>()?;
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
