use std::collections::HashMap;
use std::sync::Arc;

use gv_docs::Document;
use gv_gate::ExclusivityGate;
use gv_store::{BlobFile, BlobStore};
use gv_types::{CommunityId, ContentAddress, UploadRecord};
use tracing::{debug, info, warn};

use crate::error::RecoveryError;

/// Repopulates the document store from a committed snapshot.
pub struct SnapshotReader<S> {
    gate: Arc<ExclusivityGate>,
    store: Arc<S>,
}

impl<S> Clone for SnapshotReader<S> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: BlobStore> SnapshotReader<S> {
    pub fn new(gate: Arc<ExclusivityGate>, store: Arc<S>) -> Self {
        Self { gate, store }
    }

    /// One load attempt, entirely inside the gate.
    ///
    /// Loads the most recent snapshot, or the penultimate one when
    /// `corrupted` is set. Every recovered document is installed over the
    /// backing's current content and the result is flushed back, so
    /// communities missing from the snapshot are kept. The store is only
    /// touched once the whole bundle has parsed. Returns the address that
    /// was loaded.
    pub async fn load(&self, corrupted: bool) -> Result<ContentAddress, RecoveryError> {
        let mut guard = self.gate.acquire().await;

        let upload = self.resolve(corrupted).await?;
        let address = upload.content_address;
        if corrupted {
            warn!(address = %address.short_hex(), "last upload treated as corrupted, using penultimate");
        }

        debug!(address = %address.short_hex(), "fetching snapshot bundle");
        let bundle = self
            .store
            .get(&address)
            .await
            .map_err(|e| RecoveryError::from_fetch(address, e))?;
        let files = bundle
            .files()
            .map_err(|e| RecoveryError::from_fetch(address, e))?;
        let recovered = parse_bundle(address, files)?;

        // Overlay on what the backing holds, not only on what is in memory.
        guard.reload()?;
        let previous = guard.to_map();
        let mut documents = previous.clone();
        let count = recovered.len();
        documents.extend(recovered);
        guard.replace_all(documents);
        if let Err(e) = guard.flush() {
            guard.replace_all(previous);
            return Err(e.into());
        }

        info!(
            address = %address.short_hex(),
            created_at = %upload.created_at,
            communities = count,
            "snapshot loaded"
        );
        Ok(address)
    }

    /// Pick the upload to load. Callers hold the gate.
    async fn resolve(&self, corrupted: bool) -> Result<UploadRecord, RecoveryError> {
        let needed = if corrupted { 2 } else { 1 };
        let mut uploads = self
            .store
            .list(needed)
            .await
            .map_err(RecoveryError::Listing)?;
        UploadRecord::sort_newest_first(&mut uploads);
        uploads
            .get(needed - 1)
            .copied()
            .ok_or(RecoveryError::InsufficientHistory {
                needed,
                found: uploads.len(),
            })
    }
}

/// Turn a bundle's blobs into community documents.
///
/// Blobs without the `.json` suffix are skipped. Any unreadable blob fails
/// the whole bundle.
pub fn parse_bundle(
    address: ContentAddress,
    files: &[BlobFile],
) -> Result<HashMap<CommunityId, Document>, RecoveryError> {
    let mut documents = HashMap::with_capacity(files.len());
    for file in files {
        let id = match CommunityId::from_file_name(&file.name) {
            Some(Ok(id)) => id,
            Some(Err(e)) => {
                return Err(RecoveryError::Parse {
                    address,
                    name: file.name.clone(),
                    reason: e.to_string(),
                })
            }
            None => {
                warn!(name = %file.name, "skipping non-document blob");
                continue;
            }
        };
        let text = file
            .text()
            .map_err(|e| RecoveryError::from_fetch(address, e))?;
        let document: Document = serde_json::from_str(text).map_err(|e| RecoveryError::Parse {
            address,
            name: file.name.clone(),
            reason: e.to_string(),
        })?;
        documents.insert(id, document);
    }
    Ok(documents)
}
