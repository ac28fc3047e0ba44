//! Local representations a [`DocumentStore`](crate::DocumentStore) reloads
//! from and flushes to.
//!
//! The backing is distinct from the remote snapshot: it is what survives
//! between two collaborator sequences inside one process (and, for
//! [`JsonFileBacking`], what an operator can inspect on disk).

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use gv_types::CommunityId;
use tracing::debug;

use crate::error::{DocsError, Result};
use crate::store::Document;

/// Storage behind a document store.
pub trait DocumentBacking: Send + Sync {
    /// Read the full id → document map.
    fn read(&self) -> Result<HashMap<CommunityId, Document>>;

    /// Replace the stored map with `documents`.
    fn write(&self, documents: &HashMap<CommunityId, Document>) -> Result<()>;
}

/// Backing that keeps the last flushed map in memory.
#[derive(Debug, Default)]
pub struct MemoryBacking {
    documents: Mutex<HashMap<CommunityId, Document>>,
    writes: Mutex<u64>,
}

impl MemoryBacking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backing that already holds `documents`.
    pub fn with_documents(documents: HashMap<CommunityId, Document>) -> Self {
        Self {
            documents: Mutex::new(documents),
            writes: Mutex::new(0),
        }
    }

    /// Number of flushes received.
    pub fn write_count(&self) -> u64 {
        self.writes.lock().map(|w| *w).unwrap_or(0)
    }
}

impl DocumentBacking for MemoryBacking {
    fn read(&self) -> Result<HashMap<CommunityId, Document>> {
        let documents = self
            .documents
            .lock()
            .map_err(|e| DocsError::Unavailable(format!("lock poisoned: {e}")))?;
        Ok(documents.clone())
    }

    fn write(&self, documents: &HashMap<CommunityId, Document>) -> Result<()> {
        let mut stored = self
            .documents
            .lock()
            .map_err(|e| DocsError::Unavailable(format!("lock poisoned: {e}")))?;
        *stored = documents.clone();
        if let Ok(mut writes) = self.writes.lock() {
            *writes += 1;
        }
        Ok(())
    }
}

/// Backing that stores the map as one JSON object file.
///
/// A missing file reads as an empty map. Writes go to a temp file in the
/// same directory and are renamed over the target, so a crash mid-flush
/// leaves the previous content intact.
#[derive(Debug, Clone)]
pub struct JsonFileBacking {
    path: PathBuf,
}

impl JsonFileBacking {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentBacking for JsonFileBacking {
    fn read(&self) -> Result<HashMap<CommunityId, Document>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let bytes = fs::read(&self.path)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(HashMap::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| DocsError::Malformed {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write(&self, documents: &HashMap<CommunityId, Document>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        // Sorted output keeps the file diffable between flushes.
        let sorted: BTreeMap<&CommunityId, &Document> = documents.iter().collect();
        let json = serde_json::to_vec_pretty(&sorted)
            .map_err(|e| DocsError::Serialization(e.to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| DocsError::Io(e.error))?;
        debug!(path = %self.path.display(), communities = documents.len(), "documents flushed");
        Ok(())
    }
}
