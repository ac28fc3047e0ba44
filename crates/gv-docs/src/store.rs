use std::collections::HashMap;
use std::fmt;

use gv_types::CommunityId;
use serde_json::Value;
use tracing::debug;

use crate::backing::{DocumentBacking, MemoryBacking};
use crate::error::Result;

/// Opaque per-community state document.
pub type Document = Value;

/// In-memory map from community identifier to state document.
///
/// The store has no internal locking. Any sequence that reads, mutates and
/// writes documents must run under the exclusivity gate; two unguarded
/// collaborators can lose each other's updates between `reload` and `flush`.
pub struct DocumentStore {
    documents: HashMap<CommunityId, Document>,
    backing: Box<dyn DocumentBacking>,
}

impl DocumentStore {
    /// Create an empty store over `backing`. Nothing is read until
    /// [`reload`](Self::reload).
    pub fn new(backing: Box<dyn DocumentBacking>) -> Self {
        Self {
            documents: HashMap::new(),
            backing,
        }
    }

    /// Create an empty store over a fresh [`MemoryBacking`].
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBacking::new()))
    }

    /// Replace the in-memory map with the backing's content.
    pub fn reload(&mut self) -> Result<()> {
        self.documents = self.backing.read()?;
        debug!(communities = self.documents.len(), "documents reloaded");
        Ok(())
    }

    /// Write the in-memory map to the backing.
    pub fn flush(&self) -> Result<()> {
        self.backing.write(&self.documents)
    }

    pub fn get(&self, id: &CommunityId) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn get_mut(&mut self, id: &CommunityId) -> Option<&mut Document> {
        self.documents.get_mut(id)
    }

    /// Install `document` under `id`, returning the previous document.
    pub fn set(&mut self, id: CommunityId, document: Document) -> Option<Document> {
        self.documents.insert(id, document)
    }

    /// All entries, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&CommunityId, &Document)> {
        self.documents.iter()
    }

    /// All identifiers, sorted.
    pub fn ids(&self) -> Vec<CommunityId> {
        let mut ids: Vec<CommunityId> = self.documents.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, id: &CommunityId) -> bool {
        self.documents.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// A copy of the whole map.
    pub fn to_map(&self) -> HashMap<CommunityId, Document> {
        self.documents.clone()
    }

    /// Replace the whole in-memory map without touching the backing.
    pub fn replace_all(&mut self, documents: HashMap<CommunityId, Document>) {
        self.documents = documents;
    }
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("communities", &self.documents.len())
            .finish()
    }
}
