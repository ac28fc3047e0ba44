use std::sync::Arc;

use gv_docs::DocumentStore;
use gv_gate::ExclusivityGate;
use gv_store::BlobStore;
use gv_types::ContentAddress;
use tracing::info;

use crate::config::SnapshotConfig;
use crate::error::RecoveryError;
use crate::reader::SnapshotReader;
use crate::recovery::{Recovery, Sleeper, TokioSleeper};
use crate::writer::SnapshotWriter;

/// The persistence context handed to the hosting process.
///
/// Owns the gate (and through it the document store) and shares the bundle
/// store. Construct one per process, or one per test, and pass it by
/// reference to collaborators.
pub struct Vault<S> {
    gate: Arc<ExclusivityGate>,
    store: Arc<S>,
    config: SnapshotConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl<S: BlobStore> Vault<S> {
    pub fn new(documents: DocumentStore, store: Arc<S>) -> Self {
        Self::with_config(documents, store, SnapshotConfig::default())
    }

    pub fn with_config(documents: DocumentStore, store: Arc<S>, config: SnapshotConfig) -> Self {
        Self {
            gate: Arc::new(ExclusivityGate::new(documents)),
            store,
            config,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the delay used between recovery attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// The gate collaborators use for every guarded sequence.
    pub fn gate(&self) -> &Arc<ExclusivityGate> {
        &self.gate
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn writer(&self) -> SnapshotWriter<S> {
        SnapshotWriter::new(Arc::clone(&self.gate), Arc::clone(&self.store))
    }

    pub fn reader(&self) -> SnapshotReader<S> {
        SnapshotReader::new(Arc::clone(&self.gate), Arc::clone(&self.store))
    }

    /// Commit one snapshot of the document store. Never raises.
    pub async fn persist(&self) -> bool {
        self.writer().persist().await
    }

    /// One load attempt; see [`SnapshotReader::load`].
    pub async fn load(&self, corrupted: bool) -> Result<ContentAddress, RecoveryError> {
        self.reader().load(corrupted).await
    }

    /// Retry loads until one succeeds; see [`Recovery::run`].
    pub async fn recover(&self) -> Result<u32, RecoveryError> {
        Recovery::new(self.reader(), self.config.clone(), Arc::clone(&self.sleeper))
            .run()
            .await
    }

    /// The one-time boot call: recover, then report how many communities
    /// are loaded.
    pub async fn boot(&self) -> Result<usize, RecoveryError> {
        let attempts = self.recover().await?;
        let communities = self.gate.acquire().await.len();
        info!(attempts, communities, "vault booted");
        Ok(communities)
    }

    /// Final snapshot before the process exits.
    pub async fn shutdown(&self) -> bool {
        info!("persisting before shutdown");
        self.persist().await
    }
}

impl<S> std::fmt::Debug for Vault<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("gate", &self.gate)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use gv_docs::{Document, JsonFileBacking, MemoryBacking};
    use gv_store::{DirBlobStore, InMemoryBlobStore};
    use gv_types::CommunityId;
    use proptest::prelude::*;
    use serde_json::json;

    fn id(s: &str) -> CommunityId {
        CommunityId::parse(s).unwrap()
    }

    fn backing_with(documents: HashMap<CommunityId, Document>) -> DocumentStore {
        DocumentStore::new(Box::new(MemoryBacking::with_documents(documents)))
    }

    async fn snapshot_of<S: BlobStore>(vault: &Vault<S>) -> HashMap<CommunityId, Document> {
        vault.gate().acquire().await.to_map()
    }

    #[tokio::test]
    async fn persist_then_load_into_fresh_store() {
        let store = Arc::new(InMemoryBlobStore::new());
        let source = Vault::new(
            backing_with(
                [(id("A"), json!({"x": 1})), (id("B"), json!({"y": 2}))]
                    .into_iter()
                    .collect(),
            ),
            Arc::clone(&store),
        );
        assert!(source.persist().await);

        let address = store.uploads()[0].content_address;
        let mut blobs: Vec<(String, Document)> = store
            .raw_files(&address)
            .unwrap()
            .into_iter()
            .map(|f| (f.name.clone(), serde_json::from_slice(&f.data).unwrap()))
            .collect();
        blobs.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            blobs,
            vec![
                ("A.json".to_string(), json!({"x": 1})),
                ("B.json".to_string(), json!({"y": 2})),
            ]
        );

        let fresh = Vault::new(DocumentStore::in_memory(), Arc::clone(&store));
        fresh.load(false).await.unwrap();
        let recovered = snapshot_of(&fresh).await;
        assert_eq!(recovered.len(), 2);
        assert_eq!(recovered[&id("A")], json!({"x": 1}));
        assert_eq!(recovered[&id("B")], json!({"y": 2}));
    }

    #[tokio::test]
    async fn failed_put_leaves_documents_untouched() {
        let store = Arc::new(InMemoryBlobStore::new());
        let vault = Vault::new(
            backing_with([(id("A"), json!({"x": 1}))].into_iter().collect()),
            Arc::clone(&store),
        );
        vault.gate().acquire().await.reload().unwrap();
        let before = snapshot_of(&vault).await;

        store.fail_next_puts(1);
        assert!(!vault.persist().await);
        assert_eq!(store.upload_count(), 0);
        assert_eq!(snapshot_of(&vault).await, before);
    }

    #[tokio::test]
    async fn penultimate_selection_by_creation_time() {
        let store = Arc::new(InMemoryBlobStore::new());
        let vault = Vault::new(DocumentStore::in_memory(), Arc::clone(&store));
        vault.gate().insert(id("A"), json!({"gen": 1})).await.unwrap();
        assert!(vault.persist().await);
        tokio::time::sleep(Duration::from_millis(5)).await;
        vault
            .gate()
            .update(&id("A"), |_| true, |doc| doc["gen"] = json!(2))
            .await
            .unwrap();
        assert!(vault.persist().await);

        let uploads = store.uploads();
        let (u2, u1) = (uploads[0].content_address, uploads[1].content_address);
        assert_eq!(vault.load(false).await.unwrap(), u2);
        assert_eq!(vault.load(true).await.unwrap(), u1);
        assert_eq!(snapshot_of(&vault).await[&id("A")], json!({"gen": 1}));
    }

    #[tokio::test(start_paused = true)]
    async fn store_calls_never_overlap() {
        let store = Arc::new(InMemoryBlobStore::new().with_latency(Duration::from_millis(20)));
        let vault = Arc::new(Vault::new(DocumentStore::in_memory(), Arc::clone(&store)));
        vault.gate().insert(id("A"), json!({"n": 0})).await.unwrap();
        assert!(vault.persist().await);

        let mut handles = Vec::new();
        for i in 0..12 {
            let vault = Arc::clone(&vault);
            handles.push(tokio::spawn(async move {
                match i % 3 {
                    0 => {
                        vault.persist().await;
                    }
                    1 => {
                        let _ = vault.load(false).await;
                    }
                    _ => {
                        vault
                            .gate()
                            .update(&CommunityId::parse("A").unwrap(), |_| true, |doc| {
                                let n = doc["n"].as_i64().unwrap_or(0);
                                doc["n"] = json!(n + 1);
                            })
                            .await
                            .unwrap();
                    }
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.max_concurrent_calls(), 1);
    }

    #[tokio::test]
    async fn boot_recovers_and_counts() {
        let store = Arc::new(InMemoryBlobStore::new());
        let seed = Vault::new(
            backing_with(
                [(id("A"), json!({})), (id("B"), json!({})), (id("C"), json!({}))]
                    .into_iter()
                    .collect(),
            ),
            Arc::clone(&store),
        );
        assert!(seed.shutdown().await);

        let vault = Vault::new(DocumentStore::in_memory(), store);
        assert_eq!(vault.boot().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn directory_store_and_file_backing_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let documents_path = dir.path().join("documents.json");
        let store = Arc::new(DirBlobStore::at_path(dir.path().join("store")).unwrap());

        {
            let vault = Vault::new(
                DocumentStore::new(Box::new(JsonFileBacking::new(&documents_path))),
                Arc::clone(&store),
            );
            vault.gate().insert(id("A"), json!({"x": 1})).await.unwrap();
            assert!(vault.shutdown().await);
        }
        std::fs::remove_file(&documents_path).unwrap();

        let vault = Vault::new(
            DocumentStore::new(Box::new(JsonFileBacking::new(&documents_path))),
            store,
        );
        assert_eq!(vault.boot().await.unwrap(), 1);
        // Recovery flushed the documents back to the local file.
        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&documents_path).unwrap()).unwrap();
        assert_eq!(on_disk, json!({"A": {"x": 1}}));
    }

    fn document_strategy() -> impl Strategy<Value = Document> {
        let leaf = prop_oneof![
            Just(Document::Null),
            any::<bool>().prop_map(Document::from),
            any::<i64>().prop_map(Document::from),
            "[a-z ]{0,12}".prop_map(Document::from),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Document::from),
                proptest::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Document::Object(m.into_iter().collect())),
            ]
        })
    }

    fn documents_strategy() -> impl Strategy<Value = HashMap<String, Document>> {
        proptest::collection::hash_map("[A-Za-z0-9_-]{1,16}", document_strategy(), 1..8)
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]

        #[test]
        fn persist_load_reconstructs_mapping(raw in documents_strategy()) {
            let documents: HashMap<CommunityId, Document> = raw
                .into_iter()
                .map(|(k, v)| (CommunityId::parse(&k).unwrap(), v))
                .collect();
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let recovered = rt.block_on(async {
                let store = Arc::new(InMemoryBlobStore::new());
                let source = Vault::new(backing_with(documents.clone()), Arc::clone(&store));
                assert!(source.persist().await);
                let fresh = Vault::new(DocumentStore::in_memory(), store);
                fresh.load(false).await.unwrap();
                snapshot_of(&fresh).await
            });
            prop_assert_eq!(recovered, documents);
        }
    }
}
