//! DirBlobStore: directory-backed bundle store.
//!
//! Layout:
//! ```text
//! {root}/
//! ├── ACCESS                 # optional opaque credential
//! ├── bundles/
//! │   └── ab/
//! │       └── cdef0123.../   # remainder of the bundle address
//! │           ├── {id}.json
//! │           └── ...
//! ├── uploads/
//! │   └── {created_ms}-{address}[-n].json   # UploadRecord
//! └── staging/               # scratch space for in-progress puts
//! ```
//!
//! A put stages the bundle directory, renames it into place, then writes the
//! upload record. The record is the commit point: listing only reads
//! `uploads/`, so an interrupted put leaves no visible snapshot.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use gv_types::{ContentAddress, UploadRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bundle::{address_of, BlobFile, Bundle};
use crate::credential::StoreCredential;
use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobStore, Clock};

const ACCESS_FILE: &str = "ACCESS";

/// Configuration for a [`DirBlobStore`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirStoreConfig {
    /// Root directory of the store.
    pub root: PathBuf,
    /// Credential guarding the store. Not serialized.
    #[serde(skip)]
    pub credential: Option<StoreCredential>,
}

impl DirStoreConfig {
    pub fn at_path(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: StoreCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    fn bundles_dir(&self) -> PathBuf {
        self.root.join("bundles")
    }

    fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }
}

/// Filesystem-based bundle store.
#[derive(Clone)]
pub struct DirBlobStore {
    config: DirStoreConfig,
    clock: Clock,
}

impl DirBlobStore {
    /// Open (or create) a store at the configured root.
    ///
    /// A store created with a credential records it in `ACCESS`; reopening
    /// such a store requires the same credential.
    pub fn open(config: DirStoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(config.bundles_dir())?;
        fs::create_dir_all(config.uploads_dir())?;
        fs::create_dir_all(config.staging_dir())?;
        check_access(&config)?;
        info!(root = %config.root.display(), "bundle store opened");
        Ok(Self {
            config,
            clock: Arc::new(Utc::now),
        })
    }

    /// Open a store without a credential at `root`.
    pub fn at_path(root: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::open(DirStoreConfig::at_path(root))
    }

    /// Replace the clock used to stamp new uploads.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn bundle_dir(&self, address: &ContentAddress) -> PathBuf {
        let hex = address.to_hex();
        self.config.bundles_dir().join(&hex[..2]).join(&hex[2..])
    }

    fn put_blocking(&self, files: Vec<BlobFile>) -> StoreResult<ContentAddress> {
        validate_names(&files)?;
        let address = address_of(&files);
        let target = self.bundle_dir(&address);

        if !target.exists() {
            let staging = tempfile::Builder::new()
                .prefix("put-")
                .tempdir_in(self.config.staging_dir())?;
            for file in &files {
                fs::write(staging.path().join(&file.name), &file.data)?;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            if let Err(e) = fs::rename(staging.path(), &target) {
                // Another writer committed the same content first.
                if !target.exists() {
                    return Err(e.into());
                }
            }
        }

        let record = UploadRecord::new(address, (self.clock)());
        let json =
            serde_json::to_vec_pretty(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(self.config.staging_dir())?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        let stem = format!("{}-{}", record.created_at.timestamp_millis(), address.to_hex());
        // Same content committed twice within one millisecond still gets
        // two records.
        let mut seq = 0u32;
        loop {
            let name = match seq {
                0 => format!("{stem}.json"),
                n => format!("{stem}-{n}.json"),
            };
            match tmp.persist_noclobber(self.config.uploads_dir().join(name)) {
                Ok(_) => break,
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    tmp = e.file;
                    seq += 1;
                }
                Err(e) => return Err(StoreError::Io(e.error)),
            }
        }

        debug!(address = %address.short_hex(), files = files.len(), "bundle committed");
        Ok(address)
    }

    fn list_blocking(&self, size: usize) -> StoreResult<Vec<UploadRecord>> {
        let mut records = Vec::new();
        let entries = fs::read_dir(self.config.uploads_dir())
            .map_err(|e| StoreError::Listing(e.to_string()))?;
        for entry in entries {
            let path = entry.map_err(|e| StoreError::Listing(e.to_string()))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).map_err(|e| StoreError::Listing(e.to_string()))?;
            let record: UploadRecord = serde_json::from_slice(&bytes).map_err(|e| {
                StoreError::Listing(format!("unreadable upload record {}: {e}", path.display()))
            })?;
            records.push(record);
        }
        UploadRecord::sort_newest_first(&mut records);
        records.truncate(size);
        Ok(records)
    }

    fn get_blocking(&self, address: &ContentAddress) -> StoreResult<Bundle> {
        let dir = self.bundle_dir(address);
        if !dir.is_dir() {
            return Ok(Bundle::unavailable(*address));
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let data = fs::read(entry.path())?;
            files.push(BlobFile::new(name, data));
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Bundle::new(*address, files))
    }
}

impl std::fmt::Debug for DirBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirBlobStore")
            .field("root", &self.config.root)
            .finish()
    }
}

fn check_access(config: &DirStoreConfig) -> StoreResult<()> {
    let path = config.root.join(ACCESS_FILE);
    match (path.exists(), &config.credential) {
        (true, Some(cred)) => {
            let recorded = fs::read_to_string(&path)?;
            if recorded.trim_end() != cred.expose() {
                return Err(StoreError::Unauthorized("credential does not match store".into()));
            }
        }
        (true, None) => {
            return Err(StoreError::Unauthorized("store requires a credential".into()));
        }
        (false, Some(cred)) => fs::write(&path, cred.expose())?,
        (false, None) => {}
    }
    Ok(())
}

fn validate_names(files: &[BlobFile]) -> StoreResult<()> {
    let mut seen = HashSet::new();
    for file in files {
        let name = file.name.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
            return Err(StoreError::Put(format!("invalid blob name {name:?}")));
        }
        if !seen.insert(name) {
            return Err(StoreError::Put(format!("duplicate blob name {name:?}")));
        }
    }
    Ok(())
}

async fn blocking<T, F>(f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
}

#[async_trait]
impl BlobStore for DirBlobStore {
    async fn list(&self, size: usize) -> StoreResult<Vec<UploadRecord>> {
        let store = self.clone();
        blocking(move || store.list_blocking(size)).await
    }

    async fn put(&self, files: Vec<BlobFile>) -> StoreResult<ContentAddress> {
        let store = self.clone();
        blocking(move || store.put_blocking(files)).await
    }

    async fn get(&self, address: &ContentAddress) -> StoreResult<Bundle> {
        let store = self.clone();
        let address = *address;
        blocking(move || store.get_blocking(&address)).await
    }
}
