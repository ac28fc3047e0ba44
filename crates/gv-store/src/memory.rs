use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use gv_types::{ContentAddress, UploadRecord};
use tracing::debug;

use crate::bundle::{address_of, BlobFile, Bundle};
use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobStore, Clock};

/// Pending injected failures, consumed one per call.
#[derive(Default, Debug)]
struct Faults {
    puts: u32,
    listings: u32,
    gets: u32,
}

/// In-memory, HashMap-based bundle store.
///
/// Intended for tests and embedding. Bundles and upload records are held
/// behind `RwLock`s. Besides the [`BlobStore`] contract it offers fault
/// injection (failed puts, listings, and fetches, truncated bundles), an
/// optional artificial latency per call, and call accounting so tests can
/// observe how many store calls overlapped.
pub struct InMemoryBlobStore {
    bundles: RwLock<HashMap<ContentAddress, Vec<BlobFile>>>,
    uploads: RwLock<Vec<UploadRecord>>,
    clock: Clock,
    latency: Option<Duration>,
    faults: Mutex<Faults>,
    fetches: Mutex<Vec<ContentAddress>>,
    listing_sizes: Mutex<Vec<usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryBlobStore {
    /// Create a new empty store stamping uploads with the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    /// Create a new empty store stamping uploads with `clock`.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            bundles: RwLock::new(HashMap::new()),
            uploads: RwLock::new(Vec::new()),
            clock,
            latency: None,
            faults: Mutex::new(Faults::default()),
            fetches: Mutex::new(Vec::new()),
            listing_sizes: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Make every store call wait `latency` before completing.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of uploads committed so far.
    pub fn upload_count(&self) -> usize {
        self.uploads.read().expect("lock poisoned").len()
    }

    /// Every upload, newest first.
    pub fn uploads(&self) -> Vec<UploadRecord> {
        let mut uploads = self.uploads.read().expect("lock poisoned").clone();
        UploadRecord::sort_newest_first(&mut uploads);
        uploads
    }

    /// The stored files of a bundle, without integrity checking.
    pub fn raw_files(&self, address: &ContentAddress) -> Option<Vec<BlobFile>> {
        self.bundles
            .read()
            .expect("lock poisoned")
            .get(address)
            .cloned()
    }

    /// Fail the next `n` calls to `put`.
    pub fn fail_next_puts(&self, n: u32) {
        self.faults.lock().expect("lock poisoned").puts = n;
    }

    /// Fail the next `n` calls to `list`.
    pub fn fail_next_listings(&self, n: u32) {
        self.faults.lock().expect("lock poisoned").listings = n;
    }

    /// Answer the next `n` calls to `get` with a not-ok bundle.
    pub fn fail_next_gets(&self, n: u32) {
        self.faults.lock().expect("lock poisoned").gets = n;
    }

    /// Cut the last file of a stored bundle in half, as an interrupted
    /// upload would. Returns `false` if the bundle is unknown or empty.
    pub fn corrupt(&self, address: &ContentAddress) -> bool {
        let mut bundles = self.bundles.write().expect("lock poisoned");
        let Some(files) = bundles.get_mut(address) else {
            return false;
        };
        match files.iter_mut().max_by(|a, b| a.name.cmp(&b.name)) {
            Some(last) => {
                let keep = last.data.len() / 2;
                last.data.truncate(keep);
                true
            }
            None => false,
        }
    }

    /// Addresses passed to `get`, in call order.
    pub fn fetch_log(&self) -> Vec<ContentAddress> {
        self.fetches.lock().expect("lock poisoned").clone()
    }

    /// Sizes passed to `list`, in call order.
    pub fn listing_sizes(&self) -> Vec<usize> {
        self.listing_sizes.lock().expect("lock poisoned").clone()
    }

    /// Highest number of store calls that were ever in flight at once.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn take_fault(&self, pick: impl FnOnce(&mut Faults) -> &mut u32) -> bool {
        let mut faults = self.faults.lock().expect("lock poisoned");
        let counter = pick(&mut faults);
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }

    /// Mark a call in flight and apply the configured latency.
    async fn enter(&self) -> CallGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = CallGuard { store: self };
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        guard
    }
}

struct CallGuard<'a> {
    store: &'a InMemoryBlobStore,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.store.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn list(&self, size: usize) -> StoreResult<Vec<UploadRecord>> {
        let _call = self.enter().await;
        self.listing_sizes.lock().expect("lock poisoned").push(size);
        if self.take_fault(|f| &mut f.listings) {
            return Err(StoreError::Listing("injected listing failure".into()));
        }
        let mut uploads = self.uploads.read().expect("lock poisoned").clone();
        UploadRecord::sort_newest_first(&mut uploads);
        uploads.truncate(size);
        Ok(uploads)
    }

    async fn put(&self, files: Vec<BlobFile>) -> StoreResult<ContentAddress> {
        let _call = self.enter().await;
        if self.take_fault(|f| &mut f.puts) {
            return Err(StoreError::Put("injected put failure".into()));
        }
        let address = address_of(&files);
        let record = UploadRecord::new(address, (self.clock)());
        // Bundle first, then the listing entry: a reader never sees an
        // upload whose bundle is missing.
        self.bundles
            .write()
            .expect("lock poisoned")
            .entry(address)
            .or_insert(files);
        self.uploads.write().expect("lock poisoned").push(record);
        debug!(address = %address.short_hex(), "bundle committed");
        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> StoreResult<Bundle> {
        let _call = self.enter().await;
        self.fetches.lock().expect("lock poisoned").push(*address);
        if self.take_fault(|f| &mut f.gets) {
            return Ok(Bundle::unavailable(*address));
        }
        let bundles = self.bundles.read().expect("lock poisoned");
        Ok(match bundles.get(address) {
            Some(files) => Bundle::new(*address, files.clone()),
            None => Bundle::unavailable(*address),
        })
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("upload_count", &self.upload_count())
            .field("latency", &self.latency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicI64;

    fn stepping_clock() -> Clock {
        let tick = Arc::new(AtomicI64::new(1_700_000_000));
        Arc::new(move || {
            let secs = tick.fetch_add(60, Ordering::SeqCst);
            Utc.timestamp_opt(secs, 0).unwrap()
        })
    }

    fn files(tag: &str) -> Vec<BlobFile> {
        vec![BlobFile::new("a.json", format!(r#"{{"tag":"{tag}"}}"#))]
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryBlobStore::new();
        let address = store.put(files("one")).await.unwrap();
        let bundle = store.get(&address).await.unwrap();
        assert!(bundle.is_ok());
        assert_eq!(bundle.files().unwrap(), files("one").as_slice());
        assert_eq!(store.fetch_log(), vec![address]);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_bounded() {
        let store = InMemoryBlobStore::with_clock(stepping_clock());
        let first = store.put(files("1")).await.unwrap();
        let second = store.put(files("2")).await.unwrap();
        let third = store.put(files("3")).await.unwrap();

        let all = store.list(10).await.unwrap();
        let order: Vec<ContentAddress> = all.iter().map(|r| r.content_address).collect();
        assert_eq!(order, vec![third, second, first]);

        let top = store.list(2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].content_address, third);
        assert!(store.list(0).await.unwrap().is_empty());
        assert_eq!(store.listing_sizes(), vec![10, 2, 0]);
    }

    #[tokio::test]
    async fn unknown_address_is_not_ok() {
        let store = InMemoryBlobStore::new();
        let bundle = store.get(&ContentAddress::from_hash([7; 32])).await.unwrap();
        assert!(!bundle.is_ok());
    }

    #[tokio::test]
    async fn injected_put_failure_commits_nothing() {
        let store = InMemoryBlobStore::new();
        store.fail_next_puts(1);
        assert!(matches!(store.put(files("x")).await, Err(StoreError::Put(_))));
        assert_eq!(store.upload_count(), 0);
        store.put(files("x")).await.unwrap();
        assert_eq!(store.upload_count(), 1);
    }

    #[tokio::test]
    async fn injected_listing_and_get_failures_are_consumed() {
        let store = InMemoryBlobStore::new();
        let address = store.put(files("x")).await.unwrap();
        store.fail_next_listings(1);
        store.fail_next_gets(1);
        assert!(matches!(store.list(1).await, Err(StoreError::Listing(_))));
        assert_eq!(store.list(1).await.unwrap().len(), 1);
        assert!(!store.get(&address).await.unwrap().is_ok());
        assert!(store.get(&address).await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn corrupted_bundle_reports_truncation() {
        let store = InMemoryBlobStore::new();
        let address = store.put(files("long enough content")).await.unwrap();
        assert!(store.corrupt(&address));
        let err = store.get(&address).await.unwrap().files().unwrap_err();
        assert!(err.is_truncation());
        assert!(!store.corrupt(&ContentAddress::from_hash([1; 32])));
    }

    #[tokio::test]
    async fn identical_bundles_share_an_address() {
        let store = InMemoryBlobStore::new();
        let a = store.put(files("same")).await.unwrap();
        let b = store.put(files("same")).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.upload_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_calls_are_counted() {
        let store = Arc::new(InMemoryBlobStore::new().with_latency(Duration::from_millis(50)));
        let a = Arc::clone(&store);
        let b = Arc::clone(&store);
        let (ra, rb) = tokio::join!(
            async move { a.list(1).await },
            async move { b.list(1).await }
        );
        ra.unwrap();
        rb.unwrap();
        assert_eq!(store.max_concurrent_calls(), 2);
    }
}
