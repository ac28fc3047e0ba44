use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use gv_docs::{Document, DocumentStore};
use gv_types::CommunityId;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{trace, warn};

use crate::config::GateConfig;
use crate::error::{GateError, GateResult};

// ---------------------------------------------------------------------------
// GateGuard
// ---------------------------------------------------------------------------

/// Exclusive access to the document store.
///
/// Released when dropped, on every exit path including `?` returns and
/// panics unwinding through the holder.
pub struct GateGuard<'a> {
    inner: MutexGuard<'a, DocumentStore>,
    acquired_at: Instant,
    hold_warning: Duration,
}

impl Deref for GateGuard<'_> {
    type Target = DocumentStore;

    fn deref(&self) -> &DocumentStore {
        &self.inner
    }
}

impl DerefMut for GateGuard<'_> {
    fn deref_mut(&mut self) -> &mut DocumentStore {
        &mut self.inner
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        let held = self.acquired_at.elapsed();
        if held > self.hold_warning {
            warn!(held_ms = held.as_millis() as u64, "exclusivity gate held past warning threshold");
        } else {
            trace!(held_ms = held.as_millis() as u64, "exclusivity gate released");
        }
    }
}

// ---------------------------------------------------------------------------
// ExclusivityGate
// ---------------------------------------------------------------------------

/// The single process-wide lock over the document store.
///
/// Exactly one holder at a time. Every sequence that spans a read, a
/// mutation and a write of the store, or that runs the snapshot protocol,
/// acquires the gate first. There is no read-only fast path. Waiters are
/// served in FIFO order.
///
/// The gate owns the [`DocumentStore`], so the store cannot be reached
/// without holding it.
pub struct ExclusivityGate {
    store: Mutex<DocumentStore>,
    config: GateConfig,
    acquisitions: AtomicU64,
}

impl ExclusivityGate {
    pub fn new(store: DocumentStore) -> Self {
        Self::with_config(store, GateConfig::default())
    }

    pub fn with_config(store: DocumentStore, config: GateConfig) -> Self {
        Self {
            store: Mutex::new(store),
            config,
            acquisitions: AtomicU64::new(0),
        }
    }

    /// Wait for the gate and take it.
    pub async fn acquire(&self) -> GateGuard<'_> {
        let inner = self.store.lock().await;
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        trace!("exclusivity gate acquired");
        GateGuard {
            inner,
            acquired_at: Instant::now(),
            hold_warning: self.config.hold_warning,
        }
    }

    /// Take the gate only if nobody holds it.
    pub fn try_acquire(&self) -> Option<GateGuard<'_>> {
        let inner = self.store.try_lock().ok()?;
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        Some(GateGuard {
            inner,
            acquired_at: Instant::now(),
            hold_warning: self.config.hold_warning,
        })
    }

    /// Total number of times the gate has been taken.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Reload the store and run `f` against it, inside the gate.
    pub async fn view<T>(&self, f: impl FnOnce(&DocumentStore) -> T) -> GateResult<T> {
        let mut guard = self.acquire().await;
        guard.reload()?;
        Ok(f(&guard))
    }

    /// Register a new community document: reload, insert, flush.
    pub async fn insert(&self, id: CommunityId, document: Document) -> GateResult<()> {
        let mut guard = self.acquire().await;
        guard.reload()?;
        if guard.contains(&id) {
            return Err(GateError::AlreadyExists(id));
        }
        guard.set(id, document);
        guard.flush()?;
        Ok(())
    }

    /// Guarded read-modify-write of one community document.
    ///
    /// Inside the gate: reload, look up `id`, run `validate` on the current
    /// document, apply `mutate`, store and flush. A failed validation
    /// leaves both the store and the backing untouched. Returns the new
    /// document.
    pub async fn update<V, M>(&self, id: &CommunityId, validate: V, mutate: M) -> GateResult<Document>
    where
        V: FnOnce(&Document) -> bool,
        M: FnOnce(&mut Document),
    {
        let mut guard = self.acquire().await;
        guard.reload()?;
        let mut document = guard
            .get(id)
            .cloned()
            .ok_or_else(|| GateError::UnknownCommunity(id.clone()))?;
        if !validate(&document) {
            return Err(GateError::Rejected(id.clone()));
        }
        mutate(&mut document);
        guard.set(id.clone(), document.clone());
        guard.flush()?;
        Ok(document)
    }
}

impl std::fmt::Debug for ExclusivityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusivityGate")
            .field("acquisitions", &self.acquisitions())
            .finish()
    }
}
