//! Snapshot bundle storage for Guild Vault.
//!
//! This crate defines the client contract of the remote content-addressed
//! store that holds Guild Vault snapshots, and ships two local backends for
//! it. A snapshot is a bundle of `{community}.json` blobs committed under a
//! single content address; the store lists uploads by creation time.
//!
//! # Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`InMemoryBlobStore`] -- `HashMap`-based store with fault injection for tests
//! - [`DirBlobStore`] -- directory-backed store for local operation
//!
//! # Design Rules
//!
//! 1. Bundles are immutable once committed.
//! 2. Commit is atomic: a failed put leaves no new upload in the listing.
//! 3. Fetched files are verified against their address before use; a
//!    mismatch is reported as [`StoreError::Truncated`].
//! 4. The store never interprets blob contents.

pub mod bundle;
pub mod credential;
pub mod dir;
pub mod error;
pub mod memory;
pub mod traits;

pub use bundle::{address_of, BlobFile, Bundle};
pub use credential::StoreCredential;
pub use dir::{DirBlobStore, DirStoreConfig};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBlobStore;
pub use traits::{BlobStore, Clock};
