//! Community document store for Guild Vault.
//!
//! [`DocumentStore`] is the in-memory, authoritative map from
//! [`CommunityId`](gv_types::CommunityId) to an opaque JSON document. It is
//! created empty at process start, populated by snapshot recovery, and then
//! mutated by collaborators under the exclusivity gate.
//!
//! # Modules
//!
//! - [`store`] — The [`DocumentStore`] itself
//! - [`backing`] — The [`DocumentBacking`] trait plus [`MemoryBacking`] and
//!   [`JsonFileBacking`]
//! - [`error`] — Error types

pub mod backing;
pub mod error;
pub mod store;

pub use backing::{DocumentBacking, JsonFileBacking, MemoryBacking};
pub use error::{DocsError, Result};
pub use store::{Document, DocumentStore};
