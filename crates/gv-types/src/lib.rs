//! Foundation types for Guild Vault.
//!
//! Every other `gv-*` crate depends on `gv-types`. The types here carry no
//! behavior beyond identity, parsing, and ordering.
//!
//! # Key Types
//!
//! - [`CommunityId`] — Stable internal identifier of a managed community
//! - [`ContentAddress`] — BLAKE3 handle of a committed snapshot bundle
//! - [`UploadRecord`] — One entry of the remote store's upload listing

pub mod address;
pub mod error;
pub mod identity;
pub mod upload;

pub use address::{AddressHasher, ContentAddress};
pub use error::TypeError;
pub use identity::CommunityId;
pub use upload::UploadRecord;
