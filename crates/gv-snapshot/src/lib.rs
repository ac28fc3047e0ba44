//! Snapshot protocol for Guild Vault.
//!
//! Treats a content-addressed bundle store as the durable backing of the
//! in-memory document store:
//!
//! - [`SnapshotWriter::persist`] bundles every community document as
//!   `{id}.json` and commits it. Failures are logged and reported as `false`.
//! - [`SnapshotReader::load`] installs the most recent snapshot, or the
//!   penultimate one after a truncated bundle.
//! - [`Recovery`] is the boot-time retry loop around `load`.
//! - [`Vault`] ties these to one [`ExclusivityGate`](gv_gate::ExclusivityGate)
//!   and is the context handed to the hosting process.
//!
//! Every operation runs inside the gate, including its network calls.

pub mod config;
pub mod error;
pub mod reader;
pub mod recovery;
pub mod vault;
pub mod writer;

pub use config::SnapshotConfig;
pub use error::{PersistError, RecoveryError, RecoveryErrorKind};
pub use reader::{parse_bundle, SnapshotReader};
pub use recovery::{Recovery, Sleeper, TokioSleeper};
pub use vault::Vault;
pub use writer::{bundle_documents, SnapshotWriter};
