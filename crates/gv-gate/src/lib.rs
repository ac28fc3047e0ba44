//! Exclusivity gate for Guild Vault.
//!
//! One lock for the whole process. Neither the document store nor the remote
//! bundle store offers transactions, so the gate is the only thing that makes
//! collaborator read-modify-write sequences and the snapshot protocol
//! serializable. All state-mutating work is therefore globally sequential.
//!
//! # Quick Start
//!
//! ```rust
//! use gv_docs::DocumentStore;
//! use gv_gate::ExclusivityGate;
//! use gv_types::CommunityId;
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let gate = ExclusivityGate::new(DocumentStore::in_memory());
//! let id = CommunityId::new();
//! gate.insert(id.clone(), json!({"config": {}})).await.unwrap();
//! gate.update(&id, |_| true, |doc| doc["config"]["captchaSteps"] = json!(3))
//!     .await
//!     .unwrap();
//! # });
//! ```

pub mod config;
pub mod error;
pub mod gate;

pub use config::GateConfig;
pub use error::{GateError, GateResult};
pub use gate::{ExclusivityGate, GateGuard};
