use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use gv_snapshot::SnapshotConfig;
use gv_store::{DirStoreConfig, StoreCredential};
use serde::{Deserialize, Serialize};

/// Environment variable holding the store credential.
pub const TOKEN_VAR: &str = "GUILDVAULT_STORE_TOKEN";

/// Config file read from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "guildvault.toml";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Root directory of the bundle store.
    pub store_root: PathBuf,
    /// Local JSON file backing the document store.
    pub documents: PathBuf,
    pub retry_delay_secs: u64,
    #[serde(skip)]
    pub credential: Option<StoreCredential>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("./vault"),
            documents: PathBuf::from("./vault/documents.json"),
            retry_delay_secs: 5,
            credential: None,
        }
    }
}

impl VaultConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] if present, else
    /// defaults. The credential comes from [`TOKEN_VAR`].
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.credential = StoreCredential::from_env(TOKEN_VAR);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn snapshot_config(&self) -> SnapshotConfig {
        SnapshotConfig::default().with_retry_delay(Duration::from_secs(self.retry_delay_secs))
    }

    pub fn store_config(&self) -> DirStoreConfig {
        let config = DirStoreConfig::at_path(&self.store_root);
        match &self.credential {
            Some(credential) => config.with_credential(credential.clone()),
            None => config,
        }
    }
}
