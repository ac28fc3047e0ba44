use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use gv_docs::{DocumentStore, JsonFileBacking};
use gv_snapshot::{SnapshotConfig, Vault};
use gv_store::{BlobStore, DirBlobStore};
use gv_types::{CommunityId, UploadRecord};

use crate::cli::*;
use crate::config::VaultConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = VaultConfig::load(cli.config.as_deref())?;
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(execute(cli.command, &config))
}

pub async fn execute(command: Command, config: &VaultConfig) -> anyhow::Result<()> {
    let mut snapshot = config.snapshot_config();
    if let Command::Recover(args) = &command {
        snapshot.max_attempts = args.max_attempts;
    }
    let vault = open_vault(config, snapshot)?;
    match command {
        Command::Init(args) => cmd_init(&vault, args).await,
        Command::Persist => cmd_persist(&vault).await,
        Command::Load(args) => cmd_load(&vault, args).await,
        Command::Recover(_) => cmd_recover(&vault).await,
        Command::List(args) => cmd_list(&vault, args).await,
        Command::Show(args) => cmd_show(&vault, args).await,
    }
}

fn open_vault(config: &VaultConfig, snapshot: SnapshotConfig) -> anyhow::Result<Vault<DirBlobStore>> {
    let store = DirBlobStore::open(config.store_config())
        .with_context(|| format!("opening store at {}", config.store_root.display()))?;
    let documents = DocumentStore::new(Box::new(JsonFileBacking::new(&config.documents)));
    Ok(Vault::with_config(documents, Arc::new(store), snapshot))
}

async fn cmd_init(vault: &Vault<DirBlobStore>, args: InitArgs) -> anyhow::Result<()> {
    let existing = vault.store().list(1).await?;
    if !existing.is_empty() && !args.force {
        bail!("store already holds snapshots; use --force to add another");
    }
    let address = vault.writer().try_persist().await?;
    let communities = vault.gate().view(|store| store.len()).await?;
    println!("{} Initialized vault in {}", "✓".green().bold(), vault.store().root().display().to_string().bold());
    println!("  Snapshot: {}", address.to_hex().yellow());
    println!("  Communities: {}", communities.to_string().bold());
    Ok(())
}

async fn cmd_persist(vault: &Vault<DirBlobStore>) -> anyhow::Result<()> {
    let address = vault.writer().try_persist().await?;
    println!("{} Snapshot committed {}", "✓".green().bold(), address.to_hex().yellow());
    Ok(())
}

async fn cmd_load(vault: &Vault<DirBlobStore>, args: LoadArgs) -> anyhow::Result<()> {
    let address = vault.load(args.corrupted).await?;
    let communities = vault.gate().view(|store| store.len()).await?;
    let which = if args.corrupted { "penultimate" } else { "latest" };
    println!("{} Loaded {} snapshot {}", "✓".green().bold(), which, address.short_hex().yellow());
    println!("  Communities: {}", communities.to_string().bold());
    Ok(())
}

async fn cmd_recover(vault: &Vault<DirBlobStore>) -> anyhow::Result<()> {
    let attempts = vault.recover().await?;
    let communities = vault.gate().view(|store| store.len()).await?;
    println!("{} Recovered after {} attempt(s)", "✓".green().bold(), attempts.to_string().bold());
    println!("  Communities: {}", communities.to_string().bold());
    Ok(())
}

async fn cmd_list(vault: &Vault<DirBlobStore>, args: ListArgs) -> anyhow::Result<()> {
    let mut uploads = vault.store().list(args.limit).await?;
    UploadRecord::sort_newest_first(&mut uploads);
    if uploads.is_empty() {
        println!("No snapshots.");
        return Ok(());
    }
    for (i, upload) in uploads.iter().enumerate() {
        let marker = match i {
            0 => " (latest)".green().to_string(),
            1 => " (penultimate)".dimmed().to_string(),
            _ => String::new(),
        };
        println!(
            "{}  {}{}",
            upload.content_address.short_hex().yellow(),
            upload.created_at.to_rfc3339(),
            marker
        );
    }
    Ok(())
}

async fn cmd_show(vault: &Vault<DirBlobStore>, args: ShowArgs) -> anyhow::Result<()> {
    let id = CommunityId::parse(&args.community)?;
    let document = vault.gate().view(|store| store.get(&id).cloned()).await?;
    match document {
        Some(document) => {
            println!("Community {}", id.as_str().yellow().bold());
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
        None => bail!("unknown community {id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_in(dir: &std::path::Path) -> VaultConfig {
        VaultConfig {
            store_root: dir.join("store"),
            documents: dir.join("documents.json"),
            retry_delay_secs: 0,
            credential: None,
        }
    }

    fn write_documents(config: &VaultConfig, documents: serde_json::Value) {
        std::fs::write(&config.documents, serde_json::to_vec(&documents).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn init_refuses_to_reseed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        execute(Command::Init(InitArgs { force: false }), &config).await.unwrap();
        assert!(execute(Command::Init(InitArgs { force: false }), &config).await.is_err());
        execute(Command::Init(InitArgs { force: true }), &config).await.unwrap();

        let store = DirBlobStore::at_path(&config.store_root).unwrap();
        assert_eq!(store.list(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn persist_then_load_restores_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        write_documents(&config, json!({"A": {"x": 1}, "B": {"y": 2}}));
        execute(Command::Persist, &config).await.unwrap();

        std::fs::remove_file(&config.documents).unwrap();
        execute(Command::Load(LoadArgs { corrupted: false }), &config).await.unwrap();

        let restored: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&config.documents).unwrap()).unwrap();
        assert_eq!(restored, json!({"A": {"x": 1}, "B": {"y": 2}}));
    }

    #[tokio::test]
    async fn bounded_recover_on_empty_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let err = execute(Command::Recover(RecoverArgs { max_attempts: Some(2) }), &config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("need at least 1"));
    }

    #[tokio::test]
    async fn show_unknown_community_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        write_documents(&config, json!({"A": {}}));
        execute(Command::Show(ShowArgs { community: "A".into() }), &config).await.unwrap();
        assert!(execute(Command::Show(ShowArgs { community: "Z".into() }), &config)
            .await
            .is_err());
    }
}
