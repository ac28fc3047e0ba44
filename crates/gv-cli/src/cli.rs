use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "gv",
    about = "Guild Vault — snapshot persistence for community state",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Seed the store with a first snapshot
    Init(InitArgs),
    /// Snapshot the local documents
    Persist,
    /// Make one load attempt
    Load(LoadArgs),
    /// Retry loads until one succeeds
    Recover(RecoverArgs),
    /// List the newest uploads
    List(ListArgs),
    /// Print one community document
    Show(ShowArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Seed even if the store already has snapshots
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct LoadArgs {
    /// Skip the most recent upload and load the penultimate one
    #[arg(long)]
    pub corrupted: bool,
}

#[derive(Args)]
pub struct RecoverArgs {
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: usize,
}

#[derive(Args)]
pub struct ShowArgs {
    pub community: String,
}
