use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hreg",
    about = "Handle registry: reserve, rename and look up unique handles",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// JSON file holding the registry documents
    #[arg(long, global = true, default_value = "hreg-store.json")]
    pub store: PathBuf,

    /// TOML file with [registry] and [validator] tables
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a candidate handle the way an input field would
    Check(CheckArgs),
    /// Suggest a free generated handle without reserving it
    Generate,
    /// Reserve a handle for an owner
    Create(CreateArgs),
    /// Move an owner to a new handle
    Rename(RenameArgs),
    /// Find the owner holding a handle
    Lookup(LookupArgs),
    /// Show an owner's handle history
    History(HistoryArgs),
}

#[derive(Args)]
pub struct CheckArgs {
    pub candidate: String,
    /// Owner whose current handle counts as unchanged
    #[arg(long)]
    pub owner: Option<String>,
    /// Debounce delay in milliseconds (overrides config)
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

#[derive(Args)]
pub struct CreateArgs {
    /// Owner id; a new one is minted when omitted
    #[arg(long)]
    pub owner: Option<String>,
    /// Handle to reserve; a generated one is used when omitted
    #[arg(long)]
    pub handle: Option<String>,
}

#[derive(Args)]
pub struct RenameArgs {
    #[arg(long)]
    pub owner: String,
    pub handle: String,
}

#[derive(Args)]
pub struct LookupArgs {
    pub handle: String,
}

#[derive(Args)]
pub struct HistoryArgs {
    #[arg(long)]
    pub owner: String,
}
