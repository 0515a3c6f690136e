use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bmt",
    about = "Bucket Merkle Tree: root digests and incremental persistence for key/value sets",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of bucket slots (overrides the config file)
    #[arg(long, global = true)]
    pub capacity: Option<usize>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the root digest of a write set
    Root(RootArgs),
    /// Persist a write set and print its root
    Commit(CommitArgs),
    /// Look up a key under a committed root
    Get(GetArgs),
    /// Summarize the index committed under a root
    Inspect(InspectArgs),
    /// Print the root digest of a transaction list
    TxRoot(TxRootArgs),
}

#[derive(Args)]
pub struct RootArgs {
    /// JSON object mapping keys to hex-encoded values
    pub write_set: PathBuf,
}

#[derive(Args)]
pub struct CommitArgs {
    pub write_set: PathBuf,
    #[arg(long)]
    pub store: PathBuf,
}

#[derive(Args)]
pub struct GetArgs {
    pub root: String,
    pub key: String,
    #[arg(long)]
    pub store: PathBuf,
}

#[derive(Args)]
pub struct InspectArgs {
    pub root: String,
    #[arg(long)]
    pub store: PathBuf,
}

#[derive(Args)]
pub struct TxRootArgs {
    /// JSON array of transactions
    pub transactions: PathBuf,
    /// Reject the list unless every transaction carries a valid signature
    #[arg(long)]
    pub verify: bool,
    /// Also persist the transactions to this store
    #[arg(long)]
    pub store: Option<PathBuf>,
}
