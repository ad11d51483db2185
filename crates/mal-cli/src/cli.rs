use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "mal",
    about = "Merkle Anchor Ledger -- batch, anchor, and prove transaction identifiers",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Directory holding state.json and mal.toml
    #[arg(long, global = true, default_value = ".mal")]
    pub state: PathBuf,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Insert random leaf records
    Seed(SeedArgs),
    /// Commit all unlinked records of the next period
    Commit(CommitArgs),
    /// Verify identifiers against their anchored commit
    Verify(VerifyArgs),
    /// Run a sampled audit series over one commit
    Audit(AuditArgs),
    /// Print random identifiers of the latest commit
    SampleIds(SampleIdsArgs),
    /// Show a commit
    Show(ShowArgs),
    /// Recompute and store the proofs of a commit
    Repair(RepairArgs),
    /// Generate, commit, and audit in memory
    Simulate(SimulateArgs),
}

#[derive(Args)]
pub struct SeedArgs {
    #[arg(short = 'n', long, default_value = "30000")]
    pub count: usize,
}

#[derive(Args)]
pub struct CommitArgs {
    /// Override the configured period offset, in days
    #[arg(long, conflicts_with = "reference")]
    pub offset_days: Option<u32>,
    /// Finish the timed-out commit already submitted under this ledger
    /// reference instead of anchoring again
    #[arg(long)]
    pub reference: Option<String>,
}

#[derive(Args)]
pub struct VerifyArgs {
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args)]
pub struct AuditArgs {
    /// Commit to audit; the latest by default
    #[arg(long)]
    pub label: Option<u64>,
    /// Comma-separated sample sizes; the configured series by default
    #[arg(long, value_delimiter = ',')]
    pub samples: Vec<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args)]
pub struct SampleIdsArgs {
    #[arg(short = 'n', long, default_value = "1")]
    pub count: usize,
}

#[derive(Args)]
pub struct ShowArgs {
    pub label: Option<u64>,
}

#[derive(Args)]
pub struct RepairArgs {
    pub label: u64,
}

#[derive(Args)]
pub struct SimulateArgs {
    #[arg(long, default_value = "3")]
    pub runs: usize,
    #[arg(long, default_value = "30000")]
    pub leaves: usize,
    #[arg(long, value_delimiter = ',')]
    pub samples: Vec<usize>,
}
