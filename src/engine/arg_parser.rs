use clap::Parser;
use std::path::PathBuf;

use crate::utils::config::EnvKeys;

/// Build one shard of the account participation index.
///
/// Shard parameters are normally provided by the batch scheduler through the environment
/// (`AWS_BATCH_JOB_ARRAY_INDEX`, `FIRST_CHECKPOINT`, `BATCH_SIZE`); flags override them.
#[derive(Clone, Parser)]
#[command(name = "partindex")]
#[command(about = "Index account participation for one shard of a checkpoint range.")]
pub struct Cli {
    /// Shard index within the array job.
    #[arg(long, env = EnvKeys::JOB_INDEX)]
    pub job_index: Option<String>,

    /// First checkpoint of the whole job (shard 0 starts here).
    #[arg(long, env = EnvKeys::FIRST_CHECKPOINT)]
    pub first_checkpoint: Option<String>,

    /// Checkpoints per shard.
    #[arg(long, env = EnvKeys::BATCH_SIZE)]
    pub batch_size: Option<String>,

    /// Root directory of the ledger archive.
    #[arg(long, short = 'a', env = EnvKeys::ARCHIVE_DIR)]
    pub archive: Option<PathBuf>,

    /// Index database to write. Default: `job_<index>.partindex` in the current directory.
    #[arg(long, short)]
    pub db: Option<PathBuf>,

    /// Concurrent checkpoint workers. Default: 20.
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Passphrase of the network the archive belongs to. Default: public network.
    #[arg(long)]
    pub network_passphrase: Option<String>,

    /// Fetch attempts per checkpoint before the run fails. Default: 5.
    #[arg(long)]
    pub max_fetch_attempts: Option<u32>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// Show a progress bar.
    #[arg(long, short = 'p', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub progress: Option<bool>,
}
