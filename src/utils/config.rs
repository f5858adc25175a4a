//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived file names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    settings_filename: String,
    db_extension: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                settings_filename: format!(".{pkg}.toml"),
                db_extension: pkg.to_string(),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Settings file looked up in the working directory (e.g. `.partindex.toml`).
    pub fn settings_filename(&self) -> &str {
        &self.settings_filename
    }

    /// Default index database name for a job shard, e.g. `job_3.partindex`.
    pub fn db_filename(&self, job_index: u64) -> String {
        format!("job_{job_index}.{}", self.db_extension)
    }
}

// ---- Environment (array job interface) ----

/// Environment variables the batch scheduler sets for each shard.
pub struct EnvKeys;

impl EnvKeys {
    pub const JOB_INDEX: &'static str = "AWS_BATCH_JOB_ARRAY_INDEX";
    pub const FIRST_CHECKPOINT: &'static str = "FIRST_CHECKPOINT";
    pub const BATCH_SIZE: &'static str = "BATCH_SIZE";
    pub const ARCHIVE_DIR: &'static str = "ARCHIVE_DIR";
}

// ---- Ledger layout ----

/// Ledgers per checkpoint block.
pub const LEDGERS_PER_CHECKPOINT: u32 = 64;

/// Highest checkpoint whose ledgers are all addressable with a u32 ledger number.
pub const MAX_CHECKPOINT: u32 = u32::MAX / LEDGERS_PER_CHECKPOINT;

pub const PUBLIC_NETWORK_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";

// ---- Workers / queue ----

/// Worker threads when not configured.
pub const DEFAULT_WORKERS: usize = 20;

/// Fetch attempts per checkpoint before it fails terminally.
pub const DEFAULT_MAX_FETCH_ATTEMPTS: u32 = 5;

/// How long a worker waits on an empty queue before re-checking for cancellation and completion.
pub const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---- Progress ----

/// Log progress every this many completed checkpoints.
pub const PROGRESS_LOG_INTERVAL: u64 = 100;

// ---- Index store ----

/// Lock shards for in-memory participant accumulation (reduces contention between workers).
pub const STORE_SHARDS: usize = 16;
