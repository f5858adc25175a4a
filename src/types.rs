//! Public and internal types for the partindex API and pipeline.

use std::fmt;
use std::path::PathBuf;

use crate::utils::config::{DEFAULT_MAX_FETCH_ATTEMPTS, DEFAULT_WORKERS, PUBLIC_NETWORK_PASSPHRASE};

/// Inclusive range of checkpoints owned by one job shard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardRange {
    pub start: u32,
    pub end: u32,
}

impl ShardRange {
    /// Number of checkpoints in the range.
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        u64::from(self.end) - u64::from(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Checkpoints in ascending order.
    pub fn checkpoints(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }

    pub fn contains(&self, checkpoint: u32) -> bool {
        self.checkpoints().contains(&checkpoint)
    }
}

impl fmt::Display for ShardRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Logical partition of the participant index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexBucket {
    /// Every transaction, every participant.
    AllAll,
    /// Every transaction, payments view.
    AllPayments,
    /// Successful transactions, every participant.
    SuccessfulAll,
    /// Successful transactions, payments view.
    SuccessfulPayments,
}

impl IndexBucket {
    pub const ALL: [IndexBucket; 4] = [
        IndexBucket::AllAll,
        IndexBucket::AllPayments,
        IndexBucket::SuccessfulAll,
        IndexBucket::SuccessfulPayments,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IndexBucket::AllAll => "all_all",
            IndexBucket::AllPayments => "all_payments",
            IndexBucket::SuccessfulAll => "successful_all",
            IndexBucket::SuccessfulPayments => "successful_payments",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Whether this bucket holds the payments-only participant view.
    pub fn payments_only(&self) -> bool {
        matches!(
            self,
            IndexBucket::AllPayments | IndexBucket::SuccessfulPayments
        )
    }
}

impl fmt::Display for IndexBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options for one shard run (CLI, settings file and lib callers).
#[derive(Clone, Debug)]
pub struct Opts {
    /// Checkpoints this shard owns.
    pub range: ShardRange,
    /// Concurrent workers; also the fresh-checkpoint queue capacity.
    pub workers: usize,
    /// Passphrase of the network the archive belongs to.
    pub network_passphrase: String,
    /// Fetch attempts per checkpoint before it fails terminally.
    pub max_fetch_attempts: u32,
    /// Show a progress bar in addition to periodic progress logging.
    pub progress_bar: bool,
}

impl Opts {
    pub fn new(range: ShardRange) -> Self {
        Self {
            range,
            workers: DEFAULT_WORKERS,
            network_passphrase: PUBLIC_NETWORK_PASSPHRASE.to_string(),
            max_fetch_attempts: DEFAULT_MAX_FETCH_ATTEMPTS,
            progress_bar: false,
        }
    }
}

/// Where the CLI reads ledgers from and writes the index to.
#[derive(Clone, Debug)]
pub struct Locations {
    pub archive_dir: PathBuf,
    pub db_path: PathBuf,
}

/// Outcome of a successful shard run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardSummary {
    pub range: ShardRange,
    pub checkpoints_processed: u64,
}
