//! Checkpoint arithmetic and run-parameter parsing.

use std::time::Duration;

use crate::ShardRange;
use crate::error::IndexerError;
use crate::utils::config::{EnvKeys, LEDGERS_PER_CHECKPOINT, MAX_CHECKPOINT};

/// Checkpoint range owned by shard `job_index`:
/// `start = first_checkpoint + shard_size * job_index`, `end = start + shard_size - 1`.
pub fn shard_range(
    job_index: u64,
    first_checkpoint: u64,
    shard_size: u64,
) -> Result<ShardRange, IndexerError> {
    if shard_size == 0 {
        return Err(IndexerError::config(
            EnvKeys::BATCH_SIZE,
            "shard size must be greater than 0",
        ));
    }
    let out_of_range = || {
        IndexerError::config(
            EnvKeys::JOB_INDEX,
            format!(
                "shard {job_index} of size {shard_size} from checkpoint {first_checkpoint} exceeds the checkpoint space"
            ),
        )
    };
    let start = shard_size
        .checked_mul(job_index)
        .and_then(|offset| offset.checked_add(first_checkpoint))
        .ok_or_else(out_of_range)?;
    let end = start
        .checked_add(shard_size - 1)
        .ok_or_else(out_of_range)?;
    if end > u64::from(MAX_CHECKPOINT) {
        return Err(out_of_range());
    }
    Ok(ShardRange {
        start: start as u32,
        end: end as u32,
    })
}

/// Ledgers covered by `checkpoint`, inclusive. Ledger 0 does not exist, so checkpoint 0 starts at 1.
/// `None` past [`MAX_CHECKPOINT`], where ledger numbers no longer fit in a u32.
pub fn checkpoint_ledger_range(checkpoint: u32) -> Option<(u32, u32)> {
    let start = checkpoint.checked_mul(LEDGERS_PER_CHECKPOINT)?;
    let end = start.checked_add(LEDGERS_PER_CHECKPOINT - 1)?;
    Some((start.max(1), end))
}

/// Shard parameters as handed to a job by the batch scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardSpec {
    pub job_index: u64,
    pub first_checkpoint: u64,
    pub shard_size: u64,
}

impl ShardSpec {
    /// Read and parse the three shard parameters through `lookup` (env var name → raw value).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            job_index: parse_required(EnvKeys::JOB_INDEX, lookup(EnvKeys::JOB_INDEX))?,
            first_checkpoint: parse_required(
                EnvKeys::FIRST_CHECKPOINT,
                lookup(EnvKeys::FIRST_CHECKPOINT),
            )?,
            shard_size: parse_required(EnvKeys::BATCH_SIZE, lookup(EnvKeys::BATCH_SIZE))?,
        })
    }

    pub fn range(&self) -> Result<ShardRange, IndexerError> {
        shard_range(self.job_index, self.first_checkpoint, self.shard_size)
    }
}

/// Parse a required unsigned parameter; absent, empty and malformed values are configuration errors.
pub fn parse_required(parameter: &str, raw: Option<String>) -> Result<u64, IndexerError> {
    let raw = raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| IndexerError::config(parameter, "required"))?;
    raw.parse::<u64>()
        .map_err(|e| IndexerError::config(parameter, format!("'{raw}': {e}")))
}

/// Render a duration rounded to whole seconds, e.g. `1h2m3s`, `4m0s`, `12s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs() + u64::from(d.subsec_millis() >= 500);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m{s}s"),
        _ => format!("{h}h{m}m{s}s"),
    }
}
