//! Shard index build: run the checkpoint pipeline, then commit the store.

use log::info;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::engine::db_ops::IndexStore;
use crate::error::IndexerError;
use crate::pipeline::{Collaborators, run_pipeline, wait_for_pipeline};
use crate::{Opts, ShardSummary};

/// Commit everything the workers accumulated: accounts first, then the indexes.
pub fn finalize(store: &dyn IndexStore) -> Result<(), IndexerError> {
    info!("Uploading accounts");
    store.flush_accounts()?;
    info!("Uploading indexes");
    store.flush()?;
    Ok(())
}

/// Index every checkpoint in `opts.range` and flush the store.
///
/// All or nothing: on any fatal error (including a checkpoint that ran out of fetch attempts,
/// or `cancel` being set) this returns the error without flushing.
pub fn index_shard(
    opts: &Opts,
    collaborators: Collaborators,
    cancel: Arc<AtomicBool>,
) -> Result<ShardSummary, IndexerError> {
    info!(
        "Indexing checkpoints {} with {} workers",
        opts.range, opts.workers
    );
    let store = Arc::clone(&collaborators.store);
    let handles = run_pipeline(opts, collaborators, cancel)?;
    let checkpoints_processed = wait_for_pipeline(handles)?;
    finalize(store.as_ref())?;
    Ok(ShardSummary {
        range: opts.range,
        checkpoints_processed,
    })
}
