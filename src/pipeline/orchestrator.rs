use log::debug;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::Opts;
use crate::engine::progress::create_progress_bar;
use crate::error::IndexerError;
use crate::utils::config::MAX_CHECKPOINT;

use super::context::{Collaborators, PipelineContext, PipelineHandles};
use super::coordinator::Coordinator;
use super::queue::{CheckpointQueue, spawn_producer};
use super::worker::spawn_workers;

fn validate_opts(opts: &Opts) -> Result<(), IndexerError> {
    if opts.workers == 0 {
        return Err(IndexerError::config("workers", "must be greater than 0"));
    }
    if opts.max_fetch_attempts == 0 {
        return Err(IndexerError::config(
            "max_fetch_attempts",
            "must be greater than 0",
        ));
    }
    if opts.range.is_empty() {
        return Err(IndexerError::config(
            "range",
            format!("empty checkpoint range {}", opts.range),
        ));
    }
    if opts.range.end > MAX_CHECKPOINT {
        return Err(IndexerError::config(
            "range",
            format!(
                "checkpoint range {} ends past checkpoint {}",
                opts.range, MAX_CHECKPOINT
            ),
        ));
    }
    Ok(())
}

/// Start the producer and worker threads over `opts.range`. Caller must pass the handles to
/// [`wait_for_pipeline`]. Setting `cancel` stops producer and workers at their next check.
pub fn run_pipeline(
    opts: &Opts,
    collaborators: Collaborators,
    cancel: Arc<AtomicBool>,
) -> Result<PipelineHandles, IndexerError> {
    validate_opts(opts)?;

    let (queue, fresh_tx) = CheckpointQueue::new(opts.range, opts.workers);
    let mut coordinator = Coordinator::new(opts.range.len(), Arc::clone(&cancel));
    if opts.progress_bar {
        coordinator =
            coordinator.with_progress_bar(create_progress_bar(opts.range.len() as usize, "Indexing"));
    }

    let ctx = Arc::new(PipelineContext {
        collaborators,
        network_passphrase: opts.network_passphrase.clone(),
        max_fetch_attempts: opts.max_fetch_attempts,
        queue,
        coordinator,
    });

    debug!(
        "Starting {} workers over checkpoints {} ({} checkpoints)",
        opts.workers,
        opts.range,
        opts.range.len()
    );
    let producer_handle = spawn_producer(fresh_tx, opts.range, cancel);
    let worker_handles = spawn_workers(&ctx, opts.workers);

    Ok(PipelineHandles {
        producer_handle,
        worker_handles,
        ctx,
    })
}

/// Join workers and producer, then return the run's verdict: the processed count, or the
/// first fatal error (a retries-exhausted checkpoint counts as fatal here).
pub fn wait_for_pipeline(handles: PipelineHandles) -> Result<u64, IndexerError> {
    let PipelineHandles {
        producer_handle,
        worker_handles,
        ctx,
    } = handles;

    for h in worker_handles {
        if h.join().is_err() {
            ctx.coordinator.record_fatal(IndexerError::WorkerPanicked);
        }
    }
    // Workers only exit once the fresh lane is closed or the run is cancelled, so the producer
    // is finished or about to notice the cancel flag.
    let sent = producer_handle
        .join()
        .map_err(|_| IndexerError::WorkerPanicked)?;
    debug!(
        "main: queue drained, {} checkpoints enqueued, {} outstanding",
        sent,
        ctx.queue.outstanding()
    );

    ctx.coordinator.finish()
}
