//! Checkpoint workers: fetch a checkpoint's ledgers, decode its transactions, index participants.

use log::{info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::IndexBucket;
use crate::engine::db_ops::IndexStore;
use crate::engine::tools::checkpoint_ledger_range;
use crate::error::IndexerError;
use crate::ledger::{Ledger, LedgerCloseMeta, LedgerTransaction};
use crate::participants::participants_for_operations;

use super::context::PipelineContext;
use super::queue::Claim;

/// Write one transaction's participants to the four buckets. The successful buckets only
/// receive transactions whose result says they applied.
pub fn index_transaction(
    checkpoint: u32,
    transaction: &LedgerTransaction,
    store: &dyn IndexStore,
) -> Result<(), IndexerError> {
    let all = participants_for_operations(transaction, false)?;
    store.add_participants(checkpoint, IndexBucket::AllAll, &all)?;

    let payments = participants_for_operations(transaction, true)?;
    store.add_participants(checkpoint, IndexBucket::AllPayments, &payments)?;

    if transaction.successful() {
        store.add_participants(checkpoint, IndexBucket::SuccessfulAll, &all)?;
        store.add_participants(checkpoint, IndexBucket::SuccessfulPayments, &payments)?;
    }
    Ok(())
}

/// Decode every transaction of `ledger` and index it under `checkpoint`.
fn index_ledger(checkpoint: u32, ledger: &Ledger, ctx: &PipelineContext) -> Result<(), IndexerError> {
    let seq = ledger.header.ledger_seq;
    let reader = ctx
        .collaborators
        .decoder
        .open_transaction_reader(&ctx.network_passphrase, LedgerCloseMeta::from(ledger))
        .map_err(|source| IndexerError::Decode { ledger: seq, source })?;
    for transaction in reader {
        let transaction =
            transaction.map_err(|source| IndexerError::Decode { ledger: seq, source })?;
        index_transaction(checkpoint, &transaction, ctx.collaborators.store.as_ref())?;
    }
    Ok(())
}

/// Process every ledger of `checkpoint`. Archive failures come back as the transient
/// [`IndexerError::Fetch`]; everything else is fatal.
pub fn process_checkpoint(checkpoint: u32, ctx: &PipelineContext) -> Result<(), IndexerError> {
    let (start, end) = checkpoint_ledger_range(checkpoint).ok_or_else(|| {
        IndexerError::config("range", format!("checkpoint {checkpoint} is past the last ledger"))
    })?;
    info!("Processing checkpoint {} ledgers {}-{}", checkpoint, start, end);

    let ledgers = ctx
        .collaborators
        .archive
        .get_ledgers(start, end)
        .map_err(|source| IndexerError::Fetch { checkpoint, source })?;

    for seq in start..=end {
        if ctx.coordinator.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }
        // Skipping a ledger would silently leave holes in the index.
        let ledger = ledgers
            .get(&seq)
            .ok_or(IndexerError::MissingLedger {
                checkpoint,
                ledger: seq,
            })?;
        index_ledger(checkpoint, ledger, ctx)?;
    }
    Ok(())
}

/// Route a transient failure: another attempt, or a terminal failure once attempts run out.
fn retry_or_give_up(claim: Claim, err: IndexerError, ctx: &PipelineContext) {
    if claim.attempt >= ctx.max_fetch_attempts {
        ctx.coordinator.record_exhausted(IndexerError::RetriesExhausted {
            checkpoint: claim.checkpoint,
            attempts: claim.attempt,
            source: Box::new(err),
        });
        ctx.queue.settle();
        return;
    }
    warn!(
        "error getting ledgers (attempt {}/{}): {}",
        claim.attempt, ctx.max_fetch_attempts, err
    );
    ctx.queue.requeue(claim.retry());
}

/// Single worker: pull claims until the queue drains or the run is cancelled.
fn worker_loop(ctx: Arc<PipelineContext>) {
    while let Some(claim) = ctx.queue.next(ctx.coordinator.cancel_flag()) {
        // A panicking worker would leave its checkpoint outstanding forever and stall the others.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            process_checkpoint(claim.checkpoint, &ctx)
        }))
        .unwrap_or(Err(IndexerError::WorkerPanicked));
        match outcome {
            Ok(()) => {
                ctx.queue.settle();
                ctx.coordinator.record_completed();
            }
            Err(err) if err.is_transient() => retry_or_give_up(claim, err, &ctx),
            Err(err) => {
                ctx.coordinator.record_fatal(err);
                return;
            }
        }
    }
}

/// Spawn `workers` threads sharing `ctx`.
pub fn spawn_workers(ctx: &Arc<PipelineContext>, workers: usize) -> Vec<JoinHandle<()>> {
    (0..workers)
        .map(|_| {
            let ctx = Arc::clone(ctx);
            thread::spawn(move || worker_loop(ctx))
        })
        .collect()
}
