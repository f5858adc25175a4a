//! Progress and failure accounting shared by all workers of one run.

use log::{error, info};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::engine::progress::{ProgressBar, progress_line, set_bar_position, update_progress_bar};
use crate::error::IndexerError;
use crate::utils::config::PROGRESS_LOG_INTERVAL;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the processed counter, the first fatal error, the checkpoints that ran out of
/// retries, and the cancel flag every worker watches.
pub struct Coordinator {
    total: u64,
    started: Instant,
    processed: AtomicU64,
    cancel: Arc<AtomicBool>,
    first_error: Mutex<Option<IndexerError>>,
    exhausted: Mutex<Vec<IndexerError>>,
    bar: Option<ProgressBar>,
}

impl Coordinator {
    pub fn new(total: u64, cancel: Arc<AtomicBool>) -> Self {
        Self {
            total,
            started: Instant::now(),
            processed: AtomicU64::new(0),
            cancel,
            first_error: Mutex::new(None),
            exhausted: Mutex::new(Vec::new()),
            bar: None,
        }
    }

    pub fn with_progress_bar(mut self, bar: ProgressBar) -> Self {
        self.bar = Some(bar);
        self
    }

    pub fn cancel_flag(&self) -> &AtomicBool {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Count one completed checkpoint; logs progress every [`PROGRESS_LOG_INTERVAL`] completions.
    /// Returns the new count.
    pub fn record_completed(&self) -> u64 {
        let n = self.processed.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(bar) = &self.bar {
            update_progress_bar(bar, 1);
        }
        if n.is_multiple_of(PROGRESS_LOG_INTERVAL) {
            info!("{}", progress_line(n, self.total, self.elapsed()));
        }
        n
    }

    /// Keep the first fatal error and cancel the run. Later errors are logged and dropped.
    pub fn record_fatal(&self, err: IndexerError) {
        let mut slot = lock(&self.first_error);
        if slot.is_none() {
            error!("{}", err);
            *slot = Some(err);
        } else if !matches!(err, IndexerError::Cancelled) {
            log::debug!("additional fatal error after abort: {}", err);
        }
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// A checkpoint failed for good after exhausting its retries. The run keeps going so the
    /// rest of the shard still completes, but it will not succeed.
    pub fn record_exhausted(&self, err: IndexerError) {
        error!("{}", err);
        lock(&self.exhausted).push(err);
    }

    /// Final verdict once all workers have exited: the first fatal error, else the first
    /// exhausted checkpoint, else `Cancelled` if the run was stopped, else the processed count.
    pub fn finish(&self) -> Result<u64, IndexerError> {
        let processed = self.processed();
        if let Some(bar) = &self.bar {
            set_bar_position(bar, processed as usize);
            eprintln!();
        }
        if let Some(err) = lock(&self.first_error).take() {
            return Err(err);
        }
        let mut exhausted = std::mem::take(&mut *lock(&self.exhausted));
        if !exhausted.is_empty() {
            exhausted.sort_by_key(|e| match e {
                IndexerError::RetriesExhausted { checkpoint, .. } => *checkpoint,
                _ => u32::MAX,
            });
            if exhausted.len() > 1 {
                error!("{} checkpoints failed after retries", exhausted.len());
            }
            return Err(exhausted.swap_remove(0));
        }
        if self.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }
        info!(
            "Processed {} checkpoints in {}",
            processed,
            crate::engine::tools::format_duration(self.elapsed())
        );
        Ok(processed)
    }
}
