//! Checkpoint work queue: a bounded fresh lane fed by one producer, plus a retry lane.
//!
//! Retries go to their own unbounded lane so a worker putting a checkpoint back never blocks
//! on a full fresh lane. The queue is drained when the fresh lane is closed and every
//! checkpoint has been settled (completed or failed for good).

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded, select, unbounded};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crate::ShardRange;
use crate::utils::config::QUEUE_POLL_INTERVAL;

/// A checkpoint handed to a worker, with the fetch attempt this is (1-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Claim {
    pub checkpoint: u32,
    pub attempt: u32,
}

impl Claim {
    pub fn first(checkpoint: u32) -> Self {
        Self {
            checkpoint,
            attempt: 1,
        }
    }

    pub fn retry(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }
}

pub struct CheckpointQueue {
    fresh_rx: Receiver<u32>,
    retry_tx: Sender<Claim>,
    retry_rx: Receiver<Claim>,
    outstanding: AtomicU64,
}

impl CheckpointQueue {
    /// Queue over `range` whose fresh lane holds at most `capacity` checkpoints. Returns the
    /// queue and the sender the producer fills; dropping that sender closes the fresh lane.
    pub fn new(range: ShardRange, capacity: usize) -> (Self, Sender<u32>) {
        let (fresh_tx, fresh_rx) = bounded::<u32>(capacity.max(1));
        let (retry_tx, retry_rx) = unbounded::<Claim>();
        let queue = Self {
            fresh_rx,
            retry_tx,
            retry_rx,
            outstanding: AtomicU64::new(range.len()),
        };
        (queue, fresh_tx)
    }

    /// Checkpoints not yet settled.
    pub fn outstanding(&self) -> u64 {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Mark one claimed checkpoint as done for good (completed or terminally failed).
    pub fn settle(&self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }

    /// Put a claim back for another attempt.
    pub fn requeue(&self, claim: Claim) {
        // The queue owns a retry receiver, so this cannot fail while `self` is alive.
        let _ = self.retry_tx.send(claim);
    }

    /// Next checkpoint to work on. Blocks while lanes are empty but work is still outstanding;
    /// `None` once the queue is drained or `cancel` is set.
    pub fn next(&self, cancel: &AtomicBool) -> Option<Claim> {
        let mut fresh_open = true;
        loop {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            if fresh_open {
                select! {
                    recv(self.retry_rx) -> claim => {
                        if let Ok(claim) = claim {
                            return Some(claim);
                        }
                    }
                    recv(self.fresh_rx) -> checkpoint => match checkpoint {
                        Ok(checkpoint) => return Some(Claim::first(checkpoint)),
                        Err(_) => fresh_open = false,
                    },
                    default(QUEUE_POLL_INTERVAL) => {}
                }
            } else {
                if self.outstanding() == 0 {
                    return None;
                }
                if let Ok(claim) = self.retry_rx.recv_timeout(QUEUE_POLL_INTERVAL) {
                    return Some(claim);
                }
            }
        }
    }
}

/// Spawn the producer: push every checkpoint of `range` in ascending order, then close the
/// fresh lane by dropping `fresh_tx`. Stops early when `cancel` is set. Returns the count sent.
pub fn spawn_producer(
    fresh_tx: Sender<u32>,
    range: ShardRange,
    cancel: std::sync::Arc<AtomicBool>,
) -> JoinHandle<u64> {
    thread::spawn(move || {
        let mut sent = 0_u64;
        'checkpoints: for checkpoint in range.checkpoints() {
            let mut pending = checkpoint;
            loop {
                if cancel.load(Ordering::Relaxed) {
                    break 'checkpoints;
                }
                match fresh_tx.send_timeout(pending, QUEUE_POLL_INTERVAL) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Timeout(c)) => pending = c,
                    Err(SendTimeoutError::Disconnected(_)) => break 'checkpoints,
                }
            }
            sent += 1;
        }
        drop(fresh_tx);
        sent
    })
}
