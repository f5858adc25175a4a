//! Pipeline context: collaborators and shared state handed to every worker thread.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::engine::db_ops::IndexStore;
use crate::ledger::{LedgerArchive, TransactionDecoder};

use super::coordinator::Coordinator;
use super::queue::CheckpointQueue;

/// The three external capabilities a run needs.
#[derive(Clone)]
pub struct Collaborators {
    pub archive: Arc<dyn LedgerArchive>,
    pub decoder: Arc<dyn TransactionDecoder>,
    pub store: Arc<dyn IndexStore>,
}

/// Shared context for the workers. Built in `run_pipeline`; one `Arc` clone per worker.
pub struct PipelineContext {
    pub collaborators: Collaborators,
    pub network_passphrase: String,
    pub max_fetch_attempts: u32,
    pub queue: CheckpointQueue,
    pub coordinator: Coordinator,
}

/// Handles returned by [`run_pipeline`](super::run_pipeline): join them with
/// [`wait_for_pipeline`](super::wait_for_pipeline).
pub struct PipelineHandles {
    pub producer_handle: JoinHandle<u64>,
    pub worker_handles: Vec<JoinHandle<()>>,
    pub ctx: Arc<PipelineContext>,
}
