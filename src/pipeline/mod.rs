//! Pipeline components: checkpoint queue, workers, coordinator, orchestration.

pub mod context;
pub mod coordinator;
pub mod orchestrator;
pub mod queue;
pub mod worker;

pub use context::{Collaborators, PipelineContext, PipelineHandles};
pub use coordinator::Coordinator;
pub use orchestrator::{run_pipeline, wait_for_pipeline};
pub use queue::{CheckpointQueue, Claim, spawn_producer};
pub use worker::{index_transaction, process_checkpoint, spawn_workers};
