//! Partindex: account participation index over a sharded range of ledger checkpoints.

pub mod engine;
pub mod error;
pub mod index;
pub mod ledger;
pub mod participants;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use engine::db_ops::{IndexStore, SqliteIndexStore};
pub use error::{ArchiveError, DecodeError, IndexerError, StoreError};
pub use index::{finalize, index_shard};
pub use ledger::{CloseMetaDecoder, FsArchive, LedgerArchive, TransactionDecoder};
pub use participants::participants_for_operations;
pub use pipeline::Collaborators;

use log::debug;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Result alias used by the public partindex API
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Single entry point: index every checkpoint of `opts.range` through `collaborators` and flush the store.
///
/// Returns the number of checkpoints processed. On error nothing was flushed. Set `cancel` from
/// another thread (e.g. a signal handler) to stop the run early; that also returns an error.
///
/// ```ignore
/// let opts = partindex::Opts::new(partindex::engine::tools::shard_range(3, 0, 1000)?);
/// let conn = partindex::engine::db_ops::open_db(Path::new("job_3.partindex"))?;
/// let collaborators = partindex::Collaborators {
///     archive: Arc::new(partindex::FsArchive::new("/data/archive")),
///     decoder: Arc::new(partindex::CloseMetaDecoder),
///     store: Arc::new(partindex::SqliteIndexStore::new(conn).with_range(opts.range)),
/// };
/// let summary = partindex::index_checkpoints(&opts, collaborators, Arc::new(AtomicBool::new(false)))?;
/// ```
pub fn index_checkpoints(
    opts: &Opts,
    collaborators: Collaborators,
    cancel: Arc<AtomicBool>,
) -> Result<ShardSummary> {
    let config_str = format!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        opts
    );
    debug!("{}", config_str);
    index::index_shard(opts, collaborators, cancel)
}
