//! Engine module: CLI wiring, index store, progress reporting and checkpoint arithmetic

pub mod arg_parser;
pub mod db_ops;
pub mod handlers;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use db_ops::{IndexStore, SqliteIndexStore, open_db, open_db_in_memory};
pub use handlers::{handle_run, resolve_run};
pub use tools::{ShardSpec, checkpoint_ledger_range, format_duration, shard_range};
