//! Index store: the sink participants are written to, and its SQLite implementation.

mod connection;
mod indexer;

pub use connection::{account_count_from_db, open_db, open_db_in_memory, participation_count_from_db};
pub use indexer::SqliteIndexStore;

use crate::IndexBucket;
use crate::error::StoreError;
use crate::ledger::AccountId;

/// Accumulates participant → checkpoint associations per bucket, then commits them.
///
/// `add_participants` is called concurrently by every worker, for any checkpoint in any
/// order. The flushes run once, after all workers finished cleanly: accounts first, then indexes.
pub trait IndexStore: Send + Sync {
    fn add_participants(
        &self,
        checkpoint: u32,
        bucket: IndexBucket,
        participants: &[AccountId],
    ) -> Result<(), StoreError>;

    fn flush_accounts(&self) -> Result<(), StoreError>;

    fn flush(&self) -> Result<(), StoreError>;
}

/// WAL tuning pragmas (synchronous, autocheckpoint, size limit). Use after PRAGMA journal_mode = WAL.
pub(crate) const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        "#;

pub(crate) const INSERT_ACCOUNT_SQL: &str = "INSERT OR IGNORE INTO accounts (account) VALUES (?1)";

pub(crate) const INSERT_PARTICIPATION_SQL: &str =
    "INSERT OR IGNORE INTO participation (account, bucket, checkpoint) VALUES (?1, ?2, ?3)";

pub(crate) const UPSERT_META_SQL: &str =
    "INSERT OR REPLACE INTO shard_meta (key, value) VALUES (?1, ?2)";

/// Schema for accounts, participation and shard_meta tables.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    account TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS participation (
    account TEXT NOT NULL,
    bucket TEXT NOT NULL,
    checkpoint INTEGER NOT NULL,
    PRIMARY KEY (account, bucket, checkpoint)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS shard_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
