//! SqliteIndexStore: accumulate participants in memory while workers run, write them on flush.

use rusqlite::{Connection, Transaction};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::ledger::AccountId;
use crate::utils::config::STORE_SHARDS;
use crate::{IndexBucket, ShardRange};

use super::{INSERT_ACCOUNT_SQL, INSERT_PARTICIPATION_SQL, IndexStore, UPSERT_META_SQL};

/// Checkpoints an account was active in, per bucket.
type AccountIndexes = HashMap<AccountId, BTreeMap<IndexBucket, BTreeSet<u32>>>;

/// One participation row: (account, bucket, checkpoint).
type ParticipationRow = (AccountId, IndexBucket, u32);

/// Assign an account to a lock shard by hash (reduces lock contention between workers).
fn account_shard(account: &AccountId, n_shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    account.hash(&mut hasher);
    (hasher.finish() as usize) % n_shards
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Index store backed by one SQLite database per shard.
pub struct SqliteIndexStore {
    conn: Mutex<Connection>,
    shards: Vec<Mutex<AccountIndexes>>,
    range: Option<ShardRange>,
}

impl SqliteIndexStore {
    /// Wrap a connection opened with [`open_db`](super::open_db) or
    /// [`open_db_in_memory`](super::open_db_in_memory).
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            shards: (0..STORE_SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
            range: None,
        }
    }

    /// Record `range` in `shard_meta` when flushing.
    pub fn with_range(mut self, range: ShardRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Run `f` with the underlying connection (inspection after a flush).
    pub fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> R) -> R {
        f(&lock(&self.conn))
    }

    /// Distinct accounts accumulated so far.
    pub fn account_count(&self) -> usize {
        self.shards.iter().map(|s| lock(s).len()).sum()
    }

    fn sorted_accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> = self
            .shards
            .iter()
            .flat_map(|s| lock(s).keys().cloned().collect::<Vec<_>>())
            .collect();
        accounts.sort();
        accounts
    }

    fn participation_rows(&self) -> Vec<ParticipationRow> {
        let mut rows = Vec::new();
        for shard in &self.shards {
            for (account, buckets) in lock(shard).iter() {
                for (bucket, checkpoints) in buckets {
                    rows.extend(checkpoints.iter().map(|c| (account.clone(), *bucket, *c)));
                }
            }
        }
        rows.sort();
        rows
    }

    fn write_shard_meta(conn: &Connection, range: ShardRange) -> Result<(), StoreError> {
        conn.execute(UPSERT_META_SQL, ("start_checkpoint", range.start.to_string()))?;
        conn.execute(UPSERT_META_SQL, ("end_checkpoint", range.end.to_string()))?;
        Ok(())
    }
}

/// Insert accounts inside `tx`. Returns the number inserted.
fn insert_accounts(tx: &Transaction<'_>, accounts: &[AccountId]) -> Result<usize, StoreError> {
    let mut stmt = tx.prepare(INSERT_ACCOUNT_SQL)?;
    for account in accounts {
        stmt.execute([account.address()])?;
    }
    Ok(accounts.len())
}

/// Insert participation rows inside `tx`. Returns the number inserted.
fn insert_participation(tx: &Transaction<'_>, rows: &[ParticipationRow]) -> Result<usize, StoreError> {
    let mut stmt = tx.prepare(INSERT_PARTICIPATION_SQL)?;
    for (account, bucket, checkpoint) in rows {
        stmt.execute((account.address(), bucket.name(), i64::from(*checkpoint)))?;
    }
    Ok(rows.len())
}

impl IndexStore for SqliteIndexStore {
    fn add_participants(
        &self,
        checkpoint: u32,
        bucket: IndexBucket,
        participants: &[AccountId],
    ) -> Result<(), StoreError> {
        for account in participants {
            let mut shard = lock(&self.shards[account_shard(account, self.shards.len())]);
            shard
                .entry(account.clone())
                .or_default()
                .entry(bucket)
                .or_default()
                .insert(checkpoint);
        }
        Ok(())
    }

    fn flush_accounts(&self) -> Result<(), StoreError> {
        let accounts = self.sorted_accounts();
        let mut conn = lock(&self.conn);
        // One transaction: a failed flush leaves no partial account set behind.
        let tx = conn.transaction()?;
        let written = insert_accounts(&tx, &accounts)?;
        tx.commit()?;
        log::debug!("store: wrote {} accounts", written);
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        let rows = self.participation_rows();
        let mut conn = lock(&self.conn);
        // Rows and shard_meta commit together, so shard_meta marks a complete index.
        let tx = conn.transaction()?;
        let written = insert_participation(&tx, &rows)?;
        if let Some(range) = self.range {
            Self::write_shard_meta(&tx, range)?;
        }
        tx.commit()?;
        // Reclaim WAL space after bulk insert (checkpoint and truncate WAL file)
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        log::debug!("store: wrote {} participation rows", written);
        Ok(())
    }
}
