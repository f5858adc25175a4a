//! Open index database and count its rows.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

use super::{SCHEMA, WAL_PRAGMAS};

/// Enable WAL and apply schema to an open connection (idempotent).
fn apply_wal_and_schema(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .context("enable WAL")?;
    conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(())
}

/// Open or create the index DB and ensure schema + WAL with optimizations.
pub fn open_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("open database {}", path.display()))?;
    apply_wal_and_schema(&conn)?;
    Ok(conn)
}

/// Open an in-memory DB with the same schema (tests and dry runs; no WAL pragmas needed).
pub fn open_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory database")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(conn)
}

/// Number of rows in `accounts`, or None if the query fails.
pub fn account_count_from_db(conn: &Connection) -> Option<usize> {
    conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get::<_, i64>(0))
        .ok()
        .map(|n| n.max(0) as usize)
}

/// Number of rows in `participation`, or None if the query fails.
pub fn participation_count_from_db(conn: &Connection) -> Option<usize> {
    conn.query_row("SELECT COUNT(*) FROM participation", [], |row| {
        row.get::<_, i64>(0)
    })
    .ok()
    .map(|n| n.max(0) as usize)
}
