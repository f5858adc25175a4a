//! Error types for the shard index build.
//!
//! Collaborator failures have their own enums ([`ArchiveError`], [`DecodeError`], [`StoreError`]);
//! the pipeline wraps them in [`IndexerError`], which also decides what is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Failure fetching ledgers from the archive. Always treated as transient by the pipeline.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("archive unavailable: {message}")]
    Unavailable { message: String },
}

impl ArchiveError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Failure turning a ledger's close metadata into transactions.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("ledger {ledger}: {envelopes} envelopes but {results} results")]
    ResultCountMismatch {
        ledger: u32,
        envelopes: usize,
        results: usize,
    },

    #[error("ledger {ledger}: no envelope for result with transaction hash {hash}")]
    UnmatchedResult { ledger: u32, hash: String },

    #[error("hash transaction envelope: {0}")]
    Hash(#[from] serde_json::Error),
}

/// Failure writing to or flushing the index store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Rejected(String),
}

/// Every way a shard build can fail.
#[derive(Error, Debug)]
pub enum IndexerError {
    /// Missing or malformed run parameter.
    #[error("configuration error: {parameter} - {message}")]
    Config { parameter: String, message: String },

    /// Ledger fetch failed for a checkpoint; the checkpoint is re-queued.
    #[error("fetch ledgers for checkpoint {checkpoint}: {source}")]
    Fetch {
        checkpoint: u32,
        #[source]
        source: ArchiveError,
    },

    #[error("no ledger {ledger} in archive response for checkpoint {checkpoint}")]
    MissingLedger { checkpoint: u32, ledger: u32 },

    #[error("decode ledger {ledger}: {source}")]
    Decode {
        ledger: u32,
        #[source]
        source: DecodeError,
    },

    #[error("unknown operation type: {type_name}")]
    UnknownOperation { type_name: String },

    #[error("index store: {0}")]
    Store(#[from] StoreError),

    #[error("checkpoint {checkpoint} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        checkpoint: u32,
        attempts: u32,
        #[source]
        source: Box<IndexerError>,
    },

    #[error("worker thread panicked")]
    WorkerPanicked,

    #[error("indexing cancelled")]
    Cancelled,
}

impl IndexerError {
    pub fn config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Only archive fetch failures are retried; everything else aborts the run.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}
