//! Ledger archive: bulk ledger lookup by ledger-number range.

use log::debug;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::ArchiveError;
use crate::utils::config::LEDGERS_PER_CHECKPOINT;

use super::Ledger;

/// Source of historical ledgers. Implementations must be safe to call from many workers at once.
pub trait LedgerArchive: Send + Sync {
    /// Return every ledger in `[start, end]` the archive holds, keyed by ledger number.
    /// A ledger absent from the map is the caller's problem; an `Err` means "try again later".
    fn get_ledgers(&self, start: u32, end: u32) -> Result<HashMap<u32, Ledger>, ArchiveError>;
}

/// Path of the file holding checkpoint `checkpoint`, relative to the archive root.
///
/// Files are named after the checkpoint's last ledger in 8 hex digits and fanned out over three
/// directory levels: `ledger/ww/xx/yy/ledger-wwxxyyzz.json`.
pub fn checkpoint_file_path(checkpoint: u32) -> PathBuf {
    let last_ledger = checkpoint
        .saturating_mul(LEDGERS_PER_CHECKPOINT)
        .saturating_add(LEDGERS_PER_CHECKPOINT - 1);
    let hex = format!("{last_ledger:08x}");
    PathBuf::from("ledger")
        .join(&hex[0..2])
        .join(&hex[2..4])
        .join(&hex[4..6])
        .join(format!("ledger-{hex}.json"))
}

/// Archive laid out on a local (or mounted) filesystem; one JSON array of [`Ledger`] per checkpoint.
pub struct FsArchive {
    root: PathBuf,
}

impl FsArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_checkpoint(&self, checkpoint: u32) -> Result<Vec<Ledger>, ArchiveError> {
        let path = self.root.join(checkpoint_file_path(checkpoint));
        let bytes = std::fs::read(&path).map_err(|source| ArchiveError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ArchiveError::Parse { path, source })
    }

    /// Write `ledgers` as the file for `checkpoint`, creating directories as needed.
    pub fn write_checkpoint(&self, checkpoint: u32, ledgers: &[Ledger]) -> Result<(), ArchiveError> {
        let path = self.root.join(checkpoint_file_path(checkpoint));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ArchiveError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_vec(ledgers).map_err(|source| ArchiveError::Parse {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| ArchiveError::Io { path, source })
    }
}

impl LedgerArchive for FsArchive {
    fn get_ledgers(&self, start: u32, end: u32) -> Result<HashMap<u32, Ledger>, ArchiveError> {
        let mut ledgers = HashMap::new();
        if start > end {
            return Ok(ledgers);
        }
        for checkpoint in (start / LEDGERS_PER_CHECKPOINT)..=(end / LEDGERS_PER_CHECKPOINT) {
            for ledger in self.read_checkpoint(checkpoint)? {
                let seq = ledger.header.ledger_seq;
                if (start..=end).contains(&seq) {
                    ledgers.insert(seq, ledger);
                }
            }
        }
        debug!("archive: {} ledgers in {}-{}", ledgers.len(), start, end);
        Ok(ledgers)
    }
}
