//! Load `.partindex.toml` from a directory (CLI only). Lib callers pass [`Opts`] directly.
//!
//! Values that are the same for every shard of a job (first checkpoint, batch size, archive
//! location) can live here; the job index always comes from the environment or the CLI.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct SettingsToml {
    #[serde(default)]
    pub settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsSection {
    pub first_checkpoint: Option<u64>,
    pub batch_size: Option<u64>,
    pub workers: Option<usize>,
    pub archive_dir: Option<String>,
    pub db_path: Option<String>,
    pub network_passphrase: Option<String>,
    pub max_fetch_attempts: Option<u32>,
    pub verbose: Option<bool>,
    pub progress: Option<bool>,
}

impl SettingsToml {
    pub fn archive_dir(&self) -> Option<PathBuf> {
        self.settings.archive_dir.as_ref().map(PathBuf::from)
    }

    pub fn db_path(&self) -> Option<PathBuf> {
        self.settings.db_path.as_ref().map(PathBuf::from)
    }
}

/// Parse settings from TOML text.
pub fn parse_settings_toml(s: &str) -> Result<SettingsToml, toml::de::Error> {
    toml::from_str(s)
}

/// Load the settings file from `dir` if present. Returns None if missing or unreadable.
pub fn load_settings_toml(dir: &Path) -> Option<SettingsToml> {
    let path = dir.join(PackagePaths::get().settings_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_settings_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($idx:expr, $opts:expr, $idx_field:ident => $opts_field:ident) => {
        if let Some(v) = $idx.$idx_field.clone() {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI.
pub fn apply_file_to_opts(file: &SettingsToml, opts: &mut Opts) {
    let idx = &file.settings;
    apply_file_opt!(idx, opts, workers => workers);
    apply_file_opt!(idx, opts, network_passphrase => network_passphrase);
    apply_file_opt!(idx, opts, max_fetch_attempts => max_fetch_attempts);
    apply_file_opt!(idx, opts, progress => progress_bar);
}
