//! CLI command handler: resolve configuration, wire the collaborators, run the shard.

use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::engine::arg_parser::Cli;
use crate::engine::db_ops::{SqliteIndexStore, open_db};
use crate::engine::tools::ShardSpec;
use crate::error::IndexerError;
use crate::index::index_shard;
use crate::ledger::{CloseMetaDecoder, FsArchive};
use crate::pipeline::Collaborators;
use crate::utils::config::{EnvKeys, PackagePaths};
use crate::utils::{SettingsToml, apply_file_to_opts, load_settings_toml, setup_logging};
use crate::{Locations, Opts};

/// Raw shard parameter by env var name: CLI flag or environment first (clap merges both), then file.
fn shard_param(cli: &Cli, file: &SettingsToml, key: &str) -> Option<String> {
    if key == EnvKeys::JOB_INDEX {
        cli.job_index.clone()
    } else if key == EnvKeys::FIRST_CHECKPOINT {
        cli.first_checkpoint
            .clone()
            .or_else(|| file.settings.first_checkpoint.map(|v| v.to_string()))
    } else if key == EnvKeys::BATCH_SIZE {
        cli.batch_size
            .clone()
            .or_else(|| file.settings.batch_size.map(|v| v.to_string()))
    } else {
        None
    }
}

/// Overwrite opts from CLI flags that were given.
fn apply_cli_to_opts(cli: &Cli, opts: &mut Opts) {
    if let Some(workers) = cli.workers {
        opts.workers = workers;
    }
    if let Some(ref passphrase) = cli.network_passphrase {
        opts.network_passphrase = passphrase.clone();
    }
    if let Some(attempts) = cli.max_fetch_attempts {
        opts.max_fetch_attempts = attempts;
    }
    if let Some(progress) = cli.progress {
        opts.progress_bar = progress;
    }
}

fn resolve_locations(
    cli: &Cli,
    file: &SettingsToml,
    job_index: u64,
) -> Result<Locations, IndexerError> {
    let archive_dir = cli
        .archive
        .clone()
        .or_else(|| file.archive_dir())
        .ok_or_else(|| IndexerError::config(EnvKeys::ARCHIVE_DIR, "required"))?;
    let db_path = cli
        .db
        .clone()
        .or_else(|| file.db_path())
        .unwrap_or_else(|| PathBuf::from(PackagePaths::get().db_filename(job_index)));
    Ok(Locations {
        archive_dir,
        db_path,
    })
}

/// Resolve opts and locations from CLI, environment and the settings file in `dir`.
pub fn resolve_run(cli: &Cli, dir: &Path) -> Result<(Opts, Locations)> {
    let file = load_settings_toml(dir).unwrap_or_default();
    let spec = ShardSpec::from_lookup(|key| shard_param(cli, &file, key))?;
    let mut opts = Opts::new(spec.range()?);
    apply_file_to_opts(&file, &mut opts);
    apply_cli_to_opts(cli, &mut opts);
    let locations = resolve_locations(cli, &file, spec.job_index)?;
    Ok((opts, locations))
}

/// Run one shard end to end. Any error means nothing was flushed.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let cwd = Path::new(".");
    let verbose = cli
        .verbose
        .or_else(|| load_settings_toml(cwd).and_then(|f| f.settings.verbose))
        .unwrap_or(false);
    setup_logging(verbose);

    let (opts, locations) = resolve_run(cli, cwd)?;
    debug!("{} CONFIG: {:#?} {:#?}", PackagePaths::get().pkg_name().to_uppercase(), opts, locations);

    let conn = open_db(&locations.db_path)?;
    let collaborators = Collaborators {
        archive: Arc::new(FsArchive::new(&locations.archive_dir)),
        decoder: Arc::new(CloseMetaDecoder),
        store: Arc::new(SqliteIndexStore::new(conn).with_range(opts.range)),
    };

    let cancel_requested = Arc::new(AtomicBool::new(false));
    let cancel_requested_handler = Arc::clone(&cancel_requested);
    ctrlc::set_handler(move || {
        cancel_requested_handler.store(true, Ordering::Relaxed);
    })
    .context("set Ctrl+C handler")?;

    let summary = index_shard(&opts, collaborators, cancel_requested)
        .with_context(|| format!("shard {} failed; index not flushed", opts.range))?;
    info!(
        "Indexed {} checkpoints {} into {}",
        summary.checkpoints_processed,
        summary.range,
        locations.db_path.display()
    );
    Ok(())
}
