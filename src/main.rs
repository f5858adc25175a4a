//! Partindex CLI: index account participation for one shard of an archive's checkpoints.

use anyhow::Result;
use clap::Parser;
use partindex::engine::arg_parser::Cli;
use partindex::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    // Scheduler parameters may come from a local .env during manual runs; clap reads them below.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
