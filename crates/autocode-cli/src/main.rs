#![doc = include_str!("../README.md")]

mod cli;

use std::io::{BufWriter, Write};

use anyhow::Context;
use autocode::SystemClock;
use clap::Parser;
use cli::batch::{
    Batch, Response, load_counters, load_entities, load_fields, load_requests, save_counters,
};
use cli::config::{CliArgs, Config};
use cli::telemetry::init_telemetry;

// Using mimalloc for better performance when many workers allocate code
// strings concurrently.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = Config::try_from(args)?;

    let logger = init_telemetry()?;
    log_startup_info(&config);

    let fields = load_fields(&config.schema)?;
    let entities = load_entities(config.entities.as_deref())?;
    let counters = load_counters(config.counters.as_deref())?;
    let requests = load_requests(&config.input)?;
    let total = requests.len();

    let batch = Batch::new(fields, entities, counters, config.store, logger, SystemClock)?;
    let responses = batch.run(requests, config.workers)?;

    // Failed requests may still have advanced a counter.
    if let Some(path) = &config.counters {
        save_counters(path, &batch.counters()?)?;
    }

    let failed = responses
        .iter()
        .filter(|response| matches!(response, Response::Error { .. }))
        .count();

    let mut out = BufWriter::new(std::io::stdout().lock());
    for response in &responses {
        serde_json::to_writer(&mut out, response).context("failed to write response")?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    tracing::info!(total, failed, "batch complete");
    if failed > 0 {
        anyhow::bail!("{failed} of {total} requests failed");
    }
    Ok(())
}

fn log_startup_info(config: &Config) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting autocode batch with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting autocode batch with {} workers and {:?} store",
            config.workers,
            config.store
        );
    }
}
