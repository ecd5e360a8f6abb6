use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, ValueEnum};

/// Runtime configuration for the `autocode` binary.
///
/// Every flag can also be set through an environment variable, and a `.env`
/// file in the working directory is loaded before parsing.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "autocode",
    version,
    about = "Apply autocode generation to a batch of JSON write requests"
)]
pub struct CliArgs {
    /// JSON array of table-field definitions.
    ///
    /// Autocode fields are validated on load; an invalid template aborts the
    /// run before any request is processed.
    ///
    /// Environment variable: `AUTOCODE_SCHEMA`
    #[arg(long, env = "AUTOCODE_SCHEMA")]
    pub schema: PathBuf,

    /// JSON array of write requests, each `{"table": ..., "fields": {...}}`.
    ///
    /// Environment variable: `AUTOCODE_INPUT`
    #[arg(long, env = "AUTOCODE_INPUT")]
    pub input: PathBuf,

    /// Optional JSON object of existing rows: `{"<table>": {"<id>": {...}}}`.
    ///
    /// Used to restore codes on updates and to skip retried creates.
    ///
    /// Environment variable: `AUTOCODE_ENTITIES`
    #[arg(long, env = "AUTOCODE_ENTITIES")]
    pub entities: Option<PathBuf>,

    /// JSON array of persisted sequence counters.
    ///
    /// Read before the run if it exists, and overwritten with every counter's
    /// final state afterwards, so the next run continues each sequence
    /// instead of starting over. Without it counters start fresh and codes
    /// already held by rows from `--entities` can be handed out again.
    ///
    /// Environment variable: `AUTOCODE_COUNTERS`
    #[arg(long, env = "AUTOCODE_COUNTERS")]
    pub counters: Option<PathBuf>,

    /// Number of worker threads processing requests concurrently.
    ///
    /// All workers share one counter store, so codes stay unique; with more
    /// than one worker the order in which requests receive sequence values
    /// is not the input order. Requests for the same `entity_id` always run
    /// on one worker in input order, so updates restore what earlier creates
    /// in the batch generated.
    ///
    /// Environment variable: `AUTOCODE_WORKERS`
    #[arg(long, env = "AUTOCODE_WORKERS", default_value_t = 1)]
    pub workers: usize,

    /// Counter store implementation.
    ///
    /// Environment variable: `AUTOCODE_STORE`
    #[arg(long, env = "AUTOCODE_STORE", value_enum, default_value_t = StoreKind::Atomic)]
    pub store: StoreKind,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// One atomic cell per counter.
    Atomic,
    /// All counters behind one mutex.
    Lock,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub schema: PathBuf,
    pub input: PathBuf,
    pub entities: Option<PathBuf>,
    pub counters: Option<PathBuf>,
    pub workers: usize,
    pub store: StoreKind,
}

impl TryFrom<CliArgs> for Config {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.workers == 0 {
            bail!("AUTOCODE_WORKERS must be greater than 0");
        }

        Ok(Self {
            schema: args.schema,
            input: args.input,
            entities: args.entities,
            counters: args.counters,
            workers: args.workers,
            store: args.store,
        })
    }
}
