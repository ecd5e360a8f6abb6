//! Log output for the `autocode` binary.
//!
//! Logs go to stderr so stdout carries only the JSON results. The filter is
//! read from `RUST_LOG` and defaults to `info`, e.g.:
//!
//! ```bash
//! RUST_LOG=autocode=debug autocode --schema schema.json --input input.json
//! ```

use tracing::Dispatch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber and returns a handle to it, to be passed to
/// the orchestrator as its logger.
pub fn init_telemetry() -> anyhow::Result<Dispatch> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339()),
        )
        .try_init()?;

    Ok(tracing::dispatcher::get_default(Dispatch::clone))
}
