use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{CatalogError, Result};

/// Installs the global subscriber used by the command-line tool.
///
/// `RUST_LOG` takes precedence; otherwise the crate logs at `info`, or at
/// `debug` when `verbose` is set.
pub fn init_logging(verbose: bool) -> Result<()> {
    let default_directive = if verbose {
        "teaching_catalog=debug,info"
    } else {
        "teaching_catalog=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init()
        .map_err(|err| CatalogError::Logging(err.to_string()))
}
