//! simpack binary entry point.
//!
//! This is a thin wrapper around the simpack-cli library that:
//! 1. Initializes logging
//! 2. Parses and validates configuration
//! 3. Runs the requested subcommand
//!
//! For library usage, see the simpack-cli crate documentation.

use anyhow::Result;
use simpack_cli::{CliConfig, commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse configuration from CLI args
    let config = CliConfig::from_args();

    tracing::debug!(
        "Configuration loaded: names={}, max_bones={}",
        config.names.display(),
        config.max_bones
    );

    config.validate()?;

    let mut stdout = std::io::stdout().lock();
    commands::run(&config, &mut stdout)?;

    Ok(())
}
