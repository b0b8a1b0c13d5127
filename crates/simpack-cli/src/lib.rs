//! Command-line front end for `simpack-formats`.
//!
//! # Architecture
//!
//! - `config`: argument and environment parsing plus validation
//! - `commands`: one function per subcommand, writing to any `io::Write`
//! - `error`: configuration errors
//!
//! # Example
//!
//! ```no_run
//! use simpack_cli::{CliConfig, commands};
//!
//! fn main() -> anyhow::Result<()> {
//!     tracing_subscriber::fmt::init();
//!
//!     let config = CliConfig::from_args();
//!     config.validate()?;
//!
//!     commands::run(&config, &mut std::io::stdout())?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod commands;
pub mod config;
pub mod error;

pub use commands::{MeshSummary, TextureReport};
pub use config::{CliConfig, Command, NamesCommand};
pub use error::ConfigError;
