//! Command-line configuration.
//!
//! Global options can come from CLI arguments or environment variables:
//! - `--names` / `SIMPACK_NAMES`: name table path
//! - `--max-bones` / `SIMPACK_MAX_BONES`: bone limit for mesh writes
//!
//! # Example
//!
//! ```no_run
//! use simpack_cli::CliConfig;
//!
//! let config = CliConfig::from_args();
//! config.validate().expect("Invalid configuration");
//!
//! println!("Name table: {}", config.names.display());
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::error::ConfigError;
use simpack_formats::mesh::MeshWriteOptions;

/// Largest bone limit a mesh can address
pub const MAX_BONES_LIMIT: usize = 256;

/// Parse a hex `u32`, with or without a `0x` prefix
pub fn parse_hex_u32(value: &str) -> Result<u32, ConfigError> {
    let digits = strip_hex_prefix(value);
    u32::from_str_radix(digits, 16).map_err(|e| ConfigError::InvalidHex {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a hex `u64`, with or without a `0x` prefix
pub fn parse_hex_u64(value: &str) -> Result<u64, ConfigError> {
    let digits = strip_hex_prefix(value);
    u64::from_str_radix(digits, 16).map_err(|e| ConfigError::InvalidHex {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Configuration loaded from CLI args and environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "simpack",
    about = "Inspect and decode DBPF resource packages",
    version
)]
pub struct CliConfig {
    /// Path to the bone and shader name table
    #[arg(
        long,
        global = true,
        env = "SIMPACK_NAMES",
        default_value = "./data/fnv_hashmap.json"
    )]
    pub names: PathBuf,

    /// Most bones a written mesh may reference
    #[arg(long, global = true, env = "SIMPACK_MAX_BONES", default_value_t = 255)]
    pub max_bones: usize,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the package's entry table
    List {
        /// Package file
        package: PathBuf,
        /// Only entries of this resource type (hex)
        #[arg(long = "type", value_parser = parse_hex_u32)]
        resource_type: Option<u32>,
    },

    /// Write decompressed payloads as `<type>_<group>_<instance>.bin`
    Extract {
        /// Package file
        package: PathBuf,
        /// Output directory
        out_dir: PathBuf,
        /// Only entries of this resource type (hex)
        #[arg(long = "type", value_parser = parse_hex_u32)]
        resource_type: Option<u32>,
    },

    /// Decode a GEOM mesh and print a JSON summary
    Mesh {
        /// Package file or raw mesh chunk
        file: PathBuf,
        /// Mesh instance to pick from a package (hex); the first mesh otherwise
        #[arg(long, value_parser = parse_hex_u64)]
        instance: Option<u64>,
        /// Re-encode the decoded mesh into this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Convert every RLE2 / RLES texture to DDS
    Textures {
        /// Package file
        package: PathBuf,
        /// Output directory
        out_dir: PathBuf,
    },

    /// Name table maintenance
    Names {
        /// Names action
        #[command(subcommand)]
        action: NamesCommand,
    },
}

/// Name table subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum NamesCommand {
    /// Merge bone names into the name table
    Merge {
        /// JSON file: a list of bone names, or an object of hash to name
        bones: PathBuf,
    },
}

impl CliConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Mesh write limits derived from the configuration
    pub fn mesh_write_options(&self) -> MeshWriteOptions {
        MeshWriteOptions {
            max_bones: self.max_bones,
        }
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the bone limit is 0 or above 256.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bones == 0 || self.max_bones > MAX_BONES_LIMIT {
            return Err(ConfigError::MaxBonesOutOfRange {
                value: self.max_bones,
                max: MAX_BONES_LIMIT,
            });
        }
        Ok(())
    }
}
