//! Parsers and builders for DBPF resource packages and the assets inside them
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Format tags don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // pool0, pool1, ...
#![allow(clippy::float_cmp)] // Binary format requirements
#![allow(clippy::cast_precision_loss)] // Weight quantization
#![allow(clippy::derive_partial_eq_without_eq)] // Binary format structs
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! This crate reads and writes the binary formats found in DBPF resource
//! packages:
//!
//! - **Package**: the DBPF container, its header and resource index, plus a
//!   builder for writing new packages
//! - **Compression**: zlib and RefPack decompression of package payloads
//! - **Mesh**: GEOM mesh chunks inside their RCOL chunk wrapper, read and write
//! - **Texture**: RLE2 / RLES textures expanded to DXT5 DDS images
//! - **Names**: hash to name lookup for bones and shaders
//!
//! # Design Principles
//!
//! - **Symmetric Operations**: packages and meshes can be parsed and built
//! - **Explicit Context**: the name table is passed to the codecs that need it
//! - **Tolerant Reading**: anomalies that do not prevent decoding are logged
//!   with `tracing` and decoding continues
//! - **Byte-Exact Rewrite**: for a mesh without a shader block and with
//!   only known vertex usages, write(read(bytes)) reproduces the input bytes

#![warn(missing_docs)]

/// Zlib and RefPack decompression
pub mod compression;
pub mod cursor;
pub mod error;
/// GEOM mesh chunks
///
/// See the [`mesh`] module for the chunk layout and the degraded-read rules
/// for the undocumented trailing sections.
pub mod mesh;
pub mod names;
/// DBPF resource packages
pub mod package;
/// RLE2 / RLES texture decoding to DDS
pub mod texture;
pub mod tgi;

pub use error::{FormatError, FormatResult};
pub use mesh::{MeshDocument, MeshWriteOptions};
pub use names::{NameTable, SharedNameTable};
pub use package::{Package, PackageBuilder, ResourceEntry};
pub use tgi::ResourceKey;
