//! Resource package (DBPF) container support
//!
//! A package is a 96-byte header, a sequence of independently compressed
//! resource payloads and an index describing them:
//!
//! ```text
//! [header (96 bytes)][payload 0][payload 1]...[index]
//! ```
//!
//! The index starts with a flags word whose low three bits mark the resource
//! type, group and instance high half as shared by every entry. Shared
//! fields are stored once after the flags and omitted from each entry.
//!
//! # Example
//!
//! ```rust,no_run
//! use simpack_formats::names::NameTable;
//! use simpack_formats::package::Package;
//! use simpack_formats::mesh::MeshDocument;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let package = Package::open("hair.package".as_ref())?;
//! let names = NameTable::load("fnv_hashmap.json".as_ref())?;
//!
//! for entry in package.meshes() {
//!     if let Some(bytes) = package.resource_data(entry)? {
//!         let mesh = MeshDocument::read(&bytes, &names)?;
//!         println!("{}: {} vertices", entry.display_name(), mesh.vertices.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod header;
mod index;

pub use builder::PackageBuilder;
pub use header::{HEADER_SIZE, INDEX_KIND, PACKAGE_MAGIC, PackageHeader, SUPPORTED_MAJOR_VERSION};
pub use index::{FILE_SIZE_FLAG, IndexFlags, NO_DATA_OFFSET, PackageIndex, ResourceEntry};

use std::path::Path;
use tracing::debug;

use crate::compression;
use crate::cursor::ByteCursor;
use crate::error::FormatResult;
use crate::tgi::{CAS_PART_TYPE, DDS_TYPE, GEOM_TYPE, RLE2_TYPE, RLES_TYPE, ResourceKey};

/// A parsed package holding its bytes, header and index
#[derive(Debug, Clone)]
pub struct Package {
    data: Vec<u8>,
    header: PackageHeader,
    index: PackageIndex,
}

impl Package {
    /// Parse a package from its bytes
    pub fn parse(data: Vec<u8>) -> FormatResult<Self> {
        let mut cursor = ByteCursor::new(data.as_slice());
        let header: PackageHeader = cursor.read_record(HEADER_SIZE)?;
        header.validate()?;

        debug!(
            "Package v{}.{}: {} entries, index at {} ({} bytes)",
            header.major_version,
            header.minor_version,
            header.entry_count,
            header.index_position(),
            header.index_size
        );

        let index = if header.entry_count > 0 {
            cursor.seek(header.index_position() as usize)?;
            PackageIndex::parse(&mut cursor, header.entry_count)?
        } else {
            PackageIndex::default()
        };

        Ok(Self {
            data,
            header,
            index,
        })
    }

    /// Read and parse a package file
    pub fn open(path: &Path) -> FormatResult<Self> {
        let data = std::fs::read(path)?;
        debug!("Read {} bytes from {}", data.len(), path.display());
        Self::parse(data)
    }

    /// Package header
    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    /// Index flags
    pub fn index_flags(&self) -> IndexFlags {
        self.index.flags
    }

    /// All entries in index order
    pub fn entries(&self) -> &[ResourceEntry] {
        &self.index.entries
    }

    /// Raw package bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Materialize an entry's payload
    ///
    /// Returns `None` for entries without payload. Compressed payloads are
    /// decompressed to the entry's memory size.
    pub fn resource_data(&self, entry: &ResourceEntry) -> FormatResult<Option<Vec<u8>>> {
        if !entry.has_data() {
            return Ok(None);
        }

        let mut cursor = ByteCursor::new(self.data.as_slice());
        cursor.seek(entry.chunk_offset as usize)?;
        let raw = cursor.read_bytes(entry.file_size as usize)?;

        if !entry.is_compressed() {
            return Ok(Some(raw.to_vec()));
        }

        compression::decompress(raw, entry.mem_size as usize).map(Some)
    }

    /// Entries of one resource type
    pub fn resources_of_type(&self, resource_type: u32) -> impl Iterator<Item = &ResourceEntry> {
        self.index
            .entries
            .iter()
            .filter(move |e| e.key.resource_type == resource_type)
    }

    /// GEOM mesh entries
    pub fn meshes(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.resources_of_type(GEOM_TYPE)
    }

    /// CAS part entries
    pub fn cas_parts(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.resources_of_type(CAS_PART_TYPE)
    }

    /// RLE2 and RLES texture entries
    pub fn rle_textures(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.resources_of_type(RLE2_TYPE)
            .chain(self.resources_of_type(RLES_TYPE))
    }

    /// Plain DDS texture entries
    pub fn dds_textures(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.resources_of_type(DDS_TYPE)
    }

    /// All texture entries, DDS first
    pub fn textures(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.dds_textures().chain(self.rle_textures())
    }

    /// Entry with exactly this key
    pub fn find(&self, key: &ResourceKey) -> Option<&ResourceEntry> {
        self.index.entries.iter().find(|e| e.key == *key)
    }

    /// First entry of a type with this instance, in any group
    pub fn find_by_instance(&self, resource_type: u32, instance: u64) -> Option<&ResourceEntry> {
        self.index
            .entries
            .iter()
            .find(|e| e.key.resource_type == resource_type && e.key.instance == instance)
    }
}
