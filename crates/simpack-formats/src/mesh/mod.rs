//! GEOM mesh chunk support
//!
//! A mesh resource is a chunk wrapper (RCOL) followed by one GEOM chunk:
//!
//! ```text
//! wrapper: version, public chunks, unused, external count, internal count,
//!          internal keys (ITG), external keys (ITG), (position, size) pairs
//! GEOM:    tag, version, reference list offset and size, shader id,
//!          [shader block], merge group, sort order, vertex count,
//!          format table, vertices, faces, UV stitches, seam stitches,
//!          slot rays, bones, reference list (TGI)
//! ```
//!
//! The layout of the two 53-byte record lists is not documented. They are
//! carried as opaque records, and when their declared counts would run into
//! the reference list the reader abandons the trailing sections, skips the
//! bone list and reports the section in [`MeshDocument::degraded`].

mod reader;
mod shader;
mod skinning;
mod vertex;
mod writer;

pub use shader::{
    EmbeddedShader, MAX_SHADER_PARAMETERS, MTNF_TAG, MTRL_TAG, MaterialBlock, PARAM_FLOAT,
    PARAM_INTEGER, PARAM_TEXTURE, ShaderBlock, ShaderParameter, TextureSemantic,
};
pub use skinning::{BoneInfluences, CasPartCategory, StableIdGroups, cas_start_id};
pub use vertex::{
    ChannelSet, DATATYPE_BYTE, DATATYPE_FLOAT, Vertex, VertexElement, VertexSchema, VertexUsage,
};
pub use writer::{DEFAULT_MAX_BONES, MeshWriteOptions};

use std::collections::BTreeMap;
use std::fmt;

use crate::tgi::ResourceKey;

/// Chunk tag
pub const GEOM_TAG: [u8; 4] = *b"GEOM";

/// Wrapper version written by default
pub const WRAPPER_VERSION: u32 = 3;

/// Chunk version written by default
pub const DEFAULT_GEOM_VERSION: u32 = 14;

/// Chunk versions known to decode correctly
pub const KNOWN_GEOM_VERSIONS: [u32; 3] = [12, 13, 14];

/// Size of one seam-stitch or slot-ray record
pub const OPAQUE_RECORD_SIZE: usize = 53;

/// Chunk wrapper in front of the GEOM chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkWrapper {
    /// Wrapper version, 3 in practice
    pub version: u32,
    /// Public chunk count
    pub public_chunks: u32,
    /// Unused word
    pub unused: u32,
    /// Keys of the chunks inside this resource
    pub internal_chunks: Vec<ResourceKey>,
    /// Keys of resources the chunks refer to
    pub external_resources: Vec<ResourceKey>,
}

impl Default for ChunkWrapper {
    fn default() -> Self {
        Self {
            version: WRAPPER_VERSION,
            public_chunks: 0,
            unused: 0,
            internal_chunks: Vec::new(),
            external_resources: Vec::new(),
        }
    }
}

/// A bone reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bone {
    /// FNV hash of the bone name
    pub hash: u32,
    /// Name from the name table, hex when unknown
    pub name: String,
}

/// Index buffer width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexWidth {
    /// 16-bit indices (code 2)
    #[default]
    U16,
    /// 32-bit indices (code 4, or any code other than 2)
    U32,
}

impl IndexWidth {
    /// Width from the on-disk code
    pub fn from_code(code: u8) -> Self {
        if code == 2 { Self::U16 } else { Self::U32 }
    }

    /// On-disk code
    pub fn code(self) -> u8 {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    /// Bytes per index
    pub fn bytes(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// UV stitch entry
#[derive(Debug, Clone, PartialEq)]
pub struct UvStitch {
    /// Vertex index
    pub index: u32,
    /// UV pairs
    pub coordinates: Vec<[f32; 2]>,
}

/// A 53-byte record of unknown layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpaqueRecord(pub [u8; OPAQUE_RECORD_SIZE]);

/// Trailing section at which structured parsing stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingSection {
    /// UV stitch list
    UvStitch,
    /// Seam stitch records
    SeamStitch,
    /// Slot-ray intersection records
    SlotRay,
}

impl TrailingSection {
    /// Section name used in logs and errors
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UvStitch => "uv stitch list",
            Self::SeamStitch => "seam stitch list",
            Self::SlotRay => "slot ray list",
        }
    }
}

impl fmt::Display for TrailingSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded GEOM mesh
#[derive(Debug, Clone, PartialEq)]
pub struct MeshDocument {
    /// Chunk wrapper fields
    pub wrapper: ChunkWrapper,
    /// GEOM chunk version
    pub version: u32,
    /// Embedded shader, absent when the shader id is 0
    pub shader: Option<EmbeddedShader>,
    /// Merge group
    pub merge_group: u32,
    /// Sort order
    pub sort_order: u32,
    /// Skin controller index; not stored by version 12 to 14 chunks
    pub skin_controller_index: u32,
    /// Format table as read; `None` means infer on write
    pub schema: Option<VertexSchema>,
    /// Vertices
    pub vertices: Vec<Vertex>,
    /// Index buffer width
    pub index_width: IndexWidth,
    /// Triangles as vertex index triples
    pub triangles: Vec<[u32; 3]>,
    /// UV stitch entries
    pub uv_stitches: Vec<UvStitch>,
    /// Seam stitch records
    pub seam_stitches: Vec<OpaqueRecord>,
    /// Slot-ray intersection records
    pub slot_rays: Vec<OpaqueRecord>,
    /// Bones referenced by vertex assignments
    pub bones: Vec<Bone>,
    /// Resource references (textures and the like)
    pub references: Vec<ResourceKey>,
    /// Set when trailing sections were abandoned and the bone list skipped
    pub degraded: Option<TrailingSection>,
}

impl Default for MeshDocument {
    fn default() -> Self {
        Self {
            wrapper: ChunkWrapper::default(),
            version: DEFAULT_GEOM_VERSION,
            shader: None,
            merge_group: 0,
            sort_order: 0,
            skin_controller_index: 0,
            schema: None,
            vertices: Vec::new(),
            index_width: IndexWidth::U16,
            triangles: Vec::new(),
            uv_stitches: Vec::new(),
            seam_stitches: Vec::new(),
            slot_rays: Vec::new(),
            bones: Vec::new(),
            references: Vec::new(),
            degraded: None,
        }
    }
}

impl MeshDocument {
    /// Texture slot to reference-list index
    pub fn texture_refs(&self) -> BTreeMap<TextureSemantic, u32> {
        self.shader
            .as_ref()
            .map(|shader| shader.block.texture_refs())
            .unwrap_or_default()
    }

    /// Reference a texture slot points at
    pub fn texture_reference(&self, semantic: TextureSemantic) -> Option<&ResourceKey> {
        let index = *self.texture_refs().get(&semantic)?;
        self.references.get(index as usize)
    }

    /// Whether trailing sections were abandoned
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    /// Schema the writer will use: the retained one, else inferred from vertex 0
    pub fn effective_schema(&self) -> Option<VertexSchema> {
        self.schema
            .clone()
            .or_else(|| self.vertices.first().map(VertexSchema::infer))
    }
}
