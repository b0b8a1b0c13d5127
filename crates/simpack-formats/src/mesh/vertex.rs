//! Vertices and the vertex format table

use crate::error::{FormatError, FormatResult};

/// Datatype id written for float channels
pub const DATATYPE_FLOAT: u32 = 1;
/// Datatype id written for byte and integer channels
pub const DATATYPE_BYTE: u32 = 2;

/// Usage code of a vertex format entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexUsage {
    /// 3 floats
    Position,
    /// 3 floats
    Normal,
    /// 2 floats, one entry per UV channel
    Uv,
    /// 4 bone indices
    BoneAssignment,
    /// 4 weights, byte-quantized
    Weights,
    /// 3 floats
    Tangent,
    /// 4 bytes
    Color,
    /// One `u32`
    StableId,
}

impl VertexUsage {
    /// Decode a usage code; unknown codes yield `None`
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Position),
            2 => Some(Self::Normal),
            3 => Some(Self::Uv),
            4 => Some(Self::BoneAssignment),
            5 => Some(Self::Weights),
            6 => Some(Self::Tangent),
            7 => Some(Self::Color),
            10 => Some(Self::StableId),
            _ => None,
        }
    }

    /// On-disk usage code
    pub fn code(self) -> u32 {
        match self {
            Self::Position => 1,
            Self::Normal => 2,
            Self::Uv => 3,
            Self::BoneAssignment => 4,
            Self::Weights => 5,
            Self::Tangent => 6,
            Self::Color => 7,
            Self::StableId => 10,
        }
    }

    /// Bytes one vertex spends on this usage
    pub fn byte_size(self) -> u8 {
        match self {
            Self::Position | Self::Normal | Self::Tangent => 12,
            Self::Uv => 8,
            Self::BoneAssignment | Self::Weights | Self::Color | Self::StableId => 4,
        }
    }

    /// Datatype id used when a schema is inferred
    pub fn default_datatype(self) -> u32 {
        match self {
            Self::Position | Self::Normal | Self::Uv | Self::Tangent => DATATYPE_FLOAT,
            Self::BoneAssignment | Self::Weights | Self::Color | Self::StableId => DATATYPE_BYTE,
        }
    }
}

/// One entry of the vertex format table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexElement {
    /// What the bytes mean
    pub usage: VertexUsage,
    /// Declared datatype id
    pub datatype: u32,
    /// Declared bytes per vertex
    pub byte_size: u8,
}

impl VertexElement {
    /// Element with the usage's default datatype and size
    pub fn new(usage: VertexUsage) -> Self {
        Self {
            usage,
            datatype: usage.default_datatype(),
            byte_size: usage.byte_size(),
        }
    }
}

/// Optional channels a vertex (or a schema) carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelSet {
    /// Normal present
    pub normal: bool,
    /// Number of UV channels
    pub uv_channels: usize,
    /// Bone assignment present
    pub bone_assignment: bool,
    /// Weights present
    pub weights: bool,
    /// Tangent present
    pub tangent: bool,
    /// Color present
    pub color: bool,
    /// Stable id present
    pub stable_id: bool,
}

/// A decoded vertex
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vertex {
    /// Position
    pub position: [f32; 3],
    /// Normal
    pub normal: Option<[f32; 3]>,
    /// UV pairs, one per channel
    pub uvs: Vec<[f32; 2]>,
    /// Indices into the document's bone list
    pub bone_assignment: Option<[u8; 4]>,
    /// Weights in `0.0..=1.0`, parallel to the assignment
    pub weights: Option<[f32; 4]>,
    /// Tangent
    pub tangent: Option<[f32; 3]>,
    /// Color bytes
    pub color: Option<[u8; 4]>,
    /// Identifier shared by vertices split along seams
    pub stable_id: Option<u32>,
}

impl Vertex {
    /// Vertex with only a position
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Channels present on this vertex
    pub fn channels(&self) -> ChannelSet {
        ChannelSet {
            normal: self.normal.is_some(),
            uv_channels: self.uvs.len(),
            bone_assignment: self.bone_assignment.is_some(),
            weights: self.weights.is_some(),
            tangent: self.tangent.is_some(),
            color: self.color.is_some(),
            stable_id: self.stable_id.is_some(),
        }
    }
}

/// Ordered vertex format table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexSchema {
    elements: Vec<VertexElement>,
}

impl VertexSchema {
    /// Schema from explicit elements
    pub fn new(elements: Vec<VertexElement>) -> Self {
        Self { elements }
    }

    /// Infer a schema from one vertex in canonical order
    ///
    /// Order: position, normal, UVs, assignment, weights, tangent, color, id.
    pub fn infer(vertex: &Vertex) -> Self {
        let mut elements = vec![VertexElement::new(VertexUsage::Position)];
        if vertex.normal.is_some() {
            elements.push(VertexElement::new(VertexUsage::Normal));
        }
        elements.extend(vertex.uvs.iter().map(|_| VertexElement::new(VertexUsage::Uv)));
        if vertex.bone_assignment.is_some() {
            elements.push(VertexElement::new(VertexUsage::BoneAssignment));
        }
        if vertex.weights.is_some() {
            elements.push(VertexElement::new(VertexUsage::Weights));
        }
        if vertex.tangent.is_some() {
            elements.push(VertexElement::new(VertexUsage::Tangent));
        }
        if vertex.color.is_some() {
            elements.push(VertexElement::new(VertexUsage::Color));
        }
        if vertex.stable_id.is_some() {
            elements.push(VertexElement::new(VertexUsage::StableId));
        }
        Self { elements }
    }

    /// Elements in on-disk order
    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    /// Whether the schema has a usage
    pub fn contains(&self, usage: VertexUsage) -> bool {
        self.elements.iter().any(|e| e.usage == usage)
    }

    /// Bytes per vertex
    pub fn stride(&self) -> usize {
        self.elements.iter().map(|e| usize::from(e.byte_size)).sum()
    }

    /// Optional channels the schema describes
    pub fn channels(&self) -> ChannelSet {
        ChannelSet {
            normal: self.contains(VertexUsage::Normal),
            uv_channels: self
                .elements
                .iter()
                .filter(|e| e.usage == VertexUsage::Uv)
                .count(),
            bone_assignment: self.contains(VertexUsage::BoneAssignment),
            weights: self.contains(VertexUsage::Weights),
            tangent: self.contains(VertexUsage::Tangent),
            color: self.contains(VertexUsage::Color),
            stable_id: self.contains(VertexUsage::StableId),
        }
    }

    /// Check that the schema can be written and matches every vertex
    pub fn validate(&self, vertices: &[Vertex]) -> FormatResult<()> {
        for element in &self.elements {
            if element.byte_size != element.usage.byte_size() {
                return Err(FormatError::Validation(format!(
                    "{:?} declared with {} bytes, expected {}",
                    element.usage,
                    element.byte_size,
                    element.usage.byte_size()
                )));
            }
        }

        // Only UVs may repeat
        let mut seen = Vec::with_capacity(self.elements.len());
        for element in self.elements.iter().filter(|e| e.usage != VertexUsage::Uv) {
            if seen.contains(&element.usage) {
                return Err(FormatError::Validation(format!(
                    "{:?} declared more than once",
                    element.usage
                )));
            }
            seen.push(element.usage);
        }

        let expected = self.channels();
        if expected.bone_assignment != expected.weights {
            return Err(FormatError::Validation(
                "bone assignment and weights must be present together".to_string(),
            ));
        }

        for (index, vertex) in vertices.iter().enumerate() {
            let found = vertex.channels();
            if found != expected {
                return Err(FormatError::Validation(format!(
                    "vertex {index} channels {found:?} differ from the format {expected:?}"
                )));
            }
        }

        Ok(())
    }
}
