//! Bone influence and stable id helpers

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use super::MeshDocument;

/// Per-vertex bone influences
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoneInfluences {
    /// `(bone list index, weight)` pairs with a positive weight, per vertex
    pub vertices: Vec<Vec<(usize, f32)>>,
    /// Assignments that pointed past the bone list
    pub skipped: usize,
}

impl BoneInfluences {
    /// Whether any vertex is influenced by a bone
    pub fn is_empty(&self) -> bool {
        self.vertices.iter().all(Vec::is_empty)
    }
}

/// Vertex indices grouped by stable id
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StableIdGroups {
    /// Stable id to the vertices carrying it, in vertex order
    pub groups: BTreeMap<u32, Vec<usize>>,
    /// Smallest id seen
    pub lowest: Option<u32>,
}

/// Clothing part categories and their stable id ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CasPartCategory {
    /// Whole body
    Body,
    /// Upper body
    Top,
    /// Lower body
    Bottom,
    /// Outfit covering top and bottom
    FullBody,
    /// Hair
    Hair,
    /// Shoes
    Shoes,
    /// Accessory
    Accessory,
    /// Hat
    Hat,
    /// Head
    Head,
}

impl CasPartCategory {
    /// Parse a lowercase category name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "body" => Some(Self::Body),
            "top" => Some(Self::Top),
            "bottom" => Some(Self::Bottom),
            "fullbody" => Some(Self::FullBody),
            "hair" => Some(Self::Hair),
            "shoes" => Some(Self::Shoes),
            "accessory" => Some(Self::Accessory),
            "hat" => Some(Self::Hat),
            "head" => Some(Self::Head),
            _ => None,
        }
    }

    /// Lowercase category name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::FullBody => "fullbody",
            Self::Hair => "hair",
            Self::Shoes => "shoes",
            Self::Accessory => "accessory",
            Self::Hat => "hat",
            Self::Head => "head",
        }
    }
}

impl fmt::Display for CasPartCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First stable id conventionally used by a part category
pub fn cas_start_id(part: CasPartCategory) -> u32 {
    match part {
        CasPartCategory::Body | CasPartCategory::Top | CasPartCategory::FullBody => 0,
        CasPartCategory::Bottom => 10_000,
        CasPartCategory::Hair => 20_000,
        CasPartCategory::Shoes => 30_000,
        CasPartCategory::Accessory => 40_000,
        CasPartCategory::Hat => 50_000,
        CasPartCategory::Head => 60_000,
    }
}

impl MeshDocument {
    /// Resolve bone assignments against the bone list
    ///
    /// Empty when the mesh has no assignments or no bones.
    pub fn bone_influences(&self) -> BoneInfluences {
        let skinned = self.vertices.iter().any(|v| v.bone_assignment.is_some());
        if !skinned || self.bones.is_empty() {
            return BoneInfluences {
                vertices: vec![Vec::new(); self.vertices.len()],
                skipped: 0,
            };
        }

        let mut skipped = 0;
        let vertices = self
            .vertices
            .iter()
            .map(|vertex| {
                let (Some(assignment), Some(weights)) = (vertex.bone_assignment, vertex.weights)
                else {
                    return Vec::new();
                };
                let mut influences = Vec::new();
                for (slot, weight) in assignment.iter().zip(weights) {
                    let bone = usize::from(*slot);
                    if bone >= self.bones.len() {
                        skipped += 1;
                        continue;
                    }
                    if weight > 0.0 {
                        influences.push((bone, weight));
                    }
                }
                influences
            })
            .collect();

        if skipped > 0 {
            debug!(
                "{} bone assignments point past {} bones",
                skipped,
                self.bones.len()
            );
        }

        BoneInfluences { vertices, skipped }
    }

    /// Group vertices by stable id
    pub fn stable_id_groups(&self) -> StableIdGroups {
        let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (index, vertex) in self.vertices.iter().enumerate() {
            if let Some(id) = vertex.stable_id {
                groups.entry(id).or_default().push(index);
            }
        }
        let lowest = groups.keys().next().copied();
        StableIdGroups { groups, lowest }
    }
}
