//! GEOM chunk encoding
//!
//! The output is buffered in memory: the wrapper's chunk position and size,
//! the shader block size and the reference list offset are reserved as
//! placeholders and patched once the content they describe is written.

use tracing::debug;

use super::{
    GEOM_TAG, IndexWidth, MeshDocument, Vertex, VertexElement, VertexSchema, VertexUsage,
};
use crate::cursor::{ByteCursor, PatchSlot};
use crate::error::{FormatError, FormatResult};
use crate::tgi::{GEOM_TYPE, RESOURCE_KEY_SIZE, ResourceKey};

/// Default limit on the bone list length
pub const DEFAULT_MAX_BONES: usize = 255;

/// Write-time limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshWriteOptions {
    /// Most bones a document may reference
    pub max_bones: usize,
}

impl Default for MeshWriteOptions {
    fn default() -> Self {
        Self {
            max_bones: DEFAULT_MAX_BONES,
        }
    }
}

fn validation(message: impl Into<String>) -> FormatError {
    FormatError::Validation(message.into())
}

fn channel<T: Copy>(value: Option<T>, usage: VertexUsage, index: usize) -> FormatResult<T> {
    value.ok_or_else(|| validation(format!("vertex {index} has no {usage:?} channel")))
}

fn quantize_weight(weight: f32) -> u8 {
    (weight.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn patch_length_since(writer: &mut ByteCursor<Vec<u8>>, slot: PatchSlot) -> FormatResult<()> {
    let length = writer.position() - slot.offset() - 4;
    let length = u32::try_from(length)
        .map_err(|_| validation(format!("section of {length} bytes does not fit in 32 bits")))?;
    writer.patch_u32(slot, length)
}

fn write_floats(writer: &mut ByteCursor<Vec<u8>>, values: &[f32]) -> FormatResult<()> {
    for value in values {
        writer.write_f32(*value)?;
    }
    Ok(())
}

fn write_vertex(
    writer: &mut ByteCursor<Vec<u8>>,
    elements: &[VertexElement],
    vertex: &Vertex,
    index: usize,
) -> FormatResult<()> {
    let mut uvs = vertex.uvs.iter();
    for element in elements {
        match element.usage {
            VertexUsage::Position => write_floats(writer, &vertex.position)?,
            VertexUsage::Normal => {
                write_floats(writer, &channel(vertex.normal, element.usage, index)?)?;
            }
            VertexUsage::Uv => {
                let uv = uvs
                    .next()
                    .ok_or_else(|| validation(format!("vertex {index} is missing a UV channel")))?;
                write_floats(writer, uv)?;
            }
            VertexUsage::BoneAssignment => {
                writer.write_bytes(&channel(vertex.bone_assignment, element.usage, index)?)?;
            }
            VertexUsage::Weights => {
                let weights = channel(vertex.weights, element.usage, index)?;
                writer.write_bytes(&weights.map(quantize_weight))?;
            }
            VertexUsage::Tangent => {
                write_floats(writer, &channel(vertex.tangent, element.usage, index)?)?;
            }
            VertexUsage::Color => {
                writer.write_bytes(&channel(vertex.color, element.usage, index)?)?;
            }
            VertexUsage::StableId => {
                writer.write_u32(channel(vertex.stable_id, element.usage, index)?)?;
            }
        }
    }
    Ok(())
}

impl MeshDocument {
    /// Check that the document can be written; returns the schema to write
    pub fn validate(&self, options: &MeshWriteOptions) -> FormatResult<VertexSchema> {
        if self.vertices.is_empty() {
            return Err(validation("mesh has no vertices"));
        }
        let schema = self
            .effective_schema()
            .ok_or_else(|| validation("mesh has no vertices"))?;
        schema.validate(&self.vertices)?;

        if self.wrapper.internal_chunks.len() > 1 {
            return Err(validation(format!(
                "{} internal chunks, only one GEOM chunk can be written",
                self.wrapper.internal_chunks.len()
            )));
        }

        if self.bones.len() > options.max_bones {
            return Err(validation(format!(
                "{} bones exceed the limit of {}",
                self.bones.len(),
                options.max_bones
            )));
        }

        if let Some(shader) = &self.shader
            && shader.id == 0
        {
            return Err(validation("embedded shader with id 0"));
        }

        let vertex_count = self.vertices.len();
        for (face, triangle) in self.triangles.iter().enumerate() {
            for &index in triangle {
                if index as usize >= vertex_count {
                    return Err(validation(format!(
                        "triangle {face} index {index} out of range for {vertex_count} vertices"
                    )));
                }
                if self.index_width == IndexWidth::U16 && index > u32::from(u16::MAX) {
                    return Err(validation(format!(
                        "triangle {face} index {index} does not fit 16-bit indices"
                    )));
                }
            }
        }

        Ok(schema)
    }

    /// Encode the mesh resource
    pub fn write(&self, options: &MeshWriteOptions) -> FormatResult<Vec<u8>> {
        let schema = self.validate(options)?;
        let mut writer = ByteCursor::writer();

        // Chunk wrapper
        let default_chunk = [ResourceKey::new(GEOM_TYPE, 0, 0)];
        let internal = if self.wrapper.internal_chunks.is_empty() {
            &default_chunk[..]
        } else {
            &self.wrapper.internal_chunks[..]
        };
        writer.write_u32(self.wrapper.version)?;
        writer.write_u32(self.wrapper.public_chunks)?;
        writer.write_u32(self.wrapper.unused)?;
        writer.write_u32(self.wrapper.external_resources.len() as u32)?;
        writer.write_u32(internal.len() as u32)?;
        for key in internal {
            key.write_itg(&mut writer)?;
        }
        for key in &self.wrapper.external_resources {
            key.write_itg(&mut writer)?;
        }
        let chunk_position_slot = writer.reserve_u32()?;
        let chunk_size_slot = writer.reserve_u32()?;
        writer.patch_u32(chunk_position_slot, writer.position() as u32)?;

        // Chunk header
        writer.write_tag(GEOM_TAG)?;
        writer.write_u32(self.version)?;
        let tgi_offset_slot = writer.reserve_u32()?;
        writer.write_u32((4 + self.references.len() * RESOURCE_KEY_SIZE) as u32)?;

        match &self.shader {
            Some(shader) => {
                writer.write_u32(shader.id)?;
                shader.block.write(&mut writer)?;
            }
            None => writer.write_u32(0)?,
        }

        writer.write_u32(self.merge_group)?;
        writer.write_u32(self.sort_order)?;
        writer.write_u32(self.vertices.len() as u32)?;

        let elements = schema.elements();
        writer.write_u32(elements.len() as u32)?;
        for element in elements {
            writer.write_u32(element.usage.code())?;
            writer.write_u32(element.datatype)?;
            writer.write_u8(element.byte_size)?;
        }
        for (index, vertex) in self.vertices.iter().enumerate() {
            write_vertex(&mut writer, elements, vertex, index)?;
        }

        // Faces
        writer.write_u32(1)?;
        writer.write_u8(self.index_width.code())?;
        writer.write_u32((self.triangles.len() * 3) as u32)?;
        for index in self.triangles.iter().flatten() {
            match self.index_width {
                IndexWidth::U16 => writer.write_u16(*index as u16)?,
                IndexWidth::U32 => writer.write_u32(*index)?,
            }
        }

        // Trailing lists
        writer.write_u32(self.uv_stitches.len() as u32)?;
        for stitch in &self.uv_stitches {
            writer.write_u32(stitch.index)?;
            writer.write_u32(stitch.coordinates.len() as u32)?;
            for pair in &stitch.coordinates {
                write_floats(&mut writer, pair)?;
            }
        }
        for records in [&self.seam_stitches, &self.slot_rays] {
            writer.write_u32(records.len() as u32)?;
            for record in records {
                writer.write_bytes(&record.0)?;
            }
        }

        writer.write_u32(self.bones.len() as u32)?;
        for bone in &self.bones {
            writer.write_u32(bone.hash)?;
        }

        // Reference list
        patch_length_since(&mut writer, tgi_offset_slot)?;
        writer.write_u32(self.references.len() as u32)?;
        for key in &self.references {
            key.write_tgi(&mut writer)?;
        }

        patch_length_since(&mut writer, chunk_size_slot)?;

        debug!(
            "Wrote GEOM v{}: {} vertices, {} triangles, {} bones, {} bytes",
            self.version,
            self.vertices.len(),
            self.triangles.len(),
            self.bones.len(),
            writer.position()
        );

        Ok(writer.into_inner())
    }
}
