//! GEOM chunk decoding

use tracing::{debug, warn};

use super::{
    Bone, ChunkWrapper, EmbeddedShader, GEOM_TAG, IndexWidth, KNOWN_GEOM_VERSIONS, MeshDocument,
    OPAQUE_RECORD_SIZE, OpaqueRecord, ShaderBlock, TrailingSection, UvStitch, Vertex,
    VertexElement, VertexSchema, VertexUsage,
};
use crate::cursor::ByteCursor;
use crate::error::{FormatError, FormatResult};
use crate::names::NameTable;
use crate::tgi::{RESOURCE_KEY_SIZE, ResourceKey};

/// One entry of the format table as declared, including unknown usages
#[derive(Debug, Clone, Copy)]
enum FormatSlot {
    Known(VertexElement),
    Unknown { byte_size: u8 },
}

impl FormatSlot {
    fn byte_size(&self) -> usize {
        match self {
            Self::Known(element) => usize::from(element.usage.byte_size()),
            Self::Unknown { byte_size } => usize::from(*byte_size),
        }
    }
}

/// Lists between the faces and the bones
#[derive(Debug, Default)]
struct TrailingLists {
    uv_stitches: Vec<UvStitch>,
    seam_stitches: Vec<OpaqueRecord>,
    slot_rays: Vec<OpaqueRecord>,
}

fn out_of_range(cursor: &ByteCursor<&[u8]>, requested: usize) -> FormatError {
    FormatError::OutOfRange {
        offset: cursor.position(),
        requested,
        available: cursor.remaining(),
    }
}

fn read_floats<const N: usize>(cursor: &mut ByteCursor<&[u8]>) -> FormatResult<[f32; N]> {
    let mut out = [0.0; N];
    for value in &mut out {
        *value = cursor.read_f32()?;
    }
    Ok(out)
}

fn read_wrapper(cursor: &mut ByteCursor<&[u8]>) -> FormatResult<ChunkWrapper> {
    let version = cursor.read_u32()?;
    let public_chunks = cursor.read_u32()?;
    let unused = cursor.read_u32()?;
    let external_count = cursor.read_u32()? as usize;
    let internal_count = cursor.read_u32()? as usize;

    let keys_len = (internal_count + external_count) * RESOURCE_KEY_SIZE + internal_count * 8;
    if keys_len > cursor.remaining() {
        return Err(out_of_range(cursor, keys_len));
    }

    let internal_chunks = (0..internal_count)
        .map(|_| ResourceKey::read_itg(cursor))
        .collect::<FormatResult<Vec<_>>>()?;
    let external_resources = (0..external_count)
        .map(|_| ResourceKey::read_itg(cursor))
        .collect::<FormatResult<Vec<_>>>()?;

    for _ in 0..internal_count {
        let position = cursor.read_u32()?;
        let size = cursor.read_u32()?;
        debug!("Wrapped chunk at {}, {} bytes", position, size);
    }

    Ok(ChunkWrapper {
        version,
        public_chunks,
        unused,
        internal_chunks,
        external_resources,
    })
}

fn read_format_table(
    cursor: &mut ByteCursor<&[u8]>,
    count: usize,
) -> FormatResult<(Vec<FormatSlot>, VertexSchema)> {
    let mut slots = Vec::with_capacity(count.min(cursor.remaining() / 9));
    let mut known = Vec::new();

    for _ in 0..count {
        let code = cursor.read_u32()?;
        let datatype = cursor.read_u32()?;
        let byte_size = cursor.read_u8()?;

        match VertexUsage::from_code(code) {
            Some(usage) => {
                if byte_size != usage.byte_size() {
                    warn!(
                        "{:?} declared with {} bytes, reading {}",
                        usage,
                        byte_size,
                        usage.byte_size()
                    );
                }
                let element = VertexElement {
                    usage,
                    datatype,
                    byte_size,
                };
                slots.push(FormatSlot::Known(element));
                known.push(element);
            }
            None => {
                warn!(
                    "Unknown vertex usage {}, skipping {} bytes per vertex",
                    code, byte_size
                );
                slots.push(FormatSlot::Unknown { byte_size });
            }
        }
    }

    Ok((slots, VertexSchema::new(known)))
}

fn read_vertex(cursor: &mut ByteCursor<&[u8]>, slots: &[FormatSlot]) -> FormatResult<Vertex> {
    let mut vertex = Vertex::default();
    for slot in slots {
        let element = match slot {
            FormatSlot::Known(element) => element,
            FormatSlot::Unknown { byte_size } => {
                cursor.skip(usize::from(*byte_size))?;
                continue;
            }
        };
        match element.usage {
            VertexUsage::Position => vertex.position = read_floats(cursor)?,
            VertexUsage::Normal => vertex.normal = Some(read_floats(cursor)?),
            VertexUsage::Uv => vertex.uvs.push(read_floats(cursor)?),
            VertexUsage::BoneAssignment => vertex.bone_assignment = Some(cursor.read_array()?),
            VertexUsage::Weights => {
                let raw: [u8; 4] = cursor.read_array()?;
                vertex.weights = Some(raw.map(|w| f32::from(w) / 255.0));
            }
            VertexUsage::Tangent => vertex.tangent = Some(read_floats(cursor)?),
            VertexUsage::Color => vertex.color = Some(cursor.read_array()?),
            VertexUsage::StableId => vertex.stable_id = Some(cursor.read_u32()?),
        }
    }
    Ok(vertex)
}

fn read_index(cursor: &mut ByteCursor<&[u8]>, width: IndexWidth) -> FormatResult<u32> {
    match width {
        IndexWidth::U16 => Ok(u32::from(cursor.read_u16()?)),
        IndexWidth::U32 => cursor.read_u32(),
    }
}

fn read_faces(
    cursor: &mut ByteCursor<&[u8]>,
    vertex_count: usize,
) -> FormatResult<(IndexWidth, Vec<[u32; 3]>)> {
    let item_count = cursor.read_u32()?;
    if item_count != 1 {
        warn!("Face item count {} (expected 1)", item_count);
    }
    let width = IndexWidth::from_code(cursor.read_u8()?);
    let index_count = cursor.read_u32()? as usize;

    let bytes = index_count * width.bytes();
    if bytes > cursor.remaining() {
        return Err(out_of_range(cursor, bytes));
    }

    let mut triangles = Vec::with_capacity(index_count / 3);
    for _ in 0..index_count / 3 {
        let mut triangle = [0u32; 3];
        for index in &mut triangle {
            *index = read_index(cursor, width)?;
            if *index as usize >= vertex_count {
                return Err(FormatError::CorruptStream(format!(
                    "face index {index} out of range for {vertex_count} vertices"
                )));
            }
        }
        triangles.push(triangle);
    }

    let leftover = index_count % 3;
    if leftover != 0 {
        warn!("{} face indices do not form a triangle, skipping", leftover);
        cursor.skip(leftover * width.bytes())?;
    }

    Ok((width, triangles))
}

/// Fail with `StructuralOverflow` unless `bytes` from the cursor end strictly before `limit`
fn ensure_before(
    cursor: &ByteCursor<&[u8]>,
    section: TrailingSection,
    bytes: usize,
    limit: usize,
) -> FormatResult<()> {
    let projected_end = cursor.position().saturating_add(bytes);
    if projected_end < limit {
        Ok(())
    } else {
        Err(FormatError::StructuralOverflow {
            section: section.as_str(),
            projected_end,
            limit,
        })
    }
}

fn read_records(
    cursor: &mut ByteCursor<&[u8]>,
    section: TrailingSection,
    limit: usize,
) -> FormatResult<Vec<OpaqueRecord>> {
    let count = cursor.read_u32()? as usize;
    ensure_before(
        cursor,
        section,
        count.saturating_mul(OPAQUE_RECORD_SIZE),
        limit,
    )?;
    debug!("{}: {} records at {}", section, count, cursor.position());
    (0..count)
        .map(|_| cursor.read_array().map(OpaqueRecord))
        .collect()
}

/// Read the lists between faces and bones; `reached` tracks the current section
fn read_trailing(
    cursor: &mut ByteCursor<&[u8]>,
    limit: usize,
    lists: &mut TrailingLists,
    reached: &mut TrailingSection,
) -> FormatResult<()> {
    *reached = TrailingSection::UvStitch;
    let count = cursor.read_u32()? as usize;
    // Each entry holds at least an index and a pair count
    ensure_before(cursor, *reached, count.saturating_mul(8), limit)?;
    for _ in 0..count {
        let index = cursor.read_u32()?;
        let pairs = cursor.read_u32()? as usize;
        ensure_before(cursor, *reached, pairs.saturating_mul(8), limit)?;
        let coordinates = (0..pairs)
            .map(|_| read_floats::<2>(cursor))
            .collect::<FormatResult<Vec<_>>>()?;
        lists.uv_stitches.push(UvStitch { index, coordinates });
    }

    *reached = TrailingSection::SeamStitch;
    lists.seam_stitches = read_records(cursor, *reached, limit)?;

    *reached = TrailingSection::SlotRay;
    lists.slot_rays = read_records(cursor, *reached, limit)?;

    Ok(())
}

fn read_bones(cursor: &mut ByteCursor<&[u8]>, names: &NameTable) -> FormatResult<Vec<Bone>> {
    let count = cursor.read_u32()? as usize;
    let raw = cursor.read_bytes(count.saturating_mul(4))?;
    Ok(raw
        .chunks_exact(4)
        .map(|c| {
            let hash = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
            Bone {
                hash,
                name: names.bone_name(hash).into_owned(),
            }
        })
        .collect())
}

fn read_references(cursor: &mut ByteCursor<&[u8]>) -> FormatResult<Vec<ResourceKey>> {
    if cursor.remaining() < 4 {
        return Ok(Vec::new());
    }
    let count = cursor.read_u32()? as usize;
    let mut references = Vec::with_capacity(count.min(cursor.remaining() / RESOURCE_KEY_SIZE));
    for read in 0..count {
        if cursor.remaining() < RESOURCE_KEY_SIZE {
            warn!(
                "Reference list declares {} entries, buffer ends after {}",
                count, read
            );
            break;
        }
        references.push(ResourceKey::read_tgi(cursor)?);
    }
    Ok(references)
}

impl MeshDocument {
    /// Decode a mesh resource (chunk wrapper plus GEOM chunk)
    pub fn read(data: &[u8], names: &NameTable) -> FormatResult<Self> {
        let mut cursor = ByteCursor::new(data);

        let wrapper = read_wrapper(&mut cursor)?;
        cursor.expect_tag(GEOM_TAG)?;

        let version = cursor.read_u32()?;
        if !KNOWN_GEOM_VERSIONS.contains(&version) {
            warn!("GEOM version {} is not one of {:?}", version, KNOWN_GEOM_VERSIONS);
        }

        let tgi_offset = cursor.read_u32()? as usize;
        let tgi_position = cursor.position() + tgi_offset;
        let tgi_size = cursor.read_u32()?;
        debug!(
            "GEOM v{}: reference list at {} ({} bytes)",
            version, tgi_position, tgi_size
        );

        let shader_id = cursor.read_u32()?;
        let shader = if shader_id != 0 {
            let name = names.shader_name(shader_id).into_owned();
            let block = ShaderBlock::read(&mut cursor)?;
            Some(EmbeddedShader {
                id: shader_id,
                name,
                block,
            })
        } else {
            None
        };

        let merge_group = cursor.read_u32()?;
        let sort_order = cursor.read_u32()?;
        let vertex_count = cursor.read_u32()? as usize;
        let format_count = cursor.read_u32()? as usize;

        let (slots, schema) = read_format_table(&mut cursor, format_count)?;
        let stride: usize = slots.iter().map(FormatSlot::byte_size).sum();
        if vertex_count > 0 && stride == 0 {
            return Err(FormatError::CorruptStream(format!(
                "{vertex_count} vertices declared without vertex data"
            )));
        }
        let vertex_bytes = vertex_count.saturating_mul(stride);
        if vertex_bytes > cursor.remaining() {
            return Err(out_of_range(&cursor, vertex_bytes));
        }
        debug!(
            "{} vertices, {} format entries, stride {} at {}",
            vertex_count,
            format_count,
            stride,
            cursor.position()
        );

        let vertices = (0..vertex_count)
            .map(|_| read_vertex(&mut cursor, &slots))
            .collect::<FormatResult<Vec<_>>>()?;

        let (index_width, triangles) = read_faces(&mut cursor, vertex_count)?;
        debug!("{} triangles, faces end at {}", triangles.len(), cursor.position());

        let mut lists = TrailingLists::default();
        let mut reached = TrailingSection::UvStitch;
        let degraded = match read_trailing(&mut cursor, tgi_position, &mut lists, &mut reached) {
            Ok(()) => None,
            Err(FormatError::StructuralOverflow {
                projected_end,
                limit,
                ..
            }) => {
                warn!(
                    "{} would end at {}, past the reference list at {}; skipping to it without bones",
                    reached, projected_end, limit
                );
                Some(reached)
            }
            Err(e) => return Err(e),
        };

        let bones = if degraded.is_some() {
            Vec::new()
        } else if cursor.position() < tgi_position {
            read_bones(&mut cursor, names)?
        } else {
            warn!("No room for a bone list before the reference list");
            Vec::new()
        };

        let references = if tgi_position > cursor.len() {
            warn!(
                "Reference list offset {} is past the end of the chunk ({} bytes)",
                tgi_position,
                cursor.len()
            );
            Vec::new()
        } else {
            if cursor.position() < tgi_position || degraded.is_some() {
                cursor.seek(tgi_position)?;
            } else if cursor.position() > tgi_position {
                warn!(
                    "Bone list ends at {}, past the reference list offset {}",
                    cursor.position(),
                    tgi_position
                );
            }
            read_references(&mut cursor)?
        };

        let expected_tgi_size = 4 + references.len() * RESOURCE_KEY_SIZE;
        if tgi_size as usize != expected_tgi_size {
            debug!(
                "Reference list size field {} differs from {} read",
                tgi_size, expected_tgi_size
            );
        }

        Ok(Self {
            wrapper,
            version,
            shader,
            merge_group,
            sort_order,
            skin_controller_index: 0,
            schema: Some(schema),
            vertices,
            index_width,
            triangles,
            uv_stitches: lists.uv_stitches,
            seam_stitches: lists.seam_stitches,
            slot_rays: lists.slot_rays,
            bones,
            references,
            degraded,
        })
    }
}
