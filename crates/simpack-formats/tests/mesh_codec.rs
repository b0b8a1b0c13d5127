#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for GEOM chunks assembled byte by byte
//!
//! The chunks here are built without the crate's writer so that the reader
//! is checked against the layout itself.

use pretty_assertions::assert_eq;
use simpack_formats::FormatError;
use simpack_formats::mesh::{
    IndexWidth, MeshDocument, MeshWriteOptions, TextureSemantic, VertexUsage,
};
use simpack_formats::names::NameTable;
use simpack_formats::tgi::{GEOM_TYPE, RLE2_TYPE, ResourceKey};

#[derive(Default)]
struct Chunk {
    bytes: Vec<u8>,
}

impl Chunk {
    fn u8(&mut self, value: u8) -> &mut Self {
        self.bytes.push(value);
        self
    }

    fn u16(&mut self, value: u16) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn f32s(&mut self, values: &[f32]) -> &mut Self {
        for value in values {
            self.bytes.extend_from_slice(&value.to_le_bytes());
        }
        self
    }

    fn tag(&mut self, tag: &[u8; 4]) -> &mut Self {
        self.bytes.extend_from_slice(tag);
        self
    }

    fn patch(&mut self, at: usize, value: u32) {
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
}

/// Wrapper for one internal GEOM chunk; returns the chunk start
fn wrapper(chunk: &mut Chunk) -> usize {
    chunk.u32(3).u32(0).u32(0).u32(0).u32(1);
    // ITG: instance, type, group
    chunk.u32(0x77).u32(0).u32(GEOM_TYPE).u32(0);
    let start = chunk.bytes.len() + 8;
    chunk.u32(start as u32).u32(0);
    start
}

/// Three vertices (position plus an unknown 4-byte usage), one triangle,
/// one bone and one reference; `shader` is inserted after the shader id
fn three_vertex_chunk(shader_id: u32, shader: &[u8]) -> Vec<u8> {
    let mut chunk = Chunk::default();
    let start = wrapper(&mut chunk);

    chunk.tag(b"GEOM").u32(14);
    let offset_field = chunk.bytes.len();
    chunk.u32(0).u32(4 + 16);
    chunk.u32(shader_id);
    chunk.bytes.extend_from_slice(shader);

    chunk.u32(0).u32(0).u32(3).u32(2);
    chunk.u32(1).u32(1).u8(12);
    chunk.u32(99).u32(2).u8(4);
    for (i, x) in [0.0f32, 1.0, 0.0].into_iter().enumerate() {
        chunk.f32s(&[x, i as f32, 0.5]).u32(0xEEEE_EEEE);
    }

    chunk.u32(1).u8(2).u32(3).u16(0).u16(1).u16(2);
    chunk.u32(0).u32(0).u32(0);
    chunk.u32(1).u32(0xB0E5);

    let tgi_position = chunk.bytes.len();
    chunk.patch(offset_field, (tgi_position - offset_field - 4) as u32);
    chunk.u32(1).u32(RLE2_TYPE).u32(0).u32(0x1234).u32(0);

    let size = chunk.bytes.len() - start;
    chunk.patch(start - 4, size as u32);
    chunk.bytes
}

fn shader_block(tag: &[u8; 4], parameters: &[(u32, u32, Vec<u32>)]) -> Vec<u8> {
    let mut body = Chunk::default();
    body.tag(tag).u32(0).u32(0x74).u32(parameters.len() as u32);
    let mut offset = 16 + 16 * parameters.len();
    for (field, datatype, words) in parameters {
        body.u32(*field)
            .u32(*datatype)
            .u32(words.len() as u32)
            .u32(offset as u32);
        offset += words.len() * 4;
    }
    for (_, _, words) in parameters {
        for word in words {
            body.u32(*word);
        }
    }
    let mut block = (body.bytes.len() as u32).to_le_bytes().to_vec();
    block.extend_from_slice(&body.bytes);
    block
}

/// Block from explicit entry headers (field, datatype, count, offset)
fn raw_shader_block(entries: &[[u32; 4]], data: &[u32]) -> Vec<u8> {
    let mut body = Chunk::default();
    body.tag(b"MTNF").u32(0).u32(0).u32(entries.len() as u32);
    for word in entries.iter().flatten().chain(data) {
        body.u32(*word);
    }
    let mut block = (body.bytes.len() as u32).to_le_bytes().to_vec();
    block.extend_from_slice(&body.bytes);
    block
}

#[test]
fn three_vertex_scenario() {
    let bytes = three_vertex_chunk(0, &[]);
    let mesh = MeshDocument::read(&bytes, &NameTable::empty()).unwrap();

    assert_eq!(mesh.version, 14);
    assert_eq!(mesh.vertices.len(), 3);
    assert_eq!(mesh.vertices[1].position, [1.0, 1.0, 0.5]);
    assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
    assert_eq!(mesh.index_width, IndexWidth::U16);
    assert_eq!(mesh.bones.len(), 1);
    assert_eq!(mesh.bones[0].name, "0xb0e5");
    assert_eq!(
        mesh.references,
        vec![ResourceKey::new(RLE2_TYPE, 0, 0x1234)]
    );
    assert_eq!(mesh.wrapper.internal_chunks[0].instance, 0x77);
    assert!(mesh.degraded.is_none());
    assert!(mesh.shader.is_none());

    // The unknown usage is skipped and dropped from the schema
    let schema = mesh.schema.as_ref().unwrap();
    assert_eq!(schema.elements().len(), 1);
    assert_eq!(schema.elements()[0].usage, VertexUsage::Position);
}

#[test]
fn rewrite_drops_unknown_usage() {
    let bytes = three_vertex_chunk(0, &[]);
    let mesh = MeshDocument::read(&bytes, &NameTable::empty()).unwrap();

    let rewritten = mesh.write(&MeshWriteOptions::default()).unwrap();
    // Four bytes per vertex and one format entry fewer
    assert_eq!(rewritten.len(), bytes.len() - 3 * 4 - 9);

    let again = MeshDocument::read(&rewritten, &NameTable::empty()).unwrap();
    assert_eq!(again.vertices, mesh.vertices);
    assert_eq!(again.bones, mesh.bones);
    assert_eq!(again.references, mesh.references);
}

#[test]
fn shader_texture_references() {
    let block = shader_block(
        b"MTNF",
        &[
            (0x6CC0_FD85, 4, vec![0]),
            (0xDEAD_0001, 1, vec![0x3F80_0000, 0]),
            (0x6E56_548A, 2, vec![0]),
        ],
    );
    let bytes = three_vertex_chunk(0x1234_5678, &block);

    let mut names = NameTable::empty();
    names.merge_shaders([(0x1234_5678, "SimSkin".to_string())]);
    let mesh = MeshDocument::read(&bytes, &names).unwrap();

    let shader = mesh.shader.as_ref().unwrap();
    assert_eq!(shader.name, "SimSkin");
    assert_eq!(shader.block.parameters().len(), 3);
    assert_eq!(shader.block.parameters()[1].as_floats(), vec![1.0, 0.0]);

    // Only texture-typed parameters with a known field hash
    let refs = mesh.texture_refs();
    assert_eq!(refs.len(), 1);
    assert_eq!(
        mesh.texture_reference(TextureSemantic::Diffuse),
        Some(&ResourceKey::new(RLE2_TYPE, 0, 0x1234))
    );
    assert_eq!(mesh.vertices.len(), 3);
    assert_eq!(mesh.bones.len(), 1);
}

#[test]
fn texture_entries_in_game_layout() {
    // Texture entries declare 4 elements but store one index word
    let block = raw_shader_block(&[[0x6CC0_FD85, 4, 4, 32]], &[0]);
    let bytes = three_vertex_chunk(0x1234_5678, &block);

    let mesh = MeshDocument::read(&bytes, &NameTable::empty()).unwrap();
    assert_eq!(
        mesh.texture_reference(TextureSemantic::Diffuse),
        Some(&ResourceKey::new(RLE2_TYPE, 0, 0x1234))
    );
    assert_eq!(mesh.triangles, vec![[0, 1, 2]]);

    // The block is written back as it was read
    let rewritten = mesh.write(&MeshWriteOptions::default()).unwrap();
    assert_eq!(rewritten.len(), bytes.len() - 3 * 4 - 9);
    let again = MeshDocument::read(&rewritten, &NameTable::empty()).unwrap();
    assert_eq!(again.shader, mesh.shader);
}

#[test]
fn overrunning_parameter_keeps_texture_references() {
    let block = raw_shader_block(
        &[
            [0xDEAD_0001, 1, 3, 0x1000],
            [0x6CC0_FD85, 4, 4, 48],
        ],
        &[0],
    );
    let bytes = three_vertex_chunk(0x1234_5678, &block);

    let mesh = MeshDocument::read(&bytes, &NameTable::empty()).unwrap();
    let shader = mesh.shader.as_ref().unwrap();
    assert_eq!(shader.block.parameters().len(), 1);
    assert_eq!(
        mesh.texture_reference(TextureSemantic::Diffuse),
        Some(&ResourceKey::new(RLE2_TYPE, 0, 0x1234))
    );
    assert_eq!(mesh.bones.len(), 1);
}

#[test]
fn malformed_shader_block_is_skipped() {
    // 101 entries marks the block as malformed; its size still delimits it
    let mut block = Vec::new();
    block.extend_from_slice(&16u32.to_le_bytes());
    block.extend_from_slice(b"MTRL");
    block.extend_from_slice(&[0; 8]);
    block.extend_from_slice(&101u32.to_le_bytes());
    let bytes = three_vertex_chunk(0x99, &block);

    let mesh = MeshDocument::read(&bytes, &NameTable::empty()).unwrap();
    let shader = mesh.shader.as_ref().unwrap();
    assert!(shader.block.parameters().is_empty());
    assert!(mesh.texture_refs().is_empty());
    assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
    assert_eq!(mesh.bones.len(), 1);
}

#[test]
fn rejects_bad_tag_and_truncation() {
    let mut bytes = three_vertex_chunk(0, &[]);
    bytes[44..48].copy_from_slice(b"MESH");
    assert!(matches!(
        MeshDocument::read(&bytes, &NameTable::empty()),
        Err(FormatError::BadMagic { .. })
    ));

    let bytes = three_vertex_chunk(0, &[]);
    assert!(matches!(
        MeshDocument::read(&bytes[..100], &NameTable::empty()),
        Err(FormatError::OutOfRange { .. })
    ));
}

#[test]
fn face_index_out_of_range() {
    let mut bytes = three_vertex_chunk(0, &[]);
    // Faces follow 44 wrapper bytes, 36 header bytes, 18 format bytes and 48 vertex bytes
    let faces = 44 + 36 + 18 + 48;
    assert_eq!(&bytes[faces..faces + 5], &[1, 0, 0, 0, 2]);
    bytes[faces + 9 + 4] = 7;
    assert!(matches!(
        MeshDocument::read(&bytes, &NameTable::empty()),
        Err(FormatError::CorruptStream(_))
    ));
}
