#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for packages carrying meshes and RLE textures
//!
//! Packages are assembled with `PackageBuilder`, written to disk and opened
//! again, then their resources are decoded the way the CLI does it.

use pretty_assertions::assert_eq;
use simpack_formats::mesh::{Bone, MeshDocument, MeshWriteOptions, Vertex};
use simpack_formats::names::{NameTable, SharedNameTable, fnv32};
use simpack_formats::package::{Package, PackageBuilder};
use simpack_formats::texture::{self, DDS_HEADER_SIZE, RLE2_TAG};
use simpack_formats::tgi::{DDS_TYPE, GEOM_TYPE, RLE2_TYPE, ResourceKey};

fn skinned_mesh(bone_names: &[&str]) -> MeshDocument {
    let vertex = |x: f32| Vertex {
        normal: Some([0.0, 1.0, 0.0]),
        uvs: vec![[x / 4.0, 0.5]],
        bone_assignment: Some([0, 1, 0, 0]),
        weights: Some([0.6, 0.4, 0.0, 0.0]),
        ..Vertex::at([x, 1.0, 0.0])
    };
    MeshDocument {
        vertices: (0..4).map(|i| vertex(i as f32)).collect(),
        triangles: vec![[0, 1, 2], [2, 1, 3]],
        bones: bone_names
            .iter()
            .map(|name| Bone {
                hash: fnv32(name),
                name: (*name).to_string(),
            })
            .collect(),
        references: vec![ResourceKey::new(RLE2_TYPE, 0, 0x42)],
        ..MeshDocument::default()
    }
}

/// 4x4 RLE2 texture holding one opaque block
fn opaque_texture() -> Vec<u8> {
    let mut bytes = b"DXT5".to_vec();
    bytes.extend_from_slice(&RLE2_TAG.to_le_bytes());
    for value in [4u16, 4, 1, 0] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    for offset in [36u32, 38, 42, 46, 46] {
        bytes.extend_from_slice(&offset.to_le_bytes());
    }
    bytes.extend_from_slice(&0x0006u16.to_le_bytes());
    bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    bytes
}

#[test]
fn package_with_mesh_and_texture() {
    let mesh = skinned_mesh(&["b__ROOT__", "b__Spine0__"]);
    let mesh_bytes = mesh.write(&MeshWriteOptions::default()).unwrap();

    let mut builder = PackageBuilder::new();
    builder
        .add_zlib(ResourceKey::new(GEOM_TYPE, 0, 0x10), &mesh_bytes)
        .unwrap();
    builder.add_stored(ResourceKey::new(RLE2_TYPE, 0, 0x42), opaque_texture());
    builder.add_stored(ResourceKey::new(DDS_TYPE, 0, 0x43), b"DDS ".to_vec());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("assets.package");
    std::fs::write(&path, builder.build().unwrap()).unwrap();

    let package = Package::open(&path).unwrap();
    assert_eq!(package.entries().len(), 3);
    assert_eq!(package.textures().count(), 2);

    let mesh_entry = package.meshes().next().unwrap();
    assert!(mesh_entry.is_compressed());
    let payload = package.resource_data(mesh_entry).unwrap().unwrap();
    assert_eq!(payload, mesh_bytes);

    let mut names = NameTable::empty();
    names.merge_bones([(fnv32("b__ROOT__"), "b__ROOT__".to_string())]);
    let decoded = MeshDocument::read(&payload, &names).unwrap();
    assert_eq!(decoded.bones[0].name, "b__ROOT__");
    assert_eq!(decoded.bones[1].name, format!("{:#x}", fnv32("b__Spine0__")));
    assert_eq!(decoded.triangles, mesh.triangles);

    let influences = decoded.bone_influences();
    assert_eq!(influences.skipped, 0);
    for (vertex, pairs) in decoded.vertices.iter().zip(&influences.vertices) {
        let total: f32 = vertex.weights.unwrap().iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert_eq!(pairs.len(), 2);
    }

    // The mesh's reference points at the texture in the same package
    let texture_key = decoded.references[0];
    let texture_entry = package
        .find_by_instance(texture_key.resource_type, texture_key.instance)
        .unwrap();
    let texture_bytes = package.resource_data(texture_entry).unwrap().unwrap();
    let image = texture::decode(&texture_bytes).unwrap();
    let dds = image.to_bytes().unwrap();
    assert_eq!(dds.len(), DDS_HEADER_SIZE + 16);
    assert_eq!(
        &dds[DDS_HEADER_SIZE..],
        &[0x00, 0x05, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 1, 2, 3, 4, 5, 6, 7, 8]
    );
}

#[test]
fn name_table_rebuild_and_persist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fnv_hashmap.json");

    // Missing file loads as an empty table
    let shared = SharedNameTable::new(NameTable::load(&path).unwrap());
    let before = shared.snapshot();
    assert_eq!(before.bone_count(), 0);

    let after = shared.rebuild(|table| {
        table.merge_bones([(fnv32("b__Head__"), "b__Head__".to_string())]);
    });
    assert_eq!(before.bone_count(), 0);
    assert_eq!(after.bone_name(fnv32("b__head__")), "b__Head__");

    after.save_atomic(&path).unwrap();
    let reloaded = NameTable::load(&path).unwrap();
    assert_eq!(reloaded.bone_name(fnv32("b__Head__")), "b__Head__");
    assert_eq!(
        std::fs::read_dir(dir.path()).unwrap().count(),
        1,
        "temporary file left behind"
    );
}
