//! Subcommand implementations.
//!
//! Every command reads its inputs, drives `simpack-formats` and writes its
//! report to the given writer, so the binary stays a thin wrapper.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{CliConfig, Command, NamesCommand};
use simpack_formats::mesh::MeshDocument;
use simpack_formats::names::{NameTable, SharedNameTable, fnv32, parse_label};
use simpack_formats::package::{PACKAGE_MAGIC, Package, ResourceEntry};
use simpack_formats::texture;
use simpack_formats::tgi::ResourceKey;

/// Run the configured subcommand
pub fn run(config: &CliConfig, out: &mut dyn Write) -> Result<()> {
    match &config.command {
        Command::List {
            package,
            resource_type,
        } => {
            let package = open_package(package)?;
            write_entry_table(out, &filter_entries(&package, *resource_type))?;
        }
        Command::Extract {
            package,
            out_dir,
            resource_type,
        } => {
            let package = open_package(package)?;
            let written = extract(&package, out_dir, *resource_type)?;
            writeln!(out, "Extracted {} resources to {}", written, out_dir.display())?;
        }
        Command::Mesh {
            file,
            instance,
            output,
        } => {
            let names = NameTable::load(&config.names)?;
            let mesh = decode_mesh(file, *instance, &names)?;
            writeln!(
                out,
                "{}",
                serde_json::to_string_pretty(&MeshSummary::new(&mesh))?
            )?;
            if let Some(output) = output {
                let bytes = mesh
                    .write(&config.mesh_write_options())
                    .context("Mesh cannot be re-encoded")?;
                std::fs::write(output, &bytes)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                info!("Re-encoded mesh to {} ({} bytes)", output.display(), bytes.len());
            }
        }
        Command::Textures { package, out_dir } => {
            let package = open_package(package)?;
            let report = convert_textures(&package, out_dir)?;
            writeln!(
                out,
                "Converted {} textures to {} ({} failed)",
                report.converted,
                out_dir.display(),
                report.failed
            )?;
        }
        Command::Names {
            action: NamesCommand::Merge { bones },
        } => {
            let merged = merge_bone_names(&config.names, bones)?;
            writeln!(
                out,
                "Merged {} bone names into {}",
                merged,
                config.names.display()
            )?;
        }
    }
    Ok(())
}

fn open_package(path: &Path) -> Result<Package> {
    let package = Package::open(path)
        .with_context(|| format!("Failed to open package {}", path.display()))?;
    info!(
        "Opened {} ({} entries)",
        path.display(),
        package.entries().len()
    );
    Ok(package)
}

/// Entries, optionally restricted to one resource type
pub fn filter_entries(package: &Package, resource_type: Option<u32>) -> Vec<&ResourceEntry> {
    package
        .entries()
        .iter()
        .filter(|e| resource_type.is_none_or(|t| e.key.resource_type == t))
        .collect()
}

/// Print one line per entry
pub fn write_entry_table(out: &mut dyn Write, entries: &[&ResourceEntry]) -> Result<()> {
    writeln!(
        out,
        "{:<10} {:<10} {:<18} {:>10} {:>10} {:>10}  name",
        "type", "group", "instance", "offset", "size", "mem size"
    )?;
    for entry in entries {
        let marker = if entry.is_compressed() { "*" } else { " " };
        writeln!(
            out,
            "{} {} {} {:>10} {:>10} {:>10}{} {}",
            entry.type_hex(),
            entry.group_hex(),
            entry.instance_hex(),
            entry.chunk_offset,
            entry.file_size,
            entry.mem_size,
            marker,
            entry.display_name()
        )?;
    }
    Ok(())
}

/// File name used for an extracted payload
pub fn extract_file_name(key: &ResourceKey) -> String {
    format!(
        "{:08X}_{:08X}_{:016X}.bin",
        key.resource_type, key.group, key.instance
    )
}

/// Write decompressed payloads into `out_dir`; returns how many were written
pub fn extract(package: &Package, out_dir: &Path, resource_type: Option<u32>) -> Result<usize> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut written = 0;
    for entry in filter_entries(package, resource_type) {
        let Some(data) = package
            .resource_data(entry)
            .with_context(|| format!("Failed to read {}", entry.display_name()))?
        else {
            debug!("{} has no payload, skipping", entry.display_name());
            continue;
        };
        let path = out_dir.join(extract_file_name(&entry.key));
        std::fs::write(&path, &data)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written += 1;
    }
    Ok(written)
}

/// Texture slot as reported in a mesh summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextureSummary {
    /// Slot name
    pub semantic: String,
    /// Index into the reference list
    pub reference_index: u32,
    /// Referenced resource, when the index is valid
    pub resource: Option<String>,
}

/// Shader block as reported in a mesh summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShaderSummary {
    /// Shader hash
    pub id: String,
    /// Resolved name
    pub name: String,
    /// Number of decoded parameters
    pub parameters: usize,
    /// Texture slots
    pub textures: Vec<TextureSummary>,
}

/// JSON summary printed by `simpack mesh`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeshSummary {
    /// GEOM chunk version
    pub version: u32,
    /// Vertex count
    pub vertices: usize,
    /// Triangle count
    pub triangles: usize,
    /// Bytes per index
    pub index_bytes: usize,
    /// Vertex format usages in order
    pub format: Vec<String>,
    /// Embedded shader
    pub shader: Option<ShaderSummary>,
    /// Bone names
    pub bones: Vec<String>,
    /// Referenced resources
    pub references: Vec<String>,
    /// UV stitch entries
    pub uv_stitches: usize,
    /// Seam stitch records
    pub seam_stitches: usize,
    /// Slot-ray records
    pub slot_rays: usize,
    /// Trailing section where decoding stopped, if any
    pub degraded: Option<String>,
    /// Bone assignments pointing past the bone list
    pub skipped_assignments: usize,
    /// Distinct stable ids
    pub stable_ids: usize,
    /// Lowest stable id
    pub lowest_stable_id: Option<u32>,
}

impl MeshSummary {
    /// Summarize a decoded mesh
    pub fn new(mesh: &MeshDocument) -> Self {
        let shader = mesh.shader.as_ref().map(|shader| ShaderSummary {
            id: format!("0x{:08X}", shader.id),
            name: shader.name.clone(),
            parameters: shader.block.parameters().len(),
            textures: shader
                .block
                .texture_refs()
                .into_iter()
                .map(|(semantic, index)| TextureSummary {
                    semantic: semantic.to_string(),
                    reference_index: index,
                    resource: mesh.references.get(index as usize).map(ToString::to_string),
                })
                .collect(),
        });
        let format = mesh
            .effective_schema()
            .map(|schema| {
                schema
                    .elements()
                    .iter()
                    .map(|e| format!("{:?}", e.usage))
                    .collect()
            })
            .unwrap_or_default();
        let stable_ids = mesh.stable_id_groups();

        Self {
            version: mesh.version,
            vertices: mesh.vertices.len(),
            triangles: mesh.triangles.len(),
            index_bytes: mesh.index_width.bytes(),
            format,
            shader,
            bones: mesh.bones.iter().map(|b| b.name.clone()).collect(),
            references: mesh.references.iter().map(ToString::to_string).collect(),
            uv_stitches: mesh.uv_stitches.len(),
            seam_stitches: mesh.seam_stitches.len(),
            slot_rays: mesh.slot_rays.len(),
            degraded: mesh.degraded.map(|section| section.to_string()),
            skipped_assignments: mesh.bone_influences().skipped,
            stable_ids: stable_ids.groups.len(),
            lowest_stable_id: stable_ids.lowest,
        }
    }
}

/// Mesh chunk bytes from a package (by instance or the first mesh) or a raw file
pub fn load_mesh_bytes(path: &Path, instance: Option<u64>) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if !bytes.starts_with(&PACKAGE_MAGIC) {
        debug!("{} is not a package, reading it as a mesh chunk", path.display());
        return Ok(bytes);
    }

    let package = Package::parse(bytes)
        .with_context(|| format!("Failed to parse package {}", path.display()))?;
    let entry = match instance {
        Some(instance) => package
            .meshes()
            .find(|e| e.key.instance == instance)
            .with_context(|| format!("No mesh with instance 0x{instance:016X}"))?,
        None => package
            .meshes()
            .next()
            .with_context(|| format!("{} contains no meshes", path.display()))?,
    };
    match package.resource_data(entry)? {
        Some(data) => Ok(data),
        None => bail!("{} has no payload", entry.display_name()),
    }
}

/// Load and decode a mesh
pub fn decode_mesh(path: &Path, instance: Option<u64>, names: &NameTable) -> Result<MeshDocument> {
    let bytes = load_mesh_bytes(path, instance)?;
    let mesh = MeshDocument::read(&bytes, names)
        .with_context(|| format!("Failed to decode mesh from {}", path.display()))?;
    if let Some(section) = mesh.degraded {
        warn!("Mesh decoded without bones: {} could not be parsed", section);
    }
    Ok(mesh)
}

/// Decode a mesh and summarize it
pub fn mesh_summary(path: &Path, instance: Option<u64>, names: &NameTable) -> Result<MeshSummary> {
    decode_mesh(path, instance, names).map(|mesh| MeshSummary::new(&mesh))
}

/// Outcome of a texture conversion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureReport {
    /// Textures written
    pub converted: usize,
    /// Textures that failed to decode
    pub failed: usize,
}

/// Decode every RLE texture and write `<type>_<group>_<instance>.dds`
pub fn convert_textures(package: &Package, out_dir: &Path) -> Result<TextureReport> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut report = TextureReport::default();
    for entry in package.rle_textures() {
        let Some(data) = package.resource_data(entry)? else {
            continue;
        };
        let image = match texture::decode(&data) {
            Ok(image) => image,
            Err(e) => {
                warn!("Skipping {}: {}", entry.display_name(), e);
                report.failed += 1;
                continue;
            }
        };
        let path = out_dir
            .join(extract_file_name(&entry.key))
            .with_extension("dds");
        std::fs::write(&path, image.to_bytes()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(
            "Wrote {} ({}x{}, {} mips)",
            path.display(),
            image.width,
            image.height,
            image.mip_count
        );
        report.converted += 1;
    }
    Ok(report)
}

/// Bone names to merge: a list of names or an object of hash (or name) to name
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BoneNames {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl BoneNames {
    fn into_pairs(self) -> Vec<(u32, String)> {
        match self {
            Self::List(names) => names.into_iter().map(|n| (fnv32(&n), n)).collect(),
            Self::Map(map) => map
                .into_iter()
                .map(|(label, name)| (parse_label(&label), name))
                .collect(),
        }
    }
}

/// Merge bone names into the table at `table_path`; returns how many were merged
pub fn merge_bone_names(table_path: &Path, bones_path: &Path) -> Result<usize> {
    let json = std::fs::read_to_string(bones_path)
        .with_context(|| format!("Failed to read {}", bones_path.display()))?;
    let pairs = serde_json::from_str::<BoneNames>(&json)
        .with_context(|| format!("{} is not a bone name list", bones_path.display()))?
        .into_pairs();
    let count = pairs.len();

    let shared = SharedNameTable::new(NameTable::load(table_path)?);
    let table = shared.rebuild(|table| table.merge_bones(pairs));
    table
        .save_atomic(table_path)
        .with_context(|| format!("Failed to save {}", table_path.display()))?;

    info!(
        "Name table {} now has {} bones",
        table_path.display(),
        table.bone_count()
    );
    Ok(count)
}
