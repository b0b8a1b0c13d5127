//! Hash → name lookup for bones and shaders
//!
//! Bone and shader identifiers are stored as 32-bit FNV hashes. The name
//! table maps known hashes back to readable names and is stored on disk as
//! JSON:
//!
//! ```json
//! { "bones": { "0x1a2b3c4d": "b__ROOT__" }, "shader": { "0x...": "..." } }
//! ```
//!
//! Codecs take a `&NameTable` and never mutate it. [`SharedNameTable`] holds
//! the process-wide copy; a rebuild clones the table, edits the clone and
//! swaps it in whole, so a reader holding a snapshot keeps seeing a complete
//! table.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::FormatResult;

const FNV32_OFFSET: u32 = 0x811C_9DC5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// FNV-1 32-bit hash of the lowercased name
pub fn fnv32(name: &str) -> u32 {
    name.bytes().fold(FNV32_OFFSET, |hash, byte| {
        hash.wrapping_mul(FNV32_PRIME) ^ u32::from(byte.to_ascii_lowercase())
    })
}

/// Turn a label into a hash: `0x`-prefixed hex is parsed, anything else hashed
pub fn parse_label(label: &str) -> u32 {
    label
        .strip_prefix("0x")
        .or_else(|| label.strip_prefix("0X"))
        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
        .unwrap_or_else(|| fnv32(label))
}

/// Hex fallback used when a hash has no known name
pub fn hex_label(hash: u32) -> String {
    format!("{hash:#x}")
}

/// On-disk shape of the name table
#[derive(Debug, Default, Serialize, Deserialize)]
struct NameTableFile {
    #[serde(default)]
    bones: BTreeMap<String, String>,
    #[serde(default)]
    shader: BTreeMap<String, String>,
}

/// Read-only hash → name table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    bones: HashMap<u32, String>,
    shaders: HashMap<u32, String>,
}

fn parse_section(section: BTreeMap<String, String>, kind: &str) -> HashMap<u32, String> {
    section
        .into_iter()
        .filter_map(|(key, name)| {
            let digits = key.trim_start_matches("0x").trim_start_matches("0X");
            match u32::from_str_radix(digits, 16) {
                Ok(hash) => Some((hash, name)),
                Err(_) => {
                    warn!("Ignoring {} name table key '{}': not a hex hash", kind, key);
                    None
                }
            }
        })
        .collect()
}

fn render_section(section: &HashMap<u32, String>) -> BTreeMap<String, String> {
    section
        .iter()
        .map(|(hash, name)| (hex_label(*hash), name.clone()))
        .collect()
}

impl NameTable {
    /// An empty table; every lookup falls back to hex
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a table from its JSON text
    pub fn from_json_str(json: &str) -> FormatResult<Self> {
        let file: NameTableFile = serde_json::from_str(json)?;
        Ok(Self {
            bones: parse_section(file.bones, "bone"),
            shaders: parse_section(file.shader, "shader"),
        })
    }

    /// Load a table from disk; a missing file yields an empty table
    pub fn load(path: &Path) -> FormatResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => {
                let table = Self::from_json_str(&json)?;
                debug!(
                    "Loaded name table {} ({} bones, {} shaders)",
                    path.display(),
                    table.bones.len(),
                    table.shaders.len()
                );
                Ok(table)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Name table {} not found, names fall back to hex",
                    path.display()
                );
                Ok(Self::empty())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Serialize the table to JSON
    pub fn to_json_string(&self) -> FormatResult<String> {
        let file = NameTableFile {
            bones: render_section(&self.bones),
            shader: render_section(&self.shaders),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Write the table next to `path` and rename it into place
    pub fn save_atomic(&self, path: &Path) -> FormatResult<()> {
        let json = self.to_json_string()?;
        let temp_path = path.with_extension("tmp");

        let result = (|| -> FormatResult<()> {
            let mut file = std::fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            std::fs::rename(&temp_path, path)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
        }
        result
    }

    /// Bone name for a hash, hex when unknown
    pub fn bone_name(&self, hash: u32) -> Cow<'_, str> {
        self.bones
            .get(&hash)
            .map_or_else(|| Cow::Owned(hex_label(hash)), |name| Cow::Borrowed(name.as_str()))
    }

    /// Shader name for a hash, hex when unknown
    pub fn shader_name(&self, hash: u32) -> Cow<'_, str> {
        self.shaders
            .get(&hash)
            .map_or_else(|| Cow::Owned(hex_label(hash)), |name| Cow::Borrowed(name.as_str()))
    }

    /// Add or replace bone names
    pub fn merge_bones<I>(&mut self, bones: I)
    where
        I: IntoIterator<Item = (u32, String)>,
    {
        self.bones.extend(bones);
    }

    /// Add or replace shader names
    pub fn merge_shaders<I>(&mut self, shaders: I)
    where
        I: IntoIterator<Item = (u32, String)>,
    {
        self.shaders.extend(shaders);
    }

    /// Number of known bone names
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Number of known shader names
    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }
}

/// Process-wide name table that can be swapped while readers hold snapshots
#[derive(Debug, Clone, Default)]
pub struct SharedNameTable {
    current: Arc<RwLock<Arc<NameTable>>>,
}

impl SharedNameTable {
    /// Wrap a loaded table
    pub fn new(table: NameTable) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    /// The table as of now; later rebuilds do not affect it
    pub fn snapshot(&self) -> Arc<NameTable> {
        Arc::clone(&self.current.read())
    }

    /// Replace the whole table
    pub fn replace(&self, table: NameTable) {
        *self.current.write() = Arc::new(table);
    }

    /// Clone the current table, apply `edit`, and swap the result in
    pub fn rebuild<F>(&self, edit: F) -> Arc<NameTable>
    where
        F: FnOnce(&mut NameTable),
    {
        let mut guard = self.current.write();
        let mut next = NameTable::clone(&guard);
        edit(&mut next);
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        next
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv32() {
        // FNV-1 32 reference values
        assert_eq!(fnv32(""), 0x811C_9DC5);
        assert_eq!(fnv32("a"), 0x050C_5D7E);
        assert_eq!(fnv32("foobar"), 0x31F0_B262);
        assert_eq!(fnv32("FooBar"), fnv32("foobar"));
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label("0x1234abcd"), 0x1234_ABCD);
        assert_eq!(parse_label("b__ROOT__"), fnv32("b__root__"));
        // Not valid hex after the prefix, so it is hashed as a name
        assert_eq!(parse_label("0xZZ"), fnv32("0xzz"));
    }

    #[test]
    fn test_lookup_and_fallback() {
        let table = NameTable::from_json_str(
            r#"{"bones": {"0x1a2b": "b__Spine0__"}, "shader": {"0xff": "SimSkin"}}"#,
        )
        .unwrap();
        assert_eq!(table.bone_name(0x1A2B), "b__Spine0__");
        assert_eq!(table.bone_name(0x1A2C), "0x1a2c");
        assert_eq!(table.shader_name(0xFF), "SimSkin");
        assert_eq!(table.shader_name(0), "0x0");
    }

    #[test]
    fn test_missing_sections_and_bad_keys() {
        let table = NameTable::from_json_str(r#"{"bones": {"oops": "x"}}"#).unwrap();
        assert_eq!(table.bone_count(), 0);
        assert_eq!(table.shader_count(), 0);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = NameTable::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(table, NameTable::empty());
    }

    #[test]
    fn test_save_atomic_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fnv_hashmap.json");

        let mut table = NameTable::empty();
        table.merge_bones([(0x10, "b__L_Hand__".to_string())]);
        table.merge_shaders([(0x20, "Phong".to_string())]);
        table.save_atomic(&path).unwrap();

        assert!(!path.with_extension("tmp").exists());
        let loaded = NameTable::load(&path).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_shared_snapshot_survives_rebuild() {
        let shared = SharedNameTable::new(NameTable::empty());
        let before = shared.snapshot();

        let after = shared.rebuild(|table| {
            table.merge_bones([(1, "one".to_string()), (2, "two".to_string())]);
        });

        assert_eq!(before.bone_count(), 0);
        assert_eq!(after.bone_count(), 2);
        assert_eq!(shared.snapshot().bone_name(2), "two");

        shared.replace(NameTable::empty());
        assert_eq!(after.bone_name(1), "one");
        assert_eq!(shared.snapshot().bone_count(), 0);
    }
}
