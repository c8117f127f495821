//! Asset manifest (`manifest.json`): relative path → content hash and size.

use super::RenderError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Hex BLAKE3 of the file contents.
    pub hash: String,
    pub bytes: u64,
}

impl AssetEntry {
    pub fn of(contents: &[u8]) -> Self {
        Self {
            hash: blake3::hash(contents).to_hex().to_string(),
            bytes: contents.len() as u64,
        }
    }
}

/// Holds no timestamps so identical assets give an identical manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    pub assets: BTreeMap<String, AssetEntry>,
}

impl AssetManifest {
    pub fn insert(&mut self, name: &str, contents: &[u8]) {
        self.assets.insert(name.to_string(), AssetEntry::of(contents));
    }

    pub fn to_json(&self) -> Result<String, RenderError> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| RenderError::Serialize(format!("failed to serialize manifest: {e}")))?;
        json.push('\n');
        Ok(json)
    }

    pub fn load(assets_dir: &Path) -> Result<Self, RenderError> {
        let path = assets_dir.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path).map_err(|source| RenderError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| {
            RenderError::Serialize(format!("invalid manifest {}: {e}", path.display()))
        })
    }
}
