//! Asset offsets collected from library manifests

use super::{AvatarError, AvatarResult};
use crate::assets::bundle::AssetBundle;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{OnceLock, RwLock};
use tracing::{debug, info};

/// Name of the manifest file inside every figure library
pub const MANIFEST_NAME: &str = "manifest.bin";

/// Registration point of an asset relative to the avatar origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    #[serde(rename = "offsetX")]
    pub x: i32,
    #[serde(rename = "offsetY")]
    pub y: i32,
}

/// Offsets shipped alongside the figure tables (`offsets.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OffsetsData {
    offsets: HashMap<String, Offset>,
}

impl OffsetsData {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn insert(&mut self, file_id: impl Into<String>, offset: Offset) {
        self.offsets.insert(file_id.into(), offset);
    }

    pub fn get(&self, file_id: &str) -> Option<Offset> {
        self.offsets.get(file_id).copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Offsets gathered lazily from every library the loader has opened
#[derive(Debug, Default)]
pub struct AssetLibraryCollection {
    opened: RwLock<HashSet<String>>,
    offsets: RwLock<HashMap<String, Offset>>,
    fallback: OnceLock<OffsetsData>,
}

impl AssetLibraryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offsets consulted for file ids no opened manifest knows about. Only the
    /// first call has an effect.
    pub fn set_fallback(&self, offsets: OffsetsData) {
        if self.fallback.set(offsets).is_err() {
            debug!("Offsets fallback already set, ignoring");
        }
    }

    /// Read the library's manifest and register its asset offsets. Opening a
    /// library twice is a no-op.
    pub async fn open(&self, library: &str, bundle: &dyn AssetBundle) -> AvatarResult<()> {
        if self.is_open(library) {
            return Ok(());
        }

        let manifest = bundle.get_string(MANIFEST_NAME).await.map_err(|e| AvatarError::Manifest {
            library: library.to_string(),
            reason: format!("{:#}", e),
        })?;
        let parsed = parse_manifest(&manifest).map_err(|reason| AvatarError::Manifest {
            library: library.to_string(),
            reason,
        })?;

        let count = parsed.len();
        self.offsets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(parsed);
        self.opened
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(library.to_string());

        info!("Opened library {} with {} asset offsets", library, count);
        Ok(())
    }

    pub fn is_open(&self, library: &str) -> bool {
        self.opened
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(library)
    }

    pub fn get_offsets(&self, file_id: &str) -> Option<Offset> {
        let opened = self
            .offsets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(file_id)
            .copied();

        opened.or_else(|| self.fallback.get().and_then(|fallback| fallback.get(file_id)))
    }
}

/// Parse `<asset name=".."><param key="offset" value="x,y"/></asset>` entries.
pub fn parse_manifest(xml: &str) -> Result<HashMap<String, Offset>, String> {
    let document = roxmltree::Document::parse(xml).map_err(|e| e.to_string())?;
    let mut offsets = HashMap::new();

    for asset in document.descendants().filter(|node| node.has_tag_name("asset")) {
        let Some(name) = asset.attribute("name") else {
            continue;
        };

        let offset = asset
            .children()
            .filter(|node| node.has_tag_name("param"))
            .find(|param| param.attribute("key") == Some("offset"))
            .and_then(|param| param.attribute("value"));

        if let Some(value) = offset {
            offsets.insert(name.to_string(), parse_offset(value)?);
        }
    }

    Ok(offsets)
}

fn parse_offset(value: &str) -> Result<Offset, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("malformed offset {:?}", value))?;
    let x = x.trim().parse().map_err(|_| format!("malformed offset {:?}", value))?;
    let y = y.trim().parse().map_err(|_| format!("malformed offset {:?}", value))?;
    Ok(Offset { x, y })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::bundle::MemoryBundle;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest>
  <library name="hh_human_body" version="0.1">
    <assets>
      <asset name="h_std_bd_1_0_0" mimeType="image/png">
        <param key="offset" value="-22,41"/>
      </asset>
      <asset name="h_std_hd_1_2_0" mimeType="image/png">
        <param key="offset" value="3, -5"/>
      </asset>
      <asset name="h_std_ey_1_2_0" mimeType="image/png"/>
    </assets>
  </library>
</manifest>"#;

    #[test]
    fn test_parse_manifest() {
        let offsets = parse_manifest(MANIFEST).unwrap();

        assert_eq!(offsets.len(), 2);
        assert_eq!(offsets["h_std_bd_1_0_0"], Offset { x: -22, y: 41 });
        assert_eq!(offsets["h_std_hd_1_2_0"], Offset { x: 3, y: -5 });
    }

    #[test]
    fn test_parse_manifest_errors() {
        assert!(parse_manifest("<manifest>").is_err());
        let malformed = r#"<manifest><asset name="a"><param key="offset" value="1"/></asset></manifest>"#;
        assert!(parse_manifest(malformed).is_err());
    }

    #[tokio::test]
    async fn test_open_library_and_fallback() {
        let collection = AssetLibraryCollection::new();
        let mut fallback = OffsetsData::default();
        fallback.insert("h_std_bd_1_0_0", Offset { x: 0, y: 0 });
        fallback.insert("h_std_lg_1_0_0", Offset { x: 7, y: 8 });
        collection.set_fallback(fallback);

        let bundle = MemoryBundle::new().with_string(MANIFEST_NAME, MANIFEST);
        collection.open("hh_human_body", &bundle).await.unwrap();

        assert!(collection.is_open("hh_human_body"));
        assert_eq!(collection.get_offsets("h_std_bd_1_0_0"), Some(Offset { x: -22, y: 41 }));
        assert_eq!(collection.get_offsets("h_std_lg_1_0_0"), Some(Offset { x: 7, y: 8 }));
        assert_eq!(collection.get_offsets("h_std_ey_1_2_0"), None);

        // Already open, so the empty bundle is never read.
        collection.open("hh_human_body", &MemoryBundle::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_without_manifest_fails() {
        let collection = AssetLibraryCollection::new();
        let result = collection.open("hh_broken", &MemoryBundle::new()).await;

        assert!(matches!(result, Err(AvatarError::Manifest { library, .. }) if library == "hh_broken"));
        assert!(!collection.is_open("hh_broken"));
    }

    #[test]
    fn test_offsets_data_from_json() {
        let data = OffsetsData::from_json(r#"{"h_std_sh_1_0_0": {"offsetX": 4, "offsetY": -9}}"#).unwrap();
        assert_eq!(data.get("h_std_sh_1_0_0"), Some(Offset { x: 4, y: -9 }));
        assert_eq!(data.len(), 1);
    }
}
