//! Avatar effects: the effect map and per-effect animation data

use crate::assets::bundle::{AssetBundle, DirectoryBundle};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where an effect's assets live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectInfo {
    pub id: String,
    pub lib: String,
    pub kind: String,
    pub revision: Option<u32>,
}

impl EffectInfo {
    /// Effect-data cache key
    pub fn cache_key(&self) -> String {
        format!("{}_{}", self.kind, self.id)
    }

    /// File holding the effect's animation document
    pub fn data_file_name(&self) -> String {
        format!("{}{}.bin", self.kind, self.id)
    }
}

/// Effect id to effect library mapping (`effectmap.xml`)
#[derive(Debug, Clone, Default)]
pub struct EffectMap {
    effects: HashMap<String, EffectInfo>,
}

impl EffectMap {
    pub fn new(effects: impl IntoIterator<Item = EffectInfo>) -> Self {
        Self {
            effects: effects.into_iter().map(|info| (info.id.clone(), info)).collect(),
        }
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = roxmltree::Document::parse(xml).context("malformed effect map")?;
        let mut effects = HashMap::new();

        for node in document.descendants().filter(|node| node.has_tag_name("effect")) {
            let (Some(id), Some(lib), Some(kind)) =
                (node.attribute("id"), node.attribute("lib"), node.attribute("type"))
            else {
                debug!("Skipping incomplete effect map entry at {:?}", node.range());
                continue;
            };

            let info = EffectInfo {
                id: id.to_string(),
                lib: lib.to_string(),
                kind: kind.to_string(),
                revision: node.attribute("revision").and_then(|value| value.parse().ok()),
            };
            effects.insert(info.id.clone(), info);
        }

        Ok(Self { effects })
    }

    pub fn get_effect_info(&self, id: &str) -> Option<&EffectInfo> {
        self.effects.get(id)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Parsed data for one effect, interpreted by the look resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectData {
    pub info: EffectInfo,
    pub document: String,
}

#[async_trait]
pub trait EffectMapProvider: Send + Sync {
    async fn get_effect_map(&self) -> Result<EffectMap>;
}

#[async_trait]
pub trait EffectBundle: Send + Sync {
    async fn get_data(&self) -> Result<EffectData>;
}

#[async_trait]
pub trait EffectBundleProvider: Send + Sync {
    async fn get_effect_bundle(&self, info: &EffectInfo) -> Result<Arc<dyn EffectBundle>>;
}

/// Reads the effect map from an XML file
#[derive(Debug, Clone)]
pub struct EffectMapFile {
    path: PathBuf,
}

impl EffectMapFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EffectMapProvider for EffectMapFile {
    async fn get_effect_map(&self) -> Result<EffectMap> {
        let xml = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        EffectMap::from_xml(&xml)
    }
}

/// Effect library stored as a directory of loose files
#[derive(Debug, Clone)]
pub struct DirectoryEffectBundle {
    bundle: DirectoryBundle,
    info: EffectInfo,
}

#[async_trait]
impl EffectBundle for DirectoryEffectBundle {
    async fn get_data(&self) -> Result<EffectData> {
        let document = self.bundle.get_string(&self.info.data_file_name()).await?;
        Ok(EffectData { info: self.info.clone(), document })
    }
}

/// Serves `<root>/<lib>/` directories as effect bundles
#[derive(Debug, Clone)]
pub struct DirectoryEffectBundleProvider {
    root: PathBuf,
}

impl DirectoryEffectBundleProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl EffectBundleProvider for DirectoryEffectBundleProvider {
    async fn get_effect_bundle(&self, info: &EffectInfo) -> Result<Arc<dyn EffectBundle>> {
        if info.lib.is_empty() || info.lib.contains(['/', '\\']) || info.lib == ".." {
            bail!("invalid effect library name {:?}", info.lib);
        }

        Ok(Arc::new(DirectoryEffectBundle {
            bundle: DirectoryBundle::new(self.root.join(&info.lib)),
            info: info.clone(),
        }))
    }
}
