//! Draw definitions and the look resolver seam

use super::effects::EffectData;
use super::figure::{FigureData, FigureMap};
use super::look::LookOptions;
use super::offsets::{AssetLibraryCollection, OffsetsData};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One image file of an asset library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub library: String,
    pub file_id: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub mirror: bool,
}

impl AssetRef {
    pub fn new(library: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            file_id: file_id.into(),
            x: 0,
            y: 0,
            mirror: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawLayer {
    pub kind: String,
    pub z_index: i32,
    pub color: Option<String>,
    pub assets: Vec<AssetRef>,
}

/// Ordered image layers for one avatar pose, back to front
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawDefinition {
    pub layers: Vec<DrawLayer>,
}

impl DrawDefinition {
    pub fn new(layers: Vec<DrawLayer>) -> Self {
        Self { layers }
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetRef> {
        self.layers.iter().flat_map(|layer| layer.assets.iter())
    }
}

/// Outcome of resolving a look
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookResolution {
    Resolved(DrawDefinition),
    /// The look names parts or combinations the figure tables cannot draw.
    Unresolvable,
}

pub trait LookResolver: Send + Sync {
    fn resolve(&self, options: &LookOptions, effect: Option<&EffectData>) -> LookResolution;
}

impl<F> LookResolver for F
where
    F: Fn(&LookOptions, Option<&EffectData>) -> LookResolution + Send + Sync,
{
    fn resolve(&self, options: &LookOptions, effect: Option<&EffectData>) -> LookResolution {
        self(options, effect)
    }
}

/// Table only the look resolver understands
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTable(pub serde_json::Value);

/// Figure, offset and animation tables a loader is built on
#[derive(Debug, Clone, Default)]
pub struct AvatarDependencies {
    pub figure_data: FigureData,
    pub figure_map: FigureMap,
    pub offsets: OffsetsData,
    pub part_sets: RawTable,
    pub actions: RawTable,
    pub geometry: RawTable,
    pub animation: RawTable,
}

/// Builds a resolver bound to loaded tables and the loader's offsets collection
pub trait LookResolverFactory: Send + Sync {
    fn create_resolver(
        &self,
        dependencies: &AvatarDependencies,
        offsets: Arc<AssetLibraryCollection>,
    ) -> anyhow::Result<Arc<dyn LookResolver>>;
}

impl<F> LookResolverFactory for F
where
    F: Fn(&AvatarDependencies, Arc<AssetLibraryCollection>) -> anyhow::Result<Arc<dyn LookResolver>>
        + Send
        + Sync,
{
    fn create_resolver(
        &self,
        dependencies: &AvatarDependencies,
        offsets: Arc<AssetLibraryCollection>,
    ) -> anyhow::Result<Arc<dyn LookResolver>> {
        self(dependencies, offsets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assets_iterate_in_layer_order() {
        let definition = DrawDefinition::new(vec![
            DrawLayer {
                kind: "bd".into(),
                z_index: 0,
                color: None,
                assets: vec![AssetRef::new("hh_human_body", "h_std_bd_1_2_0")],
            },
            DrawLayer { kind: "ey".into(), z_index: 1, color: None, assets: vec![] },
            DrawLayer {
                kind: "hd".into(),
                z_index: 2,
                color: Some("ffcb98".into()),
                assets: vec![
                    AssetRef::new("hh_human_body", "h_std_hd_1_2_0"),
                    AssetRef::new("hh_human_face", "h_std_fc_1_2_0"),
                ],
            },
        ]);

        let ids: Vec<&str> = definition.assets().map(|asset| asset.file_id.as_str()).collect();
        assert_eq!(ids, vec!["h_std_bd_1_2_0", "h_std_hd_1_2_0", "h_std_fc_1_2_0"]);
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |options: &LookOptions, _: Option<&EffectData>| {
            if options.look.is_empty() {
                LookResolution::Unresolvable
            } else {
                LookResolution::Resolved(DrawDefinition::default())
            }
        };

        assert_eq!(resolver.resolve(&LookOptions::new("", 0), None), LookResolution::Unresolvable);
        assert!(matches!(
            resolver.resolve(&LookOptions::new("hd-180-1", 0), None),
            LookResolution::Resolved(_)
        ));
    }
}
