//! Avatar loader
//!
//! Entry point of the avatar pipeline. A loader owns the caches for bundles,
//! textures, effect data and draw definitions and shares them between every
//! call, so looks that reuse body parts never fetch or decode them twice.

use super::cache::{AvatarCaches, DrawDefinitionCache};
use super::draw::{AssetRef, AvatarDependencies, DrawDefinition, LookResolver, LookResolverFactory};
use super::effects::{
    DirectoryEffectBundleProvider, EffectBundleProvider, EffectData, EffectInfo, EffectMap, EffectMapFile,
    EffectMapProvider,
};
use super::figure::libraries_for_look;
use super::look::{parse_look_string, LookOptions};
use super::offsets::AssetLibraryCollection;
use super::{AvatarError, AvatarResult};
use crate::assets::bundle::AssetBundle;
use crate::assets::cache::{spawn_shared, SharedLoad};
use crate::assets::manager::{AssetBundleProvider, DirectoryBundleProvider};
use crate::assets::texture::HitTexture;
use crate::config::LoaderSettings;
use crate::utils::tasks::TaskGroup;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Source of the figure, offset and animation tables
#[async_trait]
pub trait DependencyProvider: Send + Sync {
    async fn load_dependencies(&self) -> anyhow::Result<AvatarDependencies>;
}

/// Tables that are already in memory
#[async_trait]
impl DependencyProvider for AvatarDependencies {
    async fn load_dependencies(&self) -> anyhow::Result<AvatarDependencies> {
        Ok(self.clone())
    }
}

/// Collaborators a loader is built from
pub struct AvatarLoaderOptions {
    pub settings: LoaderSettings,
    pub dependencies: Arc<dyn DependencyProvider>,
    pub bundles: Arc<dyn AssetBundleProvider>,
    pub effect_map: Arc<dyn EffectMapProvider>,
    pub effect_bundles: Arc<dyn EffectBundleProvider>,
    pub resolver_factory: Arc<dyn LookResolverFactory>,
}

struct LoaderInner {
    settings: LoaderSettings,
    bundle_provider: Arc<dyn AssetBundleProvider>,
    effect_bundles: Arc<dyn EffectBundleProvider>,
    caches: AvatarCaches,
    offsets: Arc<AssetLibraryCollection>,
    dependencies: SharedLoad<Arc<AvatarDependencies>>,
    effect_map: SharedLoad<Arc<EffectMap>>,
}

pub struct AvatarLoader {
    inner: Arc<LoaderInner>,
    resolver: SharedLoad<Arc<dyn LookResolver>>,
}

impl std::fmt::Debug for AvatarLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarLoader")
            .field("settings", &self.inner.settings)
            .field("caches", &self.inner.caches)
            .finish()
    }
}

impl AvatarLoader {
    /// Start loading the figure tables and the effect map.
    ///
    /// Returns immediately; both loads run in the background and every call to
    /// [`AvatarLoader::get_avatar_draw_definition`] waits for them. Must be
    /// called from within a tokio runtime.
    pub fn new(options: AvatarLoaderOptions) -> Self {
        let AvatarLoaderOptions {
            settings,
            dependencies: dependency_provider,
            bundles,
            effect_map: effect_map_provider,
            effect_bundles,
            resolver_factory,
        } = options;

        info!("Initializing AvatarLoader with resources at {:?}", settings.resource_path);

        let dependencies = spawn_shared(async move {
            dependency_provider
                .load_dependencies()
                .await
                .map(Arc::new)
                .map_err(|e| AvatarError::Dependencies { reason: format!("{:#}", e) })
        });

        let effect_map = spawn_shared(async move {
            let map = effect_map_provider
                .get_effect_map()
                .await
                .map_err(|e| AvatarError::EffectMap { reason: format!("{:#}", e) })?;
            info!("Effect map loaded with {} effects", map.len());
            Ok(Arc::new(map))
        });

        let inner = Arc::new(LoaderInner {
            settings,
            bundle_provider: bundles,
            effect_bundles,
            caches: AvatarCaches::new(),
            offsets: Arc::new(AssetLibraryCollection::new()),
            dependencies,
            effect_map,
        });

        let resolver = spawn_shared({
            let inner = Arc::clone(&inner);
            async move {
                let dependencies = inner.dependencies.clone().await?;
                inner.offsets.set_fallback(dependencies.offsets.clone());

                let resolver = resolver_factory
                    .create_resolver(&dependencies, Arc::clone(&inner.offsets))
                    .map_err(|e| AvatarError::Dependencies { reason: format!("{:#}", e) })?;

                // Warm the resolver up so the first real caller does not pay for it.
                let placeholder = LookOptions::new(inner.settings.placeholder_look.clone(), 0);
                inner.load(&resolver, &placeholder).await?;

                info!("Look resolver ready");
                Ok(resolver)
            }
        });

        Self { inner, resolver }
    }

    /// Loader reading figure libraries, effects and the effect map from
    /// `settings.resource_path`.
    pub fn from_resource_path(
        settings: LoaderSettings,
        dependencies: Arc<dyn DependencyProvider>,
        resolver_factory: Arc<dyn LookResolverFactory>,
    ) -> Self {
        let bundles = Arc::new(DirectoryBundleProvider::new(settings.figure_path()));
        let effect_map = Arc::new(EffectMapFile::new(settings.effect_map_path()));
        let effect_bundles = Arc::new(DirectoryEffectBundleProvider::new(settings.effects_path()));

        Self::new(AvatarLoaderOptions {
            settings,
            dependencies,
            bundles,
            effect_map,
            effect_bundles,
            resolver_factory,
        })
    }

    /// Resolve `options` and load every texture its draw definition references.
    pub async fn get_avatar_draw_definition(&self, options: &LookOptions) -> AvatarResult<AvatarLoaderResult> {
        options.validate()?;
        let resolver = self.resolver.clone().await?;
        self.inner.load(&resolver, options).await
    }

    pub fn caches(&self) -> &AvatarCaches {
        &self.inner.caches
    }

    pub fn offsets(&self) -> &Arc<AssetLibraryCollection> {
        &self.inner.offsets
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.inner.settings
    }
}

impl LoaderInner {
    async fn load(
        self: &Arc<Self>,
        resolver: &Arc<dyn LookResolver>,
        options: &LookOptions,
    ) -> AvatarResult<AvatarLoaderResult> {
        let effect_map = self.effect_map.clone().await?;

        // Effect data and asset libraries do not depend on each other.
        let (effect_data, libraries) = tokio::try_join!(
            self.load_effect(&effect_map, options.effect.as_deref()),
            self.open_libraries(&options.look),
        )?;
        debug!("Look {} uses libraries {:?}", options.look, libraries);

        let definition = self
            .caches
            .draw_definitions
            .get_or_resolve(options, || resolver.resolve(options, effect_data.as_deref()));

        let mut group = TaskGroup::new("texture");
        match &definition {
            Some(definition) => {
                let mut requested = HashSet::new();
                for asset in definition.assets() {
                    if requested.insert(asset.file_id.as_str()) {
                        let file_id = asset.file_id.clone();
                        let load = self.load_texture(asset);
                        group.spawn(async move { Ok((file_id, load.await?)) });
                    }
                }
            }
            None => debug!("No draw definition for {}, loading no textures", options.cache_key()),
        }

        let textures: HashMap<String, Arc<HitTexture>> = group.join_all().await?.into_iter().collect();
        debug!("Loaded {} textures for {}", textures.len(), options.look);

        Ok(AvatarLoaderResult {
            resolver: Arc::clone(resolver),
            effect_data,
            draw_definitions: Arc::clone(&self.caches.draw_definitions),
            textures,
        })
    }

    async fn load_effect(&self, effect_map: &EffectMap, effect: Option<&str>) -> AvatarResult<Option<Arc<EffectData>>> {
        let Some(effect) = effect else {
            return Ok(None);
        };
        let Some(info) = effect_map.get_effect_info(effect) else {
            debug!("Effect {} is not in the effect map, drawing without it", effect);
            return Ok(None);
        };

        let key = info.cache_key();
        let provider = Arc::clone(&self.effect_bundles);
        let info = info.clone();
        let load = self.caches.effects.get_or_load(key.clone(), move || async move {
            fetch_effect(provider.as_ref(), &info)
                .await
                .map(Arc::new)
                .map_err(|e| AvatarError::Effect { key, reason: format!("{:#}", e) })
        });

        load.await.map(Some)
    }

    /// Fetch every library the look needs. Completion means the bundles are
    /// cached and their offsets ingested.
    async fn open_libraries(&self, look: &str) -> AvatarResult<BTreeSet<String>> {
        let dependencies = self.dependencies.clone().await?;
        let libraries = libraries_for_look(
            &parse_look_string(look),
            &dependencies.figure_data,
            &dependencies.figure_map,
        );

        let mut group = TaskGroup::new("bundle");
        for library in &libraries {
            let load = self.bundle(library);
            group.spawn(async move { load.await.map(|_| ()) });
        }
        group.join_all().await?;

        Ok(libraries)
    }

    fn bundle(&self, library: &str) -> SharedLoad<Arc<dyn AssetBundle>> {
        let provider = Arc::clone(&self.bundle_provider);
        let offsets = Arc::clone(&self.offsets);
        let library_name = library.to_string();

        self.caches.bundles.get_or_load(library.to_string(), move || async move {
            let bundle = provider.get_bundle(&library_name).await.map_err(|e| AvatarError::Bundle {
                library: library_name.clone(),
                reason: format!("{:#}", e),
            })?;
            offsets.open(&library_name, bundle.as_ref()).await?;
            Ok(bundle)
        })
    }

    fn load_texture(self: &Arc<Self>, asset: &AssetRef) -> SharedLoad<Arc<HitTexture>> {
        let inner = Arc::clone(self);
        let library = asset.library.clone();
        let file_id = asset.file_id.clone();

        self.caches.textures.get_or_load(asset.file_id.clone(), move || async move {
            let bundle = inner.bundle(&library).await?;
            let name = inner.settings.texture_file_name(&file_id);
            let blob = bundle.get_blob(&name).await.map_err(|e| AvatarError::Bundle {
                library: library.clone(),
                reason: format!("{:#}", e),
            })?;

            let texture = tokio::task::spawn_blocking(move || HitTexture::from_bytes(&blob))
                .await?
                .map_err(|e| AvatarError::Decode { file_id: file_id.clone(), reason: e.to_string() })?;

            debug!("Decoded texture {} from {}", file_id, library);
            Ok(Arc::new(texture))
        })
    }
}

async fn fetch_effect(provider: &dyn EffectBundleProvider, info: &EffectInfo) -> anyhow::Result<EffectData> {
    let bundle = provider.get_effect_bundle(info).await?;
    bundle.get_data().await
}

/// Everything one [`AvatarLoader::get_avatar_draw_definition`] call loaded
#[derive(Clone)]
pub struct AvatarLoaderResult {
    resolver: Arc<dyn LookResolver>,
    effect_data: Option<Arc<EffectData>>,
    draw_definitions: Arc<DrawDefinitionCache>,
    textures: HashMap<String, Arc<HitTexture>>,
}

impl std::fmt::Debug for AvatarLoaderResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarLoaderResult")
            .field("effect_data", &self.effect_data.as_ref().map(|data| data.info.cache_key()))
            .field("textures", &self.textures.len())
            .finish()
    }
}

impl AvatarLoaderResult {
    /// Draw definition for any options, resolved with the effect data of this load.
    pub fn draw_definition(&self, options: &LookOptions) -> AvatarResult<Arc<DrawDefinition>> {
        self.draw_definitions
            .get_or_resolve(options, || self.resolver.resolve(options, self.effect_data.as_deref()))
            .ok_or_else(|| AvatarError::InvalidLook { key: options.cache_key() })
    }

    /// Texture loaded for `file_id`. Only ids from this load's draw definition exist.
    pub fn texture(&self, file_id: &str) -> AvatarResult<Arc<HitTexture>> {
        self.textures
            .get(file_id)
            .cloned()
            .ok_or_else(|| AvatarError::UnknownTexture { file_id: file_id.to_string() })
    }

    pub fn effect_data(&self) -> Option<&EffectData> {
        self.effect_data.as_deref()
    }

    pub fn texture_ids(&self) -> impl Iterator<Item = &str> {
        self.textures.keys().map(String::as_str)
    }
}
