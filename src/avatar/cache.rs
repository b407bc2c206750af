//! Caches shared by every call on one loader

use super::draw::{DrawDefinition, LookResolution};
use super::effects::EffectData;
use super::look::LookOptions;
use crate::assets::bundle::AssetBundle;
use crate::assets::cache::{lock, CacheStats, InFlightCache};
use crate::assets::texture::HitTexture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Resolved draw definitions keyed by [`LookOptions::cache_key`]
#[derive(Debug, Default)]
pub struct DrawDefinitionCache {
    entries: Mutex<HashMap<String, Arc<DrawDefinition>>>,
    stats: Mutex<CacheStats>,
}

impl DrawDefinitionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached definition for `options`, or the result of `resolve`.
    ///
    /// `resolve` runs with the cache locked, so concurrent callers with the same
    /// key wait for the first resolution instead of resolving again.
    /// Unresolvable looks are not cached.
    pub fn get_or_resolve<F>(&self, options: &LookOptions, resolve: F) -> Option<Arc<DrawDefinition>>
    where
        F: FnOnce() -> LookResolution,
    {
        let key = options.cache_key();
        let mut entries = lock(&self.entries);

        if let Some(existing) = entries.get(&key) {
            lock(&self.stats).hits += 1;
            debug!("📋 Draw definition cache HIT for {}", key);
            return Some(Arc::clone(existing));
        }
        lock(&self.stats).misses += 1;
        debug!("📋 Draw definition cache MISS for {}", key);

        match resolve() {
            LookResolution::Resolved(definition) => {
                let definition = Arc::new(definition);
                if options.skip_caching {
                    debug!("Resolved {} without caching", key);
                } else {
                    entries.insert(key, Arc::clone(&definition));
                }
                Some(definition)
            }
            LookResolution::Unresolvable => {
                lock(&self.stats).failures += 1;
                debug!("Look {} is unresolvable", key);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = lock(&self.stats).clone();
        stats.entries = self.len();
        stats
    }
}

/// The four caches behind a loader
#[derive(Debug)]
pub struct AvatarCaches {
    /// Library id to opened bundle
    pub bundles: InFlightCache<String, Arc<dyn AssetBundle>>,
    /// File id to decoded texture, shared by every look
    pub textures: InFlightCache<String, Arc<HitTexture>>,
    /// `{type}_{id}` to effect data
    pub effects: InFlightCache<String, Arc<EffectData>>,
    pub draw_definitions: Arc<DrawDefinitionCache>,
}

impl AvatarCaches {
    pub fn new() -> Self {
        Self {
            bundles: InFlightCache::new("bundle"),
            textures: InFlightCache::new("texture"),
            effects: InFlightCache::new("effect"),
            draw_definitions: Arc::new(DrawDefinitionCache::new()),
        }
    }
}

impl Default for AvatarCaches {
    fn default() -> Self {
        Self::new()
    }
}
