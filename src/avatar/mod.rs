//! Avatar look resolution and loading
//!
//! Turns a look string plus direction/action options into a draw definition,
//! loads the asset libraries and textures that definition needs, and hands
//! back a result whose accessors are synchronous.

pub mod cache;
pub mod draw;
pub mod effects;
pub mod figure;
pub mod loader;
pub mod look;
pub mod offsets;

pub use cache::{AvatarCaches, DrawDefinitionCache};
pub use draw::{
    AssetRef, AvatarDependencies, DrawDefinition, DrawLayer, LookResolution, LookResolver,
    LookResolverFactory, RawTable,
};
pub use effects::{
    DirectoryEffectBundle, DirectoryEffectBundleProvider, EffectBundle, EffectBundleProvider,
    EffectData, EffectInfo, EffectMap, EffectMapFile, EffectMapProvider,
};
pub use figure::{libraries_for_look, FigureData, FigureMap, FigureMapLibrary, FigurePart, FigureSet};
pub use loader::{AvatarLoader, AvatarLoaderOptions, AvatarLoaderResult, DependencyProvider};
pub use look::{parse_look_string, AvatarAction, LookOptions, LookPart};
pub use offsets::{AssetLibraryCollection, Offset, OffsetsData};

// Error types
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AvatarError {
    #[error("Invalid look: {key}")]
    InvalidLook { key: String },

    #[error("Texture not found: {file_id}")]
    UnknownTexture { file_id: String },

    #[error("Direction out of range (0-7): {direction}")]
    InvalidDirection { direction: u8 },

    #[error("Failed to load avatar dependencies: {reason}")]
    Dependencies { reason: String },

    #[error("Failed to load effect map: {reason}")]
    EffectMap { reason: String },

    #[error("Failed to load effect {key}: {reason}")]
    Effect { key: String, reason: String },

    #[error("Failed to load asset library {library}: {reason}")]
    Bundle { library: String, reason: String },

    #[error("Invalid manifest in library {library}: {reason}")]
    Manifest { library: String, reason: String },

    #[error("Failed to decode texture {file_id}: {reason}")]
    Decode { file_id: String, reason: String },

    #[error("Background task failed: {reason}")]
    Task { reason: String },

    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

pub type AvatarResult<T> = Result<T, AvatarError>;

impl From<tokio::task::JoinError> for AvatarError {
    fn from(err: tokio::task::JoinError) -> Self {
        AvatarError::Task { reason: err.to_string() }
    }
}
