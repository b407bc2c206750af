// avatar-sprites: layered avatar sprites for virtual-room clients
// Look resolution, deduplicated asset loading and pixel-accurate hit testing

pub mod assets;
pub mod avatar;
pub mod config;
pub mod utils;

// Re-export commonly used types for convenience
pub use assets::{HitOptions, HitTexture, Point};
pub use avatar::{
    AvatarError, AvatarLoader, AvatarLoaderOptions, AvatarLoaderResult, AvatarResult, DrawDefinition,
    LookOptions, LookResolution,
};
pub use config::LoaderSettings;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
