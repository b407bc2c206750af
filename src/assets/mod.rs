pub mod bundle;
pub mod cache;
pub mod manager;
pub mod texture;

pub use bundle::{AssetBundle, DirectoryBundle, MemoryBundle};
pub use cache::{CacheStats, InFlightCache, SharedLoad};
pub use manager::{AssetBundleProvider, DirectoryBundleProvider};
pub use texture::{Frame, HitOptions, HitTexture, Point, TextureError, ALPHA_THRESHOLD};
