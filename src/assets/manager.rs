use super::bundle::{AssetBundle, DirectoryBundle};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Source of asset bundles, one per library
#[async_trait]
pub trait AssetBundleProvider: Send + Sync {
    async fn get_bundle(&self, library: &str) -> Result<Arc<dyn AssetBundle>>;
}

/// Serves `<root>/<library>/` directories as bundles
#[derive(Debug, Clone)]
pub struct DirectoryBundleProvider {
    root: PathBuf,
}

impl DirectoryBundleProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetBundleProvider for DirectoryBundleProvider {
    async fn get_bundle(&self, library: &str) -> Result<Arc<dyn AssetBundle>> {
        if library.is_empty() || library.contains(['/', '\\']) || library == ".." {
            bail!("invalid library name {:?}", library);
        }

        let path = self.root.join(library);
        if !tokio::fs::metadata(&path).await.map(|meta| meta.is_dir()).unwrap_or(false) {
            bail!("library directory {} does not exist", path.display());
        }

        info!("Opened asset library {} at {:?}", library, path);
        Ok(Arc::new(DirectoryBundle::new(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_directory_provider_opens_library() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("hh_human_body")).unwrap();
        std::fs::write(dir.path().join("hh_human_body").join("manifest.bin"), "<manifest/>").unwrap();

        let provider = DirectoryBundleProvider::new(dir.path());
        let bundle = provider.get_bundle("hh_human_body").await.unwrap();

        assert_eq!(bundle.get_string("manifest.bin").await.unwrap(), "<manifest/>");
        assert!(provider.get_bundle("hh_missing").await.is_err());
        assert!(provider.get_bundle("../etc").await.is_err());
    }
}
