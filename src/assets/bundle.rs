//! Asset bundles: named blobs belonging to one asset library

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Opaque container of one library's files
#[async_trait]
pub trait AssetBundle: Send + Sync {
    async fn get_blob(&self, name: &str) -> Result<Bytes>;

    async fn get_string(&self, name: &str) -> Result<String>;
}

/// Bundle held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryBundle {
    files: HashMap<String, Bytes>,
}

impl MemoryBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.files.insert(name.into(), data.into());
        self
    }

    pub fn with_string(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.with_file(name, Bytes::from(text.into()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl AssetBundle for MemoryBundle {
    async fn get_blob(&self, name: &str) -> Result<Bytes> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("file {} not found in bundle", name))
    }

    async fn get_string(&self, name: &str) -> Result<String> {
        let blob = self.get_blob(name).await?;
        String::from_utf8(blob.to_vec()).with_context(|| format!("file {} is not valid UTF-8", name))
    }
}

/// Bundle backed by a directory of loose files
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Bundle contents are untrusted, so names must stay inside the root.
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            bail!("invalid bundle file name {:?}", name);
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl AssetBundle for DirectoryBundle {
    async fn get_blob(&self, name: &str) -> Result<Bytes> {
        let path = self.resolve(name)?;
        debug!("Reading bundle file {:?}", path);
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Bytes::from(data))
    }

    async fn get_string(&self, name: &str) -> Result<String> {
        let path = self.resolve(name)?;
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))
    }
}
