use crate::avatar::{AvatarError, AvatarResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "loader.toml";

/// Placeholder look resolved while the loader warms up; its set ids do not exist.
pub const PLACEHOLDER_LOOK: &str = "hd-99999-99999";

// =============================================================================
// Loader Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Root of the avatar resources (figure libraries, effects, effect map)
    pub resource_path: PathBuf,
    pub figure_directory: String,
    pub effects_directory: String,
    pub effect_map_file: String,
    /// Extension appended to file ids when reading textures from a bundle
    pub texture_extension: String,
    pub placeholder_look: String,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            resource_path: PathBuf::from("resources"),
            figure_directory: "figure".to_string(),
            effects_directory: "effects".to_string(),
            effect_map_file: "effectmap.xml".to_string(),
            texture_extension: "png".to_string(),
            placeholder_look: PLACEHOLDER_LOOK.to_string(),
        }
    }
}

impl LoaderSettings {
    pub fn with_resource_path(mut self, resource_path: impl Into<PathBuf>) -> Self {
        self.resource_path = resource_path.into();
        self
    }

    pub fn figure_path(&self) -> PathBuf {
        self.resource_path.join(&self.figure_directory)
    }

    pub fn effects_path(&self) -> PathBuf {
        self.resource_path.join(&self.effects_directory)
    }

    pub fn effect_map_path(&self) -> PathBuf {
        self.resource_path.join(&self.effect_map_file)
    }

    /// Bundle file name holding the image for `file_id`
    pub fn texture_file_name(&self, file_id: &str) -> String {
        format!("{}.{}", file_id, self.texture_extension)
    }

    pub fn from_toml_str(data: &str) -> AvatarResult<Self> {
        toml::from_str(data).map_err(|e| AvatarError::Config { reason: e.to_string() })
    }

    pub fn to_toml_string(&self) -> AvatarResult<String> {
        toml::to_string_pretty(self).map_err(|e| AvatarError::Config { reason: e.to_string() })
    }

    pub fn load_from(path: impl AsRef<Path>) -> AvatarResult<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| AvatarError::Config {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&data)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> AvatarResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| AvatarError::Config { reason: e.to_string() })?;
        }
        fs::write(path, self.to_toml_string()?).map_err(|e| AvatarError::Config {
            reason: format!("failed to write {}: {}", path.display(), e),
        })
    }
}

fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "avatar-sprites", "avatar-sprites")
        .map(|proj| proj.config_dir().join(CONFIG_FILE))
}

pub fn save_settings(settings: &LoaderSettings) -> AvatarResult<()> {
    match config_path() {
        Some(path) => settings.save_to(path),
        None => Err(AvatarError::Config { reason: "no configuration directory available".to_string() }),
    }
}

/// Settings from the platform config directory, if present and valid
pub fn load_settings() -> Option<LoaderSettings> {
    let path = config_path()?;
    LoaderSettings::load_from(path).ok()
}
