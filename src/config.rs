use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{AppError, OutputKind, QualityTier};

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";

/// Last-used settings, persisted next to the working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub save_dir: PathBuf,
    pub format: OutputKind,
    pub quality: QualityTier,
    pub subtitles: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            format: OutputKind::Video,
            quality: QualityTier::Medium,
            subtitles: false,
        }
    }
}

pub fn default_save_dir() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join(DEFAULT_DOWNLOAD_DIR))
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DOWNLOAD_DIR))
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Missing keys take their defaults; an unreadable or malformed file
    /// yields the full defaults.
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Reading {} failed, using defaults: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Malformed {}, using defaults: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), AppError> {
        self.save_to(Path::new(CONFIG_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        fs::write(path, json)
            .map_err(|e| AppError::Io(format!("Writing {}: {}", path.display(), e)))
    }

    /// Create the save directory if needed. Returns true when it was created.
    pub fn ensure_save_dir(&self) -> Result<bool, AppError> {
        if self.save_dir.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&self.save_dir).map_err(|e| {
            AppError::Io(format!("Creating {}: {}", self.save_dir.display(), e))
        })?;
        info!("Created download folder {}", self.save_dir.display());
        Ok(true)
    }
}
