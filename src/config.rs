// src/config.rs - TOML configuration with per-field defaults
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::background::BackgroundKey;
use crate::compositor::OverlayStyle;
use crate::smoothing::DEFAULT_WINDOW;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TryOnConfig {
    pub camera: CameraConfig,
    pub smoothing: SmoothingConfig,
    pub overlay: OverlayStyle,
    pub background: BackgroundKey,
    pub tracking: TrackingConfig,
    pub product: ProductConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Mirror frames horizontally (selfie view).
    pub mirror: bool,
    /// Replay a directory of still frames instead of opening a camera.
    pub frames_dir: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: 30,
            mirror: true,
            frames_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub window: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum TrackingConfig {
    Simulated,
    Recorded { path: PathBuf },
}

impl Default for TrackingConfig {
    fn default() -> Self {
        TrackingConfig::Simulated
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductConfig {
    /// Image shown on startup: a path, `file://` URL or `data:` URI.
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: directories::UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|p| p.join("RingTryOn")))
                .unwrap_or_else(|| PathBuf::from("./output")),
        }
    }
}

impl TryOnConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Platform config location, e.g. `~/.config/ringtryon/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "ringtryon", "ringtryon")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Explicit path if given, then the platform location, then defaults.
    /// An explicit path that cannot be loaded is an error; a broken default file is not.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading config from {}", path.display());
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => match Self::load(&path) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    Ok(config)
                }
                Err(e) => {
                    warn!("Ignoring config {}: {:#}", path.display(), e);
                    Ok(Self::default())
                }
            },
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TryOnConfig::from_toml("").unwrap();
        assert_eq!(config.smoothing.window, 5);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.overlay, OverlayStyle::default());
        assert_eq!(config.background, BackgroundKey::default());
        assert_eq!(config.tracking, TrackingConfig::Simulated);
        assert!(config.product.image.is_none());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = TryOnConfig::from_toml(
            r#"
            [smoothing]
            window = 8

            [overlay]
            opacity = 0.9

            [overlay.shadow]
            blur = 4.0

            [background]
            fade_threshold = 230.0

            [tracking]
            source = "recorded"
            path = "session/landmarks.jsonl"
            "#,
        )
        .unwrap();

        assert_eq!(config.smoothing.window, 8);
        assert_eq!(config.overlay.opacity, 0.9);
        assert_eq!(config.overlay.anchor_fraction, 0.1);
        assert_eq!(config.overlay.shadow.blur, 4.0);
        assert_eq!(config.overlay.shadow.offset_y, 4.0);
        assert_eq!(config.background.fade_threshold, 230.0);
        assert_eq!(config.background.brightness_threshold, 200.0);
        assert_eq!(
            config.tracking,
            TrackingConfig::Recorded {
                path: PathBuf::from("session/landmarks.jsonl")
            }
        );
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(TryOnConfig::from_toml("[smoothing\nwindow = 5").is_err());
        assert!(TryOnConfig::from_toml("[smoothing]\nwindow = \"five\"").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("missing_{}.toml", uuid::Uuid::new_v4()));
        assert!(TryOnConfig::load_or_default(Some(&path)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("tryon_{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[camera]\nindex = 2\nmirror = false\n").unwrap();
        let config = TryOnConfig::load(&path).unwrap();
        assert_eq!(config.camera.index, 2);
        assert!(!config.camera.mirror);
        let _ = fs::remove_file(path);
    }
}
