use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use memecam_core::shared::constants::APP_DIR_NAME;

const SETTINGS_FILE: &str = "settings.json";

/// Persistent defaults for the CLI. Every field is optional; command-line
/// flags take precedence.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub front_device: Option<String>,
    pub back_device: Option<String>,
    /// ffmpeg input format, e.g. `v4l2`, `avfoundation`, `dshow`.
    pub input_format: Option<String>,
    pub front_image: Option<PathBuf>,
    pub back_image: Option<PathBuf>,
    pub overlay_dir: Option<PathBuf>,
    /// Ordered overlay names. Empty means every image in `overlay_dir`.
    pub overlays: Vec<String>,
    pub output_dir: Option<PathBuf>,
    pub max_zoom: Option<f64>,
    pub accuracy: Option<String>,
    pub confidence: Option<f64>,
    pub model: Option<PathBuf>,
}

impl Settings {
    /// `<config dir>/MemeCam/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(SETTINGS_FILE))
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("cannot read settings {}: {e}", path.display()))?;
        let settings = serde_json::from_str(&text)
            .map_err(|e| format!("invalid settings {}: {e}", path.display()))?;
        Ok(settings)
    }

    /// Loads `explicit` (which must exist), else the default location if
    /// present, else built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                log::debug!("Loading settings from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"overlays": ["doge", "pepe"], "max_zoom": 3.0}}"#).unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.overlays, vec!["doge", "pepe"]);
        assert_eq!(settings.max_zoom, Some(3.0));
        assert!(settings.front_device.is_none());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = Settings::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid settings"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::resolve(Some(&dir.path().join("nope.json"))).is_err());
    }

    #[test]
    fn test_round_trips_through_json() {
        let settings = Settings {
            back_device: Some("/dev/video0".into()),
            input_format: Some("v4l2".into()),
            ..Settings::default()
        };
        let text = serde_json::to_string(&settings).unwrap();
        assert_eq!(serde_json::from_str::<Settings>(&text).unwrap(), settings);
    }
}
