use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::auth::User;
use crate::error::ConfigError;

pub const DEFAULT_PIXABAY_URL: &str = "https://pixabay.com/api/";

/// Settings read once at startup: defaults, then the settings file, then
/// environment variables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    pub model: String,
    pub tts_model: String,
    pub gemini_base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixabay_api_key: Option<String>,
    pub pixabay_base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    /// Identity persisted by `login`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model: slidesmith_gemini::client::DEFAULT_MODEL.to_string(),
            tts_model: slidesmith_gemini::client::DEFAULT_TTS_MODEL.to_string(),
            gemini_base_url: slidesmith_gemini::client::DEFAULT_BASE_URL.to_string(),
            pixabay_api_key: None,
            pixabay_base_url: DEFAULT_PIXABAY_URL.to_string(),
            store_dir: None,
            log_path: None,
            user: None,
        }
    }
}

impl Config {
    /// Overlay values from an environment lookup. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GEMINI_API_KEY") {
            self.gemini_api_key = Some(key);
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.model = model;
        }
        if let Some(model) = get("GEMINI_TTS_MODEL") {
            self.tts_model = model;
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            self.gemini_base_url = url;
        }
        if let Some(key) = get("PIXABAY_API_KEY") {
            self.pixabay_api_key = Some(key);
        }
        if let Some(url) = get("PIXABAY_BASE_URL") {
            self.pixabay_base_url = url;
        }
        if let Some(dir) = get("SLIDESMITH_STORE_DIR") {
            self.store_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = get("SLIDESMITH_LOG_PATH") {
            self.log_path = Some(PathBuf::from(path));
        }
    }

    /// Settings file in the user config directory.
    pub fn settings_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join("slidesmith").join("settings.json"))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// The settings file alone, or defaults when it does not exist yet.
    pub fn load_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Settings file (if readable) overlaid with the environment.
    pub fn load() -> Self {
        let mut config = match Self::settings_path() {
            Ok(path) if path.exists() => match Self::load_from_file(&path) {
                Ok(config) => {
                    tracing::info!("Loaded settings from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load settings from {}: {}", path.display(), e);
                    Self::default()
                }
            },
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Where the interactive viewer writes its log.
    pub fn log_file(&self) -> PathBuf {
        self.log_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("slidesmith").join("slidesmith.log"))
                .unwrap_or_else(|| PathBuf::from("slidesmith.log"))
        })
    }

    /// Directory holding saved projects.
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("slidesmith").join("projects"))
                .unwrap_or_else(|| PathBuf::from(".slidesmith").join("projects"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_defaults_and_skips_empty_values() {
        let env: HashMap<&str, &str> = [
            ("GEMINI_API_KEY", "g-key"),
            ("GEMINI_MODEL", "gemini-test"),
            ("PIXABAY_API_KEY", ""),
            ("SLIDESMITH_STORE_DIR", "/tmp/decks"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.gemini_api_key.as_deref(), Some("g-key"));
        assert_eq!(config.model, "gemini-test");
        assert_eq!(config.tts_model, slidesmith_gemini::client::DEFAULT_TTS_MODEL);
        assert_eq!(config.pixabay_api_key, None);
        assert_eq!(config.store_dir(), PathBuf::from("/tmp/decks"));
    }

    #[test]
    fn settings_round_trip_through_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("settings.json");

        let mut config = Config::load_file_or_default(&path).unwrap();
        assert_eq!(config.gemini_api_key, None);

        config.gemini_api_key = Some("saved".into());
        config.user = Some(User::new("Grace", None));
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.gemini_api_key.as_deref(), Some("saved"));
        assert_eq!(loaded.user.map(|u| u.display_name).as_deref(), Some("Grace"));
        assert_eq!(loaded.model, slidesmith_gemini::client::DEFAULT_MODEL);
    }

    #[test]
    fn partial_settings_file_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, r#"{"model": "custom"}"#).unwrap();
        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.model, "custom");
        assert_eq!(config.pixabay_base_url, DEFAULT_PIXABAY_URL);
    }
}
