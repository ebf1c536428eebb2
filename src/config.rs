use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use vigil_vision::model::ModelSet;

pub static CONFIG_PATH: Lazy<&'static Path> =
    Lazy::new(|| Path::new(option_env!("VIGIL_CONFIG_PATH").unwrap_or("vigil.toml")));

pub const TOKEN_ENV: &str = "VIGIL_TELEGRAM_TOKEN";
pub const CHAT_ID_ENV: &str = "VIGIL_TELEGRAM_CHAT_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: String,
    /// Reference images, one per known person, named after them
    pub known_dir: PathBuf,
    pub log_path: PathBuf,
    pub unknown_dir: PathBuf,
    /// Minimum cosine similarity for a gallery match
    pub match_threshold: f32,
    pub detection_threshold: f32,
    pub font_path: PathBuf,
    pub window_title: String,
    pub models: Models,
    pub telegram: Telegram,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Models {
    pub detector: PathBuf,
    pub recognizer: PathBuf,
    pub emotion: PathBuf,
    pub age_gender: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Telegram {
    pub token: String,
    pub chat_id: String,
    pub caption: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: "/dev/video0".to_string(),
            known_dir: PathBuf::from("known"),
            log_path: PathBuf::from("log.csv"),
            unknown_dir: PathBuf::from("unknown_faces"),
            match_threshold: 0.363,
            detection_threshold: 0.6,
            font_path: PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
            window_title: "Vigil \u{2014} real-time emotion".to_string(),
            models: Models::default(),
            telegram: Telegram::default(),
        }
    }
}

impl Default for Models {
    fn default() -> Self {
        Self {
            detector: PathBuf::from("models/face_detection_yunet_2023mar.onnx"),
            recognizer: PathBuf::from("models/face_recognition_sface_2021dec.onnx"),
            emotion: PathBuf::from("models/emotion-ferplus-8.onnx"),
            age_gender: PathBuf::from("models/genderage.onnx"),
        }
    }
}

impl Models {
    pub fn model_set(&self) -> ModelSet {
        ModelSet {
            detector: self.detector.clone(),
            recognizer: self.recognizer.clone(),
            emotion: self.emotion.clone(),
            age_gender: self.age_gender.clone(),
        }
    }
}

impl Telegram {
    pub fn is_configured(&self) -> bool {
        !self.token.is_empty() && !self.chat_id.is_empty()
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let mut cfg = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config at {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?
    } else {
        log::debug!("no config at {}, using defaults", path.display());
        Config::default()
    };
    cfg.apply_env(|key| std::env::var(key).ok());
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}

impl Config {
    /// Credentials from the environment win over the file.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.telegram.token = token;
        }
        if let Some(chat_id) = lookup(CHAT_ID_ENV).filter(|v| !v.is_empty()) {
            self.telegram.chat_id = chat_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg.camera, "/dev/video0");
        assert_eq!(cfg.log_path, PathBuf::from("log.csv"));
        assert_eq!(cfg.unknown_dir, PathBuf::from("unknown_faces"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.toml");
        std::fs::write(
            &path,
            "camera = \"/dev/video2\"\n[telegram]\ntoken = \"abc\"\nchat_id = \"42\"\n",
        )
        .unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.camera, "/dev/video2");
        assert_eq!(cfg.known_dir, PathBuf::from("known"));
        assert!((cfg.match_threshold - 0.363).abs() < 1e-6);
        assert_eq!(cfg.telegram.chat_id, "42");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vigil.toml");
        let mut cfg = Config::default();
        cfg.known_dir = PathBuf::from("/srv/known");
        save_config(&cfg, Some(&path)).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.known_dir, PathBuf::from("/srv/known"));
    }

    #[test]
    fn test_env_overrides_credentials() {
        let mut cfg = Config::default();
        assert!(!cfg.telegram.is_configured());

        cfg.apply_env(|key| match key {
            TOKEN_ENV => Some("123:xyz".to_string()),
            CHAT_ID_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(cfg.telegram.token, "123:xyz");
        assert!(cfg.telegram.chat_id.is_empty());
        assert!(!cfg.telegram.is_configured());
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.toml");
        std::fs::write(&path, "match_threshold = \"high\"").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
