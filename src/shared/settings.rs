use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use super::error::{AppError, AppResult};
use super::types::SummarizerOptions;

pub const DEFAULT_TARGET_LANG: &str = "en";
pub const DEFAULT_SUMMARY_FAILURE_NOTICE: &str = "Summarization failed. Please try again.";
pub const DEFAULT_TRANSLATE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub preferences: ChatPreferences,
    pub detection: DetectionSettings,
    pub summarizer: SummarizerSettings,
    pub translation: TranslationSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatPreferences {
    pub default_target_lang: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    pub debounce_ms: u64,
    /// Minimum confidence for the top candidate. `None` accepts the top hit.
    pub min_confidence: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    /// Messages need strictly more words than this to be summarizable.
    pub min_words: usize,
    pub options: SummarizerOptions,
    pub failure_notice: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    pub endpoint: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Redb,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackendKind,
    pub path: Option<PathBuf>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            preferences: ChatPreferences::default(),
            detection: DetectionSettings::default(),
            summarizer: SummarizerSettings::default(),
            translation: TranslationSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Default for ChatPreferences {
    fn default() -> Self {
        Self {
            default_target_lang: DEFAULT_TARGET_LANG.to_string(),
        }
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            min_confidence: None,
        }
    }
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            min_words: 150,
            options: SummarizerOptions::default(),
            failure_notice: DEFAULT_SUMMARY_FAILURE_NOTICE.to_string(),
        }
    }
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_TRANSLATE_ENDPOINT.to_string(),
            user_agent: "Mozilla/5.0".to_string(),
        }
    }
}

fn project_dirs() -> AppResult<ProjectDirs> {
    ProjectDirs::from("com", "lingua", "lingua-chat")
        .ok_or_else(|| AppError::Io("Failed to determine project directories".to_string()))
}

impl ChatSettings {
    pub fn get_settings_path() -> AppResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("settings.json"))
    }

    /// Location of the message database unless `storage.path` overrides it.
    pub fn data_path(&self) -> AppResult<PathBuf> {
        match &self.storage.path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("conversation.redb")),
        }
    }

    pub async fn load() -> AppResult<Self> {
        let path = Self::get_settings_path()?;
        Self::load_from(&path).await
    }

    /// Load settings from `path`, writing the defaults there on first run.
    pub async fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            let settings = Self::default();
            settings.save_to(path).await?;
            return Ok(settings);
        }

        let content = fs::read_to_string(path).await?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::Validation(format!("Failed to parse settings: {}", e)))
    }

    pub async fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ChatSettings::default();
        assert_eq!(settings.preferences.default_target_lang, "en");
        assert_eq!(settings.detection.debounce_ms, 500);
        assert_eq!(settings.detection.min_confidence, None);
        assert_eq!(settings.summarizer.min_words, 150);
        assert_eq!(settings.storage.backend, StorageBackendKind::Redb);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: ChatSettings =
            serde_json::from_str(r#"{"detection":{"min_confidence":0.5}}"#).unwrap();
        assert_eq!(settings.detection.min_confidence, Some(0.5));
        assert_eq!(settings.detection.debounce_ms, 500);
        assert_eq!(settings.preferences.default_target_lang, "en");
    }

    #[tokio::test]
    async fn test_load_creates_defaults_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = ChatSettings::load_from(&path).await.unwrap();
        assert_eq!(settings, ChatSettings::default());
        assert!(path.exists());

        let mut changed = settings.clone();
        changed.preferences.default_target_lang = "fr".to_string();
        changed.save_to(&path).await.unwrap();

        let reloaded = ChatSettings::load_from(&path).await.unwrap();
        assert_eq!(reloaded.preferences.default_target_lang, "fr");
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ChatSettings::load_from(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
