use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ===== Conversation records =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// A single entry of the conversation.
///
/// Stored as camelCase JSON so the persisted list keeps the field names the
/// browser front end used (`originalText`, `sourceLanguage`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub text: String,
    pub original_text: String,
    pub sender: Sender,
    #[serde(default)]
    pub source_language: Option<String>,
    /// Language of `original_text`, kept when translation swaps the pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    pub target_language: String,
    #[serde(default)]
    pub translated: bool,
    #[serde(default)]
    pub summary: bool,
    /// Language detection was started and has not settled yet.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub detecting: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self::new(text.into(), Sender::User, target_language.into())
    }

    pub fn bot(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self::new(text.into(), Sender::Bot, target_language.into())
    }

    /// Bot message carrying a generated summary.
    pub fn summary(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        let mut message = Self::bot(text, target_language);
        message.summary = true;
        message
    }

    fn new(text: String, sender: Sender, target_language: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_text: text.clone(),
            text,
            sender,
            source_language: None,
            detected_language: None,
            target_language,
            translated: false,
            summary: false,
            detecting: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    /// Language `original_text` is written in, if known.
    pub fn original_language(&self) -> Option<String> {
        if self.detected_language.is_some() {
            return self.detected_language.clone();
        }
        if self.translated {
            Some(self.target_language.clone())
        } else {
            self.source_language.clone()
        }
    }

    /// Whether the translate action has anything to do for this message.
    pub fn needs_translation(&self) -> bool {
        match &self.source_language {
            Some(source) => self.is_user() && source != &self.target_language,
            None => false,
        }
    }
}

/// Partial update of a [`Message`].
///
/// `original_text` is deliberately absent: it never changes after creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    pub text: Option<String>,
    pub source_language: Option<Option<String>>,
    pub detected_language: Option<Option<String>>,
    pub target_language: Option<String>,
    pub translated: Option<bool>,
    pub detecting: Option<bool>,
}

impl MessagePatch {
    /// Result of a detection cycle.
    pub fn detected(language: Option<String>) -> Self {
        Self {
            source_language: Some(language.clone()),
            detected_language: Some(language),
            detecting: Some(false),
            ..Self::default()
        }
    }

    pub fn apply(self, message: &mut Message) {
        if let Some(text) = self.text {
            message.text = text;
        }
        if let Some(source) = self.source_language {
            message.source_language = source;
        }
        if let Some(detected) = self.detected_language {
            message.detected_language = detected;
        }
        if let Some(target) = self.target_language {
            message.target_language = target;
        }
        if let Some(translated) = self.translated {
            message.translated = translated;
        }
        if let Some(detecting) = self.detecting {
            message.detecting = detecting;
        }
    }
}

// ===== Capabilities =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    LanguageDetector,
    Summarizer,
    Translator,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CapabilityKind::LanguageDetector => "language detector",
            CapabilityKind::Summarizer => "summarizer",
            CapabilityKind::Translator => "translator",
        };
        f.write_str(name)
    }
}

/// Result of an availability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    Readily,
    AfterDownload,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryType {
    #[default]
    KeyPoints,
    Tldr,
    Teaser,
    Headline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryFormat {
    #[default]
    Markdown,
    PlainText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerOptions {
    #[serde(rename = "type")]
    pub kind: SummaryType,
    pub length: SummaryLength,
    pub format: SummaryFormat,
}

/// Ordered (source, target) language combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguagePair {
    pub source_language: String,
    pub target_language: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_language: source.into(),
            target_language: target.into(),
        }
    }
}

/// Options passed to availability checks and instance creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CapabilityOptions {
    LanguageDetector,
    Summarizer(SummarizerOptions),
    Translator(LanguagePair),
}

impl CapabilityOptions {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            CapabilityOptions::LanguageDetector => CapabilityKind::LanguageDetector,
            CapabilityOptions::Summarizer(_) => CapabilityKind::Summarizer,
            CapabilityOptions::Translator(_) => CapabilityKind::Translator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionCandidate {
    pub language: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub kind: CapabilityKind,
    pub loaded: u64,
    pub total: u64,
}
