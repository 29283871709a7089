use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{DownloadProgress, Message};

/// State changes pushed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ChatEvent {
    #[serde(rename = "messages://changed")]
    MessagesChanged(Vec<Message>),

    #[serde(rename = "draft://language")]
    DraftLanguage(Option<String>),

    #[serde(rename = "capability://progress")]
    DownloadProgress(DownloadProgress),

    #[serde(rename = "summarizer://busy")]
    SummarizingChanged(bool),

    /// Inline failure note for a message (e.g. a translation that failed).
    #[serde(rename = "message://notice")]
    Notice { message_id: Uuid, text: String },
}
