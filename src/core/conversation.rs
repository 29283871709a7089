//! Conversation controller
//!
//! The only writer of the message store. Each user action resolves its
//! message to a stable id before the first await, so summaries inserted
//! meanwhile (which shift indices) cannot redirect a result to the wrong
//! message. Capability results are applied as one patch or not at all.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::capability::{CapabilityGateway, CapabilityPlatform};
use super::debounce::{DebouncedDetector, Detection};
use super::languages::normalize_code;
use super::operations::{InFlight, OperationKey, Ticket};
use super::storage::StorageBackend;
use super::store::MessageStore;
use super::text::{is_blank, is_summarizable};
use crate::shared::emit::EventEmitter;
use crate::shared::error::{AppError, AppResult};
use crate::shared::events::ChatEvent;
use crate::shared::settings::ChatSettings;
use crate::shared::types::{CapabilityKind, LanguagePair, Message, MessagePatch};

/// Where a message sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    /// Sent, language detection still running.
    Composed,
    /// Source language known, or confirmed unknown.
    Detected,
    /// `text` holds a translation.
    Translated,
}

/// Language detected for a given draft text.
#[derive(Debug, Clone)]
struct DraftLanguage {
    text: String,
    language: Option<String>,
}

pub struct Conversation {
    settings: ChatSettings,
    store: MessageStore,
    gateway: Arc<CapabilityGateway>,
    detector: DebouncedDetector,
    inflight: Arc<InFlight>,
    events: EventEmitter,
    draft_language: Mutex<Option<DraftLanguage>>,
}

impl Conversation {
    pub fn new(
        settings: ChatSettings,
        platform: Arc<dyn CapabilityPlatform>,
        storage: StorageBackend,
    ) -> Self {
        let events = EventEmitter::new();
        let gateway = Arc::new(CapabilityGateway::new(platform, events.clone()));
        let detector = DebouncedDetector::new(
            gateway.clone(),
            Duration::from_millis(settings.detection.debounce_ms),
            settings.detection.min_confidence,
        );
        Self {
            store: MessageStore::new(storage),
            settings,
            gateway,
            detector,
            inflight: Arc::new(InFlight::new()),
            events,
            draft_language: Mutex::new(None),
        }
    }

    /// Build the conversation and resume detection for messages restored
    /// from storage whose detection never settled.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        settings: ChatSettings,
        platform: Arc<dyn CapabilityPlatform>,
        storage: StorageBackend,
    ) -> Arc<Self> {
        let conversation = Arc::new(Self::new(settings, platform, storage));
        let resumed = conversation.resume_detection();
        if resumed > 0 {
            info!(resumed, "resuming interrupted language detection");
        }
        conversation
    }

    // ===== Read-only view =====

    pub fn messages(&self) -> Vec<Message> {
        self.store.messages()
    }

    pub fn message(&self, index: usize) -> Option<Message> {
        self.store.get(index)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn draft(&self) -> String {
        self.store.draft()
    }

    /// Language detected for the current draft, once detection has settled.
    pub fn draft_language(&self) -> Option<String> {
        let draft = self.store.draft();
        let detection = self.draft_detection();
        detection
            .as_ref()
            .filter(|d| d.text == draft)
            .and_then(|d| d.language.clone())
    }

    pub fn is_summarizing(&self) -> bool {
        self.inflight.count(CapabilityKind::Summarizer) > 0
    }

    pub fn can_summarize(&self, index: usize) -> bool {
        self.store
            .get(index)
            .map(|m| m.is_user() && is_summarizable(&m.original_text, self.settings.summarizer.min_words))
            .unwrap_or(false)
    }

    pub fn message_state(&self, index: usize) -> Option<MessageState> {
        let message = self.store.get(index)?;
        let detecting = OperationKey::new(CapabilityKind::LanguageDetector, message.id);
        Some(if message.detecting || self.inflight.is_active(detecting) {
            MessageState::Composed
        } else if message.translated {
            MessageState::Translated
        } else {
            MessageState::Detected
        })
    }

    pub fn default_target_language(&self) -> &str {
        &self.settings.preferences.default_target_lang
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    // ===== Actions =====

    /// Store the draft and detect its language once typing pauses.
    pub async fn set_draft(&self, text: &str) -> Detection {
        self.store.set_draft(text);

        let outcome = self.detector.schedule_detect(text).await;
        if outcome == Detection::Superseded {
            return outcome;
        }

        let language = outcome.language().map(str::to_string);
        *self.draft_detection() = Some(DraftLanguage {
            text: text.to_string(),
            language: language.clone(),
        });
        self.events.emit(ChatEvent::DraftLanguage(language));
        outcome
    }

    /// Append a user message and start detecting its language.
    ///
    /// If the draft's language was already detected for exactly this text it
    /// is applied at once; otherwise detection runs in the background and
    /// the message stays marked as detecting until it settles.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn send_message(self: &Arc<Self>, text: &str) -> AppResult<Uuid> {
        if is_blank(text) {
            return Err(AppError::Validation("Message is empty".to_string()));
        }

        let known = self
            .draft_detection()
            .take()
            .filter(|d| d.text == text)
            .map(|d| d.language);

        let mut message = Message::user(text, self.default_target_language());
        let id = message.id;
        match &known {
            Some(language) => MessagePatch::detected(language.clone()).apply(&mut message),
            None => message.detecting = true,
        }
        self.store.append(message);
        self.detector.cancel();
        self.store.set_draft("");
        self.emit_messages();
        info!(message_id = %id, "message sent");

        if known.is_none() {
            self.spawn_detection(id);
        }
        Ok(id)
    }

    /// Restart detection for every message still marked as detecting.
    /// Returns how many were restarted.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn resume_detection(self: &Arc<Self>) -> usize {
        let pending = self.store.pending_detection();
        for id in &pending {
            self.spawn_detection(*id);
        }
        pending.len()
    }

    fn spawn_detection(self: &Arc<Self>, id: Uuid) {
        let ticket = self
            .inflight
            .begin(OperationKey::new(CapabilityKind::LanguageDetector, id));
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.detect_message(id, ticket).await;
        });
    }

    async fn detect_message(&self, id: Uuid, ticket: Ticket) {
        let Some(message) = self.store.find(id) else {
            return;
        };
        let outcome = self
            .detector
            .detect_immediately(&message.original_text, ticket.token())
            .await;
        let language = match outcome {
            // Left marked as detecting, to be resumed on the next start.
            Detection::Superseded => return,
            Detection::Detected(language) => Some(language),
            Detection::Unknown => None,
        };
        let token = ticket.token().clone();
        let applied = self.store.update_by_id_with(id, |_| {
            (!token.is_cancelled()).then(|| MessagePatch::detected(language.clone()))
        });
        drop(ticket);
        if applied {
            debug!(message_id = %id, language = ?language, "message language settled");
            self.emit_messages();
        }
    }

    /// Translate the message at `index` from its source to its target
    /// language, swapping the pair so a second call reverses direction.
    ///
    /// Returns whether the message changed.
    pub async fn translate(&self, index: usize) -> AppResult<bool> {
        let Some(message) = self.store.get(index) else {
            return Ok(false);
        };
        let Some(source) = message.source_language.clone().filter(|_| message.needs_translation())
        else {
            debug!(index, "nothing to translate");
            return Ok(false);
        };
        let pair = LanguagePair::new(source, message.target_language.clone());

        let ticket = self
            .inflight
            .begin(OperationKey::new(CapabilityKind::Translator, message.id));
        let result: AppResult<String> = async {
            let handle = self.gateway.acquire_translator(&pair, ticket.token()).await?;
            handle.translate(&message.text).await
        }
        .await;

        match result {
            Ok(translated) => {
                // Checked under the store lock: a cancel or reset that lands
                // after the translation finished still wins.
                let token = ticket.token().clone();
                let applied = self.store.update_by_id_with(message.id, |current| {
                    let unchanged = current.text == message.text
                        && current.source_language.as_deref() == Some(pair.source_language.as_str())
                        && current.target_language == pair.target_language;
                    (unchanged && !token.is_cancelled()).then(|| MessagePatch {
                        text: Some(translated),
                        source_language: Some(Some(pair.target_language.clone())),
                        target_language: Some(pair.source_language.clone()),
                        translated: Some(true),
                        ..MessagePatch::default()
                    })
                });
                drop(ticket);
                if !applied {
                    debug!(message_id = %message.id, "discarding stale translation");
                } else {
                    info!(
                        message_id = %message.id,
                        source = %pair.source_language,
                        target = %pair.target_language,
                        "message translated"
                    );
                    self.emit_messages();
                }
                Ok(applied)
            }
            Err(AppError::Cancelled) => {
                debug!(message_id = %message.id, "translation cancelled");
                Ok(false)
            }
            Err(e) if e.is_unavailable() => {
                warn!(message_id = %message.id, error = %e, "translation unavailable");
                Ok(false)
            }
            Err(e) => {
                error!(message_id = %message.id, error = %e, "translation failed");
                self.events.emit(ChatEvent::Notice {
                    message_id: message.id,
                    text: format!("Translation failed: {}", e),
                });
                Err(e)
            }
        }
    }

    /// Point the message at a new target language and show the original
    /// text again, ready for a fresh translation.
    pub fn change_target_language(&self, index: usize, language: &str) -> AppResult<bool> {
        let language = normalize_code(language)
            .ok_or_else(|| AppError::Validation(format!("Unknown language: {}", language)))?;
        let Some(message) = self.store.get(index) else {
            return Ok(false);
        };
        if !message.is_user() {
            return Ok(false);
        }

        self.inflight
            .cancel(OperationKey::new(CapabilityKind::Translator, message.id));

        // Built from the message as it is under the lock, so a translation
        // that completed in between is reset as well.
        let applied = self.store.update_by_id_with(message.id, |current| {
            Some(MessagePatch {
                text: Some(current.original_text.clone()),
                source_language: Some(current.original_language()),
                target_language: Some(language),
                translated: Some(false),
                ..MessagePatch::default()
            })
        });
        if applied {
            self.emit_messages();
        }
        Ok(applied)
    }

    /// Summarize a long user message into a bot message inserted right after
    /// it. A failure inserts a notice instead.
    ///
    /// Returns the id of the inserted message, if any.
    pub async fn summarize(&self, index: usize) -> AppResult<Option<Uuid>> {
        let Some(message) = self.store.get(index) else {
            return Ok(None);
        };
        let min_words = self.settings.summarizer.min_words;
        if !message.is_user() || !is_summarizable(&message.original_text, min_words) {
            debug!(index, "message too short to summarize");
            return Ok(None);
        }
        let Some(ticket) = self
            .inflight
            .try_begin(OperationKey::new(CapabilityKind::Summarizer, message.id))
        else {
            debug!(message_id = %message.id, "summarization already in flight");
            return Ok(None);
        };
        self.events.emit(ChatEvent::SummarizingChanged(true));

        let options = self.settings.summarizer.options;
        let result: AppResult<String> = async {
            let handle = self.gateway.acquire_summarizer(&options, ticket.token()).await?;
            handle.summarize(&message.original_text).await
        }
        .await;
        let cancelled = ticket.token().is_cancelled();
        drop(ticket);

        let reply = match result {
            _ if cancelled => None,
            Ok(summary) => Some(Message::summary(summary, self.default_target_language())),
            Err(AppError::Cancelled) => None,
            Err(e) if e.is_unavailable() => {
                warn!(message_id = %message.id, error = %e, "summarizer unavailable");
                None
            }
            Err(e) => {
                error!(message_id = %message.id, error = %e, "summarization failed");
                Some(Message::bot(
                    self.settings.summarizer.failure_notice.clone(),
                    self.default_target_language(),
                ))
            }
        };

        let inserted = match reply {
            Some(reply) => {
                let reply_id = reply.id;
                self.store
                    .insert_after_id(message.id, reply)
                    .then_some(reply_id)
            }
            None => None,
        };
        self.events.emit(ChatEvent::SummarizingChanged(self.is_summarizing()));
        if inserted.is_some() {
            self.emit_messages();
        }
        Ok(inserted)
    }

    /// Drop the whole conversation, cancelling anything in flight.
    pub fn clear(&self) {
        self.inflight.cancel_all();
        self.detector.cancel();
        self.store.clear();
        *self.draft_detection() = None;
        info!("conversation cleared");
        self.events.emit(ChatEvent::SummarizingChanged(false));
        self.emit_messages();
    }

    fn emit_messages(&self) {
        self.events.emit(ChatEvent::MessagesChanged(self.store.messages()));
    }

    fn draft_detection(&self) -> MutexGuard<'_, Option<DraftLanguage>> {
        match self.draft_language.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
