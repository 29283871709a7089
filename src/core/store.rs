//! Message store
//!
//! Ordered conversation history plus the draft input. Every mutation is
//! written through to the key-value backend; persistence failures are logged
//! and never reach the caller, the in-memory list stays authoritative.

use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use super::storage::{KeyValueStore, StorageBackend};
use crate::shared::types::{Message, MessagePatch};

pub const MESSAGES_KEY: &str = "chat_messages";
pub const DRAFT_KEY: &str = "chat_draft";

#[derive(Default)]
struct StoreState {
    messages: Vec<Message>,
    draft: String,
}

pub struct MessageStore {
    storage: StorageBackend,
    state: Mutex<StoreState>,
}

impl MessageStore {
    /// Create the store and rehydrate it from `storage`.
    pub fn new(storage: StorageBackend) -> Self {
        let state = StoreState {
            messages: load_json(&storage, MESSAGES_KEY).unwrap_or_default(),
            draft: load_json(&storage, DRAFT_KEY).unwrap_or_default(),
        };
        debug!(messages = state.messages.len(), "rehydrated message store");
        Self {
            storage,
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("message store mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.state().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Message> {
        self.state().messages.get(index).cloned()
    }

    pub fn find(&self, id: Uuid) -> Option<Message> {
        self.state().messages.iter().find(|m| m.id == id).cloned()
    }

    /// Append and return the new message's index.
    pub fn append(&self, message: Message) -> usize {
        let mut state = self.state();
        state.messages.push(message);
        self.persist_messages(&state.messages);
        state.messages.len() - 1
    }

    /// Apply `patch` to the message at `index`. Out of bounds is a no-op.
    pub fn update(&self, index: usize, patch: MessagePatch) -> bool {
        let mut state = self.state();
        let Some(message) = state.messages.get_mut(index) else {
            debug!(index, "update ignored, index out of bounds");
            return false;
        };
        patch.apply(message);
        self.persist_messages(&state.messages);
        true
    }

    /// Apply `patch` to the message with `id`, wherever it currently sits.
    pub fn update_by_id(&self, id: Uuid, patch: MessagePatch) -> bool {
        let mut state = self.state();
        let Some(message) = state.messages.iter_mut().find(|m| m.id == id) else {
            debug!(%id, "update ignored, message no longer present");
            return false;
        };
        patch.apply(message);
        self.persist_messages(&state.messages);
        true
    }

    /// Build a patch from the current state of the message with `id` and
    /// apply it, both under the store lock. `None` leaves the message as is.
    pub fn update_by_id_with(
        &self,
        id: Uuid,
        build: impl FnOnce(&Message) -> Option<MessagePatch>,
    ) -> bool {
        let mut state = self.state();
        let Some(message) = state.messages.iter_mut().find(|m| m.id == id) else {
            debug!(%id, "update ignored, message no longer present");
            return false;
        };
        let Some(patch) = build(message) else {
            return false;
        };
        patch.apply(message);
        self.persist_messages(&state.messages);
        true
    }

    /// Ids of user messages whose language detection never settled.
    pub fn pending_detection(&self) -> Vec<Uuid> {
        self.state()
            .messages
            .iter()
            .filter(|m| m.is_user() && m.detecting)
            .map(|m| m.id)
            .collect()
    }

    /// Insert `message` directly after `index`. Out of bounds is a no-op.
    pub fn insert_after(&self, index: usize, message: Message) -> bool {
        let mut state = self.state();
        if index >= state.messages.len() {
            debug!(index, "insert ignored, index out of bounds");
            return false;
        }
        state.messages.insert(index + 1, message);
        self.persist_messages(&state.messages);
        true
    }

    /// Insert `message` directly after the message with `id`.
    pub fn insert_after_id(&self, id: Uuid, message: Message) -> bool {
        let mut state = self.state();
        let Some(index) = state.messages.iter().position(|m| m.id == id) else {
            debug!(%id, "insert ignored, message no longer present");
            return false;
        };
        state.messages.insert(index + 1, message);
        self.persist_messages(&state.messages);
        true
    }

    /// Empty the conversation and forget both persisted keys.
    pub fn clear(&self) {
        let mut state = self.state();
        state.messages.clear();
        state.draft.clear();
        for key in [MESSAGES_KEY, DRAFT_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "failed to remove persisted state");
            }
        }
    }

    pub fn draft(&self) -> String {
        self.state().draft.clone()
    }

    pub fn set_draft(&self, text: &str) {
        let mut state = self.state();
        state.draft = text.to_string();
        self.persist(DRAFT_KEY, &state.draft);
    }

    fn persist_messages(&self, messages: &[Message]) {
        self.persist(MESSAGES_KEY, messages);
    }

    fn persist<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) {
        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize state");
                return;
            }
        };
        if let Err(e) = self.storage.set(key, &serialized) {
            warn!(key, error = %e, "failed to persist state");
        }
    }
}

/// Read and parse a stored value. Missing, unreadable or malformed → `None`.
fn load_json<T: serde::de::DeserializeOwned>(storage: &StorageBackend, key: &str) -> Option<T> {
    let raw = match storage.get(key) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(key, error = %e, "failed to read persisted state");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "discarding malformed persisted state");
            None
        }
    }
}
