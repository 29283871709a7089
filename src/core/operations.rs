//! Registry of in-flight capability calls and their cancellation tokens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::shared::types::CapabilityKind;

/// What an in-flight call is doing, and to which message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationKey {
    pub kind: CapabilityKind,
    pub message: Option<Uuid>,
}

impl OperationKey {
    pub fn new(kind: CapabilityKind, message: Uuid) -> Self {
        Self {
            kind,
            message: Some(message),
        }
    }
}

struct Entry {
    serial: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct Registry {
    next_serial: u64,
    entries: HashMap<OperationKey, Entry>,
}

#[derive(Default)]
pub struct InFlight {
    registry: Mutex<Registry>,
}

/// Registration of one call. Dropping it unregisters the call unless a newer
/// call has taken over the key. Owns its registry so it can move into a
/// spawned task.
pub struct Ticket {
    owner: Arc<InFlight>,
    key: OperationKey,
    serial: u64,
    token: CancellationToken,
}

impl Ticket {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn key(&self) -> OperationKey {
        self.key
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let mut registry = self.owner.registry();
        if registry.entries.get(&self.key).map(|e| e.serial) == Some(self.serial) {
            registry.entries.remove(&self.key);
        }
    }
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn register(self: &Arc<Self>, registry: &mut Registry, key: OperationKey) -> Ticket {
        registry.next_serial += 1;
        let serial = registry.next_serial;
        let token = CancellationToken::new();
        registry.entries.insert(
            key,
            Entry {
                serial,
                token: token.clone(),
            },
        );
        Ticket {
            owner: Arc::clone(self),
            key,
            serial,
            token,
        }
    }

    /// Register a call, cancelling whatever held `key` before.
    pub fn begin(self: &Arc<Self>, key: OperationKey) -> Ticket {
        let mut registry = self.registry();
        if let Some(previous) = registry.entries.get(&key) {
            debug!(?key, "cancelling superseded operation");
            previous.token.cancel();
        }
        self.register(&mut registry, key)
    }

    /// Register a call only if nothing holds `key` yet.
    pub fn try_begin(self: &Arc<Self>, key: OperationKey) -> Option<Ticket> {
        let mut registry = self.registry();
        if registry.entries.contains_key(&key) {
            return None;
        }
        Some(self.register(&mut registry, key))
    }

    pub fn cancel(&self, key: OperationKey) {
        if let Some(entry) = self.registry().entries.remove(&key) {
            entry.token.cancel();
        }
    }

    pub fn cancel_all(&self) {
        for (_, entry) in self.registry().entries.drain() {
            entry.token.cancel();
        }
    }

    pub fn is_active(&self, key: OperationKey) -> bool {
        self.registry().entries.contains_key(&key)
    }

    pub fn count(&self, kind: CapabilityKind) -> usize {
        self.registry().entries.keys().filter(|k| k.kind == kind).count()
    }
}
