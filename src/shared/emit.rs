use tokio::sync::broadcast;

use super::events::ChatEvent;

const EVENT_CAPACITY: usize = 64;

/// Broadcast channel fanning [`ChatEvent`]s out to every subscriber.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<ChatEvent>,
}

impl EventEmitter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers. Having none is not an error.
    pub fn emit(&self, event: ChatEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("no event subscribers");
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
