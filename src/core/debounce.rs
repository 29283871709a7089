use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::capability::CapabilityGateway;
use super::text::is_blank;
use crate::shared::error::AppError;

/// Outcome of a debounced detection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Detected(String),
    /// Detection ran (or could not run) and produced no usable language.
    Unknown,
    /// A later request replaced this one; its result must not be applied.
    Superseded,
}

impl Detection {
    pub fn language(&self) -> Option<&str> {
        match self {
            Detection::Detected(code) => Some(code),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Pending {
    generation: u64,
    cancel: Option<CancellationToken>,
}

/// Trailing-edge debounce in front of the language detector.
///
/// Only one request is pending at a time. Scheduling cancels the previous
/// request, which then resolves to [`Detection::Superseded`].
pub struct DebouncedDetector {
    gateway: Arc<CapabilityGateway>,
    delay: Duration,
    min_confidence: Option<f32>,
    pending: Mutex<Pending>,
}

impl DebouncedDetector {
    pub fn new(gateway: Arc<CapabilityGateway>, delay: Duration, min_confidence: Option<f32>) -> Self {
        Self {
            gateway,
            delay,
            min_confidence,
            pending: Mutex::new(Pending::default()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Cancel whatever is pending and claim the slot.
    fn reschedule(&self) -> (u64, CancellationToken) {
        let mut pending = self.pending();
        if let Some(previous) = pending.cancel.take() {
            previous.cancel();
        }
        pending.generation += 1;
        let cancel = CancellationToken::new();
        pending.cancel = Some(cancel.clone());
        (pending.generation, cancel)
    }

    /// Release the slot if `generation` still owns it. Returns whether it did.
    fn finish(&self, generation: u64) -> bool {
        let mut pending = self.pending();
        if pending.generation != generation {
            return false;
        }
        pending.cancel = None;
        true
    }

    /// Cancel the pending request, if any.
    pub fn cancel(&self) {
        let mut pending = self.pending();
        pending.generation += 1;
        if let Some(cancel) = pending.cancel.take() {
            cancel.cancel();
        }
    }

    pub async fn schedule_detect(&self, text: &str) -> Detection {
        let (generation, cancel) = self.reschedule();

        if is_blank(text) {
            self.finish(generation);
            return Detection::Unknown;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Detection::Superseded,
            _ = tokio::time::sleep(self.delay) => {}
        }

        let outcome = self.detect_immediately(text, &cancel).await;
        if !self.finish(generation) {
            debug!(generation, "discarding stale detection");
            return Detection::Superseded;
        }
        outcome
    }

    /// Detect without waiting for a quiet period. Used for finished text such
    /// as a sent message, which has nothing to debounce.
    pub async fn detect_immediately(&self, text: &str, cancel: &CancellationToken) -> Detection {
        if is_blank(text) {
            return Detection::Unknown;
        }
        let handle = match self.gateway.acquire_detector(cancel).await {
            Ok(handle) => handle,
            Err(AppError::Cancelled) => return Detection::Superseded,
            Err(e) => {
                debug!(error = %e, "language detector not available");
                return Detection::Unknown;
            }
        };

        let candidates = match handle.detect(text).await {
            Ok(candidates) => candidates,
            Err(AppError::Cancelled) => return Detection::Superseded,
            Err(e) => {
                warn!(error = %e, "language detection failed");
                return Detection::Unknown;
            }
        };

        let Some(top) = candidates.into_iter().next() else {
            return Detection::Unknown;
        };
        match self.min_confidence {
            Some(threshold) if top.confidence < threshold => {
                debug!(
                    language = %top.language,
                    confidence = top.confidence,
                    threshold,
                    "detection below confidence threshold"
                );
                Detection::Unknown
            }
            _ => Detection::Detected(top.language),
        }
    }
}
