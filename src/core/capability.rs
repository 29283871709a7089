//! Capability gateway
//!
//! Thin adapter over the platform's detection, summarization and translation
//! capabilities. Acquiring a capability negotiates availability first:
//! `readily` hands back a handle at once, `after-download` creates the
//! instance with a progress monitor and waits for it to become ready (the
//! wait races the caller's cancellation token), `no` fails the action.

use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::shared::emit::EventEmitter;
use crate::shared::error::{AppError, AppResult};
use crate::shared::events::ChatEvent;
use crate::shared::types::{
    Availability, CapabilityKind, CapabilityOptions, DetectionCandidate, DownloadProgress,
    LanguagePair, SummarizerOptions,
};

/// Observer for download progress while a capability is being fetched.
pub type ProgressMonitor = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

/// Anything created by a [`CapabilityPlatform`].
#[async_trait]
pub trait CapabilityInstance: Send + Sync {
    /// Resolves once the instance can serve requests.
    async fn ready(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait LanguageDetector: CapabilityInstance {
    /// Candidates ordered by descending confidence.
    async fn detect(&self, text: &str) -> AppResult<Vec<DetectionCandidate>>;
}

#[async_trait]
pub trait Summarizer: CapabilityInstance {
    async fn summarize(&self, text: &str) -> AppResult<String>;
}

#[async_trait]
pub trait Translator: CapabilityInstance {
    async fn translate(&self, text: &str) -> AppResult<String>;
}

/// The external capability surface.
#[async_trait]
pub trait CapabilityPlatform: Send + Sync {
    /// Whether the platform exposes this kind of capability at all.
    fn supports(&self, kind: CapabilityKind) -> bool;

    async fn availability(&self, options: &CapabilityOptions) -> AppResult<Availability>;

    async fn create_detector(
        &self,
        monitor: Option<ProgressMonitor>,
    ) -> AppResult<Arc<dyn LanguageDetector>>;

    async fn create_summarizer(
        &self,
        options: &SummarizerOptions,
        monitor: Option<ProgressMonitor>,
    ) -> AppResult<Arc<dyn Summarizer>>;

    async fn create_translator(
        &self,
        pair: &LanguagePair,
        monitor: Option<ProgressMonitor>,
    ) -> AppResult<Arc<dyn Translator>>;
}

/// A ready capability bound to the cancellation token of the action using it.
pub struct Handle<T: ?Sized> {
    inner: Arc<T>,
    cancel: CancellationToken,
}

impl<T: ?Sized> Handle<T> {
    fn new(inner: Arc<T>, cancel: &CancellationToken) -> Self {
        Self {
            inner,
            cancel: cancel.clone(),
        }
    }
}

impl Handle<dyn LanguageDetector> {
    /// Candidates ordered by descending confidence.
    pub async fn detect(&self, text: &str) -> AppResult<Vec<DetectionCandidate>> {
        let mut candidates = with_cancel(&self.cancel, self.inner.detect(text)).await?;
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(candidates)
    }
}

impl Handle<dyn Summarizer> {
    pub async fn summarize(&self, text: &str) -> AppResult<String> {
        with_cancel(&self.cancel, self.inner.summarize(text)).await
    }
}

impl Handle<dyn Translator> {
    pub async fn translate(&self, text: &str) -> AppResult<String> {
        with_cancel(&self.cancel, self.inner.translate(text)).await
    }
}

/// Run `fut` unless `cancel` fires first.
async fn with_cancel<T, F>(cancel: &CancellationToken, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        result = fut => result,
    }
}

fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("capability cache mutex poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Owns the platform and the instances created from it.
pub struct CapabilityGateway {
    platform: Arc<dyn CapabilityPlatform>,
    events: EventEmitter,
    detector: Mutex<Option<Arc<dyn LanguageDetector>>>,
    summarizer: Mutex<Option<(SummarizerOptions, Arc<dyn Summarizer>)>>,
    translator: Mutex<Option<(LanguagePair, Arc<dyn Translator>)>>,
}

impl CapabilityGateway {
    pub fn new(platform: Arc<dyn CapabilityPlatform>, events: EventEmitter) -> Self {
        Self {
            platform,
            events,
            detector: Mutex::new(None),
            summarizer: Mutex::new(None),
            translator: Mutex::new(None),
        }
    }

    pub fn supports(&self, kind: CapabilityKind) -> bool {
        self.platform.supports(kind)
    }

    pub async fn acquire_detector(
        &self,
        cancel: &CancellationToken,
    ) -> AppResult<Handle<dyn LanguageDetector>> {
        if let Some(detector) = lock(&self.detector).clone() {
            return Ok(Handle::new(detector, cancel));
        }

        let options = CapabilityOptions::LanguageDetector;
        let monitor = self.negotiate(&options, cancel).await?;
        let needs_wait = monitor.is_some();
        let detector = self.platform.create_detector(monitor).await?;
        if needs_wait {
            with_cancel(cancel, detector.ready()).await?;
        }

        info!(kind = %options.kind(), "capability ready");
        *lock(&self.detector) = Some(detector.clone());
        Ok(Handle::new(detector, cancel))
    }

    pub async fn acquire_summarizer(
        &self,
        options: &SummarizerOptions,
        cancel: &CancellationToken,
    ) -> AppResult<Handle<dyn Summarizer>> {
        if let Some((cached_options, summarizer)) = lock(&self.summarizer).clone() {
            if &cached_options == options {
                return Ok(Handle::new(summarizer, cancel));
            }
        }

        let capability = CapabilityOptions::Summarizer(*options);
        let monitor = self.negotiate(&capability, cancel).await?;
        let needs_wait = monitor.is_some();
        let summarizer = self.platform.create_summarizer(options, monitor).await?;
        if needs_wait {
            with_cancel(cancel, summarizer.ready()).await?;
        }

        info!(kind = %capability.kind(), ?options, "capability ready");
        *lock(&self.summarizer) = Some((*options, summarizer.clone()));
        Ok(Handle::new(summarizer, cancel))
    }

    /// Translators are pair-specific; asking for a different pair replaces
    /// the cached instance.
    pub async fn acquire_translator(
        &self,
        pair: &LanguagePair,
        cancel: &CancellationToken,
    ) -> AppResult<Handle<dyn Translator>> {
        if let Some((cached_pair, translator)) = lock(&self.translator).clone() {
            if &cached_pair == pair {
                return Ok(Handle::new(translator, cancel));
            }
        }

        let capability = CapabilityOptions::Translator(pair.clone());
        let monitor = match self.negotiate(&capability, cancel).await {
            Err(AppError::CapabilityUnavailable(_)) if self.supports(CapabilityKind::Translator) => {
                return Err(AppError::UnsupportedPair(
                    pair.source_language.clone(),
                    pair.target_language.clone(),
                ));
            }
            other => other?,
        };
        let needs_wait = monitor.is_some();
        let translator = self.platform.create_translator(pair, monitor).await?;
        if needs_wait {
            with_cancel(cancel, translator.ready()).await?;
        }

        info!(
            kind = %capability.kind(),
            source = %pair.source_language,
            target = %pair.target_language,
            "capability ready"
        );
        *lock(&self.translator) = Some((pair.clone(), translator.clone()));
        Ok(Handle::new(translator, cancel))
    }

    /// Check support and availability. Returns a progress monitor when the
    /// capability has to be downloaded first.
    async fn negotiate(
        &self,
        options: &CapabilityOptions,
        cancel: &CancellationToken,
    ) -> AppResult<Option<ProgressMonitor>> {
        let kind = options.kind();
        if !self.platform.supports(kind) {
            warn!(%kind, "capability not supported by platform");
            return Err(AppError::CapabilityUnavailable(kind));
        }

        let availability = with_cancel(cancel, self.platform.availability(options)).await?;
        debug!(%kind, ?availability, "capability availability");
        match availability {
            Availability::No => Err(AppError::CapabilityUnavailable(kind)),
            Availability::Readily => Ok(None),
            Availability::AfterDownload => Ok(Some(self.progress_monitor())),
        }
    }

    fn progress_monitor(&self) -> ProgressMonitor {
        let events = self.events.clone();
        Arc::new(move |progress: DownloadProgress| {
            debug!(
                kind = %progress.kind,
                loaded = progress.loaded,
                total = progress.total,
                "download progress"
            );
            events.emit(ChatEvent::DownloadProgress(progress));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testutil::FakePlatform;

    fn gateway(platform: FakePlatform) -> (Arc<FakePlatform>, CapabilityGateway) {
        let platform = Arc::new(platform);
        let gateway = CapabilityGateway::new(platform.clone(), EventEmitter::new());
        (platform, gateway)
    }

    #[tokio::test]
    async fn test_readily_available_detector_is_cached() {
        let (platform, gateway) = gateway(FakePlatform::new().with_detection("hola", "es", 0.9));
        let cancel = CancellationToken::new();

        let first = gateway.acquire_detector(&cancel).await.unwrap();
        let results = first.detect("hola").await.unwrap();
        assert_eq!(results[0].language, "es");

        gateway.acquire_detector(&cancel).await.unwrap();
        assert_eq!(platform.created(CapabilityKind::LanguageDetector), 1);
    }

    #[tokio::test]
    async fn test_detect_ranks_candidates_by_confidence() {
        let platform =
            FakePlatform::new().with_candidates("ciao", &[("es", 0.2), ("it", 0.7), ("pt", 0.1)]);
        let (_, gateway) = gateway(platform);
        let handle = gateway.acquire_detector(&CancellationToken::new()).await.unwrap();

        let languages: Vec<_> = handle
            .detect("ciao")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.language)
            .collect();
        assert_eq!(languages, ["it", "es", "pt"]);
    }

    #[tokio::test]
    async fn test_unsupported_capability_is_unavailable() {
        let (_, gateway) = gateway(FakePlatform::new().without(CapabilityKind::Summarizer));
        let err = gateway
            .acquire_summarizer(&SummarizerOptions::default(), &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert_eq!(err, AppError::CapabilityUnavailable(CapabilityKind::Summarizer));
    }

    #[tokio::test]
    async fn test_pair_with_no_availability_is_unsupported_pair() {
        let (_, gateway) = gateway(FakePlatform::new().with_unavailable_pair("fr", "ja"));
        let err = gateway
            .acquire_translator(&LanguagePair::new("fr", "ja"), &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert_eq!(err, AppError::UnsupportedPair("fr".into(), "ja".into()));
    }

    #[tokio::test]
    async fn test_translator_recreated_when_pair_changes() {
        let (platform, gateway) = gateway(FakePlatform::new());
        let cancel = CancellationToken::new();

        gateway.acquire_translator(&LanguagePair::new("fr", "en"), &cancel).await.unwrap();
        gateway.acquire_translator(&LanguagePair::new("fr", "en"), &cancel).await.unwrap();
        assert_eq!(platform.created(CapabilityKind::Translator), 1);

        gateway.acquire_translator(&LanguagePair::new("en", "fr"), &cancel).await.unwrap();
        assert_eq!(platform.created(CapabilityKind::Translator), 2);
    }

    #[tokio::test]
    async fn test_after_download_reports_progress_and_waits() {
        let platform = Arc::new(FakePlatform::new().after_download(CapabilityKind::Summarizer));
        let events = EventEmitter::new();
        let mut rx = events.subscribe();
        let gateway = CapabilityGateway::new(platform.clone(), events);

        let handle = gateway
            .acquire_summarizer(&SummarizerOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(handle.summarize("some text").await.is_ok());

        match rx.recv().await.unwrap() {
            ChatEvent::DownloadProgress(progress) => {
                assert_eq!(progress.kind, CapabilityKind::Summarizer);
                assert_eq!(progress.loaded, progress.total);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_during_download_propagates_cancelled() {
        let platform = FakePlatform::new()
            .after_download(CapabilityKind::Translator)
            .hold_downloads();
        let (_, gateway) = gateway(platform);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            canceller.cancel();
        });

        let err = gateway
            .acquire_translator(&LanguagePair::new("fr", "en"), &cancel)
            .await
            .err()
            .unwrap();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_handle_operation_is_cancellable() {
        let (_, gateway) = gateway(FakePlatform::new());
        let cancel = CancellationToken::new();
        let handle = gateway
            .acquire_translator(&LanguagePair::new("fr", "en"), &cancel)
            .await
            .unwrap();

        cancel.cancel();
        let err = handle.translate("Bonjour").await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
