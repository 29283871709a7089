//! Scripted capability platform for tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::capability::{
    CapabilityInstance, CapabilityPlatform, LanguageDetector, ProgressMonitor, Summarizer,
    Translator,
};
use super::text::word_count;
use crate::shared::error::{AppError, AppResult};
use crate::shared::types::{
    Availability, CapabilityKind, CapabilityOptions, DetectionCandidate, DownloadProgress,
    LanguagePair, SummarizerOptions,
};

#[derive(Default)]
struct Script {
    unsupported: HashSet<CapabilityKind>,
    after_download: HashSet<CapabilityKind>,
    hold_downloads: bool,
    unavailable_pairs: HashSet<(String, String)>,
    detections: HashMap<String, Vec<DetectionCandidate>>,
    translations: HashMap<(String, String, String), String>,
    failing: HashSet<CapabilityKind>,
    delays: HashMap<CapabilityKind, Duration>,
    created: HashMap<CapabilityKind, usize>,
    calls: HashMap<CapabilityKind, usize>,
}

type SharedScript = Arc<Mutex<Script>>;

#[derive(Clone, Default)]
pub struct FakePlatform {
    script: SharedScript,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn edit(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut self.script.lock().unwrap());
        self
    }

    pub fn without(self, kind: CapabilityKind) -> Self {
        self.edit(|s| {
            s.unsupported.insert(kind);
        })
    }

    pub fn after_download(self, kind: CapabilityKind) -> Self {
        self.edit(|s| {
            s.after_download.insert(kind);
        })
    }

    /// Instances created after a download never become ready.
    pub fn hold_downloads(self) -> Self {
        self.edit(|s| s.hold_downloads = true)
    }

    pub fn with_unavailable_pair(self, source: &str, target: &str) -> Self {
        self.edit(|s| {
            s.unavailable_pairs.insert((source.to_string(), target.to_string()));
        })
    }

    pub fn with_detection(self, text: &str, language: &str, confidence: f32) -> Self {
        self.with_candidates(text, &[(language, confidence)])
    }

    /// Candidates are returned in the given order.
    pub fn with_candidates(self, text: &str, candidates: &[(&str, f32)]) -> Self {
        let candidates = candidates
            .iter()
            .map(|(language, confidence)| DetectionCandidate {
                language: language.to_string(),
                confidence: *confidence,
            })
            .collect();
        self.edit(|s| {
            s.detections.insert(text.to_string(), candidates);
        })
    }

    pub fn with_translation(self, source: &str, target: &str, input: &str, output: &str) -> Self {
        self.edit(|s| {
            s.translations.insert(
                (source.to_string(), target.to_string(), input.to_string()),
                output.to_string(),
            );
        })
    }

    pub fn with_delay(self, kind: CapabilityKind, delay: Duration) -> Self {
        self.edit(|s| {
            s.delays.insert(kind, delay);
        })
    }

    pub fn set_failing(&self, kind: CapabilityKind, failing: bool) {
        let mut script = self.script.lock().unwrap();
        if failing {
            script.failing.insert(kind);
        } else {
            script.failing.remove(&kind);
        }
    }

    pub fn created(&self, kind: CapabilityKind) -> usize {
        *self.script.lock().unwrap().created.get(&kind).unwrap_or(&0)
    }

    pub fn calls(&self, kind: CapabilityKind) -> usize {
        *self.script.lock().unwrap().calls.get(&kind).unwrap_or(&0)
    }

    fn on_create(&self, kind: CapabilityKind, monitor: Option<ProgressMonitor>) -> bool {
        let hold = {
            let mut script = self.script.lock().unwrap();
            *script.created.entry(kind).or_default() += 1;
            script.hold_downloads
        };
        if let Some(monitor) = monitor {
            monitor(DownloadProgress {
                kind,
                loaded: 1024,
                total: 1024,
            });
            return hold;
        }
        false
    }
}

/// Shared behaviour of every fake instance: count, delay, maybe fail.
async fn invoke(script: &SharedScript, kind: CapabilityKind) -> AppResult<()> {
    let delay = {
        let mut s = script.lock().unwrap();
        *s.calls.entry(kind).or_default() += 1;
        s.delays.get(&kind).copied()
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if script.lock().unwrap().failing.contains(&kind) {
        return Err(AppError::Capability(format!("{} failed", kind)));
    }
    Ok(())
}

struct FakeInstance {
    script: SharedScript,
    hold: bool,
    pair: Option<LanguagePair>,
}

#[async_trait]
impl CapabilityInstance for FakeInstance {
    async fn ready(&self) -> AppResult<()> {
        if self.hold {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[async_trait]
impl LanguageDetector for FakeInstance {
    async fn detect(&self, text: &str) -> AppResult<Vec<DetectionCandidate>> {
        invoke(&self.script, CapabilityKind::LanguageDetector).await?;
        Ok(self
            .script
            .lock()
            .unwrap()
            .detections
            .get(text)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl Summarizer for FakeInstance {
    async fn summarize(&self, text: &str) -> AppResult<String> {
        invoke(&self.script, CapabilityKind::Summarizer).await?;
        Ok(format!("Summary of {} words", word_count(text)))
    }
}

#[async_trait]
impl Translator for FakeInstance {
    async fn translate(&self, text: &str) -> AppResult<String> {
        invoke(&self.script, CapabilityKind::Translator).await?;
        let pair = self.pair.clone().unwrap_or_else(|| LanguagePair::new("", ""));
        let key = (pair.source_language, pair.target_language.clone(), text.to_string());
        Ok(self
            .script
            .lock()
            .unwrap()
            .translations
            .get(&key)
            .cloned()
            .unwrap_or_else(|| format!("[{}] {}", pair.target_language, text)))
    }
}

#[async_trait]
impl CapabilityPlatform for FakePlatform {
    fn supports(&self, kind: CapabilityKind) -> bool {
        !self.script.lock().unwrap().unsupported.contains(&kind)
    }

    async fn availability(&self, options: &CapabilityOptions) -> AppResult<Availability> {
        let script = self.script.lock().unwrap();
        if let CapabilityOptions::Translator(pair) = options {
            let key = (pair.source_language.clone(), pair.target_language.clone());
            if script.unavailable_pairs.contains(&key) {
                return Ok(Availability::No);
            }
        }
        if script.after_download.contains(&options.kind()) {
            Ok(Availability::AfterDownload)
        } else {
            Ok(Availability::Readily)
        }
    }

    async fn create_detector(
        &self,
        monitor: Option<ProgressMonitor>,
    ) -> AppResult<Arc<dyn LanguageDetector>> {
        let hold = self.on_create(CapabilityKind::LanguageDetector, monitor);
        Ok(Arc::new(FakeInstance {
            script: self.script.clone(),
            hold,
            pair: None,
        }))
    }

    async fn create_summarizer(
        &self,
        _options: &SummarizerOptions,
        monitor: Option<ProgressMonitor>,
    ) -> AppResult<Arc<dyn Summarizer>> {
        let hold = self.on_create(CapabilityKind::Summarizer, monitor);
        Ok(Arc::new(FakeInstance {
            script: self.script.clone(),
            hold,
            pair: None,
        }))
    }

    async fn create_translator(
        &self,
        pair: &LanguagePair,
        monitor: Option<ProgressMonitor>,
    ) -> AppResult<Arc<dyn Translator>> {
        let hold = self.on_create(CapabilityKind::Translator, monitor);
        Ok(Arc::new(FakeInstance {
            script: self.script.clone(),
            hold,
            pair: Some(pair.clone()),
        }))
    }
}
