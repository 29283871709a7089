//! Local capability providers.
//!
//! Everything is readily available: detection and summarization run in
//! process, translation goes through the configured HTTP endpoint.

pub mod detection;
pub mod summarizer;
pub mod translator;

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::capability::{
    CapabilityPlatform, LanguageDetector, ProgressMonitor, Summarizer, Translator,
};
use crate::core::languages::normalize_code;
use crate::shared::error::AppResult;
use crate::shared::settings::TranslationSettings;
use crate::shared::types::{
    Availability, CapabilityKind, CapabilityOptions, LanguagePair, SummarizerOptions,
};

pub use detection::HeuristicDetector;
pub use summarizer::ExtractiveSummarizer;
pub use translator::HttpTranslator;

pub struct LocalPlatform {
    client: reqwest::Client,
    translation: TranslationSettings,
}

impl LocalPlatform {
    pub fn new(translation: TranslationSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            translation,
        }
    }
}

/// A pair is translatable when both sides are known codes and differ.
fn pair_available(pair: &LanguagePair) -> bool {
    match (
        normalize_code(&pair.source_language),
        normalize_code(&pair.target_language),
    ) {
        (Some(source), Some(target)) => source != target,
        _ => false,
    }
}

#[async_trait]
impl CapabilityPlatform for LocalPlatform {
    fn supports(&self, _kind: CapabilityKind) -> bool {
        true
    }

    async fn availability(&self, options: &CapabilityOptions) -> AppResult<Availability> {
        Ok(match options {
            CapabilityOptions::Translator(pair) if !pair_available(pair) => Availability::No,
            _ => Availability::Readily,
        })
    }

    async fn create_detector(
        &self,
        _monitor: Option<ProgressMonitor>,
    ) -> AppResult<Arc<dyn LanguageDetector>> {
        Ok(Arc::new(HeuristicDetector))
    }

    async fn create_summarizer(
        &self,
        options: &SummarizerOptions,
        _monitor: Option<ProgressMonitor>,
    ) -> AppResult<Arc<dyn Summarizer>> {
        Ok(Arc::new(ExtractiveSummarizer::new(*options)))
    }

    async fn create_translator(
        &self,
        pair: &LanguagePair,
        _monitor: Option<ProgressMonitor>,
    ) -> AppResult<Arc<dyn Translator>> {
        Ok(Arc::new(HttpTranslator::new(
            self.client.clone(),
            self.translation.clone(),
            pair.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_translator_availability() {
        let platform = LocalPlatform::new(TranslationSettings::default());
        let check = |s: &str, t: &str| CapabilityOptions::Translator(LanguagePair::new(s, t));

        assert_eq!(platform.availability(&check("fr", "en")).await.unwrap(), Availability::Readily);
        assert_eq!(platform.availability(&check("fr", "fr")).await.unwrap(), Availability::No);
        assert_eq!(platform.availability(&check("xx", "en")).await.unwrap(), Availability::No);
        assert_eq!(
            platform.availability(&CapabilityOptions::LanguageDetector).await.unwrap(),
            Availability::Readily
        );
    }

    #[tokio::test]
    async fn test_local_detection_and_summary() {
        let platform = LocalPlatform::new(TranslationSettings::default());
        let detector = platform.create_detector(None).await.unwrap();
        assert_eq!(detector.detect("Bonjour le monde").await.unwrap()[0].language, "fr");

        let summarizer = platform
            .create_summarizer(&SummarizerOptions::default(), None)
            .await
            .unwrap();
        let summary = summarizer.summarize("One sentence here. Another one there.").await.unwrap();
        assert!(summary.starts_with("- "));
    }
}
