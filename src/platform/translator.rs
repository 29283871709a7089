//! Translator backed by the public Google translate endpoint.

use async_trait::async_trait;
use tracing::{debug, error};

use crate::core::capability::{CapabilityInstance, Translator};
use crate::shared::error::{AppError, AppResult};
use crate::shared::settings::TranslationSettings;
use crate::shared::types::LanguagePair;

/// Translates one fixed language pair over HTTP.
pub struct HttpTranslator {
    client: reqwest::Client,
    settings: TranslationSettings,
    pair: LanguagePair,
}

impl HttpTranslator {
    pub fn new(client: reqwest::Client, settings: TranslationSettings, pair: LanguagePair) -> Self {
        Self {
            client,
            settings,
            pair,
        }
    }

    fn request_url(&self, text: &str) -> String {
        format!(
            "{}?client=gtx&sl={}&tl={}&dt=t&q={}",
            self.settings.endpoint,
            self.pair.source_language,
            self.pair.target_language,
            urlencoding::encode(text)
        )
    }
}

/// Concatenate the translated segments of a `translate_a/single` response.
///
/// The body is a nested array whose first element lists
/// `[translated, original, ...]` segments.
pub fn parse_translation(json: &serde_json::Value) -> Option<String> {
    let segments = json.get(0)?.as_array()?;
    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(|v| v.as_str()))
        .collect();
    (!translated.is_empty()).then_some(translated)
}

impl CapabilityInstance for HttpTranslator {}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str) -> AppResult<String> {
        debug!(
            source = %self.pair.source_language,
            target = %self.pair.target_language,
            chars = text.chars().count(),
            "requesting translation"
        );

        let response = self
            .client
            .get(self.request_url(text))
            .header("User-Agent", &self.settings.user_agent)
            .send()
            .await?;

        if !response.status().is_success() {
            error!(status = %response.status(), "translation API returned error");
            return Err(AppError::Network(format!(
                "Translation API error: {}",
                response.status()
            )));
        }

        let json: serde_json::Value = response.json().await?;
        parse_translation(&json).ok_or_else(|| {
            AppError::Capability("Failed to parse translation API response".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_joins_segments() {
        let body = json!([
            [["Hello ", "Bonjour ", null], ["world", "le monde", null]],
            null,
            "fr"
        ]);
        assert_eq!(parse_translation(&body).as_deref(), Some("Hello world"));
    }

    #[test]
    fn test_parse_rejects_unexpected_shapes() {
        assert_eq!(parse_translation(&json!({"error": "quota"})), None);
        assert_eq!(parse_translation(&json!([[]])), None);
        assert_eq!(parse_translation(&json!([[[null]]])), None);
    }

    #[test]
    fn test_request_url_encodes_text() {
        let translator = HttpTranslator::new(
            reqwest::Client::new(),
            TranslationSettings::default(),
            LanguagePair::new("fr", "en"),
        );
        let url = translator.request_url("le café & co");
        assert!(url.starts_with("https://translate.googleapis.com/translate_a/single?client=gtx"));
        assert!(url.contains("&sl=fr&tl=en&"));
        assert!(url.ends_with("q=le%20caf%C3%A9%20%26%20co"));
    }
}
