//! Extractive summarizer: keeps the sentences that carry the text's most
//! frequent words, in their original order.

use async_trait::async_trait;
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

use crate::core::capability::{CapabilityInstance, Summarizer};
use crate::shared::error::{AppError, AppResult};
use crate::shared::types::{SummarizerOptions, SummaryFormat, SummaryLength, SummaryType};

/// Words shorter than this are ignored when scoring sentences.
const MIN_SIGNIFICANT_LEN: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractiveSummarizer {
    options: SummarizerOptions,
}

impl ExtractiveSummarizer {
    pub fn new(options: SummarizerOptions) -> Self {
        Self { options }
    }

    fn sentence_budget(&self) -> usize {
        match (self.options.kind, self.options.length) {
            (SummaryType::KeyPoints, SummaryLength::Short) => 3,
            (SummaryType::KeyPoints, SummaryLength::Medium) => 5,
            (SummaryType::KeyPoints, SummaryLength::Long) => 7,
            (SummaryType::Headline, _) => 1,
            (_, SummaryLength::Short) => 1,
            (_, SummaryLength::Medium) => 3,
            (_, SummaryLength::Long) => 5,
        }
    }

    fn headline_words(&self) -> usize {
        match self.options.length {
            SummaryLength::Short => 12,
            SummaryLength::Medium => 17,
            SummaryLength::Long => 22,
        }
    }

    /// Summarize synchronously.
    pub fn summarize_text(&self, text: &str) -> AppResult<String> {
        let sentences: Vec<&str> = text
            .unicode_sentences()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if sentences.is_empty() {
            return Err(AppError::Capability("Nothing to summarize".to_string()));
        }

        let budget = self.sentence_budget().min(sentences.len());
        let picked = match self.options.kind {
            // A teaser leads in, it does not condense.
            SummaryType::Teaser => sentences[..budget].to_vec(),
            _ => top_sentences(&sentences, budget),
        };

        Ok(match (self.options.kind, self.options.format) {
            (SummaryType::Headline, _) => {
                let words: Vec<&str> = picked[0].split_whitespace().collect();
                let cap = self.headline_words();
                if words.len() > cap {
                    format!("{}…", words[..cap].join(" "))
                } else {
                    words.join(" ")
                }
            }
            (SummaryType::KeyPoints, SummaryFormat::Markdown) => picked
                .iter()
                .map(|s| format!("- {}", s))
                .collect::<Vec<_>>()
                .join("\n"),
            (SummaryType::KeyPoints, SummaryFormat::PlainText) => picked.join("\n"),
            _ => picked.join(" "),
        })
    }
}

/// The `budget` highest-scoring sentences, kept in document order.
fn top_sentences<'a>(sentences: &[&'a str], budget: usize) -> Vec<&'a str> {
    let mut frequency: HashMap<String, usize> = HashMap::new();
    for word in sentences.iter().flat_map(|s| s.unicode_words()) {
        if word.chars().count() >= MIN_SIGNIFICANT_LEN {
            *frequency.entry(word.to_lowercase()).or_default() += 1;
        }
    }

    let mut scored: Vec<(usize, f32)> = sentences
        .iter()
        .enumerate()
        .map(|(i, sentence)| {
            let words: Vec<&str> = sentence.unicode_words().collect();
            let total: usize = words
                .iter()
                .filter_map(|w| frequency.get(&w.to_lowercase()))
                .sum();
            let score = if words.is_empty() {
                0.0
            } else {
                total as f32 / words.len() as f32
            };
            (i, score)
        })
        .collect();

    // Ties go to the earlier sentence.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut keep: Vec<usize> = scored.into_iter().take(budget).map(|(i, _)| i).collect();
    keep.sort_unstable();
    keep.into_iter().map(|i| sentences[i]).collect()
}

impl CapabilityInstance for ExtractiveSummarizer {}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, text: &str) -> AppResult<String> {
        self.summarize_text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Rust is a systems programming language. \
        The weather was pleasant yesterday. \
        Rust programs are compiled ahead of time. \
        Many programmers enjoy Rust because Rust programs are fast. \
        Lunch was served at noon.";

    fn summarizer(kind: SummaryType, length: SummaryLength, format: SummaryFormat) -> ExtractiveSummarizer {
        ExtractiveSummarizer::new(SummarizerOptions { kind, length, format })
    }

    #[test]
    fn test_key_points_markdown() {
        let summary = summarizer(SummaryType::KeyPoints, SummaryLength::Short, SummaryFormat::Markdown)
            .summarize_text(TEXT)
            .unwrap();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.starts_with("- ")));
        assert!(summary.contains("Rust"));
        assert!(!summary.contains("Lunch"));
    }

    #[test]
    fn test_selected_sentences_keep_document_order() {
        let summary = summarizer(SummaryType::Tldr, SummaryLength::Medium, SummaryFormat::PlainText)
            .summarize_text(TEXT)
            .unwrap();
        let first = summary.find("compiled").unwrap();
        let second = summary.find("Many programmers").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_teaser_uses_opening() {
        let summary = summarizer(SummaryType::Teaser, SummaryLength::Short, SummaryFormat::PlainText)
            .summarize_text(TEXT)
            .unwrap();
        assert_eq!(summary, "Rust is a systems programming language.");
    }

    #[test]
    fn test_headline_is_capped() {
        let long = vec!["word"; 40].join(" ");
        let summary = summarizer(SummaryType::Headline, SummaryLength::Short, SummaryFormat::PlainText)
            .summarize_text(&long)
            .unwrap();
        assert_eq!(summary.split_whitespace().count(), 12);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn test_empty_text_fails() {
        let err = ExtractiveSummarizer::default().summarize_text("   ").unwrap_err();
        assert!(matches!(err, AppError::Capability(_)));
    }
}
