//! Script and stop-word language detection.

use async_trait::async_trait;
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

use crate::core::capability::{CapabilityInstance, LanguageDetector};
use crate::shared::error::AppResult;
use crate::shared::types::DetectionCandidate;

/// Frequent function words per Latin-script language.
const STOP_WORDS: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "the", "and", "is", "are", "was", "of", "to", "in", "it", "you", "that", "this",
            "with", "for", "on", "have", "not", "hello", "world", "what", "my",
        ],
    ),
    (
        "fr",
        &[
            "le", "la", "les", "et", "est", "un", "une", "des", "du", "je", "vous", "nous", "pas",
            "que", "qui", "dans", "pour", "avec", "bonjour", "monde", "merci", "ce", "sont",
        ],
    ),
    (
        "es",
        &[
            "el", "la", "los", "las", "y", "es", "un", "una", "que", "del", "hola", "gracias",
            "por", "con", "para", "amigo", "muy", "pero", "yo", "está", "como",
        ],
    ),
    (
        "de",
        &[
            "der", "die", "das", "und", "ist", "nicht", "ein", "eine", "ich", "du", "mit", "guten",
            "tag", "danke", "zu", "sie", "auf", "wir", "für", "auch", "welt",
        ],
    ),
    (
        "it",
        &[
            "il", "lo", "gli", "e", "è", "che", "di", "non", "ciao", "grazie", "sono", "per",
            "buongiorno", "una", "della", "questo", "come", "mondo", "anche",
        ],
    ),
    (
        "pt",
        &[
            "o", "os", "as", "não", "olá", "obrigado", "obrigada", "com", "uma", "para", "mundo",
            "você", "muito", "mas", "está", "dos", "das", "em", "bom",
        ],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Script {
    Han,
    Kana,
    Hangul,
    Arabic,
    Cyrillic,
    Devanagari,
    Latin,
    Other,
}

fn script_of(c: char) -> Script {
    match c {
        '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' => Script::Han,
        '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' => Script::Kana,
        '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}' => Script::Hangul,
        '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}' => Script::Arabic,
        '\u{0400}'..='\u{04FF}' => Script::Cyrillic,
        '\u{0900}'..='\u{097F}' => Script::Devanagari,
        c if c.is_ascii_alphabetic() => Script::Latin,
        '\u{00C0}'..='\u{024F}' => Script::Latin,
        _ => Script::Other,
    }
}

/// Language of a non-Latin script, if the script maps to one.
fn script_language(script: Script, has_kana: bool) -> Option<&'static str> {
    match script {
        // Kanji mixed with kana is Japanese.
        Script::Han if has_kana => Some("ja"),
        Script::Han => Some("zh"),
        Script::Kana => Some("ja"),
        Script::Hangul => Some("ko"),
        Script::Arabic => Some("ar"),
        Script::Cyrillic => Some("ru"),
        Script::Devanagari => Some("hi"),
        Script::Latin | Script::Other => None,
    }
}

/// Rank candidate languages for `text`, most likely first.
///
/// Text dominated by a non-Latin script yields one candidate for that
/// script. Latin text is scored by the share of its words that are stop
/// words of each language. No evidence yields no candidates.
pub fn detect_candidates(text: &str) -> Vec<DetectionCandidate> {
    let mut scripts: HashMap<Script, usize> = HashMap::new();
    let mut letters = 0usize;
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        *scripts.entry(script_of(c)).or_default() += 1;
    }
    if letters == 0 {
        return Vec::new();
    }

    let has_kana = scripts.contains_key(&Script::Kana);
    let dominant = scripts
        .iter()
        .filter(|(script, _)| **script != Script::Other)
        .max_by_key(|(_, count)| **count)
        .map(|(script, count)| (*script, *count));

    if let Some((script, count)) = dominant {
        if let Some(language) = script_language(script, has_kana) {
            // Japanese mixes kanji and kana, both count towards it.
            let count = if language == "ja" {
                scripts.get(&Script::Kana).copied().unwrap_or(0)
                    + scripts.get(&Script::Han).copied().unwrap_or(0)
            } else {
                count
            };
            return vec![DetectionCandidate {
                language: language.to_string(),
                confidence: (count as f32 / letters as f32).min(1.0),
            }];
        }
    }

    latin_candidates(text)
}

fn latin_candidates(text: &str) -> Vec<DetectionCandidate> {
    let words: Vec<String> = text.unicode_words().map(|w| w.to_lowercase()).collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut candidates: Vec<DetectionCandidate> = STOP_WORDS
        .iter()
        .filter_map(|(language, stop_words)| {
            let hits = words
                .iter()
                .filter(|w| stop_words.contains(&w.as_str()))
                .count();
            (hits > 0).then(|| DetectionCandidate {
                language: language.to_string(),
                confidence: hits as f32 / words.len() as f32,
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates
}

/// Local detector backed by [`detect_candidates`].
#[derive(Debug, Default)]
pub struct HeuristicDetector;

impl CapabilityInstance for HeuristicDetector {}

#[async_trait]
impl LanguageDetector for HeuristicDetector {
    async fn detect(&self, text: &str) -> AppResult<Vec<DetectionCandidate>> {
        Ok(detect_candidates(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top(text: &str) -> Option<String> {
        detect_candidates(text).into_iter().next().map(|c| c.language)
    }

    #[test]
    fn test_latin_stop_words() {
        assert_eq!(top("Bonjour le monde").as_deref(), Some("fr"));
        assert_eq!(top("Hola amigo, muchas gracias por todo").as_deref(), Some("es"));
        assert_eq!(top("Guten Tag, ich bin nicht hier").as_deref(), Some("de"));
        assert_eq!(top("The cat is on the table").as_deref(), Some("en"));
    }

    #[test]
    fn test_non_latin_scripts() {
        assert_eq!(top("你好世界").as_deref(), Some("zh"));
        assert_eq!(top("こんにちは世界").as_deref(), Some("ja"));
        assert_eq!(top("안녕하세요").as_deref(), Some("ko"));
        assert_eq!(top("مرحبا بالعالم").as_deref(), Some("ar"));
        assert_eq!(top("Привет мир").as_deref(), Some("ru"));
        assert_eq!(top("नमस्ते दुनिया").as_deref(), Some("hi"));
    }

    #[test]
    fn test_candidates_are_sorted_by_confidence() {
        let candidates = detect_candidates("la casa de la familia es muy grande y bonita");
        assert!(candidates.len() > 1);
        assert!(candidates
            .windows(2)
            .all(|pair| pair[0].confidence >= pair[1].confidence));
        assert_eq!(candidates[0].language, "es");
    }

    #[test]
    fn test_no_evidence_yields_nothing() {
        assert!(detect_candidates("").is_empty());
        assert!(detect_candidates("12345 !!!").is_empty());
        assert!(detect_candidates("zzzz qqqq").is_empty());
    }

    #[tokio::test]
    async fn test_detector_instance() {
        let detector = HeuristicDetector;
        let candidates = detector.detect("Bonjour le monde").await.unwrap();
        assert_eq!(candidates[0].language, "fr");
        assert!(candidates[0].confidence > 0.5);
    }
}
