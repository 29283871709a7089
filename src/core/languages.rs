//! Language codes offered in the target-language picker.

use isolang::Language;

pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("zh", "Chinese"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("ru", "Russian"),
    ("ar", "Arabic"),
    ("hi", "Hindi"),
];

/// Parse a two-letter (or three-letter) code, ignoring case and region tags.
pub fn parse_language(code: &str) -> Option<Language> {
    let base = code.split(['-', '_']).next()?.trim().to_ascii_lowercase();
    Language::from_639_1(&base).or_else(|| Language::from_639_3(&base))
}

/// Canonical short code for `code` (`"FR-ca"` → `"fr"`).
pub fn normalize_code(code: &str) -> Option<String> {
    let lang = parse_language(code)?;
    Some(
        lang.to_639_1()
            .map(|c| c.to_string())
            .unwrap_or_else(|| lang.to_639_3().to_string()),
    )
}

/// Display name for a language code, falling back to the code itself.
pub fn language_name(code: &str) -> String {
    if let Some((_, name)) = SUPPORTED_LANGUAGES.iter().find(|(c, _)| *c == code) {
        return name.to_string();
    }
    parse_language(code)
        .map(|lang| lang.to_name().to_string())
        .unwrap_or_else(|| code.to_string())
}
