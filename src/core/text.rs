/// Count words by splitting on runs of whitespace.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Whether a message body is long enough to be worth summarizing.
pub fn is_summarizable(text: &str, min_words: usize) -> bool {
    word_count(text) > min_words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_collapses_whitespace() {
        assert_eq!(word_count("  hello \n\t world  "), 2);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
    }

    #[test]
    fn test_summarizable_threshold_is_strict() {
        let exactly = vec!["word"; 150].join(" ");
        let over = vec!["word"; 151].join(" ");
        assert!(!is_summarizable(&exactly, 150));
        assert!(is_summarizable(&over, 150));
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(" \n\t"));
        assert!(!is_blank(" a "));
    }
}
