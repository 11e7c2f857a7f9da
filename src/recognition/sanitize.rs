//! Transcript text sanitization.
//!
//! ASR output picks up stray control characters, emoji, and model artifacts.
//! Cue text is filtered through an explicit allow-list of character classes;
//! anything outside it is deleted, not replaced.

/// Permitted Unicode ranges (inclusive): CJK ideographs, Hiragana, Katakana,
/// and Hangul syllables.
const ALLOWED_RANGES: &[(char, char)] = &[
    ('\u{4e00}', '\u{9fff}'),
    ('\u{3040}', '\u{309f}'),
    ('\u{30a0}', '\u{30ff}'),
    ('\u{ac00}', '\u{d7af}'),
];

/// Permitted punctuation: common ASCII marks plus full-width CJK marks.
const ALLOWED_PUNCTUATION: &str =
    ".,!@#$%^&*()_+-=[]{};'\"\\|<>/?，。！｛｝【】；‘’“”《》、（）￥";

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || ALLOWED_RANGES.iter().any(|&(lo, hi)| c >= lo && c <= hi)
        || ALLOWED_PUNCTUATION.contains(c)
}

/// Delete every character outside the allow-list.
pub fn sanitize(text: &str) -> String {
    text.chars().filter(|&c| is_allowed(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_cjk_and_latin() {
        assert_eq!(sanitize("你好 world 123"), "你好 world 123");
        assert_eq!(sanitize("ひらがなカタカナ한국어"), "ひらがなカタカナ한국어");
    }

    #[test]
    fn test_keeps_listed_punctuation() {
        assert_eq!(sanitize("好的，再见。OK!"), "好的，再见。OK!");
        assert_eq!(sanitize("a-b_c(d)"), "a-b_c(d)");
    }

    #[test]
    fn test_deletes_everything_else() {
        assert_eq!(sanitize("hi🎉there"), "hithere");
        assert_eq!(sanitize("a\u{0000}b\u{fffd}c"), "abc");
        // Arrows, box drawing, etc.
        assert_eq!(sanitize("→║•"), "");
    }

    #[test]
    fn test_deleted_not_replaced() {
        // No spaces or placeholders appear where characters were removed.
        assert_eq!(sanitize("ab🎉🎉cd"), "abcd");
    }

    #[test]
    fn test_whitespace_preserved() {
        assert_eq!(sanitize("a b\tc\nd"), "a b\tc\nd");
    }
}
