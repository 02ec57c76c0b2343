//! Slug text helpers.

use deunicode::deunicode;

/// Maximum slug length in bytes.
const MAX_SLUG_LEN: usize = 190;

/// Convert text into a URL-safe slug.
///
/// Lowercases, keeps Unicode alphanumerics (so CJK titles still yield a
/// usable token), replaces everything else with hyphens, collapses
/// consecutive hyphens, and trims leading/trailing hyphens.
pub fn slugify(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_was_hyphen = true; // Start true to skip leading hyphens
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            result.push(c);
            prev_was_hyphen = false;
        } else if !prev_was_hyphen {
            result.push('-');
            prev_was_hyphen = true;
        }
    }

    while result.ends_with('-') {
        result.pop();
    }

    if result.len() > MAX_SLUG_LEN {
        let mut end = MAX_SLUG_LEN;
        while end > 0 && !result.is_char_boundary(end) {
            end -= 1;
        }
        // Find a clean break point (don't cut in middle of word)
        let truncated = &result[..end];
        if let Some(last_hyphen) = truncated.rfind('-') {
            return truncated[..last_hyphen].to_string();
        }
        return truncated.to_string();
    }

    result
}

/// Strip accents and transliterate to ASCII.
///
/// Used as the fallback when no translation was produced: kana become
/// romaji, accented Latin letters lose their diacritics. Characters with
/// no reasonable ASCII form are dropped.
pub fn romanize(text: &str) -> String {
    deunicode(text)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Monthly Meeting Notes"), "monthly-meeting-notes");
    }

    #[test]
    fn slugify_special_chars() {
        assert_eq!(slugify("What's New?"), "what-s-new");
        assert_eq!(slugify("Notice #42: Sports Day"), "notice-42-sports-day");
    }

    #[test]
    fn slugify_keeps_unicode_alphanumerics() {
        assert_eq!(slugify("会議"), "会議");
        assert_eq!(slugify("ward-1 連絡"), "ward-1-連絡");
    }

    #[test]
    fn slugify_consecutive_and_edges() {
        assert_eq!(slugify("a---b"), "a-b");
        assert_eq!(slugify("  hello  "), "hello");
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn slugify_symbols_only_is_empty() {
        assert_eq!(slugify("!!??//"), "");
    }

    #[test]
    fn slugify_bounded_length() {
        let long = "a".repeat(400);
        assert!(slugify(&long).len() <= MAX_SLUG_LEN);
        // Multibyte input must not be cut mid-character.
        let cjk = "会".repeat(200);
        let slug = slugify(&cjk);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(slug.chars().all(|c| c == '会'));
    }

    #[test]
    fn romanize_strips_accents() {
        assert_eq!(romanize("café"), "cafe");
        assert_eq!(romanize("Übung"), "Ubung");
    }

    #[test]
    fn romanize_transliterates_kana() {
        let out = romanize("かいぎ");
        assert!(out.is_ascii());
        assert!(!out.is_empty());
    }
}
