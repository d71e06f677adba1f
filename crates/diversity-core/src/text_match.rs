//! Locating backend match text inside the original document
//!
//! The backend returns tokenized text ("the cat , sat") while documents keep
//! their original spacing ("the cat, sat"). All offsets are byte offsets.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SPACE_BEFORE_CLOSING: Regex = Regex::new(r"\s+([,.;:!?)\]}])").unwrap();
}

const SPACE_AFTER: &[char] = &[',', '.', ';', ':', '!', '?', '(', '[', '{'];
const LONE_PUNCTUATION: &[char] = &[',', '.', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}'];

/// Next word of a chain must start within this many bytes of the previous one
pub const MAX_WORD_GAP: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMatch {
    pub start: usize,
    pub end: usize,
}

/// Undo tokenizer spacing: no space before closing punctuation, one space
/// after punctuation, single spaces, trimmed.
pub fn normalize_tokenized_text(text: &str) -> String {
    let tightened = SPACE_BEFORE_CLOSING.replace_all(text, "$1");

    let mut spaced = String::with_capacity(tightened.len() + 8);
    let mut chars = tightened.chars().peekable();
    while let Some(c) = chars.next() {
        spaced.push(c);
        if SPACE_AFTER.contains(&c) && !chars.peek().is_some_and(|n| n.is_whitespace()) {
            spaced.push(' ');
        }
    }

    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Find `search` in `source`, tolerating spacing differences.
///
/// Tries an exact match, then the normalized form, and only then chains the
/// words of `search` with at most [`MAX_WORD_GAP`] bytes between word starts.
/// The first two strategies report the first occurrence only.
pub fn find_with_variable_spacing(source: &str, search: &str) -> Vec<TextMatch> {
    if source.is_empty() || search.is_empty() {
        return Vec::new();
    }

    if let Some(start) = source.find(search) {
        return vec![TextMatch {
            start,
            end: start + search.len(),
        }];
    }

    let normalized = normalize_tokenized_text(search);
    if !normalized.is_empty() {
        if let Some(start) = source.find(&normalized) {
            return vec![TextMatch {
                start,
                end: start + normalized.len(),
            }];
        }
    }

    word_chain_matches(source, search)
}

fn word_chain_matches(source: &str, search: &str) -> Vec<TextMatch> {
    let words: Vec<&str> = search
        .split_whitespace()
        .filter(|w| !(w.chars().count() == 1 && w.chars().all(|c| LONE_PUNCTUATION.contains(&c))))
        .collect();

    let Some((first, rest)) = words.split_first() else {
        return Vec::new();
    };

    let mut found = Vec::new();
    let mut from = 0;
    while let Some(offset) = source[from..].find(first) {
        let start = from + offset;

        let mut current = start;
        let mut previous_len = first.len();
        let mut matched = true;
        for word in rest {
            let after = current + previous_len;
            match source[after..].find(word) {
                Some(o) if after + o - current <= MAX_WORD_GAP => {
                    current = after + o;
                    previous_len = word.len();
                }
                _ => {
                    matched = false;
                    break;
                }
            }
        }

        if matched {
            found.push(TextMatch {
                start,
                end: current + previous_len,
            });
        }

        // step one character past this occurrence
        from = start + source[start..].chars().next().map_or(1, char::len_utf8);
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_tokenized() {
        assert_eq!(normalize_tokenized_text("the cat , sat ."), "the cat, sat.");
        assert_eq!(normalize_tokenized_text("a ( b ) c"), "a ( b) c");
        assert_eq!(normalize_tokenized_text("yes,no"), "yes, no");
        assert_eq!(normalize_tokenized_text("  many   spaces  "), "many spaces");
        assert_eq!(normalize_tokenized_text(""), "");
    }

    #[test]
    fn test_exact_match_first() {
        let found = find_with_variable_spacing("the cat sat, the cat sat", "cat sat");
        assert_eq!(found, vec![TextMatch { start: 4, end: 11 }]);
    }

    #[test]
    fn test_normalized_match() {
        let source = "Well, the cat sat.";
        let found = find_with_variable_spacing(source, "the cat sat .");
        assert_eq!(found.len(), 1);
        assert_eq!(&source[found[0].start..found[0].end], "the cat sat.");
    }

    #[test]
    fn test_word_chain_with_gap_limit() {
        let source = "big -- red dog and big                    red dog";
        let found = find_with_variable_spacing(source, "big red");
        assert_eq!(found, vec![TextMatch { start: 0, end: 10 }]);
    }

    #[test]
    fn test_word_chain_skips_lone_punctuation() {
        let source = "we went home;then slept";
        let found = find_with_variable_spacing(source, "home ; slept");
        assert_eq!(found.len(), 1);
        assert_eq!(&source[found[0].start..found[0].end], "home;then slept");
    }

    #[test]
    fn test_multibyte_source() {
        let source = "caf\u{e9} cr\u{e8}me br\u{fb}l\u{e9}e";
        let found = find_with_variable_spacing(source, "cr\u{e8}me  br\u{fb}l\u{e9}e");
        assert_eq!(found.len(), 1);
        assert!(source.is_char_boundary(found[0].start));
        assert!(source.is_char_boundary(found[0].end));
    }

    #[test]
    fn test_no_match() {
        assert!(find_with_variable_spacing("abc", "xyz").is_empty());
        assert!(find_with_variable_spacing("abc", "").is_empty());
    }
}
