//! Display-safe excerpt extraction.
//!
//! Produces a short excerpt from a chunk's raw text that starts at a word
//! boundary, ends at a sentence or whitespace boundary, and never cuts a
//! URL in half. All offsets are in characters so multi-byte text behaves
//! the same as ASCII.

use once_cell::sync::Lazy;
use regex::Regex;

/// Window of text considered for the excerpt.
const WINDOW: usize = 600;
/// Earliest offset at which the excerpt may end.
const MIN_CUT: usize = 200;
/// Hard cut when no sentence or whitespace boundary is found.
const HARD_CUT: usize = 400;
/// How far past the cut point to look when completing a URL.
const LOOKAHEAD: usize = 200;

static TRUNCATED_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]{2,}\b").unwrap());
static TRAILING_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S*$").unwrap());
static NEXT_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S+").unwrap());
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static LINK_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:link|链接)[:：]\s*$").unwrap());
static LEADING_SHORT_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z]{1,3}\b\s+").unwrap());

fn is_sentence_terminal(c: char) -> bool {
    matches!(c, '。' | '！' | '？' | '!' | '?' | '.')
}

fn slice(chars: &[char], start: usize, end: usize) -> String {
    let start = start.min(chars.len());
    let end = end.min(chars.len());
    chars[start..end].iter().collect()
}

/// Extract a display excerpt from chunk text.
///
/// The excerpt is a prefix of the (trimmed) input, at most ~800 characters:
/// a 600-char window, adjusted to skip a truncated leading word, cut at the
/// first sentence-terminal past offset 200 (else the last whitespace before
/// 400, else 400), then repaired so a trailing URL is never left half-cut.
pub fn extract_snippet(raw_text: &str) -> String {
    let raw = raw_text.trim();
    if raw.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = raw.chars().collect();
    let mut start = 0usize;
    let mut head = slice(&chars, start, start + WINDOW);

    // A window starting mid-word looks like "ture of the system..."; skip
    // past the first space when it is close enough to the start.
    if TRUNCATED_WORD.is_match(&head) {
        if let Some(sp) = head.chars().position(|c| c == ' ') {
            if sp <= 40 {
                start += sp + 1;
                head = slice(&chars, start, start + WINDOW);
            }
        }
    }

    let head_chars: Vec<char> = head.chars().collect();
    let end_rel = if head_chars.len() > MIN_CUT {
        match head_chars[MIN_CUT..]
            .iter()
            .position(|&c| is_sentence_terminal(c))
        {
            Some(pos) => MIN_CUT + pos + 1,
            None => {
                let cut = head_chars.len().min(HARD_CUT);
                (MIN_CUT..cut)
                    .rev()
                    .find(|&i| head_chars[i] == ' ')
                    .unwrap_or(cut)
            }
        }
    } else {
        head_chars.len()
    };

    let end = start + end_rel;
    let mut snippet = slice(&chars, start, end).trim_end().to_string();
    let tail = slice(&chars, end, end + LOOKAHEAD);

    // The cut may have landed inside a URL; consume the rest of the
    // unbroken token so the link stays usable.
    if TRAILING_URL.is_match(&snippet) {
        if let Some(more) = NEXT_TOKEN.find(&tail) {
            snippet.push_str(more.as_str());
        }
    }

    // A dangling "link:" label gets its URL back if one follows shortly.
    if LINK_LABEL.is_match(&snippet) {
        if let Some(url) = URL.find(&tail) {
            snippet.push(' ');
            snippet.push_str(url.as_str());
        }
    }

    LEADING_SHORT_WORD.replace(&snippet, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Filler prose with no sentence-terminal characters. Starts with an
    /// uppercase word so the truncated-leading-word adjustment stays off.
    fn filler(target_chars: usize) -> String {
        let mut s = String::new();
        while s.chars().count() < target_chars {
            s.push_str("Observations gathered across many staging runs kept flowing ");
        }
        s.chars().take(target_chars).collect()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract_snippet(""), "");
        assert_eq!(extract_snippet("   \n "), "");
    }

    #[test]
    fn test_short_text_returned_whole() {
        let text = "Short summary paragraph without much content";
        assert_eq!(extract_snippet(text), text);
    }

    #[test]
    fn test_cuts_at_sentence_terminal_after_min_offset() {
        // first '.' appears at offset 250; cut lands right after it
        let mut text = filler(250);
        text.push_str(". Everything after this sentence should be dropped from the excerpt");
        let snippet = extract_snippet(&text);
        assert!(snippet.ends_with('.'));
        assert_eq!(snippet.chars().count(), 251);
    }

    #[test]
    fn test_cuts_at_last_space_without_terminal() {
        let text = filler(550);
        let snippet = extract_snippet(&text);
        let n = snippet.chars().count();
        assert!(n <= HARD_CUT);
        assert!(n >= MIN_CUT);
        assert!(!snippet.ends_with(' '));
    }

    #[test]
    fn test_skips_truncated_leading_word() {
        // starts mid-word, as overlap-window chunks often do
        let mut text = String::from("ture of the pipeline was reworked during the migration ");
        text.push_str(&filler(400));
        let snippet = extract_snippet(&text);
        assert!(snippet.starts_with("the pipeline"));
    }

    #[test]
    fn test_never_splits_url() {
        // the URL's first '.' is the first sentence-terminal in the window,
        // so a naive cut would end at "https://example."
        let mut text = filler(560);
        text.push_str("details: https://example.com/a/b/c plus trailing words here");
        let snippet = extract_snippet(&text);
        assert!(snippet.contains("https://example.com/a/b/c"));
    }

    #[test]
    fn test_completes_link_label() {
        // no sentence terminal anywhere, so the cut falls on the space
        // right after the label; the URL itself is dot-free
        let mut text = filler(385);
        text.push_str(" link: https://localhost/internal-docs");
        let snippet = extract_snippet(&text);
        assert!(!snippet.trim_end().ends_with("link:"));
        assert!(snippet.contains("https://localhost/internal-docs"));
    }

    #[test]
    fn test_strips_short_leading_word() {
        let text = format!("As {}", filler(300));
        let snippet = extract_snippet(&text);
        assert!(snippet.starts_with("Observations"));
    }

    #[test]
    fn test_length_bounded() {
        let mut text = filler(560);
        text.push_str("https://example.com/");
        text.push_str(&"x".repeat(500));
        let snippet = extract_snippet(&text);
        assert!(snippet.chars().count() <= 800);
    }

    #[test]
    fn test_cjk_sentence_terminal() {
        let mut text = "很".repeat(240);
        text.push('。');
        text.push_str(&"多".repeat(100));
        let snippet = extract_snippet(&text);
        assert!(snippet.ends_with('。'));
        assert_eq!(snippet.chars().count(), 241);
    }
}
