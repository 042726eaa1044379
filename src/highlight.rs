//! Fuzzy relocation and highlighting of LLM-quoted evidence phrases.
//!
//! The LLM quotes a short literal excerpt from text that was scraped from a
//! page render that no longer exists. By the time the screenshot is taken the
//! live DOM may interleave the same words with different whitespace, `&nbsp;`
//! entities, or inline tags (a `<span>` around one word is common). The
//! locator bridges that gap with a tolerant pattern:
//!
//! 1. Strip quote/apostrophe/newline characters from the phrase; these are
//!    the characters smart-quote normalization changes between the scraped
//!    text and the live DOM
//! 2. Reject phrases shorter than 5 characters (highlighting stopwords makes
//!    misleading evidence)
//! 3. Regex-escape each word, then rejoin with a connector matching any run
//!    of whitespace, `&nbsp;`, or inline tags
//! 4. Walk text nodes depth-first in document order (skipping
//!    script/style/textarea), wrap the first match in a marker span, and
//!    scroll it to the viewport center
//!
//! Only the first occurrence in document order is marked. A phrase that is
//! nowhere on the page is reported as not-found, never as an error; the
//! screenshot proceeds unmarked.

use crate::browser;
use chromiumoxide::page::Page;
use tracing::{debug, info, warn};

/// Minimum phrase length (after cleaning) eligible for highlighting.
const MIN_PHRASE_CHARS: usize = 5;

/// Matches anything a live render may insert between two quoted words.
const TOLERANT_CONNECTOR: &str = r"(?:\s|&nbsp;|<[^>]+>)*";

/// CSS class of the inserted marker span, also used to scroll to the mark.
pub const MARK_CLASS: &str = "tpb-evidence-mark";

/// Characters stripped from the phrase before matching. Quotes and
/// apostrophes routinely differ between the LLM's quote and the DOM
/// (smart-quote normalization); newlines are render artifacts.
const STRIP_CHARS: &[char] = &['"', '\'', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}', '«', '»'];

/// Build the whitespace-and-tag-tolerant pattern for a quoted phrase.
///
/// Returns `None` when the cleaned phrase is too short to highlight. The
/// pattern is valid for both the `regex` crate and a JS `RegExp`, and is
/// intended to be compiled case-insensitively.
pub fn build_flexible_pattern(phrase: &str) -> Option<String> {
    let cleaned: String = phrase
        .chars()
        .filter(|c| !STRIP_CHARS.contains(c))
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.chars().count() < MIN_PHRASE_CHARS {
        return None;
    }

    let words: Vec<String> = cleaned.split_whitespace().map(|w| regex::escape(w)).collect();
    if words.is_empty() {
        return None;
    }
    Some(words.join(TOLERANT_CONNECTOR))
}

/// Render the in-page script that walks text nodes and marks the first match.
///
/// The pattern is embedded as a JSON string literal so no phrase content can
/// escape into script syntax. The script evaluates to `true` iff a mark was
/// inserted.
fn highlight_script(pattern: &str) -> String {
    let pattern_literal = serde_json::to_string(pattern).expect("string serialization");
    format!(
        r#"((pattern) => {{
    const regex = new RegExp('(' + pattern + ')', 'i');
    const mark = (node) => {{
        if (node.nodeType === 3) {{
            const match = regex.exec(node.data);
            if (match) {{
                const span = document.createElement('span');
                span.className = '{mark_class}';
                span.style.cssText = 'background-color: yellow !important; color: black !important; outline: 4px solid red !important; font-weight: bold !important; box-shadow: 0 0 15px rgba(255,0,0,0.5) !important; border-radius: 4px; padding: 2px;';
                const middle = node.splitText(match.index);
                middle.splitText(match[0].length);
                span.appendChild(middle.cloneNode(true));
                middle.parentNode.replaceChild(span, middle);
                return true;
            }}
        }} else if (node.nodeType === 1 && node.childNodes && !/(script|style|textarea)/i.test(node.tagName)) {{
            for (let i = 0; i < node.childNodes.length; i++) {{
                if (mark(node.childNodes[i])) return true;
            }}
        }}
        return false;
    }};
    const found = document.body ? mark(document.body) : false;
    if (found) {{
        const el = document.querySelector('.{mark_class}');
        if (el) el.scrollIntoView({{behavior: 'instant', block: 'center'}});
    }}
    return found;
}})({pattern_literal})"#,
        mark_class = MARK_CLASS,
        pattern_literal = pattern_literal,
    )
}

/// Locate `phrase` in the live page and wrap its first occurrence in a
/// visual marker, scrolled to the viewport center.
///
/// Returns whether a mark was inserted. Too-short phrases and phrases absent
/// from the page both report `false` without touching the DOM; evaluation
/// errors are logged and also report `false`: a missing highlight degrades
/// the screenshot, it must never block it.
pub async fn locate_and_mark(page: &Page, phrase: &str) -> bool {
    let Some(pattern) = build_flexible_pattern(phrase) else {
        debug!("Phrase too short to highlight");
        return false;
    };

    match browser::evaluate_bool(page, &highlight_script(&pattern)).await {
        Ok(found) => {
            info!(found, "Evidence phrase search finished");
            found
        }
        Err(e) => {
            warn!(error = %e, "Highlight evaluation failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::RegexBuilder;

    fn compile(pattern: &str) -> regex::Regex {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .unwrap()
    }

    #[test]
    fn test_short_and_empty_phrases_rejected() {
        assert_eq!(build_flexible_pattern(""), None);
        assert_eq!(build_flexible_pattern("de"), None);
        assert_eq!(build_flexible_pattern("la"), None);
        assert_eq!(build_flexible_pattern("abcd"), None);
        // Quote characters don't count toward the length floor.
        assert_eq!(build_flexible_pattern("\"ab\""), None);
    }

    #[test]
    fn test_five_chars_is_eligible() {
        assert!(build_flexible_pattern("abcde").is_some());
    }

    #[test]
    fn test_matches_verbatim_phrase() {
        let pattern = build_flexible_pattern("global service team").unwrap();
        assert!(compile(&pattern).is_match("our global service team delivers"));
    }

    #[test]
    fn test_case_insensitive_match() {
        let pattern = build_flexible_pattern("Global Service Team").unwrap();
        assert!(compile(&pattern).is_match("A GLOBAL SERVICE TEAM"));
    }

    #[test]
    fn test_tolerates_inline_tags_between_words() {
        let pattern = build_flexible_pattern("global service team").unwrap();
        let rendered = "global <span class=\"x\">service</span> team";
        assert!(compile(&pattern).is_match(rendered));
    }

    #[test]
    fn test_tolerates_whitespace_runs_and_nbsp() {
        let pattern = build_flexible_pattern("global service team").unwrap();
        let regex = compile(&pattern);
        assert!(regex.is_match("global    service\n\tteam"));
        assert!(regex.is_match("global&nbsp;service&nbsp;&nbsp;team"));
    }

    #[test]
    fn test_regex_metacharacters_escaped() {
        let pattern = build_flexible_pattern("costs (net) up 10%?").unwrap();
        let regex = compile(&pattern);
        assert!(regex.is_match("costs (net) up 10%?"));
        assert!(!regex.is_match("costs net up 10x"));
    }

    #[test]
    fn test_quotes_and_newlines_stripped() {
        let pattern = build_flexible_pattern("the \u{201c}holding\u{201d}\ncompany's group").unwrap();
        let regex = compile(&pattern);
        assert!(regex.is_match("the holding companys group"));
    }

    #[test]
    fn test_first_match_semantics() {
        let pattern = build_flexible_pattern("service team").unwrap();
        let regex = compile(&pattern);
        let text = "service team here, and another service team there";
        let m = regex.find(text).unwrap();
        assert_eq!(m.start(), 0);
    }

    #[test]
    fn test_script_embeds_pattern_safely() {
        let script = highlight_script("fo\\'o(?:\\s)*bar");
        assert!(script.contains(MARK_CLASS));
        // The pattern rides inside a JSON string literal.
        assert!(script.contains("\"fo\\\\'o(?:\\\\s)*bar\""));
    }
}
