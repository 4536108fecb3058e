//! Deterministic cleanup of PDF text and model replies.
//!
//! Two small rule sets:
//!
//! * [`clean_text`] normalises what pdfium hands back before it is pasted
//!   into the prompt: line endings, invisible Unicode, trailing whitespace
//!   and runs of blank lines. Fewer junk tokens, same content.
//! * [`strip_code_fences`] removes an outer ```` ```json ```` fence from a
//!   model reply. Models wrap JSON in fences even when told not to; anything
//!   else wrong with the reply is left for the JSON parser to reject.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise raw PDF text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF/CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Trim leading/trailing blank space of the whole text
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Reply fences ─────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\n(.*?)\n?```$").unwrap());

/// Remove a single outer Markdown code fence, if present.
pub fn strip_code_fences(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed).and_then(|c| c.get(1)) {
        Some(body) => body.as_str(),
        None => trimmed,
    }
}

// ── Text rules ───────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fence() {
        let input = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fence_no_lang() {
        assert_eq!(strip_code_fences("```\n{}\n```\n"), "{}");
    }

    #[test]
    fn test_no_fence_passthrough() {
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_inner_fence_not_stripped() {
        let input = "Here you go:\n```json\n{}\n```";
        assert_eq!(strip_code_fences(input), input);
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "Total\u{200B} 100\u{FEFF}.00\u{00AD} EUR";
        assert_eq!(remove_invisible_chars(input), "Total 100.00 EUR");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_clean_text_full() {
        let input = "\r\n  Invoice #44   \r\n\r\n\r\n\r\n\r\nTotal 100.00 EUR\u{200B}  \r\n";
        assert_eq!(clean_text(input), "Invoice #44\n\n\nTotal 100.00 EUR");
    }

    #[test]
    fn test_clean_empty() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text(" \n\n "), "");
    }
}
