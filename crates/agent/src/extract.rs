//! Code block extraction from model text.

use once_cell::sync::Lazy;
use regex::Regex;

static EXECUTE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<execute>(.*?)</execute>").unwrap());

/// Pull every `<execute>...</execute>` body out of `text`.
///
/// Bodies are trimmed and joined with a blank line, in order of appearance.
/// Returns `None` when the text has no execute block. The code itself is
/// not validated.
pub fn extract_code(text: &str) -> Option<String> {
    let blocks: Vec<&str> = EXECUTE_BLOCK_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .collect();

    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n\n"))
    }
}
