//! Turn the assistant's raw message into the text shown to the user.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::MessageList;

/// Reply used when the thread holds no usable text.
pub const NO_RESPONSE: &str = "(no response)";

/// File-search citation such as `[4:0†source]`.
static CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\d+:\d+†[^\]]+\]").expect("citation pattern is valid"));

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Text of the first `text`/`output_text` block of the most recent message,
/// or [`NO_RESPONSE`] when there is none or it is empty.
pub fn extract_reply(messages: &MessageList) -> String {
    messages
        .latest()
        .and_then(|msg| msg.content.iter().find(|block| block.is_text()))
        .and_then(|block| block.text_value())
        .filter(|text| !text.is_empty())
        .unwrap_or(NO_RESPONSE)
        .to_string()
}

/// Strip citation markers, then collapse whitespace runs and trim.
///
/// Marker removal must run first: deleting a marker can leave two spaces behind.
pub fn sanitize_reply(raw: &str) -> String {
    let without_citations = CITATION.replace_all(raw, "");
    WHITESPACE
        .replace_all(&without_citations, " ")
        .trim()
        .to_string()
}
