//! Lenient location of the JSON object inside a model reply, strict typing after.

use insight_core::{AppError, AppResult};
use serde::de::DeserializeOwned;

/// Slice from the first `{` to the last `}`.
///
/// Covers bare objects, objects wrapped in ``` fences, and objects with a
/// sentence of prose before or after them.
pub fn locate_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

/// Parse a model reply into `T`, or `MalformedResponse` describing why not.
pub fn parse_reply<T: DeserializeOwned>(reply: &str) -> AppResult<T> {
    let object = locate_object(reply).ok_or_else(|| {
        AppError::MalformedResponse(format!(
            "no JSON object in reply: {}",
            preview(reply, 120)
        ))
    })?;

    serde_json::from_str(object)
        .map_err(|e| AppError::MalformedResponse(format!("reply does not match the schema: {}", e)))
}

/// At most `max_chars` characters of `text`, marked when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Reply {
        items: Vec<String>,
    }

    #[test]
    fn test_locate_fenced_object() {
        let reply = "```json\n{\"items\": [\"a\"]}\n```";
        assert_eq!(locate_object(reply), Some("{\"items\": [\"a\"]}"));
    }

    #[test]
    fn test_parse_with_surrounding_prose() {
        let reply = "Here you go:\n{\"items\": [\"a\", \"b\"]}\nHope this helps.";
        let parsed: Reply = parse_reply(reply).unwrap();
        assert_eq!(parsed.items, vec!["a", "b"]);
    }

    #[test]
    fn test_missing_object_is_malformed() {
        let err = parse_reply::<Reply>("I cannot help with that").unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let err = parse_reply::<Reply>("{\"other\": 1}").unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("héllo wörld", 4), "héll...");
        assert_eq!(preview("  short ", 10), "short");
    }
}
