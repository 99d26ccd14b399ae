//! Decoding of Gmail `format=full` message resources.
//!
//! Text comes from every `text/plain` part at any nesting depth; when a
//! message has none, `text/html` parts are used with markup stripped.

use std::sync::LazyLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::Deserialize;

use super::service::FetchedMessage;

static RE_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?</style\s*>").unwrap());
static RE_SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").unwrap());
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^<>]+>").unwrap());
static RE_DATE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*$").unwrap());

/// Gmail API message resource.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

/// A MIME part; the top-level payload has the same shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
}

impl GmailMessage {
    /// Converts the API resource into the engine-facing message.
    pub fn into_fetched(self) -> FetchedMessage {
        let payload = self.payload.unwrap_or_default();
        let subject = header_value(&payload.headers, "subject").unwrap_or_default();
        let sender = header_value(&payload.headers, "from").unwrap_or_default();
        let date = header_value(&payload.headers, "date").and_then(|raw| parse_date(&raw));

        FetchedMessage {
            id: self.id,
            label_ids: self.label_ids,
            sender: sender.trim().to_string(),
            subject: subject.trim().to_string(),
            date,
            snippet: self.snippet.unwrap_or_default(),
            body: extract_body_text(&payload),
        }
    }
}

/// Case-insensitive header lookup; the last occurrence wins.
pub fn header_value(headers: &[Header], name: &str) -> Option<String> {
    headers
        .iter()
        .rev()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

/// Parses an RFC 2822 `Date` header, tolerating a trailing `(UTC)`-style comment.
pub fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| DateTime::parse_from_rfc2822(&RE_DATE_COMMENT.replace(trimmed, "")))
        .ok()
}

/// Plain-text parts joined by newlines, else stripped HTML parts, collapsed.
pub fn extract_body_text(payload: &MessagePart) -> String {
    let mut plain = Vec::new();
    let mut html = Vec::new();
    collect_text_parts(payload, &mut plain, &mut html);

    let text = if !plain.is_empty() {
        plain.join("\n")
    } else {
        html.iter()
            .map(|h| strip_html(h))
            .collect::<Vec<_>>()
            .join("\n")
    };

    collapse_whitespace(&text)
}

fn collect_text_parts(part: &MessagePart, plain: &mut Vec<String>, html: &mut Vec<String>) {
    let mime = part.mime_type.as_deref().unwrap_or("");
    if let Some(text) = part
        .body
        .as_ref()
        .and_then(|b| b.data.as_deref())
        .and_then(decode_body_data)
    {
        if mime.eq_ignore_ascii_case("text/plain") {
            plain.push(text);
        } else if mime.eq_ignore_ascii_case("text/html") {
            html.push(text);
        }
    }

    for child in &part.parts {
        collect_text_parts(child, plain, html);
    }
}

/// Decodes base64url body data, with or without padding. Invalid UTF-8 is
/// replaced rather than rejected.
pub fn decode_body_data(data: &str) -> Option<String> {
    let cleaned: String = data
        .trim_end_matches('=')
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    URL_SAFE_NO_PAD
        .decode(cleaned.as_bytes())
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

pub fn strip_html(html: &str) -> String {
    let without_style = RE_STYLE.replace_all(html, " ");
    let without_script = RE_SCRIPT.replace_all(&without_style, " ");
    RE_TAG.replace_all(&without_script, " ").into_owned()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text.as_bytes())
    }

    fn part(mime: &str, text: &str) -> MessagePart {
        MessagePart {
            mime_type: Some(mime.to_string()),
            headers: vec![],
            body: Some(PartBody {
                data: Some(encode(text)),
            }),
            parts: vec![],
        }
    }

    #[test]
    fn test_plain_preferred_over_html() {
        let payload = MessagePart {
            mime_type: Some("multipart/alternative".to_string()),
            parts: vec![
                part("text/html", "<p>Hello <b>html</b></p>"),
                part("text/plain", "Hello   plain\n\nworld"),
            ],
            ..Default::default()
        };
        assert_eq!(extract_body_text(&payload), "Hello plain world");
    }

    #[test]
    fn test_html_fallback_strips_markup() {
        let payload = MessagePart {
            mime_type: Some("multipart/mixed".to_string()),
            parts: vec![MessagePart {
                mime_type: Some("multipart/alternative".to_string()),
                parts: vec![part(
                    "text/html",
                    "<style>p { color: red; }</style><p>Weekly <i>Digest</i></p><script>x<1</script>",
                )],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(extract_body_text(&payload), "Weekly Digest");
    }

    #[test]
    fn test_decode_tolerates_padding_and_bad_utf8() {
        assert_eq!(decode_body_data("aGk="), Some("hi".to_string()));
        assert_eq!(decode_body_data("aGk"), Some("hi".to_string()));
        let invalid = URL_SAFE_NO_PAD.encode([0x68, 0xff, 0x69]);
        assert_eq!(decode_body_data(&invalid), Some("h\u{fffd}i".to_string()));
        assert_eq!(decode_body_data("***"), None);
    }

    #[test]
    fn test_parse_date_with_comment() {
        let date = parse_date("Tue, 1 Jul 2025 10:52:37 +0000 (UTC)").unwrap();
        assert_eq!(date.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-07-01 10:52:37");
        assert!(parse_date("not a date").is_none());
    }

    #[test]
    fn test_into_fetched_reads_headers() {
        let message: GmailMessage = serde_json::from_value(serde_json::json!({
            "id": "m1",
            "labelIds": ["INBOX", "UNREAD"],
            "snippet": "Your weekly digest",
            "payload": {
                "mimeType": "text/plain",
                "headers": [
                    { "name": "SUBJECT", "value": " Weekly Digest #42 " },
                    { "name": "From", "value": "News <news@x.com>" }
                ],
                "body": { "data": encode("Top stories this week") }
            }
        }))
        .unwrap();

        let fetched = message.into_fetched();
        assert_eq!(fetched.id, "m1");
        assert_eq!(fetched.subject, "Weekly Digest #42");
        assert_eq!(fetched.sender, "News <news@x.com>");
        assert_eq!(fetched.body, "Top stories this week");
        assert!(fetched.date.is_none());
        assert_eq!(fetched.label_ids.len(), 2);
    }
}
