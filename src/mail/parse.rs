//! Raw RFC 5322 bytes → `Notification`.

use mail_parser::MessageParser;

use super::{Notification, RawMessage};
use crate::error::MailError;

/// Decode a fetched message into subject, body, sender and date.
pub fn parse_notification(raw: &RawMessage) -> Result<Notification, MailError> {
    if raw.bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(MailError::Parse {
            uid: raw.uid,
            reason: "empty message".into(),
        });
    }

    let parsed = MessageParser::default()
        .parse(&raw.bytes)
        .ok_or_else(|| MailError::Parse {
            uid: raw.uid,
            reason: "not a valid RFC 5322 message".into(),
        })?;

    let date = parsed
        .date()
        .and_then(|d| chrono::DateTime::from_timestamp(d.to_timestamp(), 0));

    Ok(Notification {
        uid: raw.uid,
        sender: extract_sender(&parsed),
        subject: parsed.subject().unwrap_or_default().trim().to_string(),
        body: extract_text(&parsed),
        date,
    })
}

fn extract_sender(parsed: &mail_parser::Message) -> String {
    parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Plain-text body, falling back to tag-stripped HTML.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.trim().to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    String::new()
}

/// Strip HTML tags and normalize whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
