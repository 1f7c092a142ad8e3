//! Logging for the requests sent to and responses received from the API.

use serde_json::Value;

use crate::http::HttpMethod;

/// Bodies longer than this many bytes are truncated in `info` logs.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

const REDACTED_FIELDS: [&str; 3] = ["password", "password2", "token"];
const REDACTED: &str = "********";

/// Log an outgoing request.
///
/// Password and token fields in JSON bodies are redacted. The request is logged at the
/// `info` level. If the body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it
/// is truncated and the full body is logged at the `debug` level.
pub fn log_request(method: HttpMethod, url: &str, body: Option<&Value>) {
    let body_text = body.map(redact_secrets).unwrap_or_default();

    if body_text.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Sending request: {method} {url}\nbody: {:}...",
            truncate(&body_text, LOG_BODY_LENGTH_LIMIT)
        );
        tracing::debug!("Full request body: {body_text:?}");
    } else {
        tracing::info!("Sending request: {method} {url}\nbody: {body_text:?}");
    }
}

/// Log a response from the API, redacted and truncated in the same way as
/// [log_request].
pub fn log_response(status: u16, url: &str, body: &str) {
    let body = redact_body_text(body);
    let body = body.as_str();

    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received response: {status} {url}\nbody: {:}...",
            truncate(body, LOG_BODY_LENGTH_LIMIT)
        );
        tracing::debug!("Full response body: {body:?}");
    } else {
        tracing::info!("Received response: {status} {url}\nbody: {body:?}");
    }
}

/// Redact secrets in a raw response body. Bodies that are not JSON are
/// returned unchanged.
pub(crate) fn redact_body_text(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => redact_secrets(&value),
        Err(_) => body.to_owned(),
    }
}

fn redact_secrets(body: &Value) -> String {
    let mut body = body.clone();

    if let Value::Object(fields) = &mut body {
        for field_name in REDACTED_FIELDS {
            if let Some(value) = fields.get_mut(field_name) {
                *value = Value::String(REDACTED.to_owned());
            }
        }
    }

    body.to_string()
}

/// Cut `text` to at most `limit` bytes without splitting a character.
fn truncate(text: &str, limit: usize) -> &str {
    let end = text
        .char_indices()
        .map(|(index, _)| index)
        .take_while(|&index| index <= limit)
        .last()
        .unwrap_or(0);

    if text.len() <= limit { text } else { &text[..end] }
}
