//! CloudEvents HTTP protocol binding (v1.0), receive side.
//!
//! Two content modes are accepted:
//!
//! - **Binary** — context attributes in percent-encoded `ce-*` headers, the
//!   body is the event data verbatim.
//! - **Structured** — `Content-Type: application/cloudevents+json`, the body is
//!   a JSON envelope holding attributes and `data` / `data_base64`.
//!
//! Batch mode is rejected. Attributes other than the core context attributes
//! become extension attributes of the [`IncomingEvent`].

use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use base64::Engine;
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use thiserror::Error;
use translator::IncomingEvent;

const HEADER_PREFIX: &str = "ce-";
const STRUCTURED_JSON: &str = "application/cloudevents+json";
const BATCH_JSON: &str = "application/cloudevents-batch+json";

/// Core context attributes; everything else is an extension.
const CONTEXT_ATTRIBUTES: &[&str] = &[
    "id",
    "source",
    "type",
    "specversion",
    "time",
    "subject",
    "datacontenttype",
    "dataschema",
];

/// Why an HTTP request could not be read as a CloudEvent.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("missing required CloudEvent attribute '{0}'")]
    MissingAttribute(&'static str),

    #[error("batched CloudEvents are not supported")]
    BatchNotSupported,

    #[error("structured CloudEvent body is not a JSON object")]
    NotAnObject,

    #[error("invalid structured CloudEvent: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid data_base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Decodes a CloudEvent from an HTTP request.
pub fn decode(headers: &HeaderMap, body: Bytes) -> Result<IncomingEvent, DecodeError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with(BATCH_JSON) {
        Err(DecodeError::BatchNotSupported)
    } else if content_type.starts_with(STRUCTURED_JSON) {
        decode_structured(&body)
    } else {
        decode_binary(headers, body)
    }
}

fn decode_binary(headers: &HeaderMap, body: Bytes) -> Result<IncomingEvent, DecodeError> {
    let mut id = String::new();
    let mut source = String::new();
    let mut event_type = None;
    let mut extensions = Vec::new();

    for (name, value) in headers {
        let Some(attribute) = name.as_str().strip_prefix(HEADER_PREFIX) else {
            continue;
        };
        let Ok(value) = value.to_str() else {
            tracing::debug!(header = name.as_str(), "skipping non-ASCII CloudEvent header");
            continue;
        };
        let Ok(value) = percent_decode_str(value).decode_utf8() else {
            tracing::debug!(header = name.as_str(), "skipping CloudEvent header that is not UTF-8");
            continue;
        };
        match attribute {
            "id" => id = value.to_string(),
            "source" => source = value.to_string(),
            "type" => event_type = Some(value.to_string()),
            other if CONTEXT_ATTRIBUTES.contains(&other) => {}
            other => extensions.push((other.to_string(), value.to_string())),
        }
    }

    let event_type = event_type
        .filter(|t| !t.is_empty())
        .ok_or(DecodeError::MissingAttribute("type"))?;

    let mut event = IncomingEvent::new(event_type)
        .with_id(id)
        .with_source(source)
        .with_payload(body.to_vec());
    for (name, value) in extensions {
        event = event.with_extension(name, value);
    }
    Ok(event)
}

fn decode_structured(body: &[u8]) -> Result<IncomingEvent, DecodeError> {
    let Value::Object(mut envelope) = serde_json::from_slice::<Value>(body)? else {
        return Err(DecodeError::NotAnObject);
    };

    let event_type = take_string(&mut envelope, "type")
        .filter(|t| !t.is_empty())
        .ok_or(DecodeError::MissingAttribute("type"))?;
    let id = take_string(&mut envelope, "id").unwrap_or_default();
    let source = take_string(&mut envelope, "source").unwrap_or_default();
    let content_type = envelope
        .get("datacontenttype")
        .and_then(Value::as_str)
        .unwrap_or("application/json")
        .to_ascii_lowercase();

    let payload = match (envelope.remove("data_base64"), envelope.remove("data")) {
        (Some(Value::String(encoded)), _) => {
            base64::engine::general_purpose::STANDARD.decode(encoded.as_bytes())?
        }
        (_, Some(Value::String(text))) if !is_json(&content_type) => text.into_bytes(),
        (_, Some(Value::Null)) | (_, None) => Vec::new(),
        (_, Some(data)) => serde_json::to_vec(&data)?,
    };

    let mut event = IncomingEvent::new(event_type)
        .with_id(id)
        .with_source(source)
        .with_payload(payload);
    for (name, value) in envelope {
        if CONTEXT_ATTRIBUTES.contains(&name.as_str()) {
            continue;
        }
        let value = match value {
            Value::String(s) => s,
            Value::Null => continue,
            other => other.to_string(),
        };
        event = event.with_extension(name, value);
    }
    Ok(event)
}

fn take_string(envelope: &mut Map<String, Value>, key: &str) -> Option<String> {
    match envelope.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn is_json(content_type: &str) -> bool {
    content_type.starts_with("application/json") || content_type.contains("+json")
}
