//! Response normalization: the envelope and the body decoder.

use bytes::Bytes;
use serde_json::Value;
use tracing::warn;

use crate::codec::ContentCodec;
use crate::config::RequestOptions;
use crate::headers::Headers;
use crate::transport::TransportKind;
use crate::{CODEC_ENCODING_HEADER, CODEC_ENCODING_VALUE};

/// Declared response interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Decode as text and auto-parse as JSON when enabled.
    Json,
    /// Decode as text, never parsed.
    Text,
    /// Keep the raw bytes.
    Binary,
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Structured value (decompressed or auto-parsed).
    Json(Value),
    /// Decoded text.
    Text(String),
    /// Raw bytes.
    Binary(Bytes),
    /// No body (empty response or transport failure).
    Empty,
}

impl ResponseBody {
    /// Returns the structured value, if this body is one.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the decoded text, if this body is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns true for [`ResponseBody::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseBody::Empty)
    }
}

/// Opaque transport handle attached to the envelope for introspection.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    /// Which transport variant executed the call.
    pub kind: TransportKind,
    /// Headers as actually sent, after transport-side additions.
    pub headers_sent: Headers,
}

/// Normalized outcome of a logical call. Created exactly once per call.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    /// Decoded body.
    pub body: ResponseBody,
    /// Status code; `None` for pure transport failures.
    pub status: Option<u16>,
    /// Normalized response headers.
    pub headers: Headers,
    /// Transport introspection handle.
    pub handle: TransportHandle,
    /// The descriptor the call was executed with.
    pub options: RequestOptions,
}

impl ResponseEnvelope {
    /// Returns true when the status is present and in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(status) if (200..300).contains(&status))
    }
}

/// Decodes wire bytes into a logical body value.
///
/// The codec marker header is authoritative: when present (and
/// decompression is enabled) it bypasses any declared response kind.
/// Decode problems degrade to text, never to an error.
pub fn decode(
    bytes: &Bytes,
    headers: &Headers,
    options: &RequestOptions,
    codec: &dyn ContentCodec,
) -> ResponseBody {
    let marked = headers.get_str(CODEC_ENCODING_HEADER).as_deref() == Some(CODEC_ENCODING_VALUE);
    if marked && options.request.codec.decompress_enabled() {
        match codec.decompress(bytes) {
            Ok(value) => return ResponseBody::Json(value),
            Err(error) => {
                warn!(%error, "response decompression failed, returning raw text");
                return ResponseBody::Text(String::from_utf8_lossy(bytes).to_string());
            }
        }
    }

    if bytes.is_empty() {
        return ResponseBody::Empty;
    }

    let kind = options.response.kind;
    if kind == Some(ResponseKind::Binary) {
        return ResponseBody::Binary(bytes.clone());
    }

    let text = String::from_utf8_lossy(bytes).to_string();
    let parse = options.response.parse_json.unwrap_or(false) && kind != Some(ResponseKind::Text);
    if parse {
        match serde_json::from_str(&text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(text),
        }
    } else {
        ResponseBody::Text(text)
    }
}
