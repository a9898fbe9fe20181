//! Logical request bodies and the wire encoder.

use bytes::Bytes;
use serde_json::Value;
use tracing::warn;

use crate::codec::ContentCodec;
use crate::config::CodecOptions;
use crate::headers::Headers;
use crate::{CODEC_ENCODING_HEADER, CODEC_ENCODING_VALUE};

const CONTENT_TYPE: &str = "content-type";

/// Logical request body, independent of transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Structured value, serialized to JSON text on the wire.
    Value(Value),
    /// Raw text, sent as-is.
    Text(String),
    /// Raw bytes, passed through unmodified.
    Binary(Bytes),
    /// Multipart form container.
    Form(MultipartForm),
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Value(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Binary(Bytes::from(bytes))
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Binary(bytes)
    }
}

impl From<MultipartForm> for Body {
    fn from(form: MultipartForm) -> Self {
        Body::Form(form)
    }
}

/// One part of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

/// Multipart form container rendered with a generated boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            filename: None,
            content_type: None,
            data: Bytes::from(value.into()),
        });
        self
    }

    /// Adds a file field with an explicit content type.
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            data: data.into(),
        });
        self
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns true if the form has no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn render(&self, boundary: &str) -> Bytes {
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match &part.filename {
                Some(filename) => out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        part.name, filename
                    )
                    .as_bytes(),
                ),
                None => out.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name)
                        .as_bytes(),
                ),
            }
            if let Some(content_type) = &part.content_type {
                out.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&part.data);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        Bytes::from(out)
    }
}

fn boundary() -> String {
    format!("----IntegrationsFormBoundary{:016x}", rand::random::<u64>())
}

/// Encodes a logical body into wire bytes, adjusting content headers in
/// place. Decision order, first match wins: absent body, native
/// binary/multipart containers, codec compression, JSON serialization.
pub fn encode(
    body: Option<&Body>,
    headers: &mut Headers,
    codec_options: &CodecOptions,
    codec: &dyn ContentCodec,
) -> Option<Bytes> {
    let Some(body) = body else {
        headers.remove(CONTENT_TYPE);
        return None;
    };

    match body {
        Body::Binary(bytes) => Some(bytes.clone()),
        Body::Form(form) => {
            // The transport owns the boundary, so any caller-supplied
            // content type must not survive.
            headers.remove(CONTENT_TYPE);
            let boundary = boundary();
            headers.set(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            );
            Some(form.render(&boundary))
        }
        Body::Value(_) | Body::Text(_) => {
            if codec_options.compress_enabled() {
                if let Some(bytes) = compress(body, headers, codec_options, codec) {
                    return Some(bytes);
                }
            }
            serialize(body)
        }
    }
}

fn compress(
    body: &Body,
    headers: &mut Headers,
    codec_options: &CodecOptions,
    codec: &dyn ContentCodec,
) -> Option<Bytes> {
    let value = match body {
        Body::Text(text) => Value::String(text.clone()),
        Body::Value(value) => value.clone(),
        _ => return None,
    };

    match codec.compress(&value) {
        Ok(compressed) if compressed.positive || !codec_options.only_positive() => {
            headers.set(CODEC_ENCODING_HEADER, CODEC_ENCODING_VALUE);
            // Intermediaries content-sniff; a generic text type keeps them
            // from parsing the payload. Decoding keys off the marker header.
            headers.set(CONTENT_TYPE, mime::TEXT_PLAIN.as_ref());
            Some(Bytes::from(compressed.payload))
        }
        Ok(_) => None,
        Err(error) => {
            warn!(%error, "body compression failed, sending uncompressed");
            None
        }
    }
}

fn serialize(body: &Body) -> Option<Bytes> {
    match body {
        Body::Text(text) => Some(Bytes::copy_from_slice(text.as_bytes())),
        Body::Value(value) => match serde_json::to_string(value) {
            Ok(text) => Some(Bytes::from(text)),
            Err(error) => {
                warn!(%error, "body serialization failed, sending no body");
                None
            }
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DeflateJsonCodec;
    use serde_json::json;

    fn compressing() -> CodecOptions {
        CodecOptions {
            compress: Some(true),
            decompress: Some(true),
            only_positive: Some(false),
        }
    }

    #[test]
    fn absent_body_clears_content_type() {
        let mut headers = Headers::new();
        headers.set("content-type", "application/json");

        let bytes = encode(None, &mut headers, &CodecOptions::default(), &DeflateJsonCodec);

        assert!(bytes.is_none());
        assert!(!headers.contains("content-type"));
    }

    #[test]
    fn structured_bodies_serialize_to_json() {
        let mut headers = Headers::new();
        let body = Body::from(json!({"a": 4}));

        let bytes = encode(
            Some(&body),
            &mut headers,
            &CodecOptions::default(),
            &DeflateJsonCodec,
        )
        .unwrap();

        assert_eq!(&bytes[..], br#"{"a":4}"#);
        assert!(!headers.contains(CODEC_ENCODING_HEADER));
    }

    #[test]
    fn text_bodies_pass_through() {
        let mut headers = Headers::new();
        let body = Body::from("plain payload");

        let bytes = encode(
            Some(&body),
            &mut headers,
            &CodecOptions::default(),
            &DeflateJsonCodec,
        )
        .unwrap();

        assert_eq!(&bytes[..], b"plain payload");
    }

    #[test]
    fn binary_bodies_pass_through_unmodified() {
        let mut headers = Headers::new();
        headers.set("content-type", "application/octet-stream");
        let payload = vec![0u8, 1, 2, 255];
        let body = Body::from(payload.clone());

        let bytes = encode(Some(&body), &mut headers, &compressing(), &DeflateJsonCodec).unwrap();

        assert_eq!(&bytes[..], payload.as_slice());
        assert!(!headers.contains(CODEC_ENCODING_HEADER));
        assert_eq!(
            headers.get_str("content-type").as_deref(),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn compression_sets_marker_and_forces_text_plain() {
        let mut headers = Headers::new();
        headers.set("content-type", "application/json");
        let body = Body::from(json!({"a": 4}));

        let bytes = encode(Some(&body), &mut headers, &compressing(), &DeflateJsonCodec).unwrap();

        assert_eq!(
            headers.get_str(CODEC_ENCODING_HEADER).as_deref(),
            Some(CODEC_ENCODING_VALUE)
        );
        assert_eq!(headers.get_str("content-type").as_deref(), Some("text/plain"));

        let restored = DeflateJsonCodec.decompress(&bytes).unwrap();
        assert_eq!(restored, json!({"a": 4}));
    }

    #[test]
    fn only_positive_gate_skips_unprofitable_compression() {
        let mut headers = Headers::new();
        let body = Body::from(json!("a"));
        let options = CodecOptions {
            compress: Some(true),
            decompress: Some(true),
            only_positive: Some(true),
        };

        let bytes = encode(Some(&body), &mut headers, &options, &DeflateJsonCodec).unwrap();

        assert!(!headers.contains(CODEC_ENCODING_HEADER));
        assert_eq!(&bytes[..], br#""a""#);
    }

    #[test]
    fn multipart_form_owns_the_content_type() {
        let mut headers = Headers::new();
        headers.set("content-type", "application/json");
        let form = MultipartForm::new()
            .text("name", "value")
            .file("upload", "data.bin", "application/octet-stream", vec![1u8, 2]);
        let body = Body::from(form);

        let bytes = encode(Some(&body), &mut headers, &compressing(), &DeflateJsonCodec).unwrap();

        let content_type = headers.get_str("content-type").unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let boundary = content_type.rsplit('=').next().unwrap().to_string();

        let rendered = String::from_utf8_lossy(&bytes);
        assert!(rendered.contains(&format!("--{boundary}\r\n")));
        assert!(rendered.contains("Content-Disposition: form-data; name=\"name\""));
        assert!(rendered.contains("filename=\"data.bin\""));
        assert!(rendered.ends_with(&format!("--{boundary}--\r\n")));
    }
}
