//! Content codec seam and the bundled deflate/JSON implementation.
//!
//! The pipeline consumes the codec as a black box: `compress` reports
//! whether the transform actually paid off (`positive`), `decompress`
//! reverses it verbatim. The bundled [`DeflateJsonCodec`] frames values as
//! canonical JSON text, deflates, and base64-encodes so the wire payload
//! stays plain text.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::Value;
use thiserror::Error;

/// Error reported by a codec transform.
///
/// Codec failures never surface to callers of the pipeline; the encoder and
/// decoder degrade to the uncompressed path instead.
#[derive(Error, Debug, Clone)]
#[error("codec error: {0}")]
pub struct CodecError(pub String);

/// Outcome of a compression pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Compressed {
    /// True when the transform reduced size relative to the source text.
    pub positive: bool,
    /// The wire payload (plain text, safe for `text/plain` transport).
    pub payload: String,
}

/// Byte transform applied to textual/structured bodies.
pub trait ContentCodec: Send + Sync {
    /// Compresses a value, reporting whether the transform paid off.
    fn compress(&self, value: &Value) -> Result<Compressed, CodecError>;

    /// Reverses [`ContentCodec::compress`], returning the original value.
    fn decompress(&self, payload: &[u8]) -> Result<Value, CodecError>;
}

/// Default codec: canonical JSON text, deflated, base64-framed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeflateJsonCodec;

impl ContentCodec for DeflateJsonCodec {
    fn compress(&self, value: &Value) -> Result<Compressed, CodecError> {
        let text = serde_json::to_string(value)
            .map_err(|error| CodecError(format!("serialize: {error}")))?;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(text.as_bytes())
            .map_err(|error| CodecError(format!("deflate: {error}")))?;
        let deflated = encoder
            .finish()
            .map_err(|error| CodecError(format!("deflate: {error}")))?;

        let payload = BASE64.encode(deflated);
        Ok(Compressed {
            positive: payload.len() < text.len(),
            payload,
        })
    }

    fn decompress(&self, payload: &[u8]) -> Result<Value, CodecError> {
        let text = std::str::from_utf8(payload)
            .map_err(|error| CodecError(format!("payload is not UTF-8: {error}")))?;
        let deflated = BASE64
            .decode(text.trim())
            .map_err(|error| CodecError(format!("base64: {error}")))?;

        let mut source = String::new();
        ZlibDecoder::new(deflated.as_slice())
            .read_to_string(&mut source)
            .map_err(|error| CodecError(format!("inflate: {error}")))?;

        serde_json::from_str(&source).map_err(|error| CodecError(format!("parse: {error}")))
    }
}

/// Expresses a byte array in the codec's object-of-indices form
/// (`{"0": b0, "1": b1, …}`), the representation used for typed byte
/// arrays on the wire.
pub fn binary_value(bytes: &[u8]) -> Value {
    Value::Object(
        bytes
            .iter()
            .enumerate()
            .map(|(index, byte)| (index.to_string(), Value::from(*byte)))
            .collect(),
    )
}
