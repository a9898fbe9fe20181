//! Test fixtures and helper data.

use serde_json::{json, Value};

use crate::codec::{ContentCodec, DeflateJsonCodec};

/// Canonical sample resource used by end-to-end tests.
pub fn sample_post() -> Value {
    json!({
        "userId": 1,
        "id": 1,
        "title": "sunt aut facere repellat provident",
        "body": "quia et suscipit suscipit recusandae consequuntur"
    })
}

/// Compresses a value exactly the way the wire does, for fixture responses.
pub fn compressed_payload(value: &Value) -> String {
    DeflateJsonCodec
        .compress(value)
        .expect("fixture compression")
        .payload
}
