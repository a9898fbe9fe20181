//! Case-insensitive header mapping with best-effort value coercion.
//!
//! The pipeline carries headers as a plain name-to-value map. Names are
//! compared case-insensitively (stored lowercase); decoded values get a
//! best-effort cast (number/boolean/JSON) with a textual fallback.

use std::collections::BTreeMap;

use serde_json::Value;

/// Ordered, case-insensitive header map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: BTreeMap<String, Value>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing any existing value for the same name.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.entries
            .insert(name.trim().to_ascii_lowercase(), value.into());
    }

    /// Returns the value for a header name, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(&name.trim().to_ascii_lowercase())
    }

    /// Returns the wire form of a header value, if present.
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name).map(Self::wire_value)
    }

    /// Removes a header, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.remove(&name.trim().to_ascii_lowercase())
    }

    /// Returns true if the header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.trim().to_ascii_lowercase())
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no headers are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(lowercase name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Merges `self` over `lower`: keys present in `self` win, the rest are
    /// filled from `lower`. Both inputs are left untouched.
    pub fn merged_over(&self, lower: &Headers) -> Headers {
        let mut merged = lower.clone();
        for (name, value) in &self.entries {
            merged.entries.insert(name.clone(), value.clone());
        }
        merged
    }

    /// Lowers an `http::HeaderMap` into a coerced map.
    pub fn from_http(map: &http::HeaderMap) -> Headers {
        let mut headers = Headers::new();
        for (name, value) in map.iter() {
            if let Ok(text) = value.to_str() {
                headers.set(name.as_str(), coerce(text));
            }
        }
        headers
    }

    /// Parses a raw header block (`name: value` per line) into a coerced map.
    ///
    /// Lines without a colon or with an empty name are skipped.
    pub fn parse_block(raw: &str) -> Headers {
        let mut headers = Headers::new();
        for line in raw.split(['\r', '\n']) {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            headers.set(name, coerce(value));
        }
        headers
    }

    /// Renders a value in wire form: strings pass through unquoted, anything
    /// else uses its JSON rendering.
    pub fn wire_value(value: &Value) -> String {
        match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// Best-effort cast of a raw header value: JSON interpretation (numbers,
/// booleans, quoted strings) with the trimmed text as fallback.
fn coerce(raw: &str) -> Value {
    let trimmed = raw.trim();
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}
