//! # Canonical JSON
//!
//! Deterministic serialization used as the input of every content hash.
//!
//! Object keys are emitted in lexicographic byte order at every depth, with no
//! whitespace. Strings and numbers use `serde_json`'s own rendering, so the
//! output is always valid JSON. The ordering is applied here rather than
//! relying on the map type behind `serde_json::Value`, which changes with the
//! `preserve_order` feature.

use crate::errors::CryptoError;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;

/// Canonical form of any serializable record.
pub fn canonicalize<T: Serialize + ?Sized>(record: &T) -> Result<String, CryptoError> {
    let value = serde_json::to_value(record)?;
    canonicalize_value(&value)
}

/// Canonical form of an already materialized JSON value.
pub fn canonicalize_value(value: &Value) -> Result<String, CryptoError> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut String, value: &Value) -> Result<(), CryptoError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            // Infallible for String.
            let _ = write!(out, "{n}");
        }
        Value::String(s) => out.push_str(&serde_json::to_string(s)?),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_value(out, item)?;
            }
            out.push('}');
        }
    }
    Ok(())
}
