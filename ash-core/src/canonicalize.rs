//! Deterministic canonical byte form of request payloads (spec §4.1).
//!
//! `Value` is the tagged-variant representation the canonicalizer consumes;
//! parsing raw bytes into it is this crate's own adapter step (there is no
//! external HTTP framework here to do it for us), performed by
//! [`canonicalize`] based on [`ContentType`].

use std::collections::BTreeMap;

use serde_json::Number;

use crate::error::{AshError, AshErrorCode, AshResult};
use crate::types::ContentType;

/// Tagged-variant payload value. Object keys are stored in a `BTreeMap`,
/// whose `Ord` on `String` is byte-wise (hence code-point) comparison —
/// exactly the sort order the canonical form requires.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

/// Parse JSON bytes into the tagged-variant form.
pub fn parse_json(bytes: &[u8]) -> AshResult<Value> {
    let value: serde_json::Value = serde_json::from_slice(bytes).map_err(|e| {
        AshError::new(
            AshErrorCode::CanonicalizationFailed,
            format!("invalid JSON: {e}"),
        )
    })?;
    from_serde_json(value)
}

fn from_serde_json(value: serde_json::Value) -> AshResult<Value> {
    Ok(match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => from_number(n)?,
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => {
            let mut out = Vec::with_capacity(arr.len());
            for v in arr {
                out.push(from_serde_json(v)?);
            }
            Value::Array(out)
        }
        serde_json::Value::Object(obj) => {
            let mut out = BTreeMap::new();
            for (k, v) in obj {
                out.insert(k, from_serde_json(v)?);
            }
            Value::Object(out)
        }
    })
}

fn from_number(n: Number) -> AshResult<Value> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::Integer(i));
    }
    if let Some(u) = n.as_u64() {
        // Out of i64 range but representable as f64; integers this large
        // are rare in practice and serde_json already rejected NaN/Inf.
        return Ok(Value::Float(u as f64));
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => Ok(Value::Float(f)),
        _ => Err(AshError::new(
            AshErrorCode::CanonicalizationFailed,
            "non-finite number in payload",
        )),
    }
}

/// Render the JSON canonical form of a `Value` (spec §4.1).
pub fn canonicalize_json(value: &Value) -> AshResult<String> {
    let mut out = String::new();
    write_json(value, &mut out)?;
    Ok(out)
}

fn write_json(value: &Value, out: &mut String) -> AshResult<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Integer(i) => out.push_str(&i.to_string()),
        Value::Float(f) => out.push_str(&format_float(*f)?),
        Value::String(s) => {
            out.push_str(&serde_json::to_string(s).expect("string serialization is infallible"))
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_json(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (idx, (key, val)) in map.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).expect("string serialization is infallible"));
                out.push(':');
                write_json(val, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

/// Format a float per the canonical rule: integer-valued floats render as
/// integers (with `-0.0` collapsing to `0`); otherwise the shortest
/// round-tripping fixed-point decimal. Rust's `Display` for `f64` never
/// emits scientific notation and already produces the shortest
/// round-tripping representation, so no extra digit-trimming is needed.
fn format_float(f: f64) -> AshResult<String> {
    if !f.is_finite() {
        return Err(AshError::new(
            AshErrorCode::CanonicalizationFailed,
            "non-finite float in payload",
        ));
    }
    if f == 0.0 {
        return Ok("0".to_string());
    }
    if f.fract() == 0.0 && f.abs() < 1e18 {
        return Ok(format!("{}", f as i64));
    }
    Ok(format!("{f}"))
}

/// Render the URL-encoded canonical form directly from raw `key=value&...`
/// bytes: percent-decode, stable-sort by key (code-point order), re-encode
/// with the RFC 3986 unreserved set.
pub fn canonicalize_urlencoded(bytes: &[u8]) -> AshResult<String> {
    let raw = std::str::from_utf8(bytes).map_err(|e| {
        AshError::new(
            AshErrorCode::CanonicalizationFailed,
            format!("invalid UTF-8: {e}"),
        )
    })?;

    let mut pairs: Vec<(String, String)> = Vec::new();
    if !raw.is_empty() {
        for pair in raw.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k, v),
                None => (pair, ""),
            };
            pairs.push((percent_decode(key)?, percent_decode(value)?));
        }
    }

    // Stable sort: duplicate keys keep their original relative order.
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let encoded: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect();
    Ok(encoded.join("&"))
}

fn percent_decode(s: &str) -> AshResult<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hex = bytes.get(i + 1..i + 3).ok_or_else(|| {
                    AshError::new(
                        AshErrorCode::CanonicalizationFailed,
                        "truncated percent-escape",
                    )
                })?;
                let hex_str = std::str::from_utf8(hex).map_err(|_| {
                    AshError::new(
                        AshErrorCode::CanonicalizationFailed,
                        "invalid percent-escape",
                    )
                })?;
                let byte = u8::from_str_radix(hex_str, 16).map_err(|_| {
                    AshError::new(
                        AshErrorCode::CanonicalizationFailed,
                        "invalid percent-escape",
                    )
                })?;
                out.push(byte);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|e| {
        AshError::new(
            AshErrorCode::CanonicalizationFailed,
            format!("invalid UTF-8 after percent-decode: {e}"),
        )
    })
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~')
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.as_bytes() {
        if is_unreserved(*b) {
            out.push(*b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Dispatch on content type and produce the canonical byte form (spec
/// §4.1 "Content-type dispatch").
pub fn canonicalize(content_type: ContentType, raw: &[u8]) -> AshResult<String> {
    match content_type {
        ContentType::Json => {
            let value = parse_json(raw)?;
            canonicalize_json(&value)
        }
        ContentType::UrlEncoded => canonicalize_urlencoded(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ordering() {
        let a = canonicalize(ContentType::Json, br#"{"b":1,"a":2}"#).unwrap();
        let b = canonicalize(ContentType::Json, br#"{"a":2,"b":1}"#).unwrap();
        assert_eq!(a, r#"{"a":2,"b":1}"#);
        assert_eq!(a, b);
    }

    #[test]
    fn nested_structures() {
        let out = canonicalize(ContentType::Json, br#"{"z":[3,1,2],"a":{"y":1,"x":2}}"#).unwrap();
        assert_eq!(out, r#"{"a":{"x":2,"y":1},"z":[3,1,2]}"#);
    }

    #[test]
    fn null_bool_and_zero() {
        assert_eq!(canonicalize_json(&Value::Null).unwrap(), "null");
        assert_eq!(canonicalize_json(&Value::Bool(true)).unwrap(), "true");
        assert_eq!(canonicalize_json(&Value::Bool(false)).unwrap(), "false");
        assert_eq!(canonicalize_json(&Value::Integer(0)).unwrap(), "0");
        assert_eq!(canonicalize_json(&Value::Float(-0.0)).unwrap(), "0");
    }

    #[test]
    fn integer_valued_float_renders_as_integer() {
        assert_eq!(canonicalize_json(&Value::Float(4.0)).unwrap(), "4");
    }

    #[test]
    fn fractional_float_has_no_trailing_zeros() {
        assert_eq!(canonicalize_json(&Value::Float(1.50)).unwrap(), "1.5");
        assert_eq!(canonicalize_json(&Value::Float(0.1)).unwrap(), "0.1");
    }

    #[test]
    fn string_escaping_preserves_utf8() {
        let v = Value::String("héllo\n\"world\"".to_string());
        let out = canonicalize_json(&v).unwrap();
        assert_eq!(out, "\"héllo\\n\\\"world\\\"\"");
    }

    #[test]
    fn nan_and_infinite_are_rejected() {
        assert!(canonicalize_json(&Value::Float(f64::NAN)).is_err());
        assert!(canonicalize_json(&Value::Float(f64::INFINITY)).is_err());
    }

    #[test]
    fn canonical_idempotence() {
        let once = canonicalize(ContentType::Json, br#"{"b": 1, "a": [1, 2, 3]}"#).unwrap();
        let twice = canonicalize(ContentType::Json, once.as_bytes()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn urlencoded_sorts_and_reencodes() {
        let out = canonicalize(ContentType::UrlEncoded, b"b=2&a=1&c=hello%20world").unwrap();
        assert_eq!(out, "a=1&b=2&c=hello%20world");
    }

    #[test]
    fn urlencoded_duplicate_keys_preserve_pairwise_order() {
        let out = canonicalize(ContentType::UrlEncoded, b"x=1&a=1&x=2").unwrap();
        assert_eq!(out, "a=1&x=1&x=2");
    }

    #[test]
    fn urlencoded_plus_decodes_to_space() {
        let out = canonicalize(ContentType::UrlEncoded, b"q=a+b").unwrap();
        assert_eq!(out, "q=a%20b");
    }

    #[test]
    fn urlencoded_idempotence() {
        let once = canonicalize(ContentType::UrlEncoded, b"b=2&a=1").unwrap();
        let twice = canonicalize(ContentType::UrlEncoded, once.as_bytes()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn unsupported_content_type_is_caller_responsibility() {
        // The dispatch entry point itself only knows Json/UrlEncoded; the
        // engine maps any other MIME type to UNSUPPORTED_CONTENT_TYPE
        // before ever calling `canonicalize`.
        assert_eq!(ContentType::from_mime("text/xml"), None);
    }

    #[test]
    fn malformed_json_fails_canonicalization() {
        let err = canonicalize(ContentType::Json, b"{not json}").unwrap_err();
        assert_eq!(err.code(), Some(AshErrorCode::CanonicalizationFailed));
    }
}
