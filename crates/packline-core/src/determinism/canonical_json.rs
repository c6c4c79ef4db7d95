//! Canonical JSON encoding for deterministic hashing.
//!
//! This module produces the unique byte encoding every content hash in the
//! system is computed over. Rules:
//! - object keys sorted ascending by Unicode code point
//! - no insignificant whitespace
//! - integers as shortest decimal, no sign on zero
//! - floats must be finite; shortest round-trip decimal, no exponent form
//! - strings escape `"` `\` and the C0 short forms, other control
//!   characters as lowercase `\u00xx`
//! - the in-memory encoding has no trailing newline; file and JSONL
//!   encodings append exactly one `\n`
//!
//! The inverse direction is plain JSON parsing: canonical output is valid
//! JSON, so `serde_json` reads it back without a dedicated parser.

use itertools::Itertools;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::{PacklineError, PacklineResult};

/// Prefix carried by every content hash string.
pub const HASH_PREFIX: &str = "sha256:";

/// Canonicalize a JSON value into its unique in-memory encoding.
pub fn canonical_json_string(value: &Value) -> PacklineResult<String> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

/// Canonicalize a JSON value into bytes (no trailing newline).
pub fn canonical_json_bytes(value: &Value) -> PacklineResult<Vec<u8>> {
    Ok(canonical_json_string(value)?.into_bytes())
}

/// Canonicalize a JSON value into a file/JSONL line: canonical bytes plus
/// exactly one trailing `\n`.
pub fn canonical_json_line(value: &Value) -> PacklineResult<Vec<u8>> {
    let mut bytes = canonical_json_bytes(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Hash raw bytes into a `sha256:`-prefixed lowercase hex digest.
pub fn content_hash_bytes(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    format!("{HASH_PREFIX}{}", hex::encode(h.finalize()))
}

/// Hash a JSON value over its canonical encoding.
pub fn content_hash(value: &Value) -> PacklineResult<String> {
    Ok(content_hash_bytes(&canonical_json_bytes(value)?))
}

/// First 16 hex characters of a value's content hash, without the prefix.
///
/// Used for content-derived entity ids (`node_…`, `out_…`, `q_…`).
pub fn short_hash16(value: &Value) -> PacklineResult<String> {
    let full = content_hash(value)?;
    Ok(full[HASH_PREFIX.len()..HASH_PREFIX.len() + 16].to_string())
}

/// True if `s` is a well-formed content hash (`sha256:` + 64 lowercase hex).
pub fn is_content_hash(s: &str) -> bool {
    match s.strip_prefix(HASH_PREFIX) {
        Some(hex_part) => {
            hex_part.len() == 64
                && hex_part
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        }
        None => false,
    }
}

fn write_value(out: &mut String, value: &Value) -> PacklineResult<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, n)?,
        Value::String(s) => write_string(out, s),
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
            out.push('{');
            // Sort by code point regardless of the map's own ordering.
            for (i, key) in map.keys().sorted().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &map[key])?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_number(out: &mut String, n: &serde_json::Number) -> PacklineResult<()> {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
        return Ok(());
    }
    if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
        return Ok(());
    }
    let f = n
        .as_f64()
        .ok_or_else(|| PacklineError::canon_invalid("number is not representable"))?;
    if !f.is_finite() {
        return Err(PacklineError::canon_invalid("non-finite number"));
    }
    if f == 0.0 {
        // Covers -0.0: zero carries no sign.
        out.push('0');
        return Ok(());
    }
    // Rust's float Display is the shortest decimal that round-trips and
    // never uses exponent notation. Integral floats therefore print like
    // integers, which re-parse as integers with the identical encoding.
    out.push_str(&f.to_string());
    Ok(())
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_sorted_and_compact() {
        let v = json!({"b": 1, "a": {"z": true, "y": null}});
        let s = canonical_json_string(&v).unwrap();
        assert_eq!(s, r#"{"a":{"y":null,"z":true},"b":1}"#);
    }

    #[test]
    fn key_order_in_source_is_irrelevant() {
        let a: Value = serde_json::from_str(r#"{"x":1,"y":2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y":2,"x":1}"#).unwrap();
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn roundtrip_is_fixpoint() {
        let v = json!({"s": "a\nb\u{1}", "n": [1, 2.5, -3], "e": {}});
        let first = canonical_json_bytes(&v).unwrap();
        let reparsed: Value = serde_json::from_slice(&first).unwrap();
        let second = canonical_json_bytes(&reparsed).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn control_chars_escaped() {
        let v = json!("\u{0} \u{1f}");
        let s = canonical_json_string(&v).unwrap();
        assert_eq!(s, "\"\\u0000 \\u001f\"");
    }

    #[test]
    fn short_escapes_used() {
        let v = json!("\"\\\n\r\t\u{8}\u{c}");
        let s = canonical_json_string(&v).unwrap();
        assert_eq!(s, r#""\"\\\n\r\t\b\f""#);
    }

    #[test]
    fn numbers_shortest_form() {
        assert_eq!(canonical_json_string(&json!(0)).unwrap(), "0");
        assert_eq!(canonical_json_string(&json!(-7)).unwrap(), "-7");
        assert_eq!(
            canonical_json_string(&json!(u64::MAX)).unwrap(),
            u64::MAX.to_string()
        );
        assert_eq!(canonical_json_string(&json!(2.5)).unwrap(), "2.5");
        assert_eq!(canonical_json_string(&json!(-0.0)).unwrap(), "0");
    }

    #[test]
    fn hash_format() {
        let h = content_hash(&json!({"k": "v"})).unwrap();
        assert!(is_content_hash(&h));
        assert!(h.starts_with("sha256:"));
        assert_eq!(h.len(), "sha256:".len() + 64);
    }

    #[test]
    fn hash_rejects_uppercase_and_wrong_length() {
        assert!(!is_content_hash("sha256:ABC"));
        assert!(!is_content_hash("sha256:"));
        assert!(!is_content_hash("md5:00"));
        let upper = format!("sha256:{}", "A".repeat(64));
        assert!(!is_content_hash(&upper));
    }

    #[test]
    fn line_has_single_trailing_newline() {
        let line = canonical_json_line(&json!({})).unwrap();
        assert_eq!(line, b"{}\n");
    }

    #[test]
    fn short_hash_is_16_hex() {
        let id = short_hash16(&json!({"goal": "x"})).unwrap();
        assert_eq!(id.len(), 16);
        assert!(id.bytes().all(|b| b.is_ascii_hexdigit()));
    }
}
