//! Strict CBOR decoding helpers
//!
//! WebAuthn payloads are definite-length CBOR. Decoding here rejects
//! indefinite lengths, duplicate map keys, and trailing bytes, and offers a
//! header-walking length scanner so structures embedded mid-buffer (the COSE
//! key inside authenticator data, the trailing extension map) are consumed
//! exactly.

use ciborium::Value;

use crate::error::{WebAuthnError, WebAuthnResult};

/// Nesting bound for the length scanner and duplicate-key walk.
const MAX_NESTING_DEPTH: usize = 16;

fn malformed(msg: &str) -> WebAuthnError {
    WebAuthnError::MalformedData(msg.to_string())
}

/// Decodes exactly one CBOR item covering the whole input.
///
/// Trailing bytes, indefinite lengths, and duplicate map keys are all
/// structural violations.
pub fn decode(data: &[u8]) -> WebAuthnResult<Value> {
    let consumed = item_length(data)?;
    if consumed != data.len() {
        return Err(malformed("trailing bytes after CBOR item"));
    }
    let value: Value = ciborium::from_reader(data)
        .map_err(|e| WebAuthnError::MalformedData(format!("CBOR decode: {e}")))?;
    reject_duplicate_keys(&value, 0)?;
    Ok(value)
}

/// Returns the encoded length in bytes of the first CBOR item in `data`.
///
/// Walks headers only; every length read is bounds-checked before use so a
/// hostile length field cannot push an offset past the buffer.
pub fn item_length(data: &[u8]) -> WebAuthnResult<usize> {
    let end = walk_item(data, 0, 0)?;
    Ok(end)
}

fn walk_item(data: &[u8], pos: usize, depth: usize) -> WebAuthnResult<usize> {
    if depth > MAX_NESTING_DEPTH {
        return Err(malformed("CBOR nesting too deep"));
    }
    let initial = *data.get(pos).ok_or_else(|| malformed("CBOR item truncated"))?;
    let major = initial >> 5;
    let additional = initial & 0x1f;

    let (argument, mut cursor) = match additional {
        0..=23 => (u64::from(additional), pos + 1),
        24 => {
            let b = *data.get(pos + 1).ok_or_else(|| malformed("CBOR length truncated"))?;
            (u64::from(b), pos + 2)
        }
        25 => (read_be(data, pos + 1, 2)?, pos + 3),
        26 => (read_be(data, pos + 1, 4)?, pos + 5),
        27 => (read_be(data, pos + 1, 8)?, pos + 9),
        // 28..=30 are reserved, 31 is indefinite length
        _ => return Err(malformed("indefinite or reserved CBOR length")),
    };

    match major {
        // Integers and simple values: the argument is the value itself.
        0 | 1 | 7 => Ok(cursor),
        // Byte and text strings: the argument is a payload length.
        2 | 3 => {
            let len = usize::try_from(argument).map_err(|_| malformed("CBOR length overflow"))?;
            let end = cursor.checked_add(len).ok_or_else(|| malformed("CBOR length overflow"))?;
            if end > data.len() {
                return Err(malformed("CBOR string exceeds buffer"));
            }
            Ok(end)
        }
        // Array: the argument counts elements.
        4 => {
            for _ in 0..argument {
                cursor = walk_item(data, cursor, depth + 1)?;
            }
            Ok(cursor)
        }
        // Map: the argument counts key/value pairs.
        5 => {
            for _ in 0..argument {
                cursor = walk_item(data, cursor, depth + 1)?;
                cursor = walk_item(data, cursor, depth + 1)?;
            }
            Ok(cursor)
        }
        // Tag: one nested item follows.
        6 => walk_item(data, cursor, depth + 1),
        _ => unreachable!("major type is three bits"),
    }
}

fn read_be(data: &[u8], pos: usize, width: usize) -> WebAuthnResult<u64> {
    let end = pos.checked_add(width).ok_or_else(|| malformed("CBOR length overflow"))?;
    let bytes = data.get(pos..end).ok_or_else(|| malformed("CBOR length truncated"))?;
    let mut value: u64 = 0;
    for &b in bytes {
        value = (value << 8) | u64::from(b);
    }
    Ok(value)
}

fn reject_duplicate_keys(value: &Value, depth: usize) -> WebAuthnResult<()> {
    if depth > MAX_NESTING_DEPTH {
        return Err(malformed("CBOR nesting too deep"));
    }
    match value {
        Value::Map(entries) => {
            for (i, (key, _)) in entries.iter().enumerate() {
                if entries.iter().skip(i + 1).any(|(other, _)| other == key) {
                    return Err(malformed("duplicate CBOR map key"));
                }
            }
            for (key, entry) in entries {
                reject_duplicate_keys(key, depth + 1)?;
                reject_duplicate_keys(entry, depth + 1)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                reject_duplicate_keys(item, depth + 1)?;
            }
            Ok(())
        }
        Value::Tag(_, inner) => reject_duplicate_keys(inner, depth + 1),
        _ => Ok(()),
    }
}

// Map accessors over decoded values, keyed by text.

pub fn map_text<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a str> {
    map.iter().find(|(k, _)| k.as_text() == Some(key)).and_then(|(_, v)| v.as_text())
}

pub fn map_bytes<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a [u8]> {
    map.iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .and_then(|(_, v)| v.as_bytes())
        .map(|v| v.as_slice())
}

pub fn map_map<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a [(Value, Value)]> {
    map.iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .and_then(|(_, v)| v.as_map())
        .map(|v| v.as_slice())
}

pub fn map_array<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a [Value]> {
    map.iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .and_then(|(_, v)| v.as_array())
        .map(|v| v.as_slice())
}

pub fn map_int(map: &[(Value, Value)], key: &str) -> Option<i64> {
    map.iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .and_then(|(_, v)| v.as_integer())
        .and_then(|i| i64::try_from(i).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_cbor(value: &Value) -> Vec<u8> {
        let mut bytes = Vec::new();
        ciborium::into_writer(value, &mut bytes).expect("encodes");
        bytes
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bytes = to_cbor(&Value::Integer(7.into()));
        bytes.push(0x00);
        assert!(matches!(decode(&bytes), Err(WebAuthnError::MalformedData(_))));
    }

    #[test]
    fn test_decode_rejects_duplicate_map_keys() {
        // {"a": 1, "a": 2} encoded by hand: ciborium will not emit duplicates
        let bytes = hex::decode("a2616101616102").expect("hex");
        assert!(matches!(decode(&bytes), Err(WebAuthnError::MalformedData(_))));
    }

    #[test]
    fn test_decode_rejects_indefinite_length() {
        // 0x5f = byte string, indefinite length
        let bytes = [0x5f, 0x41, 0x01, 0xff];
        assert!(matches!(decode(&bytes), Err(WebAuthnError::MalformedData(_))));
    }

    #[test]
    fn test_decode_accepts_nested_map() {
        let value = Value::Map(vec![
            (Value::Text("fmt".to_string()), Value::Text("none".to_string())),
            (Value::Text("attStmt".to_string()), Value::Map(vec![])),
        ]);
        let bytes = to_cbor(&value);
        let decoded = decode(&bytes).expect("decodes");
        let map = decoded.as_map().expect("map");
        assert_eq!(map_text(map, "fmt"), Some("none"));
        assert!(map_map(map, "attStmt").expect("attStmt").is_empty());
    }

    #[test]
    fn test_item_length_measures_first_item_only() {
        let first = to_cbor(&Value::Map(vec![(
            Value::Integer(1.into()),
            Value::Bytes(vec![0xaa; 40]),
        )]));
        let mut bytes = first.clone();
        bytes.extend_from_slice(&[0x01, 0x02, 0x03]);
        assert_eq!(item_length(&bytes).expect("length"), first.len());
    }

    #[test]
    fn test_item_length_rejects_hostile_length() {
        // byte string claiming u64::MAX length
        let bytes = [0x5b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        assert!(item_length(&bytes).is_err());
    }

    #[test]
    fn test_item_length_walks_tags() {
        // tag 2 (big integer) wrapping a 3-byte string
        let bytes = [0xc2, 0x43, 0x01, 0x02, 0x03];
        assert_eq!(item_length(&bytes).expect("length"), bytes.len());
    }

    #[test]
    fn test_map_int_reads_negative_values() {
        let value = Value::Map(vec![(
            Value::Text("alg".to_string()),
            Value::Integer((-7).into()),
        )]);
        let bytes = to_cbor(&value);
        let decoded = decode(&bytes).expect("decodes");
        assert_eq!(map_int(decoded.as_map().expect("map"), "alg"), Some(-7));
    }
}
