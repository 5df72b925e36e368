//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 milliseconds)
//!
//! Everything that is signed or sent to a key server (session certificates,
//! request payloads, proof transactions, AAD) goes through this encoder, so
//! the same value always produces the same bytes.

use ciborium::value::{Integer, Value};

use crate::error::{CoreError, Result};

/// Encode a CBOR value to canonical bytes.
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

/// Decode bytes that must already be in canonical form.
///
/// Non-canonical input is rejected, so two different byte strings can
/// never decode to the same value.
pub fn decode_canonical(bytes: &[u8]) -> Result<Value> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::Decoding(e.to_string()))?;
    if encode_canonical(&value)? != bytes {
        return Err(CoreError::Decoding("input is not canonical CBOR".into()));
    }
    Ok(value)
}

/// Build an unsigned integer value.
pub fn uint(n: u64) -> Value {
    Value::Integer(n.into())
}

/// Build a signed integer value.
pub fn int(n: i64) -> Value {
    Value::Integer(n.into())
}

/// Build a byte string value.
pub fn bytes(b: &[u8]) -> Value {
    Value::Bytes(b.to_vec())
}

/// Build a text value.
pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// Build a map with integer keys.
pub fn int_map(entries: Vec<(u64, Value)>) -> Value {
    Value::Map(entries.into_iter().map(|(k, v)| (uint(k), v)).collect())
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => {
            return Err(CoreError::Encoding(
                "floats not supported in canonical encoding".into(),
            ))
        }
        _ => return Err(CoreError::Encoding("unsupported CBOR value type".into())),
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n: i128 = i.into();
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<()> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(CoreError::Encoding("duplicate map key".into()));
    }

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

/// Read access to a map with integer keys.
pub struct CanonicalMap<'a> {
    what: &'static str,
    entries: &'a [(Value, Value)],
}

impl<'a> CanonicalMap<'a> {
    /// View `value` as an integer-keyed map describing `what`.
    pub fn new(value: &'a Value, what: &'static str) -> Result<Self> {
        match value {
            Value::Map(entries) => Ok(Self { what, entries }),
            _ => Err(CoreError::Decoding(format!("{what}: expected map"))),
        }
    }

    pub fn get(&self, key: u64) -> Option<&'a Value> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
            .map(|(_, v)| v)
    }

    fn missing(&self, field: &str) -> CoreError {
        CoreError::Decoding(format!("{}: missing or invalid {}", self.what, field))
    }

    pub fn uint(&self, key: u64, field: &str) -> Result<u64> {
        match self.get(key) {
            Some(Value::Integer(i)) => {
                u64::try_from(i128::from(*i)).map_err(|_| self.missing(field))
            }
            _ => Err(self.missing(field)),
        }
    }

    pub fn int(&self, key: u64, field: &str) -> Result<i64> {
        match self.get(key) {
            Some(Value::Integer(i)) => {
                i64::try_from(i128::from(*i)).map_err(|_| self.missing(field))
            }
            _ => Err(self.missing(field)),
        }
    }

    pub fn bytes(&self, key: u64, field: &str) -> Result<&'a [u8]> {
        match self.get(key) {
            Some(Value::Bytes(b)) => Ok(b),
            _ => Err(self.missing(field)),
        }
    }

    pub fn bytes32(&self, key: u64, field: &str) -> Result<[u8; 32]> {
        self.bytes(key, field)?
            .try_into()
            .map_err(|_| self.missing(field))
    }

    pub fn text(&self, key: u64, field: &str) -> Result<&'a str> {
        match self.get(key) {
            Some(Value::Text(s)) => Ok(s),
            _ => Err(self.missing(field)),
        }
    }

    pub fn array(&self, key: u64, field: &str) -> Result<&'a [Value]> {
        match self.get(key) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(self.missing(field)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        buf.clear();
        encode_integer(&mut buf, (-1i64).into());
        assert_eq!(buf, vec![0x20]);
    }

    #[test]
    fn test_map_key_ordering() {
        let value = int_map(vec![(8, uint(80)), (0, uint(0)), (5, uint(50))]);
        let buf = encode_canonical(&value).unwrap();

        assert_eq!(buf[0], 0xa3);
        assert_eq!(&buf[1..3], &[0x00, 0x00]);
        assert_eq!(&buf[3..6], &[0x05, 0x18, 50]);
        assert_eq!(&buf[6..9], &[0x08, 0x18, 80]);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let value = int_map(vec![(1, uint(1)), (1, uint(2))]);
        assert!(encode_canonical(&value).is_err());
    }

    #[test]
    fn test_floats_rejected() {
        assert!(encode_canonical(&Value::Float(1.5)).is_err());
    }

    #[test]
    fn test_decode_rejects_non_canonical() {
        // 0x18 0x05 is a non-minimal encoding of 5
        assert!(decode_canonical(&[0x18, 0x05]).is_err());
        assert_eq!(decode_canonical(&[0x05]).unwrap(), uint(5));
    }

    #[test]
    fn test_canonical_map_accessors() {
        let value = int_map(vec![
            (0, uint(7)),
            (1, bytes(&[9u8; 32])),
            (2, text("hi")),
            (3, int(-4)),
        ]);
        let decoded = decode_canonical(&encode_canonical(&value).unwrap()).unwrap();
        let map = CanonicalMap::new(&decoded, "test").unwrap();

        assert_eq!(map.uint(0, "a").unwrap(), 7);
        assert_eq!(map.bytes32(1, "b").unwrap(), [9u8; 32]);
        assert_eq!(map.text(2, "c").unwrap(), "hi");
        assert_eq!(map.int(3, "d").unwrap(), -4);
        assert!(map.uint(9, "missing").is_err());
        assert!(map.text(0, "wrong type").is_err());
    }
}
