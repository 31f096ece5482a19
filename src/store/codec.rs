//! Value codec: a one-byte schema version followed by a 4-byte big-endian
//! length prefix and a JSON payload. Readers ignore unknown trailing bytes
//! after the declared length, for forward compatibility.

use crate::error::{StoreError, StoreResult};
use serde::{Serialize, de::DeserializeOwned};

const SCHEMA_VERSION: u8 = 1;

pub fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    let payload = serde_json::to_vec(value).map_err(|e| StoreError::Codec(e.to_string()))?;
    let mut buf = Vec::with_capacity(5 + payload.len());
    buf.push(SCHEMA_VERSION);
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    if bytes.len() < 5 {
        return Err(StoreError::Codec("value shorter than codec header".into()));
    }
    let version = bytes[0];
    if version != SCHEMA_VERSION {
        return Err(StoreError::Codec(format!("unsupported schema version {version}")));
    }
    let len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    let end = 5 + len;
    let payload = bytes
        .get(5..end.min(bytes.len()))
        .ok_or_else(|| StoreError::Codec("declared length exceeds value bytes".into()))?;
    serde_json::from_slice(payload).map_err(|e| StoreError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[test]
    fn round_trips_a_value() {
        let value = Sample { a: 7, b: "hi".into() };
        let encoded = encode(&value).unwrap();
        let decoded: Sample = decode(&encoded).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn tolerates_trailing_bytes_after_declared_length() {
        let value = Sample { a: 1, b: "x".into() };
        let mut encoded = encode(&value).unwrap();
        encoded.extend_from_slice(b"future-field-junk");
        let decoded: Sample = decode(&encoded).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn rejects_truncated_header() {
        let result: StoreResult<Sample> = decode(&[1, 0, 0]);
        assert!(result.is_err());
    }
}
