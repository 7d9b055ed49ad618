//! # JSON Serialization Module
//!
//! Request bodies are parsed with simd-json; responses are written with
//! serde_json.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse JSON bytes to a typed value using simd-json
///
/// simd-json parses in place, so the buffer is mutated.
///
/// # Errors
///
/// Returns a validation error (400) for malformed input.
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes)
        .map_err(|e| Error::validation(format!("Malformed JSON body: {e}")))
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns [`Error::Json`] if the value cannot be serialized.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::Value;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct NewInvoice {
        comp_code: String,
        amt: f64,
    }

    #[test]
    fn test_parse_json_object() {
        let mut bytes = br#"{"comp_code": "ibm", "amt": 400}"#.to_vec();
        let data: NewInvoice = parse_json_bytes(&mut bytes).unwrap();
        assert_eq!(data.comp_code, "ibm");
        assert_eq!(data.amt, 400.0);
    }

    #[test]
    fn test_parse_json_bytes_value() {
        let mut bytes = br#"{"name": "Google", "description": null}"#.to_vec();
        let value: Value = parse_json_bytes(&mut bytes).unwrap();
        assert_eq!(value["name"], "Google");
        assert!(value["description"].is_null());
    }

    #[test]
    fn test_to_json() {
        let data = NewInvoice {
            comp_code: "apple".to_string(),
            amt: 100.5,
        };
        let json = to_json(&data).unwrap();
        assert!(json.contains("apple"));
        assert!(json.contains("100.5"));
    }

    #[test]
    fn test_invalid_json_is_validation_error() {
        let mut bytes = b"not valid json".to_vec();
        let result: Result<Value> = parse_json_bytes(&mut bytes);
        let err = result.unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(err.to_string().starts_with("Malformed JSON body"));
    }
}
