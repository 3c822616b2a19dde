//! Bounded base64 payload decoding
//!
//! Base64 inflates data by 4/3; the guard allows a small margin on top of
//! that and rejects anything longer *before* decoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::ValidationError;

/// Encoded-to-decoded size ratio tolerated by the guard, in percent
pub const BASE64_EXPANSION_PERCENT: usize = 134;

/// Reject `encoded` if it cannot decode to at most `max_size_bytes`
pub fn check_encoded_size(encoded: &str, max_size_bytes: usize) -> Result<(), ValidationError> {
    let limit = max_size_bytes.saturating_mul(BASE64_EXPANSION_PERCENT) / 100;
    if encoded.len() > limit {
        return Err(ValidationError::PayloadTooLarge {
            max_bytes: max_size_bytes,
            encoded_len: encoded.len(),
        });
    }
    Ok(())
}

/// Decode a base64 payload (optionally a `data:` URL) no larger than
/// `max_size_bytes` once decoded.
pub fn decode_base64_bounded(payload: &str, max_size_bytes: usize) -> Result<Vec<u8>, ValidationError> {
    let encoded = strip_data_url(payload.trim());
    check_encoded_size(encoded, max_size_bytes)?;

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ValidationError::InvalidEncoding(e.to_string()))?;

    if bytes.len() > max_size_bytes {
        return Err(ValidationError::PayloadTooLarge {
            max_bytes: max_size_bytes,
            encoded_len: encoded.len(),
        });
    }

    Ok(bytes)
}

fn strip_data_url(payload: &str) -> &str {
    if payload.starts_with("data:") {
        if let Some((_, data)) = payload.split_once(";base64,") {
            return data;
        }
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_small_payload() {
        let encoded = STANDARD.encode(b"hello nathia");
        let bytes = decode_base64_bounded(&encoded, 64).unwrap();
        assert_eq!(bytes, b"hello nathia");
    }

    #[test]
    fn test_strips_data_url_prefix() {
        let encoded = format!("data:image/png;base64,{}", STANDARD.encode([1u8, 2, 3]));
        assert_eq!(decode_base64_bounded(&encoded, 16).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_oversized_rejected_before_decode() {
        // Not valid base64 at all: a decode attempt would report InvalidEncoding
        let bogus = "!".repeat(1_400);
        let err = decode_base64_bounded(&bogus, 1_000).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::PayloadTooLarge {
                max_bytes: 1_000,
                encoded_len: 1_400
            }
        ));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        assert!(check_encoded_size(&"A".repeat(134), 100).is_ok());
        assert!(check_encoded_size(&"A".repeat(135), 100).is_err());
    }

    #[test]
    fn test_limit_rounds_down() {
        // 7 * 1.34 = 9.38
        assert!(check_encoded_size(&"A".repeat(9), 7).is_ok());
        assert!(check_encoded_size(&"A".repeat(10), 7).is_err());
        assert!(check_encoded_size(&"A".repeat(1_340_000), 1_000_000).is_ok());
        assert!(check_encoded_size(&"A".repeat(1_340_001), 1_000_000).is_err());
        assert!(check_encoded_size("AAAA", usize::MAX).is_ok());
    }

    #[test]
    fn test_invalid_encoding() {
        let err = decode_base64_bounded("@@@@", 100).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidEncoding(_)));
    }
}
