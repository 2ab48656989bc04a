//! # Transport Encoding
//!
//! Keys, nonces and ciphertext travel as base64 text. Peers in the wild emit
//! both the standard and the URL-safe alphabet, with or without padding, so
//! every decode in this crate goes through one lenient path and every encode
//! produces one canonical form: padded standard base64.
//!
//! ```text
//! "q83v-_8..."   (URL-safe, unpadded)  ─┐
//! "q83v+/8...="  (standard, padded)    ─┼──► normalize() ──► "q83v+/8...="
//! "q83v+/8..."   (standard, unpadded)  ─┘
//! ```

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{Error, Result};

/// Size in bytes of every Curve25519 key handled by this crate
pub const KEY_SIZE: usize = 32;

/// Rewrite any accepted base64 variant into padded standard alphabet.
fn to_standard_alphabet(text: &str) -> String {
    let mut standard: String = text
        .trim()
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let pad = standard.len() % 4;
    if pad != 0 {
        standard.extend(std::iter::repeat('=').take(4 - pad));
    }
    standard
}

/// Decode base64 text in either alphabet, padded or not.
pub fn decode(text: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(to_standard_alphabet(text))
}

/// Encode bytes in the canonical transport form.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Normalize any accepted base64 text to the canonical form.
///
/// Fails with `InvalidKeyFormat` when the text is not base64 in either
/// alphabet after padding repair.
pub fn normalize(text: &str) -> Result<String> {
    let bytes = decode(text).map_err(|e| Error::InvalidKeyFormat(e.to_string()))?;
    Ok(encode(&bytes))
}

/// Decode a transport-encoded Curve25519 key.
pub fn decode_key(text: &str) -> Result<[u8; KEY_SIZE]> {
    if text.trim().is_empty() {
        return Err(Error::InvalidKeyFormat("key is empty".into()));
    }

    let bytes = decode(text).map_err(|e| Error::InvalidKeyFormat(e.to_string()))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        Error::InvalidKeyFormat(format!("expected {} bytes, got {}", KEY_SIZE, len))
    })
}

/// Normalize a key string, checking that it decodes to a 32-byte key.
pub fn normalize_key(text: &str) -> Result<String> {
    decode_key(text).map(|bytes| encode(&bytes))
}

/// Serde helper for byte vectors as transport base64
pub(crate) mod base64_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::decode(&s).map_err(de::Error::custom)
    }
}

/// Serde helper for fixed-size byte arrays as transport base64
pub(crate) mod base64_array {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = super::decode(&s).map_err(de::Error::custom)?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| de::Error::custom(format!("expected {} bytes, got {}", N, len)))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    #[test]
    fn test_normalize_accepts_url_safe_unpadded() {
        let bytes = [0xfbu8, 0xff, 0xbf, 0x01, 0x02];
        let url_safe = URL_SAFE_NO_PAD.encode(bytes);
        assert!(url_safe.contains('-') || url_safe.contains('_'));

        let normalized = normalize(&url_safe).unwrap();
        assert_eq!(normalized, STANDARD.encode(bytes));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let canonical = STANDARD.encode([7u8; 32]);
        assert_eq!(normalize(&canonical).unwrap(), canonical);
        assert_eq!(normalize(&normalize(&canonical).unwrap()).unwrap(), canonical);
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(matches!(
            normalize("not base64 at all!"),
            Err(Error::InvalidKeyFormat(_))
        ));
    }

    #[test]
    fn test_decode_key_checks_length() {
        let short = STANDARD.encode([1u8; 16]);
        assert!(matches!(decode_key(&short), Err(Error::InvalidKeyFormat(_))));
        assert!(matches!(decode_key(""), Err(Error::InvalidKeyFormat(_))));

        let key = [9u8; 32];
        let url_safe = URL_SAFE_NO_PAD.encode(key);
        assert_eq!(decode_key(&url_safe).unwrap(), key);
    }

    #[test]
    fn test_normalize_key_trims_whitespace() {
        let key = STANDARD.encode([3u8; 32]);
        let padded = format!("  {}\n", key);
        assert_eq!(normalize_key(&padded).unwrap(), key);
    }
}
