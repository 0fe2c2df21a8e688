/// Key and codec utilities
///
/// Multibase (base58btc) and multicodec framing for public keys, key-type
/// detection from raw bytes, and JWK conversion. Everything here is pure.

pub mod jwk;

pub use jwk::{jwk_from_raw, jwk_to_raw, Jwk, JwkCurve};

use crate::error::{DidError, DidResult};
use serde::{Deserialize, Serialize};

/// Multibase prefix for base58btc
pub const MULTIBASE_BASE58BTC_PREFIX: char = 'z';

/// Supported public key algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    Ed25519,
    Secp256k1,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "Ed25519",
            KeyType::Secp256k1 => "Secp256k1",
        }
    }

    /// Multicodec used for this key type's public keys
    pub fn multicodec(&self) -> Multicodec {
        match self {
            KeyType::Ed25519 => Multicodec::Ed25519Pub,
            KeyType::Secp256k1 => Multicodec::Secp256k1Pub,
        }
    }
}

/// Multicodec public key codecs, with their varint-encoded prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multicodec {
    Ed25519Pub,
    Secp256k1Pub,
    X25519Pub,
    P256Pub,
}

impl Multicodec {
    /// Varint-encoded codec prefix
    pub fn prefix(&self) -> [u8; 2] {
        match self {
            Multicodec::Ed25519Pub => [0xed, 0x01],
            Multicodec::Secp256k1Pub => [0xe7, 0x01],
            Multicodec::X25519Pub => [0xec, 0x01],
            Multicodec::P256Pub => [0x80, 0x24],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Multicodec::Ed25519Pub => "ed25519-pub",
            Multicodec::Secp256k1Pub => "secp256k1-pub",
            Multicodec::X25519Pub => "x25519-pub",
            Multicodec::P256Pub => "p256-pub",
        }
    }

    fn from_prefix(prefix: &[u8]) -> Option<Self> {
        [
            Multicodec::Ed25519Pub,
            Multicodec::Secp256k1Pub,
            Multicodec::X25519Pub,
            Multicodec::P256Pub,
        ]
        .into_iter()
        .find(|codec| codec.prefix() == prefix)
    }
}

/// Detect the key type of a raw public key from its length and leading byte
///
/// - 32 bytes: Ed25519
/// - 33 bytes starting 0x02/0x03: compressed secp256k1
/// - 65 bytes starting 0x04: uncompressed secp256k1
pub fn detect_key_type(raw: &[u8]) -> DidResult<KeyType> {
    match (raw.len(), raw.first()) {
        (32, _) => Ok(KeyType::Ed25519),
        (33, Some(0x02)) | (33, Some(0x03)) => Ok(KeyType::Secp256k1),
        (65, Some(0x04)) => Ok(KeyType::Secp256k1),
        (len, _) => Err(DidError::UnsupportedKeyLength(len)),
    }
}

/// Detect the key type and bring the key into its canonical raw form
///
/// Uncompressed secp256k1 keys are compressed to 33 bytes.
pub fn normalize_public_key(raw: &[u8]) -> DidResult<(KeyType, Vec<u8>)> {
    let key_type = detect_key_type(raw)?;

    match key_type {
        KeyType::Secp256k1 if raw.len() == 65 => {
            let verifying_key = k256::ecdsa::VerifyingKey::from_sec1_bytes(raw).map_err(|e| {
                DidError::Validation(format!("Invalid secp256k1 public key: {}", e))
            })?;
            let compressed = verifying_key.to_encoded_point(true);
            Ok((key_type, compressed.as_bytes().to_vec()))
        }
        _ => Ok((key_type, raw.to_vec())),
    }
}

/// Prepend the multicodec prefix for `codec`
pub fn add_multicodec_prefix(codec: Multicodec, bytes: &[u8]) -> Vec<u8> {
    let mut prefixed = Vec::with_capacity(bytes.len() + 2);
    prefixed.extend_from_slice(&codec.prefix());
    prefixed.extend_from_slice(bytes);
    prefixed
}

/// Strip the multicodec prefix for `codec`, failing if another codec is stored
pub fn remove_multicodec_prefix(codec: Multicodec, bytes: &[u8]) -> DidResult<Vec<u8>> {
    let expected = codec.prefix();

    if bytes.len() < expected.len() {
        return Err(DidError::CodecMismatch {
            expected: codec.name().to_string(),
            actual: "truncated input".to_string(),
        });
    }

    let (prefix, rest) = bytes.split_at(expected.len());
    if prefix != expected {
        let actual = Multicodec::from_prefix(prefix)
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| format!("0x{:02x}{:02x}", prefix[0], prefix[1]));
        return Err(DidError::CodecMismatch {
            expected: codec.name().to_string(),
            actual,
        });
    }

    Ok(rest.to_vec())
}

/// Encode bytes as a base58btc multibase string ("z" prefix)
pub fn multibase_encode(bytes: &[u8]) -> String {
    format!(
        "{}{}",
        MULTIBASE_BASE58BTC_PREFIX,
        bs58::encode(bytes).into_string()
    )
}

/// Decode a base58btc multibase string
///
/// The "z" prefix is mandatory; no other multibase is accepted.
pub fn multibase_decode(encoded: &str) -> DidResult<Vec<u8>> {
    let body = encoded
        .strip_prefix(MULTIBASE_BASE58BTC_PREFIX)
        .ok_or_else(|| {
            DidError::Decode(format!(
                "Multibase string must start with '{}'",
                MULTIBASE_BASE58BTC_PREFIX
            ))
        })?;

    bs58::decode(body)
        .into_vec()
        .map_err(|e| DidError::Decode(format!("Invalid base58btc: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_ed25519() {
        assert_eq!(detect_key_type(&[7u8; 32]).unwrap(), KeyType::Ed25519);
    }

    #[test]
    fn test_detect_secp256k1_compressed_and_uncompressed() {
        let mut compressed = vec![0x02];
        compressed.extend_from_slice(&[1u8; 32]);
        assert_eq!(detect_key_type(&compressed).unwrap(), KeyType::Secp256k1);

        let mut uncompressed = vec![0x04];
        uncompressed.extend_from_slice(&[1u8; 64]);
        assert_eq!(detect_key_type(&uncompressed).unwrap(), KeyType::Secp256k1);
    }

    #[test]
    fn test_detect_rejects_31_byte_key() {
        let err = detect_key_type(&[7u8; 31]).unwrap_err();
        assert!(matches!(err, DidError::UnsupportedKeyLength(31)));
    }

    #[test]
    fn test_detect_rejects_33_bytes_with_bad_prefix() {
        let mut key = vec![0x05];
        key.extend_from_slice(&[1u8; 32]);
        assert!(detect_key_type(&key).is_err());
    }

    #[test]
    fn test_normalize_compresses_uncompressed_secp256k1() {
        let signing_key = k256::ecdsa::SigningKey::from_slice(&[42u8; 32]).unwrap();
        let uncompressed = signing_key.verifying_key().to_encoded_point(false);
        let compressed = signing_key.verifying_key().to_encoded_point(true);

        let (key_type, raw) = normalize_public_key(uncompressed.as_bytes()).unwrap();
        assert_eq!(key_type, KeyType::Secp256k1);
        assert_eq!(raw, compressed.as_bytes());
    }

    #[test]
    fn test_multicodec_prefix_roundtrip_and_mismatch() {
        let key = [9u8; 32];
        let prefixed = add_multicodec_prefix(Multicodec::Ed25519Pub, &key);
        assert_eq!(&prefixed[..2], &[0xed, 0x01]);
        assert_eq!(
            remove_multicodec_prefix(Multicodec::Ed25519Pub, &prefixed).unwrap(),
            key.to_vec()
        );

        let err = remove_multicodec_prefix(Multicodec::Secp256k1Pub, &prefixed).unwrap_err();
        match err {
            DidError::CodecMismatch { expected, actual } => {
                assert_eq!(expected, "secp256k1-pub");
                assert_eq!(actual, "ed25519-pub");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_multibase_roundtrip() {
        for bytes in [vec![], vec![0u8, 0, 1], vec![255u8; 40], b"hello world".to_vec()] {
            let encoded = multibase_encode(&bytes);
            assert!(encoded.starts_with('z'));
            assert_eq!(multibase_decode(&encoded).unwrap(), bytes);
        }
    }

    #[test]
    fn test_multibase_requires_z_prefix() {
        let encoded = multibase_encode(b"abc");
        let without_prefix = &encoded[1..];
        assert!(matches!(
            multibase_decode(without_prefix),
            Err(DidError::Decode(_))
        ));
        assert!(multibase_decode("f616263").is_err());
    }
}
