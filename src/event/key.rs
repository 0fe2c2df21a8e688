/// Public key material carried by owner and verification method events
use crate::{
    codec::{
        add_multicodec_prefix, jwk_from_raw, jwk_to_raw, multibase_decode, multibase_encode,
        normalize_public_key, remove_multicodec_prefix, Jwk, JwkCurve, KeyType,
    },
    error::{DidError, DidResult},
};
use serde::{Deserialize, Serialize};

/// Verification method `type` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublicKeyFormat {
    Ed25519VerificationKey2020,
    EcdsaSecp256k1VerificationKey2020,
    JsonWebKey2020,
}

impl PublicKeyFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicKeyFormat::Ed25519VerificationKey2020 => "Ed25519VerificationKey2020",
            PublicKeyFormat::EcdsaSecp256k1VerificationKey2020 => {
                "EcdsaSecp256k1VerificationKey2020"
            }
            PublicKeyFormat::JsonWebKey2020 => "JsonWebKey2020",
        }
    }

    /// Multibase format conventionally used for a key type
    pub fn multibase_for(key_type: KeyType) -> Self {
        match key_type {
            KeyType::Ed25519 => PublicKeyFormat::Ed25519VerificationKey2020,
            KeyType::Secp256k1 => PublicKeyFormat::EcdsaSecp256k1VerificationKey2020,
        }
    }

    fn accepts(&self, key_type: KeyType) -> bool {
        matches!(
            (self, key_type),
            (PublicKeyFormat::Ed25519VerificationKey2020, KeyType::Ed25519)
                | (PublicKeyFormat::EcdsaSecp256k1VerificationKey2020, KeyType::Secp256k1)
                | (PublicKeyFormat::JsonWebKey2020, _)
        )
    }
}

/// A validated public key together with the format it is published in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKeyMaterial {
    key_type: KeyType,
    format: PublicKeyFormat,
    raw: Vec<u8>,
}

impl PublicKeyMaterial {
    /// Wrap raw key bytes, detecting the key type
    ///
    /// Uncompressed secp256k1 keys are stored compressed.
    pub fn new(format: PublicKeyFormat, raw: &[u8]) -> DidResult<Self> {
        let (key_type, raw) = normalize_public_key(raw)?;

        if !format.accepts(key_type) {
            return Err(DidError::Validation(format!(
                "{} key cannot be published as {}",
                key_type.as_str(),
                format.as_str()
            )));
        }

        Ok(Self {
            key_type,
            format,
            raw,
        })
    }

    /// Raw key in the multibase format matching its type
    pub fn multibase_key(raw: &[u8]) -> DidResult<Self> {
        let key_type = crate::codec::detect_key_type(raw)?;
        Self::new(PublicKeyFormat::multibase_for(key_type), raw)
    }

    /// Parse a multicodec-prefixed multibase key
    pub fn from_multibase(format: PublicKeyFormat, encoded: &str) -> DidResult<Self> {
        let codec = match format {
            PublicKeyFormat::Ed25519VerificationKey2020 => KeyType::Ed25519.multicodec(),
            PublicKeyFormat::EcdsaSecp256k1VerificationKey2020 => {
                KeyType::Secp256k1.multicodec()
            }
            PublicKeyFormat::JsonWebKey2020 => {
                return Err(DidError::Validation(
                    "JsonWebKey2020 keys must be given as publicKeyJwk".to_string(),
                ))
            }
        };

        let prefixed = multibase_decode(encoded)?;
        let raw = remove_multicodec_prefix(codec, &prefixed)?;
        Self::new(format, &raw)
    }

    /// Parse a JWK key; only Ed25519 and secp256k1 keys are accepted
    pub fn from_jwk(format: PublicKeyFormat, jwk: &Jwk) -> DidResult<Self> {
        if format != PublicKeyFormat::JsonWebKey2020 {
            return Err(DidError::Validation(format!(
                "{} keys must be given as publicKeyMultibase",
                format.as_str()
            )));
        }

        match jwk.curve()? {
            JwkCurve::Ed25519 | JwkCurve::Secp256k1 => {}
            other => {
                return Err(DidError::Validation(format!(
                    "Unsupported key type for verification: {}",
                    other.as_str()
                )))
            }
        }

        let raw = jwk_to_raw(jwk)?;
        Self::new(format, &raw)
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn format(&self) -> PublicKeyFormat {
        self.format
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Whether the key is rendered as a JWK rather than multibase
    pub fn is_jwk(&self) -> bool {
        self.format == PublicKeyFormat::JsonWebKey2020
    }

    /// Multicodec-prefixed multibase rendering
    pub fn to_multibase(&self) -> DidResult<String> {
        if self.is_jwk() {
            return Err(DidError::Validation(
                "JsonWebKey2020 keys cannot be rendered as multibase".to_string(),
            ));
        }
        Ok(multibase_encode(&add_multicodec_prefix(
            self.key_type.multicodec(),
            &self.raw,
        )))
    }

    /// JWK rendering, only for `JsonWebKey2020` keys
    pub fn to_jwk(&self) -> DidResult<Jwk> {
        if !self.is_jwk() {
            return Err(DidError::Validation(format!(
                "{} keys cannot be rendered as JWK",
                self.format.as_str()
            )));
        }
        let curve = match self.key_type {
            KeyType::Ed25519 => JwkCurve::Ed25519,
            KeyType::Secp256k1 => JwkCurve::Secp256k1,
        };
        jwk_from_raw(curve, &self.raw)
    }
}
