/// JSON Web Key conversion
///
/// EC keys (secp256k1, P-256) convert to and from compressed SEC1 points;
/// OKP keys (Ed25519, X25519) carry the raw key in `x`.
use crate::error::{DidError, DidResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

/// Curves supported for JWK conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwkCurve {
    Secp256k1,
    P256,
    Ed25519,
    X25519,
}

impl JwkCurve {
    /// JWK `crv` value
    pub fn as_str(&self) -> &'static str {
        match self {
            JwkCurve::Secp256k1 => "secp256k1",
            JwkCurve::P256 => "P-256",
            JwkCurve::Ed25519 => "Ed25519",
            JwkCurve::X25519 => "X25519",
        }
    }

    /// JWK `kty` value
    pub fn key_type(&self) -> &'static str {
        match self {
            JwkCurve::Secp256k1 | JwkCurve::P256 => "EC",
            JwkCurve::Ed25519 | JwkCurve::X25519 => "OKP",
        }
    }

    pub fn parse(crv: &str) -> DidResult<Self> {
        match crv {
            "secp256k1" => Ok(JwkCurve::Secp256k1),
            "P-256" => Ok(JwkCurve::P256),
            "Ed25519" => Ok(JwkCurve::Ed25519),
            "X25519" => Ok(JwkCurve::X25519),
            other => Err(DidError::Decode(format!("Unsupported JWK curve: {}", other))),
        }
    }
}

/// Public JSON Web Key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl Jwk {
    pub fn curve(&self) -> DidResult<JwkCurve> {
        JwkCurve::parse(&self.crv)
    }
}

/// Build a JWK from a raw public key
///
/// EC keys may be given compressed (33 bytes) or uncompressed (65 bytes).
pub fn jwk_from_raw(curve: JwkCurve, raw: &[u8]) -> DidResult<Jwk> {
    match curve {
        JwkCurve::Ed25519 | JwkCurve::X25519 => {
            if raw.len() != 32 {
                return Err(DidError::UnsupportedKeyLength(raw.len()));
            }
            Ok(Jwk {
                kty: curve.key_type().to_string(),
                crv: curve.as_str().to_string(),
                x: URL_SAFE_NO_PAD.encode(raw),
                y: None,
            })
        }
        JwkCurve::Secp256k1 | JwkCurve::P256 => {
            let uncompressed = uncompressed_point(curve, raw)?;
            // 0x04 || x (32) || y (32)
            Ok(Jwk {
                kty: curve.key_type().to_string(),
                crv: curve.as_str().to_string(),
                x: URL_SAFE_NO_PAD.encode(&uncompressed[1..33]),
                y: Some(URL_SAFE_NO_PAD.encode(&uncompressed[33..65])),
            })
        }
    }
}

/// Convert a JWK back to its raw public key
///
/// EC keys come back as compressed SEC1 points.
pub fn jwk_to_raw(jwk: &Jwk) -> DidResult<Vec<u8>> {
    let curve = jwk.curve()?;
    if jwk.kty != curve.key_type() {
        return Err(DidError::Decode(format!(
            "JWK kty '{}' does not match curve {}",
            jwk.kty,
            curve.as_str()
        )));
    }

    let x = decode_coordinate(&jwk.x, "x")?;

    match curve {
        JwkCurve::Ed25519 | JwkCurve::X25519 => {
            if x.len() != 32 {
                return Err(DidError::UnsupportedKeyLength(x.len()));
            }
            Ok(x)
        }
        JwkCurve::Secp256k1 | JwkCurve::P256 => {
            let y = jwk
                .y
                .as_deref()
                .ok_or_else(|| DidError::Decode("EC JWK is missing 'y'".to_string()))?;
            let y = decode_coordinate(y, "y")?;
            if x.len() != 32 || y.len() != 32 {
                return Err(DidError::Decode(
                    "EC JWK coordinates must be 32 bytes".to_string(),
                ));
            }

            let mut compressed = Vec::with_capacity(33);
            compressed.push(if y[31] & 1 == 0 { 0x02 } else { 0x03 });
            compressed.extend_from_slice(&x);

            // Reject coordinates that are not on the curve
            let point = uncompressed_point(curve, &compressed)?;
            if point[33..65] != y[..] {
                return Err(DidError::Decode("EC JWK 'y' does not match 'x'".to_string()));
            }
            Ok(compressed)
        }
    }
}

fn decode_coordinate(value: &str, name: &str) -> DidResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| DidError::Decode(format!("Invalid JWK '{}' coordinate: {}", name, e)))
}

fn uncompressed_point(curve: JwkCurve, raw: &[u8]) -> DidResult<Vec<u8>> {
    match curve {
        JwkCurve::Secp256k1 => {
            let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(raw)
                .map_err(|e| DidError::Decode(format!("Invalid secp256k1 point: {}", e)))?;
            Ok(key.to_encoded_point(false).as_bytes().to_vec())
        }
        JwkCurve::P256 => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(raw)
                .map_err(|e| DidError::Decode(format!("Invalid P-256 point: {}", e)))?;
            Ok(key.to_encoded_point(false).as_bytes().to_vec())
        }
        JwkCurve::Ed25519 | JwkCurve::X25519 => Err(DidError::Decode(format!(
            "{} keys are not SEC1 points",
            curve.as_str()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secp256k1_jwk_roundtrip() {
        let signing_key = k256::ecdsa::SigningKey::from_slice(&[42u8; 32]).unwrap();
        let compressed = signing_key.verifying_key().to_encoded_point(true);

        let jwk = jwk_from_raw(JwkCurve::Secp256k1, compressed.as_bytes()).unwrap();
        assert_eq!(jwk.kty, "EC");
        assert_eq!(jwk.crv, "secp256k1");
        assert!(jwk.y.is_some());

        assert_eq!(jwk_to_raw(&jwk).unwrap(), compressed.as_bytes());
    }

    #[test]
    fn test_p256_jwk_from_uncompressed() {
        let signing_key = p256::ecdsa::SigningKey::from_slice(&[7u8; 32]).unwrap();
        let uncompressed = signing_key.verifying_key().to_encoded_point(false);
        let compressed = signing_key.verifying_key().to_encoded_point(true);

        let jwk = jwk_from_raw(JwkCurve::P256, uncompressed.as_bytes()).unwrap();
        assert_eq!(jwk.crv, "P-256");
        assert_eq!(jwk_to_raw(&jwk).unwrap(), compressed.as_bytes());
    }

    #[test]
    fn test_okp_jwk() {
        let raw = [3u8; 32];
        let jwk = jwk_from_raw(JwkCurve::Ed25519, &raw).unwrap();
        assert_eq!(jwk.kty, "OKP");
        assert!(jwk.y.is_none());
        assert_eq!(jwk_to_raw(&jwk).unwrap(), raw.to_vec());

        let x25519 = jwk_from_raw(JwkCurve::X25519, &raw).unwrap();
        assert_eq!(x25519.crv, "X25519");
    }

    #[test]
    fn test_unsupported_curve_is_decode_error() {
        let jwk = Jwk {
            kty: "EC".to_string(),
            crv: "P-384".to_string(),
            x: "AA".to_string(),
            y: Some("AA".to_string()),
        };
        assert!(matches!(jwk_to_raw(&jwk), Err(DidError::Decode(_))));
    }

    #[test]
    fn test_ec_jwk_off_curve_rejected() {
        let jwk = Jwk {
            kty: "EC".to_string(),
            crv: "secp256k1".to_string(),
            x: URL_SAFE_NO_PAD.encode([0xffu8; 32]),
            y: Some(URL_SAFE_NO_PAD.encode([0x01u8; 32])),
        };
        assert!(jwk_to_raw(&jwk).is_err());
    }

    #[test]
    fn test_ec_jwk_with_mismatched_y_rejected() {
        let signing_key = k256::ecdsa::SigningKey::from_slice(&[42u8; 32]).unwrap();
        let compressed = signing_key.verifying_key().to_encoded_point(true);
        let mut jwk = jwk_from_raw(JwkCurve::Secp256k1, compressed.as_bytes()).unwrap();

        // Same parity bit, wrong coordinate
        let y = decode_coordinate(jwk.y.as_deref().unwrap(), "y").unwrap();
        let mut forged = [0u8; 32];
        forged[31] = y[31] & 1;
        jwk.y = Some(URL_SAFE_NO_PAD.encode(forged));

        assert!(matches!(jwk_to_raw(&jwk), Err(DidError::Decode(_))));
    }
}
