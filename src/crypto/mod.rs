/// Signing and signature verification for DID messages
///
/// Ed25519 via ed25519-dalek, secp256k1 ECDSA (SHA-256) via k256.

use crate::{
    codec::KeyType,
    error::{DidError, DidResult},
    event::PublicKeyMaterial,
};
use ed25519_dalek::{Signer as _, Verifier as _};
use tracing::debug;

/// Verifies detached message signatures against a public key
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, message: &[u8], signature: &[u8], key: &PublicKeyMaterial) -> bool;
}

/// Verifier for the key types DID events can carry
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultVerifier;

impl SignatureVerifier for DefaultVerifier {
    fn verify(&self, message: &[u8], signature: &[u8], key: &PublicKeyMaterial) -> bool {
        let result = match key.key_type() {
            KeyType::Ed25519 => verify_ed25519(message, signature, key.raw()),
            KeyType::Secp256k1 => verify_secp256k1(message, signature, key.raw()),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                debug!("Signature rejected: {}", e);
                false
            }
        }
    }
}

fn verify_ed25519(message: &[u8], signature: &[u8], key: &[u8]) -> DidResult<()> {
    let key_bytes: [u8; 32] = key
        .try_into()
        .map_err(|_| DidError::UnsupportedKeyLength(key.len()))?;
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| DidError::Signature(format!("Invalid Ed25519 key: {}", e)))?;
    let signature = ed25519_dalek::Signature::from_slice(signature)
        .map_err(|e| DidError::Signature(format!("Invalid Ed25519 signature: {}", e)))?;

    verifying_key
        .verify(message, &signature)
        .map_err(|e| DidError::Signature(format!("Ed25519 verification failed: {}", e)))
}

fn verify_secp256k1(message: &[u8], signature: &[u8], key: &[u8]) -> DidResult<()> {
    let verifying_key = k256::ecdsa::VerifyingKey::from_sec1_bytes(key)
        .map_err(|e| DidError::Signature(format!("Invalid secp256k1 key: {}", e)))?;
    let signature = k256::ecdsa::Signature::from_slice(signature)
        .map_err(|e| DidError::Signature(format!("Invalid secp256k1 signature: {}", e)))?;

    verifying_key
        .verify(message, &signature)
        .map_err(|e| DidError::Signature(format!("secp256k1 verification failed: {}", e)))
}

/// Private key able to sign DID messages
pub enum KeySigner {
    Ed25519(ed25519_dalek::SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
}

impl KeySigner {
    /// Create a signer from a 32-byte private key
    pub fn from_bytes(key_type: KeyType, private_key: &[u8]) -> DidResult<Self> {
        if private_key.len() != 32 {
            return Err(DidError::Validation(
                "Private key must be exactly 32 bytes".to_string(),
            ));
        }

        match key_type {
            KeyType::Ed25519 => {
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(private_key);
                Ok(KeySigner::Ed25519(ed25519_dalek::SigningKey::from_bytes(&bytes)))
            }
            KeyType::Secp256k1 => {
                let signing_key = k256::ecdsa::SigningKey::from_slice(private_key)
                    .map_err(|e| DidError::Validation(format!("Invalid private key: {}", e)))?;
                Ok(KeySigner::Secp256k1(signing_key))
            }
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            KeySigner::Ed25519(_) => KeyType::Ed25519,
            KeySigner::Secp256k1(_) => KeyType::Secp256k1,
        }
    }

    /// Sign raw bytes
    ///
    /// Ed25519 signatures are 64 bytes; secp256k1 signatures are 64-byte r||s.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            KeySigner::Ed25519(key) => key.sign(message).to_bytes().to_vec(),
            KeySigner::Secp256k1(key) => {
                let signature: k256::ecdsa::Signature = key.sign(message);
                signature.to_bytes().to_vec()
            }
        }
    }

    /// Raw public key (compressed for secp256k1)
    pub fn public_key(&self) -> Vec<u8> {
        match self {
            KeySigner::Ed25519(key) => key.verifying_key().to_bytes().to_vec(),
            KeySigner::Secp256k1(key) => key
                .verifying_key()
                .to_encoded_point(true)
                .as_bytes()
                .to_vec(),
        }
    }

    /// Public key in its conventional multibase format
    pub fn public_key_material(&self) -> DidResult<PublicKeyMaterial> {
        PublicKeyMaterial::multibase_key(&self.public_key())
    }
}
