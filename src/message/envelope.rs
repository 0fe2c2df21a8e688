/// Message envelopes
///
/// An envelope pairs the exact JSON bytes of a message with a detached
/// signature over those bytes. The raw bytes are kept as received so that
/// signatures verify without re-serialization.
use crate::{
    error::{DidError, DidResult},
    message::Message,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Deserialize)]
struct EnvelopeIn {
    message: Box<RawValue>,
    #[serde(default)]
    signature: Option<String>,
}

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    message: &'a RawValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<&'a str>,
}

/// A message plus its detached signature
#[derive(Debug, Clone)]
pub struct MessageEnvelope {
    message_json: Box<RawValue>,
    signature: Option<String>,
    opened: OnceLock<Option<Message>>,
    consensus_timestamp: Option<String>,
    sequence_number: Option<u64>,
}

impl MessageEnvelope {
    /// Wrap a freshly built message
    pub fn from_message(message: Message) -> DidResult<Self> {
        let json = String::from_utf8(message.to_json()?)
            .map_err(|e| DidError::Decode(format!("Message is not UTF-8: {}", e)))?;
        let message_json = RawValue::from_string(json)?;

        let opened = OnceLock::new();
        let _ = opened.set(Some(message));

        Ok(Self {
            message_json,
            signature: None,
            opened,
            consensus_timestamp: None,
            sequence_number: None,
        })
    }

    /// Parse an envelope from its JSON form
    pub fn from_json(json: &[u8]) -> DidResult<Self> {
        let envelope: EnvelopeIn = serde_json::from_slice(json)
            .map_err(|e| DidError::Decode(format!("Invalid message envelope: {}", e)))?;

        Ok(Self {
            message_json: envelope.message,
            signature: envelope.signature,
            opened: OnceLock::new(),
            consensus_timestamp: None,
            sequence_number: None,
        })
    }

    /// Serialize the envelope; these are the bytes submitted to the topic
    pub fn to_json(&self) -> DidResult<Vec<u8>> {
        let out = EnvelopeOut {
            message: &self.message_json,
            signature: self.signature.as_deref(),
        };
        Ok(serde_json::to_vec(&out)?)
    }

    /// Decode the message, once; `None` if it does not decode
    pub fn open(&self) -> Option<&Message> {
        self.opened
            .get_or_init(|| match Message::from_json(self.message_bytes()) {
                Ok(message) => Some(message),
                Err(e) => {
                    debug!("Failed to open message envelope: {}", e);
                    None
                }
            })
            .as_ref()
    }

    /// Sign the message bytes and return the signed envelope bytes
    pub fn sign<F>(&mut self, signer: F) -> DidResult<Vec<u8>>
    where
        F: FnOnce(&[u8]) -> Vec<u8>,
    {
        if self.signature.is_some() {
            return Err(DidError::Signature("Message is already signed".to_string()));
        }

        let signature = signer(self.message_bytes());
        self.signature = Some(STANDARD.encode(signature));
        self.to_json()
    }

    /// Canonical message bytes covered by the signature
    pub fn message_bytes(&self) -> &[u8] {
        self.message_json.get().as_bytes()
    }

    /// Base64 signature, also the deduplication key for resolution
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn set_signature(&mut self, signature: impl Into<String>) {
        self.signature = Some(signature.into());
    }

    /// Decoded signature bytes
    pub fn signature_bytes(&self) -> DidResult<Vec<u8>> {
        let signature = self
            .signature
            .as_deref()
            .ok_or_else(|| DidError::Signature("Message is not signed".to_string()))?;
        STANDARD
            .decode(signature)
            .map_err(|e| DidError::Signature(format!("Invalid base64 signature: {}", e)))
    }

    /// Attach replica metadata for the log entry this envelope came from
    pub fn with_consensus_metadata(
        mut self,
        consensus_timestamp: impl Into<String>,
        sequence_number: u64,
    ) -> Self {
        self.consensus_timestamp = Some(consensus_timestamp.into());
        self.sequence_number = Some(sequence_number);
        self
    }

    pub fn consensus_timestamp(&self) -> Option<&str> {
        self.consensus_timestamp.as_deref()
    }

    pub fn sequence_number(&self) -> Option<u64> {
        self.sequence_number
    }
}
