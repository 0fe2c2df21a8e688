/// DID messages
///
/// A message is one operation on one event for one DID. Messages are signed
/// and wrapped in an envelope before being submitted to the DID's topic.

pub mod envelope;

pub use envelope::MessageEnvelope;

use crate::{
    error::{DidError, DidResult},
    event::{Event, EventParser},
    identity::{HcsDid, TopicId},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operations a message can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "create-did-document")]
    CreateDocument,
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "revoke")]
    Revoke,
    #[serde(rename = "delete")]
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateDocument => "create-did-document",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Revoke => "revoke",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire form of a message
#[derive(Debug, Serialize, Deserialize)]
struct MessageJson {
    timestamp: String,
    operation: Operation,
    did: String,
    event: String,
}

/// A decoded DID message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    timestamp: DateTime<Utc>,
    operation: Operation,
    did: String,
    event_payload: String,
    event: Event,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(operation: Operation, did: impl Into<String>, event: Event) -> DidResult<Self> {
        Self::with_timestamp(Utc::now(), operation, did, event)
    }

    pub fn with_timestamp(
        timestamp: DateTime<Utc>,
        operation: Operation,
        did: impl Into<String>,
        event: Event,
    ) -> DidResult<Self> {
        let did = did.into();
        HcsDid::parse(&did)?;

        let event_payload = event.encode()?;

        Ok(Self {
            timestamp: truncate_to_millis(timestamp),
            operation,
            did,
            event_payload,
            event,
        })
    }

    /// Parse the JSON form of a message, decoding its event
    ///
    /// An undecodable event yields [`Event::Empty`] rather than an error.
    pub fn from_json(json: &[u8]) -> DidResult<Self> {
        let wire: MessageJson = serde_json::from_slice(json)
            .map_err(|e| DidError::Decode(format!("Invalid message JSON: {}", e)))?;

        let timestamp = DateTime::parse_from_rfc3339(&wire.timestamp)
            .map_err(|e| DidError::Decode(format!("Invalid message timestamp: {}", e)))?
            .with_timezone(&Utc);

        let event = EventParser::decode(wire.operation, &wire.event);

        Ok(Self {
            timestamp,
            operation: wire.operation,
            did: wire.did,
            event_payload: wire.event,
            event,
        })
    }

    /// Canonical JSON bytes; this is what gets signed
    pub fn to_json(&self) -> DidResult<Vec<u8>> {
        let wire = MessageJson {
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            operation: self.operation,
            did: self.did.clone(),
            event: self.event_payload.clone(),
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Base64 event payload as carried on the wire
    pub fn event_payload(&self) -> &str {
        &self.event_payload
    }

    /// Structural validity for a topic
    ///
    /// The DID must parse, the event must have decoded and belong to the DID,
    /// and when `topic_id` is given the DID must be anchored on that topic.
    pub fn is_valid(&self, topic_id: Option<&TopicId>) -> bool {
        let did = match HcsDid::parse(&self.did) {
            Ok(did) => did,
            Err(_) => return false,
        };

        if self.event.is_empty() {
            return false;
        }

        if let Some(topic_id) = topic_id {
            if did.topic_id() != topic_id {
                return false;
            }
        }

        match (self.operation, self.event.id()) {
            (Operation::Delete, _) => true,
            (_, Some(id)) => {
                let event_did = id.split_once('#').map(|(did, _)| did).unwrap_or(id);
                event_did == self.did
            }
            (_, None) => false,
        }
    }
}

fn truncate_to_millis(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    let millis = timestamp.timestamp_millis();
    DateTime::from_timestamp_millis(millis).unwrap_or(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{test_support::test_did, ServiceDef, ServiceEvent, ServiceType};

    fn service_event(did: &str) -> Event {
        let def = ServiceDef::new(ServiceType::LinkedDomains, "https://example.com").unwrap();
        Event::Service(ServiceEvent::create(format!("{}#service-1", did), def).unwrap())
    }

    #[test]
    fn test_message_json_roundtrip() {
        let did = test_did();
        let message = Message::new(Operation::Create, did.clone(), service_event(&did)).unwrap();
        let json = message.to_json().unwrap();

        let parsed = Message::from_json(&json).unwrap();
        assert_eq!(parsed, message);
        assert_eq!(parsed.to_json().unwrap(), json);
    }

    #[test]
    fn test_wire_field_names() {
        let did = test_did();
        let message = Message::new(Operation::Create, did.clone(), service_event(&did)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&message.to_json().unwrap()).unwrap();

        assert_eq!(value["operation"], "create");
        assert_eq!(value["did"], did);
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
        assert!(value["event"].is_string());
    }

    #[test]
    fn test_is_valid_checks_topic() {
        let did = test_did();
        let message = Message::new(Operation::Create, did.clone(), service_event(&did)).unwrap();

        assert!(message.is_valid(None));
        assert!(message.is_valid(Some(&"0.0.29613327".parse().unwrap())));
        assert!(!message.is_valid(Some(&"0.0.1".parse().unwrap())));
    }

    #[test]
    fn test_is_valid_rejects_foreign_event_id() {
        let did = test_did();
        let other = format!(
            "did:hedera:testnet:{}_0.0.29613327",
            crate::codec::multibase_encode(&[0xcdu8; 32])
        );
        let message = Message::new(Operation::Create, did, service_event(&other)).unwrap();
        assert!(!message.is_valid(None));
    }

    #[test]
    fn test_empty_event_is_invalid() {
        let json = format!(
            r#"{{"timestamp":"2023-01-01T00:00:00.000Z","operation":"create","did":"{}","event":"bm9wZQ=="}}"#,
            test_did()
        );
        let message = Message::from_json(json.as_bytes()).unwrap();
        assert!(message.event().is_empty());
        assert!(!message.is_valid(None));
    }

    #[test]
    fn test_delete_message() {
        let did = test_did();
        let message = Message::new(Operation::Delete, did, Event::Delete).unwrap();
        let parsed = Message::from_json(&message.to_json().unwrap()).unwrap();
        assert_eq!(parsed.event(), &Event::Delete);
        assert!(parsed.is_valid(None));
    }
}
