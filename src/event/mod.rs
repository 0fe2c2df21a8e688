/// DID events
///
/// One event type per target, each carrying the action it performs. Events
/// travel base64-encoded inside messages as `{"<Target>": {...}}` JSON trees.

pub mod document;
pub mod key;
pub mod owner;
pub mod parser;
pub mod service;
pub mod verification_method;

pub use document::DocumentEvent;
pub use key::{PublicKeyFormat, PublicKeyMaterial};
pub use owner::OwnerEvent;
pub use parser::EventParser;
pub use service::{ServiceDef, ServiceEvent, ServiceType};
pub use verification_method::{
    RelationshipType, VerificationMethodDef, VerificationMethodEvent,
    VerificationRelationshipEvent,
};

use crate::{
    error::{DidError, DidResult},
    identity::HcsDid,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Names of the objects an event can act on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTarget {
    #[serde(rename = "DIDOwner")]
    DidOwner,
    Service,
    VerificationMethod,
    VerificationRelationship,
    #[serde(rename = "DIDDocument")]
    DidDocument,
    Document,
}

impl EventTarget {
    pub const ALL: [EventTarget; 6] = [
        EventTarget::DidOwner,
        EventTarget::Service,
        EventTarget::VerificationMethod,
        EventTarget::VerificationRelationship,
        EventTarget::DidDocument,
        EventTarget::Document,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventTarget::DidOwner => "DIDOwner",
            EventTarget::Service => "Service",
            EventTarget::VerificationMethod => "VerificationMethod",
            EventTarget::VerificationRelationship => "VerificationRelationship",
            EventTarget::DidDocument => "DIDDocument",
            EventTarget::Document => "Document",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|target| target.as_str() == name)
    }
}

impl fmt::Display for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an event does to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventAction {
    Create,
    Update,
    Revoke,
}

/// A decoded DID event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Owner(OwnerEvent),
    Service(ServiceEvent),
    VerificationMethod(VerificationMethodEvent),
    VerificationRelationship(VerificationRelationshipEvent),
    Document(DocumentEvent),
    Delete,
    /// Inert stand-in for a payload that could not be decoded
    Empty,
}

impl Event {
    pub fn target(&self) -> Option<EventTarget> {
        match self {
            Event::Owner(_) => Some(EventTarget::DidOwner),
            Event::Service(_) => Some(EventTarget::Service),
            Event::VerificationMethod(_) => Some(EventTarget::VerificationMethod),
            Event::VerificationRelationship(_) => Some(EventTarget::VerificationRelationship),
            Event::Document(_) => Some(EventTarget::DidDocument),
            Event::Delete => Some(EventTarget::Document),
            Event::Empty => None,
        }
    }

    /// Action for targeted events; `None` for delete, document and empty events
    pub fn action(&self) -> Option<EventAction> {
        match self {
            Event::Owner(e) => Some(e.action),
            Event::Service(e) => Some(e.action),
            Event::VerificationMethod(e) => Some(e.action),
            Event::VerificationRelationship(e) => Some(e.action),
            Event::Document(_) | Event::Delete | Event::Empty => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Event::Owner(e) => Some(&e.id),
            Event::Service(e) => Some(&e.id),
            Event::VerificationMethod(e) => Some(&e.id),
            Event::VerificationRelationship(e) => Some(&e.id),
            Event::Document(e) => Some(&e.id),
            Event::Delete | Event::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Event::Empty)
    }

    /// Canonical JSON tree, wrapped by target name
    pub fn to_json_tree(&self) -> DidResult<Value> {
        let body = match self {
            Event::Owner(e) => e.to_json_body()?,
            Event::Service(e) => e.to_json_body()?,
            Event::VerificationMethod(e) => e.to_json_body()?,
            Event::VerificationRelationship(e) => e.to_json_body()?,
            Event::Document(e) => e.to_json_body()?,
            Event::Delete => return Ok(Value::Null),
            Event::Empty => {
                return Err(DidError::Validation(
                    "Empty event cannot be serialized".to_string(),
                ))
            }
        };

        let target = self
            .target()
            .ok_or_else(|| DidError::Validation("Event has no target".to_string()))?;
        let mut tree = Map::new();
        tree.insert(target.as_str().to_string(), body);
        Ok(Value::Object(tree))
    }

    /// base64(JSON) as carried in the `event` field of a message
    pub fn encode(&self) -> DidResult<String> {
        let json = serde_json::to_string(&self.to_json_tree()?)?;
        Ok(STANDARD.encode(json))
    }
}

/// Split `did#fragment` and check the DID half parses
pub(crate) fn split_event_id(id: &str) -> DidResult<(HcsDid, &str)> {
    let (did, fragment) = id
        .split_once('#')
        .ok_or_else(|| DidError::Validation(format!("Event id '{}' has no fragment", id)))?;

    let did = HcsDid::parse(did)
        .map_err(|e| DidError::Validation(format!("Event id '{}' has invalid DID: {}", id, e)))?;

    Ok((did, fragment))
}

/// Check `fragment` reads `<prefix><integer>`
pub(crate) fn validate_numbered_fragment(id: &str, fragment: &str, prefix: &str) -> DidResult<()> {
    let valid = fragment
        .strip_prefix(prefix)
        .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);

    if !valid {
        return Err(DidError::Validation(format!(
            "Event id '{}' must end with #{}<integer>",
            id, prefix
        )));
    }
    Ok(())
}

pub(crate) fn require_controller(controller: &str) -> DidResult<()> {
    if !controller.starts_with("did:") {
        return Err(DidError::Validation(format!(
            "Controller '{}' is not a DID",
            controller
        )));
    }
    Ok(())
}
