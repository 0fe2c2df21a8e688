/// Event dispatcher
///
/// Maps `(operation, target)` pairs onto event constructors. Decoding never
/// fails outward: any bad payload becomes [`Event::Empty`] so one corrupt log
/// entry cannot abort a resolution.
use crate::{
    error::{DidError, DidResult},
    event::{
        DocumentEvent, Event, EventAction, EventTarget, OwnerEvent, ServiceEvent,
        VerificationMethodEvent, VerificationRelationshipEvent,
    },
    message::Operation,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;
use tracing::warn;

pub struct EventParser;

impl EventParser {
    /// Decode a base64 (or plain JSON) event payload for `operation`
    pub fn decode(operation: Operation, payload: &str) -> Event {
        match Self::try_decode(operation, payload) {
            Ok(event) => event,
            Err(e) => {
                warn!("Ignoring undecodable {} event: {}", operation, e);
                Event::Empty
            }
        }
    }

    /// Like [`EventParser::decode`] but reports why decoding failed
    pub fn try_decode(operation: Operation, payload: &str) -> DidResult<Event> {
        if operation == Operation::Delete {
            return Ok(Event::Delete);
        }

        let tree = Self::payload_tree(payload)?;
        let object = tree
            .as_object()
            .ok_or_else(|| DidError::Decode("Event payload is not a JSON object".to_string()))?;

        let (target, body) = object
            .iter()
            .find_map(|(name, body)| EventTarget::from_name(name).map(|t| (t, body.clone())))
            .ok_or_else(|| DidError::Decode("Event payload names no known target".to_string()))?;

        Self::dispatch(operation, target, body)
    }

    /// Encode an event for the `event` field of a message
    pub fn encode(event: &Event) -> DidResult<String> {
        event.encode()
    }

    fn payload_tree(payload: &str) -> DidResult<Value> {
        let trimmed = payload.trim();
        let json = if trimmed.starts_with('{') {
            trimmed.as_bytes().to_vec()
        } else {
            STANDARD
                .decode(trimmed)
                .map_err(|e| DidError::Decode(format!("Invalid base64 event: {}", e)))?
        };

        serde_json::from_slice(&json)
            .map_err(|e| DidError::Decode(format!("Invalid event JSON: {}", e)))
    }

    fn dispatch(operation: Operation, target: EventTarget, body: Value) -> DidResult<Event> {
        let unsupported = || {
            Err(DidError::Decode(format!(
                "Operation '{}' does not apply to {}",
                operation, target
            )))
        };

        match operation {
            Operation::Delete => Ok(Event::Delete),
            Operation::CreateDocument => match target {
                EventTarget::DidDocument => DocumentEvent::from_json_body(body).map(Event::Document),
                EventTarget::DidOwner
                | EventTarget::Service
                | EventTarget::VerificationMethod
                | EventTarget::VerificationRelationship
                | EventTarget::Document => unsupported(),
            },
            Operation::Create | Operation::Update | Operation::Revoke => {
                let action = match operation {
                    Operation::Create => EventAction::Create,
                    Operation::Update => EventAction::Update,
                    _ => EventAction::Revoke,
                };

                match target {
                    EventTarget::DidOwner if action != EventAction::Revoke => {
                        OwnerEvent::from_json_body(action, body).map(Event::Owner)
                    }
                    EventTarget::Service => {
                        ServiceEvent::from_json_body(action, body).map(Event::Service)
                    }
                    EventTarget::VerificationMethod => {
                        VerificationMethodEvent::from_json_body(action, body)
                            .map(Event::VerificationMethod)
                    }
                    EventTarget::VerificationRelationship => {
                        VerificationRelationshipEvent::from_json_body(action, body)
                            .map(Event::VerificationRelationship)
                    }
                    EventTarget::DidOwner | EventTarget::DidDocument | EventTarget::Document => {
                        unsupported()
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{
        test_support::test_did, PublicKeyFormat, PublicKeyMaterial, RelationshipType, ServiceDef,
        ServiceType, VerificationMethodDef,
    };

    fn secp256k1_key() -> Vec<u8> {
        let signing_key = k256::ecdsa::SigningKey::from_slice(&[42u8; 32]).unwrap();
        signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    fn keys() -> Vec<PublicKeyMaterial> {
        vec![
            PublicKeyMaterial::new(PublicKeyFormat::Ed25519VerificationKey2020, &[5u8; 32]).unwrap(),
            PublicKeyMaterial::new(
                PublicKeyFormat::EcdsaSecp256k1VerificationKey2020,
                &secp256k1_key(),
            )
            .unwrap(),
            PublicKeyMaterial::new(PublicKeyFormat::JsonWebKey2020, &[5u8; 32]).unwrap(),
            PublicKeyMaterial::new(PublicKeyFormat::JsonWebKey2020, &secp256k1_key()).unwrap(),
        ]
    }

    fn operation_for(event: &Event) -> Operation {
        match event.action() {
            Some(EventAction::Create) => Operation::Create,
            Some(EventAction::Update) => Operation::Update,
            Some(EventAction::Revoke) => Operation::Revoke,
            None => match event {
                Event::Document(_) => Operation::CreateDocument,
                _ => Operation::Delete,
            },
        }
    }

    fn all_events() -> Vec<Event> {
        let did = test_did();
        let mut events = Vec::new();

        for key in keys() {
            let def = VerificationMethodDef::new(did.clone(), key).unwrap();
            let root = format!("{}#did-root-key", did);
            let key_id = format!("{}#key-1", did);

            events.push(Event::Owner(OwnerEvent::create(root.clone(), def.clone()).unwrap()));
            events.push(Event::Owner(OwnerEvent::update(root, def.clone()).unwrap()));
            events.push(Event::VerificationMethod(
                VerificationMethodEvent::create(key_id.clone(), def.clone()).unwrap(),
            ));
            events.push(Event::VerificationMethod(
                VerificationMethodEvent::update(key_id.clone(), def.clone()).unwrap(),
            ));
            for relationship in RelationshipType::ALL {
                events.push(Event::VerificationRelationship(
                    VerificationRelationshipEvent::create(key_id.clone(), relationship, def.clone())
                        .unwrap(),
                ));
                events.push(Event::VerificationRelationship(
                    VerificationRelationshipEvent::update(key_id.clone(), relationship, def.clone())
                        .unwrap(),
                ));
                events.push(Event::VerificationRelationship(
                    VerificationRelationshipEvent::revoke(key_id.clone(), relationship).unwrap(),
                ));
            }
        }

        let service_id = format!("{}#service-1", did);
        for service_type in [ServiceType::LinkedDomains, ServiceType::DidCommMessaging] {
            let def = ServiceDef::new(service_type, "https://example.com/endpoint").unwrap();
            events.push(Event::Service(ServiceEvent::create(service_id.clone(), def.clone()).unwrap()));
            events.push(Event::Service(ServiceEvent::update(service_id.clone(), def).unwrap()));
        }
        events.push(Event::Service(ServiceEvent::revoke(service_id).unwrap()));
        events.push(Event::VerificationMethod(
            VerificationMethodEvent::revoke(format!("{}#key-2", did)).unwrap(),
        ));
        events.push(Event::Document(
            DocumentEvent::new(did, "bafybeigdyrzt", "https://ipfs.io/ipfs/bafybeigdyrzt").unwrap(),
        ));
        events.push(Event::Delete);
        events
    }

    #[test]
    fn test_decode_encode_roundtrip_all_variants() {
        for event in all_events() {
            let encoded = EventParser::encode(&event).unwrap();
            let decoded = EventParser::decode(operation_for(&event), &encoded);
            assert_eq!(decoded, event);
        }
    }

    #[test]
    fn test_decode_accepts_plain_json() {
        let event = all_events().remove(0);
        let json = serde_json::to_string(&event.to_json_tree().unwrap()).unwrap();
        assert_eq!(EventParser::decode(Operation::Create, &json), event);
    }

    #[test]
    fn test_delete_ignores_payload() {
        assert_eq!(EventParser::decode(Operation::Delete, "garbage"), Event::Delete);
    }

    #[test]
    fn test_bad_payloads_degrade_to_empty() {
        assert_eq!(EventParser::decode(Operation::Create, "!!not base64!!"), Event::Empty);
        assert_eq!(
            EventParser::decode(Operation::Create, &STANDARD.encode("not json")),
            Event::Empty
        );
        assert_eq!(
            EventParser::decode(Operation::Create, &STANDARD.encode(r#"{"Unknown": {}}"#)),
            Event::Empty
        );
        assert_eq!(
            EventParser::decode(Operation::Create, &STANDARD.encode(r#"{"Service": {"id": "x"}}"#)),
            Event::Empty
        );
    }

    #[test]
    fn test_operation_target_mismatch_is_empty() {
        let did = test_did();
        let key = PublicKeyMaterial::multibase_key(&[5u8; 32]).unwrap();
        let owner = Event::Owner(
            OwnerEvent::create(
                format!("{}#did-root-key", did),
                VerificationMethodDef::new(did.clone(), key).unwrap(),
            )
            .unwrap(),
        );
        let encoded = owner.encode().unwrap();

        assert_eq!(EventParser::decode(Operation::Revoke, &encoded), Event::Empty);
        assert_eq!(EventParser::decode(Operation::CreateDocument, &encoded), Event::Empty);
    }
}
