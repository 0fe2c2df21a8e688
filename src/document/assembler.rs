/// Document assembler
///
/// Folds a topic's envelopes, in arrival order, into a [`ResolvedDocument`].
/// Every event must be signed by the owner key current at the time it is
/// folded. The owner registration is checked against its own key, and an
/// owner update must be signed by the key it replaces.
use crate::{
    config::ResolverConfig,
    crypto::SignatureVerifier,
    document::{OwnerEntry, RegistrationConflict, ResolvedDocument},
    error::{DidError, DidResult},
    event::{
        Event, EventAction, OwnerEvent, PublicKeyMaterial, ServiceEvent, VerificationMethodEvent,
        VerificationRelationshipEvent,
    },
    identity::HcsDid,
    message::{Message, MessageEnvelope},
    resolver::EventMessageResolver,
    transport::MirrorClient,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct DocumentAssembler {
    did: HcsDid,
    verifier: Arc<dyn SignatureVerifier>,
}

impl DocumentAssembler {
    pub fn new(did: HcsDid, verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self { did, verifier }
    }

    /// Fold envelopes into a fresh document
    pub fn assemble(&self, envelopes: &[MessageEnvelope]) -> ResolvedDocument {
        let did = self.did.to_string();
        let mut document = ResolvedDocument::new(did.clone());

        for envelope in envelopes {
            if document.is_deleted() {
                debug!("{} is deleted; ignoring remaining messages", did);
                break;
            }

            let Some(message) = envelope.open() else {
                debug!("Skipping envelope that does not open");
                continue;
            };

            if !message.is_valid(Some(self.did.topic_id())) {
                debug!("Skipping invalid {} message for {}", message.operation(), message.did());
                continue;
            }

            if message.did() != did {
                debug!("Skipping message for other DID {}", message.did());
                continue;
            }

            if self.apply(&mut document, envelope, message) {
                let version_id = envelope
                    .consensus_timestamp()
                    .map(str::to_string)
                    .unwrap_or_else(|| message.timestamp().timestamp_millis().to_string());
                document.touch(message.timestamp(), version_id);
            }
        }

        for conflict in document.conflicts() {
            warn!("Registration conflict on {}: {}", did, conflict);
        }

        document
    }

    /// Fold one message; `true` when the document changed
    fn apply(&self, document: &mut ResolvedDocument, envelope: &MessageEnvelope, message: &Message) -> bool {
        if let Event::Owner(event) = message.event() {
            return self.apply_owner(document, envelope, event);
        }

        let Some(owner) = document.owner() else {
            debug!("Skipping {} message before owner registration", message.operation());
            return false;
        };

        if !self.is_signed_by(envelope, &owner.method.key) {
            warn!(
                "Dropping {} message for {} not signed by the owner",
                message.operation(),
                message.did()
            );
            return false;
        }

        match message.event() {
            Event::Service(event) => apply_service(document, event),
            Event::VerificationMethod(event) => apply_verification_method(document, event),
            Event::VerificationRelationship(event) => apply_verification_relationship(document, event),
            Event::Document(event) => {
                document.anchor_document(event.clone());
                true
            }
            Event::Delete => {
                info!("{} deleted", message.did());
                document.mark_deleted();
                true
            }
            Event::Owner(_) | Event::Empty => false,
        }
    }

    fn apply_owner(&self, document: &mut ResolvedDocument, envelope: &MessageEnvelope, event: &OwnerEvent) -> bool {
        match (event.action, document.owner()) {
            (EventAction::Create, None) => {
                if !self.is_signed_by(envelope, &event.method.key) {
                    warn!("Dropping owner registration {} with invalid signature", event.id);
                    return false;
                }
                if !self.matches_did_key(&event.method.key) {
                    warn!("Dropping owner registration {} for a key other than the DID's", event.id);
                    return false;
                }
                document.set_owner(OwnerEntry {
                    id: event.id.clone(),
                    method: event.method.clone(),
                });
                true
            }
            (EventAction::Create, Some(_)) => {
                if self.is_signed_by(envelope, &event.method.key) {
                    document.record_conflict(RegistrationConflict::AlreadyRegistered {
                        id: event.id.clone(),
                    });
                } else {
                    debug!("Dropping forged duplicate registration {}", event.id);
                }
                false
            }
            (EventAction::Update, Some(owner)) => {
                if !self.is_signed_by(envelope, &owner.method.key) {
                    document.record_conflict(RegistrationConflict::UnauthorizedOwnerUpdate {
                        id: event.id.clone(),
                    });
                    return false;
                }
                document.set_owner(OwnerEntry {
                    id: event.id.clone(),
                    method: event.method.clone(),
                });
                true
            }
            (EventAction::Update, None) => {
                debug!("Skipping owner update {} before registration", event.id);
                false
            }
            (EventAction::Revoke, _) => false,
        }
    }

    fn is_signed_by(&self, envelope: &MessageEnvelope, key: &PublicKeyMaterial) -> bool {
        match envelope.signature_bytes() {
            Ok(signature) => self.verifier.verify(envelope.message_bytes(), &signature, key),
            Err(e) => {
                debug!("Unverifiable envelope: {}", e);
                false
            }
        }
    }

    fn matches_did_key(&self, key: &PublicKeyMaterial) -> bool {
        match self.did.public_key() {
            Ok(did_key) => did_key == key.raw(),
            Err(e) => {
                debug!("DID {} does not carry a decodable key: {}", self.did, e);
                false
            }
        }
    }
}

fn apply_service(document: &mut ResolvedDocument, event: &ServiceEvent) -> bool {
    let applied = match (event.action, &event.service) {
        (EventAction::Create, Some(service)) => document.create_service(&event.id, service.clone()),
        (EventAction::Update, Some(service)) => document.update_service(&event.id, service.clone()),
        (EventAction::Revoke, _) => document.revoke_service(&event.id),
        _ => false,
    };
    if !applied {
        debug!("Ignoring {:?} of service {}", event.action, event.id);
    }
    applied
}

fn apply_verification_method(document: &mut ResolvedDocument, event: &VerificationMethodEvent) -> bool {
    let applied = match (event.action, &event.method) {
        (EventAction::Create, Some(method)) => {
            document.create_verification_method(&event.id, method.clone())
        }
        (EventAction::Update, Some(method)) => {
            document.update_verification_method(&event.id, method.clone())
        }
        (EventAction::Revoke, _) => document.revoke_verification_method(&event.id),
        _ => false,
    };
    if !applied {
        debug!("Ignoring {:?} of verification method {}", event.action, event.id);
    }
    applied
}

fn apply_verification_relationship(
    document: &mut ResolvedDocument,
    event: &VerificationRelationshipEvent,
) -> bool {
    let applied = match (event.action, &event.method) {
        (EventAction::Create, Some(method)) => document.create_verification_relationship(
            &event.id,
            event.relationship_type,
            method.clone(),
        ),
        (EventAction::Update, Some(method)) => document.update_verification_relationship(
            &event.id,
            event.relationship_type,
            method.clone(),
        ),
        (EventAction::Revoke, _) => {
            document.revoke_verification_relationship(&event.id, event.relationship_type)
        }
        _ => false,
    };
    if !applied {
        debug!(
            "Ignoring {:?} of {} relationship {}",
            event.action, event.relationship_type, event.id
        );
    }
    applied
}

/// Resolve a DID: collect its topic's messages, then fold them
pub async fn resolve(
    did: &str,
    client: Arc<dyn MirrorClient>,
    config: ResolverConfig,
    verifier: Arc<dyn SignatureVerifier>,
) -> DidResult<ResolvedDocument> {
    let did = HcsDid::parse(did)?;
    if did.network() != config.network {
        return Err(DidError::Config(format!(
            "{} is a {} DID but the resolver is configured for {}",
            did,
            did.network(),
            config.network
        )));
    }

    let envelopes = EventMessageResolver::new(*did.topic_id(), client, config)
        .execute()
        .await?;

    Ok(DocumentAssembler::new(did, verifier).assemble(&envelopes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::KeyType,
        crypto::{DefaultVerifier, KeySigner},
        event::{
            DocumentEvent, RelationshipType, ServiceDef, ServiceType, VerificationMethodDef,
        },
        identity::{Network, TopicId},
        message::Operation,
    };

    struct Fixture {
        owner: KeySigner,
        did: HcsDid,
    }

    impl Fixture {
        fn new() -> Self {
            let owner = KeySigner::from_bytes(KeyType::Ed25519, &[11u8; 32]).unwrap();
            let topic: TopicId = "0.0.29613327".parse().unwrap();
            let did = HcsDid::from_public_key(Network::Testnet, &owner.public_key(), topic);
            Self { owner, did }
        }

        fn id(&self, fragment: &str) -> String {
            self.did.fragment(fragment)
        }

        fn key(&self, seed: u8) -> VerificationMethodDef {
            let key = PublicKeyMaterial::multibase_key(&[seed; 32]).unwrap();
            VerificationMethodDef::new(self.did.to_string(), key).unwrap()
        }

        fn signed(&self, signer: &KeySigner, operation: Operation, event: Event) -> MessageEnvelope {
            let message = Message::new(operation, self.did.to_string(), event).unwrap();
            let mut envelope = MessageEnvelope::from_message(message).unwrap();
            let bytes = envelope.sign(|bytes| signer.sign(bytes)).unwrap();
            MessageEnvelope::from_json(&bytes).unwrap()
        }

        fn envelope(&self, operation: Operation, event: Event) -> MessageEnvelope {
            self.signed(&self.owner, operation, event)
        }

        fn register(&self) -> MessageEnvelope {
            let method = VerificationMethodDef::new(
                self.did.to_string(),
                self.owner.public_key_material().unwrap(),
            )
            .unwrap();
            self.envelope(
                Operation::Create,
                Event::Owner(OwnerEvent::create(self.id("did-root-key"), method).unwrap()),
            )
        }

        fn service(&self, action: EventAction, endpoint: &str) -> MessageEnvelope {
            let id = self.id("service-1");
            let def = ServiceDef::new(ServiceType::LinkedDomains, endpoint).unwrap();
            let (operation, event) = match action {
                EventAction::Create => (Operation::Create, ServiceEvent::create(id, def)),
                EventAction::Update => (Operation::Update, ServiceEvent::update(id, def)),
                EventAction::Revoke => (Operation::Revoke, ServiceEvent::revoke(id)),
            };
            self.envelope(operation, Event::Service(event.unwrap()))
        }

        fn assemble(&self, envelopes: &[MessageEnvelope]) -> ResolvedDocument {
            DocumentAssembler::new(self.did.clone(), Arc::new(DefaultVerifier)).assemble(envelopes)
        }
    }

    #[test]
    fn test_empty_topic_is_not_registered() {
        let fixture = Fixture::new();
        let document = fixture.assemble(&[]);
        assert!(!document.has_owner());
        assert!(!document.is_deleted());
        assert_eq!(document.state(), crate::document::DocumentState::NotRegistered);
    }

    #[test]
    fn test_owner_registration() {
        let fixture = Fixture::new();
        let document = fixture.assemble(&[fixture.register()]);

        assert!(document.has_owner());
        let owner = document.owner().unwrap();
        assert_eq!(owner.id, fixture.id("did-root-key"));
        assert_eq!(owner.method.key.raw(), fixture.owner.public_key().as_slice());
        assert!(document.created().is_some());
    }

    #[test]
    fn test_revoke_then_update_keeps_create_fields() {
        let fixture = Fixture::new();
        let id = fixture.id("key-1");
        let document = fixture.assemble(&[
            fixture.register(),
            fixture.envelope(
                Operation::Create,
                Event::VerificationMethod(VerificationMethodEvent::create(id.clone(), fixture.key(1)).unwrap()),
            ),
            fixture.envelope(
                Operation::Revoke,
                Event::VerificationMethod(VerificationMethodEvent::revoke(id.clone()).unwrap()),
            ),
            fixture.envelope(
                Operation::Update,
                Event::VerificationMethod(VerificationMethodEvent::update(id.clone(), fixture.key(2)).unwrap()),
            ),
        ]);

        let entry = document.verification_method(&id).unwrap();
        assert!(entry.revoked);
        assert_eq!(entry.method, fixture.key(1));
    }

    #[test]
    fn test_duplicate_envelopes_fold_idempotently() {
        let fixture = Fixture::new();
        let register = fixture.register();
        let create = fixture.service(EventAction::Create, "https://a.example");
        let update = fixture.service(EventAction::Update, "https://b.example");

        let once = fixture.assemble(&[register.clone(), create.clone(), update.clone()]);
        let twice = fixture.assemble(&[register.clone(), create.clone(), create, update.clone(), update]);

        assert_eq!(
            once.to_did_document().unwrap(),
            twice.to_did_document().unwrap()
        );
        assert_eq!(once.services().collect::<Vec<_>>(), twice.services().collect::<Vec<_>>());
    }

    #[test]
    fn test_first_create_wins() {
        let fixture = Fixture::new();
        let document = fixture.assemble(&[
            fixture.register(),
            fixture.service(EventAction::Create, "https://first.example"),
            fixture.service(EventAction::Create, "https://second.example"),
        ]);

        let entry = document.service(&fixture.id("service-1")).unwrap();
        assert_eq!(entry.service.service_endpoint, "https://first.example");
    }

    #[test]
    fn test_update_of_unknown_entry_ignored() {
        let fixture = Fixture::new();
        let document = fixture.assemble(&[
            fixture.register(),
            fixture.service(EventAction::Update, "https://b.example"),
        ]);
        assert_eq!(document.services().count(), 0);
    }

    #[test]
    fn test_delete_is_a_tombstone() {
        let fixture = Fixture::new();
        let document = fixture.assemble(&[
            fixture.register(),
            fixture.service(EventAction::Create, "https://a.example"),
            fixture.envelope(Operation::Delete, Event::Delete),
            fixture.service(EventAction::Revoke, "https://a.example"),
        ]);

        assert!(document.is_deleted());
        assert!(!document.service(&fixture.id("service-1")).unwrap().revoked);
        assert_eq!(document.to_did_document().unwrap().as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_events_must_be_signed_by_owner() {
        let fixture = Fixture::new();
        let intruder = KeySigner::from_bytes(KeyType::Ed25519, &[99u8; 32]).unwrap();
        let id = fixture.id("service-1");
        let forged = fixture.signed(
            &intruder,
            Operation::Create,
            Event::Service(
                ServiceEvent::create(
                    id.clone(),
                    ServiceDef::new(ServiceType::LinkedDomains, "https://evil.example").unwrap(),
                )
                .unwrap(),
            ),
        );

        let document = fixture.assemble(&[fixture.register(), forged]);
        assert!(document.service(&id).is_none());
    }

    #[test]
    fn test_events_before_registration_dropped() {
        let fixture = Fixture::new();
        let document = fixture.assemble(&[
            fixture.service(EventAction::Create, "https://a.example"),
            fixture.register(),
        ]);
        assert!(document.has_owner());
        assert_eq!(document.services().count(), 0);
    }

    #[test]
    fn test_owner_registration_must_match_did_key() {
        let fixture = Fixture::new();
        let other = KeySigner::from_bytes(KeyType::Ed25519, &[12u8; 32]).unwrap();
        let method = VerificationMethodDef::new(
            fixture.did.to_string(),
            other.public_key_material().unwrap(),
        )
        .unwrap();
        let register = fixture.signed(
            &other,
            Operation::Create,
            Event::Owner(OwnerEvent::create(fixture.id("did-root-key"), method).unwrap()),
        );

        assert!(!fixture.assemble(&[register]).has_owner());
    }

    #[test]
    fn test_duplicate_registration_is_a_conflict() {
        let fixture = Fixture::new();
        let document = fixture.assemble(&[fixture.register(), fixture.register()]);

        assert!(document.has_owner());
        assert_eq!(
            document.conflicts(),
            &[RegistrationConflict::AlreadyRegistered {
                id: fixture.id("did-root-key")
            }]
        );
    }

    #[test]
    fn test_owner_update_signed_by_previous_key() {
        let fixture = Fixture::new();
        let next = KeySigner::from_bytes(KeyType::Secp256k1, &[13u8; 32]).unwrap();
        let next_method =
            VerificationMethodDef::new(fixture.did.to_string(), next.public_key_material().unwrap())
                .unwrap();
        let update = fixture.envelope(
            Operation::Update,
            Event::Owner(OwnerEvent::update(fixture.id("did-root-key"), next_method.clone()).unwrap()),
        );
        let service_by_new_owner = fixture.signed(
            &next,
            Operation::Create,
            Event::Service(
                ServiceEvent::create(
                    fixture.id("service-1"),
                    ServiceDef::new(ServiceType::LinkedDomains, "https://new.example").unwrap(),
                )
                .unwrap(),
            ),
        );

        let document = fixture.assemble(&[fixture.register(), update, service_by_new_owner]);

        assert_eq!(document.owner().unwrap().method, next_method);
        assert!(document.service(&fixture.id("service-1")).is_some());
        assert!(document.conflicts().is_empty());
    }

    #[test]
    fn test_unauthorized_owner_update_is_a_conflict() {
        let fixture = Fixture::new();
        let intruder = KeySigner::from_bytes(KeyType::Ed25519, &[66u8; 32]).unwrap();
        let method = VerificationMethodDef::new(
            fixture.did.to_string(),
            intruder.public_key_material().unwrap(),
        )
        .unwrap();
        let takeover = fixture.signed(
            &intruder,
            Operation::Update,
            Event::Owner(OwnerEvent::update(fixture.id("did-root-key"), method).unwrap()),
        );

        let document = fixture.assemble(&[fixture.register(), takeover]);

        assert_eq!(
            document.owner().unwrap().method.key.raw(),
            fixture.owner.public_key().as_slice()
        );
        assert!(matches!(
            document.conflicts(),
            [RegistrationConflict::UnauthorizedOwnerUpdate { .. }]
        ));
    }

    #[test]
    fn test_relationships_and_document_anchor() {
        let fixture = Fixture::new();
        let id = fixture.id("key-1");
        let document = fixture.assemble(&[
            fixture.register(),
            fixture.envelope(
                Operation::Create,
                Event::VerificationRelationship(
                    VerificationRelationshipEvent::create(id.clone(), RelationshipType::Authentication, fixture.key(1))
                        .unwrap(),
                ),
            ),
            fixture.envelope(
                Operation::Create,
                Event::VerificationRelationship(
                    VerificationRelationshipEvent::create(id.clone(), RelationshipType::KeyAgreement, fixture.key(1))
                        .unwrap(),
                ),
            ),
            fixture.envelope(
                Operation::Revoke,
                Event::VerificationRelationship(
                    VerificationRelationshipEvent::revoke(id.clone(), RelationshipType::KeyAgreement).unwrap(),
                ),
            ),
            fixture.envelope(
                Operation::CreateDocument,
                Event::Document(
                    DocumentEvent::new(fixture.did.to_string(), "bafy", "https://ipfs.io/ipfs/bafy").unwrap(),
                ),
            ),
        ]);

        assert!(!document.verification_relationship(&id, RelationshipType::Authentication).unwrap().revoked);
        assert!(document.verification_relationship(&id, RelationshipType::KeyAgreement).unwrap().revoked);
        assert_eq!(document.anchored_document().unwrap().cid, "bafy");

        let rendered = document.to_did_document().unwrap();
        assert_eq!(rendered["authentication"].as_array().unwrap().len(), 2);
        assert!(rendered.get("keyAgreement").is_none());
    }

    #[tokio::test]
    async fn test_resolve_rejects_network_mismatch() {
        struct Unused;

        #[async_trait::async_trait]
        impl MirrorClient for Unused {
            async fn fetch_messages(
                &self,
                _topic_id: &TopicId,
                _after: Option<&str>,
            ) -> DidResult<crate::transport::TopicMessagesPage> {
                Err(DidError::Transport("unexpected fetch".to_string()))
            }
        }

        let fixture = Fixture::new();
        let result = resolve(
            &fixture.did.to_string(),
            Arc::new(Unused),
            ResolverConfig::for_network(Network::Mainnet),
            Arc::new(DefaultVerifier),
        )
        .await;

        assert!(matches!(result, Err(DidError::Config(_))));
    }
}
