/// Resolved DID documents
///
/// The state folded out of a topic's messages, and its W3C DID document
/// rendering. Revoked entries are kept (flagged) so that replaying the same
/// messages always lands on the same state.

pub mod assembler;

pub use assembler::{resolve, DocumentAssembler};

use crate::{
    error::DidResult,
    event::{
        verification_method::KeyBodyJson, DocumentEvent, RelationshipType, ServiceDef,
        VerificationMethodDef,
    },
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::{collections::BTreeMap, fmt};

pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// Lifecycle of a DID on its topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    NotRegistered,
    Active,
    Deleted,
}

/// The document root key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerEntry {
    pub id: String,
    pub method: VerificationMethodDef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    pub id: String,
    pub service: ServiceDef,
    pub revoked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationMethodEntry {
    pub id: String,
    pub method: VerificationMethodDef,
    pub revoked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRelationshipEntry {
    pub id: String,
    pub relationship_type: RelationshipType,
    pub method: VerificationMethodDef,
    pub revoked: bool,
}

/// Registration-state problems found while folding
///
/// Either may indicate someone attempting to take over the DID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationConflict {
    /// A second owner registration for an already registered DID
    AlreadyRegistered { id: String },
    /// An owner change not signed by the current owner
    UnauthorizedOwnerUpdate { id: String },
}

impl fmt::Display for RegistrationConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationConflict::AlreadyRegistered { id } => {
                write!(f, "DID owner {} is already registered", id)
            }
            RegistrationConflict::UnauthorizedOwnerUpdate { id } => {
                write!(f, "owner update for {} is not signed by the current owner", id)
            }
        }
    }
}

/// Folded state of one DID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDocument {
    did: String,
    owner: Option<OwnerEntry>,
    services: BTreeMap<String, ServiceEntry>,
    verification_methods: BTreeMap<String, VerificationMethodEntry>,
    verification_relationships: BTreeMap<(String, RelationshipType), VerificationRelationshipEntry>,
    anchored_document: Option<DocumentEvent>,
    conflicts: Vec<RegistrationConflict>,
    deleted: bool,
    created: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
    version_id: Option<String>,
}

impl ResolvedDocument {
    pub(crate) fn new(did: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            owner: None,
            services: BTreeMap::new(),
            verification_methods: BTreeMap::new(),
            verification_relationships: BTreeMap::new(),
            anchored_document: None,
            conflicts: Vec::new(),
            deleted: false,
            created: None,
            updated: None,
            version_id: None,
        }
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn state(&self) -> DocumentState {
        if self.deleted {
            DocumentState::Deleted
        } else if self.owner.is_some() {
            DocumentState::Active
        } else {
            DocumentState::NotRegistered
        }
    }

    pub fn has_owner(&self) -> bool {
        self.owner.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn owner(&self) -> Option<&OwnerEntry> {
        self.owner.as_ref()
    }

    /// All services, revoked ones included
    pub fn services(&self) -> impl Iterator<Item = &ServiceEntry> {
        self.services.values()
    }

    pub fn service(&self, id: &str) -> Option<&ServiceEntry> {
        self.services.get(id)
    }

    /// All verification methods, revoked ones included
    pub fn verification_methods(&self) -> impl Iterator<Item = &VerificationMethodEntry> {
        self.verification_methods.values()
    }

    pub fn verification_method(&self, id: &str) -> Option<&VerificationMethodEntry> {
        self.verification_methods.get(id)
    }

    /// All verification relationships, revoked ones included
    pub fn verification_relationships(
        &self,
    ) -> impl Iterator<Item = &VerificationRelationshipEntry> {
        self.verification_relationships.values()
    }

    pub fn verification_relationship(
        &self,
        id: &str,
        relationship_type: RelationshipType,
    ) -> Option<&VerificationRelationshipEntry> {
        self.verification_relationships
            .get(&(id.to_string(), relationship_type))
    }

    /// Latest off-ledger document snapshot anchored on the topic
    pub fn anchored_document(&self) -> Option<&DocumentEvent> {
        self.anchored_document.as_ref()
    }

    pub fn conflicts(&self) -> &[RegistrationConflict] {
        &self.conflicts
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.updated
    }

    /// Render as a W3C DID document, leaving out revoked entries
    ///
    /// Deleted and unregistered DIDs render with only `@context` and `id`.
    pub fn to_did_document(&self) -> DidResult<Value> {
        let mut document = Map::new();
        document.insert("@context".to_string(), json!([DID_CONTEXT]));
        document.insert("id".to_string(), Value::String(self.did.clone()));

        let owner = match (&self.owner, self.deleted) {
            (Some(owner), false) => owner,
            _ => return Ok(Value::Object(document)),
        };

        if owner.method.controller != self.did {
            document.insert(
                "controller".to_string(),
                Value::String(owner.method.controller.clone()),
            );
        }

        let mut methods = vec![KeyBodyJson::from_def(&owner.id, &owner.method)?.into_value()?];
        let mut method_ids = vec![owner.id.clone()];
        for entry in self.verification_methods.values().filter(|e| !e.revoked) {
            methods.push(KeyBodyJson::from_def(&entry.id, &entry.method)?.into_value()?);
            method_ids.push(entry.id.clone());
        }

        let mut relationships: BTreeMap<RelationshipType, Vec<Value>> = BTreeMap::new();
        relationships
            .entry(RelationshipType::Authentication)
            .or_default()
            .push(Value::String(owner.id.clone()));
        relationships
            .entry(RelationshipType::AssertionMethod)
            .or_default()
            .push(Value::String(owner.id.clone()));

        for entry in self.verification_relationships.values().filter(|e| !e.revoked) {
            if !method_ids.contains(&entry.id) {
                methods.push(KeyBodyJson::from_def(&entry.id, &entry.method)?.into_value()?);
                method_ids.push(entry.id.clone());
            }
            relationships
                .entry(entry.relationship_type)
                .or_default()
                .push(Value::String(entry.id.clone()));
        }

        document.insert("verificationMethod".to_string(), Value::Array(methods));
        for (relationship_type, ids) in relationships {
            document.insert(relationship_type.as_str().to_string(), Value::Array(ids));
        }

        let services: Vec<Value> = self
            .services
            .values()
            .filter(|e| !e.revoked)
            .map(|e| {
                json!({
                    "id": e.id,
                    "type": e.service.service_type.as_str(),
                    "serviceEndpoint": e.service.service_endpoint,
                })
            })
            .collect();
        if !services.is_empty() {
            document.insert("service".to_string(), Value::Array(services));
        }

        Ok(Value::Object(document))
    }

    /// DID document metadata
    pub fn resolution_metadata(&self) -> Value {
        let render = |t: &Option<DateTime<Utc>>| {
            t.map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::Millis, true)))
                .unwrap_or(Value::Null)
        };

        json!({
            "deactivated": self.deleted,
            "created": render(&self.created),
            "updated": render(&self.updated),
            "versionId": self.version_id,
        })
    }

    // Fold primitives used by the assembler. Keyed targets follow first
    // create wins, updates only touch live entries, revocation is sticky.

    pub(crate) fn set_owner(&mut self, owner: OwnerEntry) {
        self.owner = Some(owner);
    }

    pub(crate) fn record_conflict(&mut self, conflict: RegistrationConflict) {
        self.conflicts.push(conflict);
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    pub(crate) fn anchor_document(&mut self, document: DocumentEvent) {
        self.anchored_document = Some(document);
    }

    pub(crate) fn touch(&mut self, timestamp: DateTime<Utc>, version_id: String) {
        if self.created.is_none() {
            self.created = Some(timestamp);
        }
        self.updated = Some(timestamp);
        self.version_id = Some(version_id);
    }

    pub(crate) fn create_service(&mut self, id: &str, service: ServiceDef) -> bool {
        if self.services.contains_key(id) {
            return false;
        }
        self.services.insert(
            id.to_string(),
            ServiceEntry {
                id: id.to_string(),
                service,
                revoked: false,
            },
        );
        true
    }

    pub(crate) fn update_service(&mut self, id: &str, service: ServiceDef) -> bool {
        match self.services.get_mut(id) {
            Some(entry) if !entry.revoked => {
                entry.service = service;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn revoke_service(&mut self, id: &str) -> bool {
        match self.services.get_mut(id) {
            Some(entry) => {
                entry.revoked = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn create_verification_method(&mut self, id: &str, method: VerificationMethodDef) -> bool {
        if self.verification_methods.contains_key(id) {
            return false;
        }
        self.verification_methods.insert(
            id.to_string(),
            VerificationMethodEntry {
                id: id.to_string(),
                method,
                revoked: false,
            },
        );
        true
    }

    pub(crate) fn update_verification_method(&mut self, id: &str, method: VerificationMethodDef) -> bool {
        match self.verification_methods.get_mut(id) {
            Some(entry) if !entry.revoked => {
                entry.method = method;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn revoke_verification_method(&mut self, id: &str) -> bool {
        match self.verification_methods.get_mut(id) {
            Some(entry) => {
                entry.revoked = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn create_verification_relationship(
        &mut self,
        id: &str,
        relationship_type: RelationshipType,
        method: VerificationMethodDef,
    ) -> bool {
        let key = (id.to_string(), relationship_type);
        if self.verification_relationships.contains_key(&key) {
            return false;
        }
        self.verification_relationships.insert(
            key,
            VerificationRelationshipEntry {
                id: id.to_string(),
                relationship_type,
                method,
                revoked: false,
            },
        );
        true
    }

    pub(crate) fn update_verification_relationship(
        &mut self,
        id: &str,
        relationship_type: RelationshipType,
        method: VerificationMethodDef,
    ) -> bool {
        match self
            .verification_relationships
            .get_mut(&(id.to_string(), relationship_type))
        {
            Some(entry) if !entry.revoked => {
                entry.method = method;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn revoke_verification_relationship(
        &mut self,
        id: &str,
        relationship_type: RelationshipType,
    ) -> bool {
        match self
            .verification_relationships
            .get_mut(&(id.to_string(), relationship_type))
        {
            Some(entry) => {
                entry.revoked = true;
                true
            }
            None => false,
        }
    }
}
