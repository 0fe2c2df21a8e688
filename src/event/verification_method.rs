/// Verification method and verification relationship events
use crate::{
    codec::Jwk,
    error::{DidError, DidResult},
    event::{
        require_controller, split_event_id, validate_numbered_fragment, EventAction,
        PublicKeyFormat, PublicKeyMaterial,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const KEY_FRAGMENT_PREFIX: &str = "key-";

/// Purposes a key can be bound to within a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipType {
    Authentication,
    AssertionMethod,
    KeyAgreement,
    CapabilityInvocation,
    CapabilityDelegation,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 5] = [
        RelationshipType::Authentication,
        RelationshipType::AssertionMethod,
        RelationshipType::KeyAgreement,
        RelationshipType::CapabilityInvocation,
        RelationshipType::CapabilityDelegation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Authentication => "authentication",
            RelationshipType::AssertionMethod => "assertionMethod",
            RelationshipType::KeyAgreement => "keyAgreement",
            RelationshipType::CapabilityInvocation => "capabilityInvocation",
            RelationshipType::CapabilityDelegation => "capabilityDelegation",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controller and key of a verification method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationMethodDef {
    pub controller: String,
    pub key: PublicKeyMaterial,
}

impl VerificationMethodDef {
    pub fn new(controller: impl Into<String>, key: PublicKeyMaterial) -> DidResult<Self> {
        let controller = controller.into();
        require_controller(&controller)?;
        Ok(Self { controller, key })
    }
}

/// Wire shape shared by owner, verification method and relationship bodies
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct KeyBodyJson {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<RelationshipType>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub format: Option<PublicKeyFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<Jwk>,
}

impl KeyBodyJson {
    pub fn from_def(id: &str, def: &VerificationMethodDef) -> DidResult<Self> {
        let mut body = Self {
            id: id.to_string(),
            format: Some(def.key.format()),
            controller: Some(def.controller.clone()),
            ..Self::default()
        };
        if def.key.is_jwk() {
            body.public_key_jwk = Some(def.key.to_jwk()?);
        } else {
            body.public_key_multibase = Some(def.key.to_multibase()?);
        }
        Ok(body)
    }

    /// Rebuild the method definition; exactly one key encoding must be present
    pub fn to_def(&self) -> DidResult<VerificationMethodDef> {
        let format = self
            .format
            .ok_or_else(|| self.missing("type"))?;
        let controller = self
            .controller
            .as_deref()
            .ok_or_else(|| self.missing("controller"))?;

        let key = match (&self.public_key_multibase, &self.public_key_jwk) {
            (Some(multibase), None) => PublicKeyMaterial::from_multibase(format, multibase)?,
            (None, Some(jwk)) => PublicKeyMaterial::from_jwk(format, jwk)?,
            (Some(_), Some(_)) => {
                return Err(DidError::Validation(format!(
                    "'{}' carries both publicKeyMultibase and publicKeyJwk",
                    self.id
                )))
            }
            (None, None) => return Err(self.missing("publicKeyMultibase")),
        };

        VerificationMethodDef::new(controller, key)
    }

    pub fn into_value(self) -> DidResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn missing(&self, field: &str) -> DidError {
        DidError::Validation(format!("'{}' is missing required field '{}'", self.id, field))
    }
}

fn validate_key_id(id: &str) -> DidResult<()> {
    let (_, fragment) = split_event_id(id)?;
    validate_numbered_fragment(id, fragment, KEY_FRAGMENT_PREFIX)
}

/// Create, update or revoke a verification method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationMethodEvent {
    pub action: EventAction,
    pub id: String,
    /// Absent for revocations
    pub method: Option<VerificationMethodDef>,
}

impl VerificationMethodEvent {
    pub fn create(id: impl Into<String>, method: VerificationMethodDef) -> DidResult<Self> {
        Self::new(EventAction::Create, id.into(), Some(method))
    }

    pub fn update(id: impl Into<String>, method: VerificationMethodDef) -> DidResult<Self> {
        Self::new(EventAction::Update, id.into(), Some(method))
    }

    pub fn revoke(id: impl Into<String>) -> DidResult<Self> {
        Self::new(EventAction::Revoke, id.into(), None)
    }

    fn new(
        action: EventAction,
        id: String,
        method: Option<VerificationMethodDef>,
    ) -> DidResult<Self> {
        validate_key_id(&id)?;
        if action != EventAction::Revoke && method.is_none() {
            return Err(DidError::Validation(format!(
                "Verification method '{}' requires a key",
                id
            )));
        }
        Ok(Self { action, id, method })
    }

    pub(crate) fn from_json_body(action: EventAction, body: Value) -> DidResult<Self> {
        let body: KeyBodyJson = serde_json::from_value(body)
            .map_err(|e| DidError::Validation(format!("Invalid VerificationMethod: {}", e)))?;

        let method = match action {
            EventAction::Revoke => None,
            _ => Some(body.to_def()?),
        };
        Self::new(action, body.id, method)
    }

    pub(crate) fn to_json_body(&self) -> DidResult<Value> {
        let body = match &self.method {
            Some(def) => KeyBodyJson::from_def(&self.id, def)?,
            None => KeyBodyJson {
                id: self.id.clone(),
                ..KeyBodyJson::default()
            },
        };
        body.into_value()
    }
}

/// Create, update or revoke a key's binding to one relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRelationshipEvent {
    pub action: EventAction,
    pub id: String,
    pub relationship_type: RelationshipType,
    /// Absent for revocations
    pub method: Option<VerificationMethodDef>,
}

impl VerificationRelationshipEvent {
    pub fn create(
        id: impl Into<String>,
        relationship_type: RelationshipType,
        method: VerificationMethodDef,
    ) -> DidResult<Self> {
        Self::new(EventAction::Create, id.into(), relationship_type, Some(method))
    }

    pub fn update(
        id: impl Into<String>,
        relationship_type: RelationshipType,
        method: VerificationMethodDef,
    ) -> DidResult<Self> {
        Self::new(EventAction::Update, id.into(), relationship_type, Some(method))
    }

    pub fn revoke(id: impl Into<String>, relationship_type: RelationshipType) -> DidResult<Self> {
        Self::new(EventAction::Revoke, id.into(), relationship_type, None)
    }

    fn new(
        action: EventAction,
        id: String,
        relationship_type: RelationshipType,
        method: Option<VerificationMethodDef>,
    ) -> DidResult<Self> {
        validate_key_id(&id)?;
        if action != EventAction::Revoke && method.is_none() {
            return Err(DidError::Validation(format!(
                "Verification relationship '{}' requires a key",
                id
            )));
        }
        Ok(Self {
            action,
            id,
            relationship_type,
            method,
        })
    }

    pub(crate) fn from_json_body(action: EventAction, body: Value) -> DidResult<Self> {
        let body: KeyBodyJson = serde_json::from_value(body).map_err(|e| {
            DidError::Validation(format!("Invalid VerificationRelationship: {}", e))
        })?;

        let relationship_type = body
            .relationship_type
            .ok_or_else(|| body.missing("relationshipType"))?;
        let method = match action {
            EventAction::Revoke => None,
            _ => Some(body.to_def()?),
        };
        Self::new(action, body.id, relationship_type, method)
    }

    pub(crate) fn to_json_body(&self) -> DidResult<Value> {
        let mut body = match &self.method {
            Some(def) => KeyBodyJson::from_def(&self.id, def)?,
            None => KeyBodyJson {
                id: self.id.clone(),
                ..KeyBodyJson::default()
            },
        };
        body.relationship_type = Some(self.relationship_type);
        body.into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_support::test_did;
    use serde_json::json;

    fn method() -> VerificationMethodDef {
        let key = PublicKeyMaterial::multibase_key(&[5u8; 32]).unwrap();
        VerificationMethodDef::new(test_did(), key).unwrap()
    }

    #[test]
    fn test_create_requires_key_id_format() {
        let bad = format!("{}#did-root-key", test_did());
        assert!(VerificationMethodEvent::create(bad, method()).is_err());

        let good = format!("{}#key-1", test_did());
        assert!(VerificationMethodEvent::create(good, method()).is_ok());
    }

    #[test]
    fn test_json_body_shape() {
        let id = format!("{}#key-1", test_did());
        let event = VerificationMethodEvent::create(id.clone(), method()).unwrap();
        let body = event.to_json_body().unwrap();

        assert_eq!(body["id"], json!(id));
        assert_eq!(body["type"], json!("Ed25519VerificationKey2020"));
        assert_eq!(body["controller"], json!(test_did()));
        assert!(body["publicKeyMultibase"].as_str().unwrap().starts_with("z6Mk"));
        assert!(body.get("publicKeyJwk").is_none());
    }

    #[test]
    fn test_revoke_body_carries_only_id() {
        let id = format!("{}#key-3", test_did());
        let event = VerificationMethodEvent::revoke(id.clone()).unwrap();
        assert_eq!(event.to_json_body().unwrap(), json!({ "id": id }));

        let rel = VerificationRelationshipEvent::revoke(id.clone(), RelationshipType::KeyAgreement)
            .unwrap();
        assert_eq!(
            rel.to_json_body().unwrap(),
            json!({ "id": id, "relationshipType": "keyAgreement" })
        );
    }

    #[test]
    fn test_relationship_requires_relationship_type() {
        let id = format!("{}#key-1", test_did());
        let mut body = VerificationMethodEvent::create(id, method())
            .unwrap()
            .to_json_body()
            .unwrap();
        assert!(VerificationRelationshipEvent::from_json_body(EventAction::Create, body.clone()).is_err());

        body["relationshipType"] = json!("authentication");
        let event = VerificationRelationshipEvent::from_json_body(EventAction::Create, body).unwrap();
        assert_eq!(event.relationship_type, RelationshipType::Authentication);
    }

    #[test]
    fn test_unsupported_relationship_type_rejected() {
        let id = format!("{}#key-1", test_did());
        let body = json!({ "id": id, "relationshipType": "signing" });
        assert!(VerificationRelationshipEvent::from_json_body(EventAction::Revoke, body).is_err());
    }

    #[test]
    fn test_both_key_encodings_rejected() {
        let id = format!("{}#key-1", test_did());
        let mut body = VerificationMethodEvent::create(id, method())
            .unwrap()
            .to_json_body()
            .unwrap();
        body["publicKeyJwk"] = json!({ "kty": "OKP", "crv": "Ed25519", "x": "AAAA" });
        assert!(VerificationMethodEvent::from_json_body(EventAction::Create, body).is_err());
    }
}
