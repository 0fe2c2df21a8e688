/// DID owner (root key) events
use crate::{
    error::{DidError, DidResult},
    event::{
        split_event_id, verification_method::KeyBodyJson, EventAction, VerificationMethodDef,
    },
};
use serde_json::Value;

pub const ROOT_KEY_FRAGMENT: &str = "did-root-key";

/// Register or replace the document owner
///
/// The owner cannot be revoked; only `Create` and `Update` are valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerEvent {
    pub action: EventAction,
    pub id: String,
    pub method: VerificationMethodDef,
}

impl OwnerEvent {
    pub fn create(id: impl Into<String>, method: VerificationMethodDef) -> DidResult<Self> {
        Self::new(EventAction::Create, id.into(), method)
    }

    pub fn update(id: impl Into<String>, method: VerificationMethodDef) -> DidResult<Self> {
        Self::new(EventAction::Update, id.into(), method)
    }

    fn new(action: EventAction, id: String, method: VerificationMethodDef) -> DidResult<Self> {
        if action == EventAction::Revoke {
            return Err(DidError::Validation(
                "The DID owner cannot be revoked".to_string(),
            ));
        }

        let (_, fragment) = split_event_id(&id)?;
        if fragment != ROOT_KEY_FRAGMENT {
            return Err(DidError::Validation(format!(
                "Owner event id '{}' must end with #{}",
                id, ROOT_KEY_FRAGMENT
            )));
        }

        Ok(Self { action, id, method })
    }

    /// The DID this root key belongs to
    pub fn did(&self) -> &str {
        self.id
            .split_once('#')
            .map(|(did, _)| did)
            .unwrap_or(&self.id)
    }

    pub(crate) fn from_json_body(action: EventAction, body: Value) -> DidResult<Self> {
        let body: KeyBodyJson = serde_json::from_value(body)
            .map_err(|e| DidError::Validation(format!("Invalid DIDOwner: {}", e)))?;
        let method = body.to_def()?;
        Self::new(action, body.id, method)
    }

    pub(crate) fn to_json_body(&self) -> DidResult<Value> {
        KeyBodyJson::from_def(&self.id, &self.method)?.into_value()
    }
}
