/// Service endpoint events
use crate::{
    error::{DidError, DidResult},
    event::{split_event_id, validate_numbered_fragment, EventAction},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SERVICE_FRAGMENT_PREFIX: &str = "service-";

/// Supported service types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    LinkedDomains,
    #[serde(rename = "DIDCommMessaging")]
    DidCommMessaging,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::LinkedDomains => "LinkedDomains",
            ServiceType::DidCommMessaging => "DIDCommMessaging",
        }
    }
}

/// Type and endpoint of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDef {
    pub service_type: ServiceType,
    pub service_endpoint: String,
}

impl ServiceDef {
    pub fn new(service_type: ServiceType, service_endpoint: impl Into<String>) -> DidResult<Self> {
        let service_endpoint = service_endpoint.into();
        if service_endpoint.trim().is_empty() {
            return Err(DidError::Validation(
                "Service endpoint cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            service_type,
            service_endpoint,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceJson {
    id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    service_type: Option<ServiceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service_endpoint: Option<String>,
}

/// Create, update or revoke a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEvent {
    pub action: EventAction,
    pub id: String,
    /// Absent for revocations
    pub service: Option<ServiceDef>,
}

impl ServiceEvent {
    pub fn create(id: impl Into<String>, service: ServiceDef) -> DidResult<Self> {
        Self::new(EventAction::Create, id.into(), Some(service))
    }

    pub fn update(id: impl Into<String>, service: ServiceDef) -> DidResult<Self> {
        Self::new(EventAction::Update, id.into(), Some(service))
    }

    pub fn revoke(id: impl Into<String>) -> DidResult<Self> {
        Self::new(EventAction::Revoke, id.into(), None)
    }

    fn new(action: EventAction, id: String, service: Option<ServiceDef>) -> DidResult<Self> {
        let (_, fragment) = split_event_id(&id)?;
        validate_numbered_fragment(&id, fragment, SERVICE_FRAGMENT_PREFIX)?;

        if action != EventAction::Revoke && service.is_none() {
            return Err(DidError::Validation(format!(
                "Service '{}' requires a type and endpoint",
                id
            )));
        }
        Ok(Self {
            action,
            id,
            service,
        })
    }

    pub(crate) fn from_json_body(action: EventAction, body: Value) -> DidResult<Self> {
        let body: ServiceJson = serde_json::from_value(body)
            .map_err(|e| DidError::Validation(format!("Invalid Service: {}", e)))?;

        let service = match action {
            EventAction::Revoke => None,
            _ => {
                let service_type = body.service_type.ok_or_else(|| {
                    DidError::Validation(format!("Service '{}' is missing 'type'", body.id))
                })?;
                let endpoint = body.service_endpoint.ok_or_else(|| {
                    DidError::Validation(format!(
                        "Service '{}' is missing 'serviceEndpoint'",
                        body.id
                    ))
                })?;
                Some(ServiceDef::new(service_type, endpoint)?)
            }
        };
        Self::new(action, body.id, service)
    }

    pub(crate) fn to_json_body(&self) -> DidResult<Value> {
        let body = ServiceJson {
            id: self.id.clone(),
            service_type: self.service.as_ref().map(|s| s.service_type),
            service_endpoint: self.service.as_ref().map(|s| s.service_endpoint.clone()),
        };
        Ok(serde_json::to_value(body)?)
    }
}
