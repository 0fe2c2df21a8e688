/// Whole-document snapshot events
///
/// A `create-did-document` message anchors a complete DID document stored
/// off-ledger; the event carries its content id and retrieval URL.
use crate::{
    error::{DidError, DidResult},
    identity::HcsDid,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DOCUMENT_TYPE: &str = "DIDDocument";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEvent {
    pub id: String,
    pub cid: String,
    pub url: String,
}

#[derive(Serialize, Deserialize)]
struct DocumentJson {
    id: String,
    #[serde(rename = "type")]
    doc_type: String,
    cid: String,
    url: String,
}

impl DocumentEvent {
    pub fn new(did: impl Into<String>, cid: impl Into<String>, url: impl Into<String>) -> DidResult<Self> {
        let id = did.into();
        HcsDid::parse(&id)
            .map_err(|e| DidError::Validation(format!("Document id '{}' is invalid: {}", id, e)))?;

        let cid = cid.into();
        let url = url.into();
        if cid.is_empty() || url.is_empty() {
            return Err(DidError::Validation(
                "Document events require 'cid' and 'url'".to_string(),
            ));
        }
        Ok(Self { id, cid, url })
    }

    pub(crate) fn from_json_body(body: Value) -> DidResult<Self> {
        let body: DocumentJson = serde_json::from_value(body)
            .map_err(|e| DidError::Validation(format!("Invalid DIDDocument: {}", e)))?;
        if body.doc_type != DOCUMENT_TYPE {
            return Err(DidError::Validation(format!(
                "Unexpected document type '{}'",
                body.doc_type
            )));
        }
        Self::new(body.id, body.cid, body.url)
    }

    pub(crate) fn to_json_body(&self) -> DidResult<Value> {
        Ok(serde_json::to_value(DocumentJson {
            id: self.id.clone(),
            doc_type: DOCUMENT_TYPE.to_string(),
            cid: self.cid.clone(),
            url: self.url.clone(),
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_support::test_did;

    #[test]
    fn test_document_event_requires_cid() {
        assert!(DocumentEvent::new(test_did(), "", "https://ipfs.io/ipfs/x").is_err());
        assert!(DocumentEvent::new("did:web:example.com", "bafy", "https://ipfs.io/ipfs/bafy").is_err());
    }

    #[test]
    fn test_document_type_checked() {
        let mut body = DocumentEvent::new(test_did(), "bafy", "https://ipfs.io/ipfs/bafy")
            .unwrap()
            .to_json_body()
            .unwrap();
        assert_eq!(body["type"], "DIDDocument");
        body["type"] = serde_json::json!("Other");
        assert!(DocumentEvent::from_json_body(body).is_err());
    }
}
