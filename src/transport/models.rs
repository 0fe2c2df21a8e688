/// Mirror node REST response models
use crate::error::{DidError, DidResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// One entry of a topic, as served by the mirror node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMessage {
    /// `seconds.nanoseconds`
    pub consensus_timestamp: String,
    /// Base64 message contents
    pub message: String,
    pub sequence_number: u64,
    pub topic_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_hash: Option<String>,
}

impl TopicMessage {
    /// Wrap raw contents as if the mirror node served them
    pub fn new(
        topic_id: impl Into<String>,
        sequence_number: u64,
        consensus_timestamp: impl Into<String>,
        contents: &[u8],
    ) -> Self {
        Self {
            consensus_timestamp: consensus_timestamp.into(),
            message: STANDARD.encode(contents),
            sequence_number,
            topic_id: topic_id.into(),
            running_hash: None,
        }
    }

    /// Decoded message contents
    pub fn contents(&self) -> DidResult<Vec<u8>> {
        STANDARD
            .decode(self.message.trim())
            .map_err(|e| DidError::Decode(format!("Invalid base64 topic message: {}", e)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    #[serde(default)]
    pub next: Option<String>,
}

/// `GET /api/v1/topics/{id}/messages` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMessagesPage {
    #[serde(default)]
    pub messages: Vec<TopicMessage>,
    #[serde(default)]
    pub links: PageLinks,
}

impl TopicMessagesPage {
    pub fn new(messages: Vec<TopicMessage>) -> Self {
        Self {
            messages,
            links: PageLinks::default(),
        }
    }

    /// Whether the mirror node reported more messages beyond this page
    pub fn has_next(&self) -> bool {
        self.links.next.is_some() && !self.messages.is_empty()
    }
}
