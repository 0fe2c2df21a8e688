/// Mirror node transport
///
/// Reads a DID topic's messages from a mirror node and turns them into
/// envelopes. Supports multiple client implementations (REST, in-memory).

pub mod listener;
pub mod mirror;
pub mod models;

pub use listener::{
    ErrorHandler, InvalidMessageHandler, InvalidMessageReason, ListenerEvent, MessageFilter,
    TopicListener,
};
pub use mirror::HttpMirrorClient;
pub use models::{PageLinks, TopicMessage, TopicMessagesPage};

use crate::{error::DidResult, identity::TopicId};
use async_trait::async_trait;

/// Mirror node client trait
///
/// Implementations return topic messages in consensus order.
#[async_trait]
pub trait MirrorClient: Send + Sync {
    /// Fetch one page of messages with consensus timestamps strictly after `after`
    async fn fetch_messages(
        &self,
        topic_id: &TopicId,
        after: Option<&str>,
    ) -> DidResult<TopicMessagesPage>;
}
