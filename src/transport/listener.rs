/// Topic listener
///
/// Each poll cycle fetches every message after the cursor, runs the filters,
/// extracts the envelope and checks it belongs to the topic. Accepted
/// envelopes go to the receiver; everything else is reported to the
/// invalid-message handler. One bad entry never stops the cycle.
use crate::{
    config::ResolverConfig,
    error::{DidError, DidResult},
    identity::TopicId,
    message::MessageEnvelope,
    resolver::CancelHandle,
    transport::{MirrorClient, TopicMessage},
};
use std::{fmt, sync::Arc, time::Duration};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

/// Predicate over raw topic messages; `false` rejects the message
pub type MessageFilter = Box<dyn Fn(&TopicMessage) -> bool + Send + Sync>;

/// Callback for messages that were fetched but not delivered
pub type InvalidMessageHandler = Box<dyn Fn(&TopicMessage, &InvalidMessageReason) + Send + Sync>;
/// Callback for transport errors; a registered handler keeps them non-fatal
pub type ErrorHandler = Box<dyn Fn(&DidError) + Send + Sync>;

/// Why a topic message was not delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidMessageReason {
    RejectedByFilter,
    /// Contents are not a base64 JSON envelope
    Undecodable(String),
    /// Envelope decoded but its message is unusable for this topic
    InvalidEnvelope(String),
}

impl fmt::Display for InvalidMessageReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidMessageReason::RejectedByFilter => f.write_str("rejected by filter"),
            InvalidMessageReason::Undecodable(e) => write!(f, "undecodable: {}", e),
            InvalidMessageReason::InvalidEnvelope(e) => write!(f, "invalid envelope: {}", e),
        }
    }
}

/// Events emitted by a subscribed listener
#[derive(Debug)]
pub enum ListenerEvent {
    Envelope(MessageEnvelope),
    /// The first poll cycle has finished
    InitialFetchComplete,
    /// Unhandled transport error; the subscription has stopped
    Error(DidError),
}

/// Listener bound to a single topic
pub struct TopicListener {
    topic_id: TopicId,
    client: Arc<dyn MirrorClient>,
    filters: Vec<MessageFilter>,
    invalid_handler: Option<InvalidMessageHandler>,
    error_handler: Option<ErrorHandler>,
    ignore_errors: bool,
    poll_interval: Duration,
    cursor: Option<String>,
}

impl TopicListener {
    pub fn new(topic_id: TopicId, client: Arc<dyn MirrorClient>, config: &ResolverConfig) -> Self {
        Self {
            topic_id,
            client,
            filters: Vec::new(),
            invalid_handler: None,
            error_handler: None,
            ignore_errors: config.ignore_errors,
            poll_interval: config.poll_interval,
            cursor: None,
        }
    }

    pub fn topic_id(&self) -> &TopicId {
        &self.topic_id
    }

    /// Consensus timestamp of the last message seen
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Filters run in registration order; the first rejection wins
    pub fn add_filter(&mut self, filter: MessageFilter) -> &mut Self {
        self.filters.push(filter);
        self
    }

    pub fn on_invalid_message<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&TopicMessage, &InvalidMessageReason) + Send + Sync + 'static,
    {
        self.invalid_handler = Some(Box::new(handler));
        self
    }

    pub fn on_error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&DidError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Box::new(handler));
        self
    }

    pub fn set_ignore_errors(&mut self, ignore_errors: bool) -> &mut Self {
        self.ignore_errors = ignore_errors;
        self
    }

    /// Run one poll cycle, returning how many envelopes were delivered
    ///
    /// Transport errors go to the error handler when one is registered, are
    /// swallowed when errors are ignored, and are returned otherwise.
    pub async fn poll<F>(&mut self, mut receiver: F) -> DidResult<usize>
    where
        F: FnMut(MessageEnvelope) + Send,
    {
        let mut delivered = 0;

        loop {
            let page = match self
                .client
                .fetch_messages(&self.topic_id, self.cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    self.handle_transport_error(e)?;
                    return Ok(delivered);
                }
            };

            let has_next = page.has_next();
            for message in page.messages {
                self.cursor = Some(message.consensus_timestamp.clone());

                match self.extract(&message) {
                    Ok(envelope) => {
                        receiver(envelope);
                        delivered += 1;
                    }
                    Err(reason) => self.report_invalid(&message, &reason),
                }
            }

            if !has_next {
                break;
            }
        }

        Ok(delivered)
    }

    /// Poll on an interval in a background task until cancelled
    ///
    /// `InitialFetchComplete` is sent once after the first cycle. The task
    /// stops after sending `Error` or when the receiving side is dropped.
    pub fn subscribe(
        mut self,
        events: mpsc::UnboundedSender<ListenerEvent>,
        cancel: CancelHandle,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Subscribing to topic {}", self.topic_id);

            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut initial_fetch = true;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Subscription to topic {} cancelled", self.topic_id);
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                let sender = events.clone();
                let result = self
                    .poll(move |envelope| {
                        let _ = sender.send(ListenerEvent::Envelope(envelope));
                    })
                    .await;

                if let Err(e) = result {
                    let _ = events.send(ListenerEvent::Error(e));
                    break;
                }

                if initial_fetch {
                    initial_fetch = false;
                    let _ = events.send(ListenerEvent::InitialFetchComplete);
                }

                if events.is_closed() {
                    break;
                }
            }
        })
    }

    fn extract(&self, message: &TopicMessage) -> Result<MessageEnvelope, InvalidMessageReason> {
        if !self.filters.iter().all(|filter| filter(message)) {
            return Err(InvalidMessageReason::RejectedByFilter);
        }

        let contents = message
            .contents()
            .map_err(|e| InvalidMessageReason::Undecodable(e.to_string()))?;
        let envelope = MessageEnvelope::from_json(&contents)
            .map_err(|e| InvalidMessageReason::Undecodable(e.to_string()))?
            .with_consensus_metadata(message.consensus_timestamp.clone(), message.sequence_number);

        let opened = envelope.open().ok_or_else(|| {
            InvalidMessageReason::InvalidEnvelope("message does not decode".to_string())
        })?;
        if !opened.is_valid(Some(&self.topic_id)) {
            return Err(InvalidMessageReason::InvalidEnvelope(format!(
                "message for {} is not valid on topic {}",
                opened.did(),
                self.topic_id
            )));
        }

        Ok(envelope)
    }

    fn report_invalid(&self, message: &TopicMessage, reason: &InvalidMessageReason) {
        debug!(
            "Skipping topic message #{} ({}): {}",
            message.sequence_number, message.consensus_timestamp, reason
        );
        if let Some(handler) = &self.invalid_handler {
            handler(message, reason);
        }
    }

    fn handle_transport_error(&self, error: DidError) -> DidResult<()> {
        if let Some(handler) = &self.error_handler {
            handler(&error);
            return Ok(());
        }

        if self.ignore_errors {
            warn!("Ignoring transport error on topic {}: {}", self.topic_id, error);
            return Ok(());
        }

        Err(error)
    }
}
