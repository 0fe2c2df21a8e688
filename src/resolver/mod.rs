/// Event message resolver
///
/// Collects every envelope of a topic. The mirror node never signals the end
/// of a topic, so a resolution completes once no new envelope has arrived for
/// the idle timeout.

pub mod cancel;

pub use cancel::CancelHandle;

use crate::{
    config::ResolverConfig,
    error::{DidError, DidResult},
    identity::TopicId,
    message::{Message, MessageEnvelope},
    transport::{
        ErrorHandler, InvalidMessageHandler, InvalidMessageReason, ListenerEvent, MessageFilter,
        MirrorClient, TopicListener, TopicMessage,
    },
};
use std::{collections::HashSet, future::pending, sync::Arc};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{debug, info, warn};

/// Acceptance hook applied to every opened message
pub type MessagePredicate = Box<dyn Fn(&Message) -> bool + Send + Sync>;

/// Aborts the listener task when the resolution ends, however it ends
struct ListenerGuard(JoinHandle<()>);

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Resolves the envelopes of one topic
pub struct EventMessageResolver {
    topic_id: TopicId,
    client: Arc<dyn MirrorClient>,
    config: ResolverConfig,
    predicate: Option<MessagePredicate>,
    filters: Vec<MessageFilter>,
    invalid_handler: Option<InvalidMessageHandler>,
    error_handler: Option<ErrorHandler>,
    cancel: CancelHandle,
}

impl EventMessageResolver {
    pub fn new(topic_id: TopicId, client: Arc<dyn MirrorClient>, config: ResolverConfig) -> Self {
        Self {
            topic_id,
            client,
            config,
            predicate: None,
            filters: Vec::new(),
            invalid_handler: None,
            error_handler: None,
            cancel: CancelHandle::new(),
        }
    }

    /// Discard messages for which `predicate` returns false
    pub fn set_message_predicate<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Filter raw topic messages before they are decoded
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

    /// Receive transport errors instead of failing the resolution
    pub fn on_error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&DidError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Box::new(handler));
        self
    }

    pub fn set_cancellation(&mut self, cancel: CancelHandle) -> &mut Self {
        self.cancel = cancel;
        self
    }

    /// Handle that abandons this resolution when cancelled
    pub fn cancellation(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Collect the topic's envelopes, deduplicated by signature, in arrival order
    pub async fn execute(self) -> DidResult<Vec<MessageEnvelope>> {
        let Self {
            topic_id,
            client,
            config,
            predicate,
            filters,
            invalid_handler,
            error_handler,
            cancel,
        } = self;

        if cancel.is_cancelled() {
            return Err(DidError::Cancelled);
        }

        info!("Resolving messages of topic {}", topic_id);

        let mut listener = TopicListener::new(topic_id, client, &config);
        for filter in filters {
            listener.add_filter(filter);
        }
        if let Some(handler) = invalid_handler {
            listener.on_invalid_message(handler);
        }
        if let Some(handler) = error_handler {
            listener.on_error(handler);
        }

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let _guard = ListenerGuard(listener.subscribe(events_tx, cancel.clone()));

        let started = Instant::now();
        let hard_deadline = config.hard_deadline.map(|limit| (started + limit, limit));
        let mut last_arrival = started;
        let mut initial_fetch_complete = false;
        let mut listener_done = false;

        let mut seen = HashSet::new();
        let mut results = Vec::new();

        loop {
            let idle_deadline = last_arrival + config.idle_timeout;
            let idle_armed = initial_fetch_complete || listener_done;
            let idle = async move {
                if idle_armed {
                    sleep_until(idle_deadline).await
                } else {
                    pending::<()>().await
                }
            };
            let hard = async move {
                match hard_deadline {
                    Some((deadline, _)) => sleep_until(deadline).await,
                    None => pending::<()>().await,
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Resolution of topic {} cancelled", topic_id);
                    return Err(DidError::Cancelled);
                }
                _ = hard => {
                    let limit = hard_deadline.map(|(_, limit)| limit).unwrap_or_default();
                    warn!("Resolution of topic {} exceeded {:?}", topic_id, limit);
                    return Err(DidError::DeadlineExceeded(limit));
                }
                _ = idle => break,
                event = events.recv(), if !listener_done => match event {
                    Some(ListenerEvent::Envelope(envelope)) => {
                        last_arrival = Instant::now();
                        accept(envelope, predicate.as_ref(), &mut seen, &mut results);
                    }
                    Some(ListenerEvent::InitialFetchComplete) => {
                        debug!("Initial fetch of topic {} complete", topic_id);
                        initial_fetch_complete = true;
                    }
                    Some(ListenerEvent::Error(e)) => return Err(e),
                    None => listener_done = true,
                },
            }
        }

        info!(
            "Resolved {} messages from topic {} in {:?}",
            results.len(),
            topic_id,
            started.elapsed()
        );
        Ok(results)
    }
}

fn accept(
    envelope: MessageEnvelope,
    predicate: Option<&MessagePredicate>,
    seen: &mut HashSet<String>,
    results: &mut Vec<MessageEnvelope>,
) {
    let Some(message) = envelope.open() else {
        debug!("Dropping envelope that does not open");
        return;
    };

    if let Some(predicate) = predicate {
        if !predicate(message) {
            debug!("Message {} {} rejected by predicate", message.operation(), message.did());
            return;
        }
    }

    let Some(signature) = envelope.signature() else {
        debug!("Dropping unsigned {} message for {}", message.operation(), message.did());
        return;
    };

    if !seen.insert(signature.to_string()) {
        debug!("Dropping duplicate message with signature {}", signature);
        return;
    }

    results.push(envelope);
}
