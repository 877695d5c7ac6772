use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, error};

use crate::event::{DomainEvent, EventKind};

/// Something that reacts to lifecycle events.
///
/// Failures are logged by the bus and never reach the publisher or other
/// subscribers.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Subscriber identifier, used in logs.
    fn id(&self) -> &str;
    /// Topics this subscriber wants.
    fn topics(&self) -> &[EventKind];
    async fn on_event(&self, event: &DomainEvent) -> Result<()>;
}

/// How `publish` runs subscribers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Each subscriber runs on its own spawned task; `publish` returns at once.
    #[default]
    Detached,
    /// Subscribers run concurrently and `publish` waits for all of them.
    Inline,
}

/// Publish/subscribe channel for [`DomainEvent`]s.
///
/// Constructed once and handed to whoever needs it. There is no global
/// instance.
#[derive(Default)]
pub struct EventBus {
    mode: DeliveryMode,
    subscribers: RwLock<HashMap<EventKind, Vec<Arc<dyn Subscriber>>>>,
}

impl EventBus {
    pub fn new(mode: DeliveryMode) -> Self {
        Self {
            mode,
            subscribers: RwLock::default(),
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        let mut map = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for &kind in subscriber.topics() {
            map.entry(kind).or_default().push(subscriber.clone());
        }
        debug!(subscriber = subscriber.id(), "Subscriber registered");
    }

    /// Number of subscribers listening on a topic.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&kind)
            .map_or(0, Vec::len)
    }

    fn subscribers_for(&self, kind: EventKind) -> Vec<Arc<dyn Subscriber>> {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    /// Deliver an event according to the bus's [`DeliveryMode`].
    pub async fn publish(&self, event: DomainEvent) {
        match self.mode {
            DeliveryMode::Detached => self.spawn(event),
            DeliveryMode::Inline => {
                self.dispatch(&event).await;
            }
        }
    }

    /// Run every subscriber on its own task and return immediately.
    pub fn spawn(&self, event: DomainEvent) {
        let subscribers = self.subscribers_for(event.kind());
        if subscribers.is_empty() {
            return;
        }

        let event = Arc::new(event);
        for subscriber in subscribers {
            let event = event.clone();
            tokio::spawn(async move {
                deliver(subscriber.as_ref(), &event).await;
            });
        }
    }

    /// Run every subscriber concurrently and wait for all of them.
    /// Returns how many failed.
    pub async fn dispatch(&self, event: &DomainEvent) -> usize {
        let subscribers = self.subscribers_for(event.kind());
        let outcomes = join_all(
            subscribers
                .iter()
                .map(|subscriber| deliver(subscriber.as_ref(), event)),
        )
        .await;
        outcomes.into_iter().filter(|ok| !ok).count()
    }
}

async fn deliver(subscriber: &dyn Subscriber, event: &DomainEvent) -> bool {
    match subscriber.on_event(event).await {
        Ok(()) => true,
        Err(e) => {
            error!(
                subscriber = subscriber.id(),
                topic = event.topic(),
                error = %e,
                "Event subscriber failed"
            );
            false
        }
    }
}
