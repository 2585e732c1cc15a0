//! The consumer-facing event channel.
//!
//! Producers hold an [`EventSender`] bound to one generation and push
//! [`StreamEvent`]s into an unbounded FIFO queue. The consumer owns the
//! [`EventChannel`], whose pump task delivers every message, in order, to the
//! listeners registered for its kind. Messages with no listener are dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{ChannelMessage, EventKind, GenerationId, StreamEvent};

type Listener = Arc<dyn Fn(&ChannelMessage) + Send + Sync>;

/// Producer half, bound to a single generation.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<ChannelMessage>,
    generation: GenerationId,
}

impl EventSender {
    pub fn generation(&self) -> GenerationId {
        self.generation
    }

    /// Push an event. Returns `false` once the consumer is gone.
    pub fn send(&self, event: StreamEvent) -> bool {
        self.tx
            .send(ChannelMessage {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    /// Whether the consumer has been torn down.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for EventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender")
            .field("generation", &self.generation)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<u64, (EventKind, Listener)>,
}

struct Listeners(Mutex<Registry>);

impl Listeners {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, kind: EventKind, listener: Listener) -> u64 {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(id, (kind, listener));
        id
    }

    fn remove(&self, id: u64) {
        self.lock().listeners.remove(&id);
    }

    /// Listeners for `kind`, in registration order.
    fn matching(&self, kind: EventKind) -> Vec<Listener> {
        let registry = self.lock();
        let mut matching: Vec<_> = registry
            .listeners
            .iter()
            .filter(|(_, (k, _))| *k == kind)
            .map(|(id, (_, listener))| (*id, Arc::clone(listener)))
            .collect();
        matching.sort_by_key(|(id, _)| *id);
        matching.into_iter().map(|(_, listener)| listener).collect()
    }

    fn len(&self) -> usize {
        self.lock().listeners.len()
    }
}

/// Handle to a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription removes the listener"]
pub struct Subscription {
    listeners: Weak<Listeners>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Consumer half. Must be created inside a Tokio runtime.
pub struct EventChannel {
    tx: mpsc::UnboundedSender<ChannelMessage>,
    listeners: Arc<Listeners>,
    pump: JoinHandle<()>,
}

impl EventChannel {
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ChannelMessage>();
        let listeners = Arc::new(Listeners(Mutex::new(Registry::default())));

        let pump_listeners = Arc::clone(&listeners);
        let pump = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                // Listeners may (un)subscribe, so call them outside the lock
                let targets = pump_listeners.matching(message.event.kind());
                if targets.is_empty() {
                    tracing::trace!(generation = %message.generation, "dropping event with no listener");
                }
                for listener in targets {
                    listener(&message);
                }
            }
        });

        Self {
            tx,
            listeners,
            pump,
        }
    }

    /// A producer handle whose events are tagged with `generation`.
    pub fn sender(&self, generation: GenerationId) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
            generation,
        }
    }

    pub fn on_chunk<F>(&self, listener: F) -> Subscription
    where
        F: Fn(GenerationId, &str) + Send + Sync + 'static,
    {
        self.register(EventKind::Chunk, move |message| {
            if let StreamEvent::Chunk { text } = &message.event {
                listener(message.generation, text);
            }
        })
    }

    pub fn on_end<F>(&self, listener: F) -> Subscription
    where
        F: Fn(GenerationId) + Send + Sync + 'static,
    {
        self.register(EventKind::End, move |message| listener(message.generation))
    }

    pub fn on_error<F>(&self, listener: F) -> Subscription
    where
        F: Fn(GenerationId, &str) + Send + Sync + 'static,
    {
        self.register(EventKind::Error, move |message| {
            if let StreamEvent::Error { message: text } = &message.event {
                listener(message.generation, text);
            }
        })
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn register<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&ChannelMessage) + Send + Sync + 'static,
    {
        let id = self.listeners.insert(kind, Arc::new(listener));
        Subscription {
            listeners: Arc::downgrade(&self.listeners),
            id,
        }
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}
