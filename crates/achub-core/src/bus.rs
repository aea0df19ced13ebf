//! Minimal async event bus.
//!
//! Subscribers receive events in registration order. Fan-out for one
//! `publish` is serialized end-to-end (a single `tokio::sync::Mutex` guards
//! the handler list for the whole call) so ordering holds both within one
//! event's fan-out and across successive publishes from the same producer.
//! A handler that fails is logged and skipped — `publish` itself never fails.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use crate::event::Event;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Capability a bus subscriber implements. Expressed with RPITIT and erased
/// through a hand-written blanket `ErasedEventHandler` impl rather than
/// `async-trait`, the same pattern the rest of this workspace uses for its
/// other polymorphic capabilities (protocol adapters, tool handlers).
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event) -> impl Future<Output = Result<(), HandlerError>> + Send;
}

trait ErasedEventHandler: Send + Sync {
    fn handle<'a>(
        &'a self,
        event: &'a Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;
}

impl<T: EventHandler> ErasedEventHandler for T {
    fn handle<'a>(
        &'a self,
        event: &'a Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>> {
        Box::pin(EventHandler::handle(self, event))
    }
}

/// Adapts a plain async closure into an [`EventHandler`] so sinks (journal,
/// console) don't need a one-off struct.
struct FnHandler<F>(F);

impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(&Event) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    fn handle(&self, event: &Event) -> impl Future<Output = Result<(), HandlerError>> + Send {
        (self.0)(event)
    }
}

struct Entry {
    id: u64,
    prefix: Option<String>,
    handler: Arc<dyn ErasedEventHandler>,
}

/// Unsubscribe handle returned by [`EventBus::subscribe`]. Dropping it has no
/// effect — call [`Subscription::unsubscribe`] explicitly. Unsubscribing is
/// idempotent and takes effect for subsequent publishes only.
pub struct Subscription {
    id: u64,
    handlers: Arc<Mutex<Vec<Entry>>>,
}

impl Subscription {
    pub async fn unsubscribe(self) {
        let mut guard = self.handlers.lock().await;
        guard.retain(|e| e.id != self.id);
    }
}

#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<Mutex<Vec<Entry>>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register `handler`. If `kind_prefix` is given, the handler only sees
    /// events whose `kind` starts with that literal prefix.
    pub async fn subscribe<H: EventHandler + 'static>(
        &self,
        handler: H,
        kind_prefix: Option<&str>,
    ) -> Subscription {
        self.subscribe_arc(Arc::new(handler), kind_prefix).await
    }

    /// Same as [`EventBus::subscribe`] but for a plain async closure.
    pub async fn subscribe_fn<F, Fut>(&self, kind_prefix: Option<&str>, f: F) -> Subscription
    where
        F: Fn(&Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.subscribe_arc(Arc::new(FnHandler(f)), kind_prefix).await
    }

    async fn subscribe_arc(
        &self,
        handler: Arc<dyn ErasedEventHandler>,
        kind_prefix: Option<&str>,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.handlers.lock().await;
        guard.push(Entry {
            id,
            prefix: kind_prefix.map(|s| s.to_string()),
            handler,
        });
        Subscription {
            id,
            handlers: Arc::clone(&self.handlers),
        }
    }

    /// Fan out `event` to every currently-subscribed, matching handler, in
    /// registration order, awaiting each before moving to the next.
    pub async fn publish(&self, event: Event) {
        let guard = self.handlers.lock().await;
        for entry in guard.iter() {
            if let Some(prefix) = &entry.prefix {
                if !event.kind.starts_with(prefix.as_str()) {
                    continue;
                }
            }
            if let Err(err) = entry.handler.handle(&event).await {
                warn!(kind = %event.kind, error = %err, "event handler failed, skipping");
            }
        }
    }

    pub async fn handler_count(&self) -> usize {
        self.handlers.lock().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn handler_failure_does_not_stop_fanout() {
        let bus = EventBus::new();
        let seen: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));

        bus.subscribe_fn(None, |_e| async {
            Err::<(), HandlerError>("boom".into())
        })
        .await;

        let seen_clone = Arc::clone(&seen);
        bus.subscribe_fn(None, move |e| {
            let seen = Arc::clone(&seen_clone);
            let kind = e.kind.clone();
            async move {
                seen.lock().unwrap().push(kind);
                Ok(())
            }
        })
        .await;

        bus.publish(crate::event::hub_stopped()).await;
        assert_eq!(seen.lock().unwrap().as_slice(), ["hub.stopped"]);
    }

    #[tokio::test]
    async fn prefix_filter_restricts_delivery() {
        let bus = EventBus::new();
        let seen: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        bus.subscribe_fn(Some("agent."), move |e| {
            let seen = Arc::clone(&seen_clone);
            let kind = e.kind.clone();
            async move {
                seen.lock().unwrap().push(kind);
                Ok(())
            }
        })
        .await;

        bus.publish(crate::event::hub_stopped()).await;
        bus.publish(crate::event::agent_stdout("a1", "hi")).await;
        assert_eq!(seen.lock().unwrap().as_slice(), ["agent.stdout"]);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_takes_effect_for_later_publishes() {
        let bus = EventBus::new();
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let sub = bus
            .subscribe_fn(None, move |_e| {
                let count = Arc::clone(&count_clone);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        bus.publish(crate::event::hub_stopped()).await;
        sub.unsubscribe().await;
        bus.publish(crate::event::hub_stopped()).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn registration_order_is_preserved() {
        let bus = EventBus::new();
        let order: Arc<StdMutex<Vec<u8>>> = Arc::new(StdMutex::new(Vec::new()));

        for tag in [1u8, 2, 3] {
            let order = Arc::clone(&order);
            bus.subscribe_fn(None, move |_e| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(tag);
                    Ok(())
                }
            })
            .await;
        }

        bus.publish(crate::event::hub_stopped()).await;
        assert_eq!(order.lock().unwrap().as_slice(), [1, 2, 3]);
    }
}
