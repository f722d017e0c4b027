use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

use super::{Document, DocumentStore};
use crate::bus::{Event, EventBus};

/// Handle for a live collection subscription.
///
/// The owner must call [`unsubscribe`](Subscription::unsubscribe) when it
/// stops observing. Dropping the handle without doing so detaches the
/// delivery task for the life of the process.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivery. No callback invocation happens after this returns,
    /// whatever the store does next.
    pub fn unsubscribe(self) {
        self.task.abort();
    }
}

/// Observe a collection. The callback receives the full current snapshot
/// once up front, then a freshly fetched snapshot after every change
/// signal for that collection, never a diff.
///
/// Exactly one bus subscription is registered per call, before the
/// delivery task starts, so no change signal can slip between the two.
/// Calls for the same collection are independent of each other.
pub fn subscribe<F>(
    store: Arc<dyn DocumentStore>,
    bus: &EventBus,
    collection: &str,
    on_update: F,
) -> Subscription
where
    F: Fn(Vec<Document>) + Send + Sync + 'static,
{
    let mut rx = bus.subscribe();
    let collection = collection.to_string();
    let task = tokio::spawn(async move {
        deliver(&*store, &collection, &on_update).await;
        loop {
            match rx.recv().await {
                Ok(Event::CollectionChanged {
                    collection: changed,
                }) if changed == collection => {
                    deliver(&*store, &collection, &on_update).await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    // Missed signals collapse into one refresh; the
                    // snapshot is always the full collection anyway.
                    warn!("Subscription to {collection} lagged by {skipped} events, refreshing");
                    deliver(&*store, &collection, &on_update).await;
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    Subscription { task }
}

async fn deliver<F>(store: &dyn DocumentStore, collection: &str, on_update: &F)
where
    F: Fn(Vec<Document>),
{
    match store.list(collection).await {
        Ok(snapshot) => on_update(snapshot),
        Err(e) => warn!("Could not refresh {collection} snapshot: {e}"),
    }
}
