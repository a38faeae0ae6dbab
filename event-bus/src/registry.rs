//! Topic-keyed subscriber registry with tick-synchronized mutation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::subscriber::Subscriber;

/// Maps each topic to its subscribers in registration order.
///
/// Registration and removal requests accumulate in pending buffers and are
/// applied only at the start of a tick, so the map is never mutated while a
/// batch is being demuxed: lookups during the drain observe a consistent
/// snapshot without coordination beyond the read lock.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    topics: RwLock<HashMap<String, Vec<Arc<dyn Subscriber>>>>,
    pending_subscribe: Mutex<Vec<Arc<dyn Subscriber>>>,
    pending_unsubscribe: Mutex<Vec<Arc<dyn Subscriber>>>,
}

impl SubscriberRegistry {
    pub(crate) fn enqueue_subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.pending_subscribe.lock().push(subscriber);
    }

    pub(crate) fn enqueue_unsubscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.pending_unsubscribe.lock().push(subscriber);
    }

    /// Folds the pending buffers into the map: removals first, then
    /// additions, with duplicate ids within a topic rejected.
    pub(crate) fn apply_pending(&self) {
        let removals: Vec<_> = self.pending_unsubscribe.lock().drain(..).collect();
        let additions: Vec<_> = self.pending_subscribe.lock().drain(..).collect();
        if removals.is_empty() && additions.is_empty() {
            return;
        }

        let mut topics = self.topics.write();

        for subscriber in removals {
            let Some(list) = topics.get_mut(subscriber.topic()) else {
                continue;
            };
            list.retain(|registered| registered.id() != subscriber.id());
            if list.is_empty() {
                topics.remove(subscriber.topic());
            }
        }

        for subscriber in additions {
            let list = topics.entry(subscriber.topic().to_owned()).or_default();
            if list.iter().any(|registered| registered.id() == subscriber.id()) {
                tracing::debug!(
                    topic = subscriber.topic(),
                    id = %subscriber.id(),
                    "duplicate subscription rejected"
                );
                continue;
            }
            list.push(subscriber);
        }
    }

    /// Subscribers bound to `topic`, in registration order. Unknown topics
    /// yield an empty list.
    pub(crate) fn subscribers_for(&self, topic: &str) -> Vec<Arc<dyn Subscriber>> {
        self.topics.read().get(topic).cloned().unwrap_or_default()
    }
}
