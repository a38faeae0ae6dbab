//! The event capability and the shared envelope that backs it.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use uuid::Uuid;

/// Identity and routing state an event acquires when it is posted: a fresh
/// id, a postmark, and a cleared cancellation flag. Concrete event types
/// embed one and hand out access through [`Event::envelope`].
///
/// Stamping is reserved to the bus; producers cannot forge an identity.
#[derive(Debug, Default)]
pub struct Envelope {
    id: Uuid,
    postmark: Option<SystemTime>,
    canceled: AtomicBool,
}

impl Envelope {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn postmark(&self) -> Option<SystemTime> {
        self.postmark
    }

    pub fn canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark(&mut self) {
        self.id = Uuid::new_v4();
        self.postmark = Some(SystemTime::now());
        self.canceled.store(false, Ordering::SeqCst);
    }
}

/// Anything the bus can route: a topic plus the envelope state.
///
/// Implementors embed an [`Envelope`] and expose it through the two accessor
/// methods; id, postmark, and cancellation then come for free. `as_any`
/// lets handlers downcast to the concrete event type they subscribed for.
///
/// Cancellation is advisory. A canceled event still visits every subscriber;
/// handlers that care check [`Event::canceled`] and skip their work.
pub trait Event: Any + Send + Sync {
    fn envelope(&self) -> &Envelope;

    fn envelope_mut(&mut self) -> &mut Envelope;

    /// The routing key. An empty topic marks the event undeliverable and the
    /// bus discards it during demux.
    fn topic(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    /// Identity assigned at post time; nil before the event is posted.
    fn id(&self) -> Uuid {
        self.envelope().id()
    }

    /// When the event was posted; `None` before the event is posted.
    fn postmark(&self) -> Option<SystemTime> {
        self.envelope().postmark()
    }

    fn cancel(&self) {
        self.envelope().cancel()
    }

    fn canceled(&self) -> bool {
        self.envelope().canceled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_issues_identity_and_clears_cancellation() {
        let mut envelope = Envelope::default();
        envelope.cancel();
        assert!(envelope.canceled());
        assert!(envelope.id().is_nil());
        assert!(envelope.postmark().is_none());

        envelope.mark();
        assert!(!envelope.canceled());
        assert!(!envelope.id().is_nil());
        assert!(envelope.postmark().is_some());
    }
}
