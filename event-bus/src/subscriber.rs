//! The subscriber capability and its registration stamp.

use std::sync::OnceLock;
use std::time::SystemTime;

use uuid::Uuid;

use crate::event::Event;

/// Identity a subscriber acquires on its first registration. Subscribers are
/// shared as `Arc<dyn Subscriber>`, so the stamp is written through interior
/// mutability and only ever once; re-subscribing keeps the original identity,
/// which is what lets the registry reject duplicates.
#[derive(Debug, Default)]
pub struct Stamp {
    issued: OnceLock<(Uuid, SystemTime)>,
}

impl Stamp {
    /// Identity assigned on first subscribe; nil before that.
    pub fn id(&self) -> Uuid {
        self.issued.get().map(|(id, _)| *id).unwrap_or_else(Uuid::nil)
    }

    /// When the subscriber was first registered.
    pub fn postmark(&self) -> Option<SystemTime> {
        self.issued.get().map(|(_, at)| *at)
    }

    pub(crate) fn mark(&self) {
        let _ = self.issued.set((Uuid::new_v4(), SystemTime::now()));
    }
}

/// Anything that can receive events for a topic.
///
/// `handle` runs on a demux worker; it may post further events (they land in
/// the next batch) but should not block for long, since it occupies one of
/// the pool's bounded slots for its whole duration.
pub trait Subscriber: Send + Sync {
    fn stamp(&self) -> &Stamp;

    /// The topic this subscriber binds to. An empty topic makes registration
    /// a no-op.
    fn topic(&self) -> &str;

    fn handle(&self, event: &dyn Event) -> anyhow::Result<()>;

    fn id(&self) -> Uuid {
        self.stamp().id()
    }

    fn postmark(&self) -> Option<SystemTime> {
        self.stamp().postmark()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_is_issued_exactly_once() {
        let stamp = Stamp::default();
        assert!(stamp.id().is_nil());
        assert!(stamp.postmark().is_none());

        stamp.mark();
        let issued = stamp.id();
        assert!(!issued.is_nil());

        stamp.mark();
        assert_eq!(stamp.id(), issued);
    }
}
