//! The tick-synchronized bus: a double-buffered pair of priority queues, the
//! subscriber registry, and the demux worker pool.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;

use crate::event::Event;
use crate::pool::{panic_text, WorkerPool};
use crate::pqueue::PairingHeap;
use crate::priority;
use crate::registry::SubscriberRegistry;
use crate::subscriber::Subscriber;

/// Rewraps a handler error into an event for the error topic. Returning
/// `None` drops the error.
pub type ErrorBuilder = Box<dyn Fn(anyhow::Error) -> Option<Box<dyn Event>> + Send + Sync>;

/// Tuning for a [`Bus`]: how many demux workers run handlers, and what to do
/// with handler errors. With no error builder configured, handler errors are
/// logged at debug level and dropped.
pub struct BusOptions {
    demuxers: usize,
    error_builder: Option<ErrorBuilder>,
}

impl Default for BusOptions {
    fn default() -> Self {
        Self {
            demuxers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            error_builder: None,
        }
    }
}

impl BusOptions {
    /// Number of demux workers; values below 1 are coerced to 1.
    pub fn with_demuxers(mut self, demuxers: usize) -> Self {
        self.demuxers = demuxers.max(1);
        self
    }

    pub fn with_error_builder(mut self, builder: ErrorBuilder) -> Self {
        self.error_builder = Some(builder);
        self
    }
}

/// Ordering key for queued events: priority band first, then post order.
/// The sequence component makes equal-priority draining FIFO and
/// deterministic.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct SlotKey {
    priority: u8,
    seq: u64,
}

/// The post-facing half of the bus: stamps, sequences, and stages events.
///
/// Split out behind an `Arc` so demux tasks can re-stage handler errors for
/// the next tick without capturing the whole bus.
struct Intake {
    staging: Mutex<PairingHeap<SlotKey, Arc<dyn Event>>>,
    next_seq: AtomicU64,
    error_builder: Option<ErrorBuilder>,
}

impl Intake {
    fn stage(&self, mut event: Box<dyn Event>, priority: u8) {
        event.envelope_mut().mark();
        let key = SlotKey {
            priority,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        self.staging.lock().push(Arc::from(event), key);
    }

    fn route_handler_error(&self, error: anyhow::Error) {
        let Some(builder) = self.error_builder.as_ref() else {
            tracing::debug!(%error, "handler error dropped, no error builder configured");
            return;
        };
        match builder(error) {
            Some(event) => self.stage(event, priority::IMPORTANT),
            None => tracing::debug!("handler error dropped by the error builder"),
        }
    }
}

/// Routes posted events to the subscribers of their topic, one batch per
/// tick.
///
/// Posts land in a staging queue and stay invisible until the next call to
/// [`Bus::tick`] promotes the whole staging queue into the working queue in
/// one O(1) meld. The working batch then drains in `(priority, post order)`
/// and every subscriber of a drained event gets its handler run on the
/// worker pool. `tick` returns only after all handlers of the batch have
/// finished, so a post made from inside a handler is always deferred to the
/// following tick.
pub struct Bus {
    intake: Arc<Intake>,
    working: Mutex<PairingHeap<SlotKey, Arc<dyn Event>>>,
    registry: SubscriberRegistry,
    pool: WorkerPool,
}

impl Bus {
    pub fn new(options: BusOptions) -> Self {
        Self {
            intake: Arc::new(Intake {
                staging: Mutex::new(PairingHeap::new()),
                next_seq: AtomicU64::new(0),
                error_builder: options.error_builder,
            }),
            working: Mutex::new(PairingHeap::new()),
            registry: SubscriberRegistry::default(),
            pool: WorkerPool::new(options.demuxers),
        }
    }

    /// Stamps the event (fresh id, postmark, cleared cancellation) and stages
    /// it for the next tick. Callable from any thread, including from inside
    /// a handler; the only blocking is the brief staging lock.
    pub fn post<E: Event>(&self, event: E, priority: u8) {
        self.post_boxed(Box::new(event), priority);
    }

    /// Type-erased form of [`Bus::post`].
    pub fn post_boxed(&self, event: Box<dyn Event>, priority: u8) {
        self.intake.stage(event, priority);
    }

    /// Stamps the subscriber (first registration only) and stages it for
    /// registration at the next tick boundary. An empty topic is a no-op.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        if subscriber.topic().is_empty() {
            tracing::debug!("subscriber with empty topic ignored");
            return;
        }
        subscriber.stamp().mark();
        tracing::debug!(topic = subscriber.topic(), id = %subscriber.id(), "subscription staged");
        self.registry.enqueue_subscribe(subscriber);
    }

    /// Stages removal of the subscriber for the next tick boundary. Unknown
    /// subscribers and empty topics are no-ops.
    pub fn unsubscribe(&self, subscriber: Arc<dyn Subscriber>) {
        if subscriber.topic().is_empty() {
            return;
        }
        self.registry.enqueue_unsubscribe(subscriber);
    }

    /// The batch boundary. Applies pending registrations, promotes staging
    /// into the working queue, drains the batch in priority order, and waits
    /// for every handler of the batch to finish.
    pub fn tick(&self) {
        self.registry.apply_pending();

        {
            let mut staging = self.intake.staging.lock();
            self.working.lock().meld(&mut staging);
        }

        loop {
            let event = self.working.lock().pop();
            let Some(event) = event else { break };
            self.demux(event);
        }

        self.pool.wait();
    }

    /// Events currently queued across both buffers. Events whose handlers
    /// are in flight are owned by the pool and no longer counted.
    pub fn size(&self) -> usize {
        self.intake.staging.lock().len() + self.working.lock().len()
    }

    /// Fans one event out to its topic's subscribers. Every handler task is
    /// admitted to the pool (and has therefore started) before this returns,
    /// which keeps handler start order aligned with drain order.
    fn demux(&self, event: Arc<dyn Event>) {
        if event.topic().is_empty() {
            tracing::trace!(id = %event.id(), "event with empty topic discarded");
            return;
        }

        let subscribers = self.registry.subscribers_for(event.topic());
        for subscriber in subscribers {
            let event = Arc::clone(&event);
            let intake = Arc::clone(&self.intake);
            self.pool.post(Box::new(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| subscriber.handle(event.as_ref())));
                let error = match outcome {
                    Ok(Ok(())) => return,
                    Ok(Err(error)) => error,
                    Err(panic) => anyhow!("handler panicked: {}", panic_text(panic.as_ref())),
                };
                intake.route_handler_error(error);
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{Faulty, PingEvent, Recorder};
    use crate::subscriber::Stamp;

    #[test]
    fn delivers_to_every_subscriber_exactly_once() {
        let bus = Bus::new(BusOptions::default().with_demuxers(2));
        let first = Arc::new(Recorder::new("jobs"));
        let second = Arc::new(Recorder::new("jobs"));
        bus.subscribe(first.clone());
        bus.subscribe(second.clone());

        bus.post(PingEvent::new("jobs", 1), priority::MEDIUM);
        bus.tick();

        assert_eq!(first.tags(), vec![1]);
        assert_eq!(second.tags(), vec![1]);
        // both saw the same stamped identity
        assert_eq!(first.ids(), second.ids());
        assert!(!first.ids()[0].is_nil());
    }

    #[test]
    fn drains_in_priority_then_post_order() {
        let bus = Bus::new(BusOptions::default().with_demuxers(1));
        let recorder = Arc::new(Recorder::new("jobs"));
        bus.subscribe(recorder.clone());

        bus.post(PingEvent::new("jobs", 255), priority::LOWEST);
        bus.post(PingEvent::new("jobs", 153), priority::MEDIUM);
        bus.post(PingEvent::new("jobs", 0), priority::IMPORTANT);
        bus.post(PingEvent::new("jobs", 154), priority::MEDIUM);
        bus.tick();

        assert_eq!(recorder.tags(), vec![0, 153, 154, 255]);
    }

    #[test]
    fn stamps_are_fresh_and_unique() {
        let bus = Bus::new(BusOptions::default().with_demuxers(1));
        let recorder = Arc::new(Recorder::new("jobs"));
        bus.subscribe(recorder.clone());

        bus.post(PingEvent::new("jobs", 1), priority::MEDIUM);
        bus.post(PingEvent::new("jobs", 2), priority::MEDIUM);
        bus.tick();

        let ids = recorder.ids();
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| !id.is_nil()));
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn posts_stay_invisible_until_the_next_tick() {
        let bus = Bus::new(BusOptions::default().with_demuxers(1));
        let recorder = Arc::new(Recorder::new("jobs"));
        bus.subscribe(recorder.clone());

        bus.post(PingEvent::new("jobs", 1), priority::MEDIUM);
        assert_eq!(bus.size(), 1);
        assert!(recorder.tags().is_empty());

        bus.tick();
        assert_eq!(bus.size(), 0);
        assert_eq!(recorder.tags(), vec![1]);
    }

    #[test]
    fn handler_posts_land_in_the_following_batch() {
        struct Chainer {
            stamp: Stamp,
            bus: Arc<Bus>,
        }

        impl Subscriber for Chainer {
            fn stamp(&self) -> &Stamp {
                &self.stamp
            }
            fn topic(&self) -> &str {
                "head"
            }
            fn handle(&self, _event: &dyn Event) -> anyhow::Result<()> {
                self.bus.post(PingEvent::new("tail", 99), priority::MEDIUM);
                Ok(())
            }
        }

        let bus = Arc::new(Bus::new(BusOptions::default().with_demuxers(1)));
        let tail = Arc::new(Recorder::new("tail"));
        bus.subscribe(tail.clone());
        bus.subscribe(Arc::new(Chainer {
            stamp: Stamp::default(),
            bus: Arc::clone(&bus),
        }));

        bus.post(PingEvent::new("head", 1), priority::MEDIUM);
        bus.tick();
        assert!(tail.tags().is_empty());
        assert_eq!(bus.size(), 1);

        bus.tick();
        assert_eq!(tail.tags(), vec![99]);
        assert_eq!(bus.size(), 0);
    }

    #[test]
    fn empty_topic_event_is_discarded() {
        let bus = Bus::new(BusOptions::default().with_demuxers(1));
        let recorder = Arc::new(Recorder::new("jobs"));
        bus.subscribe(recorder.clone());

        bus.post(PingEvent::new("", 1), priority::MEDIUM);
        bus.tick();

        assert!(recorder.tags().is_empty());
        assert_eq!(bus.size(), 0);
    }

    #[test]
    fn empty_topic_subscriber_is_ignored() {
        let bus = Bus::new(BusOptions::default().with_demuxers(1));
        let recorder = Arc::new(Recorder::new(""));
        bus.subscribe(recorder.clone());
        bus.tick();

        assert!(recorder.id().is_nil());
    }

    #[test]
    fn resubscribing_registers_once() {
        let bus = Bus::new(BusOptions::default().with_demuxers(1));
        let recorder = Arc::new(Recorder::new("jobs"));
        bus.subscribe(recorder.clone());
        bus.subscribe(recorder.clone());

        bus.post(PingEvent::new("jobs", 1), priority::MEDIUM);
        bus.tick();

        assert_eq!(recorder.tags(), vec![1]);
    }

    #[test]
    fn unsubscribed_subscriber_stops_receiving() {
        let bus = Bus::new(BusOptions::default().with_demuxers(1));
        let recorder = Arc::new(Recorder::new("jobs"));
        bus.subscribe(recorder.clone());
        bus.tick();

        bus.unsubscribe(recorder.clone());
        bus.post(PingEvent::new("jobs", 1), priority::MEDIUM);
        bus.tick();

        assert!(recorder.tags().is_empty());
    }

    #[test]
    fn handler_error_becomes_an_event_on_the_next_tick() {
        let options = BusOptions::default()
            .with_demuxers(1)
            .with_error_builder(Box::new(|_error| {
                Some(Box::new(PingEvent::new("errors", 7)) as Box<dyn Event>)
            }));
        let bus = Bus::new(options);
        let errors = Arc::new(Recorder::new("errors"));
        bus.subscribe(errors.clone());
        bus.subscribe(Arc::new(Faulty::erring("jobs")));

        bus.post(PingEvent::new("jobs", 1), priority::MEDIUM);
        bus.tick();
        assert!(errors.tags().is_empty());

        bus.tick();
        assert_eq!(errors.tags(), vec![7]);
    }

    #[test]
    fn handler_panic_joins_the_error_path() {
        let options = BusOptions::default()
            .with_demuxers(1)
            .with_error_builder(Box::new(|_error| {
                Some(Box::new(PingEvent::new("errors", 8)) as Box<dyn Event>)
            }));
        let bus = Bus::new(options);
        let errors = Arc::new(Recorder::new("errors"));
        bus.subscribe(errors.clone());
        bus.subscribe(Arc::new(Faulty::panicking("jobs")));

        bus.post(PingEvent::new("jobs", 1), priority::MEDIUM);
        bus.tick();
        bus.tick();

        assert_eq!(errors.tags(), vec![8]);
    }

    #[test]
    fn cancellation_is_shared_but_not_a_filter() {
        struct Canceler {
            stamp: Stamp,
        }

        impl Subscriber for Canceler {
            fn stamp(&self) -> &Stamp {
                &self.stamp
            }
            fn topic(&self) -> &str {
                "jobs"
            }
            fn handle(&self, event: &dyn Event) -> anyhow::Result<()> {
                event.cancel();
                Ok(())
            }
        }

        struct FlagWatcher {
            stamp: Stamp,
            observed: Mutex<Vec<bool>>,
        }

        impl Subscriber for FlagWatcher {
            fn stamp(&self) -> &Stamp {
                &self.stamp
            }
            fn topic(&self) -> &str {
                "jobs"
            }
            fn handle(&self, event: &dyn Event) -> anyhow::Result<()> {
                self.observed.lock().push(event.canceled());
                Ok(())
            }
        }

        let bus = Bus::new(BusOptions::default().with_demuxers(1));
        let watcher = Arc::new(FlagWatcher {
            stamp: Stamp::default(),
            observed: Mutex::new(Vec::new()),
        });
        bus.subscribe(Arc::new(Canceler {
            stamp: Stamp::default(),
        }));
        bus.subscribe(watcher.clone());

        // posting clears any cancellation applied before the stamp
        let event = PingEvent::new("jobs", 1);
        event.cancel();
        bus.post(event, priority::MEDIUM);
        bus.tick();

        // the event still visited the watcher, and it saw the canceler's flag
        assert_eq!(*watcher.observed.lock(), vec![true]);
    }

    #[test]
    fn handler_error_without_a_builder_is_dropped() {
        let bus = Bus::new(BusOptions::default().with_demuxers(1));
        bus.subscribe(Arc::new(Faulty::erring("jobs")));

        bus.post(PingEvent::new("jobs", 1), priority::MEDIUM);
        bus.tick();

        assert_eq!(bus.size(), 0);
    }
}
