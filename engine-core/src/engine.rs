//! The engine: a fixed-rate clock, a bus, and the lifecycle state machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{bounded, tick, Sender};
use crossbeam::select;
use parking_lot::Mutex;
use thiserror::Error;

use event_bus::{priority, Bus, BusOptions, Event, Subscriber};

use crate::component::Component;
use crate::config::EngineOptions;
use crate::events::{self, PostTickEvent, PreTickEvent, StartEvent, StopEvent};

#[derive(Debug, Error)]
pub enum EngineError {
    /// A component failed to produce its subscribers during start.
    #[error("component bootstrap failed: {0}")]
    Bootstrap(anyhow::Error),
}

/// Brokers communication between decoupled components.
///
/// While running, a loop thread wakes once per clock beat, posts a
/// [`PreTickEvent`], drives one [`Bus::tick`], and posts a
/// [`PostTickEvent`]. Posting is gated by the accepting flag: events posted
/// before [`Engine::start`] or after [`Engine::stop`] has begun are dropped.
pub struct Engine {
    shared: Arc<Shared>,
    components: Vec<Box<dyn Component>>,
    loop_thread: Mutex<Option<JoinHandle<()>>>,
    stop_signal: Mutex<Option<Sender<()>>>,
}

struct Shared {
    bus: Bus,
    interval: Duration,
    active: AtomicBool,
    accepting: AtomicBool,
}

impl Shared {
    fn post_boxed(&self, event: Box<dyn Event>, priority: u8) {
        if self.accepting.load(Ordering::SeqCst) {
            self.bus.post_boxed(event, priority);
        }
    }
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        let EngineOptions {
            tps,
            demuxers,
            components,
            error_builder,
        } = options;

        let builder = error_builder.unwrap_or_else(events::error_event_builder);
        let bus = Bus::new(
            BusOptions::default()
                .with_demuxers(demuxers)
                .with_error_builder(builder),
        );

        Self {
            shared: Arc::new(Shared {
                bus,
                interval: Duration::from_secs(1) / tps.max(1) as u32,
                active: AtomicBool::new(false),
                accepting: AtomicBool::new(false),
            }),
            components,
            loop_thread: Mutex::new(None),
            stop_signal: Mutex::new(None),
        }
    }

    pub fn active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Bootstraps the components, opens the accepting gate, posts the start
    /// event, and spawns the clock loop. Non-blocking; a no-op when already
    /// running. A component bootstrap error aborts the start and the engine
    /// stays idle.
    pub fn start(&self) -> Result<(), EngineError> {
        if self.shared.active.load(Ordering::SeqCst) {
            return Ok(());
        }

        for component in &self.components {
            let subscribers = component.bootstrap().map_err(EngineError::Bootstrap)?;
            tracing::debug!(subscribers = subscribers.len(), "component bootstrapped");
            for subscriber in subscribers {
                self.shared.bus.subscribe(subscriber);
            }
        }

        self.shared.active.store(true, Ordering::SeqCst);
        self.shared.accepting.store(true, Ordering::SeqCst);
        self.post(StartEvent::new(), priority::IMPORTANT);

        let (stop_tx, stop_rx) = bounded::<()>(1);
        *self.stop_signal.lock() = Some(stop_tx);

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("engine-loop".into())
            .spawn(move || {
                let ticker = tick(shared.interval);
                loop {
                    select! {
                        recv(ticker) -> beat => {
                            let Ok(beat) = beat else { break };
                            shared.post_boxed(Box::new(PreTickEvent::new(beat)), priority::IMPORTANT);
                            shared.bus.tick();
                            shared.post_boxed(Box::new(PostTickEvent::new(beat)), priority::IMPORTANT);
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
            })
            .expect("failed to spawn engine loop thread");
        *self.loop_thread.lock() = Some(handle);

        tracing::info!(interval = ?self.shared.interval, "engine started");
        Ok(())
    }

    /// Posts the stop event, closes the accepting gate, joins the clock loop,
    /// and drains the bus until empty. Blocking; a no-op when not running.
    pub fn stop(&self) {
        if !self.shared.active.load(Ordering::SeqCst) {
            return;
        }

        self.post(StopEvent::new(), priority::IMPORTANT);
        self.shared.accepting.store(false, Ordering::SeqCst);

        if let Some(stop_tx) = self.stop_signal.lock().take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.loop_thread.lock().take() {
            let _ = handle.join();
        }

        while self.shared.bus.size() > 0 {
            self.shared.bus.tick();
        }

        self.shared.active.store(false, Ordering::SeqCst);
        tracing::info!("engine stopped");
    }

    /// Posts an event for the next tick. Dropped unless the engine is
    /// accepting.
    pub fn post<E: Event>(&self, event: E, priority: u8) {
        if self.shared.accepting.load(Ordering::SeqCst) {
            self.shared.bus.post(event, priority);
        }
    }

    /// Registers a subscriber; effective from the next tick boundary.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.shared.bus.subscribe(subscriber);
    }

    /// Removes a subscriber; effective from the next tick boundary.
    pub fn unsubscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.shared.bus.unsubscribe(subscriber);
    }

    /// Events queued on the bus across both buffers.
    pub fn size(&self) -> usize {
        self.shared.bus.size()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}
