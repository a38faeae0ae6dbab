//! Built-in lifecycle events and their reserved topics.
//!
//! Topic spellings are stable API: every built-in topic is the `engine`
//! namespace token followed by the lifecycle moment. Applications must not
//! route their own traffic on these topics.
//!
//! Like any other post, lifecycle events obey the batch boundary. A
//! `PreTickEvent` is staged just before its tick's batch is promoted and is
//! therefore delivered within that batch; a `PostTickEvent` is staged after
//! the batch has drained and is delivered one tick later.

use std::any::Any;
use std::time::Instant;

use event_bus::{Envelope, ErrorBuilder, Event};

pub const NAMESPACE: &str = "engine";

pub const START_TOPIC: &str = "engine.start";
pub const STOP_TOPIC: &str = "engine.stop";
pub const PRE_TICK_TOPIC: &str = "engine.preTick";
pub const POST_TICK_TOPIC: &str = "engine.postTick";
pub const ERROR_TOPIC: &str = "engine.error";

/// Posted once when the engine starts, before the first tick. Components
/// typically use it to kick off initial work.
#[derive(Debug, Default)]
pub struct StartEvent {
    envelope: Envelope,
}

impl StartEvent {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Event for StartEvent {
    fn envelope(&self) -> &Envelope {
        &self.envelope
    }
    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }
    fn topic(&self) -> &str {
        START_TOPIC
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Posted when shutdown begins. Handlers should not use it to post further
/// events: the accepting gate is already closing and new posts are dropped.
#[derive(Debug, Default)]
pub struct StopEvent {
    envelope: Envelope,
}

impl StopEvent {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Event for StopEvent {
    fn envelope(&self) -> &Envelope {
        &self.envelope
    }
    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }
    fn topic(&self) -> &str {
        STOP_TOPIC
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Marks the beginning of a tick's batch.
#[derive(Debug)]
pub struct PreTickEvent {
    envelope: Envelope,
    tick: Instant,
}

impl PreTickEvent {
    pub fn new(tick: Instant) -> Self {
        Self {
            envelope: Envelope::default(),
            tick,
        }
    }

    /// The clock beat this event belongs to.
    pub fn tick(&self) -> Instant {
        self.tick
    }
}

impl Event for PreTickEvent {
    fn envelope(&self) -> &Envelope {
        &self.envelope
    }
    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }
    fn topic(&self) -> &str {
        PRE_TICK_TOPIC
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Marks the end of a tick's batch. Delivered on the following tick; a new
/// tick has not necessarily begun when the handler runs.
#[derive(Debug)]
pub struct PostTickEvent {
    envelope: Envelope,
    tick: Instant,
}

impl PostTickEvent {
    pub fn new(tick: Instant) -> Self {
        Self {
            envelope: Envelope::default(),
            tick,
        }
    }

    /// The clock beat whose batch just finished.
    pub fn tick(&self) -> Instant {
        self.tick
    }
}

impl Event for PostTickEvent {
    fn envelope(&self) -> &Envelope {
        &self.envelope
    }
    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }
    fn topic(&self) -> &str {
        POST_TICK_TOPIC
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Carries a failed handler's error, posted at top priority for the tick
/// after the failure.
#[derive(Debug)]
pub struct ErrorEvent {
    envelope: Envelope,
    error: anyhow::Error,
}

impl ErrorEvent {
    pub fn new(error: anyhow::Error) -> Self {
        Self {
            envelope: Envelope::default(),
            error,
        }
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }
}

impl Event for ErrorEvent {
    fn envelope(&self) -> &Envelope {
        &self.envelope
    }
    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }
    fn topic(&self) -> &str {
        ERROR_TOPIC
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The engine's default error builder: every handler error becomes an
/// [`ErrorEvent`] on [`ERROR_TOPIC`].
pub fn error_event_builder() -> ErrorBuilder {
    Box::new(|error| Some(Box::new(ErrorEvent::new(error)) as Box<dyn Event>))
}
