#![allow(dead_code)]

//! Shared fixtures: a couple of concrete event types and subscribers that
//! write what they observe into a shared journal.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use event_bus::{Envelope, Event, Stamp, Subscriber};

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub const GREETING_TOPIC: &str = "demo.greeting";

pub struct GreetingEvent {
    envelope: Envelope,
    target: String,
}

impl GreetingEvent {
    pub fn new(target: &str) -> Self {
        Self {
            envelope: Envelope::default(),
            target: target.to_owned(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Event for GreetingEvent {
    fn envelope(&self) -> &Envelope {
        &self.envelope
    }
    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }
    fn topic(&self) -> &str {
        GREETING_TOPIC
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An event with a caller-chosen topic and a text body.
pub struct NoteEvent {
    envelope: Envelope,
    topic: String,
    body: String,
}

impl NoteEvent {
    pub fn new(topic: &str, body: &str) -> Self {
        Self {
            envelope: Envelope::default(),
            topic: topic.to_owned(),
            body: body.to_owned(),
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl Event for NoteEvent {
    fn envelope(&self) -> &Envelope {
        &self.envelope
    }
    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }
    fn topic(&self) -> &str {
        &self.topic
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Appends its label to the journal for every delivery on its topic.
pub struct TopicProbe {
    stamp: Stamp,
    topic: String,
    label: String,
    journal: Journal,
}

impl TopicProbe {
    pub fn new(topic: &str, label: &str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            stamp: Stamp::default(),
            topic: topic.to_owned(),
            label: label.to_owned(),
            journal: Arc::clone(journal),
        })
    }
}

impl Subscriber for TopicProbe {
    fn stamp(&self) -> &Stamp {
        &self.stamp
    }
    fn topic(&self) -> &str {
        &self.topic
    }
    fn handle(&self, _event: &dyn Event) -> anyhow::Result<()> {
        self.journal.lock().push(self.label.clone());
        Ok(())
    }
}

/// Greets every target it sees on the greeting topic.
pub struct Greeter {
    stamp: Stamp,
    greeting: String,
    journal: Journal,
}

impl Greeter {
    pub fn new(greeting: &str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            stamp: Stamp::default(),
            greeting: greeting.to_owned(),
            journal: Arc::clone(journal),
        })
    }
}

impl Subscriber for Greeter {
    fn stamp(&self) -> &Stamp {
        &self.stamp
    }
    fn topic(&self) -> &str {
        GREETING_TOPIC
    }
    fn handle(&self, event: &dyn Event) -> anyhow::Result<()> {
        if let Some(greeting) = event.as_any().downcast_ref::<GreetingEvent>() {
            self.journal
                .lock()
                .push(format!("{}, {}!", self.greeting, greeting.target()));
        }
        Ok(())
    }
}
