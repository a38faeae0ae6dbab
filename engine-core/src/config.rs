use event_bus::ErrorBuilder;

use crate::component::Component;

/// Engine configuration. Integer options are coerced upwards to 1; an absent
/// error builder means handler errors become [`ErrorEvent`](crate::events::ErrorEvent)s
/// on the error topic (the default wiring, see
/// [`crate::events::error_event_builder`]).
pub struct EngineOptions {
    pub(crate) tps: usize,
    pub(crate) demuxers: usize,
    pub(crate) components: Vec<Box<dyn Component>>,
    pub(crate) error_builder: Option<ErrorBuilder>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            tps: 128,
            demuxers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            components: Vec::new(),
            error_builder: None,
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks per second for the engine clock; values below 1 are coerced to 1.
    pub fn with_tps(mut self, tps: usize) -> Self {
        self.tps = tps.max(1);
        self
    }

    /// Number of demux workers; values below 1 are coerced to 1.
    pub fn with_demuxers(mut self, demuxers: usize) -> Self {
        self.demuxers = demuxers.max(1);
        self
    }

    /// Adds a component to bootstrap during start.
    pub fn with_component(mut self, component: Box<dyn Component>) -> Self {
        self.components.push(component);
        self
    }

    /// Replaces the default handler-error wiring.
    pub fn with_error_builder(mut self, builder: ErrorBuilder) -> Self {
        self.error_builder = Some(builder);
        self
    }
}
