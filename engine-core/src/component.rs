use std::sync::Arc;

use event_bus::Subscriber;

/// A unit of application functionality wired in at engine startup.
///
/// `bootstrap` runs during [`Engine::start`](crate::Engine::start) and yields
/// the subscribers the component wants registered. A bootstrap error is a
/// configuration fault: it aborts the start and the engine never begins
/// running.
pub trait Component: Send + Sync {
    fn bootstrap(&self) -> anyhow::Result<Vec<Arc<dyn Subscriber>>>;
}
