#![forbid(unsafe_code)]

//! The argument delivered to callbacks for platform-originated events.

use ukit_core::{Object, PlatformEvent, Value};

use crate::observable::Observable;

/// Who an event is reported as coming from.
#[derive(Debug, Clone)]
pub enum EventSource {
    /// A standalone [`Observable`].
    Bus(Observable),
    /// An instance whose class includes the observable mixin.
    Object(Object),
}

impl EventSource {
    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            Self::Bus(_) => None,
        }
    }
}

/// Platform event plus the instance it was dispatched on.
///
/// Delivered as the single argument of a platform-originated `trigger`,
/// wrapped in [`Value::Opaque`].
#[derive(Debug, Clone)]
pub struct EventPayload {
    pub event: PlatformEvent,
    pub source: EventSource,
}

impl EventPayload {
    /// Extract the payload from callback arguments, if the dispatch came
    /// from the platform.
    #[must_use]
    pub fn from_args(args: &[Value]) -> Option<&EventPayload> {
        args.first()?.downcast_ref::<EventPayload>()
    }
}
