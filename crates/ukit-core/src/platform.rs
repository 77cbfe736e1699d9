#![forbid(unsafe_code)]

//! Boundary with the platform that delivers real events.
//!
//! The toolkit never talks to a windowing system or DOM directly. It
//! attaches and detaches handlers through [`PlatformAdapter`], which a
//! browser binding, a terminal backend, or the in-memory
//! [`HeadlessPlatform`] implements.
//!
//! # Invariants
//!
//! 1. Handlers are identified by reference: `unbind` removes the handler
//!    that is [`PlatformHandler::ptr_eq`] to the one passed to `bind`.
//! 2. Delivery is synchronous. A platform event is one call into each
//!    attached handler, in attach order, on the caller's stack.
//!
//! # Example
//!
//! ```
//! use ukit_core::platform::{HeadlessPlatform, NodeId, PlatformAdapter, PlatformEvent, PlatformHandler};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let platform = HeadlessPlatform::new();
//! let node = NodeId::new(1);
//! let hits = Rc::new(Cell::new(0));
//! let hits_clone = Rc::clone(&hits);
//! let handler = PlatformHandler::new(move |_event| {
//!     hits_clone.set(hits_clone.get() + 1);
//!     Ok(())
//! });
//!
//! platform.bind(node, "click", &handler);
//! platform.fire(&PlatformEvent::new("click", node)).unwrap();
//! platform.unbind(node, "click", &handler);
//! platform.fire(&PlatformEvent::new("click", node)).unwrap();
//! assert_eq!(hits.get(), 1);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::CallError;
use crate::value::Value;

/// Opaque handle to a platform node (a DOM element, a terminal region...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// An event as delivered by the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformEvent {
    /// Platform event type name (`"click"`, `"keydown"`...).
    pub event_type: String,
    /// Node the event occurred on.
    pub target: NodeId,
    /// Platform-specific detail, `Value::Unit` when absent.
    pub detail: Value,
}

impl PlatformEvent {
    #[must_use]
    pub fn new(event_type: impl Into<String>, target: NodeId) -> Self {
        Self {
            event_type: event_type.into(),
            target,
            detail: Value::Unit,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<Value>) -> Self {
        self.detail = detail.into();
        self
    }
}

type HandlerFn = dyn Fn(&PlatformEvent) -> Result<(), CallError>;

/// A handler attached to a platform node. Compared by identity.
#[derive(Clone)]
pub struct PlatformHandler(Rc<HandlerFn>);

impl PlatformHandler {
    pub fn new(f: impl Fn(&PlatformEvent) -> Result<(), CallError> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn handle(&self, event: &PlatformEvent) -> Result<(), CallError> {
        (self.0)(event)
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for PlatformHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlatformHandler({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

/// Attach/detach capability supplied by the platform.
pub trait PlatformAdapter {
    /// Fire `handler` on every occurrence of `event_type` on `target`.
    fn bind(&self, target: NodeId, event_type: &str, handler: &PlatformHandler);

    /// Remove a handler previously passed to [`bind`](Self::bind).
    /// Unknown handlers are ignored.
    fn unbind(&self, target: NodeId, event_type: &str, handler: &PlatformHandler);
}

impl<P: PlatformAdapter + ?Sized> PlatformAdapter for Rc<P> {
    fn bind(&self, target: NodeId, event_type: &str, handler: &PlatformHandler) {
        (**self).bind(target, event_type, handler);
    }

    fn unbind(&self, target: NodeId, event_type: &str, handler: &PlatformHandler) {
        (**self).unbind(target, event_type, handler);
    }
}

// ---------------------------------------------------------------------------
// Headless platform
// ---------------------------------------------------------------------------

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    Bind { target: NodeId, event_type: String },
    Unbind { target: NodeId, event_type: String },
}

struct Attached {
    target: NodeId,
    event_type: String,
    handler: PlatformHandler,
}

#[derive(Default)]
struct HeadlessState {
    attached: Vec<Attached>,
    calls: Vec<PlatformCall>,
}

/// In-memory platform for tests and headless hosts.
///
/// Records every `bind`/`unbind` call and delivers events fired with
/// [`fire`](Self::fire) to the handlers currently attached.
#[derive(Default)]
pub struct HeadlessPlatform {
    state: RefCell<HeadlessState>,
}

impl HeadlessPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every handler attached for its type on its target.
    ///
    /// Handlers run in attach order over a snapshot, so handlers may attach
    /// or detach while the event is delivered. The first failing handler
    /// aborts delivery and its error is returned. On success returns the
    /// number of handlers invoked.
    pub fn fire(&self, event: &PlatformEvent) -> Result<usize, CallError> {
        let handlers: Vec<PlatformHandler> = {
            let state = self.state.borrow();
            state
                .attached
                .iter()
                .filter(|a| a.target == event.target && a.event_type == event.event_type)
                .map(|a| a.handler.clone())
                .collect()
        };
        for handler in &handlers {
            handler.handle(event)?;
        }
        Ok(handlers.len())
    }

    /// Number of handlers currently attached for `event_type` on `target`.
    #[must_use]
    pub fn handler_count(&self, target: NodeId, event_type: &str) -> usize {
        self.state
            .borrow()
            .attached
            .iter()
            .filter(|a| a.target == target && a.event_type == event_type)
            .count()
    }

    /// Total number of attached handlers across all nodes.
    #[must_use]
    pub fn attached_len(&self) -> usize {
        self.state.borrow().attached.len()
    }

    /// Every adapter call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state.borrow().calls.clone()
    }

    /// Count of `bind` calls for `event_type` on `target`.
    #[must_use]
    pub fn bind_count(&self, target: NodeId, event_type: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| {
                matches!(c, PlatformCall::Bind { target: t, event_type: e }
                    if *t == target && e == event_type)
            })
            .count()
    }

    /// Forget the recorded call log (attached handlers are kept).
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }
}

impl PlatformAdapter for HeadlessPlatform {
    fn bind(&self, target: NodeId, event_type: &str, handler: &PlatformHandler) {
        let mut state = self.state.borrow_mut();
        state.calls.push(PlatformCall::Bind {
            target,
            event_type: event_type.to_owned(),
        });
        state.attached.push(Attached {
            target,
            event_type: event_type.to_owned(),
            handler: handler.clone(),
        });
    }

    fn unbind(&self, target: NodeId, event_type: &str, handler: &PlatformHandler) {
        let mut state = self.state.borrow_mut();
        state.calls.push(PlatformCall::Unbind {
            target,
            event_type: event_type.to_owned(),
        });
        state.attached.retain(|a| {
            !(a.target == target && a.event_type == event_type && a.handler.ptr_eq(handler))
        });
    }
}

impl fmt::Debug for HeadlessPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("HeadlessPlatform")
            .field("attached", &state.attached.len())
            .field("calls", &state.calls.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counting_handler(counter: &Rc<Cell<u32>>) -> PlatformHandler {
        let counter = Rc::clone(counter);
        PlatformHandler::new(move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        })
    }

    #[test]
    fn fire_reaches_only_matching_handlers() {
        let platform = HeadlessPlatform::new();
        let hits = Rc::new(Cell::new(0));
        let handler = counting_handler(&hits);

        platform.bind(NodeId::new(1), "click", &handler);
        assert_eq!(platform.fire(&PlatformEvent::new("click", NodeId::new(1))), Ok(1));
        assert_eq!(platform.fire(&PlatformEvent::new("click", NodeId::new(2))), Ok(0));
        assert_eq!(platform.fire(&PlatformEvent::new("keyup", NodeId::new(1))), Ok(0));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn unbind_uses_handler_identity() {
        let platform = HeadlessPlatform::new();
        let hits = Rc::new(Cell::new(0));
        let a = counting_handler(&hits);
        let b = counting_handler(&hits);
        let node = NodeId::new(5);

        platform.bind(node, "click", &a);
        platform.unbind(node, "click", &b);
        assert_eq!(platform.handler_count(node, "click"), 1);

        platform.unbind(node, "click", &a.clone());
        assert_eq!(platform.handler_count(node, "click"), 0);
        assert_eq!(platform.attached_len(), 0);
    }

    #[test]
    fn call_log_records_order() {
        let platform = HeadlessPlatform::new();
        let handler = PlatformHandler::new(|_| Ok(()));
        let node = NodeId::new(3);
        platform.bind(node, "focus", &handler);
        platform.unbind(node, "focus", &handler);

        assert_eq!(
            platform.calls(),
            vec![
                PlatformCall::Bind {
                    target: node,
                    event_type: "focus".into()
                },
                PlatformCall::Unbind {
                    target: node,
                    event_type: "focus".into()
                },
            ]
        );
        assert_eq!(platform.bind_count(node, "focus"), 1);
        platform.clear_calls();
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn failing_handler_aborts_delivery() {
        let platform = HeadlessPlatform::new();
        let hits = Rc::new(Cell::new(0));
        let node = NodeId::new(9);
        let failing = PlatformHandler::new(|_| Err(CallError::raised("boom")));
        platform.bind(node, "input", &failing);
        platform.bind(node, "input", &counting_handler(&hits));

        let err = platform.fire(&PlatformEvent::new("input", node)).unwrap_err();
        assert_eq!(err, CallError::raised("boom"));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn event_detail_defaults_to_unit() {
        let event = PlatformEvent::new("scroll", NodeId::new(1));
        assert!(event.detail.is_unit());
        let event = event.with_detail(12);
        assert_eq!(event.detail, Value::from(12));
    }
}
