#![forbid(unsafe_code)]

//! Named-event observers with lazy platform attachment.
//!
//! # Design
//!
//! [`Observable`] keeps, per event name, an ordered list of callbacks and
//! the platform node a handler was attached to for that name. Nothing is
//! allocated until the first [`bind`](Observable::bind).
//!
//! A platform handler is attached when a name goes from zero to one
//! callbacks and detached, from the exact node it was attached to, when the
//! list becomes empty again. All names share one handler closure per
//! observable so detach always passes the same handler that bind did. The
//! handler re-dispatches the platform event through
//! [`trigger`](Observable::trigger) under the event's own type name, with a
//! single [`EventPayload`] argument.
//!
//! # Invariants
//!
//! 1. A name is registered iff at least one callback is bound to it.
//! 2. Callbacks run in bind order, once per matching `trigger`.
//! 3. At most one platform attach per name per empty→non-empty transition.
//! 4. `trigger` never creates a registry entry.
//! 5. Dispatch iterates a snapshot taken when it starts: callbacks bound
//!    during dispatch wait for the next event, callbacks unbound during
//!    dispatch still receive the in-flight one.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | No platform adapter, no target, or platform events disabled | Attachment skipped; in-process events still work |
//! | Target resolver fails | `bind` returns the error; that name and the ones after it are not bound |
//! | Unbind of an unknown name or callback | No-op |
//! | Empty or whitespace-only names | No-op, no entries created |
//! | Callback fails, [`DispatchPolicy::Abort`] | Error returned, remaining callbacks skipped |
//! | Callback fails, [`DispatchPolicy::Isolate`] | All callbacks run, failures returned as [`CallError::Dispatch`] |
//!
//! No `RefCell` borrow is held while callbacks, target resolvers, or the
//! platform adapter run, so all of them may call back into the observable.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};
use ukit_core::{
    CallError, Callback, DispatchPolicy, NodeId, Object, ObservableConfig, PlatformAdapter,
    PlatformHandler, Value, WeakObject,
};

use crate::payload::{EventPayload, EventSource};

type TargetResolver = Rc<dyn Fn() -> Result<Option<NodeId>, CallError>>;

struct Channel {
    callbacks: SmallVec<[Callback; 2]>,
    /// Node the platform handler was attached to for this name.
    attachment: Option<NodeId>,
}

#[derive(Default)]
struct Registry {
    channels: FxHashMap<String, Channel>,
}

struct ObservableInner {
    registry: RefCell<Option<Registry>>,
    handler: RefCell<Option<PlatformHandler>>,
    platform: Option<Rc<dyn PlatformAdapter>>,
    default_target: RefCell<Option<TargetResolver>>,
    owner: RefCell<Option<WeakObject>>,
    config: ObservableConfig,
}

/// An event bus with optional platform backing.
///
/// Cloning creates a new handle to the **same** observers.
#[derive(Clone)]
pub struct Observable {
    inner: Rc<ObservableInner>,
}

impl Default for Observable {
    fn default() -> Self {
        Self::new()
    }
}

impl Observable {
    /// A pure in-process bus with process-wide settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(None, ObservableConfig::global())
    }

    /// A bus that attaches to `platform` when a target is available.
    #[must_use]
    pub fn with_platform(platform: Rc<dyn PlatformAdapter>) -> Self {
        Self::with_parts(Some(platform), ObservableConfig::global())
    }

    #[must_use]
    pub fn with_parts(platform: Option<Rc<dyn PlatformAdapter>>, config: ObservableConfig) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                registry: RefCell::new(None),
                handler: RefCell::new(None),
                platform,
                default_target: RefCell::new(None),
                owner: RefCell::new(None),
                config,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> ObservableConfig {
        self.inner.config
    }

    /// Set a fixed default target, or clear it.
    ///
    /// Names already attached stay attached to their original node.
    pub fn set_default_target(&self, target: Option<NodeId>) {
        *self.inner.default_target.borrow_mut() =
            target.map(|node| Rc::new(move || Ok(Some(node))) as TargetResolver);
    }

    /// Compute the default target on demand, at attach time.
    ///
    /// `Ok(None)` means no target, and attachment is skipped. An error is
    /// returned from the `bind` that needed the target.
    pub fn set_target_resolver(
        &self,
        resolver: impl Fn() -> Result<Option<NodeId>, CallError> + 'static,
    ) {
        *self.inner.default_target.borrow_mut() = Some(Rc::new(resolver));
    }

    /// Report events as coming from `owner` instead of this bus.
    pub(crate) fn set_owner(&self, owner: &Object) {
        *self.inner.owner.borrow_mut() = Some(owner.downgrade());
    }

    /// Register `callback` for each whitespace-separated name.
    ///
    /// Fails only if the default target resolver fails while attaching a
    /// name's first callback. Names before it stay bound.
    pub fn bind(&self, names: &str, callback: &Callback) -> Result<&Self, CallError> {
        self.bind_with_target(names, None, callback)
    }

    /// Like [`bind`](Self::bind), attaching to `target` instead of the
    /// default target for names that are not yet bound.
    pub fn bind_to(
        &self,
        names: &str,
        target: NodeId,
        callback: &Callback,
    ) -> Result<&Self, CallError> {
        self.bind_with_target(names, Some(target), callback)
    }

    fn bind_with_target(
        &self,
        names: &str,
        target: Option<NodeId>,
        callback: &Callback,
    ) -> Result<&Self, CallError> {
        for name in names.split_whitespace() {
            let bound = self
                .inner
                .registry
                .borrow()
                .as_ref()
                .is_some_and(|r| r.channels.contains_key(name));
            let attachment = if bound {
                None
            } else {
                self.attach(name, target)?
            };

            let mut registry = self.inner.registry.borrow_mut();
            registry
                .get_or_insert_with(Registry::default)
                .channels
                .entry(name.to_owned())
                .or_insert_with(|| Channel {
                    callbacks: SmallVec::new(),
                    attachment,
                })
                .callbacks
                .push(callback.clone());
        }
        Ok(self)
    }

    /// Remove every occurrence of `callback` from each name. A name whose
    /// list becomes empty is detached from the platform and forgotten.
    pub fn unbind(&self, names: &str, callback: &Callback) -> &Self {
        for name in names.split_whitespace() {
            let emptied = {
                let mut registry = self.inner.registry.borrow_mut();
                let Some(registry) = registry.as_mut() else {
                    break;
                };
                let Some(channel) = registry.channels.get_mut(name) else {
                    continue;
                };
                channel.callbacks.retain(|cb| !cb.ptr_eq(callback));
                if !channel.callbacks.is_empty() {
                    continue;
                }
                registry.channels.remove(name)
            };
            if let Some(target) = emptied.and_then(|channel| channel.attachment) {
                self.detach(name, target);
            }
        }
        self
    }

    /// Invoke the callbacks bound to `name`, in bind order, with `args`.
    ///
    /// Failure handling follows the configured [`DispatchPolicy`].
    pub fn trigger(&self, name: &str, args: &[Value]) -> Result<&Self, CallError> {
        let snapshot: SmallVec<[Callback; 4]> = {
            let registry = self.inner.registry.borrow();
            match registry.as_ref().and_then(|r| r.channels.get(name)) {
                Some(channel) => channel.callbacks.iter().cloned().collect(),
                None => return Ok(self),
            }
        };
        trace!(event = name, observers = snapshot.len(), "dispatch");

        match self.inner.config.dispatch {
            DispatchPolicy::Abort => {
                for callback in &snapshot {
                    callback.call(args)?;
                }
            }
            DispatchPolicy::Isolate => {
                let mut failures = Vec::new();
                for (index, callback) in snapshot.iter().enumerate() {
                    if let Err(err) = callback.call(args) {
                        warn!(event = name, index, error = %err, "callback failed");
                        failures.push(err);
                    }
                }
                if !failures.is_empty() {
                    return Err(CallError::Dispatch {
                        event: name.to_owned(),
                        failures,
                    });
                }
            }
        }
        Ok(self)
    }

    /// Whether any name has ever been bound (the registry exists).
    #[must_use]
    pub fn has_registry(&self) -> bool {
        self.inner.registry.borrow().is_some()
    }

    /// Names with at least one callback, sorted.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        let registry = self.inner.registry.borrow();
        let mut names: Vec<String> = registry
            .as_ref()
            .map(|r| r.channels.keys().cloned().collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn observer_count(&self, name: &str) -> usize {
        self.inner
            .registry
            .borrow()
            .as_ref()
            .and_then(|r| r.channels.get(name))
            .map_or(0, |c| c.callbacks.len())
    }

    /// Whether a platform handler is attached for `name`.
    #[must_use]
    pub fn is_attached(&self, name: &str) -> bool {
        self.attached_target(name).is_some()
    }

    /// The node the platform handler for `name` was attached to.
    #[must_use]
    pub fn attached_target(&self, name: &str) -> Option<NodeId> {
        self.inner
            .registry
            .borrow()
            .as_ref()
            .and_then(|r| r.channels.get(name))
            .and_then(|c| c.attachment)
    }

    /// Where platform-originated events are reported to come from.
    #[must_use]
    pub fn source(&self) -> EventSource {
        let owner = self.inner.owner.borrow().as_ref().and_then(WeakObject::upgrade);
        match owner {
            Some(object) => EventSource::Object(object),
            None => EventSource::Bus(self.clone()),
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn attach(&self, name: &str, explicit: Option<NodeId>) -> Result<Option<NodeId>, CallError> {
        if !self.inner.config.platform_events {
            return Ok(None);
        }
        let Some(platform) = self.inner.platform.as_ref() else {
            return Ok(None);
        };
        let target = match explicit {
            Some(node) => Some(node),
            None => self.resolve_default_target()?,
        };
        let Some(target) = target else {
            trace!(event = name, "no platform target; attachment skipped");
            return Ok(None);
        };
        let handler = self.platform_handler();
        platform.bind(target, name, &handler);
        debug!(event = name, target = target.get(), "platform handler attached");
        Ok(Some(target))
    }

    fn detach(&self, name: &str, target: NodeId) {
        let Some(platform) = self.inner.platform.as_ref() else {
            return;
        };
        let Some(handler) = self.inner.handler.borrow().clone() else {
            return;
        };
        platform.unbind(target, name, &handler);
        debug!(event = name, target = target.get(), "platform handler detached");
    }

    fn resolve_default_target(&self) -> Result<Option<NodeId>, CallError> {
        let resolver = self.inner.default_target.borrow().clone();
        match resolver {
            Some(resolve) => resolve(),
            None => Ok(None),
        }
    }

    fn platform_handler(&self) -> PlatformHandler {
        if let Some(handler) = self.inner.handler.borrow().as_ref() {
            return handler.clone();
        }
        let weak: Weak<ObservableInner> = Rc::downgrade(&self.inner);
        let handler = PlatformHandler::new(move |event| {
            let Some(inner) = weak.upgrade() else {
                return Ok(());
            };
            let observable = Observable { inner };
            let payload = EventPayload {
                event: event.clone(),
                source: observable.source(),
            };
            observable
                .trigger(&event.event_type, &[Value::opaque(payload)])
                .map(|_| ())
        });
        *self.inner.handler.borrow_mut() = Some(handler.clone());
        handler
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("events", &self.event_names())
            .field("platform", &self.inner.platform.is_some())
            .field("config", &self.inner.config)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
