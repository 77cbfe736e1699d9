#![forbid(unsafe_code)]

//! Observable views for ukit.
//!
//! This crate provides the event protocol every view type is built with:
//!
//! - [`Observable`]: named-event observers (`bind`/`unbind`/`trigger`) that
//!   attach to the platform lazily, on the first observer of a name, and
//!   detach when the last one leaves.
//! - [`observable_mixin`]: the same protocol as a mixin for classes built
//!   with [`ukit_core::ClassBuilder`], with [`ObservableObject`] for typed
//!   calls on instances.
//! - [`view_class`]: a base `View` class composing the mixin with a `dom`
//!   accessor.
//!
//! # Architecture
//!
//! Single-threaded (`Rc<RefCell<..>>`). Dispatch is synchronous: callbacks
//! run to completion, in bind order, before `trigger` returns. Platform
//! events arrive as one synchronous call into the observable's handler.

pub mod mixin;
pub mod observable;
pub mod payload;
pub mod view;

pub use mixin::{OBSERVABLE_FIELD, ObservableObject, observable_mixin, observable_of};
pub use observable::Observable;
pub use payload::{EventPayload, EventSource};
pub use view::view_class;
