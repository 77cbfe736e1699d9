#![forbid(unsafe_code)]

//! Core: dynamic values, class composition, and the platform boundary.
//!
//! # Role in ukit
//! `ukit-core` owns everything a view type is assembled from: the
//! [`Value`] model, [`ClassBuilder`] with mixin composition, generated
//! accessors, and the [`PlatformAdapter`] interface through which views
//! reach real event sources.
//!
//! # Primary responsibilities
//! - **ClassBuilder**: parent linkage plus ordered mixins, flattened into a
//!   fixed dispatch table at build time.
//! - **Object**: instances constructed by running `init`.
//! - **Platform boundary**: attach/detach of handlers, with a headless
//!   in-memory implementation.
//! - **Ambient**: configuration, errors, logging.
//!
//! # How it fits in the system
//! `ukit-view` builds the observable event protocol on top of these
//! primitives and ships it as a mixin for classes built here.

pub mod class;
pub mod config;
pub mod error;
pub mod logging;
pub mod object;
pub mod platform;
pub mod props;
pub mod value;

pub use class::{Class, ClassBuilder, ClassId, Member, MemberBag, Method, Mixin};
pub use config::{DispatchPolicy, ObservableConfig};
pub use error::CallError;
pub use object::{Object, WeakObject};
pub use platform::{
    HeadlessPlatform, NodeId, PlatformAdapter, PlatformCall, PlatformEvent, PlatformHandler,
};
pub use value::{Callback, Value};
