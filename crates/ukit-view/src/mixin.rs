#![forbid(unsafe_code)]

//! The observable mixin for classes built with `ClassBuilder`.
//!
//! The mixin contributes three methods:
//!
//! | Method | Arguments | Returns |
//! |--------|-----------|---------|
//! | `bind` | names, callback, optional target node | the instance |
//! | `unbind` | names, callback | the instance |
//! | `trigger` | name, then any data | the instance |
//!
//! Per-instance state is an [`Observable`] stored in the hidden
//! [`OBSERVABLE_FIELD`] field on the first `bind` that names at least one
//! event. The instance's `dom` member, when it answers with a node, is the
//! default platform target; it is consulted at attach time so a view may
//! change nodes over its lifetime. An error from `dom` fails the `bind`
//! that needed it.
//!
//! The observable holds only weak references to its instance, so the
//! instance stays collectable while handlers are attached.

use std::rc::Rc;

use tracing::trace;
use ukit_core::props::attr;
use ukit_core::{
    CallError, Callback, MemberBag, NodeId, Object, ObservableConfig, PlatformAdapter, Value,
};

use crate::observable::Observable;

/// Field holding an instance's observer state.
pub const OBSERVABLE_FIELD: &str = "_observable";

/// Build the mixin bag. Every instance of a class including it attaches
/// through `platform` (if any) under `config`.
#[must_use]
pub fn observable_mixin(
    platform: Option<Rc<dyn PlatformAdapter>>,
    config: ObservableConfig,
) -> MemberBag {
    let mut bag = MemberBag::new();

    bag.insert_method("bind", move |this, args| {
        let names = str_arg("bind", args, 0)?;
        let callback = callback_arg("bind", args, 1)?;
        let target = match args.get(2) {
            None | Some(Value::Unit) => None,
            Some(Value::Node(node)) => Some(*node),
            Some(_) => {
                return Err(CallError::InvalidArgument {
                    member: "bind".into(),
                    index: 2,
                    expected: "a node",
                });
            }
        };
        if names.split_whitespace().next().is_none() {
            return Ok(Value::Object(this.clone()));
        }
        let observable = observable_for(this, platform.as_ref(), config);
        match target {
            Some(node) => observable.bind_to(names, node, callback)?,
            None => observable.bind(names, callback)?,
        };
        Ok(Value::Object(this.clone()))
    });

    bag.insert_method("unbind", |this, args| {
        let names = str_arg("unbind", args, 0)?;
        let callback = callback_arg("unbind", args, 1)?;
        if let Some(observable) = observable_of(this) {
            observable.unbind(names, callback);
        }
        Ok(Value::Object(this.clone()))
    });

    bag.insert_method("trigger", |this, args| {
        let name = str_arg("trigger", args, 0)?;
        if let Some(observable) = observable_of(this) {
            observable.trigger(name, &args[1..])?;
        }
        Ok(Value::Object(this.clone()))
    });

    bag
}

/// The observer state of `object`, if it has bound anything yet.
#[must_use]
pub fn observable_of(object: &Object) -> Option<Observable> {
    object
        .try_get(OBSERVABLE_FIELD)
        .and_then(|value| value.downcast_ref::<Observable>().cloned())
}

fn observable_for(
    object: &Object,
    platform: Option<&Rc<dyn PlatformAdapter>>,
    config: ObservableConfig,
) -> Observable {
    if let Some(existing) = observable_of(object) {
        return existing;
    }
    let observable = Observable::with_parts(platform.cloned(), config);
    observable.set_owner(object);
    let weak = object.downgrade();
    observable.set_target_resolver(move || match weak.upgrade() {
        Some(object) => dom_of(&object),
        None => Ok(None),
    });
    object.set(OBSERVABLE_FIELD, Value::opaque(observable.clone()));
    observable
}

/// Ask the instance for its node through `attr`. Anything other than a
/// node means no target; a failing accessor is an error.
fn dom_of(object: &Object) -> Result<Option<NodeId>, CallError> {
    let node = attr(object, "dom", None)?.as_node();
    if node.is_none() {
        trace!(class = object.class().name(), "instance has no dom node");
    }
    Ok(node)
}

fn str_arg<'a>(member: &str, args: &'a [Value], index: usize) -> Result<&'a str, CallError> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| CallError::InvalidArgument {
            member: member.to_owned(),
            index,
            expected: "a string",
        })
}

fn callback_arg<'a>(
    member: &str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a Callback, CallError> {
    args.get(index)
        .and_then(Value::as_callback)
        .ok_or_else(|| CallError::InvalidArgument {
            member: member.to_owned(),
            index,
            expected: "a callback",
        })
}

/// Typed access to the observable mixin on an [`Object`].
///
/// Calls go through the instance's dispatch table, so a class that
/// overrides `bind`, `unbind`, or `trigger` sees these calls too. Classes
/// without the mixin report [`CallError::MissingMember`].
pub trait ObservableObject {
    fn bind(&self, names: &str, callback: &Callback) -> Result<&Self, CallError>;
    fn bind_to(&self, names: &str, target: NodeId, callback: &Callback)
    -> Result<&Self, CallError>;
    fn unbind(&self, names: &str, callback: &Callback) -> Result<&Self, CallError>;
    fn trigger(&self, name: &str, args: &[Value]) -> Result<&Self, CallError>;
}

impl ObservableObject for Object {
    fn bind(&self, names: &str, callback: &Callback) -> Result<&Self, CallError> {
        self.call("bind", &[Value::from(names), Value::Callback(callback.clone())])?;
        Ok(self)
    }

    fn bind_to(
        &self,
        names: &str,
        target: NodeId,
        callback: &Callback,
    ) -> Result<&Self, CallError> {
        self.call(
            "bind",
            &[
                Value::from(names),
                Value::Callback(callback.clone()),
                Value::Node(target),
            ],
        )?;
        Ok(self)
    }

    fn unbind(&self, names: &str, callback: &Callback) -> Result<&Self, CallError> {
        self.call("unbind", &[Value::from(names), Value::Callback(callback.clone())])?;
        Ok(self)
    }

    fn trigger(&self, name: &str, args: &[Value]) -> Result<&Self, CallError> {
        let mut call_args = Vec::with_capacity(args.len() + 1);
        call_args.push(Value::from(name));
        call_args.extend_from_slice(args);
        self.call("trigger", &call_args)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use ukit_core::{ClassBuilder, HeadlessPlatform, PlatformEvent};

    use crate::payload::EventPayload;

    fn button_class(platform: &Rc<HeadlessPlatform>) -> ukit_core::Class {
        let adapter: Rc<dyn PlatformAdapter> = platform.clone();
        ClassBuilder::new("Button")
            .mixin(observable_mixin(Some(adapter), ObservableConfig::new()))
            .mixin(
                MemberBag::new()
                    .with_method("init", |this, args| {
                        this.set("_dom", args.first().cloned().unwrap_or_default());
                        Ok(Value::Unit)
                    })
                    .with_method("dom", |this, _| Ok(this.get("_dom"))),
            )
            .build()
    }

    fn counter(count: &Rc<Cell<u32>>) -> Callback {
        let count = Rc::clone(count);
        Callback::infallible(move |_| count.set(count.get() + 1))
    }

    #[test]
    fn state_is_created_on_first_bind() {
        let platform = Rc::new(HeadlessPlatform::new());
        let button = button_class(&platform)
            .construct(&[Value::Node(NodeId::new(1))])
            .unwrap();

        button.trigger("click", &[]).unwrap();
        assert!(observable_of(&button).is_none());

        button.bind("  ", &Callback::infallible(|_| {})).unwrap();
        assert!(observable_of(&button).is_none());

        button.bind("click", &Callback::infallible(|_| {})).unwrap();
        assert!(observable_of(&button).is_some());
    }

    #[test]
    fn dom_member_is_the_default_target() {
        let platform = Rc::new(HeadlessPlatform::new());
        let node = NodeId::new(3);
        let button = button_class(&platform).construct(&[Value::Node(node)]).unwrap();
        let count = Rc::new(Cell::new(0));
        let cb = counter(&count);

        button.bind("click", &cb).unwrap();
        assert_eq!(platform.handler_count(node, "click"), 1);

        platform.fire(&PlatformEvent::new("click", node)).unwrap();
        assert_eq!(count.get(), 1);

        button.unbind("click", &cb).unwrap();
        assert_eq!(platform.handler_count(node, "click"), 0);
    }

    #[test]
    fn payload_source_is_the_instance() {
        let platform = Rc::new(HeadlessPlatform::new());
        let node = NodeId::new(4);
        let button = button_class(&platform).construct(&[Value::Node(node)]).unwrap();
        let source: Rc<RefCell<Option<Object>>> = Rc::new(RefCell::new(None));
        let source_clone = Rc::clone(&source);
        button
            .bind(
                "click",
                &Callback::infallible(move |args| {
                    let payload = EventPayload::from_args(args).unwrap();
                    *source_clone.borrow_mut() = payload.source.as_object().cloned();
                }),
            )
            .unwrap();

        platform.fire(&PlatformEvent::new("click", node)).unwrap();
        assert!(source.borrow().as_ref().unwrap().ptr_eq(&button));
    }

    #[test]
    fn instance_without_node_is_a_pure_bus() {
        let platform = Rc::new(HeadlessPlatform::new());
        let button = button_class(&platform).construct(&[]).unwrap();
        let count = Rc::new(Cell::new(0));
        button.bind("custom", &counter(&count)).unwrap();
        button.trigger("custom", &[Value::from(1)]).unwrap();
        assert_eq!(count.get(), 1);
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn explicit_target_argument() {
        let platform = Rc::new(HeadlessPlatform::new());
        let button = button_class(&platform)
            .construct(&[Value::Node(NodeId::new(1))])
            .unwrap();
        button
            .bind_to("scroll", NodeId::new(9), &Callback::infallible(|_| {}))
            .unwrap();
        assert_eq!(platform.handler_count(NodeId::new(9), "scroll"), 1);
        assert_eq!(platform.handler_count(NodeId::new(1), "scroll"), 0);
    }

    #[test]
    fn bad_arguments_are_reported() {
        let platform = Rc::new(HeadlessPlatform::new());
        let button = button_class(&platform).construct(&[]).unwrap();
        assert_eq!(
            button.call("bind", &[Value::from("click"), Value::from(1)]),
            Err(CallError::InvalidArgument {
                member: "bind".into(),
                index: 1,
                expected: "a callback",
            })
        );
        assert!(matches!(
            button.call("trigger", &[]),
            Err(CallError::InvalidArgument { index: 0, .. })
        ));
    }

    #[test]
    fn class_without_mixin_reports_missing_member() {
        let plain = ClassBuilder::new("Plain").build().construct(&[]).unwrap();
        let err = plain
            .bind("click", &Callback::infallible(|_| {}))
            .unwrap_err();
        assert!(matches!(err, CallError::MissingMember { .. }));
    }

    #[test]
    fn trigger_failure_propagates_through_call() {
        let platform = Rc::new(HeadlessPlatform::new());
        let button = button_class(&platform).construct(&[]).unwrap();
        button
            .bind("save", &Callback::new(|_| Err(CallError::raised("nope"))))
            .unwrap();
        assert_eq!(
            button.trigger("save", &[]).unwrap_err(),
            CallError::raised("nope")
        );
    }

    #[test]
    fn instance_drops_with_handlers_attached() {
        let platform = Rc::new(HeadlessPlatform::new());
        let node = NodeId::new(6);
        let button = button_class(&platform).construct(&[Value::Node(node)]).unwrap();
        button.bind("click", &Callback::infallible(|_| {})).unwrap();
        let weak = button.downgrade();
        drop(button);
        assert!(weak.upgrade().is_none());
        assert_eq!(platform.fire(&PlatformEvent::new("click", node)), Ok(1));
    }

    #[test]
    fn failing_dom_accessor_fails_bind() {
        let platform = Rc::new(HeadlessPlatform::new());
        let adapter: Rc<dyn PlatformAdapter> = platform.clone();
        let class = ClassBuilder::new("Detached")
            .mixin(observable_mixin(Some(adapter), ObservableConfig::new()))
            .mixin(MemberBag::new().with_method("dom", |_, _| {
                Err(CallError::raised("no node yet"))
            }))
            .build();
        let object = class.construct(&[]).unwrap();

        let err = object
            .bind("click", &Callback::infallible(|_| {}))
            .unwrap_err();
        assert_eq!(err, CallError::raised("no node yet"));
        assert!(platform.calls().is_empty());
        assert_eq!(observable_of(&object).unwrap().observer_count("click"), 0);

        // An explicit target skips the accessor.
        object
            .bind_to("click", NodeId::new(2), &Callback::infallible(|_| {}))
            .unwrap();
        assert_eq!(platform.handler_count(NodeId::new(2), "click"), 1);
    }

    #[test]
    fn constant_dom_member_is_a_target() {
        let platform = Rc::new(HeadlessPlatform::new());
        let adapter: Rc<dyn PlatformAdapter> = platform.clone();
        let class = ClassBuilder::new("Pinned")
            .mixin(observable_mixin(Some(adapter), ObservableConfig::new()))
            .mixin(MemberBag::new().with_value("dom", NodeId::new(8)))
            .build();
        let object = class.construct(&[]).unwrap();
        object.bind("click", &Callback::infallible(|_| {})).unwrap();
        assert_eq!(platform.handler_count(NodeId::new(8), "click"), 1);
    }
}
