#![forbid(unsafe_code)]

//! Generated accessor members.
//!
//! An accessor is a single method acting as getter and setter: called with
//! no arguments it returns the current value, called with one argument it
//! stores it and returns the instance so calls can be chained.
//!
//! ```
//! use ukit_core::class::{ClassBuilder, MemberBag};
//! use ukit_core::props;
//! use ukit_core::value::Value;
//!
//! let mut bag = MemberBag::new();
//! props::add_props(&mut bag, &["width", "height"]);
//! let class = ClassBuilder::new("Box").mixin(bag).build();
//!
//! let b = class.construct(&[]).unwrap();
//! b.call("width", &[Value::Int(12)]).unwrap();
//! assert_eq!(b.call("width", &[]).unwrap(), Value::Int(12));
//! assert_eq!(b.get("_width"), Value::Int(12));
//! ```

use std::rc::Rc;

use crate::class::{Member, MemberBag, Method};
use crate::error::CallError;
use crate::object::Object;
use crate::value::Value;

type Setter = Rc<dyn Fn(&Object, Value) -> Result<(), CallError>>;

/// Get or set `name` on `target`.
///
/// If `name` resolves to a method it is called (no argument to read, one
/// to write). Otherwise the field is read or written directly; a read falls
/// back to a constant member of the same name, then to `Value::Unit`.
/// Writes return the target.
pub fn attr(target: &Object, name: &str, value: Option<Value>) -> Result<Value, CallError> {
    match value {
        Some(value) => {
            if target.responds_to(name) {
                target.call(name, &[value])?;
            } else {
                target.set(name, value);
            }
            Ok(Value::Object(target.clone()))
        }
        None => {
            if target.responds_to(name) {
                return target.call(name, &[]);
            }
            if let Some(field) = target.try_get(name) {
                return Ok(field);
            }
            match target.member(name) {
                Some(Member::Value(constant)) => Ok(constant.clone()),
                _ => Ok(Value::Unit),
            }
        }
    }
}

/// Accessor backed by `field`.
#[must_use]
pub fn property(field: impl Into<String>) -> Member {
    accessor(field.into(), None)
}

/// Accessor backed by `field` whose writes go through `setter` instead of
/// storing the value directly.
#[must_use]
pub fn property_with_setter(
    field: impl Into<String>,
    setter: impl Fn(&Object, Value) -> Result<(), CallError> + 'static,
) -> Member {
    accessor(field.into(), Some(Rc::new(setter)))
}

fn accessor(field: String, setter: Option<Setter>) -> Member {
    Member::Method(Method::new(move |this, args| match args.first() {
        None => Ok(this.get(&field)),
        Some(value) => {
            match &setter {
                Some(setter) => setter(this, value.clone())?,
                None => this.set(field.as_str(), value.clone()),
            }
            Ok(Value::Object(this.clone()))
        }
    }))
}

/// Add an accessor `name` backed by field `_name` for every name.
pub fn add_props(bag: &mut MemberBag, names: &[&str]) {
    for name in names {
        bag.insert(*name, property(format!("_{name}")));
    }
}

/// Add accessor `name` that forwards to the object stored in
/// `target_field` when one is present, and otherwise keeps the value in
/// `_name` on the instance itself.
pub fn delegate_prop(bag: &mut MemberBag, name: &str, target_field: &str) {
    let name = name.to_owned();
    let local = format!("_{name}");
    let target_field = target_field.to_owned();
    bag.insert(
        name.clone(),
        Member::Method(Method::new(move |this, args| {
            let target = this.get(&target_field);
            match (target.as_object(), args.first()) {
                (Some(target), None) => attr(target, &name, None),
                (Some(target), Some(value)) => {
                    attr(target, &name, Some(value.clone()))?;
                    Ok(Value::Object(this.clone()))
                }
                (None, None) => Ok(this.get(&local)),
                (None, Some(value)) => {
                    this.set(local.as_str(), value.clone());
                    Ok(Value::Object(this.clone()))
                }
            }
        })),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{Class, ClassBuilder};
    use std::cell::Cell;

    fn widget_class() -> Class {
        let mut bag = MemberBag::new();
        add_props(&mut bag, &["width", "height"]);
        delegate_prop(&mut bag, "text", "_label");
        bag.insert_value("kind", "widget");
        ClassBuilder::new("Widget").mixin(bag).build()
    }

    fn label_class() -> Class {
        let mut bag = MemberBag::new();
        add_props(&mut bag, &["text"]);
        ClassBuilder::new("Label").mixin(bag).build()
    }

    #[test]
    fn accessor_reads_and_writes_backing_field() {
        let w = widget_class().construct(&[]).unwrap();
        assert!(w.call("width", &[]).unwrap().is_unit());

        let returned = w.call("width", &[Value::Int(40)]).unwrap();
        assert_eq!(returned, Value::Object(w.clone()));
        assert_eq!(w.call("width", &[]).unwrap(), Value::Int(40));
        assert_eq!(w.get("_width"), Value::Int(40));
    }

    #[test]
    fn setters_chain() {
        let w = widget_class().construct(&[]).unwrap();
        let same = w.call("width", &[Value::Int(1)]).unwrap();
        same.as_object()
            .unwrap()
            .call("height", &[Value::Int(2)])
            .unwrap();
        assert_eq!(w.get("_height"), Value::Int(2));
    }

    #[test]
    fn custom_setter_replaces_store() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = Rc::clone(&calls);
        let mut bag = MemberBag::new();
        bag.insert(
            "size",
            property_with_setter("_size", move |this, value| {
                calls_clone.set(calls_clone.get() + 1);
                let doubled = value.as_int().map(|v| v * 2).unwrap_or(0);
                this.set("_size", doubled);
                Ok(())
            }),
        );
        let obj = ClassBuilder::new("S").mixin(bag).build().construct(&[]).unwrap();
        obj.call("size", &[Value::Int(5)]).unwrap();
        assert_eq!(obj.call("size", &[]).unwrap(), Value::Int(10));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn delegated_prop_without_target_is_local() {
        let w = widget_class().construct(&[]).unwrap();
        w.call("text", &[Value::from("hi")]).unwrap();
        assert_eq!(w.call("text", &[]).unwrap(), Value::from("hi"));
        assert_eq!(w.get("_text"), Value::from("hi"));
    }

    #[test]
    fn delegated_prop_forwards_to_target() {
        let w = widget_class().construct(&[]).unwrap();
        let label = label_class().construct(&[]).unwrap();
        w.set("_label", label.clone());

        w.call("text", &[Value::from("ok")]).unwrap();
        assert_eq!(label.get("_text"), Value::from("ok"));
        assert_eq!(w.call("text", &[]).unwrap(), Value::from("ok"));
        assert!(w.try_get("_text").is_none());
    }

    #[test]
    fn attr_on_plain_fields_and_constants() {
        let w = widget_class().construct(&[]).unwrap();
        assert_eq!(attr(&w, "kind", None).unwrap(), Value::from("widget"));
        attr(&w, "kind", Some(Value::from("button"))).unwrap();
        assert_eq!(attr(&w, "kind", None).unwrap(), Value::from("button"));
        assert!(attr(&w, "unknown", None).unwrap().is_unit());
    }

    #[test]
    fn attr_prefers_methods() {
        let w = widget_class().construct(&[]).unwrap();
        attr(&w, "width", Some(Value::Int(3))).unwrap();
        assert_eq!(w.get("_width"), Value::Int(3));
        assert!(!w.has_field("width"));
        assert_eq!(attr(&w, "width", None).unwrap(), Value::Int(3));
    }
}
