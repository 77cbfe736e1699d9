#![forbid(unsafe_code)]

//! Class instances: a class reference plus a bag of mutable fields.
//!
//! Instances are created only by [`Class::construct`], which runs `init`
//! before handing the object out. Fields are stored per instance; members
//! come from the class's dispatch table.
//!
//! `Object` is a shared handle (`Rc`). Cloning is cheap and both handles
//! see the same fields. Use [`WeakObject`] from closures the object itself
//! owns to avoid reference cycles.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::class::{Class, Member};
use crate::error::CallError;
use crate::value::Value;

struct ObjectInner {
    class: Class,
    fields: RefCell<FxHashMap<String, Value>>,
}

/// An instance of a [`Class`].
#[derive(Clone)]
pub struct Object {
    inner: Rc<ObjectInner>,
}

impl Object {
    pub(crate) fn alloc(class: Class) -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                class,
                fields: RefCell::new(FxHashMap::default()),
            }),
        }
    }

    #[must_use]
    pub fn class(&self) -> &Class {
        &self.inner.class
    }

    /// True if this object's class is `class` or inherits from it.
    ///
    /// Classes assembled with `copy_from` are not linked to their source.
    #[must_use]
    pub fn is_instance_of(&self, class: &Class) -> bool {
        self.inner.class.is_subclass_of(class)
    }

    /// Read a field, `Value::Unit` if unset.
    #[must_use]
    pub fn get(&self, field: &str) -> Value {
        self.try_get(field).unwrap_or_default()
    }

    #[must_use]
    pub fn try_get(&self, field: &str) -> Option<Value> {
        self.inner.fields.borrow().get(field).cloned()
    }

    pub fn set(&self, field: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .fields
            .borrow_mut()
            .insert(field.into(), value.into());
    }

    /// Remove a field, returning its previous value.
    pub fn remove(&self, field: &str) -> Option<Value> {
        self.inner.fields.borrow_mut().remove(field)
    }

    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.inner.fields.borrow().contains_key(field)
    }

    /// Field names, sorted.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.fields.borrow().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Read the field, or compute and store it if unset.
    pub fn get_or_insert_with(&self, field: &str, f: impl FnOnce() -> Value) -> Value {
        if let Some(existing) = self.try_get(field) {
            return existing;
        }
        let value = f();
        self.set(field, value.clone());
        value
    }

    /// Resolve a member through the class's dispatch table.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.inner.class.lookup(name)
    }

    #[must_use]
    pub fn responds_to(&self, name: &str) -> bool {
        self.inner.class.responds_to(name)
    }

    /// Invoke a method by name.
    ///
    /// No field borrow is held while the method runs, so methods may read
    /// and write fields and call other methods freely.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, CallError> {
        match self.member(name) {
            Some(Member::Method(method)) => method.call(self, args),
            Some(Member::Value(_)) => Err(CallError::NotCallable {
                class: self.inner.class.name().to_owned(),
                member: name.to_owned(),
            }),
            None => Err(CallError::MissingMember {
                class: self.inner.class.name().to_owned(),
                member: name.to_owned(),
            }),
        }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.inner))
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Field values may hold this object again; print names only.
        f.debug_struct("Object")
            .field("class", &self.inner.class.name())
            .field("fields", &self.field_names())
            .finish()
    }
}

/// Non-owning handle to an [`Object`].
#[derive(Clone)]
pub struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
    #[must_use]
    pub fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(|inner| Object { inner })
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObject")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}
