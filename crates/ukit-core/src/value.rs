#![forbid(unsafe_code)]

//! Dynamic values passed through members, fields, and event dispatch.
//!
//! # Equality
//!
//! Scalars, strings, and lists compare structurally. [`Callback`],
//! [`Object`], and opaque payloads compare by identity: two closures with
//! identical bodies are still different callbacks, which is what `unbind`
//! relies on.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::CallError;
use crate::object::Object;
use crate::platform::NodeId;

type CallbackFn = dyn Fn(&[Value]) -> Result<(), CallError>;

/// An event callback handle.
///
/// Cloning shares the same closure; equality is pointer identity.
#[derive(Clone)]
pub struct Callback(Rc<CallbackFn>);

impl Callback {
    /// Wrap a closure that may fail.
    pub fn new(f: impl Fn(&[Value]) -> Result<(), CallError> + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Wrap a closure that never fails.
    pub fn infallible(f: impl Fn(&[Value]) + 'static) -> Self {
        Self(Rc::new(move |args: &[Value]| {
            f(args);
            Ok(())
        }))
    }

    /// Invoke the callback.
    pub fn call(&self, args: &[Value]) -> Result<(), CallError> {
        (self.0)(args)
    }

    /// Identity comparison.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Callback {}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<[Value]>),
    Node(NodeId),
    Callback(Callback),
    Object(Object),
    Opaque(Rc<dyn Any>),
}

impl Value {
    /// Wrap an arbitrary payload.
    pub fn opaque<T: Any>(value: T) -> Self {
        Self::Opaque(Rc::new(value))
    }

    #[must_use]
    pub fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats as-is; integers only when `f64` holds them exactly
    /// (magnitude at most 2^53).
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        const MAX_EXACT: u64 = 1 << f64::MANTISSA_DIGITS;
        match self {
            Self::Float(x) => Some(*x),
            Self::Int(i) if i.unsigned_abs() <= MAX_EXACT => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(&**s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(&**items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Self::Callback(cb) => Some(cb),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Borrow an opaque payload as `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Opaque(any) => any.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Short type label used in error messages and debug output.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Node(_) => "node",
            Self::Callback(_) => "callback",
            Self::Object(_) => "object",
            Self::Opaque(_) => "opaque",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Node(a), Self::Node(b)) => a == b,
            (Self::Callback(a), Self::Callback(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Opaque(a), Self::Opaque(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("Unit"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Node(id) => write!(f, "Node({})", id.get()),
            Self::Callback(cb) => cb.fmt(f),
            Self::Object(obj) => obj.fmt(f),
            Self::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(Rc::from(items))
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<Callback> for Value {
    fn from(cb: Callback) -> Self {
        Self::Callback(cb)
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Self::Object(obj)
    }
}
