#![forbid(unsafe_code)]

//! Class assembly from a parent class and an ordered list of mixins.
//!
//! # Design
//!
//! A [`Class`] is an explicit record: an optional parent, the member bag
//! merged from its own mixins, and a flattened dispatch table. The table is
//! computed once in [`ClassBuilder::build`] and never changes, so member
//! lookup is a single hash probe instead of a walk up a chain.
//!
//! Resolution order, lowest precedence first:
//!
//! 1. the parent's flattened table (when built with [`ClassBuilder::inherit`]),
//! 2. each mixin in the order it was added; later keys overwrite earlier ones.
//!
//! # Inherit vs copy
//!
//! [`ClassBuilder::inherit`] links the new class to its parent:
//! [`Object::is_instance_of`] holds for the parent. [`ClassBuilder::copy_from`]
//! is the alternative mode: the source class's members are merged like any
//! other mixin and no link is recorded, so instances are *not* instances of
//! the source. The caller picks the mode; nothing is probed at runtime.
//!
//! # Mixin factories
//!
//! A mixin can be a factory receiving the bags accumulated so far: the
//! parent's prototype first (inherit mode only), then every bag merged
//! before it. This allows mixins parameterized by what they extend.
//!
//! # Example
//!
//! ```
//! use ukit_core::class::{ClassBuilder, MemberBag};
//! use ukit_core::value::Value;
//!
//! let point = ClassBuilder::new("Point")
//!     .mixin(MemberBag::new().with_method("init", |this, _args| {
//!         this.set("x", 1);
//!         Ok(Value::Unit)
//!     }))
//!     .build();
//!
//! let point3 = ClassBuilder::new("Point3")
//!     .inherit(&point)
//!     .mixin(MemberBag::new().with_method("get_x", |this, _args| Ok(this.get("x"))))
//!     .build();
//!
//! let p = point3.construct(&[]).unwrap();
//! assert_eq!(p.call("get_x", &[]).unwrap(), Value::Int(1));
//! assert!(p.is_instance_of(&point));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::CallError;
use crate::object::Object;
use crate::value::Value;

type MethodFn = dyn Fn(&Object, &[Value]) -> Result<Value, CallError>;

/// A method body. Receives the instance and the call arguments.
#[derive(Clone)]
pub struct Method(Rc<MethodFn>);

impl Method {
    pub fn new(f: impl Fn(&Object, &[Value]) -> Result<Value, CallError> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, this: &Object, args: &[Value]) -> Result<Value, CallError> {
        (self.0)(this, args)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

/// A single entry of a member bag or dispatch table.
#[derive(Debug, Clone)]
pub enum Member {
    Method(Method),
    /// A shared constant. Read it with `attr`; `call` reports it as not
    /// callable.
    Value(Value),
}

impl Member {
    #[must_use]
    pub fn as_method(&self) -> Option<&Method> {
        match self {
            Self::Method(m) => Some(m),
            Self::Value(_) => None,
        }
    }
}

/// Named members merged onto a class.
#[derive(Debug, Clone, Default)]
pub struct MemberBag {
    members: BTreeMap<String, Member>,
}

impl MemberBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert_method`](Self::insert_method).
    #[must_use]
    pub fn with_method(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&Object, &[Value]) -> Result<Value, CallError> + 'static,
    ) -> Self {
        self.insert_method(name, f);
        self
    }

    /// Builder form of [`insert_value`](Self::insert_value).
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_value(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, member: Member) {
        self.members.insert(name.into(), member);
    }

    pub fn insert_method(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&Object, &[Value]) -> Result<Value, CallError> + 'static,
    ) {
        self.insert(name, Member::Method(Method::new(f)));
    }

    pub fn insert_value(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.insert(name, Member::Value(value.into()));
    }

    /// Copy every member of `other` into `self`; `other` wins on conflicts.
    pub fn extend(&mut self, other: &MemberBag) {
        for (name, member) in &other.members {
            self.members.insert(name.clone(), member.clone());
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }
}

type MixinFactory = Rc<dyn Fn(&[MemberBag]) -> MemberBag>;

/// A mixin: a plain bag, or a factory producing one from the bags merged
/// before it.
#[derive(Clone)]
pub enum Mixin {
    Bag(MemberBag),
    Factory(MixinFactory),
}

impl Mixin {
    pub fn factory(f: impl Fn(&[MemberBag]) -> MemberBag + 'static) -> Self {
        Self::Factory(Rc::new(f))
    }

    fn resolve(self, bases: &[MemberBag]) -> MemberBag {
        match self {
            Self::Bag(bag) => bag,
            Self::Factory(f) => f(bases),
        }
    }
}

impl From<MemberBag> for Mixin {
    fn from(bag: MemberBag) -> Self {
        Self::Bag(bag)
    }
}

impl fmt::Debug for Mixin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bag(bag) => f.debug_tuple("Bag").field(bag).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Process-unique class identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u64);

impl ClassId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

struct ClassInner {
    id: ClassId,
    name: String,
    parent: Option<Class>,
    own: MemberBag,
    table: FxHashMap<String, Member>,
}

/// A constructible type with a fixed dispatch table.
///
/// Cloning shares the same class; equality is identity.
#[derive(Clone)]
pub struct Class {
    inner: Rc<ClassInner>,
}

impl Class {
    #[must_use]
    pub fn id(&self) -> ClassId {
        self.inner.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Class> {
        self.inner.parent.as_ref()
    }

    /// Members contributed by this class's own mixins (not inherited).
    #[must_use]
    pub fn own_members(&self) -> &MemberBag {
        &self.inner.own
    }

    /// Resolve a member through the flattened table.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Member> {
        self.inner.table.get(name)
    }

    /// Whether `name` resolves to a method.
    #[must_use]
    pub fn responds_to(&self, name: &str) -> bool {
        matches!(self.lookup(name), Some(Member::Method(_)))
    }

    /// Every resolvable member name, sorted.
    #[must_use]
    pub fn member_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.table.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The flattened table as a bag, which is what mixin factories and
    /// [`ClassBuilder::copy_from`] see.
    #[must_use]
    pub fn prototype(&self) -> MemberBag {
        let mut bag = MemberBag::new();
        for (name, member) in &self.inner.table {
            bag.insert(name.clone(), member.clone());
        }
        bag
    }

    /// True if `self` is `ancestor` or inherits from it.
    #[must_use]
    pub fn is_subclass_of(&self, ancestor: &Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.ptr_eq(ancestor) {
                return true;
            }
            current = class.parent();
        }
        false
    }

    /// Allocate an instance and run `init` with `args`.
    ///
    /// A class without `init` constructs an instance with no fields. Errors
    /// raised by `init` are returned unchanged and the instance is dropped.
    pub fn construct(&self, args: &[Value]) -> Result<Object, CallError> {
        let object = Object::alloc(self.clone());
        match self.lookup("init") {
            Some(Member::Method(init)) => {
                init.call(&object, args)?;
            }
            Some(Member::Value(_)) => {
                return Err(CallError::NotCallable {
                    class: self.name().to_owned(),
                    member: "init".to_owned(),
                });
            }
            None => {}
        }
        Ok(object)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Class {}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.inner.name)
            .field("id", &self.inner.id.0)
            .field("parent", &self.inner.parent.as_ref().map(Class::name))
            .field("members", &self.member_names())
            .finish()
    }
}

/// Builder for [`Class`].
#[derive(Debug)]
pub struct ClassBuilder {
    name: String,
    parent: Option<Class>,
    mixins: Vec<Mixin>,
}

impl ClassBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            mixins: Vec::new(),
        }
    }

    /// Inherit from `parent`. Calling this again replaces the parent.
    ///
    /// The parent is always the lowest layer, wherever this call appears
    /// in the chain: its table is the starting point and its prototype is
    /// the first base a factory sees. Mixins added before `inherit` still
    /// apply on top of it.
    #[must_use]
    pub fn inherit(mut self, parent: &Class) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Merge `source`'s members as a plain mixin, without inheriting.
    #[must_use]
    pub fn copy_from(self, source: &Class) -> Self {
        self.mixin(source.prototype())
    }

    #[must_use]
    pub fn mixin(mut self, mixin: impl Into<Mixin>) -> Self {
        self.mixins.push(mixin.into());
        self
    }

    /// Add a mixin factory. See the module docs for what `bases` holds.
    #[must_use]
    pub fn mixin_with(self, f: impl Fn(&[MemberBag]) -> MemberBag + 'static) -> Self {
        self.mixin(Mixin::factory(f))
    }

    #[must_use]
    pub fn build(self) -> Class {
        let mut bases: Vec<MemberBag> = Vec::with_capacity(self.mixins.len() + 1);
        let mut table: FxHashMap<String, Member> = FxHashMap::default();

        if let Some(parent) = &self.parent {
            table.clone_from(&parent.inner.table);
            bases.push(parent.prototype());
        }

        let mut own = MemberBag::new();
        for mixin in self.mixins {
            let bag = mixin.resolve(&bases);
            for (name, member) in bag.iter() {
                table.insert(name.to_owned(), member.clone());
            }
            own.extend(&bag);
            bases.push(bag);
        }

        let class = Class {
            inner: Rc::new(ClassInner {
                id: ClassId::next(),
                name: self.name,
                parent: self.parent,
                own,
                table,
            }),
        };
        debug!(
            class = class.name(),
            id = class.id().get(),
            parent = class.parent().map(Class::name),
            members = class.inner.table.len(),
            "class built"
        );
        class
    }
}
