#![forbid(unsafe_code)]

//! A ready-made base class for views.
//!
//! `View` composes the observable mixin with a `dom` accessor backed by
//! `_dom`. `init` takes the view's node as its optional first argument.
//! Concrete views inherit from it and add their own mixins:
//!
//! ```
//! use std::rc::Rc;
//! use ukit_core::{
//!     ClassBuilder, HeadlessPlatform, MemberBag, NodeId, ObservableConfig, PlatformAdapter, Value,
//! };
//! use ukit_view::view::view_class;
//!
//! let platform: Rc<dyn PlatformAdapter> = Rc::new(HeadlessPlatform::new());
//! let view = view_class(Some(platform), ObservableConfig::new());
//! let button = ClassBuilder::new("Button")
//!     .inherit(&view)
//!     .mixin(MemberBag::new().with_value("role", "button"))
//!     .build();
//!
//! let b = button.construct(&[Value::Node(NodeId::new(1))]).unwrap();
//! assert!(b.is_instance_of(&view));
//! assert_eq!(b.call("dom", &[]).unwrap(), Value::Node(NodeId::new(1)));
//! ```

use std::rc::Rc;

use ukit_core::props::add_props;
use ukit_core::{
    CallError, Class, ClassBuilder, MemberBag, ObservableConfig, PlatformAdapter, Value,
};

use crate::mixin::observable_mixin;

/// Build the base `View` class.
#[must_use]
pub fn view_class(
    platform: Option<Rc<dyn PlatformAdapter>>,
    config: ObservableConfig,
) -> Class {
    let mut members = MemberBag::new().with_method("init", init);
    add_props(&mut members, &["dom"]);

    ClassBuilder::new("View")
        .mixin(observable_mixin(platform, config))
        .mixin(members)
        .build()
}

fn init(this: &ukit_core::Object, args: &[Value]) -> Result<Value, CallError> {
    match args.first() {
        None | Some(Value::Unit) => {}
        Some(Value::Node(node)) => this.set("_dom", *node),
        Some(_) => {
            return Err(CallError::InvalidArgument {
                member: "init".into(),
                index: 0,
                expected: "a node",
            });
        }
    }
    Ok(Value::Unit)
}
