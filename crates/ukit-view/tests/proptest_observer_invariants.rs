//! Property-based invariant tests for observer registration and dispatch.
//!
//! A random sequence of bind/unbind/trigger operations is replayed against
//! both an [`Observable`] backed by a headless platform and a plain model
//! (`name -> Vec<callback index>`). After every step:
//!
//! 1. Registered names equal the model's non-empty names.
//! 2. `trigger` invokes exactly the model's callbacks, in bind order, once each.
//! 3. A platform handler is attached for a name iff the model has callbacks for it.
//! 4. Platform attach calls happen only on empty -> non-empty transitions.
//! 5. `trigger` never adds names.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use proptest::prelude::*;
use ukit_core::{Callback, HeadlessPlatform, NodeId, ObservableConfig, PlatformAdapter};
use ukit_view::Observable;

const NAMES: [&str; 3] = ["click", "keyup", "focus"];
const CALLBACKS: usize = 3;
const NODE: NodeId = NodeId::new(42);

#[derive(Debug, Clone)]
enum Op {
    Bind(usize, usize),
    Unbind(usize, usize),
    Trigger(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..NAMES.len(), 0..CALLBACKS).prop_map(|(n, c)| Op::Bind(n, c)),
        (0..NAMES.len(), 0..CALLBACKS).prop_map(|(n, c)| Op::Unbind(n, c)),
        (0..NAMES.len()).prop_map(Op::Trigger),
    ]
}

struct Harness {
    platform: Rc<HeadlessPlatform>,
    bus: Observable,
    callbacks: Vec<Callback>,
    log: Rc<RefCell<Vec<usize>>>,
}

impl Harness {
    fn new() -> Self {
        let platform = Rc::new(HeadlessPlatform::new());
        let adapter: Rc<dyn PlatformAdapter> = platform.clone();
        let bus = Observable::with_parts(Some(adapter), ObservableConfig::new());
        bus.set_default_target(Some(NODE));
        let log = Rc::new(RefCell::new(Vec::new()));
        let callbacks = (0..CALLBACKS)
            .map(|idx| {
                let log = Rc::clone(&log);
                Callback::infallible(move |_| log.borrow_mut().push(idx))
            })
            .collect();
        Self {
            platform,
            bus,
            callbacks,
            log,
        }
    }
}

proptest! {
    #[test]
    fn registry_matches_model(ops in proptest::collection::vec(op_strategy(), 0..60)) {
        let h = Harness::new();
        let mut model: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        let mut expected_attaches: BTreeMap<&str, usize> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Bind(n, c) => {
                    let name = NAMES[n];
                    let list = model.entry(name).or_default();
                    if list.is_empty() {
                        *expected_attaches.entry(name).or_default() += 1;
                    }
                    list.push(c);
                    h.bus.bind(name, &h.callbacks[c]).unwrap();
                }
                Op::Unbind(n, c) => {
                    let name = NAMES[n];
                    if let Some(list) = model.get_mut(name) {
                        list.retain(|&x| x != c);
                        if list.is_empty() {
                            model.remove(name);
                        }
                    }
                    h.bus.unbind(name, &h.callbacks[c]);
                }
                Op::Trigger(n) => {
                    let name = NAMES[n];
                    h.log.borrow_mut().clear();
                    h.bus.trigger(name, &[]).unwrap();
                    let expected = model.get(name).cloned().unwrap_or_default();
                    prop_assert_eq!(&*h.log.borrow(), &expected);
                }
            }

            let names: Vec<String> = model.keys().map(|k| (*k).to_owned()).collect();
            prop_assert_eq!(h.bus.event_names(), names);

            for name in NAMES {
                let bound = model.contains_key(name);
                prop_assert_eq!(h.platform.handler_count(NODE, name), usize::from(bound));
                prop_assert_eq!(h.bus.is_attached(name), bound);
                prop_assert_eq!(
                    h.platform.bind_count(NODE, name),
                    expected_attaches.get(name).copied().unwrap_or(0)
                );
                prop_assert_eq!(
                    h.bus.observer_count(name),
                    model.get(name).map_or(0, Vec::len)
                );
            }
        }
    }

    #[test]
    fn bind_then_unbind_leaves_nothing(n in 0..NAMES.len(), c in 0..CALLBACKS, repeats in 1usize..5) {
        let h = Harness::new();
        let name = NAMES[n];
        for _ in 0..repeats {
            h.bus.bind(name, &h.callbacks[c]).unwrap();
        }
        h.bus.unbind(name, &h.callbacks[c]);

        prop_assert_eq!(h.bus.observer_count(name), 0);
        prop_assert!(h.bus.event_names().is_empty());
        prop_assert_eq!(h.platform.attached_len(), 0);
    }

    #[test]
    fn trigger_on_fresh_bus_creates_nothing(n in 0..NAMES.len()) {
        let h = Harness::new();
        h.bus.trigger(NAMES[n], &[]).unwrap();
        prop_assert!(!h.bus.has_registry());
        prop_assert!(h.platform.calls().is_empty());
    }
}
