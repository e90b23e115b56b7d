#![forbid(unsafe_code)]

//! Change propagation.
//!
//! [`property_will_change`] runs before a watched key's value changes and
//! [`property_did_change`] after. Each walks, in order:
//!
//! 1. the descriptor's change hook (did-change only), which drops a stale
//!    cache entry;
//! 2. every dependent property registered for the key, recursively;
//! 3. chains passing through the key, re-announced on their roots;
//! 4. listeners for the key's `:before` / `:change` event.
//!
//! By the time any listener runs during the after-phase, every cache that
//! depends on the key has already been invalidated, so reads see the new
//! value.
//!
//! # Failure Modes
//!
//! Dependency cycles (`a` depends on `b`, `b` on `a`) are cut by a per-pass
//! visited set. Unbounded re-entrancy from listeners that write what they
//! observe is cut at [`MAX_NOTIFY_DEPTH`] with a warning.
//!
//! The guard counts nesting, not loops: an acyclic dependency or chain
//! graph more than [`MAX_NOTIFY_DEPTH`] levels deep is cut at the same
//! point, and keys past it are not notified in that pass. Each cut emits
//! `notify.depth_exceeded`.

use std::cell::Cell;

use ahash::AHashSet;

use crate::events::send_event;
use crate::guid::Guid;
use crate::meta::Key;
use crate::object::Object;
use crate::watching::{chains_did_change, chains_will_change};

/// Nesting limit for notification passes.
pub const MAX_NOTIFY_DEPTH: usize = 128;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct DepthGuard;

impl DepthGuard {
    fn enter(obj: &Object, key: &str) -> Option<Self> {
        let depth = DEPTH.get();
        if depth >= MAX_NOTIFY_DEPTH {
            tracing::warn!(
                message = "notify.depth_exceeded",
                guid = %obj.guid(),
                key,
                depth
            );
            return None;
        }
        DEPTH.set(depth + 1);
        Some(Self)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.set(DEPTH.get().saturating_sub(1));
    }
}

type Seen = AHashSet<(Guid, Key)>;

/// Event announcing that `key` has changed.
#[must_use]
pub fn change_event(key: &str) -> String {
    format!("{key}:change")
}

/// Event announcing that `key` is about to change.
#[must_use]
pub fn before_event(key: &str) -> String {
    format!("{key}:before")
}

#[derive(Clone, Copy)]
enum Phase {
    Will,
    Did,
}

/// Notify everything watching `key` that its value is about to change.
pub fn property_will_change(obj: &Object, key: &str) {
    notify(obj, key, Phase::Will, &mut Seen::default());
}

/// Notify everything watching `key` that its value has changed.
pub fn property_did_change(obj: &Object, key: &str) {
    notify(obj, key, Phase::Did, &mut Seen::default());
}

fn notify(obj: &Object, key: &str, phase: Phase, seen: &mut Seen) {
    if obj.is_destroyed() || !seen.insert((obj.guid(), Key::from(key))) {
        return;
    }
    let Some(_guard) = DepthGuard::enter(obj, key) else {
        return;
    };

    if let Phase::Did = phase {
        let desc = obj.meta().descs.get(key).cloned();
        if let Some(desc) = desc {
            desc.did_change(obj, key);
        }
    }

    let dependents: Vec<Key> = obj
        .meta()
        .deps
        .get(key)
        .map(|deps| {
            deps.iter()
                .filter(|(_, count)| **count > 0)
                .map(|(dependent, _)| Key::clone(dependent))
                .collect()
        })
        .unwrap_or_default();
    for dependent in dependents {
        notify(obj, &dependent, phase, seen);
    }

    match phase {
        Phase::Will => {
            chains_will_change(obj, key);
            tracing::trace!(message = "notify.will_change", guid = %obj.guid(), key);
            send_event(obj, &before_event(key), &[]);
        }
        Phase::Did => {
            chains_did_change(obj, key);
            tracing::trace!(message = "notify.did_change", guid = %obj.guid(), key);
            send_event(obj, &change_event(key), &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::add_listener;
    use crate::method::Method;
    use crate::realm::Realm;
    use crate::value::Value;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record(log: &Rc<RefCell<Vec<String>>>) -> Method {
        let log = Rc::clone(log);
        Method::new(move |_, args| {
            let event = args.get(1).and_then(Value::as_str).unwrap_or("").to_string();
            log.borrow_mut().push(event);
            Value::Undefined
        })
    }

    #[test]
    fn event_names() {
        assert_eq!(change_event("a.b"), "a.b:change");
        assert_eq!(before_event("a"), "a:before");
    }

    #[test]
    fn dependents_fire_before_the_source_listeners() {
        let realm = Realm::new();
        let obj = Object::new();
        realm.add_dependent_key(&obj, "full", "first").unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        for event in ["first:before", "first:change", "full:before", "full:change"] {
            add_listener(&obj, event, None, record(&log), None);
        }

        property_will_change(&obj, "first");
        property_did_change(&obj, "first");
        assert_eq!(
            *log.borrow(),
            vec!["full:before", "first:before", "full:change", "first:change"]
        );
    }

    #[test]
    fn dependency_cycles_terminate() {
        let realm = Realm::new();
        let obj = Object::new();
        realm.add_dependent_key(&obj, "a", "b").unwrap();
        realm.add_dependent_key(&obj, "b", "a").unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        add_listener(&obj, "a:change", None, record(&log), None);
        add_listener(&obj, "b:change", None, record(&log), None);

        property_did_change(&obj, "a");
        assert_eq!(*log.borrow(), vec!["b:change", "a:change"]);
    }

    #[test]
    fn destroyed_objects_are_silent() {
        let obj = Object::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        add_listener(&obj, "x:change", None, record(&log), None);
        obj.destroy();
        property_did_change(&obj, "x");
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn deep_dependency_chains_stop_at_the_depth_limit() {
        let realm = Realm::new();
        let obj = Object::new();
        for i in 0..MAX_NOTIFY_DEPTH + 8 {
            realm
                .add_dependent_key(&obj, &format!("k{}", i + 1), &format!("k{i}"))
                .unwrap();
        }
        let log = Rc::new(RefCell::new(Vec::new()));
        let last_reached = format!("k{}", MAX_NOTIFY_DEPTH - 1);
        let first_cut = format!("k{MAX_NOTIFY_DEPTH}");
        add_listener(&obj, &change_event(&last_reached), None, record(&log), None);
        add_listener(&obj, &change_event(&first_cut), None, record(&log), None);

        property_did_change(&obj, "k0");
        assert_eq!(*log.borrow(), vec![change_event(&last_reached)]);
        assert_eq!(DEPTH.get(), 0);
    }

    #[test]
    fn runaway_recursion_is_cut_off() {
        let obj = Object::new();
        let count = Rc::new(Cell::new(0usize));
        let seen = Rc::clone(&count);
        let again = Method::new(move |call, _| {
            seen.set(seen.get() + 1);
            property_did_change(call.this(), "x");
            Value::Undefined
        });
        add_listener(&obj, "x:change", None, again, None);
        property_did_change(&obj, "x");
        assert_eq!(count.get(), MAX_NOTIFY_DEPTH);
        assert_eq!(DEPTH.get(), 0);
    }
}
