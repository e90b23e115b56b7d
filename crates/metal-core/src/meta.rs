#![forbid(unsafe_code)]

//! Per-object metadata record.
//!
//! # Design
//!
//! Every shared sub-map lives behind an `Rc`. Extending an object clones the
//! record, which clones the `Rc`s, so parent and child structurally share
//! descriptors, values, watch counts, listeners, dependencies and mixin
//! bookkeeping. All writes go through the `*_mut` accessors below, which use
//! `Rc::make_mut` and therefore copy a sub-map the first time a shared one is
//! written. Nested maps (listener sets per event, dependents per key) are
//! shared the same way one level down.
//!
//! # Invariants
//!
//! 1. A shared sub-map is never mutated in place. Mutation through one
//!    record is invisible to every other record.
//! 2. `cache` and `last_set_values` are always private to one object.
//! 3. `chains` and `chain_links` are private to one object; extending
//!    re-anchors chains instead of sharing them.
//!
//! Callers must not hold a borrow of a record across a call that can run
//! user code (getters, setters, listeners). Copy what you need out first.

use std::rc::Rc;

use ahash::AHashMap;

use crate::descriptor::Descriptor;
use crate::events::ListenerSet;
use crate::mixin::Mixin;
use crate::value::{Value, ValueId};
use crate::watching::{Chain, ChainLink};

pub(crate) type Key = Rc<str>;
pub(crate) type KeyMap<V> = AHashMap<Key, V>;

/// Required keys still waiting for a definition after partial applies.
#[derive(Debug, Clone, Default)]
pub(crate) struct RequiredKeys {
    count: usize,
    keys: Vec<(Key, bool)>,
}

impl RequiredKeys {
    pub(crate) fn mark(&mut self, key: &str) {
        match self.keys.iter_mut().find(|(k, _)| &**k == key) {
            Some((_, outstanding)) if *outstanding => {}
            Some((_, outstanding)) => {
                *outstanding = true;
                self.count += 1;
            }
            None => {
                self.keys.push((Key::from(key), true));
                self.count += 1;
            }
        }
    }

    pub(crate) fn is_outstanding(&self, key: &str) -> bool {
        self.keys.iter().any(|(k, outstanding)| *outstanding && &**k == key)
    }

    pub(crate) fn satisfy(&mut self, key: &str) {
        if let Some((_, outstanding)) = self.keys.iter_mut().find(|(k, _)| &**k == key)
            && *outstanding
        {
            *outstanding = false;
            self.count -= 1;
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn outstanding(&self) -> impl Iterator<Item = &Key> {
        self.keys
            .iter()
            .filter(|(_, outstanding)| *outstanding)
            .map(|(k, _)| k)
    }
}

#[derive(Clone, Default)]
pub(crate) struct Meta {
    pub(crate) descs: Rc<KeyMap<Descriptor>>,
    pub(crate) values: Rc<KeyMap<Value>>,
    pub(crate) cache: KeyMap<Value>,
    pub(crate) watching: Rc<KeyMap<usize>>,
    pub(crate) listeners: Rc<KeyMap<Rc<ListenerSet>>>,
    pub(crate) deps: Rc<KeyMap<Rc<KeyMap<i32>>>>,
    pub(crate) last_set_values: KeyMap<ValueId>,
    pub(crate) mixins: Rc<Vec<Mixin>>,
    pub(crate) required: Rc<RequiredKeys>,
    pub(crate) chains: KeyMap<Chain>,
    pub(crate) chain_links: KeyMap<Vec<ChainLink>>,
}

impl Meta {
    /// A record for a child object: shared sub-maps, private caches.
    pub(crate) fn inherit(&self) -> Self {
        Self {
            descs: Rc::clone(&self.descs),
            values: Rc::clone(&self.values),
            cache: KeyMap::default(),
            watching: Rc::clone(&self.watching),
            listeners: Rc::clone(&self.listeners),
            deps: Rc::clone(&self.deps),
            last_set_values: KeyMap::default(),
            mixins: Rc::clone(&self.mixins),
            required: Rc::clone(&self.required),
            chains: KeyMap::default(),
            chain_links: KeyMap::default(),
        }
    }

    pub(crate) fn descs_mut(&mut self) -> &mut KeyMap<Descriptor> {
        Rc::make_mut(&mut self.descs)
    }

    pub(crate) fn values_mut(&mut self) -> &mut KeyMap<Value> {
        Rc::make_mut(&mut self.values)
    }

    pub(crate) fn watch_count(&self, key: &str) -> usize {
        self.watching.get(key).copied().unwrap_or(0)
    }

    /// Adjust a watch count, returning the new value. Counts never go
    /// below zero.
    pub(crate) fn adjust_watch(&mut self, key: &str, delta: isize) -> usize {
        let current = self.watch_count(key);
        let next = current.saturating_add_signed(delta);
        if next != current {
            Rc::make_mut(&mut self.watching).insert(Key::from(key), next);
        }
        next
    }

    pub(crate) fn listeners_mut(&mut self) -> &mut KeyMap<Rc<ListenerSet>> {
        Rc::make_mut(&mut self.listeners)
    }

    /// Writable listener set for `event`, created if absent.
    pub(crate) fn listener_set_mut(&mut self, event: &str) -> &mut ListenerSet {
        Rc::make_mut(self.listeners_mut().entry(Key::from(event)).or_default())
    }

    /// Writable dependents map for a source key, created if absent.
    pub(crate) fn deps_for_mut(&mut self, source: &str) -> &mut KeyMap<i32> {
        let deps = Rc::make_mut(&mut self.deps);
        Rc::make_mut(deps.entry(Key::from(source)).or_default())
    }

    pub(crate) fn mixins_mut(&mut self) -> &mut Vec<Mixin> {
        Rc::make_mut(&mut self.mixins)
    }

    pub(crate) fn required_mut(&mut self) -> &mut RequiredKeys {
        Rc::make_mut(&mut self.required)
    }
}
