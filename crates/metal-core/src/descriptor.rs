#![forbid(unsafe_code)]

//! Property descriptors.
//!
//! A descriptor decides how reads and writes of one key behave. Installed
//! descriptors live in the object's metadata; a key without one is a plain
//! stored value.
//!
//! # Computed properties
//!
//! [`computed`] wraps a function `(obj, key, value) -> result`, called with
//! `None` for reads and `Some(value)` for writes. Declared dependent keys
//! (`.property([...])`) are registered when the descriptor is installed, so
//! a write to any of them runs the descriptor's `did_change` hook.
//!
//! A cacheable property memoizes its last result in the object's private
//! cache until `did_change` clears it. While a computed setter runs, the
//! descriptor is suspended for that object: dependency notifications fired
//! synchronously from inside the setter do not clear the cache it is about
//! to fill.
//!
//! # Invariants
//!
//! 1. A cached entry exists only for cacheable properties.
//! 2. A watched computed set whose value is identical to the previous set
//!    through the same key emits no notifications.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::accessors::{get, raw_value, set, write_plain};
use crate::error::Result;
use crate::guid::Guid;
use crate::meta::Key;
use crate::object::Object;
use crate::path::normalize_path;
use crate::property_events::{property_did_change, property_will_change};
use crate::realm::Realm;
use crate::value::Value;
use crate::watching;

type ComputedFn = dyn Fn(&Object, &str, Option<&Value>) -> Value;

#[derive(Clone)]
struct ComputedInner {
    func: Rc<ComputedFn>,
    cacheable: bool,
    dependent_keys: SmallVec<[Rc<str>; 4]>,
    suspended: Cell<Option<Guid>>,
}

#[derive(Clone)]
pub struct ComputedProperty {
    inner: Rc<ComputedInner>,
}

/// Create a computed property from a getter/setter function.
pub fn computed(func: impl Fn(&Object, &str, Option<&Value>) -> Value + 'static) -> ComputedProperty {
    ComputedProperty {
        inner: Rc::new(ComputedInner {
            func: Rc::new(func),
            cacheable: false,
            dependent_keys: SmallVec::new(),
            suspended: Cell::new(None),
        }),
    }
}

impl ComputedProperty {
    /// Declare the paths this property depends on, replacing any earlier
    /// declaration.
    #[must_use]
    pub fn property<I, S>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.map_inner(|inner| {
            inner.dependent_keys = keys.into_iter().map(|k| Rc::from(k.as_ref())).collect();
        })
    }

    #[must_use]
    pub fn cacheable(self, flag: bool) -> Self {
        self.map_inner(|inner| inner.cacheable = flag)
    }

    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.inner.cacheable
    }

    #[must_use]
    pub fn dependent_keys(&self) -> &[Rc<str>] {
        &self.inner.dependent_keys
    }

    fn map_inner(self, f: impl FnOnce(&mut ComputedInner)) -> Self {
        let mut inner = Rc::unwrap_or_clone(self.inner);
        f(&mut inner);
        Self {
            inner: Rc::new(inner),
        }
    }

    fn get(&self, obj: &Object, key: &str) -> Value {
        if self.inner.cacheable {
            let cached = obj.meta().cache.get(key).cloned();
            if let Some(value) = cached {
                return value;
            }
        }

        let ret = (self.inner.func)(obj, key, None);
        if self.inner.cacheable && !obj.is_destroyed() {
            obj.meta_mut().cache.insert(Key::from(key), ret.clone());
        }
        ret
    }

    fn set(&self, obj: &Object, key: &str, value: Value) -> Value {
        let cacheable = self.inner.cacheable;
        let id = value.id();
        let watched = {
            let meta = obj.meta();
            meta.watch_count(key) > 0 && meta.last_set_values.get(key) != Some(&id)
        };

        let prev = self.inner.suspended.replace(Some(obj.guid()));

        if watched {
            obj.meta_mut().last_set_values.insert(Key::from(key), id);
            property_will_change(obj, key);
        }

        if cacheable {
            obj.meta_mut().cache.remove(key);
        }
        let ret = (self.inner.func)(obj, key, Some(&value));
        if cacheable && !obj.is_destroyed() {
            obj.meta_mut().cache.insert(Key::from(key), ret.clone());
        }

        if watched {
            property_did_change(obj, key);
        }
        self.inner.suspended.set(prev);
        ret
    }

    fn did_change(&self, obj: &Object, key: &str) {
        if self.inner.cacheable && self.inner.suspended.get() != Some(obj.guid()) {
            obj.meta_mut().cache.remove(key);
        }
    }
}

impl fmt::Debug for ComputedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedProperty")
            .field("cacheable", &self.inner.cacheable)
            .field("dependent_keys", &self.inner.dependent_keys)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum Descriptor {
    /// A stored value. Never kept in the descriptor map; installing it
    /// removes any other descriptor.
    Plain,
    Computed(ComputedProperty),
    /// Another name for the property named here.
    Alias(Rc<str>),
    /// Placeholder that must be satisfied by a later definition.
    Required,
}

/// Alias `name` during mixin application.
pub fn alias(name: &str) -> Descriptor {
    Descriptor::Alias(Rc::from(name))
}

pub fn required() -> Descriptor {
    Descriptor::Required
}

impl From<ComputedProperty> for Descriptor {
    fn from(cp: ComputedProperty) -> Self {
        Self::Computed(cp)
    }
}

impl Descriptor {
    #[must_use]
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required)
    }

    #[must_use]
    pub fn is_plain(&self) -> bool {
        matches!(self, Self::Plain)
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Computed(_) => "computed",
            Self::Alias(_) => "alias",
            Self::Required => "required",
        }
    }

    /// Reject malformed dependent keys before anything is installed.
    pub(crate) fn validate(&self, realm: &Realm, key: &str) -> Result<()> {
        let Self::Computed(cp) = self else {
            return Ok(());
        };
        for dep in cp.dependent_keys() {
            let malformed = match normalize_path(dep) {
                Ok(path) => path == "*" || path.ends_with(['.', '*']) || path.contains(".."),
                Err(_) => true,
            };
            realm.check(!malformed, || {
                format!("malformed dependent key '{dep}' on computed property '{key}'")
            })?;
        }
        Ok(())
    }

    /// Install hook: registers dependent keys.
    pub(crate) fn setup(&self, realm: &Realm, obj: &Object, key: &str) -> Result<()> {
        if let Self::Computed(cp) = self {
            for dep in cp.dependent_keys() {
                realm.add_dependent_key(obj, key, dep)?;
            }
        }
        Ok(())
    }

    /// Removal hook: releases dependent keys and clears the cache entry.
    pub(crate) fn teardown(&self, obj: &Object, key: &str) {
        if let Self::Computed(cp) = self {
            tracing::debug!(message = "descriptor.teardown", guid = %obj.guid(), key);
            for dep in cp.dependent_keys() {
                watching::remove_dependent_key(obj, key, dep);
            }
            if cp.is_cacheable() {
                obj.meta_mut().cache.remove(key);
            }
        }
    }

    pub(crate) fn get(&self, obj: &Object, key: &str) -> Value {
        match self {
            Self::Computed(cp) => cp.get(obj, key),
            Self::Alias(target) => get(obj, target),
            Self::Plain | Self::Required => raw_value(obj, key),
        }
    }

    pub(crate) fn set(&self, obj: &Object, key: &str, value: Value) -> Value {
        match self {
            Self::Computed(cp) => cp.set(obj, key, value),
            Self::Alias(target) => set(obj, target, value),
            Self::Plain | Self::Required => {
                write_plain(obj, key, value.clone());
                value
            }
        }
    }

    /// Change hook, run before dependents are notified.
    pub(crate) fn did_change(&self, obj: &Object, key: &str) {
        if let Self::Computed(cp) = self {
            cp.did_change(obj, key);
        }
    }
}
