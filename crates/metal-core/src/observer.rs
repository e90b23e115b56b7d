#![forbid(unsafe_code)]

//! Observers: listeners on a path's change events.
//!
//! An observer on `path` is a listener for `"<path>:change"` (or
//! `"<path>:before"`) plus a watch on `path`. Its transform reshapes the
//! event into `[sender, path, value]`, reading the value when the event
//! fires, so before-observers see the old value and observers the new one.

use std::rc::Rc;

use crate::error::Result;
use crate::events::{MethodRef, Transform, add_listener, listeners_for, remove_listener};
use crate::object::Object;
use crate::path::normalize_path;
use crate::property_events::{before_event, change_event};
use crate::realm::Realm;
use crate::value::Value;

const CHANGE_SUFFIX: &str = ":change";
const BEFORE_SUFFIX: &str = ":before";

impl Realm {
    /// Call `method` on `target` (the sender when `None`) after `path`
    /// changes on `obj`.
    pub fn add_observer(
        &self,
        obj: &Object,
        path: &str,
        target: Option<&Object>,
        method: impl Into<MethodRef>,
    ) -> Result<()> {
        let path = normalize_path(path)?;
        self.watch(obj, &path)?;
        let transform = self.observer_transform(CHANGE_SUFFIX);
        add_listener(obj, &change_event(&path), target, method, Some(transform));
        Ok(())
    }

    pub fn remove_observer(
        &self,
        obj: &Object,
        path: &str,
        target: Option<&Object>,
        method: impl Into<MethodRef>,
    ) -> Result<()> {
        let path = normalize_path(path)?;
        remove_listener(obj, &change_event(&path), target, method);
        self.unwatch(obj, &path)
    }

    /// Call `method` on `target` just before `path` changes on `obj`.
    pub fn add_before_observer(
        &self,
        obj: &Object,
        path: &str,
        target: Option<&Object>,
        method: impl Into<MethodRef>,
    ) -> Result<()> {
        let path = normalize_path(path)?;
        self.watch(obj, &path)?;
        let transform = self.observer_transform(BEFORE_SUFFIX);
        add_listener(obj, &before_event(&path), target, method, Some(transform));
        Ok(())
    }

    pub fn remove_before_observer(
        &self,
        obj: &Object,
        path: &str,
        target: Option<&Object>,
        method: impl Into<MethodRef>,
    ) -> Result<()> {
        let path = normalize_path(path)?;
        remove_listener(obj, &before_event(&path), target, method);
        self.unwatch(obj, &path)
    }

    fn observer_transform(&self, suffix: &'static str) -> Transform {
        let realm = self.downgrade();
        Rc::new(move |target, method, params| {
            let sender = params.first().cloned().unwrap_or_default();
            let path = params
                .get(1)
                .and_then(Value::as_str)
                .and_then(|event| event.strip_suffix(suffix))
                .unwrap_or_default();
            let value = match sender.as_object() {
                Some(sender) => realm
                    .upgrade()
                    .get_path(Some(sender), path)
                    .unwrap_or_default(),
                None => Value::Undefined,
            };
            method.call(target, &[sender, Value::from(path), value]);
        })
    }
}

/// Live observers registered for `path` on `obj`.
pub fn observers_for(obj: &Object, path: &str) -> Vec<(Option<Object>, MethodRef)> {
    match normalize_path(path) {
        Ok(path) => listeners_for(obj, &change_event(&path)),
        Err(_) => Vec::new(),
    }
}

pub fn before_observers_for(obj: &Object, path: &str) -> Vec<(Option<Object>, MethodRef)> {
    match normalize_path(path) {
        Ok(path) => listeners_for(obj, &before_event(&path)),
        Err(_) => Vec::new(),
    }
}
