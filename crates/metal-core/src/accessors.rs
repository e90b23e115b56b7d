#![forbid(unsafe_code)]

//! Property reads and writes.
//!
//! [`get`] and [`set`] are the entry points every other layer funnels
//! through. A key with an installed descriptor delegates to it; any other
//! key is a plain stored value. Plain writes to a watched key emit
//! will/did change notifications unless the new value is identical to the
//! stored one.

use crate::meta::Key;
use crate::object::Object;
use crate::property_events::{property_did_change, property_will_change};
use crate::value::Value;

/// Read `key` from `obj`.
///
/// Falls back to the delegate's `unknown_property` when nothing is stored.
pub fn get(obj: &Object, key: &str) -> Value {
    let desc = obj.meta().descs.get(key).cloned();
    if let Some(desc) = desc {
        return desc.get(obj, key);
    }

    let value = raw_value(obj, key);
    if value.is_undefined()
        && let Some(delegate) = obj.delegate()
        && let Some(found) = delegate.unknown_property(obj, key)
    {
        return found;
    }
    value
}

/// Read `key` from any value. Non-objects have no properties.
pub fn get_value(target: &Value, key: &str) -> Value {
    match target {
        Value::Object(obj) => get(obj, key),
        _ => Value::Undefined,
    }
}

/// Write `value` to `key` on `obj`, returning the value passed in.
///
/// When the object has no slot for `key`, its delegate's
/// `set_unknown_property` may claim the write.
pub fn set(obj: &Object, key: &str, value: impl Into<Value>) -> Value {
    let value = value.into();
    let desc = obj.meta().descs.get(key).cloned();
    if let Some(desc) = desc {
        desc.set(obj, key, value.clone());
        return value;
    }

    if !has_property(obj, key)
        && let Some(delegate) = obj.delegate()
        && delegate.set_unknown_property(obj, key, &value)
    {
        return value;
    }

    write_plain(obj, key, value.clone());
    value
}

/// Whether `obj` has an own or inherited slot for `key`.
#[must_use]
pub fn has_property(obj: &Object, key: &str) -> bool {
    let meta = obj.meta();
    meta.descs.contains_key(key) || meta.values.contains_key(key)
}

/// The stored value for `key`, bypassing descriptors and delegates.
pub(crate) fn raw_value(obj: &Object, key: &str) -> Value {
    obj.meta().values.get(key).cloned().unwrap_or_default()
}

/// Store a plain value, notifying watchers of the change.
pub(crate) fn write_plain(obj: &Object, key: &str, value: Value) {
    if obj.is_destroyed() {
        tracing::trace!(message = "set.destroyed", guid = %obj.guid(), key);
        return;
    }

    let watched = obj.meta().watch_count(key) > 0;
    if !watched {
        obj.meta_mut().values_mut().insert(Key::from(key), value);
        return;
    }

    if raw_value(obj, key).same(&value) && has_property(obj, key) {
        return;
    }

    property_will_change(obj, key);
    obj.meta_mut().values_mut().insert(Key::from(key), value);
    property_did_change(obj, key);
}
