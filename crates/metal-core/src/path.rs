#![forbid(unsafe_code)]

//! Property paths.
//!
//! A path is a dotted chain of keys (`user.address.city`) evaluated by
//! repeated [`get`](crate::get). Three extra forms are recognized:
//!
//! - a leading `.` or `*` is shorthand for `this.` (`.foo`, `*foo`);
//! - a `*` inside the path (`content*length`) splits it in two: the left
//!   side is resolved once to pick the target, the right side is the path
//!   relative to that target;
//! - a first segment starting with an uppercase letter or `$` (optionally
//!   after one digit) names a global, looked up on [`Realm::globals`]
//!   instead of the root passed in.
//!
//! # Failure Modes
//!
//! Malformed paths (empty, or with nothing left after target resolution)
//! fail with [`MetalError::PathResolution`]. Reads never fail on missing or
//! destroyed intermediates: they yield `undefined`. Writes fail unless made
//! through [`Realm::try_set_path`], which logs and skips instead.

use std::borrow::Cow;

use crate::accessors::{get_value, set};
use crate::error::{MetalError, Result};
use crate::object::Object;
use crate::realm::Realm;
use crate::value::Value;

/// Rewrite the `.foo` and `*foo` shorthands to `this.foo`.
///
/// ```
/// use metal_core::normalize_path;
///
/// assert_eq!(normalize_path(".foo").unwrap(), "this.foo");
/// assert_eq!(normalize_path("*foo").unwrap(), "this.foo");
/// assert_eq!(normalize_path("foo.bar").unwrap(), "foo.bar");
/// assert_eq!(normalize_path("*").unwrap(), "*");
/// ```
pub fn normalize_path(path: &str) -> Result<Cow<'_, str>> {
    if path.is_empty() {
        return Err(MetalError::invalid_path(path, "path must not be empty"));
    }
    if path == "*" {
        return Ok(Cow::Borrowed(path));
    }
    if path.starts_with('.') {
        return Ok(Cow::Owned(format!("this{path}")));
    }
    if let Some(rest) = path.strip_prefix('*')
        && !rest.starts_with('.')
    {
        return Ok(Cow::Owned(format!("this.{rest}")));
    }
    Ok(Cow::Borrowed(path))
}

/// Length of a global-name prefix (`A`, `$`, `1A`), if the path has one.
fn global_prefix_len(path: &str) -> Option<usize> {
    let bytes = path.as_bytes();
    let is_upper = |b: u8| b.is_ascii_uppercase() || b == b'$';
    match bytes {
        [first, ..] if is_upper(*first) => Some(1),
        [digit, second, ..] if digit.is_ascii_digit() && is_upper(*second) => Some(2),
        _ => None,
    }
}

/// Starts with a global name. Used for writes, where a bare global is
/// never a valid target.
pub(crate) fn starts_global(path: &str) -> bool {
    global_prefix_len(path).is_some()
}

/// A global name followed by a `.` or `*` somewhere later.
pub(crate) fn is_global_path(path: &str) -> bool {
    global_prefix_len(path).is_some_and(|n| path[n..].contains(['.', '*']))
}

pub(crate) fn has_this(path: &str) -> bool {
    path.starts_with("this.") || path.starts_with("this*")
}

fn first_key(path: &str) -> &str {
    path.split(['.', '*']).next().unwrap_or("")
}

/// Index of a `*` that splits a path into target and remainder.
pub(crate) fn star_split(path: &str) -> Option<usize> {
    match path.find('*') {
        Some(idx) if idx > 0 && path.as_bytes()[idx - 1] != b'.' => Some(idx),
        _ => None,
    }
}

/// Walk a normalized path from `target`. A `*` segment keeps the current
/// value; a destroyed object along the way ends the walk with `undefined`.
pub(crate) fn walk(target: Value, path: &str) -> Value {
    if let Some(idx) = star_split(path) {
        let left = walk(target, &path[..idx]);
        return walk(left, &path[idx + 1..]);
    }

    let mut current = target;
    let mut rest = path;
    while current.truthy() && !rest.is_empty() {
        let (key, tail) = rest.split_once('.').unwrap_or((rest, ""));
        if key != "*" {
            current = get_value(&current, key);
        }
        if current.as_object().is_some_and(Object::is_destroyed) {
            return Value::Undefined;
        }
        rest = tail;
    }
    current
}

impl Realm {
    /// Resolve the object a path is really relative to.
    ///
    /// Global paths move the target to the named global, `this.` is
    /// stripped, and a splitting `*` resolves its left side. The returned
    /// path is what remains to be evaluated on the returned target.
    pub fn normalize_tuple(
        &self,
        target: Option<&Object>,
        path: &str,
    ) -> Result<(Option<Object>, String)> {
        let path = normalize_path(path)?;
        self.resolve_tuple(target, &path)
    }

    /// [`Realm::normalize_tuple`] for an already normalized path.
    pub(crate) fn resolve_tuple(
        &self,
        target: Option<&Object>,
        path: &str,
    ) -> Result<(Option<Object>, String)> {
        let this = has_this(path);
        let global = !this && is_global_path(path);

        let target = match target {
            Some(obj) if !global => obj.clone(),
            _ => self.globals().clone(),
        };
        let mut rest = if this { &path["this.".len()..] } else { path };

        let resolved = if let Some(idx) = star_split(rest) {
            let left = &rest[..idx];
            rest = &rest[idx + 1..];
            walk(Value::Object(target), left).as_object().cloned()
        } else if target == *self.globals() {
            let key = first_key(rest);
            let found = get_value(&Value::Object(target), key).as_object().cloned();
            rest = rest.get(key.len() + 1..).unwrap_or("");
            found
        } else {
            Some(target)
        };

        if rest.is_empty() {
            return Err(MetalError::invalid_path(path, "nothing left to resolve"));
        }
        Ok((resolved, rest.to_string()))
    }

    /// Evaluate `path` from `root`, or from the globals when `root` is
    /// `None`.
    pub fn get_path(&self, root: Option<&Object>, path: &str) -> Result<Value> {
        let has_star = path.contains('*');
        if root.is_none() && !has_star && !path.contains('.') {
            return Ok(self.get_global(path));
        }

        let path = normalize_path(path)?;
        let this = has_this(&path);
        let global = !this && is_global_path(&path);

        match root {
            Some(root) if !this && !global && !has_star => Ok(walk(Value::from(root), &path)),
            _ => {
                let (target, rest) = self.resolve_tuple(root, &path)?;
                Ok(target.map_or(Value::Undefined, |t| walk(Value::Object(t), &rest)))
            }
        }
    }

    /// Set the property at the end of `path`, returning the value.
    ///
    /// Fails when the path is malformed, ends in `*`, or an object along
    /// the way is missing or destroyed.
    pub fn set_path(&self, root: Option<&Object>, path: &str, value: impl Into<Value>) -> Result<Value> {
        self.set_path_inner(root, path, value.into(), false)
    }

    /// Like [`Realm::set_path`], but a missing or destroyed object along
    /// the path makes the write a no-op. Malformed paths still fail.
    pub fn try_set_path(
        &self,
        root: Option<&Object>,
        path: &str,
        value: impl Into<Value>,
    ) -> Result<Value> {
        self.set_path_inner(root, path, value.into(), true)
    }

    fn set_path_inner(
        &self,
        root: Option<&Object>,
        path: &str,
        value: Value,
        tolerant: bool,
    ) -> Result<Value> {
        let mut path = normalize_path(path)?.into_owned();
        let mut root = root.cloned();

        if path.find('*').is_some_and(|idx| idx > 0) {
            let (target, rest) = self.resolve_tuple(root.as_ref(), &path)?;
            root = target;
            path = rest;
        }

        let key = match path.find('.') {
            Some(dot) if dot > 0 => {
                let last = path.rfind('.').unwrap_or(dot);
                let prefix = &path[..last];
                if !has_this(prefix) && starts_global(prefix) && !prefix.contains('.') {
                    root = self.get_global(prefix).as_object().cloned();
                } else if prefix != "this" {
                    root = self.get_path(root.as_ref(), prefix)?.as_object().cloned();
                }
                &path[last + 1..]
            }
            _ => {
                if starts_global(&path) {
                    return Err(MetalError::invalid_path(&path, "cannot set a bare global"));
                }
                path.as_str()
            }
        };

        if key.is_empty() || key == "*" {
            return Err(MetalError::invalid_path(&path, "final key must be a property name"));
        }

        match root {
            Some(root) if !root.is_destroyed() => Ok(set(&root, key, value)),
            _ if tolerant => {
                tracing::warn!(message = "path.set_skipped", path = %path, key);
                Ok(Value::Undefined)
            }
            _ => Err(MetalError::invalid_path(
                &path,
                "object in path could not be found or was destroyed",
            )),
        }
    }
}
