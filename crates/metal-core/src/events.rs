#![forbid(unsafe_code)]

//! Listener registry and event dispatch.
//!
//! Listeners are stored per object, per event name, one slot per
//! `(target, method)` pair. Registering the same pair again only replaces
//! its transform. Removal clears the slot in place; cleared slots are
//! treated as absent everywhere.
//!
//! Listeners receive `[sender, event, ...args]`. A listener without an
//! explicit target runs with the sender as `this`. A transform, when
//! present, is handed `(target, method, params)` and decides how (and
//! whether) to call the method; observers use this to reshape event
//! parameters.

use std::fmt;
use std::rc::Rc;

use crate::accessors::get;
use crate::guid::Guid;
use crate::method::Method;
use crate::object::{Object, WeakObject};
use crate::value::Value;

/// Rewrites a dispatch: receives the resolved target, the method and the
/// full event parameters.
pub type Transform = Rc<dyn Fn(&Object, &Method, &[Value])>;

/// A listener callback: a method value, or a property name resolved on the
/// target at dispatch time.
#[derive(Clone, PartialEq, Eq)]
pub enum MethodRef {
    Method(Method),
    Name(Rc<str>),
}

impl MethodRef {
    fn key(&self) -> MethodKey {
        match self {
            Self::Method(method) => MethodKey::Guid(method.guid()),
            Self::Name(name) => MethodKey::Name(Rc::clone(name)),
        }
    }
}

impl fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method(method) => write!(f, "{method:?}"),
            Self::Name(name) => write!(f, "{name:?}"),
        }
    }
}

impl From<Method> for MethodRef {
    fn from(method: Method) -> Self {
        Self::Method(method)
    }
}

impl From<&Method> for MethodRef {
    fn from(method: &Method) -> Self {
        Self::Method(method.clone())
    }
}

impl From<&str> for MethodRef {
    fn from(name: &str) -> Self {
        Self::Name(Rc::from(name))
    }
}

#[derive(Clone, PartialEq, Eq)]
enum MethodKey {
    Guid(Guid),
    Name(Rc<str>),
}

#[derive(Clone)]
struct Listener {
    target: Option<WeakObject>,
    method: MethodRef,
    transform: Option<Transform>,
}

impl Listener {
    /// The object the listener runs on, or `None` when its target is gone.
    fn resolve_target(&self, sender: &Object) -> Option<Object> {
        match &self.target {
            Some(target) => target.upgrade(),
            None => Some(sender.clone()),
        }
    }

    fn is_live(&self) -> bool {
        self.target.as_ref().is_none_or(|t| t.upgrade().is_some())
    }
}

#[derive(Clone)]
pub(crate) struct ListenerSlot {
    target: Option<Guid>,
    method: MethodKey,
    listener: Option<Listener>,
}

impl ListenerSlot {
    fn matches(&self, target: Option<Guid>, method: &MethodKey) -> bool {
        self.target == target && self.method == *method
    }

    fn live(&self) -> Option<&Listener> {
        self.listener.as_ref().filter(|l| l.is_live())
    }
}

pub(crate) type ListenerSet = Vec<ListenerSlot>;

/// Register `method` for `event` on `obj`.
///
/// `target` is the `this` the method runs on; `None` means the sender.
pub fn add_listener(
    obj: &Object,
    event: &str,
    target: Option<&Object>,
    method: impl Into<MethodRef>,
    transform: Option<Transform>,
) {
    let method = method.into();
    let key = method.key();
    let target_guid = target.map(Object::guid);
    let listener = Listener {
        target: target.map(Object::downgrade),
        method,
        transform,
    };

    {
        let mut meta = obj.meta_mut();
        let set = meta.listener_set_mut(event);
        match set.iter_mut().find(|slot| slot.matches(target_guid, &key)) {
            Some(ListenerSlot {
                listener: Some(existing),
                ..
            }) => existing.transform = listener.transform,
            Some(slot) => slot.listener = Some(listener),
            None => set.push(ListenerSlot {
                target: target_guid,
                method: key,
                listener: Some(listener),
            }),
        }
    }

    tracing::trace!(message = "listener.add", guid = %obj.guid(), event);
    if let Some(delegate) = obj.delegate() {
        delegate.did_add_listener(obj, event);
    }
}

/// Unregister `method` for `event` on `obj`. Unknown pairs are ignored.
pub fn remove_listener(
    obj: &Object,
    event: &str,
    target: Option<&Object>,
    method: impl Into<MethodRef>,
) {
    let key = method.into().key();
    let target_guid = target.map(Object::guid);

    let registered = obj.meta().listeners.get(event).is_some_and(|set| {
        set.iter()
            .any(|slot| slot.matches(target_guid, &key) && slot.listener.is_some())
    });
    if registered {
        let mut meta = obj.meta_mut();
        if let Some(slot) = meta
            .listener_set_mut(event)
            .iter_mut()
            .find(|slot| slot.matches(target_guid, &key))
        {
            slot.listener = None;
        }
    }

    tracing::trace!(message = "listener.remove", guid = %obj.guid(), event, registered);
    if let Some(delegate) = obj.delegate() {
        delegate.did_remove_listener(obj, event);
    }
}

/// Dispatch `event` on `obj`.
///
/// The object's delegate sees the event first; registered listeners run
/// regardless. Listeners added or removed while dispatching take effect on
/// the next dispatch. Returns whether any listener ran.
pub fn send_event(obj: &Object, event: &str, args: &[Value]) -> bool {
    if let Some(delegate) = obj.delegate() {
        delegate.send_event(obj, event, args);
    }

    let set = obj.meta().listeners.get(event).cloned();
    let Some(set) = set else {
        return false;
    };

    let mut params = Vec::with_capacity(args.len() + 2);
    params.push(Value::Object(obj.clone()));
    params.push(Value::from(event));
    params.extend_from_slice(args);

    let mut invoked = false;
    for listener in set.iter().filter_map(|slot| slot.listener.as_ref()) {
        let Some(target) = listener.resolve_target(obj) else {
            continue;
        };
        let method = match &listener.method {
            MethodRef::Method(method) => method.clone(),
            MethodRef::Name(name) => match get(&target, name) {
                Value::Method(method) => method,
                _ => {
                    tracing::warn!(
                        message = "listener.unresolved",
                        guid = %obj.guid(),
                        event,
                        method = %name
                    );
                    continue;
                }
            },
        };

        invoked = true;
        match &listener.transform {
            Some(transform) => transform(&target, &method, &params),
            None => {
                method.call(&target, &params);
            }
        }
    }
    invoked
}

/// Whether `event` has a live listener on `obj`. An event whose slots are
/// all cleared is dropped from the registry.
pub fn has_listeners(obj: &Object, event: &str) -> bool {
    let live = obj
        .meta()
        .listeners
        .get(event)
        .map(|set| set.iter().any(|slot| slot.live().is_some()));
    match live {
        Some(true) => true,
        Some(false) => {
            obj.meta_mut().listeners_mut().remove(event);
            false
        }
        None => false,
    }
}

/// Live `(target, method)` pairs registered for `event`.
pub fn listeners_for(obj: &Object, event: &str) -> Vec<(Option<Object>, MethodRef)> {
    let meta = obj.meta();
    let Some(set) = meta.listeners.get(event) else {
        return Vec::new();
    };
    set.iter()
        .filter_map(ListenerSlot::live)
        .map(|l| {
            let target = l.target.as_ref().and_then(WeakObject::upgrade);
            (target, l.method.clone())
        })
        .collect()
}

/// Names of events with at least one live listener.
pub fn watched_events(obj: &Object) -> Vec<String> {
    let meta = obj.meta();
    let mut events: Vec<String> = meta
        .listeners
        .iter()
        .filter(|(_, set)| set.iter().any(|slot| slot.live().is_some()))
        .map(|(event, _)| event.to_string())
        .collect();
    events.sort();
    events
}
