#![forbid(unsafe_code)]

//! Object handles.
//!
//! An [`Object`] is a cheap, clonable handle to shared state: a lazily
//! assigned guid, a metadata record, a destroyed flag and an optional
//! [`ObjectDelegate`] supplying dynamic capabilities. Handles compare by
//! identity.
//!
//! [`Object::extend`] creates a child whose record structurally shares every
//! sub-map with its parent. Prototype lookups never walk a live chain: what
//! the child sees is what the parent had at extension time, and later
//! writes on either side stay private.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::guid::{Guid, LazyGuid};
use crate::meta::Meta;
use crate::value::Value;
use crate::watching;

/// Optional dynamic capabilities of an object.
///
/// Every method has a default that declines, so implementors override only
/// what they support.
pub trait ObjectDelegate {
    /// Fallback for reads that found no stored value. `None` leaves the
    /// result `undefined`.
    fn unknown_property(&self, _obj: &Object, _key: &str) -> Option<Value> {
        None
    }

    /// Intercept a write to a key the object has no slot for. Returning
    /// `false` lets the write fall through to plain storage.
    fn set_unknown_property(&self, _obj: &Object, _key: &str, _value: &Value) -> bool {
        false
    }

    /// Offered every event before registered listeners run.
    fn send_event(&self, _obj: &Object, _event: &str, _args: &[Value]) {}

    fn did_add_listener(&self, _obj: &Object, _event: &str) {}

    fn did_remove_listener(&self, _obj: &Object, _event: &str) {}
}

struct ObjectInner {
    guid: LazyGuid,
    meta: RefCell<Meta>,
    delegate: Option<Rc<dyn ObjectDelegate>>,
    destroyed: Cell<bool>,
    proto: Option<Object>,
}

#[derive(Clone)]
pub struct Object {
    inner: Rc<ObjectInner>,
}

/// Non-owning handle, used for listener targets and chain back-references.
#[derive(Clone)]
pub struct WeakObject {
    inner: Weak<ObjectInner>,
}

impl WeakObject {
    #[must_use]
    pub fn upgrade(&self) -> Option<Object> {
        self.inner.upgrade().map(|inner| Object { inner })
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(obj) => write!(f, "WeakObject({})", obj.guid()),
            None => write!(f, "WeakObject(<dropped>)"),
        }
    }
}

impl Object {
    #[must_use]
    pub fn new() -> Self {
        Self::build(Meta::default(), None, None)
    }

    pub fn with_delegate(delegate: impl ObjectDelegate + 'static) -> Self {
        Self::build(Meta::default(), Some(Rc::new(delegate)), None)
    }

    fn build(meta: Meta, delegate: Option<Rc<dyn ObjectDelegate>>, proto: Option<Object>) -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                guid: LazyGuid::new(),
                meta: RefCell::new(meta),
                delegate,
                destroyed: Cell::new(false),
                proto,
            }),
        }
    }

    /// Create a child sharing this object's metadata copy-on-write. The
    /// delegate is inherited; path chains are re-anchored on the child.
    #[must_use]
    pub fn extend(&self) -> Object {
        let meta = self.meta().inherit();
        let child = Self::build(meta, self.inner.delegate.clone(), Some(self.clone()));
        watching::inherit_chains(self, &child);
        child
    }

    #[must_use]
    pub fn guid(&self) -> Guid {
        self.inner.guid.get()
    }

    /// The object this one was extended from.
    #[must_use]
    pub fn proto(&self) -> Option<&Object> {
        self.inner.proto.as_ref()
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakObject {
        WeakObject {
            inner: Rc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Mark the object destroyed and release its metadata.
    ///
    /// Descriptors are torn down and chains rooted here are unlinked from
    /// the objects they pass through, then the record is replaced with an empty one, which drops stored
    /// values and breaks any reference cycles through them. Idempotent.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        tracing::debug!(message = "object.destroy", guid = %self.guid());
        let descs: Vec<_> = self
            .meta()
            .descs
            .iter()
            .map(|(key, desc)| (Rc::clone(key), desc.clone()))
            .collect();
        for (key, desc) in descs {
            desc.teardown(self, &key);
        }
        watching::teardown_chains(self);
        let released = std::mem::take(&mut *self.meta_mut());
        drop(released);
    }

    pub(crate) fn delegate(&self) -> Option<Rc<dyn ObjectDelegate>> {
        self.inner.delegate.clone()
    }

    pub(crate) fn meta(&self) -> Ref<'_, Meta> {
        self.inner.meta.borrow()
    }

    pub(crate) fn meta_mut(&self) -> RefMut<'_, Meta> {
        self.inner.meta.borrow_mut()
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("guid", &self.guid())
            .field("destroyed", &self.is_destroyed())
            .field("has_proto", &self.inner.proto.is_some())
            .finish()
    }
}
