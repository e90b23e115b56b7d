#![forbid(unsafe_code)]

//! Callable property values.
//!
//! A [`Method`] is an immutable, shared function value with a guid. Two
//! pieces of metadata ride along with it:
//!
//! - observer paths (`observing` / `observing_before`), which the mixin
//!   engine turns into observer registrations on the target object;
//! - a link to the implementation it overrides. When a mixin replaces an
//!   existing method, the new one is re-wrapped with [`Method::with_super`]
//!   and [`Invocation::call_super`] walks that link. Chains of any length
//!   are preserved because every link keeps its own predecessor.

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::guid::Guid;
use crate::object::Object;
use crate::value::Value;

type MethodFn = dyn Fn(&Invocation<'_>, &[Value]) -> Value;

pub(crate) type PathList = SmallVec<[Rc<str>; 2]>;

/// Calling context handed to a method body.
pub struct Invocation<'a> {
    this: &'a Object,
    next: Option<&'a Method>,
}

impl<'a> Invocation<'a> {
    /// The receiver.
    #[must_use]
    pub fn this(&self) -> &'a Object {
        self.this
    }

    #[must_use]
    pub fn has_super(&self) -> bool {
        self.next.is_some()
    }

    /// Invoke the overridden implementation on the same receiver. Returns
    /// `undefined` when nothing was overridden.
    pub fn call_super(&self, args: &[Value]) -> Value {
        match self.next {
            Some(next) => next.call(self.this, args),
            None => Value::Undefined,
        }
    }
}

#[derive(Clone)]
struct MethodInner {
    guid: Guid,
    func: Rc<MethodFn>,
    next: Option<Method>,
    observes: PathList,
    observes_before: PathList,
    is_method: bool,
}

#[derive(Clone)]
pub struct Method {
    inner: Rc<MethodInner>,
}

impl Method {
    pub fn new(func: impl Fn(&Invocation<'_>, &[Value]) -> Value + 'static) -> Self {
        Self {
            inner: Rc::new(MethodInner {
                guid: Guid::next(),
                func: Rc::new(func),
                next: None,
                observes: PathList::new(),
                observes_before: PathList::new(),
                is_method: true,
            }),
        }
    }

    #[must_use]
    pub fn guid(&self) -> Guid {
        self.inner.guid
    }

    pub fn call(&self, this: &Object, args: &[Value]) -> Value {
        let invocation = Invocation {
            this,
            next: self.inner.next.as_ref(),
        };
        (self.inner.func)(&invocation, args)
    }

    /// Paths this method observes (after-change).
    #[must_use]
    pub fn observes(&self) -> &[Rc<str>] {
        &self.inner.observes
    }

    /// Paths this method observes before they change.
    #[must_use]
    pub fn observes_before(&self) -> &[Rc<str>] {
        &self.inner.observes_before
    }

    /// Whether the mixin engine may wrap this value with a super link.
    #[must_use]
    pub fn is_method(&self) -> bool {
        self.inner.is_method
    }

    /// The implementation this method overrides, if any.
    #[must_use]
    pub fn super_method(&self) -> Option<&Method> {
        self.inner.next.as_ref()
    }

    #[must_use]
    pub fn observing<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.map_inner(|inner| {
            inner.observes = paths.into_iter().map(|p| Rc::from(p.as_ref())).collect();
        })
    }

    #[must_use]
    pub fn observing_before<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.map_inner(|inner| {
            inner.observes_before = paths.into_iter().map(|p| Rc::from(p.as_ref())).collect();
        })
    }

    /// Mark this function as plain data: it is stored as-is and never
    /// wrapped with a super link.
    #[must_use]
    pub fn not_method(self) -> Self {
        self.map_inner(|inner| inner.is_method = false)
    }

    /// A new method with the same body and observer metadata whose super
    /// link points at `prev`.
    #[must_use]
    pub fn with_super(&self, prev: Method) -> Method {
        Method {
            inner: Rc::new(MethodInner {
                guid: Guid::next(),
                func: Rc::clone(&self.inner.func),
                next: Some(prev),
                observes: self.inner.observes.clone(),
                observes_before: self.inner.observes_before.clone(),
                is_method: self.inner.is_method,
            }),
        }
    }

    fn map_inner(self, f: impl FnOnce(&mut MethodInner)) -> Self {
        let mut inner = Rc::unwrap_or_clone(self.inner);
        f(&mut inner);
        Self {
            inner: Rc::new(inner),
        }
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.guid() == other.guid()
    }
}

impl Eq for Method {}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("guid", &self.inner.guid)
            .field("observes", &self.inner.observes)
            .field("observes_before", &self.inner.observes_before)
            .field("has_super", &self.inner.next.is_some())
            .finish()
    }
}

/// A method that runs whenever one of `paths` changes.
pub fn observer<I, S>(func: impl Fn(&Invocation<'_>, &[Value]) -> Value + 'static, paths: I) -> Method
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Method::new(func).observing(paths)
}

/// A method that runs just before one of `paths` changes.
pub fn before_observer<I, S>(
    func: impl Fn(&Invocation<'_>, &[Value]) -> Value + 'static,
    paths: I,
) -> Method
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Method::new(func).observing_before(paths)
}
