#![forbid(unsafe_code)]

//! Dynamic values stored in and returned from properties.
//!
//! [`ValueId`] is the identity used by change suppression: two values with
//! equal ids are "the same value" in the strict-equality sense. Primitives
//! compare by value, arrays by allocation, objects and methods by guid.
//! An array id holds its allocation, so the address it compares by cannot
//! be reused while the id is alive.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::guid::Guid;
use crate::method::Method;
use crate::object::Object;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<[Value]>),
    Object(Object),
    Method(Method),
}

/// Hashable identity of a [`Value`].
#[derive(Clone)]
pub enum ValueId {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    String(Rc<str>),
    Array(Rc<[Value]>),
    Ref(Guid),
}

impl ValueId {
    fn array_addr(items: &Rc<[Value]>) -> usize {
        Rc::as_ptr(items).cast::<()>() as usize
    }
}

impl PartialEq for ValueId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Ref(a), Self::Ref(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ValueId {}

impl Hash for ValueId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Undefined | Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Number(n) => n.hash(state),
            Self::String(s) => s.hash(state),
            Self::Array(items) => Self::array_addr(items).hash(state),
            Self::Ref(guid) => guid.hash(state),
        }
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Array(items) => write!(f, "Array({:#x})", Self::array_addr(items)),
            Self::Ref(guid) => f.debug_tuple("Ref").field(guid).finish(),
        }
    }
}

impl Value {
    /// Build an array value.
    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Array(items.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn id(&self) -> ValueId {
        match self {
            Self::Undefined => ValueId::Undefined,
            Self::Null => ValueId::Null,
            Self::Bool(b) => ValueId::Bool(*b),
            Self::Number(n) => ValueId::Number(if *n == 0.0 { 0 } else { n.to_bits() }),
            Self::String(s) => ValueId::String(Rc::clone(s)),
            Self::Array(items) => ValueId::Array(Rc::clone(items)),
            Self::Object(obj) => ValueId::Ref(obj.guid()),
            Self::Method(method) => ValueId::Ref(method.guid()),
        }
    }

    /// Strict identity comparison.
    #[must_use]
    pub fn same(&self, other: &Value) -> bool {
        self.id() == other.id()
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) | Self::Method(_) => true,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_method(&self) -> Option<&Method> {
        match self {
            Self::Method(method) => Some(method),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Wrap a non-array value in a one-element array; `undefined` and `null`
    /// become the empty array.
    #[must_use]
    pub fn into_array(self) -> Rc<[Value]> {
        match self {
            Self::Array(items) => items,
            Self::Undefined | Self::Null => Rc::from(Vec::new()),
            other => Rc::from(vec![other]),
        }
    }

    /// Concatenate two values as arrays.
    #[must_use]
    pub fn concat(&self, tail: &Value) -> Value {
        let mut items: Vec<Value> = self.clone().into_array().to_vec();
        items.extend(tail.clone().into_array().iter().cloned());
        Self::Array(items.into())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            _ => self.id() == other.id(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Object(obj) => write!(f, "<object {}>", obj.guid()),
            Self::Method(method) => write!(f, "<method {}>", method.guid()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Self::String(s)
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Self::Object(obj)
    }
}

impl From<&Object> for Value {
    fn from(obj: &Object) -> Self {
        Self::Object(obj.clone())
    }
}

impl From<Method> for Value {
    fn from(method: Method) -> Self {
        Self::Method(method)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}
