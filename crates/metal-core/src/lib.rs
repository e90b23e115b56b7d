#![forbid(unsafe_code)]

//! Metal: property observation, computed properties, listeners and mixins.
//!
//! Objects are handles to a copy-on-write metadata record. Reads and writes
//! go through [`get`] and [`set`]; writes to watched keys announce
//! themselves through [`property_will_change`] / [`property_did_change`],
//! which invalidate dependent computed properties, follow observed paths and
//! deliver `"<key>:before"` / `"<key>:change"` events to listeners.
//!
//! Anything that may touch a global path (`App.user.name`) takes a
//! [`Realm`], the explicit owner of the global namespace.
//!
//! ```
//! use metal_core::{Object, Realm, computed, get, set, Props, Value};
//!
//! let realm = Realm::new();
//! let person = Object::new();
//! let full = computed(|obj, _, _| {
//!     let first = get(obj, "first");
//!     let last = get(obj, "last");
//!     Value::from(format!(
//!         "{} {}",
//!         first.as_str().unwrap_or(""),
//!         last.as_str().unwrap_or("")
//!     ))
//! })
//! .property(["first", "last"])
//! .cacheable(true);
//!
//! realm
//!     .mixin(
//!         &person,
//!         [Props::new()
//!             .value("first", "Ada")
//!             .value("last", "Byron")
//!             .computed("full", full)],
//!     )
//!     .unwrap();
//! assert_eq!(get(&person, "full"), Value::from("Ada Byron"));
//!
//! set(&person, "last", "Lovelace");
//! assert_eq!(get(&person, "full"), Value::from("Ada Lovelace"));
//! ```

pub mod accessors;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod guid;
mod meta;
pub mod method;
pub mod mixin;
pub mod object;
pub mod observer;
pub mod path;
pub mod property_events;
pub mod realm;
pub mod value;
pub mod watching;

pub use accessors::{get, get_value, has_property, set};
pub use config::MetalConfig;
pub use descriptor::{ComputedProperty, Descriptor, alias, computed, required};
pub use error::{MetalError, Result};
pub use events::{
    MethodRef, Transform, add_listener, has_listeners, listeners_for, remove_listener, send_event,
    watched_events,
};
pub use guid::Guid;
pub use method::{Invocation, Method, before_observer, observer};
pub use mixin::{CONCATENATED_PROPERTIES, Mixin, MixinItem, PropValue, Props, mixin_delegate};
pub use object::{Object, ObjectDelegate, WeakObject};
pub use observer::{before_observers_for, observers_for};
pub use path::normalize_path;
pub use property_events::{
    MAX_NOTIFY_DEPTH, before_event, change_event, property_did_change, property_will_change,
};
pub use realm::Realm;
pub use value::{Value, ValueId};
pub use watching::watch_count;
