#![forbid(unsafe_code)]

//! The explicit global root.
//!
//! Paths whose first segment is capitalized (`App.user.name`) resolve
//! against a namespace instead of the object passed in. A [`Realm`] owns
//! that namespace object plus the engine configuration, and is the receiver
//! for every operation that may need either: path evaluation, watching,
//! observers and mixin application.
//!
//! Realms are cheap to clone; clones share the same globals object.

use crate::accessors::get;
use crate::config::MetalConfig;
use crate::error::{MetalError, Result};
use crate::object::{Object, WeakObject};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Realm {
    globals: Object,
    config: MetalConfig,
}

impl Realm {
    /// A realm with an empty namespace and default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_globals(Object::new())
    }

    #[must_use]
    pub fn with_globals(globals: Object) -> Self {
        Self {
            globals,
            config: MetalConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: MetalConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn globals(&self) -> &Object {
        &self.globals
    }

    #[must_use]
    pub fn config(&self) -> &MetalConfig {
        &self.config
    }

    /// Read a top-level namespace entry.
    pub fn get_global(&self, key: &str) -> Value {
        get(&self.globals, key)
    }

    /// Fail with an assertion error when `cond` is false and assertions are
    /// enabled.
    pub(crate) fn check(&self, cond: bool, message: impl FnOnce() -> String) -> Result<()> {
        if self.config.assertions && !cond {
            return Err(MetalError::assertion(message()));
        }
        Ok(())
    }
}

/// A realm handle that does not keep the globals alive. Stored inside
/// listeners so an object observing a global path does not form a cycle
/// with the namespace that holds it.
#[derive(Debug, Clone)]
pub(crate) struct WeakRealm {
    globals: WeakObject,
    config: MetalConfig,
}

impl WeakRealm {
    /// The realm this handle came from, or a fresh one with the same configuration when
    /// its globals are gone.
    pub(crate) fn upgrade(&self) -> Realm {
        match self.globals.upgrade() {
            Some(globals) => Realm {
                globals,
                config: self.config,
            },
            None => Realm::new().with_config(self.config),
        }
    }
}

impl Realm {
    pub(crate) fn downgrade(&self) -> WeakRealm {
        WeakRealm {
            globals: self.globals.downgrade(),
            config: self.config,
        }
    }
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}
