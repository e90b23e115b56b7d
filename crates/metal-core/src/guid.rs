#![forbid(unsafe_code)]

//! Process-unique identifiers for objects, methods and mixins.

use std::cell::OnceCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GUID: AtomicU64 = AtomicU64::new(1);

/// Stable identifier used as a map key wherever identity matters
/// (listener indexing, dependency indexing, change suppression).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid(u64);

impl Guid {
    /// Allocate a fresh guid.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_GUID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sc{}", self.0)
    }
}

/// A guid assigned on first use.
#[derive(Debug, Default)]
pub(crate) struct LazyGuid(OnceCell<Guid>);

impl LazyGuid {
    pub(crate) const fn new() -> Self {
        Self(OnceCell::new())
    }

    pub(crate) fn get(&self) -> Guid {
        *self.0.get_or_init(Guid::next)
    }
}
