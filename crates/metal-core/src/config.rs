#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! Defaults suit development and tests. [`MetalConfig::from_env`] layers
//! environment overrides on top of the defaults:
//!
//! - `METAL_ASSERTIONS`: `0`/`false` skips precondition checks such as
//!   dependent-key validation and alias cycle detection (the
//!   production-build mode).
//! - `METAL_ALIAS_HOPS`: how many alias-to-alias hops a mixin application
//!   follows before reporting a cycle.

use std::env;

/// Default bound on alias-to-alias resolution during mixin application.
pub const DEFAULT_MAX_ALIAS_HOPS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetalConfig {
    /// Check preconditions and fail with [`MetalError::Assertion`](crate::MetalError::Assertion).
    pub assertions: bool,
    /// Alias hops followed before an alias chain is reported as a cycle.
    pub max_alias_hops: usize,
}

impl Default for MetalConfig {
    fn default() -> Self {
        Self {
            assertions: true,
            max_alias_hops: DEFAULT_MAX_ALIAS_HOPS,
        }
    }
}

impl MetalConfig {
    /// Defaults overridden by `METAL_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("METAL_ASSERTIONS") {
            config.assertions = parse_flag(&val).unwrap_or(config.assertions);
        }
        if let Ok(val) = env::var("METAL_ALIAS_HOPS")
            && let Ok(n) = val.trim().parse::<usize>()
            && n > 0
        {
            config.max_alias_hops = n;
        }

        config
    }

    #[must_use]
    pub fn with_assertions(mut self, enabled: bool) -> Self {
        self.assertions = enabled;
        self
    }

    #[must_use]
    pub fn with_max_alias_hops(mut self, hops: usize) -> Self {
        self.max_alias_hops = hops.max(1);
        self
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    let val = val.trim();
    if val == "1" || val.eq_ignore_ascii_case("true") || val.eq_ignore_ascii_case("on") {
        Some(true)
    } else if val == "0" || val.eq_ignore_ascii_case("false") || val.eq_ignore_ascii_case("off")
    {
        Some(false)
    } else {
        None
    }
}
