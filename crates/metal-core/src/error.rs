#![forbid(unsafe_code)]

//! Error taxonomy for the metal layer.
//!
//! Every failure here is a programmer error surfaced synchronously to the
//! caller. Nothing is retried; the only tolerated failure is a path set in
//! tolerant mode, which never constructs an error at all.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetalError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetalError {
    /// Malformed, empty or wildcard-terminal path, or an intermediate object
    /// that was missing or destroyed during a non-tolerant set.
    #[error("invalid path '{path}': {reason}")]
    PathResolution { path: String, reason: String },

    /// Required properties left unsatisfied after a full mixin application.
    #[error("required properties not defined: {}", keys.join(","))]
    Composition { keys: Vec<String> },

    /// A violated precondition (for example a malformed dependent key).
    #[error("assertion failed: {message}")]
    Assertion { message: String },
}

impl MetalError {
    #[must_use]
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathResolution {
            path: path.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn composition<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Composition {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Keys named by a composition failure; empty for other variants.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        match self {
            Self::Composition { keys } => keys,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composition_lists_every_key() {
        let err = MetalError::composition(["willApplyProperty", "didApplyProperty"]);
        assert_eq!(
            err.to_string(),
            "required properties not defined: willApplyProperty,didApplyProperty"
        );
        assert_eq!(err.keys().len(), 2);
    }

    #[test]
    fn path_error_names_the_path() {
        let err = MetalError::invalid_path("a.b.*", "final key may not be '*'");
        assert!(err.to_string().contains("a.b.*"));
        assert!(err.keys().is_empty());
    }
}
