//! Operational error definitions for the incremental optimizer.
//!
//! Broken invariants of the incremental substrate (a method updated after
//! deletion, the `Object` class reported deleted, an unknown parent in
//! incremental mode) are programmer errors and fail fast as panics. The
//! `OptimizeError` type covers the *operational* failures that propagate out
//! of [`update`](crate::IncOptimizer::update): the intra-method optimizer
//! rejecting a malformed body.

use solder_ir::{ClassName, MethodName};
use thiserror::Error;

/// The result type of a single optimizer run.
pub type OptimizeResult<T> = Result<T, OptimizeError>;

/// Operational error raised while optimizing a method body.
#[derive(Error, Debug, Clone)]
pub enum OptimizeError {
    /// The intra-method optimizer found a structurally invalid body.
    #[error("malformed body in {class}::{method}: {message}")]
    MalformedBody {
        /// Owner class of the offending method.
        class: ClassName,
        /// The offending method.
        method: MethodName,
        /// What was wrong with the body.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OptimizeError::MalformedBody {
            class: ClassName::new("LA"),
            method: MethodName::new("m__V"),
            message: "record arity mismatch".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed body in LA::m__V: record arity mismatch"
        );
    }
}
