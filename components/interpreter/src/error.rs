//! Runtime errors and the unwinding channel.
//!
//! Every node's `execute` returns [`ExecResult`]. The error side is an
//! [`Unwind`]: either a non-local return travelling towards its home
//! activation, or a [`RuntimeError`]. Both propagate with `?`, which is
//! what lets a non-local return skip the rest of every intervening frame.

use core_types::Symbol;
use thiserror::Error;

use crate::nonlocal::NonLocalReturn;
use crate::value::Value;

/// Result of evaluating a node or invoking a method
pub type ExecResult = Result<Value, Unwind>;

/// Errors raised while running guest code
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// No method for the selector and no `doesNotUnderstand:arguments:`
    #[error("{class} does not understand #{selector}")]
    DoesNotUnderstand {
        /// Selector that was sent
        selector: Symbol,
        /// Name of the receiver's class
        class: Symbol,
    },

    /// A block tried to return from an activation that already returned
    #[error("non-local return escaped: home activation of #{home} is no longer on the stack")]
    NonLocalReturnEscaped {
        /// Signature of the method the block tried to return from
        home: Symbol,
    },

    /// An activation chain or frame slot did not have the expected shape
    #[error("frame integrity violated: {0}")]
    FrameIntegrity(String),

    /// A global read found no binding
    #[error("unknown global '{name}'")]
    UnknownGlobal {
        /// Global name
        name: Symbol,
    },

    /// An operand had the wrong kind
    #[error("expected {expected}, got {actual}")]
    TypeMismatch {
        /// Description of what was required
        expected: &'static str,
        /// Kind of value actually supplied
        actual: &'static str,
    },

    /// Index outside of an array or field range
    #[error("index {index} out of bounds for size {size}")]
    IndexOutOfBounds {
        /// Requested index
        index: i64,
        /// Valid size
        size: usize,
    },

    /// Method invoked with an argument count that disagrees with its signature
    #[error("#{selector} expects {expected} argument(s) including the receiver, got {actual}")]
    WrongArgumentCount {
        /// Signature of the invoked method
        selector: Symbol,
        /// Required count, including the receiver
        expected: usize,
        /// Supplied count, including the receiver
        actual: usize,
    },

    /// Failure inside a primitive
    #[error("primitive failed: {0}")]
    Primitive(String),
}

impl RuntimeError {
    /// Whether this error indicates a broken runtime invariant rather than
    /// a condition guest code could recover from
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RuntimeError::NonLocalReturnEscaped { .. } | RuntimeError::FrameIntegrity(_)
        )
    }
}

/// Abrupt completion of an evaluation
#[derive(Debug, Clone)]
pub enum Unwind {
    /// Non-local return searching for its home activation
    NonLocalReturn(NonLocalReturn),
    /// Runtime error
    Error(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(err: RuntimeError) -> Self {
        Unwind::Error(err)
    }
}

/// Outcome of a guard whose underlying layout has been superseded
///
/// Distinct from a plain mismatch: the cache entry holding the guard can
/// never match again and must be excised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("guard invalidated: receiver layout was superseded")]
pub struct GuardInvalidated;
