//! Construction-time errors.
//!
//! These are raised while a method or block is being declared and
//! resolved. A method that produced one of them is never handed to the
//! runtime.

use crate::SourceCoordinate;
use thiserror::Error;

/// An error in the definition of a method or block.
///
/// # Examples
///
/// ```
/// use core_types::{ProgramDefinitionError, SourceCoordinate};
///
/// let error = ProgramDefinitionError::UnresolvedVariable {
///     name: "counter".to_string(),
///     coord: SourceCoordinate::new(4, 2),
/// };
/// assert_eq!(error.to_string(), "undefined variable 'counter' at 4:2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramDefinitionError {
    /// The receiver argument was not the first argument declared
    #[error("the self argument always has to be the first argument of a method (got '{name}')")]
    SelfNotFirstArgument {
        /// Name of the offending argument
        name: String,
    },

    /// An argument name was declared twice in one scope
    #[error("argument '{name}' declared twice at {coord}")]
    DuplicateArgument {
        /// Argument name
        name: String,
        /// Position of the second declaration
        coord: SourceCoordinate,
    },

    /// A local name was declared twice in one scope
    #[error("local '{name}' declared twice at {coord}")]
    DuplicateLocal {
        /// Local name
        name: String,
        /// Position of the second declaration
        coord: SourceCoordinate,
    },

    /// A variable access did not resolve in any enclosing scope
    #[error("undefined variable '{name}' at {coord}")]
    UnresolvedVariable {
        /// Name that failed to resolve
        name: String,
        /// Position of the access
        coord: SourceCoordinate,
    },

    /// A declaration was attempted after the scope was frozen
    #[error("scope of '{owner}' is frozen; no further declarations allowed")]
    ScopeFrozen {
        /// Name of the method or block that owns the scope
        owner: String,
    },

    /// An assignment targeted an argument
    #[error("argument '{name}' is not assignable (at {coord})")]
    ArgumentNotAssignable {
        /// Argument name
        name: String,
        /// Position of the assignment
        coord: SourceCoordinate,
    },

    /// A send or method signature disagrees with its selector's arity
    #[error("selector '{selector}' expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        /// Selector text
        selector: String,
        /// Arity implied by the selector
        expected: usize,
        /// Number of arguments supplied
        actual: usize,
    },

    /// A field index lies outside the holder class's instance fields
    #[error("class '{class}' has no field at index {index}")]
    UnknownField {
        /// Class name
        class: String,
        /// Requested index
        index: usize,
    },

    /// A method-level return was used somewhere other than as a statement
    #[error("'^' in {owner} must be a statement of the method body")]
    MisplacedReturn {
        /// Method in which the return was built
        owner: String,
    },

    /// A block declared more parameters than any block class accepts
    #[error("block in {owner} declares {count} parameters; at most {max} are supported")]
    TooManyBlockParameters {
        /// Method in which the block was opened
        owner: String,
        /// Declared parameter count
        count: usize,
        /// Supported maximum
        max: usize,
    },

    /// An instance field was added to a class that has subclasses
    #[error("cannot add field '{field}' to '{class}' while subclass '{subclass}' exists")]
    FieldAddedAboveSubclass {
        /// Class that was to grow the field
        class: String,
        /// Field name
        field: String,
        /// One live subclass
        subclass: String,
    },
}
