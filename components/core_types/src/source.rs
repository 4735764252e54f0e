//! Source coordinates for declarations and nodes.
//!
//! The front end attaches a coordinate to every declared variable. Two
//! declarations with the same name are still distinct variables when their
//! coordinates differ, so the coordinate is part of variable identity.

use std::fmt;

/// Represents a position in source code.
///
/// # Examples
///
/// ```
/// use core_types::SourceCoordinate;
///
/// let coord = SourceCoordinate::new(10, 5);
/// assert_eq!(coord.line, 10);
/// assert_eq!(coord.to_string(), "10:5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SourceCoordinate {
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
}

impl SourceCoordinate {
    /// Create a coordinate from a line and column
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Coordinate used for synthetic declarations that have no source text
    pub const fn synthetic() -> Self {
        Self { line: 0, column: 0 }
    }

    /// Whether this coordinate marks a synthetic declaration
    pub fn is_synthetic(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for SourceCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
