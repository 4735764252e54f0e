//! Shared vocabulary types for the Sable interpreter core.
//!
//! This crate provides the leaf types every other component agrees on:
//! interned selectors, source coordinates used for variable identity,
//! construction-time errors and the optimization toggles that steer
//! call-site specialization.
//!
//! # Overview
//!
//! - [`Symbol`] - Interned selector/identifier with identity equality
//! - [`SymbolTable`] - Thread-safe interning table
//! - [`SourceCoordinate`] - Declaration position of a variable or node
//! - [`ProgramDefinitionError`] - Errors raised while building methods
//! - [`OptimizationFlags`] - Immutable configuration of the optimizer
//!
//! # Examples
//!
//! ```
//! use core_types::{OptimizationFlags, SymbolTable};
//!
//! let symbols = SymbolTable::new();
//! let at_put = symbols.intern("at:put:");
//! assert_eq!(at_put.arity(), 2);
//! assert_eq!(at_put, symbols.intern("at:put:"));
//!
//! let flags = OptimizationFlags::default();
//! assert_eq!(flags.inline_cache_size, 6);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod flags;
mod source;
mod symbol;

pub use error::ProgramDefinitionError;
pub use flags::{OptimizationFlags, DEFAULT_INLINE_CACHE_SIZE, MAX_INLINE_CACHE_SIZE};
pub use source::SourceCoordinate;
pub use symbol::{Symbol, SymbolTable};
