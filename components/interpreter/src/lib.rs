//! Self-optimizing AST interpreter for a SOM-style Smalltalk
//!
//! This crate provides the execution core of the language:
//! - Message sends through per-call-site inline caches that move from
//!   uninitialized to monomorphic, polymorphic and finally generic dispatch
//! - Trivial-method inlining of getters, setters and constant methods
//! - Lexical scopes with context levels and compile-time block inlining
//! - Activations, blocks and the non-local-return protocol
//! - Eager specialization of arithmetic and comparison sends
//!
//! # Example
//!
//! ```
//! use interpreter::{MethodCompiler, Value, VM};
//!
//! let vm = VM::new();
//! let point = vm.define_class("Point", None, &["x"]);
//!
//! // x  ^ x
//! let mut c = MethodCompiler::method(&vm, &point, "x", &[]).unwrap();
//! let x = c.read("x").unwrap();
//! c.install_returning(vec![], x).unwrap();
//!
//! let p = vm.new_instance(&point);
//! p.as_object().unwrap().set_field(0, Value::Integer(3)).unwrap();
//! assert_eq!(vm.send(p, "x", vec![]).unwrap(), Value::Integer(3));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod block;
pub mod class;
pub mod compiler;
pub mod dispatch;
pub mod eager;
pub mod error;
pub mod frame;
pub mod guard;
pub mod inline_cache;
mod inlining;
pub mod method;
pub mod nonlocal;
pub mod numeric;
pub mod object;
pub mod primitives;
pub mod scope;
pub mod universe;
pub mod value;
pub mod vm;

// Re-export main types at crate root
pub use ast::{BlockLiteral, Expr, GlobalRead, MessageSend, SuperSend, SuperTarget};
pub use block::SBlock;
pub use class::SClass;
pub use compiler::{MethodCompiler, MAX_BLOCK_PARAMETERS};
pub use dispatch::{CallSite, Dispatched, EagerState};
pub use eager::{ArithmeticSpecializer, EagerSpecializer, SpecializedSend};
pub use error::{ExecResult, GuardInvalidated, RuntimeError, Unwind};
pub use frame::{Activation, FrameDescriptor, SlotKind};
pub use guard::DispatchGuard;
pub use inline_cache::{CacheChain, CacheEntry, CacheState, CachedAction, EntryKind};
pub use method::{Method, MethodBody, PrimitiveFn, TrivialExpr, TrivialValue};
pub use nonlocal::{FrameOnStackMarker, NonLocalReturn};
pub use object::{ObjectLayout, SArray, SObject};
pub use scope::{ScopeArena, ScopeId};
pub use universe::CoreClasses;
pub use value::Value;
pub use vm::{GlobalBinding, VM};

pub use core_types::{OptimizationFlags, ProgramDefinitionError, SourceCoordinate, Symbol};
