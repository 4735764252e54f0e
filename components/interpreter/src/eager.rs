//! Eager send specializations.
//!
//! Before a send site builds its first cache entry it asks the registered
//! [`EagerSpecializer`]s whether the send looks like an operator with a
//! native fast path. A specializer that recognizes the selector and the
//! operand shapes returns a [`SpecializedSend`], which the site then runs
//! in place of its inline cache. When a later send brings operands the
//! node cannot handle, the node declines and the site falls back to its
//! inline cache for good.

use core_types::Symbol;
use std::fmt;
use std::sync::Arc;

use crate::error::ExecResult;
use crate::numeric::{self, ArithOp};
use crate::value::Value;
use crate::vm::VM;

/// Replacement for the dispatch of one send site
pub trait SpecializedSend: Send + Sync + fmt::Debug {
    /// Run the send, or return `None` when the operands are not handled
    ///
    /// `arguments` holds the receiver followed by the message arguments.
    fn execute(&self, vm: &VM, arguments: &[Value]) -> Option<ExecResult>;

    /// Short name for diagnostics
    fn name(&self) -> &'static str;
}

/// Source of [`SpecializedSend`] nodes, consulted once per send site
pub trait EagerSpecializer: Send + Sync {
    /// Offer a specialization for `selector` given the first operands seen
    fn specialize(&self, selector: &Symbol, arguments: &[Value]) -> Option<Arc<dyn SpecializedSend>>;
}

/// Specializes binary arithmetic and comparison on numbers
#[derive(Debug, Default)]
pub struct ArithmeticSpecializer;

impl EagerSpecializer for ArithmeticSpecializer {
    fn specialize(&self, selector: &Symbol, arguments: &[Value]) -> Option<Arc<dyn SpecializedSend>> {
        let op = ArithOp::from_selector(selector.as_str())?;
        match arguments {
            [receiver, operand] if numeric::is_number(receiver) && numeric::is_number(operand) => {
                Some(Arc::new(ArithmeticSend { op }))
            }
            _ => None,
        }
    }
}

/// Native numeric operator send
#[derive(Debug, Clone, Copy)]
pub struct ArithmeticSend {
    op: ArithOp,
}

impl ArithmeticSend {
    /// Operator this node performs
    pub fn op(&self) -> ArithOp {
        self.op
    }
}

impl SpecializedSend for ArithmeticSend {
    fn execute(&self, _vm: &VM, arguments: &[Value]) -> Option<ExecResult> {
        match arguments {
            [receiver, operand] => numeric::apply(self.op, receiver, operand).map(Ok),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        self.op.selector()
    }
}
