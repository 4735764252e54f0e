//! Closures.

use std::sync::Arc;

use crate::error::ExecResult;
use crate::frame::Activation;
use crate::method::Method;
use crate::value::Value;
use crate::vm::VM;

/// A block closure: its compiled body plus the activation it was created in
///
/// Blocks that never read outer variables and never return non-locally
/// are created without a context when the optimization is enabled.
#[derive(Debug)]
pub struct SBlock {
    method: Arc<Method>,
    context: Option<Arc<Activation>>,
}

impl SBlock {
    /// Create a block over `method`
    pub fn new(method: Arc<Method>, context: Option<Arc<Activation>>) -> Self {
        Self { method, context }
    }

    /// Compiled body
    pub fn method(&self) -> &Arc<Method> {
        &self.method
    }

    /// Captured defining activation
    pub fn context(&self) -> Option<&Arc<Activation>> {
        self.context.as_ref()
    }

    /// Number of block parameters, not counting the block itself
    pub fn parameter_count(&self) -> usize {
        self.method.signature().arity()
    }

    /// Evaluate the block
    ///
    /// `arguments` holds the block value itself followed by its parameters.
    pub fn invoke(&self, vm: &VM, arguments: Vec<Value>) -> ExecResult {
        self.method
            .invoke_in_context(vm, arguments, self.context.clone())
    }
}
