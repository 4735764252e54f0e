//! Invokables and trivial-method classification.
//!
//! A [`Method`] is immutable once installed in a class, apart from two
//! write-once cells: the holder back-reference, set when the method is
//! installed, and the trivial classification, computed on first request.

use core_types::Symbol;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::ast::Expr;
use crate::class::SClass;
use crate::error::{ExecResult, RuntimeError};
use crate::frame::{Activation, FrameDescriptor};
use crate::nonlocal::catch_non_local_return;
use crate::value::Value;
use crate::vm::VM;

/// Native implementation of a method; receives the receiver at index 0
pub type PrimitiveFn = fn(&VM, &[Value]) -> ExecResult;

/// Compiled AST body of a method or block
#[derive(Debug)]
pub struct AstBody {
    /// Root expression
    pub expr: Expr,
    /// Slot layout of activations
    pub descriptor: Arc<FrameDescriptor>,
    /// Slot of the liveness marker when the method is a non-local return target
    pub frame_on_stack: Option<usize>,
}

/// What running a method does
#[derive(Debug)]
pub enum MethodBody {
    /// Interpret an expression tree
    Ast(AstBody),
    /// Call native code
    Primitive(PrimitiveFn),
}

/// A method or block body
pub struct Method {
    signature: Symbol,
    holder: OnceLock<Weak<SClass>>,
    body: MethodBody,
    trivial: OnceLock<Option<TrivialExpr>>,
}

impl Method {
    /// Create a method with an AST body
    pub fn new(signature: Symbol, body: AstBody) -> Self {
        Self {
            signature,
            holder: OnceLock::new(),
            body: MethodBody::Ast(body),
            trivial: OnceLock::new(),
        }
    }

    /// Create a primitive method
    pub fn primitive(signature: Symbol, function: PrimitiveFn) -> Self {
        Self {
            signature,
            holder: OnceLock::new(),
            body: MethodBody::Primitive(function),
            trivial: OnceLock::new(),
        }
    }

    /// Selector this method answers, or `value:`-style name for blocks
    pub fn signature(&self) -> &Symbol {
        &self.signature
    }

    /// Class the method is installed in
    pub fn holder(&self) -> Option<Arc<SClass>> {
        self.holder.get().and_then(Weak::upgrade)
    }

    pub(crate) fn set_holder(&self, holder: &Arc<SClass>) {
        // A method moved to a second class keeps its first holder.
        let _ = self.holder.set(Arc::downgrade(holder));
    }

    /// Body of the method
    pub fn body(&self) -> &MethodBody {
        &self.body
    }

    /// Whether the body is native
    pub fn is_primitive(&self) -> bool {
        matches!(self.body, MethodBody::Primitive(_))
    }

    /// Trivial form of this method, classified once and cached
    pub fn trivial(&self) -> Option<&TrivialExpr> {
        self.trivial
            .get_or_init(|| TrivialExpr::classify(&self.body))
            .as_ref()
    }

    /// Invoke as a method, without an outer context
    ///
    /// `arguments` holds the receiver followed by the message arguments.
    pub fn invoke(&self, vm: &VM, arguments: Vec<Value>) -> ExecResult {
        self.invoke_in_context(vm, arguments, None)
    }

    /// Invoke with an explicit outer context, as blocks do
    pub fn invoke_in_context(
        &self,
        vm: &VM,
        arguments: Vec<Value>,
        context: Option<Arc<Activation>>,
    ) -> ExecResult {
        let expected = self.signature.signature_arity();
        if arguments.len() != expected {
            return Err(RuntimeError::WrongArgumentCount {
                selector: self.signature.clone(),
                expected,
                actual: arguments.len(),
            }
            .into());
        }

        match &self.body {
            MethodBody::Primitive(function) => function(vm, &arguments),
            MethodBody::Ast(body) => {
                let frame = Arc::new(Activation::new(
                    Arc::clone(&body.descriptor),
                    arguments,
                    context,
                ));
                match body.frame_on_stack {
                    Some(slot) => {
                        let marker = frame.install_marker(slot)?;
                        let result = body.expr.execute(&frame, vm);
                        catch_non_local_return(&marker, result)
                    }
                    None => body.expr.execute(&frame, vm),
                }
            }
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let holder = self.holder().map(|h| h.name().to_string());
        write!(
            f,
            "{}>>{}",
            holder.as_deref().unwrap_or("?"),
            self.signature
        )
    }
}

/// Operand of a trivial field assignment
#[derive(Debug, Clone, PartialEq)]
pub enum TrivialValue {
    /// A constant
    Literal(Value),
    /// A message argument; index 0 is the receiver
    Argument(usize),
}

impl TrivialValue {
    fn evaluate(&self, arguments: &[Value]) -> Result<Value, RuntimeError> {
        match self {
            TrivialValue::Literal(v) => Ok(v.clone()),
            TrivialValue::Argument(i) => argument(arguments, *i),
        }
    }
}

/// A method body simple enough to be evaluated without an activation
///
/// Cache entries store a clone of this expression in place of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum TrivialExpr {
    /// `^ literal`
    Literal(Value),
    /// `^ argument` (index 0 returns self)
    Argument(usize),
    /// `^ field`
    FieldRead(usize),
    /// `field := value` followed by the implicit `^ self`
    FieldWriteReturnSelf {
        /// Field index
        field: usize,
        /// Assigned value
        value: TrivialValue,
    },
}

impl TrivialExpr {
    /// Classify a method body, returning `None` for non-trivial shapes
    pub fn classify(body: &MethodBody) -> Option<TrivialExpr> {
        let body = match body {
            MethodBody::Ast(body) if body.frame_on_stack.is_none() => body,
            _ => return None,
        };
        Self::classify_expr(&body.expr)
    }

    fn classify_expr(expr: &Expr) -> Option<TrivialExpr> {
        match expr {
            Expr::Sequence(items) if items.len() == 1 => Self::classify_expr(&items[0]),
            Expr::Sequence(items) if items.len() == 2 => match (&items[0], &items[1]) {
                (
                    Expr::FieldWrite { receiver, index, value },
                    Expr::ArgumentRead { index: 0, context_level: 0 },
                ) if receiver.is_self_read() => {
                    let value = match value.as_ref() {
                        Expr::Literal(v) => TrivialValue::Literal(v.clone()),
                        Expr::ArgumentRead { index, context_level: 0 } => {
                            TrivialValue::Argument(*index)
                        }
                        _ => return None,
                    };
                    Some(TrivialExpr::FieldWriteReturnSelf {
                        field: *index,
                        value,
                    })
                }
                _ => None,
            },
            Expr::Literal(v) => Some(TrivialExpr::Literal(v.clone())),
            Expr::ArgumentRead { index, context_level: 0 } => Some(TrivialExpr::Argument(*index)),
            Expr::FieldRead { receiver, index } if receiver.is_self_read() => {
                Some(TrivialExpr::FieldRead(*index))
            }
            _ => None,
        }
    }

    /// Evaluate against `arguments` (receiver first)
    pub fn evaluate(&self, arguments: &[Value]) -> ExecResult {
        match self {
            TrivialExpr::Literal(v) => Ok(v.clone()),
            TrivialExpr::Argument(i) => Ok(argument(arguments, *i)?),
            TrivialExpr::FieldRead(field) => Ok(receiver_object(arguments)?.field(*field)?),
            TrivialExpr::FieldWriteReturnSelf { field, value } => {
                let value = value.evaluate(arguments)?;
                receiver_object(arguments)?.set_field(*field, value)?;
                Ok(arguments[0].clone())
            }
        }
    }
}

fn argument(arguments: &[Value], index: usize) -> Result<Value, RuntimeError> {
    arguments.get(index).cloned().ok_or_else(|| {
        RuntimeError::FrameIntegrity(format!(
            "trivial method reads argument {} of {}",
            index,
            arguments.len()
        ))
    })
}

fn receiver_object(arguments: &[Value]) -> Result<&Arc<crate::object::SObject>, RuntimeError> {
    match arguments.first() {
        Some(Value::Object(o)) => Ok(o),
        Some(other) => Err(RuntimeError::TypeMismatch {
            expected: "Object",
            actual: other.type_name(),
        }),
        None => Err(RuntimeError::FrameIntegrity(
            "trivial method invoked without a receiver".to_string(),
        )),
    }
}
