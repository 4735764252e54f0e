//! Expression trees.
//!
//! Method and block bodies are trees of [`Expr`] shared by every
//! activation and thread that runs them. Nodes hold no per-activation
//! state; the only mutable parts are the caches inside send sites, which
//! publish atomically (see [`crate::dispatch`]).
//!
//! Variable nodes carry a precomputed context level. Level 0 addresses the
//! current activation; level `n` follows `n` context links outward.

use core_types::Symbol;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::block::SBlock;
use crate::class::SClass;
use crate::dispatch::{CallSite, Dispatched};
use crate::error::{ExecResult, RuntimeError, Unwind};
use crate::frame::{Activation, SlotKind};
use crate::method::{Method, TrivialExpr};
use crate::nonlocal::NonLocalReturn;
use crate::object::SObject;
use crate::scope::ScopeId;
use crate::value::Value;
use crate::vm::{GlobalBinding, VM};

/// A node of a method or block body
#[derive(Debug)]
pub enum Expr {
    /// Constant
    Literal(Value),
    /// Global variable read
    Global(GlobalRead),
    /// Statements; evaluates to the last one, or nil when empty
    Sequence(Vec<Expr>),
    /// Argument read; index 0 is the receiver
    ArgumentRead {
        /// Argument index
        index: usize,
        /// Activations to climb
        context_level: usize,
    },
    /// Local variable read
    LocalRead {
        /// Frame slot
        slot: usize,
        /// Activations to climb
        context_level: usize,
    },
    /// Local variable read that consults the slot kind recorded in the
    /// declaring scope's descriptor; a never-written slot reads as nil
    GenericLocalRead {
        /// Frame slot
        slot: usize,
        /// Activations to climb
        context_level: usize,
    },
    /// Local variable write; evaluates to the assigned value
    LocalWrite {
        /// Frame slot
        slot: usize,
        /// Activations to climb
        context_level: usize,
        /// Assigned expression
        value: Box<Expr>,
    },
    /// Instance field read
    FieldRead {
        /// Object whose field is read, normally `self`
        receiver: Box<Expr>,
        /// Field index
        index: usize,
    },
    /// Instance field write; evaluates to the assigned value
    FieldWrite {
        /// Object whose field is written, normally `self`
        receiver: Box<Expr>,
        /// Field index
        index: usize,
        /// Assigned expression
        value: Box<Expr>,
    },
    /// Block literal; evaluates to a fresh closure
    Block(BlockLiteral),
    /// Dynamically dispatched message send
    Send(Box<MessageSend>),
    /// Send starting lookup in the superclass of the method's holder
    SuperSend(Box<SuperSend>),
    /// `^ value` written directly in a method body; the compiler turns the
    /// first one into the method's result, so finished bodies never hold it
    Return(Box<Expr>),
    /// `^ value` from within a block, returning from the home method
    NonLocalReturn {
        /// Returned expression
        value: Box<Expr>,
        /// Slot of the home method's liveness marker
        marker_slot: usize,
        /// Activations to climb to reach the home method
        context_level: usize,
        /// Signature of the home method
        home: Symbol,
    },
    /// Inlined `ifTrue:` / `ifFalse:`; nil when the branch is not taken
    IfInlined {
        /// Boolean condition
        condition: Box<Expr>,
        /// Inlined block body
        body: Box<Expr>,
        /// Condition value that selects the body
        expected: bool,
    },
    /// Inlined `ifTrue:ifFalse:`
    IfElseInlined {
        /// Boolean condition
        condition: Box<Expr>,
        /// Body for `true`
        then_branch: Box<Expr>,
        /// Body for `false`
        else_branch: Box<Expr>,
    },
    /// Inlined `whileTrue:` / `whileFalse:`; evaluates to nil
    WhileInlined {
        /// Inlined condition block body
        condition: Box<Expr>,
        /// Inlined loop block body
        body: Box<Expr>,
        /// Condition value that continues the loop
        expected: bool,
    },
    /// Inlined `to:do:`; evaluates to the start value
    ToDoInlined {
        /// Start value
        from: Box<Expr>,
        /// Inclusive end value
        to: Box<Expr>,
        /// Slot of the loop variable in the current activation
        index_slot: usize,
        /// Inlined loop block body
        body: Box<Expr>,
    },
}

impl Expr {
    /// Whether this node reads the receiver of the current activation
    pub fn is_self_read(&self) -> bool {
        matches!(self, Expr::ArgumentRead { index: 0, context_level: 0 })
    }

    /// Evaluate this node in `frame`
    pub fn execute(&self, frame: &Arc<Activation>, vm: &VM) -> ExecResult {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Global(read) => read.execute(vm),
            Expr::Sequence(items) => {
                let mut last = Value::Nil;
                for item in items {
                    last = item.execute(frame, vm)?;
                }
                Ok(last)
            }
            Expr::ArgumentRead { index, context_level } => {
                Ok(frame.climb(*context_level)?.argument(*index)?)
            }
            Expr::LocalRead { slot, context_level } => {
                Ok(frame.climb(*context_level)?.local(*slot)?)
            }
            Expr::GenericLocalRead { slot, context_level } => {
                let owner = frame.climb(*context_level)?;
                match owner.descriptor().kind(*slot) {
                    Some(SlotKind::Uninitialized) => Ok(Value::Nil),
                    _ => Ok(owner.local(*slot)?),
                }
            }
            Expr::LocalWrite { slot, context_level, value } => {
                let value = value.execute(frame, vm)?;
                frame.climb(*context_level)?.set_local(*slot, value.clone())?;
                Ok(value)
            }
            Expr::FieldRead { receiver, index } => {
                let receiver = receiver.execute(frame, vm)?;
                Ok(expect_object(&receiver)?.field(*index)?)
            }
            Expr::FieldWrite { receiver, index, value } => {
                let receiver = receiver.execute(frame, vm)?;
                let value = value.execute(frame, vm)?;
                expect_object(&receiver)?.set_field(*index, value.clone())?;
                Ok(value)
            }
            Expr::Block(literal) => Ok(literal.instantiate(frame)),
            Expr::Send(send) => send.execute(frame, vm),
            Expr::SuperSend(send) => send.execute(frame, vm),
            Expr::Return(value) => value.execute(frame, vm),
            Expr::NonLocalReturn {
                value,
                marker_slot,
                context_level,
                home,
            } => {
                let value = value.execute(frame, vm)?;
                let marker = frame.climb(*context_level)?.marker(*marker_slot)?;
                if !marker.is_on_stack() {
                    return Err(RuntimeError::NonLocalReturnEscaped { home: home.clone() }.into());
                }
                Err(Unwind::NonLocalReturn(NonLocalReturn {
                    value,
                    target: marker,
                    home: home.clone(),
                }))
            }
            Expr::IfInlined {
                condition,
                body,
                expected,
            } => {
                if expect_boolean(&condition.execute(frame, vm)?)? == *expected {
                    body.execute(frame, vm)
                } else {
                    Ok(Value::Nil)
                }
            }
            Expr::IfElseInlined {
                condition,
                then_branch,
                else_branch,
            } => {
                if expect_boolean(&condition.execute(frame, vm)?)? {
                    then_branch.execute(frame, vm)
                } else {
                    else_branch.execute(frame, vm)
                }
            }
            Expr::WhileInlined {
                condition,
                body,
                expected,
            } => {
                while expect_boolean(&condition.execute(frame, vm)?)? == *expected {
                    body.execute(frame, vm)?;
                }
                Ok(Value::Nil)
            }
            Expr::ToDoInlined {
                from,
                to,
                index_slot,
                body,
            } => {
                let start = from.execute(frame, vm)?;
                let first = expect_integer(&start)?;
                let last = expect_integer(&to.execute(frame, vm)?)?;
                for i in first..=last {
                    frame.set_local(*index_slot, Value::Integer(i))?;
                    body.execute(frame, vm)?;
                }
                Ok(start)
            }
        }
    }
}

/// Read of a global variable
///
/// With global caching enabled the first execution keeps the name's
/// [`GlobalBinding`] and later executions read it directly; rebinding the
/// global updates that binding in place. Otherwise every execution looks
/// the name up in the globals table.
pub struct GlobalRead {
    name: Symbol,
    binding: OnceLock<Arc<GlobalBinding>>,
}

impl GlobalRead {
    /// Uncached read of `name`
    pub fn new(name: Symbol) -> Self {
        Self {
            name,
            binding: OnceLock::new(),
        }
    }

    /// Global being read
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Whether a binding has been cached
    pub fn is_cached(&self) -> bool {
        self.binding.get().is_some()
    }

    fn execute(&self, vm: &VM) -> ExecResult {
        let value = if vm.flags().global_caching {
            self.binding.get_or_init(|| vm.binding(&self.name)).value()
        } else {
            vm.global(&self.name)
        };
        value.ok_or_else(|| {
            RuntimeError::UnknownGlobal {
                name: self.name.clone(),
            }
            .into()
        })
    }
}

impl fmt::Debug for GlobalRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalRead")
            .field("name", &self.name)
            .field("cached", &self.is_cached())
            .finish()
    }
}

fn expect_object(value: &Value) -> Result<&Arc<SObject>, RuntimeError> {
    value.as_object().ok_or(RuntimeError::TypeMismatch {
        expected: "Object",
        actual: value.type_name(),
    })
}

fn expect_boolean(value: &Value) -> Result<bool, RuntimeError> {
    value.as_boolean().ok_or(RuntimeError::TypeMismatch {
        expected: "Boolean",
        actual: value.type_name(),
    })
}

fn expect_integer(value: &Value) -> Result<i64, RuntimeError> {
    value.as_integer().ok_or(RuntimeError::TypeMismatch {
        expected: "Integer",
        actual: value.type_name(),
    })
}

/// A block literal and the information needed to close over a frame
#[derive(Debug)]
pub struct BlockLiteral {
    /// Compiled block body
    pub method: Arc<Method>,
    /// Scope the block was compiled in, kept for inlining
    pub scope: ScopeId,
    /// Whether closures capture the activation they are created in
    pub with_context: bool,
}

impl BlockLiteral {
    /// Create a closure for this literal in `frame`
    pub fn instantiate(&self, frame: &Arc<Activation>) -> Value {
        let context = self.with_context.then(|| Arc::clone(frame));
        Value::Block(Arc::new(SBlock::new(Arc::clone(&self.method), context)))
    }

    /// Number of block parameters
    pub fn parameter_count(&self) -> usize {
        self.method.signature().arity()
    }
}

/// A send site: receiver, arguments and the site's inline cache
#[derive(Debug)]
pub struct MessageSend {
    /// Inline cache of this site
    pub call_site: CallSite,
    /// Receiver expression
    pub receiver: Expr,
    /// Argument expressions
    pub arguments: Vec<Expr>,
}

impl MessageSend {
    fn execute(&self, frame: &Arc<Activation>, vm: &VM) -> ExecResult {
        let mut values = Vec::with_capacity(self.arguments.len() + 1);
        values.push(self.receiver.execute(frame, vm)?);
        for argument in &self.arguments {
            values.push(argument.execute(frame, vm)?);
        }

        match self.call_site.dispatch(vm, values)? {
            Dispatched::Value(value) => Ok(value),
            Dispatched::DoesNotUnderstand {
                receiver_class,
                arguments,
            } => vm.does_not_understand(self.call_site.selector(), &receiver_class, arguments),
        }
    }
}

/// Target of a super send, bound on first execution
#[derive(Debug, Clone)]
pub enum SuperTarget {
    /// Invoke a method directly
    Method(Arc<Method>),
    /// Evaluate a trivial method body in place
    Trivial(TrivialExpr),
    /// No ancestor understands the selector
    DoesNotUnderstand,
}

/// A send whose lookup starts above the defining class
pub struct SuperSend {
    /// Selector sent
    pub selector: Symbol,
    /// Class where lookup starts; `None` when the holder is a root class
    pub lookup_class: Option<Arc<SClass>>,
    /// Receiver expression, always a read of `self`
    pub receiver: Expr,
    /// Argument expressions
    pub arguments: Vec<Expr>,
    target: OnceLock<SuperTarget>,
}

impl SuperSend {
    /// Create an unbound super send
    pub fn new(
        selector: Symbol,
        lookup_class: Option<Arc<SClass>>,
        receiver: Expr,
        arguments: Vec<Expr>,
    ) -> Self {
        Self {
            selector,
            lookup_class,
            receiver,
            arguments,
            target: OnceLock::new(),
        }
    }

    /// Bound target, if the send has executed
    pub fn target(&self) -> Option<&SuperTarget> {
        self.target.get()
    }

    fn resolve(&self, vm: &VM) -> SuperTarget {
        let method = self
            .lookup_class
            .as_ref()
            .and_then(|class| class.lookup_invokable(&self.selector));
        let target = match method {
            None => SuperTarget::DoesNotUnderstand,
            Some(m) if vm.flags().trivial_method_inlining && m.trivial().is_some() => {
                match m.trivial() {
                    Some(trivial) => SuperTarget::Trivial(trivial.clone()),
                    None => SuperTarget::Method(m),
                }
            }
            Some(m) => SuperTarget::Method(m),
        };
        log::debug!("super send #{} bound to {:?}", self.selector, target);
        target
    }

    fn execute(&self, frame: &Arc<Activation>, vm: &VM) -> ExecResult {
        let mut values = Vec::with_capacity(self.arguments.len() + 1);
        values.push(self.receiver.execute(frame, vm)?);
        for argument in &self.arguments {
            values.push(argument.execute(frame, vm)?);
        }

        match self.target.get_or_init(|| self.resolve(vm)) {
            SuperTarget::Method(method) => method.invoke(vm, values),
            SuperTarget::Trivial(trivial) => trivial.evaluate(&values),
            SuperTarget::DoesNotUnderstand => {
                let class = vm.class_of(&values[0]);
                vm.does_not_understand(&self.selector, &class, values)
            }
        }
    }
}

impl fmt::Debug for SuperSend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuperSend")
            .field("selector", &self.selector)
            .field("lookup_class", &self.lookup_class.as_ref().map(|c| c.name().clone()))
            .field("target", &self.target.get())
            .finish()
    }
}
