//! Building methods and blocks.
//!
//! [`MethodCompiler`] is the interface a front end drives to turn a parsed
//! method into an installed [`Method`]. It declares arguments and locals
//! in a [`ScopeArena`], resolves each variable access to a node with a
//! fixed context level, and builds sends, blocks and returns. Literal
//! blocks handed to control-structure selectors are inlined into the
//! enclosing scope when the optimization is enabled.
//!
//! # Example
//!
//! ```
//! use interpreter::{MethodCompiler, Value, VM};
//!
//! let vm = VM::new();
//! let counter = vm.define_class("Counter", None, &["count"]);
//!
//! // increment
//! //     count := count + 1
//! let mut c = MethodCompiler::method(&vm, &counter, "increment", &[]).unwrap();
//! let count = c.read("count").unwrap();
//! let one = c.literal(Value::Integer(1));
//! let sum = c.send(count, "+", vec![one]).unwrap();
//! let store = c.write("count", sum).unwrap();
//! c.install(vec![store]).unwrap();
//!
//! let obj = vm.new_instance(&counter);
//! obj.as_object().unwrap().set_field(0, Value::Integer(41)).unwrap();
//! vm.send(obj.clone(), "increment", vec![]).unwrap();
//! assert_eq!(obj.as_object().unwrap().field(0).unwrap(), Value::Integer(42));
//! ```

use core_types::{ProgramDefinitionError, SourceCoordinate, Symbol};
use std::sync::Arc;

use crate::ast::{BlockLiteral, Expr, GlobalRead, MessageSend, SuperSend};
use crate::class::SClass;
use crate::dispatch::CallSite;
use crate::method::{AstBody, Method, MethodBody};
use crate::scope::{
    ScopeAdaptation, ScopeArena, ScopeId, VariableKind, BLOCK_SELF_NAME, SELF_NAME,
};
use crate::value::Value;
use crate::vm::VM;

/// Most parameters a block may declare
pub const MAX_BLOCK_PARAMETERS: usize = 3;

/// Builder for one method and the blocks nested in it
pub struct MethodCompiler<'vm> {
    vm: &'vm VM,
    holder: Arc<SClass>,
    signature: Symbol,
    arena: ScopeArena,
    root: ScopeId,
    current: ScopeId,
    line: u32,
    declarations: u32,
    method_returns: usize,
}

impl<'vm> MethodCompiler<'vm> {
    /// Start a method of `holder` answering `selector`
    ///
    /// Declares `self` followed by `arguments`, which must match the
    /// selector's arity.
    pub fn method(
        vm: &'vm VM,
        holder: &Arc<SClass>,
        selector: &str,
        arguments: &[&str],
    ) -> Result<Self, ProgramDefinitionError> {
        let mut compiler = Self::new(vm, holder, selector);
        let expected = compiler.signature.arity();
        if arguments.len() != expected {
            return Err(ProgramDefinitionError::ArityMismatch {
                selector: selector.to_string(),
                expected,
                actual: arguments.len(),
            });
        }
        compiler.declare_argument(SELF_NAME)?;
        for argument in arguments {
            compiler.declare_argument(argument)?;
        }
        Ok(compiler)
    }

    /// Start a method without declaring any argument
    ///
    /// The caller declares arguments one by one, receiver first.
    pub fn new(vm: &'vm VM, holder: &Arc<SClass>, selector: &str) -> Self {
        let signature = vm.symbol(selector);
        let mut arena = ScopeArena::new();
        let root = arena.new_method_scope(format!("{}>>{}", holder.name(), selector));
        Self {
            vm,
            holder: Arc::clone(holder),
            signature,
            arena,
            root,
            current: root,
            line: 1,
            declarations: 0,
            method_returns: 0,
        }
    }

    /// Signature of the method being built
    pub fn signature(&self) -> &Symbol {
        &self.signature
    }

    /// Scopes built so far
    pub fn scopes(&self) -> &ScopeArena {
        &self.arena
    }

    /// Scope that declarations and accesses currently apply to
    pub fn current_scope(&self) -> ScopeId {
        self.current
    }

    /// Source line attached to subsequent declarations and diagnostics
    pub fn at_line(&mut self, line: u32) {
        self.line = line;
    }

    fn coordinate(&self) -> SourceCoordinate {
        SourceCoordinate::new(self.line, 0)
    }

    fn next_declaration(&mut self) -> SourceCoordinate {
        self.declarations += 1;
        SourceCoordinate::new(self.line, self.declarations)
    }

    /// Declare the next argument of the current scope
    pub fn declare_argument(&mut self, name: &str) -> Result<(), ProgramDefinitionError> {
        let coord = self.next_declaration();
        self.arena.add_argument(self.current, name, coord).map(|_| ())
    }

    /// Declare a local of the current scope
    pub fn declare_local(&mut self, name: &str) -> Result<(), ProgramDefinitionError> {
        let coord = self.next_declaration();
        self.arena.add_local(self.current, name, coord).map(|_| ())
    }

    /// Context level of the variable `name` as seen from the current scope
    pub fn context_level(&mut self, name: &str) -> Option<usize> {
        let resolved = self.arena.lookup(self.current, name)?;
        self.arena.context_level(self.current, &resolved.variable)
    }

    /// A constant
    pub fn literal(&self, value: Value) -> Expr {
        Expr::Literal(value)
    }

    /// Read of the method's receiver from the current scope
    pub fn self_read(&mut self) -> Expr {
        let context_level = match self.arena.lookup(self.current, SELF_NAME) {
            Some(resolved) => resolved.context_level,
            None => self.arena.outer_self_context_level(self.current),
        };
        Expr::ArgumentRead {
            index: 0,
            context_level,
        }
    }

    /// Read of `name`
    ///
    /// Resolves, in order, to a variable of an enclosing scope, a field of
    /// the holder class, one of the constants `nil`, `true` and `false`, or
    /// a global when the name is capitalized. Without global caching the
    /// constants are read as globals too.
    pub fn read(&mut self, name: &str) -> Result<Expr, ProgramDefinitionError> {
        if name == "super" {
            return Ok(self.self_read());
        }
        if let Some(resolved) = self.arena.lookup(self.current, name) {
            let context_level = resolved.context_level;
            return Ok(match resolved.variable.kind {
                VariableKind::Argument { index } => Expr::ArgumentRead {
                    index,
                    context_level,
                },
                VariableKind::Local { slot } if !self.vm.flags().specialized_variables => {
                    Expr::GenericLocalRead { slot, context_level }
                }
                VariableKind::Local { slot } | VariableKind::Internal { slot } => Expr::LocalRead {
                    slot,
                    context_level,
                },
            });
        }
        if let Some(index) = self.holder.field_index(name) {
            return Ok(Expr::FieldRead {
                receiver: Box::new(self.self_read()),
                index,
            });
        }
        let constant = match name {
            "nil" => Some(Value::Nil),
            "true" => Some(Value::Boolean(true)),
            "false" => Some(Value::Boolean(false)),
            _ => None,
        };
        if let Some(value) = constant {
            if self.vm.flags().global_caching {
                return Ok(Expr::Literal(value));
            }
            return Ok(Expr::Global(GlobalRead::new(self.vm.symbol(name))));
        }
        if name.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Ok(Expr::Global(GlobalRead::new(self.vm.symbol(name))));
        }
        Err(ProgramDefinitionError::UnresolvedVariable {
            name: name.to_string(),
            coord: self.coordinate(),
        })
    }

    /// Assignment of `value` to `name`, a local or a field
    pub fn write(&mut self, name: &str, value: Expr) -> Result<Expr, ProgramDefinitionError> {
        if let Some(resolved) = self.arena.lookup(self.current, name) {
            return match resolved.variable.kind {
                VariableKind::Local { slot } => Ok(Expr::LocalWrite {
                    slot,
                    context_level: resolved.context_level,
                    value: Box::new(value),
                }),
                VariableKind::Argument { .. } | VariableKind::Internal { .. } => {
                    Err(ProgramDefinitionError::ArgumentNotAssignable {
                        name: name.to_string(),
                        coord: self.coordinate(),
                    })
                }
            };
        }
        if let Some(index) = self.holder.field_index(name) {
            return Ok(Expr::FieldWrite {
                receiver: Box::new(self.self_read()),
                index,
                value: Box::new(value),
            });
        }
        Err(ProgramDefinitionError::UnresolvedVariable {
            name: name.to_string(),
            coord: self.coordinate(),
        })
    }

    /// Send `selector` to `receiver`
    ///
    /// Control-structure selectors whose block arguments are literals
    /// compiled in the current scope are inlined instead.
    pub fn send(
        &mut self,
        receiver: Expr,
        selector: &str,
        arguments: Vec<Expr>,
    ) -> Result<Expr, ProgramDefinitionError> {
        let selector = self.selector(selector, arguments.len())?;
        if self.vm.flags().block_inlining && self.can_inline(&selector, &receiver, &arguments) {
            return self.inline_control(selector, receiver, arguments);
        }
        Ok(Expr::Send(Box::new(MessageSend {
            call_site: CallSite::new(selector),
            receiver,
            arguments,
        })))
    }

    /// Send `selector` to `self`, starting lookup in the holder's superclass
    pub fn super_send(&mut self, selector: &str, arguments: Vec<Expr>) -> Result<Expr, ProgramDefinitionError> {
        let selector = self.selector(selector, arguments.len())?;
        let receiver = self.self_read();
        Ok(Expr::SuperSend(Box::new(SuperSend::new(
            selector,
            self.holder.superclass().cloned(),
            receiver,
            arguments,
        ))))
    }

    fn selector(&self, name: &str, supplied: usize) -> Result<Symbol, ProgramDefinitionError> {
        let selector = self.vm.symbol(name);
        if selector.arity() != supplied {
            return Err(ProgramDefinitionError::ArityMismatch {
                selector: name.to_string(),
                expected: selector.arity(),
                actual: supplied,
            });
        }
        Ok(selector)
    }

    /// Open a block scope nested in the current one
    ///
    /// Blocks take at most [`MAX_BLOCK_PARAMETERS`] parameters, the most any
    /// `value:...` primitive accepts.
    pub fn begin_block(&mut self, parameters: &[&str]) -> Result<(), ProgramDefinitionError> {
        let owner = format!("{}>>{}[]", self.holder.name(), self.signature);
        if parameters.len() > MAX_BLOCK_PARAMETERS {
            return Err(ProgramDefinitionError::TooManyBlockParameters {
                owner,
                count: parameters.len(),
                max: MAX_BLOCK_PARAMETERS,
            });
        }
        self.current = self.arena.new_block_scope(self.current, owner);
        self.arena
            .add_argument(self.current, BLOCK_SELF_NAME, SourceCoordinate::synthetic())?;
        for parameter in parameters {
            self.declare_argument(parameter)?;
        }
        Ok(())
    }

    /// Close the innermost open block, producing its literal
    ///
    /// The block evaluates `statements` and answers the last value.
    ///
    /// # Panics
    ///
    /// Panics when no block is open.
    pub fn end_block(&mut self, statements: Vec<Expr>) -> Result<Expr, ProgramDefinitionError> {
        let scope = self.current;
        let outer = self.arena.get(scope).outer();
        assert!(outer.is_some(), "end_block without a matching begin_block");

        let parameters = self.arena.get(scope).arguments().len() - 1;
        let signature = match parameters {
            0 => "value".to_string(),
            n => "value:".repeat(n),
        };
        let with_context =
            !self.vm.flags().blocks_without_context || self.arena.get(scope).requires_context();
        let descriptor = self.arena.freeze(scope);
        let method = Method::new(
            self.vm.symbol(&signature),
            AstBody {
                expr: Expr::Sequence(statements),
                descriptor,
                frame_on_stack: None,
            },
        );

        self.current = outer.unwrap_or(self.root);
        Ok(Expr::Block(BlockLiteral {
            method: Arc::new(method),
            scope,
            with_context,
        }))
    }

    /// `^ value`
    ///
    /// Inside a block this returns from the enclosing method's activation.
    /// At method level the result must be used as a statement of the method
    /// body: it becomes the method's result and later statements are dropped.
    pub fn ret(&mut self, value: Expr) -> Result<Expr, ProgramDefinitionError> {
        if self.current == self.root {
            self.method_returns += 1;
            return Ok(Expr::Return(Box::new(value)));
        }
        let context_level = self.arena.outer_self_context_level(self.current);
        self.arena.make_outer_catch_non_local_return(self.current);
        let marker_slot = self.arena.frame_on_stack_marker(self.current)?;
        Ok(Expr::NonLocalReturn {
            value: Box::new(value),
            marker_slot,
            context_level,
            home: self.signature.clone(),
        })
    }

    /// Finish the method; it answers `self` after `statements`
    pub fn assemble(mut self, mut statements: Vec<Expr>) -> Result<Arc<Method>, ProgramDefinitionError> {
        let receiver = self.self_read();
        statements.push(receiver);
        self.finish(statements)
    }

    /// Finish the method; it answers `result` after `statements`
    pub fn assemble_returning(
        self,
        mut statements: Vec<Expr>,
        result: Expr,
    ) -> Result<Arc<Method>, ProgramDefinitionError> {
        statements.push(result);
        self.finish(statements)
    }

    /// Finish the method and install it in the holder class
    pub fn install(self, statements: Vec<Expr>) -> Result<Arc<Method>, ProgramDefinitionError> {
        let holder = Arc::clone(&self.holder);
        let method = self.assemble(statements)?;
        holder.add_method(Arc::clone(&method));
        Ok(method)
    }

    /// Like [`MethodCompiler::install`], answering `result`
    pub fn install_returning(
        self,
        statements: Vec<Expr>,
        result: Expr,
    ) -> Result<Arc<Method>, ProgramDefinitionError> {
        let holder = Arc::clone(&self.holder);
        let method = self.assemble_returning(statements, result)?;
        holder.add_method(Arc::clone(&method));
        Ok(method)
    }

    /// Cut the body after its first method-level `^` and unwrap it
    fn settle_method_returns(&self, mut statements: Vec<Expr>) -> Result<Vec<Expr>, ProgramDefinitionError> {
        let returns = statements.iter().filter(|e| matches!(e, Expr::Return(_))).count();
        if returns != self.method_returns {
            return Err(ProgramDefinitionError::MisplacedReturn {
                owner: format!("{}>>{}", self.holder.name(), self.signature),
            });
        }
        if let Some(first) = statements.iter().position(|e| matches!(e, Expr::Return(_))) {
            statements.truncate(first + 1);
            if let Some(Expr::Return(value)) = statements.pop() {
                statements.push(*value);
            }
        }
        Ok(statements)
    }

    fn finish(mut self, statements: Vec<Expr>) -> Result<Arc<Method>, ProgramDefinitionError> {
        assert_eq!(self.current, self.root, "method finished with an open block");
        let statements = self.settle_method_returns(statements)?;
        let frame_on_stack = self.arena.get(self.root).frame_on_stack_slot();
        let descriptor = self.arena.freeze(self.root);
        log::trace!(
            "compiled {}>>{}: {} slot(s), {} scope(s)",
            self.holder.name(),
            self.signature,
            descriptor.slot_count(),
            self.arena.len()
        );
        Ok(Arc::new(Method::new(
            self.signature,
            AstBody {
                expr: Expr::Sequence(statements),
                descriptor,
                frame_on_stack,
            },
        )))
    }

    fn inlinable_block(&self, expr: &Expr, parameters: usize) -> bool {
        match expr {
            Expr::Block(literal) => {
                let scope = self.arena.get(literal.scope);
                scope.outer() == Some(self.current)
                    && scope.merged_into().is_none()
                    && literal.parameter_count() == parameters
            }
            _ => false,
        }
    }

    fn can_inline(&self, selector: &Symbol, receiver: &Expr, arguments: &[Expr]) -> bool {
        match (selector.as_str(), arguments) {
            ("ifTrue:" | "ifFalse:", [body]) => self.inlinable_block(body, 0),
            ("ifTrue:ifFalse:" | "ifFalse:ifTrue:", [first, second]) => {
                self.inlinable_block(first, 0) && self.inlinable_block(second, 0)
            }
            ("whileTrue:" | "whileFalse:", [body]) => {
                self.inlinable_block(receiver, 0) && self.inlinable_block(body, 0)
            }
            ("to:do:", [_, body]) => self.inlinable_block(body, 1),
            _ => false,
        }
    }

    fn inline_control(
        &mut self,
        selector: Symbol,
        receiver: Expr,
        arguments: Vec<Expr>,
    ) -> Result<Expr, ProgramDefinitionError> {
        log::debug!("inlining #{} in {}>>{}", selector, self.holder.name(), self.signature);
        let mut arguments = arguments.into_iter();
        let mut next = || arguments.next().unwrap_or(Expr::Literal(Value::Nil));

        Ok(match selector.as_str() {
            "ifTrue:" | "ifFalse:" => Expr::IfInlined {
                condition: Box::new(receiver),
                body: Box::new(self.inline_block(next())?.0),
                expected: selector.as_str() == "ifTrue:",
            },
            "ifTrue:ifFalse:" | "ifFalse:ifTrue:" => {
                let first = self.inline_block(next())?.0;
                let second = self.inline_block(next())?.0;
                let (then_branch, else_branch) = if selector.as_str() == "ifTrue:ifFalse:" {
                    (first, second)
                } else {
                    (second, first)
                };
                Expr::IfElseInlined {
                    condition: Box::new(receiver),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                }
            }
            "whileTrue:" | "whileFalse:" => Expr::WhileInlined {
                condition: Box::new(self.inline_block(receiver)?.0),
                body: Box::new(self.inline_block(next())?.0),
                expected: selector.as_str() == "whileTrue:",
            },
            _ => {
                let to = next();
                let (body, adaptation) = self.inline_block(next())?;
                let index_slot = match adaptation.argument_slot(1) {
                    Some(slot) => slot,
                    None => self.arena.get(self.current).slot_count(),
                };
                Expr::ToDoInlined {
                    from: Box::new(receiver),
                    to: Box::new(to),
                    index_slot,
                    body: Box::new(body),
                }
            }
        })
    }

    fn inline_block(&mut self, expr: Expr) -> Result<(Expr, ScopeAdaptation), ProgramDefinitionError> {
        let literal = match expr {
            Expr::Block(literal) => literal,
            other => return Ok((other, ScopeAdaptation::default())),
        };
        let adaptation = self.arena.merge_into_scope(self.current, literal.scope)?;
        let body = match literal.method.body() {
            MethodBody::Ast(body) => body.expr.adapt(&adaptation, 0),
            MethodBody::Primitive(_) => Expr::Literal(Value::Nil),
        };
        Ok((body, adaptation))
    }
}
