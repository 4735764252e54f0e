//! Rewriting an inlined block body for its new home scope.
//!
//! When a literal block is spliced into the method or block that encloses
//! it, its arguments and locals become locals of the enclosing scope and
//! one level of activation disappears. Every node in the body that names
//! a frame position is rewritten accordingly:
//!
//! - accesses to the inlined scope's own variables move to their new
//!   slots,
//! - accesses that crossed the removed scope drop one context level,
//! - accesses into scopes nested inside the body are untouched.
//!
//! `depth` counts how many block literals deep the rewrite currently is,
//! relative to the inlined body; level `depth` is the inlined scope itself.

use std::sync::Arc;

use crate::ast::{BlockLiteral, Expr, GlobalRead, MessageSend, SuperSend};
use crate::dispatch::CallSite;
use crate::method::{AstBody, Method, MethodBody};
use crate::scope::ScopeAdaptation;

impl Expr {
    /// Copy of this tree adapted to the removal of one scope
    pub fn adapt(&self, adaptation: &ScopeAdaptation, depth: usize) -> Expr {
        let adapt = |e: &Expr| e.adapt(adaptation, depth);
        let boxed = |e: &Expr| Box::new(e.adapt(adaptation, depth));

        match self {
            Expr::Literal(v) => Expr::Literal(v.clone()),
            Expr::Global(read) => Expr::Global(GlobalRead::new(read.name().clone())),
            Expr::Sequence(items) => Expr::Sequence(items.iter().map(adapt).collect()),
            Expr::ArgumentRead { index, context_level } => {
                if *context_level == depth {
                    match adaptation.argument_slot(*index) {
                        Some(slot) => Expr::LocalRead {
                            slot,
                            context_level: *context_level,
                        },
                        None => Expr::ArgumentRead {
                            index: *index,
                            context_level: *context_level,
                        },
                    }
                } else {
                    Expr::ArgumentRead {
                        index: *index,
                        context_level: outer_level(*context_level, depth),
                    }
                }
            }
            Expr::LocalRead { slot, context_level } => {
                let (slot, context_level) = local(adaptation, *slot, *context_level, depth);
                Expr::LocalRead { slot, context_level }
            }
            Expr::GenericLocalRead { slot, context_level } => {
                let (slot, context_level) = local(adaptation, *slot, *context_level, depth);
                Expr::GenericLocalRead { slot, context_level }
            }
            Expr::LocalWrite {
                slot,
                context_level,
                value,
            } => {
                let (slot, context_level) = local(adaptation, *slot, *context_level, depth);
                Expr::LocalWrite {
                    slot,
                    context_level,
                    value: boxed(value),
                }
            }
            Expr::FieldRead { receiver, index } => Expr::FieldRead {
                receiver: boxed(receiver),
                index: *index,
            },
            Expr::FieldWrite {
                receiver,
                index,
                value,
            } => Expr::FieldWrite {
                receiver: boxed(receiver),
                index: *index,
                value: boxed(value),
            },
            Expr::Block(literal) => Expr::Block(adapt_block(literal, adaptation, depth)),
            Expr::Send(send) => Expr::Send(Box::new(MessageSend {
                call_site: CallSite::new(send.call_site.selector().clone()),
                receiver: adapt(&send.receiver),
                arguments: send.arguments.iter().map(adapt).collect(),
            })),
            Expr::SuperSend(send) => Expr::SuperSend(Box::new(SuperSend::new(
                send.selector.clone(),
                send.lookup_class.clone(),
                adapt(&send.receiver),
                send.arguments.iter().map(adapt).collect(),
            ))),
            Expr::Return(value) => Expr::Return(boxed(value)),
            Expr::NonLocalReturn {
                value,
                marker_slot,
                context_level,
                home,
            } => Expr::NonLocalReturn {
                value: boxed(value),
                marker_slot: *marker_slot,
                context_level: outer_level(*context_level, depth),
                home: home.clone(),
            },
            Expr::IfInlined {
                condition,
                body,
                expected,
            } => Expr::IfInlined {
                condition: boxed(condition),
                body: boxed(body),
                expected: *expected,
            },
            Expr::IfElseInlined {
                condition,
                then_branch,
                else_branch,
            } => Expr::IfElseInlined {
                condition: boxed(condition),
                then_branch: boxed(then_branch),
                else_branch: boxed(else_branch),
            },
            Expr::WhileInlined {
                condition,
                body,
                expected,
            } => Expr::WhileInlined {
                condition: boxed(condition),
                body: boxed(body),
                expected: *expected,
            },
            Expr::ToDoInlined {
                from,
                to,
                index_slot,
                body,
            } => Expr::ToDoInlined {
                from: boxed(from),
                to: boxed(to),
                index_slot: local(adaptation, *index_slot, 0, depth).0,
                body: boxed(body),
            },
        }
    }
}

/// Level of an access that does not target the inlined scope itself
fn outer_level(context_level: usize, depth: usize) -> usize {
    if context_level > depth {
        context_level - 1
    } else {
        context_level
    }
}

fn local(adaptation: &ScopeAdaptation, slot: usize, context_level: usize, depth: usize) -> (usize, usize) {
    if context_level == depth {
        let moved = adaptation.local_slot(slot);
        debug_assert!(moved.is_some(), "local slot {} of inlined scope not re-homed", slot);
        (moved.unwrap_or(slot), context_level)
    } else {
        (slot, outer_level(context_level, depth))
    }
}

fn adapt_block(literal: &BlockLiteral, adaptation: &ScopeAdaptation, depth: usize) -> BlockLiteral {
    let method = match literal.method.body() {
        MethodBody::Ast(body) => Arc::new(Method::new(
            literal.method.signature().clone(),
            AstBody {
                expr: body.expr.adapt(adaptation, depth + 1),
                descriptor: Arc::clone(&body.descriptor),
                frame_on_stack: body.frame_on_stack,
            },
        )),
        MethodBody::Primitive(_) => Arc::clone(&literal.method),
    };
    BlockLiteral {
        method,
        scope: literal.scope,
        with_context: literal.with_context,
    }
}
