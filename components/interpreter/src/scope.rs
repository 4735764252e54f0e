//! Lexical scopes and variables.
//!
//! Scopes live in a [`ScopeArena`] and refer to each other by [`ScopeId`],
//! so the outer/embedded relation carries no reference cycles. A scope is
//! built in two phases: declarations first (the receiver argument before
//! any other argument, then locals in encounter order), then resolution,
//! which climbs outward and counts context levels. Freezing a scope fixes
//! its slot count and yields the [`FrameDescriptor`] its activations use.
//!
//! Block inlining splices a block scope into its outer scope with
//! [`ScopeArena::merge_into_scope`]. Variables keep their identity (name
//! plus declaration coordinate) and receive fresh slots in the target.

use core_types::{ProgramDefinitionError, SourceCoordinate};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::frame::FrameDescriptor;

/// Name of the receiver argument of a method
pub const SELF_NAME: &str = "self";
/// Name of the receiver argument of a block
pub const BLOCK_SELF_NAME: &str = "$blockSelf";
/// Name of the synthetic slot holding the liveness marker
pub const FRAME_ON_STACK_NAME: &str = "!frameOnStack";

/// Index of a scope in its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    /// Position in the arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether a scope belongs to a method or a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Method body; root of a lexical chain
    Method,
    /// Block body
    Block,
}

/// Storage class of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Entry of the argument array; 0 is the receiver
    Argument {
        /// Argument index
        index: usize,
    },
    /// Frame slot declared by the program
    Local {
        /// Slot index
        slot: usize,
    },
    /// Frame slot introduced by the compiler
    Internal {
        /// Slot index
        slot: usize,
    },
}

/// A declared name
///
/// Two variables are the same variable when both name and declaration
/// coordinate agree; the kind may change when a variable is re-homed.
#[derive(Debug, Clone)]
pub struct Variable {
    /// Declared name
    pub name: String,
    /// Declaration position
    pub coord: SourceCoordinate,
    /// Where the value lives
    pub kind: VariableKind,
}

impl Variable {
    /// Identity key: name and coordinate
    pub fn key(&self) -> (String, SourceCoordinate) {
        (self.name.clone(), self.coord)
    }

    /// Whether this is an argument
    pub fn is_argument(&self) -> bool {
        matches!(self.kind, VariableKind::Argument { .. })
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.coord == other.coord
    }
}

impl Eq for Variable {}

/// A variable found by [`ScopeArena::lookup`]
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// The variable
    pub variable: Variable,
    /// Scope that declares it
    pub scope: ScopeId,
    /// Number of enclosing-scope hops from the access site
    pub context_level: usize,
}

#[derive(Debug, Clone, Copy)]
enum Binding {
    Argument(usize),
    Local(usize),
}

/// One method or block scope
#[derive(Debug)]
pub struct LexicalScope {
    owner: String,
    kind: ScopeKind,
    outer: Option<ScopeId>,
    arguments: Vec<Variable>,
    locals: Vec<Variable>,
    names: HashMap<String, Binding>,
    embedded: Vec<ScopeId>,
    next_slot: usize,
    frozen: bool,
    throws_non_local_return: bool,
    needs_to_catch_non_local_return: bool,
    accesses_outer: bool,
    frame_on_stack: Option<usize>,
    merged_into: Option<ScopeId>,
}

impl LexicalScope {
    fn new(owner: String, kind: ScopeKind, outer: Option<ScopeId>) -> Self {
        Self {
            owner,
            kind,
            outer,
            arguments: Vec::new(),
            locals: Vec::new(),
            names: HashMap::new(),
            embedded: Vec::new(),
            next_slot: 0,
            frozen: false,
            throws_non_local_return: false,
            needs_to_catch_non_local_return: false,
            accesses_outer: false,
            frame_on_stack: None,
            merged_into: None,
        }
    }

    /// Method or block
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Enclosing scope
    pub fn outer(&self) -> Option<ScopeId> {
        self.outer
    }

    /// Arguments in declaration order
    pub fn arguments(&self) -> &[Variable] {
        &self.arguments
    }

    /// Locals and internals in slot order
    pub fn locals(&self) -> &[Variable] {
        &self.locals
    }

    /// Scopes of blocks nested directly in this one
    pub fn embedded(&self) -> &[ScopeId] {
        &self.embedded
    }

    /// Number of frame slots allocated so far
    pub fn slot_count(&self) -> usize {
        self.next_slot
    }

    /// Whether declarations are closed
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Whether a block in or below this scope returns past it
    pub fn throws_non_local_return(&self) -> bool {
        self.throws_non_local_return
    }

    /// Whether this method activation must catch non-local returns
    pub fn needs_to_catch_non_local_return(&self) -> bool {
        self.needs_to_catch_non_local_return && self.outer.is_none()
    }

    /// Whether code in this scope reads or writes outer variables
    pub fn accesses_outer(&self) -> bool {
        self.accesses_outer
    }

    /// Whether activations need their defining activation at run time
    pub fn requires_context(&self) -> bool {
        self.throws_non_local_return || self.accesses_outer
    }

    /// Slot of the liveness marker, once allocated
    pub fn frame_on_stack_slot(&self) -> Option<usize> {
        self.frame_on_stack
    }

    /// Scope this one was inlined into
    pub fn merged_into(&self) -> Option<ScopeId> {
        self.merged_into
    }

    fn check_open(&self) -> Result<(), ProgramDefinitionError> {
        if self.frozen {
            Err(ProgramDefinitionError::ScopeFrozen {
                owner: self.owner.clone(),
            })
        } else {
            Ok(())
        }
    }

    fn find(&self, name: &str) -> Option<&Variable> {
        match *self.names.get(name)? {
            Binding::Argument(i) => self.arguments.get(i),
            Binding::Local(i) => self.locals.get(i),
        }
    }

    fn contains(&self, variable: &Variable) -> bool {
        self.arguments.iter().chain(self.locals.iter()).any(|v| v == variable)
    }

    fn allocate_slot(&mut self) -> usize {
        let slot = self.next_slot;
        self.next_slot += 1;
        slot
    }

    fn push_local(&mut self, key: String, variable: Variable) {
        self.names.insert(key, Binding::Local(self.locals.len()));
        self.locals.push(variable);
    }
}

/// Slot mapping produced by inlining one block scope into its outer scope
#[derive(Debug, Clone, Default)]
pub struct ScopeAdaptation {
    /// New slot for each argument of the inlined block; `None` for the
    /// block receiver, which has no counterpart
    pub arguments: Vec<Option<usize>>,
    /// New slot for each old local slot of the inlined block
    pub locals: HashMap<usize, usize>,
}

impl ScopeAdaptation {
    /// New slot for argument `index` of the inlined scope
    pub fn argument_slot(&self, index: usize) -> Option<usize> {
        self.arguments.get(index).copied().flatten()
    }

    /// New slot for local `slot` of the inlined scope
    pub fn local_slot(&self, slot: usize) -> Option<usize> {
        self.locals.get(&slot).copied()
    }
}

/// Owner of every scope built while compiling one method
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<LexicalScope>,
}

impl ScopeArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scopes ever created
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Whether no scope has been created
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Access a scope
    pub fn get(&self, id: ScopeId) -> &LexicalScope {
        &self.scopes[id.index()]
    }

    fn get_mut(&mut self, id: ScopeId) -> &mut LexicalScope {
        &mut self.scopes[id.index()]
    }

    fn push(&mut self, scope: LexicalScope) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    /// Create the root scope of a method
    pub fn new_method_scope(&mut self, owner: impl Into<String>) -> ScopeId {
        self.push(LexicalScope::new(owner.into(), ScopeKind::Method, None))
    }

    /// Create a block scope nested in `outer`
    pub fn new_block_scope(&mut self, outer: ScopeId, owner: impl Into<String>) -> ScopeId {
        let id = self.push(LexicalScope::new(owner.into(), ScopeKind::Block, Some(outer)));
        self.get_mut(outer).embedded.push(id);
        id
    }

    /// Declare the next argument of `scope`
    ///
    /// The first argument must be the receiver (`self` for methods,
    /// `$blockSelf` for blocks) and the receiver may only be first.
    pub fn add_argument(
        &mut self,
        scope: ScopeId,
        name: &str,
        coord: SourceCoordinate,
    ) -> Result<Variable, ProgramDefinitionError> {
        let target = self.get_mut(scope);
        target.check_open()?;

        let is_receiver = name == SELF_NAME || name == BLOCK_SELF_NAME;
        if is_receiver != target.arguments.is_empty() {
            return Err(ProgramDefinitionError::SelfNotFirstArgument {
                name: name.to_string(),
            });
        }
        if target.names.contains_key(name) {
            return Err(ProgramDefinitionError::DuplicateArgument {
                name: name.to_string(),
                coord,
            });
        }

        let variable = Variable {
            name: name.to_string(),
            coord,
            kind: VariableKind::Argument {
                index: target.arguments.len(),
            },
        };
        target
            .names
            .insert(name.to_string(), Binding::Argument(target.arguments.len()));
        target.arguments.push(variable.clone());
        Ok(variable)
    }

    /// Declare a local of `scope` with the next free slot
    pub fn add_local(
        &mut self,
        scope: ScopeId,
        name: &str,
        coord: SourceCoordinate,
    ) -> Result<Variable, ProgramDefinitionError> {
        let target = self.get_mut(scope);
        target.check_open()?;
        if target.names.contains_key(name) {
            return Err(ProgramDefinitionError::DuplicateLocal {
                name: name.to_string(),
                coord,
            });
        }

        let variable = Variable {
            name: name.to_string(),
            coord,
            kind: VariableKind::Local {
                slot: target.allocate_slot(),
            },
        };
        target.push_local(name.to_string(), variable.clone());
        Ok(variable)
    }

    /// Resolve `name` starting at `from`, climbing outward
    ///
    /// Every scope crossed on the way is marked as accessing outer
    /// variables.
    pub fn lookup(&mut self, from: ScopeId, name: &str) -> Option<Resolved> {
        let mut current = from;
        let mut level = 0;
        let mut crossed = Vec::new();
        loop {
            let scope = self.get(current);
            if let Some(variable) = scope.find(name) {
                let resolved = Resolved {
                    variable: variable.clone(),
                    scope: current,
                    context_level: level,
                };
                for id in crossed {
                    self.get_mut(id).accesses_outer = true;
                }
                return Some(resolved);
            }
            crossed.push(current);
            current = scope.outer?;
            level += 1;
        }
    }

    /// Number of hops from `from` to the scope declaring `variable`
    ///
    /// 0 when declared in `from` itself, otherwise one more than the level
    /// in the enclosing scope.
    pub fn context_level(&self, from: ScopeId, variable: &Variable) -> Option<usize> {
        let scope = self.get(from);
        if scope.contains(variable) {
            Some(0)
        } else {
            scope
                .outer
                .and_then(|outer| self.context_level(outer, variable))
                .map(|level| level + 1)
        }
    }

    /// Number of hops from `from` to the method scope at the root
    pub fn outer_self_context_level(&self, from: ScopeId) -> usize {
        let mut level = 0;
        let mut current = self.get(from);
        while let Some(outer) = current.outer {
            level += 1;
            current = self.get(outer);
        }
        level
    }

    /// Root method scope of `from`
    pub fn root(&self, from: ScopeId) -> ScopeId {
        let mut current = from;
        while let Some(outer) = self.get(current).outer {
            current = outer;
        }
        current
    }

    /// Record that `from` performs a non-local return
    ///
    /// `from` and every block scope between it and the root are marked as
    /// throwing; the root method is marked as having to catch.
    pub fn make_outer_catch_non_local_return(&mut self, from: ScopeId) {
        let mut current = from;
        loop {
            let scope = self.get_mut(current);
            match scope.outer {
                Some(outer) => {
                    scope.throws_non_local_return = true;
                    current = outer;
                }
                None => {
                    scope.needs_to_catch_non_local_return = true;
                    return;
                }
            }
        }
    }

    /// Slot of the liveness marker in the root of `from`, allocating it on
    /// first use
    pub fn frame_on_stack_marker(&mut self, from: ScopeId) -> Result<usize, ProgramDefinitionError> {
        let root = self.root(from);
        let scope = self.get_mut(root);
        if let Some(slot) = scope.frame_on_stack {
            return Ok(slot);
        }
        scope.check_open()?;

        let slot = scope.allocate_slot();
        let variable = Variable {
            name: FRAME_ON_STACK_NAME.to_string(),
            coord: SourceCoordinate::synthetic(),
            kind: VariableKind::Internal { slot },
        };
        scope.push_local(FRAME_ON_STACK_NAME.to_string(), variable);
        scope.frame_on_stack = Some(slot);
        Ok(slot)
    }

    /// Splice the variables of block scope `inlined` into `target`
    ///
    /// Each argument except the block receiver and each local is re-homed
    /// as a local with a fresh slot of `target`. Scopes embedded in
    /// `inlined` are re-parented to `target`, and `inlined` is detached.
    ///
    /// # Panics
    ///
    /// Panics if `inlined` was already merged or is not nested directly in
    /// `target`, or if a variable would be re-homed into a scope that
    /// already holds it.
    pub fn merge_into_scope(
        &mut self,
        target: ScopeId,
        inlined: ScopeId,
    ) -> Result<ScopeAdaptation, ProgramDefinitionError> {
        self.get(target).check_open()?;
        {
            let source = self.get(inlined);
            assert!(source.merged_into.is_none(), "scope merged twice");
            assert_eq!(source.outer, Some(target), "inlined scope must be nested in target");
        }

        let arguments = self.get(inlined).arguments.clone();
        let locals = self.get(inlined).locals.clone();
        let embedded = std::mem::take(&mut self.get_mut(inlined).embedded);

        let mut adaptation = ScopeAdaptation::default();
        let mut rehomed = HashSet::new();
        for (index, argument) in arguments.into_iter().enumerate() {
            if index == 0 {
                adaptation.arguments.push(None);
                continue;
            }
            let slot = self.rehome(target, argument, &mut rehomed);
            adaptation.arguments.push(Some(slot));
        }
        for local in locals {
            let old = match local.kind {
                VariableKind::Local { slot } | VariableKind::Internal { slot } => slot,
                VariableKind::Argument { .. } => continue,
            };
            let slot = self.rehome(target, local, &mut rehomed);
            adaptation.locals.insert(old, slot);
        }

        for child in &embedded {
            self.get_mut(*child).outer = Some(target);
        }
        let target_scope = self.get_mut(target);
        target_scope.embedded.retain(|id| *id != inlined);
        target_scope.embedded.extend(embedded);
        self.get_mut(inlined).merged_into = Some(target);

        log::trace!(
            "merged scope {:?} into {:?}: {} argument(s), {} local(s)",
            inlined,
            target,
            adaptation.arguments.len(),
            adaptation.locals.len()
        );
        Ok(adaptation)
    }

    fn rehome(
        &mut self,
        target: ScopeId,
        variable: Variable,
        rehomed: &mut HashSet<(String, SourceCoordinate)>,
    ) -> usize {
        let scope = self.get_mut(target);
        assert!(
            rehomed.insert(variable.key()) && !scope.contains(&variable),
            "variable '{}' at {} re-homed twice",
            variable.name,
            variable.coord
        );

        let slot = scope.allocate_slot();
        let key = format!("{}@{}", variable.name, variable.coord);
        scope.push_local(
            key,
            Variable {
                kind: VariableKind::Local { slot },
                ..variable
            },
        );
        slot
    }

    /// Close `scope` for declarations and build its frame descriptor
    pub fn freeze(&mut self, scope: ScopeId) -> Arc<FrameDescriptor> {
        let target = self.get_mut(scope);
        target.frozen = true;
        Arc::new(FrameDescriptor::new(target.next_slot))
    }
}
