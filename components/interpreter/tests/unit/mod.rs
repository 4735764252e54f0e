//! Unit tests for interpreter components

use interpreter::{
    CacheChain, CacheEntry, CacheState, CachedAction, DispatchGuard, EntryKind, Expr, Method,
    MethodCompiler, OptimizationFlags, ProgramDefinitionError, RuntimeError, ScopeArena,
    SourceCoordinate, TrivialExpr, Value, VM,
};
use std::sync::Arc;

// ============================================================================
// VM Tests
// ============================================================================

#[test]
fn test_vm_creation() {
    let vm = VM::new();
    assert!(vm.flags().inline_caching);
    assert!(vm.global(&vm.symbol("Object")).is_some());
    assert!(vm.global(&vm.symbol("Undefined")).is_none());
}

#[test]
fn test_vm_global_variables() {
    let vm = VM::new();
    vm.set_global("Answer", Value::Integer(42));
    vm.set_global("Pi", Value::Double(2.5));
    assert_eq!(vm.global(&vm.symbol("Answer")), Some(Value::Integer(42)));
    assert_eq!(vm.global(&vm.symbol("Pi")), Some(Value::Double(2.5)));
}

#[test]
fn test_vm_global_overwrite() {
    let vm = VM::new();
    vm.set_global("X", Value::Integer(10));
    vm.set_global("X", Value::Integer(20));
    assert_eq!(vm.global(&vm.symbol("X")), Some(Value::Integer(20)));
}

#[test]
fn test_vm_class_new_primitive() {
    let vm = VM::new();
    let point = vm.define_class("Point", None, &["x", "y"]);
    let instance = vm.send(Value::Class(Arc::clone(&point)), "new", vec![]).unwrap();
    let object = instance.as_object().unwrap();
    assert!(Arc::ptr_eq(object.class(), &point));
    assert_eq!(object.field_count(), 2);
}

// ============================================================================
// Primitive Tests
// ============================================================================

#[test]
fn test_integer_overflow_promotes() {
    let vm = VM::new();
    let big = vm.send(Value::Integer(i64::MAX), "+", vec![Value::Integer(1)]).unwrap();
    assert!(matches!(big, Value::BigInteger(_)));
    let back = vm.send(big, "-", vec![Value::Integer(1)]).unwrap();
    assert_eq!(back, Value::Integer(i64::MAX));
}

#[test]
fn test_integer_division_rounds_down() {
    let vm = VM::new();
    let q = vm.send(Value::Integer(-7), "//", vec![Value::Integer(2)]).unwrap();
    assert_eq!(q, Value::Integer(-4));
    let r = vm.send(Value::Integer(-7), "\\\\", vec![Value::Integer(2)]).unwrap();
    assert_eq!(r, Value::Integer(1));
}

#[test]
fn test_mixed_arithmetic() {
    let vm = VM::new();
    let sum = vm.send(Value::Integer(1), "+", vec![Value::Double(0.5)]).unwrap();
    assert_eq!(sum, Value::Double(1.5));
    let lt = vm.send(Value::Double(0.5), "<", vec![Value::Integer(1)]).unwrap();
    assert_eq!(lt, Value::Boolean(true));
}

#[test]
fn test_array_primitives() {
    let vm = VM::new();
    let array = Value::array(vec![Value::Integer(1), Value::Integer(2)]);
    assert_eq!(vm.send(array.clone(), "size", vec![]).unwrap(), Value::Integer(2));
    assert_eq!(vm.send(array.clone(), "at:", vec![Value::Integer(2)]).unwrap(), Value::Integer(2));
    let err = vm.send(array, "at:", vec![Value::Integer(3)]).unwrap_err();
    assert!(matches!(err, RuntimeError::IndexOutOfBounds { index: 3, size: 2 }));
}

#[test]
fn test_string_primitives() {
    let vm = VM::new();
    let joined = vm.send(Value::string("ab"), ",", vec![Value::string("cd")]).unwrap();
    assert_eq!(joined, Value::string("abcd"));
    assert_eq!(vm.send(joined, "size", vec![]).unwrap(), Value::Integer(4));
}

// ============================================================================
// Inline Cache Tests
// ============================================================================

fn literal_entry(vm: &VM, receiver: &Value) -> CacheEntry {
    CacheEntry::new(
        DispatchGuard::for_receiver(receiver, vm),
        CachedAction::Trivial(TrivialExpr::Literal(Value::Integer(1))),
    )
}

#[test]
fn test_cache_chain_generic_past_limit() {
    let vm = VM::new();
    let receivers = [
        Value::Integer(1),
        Value::Double(1.0),
        Value::Nil,
        Value::Boolean(true),
        Value::Boolean(false),
        Value::string("s"),
        Value::array(vec![]),
    ];
    let mut chain = CacheChain::empty();
    for receiver in &receivers[..6] {
        chain = chain.with_appended(literal_entry(&vm, receiver), 6);
    }
    assert_eq!(chain.state(), CacheState::Polymorphic(6));
    chain = chain.with_appended(literal_entry(&vm, &receivers[6]), 6);
    assert_eq!(chain.state(), CacheState::Megamorphic);
    assert!(chain.is_empty());
}

#[test]
fn test_cache_chain_without_keeps_order() {
    let vm = VM::new();
    let chain = CacheChain::empty()
        .with_appended(literal_entry(&vm, &Value::Integer(1)), 6)
        .with_appended(
            CacheEntry::new(
                DispatchGuard::for_receiver(&Value::Nil, &vm),
                CachedAction::DoesNotUnderstand(Arc::clone(&vm.core().nil)),
            ),
            6,
        )
        .with_appended(literal_entry(&vm, &Value::Double(2.0)), 6);
    let shorter = chain.without(0);
    assert_eq!(shorter.kinds(), vec![EntryKind::Miss, EntryKind::Trivial]);
    assert_eq!(chain.len(), 3);
}

#[test]
fn test_layout_guard_rejects_other_classes() {
    let vm = VM::new();
    let a = vm.define_class("A", None, &[]);
    let b = vm.define_class("B", None, &[]);
    let guard = DispatchGuard::for_receiver(&vm.new_instance(&a), &vm);
    assert_eq!(guard.matches(&vm.new_instance(&a), &vm), Ok(true));
    assert_eq!(guard.matches(&vm.new_instance(&b), &vm), Ok(false));
    assert_eq!(guard.matches(&Value::Integer(1), &vm), Ok(false));
}

// ============================================================================
// Scope Tests
// ============================================================================

#[test]
fn test_scope_lookup_levels() {
    let mut arena = ScopeArena::new();
    let method = arena.new_method_scope("T>>run");
    arena.add_argument(method, "self", SourceCoordinate::new(1, 1)).unwrap();
    arena.add_local(method, "a", SourceCoordinate::new(1, 2)).unwrap();
    let block = arena.new_block_scope(method, "T>>run[]");
    arena
        .add_argument(block, "$blockSelf", SourceCoordinate::synthetic())
        .unwrap();

    let resolved = arena.lookup(block, "a").unwrap();
    assert_eq!(resolved.context_level, 1);
    assert!(arena.get(block).accesses_outer());
    assert!(!arena.get(method).accesses_outer());
    assert!(arena.lookup(block, "b").is_none());
}

#[test]
fn test_scope_self_must_come_first() {
    let mut arena = ScopeArena::new();
    let method = arena.new_method_scope("T>>at:");
    let err = arena.add_argument(method, "index", SourceCoordinate::new(1, 1)).unwrap_err();
    assert!(matches!(err, ProgramDefinitionError::SelfNotFirstArgument { .. }));
}

#[test]
fn test_frozen_scope_rejects_declarations() {
    let mut arena = ScopeArena::new();
    let method = arena.new_method_scope("T>>run");
    arena.add_argument(method, "self", SourceCoordinate::new(1, 1)).unwrap();
    let descriptor = arena.freeze(method);
    assert_eq!(descriptor.slot_count(), 0);
    assert!(matches!(
        arena.add_local(method, "late", SourceCoordinate::new(2, 1)),
        Err(ProgramDefinitionError::ScopeFrozen { .. })
    ));
}

#[test]
fn test_merge_rehomes_block_variables() {
    let mut arena = ScopeArena::new();
    let method = arena.new_method_scope("T>>run");
    arena.add_argument(method, "self", SourceCoordinate::new(1, 1)).unwrap();
    arena.add_local(method, "a", SourceCoordinate::new(1, 2)).unwrap();
    let block = arena.new_block_scope(method, "T>>run[]");
    arena
        .add_argument(block, "$blockSelf", SourceCoordinate::synthetic())
        .unwrap();
    arena.add_argument(block, "i", SourceCoordinate::new(2, 1)).unwrap();
    arena.add_local(block, "t", SourceCoordinate::new(2, 2)).unwrap();

    let adaptation = arena.merge_into_scope(method, block).unwrap();
    assert_eq!(adaptation.argument_slot(0), None);
    assert_eq!(adaptation.argument_slot(1), Some(1));
    assert_eq!(adaptation.local_slot(0), Some(2));
    assert_eq!(arena.get(method).slot_count(), 3);
    assert_eq!(arena.get(block).merged_into(), Some(method));
}

// ============================================================================
// Compiler Tests
// ============================================================================

#[test]
fn test_compiler_rejects_duplicate_names() {
    let vm = VM::new();
    let class = vm.define_class("T", None, &[]);
    let err = MethodCompiler::method(&vm, &class, "a:b:", &["x", "x"]).err().unwrap();
    assert!(matches!(err, ProgramDefinitionError::DuplicateArgument { .. }));

    let mut c = MethodCompiler::method(&vm, &class, "run", &[]).unwrap();
    c.declare_local("t").unwrap();
    assert!(matches!(
        c.declare_local("t"),
        Err(ProgramDefinitionError::DuplicateLocal { .. })
    ));
}

#[test]
fn test_compiler_reports_unresolved_line() {
    let vm = VM::new();
    let class = vm.define_class("T", None, &[]);
    let mut c = MethodCompiler::method(&vm, &class, "run", &[]).unwrap();
    c.at_line(12);
    match c.read("ghost") {
        Err(ProgramDefinitionError::UnresolvedVariable { name, coord }) => {
            assert_eq!(name, "ghost");
            assert_eq!(coord.line, 12);
        }
        other => panic!("expected an unresolved variable, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_compiled_getter_is_trivial() {
    let vm = VM::new();
    let class = vm.define_class("T", None, &["x"]);
    let mut c = MethodCompiler::method(&vm, &class, "x", &[]).unwrap();
    let x = c.read("x").unwrap();
    let method: Arc<Method> = c.install_returning(vec![], x).unwrap();
    assert!(matches!(method.trivial(), Some(TrivialExpr::FieldRead(0))));
    assert!(class.understands(&vm.symbol("x")));
}

#[test]
fn test_early_return_at_method_level() {
    let vm = VM::new();
    let class = vm.define_class("T", None, &[]);

    // pick: flag  flag ifTrue: [^ 1]. ^ 2
    let mut c = MethodCompiler::method(&vm, &class, "pick:", &["flag"]).unwrap();
    let flag = c.read("flag").unwrap();
    c.begin_block(&[]).unwrap();
    let one = c.literal(Value::Integer(1));
    let early = c.ret(one).unwrap();
    let branch = c.end_block(vec![early]).unwrap();
    let test = c.send(flag, "ifTrue:", vec![branch]).unwrap();
    assert!(matches!(test, Expr::IfInlined { .. }));
    let two = c.literal(Value::Integer(2));
    c.install_returning(vec![test], two).unwrap();

    let object = vm.new_instance(&class);
    assert_eq!(vm.send(object.clone(), "pick:", vec![Value::Boolean(true)]).unwrap(), Value::Integer(1));
    assert_eq!(vm.send(object, "pick:", vec![Value::Boolean(false)]).unwrap(), Value::Integer(2));
}

#[test]
fn test_while_loop_inlined() {
    let vm = VM::new();
    let class = vm.define_class("T", None, &[]);

    // countTo: n  | i | i := 0. [i < n] whileTrue: [i := i + 1]. ^ i
    let mut c = MethodCompiler::method(&vm, &class, "countTo:", &["n"]).unwrap();
    c.declare_local("i").unwrap();
    let zero = c.literal(Value::Integer(0));
    let init = c.write("i", zero).unwrap();
    c.begin_block(&[]).unwrap();
    let i = c.read("i").unwrap();
    let n = c.read("n").unwrap();
    let test = c.send(i, "<", vec![n]).unwrap();
    let condition = c.end_block(vec![test]).unwrap();
    c.begin_block(&[]).unwrap();
    let i = c.read("i").unwrap();
    let one = c.literal(Value::Integer(1));
    let next = c.send(i, "+", vec![one]).unwrap();
    let step = c.write("i", next).unwrap();
    let body = c.end_block(vec![step]).unwrap();
    let each = c.send(condition, "whileTrue:", vec![body]).unwrap();
    assert!(matches!(each, Expr::WhileInlined { expected: true, .. }));
    let result = c.read("i").unwrap();
    c.install_returning(vec![init, each], result).unwrap();

    let answer = vm
        .send(vm.new_instance(&class), "countTo:", vec![Value::Integer(25)])
        .unwrap();
    assert_eq!(answer, Value::Integer(25));
}

#[test]
fn test_super_send_starts_above_holder() {
    let vm = VM::new();
    let base = vm.define_class("Base", None, &[]);
    let derived = vm.define_class("Derived", Some(&base), &[]);

    let mut c = MethodCompiler::method(&vm, &base, "describe", &[]).unwrap();
    let one = c.literal(Value::Integer(1));
    c.install_returning(vec![], one).unwrap();

    // describe  ^ super describe + 10
    let mut c = MethodCompiler::method(&vm, &derived, "describe", &[]).unwrap();
    let inherited = c.super_send("describe", vec![]).unwrap();
    let ten = c.literal(Value::Integer(10));
    let sum = c.send(inherited, "+", vec![ten]).unwrap();
    c.install_returning(vec![], sum).unwrap();

    let answer = vm.send(vm.new_instance(&derived), "describe", vec![]).unwrap();
    assert_eq!(answer, Value::Integer(11));
}

#[test]
fn test_unknown_global_fails_at_run_time() {
    let vm = VM::new();
    let class = vm.define_class("T", None, &[]);
    let mut c = MethodCompiler::method(&vm, &class, "run", &[]).unwrap();
    let missing = c.read("Missing").unwrap();
    c.install_returning(vec![], missing).unwrap();
    let err = vm.send(vm.new_instance(&class), "run", vec![]).unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownGlobal { .. }));

    vm.set_global("Missing", Value::Integer(5));
    assert_eq!(vm.send(vm.new_instance(&class), "run", vec![]).unwrap(), Value::Integer(5));
}

#[test]
fn test_flags_disable_every_optimization() {
    let flags = OptimizationFlags::default()
        .with_inline_caching(false)
        .with_eager_specialization(false)
        .with_block_inlining(false)
        .with_trivial_method_inlining(false)
        .with_blocks_without_context(false);
    let vm = VM::with_flags(flags);
    let sum = vm.send(Value::Integer(2), "+", vec![Value::Integer(3)]).unwrap();
    assert_eq!(sum, Value::Integer(5));
}
