//! Integration tests for interpreter
//!
//! Tests interaction between the method compiler, activations, closures
//! and message dispatch.

use interpreter::{MethodBody, MethodCompiler, OptimizationFlags, SClass, SlotKind, Value, VM};
use std::sync::Arc;

/// `Maker>>makeAdder: n` answering `[:x | x + n]`
fn adder_maker(vm: &VM) -> Arc<SClass> {
    let class = vm.define_class("Maker", None, &[]);
    let mut c = MethodCompiler::method(vm, &class, "makeAdder:", &["n"]).unwrap();
    c.begin_block(&["x"]).unwrap();
    let x = c.read("x").unwrap();
    let n = c.read("n").unwrap();
    let sum = c.send(x, "+", vec![n]).unwrap();
    let block = c.end_block(vec![sum]).unwrap();
    c.install_returning(vec![], block).unwrap();
    class
}

/// `Maker>>makeCounter` answering a block over a fresh `count` local
fn counter_maker(vm: &VM, class: &Arc<SClass>) {
    let mut c = MethodCompiler::method(vm, class, "makeCounter", &[]).unwrap();
    c.declare_local("count").unwrap();
    let zero = c.literal(Value::Integer(0));
    let init = c.write("count", zero).unwrap();
    c.begin_block(&[]).unwrap();
    let count = c.read("count").unwrap();
    let one = c.literal(Value::Integer(1));
    let next = c.send(count, "+", vec![one]).unwrap();
    let store = c.write("count", next).unwrap();
    let block = c.end_block(vec![store]).unwrap();
    c.install_returning(vec![init], block).unwrap();
}

// ============================================================================
// Closures outliving their activation
// ============================================================================

#[test]
fn test_escaped_block_reads_captured_argument() {
    let vm = VM::new();
    let maker = adder_maker(&vm);
    let m = vm.new_instance(&maker);

    let add3 = vm.send(m.clone(), "makeAdder:", vec![Value::Integer(3)]).unwrap();
    let add10 = vm.send(m, "makeAdder:", vec![Value::Integer(10)]).unwrap();

    assert_eq!(vm.send(add3.clone(), "value:", vec![Value::Integer(4)]).unwrap(), Value::Integer(7));
    assert_eq!(vm.send(add10, "value:", vec![Value::Integer(4)]).unwrap(), Value::Integer(14));
    assert_eq!(vm.send(add3, "value:", vec![Value::Integer(0)]).unwrap(), Value::Integer(3));
}

#[test]
fn test_escaped_block_updates_captured_local() {
    let vm = VM::new();
    let maker = adder_maker(&vm);
    counter_maker(&vm, &maker);
    let m = vm.new_instance(&maker);

    let first = vm.send(m.clone(), "makeCounter", vec![]).unwrap();
    let second = vm.send(m, "makeCounter", vec![]).unwrap();

    for _ in 0..2 {
        vm.send(first.clone(), "value", vec![]).unwrap();
    }
    assert_eq!(vm.send(first, "value", vec![]).unwrap(), Value::Integer(3));
    // Each activation owns its own count
    assert_eq!(vm.send(second, "value", vec![]).unwrap(), Value::Integer(1));
}

#[test]
fn test_block_passed_to_user_method() {
    let vm = VM::new();
    let maker = adder_maker(&vm);

    // apply: blk to: x  ^ blk value: x
    let applier = vm.define_class("Applier", None, &[]);
    let mut c = MethodCompiler::method(&vm, &applier, "apply:to:", &["blk", "x"]).unwrap();
    let blk = c.read("blk").unwrap();
    let x = c.read("x").unwrap();
    let call = c.send(blk, "value:", vec![x]).unwrap();
    c.install_returning(vec![], call).unwrap();

    let add5 = vm
        .send(vm.new_instance(&maker), "makeAdder:", vec![Value::Integer(5)])
        .unwrap();
    let a = vm.new_instance(&applier);
    for i in 0..4 {
        let result = vm
            .send(a.clone(), "apply:to:", vec![add5.clone(), Value::Integer(i)])
            .unwrap();
        assert_eq!(result, Value::Integer(i + 5));
    }
}

// ============================================================================
// Context capture
// ============================================================================

fn constant_block_class(vm: &VM) -> Arc<SClass> {
    let class = vm.define_class("Constant", None, &[]);
    let mut c = MethodCompiler::method(vm, &class, "block", &[]).unwrap();
    c.begin_block(&[]).unwrap();
    let answer = c.literal(Value::Integer(42));
    let block = c.end_block(vec![answer]).unwrap();
    c.install_returning(vec![], block).unwrap();
    class
}

#[test]
fn test_block_without_outer_reads_has_no_context() {
    let vm = VM::new();
    let class = constant_block_class(&vm);
    let block = vm.send(vm.new_instance(&class), "block", vec![]).unwrap();

    assert!(block.as_block().unwrap().context().is_none());
    assert_eq!(vm.send(block, "value", vec![]).unwrap(), Value::Integer(42));
}

#[test]
fn test_context_kept_when_optimization_disabled() {
    let vm = VM::with_flags(OptimizationFlags::default().with_blocks_without_context(false));
    let class = constant_block_class(&vm);
    let block = vm.send(vm.new_instance(&class), "block", vec![]).unwrap();

    assert!(block.as_block().unwrap().context().is_some());
    assert_eq!(vm.send(block, "value", vec![]).unwrap(), Value::Integer(42));
}

#[test]
fn test_capturing_block_keeps_context() {
    let vm = VM::new();
    let maker = adder_maker(&vm);
    let block = vm
        .send(vm.new_instance(&maker), "makeAdder:", vec![Value::Integer(1)])
        .unwrap();

    let block = block.as_block().unwrap();
    assert_eq!(block.parameter_count(), 1);
    let context = block.context().unwrap();
    assert_eq!(context.argument(1).unwrap(), Value::Integer(1));
}

// ============================================================================
// Non-local return across activations
// ============================================================================

#[test]
fn test_non_local_return_through_intermediate_method() {
    let vm = VM::new();
    let class = vm.define_class("Outer", None, &[]);

    // helper: blk  blk value. ^ 1
    let mut c = MethodCompiler::method(&vm, &class, "helper:", &["blk"]).unwrap();
    let blk = c.read("blk").unwrap();
    let call = c.send(blk, "value", vec![]).unwrap();
    let one = c.literal(Value::Integer(1));
    c.install_returning(vec![call], one).unwrap();

    // run  self helper: [^ 7]. ^ 0
    let mut c = MethodCompiler::method(&vm, &class, "run", &[]).unwrap();
    let receiver = c.self_read();
    c.begin_block(&[]).unwrap();
    let seven = c.literal(Value::Integer(7));
    let ret = c.ret(seven).unwrap();
    let block = c.end_block(vec![ret]).unwrap();
    let call = c.send(receiver, "helper:", vec![block]).unwrap();
    let zero = c.literal(Value::Integer(0));
    c.install_returning(vec![call], zero).unwrap();

    let outer = vm.new_instance(&class);
    assert_eq!(vm.send(outer.clone(), "run", vec![]).unwrap(), Value::Integer(7));
    // The home activation is gone afterwards, a second run gets a new one
    assert_eq!(vm.send(outer, "run", vec![]).unwrap(), Value::Integer(7));
}

// ============================================================================
// Frame slot kinds
// ============================================================================

#[test]
fn test_slot_kind_widens_on_mixed_writes() {
    let vm = VM::new();
    let class = vm.define_class("Holder", None, &[]);

    // keep: x  | last | last := x. ^ last
    let mut c = MethodCompiler::method(&vm, &class, "keep:", &["x"]).unwrap();
    c.declare_local("last").unwrap();
    let x = c.read("x").unwrap();
    let store = c.write("last", x).unwrap();
    let last = c.read("last").unwrap();
    c.install_returning(vec![store], last).unwrap();

    let method = class.local_method(&vm.symbol("keep:")).unwrap();
    let descriptor = match method.body() {
        MethodBody::Ast(body) => Arc::clone(&body.descriptor),
        MethodBody::Primitive(_) => panic!("compiled method expected"),
    };
    assert_eq!(descriptor.kind(0), Some(SlotKind::Uninitialized));

    let h = vm.new_instance(&class);
    vm.send(h.clone(), "keep:", vec![Value::Integer(1)]).unwrap();
    vm.send(h.clone(), "keep:", vec![Value::Integer(2)]).unwrap();
    assert_eq!(descriptor.kind(0), Some(SlotKind::Long));

    assert_eq!(vm.send(h.clone(), "keep:", vec![Value::Double(2.5)]).unwrap(), Value::Double(2.5));
    assert_eq!(descriptor.kind(0), Some(SlotKind::Generic));

    vm.send(h, "keep:", vec![Value::Integer(3)]).unwrap();
    assert_eq!(descriptor.kind(0), Some(SlotKind::Generic));
}

// ============================================================================
// Global reads
// ============================================================================

/// `Config>>limit` answering the global `Limit`
fn limit_reader(vm: &VM) -> Arc<SClass> {
    let class = vm.define_class("Config", None, &[]);
    let mut c = MethodCompiler::method(vm, &class, "limit", &[]).unwrap();
    let limit = c.read("Limit").unwrap();
    c.install_returning(vec![], limit).unwrap();
    class
}

#[test]
fn test_compiled_global_read_follows_rebinding() {
    for caching in [true, false] {
        let vm = VM::with_flags(OptimizationFlags::default().with_global_caching(caching));
        let config = vm.new_instance(&limit_reader(&vm));

        assert!(vm.send(config.clone(), "limit", vec![]).is_err());
        vm.set_global("Limit", Value::Integer(10));
        assert_eq!(vm.send(config.clone(), "limit", vec![]).unwrap(), Value::Integer(10));
        vm.set_global("Limit", Value::Integer(20));
        assert_eq!(
            vm.send(config, "limit", vec![]).unwrap(),
            Value::Integer(20),
            "global caching {}",
            caching
        );
    }
}

#[test]
fn test_class_redefinition_is_seen_by_cached_read() {
    let vm = VM::new();
    let class = vm.define_class("Factory", None, &[]);
    let mut c = MethodCompiler::method(&vm, &class, "product", &[]).unwrap();
    let product = c.read("Product").unwrap();
    c.install_returning(vec![], product).unwrap();
    let factory = vm.new_instance(&class);

    let first = vm.define_class("Product", None, &[]);
    let got = vm.send(factory.clone(), "product", vec![]).unwrap();
    assert_eq!(got, Value::Class(Arc::clone(&first)));

    let second = vm.define_class("Product", None, &["serial"]);
    let got = vm.send(factory, "product", vec![]).unwrap();
    assert_eq!(got, Value::Class(second));
}
