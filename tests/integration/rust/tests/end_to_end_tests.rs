//! End-to-End Guest Program Tests
//!
//! Compiles small programs through the method compiler and runs them with
//! the default optimizations:
//! - Recursion through self sends and inlined conditionals
//! - Polymorphic sends over a class hierarchy with super sends
//! - Non-local return out of an iteration
//! - User-defined doesNotUnderstand handlers
//! - Instances surviving a change of class shape

use integration_tests::{fibonacci, finder, numbers, sample_shapes, set_fields, shapes, summer};
use interpreter::{MethodCompiler, RuntimeError, Value, VM};

#[test]
fn test_recursive_fibonacci() {
    let vm = VM::new();
    let fib = fibonacci(&vm).unwrap();
    let receiver = vm.new_instance(&fib);
    for (n, expected) in [(0, 0), (1, 1), (10, 55), (20, 6765)] {
        let result = vm.send(receiver.clone(), "fib:", vec![Value::Integer(n)]).unwrap();
        assert_eq!(result, Value::Integer(expected), "fib: {}", n);
    }
}

#[test]
fn test_polymorphic_hierarchy() {
    let vm = VM::new();
    let classes = shapes(&vm).unwrap();
    let summer = summer(&vm).unwrap();
    let items = sample_shapes(&vm, &classes);

    let total = vm
        .send(vm.new_instance(&summer), "total:scale:", vec![items.clone(), Value::Integer(1)])
        .unwrap();
    assert_eq!(total, Value::Integer(20));
    let doubled = vm
        .send(vm.new_instance(&summer), "total:scale:", vec![items, Value::Integer(2)])
        .unwrap();
    assert_eq!(doubled, Value::Integer(40));
}

#[test]
fn test_super_send_reaches_parent() {
    let vm = VM::new();
    let classes = shapes(&vm).unwrap();
    let unit = vm.new_instance(&classes[2]);
    assert_eq!(vm.send(unit, "area", vec![]).unwrap(), Value::Integer(1));
}

#[test]
fn test_find_returns_from_home_method() {
    let vm = VM::new();
    let finder = finder(&vm).unwrap();
    let receiver = vm.new_instance(&finder);
    set_fields(&receiver, &[Value::Integer(0)]);

    let found = vm
        .send(receiver.clone(), "find:in:", vec![Value::Integer(7), numbers(100)])
        .unwrap();
    assert_eq!(found, Value::Integer(7));
    // Elements after the match are never visited
    let seen = receiver.as_object().unwrap().field(0).unwrap();
    assert_eq!(seen, Value::Integer(6));
}

#[test]
fn test_user_defined_does_not_understand() {
    let vm = VM::new();
    let proxy = vm.define_class("Proxy", None, &[]);

    // doesNotUnderstand: selector arguments: args  ^ args size
    let mut c =
        MethodCompiler::method(&vm, &proxy, "doesNotUnderstand:arguments:", &["selector", "args"])
            .unwrap();
    let args = c.read("args").unwrap();
    let size = c.send(args, "size", vec![]).unwrap();
    c.install_returning(vec![], size).unwrap();

    // poke: p  ^ p zork: 1
    let caller = vm.define_class("Caller", None, &[]);
    let mut c = MethodCompiler::method(&vm, &caller, "poke:", &["p"]).unwrap();
    let p = c.read("p").unwrap();
    let one = c.literal(Value::Integer(1));
    let zork = c.send(p, "zork:", vec![one]).unwrap();
    c.install_returning(vec![], zork).unwrap();

    let target = vm.new_instance(&proxy);
    let direct = vm
        .send(target.clone(), "foo:bar:", vec![Value::Integer(1), Value::Integer(2)])
        .unwrap();
    assert_eq!(direct, Value::Integer(2));

    let via = vm.new_instance(&caller);
    for _ in 0..3 {
        let result = vm.send(via.clone(), "poke:", vec![target.clone()]).unwrap();
        assert_eq!(result, Value::Integer(1));
    }

    let err = vm.send(via, "poke:", vec![Value::Integer(3)]).unwrap_err();
    assert!(matches!(err, RuntimeError::DoesNotUnderstand { .. }));
}

#[test]
fn test_instances_follow_class_shape_changes() {
    let vm = VM::new();
    let classes = shapes(&vm).unwrap();
    let summer = summer(&vm).unwrap();
    let items = sample_shapes(&vm, &classes);
    let run = |items: &Value| {
        vm.send(vm.new_instance(&summer), "total:scale:", vec![items.clone(), Value::Integer(1)])
            .unwrap()
    };

    assert_eq!(run(&items), Value::Integer(20));
    classes[0].add_instance_field(vm.symbol("color")).unwrap();
    classes[1].add_instance_field(vm.symbol("color")).unwrap();
    assert_eq!(run(&items), Value::Integer(20));
    assert_eq!(run(&items), Value::Integer(20));
}
