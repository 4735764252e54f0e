//! Micro-benchmarks for message dispatch
//!
//! Each workload compiles a small driver method whose loop body performs
//! the operation under test, so the sends go through real call sites and
//! their caches behave as they would in a program.

use core_types::OptimizationFlags;
use interpreter::{MethodCompiler, SClass, Value, VM};
use std::sync::Arc;

use crate::runner::{check_answer, Benchmark, BenchmarkResult, WorkloadError};

/// Create all micro-benchmarks
pub fn create_benchmarks() -> Vec<Benchmark> {
    vec![
        Benchmark {
            name: "monomorphic_send".to_string(),
            description: "100K sends seeing a single receiver class".to_string(),
            size: 100_000,
            workload: monomorphic_send,
        },
        Benchmark {
            name: "polymorphic_send".to_string(),
            description: "100K sends over four receiver classes".to_string(),
            size: 100_000,
            workload: polymorphic_send,
        },
        Benchmark {
            name: "megamorphic_send".to_string(),
            description: "100K sends over ten receiver classes".to_string(),
            size: 100_000,
            workload: megamorphic_send,
        },
        Benchmark {
            name: "trivial_getter".to_string(),
            description: "100K field getter sends".to_string(),
            size: 100_000,
            workload: trivial_getter,
        },
        Benchmark {
            name: "integer_arithmetic".to_string(),
            description: "100K additions in an inlined to:do: loop".to_string(),
            size: 100_000,
            workload: integer_arithmetic,
        },
        Benchmark {
            name: "non_local_return".to_string(),
            description: "10K searches returning from inside do:".to_string(),
            size: 10_000,
            workload: non_local_return,
        },
    ]
}

/// Run all micro-benchmarks
pub fn run_all(flags: OptimizationFlags) -> Vec<BenchmarkResult> {
    create_benchmarks().iter().map(|b| b.run(flags)).collect()
}

/// Define `count` classes whose instances answer their index to `tag`
fn shapes(vm: &VM, count: usize) -> Result<Vec<Value>, WorkloadError> {
    let mut instances = Vec::with_capacity(count);
    for i in 0..count {
        let class = vm.define_class(&format!("Shape{}", i), None, &[]);
        let mut c = MethodCompiler::method(vm, &class, "tag", &[])?;
        let answer = c.literal(Value::Integer(i as i64));
        c.install_returning(vec![], answer)?;
        instances.push(vm.new_instance(&class));
    }
    Ok(instances)
}

/// Compile `Driver>>run: items times: n`, which sends `selector` to every
/// element of `items` `n` times and sums the answers
fn summing_driver(vm: &VM, selector: &str) -> Result<Arc<SClass>, WorkloadError> {
    let driver = vm.define_class("Driver", None, &[]);
    let mut c = MethodCompiler::method(vm, &driver, "run:times:", &["items", "n"])?;
    c.declare_local("total")?;
    let zero = c.literal(Value::Integer(0));
    let init = c.write("total", zero)?;

    c.begin_block(&["k"])?;
    let items = c.read("items")?;
    c.begin_block(&["each"])?;
    let total = c.read("total")?;
    let each = c.read("each")?;
    let answer = c.send(each, selector, vec![])?;
    let sum = c.send(total, "+", vec![answer])?;
    let store = c.write("total", sum)?;
    let per_item = c.end_block(vec![store])?;
    let sweep = c.send(items, "do:", vec![per_item])?;
    let round = c.end_block(vec![sweep])?;

    let one = c.literal(Value::Integer(1));
    let n = c.read("n")?;
    let rounds = c.send(one, "to:do:", vec![n, round])?;
    let result = c.read("total")?;
    c.install_returning(vec![init, rounds], result)?;
    Ok(driver)
}

fn run_shapes(vm: &VM, size: u64, count: usize) -> Result<Value, WorkloadError> {
    let items = shapes(vm, count)?;
    let driver = summing_driver(vm, "tag")?;
    let rounds = size / count as u64;
    let per_round: i64 = (0..count as i64).sum();
    let answer = vm.send(
        vm.new_instance(&driver),
        "run:times:",
        vec![Value::array(items), Value::Integer(rounds as i64)],
    )?;
    check_answer(answer, Value::Integer(per_round * rounds as i64))
}

fn monomorphic_send(vm: &VM, size: u64) -> Result<Value, WorkloadError> {
    run_shapes(vm, size, 1)
}

fn polymorphic_send(vm: &VM, size: u64) -> Result<Value, WorkloadError> {
    run_shapes(vm, size, 4)
}

fn megamorphic_send(vm: &VM, size: u64) -> Result<Value, WorkloadError> {
    run_shapes(vm, size, 10)
}

fn trivial_getter(vm: &VM, size: u64) -> Result<Value, WorkloadError> {
    let point = vm.define_class("Point", None, &["x"]);
    let mut c = MethodCompiler::method(vm, &point, "x", &[])?;
    let x = c.read("x")?;
    c.install_returning(vec![], x)?;

    let p = vm.new_instance(&point);
    if let Some(object) = p.as_object() {
        object.set_field(0, Value::Integer(2))?;
    }
    let driver = summing_driver(vm, "x")?;
    let answer = vm.send(
        vm.new_instance(&driver),
        "run:times:",
        vec![Value::array(vec![p]), Value::Integer(size as i64)],
    )?;
    check_answer(answer, Value::Integer(2 * size as i64))
}

fn integer_arithmetic(vm: &VM, size: u64) -> Result<Value, WorkloadError> {
    let class = vm.define_class("Summer", None, &[]);
    let mut c = MethodCompiler::method(vm, &class, "sum:", &["n"])?;
    c.declare_local("total")?;
    let zero = c.literal(Value::Integer(0));
    let init = c.write("total", zero)?;
    c.begin_block(&["i"])?;
    let total = c.read("total")?;
    let i = c.read("i")?;
    let sum = c.send(total, "+", vec![i])?;
    let store = c.write("total", sum)?;
    let body = c.end_block(vec![store])?;
    let one = c.literal(Value::Integer(1));
    let n = c.read("n")?;
    let each = c.send(one, "to:do:", vec![n, body])?;
    let result = c.read("total")?;
    c.install_returning(vec![init, each], result)?;

    let n = size as i64;
    let answer = vm.send(vm.new_instance(&class), "sum:", vec![Value::Integer(n)])?;
    check_answer(answer, Value::Integer(n * (n + 1) / 2))
}

fn non_local_return(vm: &VM, size: u64) -> Result<Value, WorkloadError> {
    let class = vm.define_class("Finder", None, &[]);

    // find: target in: array
    //     array do: [:e | e = target ifTrue: [^ e]].
    //     ^ nil
    let mut c = MethodCompiler::method(vm, &class, "find:in:", &["target", "array"])?;
    c.begin_block(&["e"])?;
    let e = c.read("e")?;
    let target = c.read("target")?;
    let hit = c.send(e, "=", vec![target])?;
    c.begin_block(&[])?;
    let found = c.read("e")?;
    let ret = c.ret(found)?;
    let on_hit = c.end_block(vec![ret])?;
    let check = c.send(hit, "ifTrue:", vec![on_hit])?;
    let body = c.end_block(vec![check])?;
    let array = c.read("array")?;
    let each = c.send(array, "do:", vec![body])?;
    let nil = c.literal(Value::Nil);
    c.install_returning(vec![each], nil)?;

    let haystack = Value::array((1..=20).map(Value::Integer).collect());
    let finder = vm.new_instance(&class);
    let mut last = Value::Nil;
    for i in 0..size {
        let target = Value::Integer((i % 20) as i64 + 1);
        last = vm.send(finder.clone(), "find:in:", vec![target, haystack.clone()])?;
    }
    check_answer(last, Value::Integer(((size - 1) % 20) as i64 + 1))
}
