//! Integration test suite for the Sable interpreter
//!
//! This crate provides small guest programs, built through the method
//! compiler, that the integration tests run across component boundaries
//! and under different optimization settings.

use core_types::ProgramDefinitionError;
use interpreter::{Expr, MethodCompiler, SClass, Value, VM};
use std::sync::Arc;

/// Re-export components for test convenience
pub mod components {
    pub use benchmarks;
    pub use core_types;
    pub use interpreter;
}

type Built<T> = Result<T, ProgramDefinitionError>;

/// `Fib>>fib: n`
///
/// ```text
/// fib: n
///     ^ n < 2 ifTrue: [n] ifFalse: [(self fib: n - 1) + (self fib: n - 2)]
/// ```
pub fn fibonacci(vm: &VM) -> Built<Arc<SClass>> {
    let class = vm.define_class("Fib", None, &[]);
    let mut c = MethodCompiler::method(vm, &class, "fib:", &["n"])?;
    let n = c.read("n")?;
    let two = c.literal(Value::Integer(2));
    let small = c.send(n, "<", vec![two])?;

    c.begin_block(&[])?;
    let n = c.read("n")?;
    let base = c.end_block(vec![n])?;

    c.begin_block(&[])?;
    let first = fib_of_n_minus(&mut c, 1)?;
    let second = fib_of_n_minus(&mut c, 2)?;
    let sum = c.send(first, "+", vec![second])?;
    let recurse = c.end_block(vec![sum])?;

    let choice = c.send(small, "ifTrue:ifFalse:", vec![base, recurse])?;
    c.install_returning(vec![], choice)?;
    Ok(class)
}

fn fib_of_n_minus(c: &mut MethodCompiler<'_>, k: i64) -> Built<Expr> {
    let receiver = c.self_read();
    let n = c.read("n")?;
    let k = c.literal(Value::Integer(k));
    let smaller = c.send(n, "-", vec![k])?;
    c.send(receiver, "fib:", vec![smaller])
}

/// `Finder>>find: target in: array`, counting visited elements in `seen`
///
/// ```text
/// find: target in: array
///     array do: [:e | e = target ifTrue: [^ e]. seen := seen + 1].
///     ^ nil
/// ```
pub fn finder(vm: &VM) -> Built<Arc<SClass>> {
    let class = vm.define_class("Finder", None, &["seen"]);
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
    let seen = c.read("seen")?;
    let one = c.literal(Value::Integer(1));
    let more = c.send(seen, "+", vec![one])?;
    let count = c.write("seen", more)?;
    let body = c.end_block(vec![check, count])?;

    let array = c.read("array")?;
    let each = c.send(array, "do:", vec![body])?;
    let nil = c.literal(Value::Nil);
    c.install_returning(vec![each], nil)?;
    Ok(class)
}

/// Shape hierarchy
///
/// ```text
/// Shape>>area               ^ 0
/// Shape>>scaled: k          ^ self area * k
/// Square(side)>>area        ^ side * side
/// Rect(w h)>>area           ^ w * h
/// Unit>>area                ^ super area + 1
/// ```
///
/// Answers the concrete classes in the order Square, Rect, Unit.
pub fn shapes(vm: &VM) -> Built<Vec<Arc<SClass>>> {
    let shape = vm.define_class("Shape", None, &[]);
    let mut c = MethodCompiler::method(vm, &shape, "area", &[])?;
    let zero = c.literal(Value::Integer(0));
    c.install_returning(vec![], zero)?;

    let mut c = MethodCompiler::method(vm, &shape, "scaled:", &["k"])?;
    let receiver = c.self_read();
    let area = c.send(receiver, "area", vec![])?;
    let k = c.read("k")?;
    let product = c.send(area, "*", vec![k])?;
    c.install_returning(vec![], product)?;

    let square = vm.define_class("Square", Some(&shape), &["side"]);
    let mut c = MethodCompiler::method(vm, &square, "area", &[])?;
    let side = c.read("side")?;
    let again = c.read("side")?;
    let product = c.send(side, "*", vec![again])?;
    c.install_returning(vec![], product)?;

    let rect = vm.define_class("Rect", Some(&shape), &["w", "h"]);
    let mut c = MethodCompiler::method(vm, &rect, "area", &[])?;
    let w = c.read("w")?;
    let h = c.read("h")?;
    let product = c.send(w, "*", vec![h])?;
    c.install_returning(vec![], product)?;

    let unit = vm.define_class("Unit", Some(&shape), &[]);
    let mut c = MethodCompiler::method(vm, &unit, "area", &[])?;
    let inherited = c.super_send("area", vec![])?;
    let one = c.literal(Value::Integer(1));
    let sum = c.send(inherited, "+", vec![one])?;
    c.install_returning(vec![], sum)?;

    Ok(vec![square, rect, unit])
}

/// `Summer>>total: shapes scale: k`
///
/// ```text
/// total: shapes scale: k
///     | sum |
///     sum := 0.
///     shapes do: [:s | sum := sum + (s scaled: k)].
///     ^ sum
/// ```
pub fn summer(vm: &VM) -> Built<Arc<SClass>> {
    let class = vm.define_class("Summer", None, &[]);
    let mut c = MethodCompiler::method(vm, &class, "total:scale:", &["shapes", "k"])?;
    c.declare_local("sum")?;
    let zero = c.literal(Value::Integer(0));
    let init = c.write("sum", zero)?;

    c.begin_block(&["s"])?;
    let sum = c.read("sum")?;
    let s = c.read("s")?;
    let k = c.read("k")?;
    let scaled = c.send(s, "scaled:", vec![k])?;
    let added = c.send(sum, "+", vec![scaled])?;
    let store = c.write("sum", added)?;
    let body = c.end_block(vec![store])?;

    let shapes = c.read("shapes")?;
    let each = c.send(shapes, "do:", vec![body])?;
    let result = c.read("sum")?;
    c.install_returning(vec![init, each], result)?;
    Ok(class)
}

/// `Tally>>steps: n`, adding the global `Step` once per iteration
///
/// ```text
/// steps: n
///     | count pending |
///     count := 0.
///     1 to: n do: [:i | pending isNil ifTrue: [count := count + Step]. pending := nil].
///     ^ count
/// ```
///
/// `pending` is read before anything was assigned to it.
pub fn tally(vm: &VM) -> Built<Arc<SClass>> {
    let class = vm.define_class("Tally", None, &[]);
    let mut c = MethodCompiler::method(vm, &class, "steps:", &["n"])?;
    c.declare_local("count")?;
    c.declare_local("pending")?;
    let zero = c.literal(Value::Integer(0));
    let init = c.write("count", zero)?;

    c.begin_block(&["i"])?;
    let pending = c.read("pending")?;
    let unset = c.send(pending, "isNil", vec![])?;
    c.begin_block(&[])?;
    let count = c.read("count")?;
    let step = c.read("Step")?;
    let added = c.send(count, "+", vec![step])?;
    let store = c.write("count", added)?;
    let bump = c.end_block(vec![store])?;
    let check = c.send(unset, "ifTrue:", vec![bump])?;
    let nil = c.read("nil")?;
    let reset = c.write("pending", nil)?;
    let body = c.end_block(vec![check, reset])?;

    let one = c.literal(Value::Integer(1));
    let n = c.read("n")?;
    let loop_ = c.send(one, "to:do:", vec![n, body])?;
    let result = c.read("count")?;
    c.install_returning(vec![init, loop_], result)?;
    Ok(class)
}

/// Instances of the classes from [`shapes`]: a 3-square, a 2x5 rect and a
/// unit, whose areas add up to 20
pub fn sample_shapes(vm: &VM, classes: &[Arc<SClass>]) -> Value {
    let square = vm.new_instance(&classes[0]);
    set_fields(&square, &[Value::Integer(3)]);
    let rect = vm.new_instance(&classes[1]);
    set_fields(&rect, &[Value::Integer(2), Value::Integer(5)]);
    let unit = vm.new_instance(&classes[2]);
    Value::array(vec![square, rect, unit])
}

/// Assign `values` to the leading fields of `object`
pub fn set_fields(object: &Value, values: &[Value]) {
    if let Some(object) = object.as_object() {
        for (index, value) in values.iter().enumerate() {
            let _ = object.set_field(index, value.clone());
        }
    }
}

/// Array of the integers `1..=n`
pub fn numbers(n: i64) -> Value {
    Value::array((1..=n).map(Value::Integer).collect())
}
