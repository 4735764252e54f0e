//! Native methods of the core classes.
//!
//! Only what closures, control flow and collections need to run. Every
//! primitive receives the receiver at index 0 followed by the message
//! arguments; arity has already been checked against the selector.

use core_types::SymbolTable;
use std::sync::Arc;

use crate::class::SClass;
use crate::error::{ExecResult, RuntimeError};
use crate::method::{Method, PrimitiveFn};
use crate::numeric::{self, ArithOp, Number};
use crate::object::{SArray, SObject};
use crate::universe::CoreClasses;
use crate::value::Value;
use crate::vm::VM;

/// Install all primitives into the core classes
pub fn install(core: &CoreClasses, symbols: &SymbolTable) {
    let define = |class: &Arc<SClass>, selector: &str, function: PrimitiveFn| {
        class.add_method(Arc::new(Method::primitive(symbols.intern(selector), function)));
    };

    define(&core.object, "==", object_identical);
    define(&core.object, "=", object_identical);
    define(&core.object, "~~", object_not_identical);
    define(&core.object, "isNil", answer_false);
    define(&core.object, "notNil", answer_true);
    define(&core.object, "class", object_class);
    define(&core.object, "value", answer_receiver);
    define(&core.object, "yourself", answer_receiver);
    define(&core.object, "printString", print_string);

    define(&core.nil, "isNil", answer_true);
    define(&core.nil, "notNil", answer_false);
    define(&core.nil, "ifNil:", nil_if_nil);

    define(&core.boolean, "ifTrue:", boolean_if_true);
    define(&core.boolean, "ifFalse:", boolean_if_false);
    define(&core.boolean, "ifTrue:ifFalse:", boolean_if_true_if_false);
    define(&core.boolean, "ifFalse:ifTrue:", boolean_if_false_if_true);
    define(&core.boolean, "not", boolean_not);
    define(&core.boolean, "and:", boolean_and);
    define(&core.boolean, "or:", boolean_or);
    define(&core.boolean, "&", boolean_and);
    define(&core.boolean, "|", boolean_or);

    for class in [&core.integer, &core.double] {
        define(class, "+", number_add);
        define(class, "-", number_sub);
        define(class, "*", number_mul);
        define(class, "<", number_lt);
        define(class, ">", number_gt);
        define(class, "<=", number_le);
        define(class, ">=", number_ge);
        define(class, "=", number_eq);
        define(class, "~=", number_ne);
        define(class, "/", number_divide);
        define(class, "abs", number_abs);
        define(class, "negated", number_negated);
        define(class, "max:", number_max);
        define(class, "min:", number_min);
    }
    define(&core.integer, "//", integer_floor_divide);
    define(&core.integer, "\\\\", integer_modulo);
    define(&core.integer, "to:do:", integer_to_do);

    define(&core.string, "=", string_eq);
    define(&core.string, ",", string_concatenate);
    define(&core.string, "size", string_size);
    define(&core.string, "asSymbol", string_as_symbol);

    define(&core.class, "new", class_new);
    define(&core.class, "new:", class_new_sized);
    define(&core.class, "name", class_name);
    define(&core.class, "superclass", class_superclass);

    define(&core.array, "at:", array_at);
    define(&core.array, "at:put:", array_at_put);
    define(&core.array, "size", array_size);
    define(&core.array, "do:", array_do);

    define(&core.block, "numArgs", block_num_args);
    define(&core.block, "whileTrue:", block_while_true);
    define(&core.block, "whileFalse:", block_while_false);
    define(&core.block1, "value", block_value);
    define(&core.block2, "value:", block_value);
    define(&core.block3, "value:value:", block_value);
    define(&core.block4, "value:value:value:", block_value);
}

/// Evaluate `value` as a branch: blocks are invoked, anything else is
/// answered as is
pub(crate) fn evaluate_branch(vm: &VM, value: &Value) -> ExecResult {
    match value {
        Value::Block(block) => block.invoke(vm, vec![value.clone()]),
        other => Ok(other.clone()),
    }
}

fn boolean(value: &Value) -> Result<bool, RuntimeError> {
    value.as_boolean().ok_or(RuntimeError::TypeMismatch {
        expected: "Boolean",
        actual: value.type_name(),
    })
}

fn integer(value: &Value) -> Result<i64, RuntimeError> {
    value.as_integer().ok_or(RuntimeError::TypeMismatch {
        expected: "Integer",
        actual: value.type_name(),
    })
}

fn block_argument(value: &Value) -> Result<&Arc<crate::block::SBlock>, RuntimeError> {
    value.as_block().ok_or(RuntimeError::TypeMismatch {
        expected: "Block",
        actual: value.type_name(),
    })
}

fn answer_true(_: &VM, _: &[Value]) -> ExecResult {
    Ok(Value::Boolean(true))
}

fn answer_false(_: &VM, _: &[Value]) -> ExecResult {
    Ok(Value::Boolean(false))
}

fn answer_receiver(_: &VM, args: &[Value]) -> ExecResult {
    Ok(args[0].clone())
}

fn object_identical(_: &VM, args: &[Value]) -> ExecResult {
    Ok(Value::Boolean(args[0].is_identical(&args[1])))
}

fn object_not_identical(_: &VM, args: &[Value]) -> ExecResult {
    Ok(Value::Boolean(!args[0].is_identical(&args[1])))
}

fn object_class(vm: &VM, args: &[Value]) -> ExecResult {
    Ok(Value::Class(vm.class_of(&args[0])))
}

fn print_string(_: &VM, args: &[Value]) -> ExecResult {
    Ok(Value::string(&args[0].to_string()))
}

fn nil_if_nil(vm: &VM, args: &[Value]) -> ExecResult {
    evaluate_branch(vm, &args[1])
}

fn boolean_if_true(vm: &VM, args: &[Value]) -> ExecResult {
    if boolean(&args[0])? {
        evaluate_branch(vm, &args[1])
    } else {
        Ok(Value::Nil)
    }
}

fn boolean_if_false(vm: &VM, args: &[Value]) -> ExecResult {
    if boolean(&args[0])? {
        Ok(Value::Nil)
    } else {
        evaluate_branch(vm, &args[1])
    }
}

fn boolean_if_true_if_false(vm: &VM, args: &[Value]) -> ExecResult {
    let branch = if boolean(&args[0])? { &args[1] } else { &args[2] };
    evaluate_branch(vm, branch)
}

fn boolean_if_false_if_true(vm: &VM, args: &[Value]) -> ExecResult {
    let branch = if boolean(&args[0])? { &args[2] } else { &args[1] };
    evaluate_branch(vm, branch)
}

fn boolean_not(_: &VM, args: &[Value]) -> ExecResult {
    Ok(Value::Boolean(!boolean(&args[0])?))
}

fn boolean_and(vm: &VM, args: &[Value]) -> ExecResult {
    if boolean(&args[0])? {
        evaluate_branch(vm, &args[1])
    } else {
        Ok(Value::Boolean(false))
    }
}

fn boolean_or(vm: &VM, args: &[Value]) -> ExecResult {
    if boolean(&args[0])? {
        Ok(Value::Boolean(true))
    } else {
        evaluate_branch(vm, &args[1])
    }
}

fn arithmetic(op: ArithOp, args: &[Value]) -> ExecResult {
    numeric::apply(op, &args[0], &args[1]).ok_or_else(|| {
        RuntimeError::TypeMismatch {
            expected: "Number",
            actual: args[1].type_name(),
        }
        .into()
    })
}

fn number_add(_: &VM, args: &[Value]) -> ExecResult {
    arithmetic(ArithOp::Add, args)
}

fn number_sub(_: &VM, args: &[Value]) -> ExecResult {
    arithmetic(ArithOp::Sub, args)
}

fn number_mul(_: &VM, args: &[Value]) -> ExecResult {
    arithmetic(ArithOp::Mul, args)
}

fn number_lt(_: &VM, args: &[Value]) -> ExecResult {
    arithmetic(ArithOp::Lt, args)
}

fn number_gt(_: &VM, args: &[Value]) -> ExecResult {
    arithmetic(ArithOp::Gt, args)
}

fn number_le(_: &VM, args: &[Value]) -> ExecResult {
    arithmetic(ArithOp::Le, args)
}

fn number_ge(_: &VM, args: &[Value]) -> ExecResult {
    arithmetic(ArithOp::Ge, args)
}

fn number_eq(_: &VM, args: &[Value]) -> ExecResult {
    // Comparing a number with anything else is simply false.
    Ok(numeric::apply(ArithOp::Eq, &args[0], &args[1]).unwrap_or(Value::Boolean(false)))
}

fn number_ne(vm: &VM, args: &[Value]) -> ExecResult {
    let equal = number_eq(vm, args)?;
    Ok(Value::Boolean(!boolean(&equal)?))
}

fn number_divide(_: &VM, args: &[Value]) -> ExecResult {
    Ok(numeric::divide(&args[0], &args[1])?)
}

fn number_abs(vm: &VM, args: &[Value]) -> ExecResult {
    if arithmetic(ArithOp::Lt, &[args[0].clone(), Value::Integer(0)])? == Value::Boolean(true) {
        number_negated(vm, args)
    } else {
        Ok(args[0].clone())
    }
}

fn number_negated(_: &VM, args: &[Value]) -> ExecResult {
    match Number::of(&args[0]) {
        Some(Number::Float(d)) => Ok(Value::Double(-d)),
        Some(_) => arithmetic(ArithOp::Sub, &[Value::Integer(0), args[0].clone()]),
        None => Err(RuntimeError::TypeMismatch {
            expected: "Number",
            actual: args[0].type_name(),
        }
        .into()),
    }
}

fn number_max(_: &VM, args: &[Value]) -> ExecResult {
    let greater = arithmetic(ArithOp::Gt, args)? == Value::Boolean(true);
    Ok(if greater { args[0].clone() } else { args[1].clone() })
}

fn number_min(_: &VM, args: &[Value]) -> ExecResult {
    let less = arithmetic(ArithOp::Lt, args)? == Value::Boolean(true);
    Ok(if less { args[0].clone() } else { args[1].clone() })
}

fn integer_floor_divide(_: &VM, args: &[Value]) -> ExecResult {
    Ok(numeric::floor_divide(&args[0], &args[1])?)
}

fn integer_modulo(_: &VM, args: &[Value]) -> ExecResult {
    Ok(numeric::modulo(&args[0], &args[1])?)
}

fn integer_to_do(vm: &VM, args: &[Value]) -> ExecResult {
    let (from, to) = (integer(&args[0])?, integer(&args[1])?);
    let block = block_argument(&args[2])?;
    for i in from..=to {
        block.invoke(vm, vec![args[2].clone(), Value::Integer(i)])?;
    }
    Ok(args[0].clone())
}

fn string_eq(_: &VM, args: &[Value]) -> ExecResult {
    Ok(Value::Boolean(match (&args[0], &args[1]) {
        (Value::String(a), Value::String(b)) => a == b,
        _ => false,
    }))
}

fn string_concatenate(_: &VM, args: &[Value]) -> ExecResult {
    match (&args[0], &args[1]) {
        (Value::String(a), Value::String(b)) => Ok(Value::string(&format!("{}{}", a, b))),
        (_, other) => Err(RuntimeError::TypeMismatch {
            expected: "String",
            actual: other.type_name(),
        }
        .into()),
    }
}

fn string_size(_: &VM, args: &[Value]) -> ExecResult {
    match &args[0] {
        Value::String(s) => Ok(Value::Integer(s.chars().count() as i64)),
        other => Err(RuntimeError::TypeMismatch {
            expected: "String",
            actual: other.type_name(),
        }
        .into()),
    }
}

fn string_as_symbol(vm: &VM, args: &[Value]) -> ExecResult {
    match &args[0] {
        Value::String(s) => Ok(Value::Symbol(vm.symbol(s))),
        other => Err(RuntimeError::TypeMismatch {
            expected: "String",
            actual: other.type_name(),
        }
        .into()),
    }
}

fn receiver_class(value: &Value) -> Result<&Arc<SClass>, RuntimeError> {
    match value {
        Value::Class(class) => Ok(class),
        other => Err(RuntimeError::TypeMismatch {
            expected: "Class",
            actual: other.type_name(),
        }),
    }
}

fn class_new(vm: &VM, args: &[Value]) -> ExecResult {
    let class = receiver_class(&args[0])?;
    if Arc::ptr_eq(class, &vm.core().array) {
        return Ok(Value::array(Vec::new()));
    }
    Ok(Value::Object(Arc::new(SObject::new(Arc::clone(class)))))
}

fn class_new_sized(vm: &VM, args: &[Value]) -> ExecResult {
    let class = receiver_class(&args[0])?;
    if !Arc::ptr_eq(class, &vm.core().array) {
        return Err(RuntimeError::Primitive(format!("{} cannot be created with a size", class.name())).into());
    }
    let size = integer(&args[1])?;
    let size = usize::try_from(size).map_err(|_| RuntimeError::IndexOutOfBounds { index: size, size: 0 })?;
    Ok(Value::Array(Arc::new(SArray::with_size(size))))
}

fn class_name(_: &VM, args: &[Value]) -> ExecResult {
    Ok(Value::Symbol(receiver_class(&args[0])?.name().clone()))
}

fn class_superclass(_: &VM, args: &[Value]) -> ExecResult {
    Ok(receiver_class(&args[0])?
        .superclass()
        .map(|s| Value::Class(Arc::clone(s)))
        .unwrap_or(Value::Nil))
}

fn array(value: &Value) -> Result<&Arc<SArray>, RuntimeError> {
    match value {
        Value::Array(a) => Ok(a),
        other => Err(RuntimeError::TypeMismatch {
            expected: "Array",
            actual: other.type_name(),
        }),
    }
}

fn array_at(_: &VM, args: &[Value]) -> ExecResult {
    Ok(array(&args[0])?.at(integer(&args[1])?)?)
}

fn array_at_put(_: &VM, args: &[Value]) -> ExecResult {
    array(&args[0])?.at_put(integer(&args[1])?, args[2].clone())?;
    Ok(args[2].clone())
}

fn array_size(_: &VM, args: &[Value]) -> ExecResult {
    Ok(Value::Integer(array(&args[0])?.len() as i64))
}

fn array_do(vm: &VM, args: &[Value]) -> ExecResult {
    let block = block_argument(&args[1])?;
    for element in array(&args[0])?.to_vec() {
        block.invoke(vm, vec![args[1].clone(), element])?;
    }
    Ok(args[0].clone())
}

fn block_num_args(_: &VM, args: &[Value]) -> ExecResult {
    Ok(Value::Integer(block_argument(&args[0])?.parameter_count() as i64))
}

fn block_value(vm: &VM, args: &[Value]) -> ExecResult {
    block_argument(&args[0])?.invoke(vm, args.to_vec())
}

fn block_while(vm: &VM, args: &[Value], expected: bool) -> ExecResult {
    let condition = block_argument(&args[0])?;
    let body = block_argument(&args[1])?;
    while boolean(&condition.invoke(vm, vec![args[0].clone()])?)? == expected {
        body.invoke(vm, vec![args[1].clone()])?;
    }
    Ok(Value::Nil)
}

fn block_while_true(vm: &VM, args: &[Value]) -> ExecResult {
    block_while(vm, args, true)
}

fn block_while_false(vm: &VM, args: &[Value]) -> ExecResult {
    block_while(vm, args, false)
}
