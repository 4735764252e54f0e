//! Optimization Matrix Tests
//!
//! Every combination of optimization flags must compute the same answers;
//! the optimizations only change how fast they are reached.

use benchmarks::micro;
use core_types::OptimizationFlags;
use integration_tests::{fibonacci, finder, numbers, sample_shapes, set_fields, shapes, summer, tally};
use interpreter::{Value, VM};

/// All 128 combinations of the boolean flags, with the given cache size
fn all_flag_combinations(cache_size: usize) -> Vec<OptimizationFlags> {
    (0..128u32)
        .map(|bits| {
            OptimizationFlags::default()
                .with_inline_caching(bits & 1 != 0)
                .with_eager_specialization(bits & 2 != 0)
                .with_block_inlining(bits & 4 != 0)
                .with_trivial_method_inlining(bits & 8 != 0)
                .with_blocks_without_context(bits & 16 != 0)
                .with_global_caching(bits & 32 != 0)
                .with_specialized_variables(bits & 64 != 0)
                .with_inline_cache_size(cache_size)
        })
        .collect()
}

fn answers(flags: OptimizationFlags) -> Vec<Value> {
    let vm = VM::with_flags(flags);
    let fib = fibonacci(&vm).unwrap();
    let classes = shapes(&vm).unwrap();
    let summer = summer(&vm).unwrap();
    let finder = finder(&vm).unwrap();
    let tally = vm.new_instance(&tally(&vm).unwrap());

    let searcher = vm.new_instance(&finder);
    set_fields(&searcher, &[Value::Integer(0)]);
    let items = sample_shapes(&vm, &classes);

    vm.set_global("Step", Value::Integer(3));
    let before = vm.send(tally.clone(), "steps:", vec![Value::Integer(4)]).unwrap();
    vm.set_global("Step", Value::Integer(5));
    let after = vm.send(tally, "steps:", vec![Value::Integer(4)]).unwrap();

    vec![
        vm.send(vm.new_instance(&fib), "fib:", vec![Value::Integer(15)]).unwrap(),
        vm.send(vm.new_instance(&summer), "total:scale:", vec![items, Value::Integer(3)])
            .unwrap(),
        vm.send(searcher.clone(), "find:in:", vec![Value::Integer(4), numbers(9)])
            .unwrap(),
        vm.send(searcher.clone(), "find:in:", vec![Value::Integer(99), numbers(3)])
            .unwrap(),
        searcher.as_object().unwrap().field(0).unwrap(),
        before,
        after,
    ]
}

#[test]
fn test_flags_do_not_change_answers() {
    let expected = vec![
        Value::Integer(610),
        Value::Integer(60),
        Value::Integer(4),
        Value::Nil,
        Value::Integer(6),
        Value::Integer(12),
        Value::Integer(20),
    ];
    for flags in all_flag_combinations(6) {
        assert_eq!(answers(flags), expected, "with {:?}", flags);
    }
}

#[test]
fn test_small_and_large_cache_sizes() {
    for size in [1, 2, 8] {
        let flags = OptimizationFlags::default().with_inline_cache_size(size);
        assert_eq!(answers(flags)[1], Value::Integer(60), "cache size {}", size);
    }
}

#[test]
fn test_micro_benchmarks_agree_across_flags() {
    for flags in all_flag_combinations(6).into_iter().step_by(5) {
        for mut benchmark in micro::create_benchmarks() {
            benchmark.size = 60;
            let result = benchmark.run(flags);
            assert!(
                result.success,
                "{} failed with {:?}: {:?}",
                result.name, flags, result.error
            );
        }
    }
}

#[test]
fn test_flags_from_environment_lookup() {
    let flags = OptimizationFlags::from_lookup(|name| match name {
        "SABLE_INLINE_CACHE_SIZE" => Some("3".to_string()),
        "SABLE_DISABLE_BLOCK_INLINING" => Some("1".to_string()),
        "SABLE_DISABLE_GLOBAL_CACHING" => Some("true".to_string()),
        "SABLE_DISABLE_SPECIALIZED_VARIABLES" => Some("1".to_string()),
        _ => None,
    });
    assert_eq!(flags.inline_cache_size, 3);
    assert!(!flags.block_inlining);
    assert!(!flags.global_caching);
    assert!(!flags.specialized_variables);
    assert_eq!(answers(flags)[0], Value::Integer(610));
}
