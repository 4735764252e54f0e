//! Unit tests for OptimizationFlags

use core_types::{OptimizationFlags, DEFAULT_INLINE_CACHE_SIZE, MAX_INLINE_CACHE_SIZE};

#[cfg(test)]
mod optimization_flags_tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let flags = OptimizationFlags::default()
            .with_inline_caching(false)
            .with_eager_specialization(false)
            .with_trivial_method_inlining(false)
            .with_blocks_without_context(false);

        assert!(!flags.inline_caching);
        assert!(!flags.eager_specialization);
        assert!(!flags.trivial_method_inlining);
        assert!(!flags.blocks_without_context);
        assert!(flags.block_inlining);
    }

    #[test]
    fn test_flags_are_copy() {
        let a = OptimizationFlags::default();
        let b = a;
        assert_eq!(a, b);
    }

    #[test]
    fn test_cache_size_bounds() {
        assert!(DEFAULT_INLINE_CACHE_SIZE <= MAX_INLINE_CACHE_SIZE);
        let flags = OptimizationFlags::default().with_inline_cache_size(MAX_INLINE_CACHE_SIZE);
        assert_eq!(flags.inline_cache_size, MAX_INLINE_CACHE_SIZE);
    }

    #[test]
    fn test_disable_values_are_case_insensitive() {
        let flags = OptimizationFlags::from_lookup(|key| {
            (key == "SABLE_DISABLE_EAGER_SPECIALIZATION").then(|| "FALSE".to_string())
        });
        assert!(flags.eager_specialization);
    }
}
