//! Optimizer configuration.
//!
//! One [`OptimizationFlags`] value is built when a universe is created and
//! shared by reference with every call site and compiler afterwards. It is
//! never mutated in place.

/// Default number of guarded entries a call site may hold before it
/// generalizes to megamorphic dispatch.
pub const DEFAULT_INLINE_CACHE_SIZE: usize = 6;

/// Upper bound accepted for [`OptimizationFlags::inline_cache_size`].
pub const MAX_INLINE_CACHE_SIZE: usize = 8;

/// Toggles for the self-optimizing parts of the interpreter.
///
/// Every toggle defaults to enabled. Disabling one keeps the semantics and
/// only removes the optimization, which is how the benchmarks compare
/// configurations.
///
/// # Examples
///
/// ```
/// use core_types::OptimizationFlags;
///
/// let flags = OptimizationFlags::default()
///     .with_inline_cache_size(2)
///     .with_block_inlining(false);
///
/// assert_eq!(flags.inline_cache_size, 2);
/// assert!(!flags.block_inlining);
/// assert!(flags.inline_caching);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizationFlags {
    /// Keep guarded cache entries at send sites; when off every site is
    /// megamorphic from its first execution
    pub inline_caching: bool,
    /// Consult eager operator specializers on the first cache miss
    pub eager_specialization: bool,
    /// Inline literal blocks passed to control-structure selectors
    pub block_inlining: bool,
    /// Store trivial method bodies directly in cache entries
    pub trivial_method_inlining: bool,
    /// Let blocks that never touch their outer activation skip capturing it
    pub blocks_without_context: bool,
    /// Let global reads hold on to the binding they resolved, and compile
    /// `nil`, `true` and `false` to constants; when off every global read
    /// goes through the globals table
    pub global_caching: bool,
    /// Read locals through nodes fixed to their slot; when off reads first
    /// consult the slot kind recorded in the frame descriptor
    pub specialized_variables: bool,
    /// Maximum number of guarded entries per call site
    pub inline_cache_size: usize,
}

impl Default for OptimizationFlags {
    fn default() -> Self {
        Self {
            inline_caching: true,
            eager_specialization: true,
            block_inlining: true,
            trivial_method_inlining: true,
            blocks_without_context: true,
            global_caching: true,
            specialized_variables: true,
            inline_cache_size: DEFAULT_INLINE_CACHE_SIZE,
        }
    }
}

impl OptimizationFlags {
    /// Build flags from `SABLE_*` environment variables
    ///
    /// Each `SABLE_DISABLE_*` variable turns its optimization off when set
    /// to anything other than `0`, `false` or the empty string.
    /// `SABLE_INLINE_CACHE_SIZE` overrides the cache size.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build flags from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let disabled = |key: &str| {
            lookup(key)
                .map(|v| {
                    let v = v.trim();
                    !(v.is_empty() || v == "0" || v.eq_ignore_ascii_case("false"))
                })
                .unwrap_or(false)
        };

        let mut flags = Self {
            inline_caching: !disabled("SABLE_DISABLE_INLINE_CACHING"),
            eager_specialization: !disabled("SABLE_DISABLE_EAGER_SPECIALIZATION"),
            block_inlining: !disabled("SABLE_DISABLE_BLOCK_INLINING"),
            trivial_method_inlining: !disabled("SABLE_DISABLE_TRIVIAL_INLINING"),
            blocks_without_context: !disabled("SABLE_DISABLE_BLOCKS_WITHOUT_CONTEXT"),
            global_caching: !disabled("SABLE_DISABLE_GLOBAL_CACHING"),
            specialized_variables: !disabled("SABLE_DISABLE_SPECIALIZED_VARIABLES"),
            inline_cache_size: DEFAULT_INLINE_CACHE_SIZE,
        };

        if let Some(size) = lookup("SABLE_INLINE_CACHE_SIZE").and_then(|v| v.trim().parse().ok()) {
            flags = flags.with_inline_cache_size(size);
        }
        flags
    }

    /// Set the cache size, clamped to `1..=MAX_INLINE_CACHE_SIZE`
    pub fn with_inline_cache_size(mut self, size: usize) -> Self {
        self.inline_cache_size = size.clamp(1, MAX_INLINE_CACHE_SIZE);
        self
    }

    /// Enable or disable inline caching
    pub fn with_inline_caching(mut self, enabled: bool) -> Self {
        self.inline_caching = enabled;
        self
    }

    /// Enable or disable eager operator specialization
    pub fn with_eager_specialization(mut self, enabled: bool) -> Self {
        self.eager_specialization = enabled;
        self
    }

    /// Enable or disable block inlining
    pub fn with_block_inlining(mut self, enabled: bool) -> Self {
        self.block_inlining = enabled;
        self
    }

    /// Enable or disable trivial method inlining
    pub fn with_trivial_method_inlining(mut self, enabled: bool) -> Self {
        self.trivial_method_inlining = enabled;
        self
    }

    /// Enable or disable context-free blocks
    pub fn with_blocks_without_context(mut self, enabled: bool) -> Self {
        self.blocks_without_context = enabled;
        self
    }

    /// Enable or disable cached global reads
    pub fn with_global_caching(mut self, enabled: bool) -> Self {
        self.global_caching = enabled;
        self
    }

    /// Enable or disable slot-specialized variable reads
    pub fn with_specialized_variables(mut self, enabled: bool) -> Self {
        self.specialized_variables = enabled;
        self
    }
}
