//! Contract compliance tests for core_types
//!
//! These tests pin the public surface other components rely on.

use core_types::{
    OptimizationFlags, ProgramDefinitionError, SourceCoordinate, Symbol, SymbolTable,
    DEFAULT_INLINE_CACHE_SIZE,
};

#[cfg(test)]
mod symbol_contract_tests {
    use super::*;

    /// Contract: Symbol must be shareable across threads
    #[test]
    fn test_symbol_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Symbol>();
        assert_send_sync::<SymbolTable>();
    }

    /// Contract: arity counts arguments without the receiver
    #[test]
    fn test_arity_contract() {
        let table = SymbolTable::new();
        assert_eq!(table.intern("value:value:").arity(), 2, "two keyword parts");
        assert_eq!(table.intern("value:value:").signature_arity(), 3, "plus receiver");
    }
}

#[cfg(test)]
mod flags_contract_tests {
    use super::*;

    /// Contract: the default inline cache size is six entries
    #[test]
    fn test_default_cache_size() {
        assert_eq!(DEFAULT_INLINE_CACHE_SIZE, 6);
        assert_eq!(OptimizationFlags::default().inline_cache_size, 6);
    }
}

#[cfg(test)]
mod error_contract_tests {
    use super::*;

    /// Contract: definition errors carry the declaration position
    #[test]
    fn test_unresolved_variable_carries_coordinate() {
        let coord = SourceCoordinate::new(2, 8);
        let error = ProgramDefinitionError::UnresolvedVariable {
            name: "x".to_string(),
            coord,
        };
        match error {
            ProgramDefinitionError::UnresolvedVariable { coord: c, .. } => assert_eq!(c, coord),
            _ => panic!("expected UnresolvedVariable"),
        }
    }
}
