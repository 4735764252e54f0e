//! Interned symbols.
//!
//! Selectors and identifiers are interned once per [`SymbolTable`]. After
//! interning, equality and hashing are pointer identity, which is what the
//! dispatch caches compare against on every send.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug)]
struct SymbolData {
    name: Box<str>,
    arity: usize,
}

/// An interned name together with the number of arguments it takes.
///
/// Cloning is a reference-count bump. Two symbols compare equal only when
/// they were produced by the same table for the same string.
#[derive(Clone)]
pub struct Symbol(Arc<SymbolData>);

impl Symbol {
    /// The textual name of the symbol
    pub fn as_str(&self) -> &str {
        &self.0.name
    }

    /// Number of message arguments, not counting the receiver
    ///
    /// Keyword selectors take one argument per colon, binary selectors
    /// take one and unary selectors none.
    pub fn arity(&self) -> usize {
        self.0.arity
    }

    /// Number of arguments an activation receives, counting the receiver
    pub fn signature_arity(&self) -> usize {
        self.0.arity + 1
    }

    /// Whether the selector is a keyword selector such as `at:put:`
    pub fn is_keyword(&self) -> bool {
        self.0.name.ends_with(':')
    }

    /// Whether the selector is a binary operator such as `+` or `<=`
    pub fn is_binary(&self) -> bool {
        self.0.name.chars().next().map_or(false, is_binary_char)
    }
}

fn is_binary_char(c: char) -> bool {
    !(c.is_alphanumeric() || c == '_' || c == '$' || c == ':')
}

fn arity_of(name: &str) -> usize {
    let colons = name.chars().filter(|&c| c == ':').count();
    if colons > 0 {
        colons
    } else if name.chars().next().map_or(false, is_binary_char) {
        1
    } else {
        0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0.name)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Thread-safe interning table.
///
/// # Examples
///
/// ```
/// use core_types::SymbolTable;
///
/// let table = SymbolTable::new();
/// let plus = table.intern("+");
/// assert_eq!(plus.arity(), 1);
/// assert!(plus.is_binary());
/// assert_eq!(table.len(), 1);
/// ```
#[derive(Default)]
pub struct SymbolTable {
    symbols: RwLock<HashMap<Box<str>, Symbol>>,
}

impl SymbolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the unique symbol for `name`, creating it on first use
    pub fn intern(&self, name: &str) -> Symbol {
        if let Some(symbol) = self.symbols.read().get(name) {
            return symbol.clone();
        }

        let mut symbols = self.symbols.write();
        // Another thread may have interned it between the two locks.
        symbols
            .entry(name.into())
            .or_insert_with(|| {
                Symbol(Arc::new(SymbolData {
                    name: name.into(),
                    arity: arity_of(name),
                }))
            })
            .clone()
    }

    /// Look up a symbol without creating it
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.symbols.read().get(name).cloned()
    }

    /// Number of interned symbols
    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    /// Whether no symbol has been interned yet
    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable")
            .field("len", &self.len())
            .finish()
    }
}
