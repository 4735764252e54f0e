//! Inline cache chains for message sends.
//!
//! A send site's cache is an immutable [`CacheChain`]: either a bounded
//! list of guarded entries probed in order, or the generic fallback that
//! performs a full lookup on every send. A chain is never mutated in
//! place. Specialization and excision build a replacement chain which the
//! owning [`crate::dispatch::CallSite`] publishes atomically.

use arrayvec::ArrayVec;
use core_types::MAX_INLINE_CACHE_SIZE;
use std::sync::Arc;

use crate::class::SClass;
use crate::error::GuardInvalidated;
use crate::guard::DispatchGuard;
use crate::method::{Method, TrivialExpr};
use crate::value::Value;
use crate::vm::VM;

/// What a cache entry does for a matching receiver
#[derive(Debug, Clone)]
pub enum CachedAction {
    /// Invoke the resolved method
    Invoke(Arc<Method>),
    /// Evaluate an inlined trivial method body
    Trivial(TrivialExpr),
    /// Report that the receiver's class does not understand the selector
    DoesNotUnderstand(Arc<SClass>),
}

/// Kind of a cache entry, for inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// [`CachedAction::Invoke`]
    Method,
    /// [`CachedAction::Trivial`]
    Trivial,
    /// [`CachedAction::DoesNotUnderstand`]
    Miss,
}

/// A guard and the action it selects
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Receiver test
    pub guard: DispatchGuard,
    /// Action for receivers passing the test
    pub action: CachedAction,
}

impl CacheEntry {
    /// Create an entry
    pub fn new(guard: DispatchGuard, action: CachedAction) -> Self {
        Self { guard, action }
    }

    /// Kind of the cached action
    pub fn kind(&self) -> EntryKind {
        match self.action {
            CachedAction::Invoke(_) => EntryKind::Method,
            CachedAction::Trivial(_) => EntryKind::Trivial,
            CachedAction::DoesNotUnderstand(_) => EntryKind::Miss,
        }
    }
}

/// Observable state of a send site's cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Never executed, or every entry was excised
    Uninitialized,
    /// One entry
    Monomorphic,
    /// Two or more entries
    Polymorphic(usize),
    /// Generic fallback; terminal
    Megamorphic,
}

/// Result of probing a chain with a receiver
#[derive(Debug)]
pub enum Probe {
    /// Entry at `index` matched
    Hit {
        /// Position in the chain
        index: usize,
        /// Cloned action
        action: CachedAction,
    },
    /// Entry at `index` can never match again and must be excised
    Invalidated {
        /// Position in the chain
        index: usize,
    },
    /// No entry matched
    Miss,
    /// The chain is the generic fallback
    Generic,
}

/// Immutable contents of one send site's cache
#[derive(Debug, Clone)]
pub enum CacheChain {
    /// Guarded entries in probe order
    Entries(ArrayVec<CacheEntry, MAX_INLINE_CACHE_SIZE>),
    /// Full lookup on every send
    Generic,
}

impl CacheChain {
    /// Empty chain
    pub fn empty() -> Self {
        CacheChain::Entries(ArrayVec::new())
    }

    /// Number of guarded entries; 0 for the generic fallback
    pub fn len(&self) -> usize {
        match self {
            CacheChain::Entries(entries) => entries.len(),
            CacheChain::Generic => 0,
        }
    }

    /// Whether the chain holds no guarded entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache state this chain represents
    pub fn state(&self) -> CacheState {
        match self {
            CacheChain::Generic => CacheState::Megamorphic,
            CacheChain::Entries(entries) => match entries.len() {
                0 => CacheState::Uninitialized,
                1 => CacheState::Monomorphic,
                n => CacheState::Polymorphic(n),
            },
        }
    }

    /// Kinds of the entries in probe order
    pub fn kinds(&self) -> Vec<EntryKind> {
        match self {
            CacheChain::Entries(entries) => entries.iter().map(CacheEntry::kind).collect(),
            CacheChain::Generic => Vec::new(),
        }
    }

    /// Find the first entry whose guard accepts `receiver`
    ///
    /// Stops at the first invalidated guard so the caller can excise it
    /// before continuing.
    pub fn probe(&self, receiver: &Value, vm: &VM) -> Probe {
        self.probe_from(0, receiver, vm)
    }

    /// Like [`CacheChain::probe`], skipping the first `start` entries
    pub fn probe_from(&self, start: usize, receiver: &Value, vm: &VM) -> Probe {
        let entries = match self {
            CacheChain::Generic => return Probe::Generic,
            CacheChain::Entries(entries) => entries,
        };
        for (index, entry) in entries.iter().enumerate().skip(start) {
            match entry.guard.matches(receiver, vm) {
                Ok(true) => {
                    return Probe::Hit {
                        index,
                        action: entry.action.clone(),
                    }
                }
                Ok(false) => {}
                Err(GuardInvalidated) => return Probe::Invalidated { index },
            }
        }
        Probe::Miss
    }

    /// Copy of this chain with the entry at `index` removed
    ///
    /// The predecessor of the removed entry is linked to its successor;
    /// the order of all other entries is kept.
    pub fn without(&self, index: usize) -> CacheChain {
        match self {
            CacheChain::Entries(entries) => CacheChain::Entries(
                entries
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != index)
                    .map(|(_, e)| e.clone())
                    .collect(),
            ),
            CacheChain::Generic => CacheChain::Generic,
        }
    }

    /// Copy of this chain with `entry` appended, or the generic fallback
    /// once the chain would exceed `limit` entries
    pub fn with_appended(&self, entry: CacheEntry, limit: usize) -> CacheChain {
        match self {
            CacheChain::Entries(entries) if entries.len() < limit.min(MAX_INLINE_CACHE_SIZE) => {
                let mut grown = entries.clone();
                grown.push(entry);
                CacheChain::Entries(grown)
            }
            _ => CacheChain::Generic,
        }
    }
}

impl Default for CacheChain {
    fn default() -> Self {
        Self::empty()
    }
}
