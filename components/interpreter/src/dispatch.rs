//! Send sites and their adaptive dispatch.
//!
//! Every message send in a method body owns a [`CallSite`]. The site's
//! cache starts empty and grows one guarded entry per receiver shape it
//! observes, in first-seen order, until it would exceed the configured
//! limit. It then switches permanently to the generic fallback, which
//! looks the selector up on every send.
//!
//! The chain is shared by every thread executing the method. Readers load
//! it without locking; writers build a complete replacement chain and
//! publish it with a single compare-and-swap on the head pointer, so a
//! reader always sees either the old chain or the new one. Replaced chains
//! are reclaimed through `crossbeam-epoch` once no reader can still hold
//! them. Two threads specializing the same site at once may both resolve
//! the method; the loser's chain is discarded and it retries.

use core_types::Symbol;
use crossbeam::atomic::AtomicCell;
use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};

use crate::class::SClass;
use crate::eager::SpecializedSend;
use crate::error::{RuntimeError, Unwind};
use crate::guard::DispatchGuard;
use crate::inline_cache::{CacheChain, CacheEntry, CacheState, CachedAction, EntryKind, Probe};
use crate::value::Value;
use crate::vm::VM;

/// Outcome of dispatching one send
#[derive(Debug)]
pub enum Dispatched {
    /// The send completed with a value
    Value(Value),
    /// No method matched; the caller decides how to report it
    DoesNotUnderstand {
        /// Class of the receiver
        receiver_class: Arc<SClass>,
        /// Receiver followed by the message arguments
        arguments: Vec<Value>,
    },
}

/// Progress of a site's one-time eager specialization attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EagerState {
    /// Not attempted yet
    Untried,
    /// A specialized node runs in place of the cache
    Installed,
    /// No specialization applies, or the installed node declined
    Declined,
}

/// Inline cache of one message send location
pub struct CallSite {
    selector: Symbol,
    head: Atomic<CacheChain>,
    eager_state: AtomicCell<EagerState>,
    eager_node: OnceLock<Arc<dyn SpecializedSend>>,
}

impl CallSite {
    /// Create an uninitialized site for `selector`
    pub fn new(selector: Symbol) -> Self {
        Self {
            selector,
            head: Atomic::null(),
            eager_state: AtomicCell::new(EagerState::Untried),
            eager_node: OnceLock::new(),
        }
    }

    /// Selector sent from this site
    pub fn selector(&self) -> &Symbol {
        &self.selector
    }

    /// Number of message arguments, not counting the receiver
    pub fn arity(&self) -> usize {
        self.selector.arity()
    }

    /// Current state of the inline cache
    pub fn state(&self) -> CacheState {
        let guard = epoch::pin();
        self.with_chain(&guard, CacheChain::state)
    }

    /// Kinds of the cached entries in probe order
    pub fn entry_kinds(&self) -> Vec<EntryKind> {
        let guard = epoch::pin();
        self.with_chain(&guard, CacheChain::kinds)
    }

    /// Progress of the eager specialization attempt
    pub fn eager_state(&self) -> EagerState {
        self.eager_state.load()
    }

    /// Append `entry` at the tail of the chain, as specialization would
    ///
    /// Has no effect once the site is generic.
    pub fn install_entry(&self, entry: CacheEntry, vm: &VM) {
        let guard = epoch::pin();
        loop {
            let current = self.head.load(Ordering::Acquire, &guard);
            let replacement = self.grown(current, entry.clone(), vm);
            if self.publish(current, replacement, &guard) {
                return;
            }
        }
    }

    /// Send this site's selector
    ///
    /// `arguments` holds the receiver followed by the message arguments.
    pub fn dispatch(&self, vm: &VM, arguments: Vec<Value>) -> Result<Dispatched, Unwind> {
        if arguments.len() != self.selector.signature_arity() {
            return Err(RuntimeError::WrongArgumentCount {
                selector: self.selector.clone(),
                expected: self.selector.signature_arity(),
                actual: arguments.len(),
            }
            .into());
        }

        let mut start = 0;
        loop {
            if let Some(result) = self.try_eager(vm, &arguments) {
                return result.map(Dispatched::Value);
            }

            let action = {
                let guard = epoch::pin();
                let current = self.head.load(Ordering::Acquire, &guard);
                // SAFETY: `current` was loaded under `guard`, and chains are
                // only reclaimed via `defer_destroy` after every guard that
                // could observe them has been dropped.
                let probe = match unsafe { current.as_ref() } {
                    Some(chain) => chain.probe_from(start, &arguments[0], vm),
                    None => Probe::Miss,
                };
                match probe {
                    Probe::Hit { action, .. } => action,
                    Probe::Generic => return self.dispatch_generic(vm, arguments),
                    Probe::Invalidated { index } => {
                        start = if self.excise(current, index, &guard) { index } else { 0 };
                        continue;
                    }
                    Probe::Miss => {
                        self.specialize(vm, &arguments, current, &guard);
                        start = 0;
                        continue;
                    }
                }
            };
            return self.perform(action, vm, arguments);
        }
    }

    fn perform(&self, action: CachedAction, vm: &VM, arguments: Vec<Value>) -> Result<Dispatched, Unwind> {
        match action {
            CachedAction::Invoke(method) => method.invoke(vm, arguments).map(Dispatched::Value),
            CachedAction::Trivial(trivial) => trivial.evaluate(&arguments).map(Dispatched::Value),
            CachedAction::DoesNotUnderstand(receiver_class) => Ok(Dispatched::DoesNotUnderstand {
                receiver_class,
                arguments,
            }),
        }
    }

    fn dispatch_generic(&self, vm: &VM, arguments: Vec<Value>) -> Result<Dispatched, Unwind> {
        let receiver_class = vm.class_of(&arguments[0]);
        match receiver_class.lookup_invokable(&self.selector) {
            Some(method) => method.invoke(vm, arguments).map(Dispatched::Value),
            None => Ok(Dispatched::DoesNotUnderstand {
                receiver_class,
                arguments,
            }),
        }
    }

    fn try_eager(&self, vm: &VM, arguments: &[Value]) -> Option<Result<Value, Unwind>> {
        if self.eager_state.load() != EagerState::Installed {
            return None;
        }
        let node = self.eager_node.get()?;
        match node.execute(vm, arguments) {
            Some(result) => Some(result),
            None => {
                log::debug!(
                    "#{}: specialized {} declined {:?}, falling back to inline cache",
                    self.selector,
                    node.name(),
                    arguments.iter().map(Value::type_name).collect::<Vec<_>>()
                );
                self.eager_state.store(EagerState::Declined);
                None
            }
        }
    }

    /// Extend the cache for the receiver in `arguments`
    ///
    /// Leaves the site ready for the caller to retry the walk. Losing a
    /// publication race is not an error: the retry sees the winner's chain.
    fn specialize(&self, vm: &VM, arguments: &[Value], current: Shared<'_, CacheChain>, guard: &Guard) {
        if vm.flags().eager_specialization
            && self
                .eager_state
                .compare_exchange(EagerState::Untried, EagerState::Declined)
                .is_ok()
        {
            if let Some(node) = vm.eager_specialization(&self.selector, arguments) {
                log::debug!("#{}: installed specialized {}", self.selector, node.name());
                // A concurrent installer may have won; either node is equivalent.
                let _ = self.eager_node.set(node);
                self.eager_state.store(EagerState::Installed);
                return;
            }
        }

        let receiver = &arguments[0];
        if let Value::Object(object) = receiver {
            if object.update_layout_to_match_class() {
                return;
            }
        }

        let entry = self.resolve(receiver, vm);
        let replacement = self.grown(current, entry, vm);
        self.publish(current, replacement, guard);
    }

    fn resolve(&self, receiver: &Value, vm: &VM) -> CacheEntry {
        let class = vm.class_of(receiver);
        let action = match class.lookup_invokable(&self.selector) {
            None => CachedAction::DoesNotUnderstand(class),
            Some(method) => match method.trivial() {
                Some(trivial) if vm.flags().trivial_method_inlining => {
                    CachedAction::Trivial(trivial.clone())
                }
                _ => CachedAction::Invoke(method),
            },
        };
        CacheEntry::new(DispatchGuard::for_receiver(receiver, vm), action)
    }

    fn grown(&self, current: Shared<'_, CacheChain>, entry: CacheEntry, vm: &VM) -> CacheChain {
        let flags = vm.flags();
        if !flags.inline_caching {
            return CacheChain::Generic;
        }
        // SAFETY: see `dispatch`; `current` is protected by the caller's guard.
        match unsafe { current.as_ref() } {
            Some(chain) => chain.with_appended(entry, flags.inline_cache_size),
            None => CacheChain::empty().with_appended(entry, flags.inline_cache_size),
        }
    }

    fn excise(&self, current: Shared<'_, CacheChain>, index: usize, guard: &Guard) -> bool {
        // SAFETY: see `dispatch`.
        let replacement = match unsafe { current.as_ref() } {
            Some(chain) => chain.without(index),
            None => return false,
        };
        log::trace!("#{}: excising invalidated entry {}", self.selector, index);
        self.publish(current, replacement, guard)
    }

    fn publish(&self, current: Shared<'_, CacheChain>, replacement: CacheChain, guard: &Guard) -> bool {
        // SAFETY: see `dispatch`.
        let before = unsafe { current.as_ref() }
            .map(CacheChain::state)
            .unwrap_or(CacheState::Uninitialized);
        let after = replacement.state();

        match self.head.compare_exchange(
            current,
            Owned::new(replacement),
            Ordering::AcqRel,
            Ordering::Acquire,
            guard,
        ) {
            Ok(_) => {
                if before != after {
                    log::debug!("#{}: {:?} -> {:?}", self.selector, before, after);
                }
                if !current.is_null() {
                    // SAFETY: `current` is unlinked; readers that loaded it
                    // hold guards, so destruction waits for them.
                    unsafe { guard.defer_destroy(current) };
                }
                true
            }
            Err(_) => false,
        }
    }

    fn with_chain<R>(&self, guard: &Guard, f: impl FnOnce(&CacheChain) -> R) -> R {
        let current = self.head.load(Ordering::Acquire, guard);
        // SAFETY: see `dispatch`.
        match unsafe { current.as_ref() } {
            Some(chain) => f(chain),
            None => f(&CacheChain::empty()),
        }
    }
}

impl Drop for CallSite {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no other thread can reach the chain.
        unsafe {
            let guard = epoch::unprotected();
            let head = self.head.load(Ordering::Relaxed, guard);
            if !head.is_null() {
                drop(head.into_owned());
            }
        }
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("selector", &self.selector)
            .field("state", &self.state())
            .field("eager", &self.eager_state.load())
            .finish()
    }
}
