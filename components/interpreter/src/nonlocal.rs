//! Non-local return protocol.
//!
//! A method whose body contains a block performing `^` allocates a fresh
//! [`FrameOnStackMarker`] in a synthetic frame slot each time it is
//! activated. The returning block climbs to that activation, reads the
//! marker and raises [`Unwind::NonLocalReturn`] carrying it. Each
//! activation that owns a marker runs its body through
//! [`catch_non_local_return`], which claims signals addressed to it and
//! lets every other signal continue outward unchanged.

use core_types::Symbol;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ExecResult, RuntimeError, Unwind};
use crate::value::Value;

/// Liveness flag of one activation that can be the target of `^`
#[derive(Debug)]
pub struct FrameOnStackMarker {
    on_stack: AtomicBool,
}

impl FrameOnStackMarker {
    /// Create a marker for an activation that is starting
    pub fn new() -> Self {
        Self {
            on_stack: AtomicBool::new(true),
        }
    }

    /// Whether the owning activation is still running
    pub fn is_on_stack(&self) -> bool {
        self.on_stack.load(Ordering::Acquire)
    }

    /// Record that the owning activation has completed
    pub fn frame_no_longer_on_stack(&self) {
        self.on_stack.store(false, Ordering::Release);
    }
}

impl Default for FrameOnStackMarker {
    fn default() -> Self {
        Self::new()
    }
}

/// A value in flight towards the activation owning `target`
#[derive(Debug, Clone)]
pub struct NonLocalReturn {
    /// Value the home activation will return
    pub value: Value,
    /// Marker of the home activation
    pub target: Arc<FrameOnStackMarker>,
    /// Signature of the home method, for diagnostics
    pub home: Symbol,
}

impl NonLocalReturn {
    /// Whether `marker` belongs to the activation this return is for
    pub fn reached_target(&self, marker: &Arc<FrameOnStackMarker>) -> bool {
        Arc::ptr_eq(&self.target, marker)
    }

    /// Error reported when no activation claims this return
    pub fn escaped(self) -> RuntimeError {
        RuntimeError::NonLocalReturnEscaped { home: self.home }
    }
}

/// Handler installed around the body of an activation owning `marker`
///
/// Marks the activation as finished, then claims a non-local return
/// addressed to `marker` or passes anything else through untouched.
pub fn catch_non_local_return(marker: &Arc<FrameOnStackMarker>, result: ExecResult) -> ExecResult {
    marker.frame_no_longer_on_stack();
    match result {
        Err(Unwind::NonLocalReturn(nlr)) if nlr.reached_target(marker) => Ok(nlr.value),
        other => other,
    }
}

/// Convert an unclaimed non-local return reaching the top of the call
/// chain into the fatal escape error
pub fn settle_at_top_level(result: ExecResult) -> Result<Value, RuntimeError> {
    match result {
        Ok(value) => Ok(value),
        Err(Unwind::NonLocalReturn(nlr)) => {
            log::debug!("non-local return to #{} reached the top level", nlr.home);
            Err(nlr.escaped())
        }
        Err(Unwind::Error(err)) => Err(err),
    }
}
