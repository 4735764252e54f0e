//! Activations and frame descriptors.
//!
//! An [`Activation`] is the runtime storage for one method or block
//! invocation: the argument array (receiver first), a slot array sized by
//! the frozen scope's [`FrameDescriptor`], and for blocks a link to the
//! activation they were created in. Variable nodes with a non-zero context
//! level reach outer activations through [`Activation::climb`].

use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::error::RuntimeError;
use crate::nonlocal::FrameOnStackMarker;
use crate::value::Value;

/// Observed kind of the values stored in a frame slot
///
/// Widening is one-directional: a slot that has seen two different kinds
/// becomes `Generic` and stays there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Nothing written yet
    Uninitialized,
    /// Only small integers written
    Long,
    /// Only doubles written
    Double,
    /// Only booleans written
    Boolean,
    /// Anything
    Generic,
}

impl SlotKind {
    /// Kind of a single value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Integer(_) => SlotKind::Long,
            Value::Double(_) => SlotKind::Double,
            Value::Boolean(_) => SlotKind::Boolean,
            _ => SlotKind::Generic,
        }
    }

    /// Kind after additionally observing `observed`
    pub fn widen(self, observed: SlotKind) -> SlotKind {
        match (self, observed) {
            (SlotKind::Uninitialized, k) => k,
            (current, SlotKind::Uninitialized) => current,
            (current, k) if current == k => current,
            _ => SlotKind::Generic,
        }
    }
}

/// Slot layout of a frozen scope, shared by all its activations
pub struct FrameDescriptor {
    kinds: Box<[AtomicCell<SlotKind>]>,
}

impl FrameDescriptor {
    /// Descriptor with `slot_count` uninitialized slots
    pub fn new(slot_count: usize) -> Self {
        Self {
            kinds: (0..slot_count)
                .map(|_| AtomicCell::new(SlotKind::Uninitialized))
                .collect(),
        }
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.kinds.len()
    }

    /// Kind observed so far for `slot`
    pub fn kind(&self, slot: usize) -> Option<SlotKind> {
        self.kinds.get(slot).map(AtomicCell::load)
    }

    /// Record a write of `value` into `slot`
    pub fn observe(&self, slot: usize, value: &Value) {
        if let Some(cell) = self.kinds.get(slot) {
            let observed = SlotKind::of(value);
            let current = cell.load();
            let widened = current.widen(observed);
            if widened != current {
                // Losing a race here only delays widening to the next write.
                let _ = cell.compare_exchange(current, widened);
            }
        }
    }
}

impl fmt::Debug for FrameDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.kinds.iter().map(AtomicCell::load))
            .finish()
    }
}

/// Contents of one frame slot
#[derive(Debug, Clone)]
pub enum FrameSlot {
    /// Never written; reads as nil
    Empty,
    /// A local variable's value
    Value(Value),
    /// Liveness marker of this activation
    Marker(Arc<FrameOnStackMarker>),
}

/// Runtime state of one method or block invocation
pub struct Activation {
    arguments: Box<[Value]>,
    slots: Mutex<Vec<FrameSlot>>,
    context: Option<Arc<Activation>>,
    descriptor: Arc<FrameDescriptor>,
}

impl Activation {
    /// Create an activation
    ///
    /// # Arguments
    ///
    /// * `descriptor` - Slot layout of the invoked method or block
    /// * `arguments` - Receiver followed by the message arguments
    /// * `context` - Defining activation, for blocks that captured one
    pub fn new(
        descriptor: Arc<FrameDescriptor>,
        arguments: Vec<Value>,
        context: Option<Arc<Activation>>,
    ) -> Self {
        Self {
            arguments: arguments.into_boxed_slice(),
            slots: Mutex::new(vec![FrameSlot::Empty; descriptor.slot_count()]),
            context,
            descriptor,
        }
    }

    /// The receiver, `self` for methods and the block itself for blocks
    pub fn receiver(&self) -> &Value {
        &self.arguments[0]
    }

    /// All arguments, receiver first
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Argument at `index`; index 0 is the receiver
    pub fn argument(&self, index: usize) -> Result<Value, RuntimeError> {
        self.arguments.get(index).cloned().ok_or_else(|| {
            RuntimeError::FrameIntegrity(format!(
                "argument {} requested from an activation with {}",
                index,
                self.arguments.len()
            ))
        })
    }

    /// Activation this one was created in, if captured
    pub fn context(&self) -> Option<&Arc<Activation>> {
        self.context.as_ref()
    }

    /// Slot layout of this activation
    pub fn descriptor(&self) -> &Arc<FrameDescriptor> {
        &self.descriptor
    }

    /// Follow `level` context links outward
    pub fn climb(&self, level: usize) -> Result<&Activation, RuntimeError> {
        let mut current = self;
        for hop in 0..level {
            current = current.context.as_deref().ok_or_else(|| {
                RuntimeError::FrameIntegrity(format!(
                    "no outer context at hop {} of {}",
                    hop + 1,
                    level
                ))
            })?;
        }
        Ok(current)
    }

    /// Value of local `slot`
    pub fn local(&self, slot: usize) -> Result<Value, RuntimeError> {
        match self.slots.lock().get(slot) {
            Some(FrameSlot::Value(v)) => Ok(v.clone()),
            Some(FrameSlot::Empty) => Ok(Value::Nil),
            Some(FrameSlot::Marker(_)) => Err(RuntimeError::FrameIntegrity(format!(
                "slot {} holds a frame marker, not a value",
                slot
            ))),
            None => Err(self.missing_slot(slot)),
        }
    }

    /// Store `value` in local `slot`
    pub fn set_local(&self, slot: usize, value: Value) -> Result<(), RuntimeError> {
        self.descriptor.observe(slot, &value);
        match self.slots.lock().get_mut(slot) {
            Some(entry) => {
                *entry = FrameSlot::Value(value);
                Ok(())
            }
            None => Err(self.missing_slot(slot)),
        }
    }

    /// Allocate a fresh liveness marker in `slot`
    pub fn install_marker(&self, slot: usize) -> Result<Arc<FrameOnStackMarker>, RuntimeError> {
        let marker = Arc::new(FrameOnStackMarker::new());
        match self.slots.lock().get_mut(slot) {
            Some(entry) => {
                *entry = FrameSlot::Marker(Arc::clone(&marker));
                Ok(marker)
            }
            None => Err(self.missing_slot(slot)),
        }
    }

    /// Liveness marker stored in `slot`
    pub fn marker(&self, slot: usize) -> Result<Arc<FrameOnStackMarker>, RuntimeError> {
        match self.slots.lock().get(slot) {
            Some(FrameSlot::Marker(m)) => Ok(Arc::clone(m)),
            _ => Err(RuntimeError::FrameIntegrity(format!(
                "slot {} does not hold a frame marker",
                slot
            ))),
        }
    }

    fn missing_slot(&self, slot: usize) -> RuntimeError {
        RuntimeError::FrameIntegrity(format!(
            "slot {} outside frame of {} slots",
            slot,
            self.descriptor.slot_count()
        ))
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("arguments", &self.arguments)
            .field("slots", &self.descriptor.slot_count())
            .field("has_context", &self.context.is_some())
            .finish()
    }
}
