//! Dispatch guards.
//!
//! A guard decides whether a cache entry applies to a receiver. Guards
//! built for object receivers test layout identity so that a change in the
//! class's instance shape can invalidate entries; every other receiver is
//! guarded by its class. A class guard also accepts objects of its class,
//! so a chain may hold two entries that accept the same receiver; the
//! earlier one wins.

use std::sync::Arc;

use crate::class::SClass;
use crate::error::GuardInvalidated;
use crate::object::ObjectLayout;
use crate::value::Value;
use crate::vm::VM;

/// Receiver test of one cache entry
#[derive(Debug, Clone)]
pub enum DispatchGuard {
    /// Receiver's class is exactly this class
    Class(Arc<SClass>),
    /// Receiver is an object currently using exactly this layout
    Layout(Arc<ObjectLayout>),
}

impl DispatchGuard {
    /// Guard matching `receiver` and every receiver of the same shape
    pub fn for_receiver(receiver: &Value, vm: &VM) -> Self {
        match receiver {
            Value::Object(object) => DispatchGuard::Layout(object.layout()),
            other => DispatchGuard::Class(vm.class_of(other)),
        }
    }

    /// Test `receiver`
    ///
    /// Fails with [`GuardInvalidated`] when the guarded layout has been
    /// superseded, whatever the receiver.
    pub fn matches(&self, receiver: &Value, vm: &VM) -> Result<bool, GuardInvalidated> {
        match self {
            DispatchGuard::Layout(layout) => {
                layout.check_is_latest()?;
                Ok(match receiver {
                    Value::Object(object) => Arc::ptr_eq(layout, &object.layout()),
                    _ => false,
                })
            }
            DispatchGuard::Class(class) => Ok(Arc::ptr_eq(class, &vm.class_of(receiver))),
        }
    }
}
