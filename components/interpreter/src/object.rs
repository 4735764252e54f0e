//! Object storage: layouts, instances and arrays.
//!
//! A class owns exactly one current [`ObjectLayout`]. When the class's
//! instance shape changes, the old layout is marked superseded and a new
//! one takes its place. Instances created under the old layout migrate
//! lazily through [`SObject::update_layout_to_match_class`].
//!
//! Dispatch guards for object receivers compare layouts by identity and
//! consult [`ObjectLayout::check_is_latest`], which is how a superseded
//! layout turns a cache entry permanently invalid.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::class::SClass;
use crate::error::{GuardInvalidated, RuntimeError};
use crate::value::Value;

static NEXT_LAYOUT_ID: AtomicU64 = AtomicU64::new(1);

/// Field layout shared by all up-to-date instances of a class
#[derive(Debug)]
pub struct ObjectLayout {
    id: u64,
    field_count: usize,
    latest: AtomicBool,
}

impl ObjectLayout {
    /// Create a current layout with `field_count` fields
    pub fn new(field_count: usize) -> Self {
        Self {
            id: NEXT_LAYOUT_ID.fetch_add(1, Ordering::Relaxed),
            field_count,
            latest: AtomicBool::new(true),
        }
    }

    /// Unique identifier, for diagnostics
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of fields an instance with this layout stores
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Whether this is still its class's current layout
    pub fn is_latest(&self) -> bool {
        self.latest.load(Ordering::Acquire)
    }

    /// Fail with [`GuardInvalidated`] once the layout has been superseded
    pub fn check_is_latest(&self) -> Result<(), GuardInvalidated> {
        if self.is_latest() {
            Ok(())
        } else {
            Err(GuardInvalidated)
        }
    }

    /// Mark this layout as superseded. Irreversible.
    pub(crate) fn supersede(&self) {
        self.latest.store(false, Ordering::Release);
    }
}

/// An instance of a user-defined class
pub struct SObject {
    class: Arc<SClass>,
    layout: RwLock<Arc<ObjectLayout>>,
    fields: RwLock<Vec<Value>>,
}

impl SObject {
    /// Create an instance of `class` with every field set to nil
    pub fn new(class: Arc<SClass>) -> Self {
        let layout = class.layout();
        let fields = vec![Value::Nil; layout.field_count()];
        Self {
            class,
            layout: RwLock::new(layout),
            fields: RwLock::new(fields),
        }
    }

    /// The class of this object
    pub fn class(&self) -> &Arc<SClass> {
        &self.class
    }

    /// The layout this object currently uses
    pub fn layout(&self) -> Arc<ObjectLayout> {
        Arc::clone(&self.layout.read())
    }

    /// Migrate to the class's current layout
    ///
    /// Returns `true` if the object was outdated and has been updated.
    pub fn update_layout_to_match_class(&self) -> bool {
        let current = self.class.layout();
        let mut layout = self.layout.write();
        if Arc::ptr_eq(&layout, &current) {
            return false;
        }

        log::trace!(
            "migrating {} instance from layout {} to {}",
            self.class.name(),
            layout.id(),
            current.id()
        );
        self.fields.write().resize(current.field_count(), Value::Nil);
        *layout = current;
        true
    }

    /// Number of fields currently stored
    pub fn field_count(&self) -> usize {
        self.fields.read().len()
    }

    /// Read the field at `index`
    pub fn field(&self, index: usize) -> Result<Value, RuntimeError> {
        if let Some(value) = self.fields.read().get(index) {
            return Ok(value.clone());
        }
        // Fields added after this object was created read as nil.
        if self.update_layout_to_match_class() {
            return self.field(index);
        }
        Err(RuntimeError::IndexOutOfBounds {
            index: index as i64,
            size: self.field_count(),
        })
    }

    /// Write the field at `index`
    pub fn set_field(&self, index: usize, value: Value) -> Result<(), RuntimeError> {
        if index >= self.field_count() {
            self.update_layout_to_match_class();
        }
        let mut fields = self.fields.write();
        let size = fields.len();
        match fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RuntimeError::IndexOutOfBounds {
                index: index as i64,
                size,
            }),
        }
    }
}

impl std::fmt::Debug for SObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SObject")
            .field("class", &self.class.name())
            .field("layout", &self.layout.read().id())
            .field("fields", &self.field_count())
            .finish()
    }
}

/// Fixed-size mutable array with 1-based guest indexing
#[derive(Debug, Default)]
pub struct SArray {
    elements: RwLock<Vec<Value>>,
}

impl SArray {
    /// Create an array holding `elements`
    pub fn new(elements: Vec<Value>) -> Self {
        Self {
            elements: RwLock::new(elements),
        }
    }

    /// Create an array of `size` nils
    pub fn with_size(size: usize) -> Self {
        Self::new(vec![Value::Nil; size])
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.read().len()
    }

    /// Whether the array has no elements
    pub fn is_empty(&self) -> bool {
        self.elements.read().is_empty()
    }

    /// Element at 1-based `index`
    pub fn at(&self, index: i64) -> Result<Value, RuntimeError> {
        let elements = self.elements.read();
        Self::offset(index, elements.len()).map(|i| elements[i].clone())
    }

    /// Store `value` at 1-based `index`
    pub fn at_put(&self, index: i64, value: Value) -> Result<(), RuntimeError> {
        let mut elements = self.elements.write();
        let i = Self::offset(index, elements.len())?;
        elements[i] = value;
        Ok(())
    }

    /// Copy of the elements, for iteration without holding the lock
    pub fn to_vec(&self) -> Vec<Value> {
        self.elements.read().clone()
    }

    fn offset(index: i64, size: usize) -> Result<usize, RuntimeError> {
        if index >= 1 && (index as usize) <= size {
            Ok(index as usize - 1)
        } else {
            Err(RuntimeError::IndexOutOfBounds { index, size })
        }
    }
}
