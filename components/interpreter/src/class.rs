//! Classes and method resolution.
//!
//! [`SClass::lookup_invokable`] searches a class and its ancestry for a
//! selector. Results, including misses, are memoized per class. Adding a
//! method anywhere bumps a process-wide hierarchy epoch so memoized
//! results in subclasses are discarded on their next lookup.
//!
//! Field indices are fixed into compiled field accesses, so a class can
//! only grow new instance fields while it has no live subclasses.

use core_types::{ProgramDefinitionError, Symbol};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::method::Method;
use crate::object::ObjectLayout;

static HIERARCHY_EPOCH: AtomicU64 = AtomicU64::new(0);

#[derive(Default)]
struct LookupCache {
    epoch: u64,
    entries: HashMap<Symbol, Option<Arc<Method>>>,
}

/// A class: name, superclass, method dictionary and instance layout
pub struct SClass {
    name: Symbol,
    superclass: Option<Arc<SClass>>,
    subclasses: RwLock<Vec<Weak<SClass>>>,
    methods: RwLock<HashMap<Symbol, Arc<Method>>>,
    lookup_cache: RwLock<LookupCache>,
    instance_fields: RwLock<Vec<Symbol>>,
    layout: RwLock<Arc<ObjectLayout>>,
}

impl SClass {
    /// Create a class
    ///
    /// # Arguments
    ///
    /// * `name` - Class name
    /// * `superclass` - Parent class, `None` for a root class
    /// * `fields` - Instance fields declared by this class; inherited
    ///   fields come first
    pub fn new(name: Symbol, superclass: Option<Arc<SClass>>, fields: Vec<Symbol>) -> Arc<Self> {
        let mut instance_fields = superclass
            .as_ref()
            .map(|s| s.instance_fields())
            .unwrap_or_default();
        instance_fields.extend(fields);

        let layout = Arc::new(ObjectLayout::new(instance_fields.len()));
        let class = Arc::new(Self {
            name,
            superclass,
            subclasses: RwLock::new(Vec::new()),
            methods: RwLock::new(HashMap::new()),
            lookup_cache: RwLock::new(LookupCache::default()),
            instance_fields: RwLock::new(instance_fields),
            layout: RwLock::new(layout),
        });
        if let Some(parent) = &class.superclass {
            let mut siblings = parent.subclasses.write();
            siblings.retain(|s| s.strong_count() > 0);
            siblings.push(Arc::downgrade(&class));
        }
        class
    }

    /// Class name
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Parent class
    pub fn superclass(&self) -> Option<&Arc<SClass>> {
        self.superclass.as_ref()
    }

    /// Current instance layout
    pub fn layout(&self) -> Arc<ObjectLayout> {
        Arc::clone(&self.layout.read())
    }

    /// Names of all instance fields, inherited ones first
    pub fn instance_fields(&self) -> Vec<Symbol> {
        self.instance_fields.read().clone()
    }

    /// Index of the instance field called `name`
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.instance_fields
            .read()
            .iter()
            .position(|f| f.as_str() == name)
    }

    /// Number of instance fields
    pub fn field_count(&self) -> usize {
        self.instance_fields.read().len()
    }

    /// Subclasses that are still alive
    pub fn subclasses(&self) -> Vec<Arc<SClass>> {
        self.subclasses
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Append an instance field and supersede the current layout
    ///
    /// Cache entries guarded by the old layout become permanently invalid;
    /// existing instances migrate on their next dispatch or field access.
    /// Fails while the class has live subclasses, whose own fields already
    /// occupy the next index.
    pub fn add_instance_field(&self, name: Symbol) -> Result<usize, ProgramDefinitionError> {
        if let Some(subclass) = self.subclasses().first() {
            return Err(ProgramDefinitionError::FieldAddedAboveSubclass {
                class: self.name.as_str().to_string(),
                field: name.as_str().to_string(),
                subclass: subclass.name().as_str().to_string(),
            });
        }

        let mut fields = self.instance_fields.write();
        fields.push(name);
        let index = fields.len() - 1;

        let mut layout = self.layout.write();
        let replacement = Arc::new(ObjectLayout::new(fields.len()));
        log::trace!(
            "{}: layout {} superseded by {}",
            self.name,
            layout.id(),
            replacement.id()
        );
        layout.supersede();
        *layout = replacement;
        Ok(index)
    }

    /// Install `method` under its signature, replacing any previous one
    pub fn add_method(self: &Arc<Self>, method: Arc<Method>) {
        method.set_holder(self);
        self.methods
            .write()
            .insert(method.signature().clone(), method);
        HIERARCHY_EPOCH.fetch_add(1, Ordering::AcqRel);
    }

    /// Method defined directly in this class
    pub fn local_method(&self, selector: &Symbol) -> Option<Arc<Method>> {
        self.methods.read().get(selector).cloned()
    }

    /// Number of methods defined directly in this class
    pub fn method_count(&self) -> usize {
        self.methods.read().len()
    }

    /// Resolve `selector` in this class and its ancestry
    ///
    /// Deterministic and free of observable side effects; the result is
    /// memoized per (class, selector).
    pub fn lookup_invokable(&self, selector: &Symbol) -> Option<Arc<Method>> {
        let epoch = HIERARCHY_EPOCH.load(Ordering::Acquire);
        {
            let cache = self.lookup_cache.read();
            if cache.epoch == epoch {
                if let Some(hit) = cache.entries.get(selector) {
                    return hit.clone();
                }
            }
        }

        let found = self.lookup_uncached(selector);

        let mut cache = self.lookup_cache.write();
        if cache.epoch != epoch {
            cache.entries.clear();
            cache.epoch = epoch;
        }
        cache.entries.insert(selector.clone(), found.clone());
        found
    }

    /// Whether instances respond to `selector`
    pub fn understands(&self, selector: &Symbol) -> bool {
        self.lookup_invokable(selector).is_some()
    }

    /// Whether this class is `other` or inherits from it
    pub fn is_kind_of(&self, other: &SClass) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if std::ptr::eq(class, other) {
                return true;
            }
            current = class.superclass.as_deref();
        }
        false
    }

    fn lookup_uncached(&self, selector: &Symbol) -> Option<Arc<Method>> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(method) = class.local_method(selector) {
                return Some(method);
            }
            current = class.superclass.as_deref();
        }
        None
    }
}

impl fmt::Debug for SClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SClass")
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|s| s.name().clone()))
            .field("fields", &self.field_count())
            .finish()
    }
}
