//! The interpreter universe.
//!
//! A [`VM`] owns everything shared by the code it runs: the symbol table,
//! the core classes, global variables, the optimization flags and the
//! registered eager specializers. It is `Send + Sync`; any number of
//! threads may run methods against the same instance.

use core_types::{OptimizationFlags, Symbol, SymbolTable};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::class::SClass;
use crate::eager::{ArithmeticSpecializer, EagerSpecializer, SpecializedSend};
use crate::error::{ExecResult, RuntimeError};
use crate::method::Method;
use crate::nonlocal::settle_at_top_level;
use crate::object::SObject;
use crate::primitives;
use crate::universe::CoreClasses;
use crate::value::Value;

const DOES_NOT_UNDERSTAND: &str = "doesNotUnderstand:arguments:";

/// Association of a global name with its current value
///
/// Bindings are never removed from the globals table, so a read that kept
/// one sees every later rebinding of its name. An unbound binding holds
/// `None` until the name is first assigned.
#[derive(Debug)]
pub struct GlobalBinding {
    name: Symbol,
    value: RwLock<Option<Value>>,
}

impl GlobalBinding {
    fn new(name: Symbol, value: Option<Value>) -> Self {
        Self {
            name,
            value: RwLock::new(value),
        }
    }

    /// Name of the global
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Current value, `None` while unbound
    pub fn value(&self) -> Option<Value> {
        self.value.read().clone()
    }

    fn set(&self, value: Value) {
        *self.value.write() = Some(value);
    }
}

/// Interpreter universe
///
/// # Example
///
/// ```
/// use interpreter::{Value, VM};
///
/// let vm = VM::new();
/// let sum = vm.send(Value::Integer(40), "+", vec![Value::Integer(2)]).unwrap();
/// assert_eq!(sum, Value::Integer(42));
/// ```
pub struct VM {
    flags: OptimizationFlags,
    symbols: SymbolTable,
    core: CoreClasses,
    globals: RwLock<HashMap<Symbol, Arc<GlobalBinding>>>,
    specializers: RwLock<Vec<Arc<dyn EagerSpecializer>>>,
    dnu_selector: Symbol,
}

impl VM {
    /// Create a VM with default optimization flags
    pub fn new() -> Self {
        Self::with_flags(OptimizationFlags::default())
    }

    /// Create a VM with the given optimization flags
    pub fn with_flags(flags: OptimizationFlags) -> Self {
        let symbols = SymbolTable::new();
        let core = CoreClasses::bootstrap(&symbols);
        primitives::install(&core, &symbols);

        let mut globals = HashMap::new();
        let mut bind = |name: Symbol, value: Value| {
            globals.insert(name.clone(), Arc::new(GlobalBinding::new(name, Some(value))));
        };
        for class in core.all() {
            bind(class.name().clone(), Value::Class(Arc::clone(class)));
        }
        bind(symbols.intern("nil"), Value::Nil);
        bind(symbols.intern("true"), Value::Boolean(true));
        bind(symbols.intern("false"), Value::Boolean(false));
        let dnu_selector = symbols.intern(DOES_NOT_UNDERSTAND);

        log::debug!("universe created with {:?}", flags);
        Self {
            flags,
            symbols,
            core,
            globals: RwLock::new(globals),
            specializers: RwLock::new(vec![Arc::new(ArithmeticSpecializer)]),
            dnu_selector,
        }
    }

    /// Optimization flags in effect
    pub fn flags(&self) -> &OptimizationFlags {
        &self.flags
    }

    /// Intern `name`
    pub fn symbol(&self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    /// Symbol table of this universe
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Built-in classes
    pub fn core(&self) -> &CoreClasses {
        &self.core
    }

    /// Class of `value`
    pub fn class_of(&self, value: &Value) -> Arc<SClass> {
        self.core.class_of(value)
    }

    /// Define a class and bind it as a global
    ///
    /// # Arguments
    ///
    /// * `name` - Class name
    /// * `superclass` - Parent class; `Object` when `None`
    /// * `fields` - Instance fields declared by the new class
    pub fn define_class(&self, name: &str, superclass: Option<&Arc<SClass>>, fields: &[&str]) -> Arc<SClass> {
        let superclass = Arc::clone(superclass.unwrap_or(&self.core.object));
        let fields = fields.iter().map(|f| self.symbol(f)).collect();
        let class = SClass::new(self.symbol(name), Some(superclass), fields);
        self.binding(class.name()).set(Value::Class(Arc::clone(&class)));
        class
    }

    /// Create an instance of `class` with nil fields
    pub fn new_instance(&self, class: &Arc<SClass>) -> Value {
        Value::Object(Arc::new(SObject::new(Arc::clone(class))))
    }

    /// Value of global `name`
    pub fn global(&self, name: &Symbol) -> Option<Value> {
        self.globals.read().get(name).and_then(|b| b.value())
    }

    /// Bind global `name` to `value`
    ///
    /// Rebinding updates the existing association in place.
    pub fn set_global(&self, name: &str, value: Value) {
        let name = self.symbol(name);
        log::trace!("global {} bound", name);
        self.binding(&name).set(value);
    }

    /// Association for global `name`, created unbound on first request
    pub fn binding(&self, name: &Symbol) -> Arc<GlobalBinding> {
        if let Some(binding) = self.globals.read().get(name) {
            return Arc::clone(binding);
        }
        let mut globals = self.globals.write();
        Arc::clone(
            globals
                .entry(name.clone())
                .or_insert_with(|| Arc::new(GlobalBinding::new(name.clone(), None))),
        )
    }

    /// Add an eager specializer, consulted after the built-in ones
    pub fn register_specializer(&self, specializer: Arc<dyn EagerSpecializer>) {
        self.specializers.write().push(specializer);
    }

    /// First eager specialization offered for this send, if any
    pub fn eager_specialization(&self, selector: &Symbol, arguments: &[Value]) -> Option<Arc<dyn SpecializedSend>> {
        self.specializers
            .read()
            .iter()
            .find_map(|s| s.specialize(selector, arguments))
    }

    /// Report a send nobody understood
    ///
    /// Forwards `#doesNotUnderstand:arguments:` to the receiver when its
    /// class understands it, otherwise fails with
    /// [`RuntimeError::DoesNotUnderstand`].
    pub fn does_not_understand(
        &self,
        selector: &Symbol,
        receiver_class: &Arc<SClass>,
        mut arguments: Vec<Value>,
    ) -> ExecResult {
        match receiver_class.lookup_invokable(&self.dnu_selector) {
            Some(handler) => {
                let rest = arguments.split_off(1);
                arguments.push(Value::Symbol(selector.clone()));
                arguments.push(Value::array(rest));
                handler.invoke(self, arguments)
            }
            None => Err(RuntimeError::DoesNotUnderstand {
                selector: selector.clone(),
                class: receiver_class.name().clone(),
            }
            .into()),
        }
    }

    /// Send without an inline cache, as the generic fallback does
    pub fn perform(&self, selector: &Symbol, arguments: Vec<Value>) -> ExecResult {
        let receiver = arguments.first().ok_or_else(|| {
            RuntimeError::FrameIntegrity(format!("#{} sent without a receiver", selector))
        })?;
        let class = self.class_of(receiver);
        match class.lookup_invokable(selector) {
            Some(method) => method.invoke(self, arguments),
            None => self.does_not_understand(selector, &class, arguments),
        }
    }

    /// Send `selector` to `receiver` from outside any method
    ///
    /// A non-local return that reaches this point found no live home
    /// activation and is reported as [`RuntimeError::NonLocalReturnEscaped`].
    pub fn send(&self, receiver: Value, selector: &str, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        let selector = self.symbol(selector);
        let mut all = Vec::with_capacity(arguments.len() + 1);
        all.push(receiver);
        all.extend(arguments);
        settle_at_top_level(self.perform(&selector, all))
    }

    /// Invoke `method` from outside any method
    pub fn execute(&self, method: &Method, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        settle_at_top_level(method.invoke(self, arguments))
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VM {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VM")
            .field("flags", &self.flags)
            .field("symbols", &self.symbols.len())
            .field("globals", &self.globals.read().len())
            .finish()
    }
}
