//! Core classes every running program needs.

use core_types::SymbolTable;
use std::sync::Arc;

use crate::class::SClass;
use crate::value::Value;

/// The built-in class hierarchy
///
/// `Object` is the root. Booleans split into `True` and `False` under
/// `Boolean`; blocks are classed by parameter count under `Block`.
#[derive(Debug, Clone)]
pub struct CoreClasses {
    /// Root of the hierarchy
    pub object: Arc<SClass>,
    /// Class of every class value
    pub class: Arc<SClass>,
    /// Class of nil
    pub nil: Arc<SClass>,
    /// Common superclass of true and false
    pub boolean: Arc<SClass>,
    /// Class of true
    pub true_class: Arc<SClass>,
    /// Class of false
    pub false_class: Arc<SClass>,
    /// Small and large integers
    pub integer: Arc<SClass>,
    /// Doubles
    pub double: Arc<SClass>,
    /// Strings
    pub string: Arc<SClass>,
    /// Symbols
    pub symbol: Arc<SClass>,
    /// Arrays
    pub array: Arc<SClass>,
    /// Common superclass of all blocks
    pub block: Arc<SClass>,
    /// Blocks without parameters
    pub block1: Arc<SClass>,
    /// One-parameter blocks
    pub block2: Arc<SClass>,
    /// Two-parameter blocks
    pub block3: Arc<SClass>,
    /// Three-parameter blocks
    pub block4: Arc<SClass>,
}

impl CoreClasses {
    /// Build the hierarchy, interning class names in `symbols`
    pub fn bootstrap(symbols: &SymbolTable) -> Self {
        let root = |name: &str| SClass::new(symbols.intern(name), None, vec![]);
        let sub = |name: &str, parent: &Arc<SClass>| {
            SClass::new(symbols.intern(name), Some(Arc::clone(parent)), vec![])
        };

        let object = root("Object");
        let boolean = sub("Boolean", &object);
        let block = sub("Block", &object);
        Self {
            class: sub("Class", &object),
            nil: sub("Nil", &object),
            true_class: sub("True", &boolean),
            false_class: sub("False", &boolean),
            integer: sub("Integer", &object),
            double: sub("Double", &object),
            string: sub("String", &object),
            symbol: sub("Symbol", &object),
            array: sub("Array", &object),
            block1: sub("Block1", &block),
            block2: sub("Block2", &block),
            block3: sub("Block3", &block),
            block4: sub("Block4", &block),
            boolean,
            block,
            object,
        }
    }

    /// Class of `value`
    pub fn class_of(&self, value: &Value) -> Arc<SClass> {
        let class = match value {
            Value::Nil => &self.nil,
            Value::Boolean(true) => &self.true_class,
            Value::Boolean(false) => &self.false_class,
            Value::Integer(_) | Value::BigInteger(_) => &self.integer,
            Value::Double(_) => &self.double,
            Value::String(_) => &self.string,
            Value::Symbol(_) => &self.symbol,
            Value::Array(_) => &self.array,
            Value::Object(object) => return Arc::clone(object.class()),
            Value::Block(b) => match b.parameter_count() {
                0 => &self.block1,
                1 => &self.block2,
                2 => &self.block3,
                3 => &self.block4,
                _ => &self.block,
            },
            Value::Class(_) => &self.class,
        };
        Arc::clone(class)
    }

    /// All core classes, for registration as globals
    pub fn all(&self) -> Vec<&Arc<SClass>> {
        vec![
            &self.object,
            &self.class,
            &self.nil,
            &self.boolean,
            &self.true_class,
            &self.false_class,
            &self.integer,
            &self.double,
            &self.string,
            &self.symbol,
            &self.array,
            &self.block,
            &self.block1,
            &self.block2,
            &self.block3,
            &self.block4,
        ]
    }
}
