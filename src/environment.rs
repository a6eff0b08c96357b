//! Lexical environments.
//!
//! [`Environment`] is one frame of the closure chain: an ordered vector of
//! value slots plus a shared handle to the enclosing frame.  The resolver
//! assigns every local reference a `(depth, slot)` pair, so the runtime never
//! looks locals up by name — it hops `depth` frames and indexes the slot.
//!
//! The root of the chain is not an `Environment` at all: top-level bindings
//! live in [`Globals`], a by-name map, because globals may be declared and
//! referenced in any order and the resolver deliberately skips them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::value::Value;

#[derive(Debug, Default)]
pub struct Environment {
    values: Vec<Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: Vec::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Option<Rc<RefCell<Environment>>>) -> Self {
        Environment {
            values: Vec::new(),
            enclosing,
        }
    }

    /// Append a slot.  Slot order must mirror the resolver's declaration
    /// order within the frame.
    pub fn define(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn get_at(&self, depth: usize, slot: usize) -> Value {
        if depth == 0 {
            self.values[slot].clone()
        } else {
            self.enclosing
                .as_ref()
                .expect("enclosing frame missing: resolver invariant violated")
                .borrow()
                .get_at(depth - 1, slot)
        }
    }

    pub fn assign_at(&mut self, depth: usize, slot: usize, value: Value) {
        if depth == 0 {
            self.values[slot] = value;
        } else {
            self.enclosing
                .as_ref()
                .expect("enclosing frame missing: resolver invariant violated")
                .borrow_mut()
                .assign_at(depth - 1, slot, value);
        }
    }
}

/// The global frame: name-keyed, forward-referenceable.
#[derive(Debug, Default)]
pub struct Globals {
    values: HashMap<String, Value>,
}

impl Globals {
    pub fn new() -> Self {
        Globals {
            values: HashMap::new(),
        }
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        match self.values.get(name) {
            Some(value) => Ok(value.clone()),

            None => Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            )),
        }
    }

    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            Ok(())
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }
}
