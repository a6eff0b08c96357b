//! Runtime values and the objects behind them.
//!
//! Environments, closures, classes and instances form shared, possibly
//! cyclic graphs, so every object lives behind an `Rc` handle.  Equality on
//! callables and instances is identity; everything else compares by value.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::environment::Environment;
use crate::expr::FunctionExpr;
use crate::interpreter::Interrupt;

pub type NativeFn = fn(&[Value]) -> std::result::Result<Value, Interrupt>;

#[derive(Debug, Clone)]
pub enum Value {
    Nil,

    /// Internal sentinel for `var x;` without an initializer.  Reading it is
    /// a runtime error, so it never reaches user code.
    Uninit,

    Bool(bool),

    Number(f64),

    Str(String),

    NativeFunction {
        name: &'static str,
        arity: usize,
        func: NativeFn,
    },

    Function(Rc<LoxFunction>),

    Class(Rc<LoxClass>),

    Instance(Rc<LoxInstance>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,

            (Value::Bool(a), Value::Bool(b)) => a == b,

            (Value::Number(a), Value::Number(b)) => a == b,

            (Value::Str(a), Value::Str(b)) => a == b,

            (Value::NativeFunction { name: a, .. }, Value::NativeFunction { name: b, .. }) => {
                a == b
            }

            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),

            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),

            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),

            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", stringify(self))
    }
}

/// How a function object displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    Lambda,
    Method,
}

/// A user-defined function: a shared declaration plus the frame it closed
/// over.  `closure` is `None` for functions declared at the top level.
#[derive(Debug)]
pub struct LoxFunction {
    name: Option<String>,
    kind: FunctionKind,
    declaration: Rc<FunctionExpr>,
    closure: Option<Rc<RefCell<Environment>>>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        name: Option<String>,
        kind: FunctionKind,
        declaration: Rc<FunctionExpr>,
        closure: Option<Rc<RefCell<Environment>>>,
        is_initializer: bool,
    ) -> Self {
        LoxFunction {
            name,
            kind,
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.as_ref().map_or(0, Vec::len)
    }

    /// A method declared without a parameter list is a getter and is invoked
    /// implicitly at property read.
    pub fn is_getter(&self) -> bool {
        self.declaration.params.is_none()
    }

    pub fn is_initializer(&self) -> bool {
        self.is_initializer
    }

    pub fn declaration(&self) -> &Rc<FunctionExpr> {
        &self.declaration
    }

    pub fn closure(&self) -> Option<Rc<RefCell<Environment>>> {
        self.closure.clone()
    }

    /// Produce the bound form of a method: a fresh frame holding `receiver`
    /// at slot 0, enclosed in the declaring closure.
    pub fn bind(&self, receiver: Value) -> LoxFunction {
        let class_name: String = match &receiver {
            Value::Instance(instance) => instance.class().name.clone(),

            Value::Class(class) => class.name.clone(),

            other => unreachable!("cannot bind a method to {:?}", other),
        };

        let mut frame: Environment = Environment::with_enclosing(self.closure.clone());
        frame.define(receiver);

        LoxFunction {
            name: self
                .name
                .as_ref()
                .map(|name| format!("{}.{}", class_name, name)),
            kind: FunctionKind::Method,
            declaration: Rc::clone(&self.declaration),
            closure: Some(Rc::new(RefCell::new(frame))),
            is_initializer: self.is_initializer,
        }
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FunctionKind::Lambda => write!(f, "<lambda>"),

            FunctionKind::Method => {
                write!(f, "<method {}>", self.name.as_deref().unwrap_or("?"))
            }

            FunctionKind::Function => {
                write!(f, "<fn {}>", self.name.as_deref().unwrap_or("?"))
            }
        }
    }
}

/// A class: methods, an optional superclass, and the metaclass that holds its
/// static methods.  A class is itself an instance of its metaclass; the
/// metaclass has none.
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
    metaclass: Option<Rc<LoxClass>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
        metaclass: Option<Rc<LoxClass>>,
    ) -> Self {
        LoxClass {
            name,
            superclass,
            methods,
            metaclass,
        }
    }

    /// Method lookup walks the superclass chain; the first match wins.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    pub fn superclass(&self) -> Option<Rc<LoxClass>> {
        self.superclass.clone()
    }

    pub fn metaclass(&self) -> Option<Rc<LoxClass>> {
        self.metaclass.clone()
    }

    /// Calling a class forwards to `init` when present.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }
}

impl fmt::Display for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

#[derive(Debug)]
pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: RefCell<HashMap<String, Value>>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn class(&self) -> &Rc<LoxClass> {
        &self.class
    }

    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

/// Render a value the way `print` and the REPL show it.
pub fn stringify(value: &Value) -> String {
    let mut visited: Vec<*const LoxInstance> = Vec::new();

    stringify_guarded(value, &mut visited)
}

fn stringify_guarded(value: &Value, visited: &mut Vec<*const LoxInstance>) -> String {
    match value {
        Value::Nil => "nil".to_string(),

        Value::Uninit => "nil".to_string(),

        Value::Bool(b) => b.to_string(),

        Value::Number(n) => format_number(*n),

        Value::Str(s) => s.clone(),

        Value::NativeFunction { name, .. } => format!("<native fn {}>", name),

        Value::Function(function) => function.to_string(),

        Value::Class(class) => class.to_string(),

        Value::Instance(instance) => {
            let ptr: *const LoxInstance = Rc::as_ptr(instance);

            // A field pointing back at an ancestor renders abbreviated.
            if visited.contains(&ptr) {
                return format!("<{}> {{...}}", instance.class().name);
            }

            visited.push(ptr);

            let fields = instance.fields.borrow();
            let mut names: Vec<&String> = fields.keys().collect();
            names.sort();

            let dump: String = names
                .iter()
                .map(|name| {
                    format!(
                        "{}: {}",
                        name,
                        stringify_guarded(&fields[name.as_str()], visited)
                    )
                })
                .collect::<Vec<String>>()
                .join(", ");

            visited.pop();

            if dump.is_empty() {
                format!("<{}> {{}}", instance.class().name)
            } else {
                format!("<{}> {{ {} }}", instance.class().name, dump)
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }

    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let text: String = n.to_string();

    match text.strip_suffix(".0") {
        Some(stripped) => stripped.to_string(),

        None => text,
    }
}
