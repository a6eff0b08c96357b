//! Tree-walking evaluator.
//!
//! Executes a resolved program.  Local variable references carry `(depth,
//! slot)` entries in the side table the resolver filled in; anything without
//! an entry is a global and is looked up by name.
//!
//! Control flow that is not an error travels through [`Signal`]: `break`,
//! `continue` and `return` are ordinary `Ok` values of statement execution
//! and are caught exactly by the construct that owns them.  Runtime errors
//! and the `exit()` native travel through [`Interrupt`], unwinding to the
//! top-level [`Interpreter::interpret`] call.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::environment::{Environment, Globals};
use crate::error::{LoxError, Reporter};
use crate::expr::{Expr, ExprId, FunctionExpr, LiteralValue};
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};
use crate::value::{stringify, FunctionKind, LoxClass, LoxFunction, LoxInstance, Value};

/// Non-error unwinds of evaluation: a runtime error headed for the sink, or
/// the `exit()` native tearing down the current top-level interpretation.
#[derive(Debug)]
pub enum Interrupt {
    Error(LoxError),
    Exit,
}

impl From<LoxError> for Interrupt {
    fn from(error: LoxError) -> Self {
        Interrupt::Error(error)
    }
}

impl From<io::Error> for Interrupt {
    fn from(error: io::Error) -> Self {
        Interrupt::Error(LoxError::Io(error))
    }
}

/// The outcome of executing a statement.  `Break`/`Continue` are caught by
/// the nearest loop, `Return` by the nearest function call.
#[derive(Debug)]
pub enum Signal {
    None,
    Break,
    Continue,
    Return(Value),
}

type EvalResult = Result<Value, Interrupt>;
type ExecResult = Result<Signal, Interrupt>;

pub struct Interpreter<W: Write> {
    globals: Globals,
    environment: Option<Rc<RefCell<Environment>>>,
    locals: HashMap<ExprId, (usize, usize)>,
    output: W,
}

impl<W: Write> Interpreter<W> {
    pub fn new(output: W) -> Self {
        let mut globals: Globals = Globals::new();

        globals.define(
            "clock",
            Value::NativeFunction {
                name: "clock",
                arity: 0,
                func: clock_native,
            },
        );
        globals.define(
            "input",
            Value::NativeFunction {
                name: "input",
                arity: 0,
                func: input_native,
            },
        );
        globals.define(
            "number",
            Value::NativeFunction {
                name: "number",
                arity: 1,
                func: number_native,
            },
        );
        globals.define(
            "exit",
            Value::NativeFunction {
                name: "exit",
                arity: 0,
                func: exit_native,
            },
        );

        Interpreter {
            globals,
            environment: None,
            locals: HashMap::new(),
            output,
        }
    }

    /// Resolver callback: note that the reference `id` lives `depth` frames
    /// up at index `slot`.
    pub fn resolve(&mut self, id: ExprId, depth: usize, slot: usize) {
        debug!("Resolved {:?} -> depth {}, slot {}", id, depth, slot);

        self.locals.insert(id, (depth, slot));
    }

    /// Run a program.  Runtime errors are reported to the sink and terminate
    /// this call; `exit()` terminates it silently.
    pub fn interpret(&mut self, statements: &[Stmt], reporter: &Reporter) {
        info!("Interpreting {} statement(s)", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(_) => {}

                Err(Interrupt::Exit) => break,

                Err(Interrupt::Error(error)) => {
                    reporter.runtime_error(&error);
                    break;
                }
            }
        }
    }

    /// REPL helper: evaluate a trailing bare expression and hand back its
    /// rendering, or `None` if it failed (the error has been reported).
    pub fn interpret_expression(&mut self, expr: &Expr, reporter: &Reporter) -> Option<String> {
        match self.evaluate(expr) {
            Ok(value) => Some(stringify(&value)),

            Err(Interrupt::Exit) => None,

            Err(Interrupt::Error(error)) => {
                reporter.runtime_error(&error);
                None
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> ExecResult {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(Signal::None)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value)?;

                Ok(Signal::None)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Uninit,
                };

                self.define(name, value);

                Ok(Signal::None)
            }

            Stmt::Block(statements) => {
                let frame: Environment = Environment::with_enclosing(self.environment.clone());

                self.execute_block(statements, Rc::new(RefCell::new(frame)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Signal::None)
                }
            }

            Stmt::While {
                condition,
                body,
                for_increment,
            } => {
                while is_truthy(&self.evaluate(condition)?) {
                    match self.execute(body)? {
                        Signal::None | Signal::Continue => {}

                        Signal::Break => return Ok(Signal::None),

                        signal @ Signal::Return(_) => return Ok(signal),
                    }

                    // Runs once per iteration, including after `continue`.
                    if let Some(increment) = for_increment {
                        self.evaluate(increment)?;
                    }
                }

                Ok(Signal::None)
            }

            Stmt::Break(_) => Ok(Signal::Break),

            Stmt::Continue(_) => Ok(Signal::Continue),

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(Signal::Return(value))
            }

            Stmt::Function { name, function } => {
                let function = LoxFunction::new(
                    Some(name.lexeme.clone()),
                    FunctionKind::Function,
                    Rc::clone(function),
                    self.environment.clone(),
                    false,
                );

                self.define(name, Value::Function(Rc::new(function)));

                Ok(Signal::None)
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                class_methods,
            } => self.execute_class(name, superclass.as_ref(), methods, class_methods),

            Stmt::InitSuper { call, .. } => {
                // The superclass initializer runs for its side effects only.
                self.evaluate(call)?;

                Ok(Signal::None)
            }
        }
    }

    fn execute_block(&mut self, statements: &[Stmt], frame: Rc<RefCell<Environment>>) -> ExecResult {
        let previous: Option<Rc<RefCell<Environment>>> =
            std::mem::replace(&mut self.environment, Some(frame));

        let mut result: ExecResult = Ok(Signal::None);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Signal::None) => {}

                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Stmt],
        class_methods: &[Stmt],
    ) -> ExecResult {
        let superclass: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => {
                let value: Value = self.evaluate(expr)?;

                match value {
                    Value::Class(class) => Some(class),

                    _ => {
                        return Err(LoxError::runtime(name.line, "Superclass must be a class.").into())
                    }
                }
            }

            None => None,
        };

        // Methods close over a frame holding the superclass so `super`
        // resolves at a fixed (depth, slot).
        let previous: Option<Rc<RefCell<Environment>>> = self.environment.clone();

        if let Some(class) = &superclass {
            let mut frame: Environment = Environment::with_enclosing(self.environment.clone());
            frame.define(Value::Class(Rc::clone(class)));

            self.environment = Some(Rc::new(RefCell::new(frame)));
        }

        let instance_methods: HashMap<String, Rc<LoxFunction>> = self.build_methods(methods, true);
        let static_methods: HashMap<String, Rc<LoxFunction>> =
            self.build_methods(class_methods, false);

        self.environment = previous;

        // The metaclass carries the static methods; the class is its sole
        // instance.  Metaclasses themselves have none.
        let metaclass: Rc<LoxClass> = Rc::new(LoxClass::new(
            name.lexeme.clone(),
            None,
            static_methods,
            None,
        ));

        let class: Rc<LoxClass> = Rc::new(LoxClass::new(
            name.lexeme.clone(),
            superclass,
            instance_methods,
            Some(metaclass),
        ));

        self.define(name, Value::Class(class));

        Ok(Signal::None)
    }

    fn build_methods(
        &self,
        declarations: &[Stmt],
        detect_initializer: bool,
    ) -> HashMap<String, Rc<LoxFunction>> {
        let mut methods: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for declaration in declarations {
            if let Stmt::Function { name, function } = declaration {
                let is_initializer: bool = detect_initializer && name.lexeme == "init";

                let method = LoxFunction::new(
                    Some(name.lexeme.clone()),
                    FunctionKind::Function,
                    Rc::clone(function),
                    self.environment.clone(),
                    is_initializer,
                );

                methods.insert(name.lexeme.clone(), Rc::new(method));
            }
        }

        methods
    }

    fn define(&mut self, name: &Token, value: Value) {
        match &self.environment {
            Some(environment) => environment.borrow_mut().define(value),

            None => self.globals.define(&name.lexeme, value),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    fn evaluate(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Nil => Value::Nil,
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::Str(s.clone()),
            }),

            Expr::Variable { id, name } => {
                let value: Value = self.look_up_variable(name, *id)?;

                if let Value::Uninit = value {
                    return Err(LoxError::runtime(
                        name.line,
                        "Variable used before initialization",
                    )
                    .into());
                }

                Ok(value)
            }

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&(depth, slot)) => {
                        self.current_frame()
                            .borrow_mut()
                            .assign_at(depth, slot, value.clone());
                    }

                    None => {
                        self.globals
                            .assign(&name.lexeme, value.clone(), name.line)?;
                    }
                }

                Ok(value)
            }

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                if operator.token_type == TokenType::OR {
                    if is_truthy(&left) {
                        return Ok(left);
                    }
                } else if !is_truthy(&left) {
                    return Ok(left);
                }

                self.evaluate(right)
            }

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                self.call_value(callee, args, paren)
            }

            Expr::Get { object, name } => self.evaluate_get(object, name),

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object: Value = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        let value: Value = self.evaluate(value)?;
                        instance.set_field(&name.lexeme, value.clone());

                        Ok(value)
                    }

                    _ => Err(LoxError::runtime(name.line, "Only instances have fields.").into()),
                }
            }

            Expr::This { id, keyword } => self.look_up_variable(keyword, *id),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),

            Expr::Function(declaration) => {
                let lambda = LoxFunction::new(
                    None,
                    FunctionKind::Lambda,
                    Rc::clone(declaration),
                    self.environment.clone(),
                    false,
                );

                Ok(Value::Function(Rc::new(lambda)))
            }
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> EvalResult {
        let right: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(operator.line, "Operand must be a number.").into()),
            },

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&right))),

            _ => unreachable!("invalid unary operator"),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> EvalResult {
        let left: Value = self.evaluate(left)?;
        let right: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                // If either side is a string, both sides stringify.
                (Value::Str(_), _) | (_, Value::Str(_)) => {
                    Ok(Value::Str(stringify(&left) + &stringify(&right)))
                }

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )
                .into()),
            },

            TokenType::MINUS => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::STAR => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::SLASH => match (&left, &right) {
                // IEEE division: x/0.0 yields an infinity or NaN.
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::PERCENT => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a % b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
            },

            TokenType::GREATER
            | TokenType::GREATER_EQUAL
            | TokenType::LESS
            | TokenType::LESS_EQUAL => self.compare_values(operator, &left, &right),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),

            // The comma operator evaluates both sides and yields the right.
            TokenType::COMMA => Ok(right),

            _ => unreachable!("invalid binary operator"),
        }
    }

    /// Comparisons work on two numbers, two strings, or a mixed pair; the
    /// mixed case stringifies both sides and compares lexicographically.
    fn compare_values(&self, operator: &Token, left: &Value, right: &Value) -> EvalResult {
        let ordering: Ordering = match (left, right) {
            (Value::Number(a), Value::Number(b)) => match a.partial_cmp(b) {
                Some(ordering) => ordering,

                // NaN: every comparison is false.
                None => return Ok(Value::Bool(false)),
            },

            (Value::Str(a), Value::Str(b)) => a.cmp(b),

            (Value::Str(_), Value::Number(_)) | (Value::Number(_), Value::Str(_)) => {
                stringify(left).cmp(&stringify(right))
            }

            _ => {
                return Err(LoxError::runtime(
                    operator.line,
                    "Only strings or numbers are comparable",
                )
                .into())
            }
        };

        let result: bool = match operator.token_type {
            TokenType::GREATER => ordering == Ordering::Greater,
            TokenType::GREATER_EQUAL => ordering != Ordering::Less,
            TokenType::LESS => ordering == Ordering::Less,
            TokenType::LESS_EQUAL => ordering != Ordering::Greater,
            _ => unreachable!("invalid comparison operator"),
        };

        Ok(Value::Bool(result))
    }

    fn evaluate_get(&mut self, object: &Expr, name: &Token) -> EvalResult {
        let object: Value = self.evaluate(object)?;

        match &object {
            Value::Instance(instance) => {
                if let Some(field) = instance.get_field(&name.lexeme) {
                    return Ok(field);
                }

                match instance.class().find_method(&name.lexeme) {
                    Some(method) => self.finish_property(method, object.clone()),

                    None => Err(LoxError::runtime(
                        name.line,
                        format!("Undefined property '{}'.", name.lexeme),
                    )
                    .into()),
                }
            }

            // A class is an instance of its metaclass: static methods.
            Value::Class(class) => {
                let method: Option<Rc<LoxFunction>> = class
                    .metaclass()
                    .and_then(|metaclass| metaclass.find_method(&name.lexeme));

                match method {
                    Some(method) => self.finish_property(method, object.clone()),

                    None => Err(LoxError::runtime(
                        name.line,
                        format!("Undefined property '{}'.", name.lexeme),
                    )
                    .into()),
                }
            }

            _ => Err(LoxError::runtime(name.line, "Only instances have properties.").into()),
        }
    }

    /// Bind a method to its receiver; getters are invoked on the spot.
    fn finish_property(&mut self, method: Rc<LoxFunction>, receiver: Value) -> EvalResult {
        let bound: LoxFunction = method.bind(receiver);

        if bound.is_getter() {
            return self.call_function(&bound, Vec::new());
        }

        Ok(Value::Function(Rc::new(bound)))
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> EvalResult {
        let &(depth, slot) = self
            .locals
            .get(&id)
            .expect("'super' not resolved: resolver invariant violated");

        let superclass: Value = self.current_frame().borrow().get_at(depth, slot);
        // `this` sits at slot 0 of the frame just inside the `super` frame.
        let receiver: Value = self.current_frame().borrow().get_at(depth - 1, 0);

        let superclass: Rc<LoxClass> = match superclass {
            Value::Class(class) => class,

            _ => unreachable!("'super' slot does not hold a class"),
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(receiver)))),

            None => Err(LoxError::runtime(
                keyword.line,
                format!("Undefined property '{}'.", method.lexeme),
            )
            .into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    fn call_value(&mut self, callee: Value, arguments: Vec<Value>, paren: &Token) -> EvalResult {
        let arity: usize = match &callee {
            Value::NativeFunction { arity, .. } => *arity,
            Value::Function(function) => function.arity(),
            Value::Class(class) => class.arity(),

            _ => {
                return Err(LoxError::runtime(
                    paren.line,
                    "Can only call functions and classes",
                )
                .into())
            }
        };

        if arguments.len() != arity {
            return Err(LoxError::runtime(
                paren.line,
                format!("Expected {} arguments but got{}.", arity, arguments.len()),
            )
            .into());
        }

        match callee {
            Value::NativeFunction { func, .. } => func(&arguments),

            Value::Function(function) => self.call_function(&function, arguments),

            Value::Class(class) => self.instantiate(class, arguments),

            _ => unreachable!("arity check only passes callables"),
        }
    }

    fn call_function(&mut self, function: &LoxFunction, arguments: Vec<Value>) -> EvalResult {
        let mut frame: Environment = Environment::with_enclosing(function.closure());

        if function.declaration().params.is_some() {
            for argument in arguments {
                frame.define(argument);
            }
        }

        let declaration: Rc<FunctionExpr> = Rc::clone(function.declaration());
        let signal: Signal = self.execute_block(&declaration.body, Rc::new(RefCell::new(frame)))?;

        if function.is_initializer() {
            // Initializers always produce `this`, held at slot 0 of the
            // frame `bind` created.
            let closure = function.closure().expect("initializer is always bound");
            let this: Value = closure.borrow().get_at(0, 0);

            return Ok(this);
        }

        match signal {
            Signal::Return(value) => Ok(value),

            _ => Ok(Value::Nil),
        }
    }

    fn instantiate(&mut self, class: Rc<LoxClass>, arguments: Vec<Value>) -> EvalResult {
        let instance: Rc<LoxInstance> = Rc::new(LoxInstance::new(Rc::clone(&class)));

        if let Some(init) = class.find_method("init") {
            let bound: LoxFunction = init.bind(Value::Instance(Rc::clone(&instance)));
            self.call_function(&bound, arguments)?;
        }

        Ok(Value::Instance(instance))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn look_up_variable(&self, name: &Token, id: ExprId) -> EvalResult {
        match self.locals.get(&id) {
            Some(&(depth, slot)) => Ok(self.current_frame().borrow().get_at(depth, slot)),

            None => self
                .globals
                .get(&name.lexeme, name.line)
                .map_err(Interrupt::from),
        }
    }

    fn current_frame(&self) -> &Rc<RefCell<Environment>> {
        self.environment
            .as_ref()
            .expect("local resolved outside any frame: resolver invariant violated")
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,

        Value::Bool(b) => *b,

        _ => true,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Native functions
// ─────────────────────────────────────────────────────────────────────────────

fn clock_native(_args: &[Value]) -> Result<Value, Interrupt> {
    let seconds: f64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);

    Ok(Value::Number(seconds))
}

fn input_native(_args: &[Value]) -> Result<Value, Interrupt> {
    let mut line: String = String::new();

    io::stdin().lock().read_line(&mut line)?;

    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }

    Ok(Value::Str(line))
}

fn number_native(args: &[Value]) -> Result<Value, Interrupt> {
    match &args[0] {
        Value::Str(s) => Ok(s
            .parse::<f64>()
            .map(Value::Number)
            .unwrap_or(Value::Nil)),

        _ => Ok(Value::Nil),
    }
}

fn exit_native(_args: &[Value]) -> Result<Value, Interrupt> {
    Err(Interrupt::Exit)
}
