//! Static resolution pass.
//!
//! A single walk over the AST that:
//! 1. **Builds lexical scopes**: a stack of frames mapping each declared name
//!    to its state (declared, defined, read) and its slot — the positional
//!    index the runtime frame will hold it at.
//! 2. **Enforces static rules**: duplicate declarations, reading a variable
//!    in its own initializer, `return` outside functions, `break`/`continue`
//!    outside loops, `this`/`super` placement, self-inheritance, and
//!    defined-but-never-read locals.
//! 3. **Records binding distances**: every local reference is reported back
//!    to the interpreter as a `(depth, slot)` pair so the runtime never
//!    searches by name.  References that resolve to nothing on the stack are
//!    globals and get no entry.
//!
//! Errors go to the shared [`Reporter`] and resolution continues, so one pass
//! surfaces every diagnostic it can find.

use std::collections::HashMap;
use std::io::Write;

use log::{debug, info};

use crate::error::{LoxError, Reporter};
use crate::expr::{Expr, ExprId, FunctionExpr};
use crate::interpreter::Interpreter;
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};

/// Are we inside a user function?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    /// Not inside any class
    None,

    /// Inside a class declaration _without_ a superclass
    Class,

    /// Inside a class declaration _with_ a superclass
    Subclass,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LoopType {
    None,
    Loop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VariableState {
    Declared,
    Defined,
    Read,
}

#[derive(Debug)]
struct Variable {
    name: Token,
    state: VariableState,
    slot: usize,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'i, 'r, W: Write> {
    interpreter: &'i mut Interpreter<W>,
    reporter: &'r Reporter,
    scopes: Vec<HashMap<String, Variable>>,
    current_function: FunctionType,
    current_class: ClassType,
    current_loop: LoopType,
}

impl<'i, 'r, W: Write> Resolver<'i, 'r, W> {
    pub fn new(interpreter: &'i mut Interpreter<W>, reporter: &'r Reporter) -> Self {
        Resolver {
            interpreter,
            reporter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            current_loop: LoopType::None,
        }
    }

    /// Walk all top-level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Class {
                name,
                superclass,
                methods,
                class_methods,
            } => self.resolve_class(name, superclass.as_ref(), methods, class_methods),

            Stmt::Block(statements) => {
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s);
                }

                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // Declared first so the initializer cannot read the name.
                self.declare(name);

                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                self.define(name);
            }

            Stmt::Function { name, function } => {
                // Declared and defined up front to allow recursion.
                self.declare(name);
                self.define(name);

                self.resolve_function(function, FunctionType::Function);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }

            Stmt::While {
                condition,
                body,
                for_increment,
            } => {
                self.resolve_expr(condition);

                let enclosing_loop: LoopType = self.current_loop;
                self.current_loop = LoopType::Loop;

                self.resolve_stmt(body);

                if let Some(increment) = for_increment {
                    self.resolve_expr(increment);
                }

                self.current_loop = enclosing_loop;
            }

            Stmt::Break(keyword) => {
                if self.current_loop != LoopType::Loop {
                    self.error(keyword, "Can't use 'break' outside a loop.");
                }
            }

            Stmt::Continue(keyword) => {
                if self.current_loop != LoopType::Loop {
                    self.error(keyword, "Can't use 'continue' outside a loop.");
                }
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer");
                    }

                    self.resolve_expr(expr);
                }
            }

            Stmt::InitSuper { keyword, call } => {
                // The inner Expr::Super reports class-placement errors.
                if self.current_function != FunctionType::Initializer {
                    self.error(
                        keyword,
                        "Can't call 'super' constructor outside of an initializer.",
                    );
                }

                self.resolve_expr(call);
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Stmt],
        class_methods: &[Stmt],
    ) {
        // 1. Declare and define the class name so methods can refer to it.
        self.declare(name);
        self.define(name);

        // 2. Enter the class context.
        let enclosing_class: ClassType = self.current_class;
        self.current_class = if superclass.is_some() {
            ClassType::Subclass
        } else {
            ClassType::Class
        };

        // 3. Resolve the superclass reference and open a scope for `super`.
        if let Some(superclass) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = superclass
            {
                if super_name.lexeme == name.lexeme {
                    self.error(super_name, "A class can't inherit from itself.");
                }
            }

            self.resolve_expr(superclass);

            self.begin_scope();
            self.define_synthetic("super", name.line);
        }

        // 4. Open the implicit `this` scope and resolve instance methods.
        self.begin_scope();
        self.define_synthetic("this", name.line);

        for method in methods {
            if let Stmt::Function {
                name: method_name,
                function,
            } = method
            {
                let kind: FunctionType = if method_name.lexeme == "init" {
                    FunctionType::Initializer
                } else {
                    FunctionType::Method
                };

                self.resolve_function(function, kind);
            }
        }

        // 5. Pop the instance scope; each static method gets its own `this`
        //    scope, which the class object itself occupies at runtime.
        self.end_scope();

        for method in class_methods {
            if let Stmt::Function { function, .. } = method {
                self.begin_scope();
                self.define_synthetic("this", name.line);

                self.resolve_function(function, FunctionType::Method);

                self.end_scope();
            }
        }

        // 6. Close the `super` scope.
        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }

            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if let Some(variable) = scope.get(&name.lexeme) {
                        if variable.state == VariableState::Declared {
                            self.error(name, "Can't read local variable in it's own initializer");
                        }
                    }
                }

                self.resolve_local(*id, name, true);
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name, false);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }

            Expr::Get { object, .. } => {
                self.resolve_expr(object);
            }

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class");
                }

                self.resolve_local(*id, keyword, true);
            }

            Expr::Super { id, keyword, .. } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'super' outside of a class.");
                } else if self.current_class != ClassType::Subclass {
                    self.error(keyword, "Can't use 'super' in a class with no superclass.");
                }

                self.resolve_local(*id, keyword, true);
            }

            Expr::Function(function) => {
                self.resolve_function(function, FunctionType::Function);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_function(&mut self, function: &FunctionExpr, kind: FunctionType) {
        let enclosing_function: FunctionType = self.current_function;
        let enclosing_loop: LoopType = self.current_loop;

        self.current_function = kind;
        // A loop does not reach across a function boundary.
        self.current_loop = LoopType::None;

        self.begin_scope();

        if let Some(params) = &function.params {
            for param in params {
                self.declare(param);
                self.define(param);
                // Parameters are part of the signature whether or not the
                // body reads them; exempt them from the unused diagnostic.
                self.mark_read(param);
            }
        }

        for stmt in &function.body {
            self.resolve_stmt(stmt);
        }

        self.end_scope();

        self.current_function = enclosing_function;
        self.current_loop = enclosing_loop;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        let scope: HashMap<String, Variable> = self.scopes.pop().unwrap_or_default();

        for variable in scope.values() {
            if variable.state == VariableState::Defined {
                self.error(
                    &variable.name,
                    &format!("Local variable {} is not used", variable.name.lexeme),
                );
            }
        }
    }

    fn declare(&mut self, name: &Token) {
        let duplicate: bool = match self.scopes.last() {
            Some(scope) => scope.contains_key(&name.lexeme),
            None => return,
        };

        if duplicate {
            self.error(name, "Already a variable with this name in this scope");
        }

        if let Some(scope) = self.scopes.last_mut() {
            let slot: usize = scope.len();

            scope.insert(
                name.lexeme.clone(),
                Variable {
                    name: name.clone(),
                    state: VariableState::Declared,
                    slot,
                },
            );
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(variable) = scope.get_mut(&name.lexeme) {
                variable.state = VariableState::Defined;
            }
        }
    }

    fn mark_read(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(variable) = scope.get_mut(&name.lexeme) {
                variable.state = VariableState::Read;
            }
        }
    }

    /// Install `this`/`super` in the innermost scope; these never trip the
    /// unused diagnostic.
    fn define_synthetic(&mut self, name: &str, line: usize) {
        if let Some(scope) = self.scopes.last_mut() {
            let slot: usize = scope.len();

            scope.insert(
                name.to_string(),
                Variable {
                    name: Token::new(TokenType::IDENTIFIER, name.to_string(), line),
                    state: VariableState::Read,
                    slot,
                },
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at the first enclosing frame that
    /// knows the name, or leave it for the global map at runtime.
    fn resolve_local(&mut self, id: ExprId, name: &Token, is_read: bool) {
        for (depth, scope) in self.scopes.iter_mut().rev().enumerate() {
            if let Some(variable) = scope.get_mut(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);

                self.interpreter.resolve(id, depth, variable.slot);

                if is_read {
                    variable.state = VariableState::Read;
                }

                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }

    fn error(&self, token: &Token, message: &str) {
        let error: LoxError = LoxError::resolve(token, message);
        self.reporter.error(&error);
    }
}
