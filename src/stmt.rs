use std::rc::Rc;

use crate::expr::{Expr, FunctionExpr};
use crate::token::Token;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression(Expr),

    Print(Expr),

    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    // A `while` produced by desugaring `for` carries the increment in
    // `for_increment`; a source-level `while` has `None` there.
    While {
        condition: Expr,
        body: Box<Stmt>,
        for_increment: Option<Expr>,
    },

    Break(Token),

    Continue(Token),

    Return {
        keyword: Token,
        value: Option<Expr>,
    },

    Function {
        name: Token,
        function: Rc<FunctionExpr>,
    },

    // `superclass` is always an `Expr::Variable`; `methods` and
    // `class_methods` hold `Stmt::Function` entries.
    Class {
        name: Token,
        superclass: Option<Expr>,
        methods: Vec<Stmt>,
        class_methods: Vec<Stmt>,
    },

    // A bare `super(...);` inside a subclass initializer.  `call` is the
    // `Expr::Call` whose callee is the synthesized `Expr::Super`.
    InitSuper {
        keyword: Token,
        call: Expr,
    },
}
