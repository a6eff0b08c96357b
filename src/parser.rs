//! Recursive-descent parser.
//!
//! Consumes the scanner's token sequence and produces statements.  Parse
//! errors are reported to the shared [`Reporter`] at the point of detection;
//! the parser then resynchronizes at the next statement boundary and keeps
//! going, so the public entry points never fail — they return whatever
//! statements survived.
//!
//! Two entry points: [`Parser::parse`] for files, and [`Parser::parse_repl`]
//! which additionally recognizes a trailing expression without its `;` and
//! hands it back bare so the REPL can echo its value.

use std::rc::Rc;

use log::{debug, info};

use crate::error::{LoxError, Reporter, Result};
use crate::expr::{Expr, ExprId, FunctionExpr, LiteralValue};
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};

/// What `parse_repl` found.
#[derive(Debug)]
pub enum ReplParse {
    Statements(Vec<Stmt>),
    Expression(Expr),
}

/// The flavor of callable being parsed, for error messages and for deciding
/// whether a parameter list may be omitted (getters).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FnKind {
    Function,
    Method,
}

impl FnKind {
    fn as_str(self) -> &'static str {
        match self {
            FnKind::Function => "function",
            FnKind::Method => "method",
        }
    }
}

pub struct Parser<'r> {
    tokens: Vec<Token>,
    current: usize,
    reporter: &'r Reporter,
    allow_expression: bool,
    found_expression: bool,
}

impl<'r> Parser<'r> {
    pub fn new(tokens: Vec<Token>, reporter: &'r Reporter) -> Self {
        Parser {
            tokens,
            current: 0,
            reporter,
            allow_expression: false,
            found_expression: false,
        }
    }

    /// Parse a whole file.
    pub fn parse(&mut self) -> Vec<Stmt> {
        info!("Parsing {} token(s)", self.tokens.len());

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        statements
    }

    /// Parse a REPL line.
    ///
    /// If the final statement would have been an expression statement missing
    /// its `;`, the bare expression is returned instead so the driver can
    /// print its value.
    pub fn parse_repl(&mut self) -> ReplParse {
        self.allow_expression = true;

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }

            if self.found_expression {
                if let Some(Stmt::Expression(expr)) = statements.pop() {
                    return ReplParse::Expression(expr);
                }
            }

            self.allow_expression = false;
        }

        ReplParse::Statements(statements)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Declarations and statements
    // ─────────────────────────────────────────────────────────────────────────

    fn declaration(&mut self) -> Option<Stmt> {
        let result: Result<Stmt> = if self.match_tokens(&[TokenType::CLASS]) {
            self.class_declaration()
        } else if self.check(&TokenType::FUN) && self.check_next(&TokenType::IDENTIFIER) {
            // `fun` not followed by a name is a lambda expression, handled in
            // primary().
            self.advance();
            self.function(FnKind::Function)
        } else if self.match_tokens(&[TokenType::VAR]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),

            Err(_) => {
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name: Token = self.consume(&TokenType::IDENTIFIER, "Expect class name.")?;

        let superclass: Option<Expr> = if self.match_tokens(&[TokenType::LESS]) {
            self.consume(&TokenType::IDENTIFIER, "Expect superclass name.")?;
            Some(Expr::Variable {
                id: ExprId::fresh(),
                name: self.previous().clone(),
            })
        } else {
            None
        };

        self.consume(&TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods: Vec<Stmt> = Vec::new();
        let mut class_methods: Vec<Stmt> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if self.match_tokens(&[TokenType::STATIC]) {
                class_methods.push(self.function(FnKind::Method)?);
            } else {
                methods.push(self.function(FnKind::Method)?);
            }
        }

        self.consume(&TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
            class_methods,
        })
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name: Token = self.consume(&TokenType::IDENTIFIER, "Expect variable name.")?;

        let initializer: Option<Expr> = if self.match_tokens(&[TokenType::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            &TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> Result<Stmt> {
        if self.match_tokens(&[TokenType::BREAK]) {
            return self.break_statement();
        }
        if self.match_tokens(&[TokenType::CONTINUE]) {
            return self.continue_statement();
        }
        if self.match_tokens(&[TokenType::FOR]) {
            return self.for_statement();
        }
        if self.match_tokens(&[TokenType::IF]) {
            return self.if_statement();
        }
        if self.match_tokens(&[TokenType::PRINT]) {
            return self.print_statement();
        }
        if self.match_tokens(&[TokenType::RETURN]) {
            return self.return_statement();
        }
        if self.check(&TokenType::SUPER) && self.check_next(&TokenType::LEFT_PAREN) {
            // A bare `super(...)` call in statement position routes to the
            // superclass initializer.
            self.advance();
            return self.super_statement();
        }
        if self.match_tokens(&[TokenType::WHILE]) {
            return self.while_statement();
        }
        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            return Ok(Stmt::Block(self.block()?));
        }

        self.expression_statement()
    }

    fn break_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();
        self.consume(&TokenType::SEMICOLON, "Expect ';' after break.")?;
        Ok(Stmt::Break(keyword))
    }

    fn continue_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();
        self.consume(&TokenType::SEMICOLON, "Expect ';' after continue.")?;
        Ok(Stmt::Continue(keyword))
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume(&TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer: Option<Stmt> = if self.match_tokens(&[TokenType::SEMICOLON]) {
            None
        } else if self.match_tokens(&[TokenType::VAR]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Option<Expr> = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(&TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment: Option<Expr> = if self.check(&TokenType::RIGHT_PAREN) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let body: Stmt = self.statement()?;

        // The increment lives only in `for_increment`, so it runs exactly once
        // per iteration, including after `continue`.
        let condition: Expr = condition.unwrap_or(Expr::Literal(LiteralValue::True));
        let mut desugared: Stmt = Stmt::While {
            condition,
            body: Box::new(body),
            for_increment: increment,
        };

        if let Some(init) = initializer {
            desugared = Stmt::Block(vec![init, desugared]);
        }

        Ok(desugared)
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(&TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition: Expr = self.expression()?;
        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch: Stmt = self.statement()?;
        let else_branch: Option<Box<Stmt>> = if self.match_tokens(&[TokenType::ELSE]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let expr: Expr = self.expression()?;
        self.consume(&TokenType::SEMICOLON, "Expect ';' after value.")?;
        Ok(Stmt::Print(expr))
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();

        let value: Option<Expr> = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(&TokenType::SEMICOLON, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(&TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition: Expr = self.expression()?;
        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after condition.")?;

        let body: Stmt = self.statement()?;

        Ok(Stmt::While {
            condition,
            body: Box::new(body),
            for_increment: None,
        })
    }

    fn super_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();

        self.consume(&TokenType::LEFT_PAREN, "Expect '(' for super call.")?;

        let callee: Expr = Expr::Super {
            id: ExprId::fresh(),
            keyword: keyword.clone(),
            method: Token::new(TokenType::IDENTIFIER, "init".to_string(), keyword.line),
        };
        let call: Expr = self.finish_call(callee)?;

        self.consume(
            &TokenType::SEMICOLON,
            "Expected ';' after constructor 'super' call.",
        )?;

        Ok(Stmt::InitSuper { keyword, call })
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr: Expr = self.expression()?;

        if self.allow_expression && self.is_at_end() {
            self.found_expression = true;
        } else {
            self.consume(&TokenType::SEMICOLON, "Expect ';' after value.")?;
        }

        Ok(Stmt::Expression(expr))
    }

    fn function(&mut self, kind: FnKind) -> Result<Stmt> {
        let name: Token = self.consume(
            &TokenType::IDENTIFIER,
            format!("Expect {} name.", kind.as_str()),
        )?;

        let function: Rc<FunctionExpr> = self.function_body(kind)?;

        Ok(Stmt::Function { name, function })
    }

    fn function_body(&mut self, kind: FnKind) -> Result<Rc<FunctionExpr>> {
        // A method without a parameter list is a getter.
        let mut params: Option<Vec<Token>> = None;

        if kind != FnKind::Method || self.check(&TokenType::LEFT_PAREN) {
            self.consume(
                &TokenType::LEFT_PAREN,
                format!("Expect '(' after {} name.", kind.as_str()),
            )?;

            let mut parameters: Vec<Token> = Vec::new();
            if !self.check(&TokenType::RIGHT_PAREN) {
                loop {
                    if parameters.len() >= 255 {
                        let token = self.peek().clone();
                        let _ = self.error(&token, "Can't have more than 255 parameters.");
                    }

                    parameters
                        .push(self.consume(&TokenType::IDENTIFIER, "Expect parameter name.")?);

                    if !self.match_tokens(&[TokenType::COMMA]) {
                        break;
                    }
                }
            }
            self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;

            params = Some(parameters);
        }

        let body: Vec<Stmt> = if self.match_tokens(&[TokenType::ARROW]) {
            let arrow: Token = self.previous().clone();
            let expr: Expr = self.expression()?;

            if kind == FnKind::Method {
                self.consume(&TokenType::SEMICOLON, "Expect ';' after lambda getter.")?;
            }

            vec![Stmt::Return {
                keyword: arrow,
                value: Some(expr),
            }]
        } else {
            self.consume(
                &TokenType::LEFT_BRACE,
                format!("Expect '{{' before {} body.", kind.as_str()),
            )?;
            self.block()?
        };

        Ok(Rc::new(FunctionExpr { params, body }))
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(&TokenType::RIGHT_BRACE, "Expect '}' after block.")?;

        Ok(statements)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions, lowest precedence first
    // ─────────────────────────────────────────────────────────────────────────

    fn expression(&mut self) -> Result<Expr> {
        self.comma()
    }

    fn comma(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.conditional()?;

        while self.match_tokens(&[TokenType::COMMA]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.conditional()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn conditional(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.assignment()?;

        if self.match_tokens(&[TokenType::QUESTION]) {
            let then_branch: Expr = self.expression()?;
            self.consume(
                &TokenType::COLON,
                "Expect ':' after then branch of conditional expression.",
            )?;
            let else_branch: Expr = self.conditional()?;

            expr = Expr::Conditional {
                condition: Box::new(expr),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            };
        }

        Ok(expr)
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr: Expr = self.or()?;

        if self.match_tokens(&[TokenType::EQUAL]) {
            let equals: Token = self.previous().clone();
            let value: Expr = self.assignment()?;

            match expr {
                Expr::Variable { name, .. } => {
                    return Ok(Expr::Assign {
                        id: ExprId::fresh(),
                        name,
                        value: Box::new(value),
                    });
                }

                Expr::Get { object, name } => {
                    return Ok(Expr::Set {
                        object,
                        name,
                        value: Box::new(value),
                    });
                }

                _ => {
                    // Report but keep parsing; assignment targets don't nest.
                    let _ = self.error(&equals, "Invalid assignment target.");
                    return Ok(expr);
                }
            }
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.and()?;

        while self.match_tokens(&[TokenType::OR]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.equality()?;

        while self.match_tokens(&[TokenType::AND]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.comparison()?;

        while self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.term()?;

        while self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.factor()?;

        while self.match_tokens(&[TokenType::MINUS, TokenType::PLUS]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.unary()?;

        while self.match_tokens(&[TokenType::SLASH, TokenType::STAR, TokenType::PERCENT]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.unary()?;

            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.primary()?;

        loop {
            if self.match_tokens(&[TokenType::LEFT_PAREN]) {
                expr = self.finish_call(expr)?;
            } else if self.match_tokens(&[TokenType::DOT]) {
                let name: Token =
                    self.consume(&TokenType::IDENTIFIER, "Expect property name after '.'.")?;
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= 255 {
                    let token = self.peek().clone();
                    let _ = self.error(&token, "Can't have more than 255 arguments.");
                }

                // Arguments parse above the comma operator.
                arguments.push(self.conditional()?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        let paren: Token = self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::FALSE]) {
            return Ok(Expr::Literal(LiteralValue::False));
        }
        if self.match_tokens(&[TokenType::TRUE]) {
            return Ok(Expr::Literal(LiteralValue::True));
        }
        if self.match_tokens(&[TokenType::NIL]) {
            return Ok(Expr::Literal(LiteralValue::Nil));
        }
        if self.match_tokens(&[TokenType::FUN]) {
            return Ok(Expr::Function(self.function_body(FnKind::Function)?));
        }

        if self.match_tokens(&[TokenType::NUMBER(0.0), TokenType::STRING(String::new())]) {
            let literal: Expr = match &self.previous().token_type {
                TokenType::NUMBER(n) => Expr::Literal(LiteralValue::Number(*n)),

                TokenType::STRING(s) => Expr::Literal(LiteralValue::Str(s.clone())),

                _ => unreachable!("literal kinds were just matched"),
            };
            return Ok(literal);
        }

        if self.match_tokens(&[TokenType::SUPER]) {
            let keyword: Token = self.previous().clone();
            self.consume(&TokenType::DOT, "Expect '.' after 'super'.")?;
            let method: Token =
                self.consume(&TokenType::IDENTIFIER, "Expect superclass method name.")?;

            return Ok(Expr::Super {
                id: ExprId::fresh(),
                keyword,
                method,
            });
        }

        if self.match_tokens(&[TokenType::THIS]) {
            return Ok(Expr::This {
                id: ExprId::fresh(),
                keyword: self.previous().clone(),
            });
        }

        if self.match_tokens(&[TokenType::IDENTIFIER]) {
            return Ok(Expr::Variable {
                id: ExprId::fresh(),
                name: self.previous().clone(),
            });
        }

        if self.match_tokens(&[TokenType::LEFT_PAREN]) {
            let expr: Expr = self.expression()?;
            self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }

        // Error productions: a binary operator with no left-hand operand.
        // Report, discard the rest of the would-be production, and bail.
        if self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let err = self.error(&self.previous().clone(), "Missing left-hand operand.");
            let _ = self.equality();
            return Err(err);
        }

        if self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let err = self.error(&self.previous().clone(), "Missing left-hand operand.");
            let _ = self.comparison();
            return Err(err);
        }

        if self.match_tokens(&[TokenType::PLUS]) {
            let err = self.error(&self.previous().clone(), "Missing left-hand operand.");
            let _ = self.term();
            return Err(err);
        }

        if self.match_tokens(&[TokenType::SLASH, TokenType::STAR, TokenType::PERCENT]) {
            let err = self.error(&self.previous().clone(), "Missing left-hand operand.");
            let _ = self.factor();
            return Err(err);
        }

        let token = self.peek().clone();
        Err(self.error(&token, "Expect expression."))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Token-stream helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }

        false
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        &self.peek().token_type == token_type
    }

    fn check_next(&self, token_type: &TokenType) -> bool {
        match self.tokens.get(self.current + 1) {
            Some(token) if token.token_type != TokenType::EOF => &token.token_type == token_type,

            _ => false,
        }
    }

    fn consume<S: Into<String>>(&mut self, token_type: &TokenType, message: S) -> Result<Token> {
        if self.check(token_type) {
            self.advance();
            return Ok(self.previous().clone());
        }

        let token = self.peek().clone();
        Err(self.error(&token, message))
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    /// Report a parse error to the sink and hand it back for propagation.
    fn error<S: Into<String>>(&self, token: &Token, message: S) -> LoxError {
        let error: LoxError = LoxError::parse(token, message);
        self.reporter.error(&error);
        error
    }

    fn synchronize(&mut self) {
        debug!("Synchronizing at line {}", self.peek().line);

        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => return,

                _ => {}
            }

            self.advance();
        }
    }
}
