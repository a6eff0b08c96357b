//! Centralised error hierarchy and diagnostics sink for the interpreter.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  This enables
//! a uniform `Result<T>` alias throughout the crate and ergonomic
//! inter-operation with `anyhow` at the binary boundary, while still
//! preserving rich diagnostic detail.
//!
//! The [`Reporter`] is the shared sink the front-end phases write to: they
//! report and keep going, the driver consults the accumulated flags between
//! phases to decide whether to continue and which exit code to use.

use std::cell::{Cell, RefCell};
use std::io;

use log::info;
use thiserror::Error;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human-readable description.
        message: String,

        /// 1-based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        location: String,
        line: usize,
    },

    /// Static-analysis or resolution failure (e.g. early-binding errors).
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        location: String,
        line: usize,
    },

    /// Runtime evaluation error.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF-8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            location: locate(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Resolve error: line={}, msg={}",
            token.line, message
        );

        LoxError::Resolve {
            message,
            location: locate(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **runtime**.
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", line, message);

        LoxError::Runtime { message, line }
    }
}

fn locate(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

/// Shared diagnostics sink.
///
/// The scanner, parser and resolver report here and continue, so one run
/// surfaces as many diagnostics as possible.  The driver reads the flags
/// between phases: a set static flag short-circuits the pipeline with exit
/// code 65, a set runtime flag maps to exit code 70.
#[derive(Debug, Default)]
pub struct Reporter {
    had_error: Cell<bool>,
    had_runtime_error: Cell<bool>,
    diagnostics: RefCell<Vec<String>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a static (scan/parse/resolve) error.
    pub fn error(&self, error: &LoxError) {
        self.had_error.set(true);
        self.emit(error.to_string());
    }

    /// Report a runtime error.
    pub fn runtime_error(&self, error: &LoxError) {
        self.had_runtime_error.set(true);
        self.emit(error.to_string());
    }

    fn emit(&self, rendered: String) {
        eprintln!("{}", rendered);
        self.diagnostics.borrow_mut().push(rendered);
    }

    pub fn had_error(&self) -> bool {
        self.had_error.get()
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error.get()
    }

    /// The REPL clears the static flag after each line.
    pub fn reset(&self) {
        self.had_error.set(false);
        self.had_runtime_error.set(false);
    }

    /// Rendered diagnostics in report order.
    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.borrow().clone()
    }
}
