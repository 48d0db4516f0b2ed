//! Shared types for the Jac runtime.
//!
//! This crate defines the generic AST node contract consumed by the
//! evaluator, source spans, and the structured diagnostics produced by
//! the lexer, parser and architype loader.

mod error;
mod span;
pub mod ast;

pub use ast::AstNode;
pub use error::{Diagnostics, ErrorCategory, ErrorCode, JacError, Severity, MAX_ERRORS};
pub use span::{SourceFile, Span};

/// Result type used by the Jac front-end.
pub type Result<T> = std::result::Result<T, JacError>;
