//! Jac parser: converts a token stream into the generic [`AstNode`] tree
//! consumed by the evaluator.

mod parse_decl;
mod parse_expr;
mod parse_graph;
mod parse_stmt;
mod parser;

pub use parser::{ParseResult, Parser};

use jac_lexer::Lexer;
use jac_types::{AstNode, Diagnostics, SourceFile};

/// Lex and parse a whole source file.
///
/// Returns the `start` tree, or every lexer and parser error collected.
pub fn parse_source(source_file: &SourceFile) -> Result<AstNode, Diagnostics> {
    let lexed = Lexer::new(source_file).lex();
    let mut errors = lexed.errors;
    let parsed = Parser::new(lexed.tokens, source_file).parse();
    errors.extend(parsed.errors);
    match parsed.program {
        Some(program) if !errors.has_errors() => Ok(program),
        _ => Err(errors),
    }
}
