//! Core parser infrastructure: token cursor, error reporting, helpers.

use jac_lexer::token::{Token, TokenKind};
use jac_types::ast::kind;
use jac_types::{AstNode, Diagnostics, ErrorCode, JacError, SourceFile, Span};

/// The Jac parser.
///
/// Consumes the lexer's token stream and builds a `start` [`AstNode`].
/// Errors are collected and parsing resumes at the next statement.
pub struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source_file: &'src SourceFile,
    errors: Diagnostics,
}

/// Result of parsing.
pub struct ParseResult {
    pub program: Option<AstNode>,
    pub errors: Diagnostics,
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Token>, source_file: &'src SourceFile) -> Self {
        let mut tokens = tokens;
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let span = tokens.last().map(|t| t.span).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, span));
        }
        Self {
            tokens,
            pos: 0,
            source_file,
            errors: Diagnostics::empty(),
        }
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    pub(crate) fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn previous_span(&self) -> Span {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(t) => t.span,
            None => Span::point(1, 1),
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Token kind `n` positions ahead of the cursor.
    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    /// Offset just past the `]` matching the `[` at `open` tokens ahead.
    pub(crate) fn matching_bracket(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut n = open;
        loop {
            match self.look_ahead(n) {
                TokenKind::LBracket => depth += 1,
                TokenKind::RBracket => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(n + 1);
                    }
                }
                TokenKind::Eof | TokenKind::Semi | TokenKind::LBrace => return None,
                _ => {}
            }
            n += 1;
        }
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Option<Token> {
        if self.check(expected) {
            Some(self.advance())
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected '{}', got '{}'", expected, self.peek_kind()),
            );
            None
        }
    }

    /// Expect an identifier and return it as a `NAME` leaf.
    pub(crate) fn expect_name(&mut self) -> Option<AstNode> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Some(AstNode::leaf(kind::NAME, name, span))
            }
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected name, got '{}'", self.peek_kind()),
                );
                None
            }
        }
    }

    /// Consume the current token as a leaf of the given kind.
    pub(crate) fn leaf(&mut self, node_kind: &str) -> AstNode {
        let token = self.advance();
        AstNode::leaf(node_kind, token.kind.to_string(), token.span)
    }

    /// Branch node spanning from `start` to the previous token.
    pub(crate) fn node(&self, node_kind: &str, kids: Vec<AstNode>, start: Span) -> AstNode {
        AstNode::branch(node_kind, kids, start.merge(self.previous_span()))
    }

    // ── Error Reporting ───────────────────────────────────────────────────────

    pub(crate) fn error_at_current(&mut self, code: ErrorCode, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(code, message, span);
    }

    pub(crate) fn error_at(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let error = JacError::new(&self.source_file.name, code, message, span, source_line);
        self.errors.push_error(error);
    }

    pub(crate) fn too_many_errors(&self) -> bool {
        self.errors.is_full()
    }

    // ── Synchronization ───────────────────────────────────────────────────────

    /// Skip to the end of the current statement after an error.
    ///
    /// Stops after a `;`, or before a `}` or a token that starts a new
    /// statement.
    pub(crate) fn synchronize(&mut self) {
        let start = self.pos;
        while !self.at_end() {
            match self.peek_kind() {
                TokenKind::Semi => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace => return,
                TokenKind::If
                | TokenKind::For
                | TokenKind::While
                | TokenKind::Try
                | TokenKind::Report
                | TokenKind::Take
                | TokenKind::Has
                | TokenKind::Can
                    if self.pos != start =>
                {
                    return
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip to the next top-level declaration.
    pub(crate) fn synchronize_top(&mut self) {
        self.advance();
        while !self.at_end() {
            if matches!(
                self.peek_kind(),
                TokenKind::Node
                    | TokenKind::Edge
                    | TokenKind::Graph
                    | TokenKind::Walker
                    | TokenKind::Global
            ) && !matches!(self.look_ahead(1), TokenKind::DblColon)
            {
                return;
            }
            self.advance();
        }
    }

    // ── Public API ────────────────────────────────────────────────────────────

    /// Parse the token stream into a `start` tree.
    pub fn parse(mut self) -> ParseResult {
        let program = self.parse_program();
        ParseResult {
            program: Some(program),
            errors: self.errors,
        }
    }
}
