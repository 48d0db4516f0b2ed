//! Core Jac lexer: converts source text to a token stream.
//!
//! Whitespace (including newlines) is insignificant; statements end with
//! `;`. Comments are `// ...`, `# ...` and `/* ... */`. Errors are
//! collected (up to [`jac_types::MAX_ERRORS`]) and scanning continues.

use jac_types::{Diagnostics, ErrorCode, JacError, SourceFile, Span};

use crate::token::{Token, TokenKind};

/// The Jac lexer.
pub struct Lexer<'src> {
    source: &'src [u8],
    source_file: &'src SourceFile,
    pos: usize,
    /// 1-based.
    line: u32,
    /// 1-based.
    col: u32,
    errors: Diagnostics,
}

/// Result of lexing: tokens + any errors collected.
pub struct LexResult {
    /// Always ends with [`TokenKind::Eof`].
    pub tokens: Vec<Token>,
    pub errors: Diagnostics,
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            source_file,
            pos: 0,
            line: 1,
            col: 1,
            errors: Diagnostics::empty(),
        }
    }

    /// Lex the entire source file into a token stream.
    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();
        loop {
            if self.errors.is_full() {
                break;
            }
            let token = self.scan_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, self.current_span()));
        }
        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if ch & 0xC0 != 0x80 {
            // continuation bytes of a UTF-8 sequence don't add a column
            self.col += 1;
        }
        Some(ch)
    }

    /// Consume `expected` if it is next.
    fn eat(&mut self, expected: &[u8]) -> bool {
        if self.source[self.pos..].starts_with(expected) {
            for _ in 0..expected.len() {
                self.advance();
            }
            true
        } else {
            false
        }
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    fn emit_error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let err = JacError::new(&self.source_file.name, code, message, span, source_line);
        self.errors.push_error(err);
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace & comments
    // ─────────────────────────────────────────────────────────────

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(b' ' | b'\t' | b'\r' | b'\n'), _) => {
                    self.advance();
                }
                (Some(b'/'), Some(b'/')) | (Some(b'#'), _) => {
                    while self.peek().is_some_and(|c| c != b'\n') {
                        self.advance();
                    }
                }
                (Some(b'/'), Some(b'*')) => self.skip_block_comment(),
                _ => break,
            }
        }
    }

    fn skip_block_comment(&mut self) {
        let (start_line, start_col) = (self.line, self.col);
        self.advance();
        self.advance();
        loop {
            if self.eat(b"*/") {
                return;
            }
            if self.advance().is_none() {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNCLOSED_DELIMITER,
                    "Unterminated block comment",
                    span,
                );
                return;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Token scanning
    // ─────────────────────────────────────────────────────────────

    fn scan_token(&mut self) -> Token {
        self.skip_trivia();
        let (start_line, start_col) = (self.line, self.col);
        let Some(ch) = self.advance() else {
            return Token::new(TokenKind::Eof, self.current_span());
        };

        let kind = match ch {
            b'"' | b'\'' => return self.scan_string(ch, start_line, start_col),
            b'0'..=b'9' => return self.scan_number(start_line, start_col),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => return self.scan_identifier(start_line, start_col),

            b'-' => {
                if self.eat(b"->") {
                    TokenKind::EdgeTo
                } else if self.eat(b">") {
                    TokenKind::ArrowR
                } else if self.eat(b"=") {
                    TokenKind::MinusEq
                } else {
                    TokenKind::Minus
                }
            }
            b'<' => {
                if self.eat(b"-->") {
                    TokenKind::EdgeAny
                } else if self.eat(b"--") {
                    TokenKind::EdgeFrom
                } else if self.eat(b"-") {
                    TokenKind::ArrowL
                } else if self.eat(b"++>") {
                    TokenKind::ConnectAny
                } else if self.eat(b"++") {
                    TokenKind::ConnectFrom
                } else if self.eat(b"+") {
                    TokenKind::PlusArrowL
                } else if self.eat(b"=") {
                    TokenKind::LessEq
                } else {
                    TokenKind::Less
                }
            }
            b'+' => {
                if self.eat(b"+>") {
                    TokenKind::ConnectTo
                } else if self.eat(b">") {
                    TokenKind::PlusArrowR
                } else if self.eat(b"=") {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            b'*' => {
                if self.eat(b"*") {
                    TokenKind::StarStar
                } else if self.eat(b"=") {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            b'/' => {
                if self.eat(b"=") {
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                }
            }
            b'%' => TokenKind::Percent,
            b'=' => {
                if self.eat(b"=") {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            b'!' => {
                if self.eat(b"=") {
                    TokenKind::BangEq
                } else {
                    TokenKind::Bang
                }
            }
            b'>' => {
                if self.eat(b"=") {
                    TokenKind::GreaterEq
                } else {
                    TokenKind::Greater
                }
            }
            b':' => {
                if self.eat(b":>") {
                    TokenKind::ColonOut
                } else if self.eat(b":") {
                    TokenKind::DblColon
                } else if self.eat(b"=") {
                    TokenKind::CopyEq
                } else {
                    TokenKind::Colon
                }
            }
            b'&' => TokenKind::Amp,
            b'.' => TokenKind::Dot,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semi,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,

            other => {
                // skip the rest of a multi-byte character
                while self.peek().is_some_and(|c| c & 0xC0 == 0x80) {
                    self.advance();
                }
                let span = self.span_from(start_line, start_col);
                let shown = if other.is_ascii() {
                    (other as char).to_string()
                } else {
                    "non-ASCII character".to_string()
                };
                self.emit_error(
                    ErrorCode::INVALID_CHARACTER,
                    format!("Unexpected character '{shown}'"),
                    span,
                );
                return self.scan_token();
            }
        };
        Token::new(kind, self.span_from(start_line, start_col))
    }

    // ─────────────────────────────────────────────────────────────
    // Number literals
    // ─────────────────────────────────────────────────────────────

    fn scan_number(&mut self, start_line: u32, start_col: u32) -> Token {
        let start = self.pos - 1;
        let mut is_float = false;
        while let Some(b'0'..=b'9') = self.peek() {
            self.advance();
        }
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            is_float = true;
            self.advance();
            while let Some(b'0'..=b'9') = self.peek() {
                self.advance();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let digits_at = if matches!(self.peek_at(1), Some(b'+' | b'-')) { 2 } else { 1 };
            if matches!(self.peek_at(digits_at), Some(b'0'..=b'9')) {
                is_float = true;
                for _ in 0..digits_at {
                    self.advance();
                }
                while let Some(b'0'..=b'9') = self.peek() {
                    self.advance();
                }
            }
        }

        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        let kind = if is_float {
            TokenKind::FloatLit(text)
        } else {
            TokenKind::IntLit(text)
        };
        Token::new(kind, self.span_from(start_line, start_col))
    }

    // ─────────────────────────────────────────────────────────────
    // Identifiers & keywords
    // ─────────────────────────────────────────────────────────────

    fn scan_identifier(&mut self, start_line: u32, start_col: u32) -> Token {
        let start = self.pos - 1;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_') {
            self.advance();
        }
        let text = String::from_utf8_lossy(&self.source[start..self.pos]);
        let kind =
            TokenKind::from_keyword(&text).unwrap_or_else(|| TokenKind::Identifier(text.into_owned()));
        Token::new(kind, self.span_from(start_line, start_col))
    }

    // ─────────────────────────────────────────────────────────────
    // String literals
    // ─────────────────────────────────────────────────────────────

    /// Scan a string literal after its opening quote. Adjacent literals
    /// are concatenated by the parser, not here.
    fn scan_string(&mut self, quote: u8, start_line: u32, start_col: u32) -> Token {
        let mut buf: Vec<u8> = Vec::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(
                        ErrorCode::UNCLOSED_DELIMITER,
                        "Unterminated string literal",
                        span,
                    );
                    break;
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    if let Some(escaped) = self.scan_escape_sequence() {
                        let mut tmp = [0u8; 4];
                        buf.extend_from_slice(escaped.encode_utf8(&mut tmp).as_bytes());
                    }
                }
                Some(c) => {
                    self.advance();
                    buf.push(c);
                }
            }
        }
        let text = String::from_utf8_lossy(&buf).into_owned();
        Token::new(TokenKind::StringLit(text), self.span_from(start_line, start_col))
    }

    /// Scan an escape sequence starting at the `\`.
    fn scan_escape_sequence(&mut self) -> Option<char> {
        let (start_line, start_col) = (self.line, self.col);
        self.advance();
        match self.advance() {
            Some(b'"') => Some('"'),
            Some(b'\'') => Some('\''),
            Some(b'\\') => Some('\\'),
            Some(b'n') => Some('\n'),
            Some(b't') => Some('\t'),
            Some(b'r') => Some('\r'),
            Some(b'0') => Some('\0'),
            Some(ch) => {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::INVALID_LITERAL,
                    format!("Invalid escape sequence '\\{}'", ch as char),
                    span,
                );
                Some(ch as char)
            }
            None => {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNCLOSED_DELIMITER,
                    "Unexpected end of file in escape sequence",
                    span,
                );
                None
            }
        }
    }
}
