//! Token types for the Jac lexer.
//!
//! Defines [`TokenKind`] covering every lexeme of the Jac surface language
//! and [`Token`], which pairs a kind with a source [`Span`].

use jac_types::Span;
use std::fmt;

/// Reserved words. These never lex as [`TokenKind::Identifier`].
pub const ALL_KEYWORDS: &[&str] = &[
    // Declarations
    "node", "edge", "graph", "walker", "global", "has", "can", "anchor", "with", "entry",
    "exit", "activity", "spawn",
    // Walker actions
    "take", "ignore", "disengage", "yield", "report", "destroy",
    // Control flow
    "if", "elif", "else", "for", "in", "to", "by", "while", "try", "assert", "break",
    "continue", "skip",
    // Operators and literals
    "and", "or", "not", "true", "false", "null",
    // Type tags
    "str", "int", "float", "list", "dict", "bool", "type",
];

// ─────────────────────────────────────────────────────────────────────
// Token
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

// ─────────────────────────────────────────────────────────────────────
// TokenKind
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ── Literals ──────────────────────────────────────────────

    /// Integer literal, source text kept: `42`
    IntLit(String),
    /// Float literal, source text kept: `3.14`, `1e3`
    FloatLit(String),
    /// String literal with escapes resolved: `"hello"`
    StringLit(String),
    True,
    False,
    Null,

    /// User-defined name: `person`, `my_var`
    Identifier(String),

    // ── Declaration keywords ─────────────────────────────────
    Node,
    Edge,
    Graph,
    Walker,
    Global,
    Has,
    Can,
    Anchor,
    With,
    Entry,
    Exit,
    Activity,
    Spawn,

    // ── Walker actions ───────────────────────────────────────
    Take,
    Ignore,
    Disengage,
    Yield,
    Report,
    Destroy,

    // ── Control flow ─────────────────────────────────────────
    If,
    Elif,
    Else,
    For,
    In,
    To,
    By,
    While,
    Try,
    Assert,
    Break,
    Continue,
    Skip,

    // ── Logical ──────────────────────────────────────────────
    And,
    Or,
    Not,

    // ── Type tags ────────────────────────────────────────────
    TypStr,
    TypInt,
    TypFloat,
    TypList,
    TypDict,
    TypBool,
    TypType,

    // ── Arithmetic & comparison ──────────────────────────────
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,
    EqEq,
    BangEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,

    // ── Assignment ───────────────────────────────────────────
    Eq,
    /// `:=` structural copy
    CopyEq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,

    // ── Graph operators ──────────────────────────────────────

    /// `-->`
    EdgeTo,
    /// `<--`
    EdgeFrom,
    /// `<-->`
    EdgeAny,
    /// `->` closing a named edge reference `-[name]->`
    ArrowR,
    /// `<-` opening a named edge reference `<-[name]-`
    ArrowL,
    /// `++>`
    ConnectTo,
    /// `<++`
    ConnectFrom,
    /// `<++>`
    ConnectAny,
    /// `+>` closing a named connect `+[name]+>`
    PlusArrowR,
    /// `<+` opening a named connect `<+[name]+`
    PlusArrowL,
    /// `!` (detach / negated edge reference)
    Bang,
    /// `&` (reference)
    Amp,

    // ── Punctuation ──────────────────────────────────────────
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,
    /// `::`
    DblColon,
    /// `::>`
    ColonOut,
    Dot,

    Eof,
}

impl TokenKind {
    pub fn from_keyword(s: &str) -> Option<TokenKind> {
        Some(match s {
            "node" => TokenKind::Node,
            "edge" => TokenKind::Edge,
            "graph" => TokenKind::Graph,
            "walker" => TokenKind::Walker,
            "global" => TokenKind::Global,
            "has" => TokenKind::Has,
            "can" => TokenKind::Can,
            "anchor" => TokenKind::Anchor,
            "with" => TokenKind::With,
            "entry" => TokenKind::Entry,
            "exit" => TokenKind::Exit,
            "activity" => TokenKind::Activity,
            "spawn" => TokenKind::Spawn,
            "take" => TokenKind::Take,
            "ignore" => TokenKind::Ignore,
            "disengage" => TokenKind::Disengage,
            "yield" => TokenKind::Yield,
            "report" => TokenKind::Report,
            "destroy" => TokenKind::Destroy,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "to" => TokenKind::To,
            "by" => TokenKind::By,
            "while" => TokenKind::While,
            "try" => TokenKind::Try,
            "assert" => TokenKind::Assert,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "skip" => TokenKind::Skip,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "str" => TokenKind::TypStr,
            "int" => TokenKind::TypInt,
            "float" => TokenKind::TypFloat,
            "list" => TokenKind::TypList,
            "dict" => TokenKind::TypDict,
            "bool" => TokenKind::TypBool,
            "type" => TokenKind::TypType,
            _ => return None,
        })
    }

    pub fn is_keyword(&self) -> bool {
        TokenKind::from_keyword(&self.to_string()).as_ref() == Some(self)
    }

    /// Type-tag keywords usable as cast targets and `any_type` atoms.
    pub fn is_type_tag(&self) -> bool {
        matches!(
            self,
            TokenKind::TypStr
                | TokenKind::TypInt
                | TokenKind::TypFloat
                | TokenKind::TypList
                | TokenKind::TypDict
                | TokenKind::TypBool
                | TokenKind::TypType
                | TokenKind::Node
                | TokenKind::Edge
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::IntLit(s) | TokenKind::FloatLit(s) | TokenKind::Identifier(s) => {
                return f.write_str(s)
            }
            TokenKind::StringLit(s) => return write!(f, "{s:?}"),
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::Node => "node",
            TokenKind::Edge => "edge",
            TokenKind::Graph => "graph",
            TokenKind::Walker => "walker",
            TokenKind::Global => "global",
            TokenKind::Has => "has",
            TokenKind::Can => "can",
            TokenKind::Anchor => "anchor",
            TokenKind::With => "with",
            TokenKind::Entry => "entry",
            TokenKind::Exit => "exit",
            TokenKind::Activity => "activity",
            TokenKind::Spawn => "spawn",
            TokenKind::Take => "take",
            TokenKind::Ignore => "ignore",
            TokenKind::Disengage => "disengage",
            TokenKind::Yield => "yield",
            TokenKind::Report => "report",
            TokenKind::Destroy => "destroy",
            TokenKind::If => "if",
            TokenKind::Elif => "elif",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::To => "to",
            TokenKind::By => "by",
            TokenKind::While => "while",
            TokenKind::Try => "try",
            TokenKind::Assert => "assert",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Skip => "skip",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::TypStr => "str",
            TokenKind::TypInt => "int",
            TokenKind::TypFloat => "float",
            TokenKind::TypList => "list",
            TokenKind::TypDict => "dict",
            TokenKind::TypBool => "bool",
            TokenKind::TypType => "type",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::StarStar => "**",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::LessEq => "<=",
            TokenKind::GreaterEq => ">=",
            TokenKind::Eq => "=",
            TokenKind::CopyEq => ":=",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::EdgeTo => "-->",
            TokenKind::EdgeFrom => "<--",
            TokenKind::EdgeAny => "<-->",
            TokenKind::ArrowR => "->",
            TokenKind::ArrowL => "<-",
            TokenKind::ConnectTo => "++>",
            TokenKind::ConnectFrom => "<++",
            TokenKind::ConnectAny => "<++>",
            TokenKind::PlusArrowR => "+>",
            TokenKind::PlusArrowL => "<+",
            TokenKind::Bang => "!",
            TokenKind::Amp => "&",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semi => ";",
            TokenKind::Colon => ":",
            TokenKind::DblColon => "::",
            TokenKind::ColonOut => "::>",
            TokenKind::Dot => ".",
            TokenKind::Eof => "end of file",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_keyword_round_trips() {
        for kw in ALL_KEYWORDS {
            let kind = TokenKind::from_keyword(kw).unwrap_or_else(|| panic!("missing {kw}"));
            assert_eq!(kind.to_string(), *kw);
            assert!(kind.is_keyword(), "{kw} should be a keyword");
        }
    }

    #[test]
    fn test_names_are_not_keywords() {
        assert_eq!(TokenKind::from_keyword("here"), None);
        assert_eq!(TokenKind::from_keyword("visitor"), None);
        assert!(!TokenKind::Identifier("node".into()).is_keyword());
        assert!(!TokenKind::Semi.is_keyword());
    }

    #[test]
    fn test_type_tags() {
        assert!(TokenKind::TypStr.is_type_tag());
        assert!(TokenKind::Edge.is_type_tag());
        assert!(!TokenKind::Walker.is_type_tag());
    }
}
