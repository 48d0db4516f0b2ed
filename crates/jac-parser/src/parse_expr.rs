//! Expression parsing with full operator precedence.
//!
//! Precedence (lowest → highest):
//! 8. assignment `=`, `:=`, `+=`, `-=`, `*=`, `/=` (right-assoc)
//! 7. connect `++>`, `<++`, `<++>`, `+[e]+>`, detach `!-->`
//! 6. `and`, `or`
//! 5. `not`, comparisons `== != < > <= >= in not in` (chaining allowed)
//! 4. `+`, `-`
//! 3. `*`, `/`, `%`
//! 2. unary `+`, `-`
//! 1. `**`
//! 0. atoms with trailers: `.name`, `[i]`, `[a:b]`, `(args)`, `::ability`
//!
//! A level with no operator returns its operand unchanged.

use jac_lexer::token::TokenKind;
use jac_types::ast::kind;
use jac_types::{AstNode, ErrorCode};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Entry Point
    // ══════════════════════════════════════════════════════════════════════════

    /// `expression = connect (assignment | copy_assign | inc_assign)?`
    pub(crate) fn parse_expression(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let target = self.parse_connect()?;
        let mut kids = vec![target];
        match self.peek_kind() {
            TokenKind::Eq | TokenKind::CopyEq => {
                let form = if self.check(&TokenKind::Eq) {
                    kind::ASSIGNMENT
                } else {
                    kind::COPY_ASSIGN
                };
                let op_start = self.current_span();
                self.advance();
                let value = self.parse_expression()?;
                kids.push(self.node(form, vec![value], op_start));
            }
            TokenKind::PlusEq | TokenKind::MinusEq | TokenKind::StarEq | TokenKind::SlashEq => {
                let op_start = self.current_span();
                let op = match self.peek_kind() {
                    TokenKind::PlusEq => self.leaf(kind::PEQ),
                    TokenKind::MinusEq => self.leaf(kind::MEQ),
                    TokenKind::StarEq => self.leaf(kind::TEQ),
                    _ => self.leaf(kind::DEQ),
                };
                let value = self.parse_expression()?;
                kids.push(self.node(kind::INC_ASSIGN, vec![op, value], op_start));
            }
            _ => {}
        }
        Some(self.node(kind::EXPRESSION, kids, start))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Precedence Chain
    // ══════════════════════════════════════════════════════════════════════════

    /// `connect = logical ((! edge_ref | connect_op) expression)?`
    fn parse_connect(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let left = self.parse_logical()?;
        if self.check(&TokenKind::Bang) {
            let bang = self.leaf(kind::NOT);
            let edge = self.parse_edge_ref()?;
            let right = self.parse_expression()?;
            return Some(self.node(kind::CONNECT, vec![left, bang, edge, right], start));
        }
        if self.starts_connect_op() {
            let op = self.parse_connect_op()?;
            let right = self.parse_expression()?;
            return Some(self.node(kind::CONNECT, vec![left, op, right], start));
        }
        Some(left)
    }

    /// `logical = compare ((and | or) compare)*`
    pub(crate) fn parse_logical(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let first = self.parse_compare()?;
        let mut kids = vec![first];
        loop {
            let op = match self.peek_kind() {
                TokenKind::And => self.leaf(kind::KW_AND),
                TokenKind::Or => self.leaf(kind::KW_OR),
                _ => break,
            };
            kids.push(op);
            kids.push(self.parse_compare()?);
        }
        Some(self.collapse(kind::LOGICAL, kids, start))
    }

    /// `compare = not compare | arithmetic (cmp_op arithmetic)*`
    fn parse_compare(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        if self.check(&TokenKind::Not) {
            let not = self.leaf(kind::NOT);
            let operand = self.parse_compare()?;
            return Some(self.node(kind::COMPARE, vec![not, operand], start));
        }
        let first = self.parse_arithmetic()?;
        let mut kids = vec![first];
        while let Some(op) = self.parse_cmp_op() {
            kids.push(op);
            kids.push(self.parse_arithmetic()?);
        }
        Some(self.collapse(kind::COMPARE, kids, start))
    }

    /// `cmp_op`, or `None` if the current token isn't one.
    pub(crate) fn parse_cmp_op(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let op = match self.peek_kind() {
            TokenKind::EqEq => self.leaf(kind::EE),
            TokenKind::BangEq => self.leaf(kind::NE),
            TokenKind::Less => self.leaf(kind::LT),
            TokenKind::Greater => self.leaf(kind::GT),
            TokenKind::LessEq => self.leaf(kind::LTE),
            TokenKind::GreaterEq => self.leaf(kind::GTE),
            TokenKind::In => self.leaf(kind::KW_IN),
            TokenKind::Not if matches!(self.look_ahead(1), TokenKind::In) => {
                self.advance();
                self.advance();
                AstNode::leaf(kind::NOT_IN, "not in", start.merge(self.previous_span()))
            }
            _ => return None,
        };
        Some(self.node(kind::CMP_OP, vec![op], start))
    }

    /// `arithmetic = term ((+ | -) term)*`
    fn parse_arithmetic(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let first = self.parse_term()?;
        let mut kids = vec![first];
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus if !self.starts_named_connect() => self.leaf(kind::PLUS),
                TokenKind::Minus if !self.starts_named_edge_ref() => self.leaf(kind::MINUS),
                _ => break,
            };
            kids.push(op);
            kids.push(self.parse_term()?);
        }
        Some(self.collapse(kind::ARITHMETIC, kids, start))
    }

    /// `term = factor ((* | / | %) factor)*`
    fn parse_term(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let first = self.parse_factor()?;
        let mut kids = vec![first];
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => self.leaf(kind::STAR_MUL),
                TokenKind::Slash => self.leaf(kind::DIV),
                TokenKind::Percent => self.leaf(kind::MOD),
                _ => break,
            };
            kids.push(op);
            kids.push(self.parse_factor()?);
        }
        Some(self.collapse(kind::TERM, kids, start))
    }

    /// `factor = (+ | -) factor | power`
    fn parse_factor(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let op = match self.peek_kind() {
            TokenKind::Plus => self.leaf(kind::PLUS),
            TokenKind::Minus if !self.starts_named_edge_ref() => self.leaf(kind::MINUS),
            _ => return self.parse_power(),
        };
        let operand = self.parse_factor()?;
        Some(self.node(kind::FACTOR, vec![op, operand], start))
    }

    /// `power = atom (** factor)*`
    fn parse_power(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let first = self.parse_atom()?;
        let mut kids = vec![first];
        while self.check(&TokenKind::StarStar) {
            kids.push(self.leaf(kind::POW));
            kids.push(self.parse_factor()?);
        }
        Some(self.collapse(kind::POWER, kids, start))
    }

    /// A level node, or its single operand when no operator was seen.
    fn collapse(&self, node_kind: &str, mut kids: Vec<AstNode>, start: jac_types::Span) -> AstNode {
        if kids.len() == 1 {
            return kids.remove(0);
        }
        self.node(node_kind, kids, start)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Atoms & trailers
    // ══════════════════════════════════════════════════════════════════════════

    /// `atom = atom_base atom_trailer*`
    fn parse_atom(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let base = self.parse_atom_base()?;
        let mut kids = vec![base];
        while let Some(trailer) = self.parse_trailer()? {
            kids.push(trailer);
        }
        Some(self.collapse(kind::ATOM, kids, start))
    }

    /// One trailer. `Some(None)` when the next token doesn't start one.
    fn parse_trailer(&mut self) -> Option<Option<AstNode>> {
        let start = self.current_span();
        let inner = match self.peek_kind() {
            TokenKind::Dot => {
                self.advance();
                self.parse_member_or_builtin()?
            }
            TokenKind::LBracket => self.parse_index_slice()?,
            TokenKind::LParen => {
                let call_start = self.current_span();
                self.advance();
                let mut kids = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    kids.push(self.parse_param_items(&[TokenKind::RParen])?);
                }
                self.expect(&TokenKind::RParen)?;
                self.node(kind::ABILITY_CALL, kids, call_start)
            }
            TokenKind::DblColon if matches!(self.look_ahead(1), TokenKind::Identifier(_)) => {
                self.parse_ability_op_call(kind::ABILITY_CALL)?
            }
            _ => return Some(None),
        };
        Some(Some(self.node(kind::ATOM_TRAILER, vec![inner], start)))
    }

    /// `ability_op NAME spawn_ctx?` wrapped in `wrapper_kind`.
    fn parse_ability_op_call(&mut self, wrapper_kind: &str) -> Option<AstNode> {
        let start = self.current_span();
        let op_start = self.current_span();
        self.expect(&TokenKind::DblColon)?;
        let op = self.node(kind::ABILITY_OP, Vec::new(), op_start);
        let mut kids = vec![op, self.expect_name()?];
        if self.check(&TokenKind::LParen) {
            kids.push(self.parse_spawn_ctx()?);
        }
        Some(self.node(wrapper_kind, kids, start))
    }

    /// After `.`: a field name, an object/list/dict built-in, a cast, or a
    /// `str::`/`list::`/`dict::` method call.
    fn parse_member_or_builtin(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let kind_now = self.peek_kind().clone();
        match &kind_now {
            TokenKind::Identifier(name) => {
                let builtin = match name.as_str() {
                    "length" => Some((kind::LIST_BUILT_IN, kind::KW_LENGTH)),
                    "keys" => Some((kind::DICT_BUILT_IN, kind::KW_KEYS)),
                    "context" => Some((kind::OBJ_BUILT_IN, kind::KW_CONTEXT)),
                    "info" => Some((kind::OBJ_BUILT_IN, kind::KW_INFO)),
                    "details" => Some((kind::OBJ_BUILT_IN, kind::KW_DETAILS)),
                    _ => None,
                };
                match builtin {
                    Some((outer, word)) => {
                        let leaf = self.leaf(word);
                        let inner = self.node(outer, vec![leaf], start);
                        Some(self.node(kind::BUILT_IN, vec![inner], start))
                    }
                    None => self.expect_name(),
                }
            }
            TokenKind::TypStr | TokenKind::TypList | TokenKind::TypDict
                if matches!(self.look_ahead(1), TokenKind::DblColon) =>
            {
                let table = match kind_now {
                    TokenKind::TypStr => kind::STRING_BUILT_IN,
                    TokenKind::TypList => kind::LIST_BUILT_IN,
                    _ => kind::DICT_BUILT_IN,
                };
                self.advance();
                self.advance();
                let mut kids = vec![self.expect_name()?];
                if self.eat(&TokenKind::LParen) {
                    if !self.check(&TokenKind::RParen) {
                        kids.push(self.parse_expr_list(&[TokenKind::RParen])?);
                    }
                    self.expect(&TokenKind::RParen)?;
                }
                let inner = self.node(table, kids, start);
                Some(self.node(kind::BUILT_IN, vec![inner], start))
            }
            k if k.is_type_tag() => {
                let ty = self.parse_any_type();
                let cast = self.node(kind::CAST_BUILT_IN, vec![ty], start);
                Some(self.node(kind::BUILT_IN, vec![cast], start))
            }
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected name or built-in after '.', got '{other}'"),
                );
                None
            }
        }
    }

    /// `[ expression ]` or `[ expression? : expression? ]`
    fn parse_index_slice(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::LBracket)?;
        let first = if self.check(&TokenKind::Colon) {
            AstNode::leaf(kind::NULL, "null", self.current_span())
        } else {
            self.parse_expression()?
        };
        let mut kids = vec![first];
        if self.eat(&TokenKind::Colon) {
            if self.check(&TokenKind::RBracket) {
                kids.push(AstNode::leaf(kind::NULL, "null", self.current_span()));
            } else {
                kids.push(self.parse_expression()?);
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Some(self.node(kind::INDEX_SLICE, kids, start))
    }

    /// `any_type` wrapping the current type-tag token.
    pub(crate) fn parse_any_type(&mut self) -> AstNode {
        let start = self.current_span();
        let leaf = match self.peek_kind() {
            TokenKind::TypStr => self.leaf(kind::TYP_STRING),
            TokenKind::TypInt => self.leaf(kind::TYP_INT),
            TokenKind::TypFloat => self.leaf(kind::TYP_FLOAT),
            TokenKind::TypList => self.leaf(kind::TYP_LIST),
            TokenKind::TypDict => self.leaf(kind::TYP_DICT),
            TokenKind::TypBool => self.leaf(kind::TYP_BOOL),
            TokenKind::Node => self.leaf(kind::KW_NODE),
            TokenKind::Edge => self.leaf(kind::KW_EDGE),
            _ => self.leaf(kind::KW_TYPE),
        };
        self.node(kind::ANY_TYPE, vec![leaf], start)
    }

    fn parse_atom_base(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        match self.peek_kind().clone() {
            TokenKind::IntLit(text) => {
                let span = self.advance().span;
                if text.parse::<i64>().is_err() {
                    self.error_at(
                        ErrorCode::INVALID_LITERAL,
                        format!("integer literal '{text}' is out of range"),
                        span,
                    );
                }
                Some(AstNode::leaf(kind::INT, text, span))
            }
            TokenKind::FloatLit(_) => Some(self.leaf(kind::FLOAT)),
            TokenKind::StringLit(first) => {
                self.advance();
                // adjacent literals concatenate
                let mut text = first;
                while let TokenKind::StringLit(next) = self.peek_kind().clone() {
                    self.advance();
                    text.push_str(&next);
                }
                Some(AstNode::leaf(kind::STRING, text, start.merge(self.previous_span())))
            }
            TokenKind::True | TokenKind::False => Some(self.leaf(kind::BOOL)),
            TokenKind::Null => Some(self.leaf(kind::NULL)),
            TokenKind::Identifier(_) => self.expect_name(),
            TokenKind::Global => {
                self.advance();
                self.expect(&TokenKind::Dot)?;
                let inner = match self.peek_kind() {
                    TokenKind::Identifier(n) if matches!(n.as_str(), "context" | "info") => {
                        let obj_start = self.current_span();
                        let word = if n == "context" {
                            kind::KW_CONTEXT
                        } else {
                            kind::KW_INFO
                        };
                        let leaf = self.leaf(word);
                        self.node(kind::OBJ_BUILT_IN, vec![leaf], obj_start)
                    }
                    _ => self.expect_name()?,
                };
                Some(self.node(kind::GLOBAL_REF, vec![inner], start))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Some(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut kids = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    kids.push(self.parse_expr_list(&[TokenKind::RBracket])?);
                }
                self.expect(&TokenKind::RBracket)?;
                Some(self.node(kind::LIST_VAL, kids, start))
            }
            TokenKind::LBrace => self.parse_dict_val(),
            TokenKind::Amp | TokenKind::Star => {
                let form = if self.check(&TokenKind::Amp) {
                    kind::REF
                } else {
                    kind::DEREF
                };
                self.advance();
                let target = self.parse_atom()?;
                Some(self.node(form, vec![target], start))
            }
            TokenKind::Spawn => self.parse_spawn(),
            TokenKind::DblColon => self.parse_ability_op_call(kind::ATOM),
            TokenKind::Node if matches!(self.look_ahead(1), TokenKind::DblColon) => {
                self.parse_node_edge_ref()
            }
            _ if self.starts_edge_ref() => self.parse_node_edge_ref(),
            k if k.is_type_tag() => Some(self.parse_any_type()),
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected expression, got '{other}'"),
                );
                None
            }
        }
    }

    /// `{ (expression : expression),* }`
    fn parse_dict_val(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::LBrace)?;
        let mut pairs = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let pair_start = self.current_span();
            let key = self.parse_expression()?;
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_expression()?;
            pairs.push(self.node(kind::KV_PAIR, vec![key, value], pair_start));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Some(self.node(kind::DICT_VAL, pairs, start))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Argument lists
    // ══════════════════════════════════════════════════════════════════════════

    /// `expression (, expression)*` up to (not including) a terminator.
    pub(crate) fn parse_expr_list(&mut self, terminators: &[TokenKind]) -> Option<AstNode> {
        let start = self.current_span();
        let mut items = Vec::new();
        loop {
            items.push(self.parse_expression()?);
            if !self.eat(&TokenKind::Comma) || terminators.contains(self.peek_kind()) {
                break;
            }
        }
        Some(self.node(kind::EXPR_LIST, items, start))
    }

    /// `param_list = expr_list? kw_expr_list?`; positional arguments must
    /// precede keyword arguments.
    pub(crate) fn parse_param_items(&mut self, terminators: &[TokenKind]) -> Option<AstNode> {
        let start = self.current_span();
        let mut positional = Vec::new();
        let mut keywords = Vec::new();
        let (mut pos_start, mut kw_start) = (None, None);
        loop {
            if terminators.contains(self.peek_kind()) {
                break;
            }
            let is_kw = matches!(self.peek_kind(), TokenKind::Identifier(_))
                && matches!(self.look_ahead(1), TokenKind::Eq);
            if is_kw {
                kw_start.get_or_insert(self.current_span());
                keywords.push(self.expect_name()?);
                self.advance();
                keywords.push(self.parse_connect_value()?);
            } else {
                if !keywords.is_empty() {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        "positional argument follows keyword argument",
                    );
                    return None;
                }
                pos_start.get_or_insert(self.current_span());
                positional.push(self.parse_expression()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let mut kids = Vec::new();
        if let Some(s) = pos_start {
            kids.push(self.node(kind::EXPR_LIST, positional, s));
        }
        if let Some(s) = kw_start {
            kids.push(self.node(kind::KW_EXPR_LIST, keywords, s));
        }
        Some(self.node(kind::PARAM_LIST, kids, start))
    }

    /// A value expression with no assignment tail, wrapped as `expression`.
    pub(crate) fn parse_connect_value(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let value = self.parse_connect()?;
        Some(self.node(kind::EXPRESSION, vec![value], start))
    }
}
