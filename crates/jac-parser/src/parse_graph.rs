//! Graph syntax: edge references, node references, connect operators,
//! filter/spawn contexts and spawn expressions.
//!
//! Named edge forms need lookahead because `-` and `+` are also
//! arithmetic operators: `-[e]->` is an edge reference only if the
//! bracket group is followed by `->`, and `+[e]+>` is a connect only if
//! it is followed by `+>`.

use jac_lexer::token::TokenKind;
use jac_types::ast::kind;
use jac_types::{AstNode, ErrorCode};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Lookahead
    // ══════════════════════════════════════════════════════════════════════════

    /// `-[ ... ]->`
    pub(crate) fn starts_named_edge_ref(&self) -> bool {
        self.check(&TokenKind::Minus)
            && matches!(self.look_ahead(1), TokenKind::LBracket)
            && self
                .matching_bracket(1)
                .is_some_and(|after| matches!(self.look_ahead(after), TokenKind::ArrowR))
    }

    /// `+[ ... ]+>`
    pub(crate) fn starts_named_connect(&self) -> bool {
        self.check(&TokenKind::Plus)
            && matches!(self.look_ahead(1), TokenKind::LBracket)
            && self
                .matching_bracket(1)
                .is_some_and(|after| matches!(self.look_ahead(after), TokenKind::PlusArrowR))
    }

    pub(crate) fn starts_edge_ref(&self) -> bool {
        match self.peek_kind() {
            TokenKind::EdgeTo | TokenKind::EdgeFrom | TokenKind::EdgeAny => true,
            TokenKind::ArrowL => matches!(self.look_ahead(1), TokenKind::LBracket),
            _ => self.starts_named_edge_ref(),
        }
    }

    pub(crate) fn starts_connect_op(&self) -> bool {
        match self.peek_kind() {
            TokenKind::ConnectTo | TokenKind::ConnectFrom | TokenKind::ConnectAny => true,
            TokenKind::PlusArrowL => matches!(self.look_ahead(1), TokenKind::LBracket),
            _ => self.starts_named_connect(),
        }
    }

    fn starts_node_ref(&self) -> bool {
        self.check(&TokenKind::Node) && matches!(self.look_ahead(1), TokenKind::DblColon)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // References
    // ══════════════════════════════════════════════════════════════════════════

    /// `node_ref filter_ctx? node_edge_ref?` or `edge_ref node_edge_ref?`
    pub(crate) fn parse_node_edge_ref(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let mut kids = Vec::new();
        if self.starts_node_ref() {
            kids.push(self.parse_typed_ref(kind::NODE_REF)?);
            if self.check(&TokenKind::LParen) {
                kids.push(self.parse_filter_ctx()?);
            }
        } else {
            kids.push(self.parse_edge_ref()?);
        }
        if self.starts_node_ref() || self.starts_edge_ref() {
            kids.push(self.parse_node_edge_ref()?);
        }
        Some(self.node(kind::NODE_EDGE_REF, kids, start))
    }

    /// `(node | walker | graph) :: NAME`
    fn parse_typed_ref(&mut self, ref_kind: &str) -> Option<AstNode> {
        let start = self.current_span();
        self.advance();
        self.expect(&TokenKind::DblColon)?;
        let name = self.expect_name()?;
        Some(self.node(ref_kind, vec![name], start))
    }

    /// `-->`, `<--`, `<-->`, `-[NAME filter?]->`, `<-[NAME filter?]-`,
    /// `<-[NAME filter?]->`
    pub(crate) fn parse_edge_ref(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let inner = match self.peek_kind() {
            TokenKind::EdgeTo | TokenKind::EdgeFrom | TokenKind::EdgeAny => {
                let direction = match self.advance().kind {
                    TokenKind::EdgeTo => kind::EDGE_TO,
                    TokenKind::EdgeFrom => kind::EDGE_FROM,
                    _ => kind::EDGE_ANY,
                };
                self.node(direction, Vec::new(), start)
            }
            TokenKind::Minus | TokenKind::ArrowL => {
                let from_side = self.advance().kind == TokenKind::ArrowL;
                self.expect(&TokenKind::LBracket)?;
                let mut kids = vec![self.expect_name()?];
                if self.check(&TokenKind::LParen) {
                    kids.push(self.parse_filter_ctx()?);
                }
                self.expect(&TokenKind::RBracket)?;
                let direction = match (from_side, self.peek_kind()) {
                    (false, TokenKind::ArrowR) => kind::EDGE_TO,
                    (true, TokenKind::Minus) => kind::EDGE_FROM,
                    (true, TokenKind::ArrowR) => kind::EDGE_ANY,
                    (_, other) => {
                        let msg = format!("expected end of edge reference, got '{other}'");
                        self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, msg);
                        return None;
                    }
                };
                self.advance();
                self.node(direction, kids, start)
            }
            other => {
                let msg = format!("expected edge reference, got '{other}'");
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, msg);
                return None;
            }
        };
        Some(self.node(kind::EDGE_REF, vec![inner], start))
    }

    /// `++>`, `<++`, `<++>`, `+[NAME spawn_ctx?]+>`, `<+[..]+`, `<+[..]+>`
    pub(crate) fn parse_connect_op(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let inner = match self.peek_kind() {
            TokenKind::ConnectTo | TokenKind::ConnectFrom | TokenKind::ConnectAny => {
                let direction = match self.advance().kind {
                    TokenKind::ConnectTo => kind::CONNECT_TO,
                    TokenKind::ConnectFrom => kind::CONNECT_FROM,
                    _ => kind::CONNECT_ANY,
                };
                self.node(direction, Vec::new(), start)
            }
            TokenKind::Plus | TokenKind::PlusArrowL => {
                let from_side = self.advance().kind == TokenKind::PlusArrowL;
                self.expect(&TokenKind::LBracket)?;
                let mut kids = vec![self.expect_name()?];
                if self.check(&TokenKind::LParen) {
                    kids.push(self.parse_spawn_ctx()?);
                }
                self.expect(&TokenKind::RBracket)?;
                let direction = match (from_side, self.peek_kind()) {
                    (false, TokenKind::PlusArrowR) => kind::CONNECT_TO,
                    (true, TokenKind::Plus) => kind::CONNECT_FROM,
                    (true, TokenKind::PlusArrowR) => kind::CONNECT_ANY,
                    (_, other) => {
                        let msg = format!("expected end of connect operator, got '{other}'");
                        self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, msg);
                        return None;
                    }
                };
                self.advance();
                self.node(direction, kids, start)
            }
            other => {
                let msg = format!("expected connect operator, got '{other}'");
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, msg);
                return None;
            }
        };
        Some(self.node(kind::CONNECT_OP, vec![inner], start))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Contexts
    // ══════════════════════════════════════════════════════════════════════════

    /// `( NAME cmp_op expression (, ...)* )`
    fn parse_filter_ctx(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::LParen)?;
        let mut compares = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let cmp_start = self.current_span();
            let name = self.expect_name()?;
            let Some(op) = self.parse_cmp_op() else {
                let msg = format!("expected comparison operator, got '{}'", self.peek_kind());
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, msg);
                return None;
            };
            let value = self.parse_connect_value()?;
            compares.push(self.node(kind::FILTER_COMPARE, vec![name, op, value], cmp_start));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Some(self.node(kind::FILTER_CTX, compares, start))
    }

    /// `( NAME = expression (, ...)* )`
    pub(crate) fn parse_spawn_ctx(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::LParen)?;
        let mut assigns = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let assign_start = self.current_span();
            let name = self.expect_name()?;
            self.expect(&TokenKind::Eq)?;
            let value = self.parse_connect_value()?;
            assigns.push(self.node(kind::SPAWN_ASSIGN, vec![name, value], assign_start));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Some(self.node(kind::SPAWN_CTX, assigns, start))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Spawn
    // ══════════════════════════════════════════════════════════════════════════

    /// `spawn (node_spawn | walker_spawn | graph_spawn)`
    pub(crate) fn parse_spawn(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::Spawn)?;
        let object_start = self.current_span();

        let mut spawn_edge = None;
        if !self.starts_node_ref() && !self.starts_graph_ref() {
            let loc_start = self.current_span();
            let location = self.parse_logical()?;
            let location = self.node(kind::EXPRESSION, vec![location], loc_start);
            if self.check(&TokenKind::Walker) {
                let walker = self.parse_typed_ref(kind::WALKER_REF)?;
                let mut kids = vec![location, walker];
                if self.check(&TokenKind::LParen) {
                    kids.push(self.parse_spawn_ctx()?);
                }
                let object = self.node(kind::WALKER_SPAWN, kids, object_start);
                return Some(self.node(kind::SPAWN, vec![object], start));
            }
            let op = self.parse_connect_op()?;
            spawn_edge = Some(self.node(kind::SPAWN_EDGE, vec![location, op], loc_start));
        }

        let mut kids: Vec<AstNode> = spawn_edge.into_iter().collect();
        let object = if self.starts_graph_ref() {
            kids.push(self.parse_typed_ref(kind::GRAPH_REF)?);
            self.node(kind::GRAPH_SPAWN, kids, object_start)
        } else if self.starts_node_ref() {
            kids.push(self.parse_typed_ref(kind::NODE_REF)?);
            if self.check(&TokenKind::LParen) {
                kids.push(self.parse_spawn_ctx()?);
            }
            self.node(kind::NODE_SPAWN, kids, object_start)
        } else {
            let msg = format!("expected 'node::', 'graph::' or 'walker::', got '{}'", self.peek_kind());
            self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, msg);
            return None;
        };
        Some(self.node(kind::SPAWN, vec![object], start))
    }

    fn starts_graph_ref(&self) -> bool {
        self.check(&TokenKind::Graph) && matches!(self.look_ahead(1), TokenKind::DblColon)
    }
}
