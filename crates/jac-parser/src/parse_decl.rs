//! Top-level declarations: globals, architypes, walkers and their
//! `has`/`can` attribute statements.

use jac_lexer::token::TokenKind;
use jac_types::ast::kind;
use jac_types::{AstNode, ErrorCode};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Program
    // ══════════════════════════════════════════════════════════════════════════

    /// `start = element*`
    pub(crate) fn parse_program(&mut self) -> AstNode {
        let start = self.current_span();
        let mut elements = Vec::new();
        while !self.at_end() && !self.too_many_errors() {
            let element = match self.peek_kind() {
                TokenKind::Global => self.parse_global_var(),
                TokenKind::Node | TokenKind::Edge | TokenKind::Graph => self.parse_architype(),
                TokenKind::Walker => self.parse_walker(),
                other => {
                    let msg = format!(
                        "expected 'node', 'edge', 'graph', 'walker' or 'global', got '{other}'"
                    );
                    self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, msg);
                    None
                }
            };
            match element {
                Some(e) => elements.push(e),
                None => self.synchronize_top(),
            }
        }
        self.node(kind::START, elements, start)
    }

    /// `global NAME = expression (, NAME = expression)* ;`
    fn parse_global_var(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.advance();
        let mut kids = Vec::new();
        loop {
            kids.push(self.expect_name()?);
            self.expect(&TokenKind::Eq)?;
            kids.push(self.parse_expression()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Semi)?;
        Some(self.node(kind::GLOBAL_VAR, kids, start))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Architypes
    // ══════════════════════════════════════════════════════════════════════════

    /// `(node | edge) NAME (: NAME)* (attr_block | ;)` or `graph NAME graph_block`
    fn parse_architype(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let keyword = match self.peek_kind() {
            TokenKind::Node => self.leaf(kind::KW_NODE),
            TokenKind::Edge => self.leaf(kind::KW_EDGE),
            _ => self.leaf(kind::KW_GRAPH),
        };
        let is_graph = keyword.is(kind::KW_GRAPH);
        let mut kids = vec![keyword, self.expect_name()?];

        if is_graph {
            kids.push(self.parse_graph_block()?);
            return Some(self.node(kind::ARCHITYPE, kids, start));
        }

        while self.eat(&TokenKind::Colon) {
            kids.push(self.expect_name()?);
        }
        let block_start = self.current_span();
        if self.eat(&TokenKind::Semi) {
            kids.push(self.node(kind::ATTR_BLOCK, Vec::new(), block_start));
        } else {
            kids.push(self.parse_attr_block()?);
        }
        Some(self.node(kind::ARCHITYPE, kids, start))
    }

    /// `{ attr_stmt* }`
    fn parse_attr_block(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::LBrace)?;
        let mut attrs = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() && !self.too_many_errors() {
            match self.parse_attr_stmt() {
                Some(a) => attrs.push(a),
                None => self.synchronize(),
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Some(self.node(kind::ATTR_BLOCK, attrs, start))
    }

    /// `{ has anchor NAME ; spawn code_block }`
    fn parse_graph_block(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::LBrace)?;
        self.expect(&TokenKind::Has)?;
        self.expect(&TokenKind::Anchor)?;
        let anchor = self.expect_name()?;
        self.expect(&TokenKind::Semi)?;
        self.expect(&TokenKind::Spawn)?;
        let body = self.parse_code_block()?;
        self.expect(&TokenKind::RBrace)?;
        Some(self.node(kind::GRAPH_BLOCK, vec![anchor, body], start))
    }

    /// `walker NAME { walker_block }`
    fn parse_walker(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let keyword = self.leaf(kind::KW_WALKER);
        let name = self.expect_name()?;
        let block = self.parse_walker_block()?;
        Some(self.node(kind::WALKER, vec![keyword, name, block], start))
    }

    fn parse_walker_block(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::LBrace)?;
        let mut items = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() && !self.too_many_errors() {
            let item = match (self.peek_kind(), self.look_ahead(1)) {
                (TokenKind::Has | TokenKind::Can, _) => self.parse_attr_stmt(),
                (TokenKind::With, TokenKind::Entry) => self.parse_walk_block(kind::WALK_ENTRY_BLOCK),
                (TokenKind::With, TokenKind::Exit) => self.parse_walk_block(kind::WALK_EXIT_BLOCK),
                (TokenKind::With, TokenKind::Activity) => {
                    self.parse_walk_block(kind::WALK_ACTIVITY_BLOCK)
                }
                _ => self.parse_statement(),
            };
            match item {
                Some(i) => items.push(i),
                None => self.synchronize(),
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Some(self.node(kind::WALKER_BLOCK, items, start))
    }

    /// `with (entry | exit | activity) code_block`
    fn parse_walk_block(&mut self, block_kind: &str) -> Option<AstNode> {
        let start = self.current_span();
        self.advance();
        self.advance();
        let body = self.parse_code_block()?;
        Some(self.node(block_kind, vec![body], start))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Attribute statements
    // ══════════════════════════════════════════════════════════════════════════

    /// `has_stmt | can_stmt`
    fn parse_attr_stmt(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let inner = match self.peek_kind() {
            TokenKind::Has => self.parse_has_stmt()?,
            TokenKind::Can => self.parse_can_stmt()?,
            other => {
                let msg = format!("expected 'has' or 'can', got '{other}'");
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, msg);
                return None;
            }
        };
        Some(self.node(kind::ATTR_STMT, vec![inner], start))
    }

    /// `has has_assign (, has_assign)* ;`
    fn parse_has_stmt(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.advance();
        let mut assigns = Vec::new();
        loop {
            let assign_start = self.current_span();
            let mut kids = Vec::new();
            if self.check(&TokenKind::Anchor) {
                kids.push(self.leaf(kind::KW_ANCHOR));
            }
            kids.push(self.expect_name()?);
            if self.eat(&TokenKind::Eq) {
                kids.push(self.parse_expression()?);
            }
            assigns.push(self.node(kind::HAS_ASSIGN, kids, assign_start));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Semi)?;
        Some(self.node(kind::HAS_STMT, assigns, start))
    }

    /// Code ability `can NAME event_clause? code_block`, or builtin action
    /// `can dotted_name preset_in_out? event_clause? ;`.
    fn parse_can_stmt(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.advance();

        let name_start = self.current_span();
        let mut names = vec![self.expect_name()?];
        while self.eat(&TokenKind::Dot) {
            names.push(self.expect_name()?);
        }
        let is_dotted = names.len() > 1;

        let preset = if self.check(&TokenKind::DblColon) {
            Some(self.parse_preset_in_out()?)
        } else {
            None
        };
        let event = if self.check(&TokenKind::With) {
            Some(self.parse_event_clause()?)
        } else {
            None
        };

        if self.check(&TokenKind::LBrace) {
            if is_dotted || preset.is_some() {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    "a code ability takes a plain name and no preset arguments",
                );
                return None;
            }
            let mut kids = names;
            kids.extend(event);
            kids.push(self.parse_code_block()?);
            return Some(self.node(kind::CAN_STMT, kids, start));
        }

        self.expect(&TokenKind::Semi)?;
        let dotted = self.node(kind::DOTTED_NAME, names, name_start);
        let mut kids = vec![dotted];
        kids.extend(preset);
        kids.extend(event);
        Some(self.node(kind::CAN_STMT, kids, start))
    }

    /// `:: param_list? (:: | ::> expression)`
    fn parse_preset_in_out(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::DblColon)?;
        let mut kids = Vec::new();
        if !matches!(self.peek_kind(), TokenKind::DblColon | TokenKind::ColonOut) {
            kids.push(self.parse_param_items(&[TokenKind::DblColon, TokenKind::ColonOut])?);
        }
        if self.check(&TokenKind::ColonOut) {
            kids.push(self.leaf(kind::COLON_OUT));
            kids.push(self.parse_expression()?);
        } else {
            self.expect(&TokenKind::DblColon)?;
        }
        Some(self.node(kind::PRESET_IN_OUT, kids, start))
    }

    /// `with name_list? (entry | exit | activity)`
    fn parse_event_clause(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::With)?;
        let mut kids = Vec::new();
        if matches!(self.peek_kind(), TokenKind::Identifier(_)) {
            kids.push(self.parse_name_list()?);
        }
        let event = match self.peek_kind() {
            TokenKind::Entry => self.leaf(kind::KW_ENTRY),
            TokenKind::Exit => self.leaf(kind::KW_EXIT),
            TokenKind::Activity => self.leaf(kind::KW_ACTIVITY),
            other => {
                let msg = format!("expected 'entry', 'exit' or 'activity', got '{other}'");
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, msg);
                return None;
            }
        };
        kids.push(event);
        Some(self.node(kind::EVENT_CLAUSE, kids, start))
    }

    /// `NAME (, NAME)*`
    pub(crate) fn parse_name_list(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let mut names = vec![self.expect_name()?];
        while self.eat(&TokenKind::Comma) {
            names.push(self.expect_name()?);
        }
        Some(self.node(kind::NAME_LIST, names, start))
    }
}
