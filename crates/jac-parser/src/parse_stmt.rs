//! Statement parsing.

use jac_lexer::token::TokenKind;
use jac_types::ast::kind;
use jac_types::{AstNode, ErrorCode};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    /// `{ statement* }`
    pub(crate) fn parse_code_block(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            match self.parse_statement() {
                Some(stmt) => stmts.push(stmt),
                None => self.synchronize(),
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Some(self.node(kind::CODE_BLOCK, stmts, start))
    }

    pub(crate) fn parse_statement(&mut self) -> Option<AstNode> {
        match self.peek_kind() {
            TokenKind::LBrace => self.parse_code_block(),
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::Try => self.parse_try_stmt(),
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Assert => self.parse_keyword_expr_stmt(kind::ASSERT_STMT),
            TokenKind::Destroy => self.parse_keyword_expr_stmt(kind::DESTROY_ACTION),
            TokenKind::Break | TokenKind::Continue | TokenKind::Skip => self.parse_ctrl_stmt(),
            TokenKind::Report => self.parse_report_action(),
            TokenKind::Take | TokenKind::Ignore | TokenKind::Disengage | TokenKind::Yield => {
                self.parse_walker_action()
            }
            TokenKind::Identifier(_) if self.starts_node_ctx_block() => self.parse_node_ctx_block(),
            _ => {
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::Semi)?;
                Some(expr)
            }
        }
    }

    /// `NAME {` or `NAME, NAME, ... {`
    fn starts_node_ctx_block(&self) -> bool {
        let mut n = 0;
        loop {
            if !matches!(self.look_ahead(n), TokenKind::Identifier(_)) {
                return false;
            }
            match self.look_ahead(n + 1) {
                TokenKind::LBrace => return true,
                TokenKind::Comma => n += 2,
                _ => return false,
            }
        }
    }

    /// `name_list code_block`
    fn parse_node_ctx_block(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let names = self.parse_name_list()?;
        let body = self.parse_code_block()?;
        Some(self.node(kind::NODE_CTX_BLOCK, vec![names, body], start))
    }

    /// `if expression code_block elif_stmt* else_stmt?`
    fn parse_if_stmt(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.advance();
        let mut kids = vec![self.parse_expression()?, self.parse_code_block()?];
        while self.check(&TokenKind::Elif) {
            let elif_start = self.current_span();
            self.advance();
            let cond = self.parse_expression()?;
            let body = self.parse_code_block()?;
            kids.push(self.node(kind::ELIF_STMT, vec![cond, body], elif_start));
        }
        if self.check(&TokenKind::Else) {
            kids.push(self.parse_else_stmt()?);
        }
        Some(self.node(kind::IF_STMT, kids, start))
    }

    /// `else code_block`
    fn parse_else_stmt(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::Else)?;
        let body = self.parse_code_block()?;
        Some(self.node(kind::ELSE_STMT, vec![body], start))
    }

    /// `try code_block (else (with NAME)? code_block)?`
    fn parse_try_stmt(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.advance();
        let mut kids = vec![self.parse_code_block()?];
        if self.check(&TokenKind::Else) {
            let else_start = self.current_span();
            self.advance();
            let mut else_kids = Vec::new();
            if self.eat(&TokenKind::With) {
                else_kids.push(self.expect_name()?);
            }
            else_kids.push(self.parse_code_block()?);
            kids.push(self.node(kind::ELSE_FROM_TRY, else_kids, else_start));
        }
        Some(self.node(kind::TRY_STMT, kids, start))
    }

    /// `for expression to expression by expression code_block`
    /// or `for NAME (, NAME)? in expression code_block`
    fn parse_for_stmt(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.advance();
        let is_each = matches!(self.peek_kind(), TokenKind::Identifier(_))
            && matches!(self.look_ahead(1), TokenKind::In | TokenKind::Comma);

        let mut kids = Vec::new();
        if is_each {
            kids.push(self.expect_name()?);
            if self.eat(&TokenKind::Comma) {
                kids.push(self.expect_name()?);
            }
            if !self.check(&TokenKind::In) {
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, "expected 'in'");
                return None;
            }
            kids.push(self.leaf(kind::KW_IN));
            kids.push(self.parse_expression()?);
        } else {
            kids.push(self.parse_expression()?);
            if !self.check(&TokenKind::To) {
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, "expected 'to'");
                return None;
            }
            kids.push(self.leaf(kind::KW_TO));
            kids.push(self.parse_expression()?);
            if !self.check(&TokenKind::By) {
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, "expected 'by'");
                return None;
            }
            kids.push(self.leaf(kind::KW_BY));
            kids.push(self.parse_expression()?);
        }
        kids.push(self.parse_code_block()?);
        Some(self.node(kind::FOR_STMT, kids, start))
    }

    /// `while expression code_block`
    fn parse_while_stmt(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.advance();
        let cond = self.parse_expression()?;
        let body = self.parse_code_block()?;
        Some(self.node(kind::WHILE_STMT, vec![cond, body], start))
    }

    /// `KEYWORD expression ;`
    fn parse_keyword_expr_stmt(&mut self, node_kind: &str) -> Option<AstNode> {
        let start = self.current_span();
        self.advance();
        let expr = self.parse_expression()?;
        self.expect(&TokenKind::Semi)?;
        Some(self.node(node_kind, vec![expr], start))
    }

    /// `break ; | continue ; | skip ;`
    fn parse_ctrl_stmt(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let word = match self.peek_kind() {
            TokenKind::Break => self.leaf(kind::KW_BREAK),
            TokenKind::Continue => self.leaf(kind::KW_CONTINUE),
            _ => self.leaf(kind::KW_SKIP),
        };
        self.expect(&TokenKind::Semi)?;
        Some(self.node(kind::CTRL_STMT, vec![word], start))
    }

    /// `report expression ;` or `report : NAME = expression ;`
    pub(crate) fn parse_report_action(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::Report)?;
        let mut kids = Vec::new();
        if self.eat(&TokenKind::Colon) {
            kids.push(self.expect_name()?);
            self.expect(&TokenKind::Eq)?;
        }
        kids.push(self.parse_expression()?);
        self.expect(&TokenKind::Semi)?;
        Some(self.node(kind::REPORT_ACTION, kids, start))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Walker actions
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_walker_action(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        let action = match self.peek_kind() {
            TokenKind::Take => self.parse_take_action()?,
            TokenKind::Ignore => {
                let ignore_start = self.current_span();
                self.advance();
                let target = self.parse_expression()?;
                self.expect(&TokenKind::Semi)?;
                self.node(kind::IGNORE_ACTION, vec![target], ignore_start)
            }
            TokenKind::Disengage => self.parse_disengage_action()?,
            _ => self.parse_yield_action()?,
        };
        Some(self.node(kind::WALKER_ACTION, vec![action], start))
    }

    /// `take (: NAME)? expression (; | else_stmt)`
    fn parse_take_action(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::Take)?;
        let mut kids = Vec::new();
        if self.eat(&TokenKind::Colon) {
            kids.push(self.expect_name()?);
        }
        kids.push(self.parse_expression()?);
        if self.check(&TokenKind::Else) {
            kids.push(self.parse_else_stmt()?);
        } else {
            self.expect(&TokenKind::Semi)?;
        }
        Some(self.node(kind::TAKE_ACTION, kids, start))
    }

    /// `disengage (report_action | ;)`
    fn parse_disengage_action(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::Disengage)?;
        let mut kids = Vec::new();
        if self.check(&TokenKind::Report) {
            kids.push(self.parse_report_action()?);
        } else {
            self.expect(&TokenKind::Semi)?;
        }
        Some(self.node(kind::DISENGAGE_ACTION, kids, start))
    }

    /// `yield (report_action | disengage_action | take_action | ;)`
    fn parse_yield_action(&mut self) -> Option<AstNode> {
        let start = self.current_span();
        self.expect(&TokenKind::Yield)?;
        let mut kids = Vec::new();
        match self.peek_kind() {
            TokenKind::Report => kids.push(self.parse_report_action()?),
            TokenKind::Disengage => kids.push(self.parse_disengage_action()?),
            TokenKind::Take => kids.push(self.parse_take_action()?),
            _ => {
                self.expect(&TokenKind::Semi)?;
            }
        }
        Some(self.node(kind::YIELD_ACTION, kids, start))
    }
}
