//! The generic AST node contract.
//!
//! The evaluator never sees typed syntax structures: every node is an
//! [`AstNode`] with a kind name, ordered children and, for leaves, the
//! token text. Kind names are listed in [`kind`]; the shape of each
//! branch kind's children is documented next to its constant.
//!
//! Single-child precedence levels are collapsed by the parser, so an
//! expression position may hold a node of any expression kind. Statement
//! positions always hold an [`kind::EXPRESSION`] node.

use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One node of a parsed Jac program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstNode {
    pub kind: String,
    /// Literal token text for leaves. String leaves carry unescaped text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kids: Vec<AstNode>,
    #[serde(default)]
    pub span: Span,
}

impl AstNode {
    /// A branch node.
    pub fn branch(kind: &str, kids: Vec<AstNode>, span: Span) -> Self {
        Self {
            kind: kind.to_string(),
            token: None,
            kids,
            span,
        }
    }

    /// A leaf carrying token text.
    pub fn leaf(kind: &str, token: impl Into<String>, span: Span) -> Self {
        Self {
            kind: kind.to_string(),
            token: Some(token.into()),
            kids: Vec::new(),
            span,
        }
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    pub fn is_leaf(&self) -> bool {
        self.token.is_some()
    }

    /// Token text, or `""` for branch nodes.
    pub fn token_text(&self) -> &str {
        self.token.as_deref().unwrap_or("")
    }

    /// Child at `idx`, if any.
    pub fn kid(&self, idx: usize) -> Option<&AstNode> {
        self.kids.get(idx)
    }

    /// First child of the given kind.
    pub fn find(&self, kind: &str) -> Option<&AstNode> {
        self.kids.iter().find(|k| k.kind == kind)
    }

    /// Source-like text of the subtree: leaf tokens joined by spaces.
    pub fn text(&self) -> String {
        let mut parts = Vec::new();
        self.collect_tokens(&mut parts);
        parts.join(" ")
    }

    fn collect_tokens<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.token {
            Some(t) => out.push(t),
            None => self.kids.iter().for_each(|k| k.collect_tokens(out)),
        }
    }
}

impl fmt::Display for AstNode {
    /// S-expression rendering, handy in parser tests.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token {
            Some(t) if self.kind == kind::STRING => write!(f, "{t:?}"),
            Some(t) => f.write_str(t),
            None => {
                write!(f, "({}", self.kind)?;
                for k in &self.kids {
                    write!(f, " {k}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Kind names shared by the parser and the evaluator.
pub mod kind {
    // ══════════════════════════════════════════════════════════════════
    // Leaves
    // ══════════════════════════════════════════════════════════════════

    pub const NAME: &str = "NAME";
    pub const INT: &str = "INT";
    pub const FLOAT: &str = "FLOAT";
    pub const STRING: &str = "STRING";
    pub const BOOL: &str = "BOOL";
    pub const NULL: &str = "NULL";

    // ── Operators ──
    pub const PLUS: &str = "PLUS";
    pub const MINUS: &str = "MINUS";
    pub const STAR_MUL: &str = "STAR_MUL";
    pub const DIV: &str = "DIV";
    pub const MOD: &str = "MOD";
    pub const POW: &str = "POW";
    pub const EE: &str = "EE";
    pub const NE: &str = "NE";
    pub const LT: &str = "LT";
    pub const GT: &str = "GT";
    pub const LTE: &str = "LTE";
    pub const GTE: &str = "GTE";
    pub const KW_IN: &str = "KW_IN";
    pub const NOT_IN: &str = "NOT_IN";
    pub const KW_AND: &str = "KW_AND";
    pub const KW_OR: &str = "KW_OR";
    pub const NOT: &str = "NOT";
    pub const PEQ: &str = "PEQ";
    pub const MEQ: &str = "MEQ";
    pub const TEQ: &str = "TEQ";
    pub const DEQ: &str = "DEQ";
    pub const COLON_OUT: &str = "COLON_OUT";

    // ── Keywords ──
    pub const KW_NODE: &str = "KW_NODE";
    pub const KW_EDGE: &str = "KW_EDGE";
    pub const KW_GRAPH: &str = "KW_GRAPH";
    pub const KW_WALKER: &str = "KW_WALKER";
    pub const KW_ANCHOR: &str = "KW_ANCHOR";
    pub const KW_ENTRY: &str = "KW_ENTRY";
    pub const KW_EXIT: &str = "KW_EXIT";
    pub const KW_ACTIVITY: &str = "KW_ACTIVITY";
    pub const KW_BREAK: &str = "KW_BREAK";
    pub const KW_CONTINUE: &str = "KW_CONTINUE";
    pub const KW_SKIP: &str = "KW_SKIP";
    pub const KW_TO: &str = "KW_TO";
    pub const KW_BY: &str = "KW_BY";
    pub const KW_CONTEXT: &str = "KW_CONTEXT";
    pub const KW_INFO: &str = "KW_INFO";
    pub const KW_DETAILS: &str = "KW_DETAILS";
    pub const KW_LENGTH: &str = "KW_LENGTH";
    pub const KW_KEYS: &str = "KW_KEYS";

    // ── Type tags ──
    pub const TYP_STRING: &str = "TYP_STRING";
    pub const TYP_INT: &str = "TYP_INT";
    pub const TYP_FLOAT: &str = "TYP_FLOAT";
    pub const TYP_LIST: &str = "TYP_LIST";
    pub const TYP_DICT: &str = "TYP_DICT";
    pub const TYP_BOOL: &str = "TYP_BOOL";
    pub const KW_TYPE: &str = "KW_TYPE";

    // ══════════════════════════════════════════════════════════════════
    // Declarations
    // ══════════════════════════════════════════════════════════════════

    /// `element*` (global_var | architype | walker)
    pub const START: &str = "start";
    /// `(NAME expression)+`
    pub const GLOBAL_VAR: &str = "global_var";
    /// `(KW_NODE | KW_EDGE | KW_GRAPH) NAME NAME* (attr_block | graph_block)`;
    /// the NAMEs after the first are super architypes.
    pub const ARCHITYPE: &str = "architype";
    /// `KW_WALKER NAME walker_block`
    pub const WALKER: &str = "walker";
    /// `attr_stmt*`
    pub const ATTR_BLOCK: &str = "attr_block";
    /// `has_stmt | can_stmt`
    pub const ATTR_STMT: &str = "attr_stmt";
    /// `has_assign+`
    pub const HAS_STMT: &str = "has_stmt";
    /// `KW_ANCHOR? NAME expression?`
    pub const HAS_ASSIGN: &str = "has_assign";
    /// Code ability: `NAME event_clause? code_block`.
    /// Builtin action: `dotted_name preset_in_out? event_clause?`.
    pub const CAN_STMT: &str = "can_stmt";
    /// `NAME+`
    pub const DOTTED_NAME: &str = "dotted_name";
    /// `name_list? (KW_ENTRY | KW_EXIT | KW_ACTIVITY)`
    pub const EVENT_CLAUSE: &str = "event_clause";
    /// `param_list? (COLON_OUT expression)?`
    pub const PRESET_IN_OUT: &str = "preset_in_out";
    /// `NAME+`
    pub const NAME_LIST: &str = "name_list";
    /// `NAME code_block`: the anchor name and the spawn body.
    pub const GRAPH_BLOCK: &str = "graph_block";
    /// `attr_stmt* walk_entry_block? (statement | walk_activity_block)* walk_exit_block?`
    pub const WALKER_BLOCK: &str = "walker_block";
    /// `code_block`
    pub const WALK_ENTRY_BLOCK: &str = "walk_entry_block";
    /// `code_block`
    pub const WALK_EXIT_BLOCK: &str = "walk_exit_block";
    /// `code_block`
    pub const WALK_ACTIVITY_BLOCK: &str = "walk_activity_block";

    // ══════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════

    /// `statement*`
    pub const CODE_BLOCK: &str = "code_block";
    /// `name_list code_block`
    pub const NODE_CTX_BLOCK: &str = "node_ctx_block";
    /// `expression code_block elif_stmt* else_stmt?`
    pub const IF_STMT: &str = "if_stmt";
    /// `expression code_block`
    pub const ELIF_STMT: &str = "elif_stmt";
    /// `code_block`
    pub const ELSE_STMT: &str = "else_stmt";
    /// `code_block else_from_try?`
    pub const TRY_STMT: &str = "try_stmt";
    /// `NAME? code_block`
    pub const ELSE_FROM_TRY: &str = "else_from_try";
    /// Range: `expression KW_TO expression KW_BY expression code_block`.
    /// Each: `NAME NAME? KW_IN expression code_block`.
    pub const FOR_STMT: &str = "for_stmt";
    /// `expression code_block`
    pub const WHILE_STMT: &str = "while_stmt";
    /// `expression`
    pub const ASSERT_STMT: &str = "assert_stmt";
    /// `KW_BREAK | KW_CONTINUE | KW_SKIP`
    pub const CTRL_STMT: &str = "ctrl_stmt";
    /// `expression`
    pub const DESTROY_ACTION: &str = "destroy_action";
    /// `expression` or `NAME expression` for `report:NAME = expression`.
    pub const REPORT_ACTION: &str = "report_action";
    /// `take_action | ignore_action | disengage_action | yield_action`
    pub const WALKER_ACTION: &str = "walker_action";
    /// `NAME? expression else_stmt?`; the NAME is the `bfs`/`dfs` style.
    pub const TAKE_ACTION: &str = "take_action";
    /// `expression`
    pub const IGNORE_ACTION: &str = "ignore_action";
    /// `report_action?`
    pub const DISENGAGE_ACTION: &str = "disengage_action";
    /// `(report_action | disengage_action | take_action)?`
    pub const YIELD_ACTION: &str = "yield_action";

    // ══════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════

    /// `expr (assignment | copy_assign | inc_assign)?`
    pub const EXPRESSION: &str = "expression";
    /// `expression`
    pub const ASSIGNMENT: &str = "assignment";
    /// `expression`
    pub const COPY_ASSIGN: &str = "copy_assign";
    /// `(PEQ | MEQ | TEQ | DEQ) expression`
    pub const INC_ASSIGN: &str = "inc_assign";
    /// `expr connect_op expression` or `expr NOT edge_ref expression`
    pub const CONNECT: &str = "connect";
    /// `connect_to | connect_from | connect_any`
    pub const CONNECT_OP: &str = "connect_op";
    /// `(NAME spawn_ctx?)?`
    pub const CONNECT_TO: &str = "connect_to";
    pub const CONNECT_FROM: &str = "connect_from";
    pub const CONNECT_ANY: &str = "connect_any";
    /// `expr ((KW_AND | KW_OR) expr)+`
    pub const LOGICAL: &str = "logical";
    /// `NOT expr` or `expr (cmp_op expr)+`
    pub const COMPARE: &str = "compare";
    /// `EE | NE | LT | GT | LTE | GTE | KW_IN | NOT_IN`
    pub const CMP_OP: &str = "cmp_op";
    /// `expr ((PLUS | MINUS) expr)+`
    pub const ARITHMETIC: &str = "arithmetic";
    /// `expr ((STAR_MUL | DIV | MOD) expr)+`
    pub const TERM: &str = "term";
    /// `(PLUS | MINUS) expr`
    pub const FACTOR: &str = "factor";
    /// `expr (POW expr)+`
    pub const POWER: &str = "power";
    /// `expr atom_trailer+`, or `ability_op NAME spawn_ctx?`
    pub const ATOM: &str = "atom";
    /// `NAME | built_in | index_slice | ability_call`
    pub const ATOM_TRAILER: &str = "atom_trailer";
    /// `expression expression?` (two children for a slice)
    pub const INDEX_SLICE: &str = "index_slice";
    /// `param_list?` or `ability_op NAME spawn_ctx?`
    pub const ABILITY_CALL: &str = "ability_call";
    /// `NAME?`
    pub const ABILITY_OP: &str = "ability_op";
    /// `expr_list? kw_expr_list?`
    pub const PARAM_LIST: &str = "param_list";
    /// `expr+`
    pub const EXPR_LIST: &str = "expr_list";
    /// `(NAME expr)+`
    pub const KW_EXPR_LIST: &str = "kw_expr_list";
    /// `cast_built_in | obj_built_in | dict_built_in | list_built_in | string_built_in`
    pub const BUILT_IN: &str = "built_in";
    /// `any_type`
    pub const CAST_BUILT_IN: &str = "cast_built_in";
    /// `KW_CONTEXT | KW_INFO | KW_DETAILS`
    pub const OBJ_BUILT_IN: &str = "obj_built_in";
    /// `KW_KEYS` or `NAME expr_list?`
    pub const DICT_BUILT_IN: &str = "dict_built_in";
    /// `KW_LENGTH` or `NAME expr_list?`
    pub const LIST_BUILT_IN: &str = "list_built_in";
    /// `NAME expr_list?`
    pub const STRING_BUILT_IN: &str = "string_built_in";
    /// A type tag leaf wrapper: `TYP_* | KW_NODE | KW_EDGE | KW_TYPE`
    pub const ANY_TYPE: &str = "any_type";
    /// `NAME | obj_built_in`
    pub const GLOBAL_REF: &str = "global_ref";
    /// `expr`
    pub const REF: &str = "ref";
    /// `expr`
    pub const DEREF: &str = "deref";
    /// `expr_list?`
    pub const LIST_VAL: &str = "list_val";
    /// `kv_pair*`
    pub const DICT_VAL: &str = "dict_val";
    /// `expression expression`
    pub const KV_PAIR: &str = "kv_pair";

    // ── Graph references ──
    /// `node_ref filter_ctx? node_edge_ref?` or `edge_ref node_edge_ref?`
    pub const NODE_EDGE_REF: &str = "node_edge_ref";
    /// `NAME`
    pub const NODE_REF: &str = "node_ref";
    /// `NAME`
    pub const WALKER_REF: &str = "walker_ref";
    /// `NAME`
    pub const GRAPH_REF: &str = "graph_ref";
    /// `edge_to | edge_from | edge_any`
    pub const EDGE_REF: &str = "edge_ref";
    /// `(NAME filter_ctx?)?`
    pub const EDGE_TO: &str = "edge_to";
    pub const EDGE_FROM: &str = "edge_from";
    pub const EDGE_ANY: &str = "edge_any";
    /// `filter_compare+`
    pub const FILTER_CTX: &str = "filter_ctx";
    /// `NAME cmp_op expression`
    pub const FILTER_COMPARE: &str = "filter_compare";
    /// `spawn_assign*`
    pub const SPAWN_CTX: &str = "spawn_ctx";
    /// `NAME expression`
    pub const SPAWN_ASSIGN: &str = "spawn_assign";

    // ── Spawning ──
    /// `node_spawn | walker_spawn | graph_spawn`
    pub const SPAWN: &str = "spawn";
    /// `spawn_edge? node_ref spawn_ctx?`
    pub const NODE_SPAWN: &str = "node_spawn";
    /// `expression walker_ref spawn_ctx?`
    pub const WALKER_SPAWN: &str = "walker_spawn";
    /// `spawn_edge? graph_ref`
    pub const GRAPH_SPAWN: &str = "graph_spawn";
    /// `expression connect_op`
    pub const SPAWN_EDGE: &str = "spawn_edge";
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn report_stmt() -> AstNode {
        AstNode::branch(
            kind::REPORT_ACTION,
            vec![AstNode::branch(
                kind::ARITHMETIC,
                vec![
                    AstNode::leaf(kind::NAME, "x", Span::point(1, 8)),
                    AstNode::leaf(kind::PLUS, "+", Span::point(1, 10)),
                    AstNode::leaf(kind::INT, "1", Span::point(1, 12)),
                ],
                Span::new(1, 8, 1, 12),
            )],
            Span::new(1, 1, 1, 13),
        )
    }

    #[test]
    fn test_text_joins_leaf_tokens() {
        assert_eq!(report_stmt().text(), "x + 1");
    }

    #[test]
    fn test_display_sexpr() {
        assert_eq!(report_stmt().to_string(), "(report_action (arithmetic x + 1))");
        let s = AstNode::leaf(kind::STRING, "hi", Span::default());
        assert_eq!(s.to_string(), "\"hi\"");
    }

    #[test]
    fn test_find_and_kid() {
        let node = report_stmt();
        let arith = node.find(kind::ARITHMETIC).unwrap();
        assert!(arith.kid(1).unwrap().is(kind::PLUS));
        assert!(arith.kid(3).is_none());
        assert!(node.find(kind::NAME).is_none());
        assert_eq!(node.token_text(), "");
        assert!(!node.is_leaf());
        assert!(arith.kid(0).unwrap().is_leaf());
    }

    #[test]
    fn test_serde_round_trip_preserves_tree() {
        let node = report_stmt();
        let json = serde_json::to_string(&node).unwrap();
        let back: AstNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
