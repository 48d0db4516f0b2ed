//! Parser tests.
//!
//! Trees are compared through their s-expression rendering, which prints
//! leaves as their token text and branches as `(kind kids...)`.
//!
//! Covers: declarations (architypes, walkers, graphs, globals, abilities),
//! statements, expression precedence, graph references, connect/detach,
//! spawn forms, and error recovery.

use jac_lexer::Lexer;
use jac_parser::{parse_source, ParseResult, Parser};
use jac_types::ast::kind;
use jac_types::{AstNode, ErrorCode, SourceFile};
use pretty_assertions::assert_eq;

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn parse(source: &str) -> ParseResult {
    let sf = SourceFile::new("test.jac", source);
    let lex = Lexer::new(&sf).lex();
    Parser::new(lex.tokens, &sf).parse()
}

fn parse_ok(source: &str) -> AstNode {
    let result = parse(source);
    if result.errors.has_errors() {
        for e in &result.errors.errors {
            eprintln!("  ERROR: {} ({})", e.message, e.code);
        }
        panic!("unexpected parse errors (see above)");
    }
    result.program.expect("no program returned")
}

fn error_codes(source: &str) -> Vec<ErrorCode> {
    parse(source).errors.errors.iter().map(|e| e.code).collect()
}

/// Render the first statement of `walker w { <stmt> }`.
fn stmt(source: &str) -> String {
    let program = parse_ok(&format!("walker w {{ {source} }}"));
    let block = program.kids[0].find(kind::WALKER_BLOCK).expect("walker block");
    block.kids[0].to_string()
}

/// Render the expression of `report <expr>;`.
fn expr(source: &str) -> String {
    let program = parse_ok(&format!("walker w {{ report {source}; }}"));
    let block = program.kids[0].find(kind::WALKER_BLOCK).expect("walker block");
    block.kids[0].kids[0].to_string()
}

// ─────────────────────────────────────────────────────────────────────
// Declarations
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_empty_program() {
    let program = parse_ok("");
    assert!(program.is(kind::START));
    assert!(program.kids.is_empty());
}

#[test]
fn test_node_with_supers_and_fields() {
    let program = parse_ok("node person: entity { has name, anchor id = 3; }");
    assert_eq!(
        program.kids[0].to_string(),
        "(architype node person entity (attr_block (attr_stmt (has_stmt (has_assign name) \
         (has_assign anchor id (expression 3))))))"
    );
}

#[test]
fn test_bodyless_edge() {
    let program = parse_ok("edge likes;");
    assert_eq!(program.kids[0].to_string(), "(architype edge likes (attr_block))");
}

#[test]
fn test_builtin_action_with_preset() {
    let program = parse_ok("node n { can std.log::x:: with entry; }");
    let attr = &program.kids[0].kids[2].kids[0];
    assert_eq!(
        attr.kids[0].to_string(),
        "(can_stmt (dotted_name std log) (preset_in_out (param_list (expr_list (expression x)))) \
         (event_clause entry))"
    );
}

#[test]
fn test_code_ability_with_event_filter() {
    let program = parse_ok(r#"walker w { can greet with person entry { report "hi"; } }"#);
    let block = program.kids[0].find(kind::WALKER_BLOCK).unwrap();
    assert_eq!(
        block.kids[0].to_string(),
        r#"(attr_stmt (can_stmt greet (event_clause (name_list person) entry) (code_block (report_action (expression "hi")))))"#
    );
}

#[test]
fn test_walker_blocks() {
    let program = parse_ok(
        "walker w {
            has count = 0;
            with entry { count = 1; }
            take -->;
            with exit { report count; }
        }",
    );
    let block = program.kids[0].find(kind::WALKER_BLOCK).unwrap();
    let kinds: Vec<&str> = block.kids.iter().map(|k| k.kind.as_str()).collect();
    assert_eq!(
        kinds,
        vec![
            kind::ATTR_STMT,
            kind::WALK_ENTRY_BLOCK,
            kind::WALKER_ACTION,
            kind::WALK_EXIT_BLOCK
        ]
    );
}

#[test]
fn test_graph_declaration() {
    let program = parse_ok("graph g { has anchor head; spawn { head = spawn node::person; } }");
    assert_eq!(
        program.kids[0].to_string(),
        "(architype graph g (graph_block head (code_block (expression head (assignment \
         (expression (spawn (node_spawn (node_ref person)))))))))"
    );
}

#[test]
fn test_global_var() {
    let program = parse_ok(r#"global limit = 5, label = "x";"#);
    assert_eq!(
        program.kids[0].to_string(),
        r#"(global_var limit (expression 5) label (expression "x"))"#
    );
}

// ─────────────────────────────────────────────────────────────────────
// Statements
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_range_for() {
    assert_eq!(
        stmt("for i = 0 to i < 3 by i += 1 { }"),
        "(for_stmt (expression i (assignment (expression 0))) to (expression (compare i (cmp_op <) 3)) \
         by (expression i (inc_assign += (expression 1))) (code_block))"
    );
}

#[test]
fn test_each_for() {
    assert_eq!(
        stmt("for x in items { report x; }"),
        "(for_stmt x in (expression items) (code_block (report_action (expression x))))"
    );
    assert_eq!(
        stmt("for k, v in d { }"),
        "(for_stmt k v in (expression d) (code_block))"
    );
}

#[test]
fn test_if_elif_else() {
    assert_eq!(
        stmt("if a { } elif b { } else { }"),
        "(if_stmt (expression a) (code_block) (elif_stmt (expression b) (code_block)) (else_stmt (code_block)))"
    );
}

#[test]
fn test_try_else_with() {
    assert_eq!(
        stmt("try { x = 1; } else with e { report e; }"),
        "(try_stmt (code_block (expression x (assignment (expression 1)))) \
         (else_from_try e (code_block (report_action (expression e)))))"
    );
}

#[test]
fn test_take_with_else() {
    assert_eq!(
        stmt("take --> else { disengage; }"),
        "(walker_action (take_action (expression (node_edge_ref (edge_ref (edge_to)))) \
         (else_stmt (code_block (walker_action (disengage_action))))))"
    );
}

#[test]
fn test_take_dfs() {
    assert_eq!(
        stmt("take:dfs -->;"),
        "(walker_action (take_action dfs (expression (node_edge_ref (edge_ref (edge_to))))))"
    );
}

#[test]
fn test_report_custom_and_yield() {
    assert_eq!(
        stmt("report:status = 201;"),
        "(report_action status (expression 201))"
    );
    assert_eq!(
        stmt("yield report 1;"),
        "(walker_action (yield_action (report_action (expression 1))))"
    );
}

#[test]
fn test_node_ctx_block() {
    assert_eq!(
        stmt("person, place { report 1; }"),
        "(node_ctx_block (name_list person place) (code_block (report_action (expression 1))))"
    );
}

#[test]
fn test_ctrl_statements() {
    assert_eq!(stmt("skip;"), "(ctrl_stmt skip)");
    assert_eq!(stmt("break;"), "(ctrl_stmt break)");
}

// ─────────────────────────────────────────────────────────────────────
// Expressions
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_mul_binds_tighter_than_add() {
    assert_eq!(expr("1 + 2 * 3"), "(expression (arithmetic 1 + (term 2 * 3)))");
}

#[test]
fn test_power_is_right_assoc() {
    assert_eq!(expr("2 ** 3 ** 2"), "(expression (power 2 ** (power 3 ** 2)))");
}

#[test]
fn test_not_and_logical() {
    assert_eq!(
        expr("not a and b or c"),
        "(expression (logical (compare not a) and b or c))"
    );
}

#[test]
fn test_not_in() {
    assert_eq!(expr("x not in y"), "(expression (compare x (cmp_op not in) y))");
}

#[test]
fn test_trailers() {
    assert_eq!(
        expr("a.b[1:].length"),
        "(expression (atom a (atom_trailer b) (atom_trailer (index_slice (expression 1) null)) \
         (atom_trailer (built_in (list_built_in length)))))"
    );
}

#[test]
fn test_method_builtin_and_cast() {
    assert_eq!(
        expr(r#"s.str::split(",")"#),
        r#"(expression (atom s (atom_trailer (built_in (string_built_in split (expr_list (expression ",")))))))"#
    );
    assert_eq!(
        expr("x.int"),
        "(expression (atom x (atom_trailer (built_in (cast_built_in (any_type int))))))"
    );
}

#[test]
fn test_call_with_keyword_args() {
    assert_eq!(
        expr("f(1, k=2)"),
        "(expression (atom f (atom_trailer (ability_call (param_list (expr_list (expression 1)) \
         (kw_expr_list k (expression 2)))))))"
    );
}

#[test]
fn test_global_ref_and_dict() {
    assert_eq!(
        expr(r#"{"a": global.limit}"#),
        r#"(expression (dict_val (kv_pair (expression "a") (expression (global_ref limit)))))"#
    );
}

#[test]
fn test_ref_and_deref() {
    assert_eq!(expr("&n"), "(expression (ref n))");
    assert_eq!(expr("*s"), "(expression (deref s))");
}

#[test]
fn test_adjacent_strings_concatenate() {
    assert_eq!(expr(r#""ab" 'cd'"#), r#"(expression "abcd")"#);
}

// ─────────────────────────────────────────────────────────────────────
// Graph syntax
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_named_edge_ref_with_filter() {
    assert_eq!(
        expr("-[likes(weight > 2)]->"),
        "(expression (node_edge_ref (edge_ref (edge_to likes (filter_ctx (filter_compare weight \
         (cmp_op >) (expression 2)))))))"
    );
}

#[test]
fn test_edge_ref_directions() {
    assert_eq!(
        expr("<-[likes]-"),
        "(expression (node_edge_ref (edge_ref (edge_from likes))))"
    );
    assert_eq!(
        expr("<-[likes]->"),
        "(expression (node_edge_ref (edge_ref (edge_any likes))))"
    );
    assert_eq!(expr("<-->"), "(expression (node_edge_ref (edge_ref (edge_any))))");
}

#[test]
fn test_chained_node_ref() {
    assert_eq!(
        expr(r#"--> node::person(name == "bob")"#),
        r#"(expression (node_edge_ref (edge_ref (edge_to)) (node_edge_ref (node_ref person) (filter_ctx (filter_compare name (cmp_op ==) (expression "bob"))))))"#
    );
}

#[test]
fn test_minus_is_still_arithmetic() {
    assert_eq!(expr("a - b"), "(expression (arithmetic a - b))");
    assert_eq!(expr("-a"), "(expression (factor - a))");
}

#[test]
fn test_connect() {
    assert_eq!(
        stmt("a ++> b;"),
        "(expression (connect a (connect_op (connect_to)) (expression b)))"
    );
}

#[test]
fn test_named_connect_with_context() {
    assert_eq!(
        stmt("a +[likes(w=2)]+> b;"),
        "(expression (connect a (connect_op (connect_to likes (spawn_ctx (spawn_assign w \
         (expression 2))))) (expression b)))"
    );
}

#[test]
fn test_plus_list_is_arithmetic() {
    assert_eq!(
        stmt("x = a + [1];"),
        "(expression x (assignment (expression (arithmetic a + (list_val (expr_list (expression 1)))))))"
    );
}

#[test]
fn test_detach() {
    assert_eq!(
        stmt("a !--> b;"),
        "(expression (connect a ! (edge_ref (edge_to)) (expression b)))"
    );
}

#[test]
fn test_spawn_node_with_edge() {
    assert_eq!(
        stmt(r#"spawn here ++> node::person(name="a");"#),
        r#"(expression (spawn (node_spawn (spawn_edge (expression here) (connect_op (connect_to))) (node_ref person) (spawn_ctx (spawn_assign name (expression "a"))))))"#
    );
}

#[test]
fn test_spawn_walker() {
    assert_eq!(
        stmt("spawn here walker::init;"),
        "(expression (spawn (walker_spawn (expression here) (walker_ref init))))"
    );
}

// ─────────────────────────────────────────────────────────────────────
// Errors and recovery
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_recovers_after_bad_statement() {
    let result = parse("walker w { x = ; report 1; }");
    assert_eq!(result.errors.total_errors, 1);
    let program = result.program.unwrap();
    let block = program.kids[0].find(kind::WALKER_BLOCK).unwrap();
    assert_eq!(block.kids.len(), 1);
    assert!(block.kids[0].is(kind::REPORT_ACTION));
}

#[test]
fn test_unknown_top_level_item() {
    let result = parse("foo; walker w { }");
    assert_eq!(result.errors.total_errors, 1);
    assert_eq!(result.errors.errors[0].code, ErrorCode::UNEXPECTED_TOKEN);
    assert_eq!(result.program.unwrap().kids.len(), 1);
}

#[test]
fn test_unclosed_walker() {
    assert_eq!(error_codes("walker w { report 1;"), vec![ErrorCode::UNEXPECTED_TOKEN]);
}

#[test]
fn test_int_out_of_range() {
    assert_eq!(
        error_codes("walker w { report 99999999999999999999; }"),
        vec![ErrorCode::INVALID_LITERAL]
    );
}

#[test]
fn test_positional_after_keyword() {
    assert_eq!(
        error_codes("walker w { f(k=1, 2); }"),
        vec![ErrorCode::UNEXPECTED_TOKEN]
    );
}

#[test]
fn test_parse_source_merges_lexer_errors() {
    let sf = SourceFile::new("t.jac", "walker w { report 1 $ 2; }");
    let err = parse_source(&sf).unwrap_err();
    assert!(err.errors.iter().any(|e| e.code == ErrorCode::INVALID_CHARACTER));
}

#[test]
fn test_error_span_points_at_token() {
    let result = parse("walker w {\n  report ;\n}");
    let e = &result.errors.errors[0];
    assert_eq!((e.span.start_line, e.span.start_col), (2, 10));
}
