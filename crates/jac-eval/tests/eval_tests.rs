//! Integration tests for expression and statement evaluation.
//!
//! Every program runs as a walker from the root of an empty graph:
//! - variables, assignment and augmented assignment
//! - logical short-circuit, comparison and membership
//! - casts, list/dict literals, indexing
//! - `str::`, `list::` and `dict::` method tables
//! - `for`/`while` loops, `break`/`continue`, `if`/`elif`/`else`
//! - `try`/`else`, `assert`, loop limit, call depth
//! - globals and `std.*` builtin actions
//! - report attributes

use indexmap::IndexMap;
use jac_eval::{MemoryStore, Outcome, Registry, RunConfig, RunReport, Runtime};
use jac_parser::parse_source;
use jac_types::SourceFile;
use pretty_assertions::assert_eq;
use serde_json::json;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Parse and load a program (panics on parse or load errors).
fn load(source: &str) -> Registry {
    let sf = SourceFile::new("test.jac", source);
    let program = parse_source(&sf).unwrap_or_else(|e| panic!("parse errors:\n{e}"));
    Registry::load(&program, &sf).unwrap_or_else(|e| panic!("load errors:\n{e}"))
}

fn runtime(source: &str) -> Runtime<MemoryStore> {
    init_tracing();
    Runtime::new(load(source), MemoryStore::new()).expect("failed to create runtime")
}

/// Run walker `init` from the root.
fn run(source: &str) -> RunReport {
    runtime(source)
        .run_walker("init", None, IndexMap::new())
        .expect("walker run failed")
}

/// Wrap statements in a walker `init`.
fn walker(body: &str) -> String {
    format!("walker init {{ {body} }}")
}

fn reported(body: &str) -> Vec<serde_json::Value> {
    let report = run(&walker(body));
    assert!(report.errors.is_empty(), "unexpected errors: {:?}", report.errors);
    report.report
}

// ══════════════════════════════════════════════════════════════════════════════
// Variables & assignment
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn assign_and_augmented_assign() {
    let report = run(&walker("x = 5; x += 3; report x;"));
    assert_eq!(report.report, vec![json!(8)]);
    assert_eq!(report.outcome, Outcome::Clean);
    assert!(report.success);
}

#[test]
fn undefined_variable_is_runtime_error() {
    let report = run(&walker("report y;"));
    assert_eq!(report.report, vec![json!(null)]);
    assert_eq!(report.outcome, Outcome::Warned);
    assert!(report.success);
    assert!(report.errors[0].contains("Variable not defined - y"), "{:?}", report.errors);
}

#[test]
fn list_and_dict_element_assignment() {
    let out = reported(r#"l = [1, 2, 3]; l[1] = 9; d = {"a": 1}; d["b"] = 2; report l; report d;"#);
    assert_eq!(out, vec![json!([1, 9, 3]), json!({"a": 1, "b": 2})]);
}

#[test]
fn slicing_and_length() {
    let out = reported("l = [1, 2, 3, 4]; report l[1:3]; report l.length;");
    assert_eq!(out, vec![json!([2, 3]), json!(4)]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn logical_operators_short_circuit() {
    let out = reported("report 0 or 5; report 1 and 0; report false and missing; report true or missing;");
    assert_eq!(out, vec![json!(5), json!(0), json!(false), json!(true)]);
}

#[test]
fn arithmetic_precedence_and_power() {
    let out = reported(r#"report 1 + 2 * 3; report 2 ** 3; report "ab" + "cd"; report [1] + [2];"#);
    assert_eq!(out, vec![json!(7), json!(8), json!("abcd"), json!([1, 2])]);
}

#[test]
fn overflowing_arithmetic_is_runtime_error() {
    let report = run(&walker(
        r#"x = -9223372036854775807 - 1; report x % -1;
        report 9223372036854775806 % 9223372036854775807;
        report [1, 2] * 9223372036854775807; report "ab" * 9223372036854775807;"#,
    ));
    assert!(report.success);
    assert_eq!(
        report.report,
        vec![json!(i64::MIN), json!(9223372036854775806i64), json!([1, 2]), json!("ab")]
    );
    assert_eq!(report.errors.len(), 3, "{:?}", report.errors);
    assert!(report.errors[0].contains("integer overflow"), "{:?}", report.errors);
    assert!(report.errors[1].contains("repetition too large"), "{:?}", report.errors);
}

#[test]
fn membership() {
    let out = reported(r#"report 2 in [1, 2]; report "k" not in {"k": 1};"#);
    assert_eq!(out, vec![json!(true), json!(false)]);
}

#[test]
fn casts() {
    let out = reported(r#"x = 2.7; n = 3; report x.int; report "12".int + 1; report n.str; z = 0; report z.bool;"#);
    assert_eq!(out, vec![json!(2), json!(13), json!("3"), json!(false)]);
}

#[test]
fn failed_cast_keeps_value() {
    let report = run(&walker(r#"s = "abc"; report s.int;"#));
    assert_eq!(report.report, vec![json!("abc")]);
    assert_eq!(report.outcome, Outcome::Warned);
}

// ══════════════════════════════════════════════════════════════════════════════
// Method tables
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn string_list_and_dict_methods() {
    let out = reported(
        r#"
        s = "a,b";
        parts = s.str::split(",");
        parts.list::append("c");
        report parts;
        report "hi".str::upper;
        d = {"k": 1};
        report d.dict::get("k");
        report d.keys;
        "#,
    );
    assert_eq!(out, vec![json!(["a", "b", "c"]), json!("HI"), json!(1), json!(["k"])]);
}

#[test]
fn unknown_method_is_runtime_error() {
    let report = run(&walker(r#"report "x".str::nope;"#));
    assert_eq!(report.report, vec![json!("x")]);
    assert!(report.errors[0].contains("Call to nope is invalid."), "{:?}", report.errors);
}

#[test]
fn failed_method_call_keeps_the_receiver() {
    let report = run(&walker(
        r#"x = "abc".str::shout; report x; l = [1]; y = l.list::pop(5); report y; n = 5; report n.list::append(1);"#,
    ));
    assert_eq!(report.report, vec![json!("abc"), json!([1]), json!(5)]);
    assert_eq!(report.errors.len(), 3, "{:?}", report.errors);
    assert!(report.errors[1].contains("Index 5 out of range"), "{:?}", report.errors);
    assert!(report.errors[2].contains("int is not a list"), "{:?}", report.errors);
}

// ══════════════════════════════════════════════════════════════════════════════
// Control flow
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn for_range_loop() {
    let out = reported("for i = 0 to i < 3 by i += 1 { report i; }");
    assert_eq!(out, vec![json!(0), json!(1), json!(2)]);
}

#[test]
fn for_each_over_dict_pairs() {
    let out = reported(r#"for k, v in {"a": 1, "b": 2} { report k + v.str; }"#);
    assert_eq!(out, vec![json!("a1"), json!("b2")]);
}

#[test]
fn break_and_continue() {
    let out = reported("for x in [1, 2, 3, 4] { if x == 2 { continue; } if x == 4 { break; } report x; }");
    assert_eq!(out, vec![json!(1), json!(3)]);
}

#[test]
fn if_elif_else() {
    let out = reported(
        r#"for x in [1, 2, 3] { if x == 1 { report "one"; } elif x == 2 { report "two"; } else { report "many"; } }"#,
    );
    assert_eq!(out, vec![json!("one"), json!("two"), json!("many")]);
}

#[test]
fn loop_limit_stops_runaway_loop() {
    let mut rt = runtime(&walker("x = 0; while x < 100 { x += 1; } report x;"));
    rt.set_config(RunConfig {
        loop_limit: 10,
        ..RunConfig::default()
    });
    let report = rt.run_walker("init", None, IndexMap::new()).unwrap();
    // the walker's own step spends the first tick
    assert_eq!(report.report, vec![json!(9)]);
    assert_eq!(report.outcome, Outcome::Warned);
    assert!(report.errors[0].contains("Hit loop limit [10]!"), "{:?}", report.errors);
}

#[test]
fn runaway_recursion_hits_call_depth() {
    let report = run("node root { can down { here::down; } } walker init { here::down; }");
    assert_eq!(report.outcome, Outcome::Warned);
    assert!(
        report.errors.iter().any(|e| e.contains("Maximum call depth 64 exceeded")),
        "{:?}",
        report.errors
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Errors
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn try_else_catches_runtime_error() {
    let report = run(&walker(
        r#"try { l = [1, 2]; report l[5]; } else with e { report e["type"]; } report "after";"#,
    ));
    assert_eq!(report.report, vec![json!("RuntimeError"), json!("after")]);
    assert!(report.errors.is_empty());
    assert_eq!(report.outcome, Outcome::Clean);
}

#[test]
fn error_inside_try_skips_rest_of_block() {
    let out = reported(r#"try { x = missing; report "unreached"; } else { report "caught"; }"#);
    assert_eq!(out, vec![json!("caught")]);
}

#[test]
fn failed_assert_aborts_run() {
    let report = run(&walker("report 1; assert 1 == 2; report 2;"));
    assert_eq!(report.report, vec![json!(1)]);
    assert!(!report.success);
    match report.outcome {
        Outcome::Aborted { message } => assert!(message.starts_with("assertion failed"), "{message}"),
        other => panic!("expected abort, got {other:?}"),
    }
}

#[test]
fn assert_is_not_caught_by_try() {
    let report = run(&walker(r#"try { assert false; } else { report "caught"; }"#));
    assert!(report.report.is_empty());
    assert!(!report.success);
}

// ══════════════════════════════════════════════════════════════════════════════
// Globals & std actions
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn globals_read_and_write() {
    let mut rt = runtime(&format!(
        "global limit = 5; {}",
        walker(r#"report global.limit; global.limit = 7; report std.get_global("limit");"#)
    ));
    let report = rt.run_walker("init", None, IndexMap::new()).unwrap();
    assert_eq!(report.report, vec![json!(5), json!(7)]);

    // the stored value survives into the next run
    let report = rt.run_walker("init", None, IndexMap::new()).unwrap();
    assert_eq!(report.report, vec![json!(7), json!(7)]);
}

#[test]
fn unknown_global_is_runtime_error() {
    let report = run(&walker("report global.nope;"));
    assert!(report.errors[0].contains("Global not defined - nope"), "{:?}", report.errors);
}

#[test]
fn json_and_sort_builtins() {
    let out = reported(
        r#"
        report std.json_to_str({"a": 1});
        report std.str_to_json("[1, 2]");
        report std.sort_by_col([[2, "b"], [1, "a"]], 0);
        "#,
    );
    assert_eq!(out, vec![json!("{\"a\":1}"), json!([1, 2]), json!([[1, "a"], [2, "b"]])]);
}

#[test]
fn builtin_failure_names_the_action() {
    let report = run(&walker(r#"report std.str_to_json("{oops");"#));
    assert!(report.errors[0].contains("std.str_to_json:"), "{:?}", report.errors);
}

// ══════════════════════════════════════════════════════════════════════════════
// Report attributes
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn report_status_custom_and_error() {
    let report = run(&walker(
        r#"report:status = 404; report:custom = {"ok": false}; report:error = "boom"; report 1;"#,
    ));
    assert_eq!(report.report, vec![json!(1)]);
    assert_eq!(report.status_code, Some(404));
    assert_eq!(report.report_custom, Some(json!({"ok": false})));
    assert_eq!(report.errors, vec!["boom".to_string()]);
    assert_eq!(report.outcome, Outcome::Warned);
}

#[test]
fn invalid_report_attribute() {
    let report = run(&walker("report:colour = 1;"));
    assert!(report.errors[0].contains("Invalid report attribute to set"), "{:?}", report.errors);
}

#[test]
fn status_code_must_be_int() {
    let report = run(&walker(r#"report:status = "ok";"#));
    assert_eq!(report.status_code, None);
    assert_eq!(report.outcome, Outcome::Warned);
}
