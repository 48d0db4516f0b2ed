//! Integration tests for walkers and the graph they traverse.
//!
//! Tests key walker features:
//! - `take` (breadth- and depth-first) and the default traversal
//! - `ignore`, `disengage` and node exit abilities
//! - node and walker abilities triggered by visits, access lists
//! - builtin abilities with presets
//! - node, edge and graph spawns, connect and detach
//! - node/edge references with filters, edge and node casts
//! - walker spawn anchors, `yield` and resume
//! - `destroy`, `&`/`*` references, undeclared fields

use indexmap::IndexMap;
use jac_eval::{EdgeDir, MemoryStore, ObjectId, Outcome, Registry, RunReport, Runtime, Value};
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

fn load(source: &str) -> Registry {
    let sf = SourceFile::new("test.jac", source);
    let program = parse_source(&sf).unwrap_or_else(|e| panic!("parse errors:\n{e}"));
    Registry::load(&program, &sf).unwrap_or_else(|e| panic!("load errors:\n{e}"))
}

fn runtime(source: &str) -> Runtime<MemoryStore> {
    init_tracing();
    Runtime::new(load(source), MemoryStore::new()).expect("failed to create runtime")
}

fn walk(rt: &mut Runtime<MemoryStore>, walker: &str) -> RunReport {
    rt.run_walker(walker, None, IndexMap::new()).expect("walker run failed")
}

fn run(source: &str) -> RunReport {
    walk(&mut runtime(source), "init")
}

fn ctx(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Spawn a `place` node labelled `label` and connect `from` to it.
fn place(rt: &mut Runtime<MemoryStore>, from: ObjectId, label: &str) -> ObjectId {
    let id = rt.spawn_node("place", ctx(&[("label", Value::str(label))])).unwrap();
    rt.connect(from, id, None, EdgeDir::To).unwrap();
    id
}

/// root → a, b; a → c
fn tree(rt: &mut Runtime<MemoryStore>) {
    let root = rt.root();
    let a = place(rt, root, "a");
    place(rt, root, "b");
    place(rt, a, "c");
}

const PLACE: &str = "node place { has label; }";

// ══════════════════════════════════════════════════════════════════════════════
// Traversal
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn take_then_report_context_in_node_block() {
    let mut rt = runtime("node person { has name; } edge friend; walker init { take -->; person { report here.context; } }");
    let root = rt.root();
    let p = rt.spawn_node("person", IndexMap::new()).unwrap();
    rt.connect(root, p, Some("friend"), EdgeDir::To).unwrap();

    let report = walk(&mut rt, "init");
    assert_eq!(report.report, vec![json!({"name": null})]);
    assert_eq!(report.final_node, Some(p.urn()));
    assert_eq!(report.outcome, Outcome::Clean);
}

#[test]
fn take_reports_context_at_every_visit() {
    // the root's own (empty) context is reported first
    let mut rt = runtime("node person { has name; } edge friend; walker init { take -->; report here.context; }");
    let root = rt.root();
    let p = rt.spawn_node("person", IndexMap::new()).unwrap();
    rt.connect(root, p, Some("friend"), EdgeDir::To).unwrap();

    let report = walk(&mut rt, "init");
    assert_eq!(report.report, vec![json!({}), json!({"name": null})]);
}

#[test]
fn default_traversal_is_breadth_first() {
    let mut rt = runtime(&format!("{PLACE} walker init {{ place {{ report here.label; }} }}"));
    tree(&mut rt);
    let report = walk(&mut rt, "init");
    assert_eq!(report.report, vec![json!("a"), json!("b"), json!("c")]);
}

#[test]
fn take_dfs_goes_deep_first() {
    let mut rt = runtime(&format!("{PLACE} walker init {{ take:dfs -->; place {{ report here.label; }} }}"));
    tree(&mut rt);
    let report = walk(&mut rt, "init");
    assert_eq!(report.report, vec![json!("a"), json!("c"), json!("b")]);
}

#[test]
fn take_else_runs_when_nothing_new() {
    let report = run(r#"walker init { take --> else { report "leaf"; } }"#);
    assert_eq!(report.report, vec![json!("leaf")]);
}

#[test]
fn ignore_excludes_nodes() {
    let mut rt = runtime(&format!(
        r#"{PLACE} walker init {{ with entry {{ ignore --> node::place(label == "b"); }} place {{ report here.label; }} }}"#
    ));
    tree(&mut rt);
    let report = walk(&mut rt, "init");
    assert_eq!(report.report, vec![json!("a"), json!("c")]);
}

#[test]
fn disengage_still_runs_node_exit_once() {
    let mut rt = runtime(
        "node place { has label; can bye with exit { report label; } } \
         walker init { place { disengage; } }",
    );
    tree(&mut rt);
    let report = walk(&mut rt, "init");
    assert_eq!(report.report, vec![json!("a")]);
    assert!(!report.yielded);
}

#[test]
fn walker_exit_block_runs_once_at_the_end() {
    let mut rt = runtime(&format!(
        "{PLACE} walker init {{ has count = 0; place {{ count += 1; }} with exit {{ report count; }} }}"
    ));
    tree(&mut rt);
    let report = walk(&mut rt, "init");
    assert_eq!(report.report, vec![json!(3)]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Abilities
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn visit_triggers_node_and_walker_abilities() {
    let mut rt = runtime(
        r#"
        node person {
            has name;
            can hello with entry { report "hello " + name; }
            can shout { report name.str::upper; }
        }
        walker init {
            can greet with person entry { report "greet " + here.name; }
            person { here::shout; }
        }
        "#,
    );
    let root = rt.root();
    let p = rt.spawn_node("person", ctx(&[("name", Value::str("ann"))])).unwrap();
    rt.connect(root, p, None, EdgeDir::To).unwrap();

    let report = walk(&mut rt, "init");
    assert_eq!(report.report, vec![json!("hello ann"), json!("greet ann"), json!("ANN")]);
}

#[test]
fn access_list_limits_who_triggers() {
    let mut rt = runtime(
        r#"
        node person { has name; can only_for_other with other entry { report "no"; } }
        walker other { }
        walker init { }
        "#,
    );
    let root = rt.root();
    let p = rt.spawn_node("person", IndexMap::new()).unwrap();
    rt.connect(root, p, None, EdgeDir::To).unwrap();

    assert!(walk(&mut rt, "init").report.is_empty());
    assert_eq!(walk(&mut rt, "other").report, vec![json!("no")]);
}

#[test]
fn preset_builtin_writes_out_field() {
    let mut rt = runtime(
        "node person { has name, greeting; can std.json_to_str::name::>greeting with entry; } \
         walker init { person { report here.greeting; } }",
    );
    let root = rt.root();
    let p = rt.spawn_node("person", ctx(&[("name", Value::str("ann"))])).unwrap();
    rt.connect(root, p, None, EdgeDir::To).unwrap();

    let report = walk(&mut rt, "init");
    assert_eq!(report.report, vec![json!("\"ann\"")]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Spawn & connect
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn filter_by_field_comparison() {
    let mut rt = runtime(
        "node person { has age; } \
         walker init { with entry { for p in --> node::person(age > 18) { report p.age; } } }",
    );
    let root = rt.root();
    for age in [15, 20, 25] {
        let p = rt.spawn_node("person", ctx(&[("age", Value::Int(age))])).unwrap();
        rt.connect(root, p, None, EdgeDir::To).unwrap();
    }
    let report = walk(&mut rt, "init");
    assert_eq!(report.report, vec![json!(20), json!(25)]);
}

#[test]
fn spawned_nodes_are_connected_to_location() {
    let report = run(
        r#"
        node person { has name; }
        walker init {
            with entry {
                spawn here ++> node::person(name="a");
                spawn here ++> node::person(name="b");
            }
            person { report here.name; }
        }
        "#,
    );
    assert_eq!(report.report, vec![json!("a"), json!("b")]);
}

#[test]
fn spawn_ctx_may_set_undeclared_fields() {
    let report = run(
        r#"
        node person { has name; }
        walker init { with entry { p = spawn node::person(name="a", nick="x"); report p.context; } }
        "#,
    );
    assert_eq!(report.report, vec![json!({"name": "a", "nick": "x"})]);
}

#[test]
fn assigning_undeclared_field_is_runtime_error() {
    let report = run(
        r#"
        node person { has name; }
        walker init { with entry { p = spawn node::person(name="a"); p.age = 3; report p.context; } }
        "#,
    );
    assert_eq!(report.report, vec![json!({"name": "a"})]);
    assert_eq!(report.outcome, Outcome::Warned);
    assert!(
        report.errors[0].contains("Creating variable age in graph element is not allowed"),
        "{:?}",
        report.errors
    );
}

#[test]
fn edge_filter_and_casts() {
    let report = run(
        r#"
        node person { has name; }
        edge likes { has weight; }
        walker init {
            with entry {
                spawn here +[likes(weight=3)]+> node::person(name="a");
                spawn here +[likes(weight=1)]+> node::person(name="b");
                n = -[likes(weight > 2)]->;
                report n.length;
                e = n.edge;
                report e.weight;
                report e.node.length;
            }
            disengage;
        }
        "#,
    );
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.report, vec![json!(1), json!(3), json!(2)]);
}

#[test]
fn detach_removes_edge() {
    let report = run(
        r#"
        node person { has name; }
        walker init {
            with entry {
                a = spawn here ++> node::person(name="a");
                here !--> a;
                n = -->;
                report n.length;
            }
        }
        "#,
    );
    assert_eq!(report.report, vec![json!(0)]);
}

#[test]
fn graph_spawn_returns_anchor() {
    let report = run(
        r#"
        node person { has name; }
        graph family {
            has anchor head;
            spawn {
                head = spawn node::person(name="head");
                spawn head ++> node::person(name="kid");
            }
        }
        walker init {
            with entry {
                g = spawn here ++> graph::family;
                report g.name;
            }
            person { report here.name; }
        }
        "#,
    );
    assert_eq!(report.report, vec![json!("head"), json!("head"), json!("kid")]);
}

#[test]
fn walker_spawn_evaluates_to_anchor() {
    let mut rt = runtime(&format!(
        "{PLACE} \
         walker counter {{ has anchor total = 0; place {{ total += 1; }} }} \
         walker init {{ with entry {{ report spawn here walker::counter(total=10); }} disengage; }}"
    ));
    tree(&mut rt);
    let report = walk(&mut rt, "init");
    assert_eq!(report.report, vec![json!(13)]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Yield, destroy & references
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn yielded_walker_resumes_with_its_fields() {
    let mut rt = runtime("walker counter { has n = 0; n += 1; report n; yield; }");
    let first = walk(&mut rt, "counter");
    assert_eq!(first.report, vec![json!(1)]);
    assert!(first.yielded);

    let second = walk(&mut rt, "counter");
    assert_eq!(second.report, vec![json!(2)]);
    assert!(second.yielded);
}

#[test]
fn yield_skips_exit_block() {
    let mut rt = runtime(r#"walker w { yield; with exit { report "exit"; } }"#);
    let report = walk(&mut rt, "w");
    assert!(report.report.is_empty());
    assert!(report.yielded);
}

#[test]
fn destroy_takes_effect_after_step() {
    let mut rt = runtime(
        r#"
        node person { has name; }
        walker init {
            with entry {
                a = spawn here ++> node::person(name="a");
                spawn here ++> node::person(name="b");
                destroy a;
                n = -->;
                report n.length;
            }
            disengage;
        }
        walker count { n = -->; report n.length; disengage; }
        "#,
    );
    assert_eq!(walk(&mut rt, "init").report, vec![json!(2)]);
    assert_eq!(walk(&mut rt, "count").report, vec![json!(1)]);
}

#[test]
fn reading_a_destroyed_node_is_runtime_error() {
    let report = run(
        r#"
        node person { has name; }
        walker init {
            has keep;
            with entry {
                keep = spawn here ++> node::person(name="a");
                k = keep;
                destroy k;
            }
            with exit { report keep.name; }
        }
        "#,
    );
    assert_eq!(report.report, vec![json!(null)]);
    assert!(report.success);
    assert!(
        report.errors.iter().any(|e| e.contains("no longer exists")),
        "{:?}",
        report.errors
    );
}

#[test]
fn ref_and_deref_round_trip() {
    let report = run(
        r#"
        node person { has name; }
        walker init {
            with entry {
                p = spawn node::person(name="ann");
                id = &p;
                q = *id;
                report q.name;
                report id == p.info["jid"];
            }
        }
        "#,
    );
    assert_eq!(report.report, vec![json!("ann"), json!(true)]);
}

#[test]
fn deref_of_unknown_id_is_runtime_error() {
    let report = run(r#"walker init { x = *"urn:uuid:00000000-0000-0000-0000-000000000000"; report x; }"#);
    assert_eq!(report.report, vec![json!(null)]);
    assert!(report.errors[0].contains("not valid reference"), "{:?}", report.errors);
}

#[test]
fn reporting_a_node_reports_its_info() {
    let mut rt = runtime("node person { has name; } walker init { person { report here; } }");
    let root = rt.root();
    let p = rt.spawn_node("person", ctx(&[("name", Value::str("ann"))])).unwrap();
    rt.connect(root, p, None, EdgeDir::To).unwrap();

    let report = walk(&mut rt, "init");
    assert_eq!(report.report[0]["name"], json!("person"));
    assert_eq!(report.report[0]["jid"], json!(p.urn()));
    assert_eq!(report.report[0]["context"], json!({"name": "ann"}));
}
