//! Integration tests for the `Runtime` façade.
//!
//! - request validation (unknown walker, non-node start)
//! - walker context passed by the caller
//! - run report serialization
//! - committing a graph and re-attaching it to a fresh store
//! - run configuration read from the store

use indexmap::IndexMap;
use jac_eval::{
    EdgeDir, MemoryStore, ObjectStore, Outcome, Registry, RunConfig, Runtime, RuntimeError, Value,
};
use jac_parser::parse_source;
use jac_types::SourceFile;
use pretty_assertions::assert_eq;
use serde_json::json;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn load(source: &str) -> Registry {
    let sf = SourceFile::new("test.jac", source);
    let program = parse_source(&sf).unwrap_or_else(|e| panic!("parse errors:\n{e}"));
    Registry::load(&program, &sf).unwrap_or_else(|e| panic!("load errors:\n{e}"))
}

fn runtime(source: &str) -> Runtime<MemoryStore> {
    Runtime::new(load(source), MemoryStore::new()).expect("failed to create runtime")
}

const PEOPLE: &str = r#"
node person { has name; }
walker names { person { report here.name; } }
walker greet { has greeting = "hi"; report greeting; disengage; }
"#;

// ══════════════════════════════════════════════════════════════════════════════
// Requests
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn unknown_walker_is_rejected() {
    let mut rt = runtime(PEOPLE);
    let err = rt.run_walker("nope", None, IndexMap::new()).unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownWalker(ref name) if name == "nope"));
}

#[test]
fn start_must_be_a_node() {
    let mut rt = runtime("node n; edge likes; walker w { }");
    let a = rt.root();
    let b = rt.spawn_node("n", IndexMap::new()).unwrap();
    let edge = rt.connect(a, b, Some("likes"), EdgeDir::To).unwrap();
    let err = rt.run_walker("w", Some(edge), IndexMap::new()).unwrap_err();
    assert!(matches!(err, RuntimeError::NotANode(id) if id == edge));
}

#[test]
fn unknown_architypes_are_rejected() {
    let mut rt = runtime(PEOPLE);
    assert!(matches!(
        rt.spawn_node("ghost", IndexMap::new()),
        Err(RuntimeError::UnknownArchitype("node", _))
    ));
    let root = rt.root();
    assert!(matches!(
        rt.connect(root, root, Some("ghost"), EdgeDir::To),
        Err(RuntimeError::UnknownArchitype("edge", _))
    ));
}

#[test]
fn caller_context_overrides_walker_defaults() {
    let mut rt = runtime(PEOPLE);
    let mut ctx = IndexMap::new();
    ctx.insert("greeting".to_string(), Value::str("hello"));
    let report = rt.run_walker("greet", None, ctx).unwrap();
    assert_eq!(report.report, vec![json!("hello")]);

    let report = rt.run_walker("greet", None, IndexMap::new()).unwrap();
    assert_eq!(report.report, vec![json!("hi")]);
}

#[test]
fn run_from_explicit_start() {
    let mut rt = runtime(PEOPLE);
    let root = rt.root();
    let mut ctx = IndexMap::new();
    ctx.insert("name".to_string(), Value::str("ann"));
    let ann = rt.spawn_node("person", ctx).unwrap();
    rt.connect(root, ann, None, EdgeDir::To).unwrap();

    let report = rt.run_walker("names", Some(ann), IndexMap::new()).unwrap();
    assert_eq!(report.report, vec![json!("ann")]);
    assert_eq!(report.final_node, Some(ann.urn()));
}

// ══════════════════════════════════════════════════════════════════════════════
// Reports
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn run_report_serializes() {
    let mut rt = runtime(PEOPLE);
    let report = rt.run_walker("greet", None, IndexMap::new()).unwrap();
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["success"], json!(true));
    assert_eq!(value["report"], json!(["hi"]));
    assert_eq!(value["outcome"], json!({"status": "clean"}));
    assert!(value.get("status_code").is_none());
}

#[test]
fn aborted_outcome_carries_message() {
    let mut rt = runtime("walker w { assert false; }");
    let report = rt.run_walker("w", None, IndexMap::new()).unwrap();
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["outcome"]["status"], json!("aborted"));
    assert!(value["outcome"]["message"].as_str().unwrap().starts_with("assertion failed"));
    assert!(!report.success);
}

#[test]
fn walkers_are_cleaned_up_after_a_run() {
    let mut rt = runtime(PEOPLE);
    let before = rt.store().len();
    rt.run_walker("greet", None, IndexMap::new()).unwrap();
    assert_eq!(rt.store().len(), before);
}

// ══════════════════════════════════════════════════════════════════════════════
// Persistence
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn committed_graph_reattaches_to_new_store() {
    let mut rt = runtime(PEOPLE);
    let root = rt.root();
    let mut ctx = IndexMap::new();
    ctx.insert("name".to_string(), Value::str("ann"));
    let ann = rt.spawn_node("person", ctx).unwrap();
    let edge = rt.connect(root, ann, None, EdgeDir::To).unwrap();
    assert!(rt.commit().unwrap() >= 3);
    assert_eq!(rt.store().pending(), 0);

    let mut fresh = MemoryStore::new();
    for id in [root, ann, edge] {
        let json = rt.store().snapshot(id).expect("object was committed").to_string();
        assert_eq!(fresh.load_snapshot(&json).unwrap(), id);
    }
    let mut reattached = Runtime::attach(load(PEOPLE), fresh, root).unwrap();
    let report = reattached.run_walker("names", None, IndexMap::new()).unwrap();
    assert_eq!(report.report, vec![json!("ann")]);
}

#[test]
fn attach_requires_a_node_root() {
    let rt = runtime(PEOPLE);
    let missing = rt.root();
    let err = Runtime::attach(load(PEOPLE), MemoryStore::new(), missing).err();
    assert!(matches!(err, Some(RuntimeError::NotANode(id)) if id == missing));
}

#[test]
fn globals_are_seeded_once() {
    let mut store = MemoryStore::new();
    store.save_global("limit", Value::Int(9));
    let rt = Runtime::new(load("global limit = 5, label = \"x\";"), store).unwrap();
    assert_eq!(rt.store().get_global("limit"), Some(&Value::Int(9)));
    assert_eq!(rt.store().get_global("label"), Some(&Value::str("x")));
}

#[test]
fn store_globals_are_visible_to_walkers() {
    let mut rt = runtime("global limit = 5; walker w { report global.limit; }");
    rt.store_mut().save_global("limit", Value::Int(11));
    let report = rt.run_walker("w", None, IndexMap::new()).unwrap();
    assert_eq!(report.report, vec![json!(11)]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Configuration
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn run_config_is_read_from_store() {
    let mut store = MemoryStore::new();
    store.save_global(
        jac_eval::config::RUN_CONFIG_GLOBAL,
        Value::from_json(&json!({"loop_limit": 3})),
    );
    let rt = Runtime::new(load("walker w { }"), store).unwrap();
    assert_eq!(rt.config().loop_limit, 3);
    assert_eq!(rt.config().max_call_depth, RunConfig::default().max_call_depth);
}

#[test]
fn loop_limit_from_config_applies() {
    let mut rt = runtime("walker w { while true { } }");
    rt.set_config(RunConfig {
        loop_limit: 5,
        ..RunConfig::default()
    });
    let report = rt.run_walker("w", None, IndexMap::new()).unwrap();
    assert_eq!(report.outcome, Outcome::Warned);
    assert_eq!(report.errors.len(), 1, "{:?}", report.errors);
}
