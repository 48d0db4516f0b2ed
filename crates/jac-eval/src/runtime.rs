//! Runtime: one program's registry bound to an object store.
//!
//! The façade callers use. It owns the root node, seeds program globals,
//! runs walkers as top-level requests and turns each run's output into a
//! [`RunReport`].

use std::mem;

use indexmap::IndexMap;
use jac_types::ast::kind;
use jac_types::{AstNode, Span};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::architype::{Registry, GENERIC_EDGE, ROOT_NODE};
use crate::config::{ConfigError, RunConfig};
use crate::error::EvalError;
use crate::evaluator::Evaluator;
use crate::graph::{self, ArchKind, EdgeDir, GraphError};
use crate::store::{ObjectStore, StoreError};
use crate::value::{ObjectId, Value};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("walker {0} not found")]
    UnknownWalker(String),
    #[error("{0} {1} not found")]
    UnknownArchitype(&'static str, String),
    #[error("{0} is not a node")]
    NotANode(ObjectId),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// No runtime errors.
    Clean,
    /// Ran to the end with runtime errors.
    Warned,
    /// Stopped by an assertion failure or an uncaught raised error.
    Aborted { message: String },
}

/// Everything one walker run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub success: bool,
    pub report: Vec<serde_json::Value>,
    /// `urn:uuid:` id of the node the walker last visited.
    pub final_node: Option<String>,
    pub yielded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_custom: Option<serde_json::Value>,
    pub errors: Vec<String>,
    pub outcome: Outcome,
}

pub struct Runtime<S: ObjectStore> {
    registry: Registry,
    store: S,
    config: RunConfig,
    root: ObjectId,
    /// Walkers parked by `yield` in a top-level run, by name.
    yielded: IndexMap<String, ObjectId>,
    init_errors: Vec<String>,
}

impl<S: ObjectStore> Runtime<S> {
    /// Bind `registry` to `store` with a fresh root node.
    pub fn new(registry: Registry, store: S) -> Result<Self, RuntimeError> {
        let config = RunConfig::from_store(&store)?;
        let mut runtime = Self {
            registry,
            store,
            config,
            root: ObjectId::new(),
            yielded: IndexMap::new(),
            init_errors: Vec::new(),
        };
        let at = synthetic(ROOT_NODE);
        let mut ev = Evaluator::new(&runtime.registry, &mut runtime.store, &runtime.config);
        let root = ev.create_object(ArchKind::Node, ROOT_NODE, &at)?;
        runtime.init_errors = ev.take_output().errors;
        runtime.root = root.ok_or_else(|| RuntimeError::UnknownArchitype("node", ROOT_NODE.to_string()))?;
        runtime.seed_globals()?;
        Ok(runtime)
    }

    /// Bind `registry` to a store that already holds the graph rooted at
    /// `root`.
    pub fn attach(registry: Registry, store: S, root: ObjectId) -> Result<Self, RuntimeError> {
        if !graph::is_node(&store, root) {
            return Err(RuntimeError::NotANode(root));
        }
        let config = RunConfig::from_store(&store)?;
        let mut runtime = Self {
            registry,
            store,
            config,
            root,
            yielded: IndexMap::new(),
            init_errors: Vec::new(),
        };
        runtime.seed_globals()?;
        Ok(runtime)
    }

    /// Evaluate the program's global defaults the store does not have yet.
    fn seed_globals(&mut self) -> Result<(), RuntimeError> {
        let mut ev = Evaluator::new(&self.registry, &mut self.store, &self.config);
        for (name, expr) in self.registry.globals() {
            if ev.store.get_global(name).is_some() {
                continue;
            }
            let value = ev.eval_value(expr)?;
            ev.store.save_global(name, value);
        }
        self.init_errors.extend(ev.take_output().errors);
        Ok(())
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RunConfig) {
        self.config = config;
    }

    /// Runtime errors raised while creating the root and seeding globals.
    pub fn init_errors(&self) -> &[String] {
        &self.init_errors
    }

    /// Create a node of architype `name` with `ctx` written into its fields.
    pub fn spawn_node(&mut self, name: &str, ctx: IndexMap<String, Value>) -> Result<ObjectId, RuntimeError> {
        if self.registry.get(ArchKind::Node, name).is_none() {
            return Err(RuntimeError::UnknownArchitype("node", name.to_string()));
        }
        let at = synthetic(name);
        let mut ev = Evaluator::new(&self.registry, &mut self.store, &self.config);
        let id = ev
            .create_object(ArchKind::Node, name, &at)?
            .ok_or_else(|| RuntimeError::UnknownArchitype("node", name.to_string()))?;
        for (field, value) in ctx {
            if let Some(obj) = ev.store.get_mut(id) {
                obj.context.insert(field, value);
            }
        }
        Ok(id)
    }

    /// Connect `a` to `b` with a new edge of architype `edge`, or a generic
    /// one.
    pub fn connect(
        &mut self,
        a: ObjectId,
        b: ObjectId,
        edge: Option<&str>,
        dir: EdgeDir,
    ) -> Result<ObjectId, RuntimeError> {
        let name = edge.unwrap_or(GENERIC_EDGE);
        if self.registry.get(ArchKind::Edge, name).is_none() {
            return Err(RuntimeError::UnknownArchitype("edge", name.to_string()));
        }
        let at = synthetic(name);
        let mut ev = Evaluator::new(&self.registry, &mut self.store, &self.config);
        let id = ev
            .create_object(ArchKind::Edge, name, &at)?
            .ok_or_else(|| RuntimeError::UnknownArchitype("edge", name.to_string()))?;
        graph::attach_edge(&mut self.store, a, b, id, dir)?;
        Ok(id)
    }

    /// Run walker `name` from `start` (the root by default).
    ///
    /// Unknown walkers and non-node starts fail up front. Everything that
    /// goes wrong during the run lands in the report instead.
    pub fn run_walker(
        &mut self,
        name: &str,
        start: Option<ObjectId>,
        ctx: IndexMap<String, Value>,
    ) -> Result<RunReport, RuntimeError> {
        if self.registry.get(ArchKind::Walker, name).is_none() {
            return Err(RuntimeError::UnknownWalker(name.to_string()));
        }
        let start = start.unwrap_or(self.root);
        if !graph::is_node(&self.store, start) {
            return Err(RuntimeError::NotANode(start));
        }
        tracing::debug!(target: "jac::runtime", walker = name, start = %start, "run");

        let mut ev = Evaluator::new(&self.registry, &mut self.store, &self.config);
        ev.yielded = mem::take(&mut self.yielded);
        let result = ev.run_request(name, start, ctx);
        ev.process_destroy();
        let output = ev.take_output();
        self.yielded = mem::take(&mut ev.yielded);

        let (outcome, end) = match result {
            Err(e) => {
                tracing::error!(target: "jac::runtime", walker = name, "run aborted: {e}");
                (Outcome::Aborted { message: e.to_string() }, Default::default())
            }
            Ok(end) if output.errors.is_empty() => (Outcome::Clean, end),
            Ok(end) => (Outcome::Warned, end),
        };
        Ok(RunReport {
            success: !matches!(outcome, Outcome::Aborted { .. }),
            report: output.report.iter().map(Value::to_json).collect(),
            final_node: end.final_node.map(|id| id.urn()),
            yielded: end.yielded,
            status_code: output.status_code,
            report_custom: output.custom.as_ref().map(Value::to_json),
            errors: output.errors,
            outcome,
        })
    }

    /// Flush pending store writes.
    pub fn commit(&mut self) -> Result<usize, RuntimeError> {
        Ok(self.store.commit()?)
    }
}

/// Position-less node used for errors raised outside any source construct.
fn synthetic(name: &str) -> AstNode {
    AstNode::leaf(kind::NAME, name, Span::default())
}
