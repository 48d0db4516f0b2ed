//! Core tree-walking evaluator.
//!
//! One [`Evaluator`] runs one top-level request against a borrowed
//! registry and object store. The current [`Frame`] holds the scope, the
//! node being visited, the visiting walker and the output collected so far;
//! ability calls and walker spawns swap in a fresh frame and fold its
//! output back into the caller's when they return.
//!
//! Runtime errors do not unwind. [`Evaluator::rt_error`] logs the error,
//! appends it to the frame output and returns `Ok`, and the caller carries
//! on with a null or the original operand. Inside a `try` body the same
//! call returns [`EvalError::Raised`] instead.

mod builtin;
mod call;
mod expr;
mod graph;
mod report;
mod stmt;
mod walker;

use std::mem;

use indexmap::IndexMap;
use jac_types::{AstNode, Span};

use crate::architype::{Architype, Registry};
use crate::binding::{Binding, BindingError, SlotHost};
use crate::builtins::ActionHost;
use crate::config::RunConfig;
use crate::error::{EvalError, EvalResult, ExceptionInfo};
use crate::graph::{ArchKind, GraphObject, ObjectBody, WalkerState};
use crate::scope::{Scope, ScopeRef};
use crate::store::ObjectStore;
use crate::value::{ObjectId, Value};

/// Per-request counters shared by every frame of one run.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Loop iterations, ability calls and walker steps so far.
    pub loop_count: u64,
    /// Current ability/spawn nesting.
    pub call_depth: usize,
    /// Set while evaluating the target of an assignment.
    pub assign_mode: bool,
    /// Number of enclosing `try` bodies.
    pub try_depth: usize,
}

/// Everything a run produces besides graph mutations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output {
    pub report: Vec<Value>,
    pub status_code: Option<i64>,
    pub custom: Option<Value>,
    /// Formatted runtime errors.
    pub errors: Vec<String>,
    /// Objects to destroy when the current step ends.
    pub destroy: Vec<ObjectId>,
}

impl Output {
    /// Fold a callee's output into this one: reports and errors append,
    /// status and custom overwrite when the callee set them.
    pub fn absorb(&mut self, other: Output) {
        self.report.extend(other.report);
        self.errors.extend(other.errors);
        if other.status_code.is_some() {
            self.status_code = other.status_code;
        }
        if other.custom.is_some() {
            self.custom = other.custom;
        }
        for id in other.destroy {
            if !self.destroy.contains(&id) {
                self.destroy.push(id);
            }
        }
    }
}

/// Execution context of the code currently running.
#[derive(Debug)]
pub(crate) struct Frame {
    pub scope: ScopeRef,
    /// Node (or edge) the code runs against: `here`.
    pub here: Option<ObjectId>,
    /// The visiting walker: `visitor`.
    pub walker: Option<ObjectId>,
    /// Label used in runtime-error positions.
    pub name: String,
    pub output: Output,
}

impl Frame {
    pub fn new(scope: ScopeRef, here: Option<ObjectId>, walker: Option<ObjectId>, name: &str) -> Self {
        Self {
            scope,
            here,
            walker,
            name: name.to_string(),
            output: Output::default(),
        }
    }
}

/// How a statement finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    /// `skip`: abandon the rest of the current body.
    Skip,
    /// `disengage` or `yield`: abandon the rest of the current step.
    Stop,
}

pub struct Evaluator<'a> {
    pub(crate) registry: &'a Registry,
    pub(crate) store: &'a mut dyn ObjectStore,
    pub(crate) config: &'a RunConfig,
    pub(crate) ctx: RunContext,
    pub(crate) frame: Frame,
    /// Yielded walkers of spawns made outside any walker, by name.
    pub(crate) yielded: IndexMap<String, ObjectId>,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a Registry, store: &'a mut dyn ObjectStore, config: &'a RunConfig) -> Self {
        Self {
            registry,
            store,
            config,
            ctx: RunContext::default(),
            frame: Frame::new(Scope::root(None), None, None, "init"),
            yielded: IndexMap::new(),
        }
    }

    /// Output collected by the outermost frame.
    pub fn output(&self) -> &Output {
        &self.frame.output
    }

    pub fn take_output(&mut self) -> Output {
        mem::take(&mut self.frame.output)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Errors
    // ══════════════════════════════════════════════════════════════════════

    /// Report a runtime error at `node`. Raises only inside `try`.
    pub(crate) fn rt_error(&mut self, node: &AstNode, msg: impl Into<String>) -> EvalResult<()> {
        self.rt_error_at(node.span, &node.kind, msg.into())
    }

    pub(crate) fn rt_error_at(&mut self, span: Span, rule: &str, msg: String) -> EvalResult<()> {
        if self.ctx.try_depth > 0 {
            return Err(EvalError::Raised(Box::new(ExceptionInfo {
                kind: "RuntimeError".to_string(),
                module: self.config.file_name.clone(),
                args: vec![Value::Str(msg.clone())],
                msg,
                line: span.start_line,
                col: span.start_col,
                name: self.frame.name.clone(),
                rule: rule.to_string(),
            })));
        }
        let line = format!(
            "{}:{} - line {}, col {} - rule {} - {}",
            self.config.file_name, self.frame.name, span.start_line, span.start_col, rule, msg
        );
        tracing::error!(target: "jac::runtime", "{line}");
        self.frame.output.errors.push(line);
        Ok(())
    }

    pub(crate) fn rt_warn(&self, node: &AstNode, msg: &str) {
        tracing::warn!(
            target: "jac::runtime",
            "{}:{} - line {}, col {} - rule {} - {}",
            self.config.file_name,
            self.frame.name,
            node.span.start_line,
            node.span.start_col,
            node.kind,
            msg
        );
    }

    /// Unwrap a binding result, turning a failure into a runtime error and
    /// a null binding.
    pub(crate) fn bind(&mut self, node: &AstNode, result: Result<Binding, BindingError>) -> EvalResult<Binding> {
        match result {
            Ok(binding) => Ok(binding),
            Err(e) => {
                self.rt_error(node, e.to_string())?;
                Ok(Binding::value(Value::Null))
            }
        }
    }

    /// Count one unit against the shared loop budget.
    ///
    /// Returns `false` once the budget is spent; the caller must stop.
    pub(crate) fn tick(&mut self, node: &AstNode) -> EvalResult<bool> {
        self.ctx.loop_count += 1;
        if self.ctx.loop_count > self.config.loop_limit {
            self.rt_error(node, format!("Hit loop limit [{}]!", self.config.loop_limit))?;
            return Ok(false);
        }
        Ok(true)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Frames
    // ══════════════════════════════════════════════════════════════════════

    /// Run `f` in `frame`, then restore the caller's frame and absorb the
    /// callee's output, whether `f` succeeded or not.
    pub(crate) fn with_frame<T>(
        &mut self,
        frame: Frame,
        f: impl FnOnce(&mut Self) -> EvalResult<T>,
    ) -> EvalResult<T> {
        let saved = mem::replace(&mut self.frame, frame);
        let result = f(self);
        let callee = mem::replace(&mut self.frame, saved);
        self.frame.output.absorb(callee.output);
        result
    }

    /// A frame sharing the current `here` and walker with a new scope.
    pub(crate) fn sub_frame(&self, scope: ScopeRef, name: &str) -> Frame {
        Frame::new(scope, self.frame.here, self.frame.walker, name)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Objects
    // ══════════════════════════════════════════════════════════════════════

    pub(crate) fn object(&self, id: ObjectId) -> Option<&GraphObject> {
        self.store.get(id)
    }

    pub(crate) fn is_node(&self, id: ObjectId) -> bool {
        crate::graph::is_node(&*self.store, id)
    }

    /// The architype an object was created from.
    pub(crate) fn arch_of(&self, id: ObjectId) -> Option<&'a Architype> {
        let registry: &'a Registry = self.registry;
        let obj = self.store.get(id)?;
        let kind = match obj.body {
            ObjectBody::Node(_) => ArchKind::Node,
            ObjectBody::Edge(_) => ArchKind::Edge,
            ObjectBody::Walker(_) => ArchKind::Walker,
        };
        registry.get(kind, &obj.name)
    }

    pub(crate) fn walker_state(&self, id: ObjectId) -> Option<&WalkerState> {
        self.store.get(id).and_then(GraphObject::as_walker)
    }

    pub(crate) fn walker_state_mut(&mut self, id: ObjectId) -> Option<&mut WalkerState> {
        self.store.get_mut(id).and_then(GraphObject::as_walker_mut)
    }

    /// Create a node, edge or walker with its fields initialised.
    ///
    /// Every declared field starts as null; defaults are then evaluated in
    /// declaration order with the new object as the scope subject.
    pub(crate) fn create_object(
        &mut self,
        kind: ArchKind,
        name: &str,
        at: &AstNode,
    ) -> EvalResult<Option<ObjectId>> {
        let registry: &'a Registry = self.registry;
        let Some(arch) = registry.get(kind, name) else {
            self.rt_error(at, format!("{} {name} not found", kind.as_str()))?;
            return Ok(None);
        };
        let mut obj = match kind {
            ArchKind::Node => GraphObject::node(name, &self.config.realm),
            ArchKind::Edge => GraphObject::edge(name, &self.config.realm),
            ArchKind::Walker => GraphObject::walker(name, &self.config.realm),
            ArchKind::Graph => {
                self.rt_error(at, format!("graph {name} cannot be created as an object"))?;
                return Ok(None);
            }
        };
        for field in &arch.fields {
            obj.context.insert(field.name.clone(), Value::Null);
        }
        let id = obj.id;
        self.store.save(obj);
        tracing::trace!(target: "jac::graph", object = %id, kind = kind.as_str(), name, "created");

        let defaults: Vec<_> = arch
            .fields
            .iter()
            .filter_map(|f| f.default.as_ref().map(|d| (f.name.as_str(), d)))
            .collect();
        if !defaults.is_empty() {
            let frame = self.sub_frame(Scope::root(Some(id)), name);
            self.with_frame(frame, |ev| {
                for (field, default) in defaults {
                    let value = ev.eval(default)?.detach();
                    if let Err(e) = ev.set_field(id, field, value) {
                        ev.rt_error(default, e.to_string())?;
                    }
                }
                Ok(())
            })?;
        }
        Ok(Some(id))
    }

    /// Write a field, bypassing the declared-field check. Spawn contexts
    /// write this way.
    pub(crate) fn force_field(&mut self, id: ObjectId, name: &str, value: Value) -> Result<(), BindingError> {
        let obj = self.store.get_mut(id).ok_or(BindingError::MissingObject(id))?;
        obj.context.insert(name.to_string(), value);
        Ok(())
    }

    /// Destroy everything queued on the current frame.
    pub(crate) fn process_destroy(&mut self) {
        for id in mem::take(&mut self.frame.output.destroy) {
            if !self.store.has(id) {
                continue;
            }
            if let Err(e) = crate::graph::destroy_object(&mut *self.store, id) {
                tracing::warn!(target: "jac::graph", object = %id, "destroy failed: {e}");
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Host traits
// ══════════════════════════════════════════════════════════════════════════

impl SlotHost for Evaluator<'_> {
    fn field(&self, id: ObjectId, name: &str) -> Result<Value, BindingError> {
        let obj = self.store.get(id).ok_or(BindingError::MissingObject(id))?;
        obj.context
            .get(name)
            .cloned()
            .ok_or_else(|| BindingError::UnknownField(name.to_string()))
    }

    /// Nodes and edges only accept their declared fields; walkers take any.
    fn set_field(&mut self, id: ObjectId, name: &str, value: Value) -> Result<(), BindingError> {
        let obj = self.store.get_mut(id).ok_or(BindingError::MissingObject(id))?;
        if obj.as_walker().is_none() && !obj.context.contains_key(name) {
            return Err(BindingError::UndeclaredField(name.to_string()));
        }
        obj.context.insert(name.to_string(), value);
        Ok(())
    }

    fn global(&self, name: &str) -> Option<Value> {
        self.store.get_global(name).cloned()
    }

    fn set_global(&mut self, name: &str, value: Value) {
        self.store.save_global(name, value);
    }
}

impl ActionHost for Evaluator<'_> {
    fn report(&self) -> Vec<Value> {
        self.frame.output.report.clone()
    }
}
