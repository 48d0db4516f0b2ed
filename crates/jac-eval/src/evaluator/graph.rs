//! Graph operators: connect and detach, node/edge references with their
//! filters, and node and graph spawns.

use jac_types::ast::kind;
use jac_types::AstNode;

use super::{Evaluator, Frame};
use crate::architype::GENERIC_EDGE;
use crate::binding::Binding;
use crate::error::EvalResult;
use crate::graph::{self, ArchKind, EdgeDir, EdgeQuery};
use crate::scope::Scope;
use crate::value::{ObjectId, Value};

impl<'a> Evaluator<'a> {
    // ══════════════════════════════════════════════════════════════════════
    // Connect & detach
    // ══════════════════════════════════════════════════════════════════════

    /// `a ++> b`, `a <++ b`, `a <++> b`, `a +[e]+> b`, and the detaching
    /// form `a !--> b`. Either side may be a list of nodes. Evaluates to
    /// the left operand.
    pub(crate) fn eval_connect(&mut self, node: &AstNode) -> EvalResult<Binding> {
        let Some(left) = node.kid(0) else {
            return Ok(Binding::value(Value::Null));
        };
        let base = self.eval(left)?;
        match &node.kids[1..] {
            [op, right] if op.is(kind::CONNECT_OP) => {
                let target = self.eval_value(right)?;
                let (Some(bases), Some(targets)) = (
                    self.node_ids(left, &base.value)?,
                    self.node_ids(right, &target)?,
                ) else {
                    return Ok(base);
                };
                for &a in &bases {
                    for &b in &targets {
                        self.connect_pair(op, a, b)?;
                    }
                }
            }
            [_, edge_ref, right] => {
                let target = self.eval_value(right)?;
                let (Some(bases), Some(targets)) = (
                    self.node_ids(left, &base.value)?,
                    self.node_ids(right, &target)?,
                ) else {
                    return Ok(base);
                };
                for &a in &bases {
                    for edge in self.edge_ref_edges(edge_ref, a)? {
                        let other = graph::opposing(&*self.store, edge, a).ok().flatten();
                        if other.is_some_and(|o| targets.contains(&o)) {
                            if let Err(e) = graph::detach_edge(&mut *self.store, edge) {
                                self.rt_error(edge_ref, e.to_string())?;
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(base)
    }

    /// Attach a fresh edge built from `op` between `a` and `b`.
    fn connect_pair(&mut self, op: &AstNode, a: ObjectId, b: ObjectId) -> EvalResult<Option<ObjectId>> {
        let Some((edge, dir)) = self.new_edge(op)? else {
            return Ok(None);
        };
        if let Err(e) = graph::attach_edge(&mut *self.store, a, b, edge, dir) {
            self.rt_error(op, e.to_string())?;
            return Ok(None);
        }
        tracing::trace!(target: "jac::graph", %a, %b, %edge, "connected");
        Ok(Some(edge))
    }

    /// Create the edge a `connect_op` names, or a generic one.
    fn new_edge(&mut self, op: &AstNode) -> EvalResult<Option<(ObjectId, EdgeDir)>> {
        let Some(inner) = op.kid(0) else {
            return Ok(None);
        };
        let dir = match inner.kind.as_str() {
            kind::CONNECT_FROM => EdgeDir::From,
            kind::CONNECT_ANY => EdgeDir::Bidirected,
            _ => EdgeDir::To,
        };
        let name = inner
            .kid(0)
            .filter(|k| k.is(kind::NAME))
            .map_or(GENERIC_EDGE, AstNode::token_text);
        let Some(edge) = self.create_object(ArchKind::Edge, name, op)? else {
            return Ok(None);
        };
        self.apply_spawn_ctx(inner.find(kind::SPAWN_CTX), edge)?;
        Ok(Some((edge, dir)))
    }

    /// Node ids of a value that must be a node or a list of nodes.
    pub(crate) fn node_ids(&mut self, at: &AstNode, value: &Value) -> EvalResult<Option<Vec<ObjectId>>> {
        match value.ref_ids() {
            Some(ids) if ids.iter().all(|id| self.is_node(*id)) => Ok(Some(ids)),
            _ => {
                self.rt_error(at, format!("{value} is not a node or list of nodes"))?;
                Ok(None)
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // References
    // ══════════════════════════════════════════════════════════════════════

    /// Evaluate a `node_edge_ref` chain to the nodes it selects.
    ///
    /// `viable` is the set produced by the previous link; the first link
    /// starts from `here`.
    pub(crate) fn eval_node_edge_ref(
        &mut self,
        node: &AstNode,
        viable: Option<Vec<ObjectId>>,
    ) -> EvalResult<Vec<ObjectId>> {
        let Some(first) = node.kid(0) else {
            return Ok(Vec::new());
        };
        let selected = if first.is(kind::NODE_REF) {
            let name = first.kid(0).map_or("", AstNode::token_text);
            let candidates = match viable {
                Some(ids) => ids,
                None => self.here_neighbors(EdgeQuery::Any),
            };
            let typed: Vec<ObjectId> = self
                .visibility_prune(candidates)
                .into_iter()
                .filter(|id| self.is_node(*id) && self.arch_of(*id).is_some_and(|a| a.is_instance(name)))
                .collect();
            match node.kid(1).filter(|k| k.is(kind::FILTER_CTX)) {
                Some(filter) => self.filter_objects(filter, typed)?,
                None => typed,
            }
        } else {
            let locations = viable.unwrap_or_else(|| self.frame.here.into_iter().collect());
            let mut reached = Vec::new();
            for location in locations {
                for edge in self.edge_ref_edges(first, location)? {
                    if let Ok(Some(other)) = graph::opposing(&*self.store, edge, location) {
                        if !reached.contains(&other) {
                            reached.push(other);
                        }
                    }
                }
            }
            self.visibility_prune(reached)
        };
        match node.kids.last().filter(|k| k.is(kind::NODE_EDGE_REF)) {
            Some(next) => self.eval_node_edge_ref(next, Some(selected)),
            None => Ok(selected),
        }
    }

    fn here_neighbors(&self, query: EdgeQuery) -> Vec<ObjectId> {
        self.frame
            .here
            .and_then(|here| graph::neighbors(&*self.store, here, query).ok())
            .unwrap_or_default()
    }

    /// Edges of `location` an `edge_ref` selects: direction, then the
    /// edge architype, then the filter.
    pub(crate) fn edge_ref_edges(&mut self, edge_ref: &AstNode, location: ObjectId) -> EvalResult<Vec<ObjectId>> {
        let Some(inner) = edge_ref.kid(0) else {
            return Ok(Vec::new());
        };
        let query = match inner.kind.as_str() {
            kind::EDGE_FROM => EdgeQuery::From,
            kind::EDGE_ANY => EdgeQuery::Any,
            _ => EdgeQuery::To,
        };
        let Ok(edges) = graph::attached_edges(&*self.store, location, query) else {
            return Ok(Vec::new());
        };
        let edges = match inner.kid(0).filter(|k| k.is(kind::NAME)) {
            Some(name) => edges
                .into_iter()
                .filter(|e| self.arch_of(*e).is_some_and(|a| a.is_instance(name.token_text())))
                .collect(),
            None => edges,
        };
        match inner.find(kind::FILTER_CTX) {
            Some(filter) => self.filter_objects(filter, edges),
            None => Ok(edges),
        }
    }

    /// Keep objects whose fields satisfy every comparison in `filter`.
    /// An object lacking a compared field is dropped with a warning.
    fn filter_objects(&mut self, filter: &AstNode, ids: Vec<ObjectId>) -> EvalResult<Vec<ObjectId>> {
        let mut tests = Vec::with_capacity(filter.kids.len());
        for compare in &filter.kids {
            let [name, op, rhs] = compare.kids.as_slice() else {
                continue;
            };
            tests.push((name, op, self.eval_value(rhs)?));
        }
        let mut kept = Vec::new();
        'objects: for id in ids {
            for (name, op, rhs) in &tests {
                let field = self.object(id).and_then(|o| o.context.get(name.token_text())).cloned();
                let Some(field) = field else {
                    self.rt_warn(name, &format!("{} not present in object", name.token_text()));
                    continue 'objects;
                };
                if !self.apply_cmp(op, &field, rhs)?.is_truthy() {
                    continue 'objects;
                }
            }
            kept.push(id);
        }
        Ok(kept)
    }

    /// Drop objects that no longer exist or that the visiting walker has
    /// ignored.
    pub(crate) fn visibility_prune(&self, ids: Vec<ObjectId>) -> Vec<ObjectId> {
        let ignored = self.frame.walker.and_then(|w| self.walker_state(w)).map(|w| &w.ignored);
        ids.into_iter()
            .filter(|id| self.store.has(*id) && !ignored.is_some_and(|set| set.contains(id)))
            .collect()
    }

    /// Evaluate `(name=value, ...)` in the current frame and write each
    /// field of `id`.
    pub(crate) fn apply_spawn_ctx(&mut self, ctx: Option<&AstNode>, id: ObjectId) -> EvalResult<()> {
        let Some(ctx) = ctx else {
            return Ok(());
        };
        for assign in &ctx.kids {
            let [name, expr] = assign.kids.as_slice() else {
                continue;
            };
            let value = self.eval_value(expr)?;
            if let Err(e) = self.force_field(id, name.token_text(), value) {
                self.rt_error(assign, e.to_string())?;
            }
        }
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Spawn
    // ══════════════════════════════════════════════════════════════════════

    pub(crate) fn eval_spawn(&mut self, node: &AstNode) -> EvalResult<Binding> {
        let Some(object) = node.kid(0) else {
            return Ok(Binding::value(Value::Null));
        };
        let value = match object.kind.as_str() {
            kind::WALKER_SPAWN => self.eval_walker_spawn(object)?,
            kind::NODE_SPAWN => self.eval_node_spawn(object)?,
            kind::GRAPH_SPAWN => self.eval_graph_spawn(object)?,
            other => {
                self.rt_error(object, format!("Unexpected spawn {other}"))?;
                Value::Null
            }
        };
        Ok(Binding::value(value))
    }

    /// `spawn node::x(ctx)` or `spawn here ++> node::x(ctx)`.
    fn eval_node_spawn(&mut self, object: &AstNode) -> EvalResult<Value> {
        let name = object
            .find(kind::NODE_REF)
            .and_then(|r| r.kid(0))
            .map_or("", AstNode::token_text);
        let ctx = object.find(kind::SPAWN_CTX);
        let Some(spawn_edge) = object.find(kind::SPAWN_EDGE) else {
            let Some(id) = self.create_object(ArchKind::Node, name, object)? else {
                return Ok(Value::Null);
            };
            self.apply_spawn_ctx(ctx, id)?;
            return Ok(Value::Ref(id));
        };
        self.spawn_attached(spawn_edge, |ev, _| {
            let Some(id) = ev.create_object(ArchKind::Node, name, object)? else {
                return Ok(None);
            };
            ev.apply_spawn_ctx(ctx, id)?;
            Ok(Some(id))
        })
    }

    /// `spawn graph::g`, optionally attached to a location.
    fn eval_graph_spawn(&mut self, object: &AstNode) -> EvalResult<Value> {
        match object.find(kind::SPAWN_EDGE) {
            Some(spawn_edge) => self.spawn_attached(spawn_edge, |ev, _| ev.build_graph(object)),
            None => Ok(self.build_graph(object)?.map_or(Value::Null, Value::Ref)),
        }
    }

    /// Run a graph architype's block and return its anchor node.
    fn build_graph(&mut self, object: &AstNode) -> EvalResult<Option<ObjectId>> {
        let name = object
            .find(kind::GRAPH_REF)
            .and_then(|r| r.kid(0))
            .map_or("", AstNode::token_text);
        let registry = self.registry;
        let Some(body) = registry.get(ArchKind::Graph, name).and_then(|a| a.graph.as_ref()) else {
            self.rt_error(object, format!("graph {name} not found"))?;
            return Ok(None);
        };
        let scope = Scope::root(None);
        let frame = Frame::new(scope.clone(), self.frame.here, self.frame.walker, name);
        self.with_frame(frame, |ev| ev.exec_block(&body.block))?;

        match Scope::local(&scope, &body.anchor) {
            Some(Value::Ref(id)) if self.is_node(id) => {
                tracing::debug!(target: "jac::graph", graph = name, anchor = %id, "graph spawned");
                Ok(Some(id))
            }
            _ => {
                self.rt_error(object, "Graph didn't produce root node!")?;
                Ok(None)
            }
        }
    }

    /// Spawn one object per location of `spawn_edge` and connect each to
    /// its location. A single location yields the object, a list yields
    /// a list.
    fn spawn_attached(
        &mut self,
        spawn_edge: &AstNode,
        mut make: impl FnMut(&mut Self, ObjectId) -> EvalResult<Option<ObjectId>>,
    ) -> EvalResult<Value> {
        let (Some(location), Some(op)) = (spawn_edge.kid(0), spawn_edge.kid(1)) else {
            return Ok(Value::Null);
        };
        let place = self.eval_value(location)?;
        let (locations, single) = match &place {
            Value::Ref(id) if self.is_node(*id) => (vec![*id], true),
            Value::List(_) => match place.ref_ids() {
                Some(ids) if ids.iter().all(|id| self.is_node(*id)) => (ids, false),
                _ => return self.spawn_location_error(location, &place),
            },
            _ => return self.spawn_location_error(location, &place),
        };
        let mut spawned = Vec::with_capacity(locations.len());
        for loc in locations {
            let Some(id) = make(self, loc)? else {
                continue;
            };
            self.connect_pair(op, loc, id)?;
            spawned.push(Value::Ref(id));
        }
        if single {
            return Ok(spawned.pop().unwrap_or_default());
        }
        Ok(Value::List(spawned))
    }

    fn spawn_location_error(&mut self, at: &AstNode, place: &Value) -> EvalResult<Value> {
        self.rt_error(at, format!("Spawn can not occur on {}!", place.type_name()))?;
        Ok(Value::Null)
    }
}
