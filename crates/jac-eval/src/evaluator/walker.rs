//! Walker execution controller.
//!
//! A walker's traversal state lives on its stored object, so a yielded
//! walker keeps its queue between spawns. One step visits one node:
//!
//! 1. node entry and activity abilities the walker may trigger
//! 2. walker entry abilities the node may trigger
//! 3. the walker body (`with entry` on the first step only)
//! 4. walker exit abilities
//! 5. node exit abilities, which run even after `disengage` or `yield`
//! 6. scheduled destroys
//!
//! Without a `take`, the next nodes are the unvisited outbound neighbours.

use indexmap::IndexMap;
use jac_types::ast::kind;
use jac_types::{AstNode, Span};

use super::{Evaluator, Flow, Frame};
use crate::architype::{Architype, Event};
use crate::error::EvalResult;
use crate::graph::{self, ArchKind, EdgeQuery, WalkerPhase};
use crate::scope::Scope;
use crate::value::{ObjectId, Value};

/// How a top-level walker run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WalkEnd {
    pub final_node: Option<ObjectId>,
    pub yielded: bool,
}

impl<'a> Evaluator<'a> {
    // ══════════════════════════════════════════════════════════════════════
    // Walker actions
    // ══════════════════════════════════════════════════════════════════════

    pub(crate) fn exec_walker_action(&mut self, action: &AstNode) -> EvalResult<Flow> {
        let word = match action.kind.as_str() {
            kind::TAKE_ACTION => "take",
            kind::IGNORE_ACTION => "ignore",
            kind::DISENGAGE_ACTION => "disengage",
            _ => "yield",
        };
        let Some(w) = self.frame.walker else {
            self.rt_error(action, format!("{word} is only valid inside a walker"))?;
            return Ok(Flow::Normal);
        };
        match action.kind.as_str() {
            kind::TAKE_ACTION => self.exec_take(action, w),
            kind::IGNORE_ACTION => self.exec_ignore(action, w),
            kind::DISENGAGE_ACTION => self.exec_disengage(action, w),
            _ => self.exec_yield(action, w),
        }
    }

    /// `take[:bfs|:dfs] e [else {...}]`
    fn exec_take(&mut self, action: &AstNode, w: ObjectId) -> EvalResult<Flow> {
        let (style, rest) = match action.kids.split_first() {
            Some((first, rest)) if first.is(kind::NAME) => (first.token_text(), rest),
            _ => ("bfs", action.kids.as_slice()),
        };
        let Some(expr) = rest.first() else {
            return Ok(Flow::Normal);
        };
        let depth_first = match style {
            "bfs" | "b" => false,
            "dfs" | "d" => true,
            other => {
                self.rt_error(action, format!("{other} is invalid take operation"))?;
                return Ok(Flow::Normal);
            }
        };
        let value = self.eval_value(expr)?;
        let ids = if value.is_truthy() {
            match value.ref_ids() {
                Some(ids) if ids.iter().all(|id| self.is_node(*id)) => ids,
                _ => {
                    self.rt_error(expr, format!("{value} is not destination type (i.e., nodes)"))?;
                    return Ok(Flow::Normal);
                }
            }
        } else {
            Vec::new()
        };
        let ids = self.visibility_prune(ids);

        let Some(state) = self.walker_state_mut(w) else {
            return Ok(Flow::Normal);
        };
        let mut fresh: Vec<ObjectId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !state.next.contains(&id) && !fresh.contains(&id) {
                fresh.push(id);
            }
        }
        if depth_first {
            for id in fresh.iter().rev() {
                state.next.push_front(*id);
            }
        } else {
            state.next.extend(fresh.iter().copied());
        }
        state.took = true;
        tracing::debug!(target: "jac::walker", walker = %w, style, added = fresh.len(), "take");

        if fresh.is_empty() {
            if let Some(body) = rest.get(1).filter(|k| k.is(kind::ELSE_STMT)).and_then(|e| e.kid(0)) {
                return self.exec_block(body);
            }
        }
        Ok(Flow::Normal)
    }

    /// `ignore e;`: the nodes are never visited by this walker.
    fn exec_ignore(&mut self, action: &AstNode, w: ObjectId) -> EvalResult<Flow> {
        let Some(expr) = action.kid(0) else {
            return Ok(Flow::Normal);
        };
        let value = self.eval_value(expr)?;
        let ids = match value.ref_ids() {
            Some(ids) if ids.iter().all(|id| self.is_node(*id)) => ids,
            _ => {
                self.rt_error(expr, format!("{value} is not ignorable type (i.e., nodes)"))?;
                return Ok(Flow::Normal);
            }
        };
        if let Some(state) = self.walker_state_mut(w) {
            state.next.retain(|id| !ids.contains(id));
            state.ignored.extend(ids);
        }
        Ok(Flow::Normal)
    }

    /// `disengage [report e];`
    fn exec_disengage(&mut self, action: &AstNode, w: ObjectId) -> EvalResult<Flow> {
        if let Some(report) = action.kid(0) {
            self.exec_report(report)?;
        }
        if let Some(state) = self.walker_state_mut(w) {
            state.phase = WalkerPhase::Disengaged;
            state.next.clear();
        }
        tracing::debug!(target: "jac::walker", walker = %w, "disengage");
        Ok(Flow::Stop)
    }

    /// `yield [report e | disengage | take e];`
    fn exec_yield(&mut self, action: &AstNode, w: ObjectId) -> EvalResult<Flow> {
        if let Some(inner) = action.kid(0) {
            match inner.kind.as_str() {
                kind::REPORT_ACTION => self.exec_report(inner)?,
                kind::DISENGAGE_ACTION => {
                    self.exec_disengage(inner, w)?;
                }
                kind::TAKE_ACTION => {
                    self.exec_take(inner, w)?;
                }
                _ => {}
            }
        }
        if let Some(state) = self.walker_state_mut(w) {
            state.yielded = true;
        }
        tracing::debug!(target: "jac::walker", walker = %w, "yield");
        Ok(Flow::Stop)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Spawning
    // ══════════════════════════════════════════════════════════════════════

    /// `spawn loc walker::w(ctx)`: run a walker to completion from every
    /// location node. Evaluates to the walker's anchor value, or a list of
    /// them for a list of locations.
    pub(crate) fn eval_walker_spawn(&mut self, object: &AstNode) -> EvalResult<Value> {
        let Some(location) = object.kid(0) else {
            return Ok(Value::Null);
        };
        let name = object
            .find(kind::WALKER_REF)
            .and_then(|r| r.kid(0))
            .map_or("", AstNode::token_text);
        let ctx = object.find(kind::SPAWN_CTX);
        let place = self.eval_value(location)?;
        let Some(nodes) = self.node_ids(location, &place)? else {
            return Ok(Value::Null);
        };
        let single = matches!(place, Value::Ref(_));

        let mut results = Vec::with_capacity(nodes.len());
        for node in nodes {
            let Some(w) = self.acquire_walker(name, object)? else {
                continue;
            };
            self.prime_walker(w, node);
            self.apply_spawn_ctx(ctx, w)?;
            let run = self.run_walker(w, object);
            results.push(self.anchor_value(w));
            self.finish_spawn(w, name);
            run?;
        }
        if single {
            return Ok(results.pop().unwrap_or_default());
        }
        Ok(Value::List(results))
    }

    /// Run walker `name` from `start` as a top-level request, with `ctx`
    /// written into its fields first.
    pub(crate) fn run_request(
        &mut self,
        name: &str,
        start: ObjectId,
        ctx: IndexMap<String, Value>,
    ) -> EvalResult<WalkEnd> {
        let at = AstNode::leaf(kind::NAME, name, Span::default());
        let Some(w) = self.acquire_walker(name, &at)? else {
            return Ok(WalkEnd::default());
        };
        self.prime_walker(w, start);
        for (field, value) in ctx {
            if let Err(e) = self.force_field(w, &field, value) {
                self.rt_error(&at, e.to_string())?;
            }
        }
        let run = self.run_walker(w, &at);
        let end = self
            .walker_state(w)
            .map(|s| WalkEnd {
                final_node: s.current_node,
                yielded: s.yielded,
            })
            .unwrap_or_default();
        self.finish_spawn(w, name);
        run?;
        Ok(end)
    }

    /// The caller's yielded walker of this name, or a new one.
    fn acquire_walker(&mut self, name: &str, at: &AstNode) -> EvalResult<Option<ObjectId>> {
        let parked = match self.frame.walker {
            Some(caller) => self
                .walker_state(caller)
                .and_then(|s| s.yielded_walkers.get(name).copied()),
            None => self.yielded.get(name).copied(),
        };
        if let Some(w) = parked.filter(|w| self.walker_state(*w).is_some()) {
            tracing::debug!(target: "jac::walker", walker = %w, name, "resume");
            return Ok(Some(w));
        }
        self.create_object(ArchKind::Walker, name, at)
    }

    /// Place the walker on `node`. A resumed walker with queued nodes
    /// carries on from its queue instead.
    fn prime_walker(&mut self, w: ObjectId, node: ObjectId) {
        if let Some(state) = self.walker_state_mut(w) {
            if !state.yielded || state.next.is_empty() {
                state.next.push_front(node);
            }
            state.phase = WalkerPhase::Primed;
        }
        tracing::debug!(target: "jac::walker", walker = %w, node = %node, "prime");
    }

    /// Park a yielded walker with its caller; destroy any other.
    fn finish_spawn(&mut self, w: ObjectId, name: &str) {
        let yielded = self.walker_state(w).is_some_and(|s| s.yielded);
        let caller = self.frame.walker.filter(|c| *c != w);
        let parked = match caller {
            Some(caller) => self.walker_state_mut(caller).map(|s| &mut s.yielded_walkers),
            None => Some(&mut self.yielded),
        };
        if let Some(parked) = parked {
            if yielded {
                parked.insert(name.to_string(), w);
            } else {
                parked.shift_remove(name);
            }
        }
        if !yielded {
            if let Err(e) = graph::destroy_object(&mut *self.store, w) {
                tracing::warn!(target: "jac::walker", walker = %w, "walker cleanup failed: {e}");
            }
        }
    }

    /// Value of the walker's `has anchor` field.
    fn anchor_value(&self, w: ObjectId) -> Value {
        let field = self.arch_of(w).and_then(Architype::anchor);
        match (field, self.object(w)) {
            (Some(field), Some(obj)) => obj.context.get(field).cloned().unwrap_or_default(),
            _ => Value::Null,
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Traversal
    // ══════════════════════════════════════════════════════════════════════

    #[tracing::instrument(level = "debug", skip_all, fields(walker = %w))]
    fn run_walker(&mut self, w: ObjectId, at: &AstNode) -> EvalResult<()> {
        if self.ctx.call_depth >= self.config.max_call_depth {
            return self.rt_error(at, format!("Maximum call depth {} exceeded", self.config.max_call_depth));
        }
        let name = match self.object(w) {
            Some(obj) => obj.name.clone(),
            None => return Ok(()),
        };
        if let Some(state) = self.walker_state_mut(w) {
            state.yielded = false;
        }
        let frame = Frame::new(Scope::root(Some(w)), None, Some(w), &name);
        self.ctx.call_depth += 1;
        let result = self.with_frame(frame, |ev| ev.walk(w, at));
        self.ctx.call_depth -= 1;
        result
    }

    fn walk(&mut self, w: ObjectId, at: &AstNode) -> EvalResult<()> {
        loop {
            let Some(state) = self.walker_state(w) else {
                return Ok(());
            };
            if state.next.is_empty() || state.yielded || state.phase == WalkerPhase::Disengaged {
                break;
            }
            if !self.tick(at)? {
                break;
            }
            self.step(w)?;
        }

        if self.walker_state(w).is_some_and(|s| s.yielded) {
            return Ok(());
        }
        self.run_exit_block(w)?;
        if let Some(state) = self.walker_state_mut(w) {
            if state.phase != WalkerPhase::Disengaged {
                state.phase = WalkerPhase::Finished;
            }
        }
        Ok(())
    }

    /// The walker's `with exit` block, once, at the last visited node.
    fn run_exit_block(&mut self, w: ObjectId) -> EvalResult<()> {
        let Some(arch) = self.arch_of(w) else {
            return Ok(());
        };
        let Some(block) = arch
            .walker_body
            .as_ref()
            .and_then(|b| b.find(kind::WALK_EXIT_BLOCK))
            .and_then(|e| e.kid(0))
        else {
            return Ok(());
        };
        let here = self
            .walker_state(w)
            .and_then(|s| s.current_node)
            .filter(|n| self.store.has(*n));
        let frame = Frame::new(self.step_scope(w, here), here, Some(w), &arch.name);
        self.with_frame(frame, |ev| ev.exec_block(block).map(|_| ()))
    }

    /// Scope for code running during a visit: the walker is the subject and
    /// both the walker's and the node's abilities resolve by name.
    fn step_scope(&self, w: ObjectId, node: Option<ObjectId>) -> crate::scope::ScopeRef {
        let scope = Scope::root(Some(w));
        if let Some(arch) = self.arch_of(w) {
            Scope::add_action_set(&scope, Some(w), arch.abilities.clone());
        }
        if let Some(node) = node {
            if let Some(arch) = self.arch_of(node) {
                Scope::add_action_set(&scope, Some(node), arch.abilities.clone());
            }
        }
        scope
    }

    #[tracing::instrument(level = "debug", skip_all, fields(walker = %w))]
    fn step(&mut self, w: ObjectId) -> EvalResult<()> {
        let Some(node) = self.walker_state_mut(w).and_then(|s| s.next.pop_front()) else {
            return Ok(());
        };
        let (Some(walker_arch), Some(node_arch)) = (self.arch_of(w), self.arch_of(node)) else {
            // the node was destroyed after it was queued
            return Ok(());
        };
        let Some(state) = self.walker_state_mut(w) else {
            return Ok(());
        };
        state.current_node = Some(node);
        state.phase = WalkerPhase::Visiting;
        state.took = false;
        state.visited.insert(node);
        let step_no = state.step;
        tracing::debug!(target: "jac::walker", node = %node, step = step_no, arch = %node_arch.name, "step");

        let frame = Frame::new(self.step_scope(w, Some(node)), Some(node), Some(w), &walker_arch.name);
        self.with_frame(frame, |ev| {
            ev.visit(w, node, walker_arch, node_arch, step_no)?;
            ev.process_destroy();
            Ok(())
        })?;

        let neighbors = graph::neighbors(&*self.store, node, EdgeQuery::To).unwrap_or_default();
        let Some(state) = self.walker_state_mut(w) else {
            return Ok(());
        };
        if !state.took && !state.yielded && state.phase != WalkerPhase::Disengaged {
            for next in neighbors {
                if !state.visited.contains(&next) && !state.ignored.contains(&next) && !state.next.contains(&next) {
                    state.next.push_back(next);
                }
            }
        }
        state.step += 1;
        Ok(())
    }

    fn visit(
        &mut self,
        w: ObjectId,
        node: ObjectId,
        walker_arch: &'a Architype,
        node_arch: &'a Architype,
        step_no: u64,
    ) -> EvalResult<()> {
        self.trigger(node, node_arch, &[Event::Entry, Event::Activity], &walker_arch.lineage, Some(w))?;
        self.trigger(w, walker_arch, &[Event::Entry], &node_arch.lineage, Some(w))?;
        if !self.halted(w) {
            self.run_walker_body(w, walker_arch, step_no)?;
        }
        self.trigger(w, walker_arch, &[Event::Exit], &node_arch.lineage, Some(w))?;
        // node exit abilities run even after a halt
        self.trigger(node, node_arch, &[Event::Exit], &walker_arch.lineage, None)
    }

    fn halted(&self, w: ObjectId) -> bool {
        self.walker_state(w)
            .map_or(true, |s| s.yielded || s.phase == WalkerPhase::Disengaged)
    }

    /// Run `target`'s abilities bound to `events` that an object of
    /// `lineage` may trigger. Each name runs at most once per visit. With
    /// `halt_on` set, stops as soon as that walker disengages or yields.
    fn trigger(
        &mut self,
        target: ObjectId,
        arch: &'a Architype,
        events: &[Event],
        lineage: &[String],
        halt_on: Option<ObjectId>,
    ) -> EvalResult<()> {
        let mut seen: Vec<&str> = Vec::new();
        for event in events {
            for action in arch.abilities_for(*event) {
                if halt_on.is_some_and(|w| self.halted(w)) {
                    return Ok(());
                }
                if !action.admits(lineage) {
                    continue;
                }
                if action.preset.is_none() {
                    if seen.contains(&action.name.as_str()) {
                        continue;
                    }
                    seen.push(&action.name);
                }
                let at = AstNode::leaf(kind::NAME, action.name.as_str(), Span::default());
                self.invoke(action.clone(), Some(target), Default::default(), &at)?;
            }
        }
        Ok(())
    }

    fn run_walker_body(&mut self, w: ObjectId, arch: &'a Architype, step_no: u64) -> EvalResult<()> {
        let Some(body) = &arch.walker_body else {
            return Ok(());
        };
        for item in &body.kids {
            if self.halted(w) {
                break;
            }
            let flow = match item.kind.as_str() {
                kind::ATTR_STMT | kind::WALK_EXIT_BLOCK => continue,
                kind::WALK_ENTRY_BLOCK if step_no > 0 => continue,
                kind::WALK_ENTRY_BLOCK | kind::WALK_ACTIVITY_BLOCK => match item.kid(0) {
                    Some(block) => self.exec_block(block)?,
                    None => continue,
                },
                _ => self.exec_stmt(item)?,
            };
            if matches!(flow, Flow::Skip | Flow::Stop) {
                break;
            }
        }
        Ok(())
    }
}
