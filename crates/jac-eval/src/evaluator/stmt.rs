//! Statement execution.

use jac_types::ast::kind;
use jac_types::AstNode;

use super::{Evaluator, Flow};
use crate::binding::{Binding, Place, Root};
use crate::error::{EvalError, EvalResult};
use crate::scope::Scope;
use crate::value::{ObjectId, Value};

impl<'a> Evaluator<'a> {
    // ══════════════════════════════════════════════════════════════════════
    // Blocks
    // ══════════════════════════════════════════════════════════════════════

    /// Run a `code_block`. Stops at the first statement that does not
    /// finish normally and hands its flow to the caller.
    pub(crate) fn exec_block(&mut self, block: &AstNode) -> EvalResult<Flow> {
        for stmt in &block.kids {
            let flow = self.exec_stmt(stmt)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &AstNode) -> EvalResult<Flow> {
        match stmt.kind.as_str() {
            kind::CODE_BLOCK => self.exec_block(stmt),
            kind::NODE_CTX_BLOCK => self.exec_node_ctx(stmt),
            kind::IF_STMT => self.exec_if(stmt),
            kind::TRY_STMT => self.exec_try(stmt),
            kind::FOR_STMT => self.exec_for(stmt),
            kind::WHILE_STMT => self.exec_while(stmt),
            kind::ASSERT_STMT => self.exec_assert(stmt).map(|()| Flow::Normal),
            kind::CTRL_STMT => Ok(match stmt.kid(0).map(|k| k.kind.as_str()) {
                Some(kind::KW_BREAK) => Flow::Break,
                Some(kind::KW_CONTINUE) => Flow::Continue,
                _ => Flow::Skip,
            }),
            kind::DESTROY_ACTION => self.exec_destroy(stmt).map(|()| Flow::Normal),
            kind::REPORT_ACTION => self.exec_report(stmt).map(|()| Flow::Normal),
            kind::WALKER_ACTION => match stmt.kid(0) {
                Some(action) => self.exec_walker_action(action),
                None => Ok(Flow::Normal),
            },
            _ => {
                self.eval(stmt)?;
                Ok(Flow::Normal)
            }
        }
    }

    /// `person, place { ... }`: runs only when `here` is one of the named
    /// architypes (or a sub-architype of one).
    fn exec_node_ctx(&mut self, stmt: &AstNode) -> EvalResult<Flow> {
        let (Some(names), Some(block)) = (stmt.kid(0), stmt.kid(1)) else {
            return Ok(Flow::Normal);
        };
        let Some(arch) = self.frame.here.and_then(|id| self.arch_of(id)) else {
            return Ok(Flow::Normal);
        };
        if names.kids.iter().any(|n| arch.is_instance(n.token_text())) {
            return self.exec_block(block);
        }
        Ok(Flow::Normal)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Branching
    // ══════════════════════════════════════════════════════════════════════

    fn exec_if(&mut self, stmt: &AstNode) -> EvalResult<Flow> {
        let (Some(cond), Some(body)) = (stmt.kid(0), stmt.kid(1)) else {
            return Ok(Flow::Normal);
        };
        if self.eval_value(cond)?.is_truthy() {
            return self.exec_block(body);
        }
        for branch in &stmt.kids[2..] {
            match branch.kind.as_str() {
                kind::ELIF_STMT => {
                    let (Some(cond), Some(body)) = (branch.kid(0), branch.kid(1)) else {
                        continue;
                    };
                    if self.eval_value(cond)?.is_truthy() {
                        return self.exec_block(body);
                    }
                }
                kind::ELSE_STMT => {
                    if let Some(body) = branch.kid(0) {
                        return self.exec_block(body);
                    }
                }
                _ => {}
            }
        }
        Ok(Flow::Normal)
    }

    /// `try {...} else with err {...}`. Only raised runtime errors are
    /// caught; assertion failures pass through.
    fn exec_try(&mut self, stmt: &AstNode) -> EvalResult<Flow> {
        let Some(body) = stmt.kid(0) else {
            return Ok(Flow::Normal);
        };
        self.ctx.try_depth += 1;
        let result = self.exec_block(body);
        self.ctx.try_depth -= 1;

        let info = match result {
            Err(EvalError::Raised(info)) => info,
            other => return other,
        };
        tracing::debug!(target: "jac::runtime", rule = %info.rule, "caught: {}", info.msg);
        let Some(handler) = stmt.find(kind::ELSE_FROM_TRY) else {
            return Ok(Flow::Normal);
        };
        match handler.kids.as_slice() {
            [name, block] => {
                self.assign_name(name, info.to_value())?;
                self.exec_block(block)
            }
            [block] => self.exec_block(block),
            _ => Ok(Flow::Normal),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Loops
    // ══════════════════════════════════════════════════════════════════════

    fn exec_for(&mut self, stmt: &AstNode) -> EvalResult<Flow> {
        if stmt.find(kind::KW_TO).is_some() {
            self.exec_for_range(stmt)
        } else {
            self.exec_for_each(stmt)
        }
    }

    /// `for i = 0 to i < n by i += 1 { ... }`
    fn exec_for_range(&mut self, stmt: &AstNode) -> EvalResult<Flow> {
        let [init, _, cond, _, step, body] = stmt.kids.as_slice() else {
            return Ok(Flow::Normal);
        };
        self.eval(init)?;
        while self.eval_value(cond)?.is_truthy() {
            if !self.tick(stmt)? {
                break;
            }
            match self.exec_block(body)? {
                Flow::Break => break,
                flow @ (Flow::Skip | Flow::Stop) => return Ok(flow),
                Flow::Normal | Flow::Continue => {}
            }
            self.eval(step)?;
        }
        Ok(Flow::Normal)
    }

    /// `for x in list`, `for i, x in list`, `for k in dict`, `for k, v in dict`.
    fn exec_for_each(&mut self, stmt: &AstNode) -> EvalResult<Flow> {
        let names: Vec<&AstNode> = stmt.kids.iter().take_while(|k| k.is(kind::NAME)).collect();
        let (Some(source), Some(body)) = (stmt.kids.get(names.len() + 1), stmt.kids.last()) else {
            return Ok(Flow::Normal);
        };
        let rows: Vec<Vec<Value>> = match (self.eval_value(source)?, names.len()) {
            (Value::List(items), 1) => items.into_iter().map(|v| vec![v]).collect(),
            (Value::List(items), _) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| vec![Value::Int(i as i64), v])
                .collect(),
            (Value::Dict(map), 1) => map.into_keys().map(|k| vec![Value::Str(k)]).collect(),
            (Value::Dict(map), _) => map.into_iter().map(|(k, v)| vec![Value::Str(k), v]).collect(),
            _ => {
                self.rt_error(source, "Not a list/dict for iteration!")?;
                return Ok(Flow::Normal);
            }
        };
        for row in rows {
            if !self.tick(stmt)? {
                break;
            }
            for (name, value) in names.iter().zip(row) {
                self.assign_name(name, value)?;
            }
            match self.exec_block(body)? {
                Flow::Break => break,
                flow @ (Flow::Skip | Flow::Stop) => return Ok(flow),
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_while(&mut self, stmt: &AstNode) -> EvalResult<Flow> {
        let (Some(cond), Some(body)) = (stmt.kid(0), stmt.kid(1)) else {
            return Ok(Flow::Normal);
        };
        while self.eval_value(cond)?.is_truthy() {
            if !self.tick(stmt)? {
                break;
            }
            match self.exec_block(body)? {
                Flow::Break => break,
                flow @ (Flow::Skip | Flow::Stop) => return Ok(flow),
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Assert & destroy
    // ══════════════════════════════════════════════════════════════════════

    /// A falsy value, or any runtime error while evaluating the condition,
    /// fails the run.
    fn exec_assert(&mut self, stmt: &AstNode) -> EvalResult<()> {
        let Some(expr) = stmt.kid(0) else {
            return Ok(());
        };
        self.ctx.try_depth += 1;
        let result = self.eval_value(expr);
        self.ctx.try_depth -= 1;
        match result {
            Ok(v) if v.is_truthy() => Ok(()),
            Ok(_) => Err(EvalError::AssertionFailed(expr.text())),
            Err(EvalError::Raised(info)) => {
                Err(EvalError::AssertionFailed(format!("{}: {}", expr.text(), info.msg)))
            }
            Err(e) => Err(e),
        }
    }

    /// Queue objects for destruction at the end of the step and drop the
    /// slot that held them.
    fn exec_destroy(&mut self, stmt: &AstNode) -> EvalResult<()> {
        let Some(expr) = stmt.kid(0) else {
            return Ok(());
        };
        let binding = self.eval(expr)?;
        let Some(ids) = binding.value.ref_ids() else {
            return self.rt_error(expr, format!("{} is not a graph element", binding.value));
        };
        for id in ids {
            if !self.frame.output.destroy.contains(&id) {
                tracing::debug!(target: "jac::walker", object = %id, "destroy scheduled");
                self.frame.output.destroy.push(id);
            }
        }
        let field_root = binding
            .place
            .as_ref()
            .is_some_and(|p| matches!(p.root, Root::Field(..)) && p.path.is_empty());
        if binding.is_assignable() && !field_root {
            if let Err(e) = binding.remove(self) {
                self.rt_warn(expr, &e.to_string());
            }
        }
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Names
    // ══════════════════════════════════════════════════════════════════════

    /// Slot a bare name refers to. Locals shadow the subject's fields at
    /// each scope level.
    pub(crate) fn resolve_root(&self, name: &str, create: bool) -> Option<Root> {
        let store = &*self.store;
        let has_field = |id: ObjectId, field: &str| {
            store.get(id).is_some_and(|o| o.context.contains_key(field))
        };
        Scope::resolve(&self.frame.scope, name, create, &has_field)
    }

    /// Bind `value` to the name leaf `name`, creating a local if needed.
    pub(crate) fn assign_name(&mut self, name: &AstNode, value: Value) -> EvalResult<()> {
        let Some(root) = self.resolve_root(name.token_text(), true) else {
            return Ok(());
        };
        let mut slot = Binding {
            value: Value::Null,
            place: Some(Place { root, path: Vec::new() }),
        };
        if let Err(e) = slot.write(self, value) {
            self.rt_error(name, e.to_string())?;
        }
        Ok(())
    }
}
