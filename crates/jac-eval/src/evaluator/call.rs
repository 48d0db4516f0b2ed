//! Ability and builtin-action invocation.

use std::sync::Arc;

use jac_types::AstNode;

use super::{Evaluator, Frame};
use crate::architype::{Action, ActionBody, ActionRef, Preset};
use crate::binding::Binding;
use crate::builtins::{Args, BuiltinAction};
use crate::error::EvalResult;
use crate::scope::Scope;
use crate::value::{ObjectId, Value};

impl<'a> Evaluator<'a> {
    /// Call a value produced by an atom: `std.log("x")`, `here.greet()`.
    pub(crate) fn call_value(&mut self, callee: Value, params: Option<&AstNode>, at: &AstNode) -> EvalResult<Value> {
        let Value::Action(ActionRef { action, target }) = callee else {
            self.rt_error(at, format!("Unable to execute ability {}", callee.type_name()))?;
            return Ok(Value::Null);
        };
        let args = self.eval_params(params)?;
        self.invoke(action, target, args, at)
    }

    /// `obj::name(ctx)`: apply `ctx` to each target and trigger its
    /// ability `name`. Evaluates to the targets.
    pub(crate) fn call_ability_on(
        &mut self,
        target: Value,
        name: Option<&AstNode>,
        ctx: Option<&AstNode>,
        at: &AstNode,
    ) -> EvalResult<Binding> {
        let Some(name_node) = name else {
            return Ok(Binding::value(target));
        };
        let name = name_node.token_text();
        let Some(ids) = target.ref_ids() else {
            self.rt_error(at, format!("{} is not a graph element", target.type_name()))?;
            return Ok(Binding::value(target));
        };
        for id in ids {
            self.apply_spawn_ctx(ctx, id)?;
            let ability = self.arch_of(id).and_then(|a| a.ability(name)).cloned();
            match ability {
                Some(action) => {
                    self.invoke(action, Some(id), Args::default(), at)?;
                }
                None => self.rt_error(name_node, format!("Ability {name} not found"))?,
            }
        }
        Ok(Binding::value(target))
    }

    /// Run `action` against `target`.
    ///
    /// A builtin with a preset runs the preset when called without
    /// arguments, which is how event-triggered builtins run.
    pub(crate) fn invoke(
        &mut self,
        action: Arc<Action>,
        target: Option<ObjectId>,
        args: Args,
        at: &AstNode,
    ) -> EvalResult<Value> {
        tracing::trace!(target: "jac::runtime", action = %action.name, owner = %action.owner, "invoke");
        match (&action.body, &action.preset) {
            (ActionBody::Code(block), _) => self.run_ability(&action, target, block, at),
            (ActionBody::Builtin(builtin), Some(preset)) if args == Args::default() => {
                self.run_preset(&action, *builtin, preset, target, at)
            }
            (ActionBody::Builtin(builtin), _) => self.call_builtin(*builtin, &args, at),
        }
    }

    fn enter_call(&mut self, at: &AstNode) -> EvalResult<bool> {
        if self.ctx.call_depth >= self.config.max_call_depth {
            self.rt_error(at, format!("Maximum call depth {} exceeded", self.config.max_call_depth))?;
            return Ok(false);
        }
        self.tick(at)
    }

    /// A code ability runs in a child of the caller's scope whose subject
    /// is the target, so the target's fields and abilities resolve by bare
    /// name.
    fn run_ability(
        &mut self,
        action: &Action,
        target: Option<ObjectId>,
        block: &AstNode,
        at: &AstNode,
    ) -> EvalResult<Value> {
        if !self.enter_call(at)? {
            return Ok(Value::Null);
        }
        let here = target
            .filter(|id| self.object(*id).is_some_and(|o| o.as_walker().is_none()))
            .or(self.frame.here);
        let scope = Scope::child(&self.frame.scope, target);
        if let Some(arch) = target.and_then(|id| self.arch_of(id)) {
            Scope::add_action_set(&scope, target, arch.abilities.clone());
        }
        let frame = Frame::new(scope, here, self.frame.walker, &action.name);

        self.ctx.call_depth += 1;
        let result = self.with_frame(frame, |ev| ev.exec_block(block));
        self.ctx.call_depth -= 1;
        result?;
        Ok(Value::Null)
    }

    /// Evaluate the preset arguments with the target as subject, call the
    /// builtin, and store the result in the preset's out expression.
    fn run_preset(
        &mut self,
        action: &Action,
        builtin: BuiltinAction,
        preset: &Preset,
        target: Option<ObjectId>,
        at: &AstNode,
    ) -> EvalResult<Value> {
        if !self.enter_call(at)? {
            return Ok(Value::Null);
        }
        let frame = self.sub_frame(Scope::root(target), &action.name);
        self.ctx.call_depth += 1;
        let result = self.with_frame(frame, |ev| {
            let args = ev.eval_params(preset.args.as_ref())?;
            let value = ev.call_builtin(builtin, &args, at)?;
            if let Some(out) = &preset.out {
                let mut dest = ev.eval_in_mode(out, true)?;
                ev.write_binding(out, &mut dest, value.clone())?;
            }
            Ok(value)
        });
        self.ctx.call_depth -= 1;
        result
    }

    pub(crate) fn call_builtin(&mut self, builtin: BuiltinAction, args: &Args, at: &AstNode) -> EvalResult<Value> {
        match builtin.call(args, self) {
            Ok(value) => Ok(value),
            Err(msg) => {
                self.rt_error(at, format!("{}: {msg}", builtin.name()))?;
                Ok(Value::Null)
            }
        }
    }
}
