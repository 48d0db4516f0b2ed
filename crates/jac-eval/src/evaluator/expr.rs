//! Expression evaluation.
//!
//! Every expression evaluates to a [`Binding`]. Reads through a name, a
//! field, an index or a slice keep their place, so the same code path
//! serves both sides of an assignment: the target is evaluated with
//! `assign_mode` set, which lets missing names and keys come into being.

use std::mem;

use indexmap::IndexMap;
use jac_types::ast::kind;
use jac_types::AstNode;

use super::Evaluator;
use crate::architype::ActionRef;
use crate::binding::{Binding, BindingError, Place, Root, Step};
use crate::builtins::{Args, BuiltinAction};
use crate::error::EvalResult;
use crate::scope::Scope;
use crate::value::{ArithOp, ObjectId, TypeTag, Value};

impl<'a> Evaluator<'a> {
    // ══════════════════════════════════════════════════════════════════════
    // Dispatch
    // ══════════════════════════════════════════════════════════════════════

    pub(crate) fn eval(&mut self, node: &AstNode) -> EvalResult<Binding> {
        match node.kind.as_str() {
            kind::EXPRESSION => self.eval_expression(node),
            kind::CONNECT => self.eval_connect(node),
            kind::LOGICAL => self.eval_logical(node).map(Binding::value),
            kind::COMPARE => self.eval_compare(node).map(Binding::value),
            kind::ARITHMETIC | kind::TERM => self.eval_arith(node).map(Binding::value),
            kind::FACTOR => self.eval_factor(node).map(Binding::value),
            kind::POWER => self.eval_power(node).map(Binding::value),
            kind::ATOM => self.eval_atom(node),
            kind::NAME => self.eval_name(node),
            kind::INT | kind::FLOAT | kind::STRING | kind::BOOL | kind::NULL => {
                self.eval_literal(node).map(Binding::value)
            }
            kind::LIST_VAL => {
                let items = self.eval_list(node.kid(0))?;
                Ok(Binding::value(Value::List(items)))
            }
            kind::DICT_VAL => self.eval_dict(node).map(Binding::value),
            kind::GLOBAL_REF => self.eval_global_ref(node),
            kind::REF => self.eval_ref(node).map(Binding::value),
            kind::DEREF => self.eval_deref(node).map(Binding::value),
            kind::ANY_TYPE => {
                let tag = node.kid(0).and_then(|k| TypeTag::from_kind(&k.kind));
                Ok(Binding::value(tag.map_or(Value::Null, Value::Type)))
            }
            kind::NODE_EDGE_REF => {
                let ids = self.eval_node_edge_ref(node, None)?;
                Ok(Binding::value(Value::List(ids.into_iter().map(Value::Ref).collect())))
            }
            kind::SPAWN => self.eval_spawn(node),
            other => {
                self.rt_error(node, format!("Unexpected expression rule {other}"))?;
                Ok(Binding::value(Value::Null))
            }
        }
    }

    pub(crate) fn eval_value(&mut self, node: &AstNode) -> EvalResult<Value> {
        self.eval(node).map(Binding::detach)
    }

    /// Evaluate with `assign_mode` set to `mode`, restoring it afterwards.
    pub(crate) fn eval_in_mode(&mut self, node: &AstNode, mode: bool) -> EvalResult<Binding> {
        let saved = mem::replace(&mut self.ctx.assign_mode, mode);
        let result = self.eval(node);
        self.ctx.assign_mode = saved;
        result
    }

    /// Write through `dest`, reporting a failure at `at`.
    pub(crate) fn write_binding(&mut self, at: &AstNode, dest: &mut Binding, value: Value) -> EvalResult<()> {
        if let Err(e) = dest.write(self, value) {
            self.rt_error(at, e.to_string())?;
        }
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Assignment
    // ══════════════════════════════════════════════════════════════════════

    fn eval_expression(&mut self, node: &AstNode) -> EvalResult<Binding> {
        let (Some(target), tail) = (node.kid(0), node.kid(1)) else {
            return Ok(Binding::value(Value::Null));
        };
        let Some(tail) = tail else {
            return self.eval(target);
        };
        let mut dest = self.eval_in_mode(target, true)?;
        match tail.kind.as_str() {
            kind::ASSIGNMENT => {
                let Some(rhs) = tail.kid(0) else {
                    return Ok(dest);
                };
                let value = self.eval_value(rhs)?;
                self.write_binding(tail, &mut dest, value)?;
            }
            kind::COPY_ASSIGN => {
                let Some(rhs) = tail.kid(0) else {
                    return Ok(dest);
                };
                let src = self.eval_value(rhs)?;
                self.copy_fields(tail, &dest.value, &src)?;
            }
            kind::INC_ASSIGN => {
                let (Some(op), Some(rhs)) = (tail.kid(0), tail.kid(1)) else {
                    return Ok(dest);
                };
                let rhs = self.eval_value(rhs)?;
                let op = match op.kind.as_str() {
                    kind::PEQ => ArithOp::Add,
                    kind::MEQ => ArithOp::Sub,
                    kind::TEQ => ArithOp::Mul,
                    _ => ArithOp::Div,
                };
                match dest.value.arith(op, &rhs) {
                    Ok(value) => self.write_binding(tail, &mut dest, value)?,
                    Err(msg) => self.rt_error(tail, msg)?,
                }
            }
            _ => {}
        }
        Ok(dest)
    }

    /// `dest := src`: copy every field of `src` that `dest` also declares.
    fn copy_fields(&mut self, at: &AstNode, dest: &Value, src: &Value) -> EvalResult<()> {
        let graph_element = |ev: &Self, v: &Value| {
            v.as_ref_id()
                .and_then(|id| ev.object(id))
                .filter(|o| o.as_walker().is_none())
                .map(|o| (o.id, o.name.clone()))
        };
        let (Some((dest_id, dest_arch)), Some((src_id, src_arch))) =
            (graph_element(self, dest), graph_element(self, src))
        else {
            return self.rt_error(at, "Copy fields only applies to nodes and edges");
        };
        if dest_arch != src_arch {
            return self.rt_error(at, format!("Node/edge arch {dest_arch} don't match {src_arch}!"));
        }
        let fields = self.object(src_id).map(|o| o.context.clone()).unwrap_or_default();
        if let Some(obj) = self.store.get_mut(dest_id) {
            for (name, value) in fields {
                if let Some(slot) = obj.context.get_mut(&name) {
                    *slot = value;
                }
            }
        }
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Operators
    // ══════════════════════════════════════════════════════════════════════

    /// `and`/`or` fold left to right, skipping the right operand when the
    /// left one already decides, and yield operand values rather than
    /// booleans.
    fn eval_logical(&mut self, node: &AstNode) -> EvalResult<Value> {
        let Some(first) = node.kid(0) else {
            return Ok(Value::Null);
        };
        let mut result = self.eval_value(first)?;
        for pair in node.kids[1..].chunks(2) {
            let [op, rhs] = pair else { break };
            let needs_rhs = if op.is(kind::KW_AND) {
                result.is_truthy()
            } else {
                !result.is_truthy()
            };
            if needs_rhs {
                result = self.eval_value(rhs)?;
            }
        }
        Ok(result)
    }

    fn eval_compare(&mut self, node: &AstNode) -> EvalResult<Value> {
        match node.kids.as_slice() {
            [not, operand] if not.is(kind::NOT) => {
                Ok(Value::Bool(!self.eval_value(operand)?.is_truthy()))
            }
            [first, rest @ ..] => {
                let mut result = self.eval_value(first)?;
                for pair in rest.chunks(2) {
                    let [op, rhs] = pair else { break };
                    let rhs = self.eval_value(rhs)?;
                    result = self.apply_cmp(op, &result, &rhs)?;
                }
                Ok(result)
            }
            [] => Ok(Value::Null),
        }
    }

    /// Apply a `cmp_op` node. Operands that don't compare are a runtime
    /// error and yield `false`.
    pub(crate) fn apply_cmp(&mut self, op: &AstNode, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
        let leaf = op.kid(0).map_or("", |k| k.kind.as_str());
        let ordered = |accept: fn(std::cmp::Ordering) -> bool, symbol: &str| {
            lhs.compare(rhs).map(accept).ok_or_else(|| {
                format!(
                    "'{symbol}' not supported between instances of '{}' and '{}'",
                    lhs.type_name(),
                    rhs.type_name()
                )
            })
        };
        let result = match leaf {
            kind::EE => Ok(lhs == rhs),
            kind::NE => Ok(lhs != rhs),
            kind::LT => ordered(|o| o.is_lt(), "<"),
            kind::GT => ordered(|o| o.is_gt(), ">"),
            kind::LTE => ordered(|o| o.is_le(), "<="),
            kind::GTE => ordered(|o| o.is_ge(), ">="),
            kind::KW_IN => rhs.contains(lhs),
            kind::NOT_IN => rhs.contains(lhs).map(|found| !found),
            other => Err(format!("Invalid comparison operator {other}")),
        };
        match result {
            Ok(b) => Ok(Value::Bool(b)),
            Err(msg) => {
                self.rt_error(op, msg)?;
                Ok(Value::Bool(false))
            }
        }
    }

    /// `+ -` and `* / %` levels. A failing operator keeps the left operand.
    fn eval_arith(&mut self, node: &AstNode) -> EvalResult<Value> {
        let Some(first) = node.kid(0) else {
            return Ok(Value::Null);
        };
        let mut result = self.eval_value(first)?;
        for pair in node.kids[1..].chunks(2) {
            let [op_node, rhs] = pair else { break };
            let rhs = self.eval_value(rhs)?;
            let op = match op_node.kind.as_str() {
                kind::PLUS => ArithOp::Add,
                kind::MINUS => ArithOp::Sub,
                kind::STAR_MUL => ArithOp::Mul,
                kind::DIV => ArithOp::Div,
                _ => ArithOp::Mod,
            };
            match result.arith(op, &rhs) {
                Ok(v) => result = v,
                Err(msg) => self.rt_error(op_node, msg)?,
            }
        }
        Ok(result)
    }

    fn eval_factor(&mut self, node: &AstNode) -> EvalResult<Value> {
        let (Some(op), Some(operand)) = (node.kid(0), node.kid(1)) else {
            return Ok(Value::Null);
        };
        let value = self.eval_value(operand)?;
        let negate = op.is(kind::MINUS);
        let result = match &value {
            Value::Int(i) if negate => i.checked_neg().map(Value::Int),
            Value::Float(f) if negate => Some(Value::Float(-f)),
            Value::Bool(b) if negate => Some(Value::Int(-i64::from(*b))),
            Value::Int(_) | Value::Float(_) => Some(value.clone()),
            Value::Bool(b) => Some(Value::Int(i64::from(*b))),
            _ => None,
        };
        match result {
            Some(v) => Ok(v),
            None => {
                let symbol = if negate { "-" } else { "+" };
                self.rt_error(node, format!("bad operand type for unary {symbol}: '{}'", value.type_name()))?;
                Ok(value)
            }
        }
    }

    /// `a ** b ** c` groups to the right.
    fn eval_power(&mut self, node: &AstNode) -> EvalResult<Value> {
        let mut operands = Vec::new();
        for operand in node.kids.iter().filter(|k| !k.is(kind::POW)) {
            operands.push(self.eval_value(operand)?);
        }
        let Some(mut result) = operands.pop() else {
            return Ok(Value::Null);
        };
        while let Some(base) = operands.pop() {
            match base.arith(ArithOp::Pow, &result) {
                Ok(v) => result = v,
                Err(msg) => {
                    self.rt_error(node, msg)?;
                    result = base;
                }
            }
        }
        Ok(result)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Literals & names
    // ══════════════════════════════════════════════════════════════════════

    fn eval_literal(&mut self, node: &AstNode) -> EvalResult<Value> {
        let text = node.token_text();
        let parsed = match node.kind.as_str() {
            kind::INT => text.parse().map(Value::Int).ok(),
            kind::FLOAT => text.parse().map(Value::Float).ok(),
            kind::STRING => Some(Value::str(text)),
            kind::BOOL => Some(Value::Bool(text == "true")),
            _ => Some(Value::Null),
        };
        match parsed {
            Some(v) => Ok(v),
            None => {
                self.rt_error(node, format!("Invalid literal {text}"))?;
                Ok(Value::Null)
            }
        }
    }

    /// `here`, `visitor`, a local or subject field, or an action visible
    /// by bare name, in that order.
    fn eval_name(&mut self, node: &AstNode) -> EvalResult<Binding> {
        let name = node.token_text();
        match name {
            "here" => return Ok(Binding::value(self.frame.here.map_or(Value::Null, Value::Ref))),
            "visitor" => return Ok(Binding::value(self.frame.walker.map_or(Value::Null, Value::Ref))),
            _ => {}
        }
        if !self.ctx.assign_mode {
            if let Some(action) = self.visible_action(name) {
                return Ok(Binding::value(Value::Action(action)));
            }
        }
        if let Some(root) = self.resolve_root(name, self.ctx.assign_mode) {
            let bound = Binding::at(Place { root, path: Vec::new() }, self);
            return self.bind(node, bound);
        }
        self.rt_error(node, format!("Variable not defined - {name}"))?;
        Ok(Binding::value(Value::Null))
    }

    /// An action visible by bare name, unless a local or field of the same
    /// name shadows it.
    fn visible_action(&self, name: &str) -> Option<ActionRef> {
        if self.resolve_root(name, false).is_some() {
            return None;
        }
        Scope::find_action(&self.frame.scope, name)
    }

    pub(crate) fn eval_list(&mut self, expr_list: Option<&AstNode>) -> EvalResult<Vec<Value>> {
        let mut items = Vec::new();
        if let Some(list) = expr_list {
            for item in &list.kids {
                items.push(self.eval_in_mode(item, false)?.detach());
            }
        }
        Ok(items)
    }

    fn eval_dict(&mut self, node: &AstNode) -> EvalResult<Value> {
        let mut map = IndexMap::new();
        for pair in &node.kids {
            let (Some(k), Some(v)) = (pair.kid(0), pair.kid(1)) else {
                continue;
            };
            let key = self.eval_value(k)?;
            let value = self.eval_value(v)?;
            match key {
                Value::Str(key) => {
                    map.insert(key, value);
                }
                other => self.rt_error(k, format!("Key is not str type : {}!", other.type_name()))?,
            }
        }
        Ok(Value::Dict(map))
    }

    /// `global.NAME`, `global.context`, `global.info`.
    fn eval_global_ref(&mut self, node: &AstNode) -> EvalResult<Binding> {
        let Some(inner) = node.kid(0) else {
            return Ok(Binding::value(Value::Null));
        };
        if inner.is(kind::OBJ_BUILT_IN) {
            let value = match inner.kid(0).map(|k| k.kind.as_str()) {
                Some(kind::KW_INFO) => self.global_info(),
                _ => Value::Dict(self.store.globals().into_iter().collect()),
            };
            return Ok(Binding::value(value));
        }
        let name = inner.token_text();
        if self.store.get_global(name).is_none() && !self.ctx.assign_mode {
            self.rt_error(node, format!("Global not defined - {name}"))?;
            return Ok(Binding::value(Value::Null));
        }
        let bound = Binding::at(
            Place {
                root: Root::Global(name.to_string()),
                path: Vec::new(),
            },
            self,
        );
        self.bind(node, bound)
    }

    /// `&obj`: the object's `urn:uuid:` string.
    fn eval_ref(&mut self, node: &AstNode) -> EvalResult<Value> {
        let Some(target) = node.kid(0) else {
            return Ok(Value::Null);
        };
        match self.eval_value(target)? {
            Value::Ref(id) => Ok(Value::Str(id.urn())),
            other => {
                self.rt_error(node, format!("{} is not a graph element", other.type_name()))?;
                Ok(Value::Null)
            }
        }
    }

    /// `*s`: the object a reference string names.
    fn eval_deref(&mut self, node: &AstNode) -> EvalResult<Value> {
        let Some(target) = node.kid(0) else {
            return Ok(Value::Null);
        };
        let value = self.eval_value(target)?;
        let found = value
            .as_str()
            .and_then(ObjectId::parse)
            .filter(|id| self.store.has(*id));
        match found {
            Some(id) => Ok(Value::Ref(id)),
            None => {
                self.rt_error(node, format!("{value} not valid reference"))?;
                Ok(Value::Null)
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Atoms & trailers
    // ══════════════════════════════════════════════════════════════════════

    fn eval_atom(&mut self, node: &AstNode) -> EvalResult<Binding> {
        let Some(base) = node.kid(0) else {
            return Ok(Binding::value(Value::Null));
        };
        if base.is(kind::ABILITY_OP) {
            // `::name(ctx)` at the start of an atom calls on the scope subject
            let subject = self.frame.scope.borrow().subject;
            let target = subject.map_or(Value::Null, Value::Ref);
            return self.call_ability_on(target, node.kid(1), node.kid(2), node);
        }
        let (mut current, consumed) = match self.std_action_path(node) {
            Some((action, consumed)) => (Binding::value(action), consumed),
            None => (self.eval(base)?, 1),
        };
        for trailer in &node.kids[consumed..] {
            current = self.eval_trailer(current, trailer)?;
        }
        Ok(current)
    }

    /// `std.log` and friends: an unresolvable base name followed by field
    /// trailers that together spell a builtin action.
    fn std_action_path(&self, node: &AstNode) -> Option<(Value, usize)> {
        let base = node.kid(0).filter(|b| b.is(kind::NAME))?;
        let mut path = base.token_text().to_string();
        if matches!(path.as_str(), "here" | "visitor") || self.resolve_root(&path, false).is_some() {
            return None;
        }
        for (i, trailer) in node.kids.iter().enumerate().skip(1) {
            let segment = trailer.kid(0).filter(|k| k.is(kind::NAME))?;
            path.push('.');
            path.push_str(segment.token_text());
            if let Some(builtin) = BuiltinAction::from_name(&path) {
                let action = self.registry.builtin_action(builtin)?;
                return Some((Value::Action(ActionRef { action, target: None }), i + 1));
            }
        }
        None
    }

    fn eval_trailer(&mut self, base: Binding, trailer: &AstNode) -> EvalResult<Binding> {
        let Some(inner) = trailer.kid(0) else {
            return Ok(base);
        };
        match inner.kind.as_str() {
            kind::NAME => self.eval_field(base, inner),
            kind::BUILT_IN => match inner.kid(0) {
                Some(builtin) => self.eval_builtin(base, builtin),
                None => Ok(base),
            },
            kind::INDEX_SLICE => self.eval_index(base, inner),
            kind::ABILITY_CALL => match inner.kid(0) {
                Some(op) if op.is(kind::ABILITY_OP) => {
                    self.call_ability_on(base.value, inner.kid(1), inner.kid(2), inner)
                }
                params => self.call_value(base.value, params, inner).map(Binding::value),
            },
            other => {
                self.rt_error(trailer, format!("Unexpected trailer {other}"))?;
                Ok(base)
            }
        }
    }

    /// `.name` on an object, a dictionary or a list of objects.
    fn eval_field(&mut self, base: Binding, name_node: &AstNode) -> EvalResult<Binding> {
        let name = name_node.token_text();
        let create = self.ctx.assign_mode;
        match &base.value {
            Value::Ref(id) => {
                let id = *id;
                match base.index(Step::Key(name.to_string()), create, self) {
                    Err(BindingError::UnknownField(_)) => {
                        let ability = self.arch_of(id).and_then(|a| a.ability(name)).cloned();
                        if let Some(action) = ability {
                            return Ok(Binding::value(Value::Action(ActionRef {
                                action,
                                target: Some(id),
                            })));
                        }
                        let arch = self.object(id).map(|o| o.name.clone()).unwrap_or_default();
                        self.rt_error(name_node, format!("{arch} has no field or ability {name}"))?;
                        Ok(Binding::value(Value::Null))
                    }
                    other => self.bind(name_node, other),
                }
            }
            Value::Dict(_) => {
                let found = base.index(Step::Key(name.to_string()), create, self);
                self.bind(name_node, found)
            }
            Value::List(items) if !items.is_empty() && items.iter().all(|v| v.as_ref_id().is_some()) => {
                let mut plucked = Vec::with_capacity(items.len());
                for id in items.iter().filter_map(Value::as_ref_id) {
                    match self.object(id).and_then(|o| o.context.get(name)) {
                        Some(v) => plucked.push(v.clone()),
                        None => {
                            self.rt_error(name_node, format!("Some elements in set does not have {name}"))?;
                            return Ok(Binding::value(Value::Null));
                        }
                    }
                }
                Ok(Binding::value(Value::List(plucked)))
            }
            _ => {
                self.rt_error(name_node, format!("Invalid variable {name}"))?;
                Ok(Binding::value(Value::Null))
            }
        }
    }

    /// `[i]`, `["key"]` or `[a:b]`.
    fn eval_index(&mut self, base: Binding, node: &AstNode) -> EvalResult<Binding> {
        let create = self.ctx.assign_mode;
        let step = match node.kids.as_slice() {
            [index] => match self.eval_in_mode(index, false)?.detach() {
                Value::Int(i) => Step::Index(i),
                Value::Str(key) => Step::Key(key),
                other => {
                    self.rt_error(
                        node,
                        format!(
                            "Index of type {} not valid. Indicies must be an integer or string!",
                            other.type_name()
                        ),
                    )?;
                    return Ok(Binding::value(Value::Null));
                }
            },
            [start, end] => {
                let start = self.eval_in_mode(start, false)?.detach();
                let end = self.eval_in_mode(end, false)?.detach();
                match (start, end) {
                    (s @ (Value::Int(_) | Value::Null), e @ (Value::Int(_) | Value::Null)) => {
                        Step::Slice(s.as_int().unwrap_or(0), e.as_int().unwrap_or(i64::MAX))
                    }
                    _ => {
                        self.rt_error(node, "List slice range not valid. Indicies must be an integers!")?;
                        return Ok(Binding::value(Value::Null));
                    }
                }
            }
            _ => return Ok(base),
        };
        let found = base.index(step, create, self);
        self.bind(node, found)
    }

    /// Positional and keyword arguments of a `param_list`.
    pub(crate) fn eval_params(&mut self, params: Option<&AstNode>) -> EvalResult<Args> {
        let mut args = Args::default();
        let Some(params) = params.filter(|p| p.is(kind::PARAM_LIST)) else {
            return Ok(args);
        };
        for part in &params.kids {
            match part.kind.as_str() {
                kind::EXPR_LIST => args.positional = self.eval_list(Some(part))?,
                kind::KW_EXPR_LIST => {
                    for pair in part.kids.chunks(2) {
                        let [name, value] = pair else { continue };
                        let value = self.eval_in_mode(value, false)?.detach();
                        args.keyword.insert(name.token_text().to_string(), value);
                    }
                }
                _ => {}
            }
        }
        Ok(args)
    }
}
