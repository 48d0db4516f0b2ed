//! Built-in trailers: casts, object introspection and the `str::`,
//! `list::` and `dict::` method tables.

use jac_types::ast::kind;
use jac_types::AstNode;

use super::Evaluator;
use crate::binding::{Binding, BindingError};
use crate::builtins::{DictOp, ListOp, StrOp};
use crate::error::EvalResult;
use crate::graph;
use crate::value::{ObjectId, TypeTag, Value};

impl<'a> Evaluator<'a> {
    pub(crate) fn eval_builtin(&mut self, base: Binding, builtin: &AstNode) -> EvalResult<Binding> {
        let head = builtin.kid(0).map_or("", |k| k.kind.as_str());
        match (builtin.kind.as_str(), head) {
            (kind::CAST_BUILT_IN, _) => {
                let tag = builtin
                    .kid(0)
                    .and_then(|t| t.kid(0))
                    .and_then(|leaf| TypeTag::from_kind(&leaf.kind));
                let Some(tag) = tag else {
                    return Ok(base);
                };
                self.cast(builtin, base.value, tag).map(Binding::value)
            }
            (kind::OBJ_BUILT_IN, word) => self.object_builtin(builtin, &base.value, word).map(Binding::value),
            (kind::LIST_BUILT_IN, kind::KW_LENGTH) => match &base.value {
                Value::List(items) => Ok(Binding::value(Value::Int(items.len() as i64))),
                other => {
                    self.rt_error(builtin, format!("Cannot get length of {other}. Not List!"))?;
                    Ok(Binding::value(Value::Null))
                }
            },
            (kind::DICT_BUILT_IN, kind::KW_KEYS) => match &base.value {
                Value::Dict(map) => Ok(Binding::value(Value::List(
                    map.keys().map(|k| Value::Str(k.clone())).collect(),
                ))),
                other => {
                    self.rt_error(builtin, format!("Cannot get keys of {other}. Not Dictionary!"))?;
                    Ok(Binding::value(Value::Null))
                }
            },
            (table, _) => self.method_call(base, builtin, table),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Object introspection
    // ══════════════════════════════════════════════════════════════════════

    fn object_builtin(&mut self, at: &AstNode, value: &Value, word: &str) -> EvalResult<Value> {
        let Some(obj) = value.as_ref_id().and_then(|id| self.object(id)) else {
            self.rt_error(at, format!("{} is not a graph element", value.type_name()))?;
            return Ok(Value::Null);
        };
        Ok(match word {
            kind::KW_INFO => obj.info(),
            kind::KW_DETAILS => obj.details(),
            _ => Value::Dict(obj.context.clone()),
        })
    }

    // ══════════════════════════════════════════════════════════════════════
    // Casts
    // ══════════════════════════════════════════════════════════════════════

    /// `value.int`, `value.node` and friends. A failed cast is a runtime
    /// error and leaves the value as it was.
    fn cast(&mut self, at: &AstNode, value: Value, tag: TypeTag) -> EvalResult<Value> {
        match self.try_cast(&value, tag) {
            Ok(cast) => Ok(cast),
            Err(reason) => {
                self.rt_error(
                    at,
                    format!("Invalid cast of {} to {}: {reason}", value.type_name(), tag.name()),
                )?;
                Ok(value)
            }
        }
    }

    fn try_cast(&self, value: &Value, tag: TypeTag) -> Result<Value, String> {
        match tag {
            TypeTag::Str => Ok(Value::Str(match value {
                Value::Dict(_) => serde_json::to_string(&value.to_json()).map_err(|e| e.to_string())?,
                other => other.to_string(),
            })),
            TypeTag::Int => match value {
                Value::Int(i) => Ok(Value::Int(*i)),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
                Value::Str(s) => s.trim().parse().map(Value::Int).map_err(|e| format!("{e}")),
                _ => Err("not a number".into()),
            },
            TypeTag::Float => match value {
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Float(f) => Ok(Value::Float(*f)),
                Value::Bool(b) => Ok(Value::Float(f64::from(u8::from(*b)))),
                Value::Str(s) => s.trim().parse().map(Value::Float).map_err(|e| format!("{e}")),
                _ => Err("not a number".into()),
            },
            TypeTag::Bool => Ok(Value::Bool(value.is_truthy())),
            TypeTag::List => match value {
                Value::List(items) => Ok(Value::List(items.clone())),
                Value::Str(s) => Ok(Value::List(s.chars().map(|c| Value::Str(c.to_string())).collect())),
                Value::Dict(map) => Ok(Value::List(map.keys().map(|k| Value::Str(k.clone())).collect())),
                _ => Err("not iterable".into()),
            },
            TypeTag::Dict => match value {
                Value::Dict(map) => Ok(Value::Dict(map.clone())),
                Value::Str(s) => match serde_json::from_str::<serde_json::Value>(s) {
                    Ok(json @ serde_json::Value::Object(_)) => Ok(Value::from_json(&json)),
                    Ok(_) => Err("not a JSON object".into()),
                    Err(e) => Err(e.to_string()),
                },
                Value::List(pairs) => {
                    let mut map = indexmap::IndexMap::new();
                    for pair in pairs {
                        match pair {
                            Value::List(kv) if kv.len() == 2 => {
                                let key = kv[0].as_str().ok_or("keys must be strings")?;
                                map.insert(key.to_string(), kv[1].clone());
                            }
                            _ => return Err("elements must be key/value pairs".into()),
                        }
                    }
                    Ok(Value::Dict(map))
                }
                _ => Err("not a mapping".into()),
            },
            TypeTag::Node => self.nodes_of(value).map(one_or_list),
            TypeTag::Edge => self.edges_of(value).map(one_or_list),
            TypeTag::Type => Ok(Value::Type(self.type_tag_of(value))),
            TypeTag::Null => Ok(Value::Null),
        }
    }

    fn type_tag_of(&self, value: &Value) -> TypeTag {
        match value {
            Value::Null | Value::Action(_) => TypeTag::Null,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Str(_) => TypeTag::Str,
            Value::List(_) => TypeTag::List,
            Value::Dict(_) => TypeTag::Dict,
            Value::Type(_) => TypeTag::Type,
            Value::Ref(id) if graph::is_edge(&*self.store, *id) => TypeTag::Edge,
            Value::Ref(_) => TypeTag::Node,
        }
    }

    /// Nodes behind a value: a node itself, both ends of an edge, or the
    /// flattened nodes of a list.
    fn nodes_of(&self, value: &Value) -> Result<Vec<ObjectId>, String> {
        match value {
            Value::Ref(id) => match self.object(*id).map(|o| (o.as_node().is_some(), o.as_edge())) {
                Some((true, _)) => Ok(vec![*id]),
                Some((false, Some(edge))) => Ok(edge.ends().map(|(a, b)| vec![a, b]).unwrap_or_default()),
                _ => Err("not a node or edge".into()),
            },
            Value::List(items) => {
                let mut out = Vec::new();
                for item in items {
                    for id in self.nodes_of(item)? {
                        if !out.contains(&id) {
                            out.push(id);
                        }
                    }
                }
                Ok(out)
            }
            _ => Err("not a graph element".into()),
        }
    }

    /// Edges behind a value: an edge itself, the edges between `here` and
    /// a node, or the concatenated edges of a list.
    fn edges_of(&self, value: &Value) -> Result<Vec<ObjectId>, String> {
        match value {
            Value::Ref(id) if graph::is_edge(&*self.store, *id) => Ok(vec![*id]),
            Value::Ref(id) if self.is_node(*id) => {
                let here = self.frame.here.ok_or("no current node")?;
                graph::edges_between(&*self.store, here, *id).map_err(|e| e.to_string())
            }
            Value::List(items) => {
                let mut out = Vec::new();
                for item in items {
                    out.extend(self.edges_of(item)?);
                }
                Ok(out)
            }
            _ => Err("not a graph element".into()),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Method tables
    // ══════════════════════════════════════════════════════════════════════

    /// `s.str::upper`, `l.list::append(x)`, `d.dict::pop("k")`.
    ///
    /// Mutating list and dict methods write the container back through the
    /// base binding; an unbound container is changed in place only. A failed
    /// call evaluates to the receiver.
    fn method_call(&mut self, mut base: Binding, builtin: &AstNode, table: &str) -> EvalResult<Binding> {
        let Some(name_node) = builtin.kid(0) else {
            return Ok(base);
        };
        let name = name_node.token_text();
        let args = self.eval_list(builtin.kid(1))?;

        let result = match (table, base.value.clone()) {
            (kind::STRING_BUILT_IN, Value::Str(s)) => StrOp::from_name(name).map(|op| op.apply(&s, &args)),
            (kind::LIST_BUILT_IN, Value::List(mut items)) => match ListOp::from_name(name) {
                Some(op) => {
                    let result = op.apply(&mut items, &args);
                    if result.is_ok() && op.mutates() {
                        self.write_back(builtin, &mut base, Value::List(items))?;
                    }
                    Some(result)
                }
                None => None,
            },
            (kind::DICT_BUILT_IN, Value::Dict(mut map)) => match DictOp::from_name(name) {
                Some(op) => {
                    let result = op.apply(&mut map, &args);
                    if result.is_ok() && op.mutates() {
                        self.write_back(builtin, &mut base, Value::Dict(map))?;
                    }
                    Some(result)
                }
                None => None,
            },
            (_, other) => {
                let expected = match table {
                    kind::STRING_BUILT_IN => "string",
                    kind::LIST_BUILT_IN => "list",
                    _ => "dictionary",
                };
                self.rt_error(builtin, format!("{} is not a {expected}", other.type_name()))?;
                return Ok(base);
            }
        };
        match result {
            Some(Ok(value)) => Ok(Binding::value(value)),
            Some(Err(msg)) => {
                self.rt_error(builtin, msg)?;
                Ok(base)
            }
            None => {
                self.rt_error(name_node, format!("Call to {name} is invalid."))?;
                Ok(base)
            }
        }
    }

    fn write_back(&mut self, at: &AstNode, base: &mut Binding, updated: Value) -> EvalResult<()> {
        match base.write(self, updated.clone()) {
            Ok(()) => Ok(()),
            Err(BindingError::NotAssignable) => {
                base.value = updated;
                Ok(())
            }
            Err(e) => self.rt_error(at, e.to_string()),
        }
    }
}

fn one_or_list(ids: Vec<ObjectId>) -> Value {
    match ids.as_slice() {
        [one] => Value::Ref(*one),
        _ => Value::List(ids.into_iter().map(Value::Ref).collect()),
    }
}
