//! Bindings: values that remember where they came from.
//!
//! Evaluating the left side of an assignment yields a [`Binding`] whose
//! [`Place`] names a root slot (a local, an object field or a global) and
//! a path of index/key/slice steps into it. Writing re-reads the root,
//! updates the nested slot and writes the whole root back, so
//! `here.data["k"][0] = 1` lands in the node's stored context.

use std::fmt;

use thiserror::Error;

use crate::scope::ScopeRef;
use crate::value::{ObjectId, Value};

/// Where a place's root value lives.
#[derive(Clone)]
pub enum Root {
    Local(ScopeRef, String),
    Field(ObjectId, String),
    Global(String),
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Root::Local(_, name) => write!(f, "Local({name})"),
            Root::Field(id, name) => write!(f, "Field({id}, {name})"),
            Root::Global(name) => write!(f, "Global({name})"),
        }
    }
}

/// One step into a container.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Key(String),
    Index(i64),
    Slice(i64, i64),
}

/// An assignable location.
#[derive(Debug, Clone)]
pub struct Place {
    pub root: Root,
    pub path: Vec<Step>,
}

/// A value plus, when it was read from a slot, the slot it came from.
#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub place: Option<Place>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    #[error("Value is not assignable")]
    NotAssignable,
    #[error("Key '{0}' not found")]
    KeyMissing(String),
    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("Cannot index {found} with {step}")]
    TypeMismatch { found: &'static str, step: &'static str },
    #[error("'{0}' is not a field of this object")]
    UnknownField(String),
    #[error("Creating variable {0} in graph element is not allowed, please define")]
    UndeclaredField(String),
    #[error("Object {0} no longer exists")]
    MissingObject(ObjectId),
    #[error("Cannot delete {0}")]
    NotDeletable(String),
}

/// Storage behind the roots of places.
pub trait SlotHost {
    fn field(&self, id: ObjectId, name: &str) -> Result<Value, BindingError>;
    fn set_field(&mut self, id: ObjectId, name: &str, value: Value) -> Result<(), BindingError>;
    fn global(&self, name: &str) -> Option<Value>;
    fn set_global(&mut self, name: &str, value: Value);
}

impl Binding {
    /// A value that came from no slot.
    pub fn value(value: Value) -> Self {
        Self { value, place: None }
    }

    /// Bind the root slot of `place`, reading its current value.
    pub fn at(place: Place, host: &dyn SlotHost) -> Result<Self, BindingError> {
        let mut binding = Self {
            value: Value::Null,
            place: Some(place),
        };
        binding.value = binding.read(host)?;
        Ok(binding)
    }

    pub fn is_assignable(&self) -> bool {
        self.place.is_some()
    }

    /// Fresh read through the place, or the held value if there is none.
    pub fn read(&self, host: &dyn SlotHost) -> Result<Value, BindingError> {
        let Some(place) = &self.place else {
            return Ok(self.value.clone());
        };
        let mut current = read_root(&place.root, host)?;
        for step in &place.path {
            current = get_step(&current, step)?;
        }
        Ok(current)
    }

    /// Write `value` through the place.
    pub fn write(&mut self, host: &mut dyn SlotHost, value: Value) -> Result<(), BindingError> {
        let Some(place) = &self.place else {
            return Err(BindingError::NotAssignable);
        };
        let updated = if place.path.is_empty() {
            value.clone()
        } else {
            let mut root = read_root(&place.root, host)?;
            set_path(&mut root, &place.path, value.clone())?;
            root
        };
        write_root(&place.root, host, updated)?;
        self.value = value;
        Ok(())
    }

    /// The held value, detached from its slot.
    pub fn detach(self) -> Value {
        self.value
    }

    /// Binding for `step` inside this value.
    ///
    /// A key step on an object reference rebases onto that object's field.
    /// With `create`, a missing dictionary key reads as null instead of
    /// failing, so that a following write adds it.
    pub fn index(&self, step: Step, create: bool, host: &dyn SlotHost) -> Result<Binding, BindingError> {
        if let (Value::Ref(id), Step::Key(name)) = (&self.value, &step) {
            let value = match host.field(*id, name) {
                Ok(v) => v,
                Err(BindingError::UnknownField(_)) if create => Value::Null,
                Err(e) => return Err(e),
            };
            return Ok(Binding {
                value,
                place: Some(Place {
                    root: Root::Field(*id, name.clone()),
                    path: Vec::new(),
                }),
            });
        }
        let value = match get_step(&self.value, &step) {
            Ok(v) => v,
            Err(BindingError::KeyMissing(_)) if create => Value::Null,
            Err(e) => return Err(e),
        };
        let place = self.place.as_ref().map(|p| {
            let mut path = p.path.clone();
            path.push(step);
            Place {
                root: p.root.clone(),
                path,
            }
        });
        Ok(Binding { value, place })
    }

    /// Delete the slot: a local variable, a dictionary key or a list element.
    pub fn remove(&self, host: &mut dyn SlotHost) -> Result<(), BindingError> {
        let Some(place) = &self.place else {
            return Err(BindingError::NotAssignable);
        };
        let Some((last, parents)) = place.path.split_last() else {
            return match &place.root {
                Root::Local(scope, name) => {
                    scope.borrow_mut().locals.shift_remove(name);
                    Ok(())
                }
                Root::Field(_, name) => Err(BindingError::NotDeletable(format!("field '{name}'"))),
                Root::Global(name) => Err(BindingError::NotDeletable(format!("global '{name}'"))),
            };
        };
        let mut root = read_root(&place.root, host)?;
        let container = walk_mut(&mut root, parents)?;
        match (container, last) {
            (Value::Dict(map), Step::Key(key)) => {
                map.shift_remove(key)
                    .ok_or_else(|| BindingError::KeyMissing(key.clone()))?;
            }
            (Value::List(items), Step::Index(i)) => {
                let idx = resolve_index(*i, items.len())?;
                items.remove(idx);
            }
            (other, step) => return Err(mismatch(other, step)),
        }
        write_root(&place.root, host, root)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Path helpers
// ══════════════════════════════════════════════════════════════════════════════

fn read_root(root: &Root, host: &dyn SlotHost) -> Result<Value, BindingError> {
    match root {
        Root::Local(scope, name) => Ok(scope.borrow().locals.get(name).cloned().unwrap_or_default()),
        Root::Field(id, name) => host.field(*id, name),
        Root::Global(name) => Ok(host.global(name).unwrap_or_default()),
    }
}

fn write_root(root: &Root, host: &mut dyn SlotHost, value: Value) -> Result<(), BindingError> {
    match root {
        Root::Local(scope, name) => {
            scope.borrow_mut().locals.insert(name.clone(), value);
            Ok(())
        }
        Root::Field(id, name) => host.set_field(*id, name, value),
        Root::Global(name) => {
            host.set_global(name, value);
            Ok(())
        }
    }
}

fn step_name(step: &Step) -> &'static str {
    match step {
        Step::Key(_) => "a key",
        Step::Index(_) => "an index",
        Step::Slice(..) => "a slice",
    }
}

fn mismatch(found: &Value, step: &Step) -> BindingError {
    BindingError::TypeMismatch {
        found: found.type_name(),
        step: step_name(step),
    }
}

/// Python-style index: negative counts from the end.
pub(crate) fn resolve_index(index: i64, len: usize) -> Result<usize, BindingError> {
    let signed_len = len as i64;
    let idx = if index < 0 { index + signed_len } else { index };
    if idx < 0 || idx >= signed_len {
        return Err(BindingError::IndexOutOfRange { index, len });
    }
    Ok(idx as usize)
}

/// Python-style slice bounds, clamped into `0..=len`.
pub(crate) fn slice_bounds(start: i64, end: i64, len: usize) -> (usize, usize) {
    let signed_len = len as i64;
    let clamp = |i: i64| {
        let i = if i < 0 { i + signed_len } else { i };
        i.clamp(0, signed_len) as usize
    };
    let (s, e) = (clamp(start), clamp(end));
    (s, e.max(s))
}

fn get_step(value: &Value, step: &Step) -> Result<Value, BindingError> {
    match (value, step) {
        (Value::Dict(map), Step::Key(key)) => map
            .get(key)
            .cloned()
            .ok_or_else(|| BindingError::KeyMissing(key.clone())),
        (Value::List(items), Step::Index(i)) => Ok(items[resolve_index(*i, items.len())?].clone()),
        (Value::Str(s), Step::Index(i)) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[resolve_index(*i, chars.len())?].to_string()))
        }
        (Value::List(items), Step::Slice(start, end)) => {
            let (s, e) = slice_bounds(*start, *end, items.len());
            Ok(Value::List(items[s..e].to_vec()))
        }
        (Value::Str(text), Step::Slice(start, end)) => {
            let chars: Vec<char> = text.chars().collect();
            let (s, e) = slice_bounds(*start, *end, chars.len());
            Ok(Value::Str(chars[s..e].iter().collect()))
        }
        (other, step) => Err(mismatch(other, step)),
    }
}

fn walk_mut<'v>(value: &'v mut Value, path: &[Step]) -> Result<&'v mut Value, BindingError> {
    let mut current = value;
    for step in path {
        current = match (current, step) {
            (Value::Dict(map), Step::Key(key)) => map
                .get_mut(key)
                .ok_or_else(|| BindingError::KeyMissing(key.clone()))?,
            (Value::List(items), Step::Index(i)) => {
                let idx = resolve_index(*i, items.len())?;
                &mut items[idx]
            }
            (other, step) => return Err(mismatch(other, step)),
        };
    }
    Ok(current)
}

fn set_path(root: &mut Value, path: &[Step], value: Value) -> Result<(), BindingError> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };
    let container = walk_mut(root, parents)?;
    match (container, last) {
        (Value::Dict(map), Step::Key(key)) => {
            map.insert(key.clone(), value);
        }
        (Value::List(items), Step::Index(i)) => {
            let idx = resolve_index(*i, items.len())?;
            items[idx] = value;
        }
        (Value::List(items), Step::Slice(start, end)) => {
            let (s, e) = slice_bounds(*start, *end, items.len());
            let replacement = match value {
                Value::List(new_items) => new_items,
                other => vec![other],
            };
            items.splice(s..e, replacement);
        }
        (other, step) => return Err(mismatch(other, step)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use indexmap::IndexMap;
    use rustc_hash::FxHashMap;

    #[derive(Default)]
    struct Host {
        fields: FxHashMap<(ObjectId, String), Value>,
        globals: IndexMap<String, Value>,
    }

    impl SlotHost for Host {
        fn field(&self, id: ObjectId, name: &str) -> Result<Value, BindingError> {
            self.fields
                .get(&(id, name.to_string()))
                .cloned()
                .ok_or_else(|| BindingError::UnknownField(name.to_string()))
        }
        fn set_field(&mut self, id: ObjectId, name: &str, value: Value) -> Result<(), BindingError> {
            self.fields.insert((id, name.to_string()), value);
            Ok(())
        }
        fn global(&self, name: &str) -> Option<Value> {
            self.globals.get(name).cloned()
        }
        fn set_global(&mut self, name: &str, value: Value) {
            self.globals.insert(name.to_string(), value);
        }
    }

    fn local(scope: &ScopeRef, name: &str, value: Value) -> Binding {
        scope.borrow_mut().locals.insert(name.to_string(), value.clone());
        Binding {
            value,
            place: Some(Place {
                root: Root::Local(scope.clone(), name.to_string()),
                path: Vec::new(),
            }),
        }
    }

    #[test]
    fn write_through_nested_dict() {
        let host = Host::default();
        let scope = Scope::root(None);
        let mut inner = IndexMap::new();
        inner.insert("k".to_string(), Value::List(vec![Value::Int(1), Value::Int(2)]));
        let d = local(&scope, "d", Value::Dict(inner));

        let mut slot = d
            .index(Step::Key("k".into()), false, &host)
            .and_then(|b| b.index(Step::Index(-1), false, &host))
            .unwrap();
        let mut host = host;
        slot.write(&mut host, Value::Int(9)).unwrap();

        assert_eq!(slot.read(&host).unwrap(), Value::Int(9));
        let container = scope.borrow().locals["d"].clone();
        let Value::Dict(map) = container else { panic!("dict") };
        assert_eq!(map["k"], Value::List(vec![Value::Int(1), Value::Int(9)]));
    }

    #[test]
    fn missing_key_creates_only_in_assignment_mode() {
        let mut host = Host::default();
        let scope = Scope::root(None);
        let d = local(&scope, "d", Value::Dict(IndexMap::new()));
        assert_eq!(
            d.index(Step::Key("x".into()), false, &host).unwrap_err(),
            BindingError::KeyMissing("x".into())
        );
        let mut slot = d.index(Step::Key("x".into()), true, &host).unwrap();
        assert_eq!(slot.value, Value::Null);
        slot.write(&mut host, Value::Int(1)).unwrap();
        assert_eq!(d.read(&host).unwrap().to_string(), "{'x': 1}");
    }

    #[test]
    fn key_on_reference_rebases_to_field() {
        let mut host = Host::default();
        let id = ObjectId::new();
        host.fields.insert((id, "name".into()), Value::str("a"));
        let reference = Binding::value(Value::Ref(id));
        let mut field = reference.index(Step::Key("name".into()), false, &host).unwrap();
        assert_eq!(field.value, Value::str("a"));
        field.write(&mut host, Value::str("b")).unwrap();
        assert_eq!(host.fields[&(id, "name".to_string())], Value::str("b"));
    }

    #[test]
    fn slice_read_and_write() {
        let mut host = Host::default();
        let scope = Scope::root(None);
        let list = local(&scope, "l", Value::List((0..5).map(Value::Int).collect()));
        let mut mid = list.index(Step::Slice(1, 3), false, &host).unwrap();
        assert_eq!(mid.value, Value::List(vec![Value::Int(1), Value::Int(2)]));
        mid.write(&mut host, Value::List(vec![Value::Int(7)])).unwrap();
        assert_eq!(list.read(&host).unwrap().to_string(), "[0, 7, 3, 4]");
    }

    #[test]
    fn index_out_of_range() {
        let host = Host::default();
        let list = Binding::value(Value::List(vec![Value::Int(1)]));
        assert_eq!(
            list.index(Step::Index(3), false, &host).unwrap_err(),
            BindingError::IndexOutOfRange { index: 3, len: 1 }
        );
    }

    #[test]
    fn unbound_value_is_not_assignable() {
        let mut host = Host::default();
        let mut b = Binding::value(Value::Int(1));
        assert_eq!(b.write(&mut host, Value::Int(2)), Err(BindingError::NotAssignable));
        assert_eq!(b.detach(), Value::Int(1));
    }

    #[test]
    fn remove_local_and_key() {
        let mut host = Host::default();
        let scope = Scope::root(None);
        let mut map = IndexMap::new();
        map.insert("a".to_string(), Value::Int(1));
        let d = local(&scope, "d", Value::Dict(map));
        d.index(Step::Key("a".into()), false, &host)
            .unwrap()
            .remove(&mut host)
            .unwrap();
        assert_eq!(d.read(&host).unwrap(), Value::Dict(IndexMap::new()));
        d.remove(&mut host).unwrap();
        assert!(!scope.borrow().locals.contains_key("d"));
    }

    #[test]
    fn field_root_cannot_be_deleted() {
        let mut host = Host::default();
        let id = ObjectId::new();
        host.fields.insert((id, "x".into()), Value::Int(1));
        let field = Binding::value(Value::Ref(id))
            .index(Step::Key("x".into()), false, &host)
            .unwrap();
        assert!(matches!(field.remove(&mut host), Err(BindingError::NotDeletable(_))));
    }
}
