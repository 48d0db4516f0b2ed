//! Dynamic values.
//!
//! Every expression evaluates to a [`Value`]. Graph objects are never held
//! by value: a [`Value::Ref`] carries only the [`ObjectId`] and is resolved
//! through the object store on demand.
//!
//! Arithmetic, comparison and string rendering follow the Python-flavoured
//! semantics Jac programs expect: `/` always yields a float, `%` takes the
//! sign of the divisor, `1.0` prints as `1.0` and `None`/`True`/`False` print
//! capitalised.

use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::architype::ActionRef;

// ══════════════════════════════════════════════════════════════════════════════
// Object identity
// ══════════════════════════════════════════════════════════════════════════════

const URN_PREFIX: &str = "urn:uuid:";
const JAC_REF_PREFIX: &str = "jac:uuid:";
/// Largest string (bytes) or list (elements) a repetition may build.
const MAX_REPEAT_LEN: usize = 1 << 24;

/// Identity of a graph object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// `urn:uuid:<uuid>`, the form `&obj` evaluates to.
    pub fn urn(&self) -> String {
        self.0.urn().to_string()
    }

    /// Parse a bare uuid, a `urn:uuid:` string or a `jac:uuid:` string.
    pub fn parse(text: &str) -> Option<Self> {
        let bare = text
            .strip_prefix(URN_PREFIX)
            .or_else(|| text.strip_prefix(JAC_REF_PREFIX))
            .unwrap_or(text);
        Uuid::parse_str(bare).ok().map(Self)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.urn())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Type tags
// ══════════════════════════════════════════════════════════════════════════════

/// A type used as a value: cast targets and type-tag atoms like `int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Str,
    Int,
    Float,
    List,
    Dict,
    Bool,
    Node,
    Edge,
    Type,
    Null,
}

impl TypeTag {
    /// Map an `any_type` leaf kind to its tag.
    pub fn from_kind(kind_name: &str) -> Option<Self> {
        use jac_types::ast::kind;
        Some(match kind_name {
            kind::TYP_STRING => Self::Str,
            kind::TYP_INT => Self::Int,
            kind::TYP_FLOAT => Self::Float,
            kind::TYP_LIST => Self::List,
            kind::TYP_DICT => Self::Dict,
            kind::TYP_BOOL => Self::Bool,
            kind::KW_NODE => Self::Node,
            kind::KW_EDGE => Self::Edge,
            kind::KW_TYPE => Self::Type,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Str => "STR",
            Self::Int => "INT",
            Self::Float => "FLOAT",
            Self::List => "LIST",
            Self::Dict => "DICT",
            Self::Bool => "BOOL",
            Self::Node => "NODE",
            Self::Edge => "EDGE",
            Self::Type => "TYPE",
            Self::Null => "NULL",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "STR" => Self::Str,
            "INT" => Self::Int,
            "FLOAT" => Self::Float,
            "LIST" => Self::List,
            "DICT" => Self::Dict,
            "BOOL" => Self::Bool,
            "NODE" => Self::Node,
            "EDGE" => Self::Edge,
            "TYPE" => Self::Type,
            "NULL" => Self::Null,
            _ => return None,
        })
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JAC_TYPE.{}", self.name())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Value
// ══════════════════════════════════════════════════════════════════════════════

/// A dynamically typed Jac value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(IndexMap<String, Value>),
    /// A node, edge, walker or graph object, by id.
    Ref(ObjectId),
    Type(TypeTag),
    /// An ability or builtin action bound to its target object.
    Action(ActionRef),
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
        }
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Ref(_) => "jac_ref",
            Self::Type(_) => "type",
            Self::Action(_) => "action",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(l) => !l.is_empty(),
            Self::Dict(d) => !d.is_empty(),
            Self::Ref(_) | Self::Type(_) | Self::Action(_) => true,
        }
    }

    pub fn as_ref_id(&self) -> Option<ObjectId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }

    /// Object ids in a single reference or a list of references.
    ///
    /// `None` if any element is not a reference.
    pub fn ref_ids(&self) -> Option<Vec<ObjectId>> {
        match self {
            Self::Ref(id) => Some(vec![*id]),
            Self::List(items) => items.iter().map(Value::as_ref_id).collect(),
            _ => None,
        }
    }

    /// False for values with no JSON form: type tags, actions and
    /// non-finite floats, anywhere in the value.
    pub fn is_serializable(&self) -> bool {
        match self {
            Self::Type(_) | Self::Action(_) => false,
            Self::Float(f) => f.is_finite(),
            Self::List(items) => items.iter().all(Value::is_serializable),
            Self::Dict(map) => map.values().all(Value::is_serializable),
            _ => true,
        }
    }

    // ── Operators ────────────────────────────────────────────────────────────

    pub fn arith(&self, op: ArithOp, rhs: &Value) -> Result<Value, String> {
        use Value::*;
        let unsupported = || {
            format!(
                "unsupported operand type(s) for {}: '{}' and '{}'",
                op.symbol(),
                self.type_name(),
                rhs.type_name()
            )
        };
        match (op, self, rhs) {
            (ArithOp::Add, Str(a), Str(b)) => Ok(Str(format!("{a}{b}"))),
            (ArithOp::Add, List(a), List(b)) => Ok(List(a.iter().chain(b).cloned().collect())),
            (ArithOp::Mul, Str(s), n) | (ArithOp::Mul, n, Str(s)) if n.is_integral() => {
                let times = repeat_count(s.len(), n)?;
                Ok(Str(s.repeat(times)))
            }
            (ArithOp::Mul, List(l), n) | (ArithOp::Mul, n, List(l)) if n.is_integral() => {
                let times = repeat_count(l.len(), n)?;
                Ok(List(l.iter().cloned().cycle().take(l.len() * times).collect()))
            }
            _ if self.is_integral() && rhs.is_integral() => {
                let (a, b) = (self.as_int().unwrap_or(0), rhs.as_int().unwrap_or(0));
                int_arith(op, a, b)
            }
            _ => match (self.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => float_arith(op, a, b),
                _ => Err(unsupported()),
            },
        }
    }

    fn is_integral(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Bool(_))
    }

    /// Ordering for `<`, `>`, `<=`, `>=`; `None` when the kinds don't compare.
    pub fn compare(&self, rhs: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, rhs) {
            (Str(a), Str(b)) => Some(a.cmp(b)),
            (List(a), List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        other => return Some(other),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ if self.is_integral() && rhs.is_integral() => {
                Some(self.as_int()?.cmp(&rhs.as_int()?))
            }
            _ => self.as_f64()?.partial_cmp(&rhs.as_f64()?),
        }
    }

    /// `item in self`.
    pub fn contains(&self, item: &Value) -> Result<bool, String> {
        match (self, item) {
            (Value::Str(s), Value::Str(sub)) => Ok(s.contains(sub.as_str())),
            (Value::List(items), _) => Ok(items.contains(item)),
            (Value::Dict(map), Value::Str(key)) => Ok(map.contains_key(key)),
            (Value::Dict(_), _) => Ok(false),
            _ => Err(format!(
                "argument of type '{}' is not iterable",
                self.type_name()
            )),
        }
    }

    /// Python `repr`-style rendering, used for elements inside containers.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => other.to_string(),
        }
    }

    // ── JSON ─────────────────────────────────────────────────────────────────

    /// JSON form. References become `"jac:uuid:<uuid>"` strings and type
    /// tags become `"JAC_TYPE.<NAME>"`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map_or(J::Null, J::Number),
            Value::Str(s) => J::String(s.clone()),
            Value::List(items) => J::Array(items.iter().map(Value::to_json).collect()),
            Value::Dict(map) => J::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Ref(id) => J::String(format!("{JAC_REF_PREFIX}{}", id.0)),
            Value::Type(tag) => J::String(tag.to_string()),
            Value::Action(action) => J::String(format!("jac:action:{}", action.action.name)),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as J;
        match json {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(*b),
            J::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            J::String(s) => {
                if let Some(id) = s.strip_prefix(JAC_REF_PREFIX).and_then(ObjectId::parse) {
                    Value::Ref(id)
                } else if let Some(tag) = s.strip_prefix("JAC_TYPE.").and_then(TypeTag::from_name) {
                    Value::Type(tag)
                } else {
                    Value::Str(s.clone())
                }
            }
            J::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            J::Object(map) => Value::Dict(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Repetition count for `seq * n`, bounded by [`MAX_REPEAT_LEN`].
fn repeat_count(len: usize, n: &Value) -> Result<usize, String> {
    let too_large = || "repetition too large".to_string();
    let times = usize::try_from(n.as_int().unwrap_or(0).max(0)).map_err(|_| too_large())?;
    match len.checked_mul(times) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(times),
        _ => Err(too_large()),
    }
}

fn int_arith(op: ArithOp, a: i64, b: i64) -> Result<Value, String> {
    let overflow = || "integer overflow".to_string();
    match op {
        ArithOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
        ArithOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
        ArithOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
        ArithOp::Div => {
            if b == 0 {
                return Err("division by zero".into());
            }
            Ok(Value::Float(a as f64 / b as f64))
        }
        ArithOp::Mod => {
            if b == 0 {
                return Err("integer modulo by zero".into());
            }
            // the result takes the sign of the divisor
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            if r != 0 && (r < 0) != (b < 0) {
                r.checked_add(b).map(Value::Int).ok_or_else(overflow)
            } else {
                Ok(Value::Int(r))
            }
        }
        ArithOp::Pow => {
            if b < 0 {
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            let exp = u32::try_from(b).map_err(|_| overflow())?;
            a.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
        }
    }
}

fn float_arith(op: ArithOp, a: f64, b: f64) -> Result<Value, String> {
    Ok(Value::Float(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => {
            if b == 0.0 {
                return Err("float division by zero".into());
            }
            a / b
        }
        ArithOp::Mod => {
            if b == 0.0 {
                return Err("float modulo".into());
            }
            a - b * (a / b).floor()
        }
        ArithOp::Pow => a.powf(b),
    }))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (Str(a), Str(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Dict(a), Dict(b)) => a == b,
            (Ref(a), Ref(b)) => a == b,
            (Type(a), Type(b)) => a == b,
            (Action(a), Action(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 => {
                write!(f, "{x:.1}")
            }
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Dict(map) => {
                let parts: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("'{k}': {}", v.repr()))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Ref(id) => write!(f, "{id}"),
            Value::Type(tag) => write!(f, "{tag}"),
            Value::Action(action) => write!(f, "action:{}", action.action.name),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(|json| Value::from_json(&json))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn python_style_division_and_modulo() {
        assert_eq!(Value::Int(7).arith(ArithOp::Div, &Value::Int(2)), Ok(Value::Float(3.5)));
        assert_eq!(Value::Int(-7).arith(ArithOp::Mod, &Value::Int(3)), Ok(Value::Int(2)));
        assert_eq!(Value::Int(7).arith(ArithOp::Mod, &Value::Int(-3)), Ok(Value::Int(-2)));
        assert!(Value::Int(1).arith(ArithOp::Div, &Value::Int(0)).is_err());
    }

    #[test]
    fn power_and_overflow() {
        assert_eq!(Value::Int(2).arith(ArithOp::Pow, &Value::Int(10)), Ok(Value::Int(1024)));
        assert_eq!(Value::Int(2).arith(ArithOp::Pow, &Value::Int(-1)), Ok(Value::Float(0.5)));
        assert_eq!(
            Value::Int(i64::MAX).arith(ArithOp::Add, &Value::Int(1)),
            Err("integer overflow".to_string())
        );
    }

    #[test]
    fn modulo_at_the_edges_of_i64() {
        assert_eq!(
            Value::Int(i64::MIN).arith(ArithOp::Mod, &Value::Int(-1)),
            Err("integer overflow".to_string())
        );
        assert_eq!(
            Value::Int(i64::MAX - 1).arith(ArithOp::Mod, &Value::Int(i64::MAX)),
            Ok(Value::Int(i64::MAX - 1))
        );
        assert_eq!(
            Value::Int(-1).arith(ArithOp::Mod, &Value::Int(i64::MAX)),
            Ok(Value::Int(i64::MAX - 1))
        );
    }

    #[test]
    fn huge_repetition_is_an_error() {
        let err = Value::str("ab").arith(ArithOp::Mul, &Value::Int(i64::MAX)).unwrap_err();
        assert_eq!(err, "repetition too large");
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert!(list.arith(ArithOp::Mul, &Value::Int(i64::MAX)).is_err());
        assert_eq!(list.arith(ArithOp::Mul, &Value::Int(-2)), Ok(Value::List(Vec::new())));
    }

    #[test]
    fn string_and_list_operators() {
        assert_eq!(Value::str("ab").arith(ArithOp::Add, &Value::str("c")), Ok(Value::str("abc")));
        assert_eq!(Value::str("ab").arith(ArithOp::Mul, &Value::Int(2)), Ok(Value::str("abab")));
        assert_eq!(
            Value::List(vec![Value::Int(1)]).arith(ArithOp::Mul, &Value::Int(3)),
            Ok(Value::List(vec![Value::Int(1); 3]))
        );
        let err = Value::str("a").arith(ArithOp::Sub, &Value::Int(1)).unwrap_err();
        assert!(err.contains("unsupported operand"), "{err}");
    }

    #[test]
    fn int_float_equality_and_ordering() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert_eq!(Value::str("a").compare(&Value::Int(1)), None);
    }

    #[test]
    fn display_is_python_like() {
        let list = Value::List(vec![Value::str("a"), Value::Int(1), Value::Float(2.0), Value::Null]);
        assert_eq!(list.to_string(), "['a', 1, 2.0, None]");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Type(TypeTag::Int).to_string(), "JAC_TYPE.INT");
    }

    #[test]
    fn references_round_trip_through_json() {
        let id = ObjectId::new();
        let value = Value::List(vec![Value::Ref(id), Value::Int(3)]);
        let json = value.to_json();
        assert_eq!(json[0], json!(format!("jac:uuid:{}", id.0)));
        assert_eq!(Value::from_json(&json), value);
    }

    #[test]
    fn object_id_parses_urn_forms() {
        let id = ObjectId::new();
        assert_eq!(ObjectId::parse(&id.urn()), Some(id));
        assert_eq!(ObjectId::parse(&format!("jac:uuid:{}", id.0)), Some(id));
        assert_eq!(ObjectId::parse("not-a-uuid"), None);
    }

    #[test]
    fn membership() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(list.contains(&Value::Int(2)), Ok(true));
        assert_eq!(Value::str("hello").contains(&Value::str("ell")), Ok(true));
        assert!(Value::Int(3).contains(&Value::Int(3)).is_err());
    }
}
