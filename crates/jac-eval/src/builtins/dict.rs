//! `.dict::op(...)` methods.

use indexmap::IndexMap;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictOp {
    Items,
    Copy,
    DeepCopy,
    Keys,
    Clear,
    PopItem,
    Values,
    Pop,
    Update,
    Get,
}

impl DictOp {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "items" => Self::Items,
            "copy" => Self::Copy,
            "deepcopy" => Self::DeepCopy,
            "keys" => Self::Keys,
            "clear" => Self::Clear,
            "popitem" => Self::PopItem,
            "values" => Self::Values,
            "pop" => Self::Pop,
            "update" => Self::Update,
            "get" => Self::Get,
            _ => return None,
        })
    }

    /// Whether the receiver must be written back after `apply`.
    pub fn mutates(self) -> bool {
        matches!(self, Self::Clear | Self::PopItem | Self::Pop | Self::Update)
    }

    pub fn apply(self, dict: &mut IndexMap<String, Value>, args: &[Value]) -> Result<Value, String> {
        Ok(match self {
            Self::Items => Value::List(
                dict.iter()
                    .map(|(k, v)| Value::List(vec![Value::str(k), v.clone()]))
                    .collect(),
            ),
            Self::Copy | Self::DeepCopy => Value::Dict(dict.clone()),
            Self::Keys => Value::List(dict.keys().map(Value::str).collect()),
            Self::Values => Value::List(dict.values().cloned().collect()),
            Self::Clear => {
                dict.clear();
                Value::Null
            }
            Self::PopItem => {
                let (k, v) = dict.pop().ok_or("popitem(): dictionary is empty")?;
                Value::List(vec![Value::Str(k), v])
            }
            Self::Pop => {
                let key = key_arg(args)?;
                match (dict.shift_remove(key), args.get(1)) {
                    (Some(v), _) => v,
                    (None, Some(default)) => default.clone(),
                    (None, None) => return Err(format!("Key '{key}' not found")),
                }
            }
            Self::Update => {
                let Some(Value::Dict(other)) = args.first() else {
                    return Err("update expects a dict".into());
                };
                for (k, v) in other {
                    dict.insert(k.clone(), v.clone());
                }
                Value::Null
            }
            Self::Get => {
                let key = key_arg(args)?;
                dict.get(key)
                    .cloned()
                    .unwrap_or_else(|| args.get(1).cloned().unwrap_or_default())
            }
        })
    }
}

fn key_arg(args: &[Value]) -> Result<&str, String> {
    args.first()
        .and_then(Value::as_str)
        .ok_or_else(|| "dictionary key must be a string".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IndexMap<String, Value> {
        let mut d = IndexMap::new();
        d.insert("a".to_string(), Value::Int(1));
        d.insert("b".to_string(), Value::Int(2));
        d
    }

    #[test]
    fn views_keep_insertion_order() {
        let mut d = sample();
        assert_eq!(
            DictOp::Keys.apply(&mut d, &[]).unwrap(),
            Value::List(vec![Value::str("a"), Value::str("b")])
        );
        assert_eq!(DictOp::Items.apply(&mut d, &[]).unwrap().to_string(), "[['a', 1], ['b', 2]]");
    }

    #[test]
    fn pop_and_get_defaults() {
        let mut d = sample();
        assert_eq!(DictOp::Pop.apply(&mut d, &[Value::str("a")]).unwrap(), Value::Int(1));
        assert_eq!(
            DictOp::Pop.apply(&mut d, &[Value::str("a"), Value::Int(0)]).unwrap(),
            Value::Int(0)
        );
        assert!(DictOp::Pop.apply(&mut d, &[Value::str("a")]).is_err());
        assert_eq!(DictOp::Get.apply(&mut d, &[Value::str("zz")]).unwrap(), Value::Null);
        assert!(DictOp::Pop.mutates() && !DictOp::Get.mutates());
    }

    #[test]
    fn update_and_popitem() {
        let mut d = sample();
        let mut more = IndexMap::new();
        more.insert("c".to_string(), Value::Int(3));
        DictOp::Update.apply(&mut d, &[Value::Dict(more)]).unwrap();
        assert_eq!(
            DictOp::PopItem.apply(&mut d, &[]).unwrap(),
            Value::List(vec![Value::str("c"), Value::Int(3)])
        );
        DictOp::Clear.apply(&mut d, &[]).unwrap();
        assert!(DictOp::PopItem.apply(&mut d, &[]).is_err());
    }
}
