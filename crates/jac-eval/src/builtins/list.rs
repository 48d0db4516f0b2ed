//! `.list::op(...)` methods.

use std::cmp::Ordering;

use crate::binding::resolve_index;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOp {
    Reverse,
    Reversed,
    Copy,
    DeepCopy,
    Sort,
    Clear,
    Max,
    Min,
    IdxOfMax,
    IdxOfMin,
    Pairwise,
    Unique,
    Pop,
    Index,
    Append,
    Extend,
    Insert,
    Remove,
    Count,
}

impl ListOp {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "reverse" => Self::Reverse,
            "reversed" => Self::Reversed,
            "copy" => Self::Copy,
            "deepcopy" => Self::DeepCopy,
            "sort" => Self::Sort,
            "clear" => Self::Clear,
            "max" => Self::Max,
            "min" => Self::Min,
            "idx_of_max" => Self::IdxOfMax,
            "idx_of_min" => Self::IdxOfMin,
            "pairwise" => Self::Pairwise,
            "unique" => Self::Unique,
            "pop" => Self::Pop,
            "index" => Self::Index,
            "append" => Self::Append,
            "extend" => Self::Extend,
            "insert" => Self::Insert,
            "remove" => Self::Remove,
            "count" => Self::Count,
            _ => return None,
        })
    }

    /// Whether the receiver must be written back after `apply`.
    pub fn mutates(self) -> bool {
        matches!(
            self,
            Self::Reverse
                | Self::Sort
                | Self::Clear
                | Self::Pop
                | Self::Append
                | Self::Extend
                | Self::Insert
                | Self::Remove
        )
    }

    /// Apply to `list` in place. In-place operations return null, as their
    /// Python counterparts do.
    pub fn apply(self, list: &mut Vec<Value>, args: &[Value]) -> Result<Value, String> {
        let arg = |idx: usize| {
            args.get(idx)
                .ok_or_else(|| format!("missing argument {}", idx + 1))
        };
        Ok(match self {
            Self::Reverse => {
                list.reverse();
                Value::Null
            }
            Self::Reversed => Value::List(list.iter().rev().cloned().collect()),
            Self::Copy | Self::DeepCopy => Value::List(list.clone()),
            Self::Sort => {
                sort_values(list)?;
                Value::Null
            }
            Self::Clear => {
                list.clear();
                Value::Null
            }
            Self::Max => list[extreme(list, Ordering::Greater)?].clone(),
            Self::Min => list[extreme(list, Ordering::Less)?].clone(),
            Self::IdxOfMax => Value::Int(extreme(list, Ordering::Greater)? as i64),
            Self::IdxOfMin => Value::Int(extreme(list, Ordering::Less)? as i64),
            Self::Pairwise => Value::List(
                list.windows(2)
                    .map(|pair| Value::List(pair.to_vec()))
                    .collect(),
            ),
            Self::Unique => {
                let mut seen: Vec<Value> = Vec::new();
                for item in list.iter() {
                    if !seen.contains(item) {
                        seen.push(item.clone());
                    }
                }
                Value::List(seen)
            }
            Self::Pop => {
                if list.is_empty() {
                    return Err("pop from empty list".into());
                }
                let idx = match args.first() {
                    None => list.len() - 1,
                    Some(v) => {
                        let i = v.as_int().ok_or("pop index must be an int")?;
                        resolve_index(i, list.len()).map_err(|e| e.to_string())?
                    }
                };
                list.remove(idx)
            }
            Self::Index => {
                let needle = arg(0)?;
                let pos = list
                    .iter()
                    .position(|v| v == needle)
                    .ok_or_else(|| format!("{} is not in list", needle.repr()))?;
                Value::Int(pos as i64)
            }
            Self::Append => {
                list.push(arg(0)?.clone());
                Value::Null
            }
            Self::Extend => {
                let Value::List(more) = arg(0)? else {
                    return Err("extend expects a list".into());
                };
                list.extend(more.iter().cloned());
                Value::Null
            }
            Self::Insert => {
                let at = arg(0)?.as_int().ok_or("insert index must be an int")?;
                let len = list.len() as i64;
                let at = if at < 0 { (at + len).max(0) } else { at.min(len) };
                list.insert(at as usize, arg(1)?.clone());
                Value::Null
            }
            Self::Remove => {
                let needle = arg(0)?;
                let pos = list
                    .iter()
                    .position(|v| v == needle)
                    .ok_or("list.remove(x): x not in list")?;
                list.remove(pos);
                Value::Null
            }
            Self::Count => {
                let needle = arg(0)?;
                Value::Int(list.iter().filter(|v| *v == needle).count() as i64)
            }
        })
    }
}

fn sort_values(list: &mut [Value]) -> Result<(), String> {
    let mut failed = false;
    list.sort_by(|a, b| {
        a.compare(b).unwrap_or_else(|| {
            failed = true;
            Ordering::Equal
        })
    });
    if failed {
        return Err("list elements are not comparable".into());
    }
    Ok(())
}

/// Index of the first greatest (`Greater`) or smallest (`Less`) element.
fn extreme(list: &[Value], want: Ordering) -> Result<usize, String> {
    let mut best = 0;
    if list.is_empty() {
        return Err("arg is an empty sequence".into());
    }
    for (i, item) in list.iter().enumerate().skip(1) {
        match item.compare(&list[best]) {
            Some(ord) if ord == want => best = i,
            Some(_) => {}
            None => return Err("list elements are not comparable".into()),
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(items: &[i64]) -> Vec<Value> {
        items.iter().copied().map(Value::Int).collect()
    }

    fn apply(op: &str, list: &mut Vec<Value>, args: &[Value]) -> Value {
        ListOp::from_name(op).unwrap().apply(list, args).unwrap()
    }

    #[test]
    fn in_place_operations_mutate_and_return_null() {
        let mut list = ints(&[3, 1, 2]);
        assert_eq!(apply("sort", &mut list, &[]), Value::Null);
        assert_eq!(list, ints(&[1, 2, 3]));
        apply("append", &mut list, &[Value::Int(4)]);
        apply("insert", &mut list, &[Value::Int(-100), Value::Int(0)]);
        assert_eq!(list, ints(&[0, 1, 2, 3, 4]));
        assert_eq!(apply("pop", &mut list, &[]), Value::Int(4));
        assert_eq!(apply("pop", &mut list, &[Value::Int(0)]), Value::Int(0));
        assert_eq!(list, ints(&[1, 2, 3]));
        assert!(ListOp::Append.mutates() && !ListOp::Max.mutates());
    }

    #[test]
    fn extremes() {
        let mut list = ints(&[2, 9, 1, 9]);
        assert_eq!(apply("max", &mut list, &[]), Value::Int(9));
        assert_eq!(apply("idx_of_max", &mut list, &[]), Value::Int(1));
        assert_eq!(apply("idx_of_min", &mut list, &[]), Value::Int(2));
        assert!(ListOp::Max.apply(&mut Vec::new(), &[]).is_err());
    }

    #[test]
    fn derived_lists() {
        let mut list = ints(&[1, 2, 1, 3]);
        assert_eq!(apply("unique", &mut list, &[]), Value::List(ints(&[1, 2, 3])));
        assert_eq!(
            apply("pairwise", &mut list, &[]),
            Value::List(vec![
                Value::List(ints(&[1, 2])),
                Value::List(ints(&[2, 1])),
                Value::List(ints(&[1, 3])),
            ])
        );
        assert_eq!(apply("count", &mut list, &[Value::Int(1)]), Value::Int(2));
        assert_eq!(apply("index", &mut list, &[Value::Int(3)]), Value::Int(3));
    }

    #[test]
    fn missing_elements_are_errors() {
        let mut list = ints(&[1]);
        assert!(ListOp::Remove.apply(&mut list, &[Value::Int(5)]).is_err());
        assert!(ListOp::Index.apply(&mut list, &[Value::Int(5)]).is_err());
        assert!(ListOp::Sort.apply(&mut vec![Value::Int(1), Value::str("a")], &[]).is_err());
    }
}
