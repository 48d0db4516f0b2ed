//! Built-in capabilities.
//!
//! Each value kind's methods are a closed enum resolved once from the
//! method name, so dispatch is an exhaustive `match` rather than a string
//! lookup at every call. [`BuiltinAction`] covers the `std.*` actions.

mod dict;
mod list;
mod string;

pub use dict::DictOp;
pub use list::ListOp;
pub use string::StrOp;

use indexmap::IndexMap;

use crate::binding::SlotHost;
use crate::value::Value;

/// Positional and keyword arguments of a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keyword: IndexMap<String, Value>,
}

impl Args {
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            keyword: IndexMap::new(),
        }
    }

    /// Argument by position, falling back to its keyword name.
    pub fn get(&self, idx: usize, name: &str) -> Option<&Value> {
        self.positional.get(idx).or_else(|| self.keyword.get(name))
    }

    fn require(&self, idx: usize, name: &str, action: &str) -> Result<&Value, String> {
        self.get(idx, name)
            .ok_or_else(|| format!("{action} missing required argument '{name}'"))
    }
}

/// What a builtin action may reach beyond its arguments.
pub trait ActionHost: SlotHost {
    /// The current run's report so far.
    fn report(&self) -> Vec<Value>;
}

/// The `std.*` actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinAction {
    Log,
    Out,
    Err,
    SortByCol,
    StrToJson,
    JsonToStr,
    GetGlobal,
    SetGlobal,
    GetReport,
}

impl BuiltinAction {
    pub const ALL: [BuiltinAction; 9] = [
        Self::Log,
        Self::Out,
        Self::Err,
        Self::SortByCol,
        Self::StrToJson,
        Self::JsonToStr,
        Self::GetGlobal,
        Self::SetGlobal,
        Self::GetReport,
    ];

    /// Resolve a dotted action name such as `std.log`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Log => "std.log",
            Self::Out => "std.out",
            Self::Err => "std.err",
            Self::SortByCol => "std.sort_by_col",
            Self::StrToJson => "std.str_to_json",
            Self::JsonToStr => "std.json_to_str",
            Self::GetGlobal => "std.get_global",
            Self::SetGlobal => "std.set_global",
            Self::GetReport => "std.get_report",
        }
    }

    pub fn call(self, args: &Args, host: &mut dyn ActionHost) -> Result<Value, String> {
        match self {
            Self::Log => {
                let line = join_display(&args.positional);
                tracing::info!(target: "jac::std", "{line}");
                Ok(Value::Str(line))
            }
            Self::Out => {
                tracing::info!(target: "jac::std::out", "{}", join_display(&args.positional));
                Ok(Value::Null)
            }
            Self::Err => {
                tracing::warn!(target: "jac::std::err", "{}", join_display(&args.positional));
                Ok(Value::Null)
            }
            Self::SortByCol => {
                let Value::List(rows) = args.require(0, "lst", self.name())? else {
                    return Err("sort_by_col expects a list".into());
                };
                let col = args
                    .require(1, "col_num", self.name())?
                    .as_int()
                    .ok_or("sort_by_col column must be an int")?;
                let reverse = args.get(2, "reverse").is_some_and(Value::is_truthy);
                sort_by_col(rows.clone(), col, reverse)
            }
            Self::StrToJson => {
                let text = args
                    .require(0, "s", self.name())?
                    .as_str()
                    .ok_or("str_to_json expects a string")?;
                serde_json::from_str::<serde_json::Value>(text)
                    .map(|json| Value::from_json(&json))
                    .map_err(|e| e.to_string())
            }
            Self::JsonToStr => {
                let value = args.require(0, "obj", self.name())?;
                serde_json::to_string(&value.to_json())
                    .map(Value::Str)
                    .map_err(|e| e.to_string())
            }
            Self::GetGlobal => {
                let name = args
                    .require(0, "name", self.name())?
                    .as_str()
                    .ok_or("get_global expects a string name")?;
                Ok(host.global(name).unwrap_or_default())
            }
            Self::SetGlobal => {
                let name = args
                    .require(0, "name", self.name())?
                    .as_str()
                    .ok_or("set_global expects a string name")?
                    .to_string();
                let value = args.require(1, "value", self.name())?.clone();
                if !value.is_serializable() {
                    return Err("set_global value must be JSON serializable".into());
                }
                host.set_global(&name, value.clone());
                Ok(value)
            }
            Self::GetReport => Ok(Value::List(host.report())),
        }
    }
}

fn join_display(values: &[Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn sort_by_col(mut rows: Vec<Value>, col: i64, reverse: bool) -> Result<Value, String> {
    let mut keys = Vec::with_capacity(rows.len());
    for row in &rows {
        let Value::List(cells) = row else {
            return Err("sort_by_col rows must be lists".into());
        };
        let idx = crate::binding::resolve_index(col, cells.len()).map_err(|e| e.to_string())?;
        keys.push(cells[idx].clone());
    }
    let mut order: Vec<usize> = (0..rows.len()).collect();
    let mut failed = false;
    order.sort_by(|&a, &b| {
        keys[a].compare(&keys[b]).unwrap_or_else(|| {
            failed = true;
            std::cmp::Ordering::Equal
        })
    });
    if failed {
        return Err("sort_by_col column values are not comparable".into());
    }
    if reverse {
        order.reverse();
    }
    let mut taken: Vec<Option<Value>> = rows.drain(..).map(Some).collect();
    Ok(Value::List(
        order.into_iter().filter_map(|i| taken[i].take()).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingError;
    use crate::value::ObjectId;

    #[derive(Default)]
    struct Host {
        globals: IndexMap<String, Value>,
    }

    impl SlotHost for Host {
        fn field(&self, _: ObjectId, name: &str) -> Result<Value, BindingError> {
            Err(BindingError::UnknownField(name.to_string()))
        }
        fn set_field(&mut self, _: ObjectId, name: &str, _: Value) -> Result<(), BindingError> {
            Err(BindingError::UnknownField(name.to_string()))
        }
        fn global(&self, name: &str) -> Option<Value> {
            self.globals.get(name).cloned()
        }
        fn set_global(&mut self, name: &str, value: Value) {
            self.globals.insert(name.to_string(), value);
        }
    }

    impl ActionHost for Host {
        fn report(&self) -> Vec<Value> {
            vec![Value::Int(1)]
        }
    }

    fn row(cells: &[i64]) -> Value {
        Value::List(cells.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn names_round_trip() {
        for action in BuiltinAction::ALL {
            assert_eq!(BuiltinAction::from_name(action.name()), Some(action));
        }
        assert_eq!(BuiltinAction::from_name("std.nope"), None);
    }

    #[test]
    fn sort_by_col_orders_rows() {
        let mut host = Host::default();
        let rows = Value::List(vec![row(&[3, 0]), row(&[1, 1]), row(&[2, 2])]);
        let args = Args::positional(vec![rows, Value::Int(0)]);
        let sorted = BuiltinAction::SortByCol.call(&args, &mut host).unwrap();
        assert_eq!(sorted, Value::List(vec![row(&[1, 1]), row(&[2, 2]), row(&[3, 0])]));

        let mut args = Args::positional(vec![sorted, Value::Int(1)]);
        args.keyword.insert("reverse".into(), Value::Bool(true));
        let sorted = BuiltinAction::SortByCol.call(&args, &mut host).unwrap();
        assert_eq!(sorted, Value::List(vec![row(&[2, 2]), row(&[1, 1]), row(&[3, 0])]));
    }

    #[test]
    fn json_conversions() {
        let mut host = Host::default();
        let parsed = BuiltinAction::StrToJson
            .call(&Args::positional(vec![Value::str(r#"{"a": [1, 2.5]}"#)]), &mut host)
            .unwrap();
        assert_eq!(parsed.to_string(), "{'a': [1, 2.5]}");
        let text = BuiltinAction::JsonToStr
            .call(&Args::positional(vec![parsed]), &mut host)
            .unwrap();
        assert_eq!(text, Value::str(r#"{"a":[1,2.5]}"#));
    }

    #[test]
    fn globals_and_report() {
        let mut host = Host::default();
        BuiltinAction::SetGlobal
            .call(&Args::positional(vec![Value::str("k"), Value::Int(4)]), &mut host)
            .unwrap();
        let got = BuiltinAction::GetGlobal
            .call(&Args::positional(vec![Value::str("k")]), &mut host)
            .unwrap();
        assert_eq!(got, Value::Int(4));
        let report = BuiltinAction::GetReport.call(&Args::default(), &mut host).unwrap();
        assert_eq!(report, Value::List(vec![Value::Int(1)]));
    }

    #[test]
    fn log_returns_joined_line() {
        let mut host = Host::default();
        let out = BuiltinAction::Log
            .call(&Args::positional(vec![Value::str("a"), Value::Int(1)]), &mut host)
            .unwrap();
        assert_eq!(out, Value::str("a 1"));
    }
}
