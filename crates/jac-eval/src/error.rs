//! Failures that unwind evaluation.
//!
//! Ordinary runtime errors never show up here: they are logged, recorded
//! in the run output and evaluation carries on. Only assertion failures
//! and errors raised inside a `try` body travel as `Err`.

use indexmap::IndexMap;
use thiserror::Error;

use crate::value::Value;

/// Diagnostic context captured when an error is raised inside `try`.
///
/// Handed to an `else with NAME` clause as a dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionInfo {
    pub kind: String,
    pub module: String,
    pub msg: String,
    pub args: Vec<Value>,
    pub line: u32,
    pub col: u32,
    pub name: String,
    pub rule: String,
}

impl ExceptionInfo {
    pub fn to_value(&self) -> Value {
        let mut map = IndexMap::new();
        map.insert("type".to_string(), Value::Str(self.kind.clone()));
        map.insert("mod".to_string(), Value::Str(self.module.clone()));
        map.insert("msg".to_string(), Value::Str(self.msg.clone()));
        map.insert("args".to_string(), Value::List(self.args.clone()));
        map.insert("line".to_string(), Value::Int(i64::from(self.line)));
        map.insert("col".to_string(), Value::Int(i64::from(self.col)));
        map.insert("name".to_string(), Value::Str(self.name.clone()));
        map.insert("rule".to_string(), Value::Str(self.rule.clone()));
        Value::Dict(map)
    }
}

/// Evaluation error: assertion failure or an error raised under `try`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// `assert` on a falsy value. Never caught by `try`.
    #[error("assertion failed: {0}")]
    AssertionFailed(String),
    /// A runtime error raised inside a `try` body that nothing caught.
    #[error("{}:{} - line {}, col {} - rule {} - {}", .0.module, .0.name, .0.line, .0.col, .0.rule, .0.msg)]
    Raised(Box<ExceptionInfo>),
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;
