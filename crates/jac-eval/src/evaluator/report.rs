//! `report` and its attribute forms.

use indexmap::IndexMap;
use jac_types::AstNode;

use super::Evaluator;
use crate::error::EvalResult;
use crate::value::Value;

impl<'a> Evaluator<'a> {
    /// `report x`, `report:status = 404`, `report:custom = x`,
    /// `report:error = e`.
    pub(crate) fn exec_report(&mut self, stmt: &AstNode) -> EvalResult<()> {
        match stmt.kids.as_slice() {
            [expr] => {
                let value = self.eval_value(expr)?;
                let value = self.report_form(value);
                if !value.is_serializable() {
                    return self.rt_error(stmt, format!("Report {value} not Json serializable"));
                }
                self.frame.output.report.push(value);
            }
            [attr, expr] => {
                let value = self.eval_value(expr)?;
                match attr.token_text() {
                    "status" | "status_code" => match value {
                        Value::Int(code) => self.frame.output.status_code = Some(code),
                        other => {
                            self.rt_error(expr, format!("Status code must be an int, got {}", other.type_name()))?
                        }
                    },
                    "custom" => {
                        let value = self.report_form(value);
                        self.frame.output.custom = Some(value);
                    }
                    "error" => {
                        let line = match &value {
                            Value::Str(s) => s.clone(),
                            Value::Dict(map) => {
                                let field = |k: &str| map.get(k).map(ToString::to_string).unwrap_or_default();
                                format!(
                                    "{}:{} - line {}, col {} - rule {} - {}",
                                    field("mod"),
                                    field("name"),
                                    field("line"),
                                    field("col"),
                                    field("rule"),
                                    field("msg")
                                )
                            }
                            other => other.to_string(),
                        };
                        self.frame.output.errors.push(line);
                    }
                    _ => self.rt_error(attr, "Invalid report attribute to set")?,
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Objects are reported as their `info` mapping, recursively.
    pub(crate) fn report_form(&self, value: Value) -> Value {
        match value {
            Value::Ref(id) => self.object(id).map_or(Value::Null, |o| o.info()),
            Value::List(items) => Value::List(items.into_iter().map(|v| self.report_form(v)).collect()),
            Value::Dict(map) => Value::Dict(map.into_iter().map(|(k, v)| (k, self.report_form(v))).collect()),
            other => other,
        }
    }

    /// `global.info`: the run's report state so far.
    pub(crate) fn global_info(&self) -> Value {
        let output = &self.frame.output;
        let mut map = IndexMap::new();
        map.insert("report".to_string(), Value::List(output.report.clone()));
        map.insert(
            "report_status".to_string(),
            output.status_code.map_or(Value::Null, Value::Int),
        );
        map.insert("report_custom".to_string(), output.custom.clone().unwrap_or_default());
        map.insert(
            "runtime_errors".to_string(),
            Value::List(output.errors.iter().cloned().map(Value::Str).collect()),
        );
        Value::Dict(map)
    }
}
