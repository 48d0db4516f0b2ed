//! `.str::op(...)` methods.

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrOp {
    Upper,
    Lower,
    Title,
    Capitalize,
    SwapCase,
    IsAlnum,
    IsAlpha,
    IsDigit,
    IsTitle,
    IsUpper,
    IsLower,
    IsSpace,
    LoadJson,
    Split,
    Strip,
    LStrip,
    RStrip,
    Count,
    Find,
    Join,
    StartsWith,
    EndsWith,
    Replace,
}

impl StrOp {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "upper" => Self::Upper,
            "lower" => Self::Lower,
            "title" => Self::Title,
            "capitalize" => Self::Capitalize,
            "swap_case" => Self::SwapCase,
            "is_alnum" => Self::IsAlnum,
            "is_alpha" => Self::IsAlpha,
            "is_digit" => Self::IsDigit,
            "is_title" => Self::IsTitle,
            "is_upper" => Self::IsUpper,
            "is_lower" => Self::IsLower,
            "is_space" => Self::IsSpace,
            "load_json" => Self::LoadJson,
            "split" => Self::Split,
            "strip" => Self::Strip,
            "lstrip" => Self::LStrip,
            "rstrip" => Self::RStrip,
            "count" => Self::Count,
            "find" => Self::Find,
            "join" => Self::Join,
            "startswith" => Self::StartsWith,
            "endswith" => Self::EndsWith,
            "replace" => Self::Replace,
            _ => return None,
        })
    }

    pub fn apply(self, s: &str, args: &[Value]) -> Result<Value, String> {
        let text_arg = |idx: usize| text_arg(args, idx);
        Ok(match self {
            Self::Upper => Value::Str(s.to_uppercase()),
            Self::Lower => Value::Str(s.to_lowercase()),
            Self::Title => Value::Str(title_case(s)),
            Self::Capitalize => {
                let mut chars = s.chars();
                Value::Str(match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
                    None => String::new(),
                })
            }
            Self::SwapCase => {
                let mut out = String::with_capacity(s.len());
                for c in s.chars() {
                    if c.is_uppercase() {
                        out.extend(c.to_lowercase());
                    } else {
                        out.extend(c.to_uppercase());
                    }
                }
                Value::Str(out)
            }
            Self::IsAlnum => Value::Bool(!s.is_empty() && s.chars().all(char::is_alphanumeric)),
            Self::IsAlpha => Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic)),
            Self::IsDigit => Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit())),
            Self::IsSpace => Value::Bool(!s.is_empty() && s.chars().all(char::is_whitespace)),
            Self::IsUpper => Value::Bool(
                s.chars().any(char::is_alphabetic) && !s.chars().any(char::is_lowercase),
            ),
            Self::IsLower => Value::Bool(
                s.chars().any(char::is_alphabetic) && !s.chars().any(char::is_uppercase),
            ),
            Self::IsTitle => Value::Bool(!s.is_empty() && s.chars().any(char::is_alphabetic) && title_case(s) == s),
            Self::LoadJson => {
                let json: serde_json::Value = serde_json::from_str(s).map_err(|e| e.to_string())?;
                Value::from_json(&json)
            }
            Self::Split => {
                let parts: Vec<Value> = match args.first() {
                    None | Some(Value::Null) => s.split_whitespace().map(Value::from).collect(),
                    Some(_) => {
                        let sep = text_arg(0)?;
                        if sep.is_empty() {
                            return Err("empty separator".into());
                        }
                        s.split(sep).map(Value::from).collect()
                    }
                };
                Value::List(parts)
            }
            Self::Strip | Self::LStrip | Self::RStrip => {
                let chars: Option<Vec<char>> = match args.first() {
                    None => None,
                    Some(_) => Some(text_arg(0)?.chars().collect()),
                };
                let is_stripped = |c: char| match &chars {
                    Some(set) => set.contains(&c),
                    None => c.is_whitespace(),
                };
                Value::str(match self {
                    Self::Strip => s.trim_matches(is_stripped),
                    Self::LStrip => s.trim_start_matches(is_stripped),
                    _ => s.trim_end_matches(is_stripped),
                })
            }
            Self::Count => {
                let sub = text_arg(0)?;
                Value::Int(if sub.is_empty() {
                    s.chars().count() as i64 + 1
                } else {
                    s.matches(sub).count() as i64
                })
            }
            Self::Find => {
                let sub = text_arg(0)?;
                Value::Int(match s.find(sub) {
                    Some(byte_idx) => s[..byte_idx].chars().count() as i64,
                    None => -1,
                })
            }
            Self::Join => {
                let items: &[Value] = match args {
                    [Value::List(items)] => items,
                    _ => args,
                };
                Value::Str(
                    items
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(s),
                )
            }
            Self::StartsWith => Value::Bool(s.starts_with(text_arg(0)?)),
            Self::EndsWith => Value::Bool(s.ends_with(text_arg(0)?)),
            Self::Replace => Value::Str(s.replace(text_arg(0)?, text_arg(1)?)),
        })
    }
}

fn text_arg(args: &[Value], idx: usize) -> Result<&str, String> {
    args.get(idx)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("argument {} must be a string", idx + 1))
}

/// Python `str.title`: upper-case the first letter of every run of letters.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_letter = false;
    for c in s.chars() {
        if prev_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_letter = c.is_alphabetic();
    }
    out
}
