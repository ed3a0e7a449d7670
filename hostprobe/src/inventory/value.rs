//! Field values.

use indexmap::IndexMap;
use serde::Serialize;

/// The value of one template field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Not determined. Serializes as `null`.
    #[default]
    Absent,
    Bool(bool),
    Integer(i64),
    Text(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Check if the value is absent.
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Text value, absent when `s` is blank.
    pub fn text(s: impl AsRef<str>) -> Self {
        let s = s.as_ref().trim();
        if s.is_empty() {
            Value::Absent
        } else {
            Value::Text(s.to_string())
        }
    }

    /// Integer parsed from text, absent when it does not parse.
    pub fn parse_integer(s: &str) -> Self {
        s.trim().parse::<i64>().map(Value::Integer).unwrap_or(Value::Absent)
    }

    /// List of text values from a delimited string, absent when empty.
    pub fn split(s: &str, delimiter: char) -> Self {
        let items: Vec<Value> = s
            .split(delimiter)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| Value::Text(item.to_string()))
            .collect();
        if items.is_empty() {
            Value::Absent
        } else {
            Value::List(items)
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::text(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        i64::try_from(n).map(Value::Integer).unwrap_or(Value::Absent)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        i64::try_from(n).map(Value::Integer).unwrap_or(Value::Absent)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        if items.is_empty() {
            Value::Absent
        } else {
            Value::List(items.into_iter().map(Value::Text).collect())
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Absent)
    }
}
