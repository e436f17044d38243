//! Values produced by parsing, and the constants grammars embed in trees.

use std::collections::BTreeMap;
use std::fmt;

/// A parse result value.
///
/// Grammars produce heterogeneous nested data: single matched characters,
/// literal text, numbers, lists collected by repetition and sequencing, and
/// maps built by transform functions.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of `Int` and `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Join the text of a value: chars and strings are concatenated through
    /// any nesting of lists, `Null` contributes nothing.
    ///
    /// Returns `None` if a number, bool or map is encountered.
    pub fn concat_text(&self) -> Option<String> {
        let mut out = String::new();
        if self.push_text(&mut out) {
            Some(out)
        } else {
            None
        }
    }

    fn push_text(&self, out: &mut String) -> bool {
        match self {
            Value::Null => true,
            Value::Char(c) => {
                out.push(*c);
                true
            }
            Value::Str(s) => {
                out.push_str(s);
                true
            }
            Value::List(items) => items.iter().all(|item| item.push_text(out)),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Char(c) => write!(f, "{:?}", c),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// A constant embedded in a combinator tree (keyword results, optional
/// defaults).
///
/// Trees live in a bump arena that never runs destructors, so constants are
/// plain copyable data borrowing from the arena. The compiler turns them into
/// owned [`Value`]s stored in the program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Const<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(&'a str),
    List(&'a [Const<'a>]),
}

impl<'a> Const<'a> {
    pub fn to_value(&self) -> Value {
        match *self {
            Const::Null => Value::Null,
            Const::Bool(b) => Value::Bool(b),
            Const::Int(i) => Value::Int(i),
            Const::Float(x) => Value::Float(x),
            Const::Char(c) => Value::Char(c),
            Const::Str(s) => Value::Str(s.to_string()),
            Const::List(items) => Value::List(items.iter().map(Const::to_value).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_text_nested() {
        let v = Value::List(vec![
            Value::Char('a'),
            Value::Null,
            Value::List(vec![Value::Str("bc".into()), Value::Char('d')]),
        ]);
        assert_eq!(v.concat_text().as_deref(), Some("abcd"));
    }

    #[test]
    fn test_concat_text_rejects_numbers() {
        let v = Value::List(vec![Value::Char('a'), Value::Int(1)]);
        assert_eq!(v.concat_text(), None);
    }

    #[test]
    fn test_display() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), Value::Float(-3.4));
        map.insert("a".to_string(), Value::List(vec![Value::Int(1), Value::Null]));
        let v = Value::List(vec![Value::Map(map), Value::Bool(true), Value::Str("x\"y".into())]);
        assert_eq!(v.to_string(), r#"[{"a": [1, null], "b": -3.4}, true, "x\"y"]"#);
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Char('q').to_string(), "'q'");
    }

    #[test]
    fn test_const_to_value() {
        let items = [Const::Null, Const::Str("d")];
        assert_eq!(
            Const::List(&items).to_value(),
            Value::List(vec![Value::Null, Value::Str("d".into())])
        );
        assert_eq!(Const::Bool(true).to_value(), Value::Bool(true));
    }
}
