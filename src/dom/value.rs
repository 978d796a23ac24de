//! Scalar values flowing through attributes, properties and text inserts.

use std::fmt;

/// A loosely typed scalar with JavaScript truthiness and stringification.
///
/// `Null` stands for both `null` and `undefined`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

impl Value {
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Number(n) => *n == 0.0 || n.is_nan(),
            Value::Str(s) => s.is_empty(),
        }
    }

    /// `null`, `true` and `false` vanish when inserted as content.
    pub fn is_renderable(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(_))
    }

    pub fn to_js_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.clone(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        // covers -0
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_js_string())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_js() {
        assert!(Value::Null.is_falsy());
        assert!(Value::from(false).is_falsy());
        assert!(Value::from(0).is_falsy());
        assert!(Value::Number(f64::NAN).is_falsy());
        assert!(Value::from("").is_falsy());
        assert!(!Value::from("0").is_falsy());
        assert!(!Value::from(-1).is_falsy());
    }

    #[test]
    fn numbers_stringify_like_js() {
        assert_eq!(Value::from(3).to_js_string(), "3");
        assert_eq!(Value::Number(-0.0).to_js_string(), "0");
        assert_eq!(Value::Number(1.5).to_js_string(), "1.5");
        assert_eq!(Value::Number(f64::INFINITY).to_js_string(), "Infinity");
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }
}
