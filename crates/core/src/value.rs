//! Runtime values.

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value
    #[default]
    Unit,
    /// Boolean
    Bool(bool),
    /// Number (every numeric value is a 64-bit float)
    Number(f64),
    /// String
    Str(String),
    /// List of values
    List(Vec<Value>),
}

impl Value {
    /// Name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::List(_) => "list",
        }
    }

    /// The number inside, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean inside, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Plain rendering used for output and resource keys (strings unquoted).
    pub fn render(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unit => f.write_str("()"),
            Self::Bool(true) => f.write_str("@true"),
            Self::Bool(false) => f.write_str("@false"),
            Self::Number(n) => write!(f, "{}", n),
            Self::Str(s) => write!(f, "{:?}", s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_source_syntax() {
        let v = Value::List(vec![Value::Number(1.0), Value::from("x"), Value::Bool(true)]);
        assert_eq!(v.to_string(), "[1 \"x\" @true]");
    }

    #[test]
    fn test_render_leaves_strings_unquoted() {
        assert_eq!(Value::from("out").render(), "out");
        assert_eq!(Value::Number(2.5).render(), "2.5");
    }
}
