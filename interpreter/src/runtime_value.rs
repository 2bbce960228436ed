use std::cmp::Ordering;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use crate::error::RuntimeError;

/// A runtime value produced by evaluating an expression.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Function(Rc<NativeFunction>),
    /// The module object bound to `__builtins__` while a script runs.
    Module(String),
}

/// Positional and keyword arguments of a call.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl Arguments {
    pub fn positional(values: Vec<Value>) -> Self {
        Arguments { positional: values, keywords: Vec::new() }
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Reject keywords a function does not accept.
    pub fn check_keywords(&self, function: &str, accepted: &[&str]) -> Result<(), RuntimeError> {
        match self.keywords.iter().find(|(k, _)| !accepted.contains(&k.as_str())) {
            Some((name, _)) => Err(RuntimeError::type_error(format!(
                "{}() got an unexpected keyword argument '{}'",
                function, name
            ))),
            None => Ok(()),
        }
    }
}

type NativeBody = dyn Fn(&Arguments, &mut dyn Write) -> Result<Value, RuntimeError>;

/// A callable implemented in Rust: the builtins, and hooks that embedders
/// place into a namespace.
pub struct NativeFunction {
    pub name: String,
    body: Box<NativeBody>,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Arguments, &mut dyn Write) -> Result<Value, RuntimeError> + 'static,
    {
        NativeFunction { name: name.into(), body: Box::new(body) }
    }

    pub fn call(&self, arguments: &Arguments, output: &mut dyn Write) -> Result<Value, RuntimeError> {
        (self.body)(arguments, output)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<built-in function {}>", self.name)
    }
}

impl Value {
    pub fn function<F>(name: &str, body: F) -> Value
    where
        F: Fn(&Arguments, &mut dyn Write) -> Result<Value, RuntimeError> + 'static,
    {
        Value::Function(Rc::new(NativeFunction::new(name, body)))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Function(_) | Value::Module(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Function(_) => "builtin_function_or_method",
            Value::Module(_) => "module",
        }
    }

    /// The numeric view of a value; booleans count as integers.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Boolean(b) => Some(Number::Integer(*b as i64)),
            Value::Integer(n) => Some(Number::Integer(*n)),
            Value::Float(n) => Some(Number::Float(*n)),
            _ => None,
        }
    }

    /// The elements of an iterable value.
    pub fn iterate(&self) -> Result<Vec<Value>, RuntimeError> {
        match self {
            Value::List(items) | Value::Tuple(items) => Ok(items.clone()),
            Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
            other => Err(RuntimeError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// The `repr()` of a value.
    pub fn repr(&self) -> String {
        match self {
            Value::String(s) => repr_string(s),
            Value::List(items) => format!("[{}]", join_reprs(items)),
            Value::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr()),
            Value::Tuple(items) => format!("({})", join_reprs(items)),
            other => other.to_string(),
        }
    }

    /// Ordering used by `<`, `sorted()`, `min()` and `max()`.
    pub fn compare(&self, other: &Value, operator: &str) -> Result<Ordering, RuntimeError> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .map(|ordering| match (a, b) {
                    (Number::Integer(x), Number::Integer(y)) => x.cmp(&y),
                    _ => ordering,
                })
                .ok_or_else(|| RuntimeError::Value("cannot order NaN".into()));
        }
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    if x != y {
                        return x.compare(y, operator);
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => Err(RuntimeError::type_error(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                operator,
                self.type_name(),
                other.type_name()
            ))),
        }
    }
}

fn join_reprs(items: &[Value]) -> String {
    items.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
}

fn repr_string(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Format a float the way an interactive session shows it: shortest
/// round-trip digits, `.0` for integral values, exponent outside [1e-4, 1e16).
pub fn format_float(n: f64) -> String {
    if n.is_nan() {
        return "nan".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let magnitude = n.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{:e}", n);
        let (mantissa, exponent) = formatted.split_once('e').unwrap_or((&formatted, "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
    }
    let formatted = format!("{}", n);
    if formatted.contains('.') { formatted } else { format!("{}.0", formatted) }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Float(n) => n,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return match (a, b) {
                (Number::Integer(x), Number::Integer(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            };
        }
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => a == b,
            _ => false,
        }
    }
}

/// `str()` of a value.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Boolean(true) => write!(f, "True"),
            Value::Boolean(false) => write!(f, "False"),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", format_float(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::List(_) | Value::Tuple(_) => write!(f, "{}", self.repr()),
            Value::Function(function) => write!(f, "{:?}", function),
            Value::Module(name) => write!(f, "<module '{}' (built-in)>", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_formatting_matches_interactive_output() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(1.5e-7), "1.5e-07");
        assert_eq!(format_float(-2.5), "-2.5");
    }

    #[test]
    fn string_repr_picks_quotes() {
        assert_eq!(Value::String("it's".into()).repr(), "\"it's\"");
        assert_eq!(Value::String("a\nb".into()).repr(), "'a\\nb'");
        assert_eq!(
            Value::Tuple(vec![Value::String("x".into())]).repr(),
            "('x',)"
        );
    }

    #[test]
    fn numbers_compare_across_types() {
        assert_eq!(Value::Integer(1), Value::Float(1.0));
        assert_eq!(Value::Boolean(true), Value::Integer(1));
        assert_ne!(Value::String("1".into()), Value::Integer(1));
        let ordering = Value::Tuple(vec![Value::Integer(3), Value::Integer(9)])
            .compare(&Value::Tuple(vec![Value::Integer(3), Value::Integer(10)]), "<")
            .unwrap();
        assert_eq!(ordering, Ordering::Less);
    }

    #[test]
    fn mismatched_ordering_is_a_type_error() {
        let error = Value::Integer(1).compare(&Value::String("a".into()), "<").unwrap_err();
        assert_eq!(
            error.to_string(),
            "TypeError: '<' not supported between instances of 'int' and 'str'"
        );
    }
}
