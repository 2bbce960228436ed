use std::collections::HashMap;
use std::io::Write;

use once_cell::sync::Lazy;

use crate::ast::BinaryOperator;
use crate::error::RuntimeError;
use crate::evaluator::apply_binary;
use crate::runtime_value::{Arguments, Number, Value};

pub type BuiltinFn = fn(&Arguments, &mut dyn Write) -> Result<Value, RuntimeError>;

const MAX_RANGE: i64 = 10_000_000;

static BUILTIN_FUNCTIONS: Lazy<HashMap<&'static str, BuiltinFn>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("print", builtin_print as BuiltinFn);
    map.insert("len", builtin_len as BuiltinFn);
    map.insert("str", builtin_str as BuiltinFn);
    map.insert("repr", builtin_repr as BuiltinFn);
    map.insert("int", builtin_int as BuiltinFn);
    map.insert("float", builtin_float as BuiltinFn);
    map.insert("bool", builtin_bool as BuiltinFn);
    map.insert("abs", builtin_abs as BuiltinFn);
    map.insert("round", builtin_round as BuiltinFn);
    map.insert("min", builtin_min as BuiltinFn);
    map.insert("max", builtin_max as BuiltinFn);
    map.insert("sum", builtin_sum as BuiltinFn);
    map.insert("range", builtin_range as BuiltinFn);
    map.insert("sorted", builtin_sorted as BuiltinFn);
    map.insert("list", builtin_list as BuiltinFn);
    map.insert("tuple", builtin_tuple as BuiltinFn);
    map
});

/// Look up a builtin by name, wrapped as a callable value.
pub fn lookup(name: &str) -> Option<Value> {
    BUILTIN_FUNCTIONS
        .get(name)
        .map(|&function| Value::function(name, move |arguments, output| function(arguments, output)))
}

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_FUNCTIONS.contains_key(name)
}

fn arity(arguments: &Arguments, name: &str, min: usize, max: usize) -> Result<(), RuntimeError> {
    let given = arguments.positional.len();
    if given < min || given > max {
        let expected = if min == max {
            format!("exactly {}", min)
        } else if given < min {
            format!("at least {}", min)
        } else {
            format!("at most {}", max)
        };
        return Err(RuntimeError::type_error(format!(
            "{}() takes {} argument{} ({} given)",
            name,
            expected,
            if min == max && min == 1 { "" } else { "s" },
            given
        )));
    }
    Ok(())
}

fn builtin_print(arguments: &Arguments, output: &mut dyn Write) -> Result<Value, RuntimeError> {
    arguments.check_keywords("print", &["sep", "end"])?;
    let text_keyword = |name: &str, default: &str| match arguments.keyword(name) {
        None | Some(Value::None) => Ok(default.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(RuntimeError::type_error(format!(
            "{} must be None or a string, not {}",
            name,
            other.type_name()
        ))),
    };
    let sep = text_keyword("sep", " ")?;
    let end = text_keyword("end", "\n")?;
    let line = arguments
        .positional
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(&sep);
    write!(output, "{}{}", line, end)?;
    Ok(Value::None)
}

fn builtin_len(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    arity(arguments, "len", 1, 1)?;
    let length = match &arguments.positional[0] {
        Value::String(s) => s.chars().count(),
        Value::List(items) | Value::Tuple(items) => items.len(),
        other => {
            return Err(RuntimeError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )));
        }
    };
    Ok(Value::Integer(length as i64))
}

fn builtin_str(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    arity(arguments, "str", 0, 1)?;
    Ok(Value::String(
        arguments.positional.first().map(Value::to_string).unwrap_or_default(),
    ))
}

fn builtin_repr(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    arity(arguments, "repr", 1, 1)?;
    Ok(Value::String(arguments.positional[0].repr()))
}

fn builtin_int(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    arity(arguments, "int", 0, 1)?;
    let Some(value) = arguments.positional.first() else {
        return Ok(Value::Integer(0));
    };
    match value {
        Value::Float(n) if !n.is_finite() => Err(RuntimeError::Overflow(
            "cannot convert float infinity or NaN to integer".into(),
        )),
        Value::Float(n) => Ok(Value::Integer(n.trunc() as i64)),
        Value::String(s) => s.trim().replace('_', "").parse().map(Value::Integer).map_err(|_| {
            RuntimeError::Value(format!(
                "invalid literal for int() with base 10: {}",
                value.repr()
            ))
        }),
        other => match other.as_number() {
            Some(Number::Integer(n)) => Ok(Value::Integer(n)),
            _ => Err(RuntimeError::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        },
    }
}

fn builtin_float(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    arity(arguments, "float", 0, 1)?;
    let Some(value) = arguments.positional.first() else {
        return Ok(Value::Float(0.0));
    };
    match value {
        Value::String(s) => s.trim().parse().map(Value::Float).map_err(|_| {
            RuntimeError::Value(format!("could not convert string to float: {}", value.repr()))
        }),
        other => other
            .as_number()
            .map(|n| Value::Float(n.as_f64()))
            .ok_or_else(|| {
                RuntimeError::type_error(format!(
                    "float() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))
            }),
    }
}

fn builtin_bool(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    arity(arguments, "bool", 0, 1)?;
    Ok(Value::Boolean(
        arguments.positional.first().is_some_and(Value::is_truthy),
    ))
}

fn builtin_abs(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    arity(arguments, "abs", 1, 1)?;
    match arguments.positional[0].as_number() {
        Some(Number::Integer(n)) => n
            .checked_abs()
            .map(Value::Integer)
            .ok_or_else(|| RuntimeError::Overflow("integer overflow".into())),
        Some(Number::Float(n)) => Ok(Value::Float(n.abs())),
        None => Err(RuntimeError::type_error(format!(
            "bad operand type for abs(): '{}'",
            arguments.positional[0].type_name()
        ))),
    }
}

fn builtin_round(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    arity(arguments, "round", 1, 2)?;
    let digits = match arguments.positional.get(1) {
        None | Some(Value::None) => None,
        Some(Value::Integer(n)) => Some(*n),
        Some(other) => {
            return Err(RuntimeError::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                other.type_name()
            )));
        }
    };
    match (arguments.positional[0].as_number(), digits) {
        (Some(Number::Integer(n)), _) => Ok(Value::Integer(n)),
        (Some(Number::Float(n)), None) => Ok(Value::Integer(n.round_ties_even() as i64)),
        (Some(Number::Float(n)), Some(digits)) => {
            let scale = 10f64.powi(digits.clamp(-308, 308) as i32);
            Ok(Value::Float((n * scale).round_ties_even() / scale))
        }
        (None, _) => Err(RuntimeError::type_error(format!(
            "type {} doesn't define __round__ method",
            arguments.positional[0].type_name()
        ))),
    }
}

/// The values `min()`/`max()`/`sum()`/`sorted()` iterate over: either a single
/// iterable argument or all positional arguments.
fn candidates(arguments: &Arguments, name: &str) -> Result<Vec<Value>, RuntimeError> {
    match arguments.positional.as_slice() {
        [] => Err(RuntimeError::type_error(format!(
            "{} expected at least 1 argument, got 0",
            name
        ))),
        [single] => single.iterate(),
        many => Ok(many.to_vec()),
    }
}

fn extreme(arguments: &Arguments, name: &str, wanted: std::cmp::Ordering) -> Result<Value, RuntimeError> {
    arguments.check_keywords(name, &[])?;
    let mut values = candidates(arguments, name)?.into_iter();
    let Some(mut best) = values.next() else {
        return Err(RuntimeError::Value(format!("{}() arg is an empty sequence", name)));
    };
    for value in values {
        if value.compare(&best, if wanted.is_lt() { "<" } else { ">" })? == wanted {
            best = value;
        }
    }
    Ok(best)
}

fn builtin_min(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    extreme(arguments, "min", std::cmp::Ordering::Less)
}

fn builtin_max(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    extreme(arguments, "max", std::cmp::Ordering::Greater)
}

fn builtin_sum(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    arity(arguments, "sum", 1, 2)?;
    let mut total = arguments.positional.get(1).cloned().unwrap_or(Value::Integer(0));
    for value in arguments.positional[0].iterate()? {
        total = apply_binary(BinaryOperator::Addition, &total, &value, false)?;
    }
    Ok(total)
}

fn integer_argument(value: &Value, name: &str) -> Result<i64, RuntimeError> {
    match value.as_number() {
        Some(Number::Integer(n)) => Ok(n),
        _ => Err(RuntimeError::type_error(format!(
            "'{}' object cannot be interpreted as an integer in {}()",
            value.type_name(),
            name
        ))),
    }
}

fn builtin_range(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    arity(arguments, "range", 1, 3)?;
    let numbers = arguments
        .positional
        .iter()
        .map(|v| integer_argument(v, "range"))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match numbers.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(RuntimeError::type_error("range expected at most 3 arguments")),
    };
    if step == 0 {
        return Err(RuntimeError::Value("range() arg 3 must not be zero".into()));
    }
    let span = if step > 0 { stop.saturating_sub(start) } else { start.saturating_sub(stop) };
    if span / step.abs() > MAX_RANGE {
        return Err(RuntimeError::Overflow("range is too large".into()));
    }
    let mut values = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        values.push(Value::Integer(current));
        current += step;
    }
    Ok(Value::List(values))
}

fn builtin_sorted(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    arity(arguments, "sorted", 1, 1)?;
    arguments.check_keywords("sorted", &["reverse"])?;
    let mut values = arguments.positional[0].iterate()?;
    let mut failure = None;
    values.sort_by(|a, b| {
        a.compare(b, "<").unwrap_or_else(|error| {
            failure.get_or_insert(error);
            std::cmp::Ordering::Equal
        })
    });
    if let Some(error) = failure {
        return Err(error);
    }
    if arguments.keyword("reverse").is_some_and(Value::is_truthy) {
        values.reverse();
    }
    Ok(Value::List(values))
}

fn builtin_list(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    arity(arguments, "list", 0, 1)?;
    match arguments.positional.first() {
        Some(value) => Ok(Value::List(value.iterate()?)),
        None => Ok(Value::List(Vec::new())),
    }
}

fn builtin_tuple(arguments: &Arguments, _: &mut dyn Write) -> Result<Value, RuntimeError> {
    arity(arguments, "tuple", 0, 1)?;
    match arguments.positional.first() {
        Some(value) => Ok(Value::Tuple(value.iterate()?)),
        None => Ok(Value::Tuple(Vec::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, values: Vec<Value>) -> Result<Value, RuntimeError> {
        let function = lookup(name).unwrap();
        let Value::Function(function) = function else { unreachable!() };
        function.call(&Arguments::positional(values), &mut Vec::new())
    }

    #[test]
    fn print_honours_sep_and_end() {
        let Some(Value::Function(print)) = lookup("print") else { unreachable!() };
        let mut output = Vec::new();
        let arguments = Arguments {
            positional: vec![Value::Integer(1), Value::String("a".into())],
            keywords: vec![("sep".into(), Value::String("-".into())), ("end".into(), Value::String("!".into()))],
        };
        print.call(&arguments, &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "1-a!");
    }

    #[test]
    fn range_and_sum() {
        assert_eq!(
            call("range", vec![Value::Integer(5), Value::Integer(0), Value::Integer(-2)]).unwrap(),
            Value::List(vec![Value::Integer(5), Value::Integer(3), Value::Integer(1)])
        );
        let numbers = call("range", vec![Value::Integer(4)]).unwrap();
        assert_eq!(call("sum", vec![numbers]).unwrap(), Value::Integer(6));
    }

    #[test]
    fn round_uses_bankers_rounding() {
        assert_eq!(call("round", vec![Value::Float(2.5)]).unwrap(), Value::Integer(2));
        assert_eq!(call("round", vec![Value::Float(3.5)]).unwrap(), Value::Integer(4));
        assert_eq!(
            call("round", vec![Value::Float(3.14159), Value::Integer(2)]).unwrap(),
            Value::Float(3.14)
        );
    }

    #[test]
    fn conversion_errors() {
        assert_eq!(
            call("int", vec![Value::String("x".into())]).unwrap_err().to_string(),
            "ValueError: invalid literal for int() with base 10: 'x'"
        );
        assert_eq!(
            call("len", vec![Value::Integer(3)]).unwrap_err().to_string(),
            "TypeError: object of type 'int' has no len()"
        );
        assert_eq!(
            call("max", vec![Value::List(vec![])]).unwrap_err().to_string(),
            "ValueError: max() arg is an empty sequence"
        );
    }
}
