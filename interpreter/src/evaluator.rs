use std::io::Write;

use crate::ast::{
    Argument, BinaryOperator, ComparisonOperator, Expr, LogicalOperator, UnaryOperator,
};
use crate::builtins;
use crate::environment::Namespace;
use crate::error::RuntimeError;
use crate::executor::Flags;
use crate::runtime_value::{Arguments, Number, Value};

const MAX_REPEAT: usize = 10_000_000;

/// Everything an expression can observe while it is evaluated.
pub struct Context<'a> {
    pub namespace: &'a Namespace,
    pub flags: Flags,
    pub output: &'a mut dyn Write,
}

/// Evaluate an expression AST node to produce a runtime value.
pub fn evaluate(expr: &Expr, context: &mut Context<'_>) -> Result<Value, RuntimeError> {
    match expr {
        Expr::None => Ok(Value::None),
        Expr::Boolean(b) => Ok(Value::Boolean(*b)),
        Expr::Integer(n) => Ok(Value::Integer(*n)),
        Expr::Float(n) => Ok(Value::Float(*n)),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Name(name) => lookup(name, context.namespace),
        Expr::List(items) => Ok(Value::List(evaluate_all(items, context)?)),
        Expr::Tuple(items) => Ok(Value::Tuple(evaluate_all(items, context)?)),

        Expr::Unary { operator, operand } => {
            let value = evaluate(operand, context)?;
            apply_unary(*operator, &value)
        }
        Expr::Binary { operator, left, right } => {
            let left = evaluate(left, context)?;
            let right = evaluate(right, context)?;
            apply_binary(*operator, &left, &right, context.flags.true_division)
        }
        Expr::Compare { first, rest } => {
            let mut left = evaluate(first, context)?;
            for (operator, right) in rest {
                let right = evaluate(right, context)?;
                if !compare(*operator, &left, &right)? {
                    return Ok(Value::Boolean(false));
                }
                left = right;
            }
            Ok(Value::Boolean(true))
        }
        Expr::Logical { operator, left, right } => {
            let left = evaluate(left, context)?;
            match (operator, left.is_truthy()) {
                (LogicalOperator::And, false) | (LogicalOperator::Or, true) => Ok(left),
                _ => evaluate(right, context),
            }
        }
        Expr::Conditional { condition, true_branch, false_branch } => {
            if evaluate(condition, context)?.is_truthy() {
                evaluate(true_branch, context)
            } else {
                evaluate(false_branch, context)
            }
        }

        Expr::Call { callee, arguments } => {
            let callee = evaluate(callee, context)?;
            let mut evaluated = Arguments::default();
            for argument in arguments {
                match argument {
                    Argument::Positional(expr) => evaluated.positional.push(evaluate(expr, context)?),
                    Argument::Keyword(name, expr) => {
                        let value = evaluate(expr, context)?;
                        evaluated.keywords.push((name.clone(), value));
                    }
                }
            }
            match callee {
                Value::Function(function) => function.call(&evaluated, context.output),
                other => Err(RuntimeError::type_error(format!(
                    "'{}' object is not callable",
                    other.type_name()
                ))),
            }
        }
        Expr::Index { target, index } => {
            let target = evaluate(target, context)?;
            let index = evaluate(index, context)?;
            subscript(&target, &index)
        }
    }
}

fn evaluate_all(items: &[Expr], context: &mut Context<'_>) -> Result<Vec<Value>, RuntimeError> {
    items.iter().map(|item| evaluate(item, context)).collect()
}

/// Resolve a name against the namespace, falling back to the builtins.
pub fn lookup(name: &str, namespace: &Namespace) -> Result<Value, RuntimeError> {
    namespace
        .get(name)
        .or_else(|| builtins::lookup(name))
        .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))
}

fn apply_unary(operator: UnaryOperator, value: &Value) -> Result<Value, RuntimeError> {
    match (operator, value.as_number()) {
        (UnaryOperator::LogicalNot, _) => Ok(Value::Boolean(!value.is_truthy())),
        (UnaryOperator::Negation, Some(Number::Integer(n))) => n
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(overflow),
        (UnaryOperator::Negation, Some(Number::Float(n))) => Ok(Value::Float(-n)),
        (UnaryOperator::Plus, Some(Number::Integer(n))) => Ok(Value::Integer(n)),
        (UnaryOperator::Plus, Some(Number::Float(n))) => Ok(Value::Float(n)),
        (operator, None) => Err(RuntimeError::type_error(format!(
            "bad operand type for unary {}: '{}'",
            if operator == UnaryOperator::Negation { "-" } else { "+" },
            value.type_name()
        ))),
    }
}

fn overflow() -> RuntimeError {
    RuntimeError::Overflow("integer overflow".into())
}

fn unsupported(operator: BinaryOperator, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        operator.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

/// Apply an arithmetic operator. `true_division` selects whether `/` between
/// two integers yields a float or floors.
pub fn apply_binary(
    operator: BinaryOperator,
    left: &Value,
    right: &Value,
    true_division: bool,
) -> Result<Value, RuntimeError> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return numeric(operator, a, b, true_division);
    }
    match (operator, left, right) {
        (BinaryOperator::Addition, Value::String(a), Value::String(b)) => {
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (BinaryOperator::Addition, Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (BinaryOperator::Addition, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::Tuple(a.iter().chain(b).cloned().collect()))
        }
        (BinaryOperator::Multiplication, sequence, count)
        | (BinaryOperator::Multiplication, count, sequence)
            if matches!(count.as_number(), Some(Number::Integer(_)))
                && matches!(sequence, Value::String(_) | Value::List(_) | Value::Tuple(_)) =>
        {
            let Some(Number::Integer(n)) = count.as_number() else {
                return Err(unsupported(operator, left, right));
            };
            repeat(sequence, n.max(0) as usize)
        }
        _ => Err(unsupported(operator, left, right)),
    }
}

fn repeat(sequence: &Value, times: usize) -> Result<Value, RuntimeError> {
    let length = match sequence {
        Value::String(s) => s.len(),
        Value::List(items) | Value::Tuple(items) => items.len(),
        _ => 0,
    };
    if length.saturating_mul(times) > MAX_REPEAT {
        return Err(RuntimeError::Overflow("repeated sequence is too large".into()));
    }
    Ok(match sequence {
        Value::String(s) => Value::String(s.repeat(times)),
        Value::List(items) => Value::List(repeat_items(items, times)),
        Value::Tuple(items) => Value::Tuple(repeat_items(items, times)),
        other => other.clone(),
    })
}

fn repeat_items(items: &[Value], times: usize) -> Vec<Value> {
    items.iter().cloned().cycle().take(items.len() * times).collect()
}

fn numeric(
    operator: BinaryOperator,
    a: Number,
    b: Number,
    true_division: bool,
) -> Result<Value, RuntimeError> {
    use BinaryOperator::*;

    if let (Number::Integer(x), Number::Integer(y)) = (a, b) {
        return match operator {
            Addition => x.checked_add(y).map(Value::Integer).ok_or_else(overflow),
            Subtraction => x.checked_sub(y).map(Value::Integer).ok_or_else(overflow),
            Multiplication => x.checked_mul(y).map(Value::Integer).ok_or_else(overflow),
            Division if true_division => {
                if y == 0 {
                    return Err(RuntimeError::DivisionByZero("division by zero".into()));
                }
                Ok(Value::Float(x as f64 / y as f64))
            }
            Division | FloorDivision => {
                if y == 0 {
                    return Err(RuntimeError::DivisionByZero(
                        "integer division or modulo by zero".into(),
                    ));
                }
                floor_div(x, y).map(Value::Integer).ok_or_else(overflow)
            }
            Modulo => {
                if y == 0 {
                    return Err(RuntimeError::DivisionByZero("integer modulo by zero".into()));
                }
                let r = x.wrapping_rem(y);
                Ok(Value::Integer(if r != 0 && (r < 0) != (y < 0) { r + y } else { r }))
            }
            Power if y >= 0 => u32::try_from(y)
                .ok()
                .and_then(|y| x.checked_pow(y))
                .map(Value::Integer)
                .ok_or_else(overflow),
            Power => {
                if x == 0 {
                    return Err(RuntimeError::DivisionByZero(
                        "0.0 cannot be raised to a negative power".into(),
                    ));
                }
                Ok(Value::Float((x as f64).powf(y as f64)))
            }
        };
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    match operator {
        Addition => Ok(Value::Float(x + y)),
        Subtraction => Ok(Value::Float(x - y)),
        Multiplication => Ok(Value::Float(x * y)),
        Division => {
            if y == 0.0 {
                return Err(RuntimeError::DivisionByZero("float division by zero".into()));
            }
            Ok(Value::Float(x / y))
        }
        FloorDivision => {
            if y == 0.0 {
                return Err(RuntimeError::DivisionByZero("float floor division by zero".into()));
            }
            Ok(Value::Float((x / y).floor()))
        }
        Modulo => {
            if y == 0.0 {
                return Err(RuntimeError::DivisionByZero("float modulo".into()));
            }
            Ok(Value::Float(x - y * (x / y).floor()))
        }
        Power => {
            if x == 0.0 && y < 0.0 {
                return Err(RuntimeError::DivisionByZero(
                    "0.0 cannot be raised to a negative power".into(),
                ));
            }
            Ok(Value::Float(x.powf(y)))
        }
    }
}

fn floor_div(x: i64, y: i64) -> Option<i64> {
    let q = x.checked_div(y)?;
    if x % y != 0 && ((x < 0) != (y < 0)) { q.checked_sub(1) } else { Some(q) }
}

fn compare(operator: ComparisonOperator, left: &Value, right: &Value) -> Result<bool, RuntimeError> {
    use ComparisonOperator::*;

    let symbol = operator.symbol();
    Ok(match operator {
        Equality => left == right,
        Inequality => left != right,
        LessThan => left.compare(right, symbol)?.is_lt(),
        GreaterThan => left.compare(right, symbol)?.is_gt(),
        LessThanOrEqual => left.compare(right, symbol)?.is_le(),
        GreaterThanOrEqual => left.compare(right, symbol)?.is_ge(),
        In => contains(right, left)?,
        NotIn => !contains(right, left)?,
    })
}

fn contains(container: &Value, item: &Value) -> Result<bool, RuntimeError> {
    match (container, item) {
        (Value::String(haystack), Value::String(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::String(_), other) => Err(RuntimeError::type_error(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (Value::List(items) | Value::Tuple(items), item) => Ok(items.contains(item)),
        (other, _) => Err(RuntimeError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn subscript(target: &Value, index: &Value) -> Result<Value, RuntimeError> {
    let length = match target {
        Value::String(s) => s.chars().count(),
        Value::List(items) | Value::Tuple(items) => items.len(),
        other => {
            return Err(RuntimeError::type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            )));
        }
    };
    let Some(Number::Integer(raw)) = index.as_number() else {
        return Err(RuntimeError::type_error(format!(
            "{} indices must be integers, not {}",
            target.type_name(),
            index.type_name()
        )));
    };
    let position = if raw < 0 { raw + length as i64 } else { raw };
    if position < 0 || position >= length as i64 {
        return Err(RuntimeError::Index(format!("{} index out of range", target.type_name())));
    }
    let position = position as usize;
    Ok(match target {
        Value::String(s) => Value::String(s.chars().nth(position).map(String::from).unwrap_or_default()),
        Value::List(items) | Value::Tuple(items) => items[position].clone(),
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    fn eval_with(source: &str, flags: Flags) -> Result<Value, RuntimeError> {
        let namespace = Namespace::new();
        namespace.insert("xs", Value::List(vec![Value::Integer(1), Value::Integer(2)]));
        let mut output = Vec::new();
        let mut context = Context { namespace: &namespace, flags, output: &mut output };
        evaluate(&parse_expression(source).unwrap(), &mut context)
    }

    fn eval(source: &str) -> Value {
        eval_with(source, Flags::default()).unwrap()
    }

    #[test]
    fn integer_division_floors_unless_true_division() {
        assert_eq!(eval("7 / 2"), Value::Integer(3));
        assert_eq!(eval("-7 // 2"), Value::Integer(-4));
        assert_eq!(eval("-7 % 3"), Value::Integer(2));
        let flags = Flags { true_division: true };
        assert_eq!(eval_with("7 / 2", flags).unwrap(), Value::Float(3.5));
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(eval("0 or 'x'"), Value::String("x".into()));
        assert_eq!(eval("[] and 1"), Value::List(vec![]));
        assert_eq!(eval("not 0"), Value::Boolean(true));
    }

    #[test]
    fn membership_indexing_and_chains() {
        assert_eq!(eval("2 in xs"), Value::Boolean(true));
        assert_eq!(eval("'b' not in 'abc'"), Value::Boolean(false));
        assert_eq!(eval("xs[-1]"), Value::Integer(2));
        assert_eq!(eval("1 < 2 < 3"), Value::Boolean(true));
        assert_eq!(eval("1 < 3 < 2"), Value::Boolean(false));
    }

    #[test]
    fn errors_read_like_exceptions() {
        let error = eval_with("1 / 0", Flags { true_division: true }).unwrap_err();
        assert_eq!(error.to_string(), "ZeroDivisionError: division by zero");
        let error = eval_with("xs[5]", Flags::default()).unwrap_err();
        assert_eq!(error.to_string(), "IndexError: list index out of range");
        let error = eval_with("1 + 'a'", Flags::default()).unwrap_err();
        assert_eq!(
            error.to_string(),
            "TypeError: unsupported operand type(s) for +: 'int' and 'str'"
        );
        let error = eval_with("missing", Flags::default()).unwrap_err();
        assert_eq!(error, RuntimeError::UndefinedVariable("missing".into()));
    }

    #[test]
    fn sequences_repeat() {
        assert_eq!(eval("'ab' * 2"), Value::String("abab".into()));
        assert_eq!(eval("2 * [0]"), Value::List(vec![Value::Integer(0), Value::Integer(0)]));
        assert_eq!(
            eval("[1, 2] * 2"),
            Value::List(vec![Value::Integer(1), Value::Integer(2), Value::Integer(1), Value::Integer(2)])
        );
        assert_eq!(eval("(1,) * 3"), Value::Tuple(vec![Value::Integer(1); 3]));
        assert_eq!(eval("[1] * 0"), Value::List(Vec::new()));
    }
}
