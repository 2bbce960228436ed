use std::io::{self, Write};
use std::str::FromStr;

use tracing::debug;

use crate::ast::{Located, Statement, Target};
use crate::environment::Namespace;
use crate::error::{RuntimeError, Traceback};
use crate::evaluator::{Context, apply_binary, evaluate, lookup};
use crate::parser::{parse_expression, parse_program};
use crate::runtime_value::Value;

/// Name under which the builtins module is bound while a script runs.
pub const BUILTINS_KEY: &str = "__builtins__";

/// Optional language features that change the semantics of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Future {
    /// `/` between integers produces a float.
    Division,
}

impl FromStr for Future {
    type Err = RuntimeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "division" => Ok(Future::Division),
            other => Err(RuntimeError::Syntax(format!("future feature {} is not defined", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub true_division: bool,
}

impl Flags {
    pub fn from_futures(futures: &[Future]) -> Self {
        let mut flags = Flags::default();
        for future in futures {
            match future {
                Future::Division => flags.true_division = true,
            }
        }
        flags
    }
}

/// How a script's expression statements are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Expression values are discarded.
    #[default]
    Exec,
    /// The `repr()` of every expression value other than `None` is written to
    /// the output, as an interactive session echoes it.
    Interactive,
}

/// Runs source text against a namespace.
#[derive(Debug, Clone)]
pub struct Interpreter {
    filename: String,
    flags: Flags,
    mode: Mode,
    line_offset: usize,
}

impl Interpreter {
    pub fn new(filename: impl Into<String>) -> Self {
        Interpreter {
            filename: filename.into(),
            flags: Flags::default(),
            mode: Mode::Exec,
            line_offset: 0,
        }
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Number of lines in the file that precede the source, so reported line
    /// numbers refer to the file rather than the snippet.
    pub fn with_line_offset(mut self, line_offset: usize) -> Self {
        self.line_offset = line_offset;
        self
    }

    fn traceback(&self, error: RuntimeError, line: usize) -> Traceback {
        Traceback::new(error, self.filename.clone(), self.line_offset + line)
    }

    /// Execute every statement in `source`, writing printed text to `output`.
    pub fn run(
        &self,
        source: &str,
        namespace: &Namespace,
        output: &mut dyn Write,
    ) -> Result<(), Traceback> {
        debug!(filename = %self.filename, line = self.line_offset + 1, "running script");
        let program = parse_program(source)
            .map_err(|error| self.traceback(RuntimeError::Syntax(error.message), error.line))?;
        if !namespace.contains(BUILTINS_KEY) {
            namespace.insert(BUILTINS_KEY, Value::Module("builtins".into()));
        }
        let mut context = Context { namespace, flags: self.flags, output };
        execute_block(&program, &mut context, self.mode)
            .map_err(|(error, line)| self.traceback(error, line))
    }

    /// Evaluate a single expression.
    pub fn eval(&self, expression: &str, namespace: &Namespace) -> Result<Value, Traceback> {
        let expr = parse_expression(expression)
            .map_err(|error| self.traceback(RuntimeError::Syntax(error.message), error.line))?;
        let mut sink = io::sink();
        let mut context = Context { namespace, flags: self.flags, output: &mut sink };
        evaluate(&expr, &mut context).map_err(|error| self.traceback(error, 1))
    }
}

fn execute_block(
    statements: &[Located],
    context: &mut Context<'_>,
    mode: Mode,
) -> Result<(), (RuntimeError, usize)> {
    for located in statements {
        execute(located, context, mode)?;
    }
    Ok(())
}

fn execute(
    located: &Located,
    context: &mut Context<'_>,
    mode: Mode,
) -> Result<(), (RuntimeError, usize)> {
    let at = |error: RuntimeError| (error, located.line);

    match &located.statement {
        Statement::Expression(expr) => {
            let value = evaluate(expr, context).map_err(at)?;
            if mode == Mode::Interactive && !matches!(value, Value::None) {
                writeln!(context.output, "{}", value.repr()).map_err(|e| at(e.into()))?;
            }
        }
        Statement::Assign { target, value } => {
            let value = evaluate(value, context).map_err(at)?;
            bind(target, value, context.namespace).map_err(at)?;
        }
        Statement::AugmentedAssign { name, operator, value } => {
            let current = lookup(name, context.namespace).map_err(at)?;
            let value = evaluate(value, context).map_err(at)?;
            let updated = apply_binary(*operator, &current, &value, context.flags.true_division)
                .map_err(at)?;
            context.namespace.insert(name.clone(), updated);
        }
        Statement::Assert { test, message } => {
            if !evaluate(test, context).map_err(at)?.is_truthy() {
                let message = match message {
                    Some(expr) => Some(evaluate(expr, context).map_err(at)?.to_string()),
                    None => None,
                };
                return Err(at(RuntimeError::Assertion(message)));
            }
        }
        Statement::Delete(names) => {
            for name in names {
                if context.namespace.remove(name).is_none() {
                    return Err(at(RuntimeError::UndefinedVariable(name.clone())));
                }
            }
        }
        Statement::Pass => {}
        Statement::If { branches, otherwise } => {
            for (condition, body) in branches {
                if evaluate(condition, context).map_err(at)?.is_truthy() {
                    return execute_block(body, context, mode);
                }
            }
            execute_block(otherwise, context, mode)?;
        }
        Statement::For { target, iterable, body } => {
            let items = evaluate(iterable, context).map_err(at)?.iterate().map_err(at)?;
            for item in items {
                bind(target, item, context.namespace).map_err(at)?;
                execute_block(body, context, mode)?;
            }
        }
    }
    Ok(())
}

fn bind(target: &Target, value: Value, namespace: &Namespace) -> Result<(), RuntimeError> {
    match target {
        Target::Name(name) => {
            namespace.insert(name.clone(), value);
        }
        Target::Unpack(names) => {
            let items = value.iterate()?;
            if items.len() > names.len() {
                return Err(RuntimeError::Value(format!(
                    "too many values to unpack (expected {})",
                    names.len()
                )));
            }
            if items.len() < names.len() {
                return Err(RuntimeError::Value(format!(
                    "not enough values to unpack (expected {}, got {})",
                    names.len(),
                    items.len()
                )));
            }
            for (name, item) in names.iter().zip(items) {
                namespace.insert(name.clone(), item);
            }
        }
    }
    Ok(())
}
