//! The skip state machine.
//!
//! A `skip: start` or `skip: next` directive installs a [`Skipper`] as the
//! document's evaluator override so that it sees every following example.
//! `skip: end`, or the single example after `skip: next`, removes it again.

use std::fmt;
use std::str::FromStr;

use interpreter::{Arguments, Interpreter, RuntimeError, Value};
use tracing::debug;

use crate::document::Document;
use crate::error::Error;
use crate::evaluator::{Evaluation, Evaluator};
use crate::example::Example;

/// What a skip directive asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Next,
    End,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Next => "next",
            Action::End => "end",
        }
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(action: &str) -> Result<Self, Self::Err> {
        match action {
            "start" => Ok(Action::Start),
            "next" => Ok(Action::Next),
            "end" => Ok(Action::End),
            other => Err(Error::value(format!("Bad skip action: {other}"))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parsed form of a skip directive. The action is checked when the
/// directive is evaluated, not when it is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipDirective {
    pub action: String,
    /// The parenthesised argument list following `if`, such as
    /// `(x > 1, reason='too big')`.
    pub condition: Option<String>,
}

impl SkipDirective {
    pub fn new(action: impl Into<String>, condition: Option<String>) -> Self {
        SkipDirective { action: action.into(), condition }
    }
}

/// What happens to examples while a skip is in force.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suppression {
    /// The condition was false: examples run with their own evaluators.
    Inactive,
    /// Examples are not evaluated and count as passing.
    Silent,
    /// Examples are reported as skipped for this reason.
    Reason(String),
}

/// Per-document skip bookkeeping, held by the [`Document`].
#[derive(Debug, Clone)]
pub struct SkipState {
    last_action: Action,
    suppression: Suppression,
    /// Set by `skip: next`: the override goes after one more example.
    remove: bool,
}

const IF_HELPER: &str = "__if__";

/// The evaluator bound to skip directives.
#[derive(Debug, Default)]
pub struct Skipper;

impl Skipper {
    pub fn new() -> Self {
        Skipper
    }

    fn evaluate_directive(&self, example: &Example<'_>, directive: &SkipDirective) -> Evaluation {
        let document = example.document;
        let action: Action = directive.action.parse()?;
        let last_action = document.skip_state().borrow().as_ref().map(|state| state.last_action);
        match (last_action, action) {
            (None, Action::End) => {
                return Err(Error::value(format!("'skip: {action}' must follow 'skip: start'")));
            }
            (Some(last), Action::Start | Action::Next) => {
                return Err(Error::value(format!("'skip: {action}' cannot follow 'skip: {last}'")));
            }
            _ => {}
        }

        debug!(action = %action, line = example.line, "skip directive");
        match action {
            Action::Start | Action::Next => {
                let suppression = match &directive.condition {
                    None => Suppression::Silent,
                    Some(condition) => evaluate_condition(example, condition)?,
                };
                *document.skip_state().borrow_mut() = Some(SkipState {
                    last_action: action,
                    suppression,
                    remove: action == Action::Next,
                });
                document.push_evaluator(example.region.evaluator.clone());
            }
            Action::End => {
                remove(document);
                if directive.condition.is_some() {
                    return Err(Error::value("Cannot have condition on 'skip: end'"));
                }
            }
        }
        Ok(None)
    }

    fn evaluate_other(&self, example: &Example<'_>) -> Evaluation {
        let document = example.document;
        let Some(state) = document.skip_state().borrow().clone() else {
            return example.region.evaluator.evaluate(example);
        };
        if state.remove {
            remove(document);
        }
        match state.suppression {
            Suppression::Inactive => example.region.evaluator.evaluate(example),
            Suppression::Silent => {
                debug!(line = example.line, "example skipped");
                Ok(None)
            }
            Suppression::Reason(reason) => Err(Error::Skip(reason)),
        }
    }
}

impl Evaluator for Skipper {
    fn evaluate(&self, example: &Example<'_>) -> Evaluation {
        match example.parsed::<SkipDirective>() {
            Some(directive) => self.evaluate_directive(example, directive),
            None => self.evaluate_other(example),
        }
    }

    fn name(&self) -> &str {
        "skip"
    }
}

fn remove(document: &Document) {
    if document.skip_state().borrow_mut().take().is_some() {
        document.pop_evaluator();
    }
}

/// Evaluate `__if__(...)` in a copy of the namespace. The helper returns the
/// reason, defaulting to the condition text, when its first argument is true.
fn evaluate_condition(example: &Example<'_>, condition: &str) -> Result<Suppression, Error> {
    let namespace = example.namespace().copy();
    let default_reason = condition.to_string();
    namespace.insert(
        IF_HELPER,
        Value::function(IF_HELPER, move |arguments: &Arguments, _| {
            arguments.check_keywords(IF_HELPER, &["reason"])?;
            let (condition, reason) = match arguments.positional.as_slice() {
                [condition] => (condition, arguments.keyword("reason")),
                [condition, reason] => (condition, Some(reason)),
                _ => {
                    return Err(RuntimeError::type_error(format!(
                        "{IF_HELPER}() takes 1 or 2 arguments ({} given)",
                        arguments.positional.len()
                    )));
                }
            };
            if !condition.is_truthy() {
                return Ok(Value::None);
            }
            Ok(match reason {
                Some(reason) if reason.is_truthy() => reason.clone(),
                _ => Value::String(default_reason.clone()),
            })
        }),
    );
    let interpreter = Interpreter::new(example.path().display().to_string())
        .with_line_offset(example.line.saturating_sub(1));
    let reason = interpreter.eval(&format!("{IF_HELPER}{condition}"), &namespace)?;
    Ok(if reason.is_truthy() { Suppression::Reason(reason.to_string()) } else { Suppression::Inactive })
}
