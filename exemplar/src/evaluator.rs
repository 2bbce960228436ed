use std::rc::Rc;

use crate::error::Error;
use crate::example::Example;

/// What an evaluator returns: `Ok(None)` or `Ok(Some(""))` for success,
/// `Ok(Some(diagnostic))` for an example that did not behave as documented,
/// and `Err` for anything else, which propagates unchanged.
pub type Evaluation = Result<Option<String>, Error>;

/// Checks one example.
pub trait Evaluator {
    fn evaluate(&self, example: &Example<'_>) -> Evaluation;

    /// Short name used when regions are displayed.
    fn name(&self) -> &str;
}

/// An evaluator backed by a closure.
pub struct FnEvaluator<F> {
    name: String,
    function: F,
}

impl<F> Evaluator for FnEvaluator<F>
where
    F: Fn(&Example<'_>) -> Evaluation,
{
    fn evaluate(&self, example: &Example<'_>) -> Evaluation {
        (self.function)(example)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn evaluator_fn<F>(name: impl Into<String>, function: F) -> Rc<dyn Evaluator>
where
    F: Fn(&Example<'_>) -> Evaluation + 'static,
{
    Rc::new(FnEvaluator { name: name.into(), function })
}
