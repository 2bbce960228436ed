use interpreter::{BUILTINS_KEY, Flags, Future, Interpreter};
use tracing::debug;

use crate::error::Error;
use crate::evaluator::{Evaluation, Evaluator};
use crate::example::Example;
use crate::region::Lexeme;

/// Runs a code block's source in the interpreter against the document's
/// namespace. Errors propagate as [`Error::Runtime`], with line numbers
/// counted from the top of the document.
#[derive(Debug, Clone, Default)]
pub struct ScriptEvaluator {
    flags: Flags,
}

impl ScriptEvaluator {
    pub fn new(futures: &[Future]) -> Self {
        ScriptEvaluator { flags: Flags::from_futures(futures) }
    }

    /// Build from feature names such as `"division"`.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, Error> {
        let futures = names
            .iter()
            .map(|name| name.as_ref().parse::<Future>().map_err(|error| Error::value(error.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ScriptEvaluator::new(&futures))
    }
}

impl Evaluator for ScriptEvaluator {
    fn evaluate(&self, example: &Example<'_>) -> Evaluation {
        let source = example
            .parsed::<Lexeme>()
            .ok_or_else(|| Error::value(format!("{:?} does not hold source code", example.region)))?;
        let interpreter = Interpreter::new(example.path().display().to_string())
            .with_flags(self.flags)
            .with_line_offset(example.line + source.line_offset);

        let mut output = Vec::new();
        let result = interpreter.run(source.as_str(), example.namespace(), &mut output);
        example.namespace().remove(BUILTINS_KEY);
        if !output.is_empty() {
            debug!(line = example.line, output = %String::from_utf8_lossy(&output), "script output");
        }
        result?;
        Ok(None)
    }

    fn name(&self) -> &str {
        "script"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::region::Region;
    use interpreter::Value;
    use std::rc::Rc;

    fn document_with(source: &str, evaluator: ScriptEvaluator) -> Document {
        let text = format!("header\n.. code:\n{source}");
        let mut document = Document::new(text.clone(), "/docs/page.md");
        let lexeme = Lexeme::new(source, 0, 0);
        document.add(Region::new(7, text.len(), lexeme, Rc::new(evaluator))).unwrap();
        document
    }

    #[test]
    fn runs_against_the_namespace() {
        let document = document_with("x = 1 + 2\n", ScriptEvaluator::default());
        document.examples().next().unwrap().evaluate().unwrap();
        assert!(matches!(document.namespace().get("x"), Some(Value::Integer(3))));
        assert!(!document.namespace().contains(BUILTINS_KEY));
    }

    #[test]
    fn futures_change_division() {
        let evaluator = ScriptEvaluator::from_names(&["division"]).unwrap();
        let document = document_with("x = 1 / 2\n", evaluator);
        document.examples().next().unwrap().evaluate().unwrap();
        assert!(matches!(document.namespace().get("x"), Some(Value::Float(n)) if n == 0.5));
        assert!(ScriptEvaluator::from_names(&["braces"]).is_err());
    }

    #[test]
    fn errors_report_document_lines() {
        let document = document_with("x = 1\nassert x == 2\n", ScriptEvaluator::default());
        let error = document.examples().next().unwrap().evaluate().unwrap_err();
        match error {
            Error::Runtime(traceback) => {
                assert_eq!(traceback.line, 4);
                assert_eq!(traceback.filename, "/docs/page.md");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
