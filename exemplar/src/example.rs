use std::any::Any;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use interpreter::Namespace;
use tracing::debug;

use crate::document::Document;
use crate::error::{Error, ExampleFailure};
use crate::evaluator::Evaluator;
use crate::region::Region;

/// One region of a document, ready to be evaluated in that document's
/// context.
#[derive(Clone, Copy)]
pub struct Example<'a> {
    pub document: &'a Document,
    /// 1-based line on which the region starts.
    pub line: usize,
    /// 1-based column at which the region starts.
    pub column: usize,
    pub region: &'a Region,
}

impl<'a> Example<'a> {
    pub fn path(&self) -> &'a Path {
        self.document.path()
    }

    pub fn start(&self) -> usize {
        self.region.start
    }

    pub fn end(&self) -> usize {
        self.region.end
    }

    pub fn parsed<T: Any>(&self) -> Option<&'a T> {
        self.region.parsed()
    }

    pub fn namespace(&self) -> &'a Namespace {
        self.document.namespace()
    }

    /// The evaluator that will run: the document's active override if there
    /// is one, otherwise the region's own.
    pub fn evaluator(&self) -> Rc<dyn Evaluator> {
        self.document
            .evaluator()
            .unwrap_or_else(|| Rc::clone(&self.region.evaluator))
    }

    /// Run the active evaluator. A non-empty diagnostic becomes
    /// [`Error::Failure`]; errors from the evaluator propagate unchanged.
    pub fn evaluate(&self) -> Result<(), Error> {
        let evaluator = self.evaluator();
        debug!(
            path = %self.path().display(),
            line = self.line,
            column = self.column,
            evaluator = evaluator.name(),
            "evaluating example"
        );
        match evaluator.evaluate(self)? {
            Some(output) if !output.is_empty() => Err(ExampleFailure {
                path: self.path().to_path_buf(),
                line: self.line,
                column: self.column,
                span: self.start()..self.end(),
                output,
            }
            .into()),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Example<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Example path={} line={} column={} using {}>",
            self.path().display(),
            self.line,
            self.column,
            self.region.evaluator.name()
        )
    }
}
