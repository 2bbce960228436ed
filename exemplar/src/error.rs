use std::ops::Range;
use std::path::PathBuf;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use thiserror::Error;

use crate::text::repr;

/// An example whose evaluator reported a non-empty diagnostic.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "Example at {}, line {line}, column {column} did not evaluate as expected:\n{output}",
    .path.display()
)]
pub struct ExampleFailure {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    pub span: Range<usize>,
    pub output: String,
}

/// A block whose start was found but whose end pattern never matched.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Could not match {} in {}:\n{}", repr(.end), .path.display(), repr(.remainder))]
pub struct LexingError {
    pub path: PathBuf,
    pub end: String,
    pub offset: usize,
    pub remainder: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Failure(#[from] ExampleFailure),

    /// Raised by an example that should be recorded as skipped.
    #[error("skipped: {0}")]
    Skip(String),

    /// Misuse of the API or malformed directives, such as overlapping regions
    /// or an out-of-order skip.
    #[error("{0}")]
    Value(String),

    #[error(transparent)]
    Lexing(#[from] LexingError),

    #[error(transparent)]
    Runtime(#[from] interpreter::Traceback),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is not valid {encoding}", .path.display())]
    Decode { path: PathBuf, encoding: &'static str },

    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),
}

impl Error {
    pub fn value(message: impl Into<String>) -> Self {
        Error::Value(message.into())
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Error::Skip(_))
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self, file_id: usize) -> Diagnostic<usize> {
        match self {
            Error::Failure(failure) => Diagnostic::error()
                .with_message("example did not evaluate as expected")
                .with_labels(vec![Label::primary(file_id, failure.span.clone())])
                .with_notes(vec![failure.output.clone()]),
            Error::Lexing(error) => Diagnostic::error()
                .with_message(format!("could not match {}", repr(&error.end)))
                .with_labels(vec![
                    Label::primary(file_id, error.offset..error.offset)
                        .with_message("block starts here and is never closed"),
                ]),
            Error::Runtime(traceback) => Diagnostic::error()
                .with_message(traceback.error.to_string())
                .with_notes(vec![traceback.to_string()]),
            other => Diagnostic::error().with_message(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexing_error_quotes_like_a_repr() {
        let error = LexingError {
            path: PathBuf::from("/the/path"),
            end: "END".into(),
            offset: 5,
            remainder: "\nEDN\n".into(),
        };
        assert_eq!(error.to_string(), "Could not match 'END' in /the/path:\n'\\nEDN\\n'");
    }

    #[test]
    fn failure_message_names_location() {
        let failure = ExampleFailure {
            path: PathBuf::from("/docs/a.md"),
            line: 3,
            column: 1,
            span: 10..20,
            output: "Expected 1, got 2".into(),
        };
        assert_eq!(
            Error::from(failure).to_string(),
            "Example at /docs/a.md, line 3, column 1 did not evaluate as expected:\nExpected 1, got 2"
        );
    }
}
