use std::fmt;

/// An exception raised while compiling or running a script.
///
/// `Display` renders the final line of a traceback (`Kind: message`), which is
/// what interactive sessions compare against when an exception is expected.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    Syntax(String),
    UndefinedVariable(String),
    Type(String),
    Value(String),
    Index(String),
    DivisionByZero(String),
    Overflow(String),
    Assertion(Option<String>),
    Io(String),
}

impl RuntimeError {
    /// The exception class name, e.g. `NameError`.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::Syntax(_) => "SyntaxError",
            RuntimeError::UndefinedVariable(_) => "NameError",
            RuntimeError::Type(_) => "TypeError",
            RuntimeError::Value(_) => "ValueError",
            RuntimeError::Index(_) => "IndexError",
            RuntimeError::DivisionByZero(_) => "ZeroDivisionError",
            RuntimeError::Overflow(_) => "OverflowError",
            RuntimeError::Assertion(_) => "AssertionError",
            RuntimeError::Io(_) => "OSError",
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::Type(message.into())
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UndefinedVariable(name) => {
                write!(f, "NameError: name '{}' is not defined", name)
            }
            RuntimeError::Assertion(None) => write!(f, "AssertionError"),
            RuntimeError::Assertion(Some(message)) => write!(f, "AssertionError: {}", message),
            RuntimeError::Syntax(message)
            | RuntimeError::Type(message)
            | RuntimeError::Value(message)
            | RuntimeError::Index(message)
            | RuntimeError::DivisionByZero(message)
            | RuntimeError::Overflow(message)
            | RuntimeError::Io(message) => write!(f, "{}: {}", self.kind(), message),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// A syntax error found while tokenizing or parsing, with its 1-based line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        ParseError { message: message.into(), line }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyntaxError: {} (line {})", self.message, self.line)
    }
}

impl std::error::Error for ParseError {}

/// A runtime error enriched with the file and line it was raised from.
#[derive(Debug, Clone, PartialEq)]
pub struct Traceback {
    pub error: RuntimeError,
    pub filename: String,
    pub line: usize,
}

impl Traceback {
    pub fn new(error: RuntimeError, filename: impl Into<String>, line: usize) -> Self {
        Traceback { error, filename: filename.into(), line }
    }

    /// The last line of the traceback followed by a newline, as an interactive
    /// session prints it.
    pub fn exception_only(&self) -> String {
        format!("{}\n", self.error)
    }
}

impl fmt::Display for Traceback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Traceback (most recent call last):\n  File \"{}\", line {}, in <module>\n{}",
            self.filename, self.line, self.error
        )
    }
}

impl std::error::Error for Traceback {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(error: std::io::Error) -> Self {
        RuntimeError::Io(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traceback_renders_location_and_exception() {
        let traceback = Traceback::new(
            RuntimeError::DivisionByZero("division by zero".into()),
            "/docs/index.md",
            7,
        );
        assert_eq!(
            traceback.to_string(),
            "Traceback (most recent call last):\n  File \"/docs/index.md\", line 7, in <module>\nZeroDivisionError: division by zero"
        );
        assert_eq!(traceback.exception_only(), "ZeroDivisionError: division by zero\n");
    }

    #[test]
    fn bare_assertion_has_no_message() {
        assert_eq!(RuntimeError::Assertion(None).to_string(), "AssertionError");
        assert_eq!(
            RuntimeError::UndefinedVariable("x".into()).to_string(),
            "NameError: name 'x' is not defined"
        );
    }
}
