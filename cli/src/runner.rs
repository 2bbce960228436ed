use std::ops::Range;
use std::path::{Path, PathBuf};

use codespan_reporting::diagnostic::Label;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use exemplar::{Document, Encoding, Error, Parser};
use interpreter::Value;
use tracing::{debug, info};

use crate::config::{Config, ConfigError};

#[derive(Debug)]
pub enum Outcome {
    Pass,
    Skip(String),
    /// The example did not behave as documented.
    Fail(Error),
    /// Evaluation went wrong in some other way.
    Error(Error),
}

#[derive(Debug)]
pub struct ExampleResult {
    pub line: usize,
    pub column: usize,
    pub span: Range<usize>,
    pub outcome: Outcome,
}

/// Everything learned from checking one document.
#[derive(Debug)]
pub struct DocumentReport {
    pub path: PathBuf,
    pub text: String,
    pub examples: Vec<ExampleResult>,
    /// Set when the document could not be parsed, in which case there are
    /// no examples.
    pub error: Option<Error>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub documents: usize,
    pub passed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: usize,
}

impl Summary {
    pub fn add(&mut self, report: &DocumentReport) {
        self.documents += 1;
        if report.error.is_some() {
            self.errors += 1;
        }
        for example in &report.examples {
            match example.outcome {
                Outcome::Pass => self.passed += 1,
                Outcome::Skip(_) => self.skipped += 1,
                Outcome::Fail(_) => self.failed += 1,
                Outcome::Error(_) => self.errors += 1,
            }
        }
    }

    /// 0 when nothing failed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.failed + self.errors == 0 { 0 } else { 1 }
    }
}

/// Parses documents and evaluates their examples.
pub struct Runner {
    parsers: Vec<Box<dyn Parser>>,
    encoding: Encoding,
    namespace: Vec<(String, Value)>,
}

impl Runner {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Runner {
            parsers: config.parsers()?,
            encoding: config.encoding()?,
            namespace: config.initial_namespace()?,
        })
    }

    pub fn parse(&self, path: &Path) -> Result<Document, Error> {
        Document::parse(path, &self.parsers, self.encoding)
    }

    pub fn run_document(&self, path: &Path) -> DocumentReport {
        let document = match self.parse(path) {
            Ok(document) => document,
            Err(error) => {
                let text = std::fs::read(path).map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
                return DocumentReport {
                    path: path.to_path_buf(),
                    text: text.unwrap_or_default(),
                    examples: Vec::new(),
                    error: Some(error),
                };
            }
        };

        for (name, value) in &self.namespace {
            document.namespace().insert(name.as_str(), value.clone());
        }

        let mut examples = Vec::new();
        for example in document.examples() {
            let outcome = match example.evaluate() {
                Ok(()) => Outcome::Pass,
                Err(Error::Skip(reason)) => Outcome::Skip(reason),
                Err(error @ Error::Failure(_)) => Outcome::Fail(error),
                Err(error) => Outcome::Error(error),
            };
            debug!(path = %path.display(), line = example.line, column = example.column, ?outcome, "evaluated");
            examples.push(ExampleResult {
                line: example.line,
                column: example.column,
                span: example.start()..example.end(),
                outcome,
            });
        }
        info!(path = %path.display(), examples = examples.len(), "checked");

        DocumentReport { path: path.to_path_buf(), text: document.text().to_string(), examples, error: None }
    }
}

fn label(text: &str, colour: &str, no_color: bool) -> String {
    if no_color { text.to_string() } else { format!("\x1b[{colour}m{text}\x1b[0m") }
}

fn bold(s: &str, no_color: bool) -> String {
    label(s, "1", no_color)
}

/// Print each document's results, then the details of every failure and
/// error, then the totals. Returns the totals.
pub fn print_reports(reports: &[DocumentReport], no_color: bool) -> Summary {
    let mut summary = Summary::default();
    for report in reports {
        summary.add(report);
        eprintln!();
        eprintln!("{}", bold(&report.path.display().to_string(), no_color));
        if let Some(error) = &report.error {
            eprintln!("  {}  {}", label("ERROR", "31", no_color), error);
        }
        for example in &report.examples {
            let (status, detail) = match &example.outcome {
                Outcome::Pass => (label("PASS", "32", no_color), String::new()),
                Outcome::Skip(reason) => (label("SKIP", "33", no_color), format!(" ({reason})")),
                Outcome::Fail(_) => (label("FAIL", "31", no_color), String::new()),
                Outcome::Error(_) => (label("ERROR", "31", no_color), String::new()),
            };
            eprintln!("  {status}  line {}, column {}{detail}", example.line, example.column);
        }
    }

    if summary.failed + summary.errors > 0 {
        eprintln!();
        eprintln!("failures:");
        emit_failures(reports, no_color);
    }

    eprintln!();
    let totals = format!(
        "{} passed, {} skipped, {} failed, {} errors in {} documents",
        summary.passed, summary.skipped, summary.failed, summary.errors, summary.documents
    );
    if summary.exit_code() == 0 {
        eprintln!("test result: {}. {totals}", label("ok", "32", no_color));
    } else {
        eprintln!("test result: {}. {totals}", label("FAILED", "31", no_color));
    }
    summary
}

fn emit_failures(reports: &[DocumentReport], no_color: bool) {
    let color_choice = if no_color { ColorChoice::Never } else { ColorChoice::Auto };
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    let mut files = SimpleFiles::new();

    for report in reports {
        let broken: Vec<(&Error, Option<&Range<usize>>)> = report
            .error
            .iter()
            .map(|error| (error, None))
            .chain(report.examples.iter().filter_map(|example| match &example.outcome {
                Outcome::Fail(error) | Outcome::Error(error) => Some((error, Some(&example.span))),
                Outcome::Pass | Outcome::Skip(_) => None,
            }))
            .collect();
        if broken.is_empty() {
            continue;
        }

        let file_id = files.add(report.path.display().to_string(), report.text.clone());
        for (error, span) in broken {
            let mut diagnostic = error.to_diagnostic(file_id);
            if let Some(span) = span.filter(|_| diagnostic.labels.is_empty()) {
                diagnostic.labels.push(Label::primary(file_id, span.clone()));
            }
            let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(directory: &Path, name: &str, text: &str) -> PathBuf {
        let path = directory.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    fn runner(config: &str) -> Runner {
        Runner::new(&Config::from_toml(config, Path::new("exemplar.toml")).unwrap()).unwrap()
    }

    const DOCUMENT: &str = "\
```python
x = greeting
```

```python
>>> x
'hi'
>>> 1 + 1
3
```

<!-- skip: next if(True, reason='later') -->

```python
assert False
```

```python
undefined
```
";

    #[test]
    fn outcomes_per_example() {
        let directory = tempfile::tempdir().unwrap();
        let path = write(directory.path(), "doc.md", DOCUMENT);
        let report = runner("[namespace]\ngreeting = 'hi'").run_document(&path);
        assert!(report.error.is_none());

        let positions: Vec<(usize, usize)> = report.examples.iter().map(|example| (example.line, example.column)).collect();
        assert_eq!(positions, vec![(1, 1), (6, 1), (8, 1), (12, 1), (14, 1), (18, 1)]);

        let outcomes = &report.examples;
        assert!(matches!(outcomes[0].outcome, Outcome::Pass));
        assert!(matches!(outcomes[1].outcome, Outcome::Pass));
        assert!(matches!(outcomes[2].outcome, Outcome::Fail(_)));
        assert!(matches!(outcomes[3].outcome, Outcome::Pass));
        assert!(matches!(&outcomes[4].outcome, Outcome::Skip(reason) if reason == "later"));
        match &outcomes[5].outcome {
            Outcome::Error(Error::Runtime(traceback)) => {
                assert_eq!(traceback.line, 19);
                assert_eq!(traceback.error.to_string(), "NameError: name 'undefined' is not defined");
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut summary = Summary::default();
        summary.add(&report);
        assert_eq!(summary, Summary { documents: 1, passed: 3, skipped: 1, failed: 1, errors: 1 });
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn unparseable_documents_are_errors() {
        let directory = tempfile::tempdir().unwrap();
        let path = write(directory.path(), "broken.md", "<!-- skip: next\n");
        let report = runner("").run_document(&path);
        assert!(matches!(report.error, Some(Error::Lexing(_))));
        assert_eq!(report.text, "<!-- skip: next\n");

        let mut summary = Summary::default();
        summary.add(&report);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn each_document_gets_a_fresh_namespace() {
        let directory = tempfile::tempdir().unwrap();
        let first = write(directory.path(), "a.md", "```python\nx = 1\n```\n");
        let second = write(directory.path(), "b.md", "```python\nx\n```\n");
        let runner = runner("");
        assert!(matches!(runner.run_document(&first).examples[0].outcome, Outcome::Pass));
        assert!(matches!(runner.run_document(&second).examples[0].outcome, Outcome::Error(Error::Runtime(_))));
    }

    #[test]
    fn passing_documents_exit_zero() {
        let directory = tempfile::tempdir().unwrap();
        let path = write(directory.path(), "ok.rst", ".. code-block:: python\n\n    x = 1\n\n>>> x + 1\n2\n");
        let report = runner("flavour = 'rest'").run_document(&path);
        let summary = print_reports(&[report], true);
        assert_eq!(summary, Summary { documents: 1, passed: 2, skipped: 0, failed: 0, errors: 0 });
        assert_eq!(summary.exit_code(), 0);
    }
}
