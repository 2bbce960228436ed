use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use tracing::debug;

use crate::error::Error;
use crate::evaluator::{Evaluation, Evaluator};
use crate::example::Example;
use crate::region::Lexeme;

/// Runs an external program with a code block's source on its standard
/// input. A non-zero exit status is a failure whose diagnostic is the
/// program's output.
#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    program: String,
    arguments: Vec<String>,
}

impl CommandEvaluator {
    pub fn new<S: AsRef<str>>(argv: &[S]) -> Result<Self, Error> {
        let (program, arguments) = argv.split_first().ok_or_else(|| Error::value("command must not be empty"))?;
        Ok(CommandEvaluator {
            program: program.as_ref().to_string(),
            arguments: arguments.iter().map(|argument| argument.as_ref().to_string()).collect(),
        })
    }

    fn io_error(&self, source: std::io::Error) -> Error {
        Error::Io { path: PathBuf::from(&self.program), source }
    }
}

impl Evaluator for CommandEvaluator {
    fn evaluate(&self, example: &Example<'_>) -> Evaluation {
        let source = example
            .parsed::<Lexeme>()
            .ok_or_else(|| Error::value(format!("{:?} does not hold source code", example.region)))?;
        debug!(program = %self.program, line = example.line, "running command");

        let mut child = Command::new(&self.program)
            .args(&self.arguments)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| self.io_error(error))?;

        let input = source.as_str().as_bytes().to_vec();
        let writer = child.stdin.take().map(|mut stdin| thread::spawn(move || stdin.write_all(&input)));
        let output = child.wait_with_output().map_err(|error| self.io_error(error))?;
        if let Some(writer) = writer {
            // a program that exits without reading its input closes the pipe early
            let _ = writer.join();
        }

        if output.status.success() {
            return Ok(None);
        }
        let mut diagnostic = format!("{} exited with {}\n", self.program, output.status);
        diagnostic.push_str(&String::from_utf8_lossy(&output.stdout));
        diagnostic.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(Some(diagnostic))
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::region::Region;
    use std::rc::Rc;

    fn run(argv: &[&str], source: &str) -> Result<(), Error> {
        let mut document = Document::new(source, "page.md");
        let evaluator = CommandEvaluator::new(argv).unwrap();
        document
            .add(Region::new(0, source.len(), Lexeme::new(source, 0, 0), Rc::new(evaluator)))
            .unwrap();
        document.examples().next().unwrap().evaluate()
    }

    #[test]
    fn zero_exit_passes() {
        assert!(run(&["sh"], "true\n").is_ok());
    }

    #[test]
    fn non_zero_exit_fails_with_output() {
        match run(&["sh"], "echo broken\nexit 3\n") {
            Err(Error::Failure(failure)) => {
                assert!(failure.output.starts_with("sh exited with"));
                assert!(failure.output.ends_with("broken\n"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_an_error() {
        assert!(matches!(run(&["/no/such/program"], "x\n"), Err(Error::Io { .. })));
        assert!(CommandEvaluator::new::<&str>(&[]).is_err());
    }
}
