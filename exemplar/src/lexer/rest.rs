//! Lexers for reStructuredText documents.

use regex::Regex;

use super::{BlockLexer, EndPattern, Lexer, Mapping};
use crate::document::Document;
use crate::error::Error;
use crate::region::LexedRegion;

const START: &str = r"(?m)^(?P<prefix>[ \t]*)\.\.[ \t]*(?P<directive>{directive}){delimiter}[ \t]*(?P<arguments>{arguments})?[ \t]*\n(?:[ \t]+:[\w-]+:.*\n)*";
const DEFAULT_ARGUMENTS: &str = r"[\w-]+\b";

fn start(directive: &str, delimiter: &str, arguments: Option<&str>) -> Result<Regex, Error> {
    let pattern = START
        .replace("{directive}", directive)
        .replace("{delimiter}", delimiter)
        .replace("{arguments}", arguments.unwrap_or(DEFAULT_ARGUMENTS));
    Ok(Regex::new(&pattern)?)
}

/// A lexer for reST directives such as:
///
/// ```text
/// .. code-block:: python
///    :linenos:
///
///    x = 1
/// ```
///
/// The body is the indented block following the directive and its options.
///
/// Lexemes: `directive`, `arguments` (when present) and `source`.
#[derive(Debug, Clone)]
pub struct DirectiveLexer(BlockLexer);

impl DirectiveLexer {
    pub fn new(directive: &str, arguments: Option<&str>) -> Result<Self, Error> {
        Ok(DirectiveLexer(BlockLexer::new(start(directive, "::", arguments)?, EndPattern::Dedent)))
    }

    pub fn with_mapping(self, mapping: Mapping) -> Self {
        DirectiveLexer(self.0.with_mapping(mapping))
    }
}

impl Lexer for DirectiveLexer {
    fn lex(&self, document: &Document) -> Result<Vec<LexedRegion>, Error> {
        self.0.lex(document)
    }
}

/// A lexer for directive-like comments that Sphinx does not render, used for
/// invisible code blocks and instructions such as `.. skip: next`. These use
/// at most one colon where a real directive uses two, so `.. clear-namespace`
/// and `.. skip: next` are both recognised.
#[derive(Debug, Clone)]
pub struct DirectiveInCommentLexer(BlockLexer);

impl DirectiveInCommentLexer {
    pub fn new(directive: &str, arguments: Option<&str>) -> Result<Self, Error> {
        Ok(DirectiveInCommentLexer(BlockLexer::new(start(directive, ":?", arguments)?, EndPattern::Dedent)))
    }

    pub fn with_mapping(self, mapping: Mapping) -> Self {
        DirectiveInCommentLexer(self.0.with_mapping(mapping))
    }
}

impl Lexer for DirectiveInCommentLexer {
    fn lex(&self, document: &Document) -> Result<Vec<LexedRegion>, Error> {
        self.0.lex(document)
    }
}
