//! Lexers for MyST documents.

use regex::Regex;

use super::{BlockLexer, EndPattern, Lexer, Mapping, RawFencedCodeBlockLexer};
use crate::document::Document;
use crate::error::Error;
use crate::region::LexedRegion;

pub use super::fence::FencedCodeBlockLexer;
pub use super::markdown::DirectiveInHtmlCommentLexer;

const DIRECTIVE_INFO: &str = r"(?m)\{(?P<directive>{directive})\}[ \t]*(?P<arguments>{arguments})[ \t]*$\n(?:[ \t]*---\n(?:.*\n)*?[ \t]*---\n)?(?:[ \t]*:[\w-]+:.*\n)*";
const DIRECTIVE_IN_PERCENT_COMMENT_START: &str = r"(?m)^(?P<prefix>[ \t]*%)[ \t]*(?P<directive>{directive})(?::|\b)[ \t]*(?P<arguments>{arguments})[ \t]*$\n";

fn fill(template: &str, directive: &str, arguments: Option<&str>) -> String {
    template
        .replace("{directive}", directive)
        .replace("{arguments}", arguments.unwrap_or(".*?"))
}

/// A lexer for MyST directives written as fenced blocks:
///
/// ````text
/// ```{code-block} python
/// :linenos:
/// x = 1
/// ```
/// ````
///
/// Options, whether as `:key: value` lines or a `---` delimited block, are
/// consumed and left out of the source.
///
/// Lexemes: `directive`, `arguments` and `source`.
#[derive(Debug, Clone)]
pub struct DirectiveLexer(RawFencedCodeBlockLexer);

impl DirectiveLexer {
    pub fn new(directive: &str, arguments: Option<&str>) -> Result<Self, Error> {
        RawFencedCodeBlockLexer::new(&fill(DIRECTIVE_INFO, directive, arguments)).map(DirectiveLexer)
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

/// A lexer for directives in `%` comments, where the body is every following
/// line that is also a `%` comment:
///
/// ```text
/// % invisible-code-block: python
/// %
/// % x = 1
/// ```
#[derive(Debug, Clone)]
pub struct DirectiveInPercentCommentLexer(BlockLexer);

impl DirectiveInPercentCommentLexer {
    pub fn new(directive: &str, arguments: Option<&str>) -> Result<Self, Error> {
        let start = fill(DIRECTIVE_IN_PERCENT_COMMENT_START, directive, arguments);
        Ok(DirectiveInPercentCommentLexer(BlockLexer::new(Regex::new(&start)?, EndPattern::UnprefixedLine)))
    }

    pub fn with_mapping(self, mapping: Mapping) -> Self {
        DirectiveInPercentCommentLexer(self.0.with_mapping(mapping))
    }
}

impl Lexer for DirectiveInPercentCommentLexer {
    fn lex(&self, document: &Document) -> Result<Vec<LexedRegion>, Error> {
        self.0.lex(document)
    }
}
