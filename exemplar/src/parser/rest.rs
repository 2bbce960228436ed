//! Parsers for reStructuredText documents.

use std::rc::Rc;

use interpreter::Future;

use super::capture::CaptureParser;
use super::clear::ClearNamespaceParser;
use super::codeblock::CodeBlockParser;
use super::doctest::{DocTestDirectiveParser, DocTestParser};
use super::skip::SkipParser;
use crate::error::Error;
use crate::evaluator::Evaluator;
use crate::evaluators::doctest::OptionFlags;
use crate::evaluators::script::ScriptEvaluator;
use crate::lexer::LexerCollection;
use crate::lexer::rest::{DirectiveInCommentLexer, DirectiveLexer};

/// `.. code-block::` directives, and invisible code blocks in comments, in
/// `language`.
pub fn code_block_parser(language: &str, evaluator: Rc<dyn Evaluator>) -> Result<CodeBlockParser, Error> {
    let lexers = LexerCollection::new(vec![
        Box::new(DirectiveLexer::new("code-block", None)?),
        Box::new(DirectiveInCommentLexer::new("(invisible-)?code(-block)?", None)?),
    ]);
    Ok(CodeBlockParser::new(lexers, language, evaluator))
}

/// `python` code blocks run as scripts.
pub fn script_code_block_parser(futures: &[Future]) -> Result<CodeBlockParser, Error> {
    code_block_parser("python", Rc::new(ScriptEvaluator::new(futures)))
}

/// Sessions anywhere in the document.
pub fn doctest_parser(flags: OptionFlags) -> DocTestParser {
    DocTestParser::new(flags)
}

/// Sessions inside `.. doctest::` directives.
pub fn doctest_directive_parser(flags: OptionFlags) -> Result<DocTestDirectiveParser, Error> {
    let lexers = LexerCollection::new(vec![Box::new(DirectiveLexer::new("doctest", None)?)]);
    Ok(DocTestDirectiveParser::new(lexers, flags))
}

pub fn capture_parser() -> CaptureParser {
    CaptureParser::new()
}

pub fn skip_parser() -> Result<SkipParser, Error> {
    Ok(SkipParser::new(LexerCollection::new(vec![Box::new(DirectiveInCommentLexer::new("skip", Some(".+"))?)])))
}

pub fn clear_namespace_parser() -> Result<ClearNamespaceParser, Error> {
    Ok(ClearNamespaceParser::new(LexerCollection::new(vec![Box::new(DirectiveInCommentLexer::new(
        "clear-namespace",
        None,
    )?)])))
}
