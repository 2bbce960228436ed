//! Parsers for Markdown documents.

use std::rc::Rc;

use interpreter::Future;

use super::codeblock::CodeBlockParser;
use super::clear::ClearNamespaceParser;
use super::doctest::DocTestStringParser;
use super::skip::SkipParser;
use crate::error::Error;
use crate::evaluator::Evaluator;
use crate::evaluators::doctest::OptionFlags;
use crate::evaluators::script::ScriptEvaluator;
use crate::lexer::markdown::{DirectiveInHtmlCommentLexer, FencedCodeBlockLexer};
use crate::lexer::{LexerCollection, Mapping};

const CODE_DIRECTIVE: &str = "(invisible-)?code(-block)?";

fn code_block_lexers() -> Result<LexerCollection, Error> {
    let mut lexers = LexerCollection::default();
    lexers.push(
        FencedCodeBlockLexer::new(".+")?.with_mapping(Mapping::new([("language", "arguments"), ("source", "source")])),
    );
    lexers.push(DirectiveInHtmlCommentLexer::new(CODE_DIRECTIVE, Some(".+?"))?);
    Ok(lexers)
}

/// Fenced code blocks, and invisible ones in HTML comments, in `language`.
pub fn code_block_parser(language: &str, evaluator: Rc<dyn Evaluator>) -> Result<CodeBlockParser, Error> {
    Ok(CodeBlockParser::new(code_block_lexers()?, language, evaluator))
}

/// `python` code blocks run as scripts. Blocks made of `>>>` sessions are
/// checked as doctests using `flags`.
pub fn script_code_block_parser(futures: &[Future], flags: OptionFlags) -> Result<CodeBlockParser, Error> {
    Ok(code_block_parser("python", Rc::new(ScriptEvaluator::new(futures)))?
        .with_doctest(DocTestStringParser::with_flags(flags)))
}

pub fn skip_parser() -> Result<SkipParser, Error> {
    Ok(SkipParser::new(LexerCollection::new(vec![Box::new(DirectiveInHtmlCommentLexer::new("skip", None)?)])))
}

pub fn clear_namespace_parser() -> Result<ClearNamespaceParser, Error> {
    Ok(ClearNamespaceParser::new(LexerCollection::new(vec![Box::new(DirectiveInHtmlCommentLexer::new(
        "clear-namespace",
        None,
    )?)])))
}
