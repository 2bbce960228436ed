//! Parsers for MyST documents. These understand everything the Markdown
//! parsers do, plus `{directive}` fences and `%` comments.

use std::rc::Rc;

use interpreter::Future;

use super::codeblock::CodeBlockParser;
use super::clear::ClearNamespaceParser;
use super::doctest::{DocTestDirectiveParser, DocTestStringParser};
use super::skip::SkipParser;
use crate::error::Error;
use crate::evaluator::Evaluator;
use crate::evaluators::doctest::OptionFlags;
use crate::evaluators::script::ScriptEvaluator;
use crate::lexer::myst::{
    DirectiveInHtmlCommentLexer, DirectiveInPercentCommentLexer, DirectiveLexer, FencedCodeBlockLexer,
};
use crate::lexer::{Lexer, LexerCollection, Mapping};

const CODE_DIRECTIVE: &str = "(invisible-)?code(-block)?";

fn comment_lexers(directive: &str, arguments: Option<&str>) -> Result<Vec<Box<dyn Lexer>>, Error> {
    Ok(vec![
        Box::new(DirectiveInPercentCommentLexer::new(directive, arguments)?),
        Box::new(DirectiveInHtmlCommentLexer::new(directive, arguments)?),
    ])
}

fn code_block_lexers() -> Result<LexerCollection, Error> {
    let mut lexers: Vec<Box<dyn Lexer>> = vec![
        Box::new(
            FencedCodeBlockLexer::new(".+")?
                .with_mapping(Mapping::new([("language", "arguments"), ("source", "source")])),
        ),
        Box::new(DirectiveLexer::new("code-block", Some(".+?"))?),
    ];
    lexers.extend(comment_lexers(CODE_DIRECTIVE, Some(".+?"))?);
    Ok(LexerCollection::new(lexers))
}

/// Plain fences, `{code-block}` directives and invisible code blocks in
/// comments, in `language`.
pub fn code_block_parser(language: &str, evaluator: Rc<dyn Evaluator>) -> Result<CodeBlockParser, Error> {
    Ok(CodeBlockParser::new(code_block_lexers()?, language, evaluator))
}

/// `python` code blocks run as scripts, with `>>>` sessions checked as
/// doctests using `flags`.
pub fn script_code_block_parser(futures: &[Future], flags: OptionFlags) -> Result<CodeBlockParser, Error> {
    Ok(code_block_parser("python", Rc::new(ScriptEvaluator::new(futures)))?
        .with_doctest(DocTestStringParser::with_flags(flags)))
}

/// Sessions inside `{doctest}` fences.
pub fn doctest_directive_parser(flags: OptionFlags) -> Result<DocTestDirectiveParser, Error> {
    let lexers = LexerCollection::new(vec![Box::new(DirectiveLexer::new("doctest", None)?)]);
    Ok(DocTestDirectiveParser::new(lexers, flags))
}

pub fn skip_parser() -> Result<SkipParser, Error> {
    Ok(SkipParser::new(LexerCollection::new(comment_lexers("skip", None)?)))
}

pub fn clear_namespace_parser() -> Result<ClearNamespaceParser, Error> {
    Ok(ClearNamespaceParser::new(LexerCollection::new(comment_lexers("clear-namespace", None)?)))
}
