//! Lexers find candidate blocks in a document's text and split them into
//! named lexemes. They never decide how a block is evaluated; that is the
//! job of a [`Parser`](crate::parser::Parser).

pub mod block;
pub mod fence;
pub mod markdown;
pub mod myst;
pub mod rest;

use regex::{Captures, Regex};

use crate::document::Document;
use crate::error::Error;
use crate::region::{LexedRegion, LexemeValue, Lexemes};

pub use block::{BlockLexer, EndPattern};
pub use fence::{FencedCodeBlockLexer, RawFencedCodeBlockLexer};

pub trait Lexer {
    fn lex(&self, document: &Document) -> Result<Vec<LexedRegion>, Error>;
}

/// Runs several lexers in turn, returning everything the first finds, then
/// everything the second finds, and so on.
#[derive(Default)]
pub struct LexerCollection {
    lexers: Vec<Box<dyn Lexer>>,
}

impl LexerCollection {
    pub fn new(lexers: Vec<Box<dyn Lexer>>) -> Self {
        LexerCollection { lexers }
    }

    pub fn push(&mut self, lexer: impl Lexer + 'static) {
        self.lexers.push(Box::new(lexer));
    }

    pub fn len(&self) -> usize {
        self.lexers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lexers.is_empty()
    }
}

impl Lexer for LexerCollection {
    fn lex(&self, document: &Document) -> Result<Vec<LexedRegion>, Error> {
        let mut regions = Vec::new();
        for lexer in &self.lexers {
            regions.extend(lexer.lex(document)?);
        }
        Ok(regions)
    }
}

/// Renames lexemes: only those named as a source in `mapping` are kept, under
/// their destination names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    pairs: Vec<(String, String)>,
}

impl Mapping {
    pub fn new<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Mapping {
            pairs: pairs
                .into_iter()
                .map(|(source, destination)| (source.to_string(), destination.to_string()))
                .collect(),
        }
    }

    pub fn apply(&self, lexemes: Lexemes) -> Lexemes {
        self.pairs
            .iter()
            .filter_map(|(source, destination)| {
                lexemes.get(source).map(|value| (destination.clone(), value.clone()))
            })
            .collect()
    }
}

/// Every named group that took part in the match, other than the ones used
/// internally by the lexers.
pub(crate) fn named_groups(pattern: &Regex, captures: &Captures<'_>) -> Lexemes {
    pattern
        .capture_names()
        .flatten()
        .filter(|name| !matches!(*name, "prefix" | "terminator"))
        .filter_map(|name| {
            captures
                .name(name)
                .map(|group| (name.to_string(), LexemeValue::from(group.as_str())))
        })
        .collect()
}

pub(crate) fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|&byte| byte == b'\n').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_renames_and_filters() {
        let lexemes = Lexemes::from([
            ("language".to_string(), LexemeValue::from("python")),
            ("directive".to_string(), LexemeValue::from("code")),
        ]);
        let renamed = Mapping::new([("language", "arguments")]).apply(lexemes);
        assert_eq!(renamed.len(), 1);
        assert_eq!(renamed["arguments"].as_str(), "python");
    }
}
