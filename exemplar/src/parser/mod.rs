//! Parsers turn what lexers find into regions, each bound to the evaluator
//! that will check it.

pub mod capture;
pub mod clear;
pub mod codeblock;
pub mod doctest;
pub mod markdown;
pub mod myst;
pub mod rest;
pub mod skip;

use crate::document::Document;
use crate::error::Error;
use crate::region::Region;

pub use capture::CaptureParser;
pub use clear::ClearNamespaceParser;
pub use codeblock::CodeBlockParser;
pub use doctest::{DocTestDirectiveParser, DocTestParser, DocTestStringParser};
pub use skip::SkipParser;

pub trait Parser {
    fn parse(&self, document: &Document) -> Result<Vec<Region>, Error>;
}

impl<F> Parser for F
where
    F: Fn(&Document) -> Result<Vec<Region>, Error>,
{
    fn parse(&self, document: &Document) -> Result<Vec<Region>, Error> {
        self(document)
    }
}
