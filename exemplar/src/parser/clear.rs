use std::rc::Rc;

use super::Parser;
use crate::document::Document;
use crate::error::Error;
use crate::evaluator::{Evaluator, evaluator_fn};
use crate::lexer::{Lexer, LexerCollection};
use crate::region::{Lexeme, Region};

/// Regions found by this parser empty the document's namespace when they
/// are evaluated.
pub struct ClearNamespaceParser {
    lexers: LexerCollection,
    evaluator: Rc<dyn Evaluator>,
}

impl ClearNamespaceParser {
    pub fn new(lexers: LexerCollection) -> Self {
        let evaluator = evaluator_fn("clear-namespace", |example| {
            example.namespace().clear();
            Ok(None)
        });
        ClearNamespaceParser { lexers, evaluator }
    }
}

impl Parser for ClearNamespaceParser {
    fn parse(&self, document: &Document) -> Result<Vec<Region>, Error> {
        Ok(self
            .lexers
            .lex(document)?
            .into_iter()
            .map(|lexed| {
                let source = lexed.source().cloned().unwrap_or_else(|| Lexeme::new("", 0, 0));
                Region::new(lexed.start, lexed.end, source, Rc::clone(&self.evaluator))
            })
            .collect())
    }
}
