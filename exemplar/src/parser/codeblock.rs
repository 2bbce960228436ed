use std::rc::Rc;

use tracing::debug;

use super::Parser;
use super::doctest::DocTestStringParser;
use crate::document::Document;
use crate::error::Error;
use crate::evaluator::Evaluator;
use crate::lexer::{Lexer, LexerCollection};
use crate::region::Region;

/// Binds code blocks in one language to an evaluator. The lexers must
/// produce `arguments`, holding the language, and `source` lexemes.
pub struct CodeBlockParser {
    lexers: LexerCollection,
    language: String,
    evaluator: Rc<dyn Evaluator>,
    doctest: Option<DocTestStringParser>,
}

impl CodeBlockParser {
    pub fn new(lexers: LexerCollection, language: impl Into<String>, evaluator: Rc<dyn Evaluator>) -> Self {
        CodeBlockParser { lexers, language: language.into(), evaluator, doctest: None }
    }

    /// Blocks whose source begins with a `>>>` prompt are split into
    /// interactive-session examples instead.
    pub fn with_doctest(mut self, parser: DocTestStringParser) -> Self {
        self.doctest = Some(parser);
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

impl Parser for CodeBlockParser {
    fn parse(&self, document: &Document) -> Result<Vec<Region>, Error> {
        let mut regions = Vec::new();
        for lexed in self.lexers.lex(document)? {
            if lexed.text("arguments") != Some(self.language.as_str()) {
                continue;
            }
            let Some(source) = lexed.source() else {
                continue;
            };
            match &self.doctest {
                Some(doctest) if source.trim_start().starts_with(">>>") => {
                    let name = document.path().display().to_string();
                    for mut region in doctest.parse(source, &name)? {
                        region.relocate(document.text(), &lexed, source);
                        regions.push(region);
                    }
                }
                _ => {
                    debug!(start = lexed.start, end = lexed.end, language = %self.language, "code block");
                    regions.push(Region::new(lexed.start, lexed.end, source.clone(), Rc::clone(&self.evaluator)));
                }
            }
        }
        Ok(regions)
    }
}
