//! Helpers for testing lexers and parsers, including ones written outside
//! this crate.

use crate::document::Document;
use crate::error::Error;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::region::Lexemes;

const PATH: &str = "<text>";

/// Lex `source_text` and check that exactly one region is found, covering
/// `expected_text` and holding `expected_lexemes`.
///
/// # Panics
///
/// When the lexer finds anything else.
pub fn check_lexer(
    lexer: &dyn Lexer,
    source_text: &str,
    expected_text: &str,
    expected_lexemes: &Lexemes,
) -> Result<(), Error> {
    let document = Document::new(source_text, PATH);
    let regions = lexer.lex(&document)?;
    assert_eq!(regions.len(), 1, "expected exactly one region, got: {regions:?}");
    let region = &regions[0];
    assert_eq!(&source_text[region.start..region.end], expected_text);
    assert_eq!(&region.lexemes, expected_lexemes);
    Ok(())
}

/// Parse `text` with `parser` and evaluate the single example found,
/// returning the document so its namespace can be inspected.
///
/// # Panics
///
/// When the parser finds more or less than one example.
pub fn check_parser(parser: &dyn Parser, text: &str) -> Result<Document, Error> {
    let mut document = Document::new(text, PATH);
    for region in parser.parse(&document)? {
        document.add(region)?;
    }
    evaluate_single(document)
}

/// Like [`check_parser`], but with several parsers, as a document would be
/// parsed for real.
pub fn check_text(parsers: &[Box<dyn Parser>], text: &str) -> Result<Document, Error> {
    evaluate_single(Document::from_text(text, PATH, parsers)?)
}

fn evaluate_single(document: Document) -> Result<Document, Error> {
    {
        let examples: Vec<_> = document.examples().collect();
        assert_eq!(examples.len(), 1, "expected exactly one example, got: {examples:?}");
        examples[0].evaluate()?;
    }
    Ok(document)
}
