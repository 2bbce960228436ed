//! Parsers and evaluators written outside the crate, using only its public
//! API.

use std::rc::Rc;

use exemplar::lexer::markdown::DirectiveInHtmlCommentLexer;
use exemplar::lexer::rest::DirectiveLexer;
use exemplar::parser::{markdown, rest};
use exemplar::testing::{check_lexer, check_parser, check_text};
use exemplar::{Document, Error, Example, LexemeValue, Lexemes, Parser, Region, evaluator_fn};
use interpreter::Value;
use pretty_assertions::assert_eq;
use regex::Regex;

/// Finds lines like `count 'e' in "cheese" is 3` and checks the claim.
fn letter_count_parser(document: &Document) -> Result<Vec<Region>, Error> {
    let pattern = Regex::new(r#"count '(\w)' in "(\w+)" is (\d+)"#)?;
    let evaluator = evaluator_fn("letters", |example: &Example<'_>| {
        let (letter, word, expected) = example.parsed::<(char, String, usize)>().ok_or_else(|| Error::value("bad payload"))?;
        let actual = word.chars().filter(|c| c == letter).count();
        example.namespace().insert("last", Value::Integer(actual as i64));
        Ok((actual != *expected).then(|| format!("{word} has {actual} of {letter}, not {expected}")))
    });
    let mut regions = Vec::new();
    for captures in pattern.captures_iter(document.text()) {
        let whole = captures.get(0).ok_or_else(|| Error::value("no match"))?;
        let letter = captures[1].chars().next().unwrap_or(' ');
        let expected: usize = captures[3].parse().map_err(|_| Error::value("bad count"))?;
        regions.push(Region::new(
            whole.start(),
            whole.end(),
            (letter, captures[2].to_string(), expected),
            Rc::clone(&evaluator),
        ));
    }
    Ok(regions)
}

#[test]
fn closure_parsers_and_evaluators() {
    let text = "Some facts:\n\ncount 'e' in \"cheese\" is 3\n\nand count 'o' in \"spoon\" is 3\n";
    let parsers: Vec<Box<dyn Parser>> = vec![Box::new(letter_count_parser)];
    let document = Document::from_text(text, "facts.txt", &parsers).unwrap();

    let mut examples = document.examples();
    let first = examples.next().unwrap();
    assert_eq!((first.line, first.column), (3, 1));
    first.evaluate().unwrap();
    assert_eq!(document.namespace().get("last"), Some(Value::Integer(3)));

    let second = examples.next().unwrap();
    assert_eq!((second.line, second.column), (5, 5));
    let error = second.evaluate().unwrap_err();
    assert_eq!(
        error.to_string(),
        "Example at facts.txt, line 5, column 5 did not evaluate as expected:\nspoon has 2 of o, not 3"
    );
    assert!(examples.next().is_none());
}

#[test]
fn evaluator_errors_propagate_unchanged() {
    let parser = |document: &Document| -> Result<Vec<Region>, Error> {
        let evaluator = evaluator_fn("explode", |_: &Example<'_>| Err(Error::value("boom")));
        Ok(vec![Region::new(0, document.len(), (), evaluator)])
    };
    let error = check_parser(&parser, "anything").unwrap_err();
    assert!(matches!(error, Error::Value(message) if message == "boom"));
}

#[test]
fn check_lexer_helper() {
    let lexer = DirectiveInHtmlCommentLexer::new("skip", None).unwrap();
    let expected = Lexemes::from([
        ("arguments".to_string(), LexemeValue::from("next")),
        ("directive".to_string(), LexemeValue::from("skip")),
        ("source".to_string(), LexemeValue::from(exemplar::Lexeme::new("", 16, 0))),
    ]);
    check_lexer(&lexer, "<!-- skip: next -->\n", "<!-- skip: next ", &expected).unwrap();

    let lexer = DirectiveLexer::new("note", None).unwrap();
    let text = "\n.. note::\n\n   Hello\n";
    let regions = exemplar::Lexer::lex(&lexer, &Document::new(text, "note.rst")).unwrap();
    assert_eq!(regions[0].source().unwrap().as_str(), "Hello");
}

#[test]
fn check_text_helper() {
    let parsers: Vec<Box<dyn Parser>> = vec![
        Box::new(markdown::script_code_block_parser(&[], Default::default()).unwrap()),
        Box::new(markdown::skip_parser().unwrap()),
    ];
    let document = check_text(&parsers, "```python\nanswer = 6 * 7\n```\n").unwrap();
    assert_eq!(document.namespace().get("answer"), Some(Value::Integer(42)));

    let parser = rest::script_code_block_parser(&[]).unwrap();
    let document = check_parser(&parser, ".. code-block:: python\n\n    x = 'rest'\n").unwrap();
    assert_eq!(document.namespace().get("x"), Some(Value::String("rest".into())));
}
