//! Finding interactive-session examples:
//!
//! ```text
//! >>> 1 + 1
//! 2
//! ```
//!
//! An example starts at a `>>>` prompt, continues over `...` lines and is
//! followed by its expected output, which runs up to the next blank line or
//! prompt.

use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::Parser;
use crate::document::Document;
use crate::error::Error;
use crate::evaluator::Evaluator;
use crate::evaluators::doctest::{DocTestEvaluator, OptionFlags};
use crate::lexer::{Lexer, LexerCollection};
use crate::region::Region;
use crate::text::{line_starts, repr};

static EXCEPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\A(?ms)Traceback \((?:most recent call last|innermost last)\):\s*$.*?^(?P<message>\w+.*)")
        .expect("valid traceback pattern")
});
static OPTION_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)#\s*doctest:\s*([^\n'"]*)$"#).expect("valid option directive pattern"));

/// One parsed interactive-session example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocTestExample {
    /// The code to run, prompts removed, ending with a newline.
    pub source: String,
    /// Expected output, ending with a newline unless empty.
    pub want: String,
    /// The exception message expected when `want` is a traceback.
    pub exc_msg: Option<String>,
    /// 0-based line of the prompt within the parsed text.
    pub line: usize,
    pub indent: usize,
    /// Flags switched on or off by `# doctest:` directives in the source.
    pub options: Vec<(OptionFlags, bool)>,
}

fn content(line: &str) -> &str {
    line.strip_suffix('\n').unwrap_or(line)
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn prompt_indent(line: &str) -> Option<usize> {
    let indent = indentation(line);
    line[indent..].starts_with(">>>").then_some(indent)
}

fn is_continuation(line: &str) -> bool {
    line.trim_start_matches(' ').starts_with("...")
}

fn is_output(line: &str) -> bool {
    let stripped = line.trim_start_matches(' ');
    !stripped.is_empty() && !stripped.starts_with(">>>")
}

fn is_blank_or_comment(source: &str) -> bool {
    let source = source.strip_suffix('\n').unwrap_or(source);
    let stripped = source.trim_start_matches(' ');
    !source.contains('\n') && (stripped.is_empty() || stripped.starts_with('#'))
}

/// Splits a string into [`DocTestExample`] regions, positioned relative to
/// the start of that string.
#[derive(Clone)]
pub struct DocTestStringParser {
    evaluator: Rc<dyn Evaluator>,
}

impl DocTestStringParser {
    pub fn new(evaluator: Rc<dyn Evaluator>) -> Self {
        DocTestStringParser { evaluator }
    }

    pub fn with_flags(flags: OptionFlags) -> Self {
        DocTestStringParser::new(Rc::new(DocTestEvaluator::new(flags)))
    }

    /// `name` identifies the text in error messages.
    pub fn parse(&self, text: &str, name: &str) -> Result<Vec<Region>, Error> {
        let lines: Vec<(usize, &str)> = line_starts(text).collect();
        let mut regions = Vec::new();
        let mut index = 0;
        while index < lines.len() {
            let (start, line) = lines[index];
            let Some(indent) = prompt_indent(content(line)) else {
                index += 1;
                continue;
            };
            let first = index;
            index += 1;
            while index < lines.len() && is_continuation(content(lines[index].1)) {
                index += 1;
            }
            let output_start = index;
            while index < lines.len() && is_output(content(lines[index].1)) {
                index += 1;
            }
            let (last_start, last_line) = lines[index - 1];
            let end = last_start + last_line.len();

            let source: Vec<&str> = lines[first..output_start].iter().map(|(_, line)| content(line)).collect();
            let want: Vec<&str> = lines[output_start..index].iter().map(|(_, line)| content(line)).collect();
            if let Some(example) = parse_example(&source, &want, indent, first, name)? {
                debug!(line = first + 1, "doctest example");
                regions.push(Region::new(start, end, example, Rc::clone(&self.evaluator)));
            }
        }
        Ok(regions)
    }
}

impl Default for DocTestStringParser {
    fn default() -> Self {
        DocTestStringParser::with_flags(OptionFlags::empty())
    }
}

fn parse_example(
    source_lines: &[&str],
    want_lines: &[&str],
    indent: usize,
    line: usize,
    name: &str,
) -> Result<Option<DocTestExample>, Error> {
    check_prompt_blank(source_lines, indent, name, line)?;
    check_prefix(&source_lines[1..], &format!("{}.", " ".repeat(indent)), name, line + 1)?;
    check_prefix(want_lines, &" ".repeat(indent), name, line + source_lines.len())?;

    let source = source_lines
        .iter()
        .map(|source_line| source_line.get(indent + 4..).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");
    let mut want = want_lines
        .iter()
        .map(|want_line| want_line.get(indent..).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");
    if !want.is_empty() {
        want.push('\n');
    }

    let options = find_options(&source, name, line)?;
    if is_blank_or_comment(&source) {
        if !options.is_empty() {
            return Err(Error::value(format!(
                "line {line} of the doctest for {name} has an option directive on a line with no example: {}",
                repr(&source)
            )));
        }
        return Ok(None);
    }

    let exc_msg = EXCEPTION.captures(&want).and_then(|captures| captures.name("message")).map(|message| {
        let mut message = message.as_str().to_string();
        if !message.ends_with('\n') {
            message.push('\n');
        }
        message
    });

    Ok(Some(DocTestExample { source: format!("{source}\n"), want, exc_msg, line, indent, options }))
}

fn check_prompt_blank(lines: &[&str], indent: usize, name: &str, line: usize) -> Result<(), Error> {
    for (i, source_line) in lines.iter().enumerate() {
        if source_line.as_bytes().get(indent + 3).is_some_and(|&byte| byte != b' ') {
            return Err(Error::value(format!(
                "line {} of the docstring for {name} lacks blank after {}: {}",
                line + i + 1,
                source_line.get(indent..indent + 3).unwrap_or(""),
                repr(source_line)
            )));
        }
    }
    Ok(())
}

fn check_prefix(lines: &[&str], prefix: &str, name: &str, line: usize) -> Result<(), Error> {
    for (i, text) in lines.iter().enumerate() {
        if !text.is_empty() && !text.starts_with(prefix) {
            return Err(Error::value(format!(
                "line {} of the docstring for {name} has inconsistent leading whitespace: {}",
                line + i + 1,
                repr(text)
            )));
        }
    }
    Ok(())
}

fn find_options(source: &str, name: &str, line: usize) -> Result<Vec<(OptionFlags, bool)>, Error> {
    let mut options = Vec::new();
    for captures in OPTION_DIRECTIVE.captures_iter(source) {
        let directive = captures.get(1).map_or("", |directive| directive.as_str());
        for option in directive.replace(',', " ").split_whitespace() {
            let flag = match option.split_at_checked(1) {
                Some(("+", flag)) => OptionFlags::from_name(flag).map(|flag| (flag, true)),
                Some(("-", flag)) => OptionFlags::from_name(flag).map(|flag| (flag, false)),
                _ => None,
            };
            let flag = flag.ok_or_else(|| {
                Error::value(format!(
                    "line {} of the doctest for {name} has an invalid option: {}",
                    line + 1,
                    repr(option)
                ))
            })?;
            options.push(flag);
        }
    }
    Ok(options)
}

/// Finds examples anywhere in a document's text.
#[derive(Clone, Default)]
pub struct DocTestParser {
    string_parser: DocTestStringParser,
}

impl DocTestParser {
    pub fn new(flags: OptionFlags) -> Self {
        DocTestParser { string_parser: DocTestStringParser::with_flags(flags) }
    }
}

impl Parser for DocTestParser {
    fn parse(&self, document: &Document) -> Result<Vec<Region>, Error> {
        self.string_parser.parse(document.text(), &document.path().display().to_string())
    }
}

/// Finds examples only within the bodies of `doctest` directives.
pub struct DocTestDirectiveParser {
    lexers: LexerCollection,
    string_parser: DocTestStringParser,
}

impl DocTestDirectiveParser {
    pub fn new(lexers: LexerCollection, flags: OptionFlags) -> Self {
        DocTestDirectiveParser { lexers, string_parser: DocTestStringParser::with_flags(flags) }
    }
}

impl Parser for DocTestDirectiveParser {
    fn parse(&self, document: &Document) -> Result<Vec<Region>, Error> {
        let name = document.path().display().to_string();
        let mut regions = Vec::new();
        for lexed in self.lexers.lex(document)? {
            let Some(source) = lexed.source() else {
                continue;
            };
            for mut region in self.string_parser.parse(source, &name)? {
                region.relocate(document.text(), &lexed, source);
                regions.push(region);
            }
        }
        Ok(regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn examples(text: &str) -> Vec<(usize, usize, DocTestExample)> {
        DocTestStringParser::default()
            .parse(text, "doc.txt")
            .unwrap()
            .into_iter()
            .map(|region| {
                let example = region.parsed::<DocTestExample>().unwrap().clone();
                (region.start, region.end, example)
            })
            .collect()
    }

    fn error(text: &str) -> String {
        match DocTestStringParser::default().parse(text, "doc.txt") {
            Err(error) => error.to_string(),
            Ok(regions) => panic!("expected an error, got {regions:?}"),
        }
    }

    #[test]
    fn finds_examples_and_output() {
        let text = "Some text.\n\n>>> x = 1\n>>> x + 1\n2\n\nMore text.\n  >>> for i in [1]:\n  ...     i\n  1\n";
        let found = examples(text);
        assert_eq!(found.len(), 3);

        let (start, end, first) = &found[0];
        assert_eq!(&text[*start..*end], ">>> x = 1\n");
        assert_eq!(first.source, "x = 1\n");
        assert_eq!(first.want, "");
        assert_eq!(first.line, 2);

        let (start, end, second) = &found[1];
        assert_eq!(&text[*start..*end], ">>> x + 1\n2\n");
        assert_eq!(second.want, "2\n");

        let (start, end, third) = &found[2];
        assert_eq!(&text[*start..*end], "  >>> for i in [1]:\n  ...     i\n  1\n");
        assert_eq!(third.source, "for i in [1]:\n    i\n");
        assert_eq!(third.want, "1\n");
        assert_eq!(third.indent, 2);
    }

    #[test]
    fn output_at_end_of_text() {
        let text = ">>> 1\n1";
        let found = examples(text);
        assert_eq!((found[0].0, found[0].1), (0, text.len()));
        assert_eq!(found[0].2.want, "1\n");
    }

    #[test]
    fn expected_exception() {
        let text = ">>> 1/0\nTraceback (most recent call last):\n  ...\nZeroDivisionError: division by zero\n";
        let example = examples(text).remove(0).2;
        assert_eq!(example.exc_msg.as_deref(), Some("ZeroDivisionError: division by zero\n"));
    }

    #[test]
    fn option_directives() {
        let example = examples(">>> print(1)  # doctest: +ELLIPSIS, -NORMALIZE_WHITESPACE\n1\n").remove(0).2;
        assert_eq!(
            example.options,
            vec![(OptionFlags::ELLIPSIS, true), (OptionFlags::NORMALIZE_WHITESPACE, false)]
        );
        assert_eq!(
            error(">>> 1  # doctest: +FAST\n1\n"),
            "line 1 of the doctest for doc.txt has an invalid option: '+FAST'"
        );
        assert_eq!(
            error("text\n>>> # doctest: +SKIP\n"),
            "line 1 of the doctest for doc.txt has an option directive on a line with no example: '# doctest: +SKIP'"
        );
    }

    #[test]
    fn comment_only_examples_are_ignored() {
        assert!(examples(">>> # just a note\n>>>\n").is_empty());
    }

    #[test]
    fn malformed_prompts() {
        assert_eq!(
            error("\n>>>x = 1\n"),
            "line 2 of the docstring for doc.txt lacks blank after >>>: '>>>x = 1'"
        );
        assert_eq!(
            error("  >>> if True:\n ...     pass\n"),
            "line 2 of the docstring for doc.txt has inconsistent leading whitespace: ' ...     pass'"
        );
        assert_eq!(
            error("  >>> 1\n 1\n"),
            "line 2 of the docstring for doc.txt has inconsistent leading whitespace: ' 1'"
        );
    }
}
