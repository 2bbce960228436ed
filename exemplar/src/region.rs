use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::evaluator::Evaluator;
use crate::text::line_starts;

/// A piece of text extracted by a lexer, remembering where it came from.
///
/// `offset` is the byte position of the text relative to the start of the
/// enclosing lexed region; `line_offset` is the number of lines between the
/// region's first line and the line before the text begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    text: String,
    pub offset: usize,
    pub line_offset: usize,
}

impl Lexeme {
    pub fn new(text: impl Into<String>, offset: usize, line_offset: usize) -> Self {
        Lexeme { text: text.into(), offset, line_offset }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl Deref for Lexeme {
    type Target = str;

    fn deref(&self) -> &str {
        &self.text
    }
}

impl PartialEq<str> for Lexeme {
    fn eq(&self, other: &str) -> bool {
        self.text == other
    }
}

impl PartialEq<&str> for Lexeme {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}

impl fmt::Display for Lexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A named piece of a lexed region: either plain captured text or a lexeme
/// carrying position information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexemeValue {
    Text(String),
    Lexeme(Lexeme),
}

impl LexemeValue {
    pub fn as_str(&self) -> &str {
        match self {
            LexemeValue::Text(text) => text,
            LexemeValue::Lexeme(lexeme) => lexeme.as_str(),
        }
    }

    pub fn as_lexeme(&self) -> Option<&Lexeme> {
        match self {
            LexemeValue::Lexeme(lexeme) => Some(lexeme),
            LexemeValue::Text(_) => None,
        }
    }
}

impl From<&str> for LexemeValue {
    fn from(text: &str) -> Self {
        LexemeValue::Text(text.to_string())
    }
}

impl From<Lexeme> for LexemeValue {
    fn from(lexeme: Lexeme) -> Self {
        LexemeValue::Lexeme(lexeme)
    }
}

pub type Lexemes = BTreeMap<String, LexemeValue>;

/// A span of a document found by a lexer, with its named pieces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexedRegion {
    pub start: usize,
    pub end: usize,
    pub lexemes: Lexemes,
}

impl LexedRegion {
    pub fn new(start: usize, end: usize, lexemes: Lexemes) -> Self {
        LexedRegion { start, end, lexemes }
    }

    pub fn lexeme(&self, name: &str) -> Option<&LexemeValue> {
        self.lexemes.get(name)
    }

    /// The text of a named lexeme, if present.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.lexemes.get(name).map(LexemeValue::as_str)
    }

    /// The `source` lexeme, which most lexers produce.
    pub fn source(&self) -> Option<&Lexeme> {
        self.lexemes.get("source").and_then(LexemeValue::as_lexeme)
    }
}

/// The parsed payload of a region. Each parser stores its own type here and
/// the matching evaluator reads it back with [`Parsed::downcast_ref`].
#[derive(Clone)]
pub struct Parsed(Rc<dyn Any>);

impl Parsed {
    pub fn new<T: Any>(value: T) -> Self {
        Parsed(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }
}

impl fmt::Debug for Parsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Parsed(..)")
    }
}

/// A span of a document that holds one example, together with what was parsed
/// from it and the evaluator that will check it.
#[derive(Clone)]
pub struct Region {
    pub start: usize,
    pub end: usize,
    pub parsed: Parsed,
    pub evaluator: Rc<dyn Evaluator>,
}

impl Region {
    pub fn new<T: Any>(start: usize, end: usize, parsed: T, evaluator: Rc<dyn Evaluator>) -> Self {
        Region { start, end, parsed: Parsed::new(parsed), evaluator }
    }

    pub fn parsed<T: Any>(&self) -> Option<&T> {
        self.parsed.downcast_ref()
    }

    /// Translate a region found within `lexeme`'s text into the coordinates
    /// of the document containing `enclosing`.
    pub fn adjust(&mut self, enclosing: &LexedRegion, lexeme: &Lexeme) {
        let shift = enclosing.start + lexeme.offset;
        self.start += shift;
        self.end += shift;
    }

    /// Like [`adjust`](Self::adjust), but also accounts for indentation or
    /// comment prefixes the lexer removed from the lines of `lexeme`, so the
    /// region lands on the same text in `document_text`.
    pub fn relocate(&mut self, document_text: &str, enclosing: &LexedRegion, lexeme: &Lexeme) {
        let base = enclosing.start + lexeme.offset;
        let raw = document_text.get(base..).unwrap_or("");
        self.start = base + map_offset(lexeme, raw, self.start, false);
        self.end = base + map_offset(lexeme, raw, self.end, true);
    }
}

fn content_len(line: &str) -> usize {
    line.strip_suffix('\n').unwrap_or(line).len()
}

/// Map an offset in `source` to the matching offset in `raw`, the text it
/// was extracted from, line by line. An end offset at the start of a line
/// maps to the start of the raw line rather than past its prefix.
fn map_offset(source: &str, raw: &str, offset: usize, is_end: bool) -> usize {
    let mut raw_lines = line_starts(raw);
    let mut raw_end = 0;
    for (start, line) in line_starts(source) {
        let Some((raw_start, raw_line)) = raw_lines.next() else {
            return offset;
        };
        raw_end = raw_start + raw_line.len();
        if offset < start + line.len() {
            let column = offset.saturating_sub(start);
            if column == 0 && is_end {
                return raw_start;
            }
            let removed = content_len(raw_line).saturating_sub(content_len(line));
            return raw_start + removed + column;
        }
    }
    raw_end + offset.saturating_sub(source.len())
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Region start={} end={} {}>", self.start, self.end, self.evaluator.name())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
