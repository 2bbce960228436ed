use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use super::{Lexer, Mapping, count_newlines, named_groups};
use crate::document::Document;
use crate::error::Error;
use crate::region::{LexedRegion, Lexeme, LexemeValue};
use crate::text::strip_prefix;

static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?P<prefix>[ \t]*)(?P<fence>`{3,}|~{3,})").expect("valid fence pattern")
});

const DEFAULT_INFO: &str = r"(?m)$\n";

/// A fence found in the text.
#[derive(Debug, Clone, Copy)]
struct Fence<'t> {
    start: usize,
    end: usize,
    prefix: &'t str,
    marker: &'t str,
}

impl<'t> Fence<'t> {
    fn from_captures(captures: &Captures<'t>) -> Option<Self> {
        let whole = captures.get(0)?;
        Some(Fence {
            start: whole.start(),
            end: whole.end(),
            prefix: captures.name("prefix")?.as_str(),
            marker: captures.name("fence")?.as_str(),
        })
    }

    /// A fence closes an open one made of the same character, at least as
    /// long, and indented by the same amount.
    fn closes(&self, open: &Fence<'_>) -> bool {
        self.marker.as_bytes()[0] == open.marker.as_bytes()[0]
            && self.marker.len() >= open.marker.len()
            && self.prefix.len() == open.prefix.len()
    }
}

/// A lexer for Markdown fenced code blocks that matches the whole info line
/// after the opening fence against a pattern.
///
/// Fences are balanced: a fence only closes an open block made of the same
/// character, at least as long and equally indented. Fences inside an open
/// block that do not close it open nested blocks, which are discarded when an
/// enclosing block closes. A block left open runs to the end of the document.
///
/// The named groups of the info pattern become lexemes, along with the body
/// as `source`.
#[derive(Debug, Clone)]
pub struct RawFencedCodeBlockLexer {
    info: Regex,
    mapping: Option<Mapping>,
}

impl RawFencedCodeBlockLexer {
    /// `info` is matched at the start of the text after the opening fence and
    /// must consume the newline ending the info line, along with anything
    /// else that precedes the body.
    pub fn new(info: &str) -> Result<Self, Error> {
        Ok(RawFencedCodeBlockLexer { info: Regex::new(&format!(r"\A(?:{info})"))?, mapping: None })
    }

    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    fn make_region(
        &self,
        text: &str,
        opening: &Fence<'_>,
        closing: Option<&Fence<'_>>,
    ) -> Option<LexedRegion> {
        let (content_end, region_end) = closing.map_or((text.len(), text.len()), |fence| (fence.start, fence.end));
        let content = &text[opening.end..content_end];
        let info = self.info.captures(content)?;
        let info_end = info.get(0)?.end();

        let mut lexemes = named_groups(&self.info, &info);
        lexemes.insert(
            "source".to_string(),
            LexemeValue::Lexeme(Lexeme::new(
                strip_prefix(&content[info_end..], opening.prefix),
                opening.end - opening.start + info_end,
                count_newlines(&content[..info_end]).saturating_sub(1),
            )),
        );
        if let Some(mapping) = &self.mapping {
            lexemes = mapping.apply(lexemes);
        }
        debug!(start = opening.start, end = region_end, "lexed fenced block");
        Some(LexedRegion::new(opening.start, region_end, lexemes))
    }
}

impl Default for RawFencedCodeBlockLexer {
    fn default() -> Self {
        RawFencedCodeBlockLexer {
            info: Regex::new(&format!(r"\A(?:{DEFAULT_INFO})")).expect("valid info pattern"),
            mapping: None,
        }
    }
}

impl Lexer for RawFencedCodeBlockLexer {
    fn lex(&self, document: &Document) -> Result<Vec<LexedRegion>, Error> {
        let text = document.text();
        let mut regions = Vec::new();
        let mut open: Vec<Fence<'_>> = Vec::new();
        for captures in FENCE.captures_iter(text) {
            let Some(fence) = Fence::from_captures(&captures) else { continue };
            match open.iter().position(|existing| fence.closes(existing)) {
                Some(index) => {
                    regions.extend(self.make_region(text, &open[index], Some(&fence)));
                    open.truncate(index);
                }
                None => open.push(fence),
            }
        }
        if let Some(outermost) = open.first() {
            regions.extend(self.make_region(text, outermost, None));
        }
        Ok(regions)
    }
}

/// A lexer for fenced code blocks whose info line is a language name matching
/// `language`, captured as the `language` lexeme.
#[derive(Debug, Clone)]
pub struct FencedCodeBlockLexer(RawFencedCodeBlockLexer);

impl FencedCodeBlockLexer {
    pub fn new(language: &str) -> Result<Self, Error> {
        RawFencedCodeBlockLexer::new(&format!(r"(?m)(?P<language>{language})$\n")).map(FencedCodeBlockLexer)
    }

    pub fn with_mapping(self, mapping: Mapping) -> Self {
        FencedCodeBlockLexer(self.0.with_mapping(mapping))
    }
}

impl Lexer for FencedCodeBlockLexer {
    fn lex(&self, document: &Document) -> Result<Vec<LexedRegion>, Error> {
        self.0.lex(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex(lexer: &impl Lexer, text: &str) -> Vec<LexedRegion> {
        lexer.lex(&Document::new(text, "sample.md")).unwrap()
    }

    #[test]
    fn lexes_language_and_source() {
        let text = "# Title\n\n```python\nx = 1\n```\n\n~~~text\nplain\n~~~\n";
        let regions = lex(&FencedCodeBlockLexer::new(r"\w+").unwrap(), text);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].text("language"), Some("python"));
        assert_eq!(&text[regions[0].start..regions[0].end], "```python\nx = 1\n```");
        let source = regions[0].source().unwrap();
        assert_eq!(source.as_str(), "x = 1\n");
        assert_eq!(source.offset, 10);
        assert_eq!(source.line_offset, 0);
        assert_eq!(regions[1].text("language"), Some("text"));
    }

    #[test]
    fn longer_fences_contain_shorter_ones() {
        let text = "````markdown\n```python\nx = 1\n```\n````\n";
        let regions = lex(&FencedCodeBlockLexer::new(r"\w+").unwrap(), text);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].text("language"), Some("python"));
        assert_eq!(regions[1].text("language"), Some("markdown"));
        assert_eq!(regions[1].source().unwrap().as_str(), "```python\nx = 1\n```\n");
    }

    #[test]
    fn mixed_fence_characters_do_not_close() {
        let text = "```python\n~~~\nx = 1\n```\n";
        let regions = lex(&FencedCodeBlockLexer::new("python").unwrap(), text);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].source().unwrap().as_str(), "~~~\nx = 1\n");
    }

    #[test]
    fn unclosed_fence_runs_to_end() {
        let text = "```python\nx = 1\n";
        let regions = lex(&FencedCodeBlockLexer::new("python").unwrap(), text);
        assert_eq!((regions[0].start, regions[0].end), (0, text.len()));
        assert_eq!(regions[0].source().unwrap().as_str(), "x = 1\n");
    }

    #[test]
    fn indented_fences_strip_their_prefix() {
        let text = "- item\n\n  ```python\n  x = 1\n  ```\n";
        let regions = lex(&FencedCodeBlockLexer::new("python").unwrap(), text);
        assert_eq!(regions[0].source().unwrap().as_str(), "x = 1\n");
    }

    #[test]
    fn info_mismatch_is_skipped() {
        let text = "```js\nlet x;\n```\n";
        assert!(lex(&FencedCodeBlockLexer::new("python").unwrap(), text).is_empty());
        assert_eq!(lex(&RawFencedCodeBlockLexer::default(), "```\nx\n```\n").len(), 1);
    }
}
