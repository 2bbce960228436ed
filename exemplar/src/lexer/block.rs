use regex::Regex;
use tracing::debug;

use super::{Lexer, Mapping, count_newlines, named_groups};
use crate::document::Document;
use crate::error::{Error, LexingError};
use crate::region::{LexedRegion, Lexeme, LexemeValue};
use crate::text::{dedent, line_starts, strip_prefix};

/// How a [`BlockLexer`] finds the end of a block's body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndPattern {
    /// A regular expression searched for after the start match. `{prefix}` is
    /// replaced with the escaped `prefix` group of the start match and
    /// `{len_prefix}` with its length in characters.
    Template(String),
    /// The body ends at the first line that does not begin with the prefix.
    UnprefixedLine,
    /// The body is the indented block after the start match. It ends before
    /// the first non-blank line indented no further than the prefix.
    Dedent,
}

impl EndPattern {
    /// Returns `(source_start, source_end)` where the body is
    /// `text[source_start..source_end]`, or `None` when the end is never found.
    fn locate(
        &self,
        text: &str,
        body_start: usize,
        prefix: &str,
    ) -> Result<Option<(usize, usize)>, Error> {
        match self {
            EndPattern::Template(_) => {
                let end = Regex::new(&self.render(prefix))?;
                Ok(end.find_at(text, body_start).map(|found| (body_start, found.start())))
            }
            EndPattern::UnprefixedLine => {
                let end = line_starts(&text[body_start..])
                    .find(|(_, line)| !line.starts_with(prefix))
                    .map_or(text.len(), |(offset, _)| body_start + offset);
                Ok(Some((body_start, end)))
            }
            EndPattern::Dedent => Ok(Some(dedent_block(text, body_start, prefix.chars().count()))),
        }
    }

    fn render(&self, prefix: &str) -> String {
        match self {
            EndPattern::Template(template) => template
                .replace("{prefix}", &regex::escape(prefix))
                .replace("{len_prefix}", &prefix.chars().count().to_string()),
            EndPattern::UnprefixedLine => format!("a line not starting with {prefix}"),
            EndPattern::Dedent => format!("a line indented by at most {}", prefix.len()),
        }
    }
}

fn dedent_block(text: &str, body_start: usize, indent: usize) -> (usize, usize) {
    let mut first_content = None;
    for (offset, line) in line_starts(&text[body_start..]) {
        let content = line.trim_end_matches(['\n', '\r']);
        let stripped = content.trim_start_matches([' ', '\t']);
        if stripped.is_empty() {
            continue;
        }
        let line_start = body_start + offset;
        if content.len() - stripped.len() <= indent {
            // the newline before the outdented line is left outside the block
            return (first_content.unwrap_or(line_start), line_start.saturating_sub(1));
        }
        first_content.get_or_insert(line_start);
    }
    let end = if text.ends_with('\n') { text.len() - 1 } else { text.len() };
    let end = end.max(body_start.saturating_sub(1));
    (first_content.unwrap_or(end + 1).min(text.len()), end)
}

/// A lexer for blocks that open with a line matched by `start` and whose
/// body runs until `end`.
///
/// The start pattern may capture a `prefix`, which is removed from each body
/// line before the body is dedented, and a `terminator`, which is matched but
/// left for the end pattern to find. Every other named group becomes a
/// lexeme, along with the body itself as `source`.
#[derive(Debug, Clone)]
pub struct BlockLexer {
    start: Regex,
    end: EndPattern,
    mapping: Option<Mapping>,
}

impl BlockLexer {
    pub fn new(start: Regex, end: EndPattern) -> Self {
        BlockLexer { start, end, mapping: None }
    }

    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = Some(mapping);
        self
    }
}

impl Lexer for BlockLexer {
    fn lex(&self, document: &Document) -> Result<Vec<LexedRegion>, Error> {
        let text = document.text();
        let mut regions = Vec::new();
        for captures in self.start.captures_iter(text) {
            let Some(whole) = captures.get(0) else { continue };
            let prefix = captures.name("prefix").map_or("", |group| group.as_str());
            let body_start = captures.name("terminator").map_or(whole.end(), |group| group.start());

            let Some((source_start, source_end)) = self.end.locate(text, body_start, prefix)? else {
                return Err(LexingError {
                    path: document.path().to_path_buf(),
                    end: self.end.render(prefix),
                    offset: whole.start(),
                    remainder: text[body_start..].to_string(),
                }
                .into());
            };

            let raw = text.get(source_start..source_end).unwrap_or("");
            let mut lexemes = named_groups(&self.start, &captures);
            lexemes.insert(
                "source".to_string(),
                LexemeValue::Lexeme(Lexeme::new(
                    dedent(&strip_prefix(raw, prefix)),
                    source_start - whole.start(),
                    count_newlines(&text[whole.start()..source_start]).saturating_sub(1),
                )),
            );
            if let Some(mapping) = &self.mapping {
                lexemes = mapping.apply(lexemes);
            }

            debug!(start = whole.start(), end = source_end, "lexed block");
            regions.push(LexedRegion::new(whole.start(), source_end, lexemes));
        }
        Ok(regions)
    }
}
