//! Lexers for Markdown documents.

use regex::Regex;

use super::{BlockLexer, EndPattern, Lexer, Mapping};
use crate::document::Document;
use crate::error::Error;
use crate::region::LexedRegion;

pub use super::fence::{FencedCodeBlockLexer, RawFencedCodeBlockLexer};

const DIRECTIVE_IN_HTML_COMMENT_START: &str = r"(?m)^(?P<prefix>[ \t]*)<!--+\s*(?:;\s*)?(?P<directive>{directive}):?[ \t]*(?P<arguments>{arguments})[ \t]*(?:\n|(?P<terminator>--+>))";
const DIRECTIVE_IN_HTML_COMMENT_END: &str = r"(?:(?m:^){prefix})?--+>";

/// A lexer for faux directives in HTML comments:
///
/// ```text
/// <!--- invisible-code-block: python
/// x = 1
/// --->
/// ```
///
/// The comment may also close on the directive's own line, as in
/// `<!-- skip: next -->`, in which case the source is empty.
///
/// Lexemes: `directive`, `arguments` and `source`.
#[derive(Debug, Clone)]
pub struct DirectiveInHtmlCommentLexer(BlockLexer);

impl DirectiveInHtmlCommentLexer {
    /// `directive` and `arguments` are regular expressions. Arguments match
    /// lazily so trailing spaces and the comment close are left alone.
    pub fn new(directive: &str, arguments: Option<&str>) -> Result<Self, Error> {
        let start = DIRECTIVE_IN_HTML_COMMENT_START
            .replace("{directive}", directive)
            .replace("{arguments}", arguments.unwrap_or(".*?"));
        Ok(DirectiveInHtmlCommentLexer(BlockLexer::new(
            Regex::new(&start)?,
            EndPattern::Template(DIRECTIVE_IN_HTML_COMMENT_END.to_string()),
        )))
    }

    pub fn with_mapping(self, mapping: Mapping) -> Self {
        DirectiveInHtmlCommentLexer(self.0.with_mapping(mapping))
    }
}

impl Lexer for DirectiveInHtmlCommentLexer {
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
    fn multi_line_comment() {
        let text = "Intro\n\n<!--- invisible-code-block: python\nb = 5\n\nc = 6\n--->\n\nOutro\n";
        let lexer = DirectiveInHtmlCommentLexer::new("(invisible-)?code(-block)?", Some(".+")).unwrap();
        let regions = lex(&lexer, text);
        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!(region.text("directive"), Some("invisible-code-block"));
        assert_eq!(region.text("arguments"), Some("python"));
        let source = region.source().unwrap();
        assert_eq!(source.as_str(), "b = 5\n\nc = 6\n");
        assert_eq!(source.line_offset, 0);
        assert_eq!(&text[region.start..region.end], "<!--- invisible-code-block: python\nb = 5\n\nc = 6\n");
    }

    #[test]
    fn single_line_comment() {
        let text = "<!-- skip: next -->\n<!--skip: start if(True, reason='x')-->\n";
        let lexer = DirectiveInHtmlCommentLexer::new("skip", None).unwrap();
        let regions = lex(&lexer, text);
        let arguments: Vec<_> = regions.iter().map(|region| region.text("arguments")).collect();
        assert_eq!(arguments, vec![Some("next"), Some("start if(True, reason='x')")]);
        assert_eq!(regions[0].source().unwrap().as_str(), "");
        assert_eq!(&text[regions[0].start..regions[0].end], "<!-- skip: next ");
    }

    #[test]
    fn indented_comment_keeps_prefix_out_of_source() {
        let text = "- item\n\n  <!-- clear-namespace\n  -->\n";
        let lexer = DirectiveInHtmlCommentLexer::new("clear-namespace", None).unwrap();
        let regions = lex(&lexer, text);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].text("arguments"), Some(""));
        assert_eq!(regions[0].source().unwrap().as_str(), "");
    }

    #[test]
    fn unclosed_comment_is_an_error() {
        let lexer = DirectiveInHtmlCommentLexer::new("skip", None).unwrap();
        let result = lexer.lex(&Document::new("<!-- skip: next\n", "sample.md"));
        assert!(matches!(result, Err(Error::Lexing(_))));
    }
}
