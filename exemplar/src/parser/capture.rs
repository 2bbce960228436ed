//! Capturing the body of a reST block into a namespace variable:
//!
//! ```text
//! Some configuration::
//!
//!     [settings]
//!     debug = true
//!
//! .. -> config
//! ```
//!
//! The captured text is dedented and stripped, with a single trailing newline.

use std::rc::Rc;

use interpreter::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::Parser;
use crate::document::Document;
use crate::error::Error;
use crate::evaluator::{Evaluator, evaluator_fn};
use crate::region::Region;
use crate::text::{dedent, line_starts, repr};

static CAPTURE_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<indent>[ \t]*)\.\.\s*-+>\s*(?P<name>\S+).*$").expect("valid capture directive pattern")
});

/// The parsed form of a capture: the variable name and the captured text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub name: String,
    pub text: String,
}

/// Whether `line` is the header of a block captured by a directive
/// indented with `indent`.
fn indent_matches(line: &str, indent: &str) -> bool {
    if line.trim().is_empty() {
        return false;
    }
    line.strip_prefix(indent)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|next| !next.is_whitespace())
}

pub struct CaptureParser {
    evaluator: Rc<dyn Evaluator>,
}

impl CaptureParser {
    pub fn new() -> Self {
        let evaluator = evaluator_fn("capture", |example| {
            if let Some(capture) = example.parsed::<Capture>() {
                example.namespace().insert(capture.name.clone(), Value::String(capture.text.clone()));
            }
            Ok(None)
        });
        CaptureParser { evaluator }
    }
}

impl Default for CaptureParser {
    fn default() -> Self {
        CaptureParser::new()
    }
}

impl Parser for CaptureParser {
    fn parse(&self, document: &Document) -> Result<Vec<Region>, Error> {
        let lines: Vec<(usize, &str)> = line_starts(document.text()).collect();
        let mut regions = Vec::new();
        let mut index = lines.len();
        while index > 0 {
            index -= 1;
            let end_index = index;
            let (region_end, line) = lines[end_index];
            let Some(directive) = CAPTURE_DIRECTIVE.captures(line.trim_end_matches(['\n', '\r'])) else {
                continue;
            };
            let indent = directive.name("indent").map_or("", |indent| indent.as_str());

            let mut header = None;
            while index > 0 {
                index -= 1;
                if indent_matches(lines[index].1, indent) {
                    header = Some(index);
                    break;
                }
            }
            let start_index = header.map_or(end_index, |header| header + 1);
            if end_index - start_index < 2 {
                return Err(Error::value(format!(
                    "couldn't find the start of the block to match {} on line {} of {}",
                    repr(directive.get(0).map_or("", |whole| whole.as_str())),
                    end_index + 1,
                    document.path().display()
                )));
            }

            let captured: String = lines[start_index..end_index].iter().map(|(_, line)| *line).collect();
            let text = format!("{}\n", dedent(&captured).trim());
            let name = directive.name("name").map_or("", |name| name.as_str()).to_string();
            let region_start = lines[start_index - 1].0;
            debug!(name = %name, line = start_index, "capture");
            regions.push(Region::new(region_start, region_end, Capture { name, text }, Rc::clone(&self.evaluator)));
        }
        regions.reverse();
        Ok(regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn captures_the_indented_block() {
        let text = "Intro\n\nSome json::\n\n    {\"a\": 1}\n      nested\n\n.. -> json\n\nAfter.\n";
        let document = Document::new(text, "capture.rst");
        let regions = CaptureParser::new().parse(&document).unwrap();
        assert_eq!(regions.len(), 1);
        let capture = regions[0].parsed::<Capture>().unwrap();
        assert_eq!(capture.name, "json");
        assert_eq!(capture.text, "{\"a\": 1}\n  nested\n");
        assert_eq!(&text[regions[0].start..regions[0].end], "Some json::\n\n    {\"a\": 1}\n      nested\n\n");
    }

    #[test]
    fn indented_directives_match_indented_headers() {
        let text = "- item\n\n  Block::\n\n    text\n\n  .. -> value\n";
        let document = Document::new(text, "capture.rst");
        let regions = CaptureParser::new().parse(&document).unwrap();
        assert_eq!(regions[0].parsed::<Capture>().unwrap().text, "text\n");
    }

    #[test]
    fn missing_block_is_an_error() {
        let document = Document::new("Header::\n.. -> value\n", "/docs/capture.rst");
        let error = CaptureParser::new().parse(&document).unwrap_err();
        assert_eq!(
            error.to_string(),
            "couldn't find the start of the block to match '.. -> value' on line 2 of /docs/capture.rst"
        );
    }
}
