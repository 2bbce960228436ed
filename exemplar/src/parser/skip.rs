use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::Parser;
use crate::document::Document;
use crate::error::Error;
use crate::evaluator::Evaluator;
use crate::evaluators::skip::{SkipDirective, Skipper};
use crate::lexer::{Lexer, LexerCollection};
use crate::region::Region;
use crate::text::repr;

static SKIP_ARGUMENTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A(\w+)(?:\s+if(.+))?\s*\z").expect("valid skip arguments pattern"));

/// Finds skip directives such as `skip: next` or
/// `skip: start if(sys.version_info < (3, 8), reason='too old')`.
pub struct SkipParser {
    lexers: LexerCollection,
    skipper: Rc<dyn Evaluator>,
}

impl SkipParser {
    pub fn new(lexers: LexerCollection) -> Self {
        SkipParser { lexers, skipper: Rc::new(Skipper::new()) }
    }
}

impl Parser for SkipParser {
    fn parse(&self, document: &Document) -> Result<Vec<Region>, Error> {
        let mut regions = Vec::new();
        for lexed in self.lexers.lex(document)? {
            let arguments = lexed.text("arguments").unwrap_or("");
            let captures = SKIP_ARGUMENTS.captures(arguments).ok_or_else(|| {
                let directive = lexed.text("directive").unwrap_or("skip");
                Error::value(format!("malformed arguments to {directive}: {}", repr(arguments)))
            })?;
            let action = captures.get(1).map_or("", |action| action.as_str());
            let condition = captures.get(2).map(|condition| condition.as_str().trim().to_string());
            debug!(start = lexed.start, action, "skip directive found");
            regions.push(Region::new(
                lexed.start,
                lexed.end,
                SkipDirective::new(action, condition),
                Rc::clone(&self.skipper),
            ));
        }
        Ok(regions)
    }
}
