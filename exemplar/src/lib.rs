//! Checking the examples in documentation.
//!
//! A [`Document`] is parsed by a set of [`Parser`]s, each built on one or
//! more [`Lexer`]s, into non-overlapping [`Region`]s. Each region is then
//! evaluated in order, as an [`Example`], against a namespace shared by the
//! whole document.

pub mod document;
pub mod error;
pub mod evaluator;
pub mod evaluators;
pub mod example;
pub mod lexer;
pub mod parser;
pub mod region;
pub mod testing;
pub mod text;

pub use document::{Document, Encoding};
pub use error::{Error, ExampleFailure, LexingError};
pub use evaluator::{Evaluation, Evaluator, evaluator_fn};
pub use example::Example;
pub use lexer::Lexer;
pub use parser::Parser;
pub use region::{LexedRegion, Lexeme, LexemeValue, Lexemes, Region};
