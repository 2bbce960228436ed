//! A small, sandboxed scripting language with Python-like syntax and
//! semantics, used to run documentation examples against a shared namespace.

pub mod ast;
pub mod builtins;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod runtime_value;

pub use environment::Namespace;
pub use error::{ParseError, RuntimeError, Traceback};
pub use executor::{BUILTINS_KEY, Flags, Future, Interpreter, Mode};
pub use runtime_value::{Arguments, NativeFunction, Value};
