//! The evaluators shipped with the library.

pub mod command;
pub mod doctest;
pub mod script;
pub mod skip;

pub use command::CommandEvaluator;
pub use doctest::{DocTestEvaluator, OptionFlags, OutputChecker};
pub use script::ScriptEvaluator;
pub use skip::{Action, SkipDirective, Skipper};
