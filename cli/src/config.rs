//! `exemplar.toml`, the optional file describing which documents to check
//! and how.
//!
//! ```toml
//! path = "docs"
//! patterns = ["*.md"]
//! excludes = ["drafts/*"]
//! filenames = ["README.md"]
//! encoding = "utf-8"
//! flavour = "markdown"
//!
//! [doctest]
//! optionflags = ["ELLIPSIS", "NORMALIZE_WHITESPACE"]
//!
//! [codeblock]
//! language = "python"
//! future = ["division"]
//!
//! [[command]]
//! language = "bash"
//! argv = ["bash", "-e"]
//!
//! [namespace]
//! greeting = "hello"
//! ```
//!
//! All fields are optional.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use exemplar::evaluators::{CommandEvaluator, OptionFlags, ScriptEvaluator};
use exemplar::parser::{self, DocTestStringParser};
use exemplar::{Encoding, Parser};
use interpreter::Value;
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE: &str = "exemplar.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("invalid config in {}: {source}", .path.display())]
    Toml { path: PathBuf, source: toml::de::Error },

    #[error("namespace value {name:?} must be a string, number, boolean or array of those")]
    NamespaceValue { name: String },

    #[error(transparent)]
    Exemplar(#[from] exemplar::Error),
}

/// Markup flavour, which decides the directive syntax parsers look for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Flavour {
    #[default]
    Markdown,
    Myst,
    Rest,
}

impl Flavour {
    /// Patterns used when none are configured.
    pub fn default_patterns(self) -> &'static [&'static str] {
        match self {
            Flavour::Markdown | Flavour::Myst => &["*.md"],
            Flavour::Rest => &["*.rst", "*.txt"],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocTestConfig {
    pub optionflags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodeBlockConfig {
    pub language: String,
    pub future: Vec<String>,
}

impl Default for CodeBlockConfig {
    fn default() -> Self {
        CodeBlockConfig { language: "python".to_string(), future: Vec::new() }
    }
}

/// Code blocks in `language` are piped to `argv`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandConfig {
    pub language: String,
    pub argv: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root searched for documents, relative to the config file.
    pub path: PathBuf,
    pub patterns: Vec<String>,
    pub excludes: Vec<String>,
    /// Bare file names checked wherever they appear under the root.
    pub filenames: Vec<String>,
    pub encoding: String,
    pub flavour: Flavour,
    pub doctest: DocTestConfig,
    pub codeblock: CodeBlockConfig,
    pub command: Vec<CommandConfig>,
    pub skip: bool,
    pub clear: bool,
    pub capture: bool,
    /// Values placed in each document's namespace before its first example.
    pub namespace: BTreeMap<String, toml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            path: PathBuf::from("."),
            patterns: Vec::new(),
            excludes: Vec::new(),
            filenames: Vec::new(),
            encoding: "utf-8".to_string(),
            flavour: Flavour::default(),
            doctest: DocTestConfig::default(),
            codeblock: CodeBlockConfig::default(),
            command: Vec::new(),
            skip: true,
            clear: true,
            capture: true,
            namespace: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load from `path`. A relative `path` field is resolved against the
    /// directory holding the file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let mut config = Self::from_toml(&content, path)?;
        if let Some(directory) = path.parent() {
            config.path = directory.join(&config.path);
        }
        Ok(config)
    }

    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Toml { path: path.to_path_buf(), source })
    }

    /// The config file in `directory`, if there is one.
    pub fn discover(directory: &Path) -> Result<Option<Self>, ConfigError> {
        let candidate = directory.join(CONFIG_FILE);
        if !candidate.is_file() {
            return Ok(None);
        }
        Self::from_file(&candidate).map(Some)
    }

    pub fn patterns(&self) -> Vec<String> {
        if self.patterns.is_empty() && self.filenames.is_empty() {
            self.flavour.default_patterns().iter().map(|pattern| pattern.to_string()).collect()
        } else {
            self.patterns.clone()
        }
    }

    pub fn encoding(&self) -> Result<Encoding, ConfigError> {
        Ok(self.encoding.parse::<Encoding>()?)
    }

    /// The parsers for the configured flavour and features.
    pub fn parsers(&self) -> Result<Vec<Box<dyn Parser>>, ConfigError> {
        let flags = OptionFlags::from_names(&self.doctest.optionflags)?;
        let script = Rc::new(ScriptEvaluator::from_names(&self.codeblock.future)?);
        let language = self.codeblock.language.as_str();
        let mut parsers: Vec<Box<dyn Parser>> = Vec::new();

        match self.flavour {
            Flavour::Markdown => {
                parsers.push(Box::new(
                    parser::markdown::code_block_parser(language, script)?
                        .with_doctest(DocTestStringParser::with_flags(flags)),
                ));
            }
            Flavour::Myst => {
                parsers.push(Box::new(
                    parser::myst::code_block_parser(language, script)?
                        .with_doctest(DocTestStringParser::with_flags(flags)),
                ));
                parsers.push(Box::new(parser::myst::doctest_directive_parser(flags)?));
            }
            Flavour::Rest => {
                parsers.push(Box::new(parser::rest::code_block_parser(language, script)?));
                parsers.push(Box::new(parser::rest::doctest_parser(flags)));
                if self.capture {
                    parsers.push(Box::new(parser::rest::capture_parser()));
                }
            }
        }

        for command in &self.command {
            let evaluator = Rc::new(CommandEvaluator::new(&command.argv)?);
            parsers.push(match self.flavour {
                Flavour::Markdown => Box::new(parser::markdown::code_block_parser(&command.language, evaluator)?),
                Flavour::Myst => Box::new(parser::myst::code_block_parser(&command.language, evaluator)?),
                Flavour::Rest => Box::new(parser::rest::code_block_parser(&command.language, evaluator)?),
            });
        }

        if self.skip {
            parsers.push(match self.flavour {
                Flavour::Markdown => Box::new(parser::markdown::skip_parser()?),
                Flavour::Myst => Box::new(parser::myst::skip_parser()?),
                Flavour::Rest => Box::new(parser::rest::skip_parser()?),
            });
        }
        if self.clear {
            parsers.push(match self.flavour {
                Flavour::Markdown => Box::new(parser::markdown::clear_namespace_parser()?),
                Flavour::Myst => Box::new(parser::myst::clear_namespace_parser()?),
                Flavour::Rest => Box::new(parser::rest::clear_namespace_parser()?),
            });
        }
        Ok(parsers)
    }

    /// The `[namespace]` table as values to seed each document's namespace
    /// with.
    pub fn initial_namespace(&self) -> Result<Vec<(String, Value)>, ConfigError> {
        self.namespace
            .iter()
            .map(|(name, value)| {
                toml_to_value(value)
                    .map(|value| (name.clone(), value))
                    .ok_or_else(|| ConfigError::NamespaceValue { name: name.clone() })
            })
            .collect()
    }
}

fn toml_to_value(value: &toml::Value) -> Option<Value> {
    match value {
        toml::Value::String(s) => Some(Value::String(s.clone())),
        toml::Value::Integer(n) => Some(Value::Integer(*n)),
        toml::Value::Float(f) => Some(Value::Float(*f)),
        toml::Value::Boolean(b) => Some(Value::Boolean(*b)),
        toml::Value::Array(items) => items.iter().map(toml_to_value).collect::<Option<Vec<_>>>().map(Value::List),
        toml::Value::Datetime(_) | toml::Value::Table(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> Config {
        Config::from_toml(content, Path::new("exemplar.toml")).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse("");
        assert_eq!(config, Config::default());
        assert_eq!(config.patterns(), vec!["*.md".to_string()]);
        assert_eq!(config.encoding().unwrap(), Encoding::Utf8);
        assert_eq!(config.parsers().unwrap().len(), 3);
    }

    #[test]
    fn full_config() {
        let config = parse(
            r#"
path = "docs"
patterns = ["**/*.rst"]
excludes = ["drafts/*"]
filenames = ["README.rst"]
encoding = "latin-1"
flavour = "rest"
capture = false

[doctest]
optionflags = ["ELLIPSIS"]

[codeblock]
future = ["division"]

[[command]]
language = "bash"
argv = ["bash", "-e"]

[namespace]
answer = 42
names = ["a", "b"]
"#,
        );
        assert_eq!(config.flavour, Flavour::Rest);
        assert_eq!(config.patterns(), vec!["**/*.rst".to_string()]);
        assert_eq!(config.encoding().unwrap(), Encoding::Latin1);
        assert_eq!(config.command[0].argv, vec!["bash".to_string(), "-e".to_string()]);
        // code block, doctest, bash, skip, clear
        assert_eq!(config.parsers().unwrap().len(), 5);

        assert_eq!(
            config.initial_namespace().unwrap(),
            vec![
                ("answer".to_string(), Value::Integer(42)),
                ("names".to_string(), Value::List(vec![Value::String("a".into()), Value::String("b".into())])),
            ]
        );
    }

    #[test]
    fn filenames_alone_disable_default_patterns() {
        let config = parse("filenames = ['README.md']");
        assert!(config.patterns().is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = Config::from_toml("colour = 'red'", Path::new("conf/exemplar.toml")).unwrap_err();
        assert!(error.to_string().starts_with("invalid config in conf/exemplar.toml"));
    }

    #[test]
    fn bad_values_are_reported() {
        let error = parse("[doctest]\noptionflags = ['SHOUTING']").parsers().err().unwrap();
        assert_eq!(error.to_string(), "unknown doctest option: SHOUTING");

        let error = parse("encoding = 'ebcdic'").encoding().unwrap_err();
        assert_eq!(error.to_string(), "unknown encoding: ebcdic");

        let error = parse("[namespace]\nnested = { a = 1 }").initial_namespace().unwrap_err();
        assert!(matches!(error, ConfigError::NamespaceValue { name } if name == "nested"));
    }

    #[test]
    fn from_file_resolves_path_against_its_directory() {
        let directory = tempfile::tempdir().unwrap();
        let file = directory.path().join(CONFIG_FILE);
        std::fs::write(&file, "path = 'docs'\n").unwrap();
        let config = Config::discover(directory.path()).unwrap().unwrap();
        assert_eq!(config.path, directory.path().join("docs"));
        assert!(Config::discover(&directory.path().join("missing")).unwrap().is_none());
    }
}
