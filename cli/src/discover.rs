//! Finding the documents under a root directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::trace;

/// Translate a shell-style pattern into an anchored regular expression.
///
/// `*` matches any run of characters, separators included, `?` any single
/// character and `[...]` a character set, negated with a leading `!`. A set
/// with no closing bracket is matched literally.
pub fn fnmatch_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut regex = String::from(r"(?s)\A");
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        i += 1;
        match ch {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '[' => {
                let mut j = i;
                if chars.get(j) == Some(&'!') {
                    j += 1;
                }
                if chars.get(j) == Some(&']') {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    regex.push_str(r"\[");
                    continue;
                }
                let mut set: String = chars[i..j].iter().collect::<String>().replace('\\', r"\\");
                if let Some(rest) = set.strip_prefix('!') {
                    set = format!("^{rest}");
                } else if set.starts_with('^') {
                    set.insert(0, '\\');
                }
                regex.push('[');
                regex.push_str(&set.replace('[', r"\["));
                regex.push(']');
                i = j + 1;
            }
            other => regex.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    regex.push_str(r"\z");
    regex
}

/// Decides which paths, relative to the root, are documents to check.
#[derive(Debug, Clone)]
pub struct PathFilter {
    patterns: Vec<Regex>,
    filenames: BTreeSet<String>,
    excludes: Vec<Regex>,
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|pattern| Regex::new(&fnmatch_to_regex(pattern))).collect()
}

impl PathFilter {
    pub fn new(patterns: &[String], filenames: &[String], excludes: &[String]) -> Result<Self, regex::Error> {
        Ok(PathFilter {
            patterns: compile(patterns)?,
            filenames: filenames.iter().cloned().collect(),
            excludes: compile(excludes)?,
        })
    }

    /// A path is wanted when it matches a pattern or its file name is listed,
    /// and it matches no exclude.
    pub fn matches(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        let included = self.patterns.iter().any(|pattern| pattern.is_match(path)) || self.filenames.contains(name);
        included && !self.excludes.iter().any(|exclude| exclude.is_match(path))
    }
}

/// Every file under `root`, as `/`-separated paths relative to it, sorted.
/// Unreadable directories are passed over.
pub fn list_files(root: &Path) -> Vec<String> {
    let mut found = Vec::new();
    collect(root, root, &mut found);
    found.sort();
    found
}

fn collect(directory: &Path, root: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(directory) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(&path, root, out);
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
}

/// The documents under `root` that `filter` accepts, in sorted order.
pub fn documents(root: &Path, filter: &PathFilter) -> Vec<PathBuf> {
    list_files(root)
        .into_iter()
        .filter(|relative| {
            let wanted = filter.matches(relative);
            trace!(path = %relative, wanted, "considered");
            wanted
        })
        .map(|relative| root.join(relative))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn filter(patterns: &[&str], filenames: &[&str], excludes: &[&str]) -> PathFilter {
        PathFilter::new(&strings(patterns), &strings(filenames), &strings(excludes)).unwrap()
    }

    #[test]
    fn translation() {
        assert_eq!(fnmatch_to_regex("*.md"), r"(?s)\A.*\.md\z");
        assert_eq!(fnmatch_to_regex("a?[!x]"), r"(?s)\Aa.[^x]\z");
        assert_eq!(fnmatch_to_regex("[a"), r"(?s)\A\[a\z");
    }

    #[test]
    fn star_crosses_directories() {
        let filter = filter(&["*.md"], &[], &[]);
        assert!(filter.matches("index.md"));
        assert!(filter.matches("guide/intro.md"));
        assert!(!filter.matches("index.rst"));
    }

    #[test]
    fn double_star_needs_a_directory() {
        let filter = filter(&["**/*.md"], &[], &[]);
        assert!(!filter.matches("index.md"));
        assert!(filter.matches("guide/intro.md"));
    }

    #[test]
    fn filenames_and_excludes() {
        let filter = filter(&["docs/*.rst"], &["README.md"], &["*/drafts/*"]);
        assert!(filter.matches("README.md"));
        assert!(filter.matches("pkg/README.md"));
        assert!(filter.matches("docs/api.rst"));
        assert!(!filter.matches("docs/drafts/wip.rst"));
        assert!(!filter.matches("pkg/drafts/README.md"));
    }

    #[test]
    fn walks_sorted_and_relative() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("b/c")).unwrap();
        for name in ["z.md", "a.md", "b/c/d.md", "b/notes.txt"] {
            std::fs::write(root.path().join(name), "").unwrap();
        }
        assert_eq!(list_files(root.path()), strings(&["a.md", "b/c/d.md", "b/notes.txt", "z.md"]));

        let found = documents(root.path(), &filter(&["*.md"], &[], &["z*"]));
        assert_eq!(found, vec![root.path().join("a.md"), root.path().join("b/c/d.md")]);
    }
}
