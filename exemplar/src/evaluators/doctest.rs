//! Running interactive-session examples and comparing what they print with
//! what the documentation expects.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use interpreter::{BUILTINS_KEY, Interpreter, Mode};
use once_cell::sync::Lazy;
use regex::Regex;
use similar::TextDiff;
use tracing::debug;

use crate::error::Error;
use crate::evaluator::{Evaluation, Evaluator};
use crate::example::Example;
use crate::parser::doctest::DocTestExample;

/// Options controlling how expected and actual output are compared.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OptionFlags(u32);

impl OptionFlags {
    pub const DONT_ACCEPT_TRUE_FOR_1: OptionFlags = OptionFlags(1 << 0);
    pub const DONT_ACCEPT_BLANKLINE: OptionFlags = OptionFlags(1 << 1);
    pub const NORMALIZE_WHITESPACE: OptionFlags = OptionFlags(1 << 2);
    pub const ELLIPSIS: OptionFlags = OptionFlags(1 << 3);
    pub const SKIP: OptionFlags = OptionFlags(1 << 4);
    pub const IGNORE_EXCEPTION_DETAIL: OptionFlags = OptionFlags(1 << 5);
    pub const REPORT_UDIFF: OptionFlags = OptionFlags(1 << 6);
    /// Floating point numbers only need to match to the precision written in
    /// the expected output.
    pub const NUMBER: OptionFlags = OptionFlags(1 << 7);

    const NAMES: [(&'static str, OptionFlags); 8] = [
        ("DONT_ACCEPT_TRUE_FOR_1", Self::DONT_ACCEPT_TRUE_FOR_1),
        ("DONT_ACCEPT_BLANKLINE", Self::DONT_ACCEPT_BLANKLINE),
        ("NORMALIZE_WHITESPACE", Self::NORMALIZE_WHITESPACE),
        ("ELLIPSIS", Self::ELLIPSIS),
        ("SKIP", Self::SKIP),
        ("IGNORE_EXCEPTION_DETAIL", Self::IGNORE_EXCEPTION_DETAIL),
        ("REPORT_UDIFF", Self::REPORT_UDIFF),
        ("NUMBER", Self::NUMBER),
    ];

    pub const fn empty() -> Self {
        OptionFlags(0)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES.iter().find(|(known, _)| *known == name).map(|&(_, flag)| flag)
    }

    /// Combine flags given by name, as in a configuration file.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, Error> {
        names.iter().try_fold(OptionFlags::empty(), |flags, name| {
            let name = name.as_ref();
            OptionFlags::from_name(name)
                .map(|flag| flags | flag)
                .ok_or_else(|| Error::value(format!("unknown doctest option: {name}")))
        })
    }

    pub fn contains(self, other: OptionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: OptionFlags, enabled: bool) {
        if enabled {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl BitOr for OptionFlags {
    type Output = OptionFlags;

    fn bitor(self, other: OptionFlags) -> OptionFlags {
        OptionFlags(self.0 | other.0)
    }
}

impl BitOrAssign for OptionFlags {
    fn bitor_assign(&mut self, other: OptionFlags) {
        self.0 |= other.0;
    }
}

impl fmt::Debug for OptionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect();
        write!(f, "OptionFlags({})", names.join(" | "))
    }
}

const BLANKLINE_MARKER: &str = "<BLANKLINE>";
const ELLIPSIS_MARKER: &str = "...";

static BLANKLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?m)^{}[ \t\r\f\v]*$", regex::escape(BLANKLINE_MARKER))).expect("valid blank line pattern")
});
static WHITESPACE_ONLY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[^\S\n]+$").expect("valid whitespace pattern"));
static NUMBER_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<number>(?P<mantissa>(?P<integer1>[+-]?\d*)\.(?P<fraction>\d+)|(?P<integer2>[+-]?\d+)\.)(?:[Ee](?P<exponent1>[+-]?\d+))?|(?P<integer3>[+-]?\d+)(?:[Ee](?P<exponent2>[+-]?\d+)))",
    )
    .expect("valid number pattern")
});

/// Decides whether actual output matches the expected output of an example,
/// and describes the difference when it does not.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputChecker;

impl OutputChecker {
    pub fn check_output(&self, want: &str, got: &str, flags: OptionFlags) -> bool {
        let mut got = got.to_string();
        let mut want = want.to_string();
        if flags.contains(OptionFlags::NUMBER) {
            got = remove_unwanted_precision(&want, &got);
        }

        if !flags.contains(OptionFlags::DONT_ACCEPT_TRUE_FOR_1)
            && matches!((got.as_str(), want.as_str()), ("True\n", "1\n") | ("False\n", "0\n"))
        {
            return true;
        }
        if got == want {
            return true;
        }

        if !flags.contains(OptionFlags::DONT_ACCEPT_BLANKLINE) {
            want = BLANKLINE.replace_all(&want, "").into_owned();
            got = WHITESPACE_ONLY_LINE.replace_all(&got, "").into_owned();
            if got == want {
                return true;
            }
        }

        if flags.contains(OptionFlags::NORMALIZE_WHITESPACE) {
            got = got.split_whitespace().collect::<Vec<_>>().join(" ");
            want = want.split_whitespace().collect::<Vec<_>>().join(" ");
            if got == want {
                return true;
            }
        }

        flags.contains(OptionFlags::ELLIPSIS) && ellipsis_match(&want, &got)
    }

    pub fn output_difference(&self, want: &str, got: &str, flags: OptionFlags) -> String {
        let got = if flags.contains(OptionFlags::DONT_ACCEPT_BLANKLINE) {
            got.to_string()
        } else {
            mark_blank_lines(got)
        };

        if flags.contains(OptionFlags::REPORT_UDIFF) && want.matches('\n').count() > 2 && got.matches('\n').count() > 2 {
            let diff = TextDiff::from_lines(want, got.as_str());
            let unified = diff.unified_diff().context_radius(2).to_string();
            return format!("Differences (unified diff with -expected +actual):\n{}", indent(&unified));
        }

        match (want.is_empty(), got.is_empty()) {
            (false, false) => format!("Expected:\n{}Got:\n{}", indent(want), indent(&got)),
            (false, true) => format!("Expected:\n{}Got nothing\n", indent(want)),
            (true, false) => format!("Expected nothing\nGot:\n{}", indent(&got)),
            (true, true) => "Expected nothing\nGot nothing\n".to_string(),
        }
    }
}

/// Replace lines holding only spaces, other than a final unterminated one,
/// with the blank line marker.
fn mark_blank_lines(text: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| match line.strip_suffix('\n') {
            Some(content) if content.bytes().all(|byte| byte == b' ') => format!("{BLANKLINE_MARKER}\n"),
            _ => line.to_string(),
        })
        .collect()
}

/// Indent every non-empty line by four spaces.
fn indent(text: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| if line == "\n" { line.to_string() } else { format!("    {line}") })
        .collect()
}

/// Whether `got` matches `want`, where each `...` in `want` stands for any
/// run of text.
pub fn ellipsis_match(want: &str, got: &str) -> bool {
    if !want.contains(ELLIPSIS_MARKER) {
        return want == got;
    }
    let mut pieces: Vec<&str> = want.split(ELLIPSIS_MARKER).collect();
    let mut start = 0;
    let mut end = got.len();

    let first = pieces[0];
    if !first.is_empty() {
        if !got.starts_with(first) {
            return false;
        }
        start = first.len();
        pieces.remove(0);
    }
    if let Some(&last) = pieces.last().filter(|last| !last.is_empty()) {
        if !got.ends_with(last) {
            return false;
        }
        end -= last.len();
        pieces.pop();
    }
    if start > end {
        return false;
    }

    for piece in pieces {
        match got[start..end].find(piece) {
            Some(found) => start += found + piece.len(),
            None => return false,
        }
    }
    true
}

/// Where `got` holds floating point numbers within the precision written in
/// `want`, replace them with the text from `want`.
fn remove_unwanted_precision(want: &str, got: &str) -> String {
    let wants: Vec<_> = NUMBER_LITERAL.captures_iter(want).collect();
    let gots: Vec<_> = NUMBER_LITERAL.captures_iter(got).collect();
    if wants.len() != gots.len() {
        return got.to_string();
    }

    let mut result = String::with_capacity(got.len());
    let mut last = 0;
    for (wanted, actual) in wants.iter().zip(&gots) {
        let (Some(wanted_text), Some(actual_text)) = (wanted.get(0), actual.get(0)) else {
            continue;
        };
        let fraction = wanted.name("fraction").map_or(0, |fraction| fraction.as_str().len() as i64);
        let exponent = wanted
            .name("exponent1")
            .or_else(|| wanted.name("exponent2"))
            .and_then(|exponent| exponent.as_str().parse::<i64>().ok())
            .unwrap_or(0);
        // beyond this range the tolerance is already 0 or infinite
        let precision = fraction.saturating_sub(exponent).clamp(-400, 400) as i32;

        let (Ok(expected), Ok(found)) =
            (wanted_text.as_str().parse::<f64>(), actual_text.as_str().parse::<f64>())
        else {
            continue;
        };
        let tolerance = 10f64.powi(-precision).max(1e-6 * found.abs());
        if (expected - found).abs() <= tolerance {
            result.push_str(&got[last..actual_text.start()]);
            result.push_str(wanted_text.as_str());
            last = actual_text.end();
        }
    }
    result.push_str(&got[last..]);
    result
}

/// The `Kind` part of an exception message, without any module path or
/// detail after the colon.
fn strip_exception_details(message: &str) -> &str {
    let end = message.find('\n').unwrap_or(message.len());
    let end = message[..end].find(':').unwrap_or(end);
    let start = message[..end].rfind('.').map_or(0, |dot| dot + 1);
    &message[start..end]
}

/// Evaluates examples parsed by a [`DocTestStringParser`](crate::parser::doctest::DocTestStringParser).
#[derive(Debug, Clone, Default)]
pub struct DocTestEvaluator {
    flags: OptionFlags,
    checker: OutputChecker,
}

impl DocTestEvaluator {
    pub fn new(flags: OptionFlags) -> Self {
        DocTestEvaluator { flags, checker: OutputChecker }
    }

    pub fn flags(&self) -> OptionFlags {
        self.flags
    }
}

impl Evaluator for DocTestEvaluator {
    fn evaluate(&self, example: &Example<'_>) -> Evaluation {
        let doctest = example
            .parsed::<DocTestExample>()
            .ok_or_else(|| Error::value(format!("{:?} does not hold a doctest example", example.region)))?;
        let mut flags = self.flags;
        for &(flag, enabled) in &doctest.options {
            flags.set(flag, enabled);
        }
        if flags.contains(OptionFlags::SKIP) {
            debug!(line = example.line, "doctest example not run");
            return Ok(None);
        }

        let interpreter = Interpreter::new(example.path().display().to_string())
            .with_mode(Mode::Interactive)
            .with_line_offset(example.line.saturating_sub(1));
        let mut output = Vec::new();
        let result = interpreter.run(&doctest.source, example.namespace(), &mut output);
        example.namespace().remove(BUILTINS_KEY);
        let mut got = String::from_utf8_lossy(&output).into_owned();

        let matched = match &result {
            Ok(()) => self.checker.check_output(&doctest.want, &got, flags),
            Err(traceback) => {
                let exception = traceback.exception_only();
                got.push_str(&traceback.to_string());
                got.push('\n');
                let Some(expected) = &doctest.exc_msg else {
                    return Ok(Some(format!("Exception raised:\n{}", indent(&format!("{traceback}\n")))));
                };
                self.checker.check_output(expected, &exception, flags)
                    || (flags.contains(OptionFlags::IGNORE_EXCEPTION_DETAIL)
                        && self.checker.check_output(
                            strip_exception_details(expected),
                            strip_exception_details(&exception),
                            flags,
                        ))
            }
        };

        if matched {
            Ok(None)
        } else {
            Ok(Some(self.checker.output_difference(&doctest.want, &got, flags)))
        }
    }

    fn name(&self) -> &str {
        "doctest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("1\n", "1\n", OptionFlags::empty(), true)]
    #[case("1\n", "True\n", OptionFlags::empty(), true)]
    #[case("1\n", "True\n", OptionFlags::DONT_ACCEPT_TRUE_FOR_1, false)]
    #[case("a\n<BLANKLINE>\nb\n", "a\n\nb\n", OptionFlags::empty(), true)]
    #[case("a\n<BLANKLINE>\nb\n", "a\n\nb\n", OptionFlags::DONT_ACCEPT_BLANKLINE, false)]
    #[case("[1, 2,\n 3]\n", "[1, 2, 3]\n", OptionFlags::NORMALIZE_WHITESPACE, true)]
    #[case("[1, ..., 10]\n", "[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]\n", OptionFlags::ELLIPSIS, true)]
    #[case("[1, ..., 10]\n", "[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]\n", OptionFlags::empty(), false)]
    #[case("3.14\n", "3.141592653589793\n", OptionFlags::NUMBER, true)]
    #[case("3.14\n", "3.16\n", OptionFlags::NUMBER, false)]
    #[case("1e-3\n", "0.0032\n", OptionFlags::NUMBER, false)]
    #[case("1.0e-3\n", "0.00104\n", OptionFlags::NUMBER, true)]
    #[case("1.0e-2147483648\n", "0.0\n", OptionFlags::NUMBER, true)]
    fn checks_output(#[case] want: &str, #[case] got: &str, #[case] flags: OptionFlags, #[case] expected: bool) {
        assert_eq!(OutputChecker.check_output(want, got, flags), expected);
    }

    #[rstest]
    #[case("aXbXc", "a...c", true)]
    #[case("abc", "a...b...c", true)]
    #[case("ab", "a...b...b", false)]
    #[case("anything", "...", true)]
    #[case("xabc", "a...", false)]
    fn ellipsis(#[case] got: &str, #[case] want: &str, #[case] expected: bool) {
        assert_eq!(ellipsis_match(want, got), expected);
    }

    #[test]
    fn reports_differences() {
        let checker = OutputChecker;
        assert_eq!(
            checker.output_difference("1\n", "2\n", OptionFlags::empty()),
            "Expected:\n    1\nGot:\n    2\n"
        );
        assert_eq!(
            checker.output_difference("", "a\n   \nb\n", OptionFlags::empty()),
            "Expected nothing\nGot:\n    a\n    <BLANKLINE>\n    b\n"
        );
        assert_eq!(checker.output_difference("1\n", "", OptionFlags::empty()), "Expected:\n    1\nGot nothing\n");
    }

    #[test]
    fn reports_unified_diff() {
        let report = OutputChecker.output_difference(
            "a\nb\nc\nd\n",
            "a\nb\nx\nd\n",
            OptionFlags::REPORT_UDIFF,
        );
        assert_eq!(
            report,
            "Differences (unified diff with -expected +actual):\n    @@ -1,4 +1,4 @@\n     a\n     b\n    -c\n    +x\n     d\n"
        );
    }

    #[test]
    fn exception_details() {
        assert_eq!(strip_exception_details("ValueError: bad thing\n"), "ValueError");
        assert_eq!(strip_exception_details("pkg.mod.Error: x"), "Error");
    }

    #[test]
    fn option_names() {
        let flags = OptionFlags::from_names(&["ELLIPSIS", "NUMBER"]).unwrap();
        assert!(flags.contains(OptionFlags::ELLIPSIS));
        assert!(!flags.contains(OptionFlags::SKIP));
        assert_eq!(format!("{flags:?}"), "OptionFlags(ELLIPSIS | NUMBER)");
        assert!(OptionFlags::from_names(&["FAST"]).is_err());
    }
}
