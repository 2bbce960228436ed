//! Small text utilities shared by the lexers and parsers.

/// Quote a string the way a Python `repr()` would, for messages.
pub fn repr(text: &str) -> String {
    interpreter::Value::String(text.to_string()).repr()
}

fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

fn is_blank(line: &str) -> bool {
    line.trim_end_matches(['\n', '\r']).trim_matches([' ', '\t']).is_empty()
}

fn line_ending(line: &str) -> &str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

/// Remove any common leading whitespace from every line. Lines consisting
/// solely of whitespace are normalised to just their line ending.
pub fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;
    for line in text.split_inclusive('\n') {
        if is_blank(line) {
            continue;
        }
        let indent = leading_whitespace(line);
        margin = Some(match margin {
            None => indent,
            Some(current) => {
                let common = current
                    .char_indices()
                    .zip(indent.chars())
                    .find(|((_, a), b)| a != b)
                    .map(|((i, _), _)| i)
                    .unwrap_or(current.len().min(indent.len()));
                &current[..common]
            }
        });
    }
    let margin = margin.unwrap_or("");

    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        if is_blank(line) {
            out.push_str(line_ending(line));
        } else {
            out.push_str(line.strip_prefix(margin).unwrap_or(line));
        }
    }
    out
}

/// Remove `prefix` from the start of every line that carries it. Blank lines
/// without the prefix are kept as bare line endings.
pub fn strip_prefix(text: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        match line.strip_prefix(prefix) {
            Some(rest) => out.push_str(rest),
            None if is_blank(line) => out.push_str(line_ending(line)),
            None => out.push_str(line),
        }
    }
    out
}

/// Byte offsets at which each line of `text` starts.
pub fn line_starts(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_inclusive('\n').scan(0, |offset, line| {
        let start = *offset;
        *offset += line.len();
        Some((start, line))
    })
}
