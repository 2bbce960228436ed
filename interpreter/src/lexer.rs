use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i64),
    Float(f64),
    Str(String),
    Ident(String),

    True,
    False,
    None,
    And,
    Or,
    Not,
    In,
    If,
    Elif,
    Else,
    For,
    Assert,
    Del,
    Pass,

    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    Eq,
    EqEq,
    BangEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    PlusEq,
    MinusEq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,

    Newline,
    Indent,
    Dedent,
    EndOfInput,
}

/// A token together with the 1-based source line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

/// Split source text into tokens, emitting `Indent`/`Dedent` for block
/// structure. Newlines inside brackets are ignored.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut indents: Vec<usize> = vec![0];
    let mut depth = 0usize;
    let mut open_line = 1usize;
    let mut line = 1usize;
    let mut at_line_start = true;
    let mut i = 0;

    let syntax = |message: &str, line: usize| ParseError::new(message, line);

    while i < len {
        if at_line_start && depth == 0 {
            let mut width = 0;
            let mut j = i;
            while j < len && (chars[j] == ' ' || chars[j] == '\t') {
                width += if chars[j] == '\t' { 8 - width % 8 } else { 1 };
                j += 1;
            }
            // Blank and comment-only lines do not affect indentation.
            if j >= len || chars[j] == '\n' || chars[j] == '#' || chars[j] == '\r' {
                while j < len && chars[j] != '\n' {
                    j += 1;
                }
                i = j;
                if i < len {
                    i += 1;
                    line += 1;
                }
                continue;
            }
            let current = indents.last().copied().unwrap_or(0);
            if width > current {
                if tokens.is_empty() {
                    return Err(syntax("unexpected indent", line));
                }
                indents.push(width);
                tokens.push(Spanned { token: Token::Indent, line });
            } else {
                while width < indents.last().copied().unwrap_or(0) {
                    indents.pop();
                    tokens.push(Spanned { token: Token::Dedent, line });
                }
                if width != indents.last().copied().unwrap_or(0) {
                    return Err(syntax("unindent does not match any outer indentation level", line));
                }
            }
            at_line_start = false;
            i = j;
            continue;
        }

        let c = chars[i];
        match c {
            '\n' => {
                if depth == 0 {
                    tokens.push(Spanned { token: Token::Newline, line });
                    at_line_start = true;
                }
                line += 1;
                i += 1;
            }
            ' ' | '\t' | '\r' => {
                i += 1;
            }
            '#' => {
                while i < len && chars[i] != '\n' {
                    i += 1;
                }
            }
            '\\' if i + 1 < len && chars[i + 1] == '\n' => {
                i += 2;
                line += 1;
            }

            '"' | '\'' => {
                let quote = c;
                let start_line = line;
                i += 1;
                let mut s = String::new();
                loop {
                    if i >= len || chars[i] == '\n' {
                        return Err(syntax("unterminated string literal", start_line));
                    }
                    let ch = chars[i];
                    if ch == quote {
                        i += 1;
                        break;
                    }
                    if ch == '\\' && i + 1 < len {
                        i += 1;
                        match chars[i] {
                            'n' => s.push('\n'),
                            't' => s.push('\t'),
                            'r' => s.push('\r'),
                            '0' => s.push('\0'),
                            '\\' => s.push('\\'),
                            '\'' => s.push('\''),
                            '"' => s.push('"'),
                            '\n' => line += 1,
                            other => {
                                s.push('\\');
                                s.push(other);
                            }
                        }
                        i += 1;
                        continue;
                    }
                    s.push(ch);
                    i += 1;
                }
                tokens.push(Spanned { token: Token::Str(s), line: start_line });
            }

            '0'..='9' | '.' if c != '.' || (i + 1 < len && chars[i + 1].is_ascii_digit()) => {
                let start = i;
                let mut is_float = false;
                while i < len && (chars[i].is_ascii_digit() || chars[i] == '_') {
                    i += 1;
                }
                if i < len && chars[i] == '.' {
                    is_float = true;
                    i += 1;
                    while i < len && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                if i < len && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < len && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < len && chars[j].is_ascii_digit() {
                        is_float = true;
                        i = j;
                        while i < len && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().filter(|&&ch| ch != '_').collect();
                let token = if is_float {
                    Token::Float(text.parse().map_err(|_| syntax("invalid decimal literal", line))?)
                } else {
                    Token::Integer(
                        text.parse().map_err(|_| syntax("integer literal is too large", line))?,
                    )
                };
                tokens.push(Spanned { token, line });
            }

            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < len && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let token = match ident.as_str() {
                    "True" => Token::True,
                    "False" => Token::False,
                    "None" => Token::None,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "if" => Token::If,
                    "elif" => Token::Elif,
                    "else" => Token::Else,
                    "for" => Token::For,
                    "assert" => Token::Assert,
                    "del" => Token::Del,
                    "pass" => Token::Pass,
                    _ => Token::Ident(ident),
                };
                tokens.push(Spanned { token, line });
            }

            _ => {
                let next = chars.get(i + 1).copied();
                let (token, width) = match (c, next) {
                    ('*', Some('*')) => (Token::StarStar, 2),
                    ('/', Some('/')) => (Token::SlashSlash, 2),
                    ('=', Some('=')) => (Token::EqEq, 2),
                    ('!', Some('=')) => (Token::BangEq, 2),
                    ('<', Some('=')) => (Token::LtEq, 2),
                    ('>', Some('=')) => (Token::GtEq, 2),
                    ('+', Some('=')) => (Token::PlusEq, 2),
                    ('-', Some('=')) => (Token::MinusEq, 2),
                    ('+', _) => (Token::Plus, 1),
                    ('-', _) => (Token::Minus, 1),
                    ('*', _) => (Token::Star, 1),
                    ('/', _) => (Token::Slash, 1),
                    ('%', _) => (Token::Percent, 1),
                    ('=', _) => (Token::Eq, 1),
                    ('<', _) => (Token::Lt, 1),
                    ('>', _) => (Token::Gt, 1),
                    (',', _) => (Token::Comma, 1),
                    (':', _) => (Token::Colon, 1),
                    (';', _) => (Token::Semicolon, 1),
                    ('(', _) | ('[', _) => {
                        if depth == 0 {
                            open_line = line;
                        }
                        depth += 1;
                        (if c == '(' { Token::LParen } else { Token::LBracket }, 1)
                    }
                    (')', _) | (']', _) => {
                        depth = depth.saturating_sub(1);
                        (if c == ')' { Token::RParen } else { Token::RBracket }, 1)
                    }
                    _ => return Err(syntax(&format!("invalid character '{}'", c), line)),
                };
                i += width;
                tokens.push(Spanned { token, line });
            }
        }
    }

    if depth > 0 {
        return Err(syntax("unexpected EOF while parsing", open_line));
    }
    if !matches!(tokens.last(), None | Some(Spanned { token: Token::Newline, .. })) {
        tokens.push(Spanned { token: Token::Newline, line });
    }
    while indents.len() > 1 {
        indents.pop();
        tokens.push(Spanned { token: Token::Dedent, line });
    }
    tokens.push(Spanned { token: Token::EndOfInput, line });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn numbers_strings_and_operators() {
        assert_eq!(
            kinds("x = 1.5 ** 2 // 'a\\n'"),
            vec![
                Token::Ident("x".into()),
                Token::Eq,
                Token::Float(1.5),
                Token::StarStar,
                Token::Integer(2),
                Token::SlashSlash,
                Token::Str("a\n".into()),
                Token::Newline,
                Token::EndOfInput,
            ]
        );
    }

    #[test]
    fn blocks_produce_indent_and_dedent() {
        assert_eq!(
            kinds("for i in x:\n    pass\n\ny\n"),
            vec![
                Token::For,
                Token::Ident("i".into()),
                Token::In,
                Token::Ident("x".into()),
                Token::Colon,
                Token::Newline,
                Token::Indent,
                Token::Pass,
                Token::Newline,
                Token::Dedent,
                Token::Ident("y".into()),
                Token::Newline,
                Token::EndOfInput,
            ]
        );
    }

    #[test]
    fn newlines_inside_brackets_are_joined() {
        let tokens = tokenize("f(1,\n  2)\nz").unwrap();
        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 1, 1, 1, 2, 2, 2, 3, 3, 3]);
    }

    #[test]
    fn unexpected_indent_is_a_syntax_error() {
        let error = tokenize("  x = 1").unwrap_err();
        assert_eq!(error, ParseError::new("unexpected indent", 1));
    }

    #[test]
    fn unterminated_string_reports_its_line() {
        let error = tokenize("a = 1\nb = 'oops\n").unwrap_err();
        assert_eq!(error.message, "unterminated string literal");
        assert_eq!(error.line, 2);
    }
}
