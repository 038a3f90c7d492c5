use super::cursor::{Cursor, is_identifier_part, is_identifier_start, is_line_terminator};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub(super) enum TokenKind {
    /// Identifiers and keywords alike; the parser tells them apart.
    Ident(String),
    Number(f64),
    String(String),
    /// Cooked text segments around raw `${...}` expression sources.
    Template {
        quasis: Vec<String>,
        exprs: Vec<String>,
    },
    Regex {
        pattern: String,
        flags: String,
    },
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Token {
    pub(super) kind: TokenKind,
    pub(super) newline_before: bool,
    pub(super) pos: usize,
}

const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==", "!=",
    "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
    "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*", "/", "%",
    "&", "|", "^", "!", "~", "?", ":", "=", ".",
];

pub(super) fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut cursor = Cursor::new(src);
    let mut tokens: Vec<Token> = Vec::new();

    loop {
        let newline_before = cursor.skip_ws_and_comments()?;
        let pos = cursor.pos();
        let Some(ch) = cursor.peek() else {
            tokens.push(Token {
                kind: TokenKind::Eof,
                newline_before: true,
                pos,
            });
            return Ok(tokens);
        };

        let kind = if is_identifier_start(ch) {
            let ident = cursor
                .parse_identifier()
                .ok_or_else(|| Error::ScriptParse(format!("invalid identifier at {pos}")))?;
            TokenKind::Ident(ident)
        } else if ch == '\\' {
            return Err(Error::ScriptParse(format!(
                "unicode escapes in identifiers are not supported (at {pos})"
            )));
        } else if ch.is_ascii_digit() || (ch == '.' && cursor.peek_nth(1).is_some_and(|next| next.is_ascii_digit())) {
            TokenKind::Number(read_number(&mut cursor)?)
        } else if ch == '"' || ch == '\'' {
            TokenKind::String(cursor.parse_string_literal()?)
        } else if ch == '`' {
            read_template(&mut cursor)?
        } else if ch == '/' && regex_allowed(tokens.last().map(|token| &token.kind)) {
            read_regex(&mut cursor)?
        } else {
            read_punctuator(&mut cursor)
                .ok_or_else(|| Error::ScriptParse(format!("unexpected character '{ch}' at {pos}")))?
        };

        tokens.push(Token {
            kind,
            newline_before,
            pos,
        });
    }
}

/// Whether a `/` after `previous` opens a regular expression literal rather
/// than a division.
fn regex_allowed(previous: Option<&TokenKind>) -> bool {
    match previous {
        None => true,
        Some(TokenKind::Punct(punct)) => !matches!(*punct, ")" | "]" | "}" | "++" | "--"),
        Some(TokenKind::Ident(name)) => matches!(
            name.as_str(),
            "return"
                | "typeof"
                | "instanceof"
                | "in"
                | "of"
                | "new"
                | "delete"
                | "void"
                | "throw"
                | "case"
                | "do"
                | "else"
        ),
        Some(_) => false,
    }
}

fn read_punctuator(cursor: &mut Cursor<'_>) -> Option<TokenKind> {
    for punct in PUNCTUATORS {
        if !cursor.starts_with(punct) {
            continue;
        }
        // `a?.5:1` is a conditional, not optional chaining.
        if *punct == "?." && cursor.peek_nth(2).is_some_and(|ch| ch.is_ascii_digit()) {
            continue;
        }
        cursor.consume_ascii(punct);
        return Some(TokenKind::Punct(punct));
    }
    None
}

fn read_number(cursor: &mut Cursor<'_>) -> Result<f64> {
    let start = cursor.pos();
    let radix = if cursor.peek() == Some('0') {
        match cursor.peek_nth(1) {
            Some('x' | 'X') => Some(16),
            Some('o' | 'O') => Some(8),
            Some('b' | 'B') => Some(2),
            _ => None,
        }
    } else {
        None
    };

    if let Some(radix) = radix {
        cursor.bump();
        cursor.bump();
        let digits_start = cursor.pos();
        while cursor
            .peek()
            .is_some_and(|ch| ch.is_digit(radix) || ch == '_')
        {
            cursor.bump();
        }
        let digits = cursor.slice_from(digits_start).replace('_', "");
        if digits.is_empty() {
            return Err(Error::ScriptParse(format!("invalid number literal at {start}")));
        }
        let value = digits
            .chars()
            .filter_map(|ch| ch.to_digit(radix))
            .fold(0f64, |acc, digit| acc * f64::from(radix) + f64::from(digit));
        ensure_number_boundary(cursor, start)?;
        return Ok(value);
    }

    let mut seen_dot = false;
    let mut seen_exp = false;
    while let Some(ch) = cursor.peek() {
        match ch {
            '0'..='9' | '_' => {
                cursor.bump();
            }
            '.' if !seen_dot && !seen_exp => {
                seen_dot = true;
                cursor.bump();
            }
            'e' | 'E' if !seen_exp => {
                seen_exp = true;
                cursor.bump();
                if matches!(cursor.peek(), Some('+' | '-')) {
                    cursor.bump();
                }
            }
            _ => break,
        }
    }
    // BigInt suffix.
    if cursor.peek() == Some('n') {
        return Err(Error::ScriptParse(format!(
            "BigInt literals are not supported (at {start})"
        )));
    }
    ensure_number_boundary(cursor, start)?;

    let text = cursor.slice_from(start).replace('_', "");
    let text = if text.len() > 1
        && text.starts_with('0')
        && text.chars().all(|ch| ch.is_ascii_digit())
    {
        // Legacy octal-looking literals are read as decimal unless every digit is octal.
        if text.chars().all(|ch| ('0'..='7').contains(&ch)) {
            let value = text
                .chars()
                .filter_map(|ch| ch.to_digit(8))
                .fold(0f64, |acc, digit| acc * 8.0 + f64::from(digit));
            return Ok(value);
        }
        text.trim_start_matches('0').to_string()
    } else {
        text
    };
    text.parse::<f64>()
        .map_err(|_| Error::ScriptParse(format!("invalid number literal at {start}")))
}

fn ensure_number_boundary(cursor: &Cursor<'_>, start: usize) -> Result<()> {
    if cursor.peek().is_some_and(is_identifier_part) {
        return Err(Error::ScriptParse(format!(
            "identifier starts immediately after number literal at {start}"
        )));
    }
    Ok(())
}

fn read_regex(cursor: &mut Cursor<'_>) -> Result<TokenKind> {
    let start = cursor.pos();
    cursor.bump();
    let body_start = cursor.pos();
    let mut in_class = false;
    loop {
        let Some(ch) = cursor.peek() else {
            return Err(Error::ScriptParse(format!(
                "unterminated regular expression at {start}"
            )));
        };
        if is_line_terminator(ch) {
            return Err(Error::ScriptParse(format!(
                "unterminated regular expression at {start}"
            )));
        }
        match ch {
            '\\' => {
                cursor.bump();
                cursor.bump();
                continue;
            }
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => break,
            _ => {}
        }
        cursor.bump();
    }
    let pattern = cursor.slice_from(body_start).to_string();
    cursor.bump();
    let flags_start = cursor.pos();
    while cursor.peek().is_some_and(is_identifier_part) {
        cursor.bump();
    }
    let flags = cursor.slice_from(flags_start).to_string();
    Ok(TokenKind::Regex { pattern, flags })
}

fn read_template(cursor: &mut Cursor<'_>) -> Result<TokenKind> {
    let start = cursor.pos();
    cursor.bump();
    let mut quasis = Vec::new();
    let mut exprs = Vec::new();
    let mut current = String::new();

    loop {
        let Some(ch) = cursor.peek() else {
            return Err(Error::ScriptParse(format!(
                "unterminated template literal at {start}"
            )));
        };
        match ch {
            '`' => {
                cursor.bump();
                quasis.push(current);
                return Ok(TokenKind::Template { quasis, exprs });
            }
            '\\' => {
                cursor.bump();
                cursor.read_escape(&mut current)?;
            }
            '$' if cursor.peek_nth(1) == Some('{') => {
                cursor.bump();
                cursor.bump();
                quasis.push(std::mem::take(&mut current));
                exprs.push(read_template_expression(cursor)?);
            }
            '\r' => {
                // Template text normalizes CRLF and CR to LF.
                cursor.bump();
                cursor.consume_char('\n');
                current.push('\n');
            }
            _ => {
                cursor.bump();
                current.push(ch);
            }
        }
    }
}

/// Returns the raw source of a `${...}` substitution and consumes its `}`.
fn read_template_expression(cursor: &mut Cursor<'_>) -> Result<String> {
    let start = cursor.pos();
    let mut depth = 1usize;
    loop {
        let Some(ch) = cursor.peek() else {
            return Err(Error::ScriptParse(format!(
                "unterminated template substitution at {start}"
            )));
        };
        match ch {
            '{' => {
                depth += 1;
                cursor.bump();
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let source = cursor.slice_from(start).to_string();
                    cursor.bump();
                    return Ok(source);
                }
                cursor.bump();
            }
            '"' | '\'' => {
                cursor.parse_string_literal()?;
            }
            '`' => {
                read_template(cursor)?;
            }
            '/' if cursor.starts_with("//") || cursor.starts_with("/*") => {
                cursor.skip_ws_and_comments()?;
            }
            _ => {
                cursor.bump();
            }
        }
    }
}
