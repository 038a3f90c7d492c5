use crate::{Error, Result};

/// Byte-position scanner over script source.
#[derive(Debug)]
pub(super) struct Cursor<'a> {
    src: &'a str,
    i: usize,
}

impl<'a> Cursor<'a> {
    pub(super) fn new(src: &'a str) -> Self {
        Self { src, i: 0 }
    }

    pub(super) fn eof(&self) -> bool {
        self.i >= self.src.len()
    }

    pub(super) fn pos(&self) -> usize {
        self.i
    }

    pub(super) fn peek(&self) -> Option<char> {
        self.src.get(self.i..)?.chars().next()
    }

    pub(super) fn peek_nth(&self, n: usize) -> Option<char> {
        self.src.get(self.i..)?.chars().nth(n)
    }

    pub(super) fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.i += ch.len_utf8();
        Some(ch)
    }

    pub(super) fn consume_char(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.i += ch.len_utf8();
            true
        } else {
            false
        }
    }

    pub(super) fn consume_ascii(&mut self, token: &str) -> bool {
        if self.starts_with(token) {
            self.i += token.len();
            true
        } else {
            false
        }
    }

    pub(super) fn starts_with(&self, token: &str) -> bool {
        self.src
            .get(self.i..)
            .is_some_and(|rest| rest.starts_with(token))
    }

    pub(super) fn slice_from(&self, start: usize) -> &'a str {
        self.src.get(start..self.i).unwrap_or_default()
    }

    /// Skips whitespace and comments; reports whether a line break was crossed.
    pub(super) fn skip_ws_and_comments(&mut self) -> Result<bool> {
        let mut newline = false;
        loop {
            while let Some(ch) = self.peek() {
                if is_line_terminator(ch) {
                    newline = true;
                } else if !ch.is_whitespace() && ch != '\u{FEFF}' {
                    break;
                }
                self.bump();
            }
            if self.consume_ascii("//") {
                while let Some(ch) = self.peek() {
                    if is_line_terminator(ch) {
                        break;
                    }
                    self.bump();
                }
                continue;
            }
            if self.consume_ascii("/*") {
                let start = self.i;
                loop {
                    if self.eof() {
                        return Err(Error::ScriptParse(format!(
                            "unterminated comment starting at {start}"
                        )));
                    }
                    if self.consume_ascii("*/") {
                        break;
                    }
                    if self.bump().is_some_and(is_line_terminator) {
                        newline = true;
                    }
                }
                continue;
            }
            // `<!--` and `-->` at line start are HTML-like comments in classic scripts.
            if self.starts_with("<!--") || ((newline || self.i == 0) && self.starts_with("-->")) {
                while let Some(ch) = self.peek() {
                    if is_line_terminator(ch) {
                        break;
                    }
                    self.bump();
                }
                continue;
            }
            break;
        }
        Ok(newline)
    }

    pub(super) fn parse_identifier(&mut self) -> Option<String> {
        let start = self.i;
        let first = self.peek()?;
        if !is_identifier_start(first) {
            return None;
        }
        self.bump();
        while let Some(ch) = self.peek() {
            if is_identifier_part(ch) {
                self.bump();
            } else {
                break;
            }
        }
        Some(self.slice_from(start).to_string())
    }

    pub(super) fn parse_string_literal(&mut self) -> Result<String> {
        let start = self.i;
        let quote = self
            .bump()
            .ok_or_else(|| Error::ScriptParse("expected string literal".into()))?;
        let mut raw_start = self.i;
        let mut out = String::new();
        loop {
            let Some(ch) = self.peek() else {
                return Err(Error::ScriptParse(format!(
                    "unterminated string literal at {start}"
                )));
            };
            if ch == quote {
                out.push_str(self.slice_from(raw_start));
                self.bump();
                return Ok(out);
            }
            if ch == '\n' || ch == '\r' {
                return Err(Error::ScriptParse(format!(
                    "unterminated string literal at {start}"
                )));
            }
            if ch == '\\' {
                out.push_str(self.slice_from(raw_start));
                self.bump();
                self.read_escape(&mut out)?;
                raw_start = self.i;
                continue;
            }
            self.bump();
        }
    }

    /// Reads one escape sequence (after the backslash) into `out`.
    pub(super) fn read_escape(&mut self, out: &mut String) -> Result<()> {
        let Some(ch) = self.bump() else {
            return Err(Error::ScriptParse("unterminated escape sequence".into()));
        };
        match ch {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            'v' => out.push('\u{000B}'),
            '0' if !self.peek().is_some_and(|next| next.is_ascii_digit()) => out.push('\0'),
            'x' => {
                let code = self.read_hex_digits(2)?;
                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
            'u' => {
                let code = self.read_unicode_escape()?;
                if (0xD800..0xDC00).contains(&code) && self.starts_with("\\u") {
                    let save = self.i;
                    self.i += 2;
                    let low = self.read_unicode_escape()?;
                    if (0xDC00..0xE000).contains(&low) {
                        let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                        out.push(char::from_u32(combined).unwrap_or('\u{FFFD}'));
                        return Ok(());
                    }
                    self.i = save;
                }
                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
            '\r' => {
                self.consume_char('\n');
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => out.push(other),
        }
        Ok(())
    }

    fn read_unicode_escape(&mut self) -> Result<u32> {
        if self.consume_char('{') {
            let start = self.i;
            while self.peek().is_some_and(|ch| ch.is_ascii_hexdigit()) {
                self.bump();
            }
            let digits = self.slice_from(start);
            if !self.consume_char('}') || digits.is_empty() {
                return Err(Error::ScriptParse("invalid unicode escape".into()));
            }
            return u32::from_str_radix(digits, 16)
                .map_err(|_| Error::ScriptParse("invalid unicode escape".into()));
        }
        self.read_hex_digits(4)
    }

    fn read_hex_digits(&mut self, count: usize) -> Result<u32> {
        let start = self.i;
        for _ in 0..count {
            match self.peek() {
                Some(ch) if ch.is_ascii_hexdigit() => {
                    self.bump();
                }
                _ => return Err(Error::ScriptParse(format!("invalid escape at {start}"))),
            }
        }
        u32::from_str_radix(self.slice_from(start), 16)
            .map_err(|_| Error::ScriptParse(format!("invalid escape at {start}")))
    }
}

pub(super) fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

pub(super) fn is_identifier_start(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphabetic()
}

pub(super) fn is_identifier_part(ch: char) -> bool {
    is_identifier_start(ch) || ch.is_alphanumeric() || ch == '\u{200C}' || ch == '\u{200D}'
}
