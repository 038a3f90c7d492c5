use std::fmt;

/// Regular expression backed by `fancy_regex`, compiled from script syntax.
#[derive(Debug, Clone)]
pub(crate) struct Regex {
    backend: fancy_regex::Regex,
}

impl Regex {
    /// Compiles a script pattern with its flag string (`gimsuy`).
    pub(crate) fn compile(pattern: &str, flags: &str) -> Result<Self, RegexError> {
        for flag in flags.chars() {
            if !"dgimsuy".contains(flag) || flags.matches(flag).count() > 1 {
                return Err(RegexError {
                    message: format!("Invalid flags supplied to RegExp constructor '{flags}'"),
                });
            }
        }
        RegexBuilder::new(&translate_pattern(pattern))
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .build()
    }

    /// Finds the first match at or after byte offset `start`.
    pub(crate) fn captures_from_pos(
        &self,
        input: &str,
        start: usize,
    ) -> Result<Option<Captures>, RegexError> {
        if start > input.len() {
            return Ok(None);
        }
        let captures = self
            .backend
            .captures_from_pos(input, start)
            .map_err(RegexError::from)?;
        Ok(captures.as_ref().map(Captures::from_backend))
    }

    /// Every non-overlapping match, advancing past empty matches.
    pub(crate) fn captures_all(&self, input: &str) -> Result<Vec<Captures>, RegexError> {
        let mut out = Vec::new();
        let mut pos = 0;
        while let Some(captures) = self.captures_from_pos(input, pos)? {
            let Some(whole) = captures.get(0) else {
                break;
            };
            pos = if whole.end() == whole.start() {
                next_char_boundary(input, whole.end())
            } else {
                whole.end()
            };
            out.push(captures);
            if pos > input.len() {
                break;
            }
        }
        Ok(out)
    }

    /// Group names by index; unnamed groups are `None`.
    pub(crate) fn group_names(&self) -> Vec<Option<String>> {
        self.backend
            .capture_names()
            .map(|name| name.map(str::to_string))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RegexBuilder {
    pattern: String,
    case_insensitive: bool,
    multi_line: bool,
    dot_matches_new_line: bool,
}

impl RegexBuilder {
    pub(crate) fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            case_insensitive: false,
            multi_line: false,
            dot_matches_new_line: false,
        }
    }

    pub(crate) fn case_insensitive(&mut self, enabled: bool) -> &mut Self {
        self.case_insensitive = enabled;
        self
    }

    pub(crate) fn multi_line(&mut self, enabled: bool) -> &mut Self {
        self.multi_line = enabled;
        self
    }

    pub(crate) fn dot_matches_new_line(&mut self, enabled: bool) -> &mut Self {
        self.dot_matches_new_line = enabled;
        self
    }

    pub(crate) fn build(&self) -> Result<Regex, RegexError> {
        let mut builder = fancy_regex::RegexBuilder::new(&self.pattern);
        builder.case_insensitive(self.case_insensitive);
        builder.multi_line(self.multi_line);
        builder.dot_matches_new_line(self.dot_matches_new_line);
        let backend = builder.build().map_err(RegexError::from)?;
        Ok(Regex { backend })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Captures {
    groups: Vec<Option<Match>>,
}

impl Captures {
    fn from_backend(captures: &fancy_regex::Captures<'_>) -> Self {
        let groups = (0..captures.len())
            .map(|idx| captures.get(idx).map(Match::from_backend))
            .collect();
        Self { groups }
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Match> {
        self.groups.get(index).and_then(Option::as_ref)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Match {
    start: usize,
    end: usize,
    text: String,
}

impl Match {
    fn from_backend(matched: fancy_regex::Match<'_>) -> Self {
        Self {
            start: matched.start(),
            end: matched.end(),
            text: matched.as_str().to_string(),
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        self.text.as_str()
    }

    pub(crate) fn start(&self) -> usize {
        self.start
    }

    pub(crate) fn end(&self) -> usize {
        self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegexError {
    message: String,
}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RegexError {}

impl From<fancy_regex::Error> for RegexError {
    fn from(value: fancy_regex::Error) -> Self {
        Self {
            message: value.to_string(),
        }
    }
}

fn next_char_boundary(input: &str, pos: usize) -> usize {
    input
        .get(pos..)
        .and_then(|rest| rest.chars().next())
        .map_or(pos + 1, |ch| pos + ch.len_utf8())
}

/// Rewrites script-only regex syntax into the backend dialect.
fn translate_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                // `\/` is needed inside literals only.
                Some('/') => out.push('/'),
                Some('d') if !in_class => out.push_str("[0-9]"),
                Some('d') => out.push_str("0-9"),
                Some('D') if !in_class => out.push_str("[^0-9]"),
                Some('c') => match chars.next() {
                    Some(letter) if letter.is_ascii_alphabetic() => {
                        out.push_str(&format!("\\x{:02X}", (letter as u8) % 32));
                    }
                    Some(other) => {
                        out.push_str("\\\\c");
                        out.push(other);
                    }
                    None => out.push_str("\\\\c"),
                },
                Some(escaped) => {
                    out.push('\\');
                    out.push(escaped);
                }
                None => out.push_str("\\\\"),
            },
            '[' if !in_class => {
                if chars.peek() == Some(&'^') {
                    chars.next();
                    if chars.peek() == Some(&']') {
                        // `[^]` matches any character.
                        chars.next();
                        out.push_str("[\\s\\S]");
                        continue;
                    }
                    out.push_str("[^");
                } else if chars.peek() == Some(&']') {
                    // `[]` never matches.
                    chars.next();
                    out.push_str("[^\\s\\S]");
                    continue;
                } else {
                    out.push('[');
                }
                in_class = true;
            }
            '[' => out.push_str("\\["),
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_script_only_syntax() {
        assert_eq!(translate_pattern(r"a\/b"), "a/b");
        assert_eq!(translate_pattern(r"[^]"), r"[\s\S]");
        assert_eq!(translate_pattern(r"\d+"), "[0-9]+");
        assert_eq!(translate_pattern(r"[\d_]"), "[0-9_]");
    }

    #[test]
    fn compile_honors_flags() -> Result<(), RegexError> {
        let regex = Regex::compile("^b", "im")?;
        let found = regex.captures_from_pos("a\nB", 0)?;
        assert_eq!(found.and_then(|c| c.get(0).map(Match::start)), Some(2));
        assert!(Regex::compile("a", "gg").is_err());
        Ok(())
    }

    #[test]
    fn captures_all_advances_past_empty_matches() -> Result<(), RegexError> {
        let regex = Regex::compile("x*", "g")?;
        assert_eq!(regex.captures_all("ab")?.len(), 3);
        Ok(())
    }
}
