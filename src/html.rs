use std::collections::HashMap;

use crate::dom::{Dom, NodeId, is_void_tag};

/// Parses a document or fragment into a fresh tree.
///
/// Parsing never fails: malformed markup degrades to text or is dropped, the
/// way a browser would recover from it.
pub(crate) fn parse_html(html: &str) -> Dom {
    let mut dom = Dom::new();
    let mut stack = vec![dom.root];
    let bytes = html.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if starts_with_at(bytes, i, b"<!--") {
            i = find_subslice(bytes, i + 4, b"-->").map_or(bytes.len(), |end| end + 3);
            continue;
        }

        if bytes[i] == b'<' {
            if starts_with_at(bytes, i, b"</") {
                match parse_end_tag(html, i) {
                    Some((tag, next)) => {
                        i = next;
                        close_open_element(&dom, &mut stack, &tag);
                    }
                    None => i = push_text(&mut dom, &stack, html, i),
                }
                continue;
            }

            if starts_with_at(bytes, i, b"<!") || starts_with_at(bytes, i, b"<?") {
                i = skip_declaration(bytes, i);
                continue;
            }

            if !bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
                i = push_text(&mut dom, &stack, html, i);
                continue;
            }

            let Some(StartTag {
                tag,
                attrs,
                self_closing,
                next,
            }) = parse_start_tag(html, i)
            else {
                // A start tag cut off by the end of input is dropped.
                break;
            };
            i = next;

            close_optional_start_tags(&dom, &mut stack, &tag);
            let parent = stack.last().copied().unwrap_or(dom.root);
            let node = dom.create_element(parent, tag.clone(), attrs);

            if let Some(kind) = text_only_kind(&tag) {
                if self_closing {
                    continue;
                }
                let close = find_case_insensitive_raw_end_tag(bytes, i, tag.as_bytes())
                    .unwrap_or(bytes.len());
                if let Some(body) = html.get(i..close) {
                    let body = match kind {
                        TextOnly::Raw => body.to_string(),
                        TextOnly::Escapable => decode_html_character_references(body),
                    };
                    if !body.is_empty() {
                        dom.create_text(node, body);
                    }
                }
                i = parse_end_tag(html, close).map_or(bytes.len(), |(_, after)| after);
                continue;
            }

            if !self_closing && !is_void_tag(&tag) {
                stack.push(node);
            }
            continue;
        }

        i = push_text(&mut dom, &stack, html, i);
    }

    dom
}

struct StartTag {
    tag: String,
    attrs: HashMap<String, String>,
    self_closing: bool,
    next: usize,
}

#[derive(Debug, Clone, Copy)]
enum TextOnly {
    Raw,
    Escapable,
}

fn text_only_kind(tag: &str) -> Option<TextOnly> {
    match tag {
        "script" | "style" | "noscript" => Some(TextOnly::Raw),
        "title" | "textarea" => Some(TextOnly::Escapable),
        _ => None,
    }
}

/// Appends text starting at `start` up to the next `<` (a literal `<` at
/// `start` is kept) and returns the position after it.
fn push_text(dom: &mut Dom, stack: &[NodeId], html: &str, start: usize) -> usize {
    let bytes = html.as_bytes();
    let mut end = start + 1;
    while end < bytes.len() && bytes[end] != b'<' {
        end += 1;
    }
    let Some(text) = html.get(start..end) else {
        return end;
    };

    let parent = stack.last().copied().unwrap_or(dom.root);
    let mut decoded = decode_html_character_references(text);
    if should_strip_initial_pre_newline(dom, parent) {
        decoded = strip_initial_pre_newline(&decoded);
    }
    if decoded.is_empty() {
        return end;
    }

    // Adjacent runs (split by a literal `<`) merge into one text node.
    if let Some(last) = dom.children(parent).last().copied() {
        if let Some(existing) = dom.text_mut(last) {
            existing.push_str(&decoded);
            return end;
        }
    }
    dom.create_text(parent, decoded);
    end
}

/// Pops up to and including the innermost open element named `tag`; an end
/// tag with no open counterpart is ignored.
fn close_open_element(dom: &Dom, stack: &mut Vec<NodeId>, tag: &str) {
    let position = (1..stack.len()).rev().find(|index| {
        dom.tag_name(stack[*index])
            .is_some_and(|open| open.eq_ignore_ascii_case(tag))
    });
    if let Some(index) = position {
        stack.truncate(index);
    }
}

fn close_optional_start_tags(dom: &Dom, stack: &mut Vec<NodeId>, tag: &str) {
    let (closes, boundaries): (&[&str], &[&str]) = match tag {
        "li" => (&["li"], &["ol", "ul", "menu"]),
        "dt" | "dd" => (&["dt", "dd"], &["dl"]),
        "option" => (&["option"], &["optgroup", "select", "datalist"]),
        "optgroup" => (&["option", "optgroup"], &["select"]),
        _ if is_optional_paragraph_terminator_tag(tag) => (&["p"], &[]),
        _ => return,
    };
    close_innermost_within(dom, stack, closes, boundaries);
}

fn close_innermost_within(
    dom: &Dom,
    stack: &mut Vec<NodeId>,
    closes: &[&str],
    boundaries: &[&str],
) {
    for index in (1..stack.len()).rev() {
        let Some(open_tag) = dom.tag_name(stack[index]) else {
            continue;
        };
        if closes.contains(&open_tag) {
            stack.truncate(index);
            return;
        }
        if boundaries.contains(&open_tag) {
            return;
        }
    }
}

fn is_optional_paragraph_terminator_tag(tag: &str) -> bool {
    matches!(
        tag,
        "address"
            | "article"
            | "aside"
            | "blockquote"
            | "details"
            | "div"
            | "dl"
            | "fieldset"
            | "figcaption"
            | "figure"
            | "footer"
            | "form"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "header"
            | "hgroup"
            | "hr"
            | "main"
            | "menu"
            | "nav"
            | "ol"
            | "p"
            | "pre"
            | "section"
            | "table"
            | "ul"
    )
}

fn should_strip_initial_pre_newline(dom: &Dom, parent: NodeId) -> bool {
    dom.tag_name(parent).is_some_and(|tag| tag == "pre") && dom.children(parent).is_empty()
}

fn strip_initial_pre_newline(text: &str) -> String {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .or_else(|| text.strip_prefix('\r'))
        .unwrap_or(text)
        .to_string()
}

fn parse_start_tag(html: &str, at: usize) -> Option<StartTag> {
    let bytes = html.as_bytes();
    let mut i = at + 1;

    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = html.get(tag_start..i)?.to_ascii_lowercase();
    if tag.is_empty() {
        return None;
    }

    let mut attrs = HashMap::new();
    let mut self_closing = false;

    loop {
        skip_ws(bytes, &mut i);
        if i >= bytes.len() {
            return None;
        }

        if bytes[i] == b'>' {
            i += 1;
            break;
        }

        if bytes[i] == b'/' {
            if bytes.get(i + 1) == Some(&b'>') {
                self_closing = true;
                i += 2;
                break;
            }
            i += 1;
            continue;
        }

        if !is_attr_name_char(bytes[i]) {
            // Junk inside a tag (e.g. href=""/en/"tools/") is skipped.
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && bytes[i] != b'>'
                && !(bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'>'))
            {
                i += 1;
            }
            continue;
        }

        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }
        let name = html.get(name_start..i)?.to_ascii_lowercase();

        skip_ws(bytes, &mut i);
        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            skip_ws(bytes, &mut i);
            parse_attr_value(html, &mut i)?
        } else {
            String::new()
        };

        attrs.entry(name).or_insert(value);
    }

    Some(StartTag {
        tag,
        attrs,
        self_closing,
        next: i,
    })
}

fn parse_attr_value(html: &str, i: &mut usize) -> Option<String> {
    let bytes = html.as_bytes();
    if *i >= bytes.len() {
        return None;
    }

    if bytes[*i] == b'\'' || bytes[*i] == b'"' {
        let quote = bytes[*i];
        *i += 1;
        let start = *i;
        while *i < bytes.len() && bytes[*i] != quote {
            *i += 1;
        }
        if *i >= bytes.len() {
            return None;
        }
        let value = html.get(start..*i)?;
        *i += 1;
        return Some(decode_html_character_references(value));
    }

    let start = *i;
    while *i < bytes.len()
        && !bytes[*i].is_ascii_whitespace()
        && bytes[*i] != b'>'
        && !(bytes[*i] == b'/' && bytes.get(*i + 1) == Some(&b'>'))
    {
        *i += 1;
    }
    html.get(start..*i).map(decode_html_character_references)
}

fn parse_end_tag(html: &str, at: usize) -> Option<(String, usize)> {
    let bytes = html.as_bytes();
    if !starts_with_at(bytes, at, b"</") {
        return None;
    }
    let mut i = at + 2;
    skip_ws(bytes, &mut i);

    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = html.get(tag_start..i)?.to_ascii_lowercase();
    if tag.is_empty() {
        return None;
    }

    while i < bytes.len() && bytes[i] != b'>' {
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }
    Some((tag, i + 1))
}

/// Skips `<!doctype ...>`, `<![CDATA[...]]>` style and `<?...>` constructs.
fn skip_declaration(bytes: &[u8], at: usize) -> usize {
    let mut i = at + 2;
    let mut quote: Option<u8> = None;
    let mut bracket_depth = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'[' => bracket_depth += 1,
            b']' if bracket_depth > 0 => bracket_depth -= 1,
            b'>' if bracket_depth == 0 => return i + 1,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn is_attr_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.' | b'@')
}

fn starts_with_at(bytes: &[u8], at: usize, needle: &[u8]) -> bool {
    bytes
        .get(at..at + needle.len())
        .is_some_and(|window| window == needle)
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || from > bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn find_case_insensitive_raw_end_tag(bytes: &[u8], from: usize, tag: &[u8]) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'<' && bytes.get(i + 1) == Some(&b'/') {
            let mut j = i + 2;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            let tag_end = j + tag.len();
            if tag_end <= bytes.len()
                && bytes[j..tag_end].eq_ignore_ascii_case(tag)
                && bytes.get(tag_end).is_none_or(|b| !b.is_ascii_alphanumeric())
            {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

pub(crate) fn decode_html_character_references(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }

    let mut out = String::with_capacity(src.len());
    let mut rest = src;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let token_len = tail
            .char_indices()
            .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || *ch == '#'))
            .map_or(tail.len(), |(idx, _)| idx);
        let token = &tail[..token_len];
        let has_semicolon = tail[token_len..].starts_with(';');

        let decoded = match token.strip_prefix('#') {
            Some(numeric) => decode_numeric(numeric),
            None => decode_named(token),
        };

        match decoded {
            Some(ch) if !token.is_empty() => {
                out.push(ch);
                let consumed = token_len + usize::from(has_semicolon);
                rest = &tail[consumed..];
            }
            _ => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_numeric(value: &str) -> Option<char> {
    let codepoint = match value.strip_prefix('x').or_else(|| value.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => value.parse::<u32>().ok()?,
    };
    match codepoint {
        0 => Some('\u{FFFD}'),
        _ => char::from_u32(codepoint).or(Some('\u{FFFD}')),
    }
}

fn decode_named(value: &str) -> Option<char> {
    let ch = match value {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "ensp" => '\u{2002}',
        "emsp" => '\u{2003}',
        "thinsp" => '\u{2009}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "euro" => '€',
        "pound" => '£',
        "yen" => '¥',
        "cent" => '¢',
        "sect" => '§',
        "laquo" => '«',
        "raquo" => '»',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "hellip" => '…',
        "middot" => '·',
        "bull" => '•',
        "frac14" => '¼',
        "frac12" => '½',
        "frac34" => '¾',
        "times" => '×',
        "divide" => '÷',
        "not" => '¬',
        "deg" => '°',
        "plusmn" => '±',
        "larr" => '←',
        "rarr" => '→',
        "uarr" => '↑',
        "darr" => '↓',
        _ => return None,
    };
    Some(ch)
}
