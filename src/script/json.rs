use super::builtins::arg;
use super::interpreter::Interpreter;
use super::value::{JsResult, ObjectKind, ObjectRef, Value, format_number};

struct Stringifier {
    replacer: Option<Value>,
    allow_list: Option<Vec<String>>,
    indent: String,
    stack: Vec<usize>,
}

pub(crate) fn json_stringify(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let replacer_arg = arg(args, 1);
    let mut replacer = None;
    let mut allow_list = None;
    if replacer_arg.is_callable() {
        replacer = Some(replacer_arg);
    } else if let Some(keys) = replacer_arg.as_object().and_then(ObjectRef::array_elements) {
        let mut names = Vec::new();
        for key in keys {
            if matches!(key, Value::String(_) | Value::Number(_)) {
                let name = interp.to_js_string(&key)?;
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        allow_list = Some(names);
    }

    let indent = match arg(args, 2) {
        Value::Number(width) => " ".repeat(width.clamp(0.0, 10.0) as usize),
        Value::String(text) => text.chars().take(10).collect(),
        _ => String::new(),
    };

    let mut stringifier = Stringifier {
        replacer,
        allow_list,
        indent,
        stack: Vec::new(),
    };
    let holder = Value::Object(interp.new_object());
    let value = arg(args, 0);
    if let Value::Object(object) = &holder {
        object.set_data("", value.clone());
    }
    let out = stringifier.serialize_property(interp, &holder, "", value, "")?;
    Ok(out.map_or(Value::Undefined, Value::String))
}

impl Stringifier {
    fn serialize_property(
        &mut self,
        interp: &mut Interpreter,
        holder: &Value,
        key: &str,
        value: Value,
        gap: &str,
    ) -> JsResult<Option<String>> {
        let mut value = value;
        if let Value::Object(_) = &value {
            let to_json = interp.get_property(&value, "toJSON")?;
            if to_json.is_callable() {
                value = interp.call_function(&to_json, value, vec![Value::from(key)])?;
            }
        }
        if let Some(replacer) = self.replacer.clone() {
            value = interp.call_function(&replacer, holder.clone(), vec![Value::from(key), value])?;
        }

        match &value {
            Value::Null => Ok(Some("null".to_string())),
            Value::Bool(flag) => Ok(Some(flag.to_string())),
            Value::Number(number) if number.is_finite() => Ok(Some(format_number(*number))),
            Value::Number(_) => Ok(Some("null".to_string())),
            Value::String(text) => Ok(Some(quote(text))),
            Value::Undefined => Ok(None),
            Value::Object(object) => {
                if object.is_callable() {
                    return Ok(None);
                }
                let identity = object.identity();
                if self.stack.contains(&identity) {
                    return Err(interp.type_error("Converting circular structure to JSON"));
                }
                self.stack.push(identity);
                let inner_gap = format!("{gap}{}", self.indent);
                let result = if object.is_array() {
                    self.serialize_array(interp, &value, object, gap, &inner_gap)
                } else {
                    self.serialize_object(interp, &value, gap, &inner_gap)
                };
                self.stack.pop();
                result.map(Some)
            }
        }
    }

    fn serialize_array(
        &mut self,
        interp: &mut Interpreter,
        holder: &Value,
        array: &ObjectRef,
        gap: &str,
        inner_gap: &str,
    ) -> JsResult<String> {
        let elements = array.array_elements().unwrap_or_default();
        if elements.is_empty() {
            return Ok("[]".to_string());
        }
        let mut items = Vec::with_capacity(elements.len());
        for (index, element) in elements.into_iter().enumerate() {
            let serialized = self
                .serialize_property(interp, holder, &index.to_string(), element, inner_gap)?
                .unwrap_or_else(|| "null".to_string());
            items.push(serialized);
        }
        Ok(self.wrap('[', ']', items, gap, inner_gap))
    }

    fn serialize_object(
        &mut self,
        interp: &mut Interpreter,
        holder: &Value,
        gap: &str,
        inner_gap: &str,
    ) -> JsResult<String> {
        let entries = match &self.allow_list {
            Some(keys) => {
                let keys = keys.clone();
                let mut entries = Vec::with_capacity(keys.len());
                for key in keys {
                    let value = interp.get_property(holder, &key)?;
                    entries.push((key, value));
                }
                entries
            }
            None => interp.own_enumerable_entries(holder)?,
        };
        let separator = if self.indent.is_empty() { ":" } else { ": " };
        let mut items = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            if let Some(serialized) = self.serialize_property(interp, holder, &key, value, inner_gap)? {
                items.push(format!("{}{separator}{serialized}", quote(&key)));
            }
        }
        if items.is_empty() {
            return Ok("{}".to_string());
        }
        Ok(self.wrap('{', '}', items, gap, inner_gap))
    }

    fn wrap(&self, open: char, close: char, items: Vec<String>, gap: &str, inner_gap: &str) -> String {
        if self.indent.is_empty() {
            return format!("{open}{}{close}", items.join(","));
        }
        let separator = format!(",\n{inner_gap}");
        format!("{open}\n{inner_gap}{}\n{gap}{close}", items.join(&separator))
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c <= '\u{001F}' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub(crate) fn json_parse(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = interp.to_js_string(&arg(args, 0))?;
    let mut parser = JsonParser {
        bytes: text.as_bytes(),
        src: &text,
        pos: 0,
    };
    let parsed = parser
        .parse_document(interp)
        .map_err(|message| interp.syntax_error(format!("JSON.parse invalid JSON: {message}")))?;

    let reviver = arg(args, 1);
    if !reviver.is_callable() {
        return Ok(parsed);
    }
    let root = Value::Object(interp.new_object());
    if let Value::Object(object) = &root {
        object.set_data("", parsed);
    }
    internalize(interp, &reviver, &root, "")
}

fn internalize(interp: &mut Interpreter, reviver: &Value, holder: &Value, key: &str) -> JsResult<Value> {
    let value = interp.get_property(holder, key)?;
    if let Value::Object(object) = &value {
        let keys = match object.array_elements() {
            Some(elements) => (0..elements.len()).map(|index| index.to_string()).collect(),
            None => interp.own_keys(&value),
        };
        for child in keys {
            let revived = internalize(interp, reviver, &value, &child)?;
            if matches!(revived, Value::Undefined) && !object.is_array() {
                object.borrow_mut().properties.remove(&child);
            } else {
                interp.set_property(&value, &child, revived)?;
            }
        }
    }
    interp.call_function(reviver, holder.clone(), vec![Value::from(key), value])
}

struct JsonParser<'a> {
    bytes: &'a [u8],
    src: &'a str,
    pos: usize,
}

type ParseResult<T> = std::result::Result<T, String>;

impl JsonParser<'_> {
    fn parse_document(&mut self, interp: &Interpreter) -> ParseResult<Value> {
        self.skip_ws();
        let value = self.parse_value(interp, 0)?;
        self.skip_ws();
        if self.pos < self.bytes.len() {
            return Err(format!("unexpected trailing input at {}", self.pos));
        }
        Ok(value)
    }

    fn skip_ws(&mut self) {
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
        {
            self.pos += 1;
        }
    }

    fn consume(&mut self, byte: u8) -> bool {
        if self.bytes.get(self.pos) == Some(&byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn consume_literal(&mut self, literal: &str) -> bool {
        if self.src[self.pos..].starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    fn parse_value(&mut self, interp: &Interpreter, depth: usize) -> ParseResult<Value> {
        if depth > 512 {
            return Err("nesting too deep".to_string());
        }
        match self.bytes.get(self.pos) {
            None => Err("unexpected end of input".to_string()),
            Some(b'{') => self.parse_object(interp, depth),
            Some(b'[') => self.parse_array(interp, depth),
            Some(b'"') => self.parse_string().map(Value::String),
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            Some(_) if self.consume_literal("true") => Ok(Value::Bool(true)),
            Some(_) if self.consume_literal("false") => Ok(Value::Bool(false)),
            Some(_) if self.consume_literal("null") => Ok(Value::Null),
            Some(_) => Err(format!("unexpected token at {}", self.pos)),
        }
    }

    fn parse_object(&mut self, interp: &Interpreter, depth: usize) -> ParseResult<Value> {
        self.pos += 1;
        let object = interp.new_object();
        self.skip_ws();
        if self.consume(b'}') {
            return Ok(Value::Object(object));
        }
        loop {
            self.skip_ws();
            if self.bytes.get(self.pos) != Some(&b'"') {
                return Err(format!("expected property name at {}", self.pos));
            }
            let key = self.parse_string()?;
            self.skip_ws();
            if !self.consume(b':') {
                return Err(format!("expected ':' at {}", self.pos));
            }
            self.skip_ws();
            let value = self.parse_value(interp, depth + 1)?;
            object.set_data(&key, value);
            self.skip_ws();
            if self.consume(b',') {
                continue;
            }
            if self.consume(b'}') {
                return Ok(Value::Object(object));
            }
            return Err(format!("expected ',' or '}}' at {}", self.pos));
        }
    }

    fn parse_array(&mut self, interp: &Interpreter, depth: usize) -> ParseResult<Value> {
        self.pos += 1;
        let mut elements = Vec::new();
        self.skip_ws();
        if self.consume(b']') {
            return Ok(interp.new_array(elements));
        }
        loop {
            self.skip_ws();
            elements.push(self.parse_value(interp, depth + 1)?);
            self.skip_ws();
            if self.consume(b',') {
                continue;
            }
            if self.consume(b']') {
                return Ok(interp.new_array(elements));
            }
            return Err(format!("expected ',' or ']' at {}", self.pos));
        }
    }

    fn parse_number(&mut self) -> ParseResult<Value> {
        let start = self.pos;
        self.consume(b'-');
        match self.bytes.get(self.pos) {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => self.skip_digits(),
            _ => return Err(format!("invalid number at {start}")),
        }
        if self.consume(b'.') {
            if !self.bytes.get(self.pos).is_some_and(u8::is_ascii_digit) {
                return Err(format!("invalid number at {start}"));
            }
            self.skip_digits();
        }
        if self.consume(b'e') || self.consume(b'E') {
            if !self.consume(b'+') {
                self.consume(b'-');
            }
            if !self.bytes.get(self.pos).is_some_and(u8::is_ascii_digit) {
                return Err(format!("invalid number at {start}"));
            }
            self.skip_digits();
        }
        self.src[start..self.pos]
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| format!("invalid number at {start}"))
    }

    fn skip_digits(&mut self) {
        while self.bytes.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }
    }

    fn parse_string(&mut self) -> ParseResult<String> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(ch) = self.src[self.pos..].chars().next() else {
                return Err("unterminated string".to_string());
            };
            self.pos += ch.len_utf8();
            match ch {
                '"' => return Ok(out),
                '\\' => {
                    let Some(escape) = self.bytes.get(self.pos).copied() else {
                        return Err("unterminated string".to_string());
                    };
                    self.pos += 1;
                    match escape {
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        b'/' => out.push('/'),
                        b'b' => out.push('\u{0008}'),
                        b'f' => out.push('\u{000C}'),
                        b'n' => out.push('\n'),
                        b'r' => out.push('\r'),
                        b't' => out.push('\t'),
                        b'u' => out.push(self.parse_unicode_escape()?),
                        _ => return Err(format!("invalid escape at {}", self.pos - 1)),
                    }
                }
                c if c < '\u{0020}' => {
                    return Err(format!("control character in string at {}", self.pos - 1));
                }
                c => out.push(c),
            }
        }
    }

    fn parse_hex4(&mut self) -> ParseResult<u16> {
        let digits = self
            .src
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| "truncated unicode escape".to_string())?;
        let unit = u16::from_str_radix(digits, 16)
            .map_err(|_| format!("invalid unicode escape at {}", self.pos))?;
        self.pos += 4;
        Ok(unit)
    }

    fn parse_unicode_escape(&mut self) -> ParseResult<char> {
        let first = self.parse_hex4()?;
        if (0xD800..0xDC00).contains(&first) && self.src[self.pos..].starts_with("\\u") {
            let saved = self.pos;
            self.pos += 2;
            let second = self.parse_hex4()?;
            if (0xDC00..0xE000).contains(&second) {
                let code = 0x10000 + ((u32::from(first) - 0xD800) << 10) + (u32::from(second) - 0xDC00);
                return Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            self.pos = saved;
        }
        Ok(char::from_u32(u32::from(first)).unwrap_or(char::REPLACEMENT_CHARACTER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_controls_in_lowercase_hex() {
        assert_eq!(quote("a\"b\\\n\u{1}"), "\"a\\\"b\\\\\\n\\u0001\"");
    }

    #[test]
    fn parser_rejects_trailing_commas_and_leading_zeros() {
        let interp = Interpreter::new();
        for bad in ["[1,]", "{\"a\":1,}", "01", "1.", "-", "\"\\x\""] {
            let mut parser = JsonParser {
                bytes: bad.as_bytes(),
                src: bad,
                pos: 0,
            };
            assert!(parser.parse_document(&interp).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn parser_joins_surrogate_pairs() -> ParseResult<()> {
        let src = "\"\\ud83d\\ude00\"";
        let mut parser = JsonParser {
            bytes: src.as_bytes(),
            src,
            pos: 0,
        };
        let interp = Interpreter::new();
        match parser.parse_document(&interp)? {
            Value::String(text) => assert_eq!(text, "\u{1F600}"),
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }
}
