//! Safe literal parsing for values produced by a text-generation backend.
//!
//! Models are prompted to answer with Python-style literals: quoted strings,
//! bracketed lists, and the occasional dict. This module parses that subset
//! into a [`Literal`] tree without ever evaluating anything. Bare words other
//! than `True`, `False` and `None` are rejected.
//!
//! # Grammar
//!
//! - Strings: `'...'` or `"..."` with backslash escapes; adjacent strings
//!   concatenate (`"a" "b"` → `"ab"`)
//! - Numbers: integers and floats, optional sign, `_` separators
//! - Constants: `True`, `False`, `None`
//! - Containers: `[...]`, `(...)`, `{key: value}`; trailing commas allowed

use std::fmt;

use thiserror::Error;

/// A parsed literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
    Dict(Vec<(Literal, Literal)>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    /// Byte offset into the parsed input.
    pub offset: usize,
    pub message: String,
}

impl Literal {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Items of a list or tuple.
    pub fn as_seq(&self) -> Option<&[Literal]> {
        match self {
            Self::List(items) | Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Convert to a JSON value. Non-string dict keys are rendered with their
    /// literal representation.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::None => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Str(s) => Value::String(s.clone()),
            Self::List(items) | Self::Tuple(items) => {
                Value::Array(items.iter().map(Literal::to_json).collect())
            }
            Self::Dict(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Self::Str(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (key, v.to_json())
                    })
                    .collect(),
            ),
        }
    }
}

/// Renders the literal back into the same syntax [`parse_literal`] accepts.
/// Strings always use double quotes.
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write_quoted(f, s),
            Self::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Self::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Self::Dict(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Literal]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

/// Parse a complete literal. Trailing non-whitespace input is an error.
pub fn parse_literal(input: &str) -> Result<Literal, LiteralError> {
    let mut parser = Parser {
        src: input,
        pos: 0,
        depth: 0,
    };
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < input.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

// ── Internal ──

/// Nesting limit for lists, tuples and dicts.
const MAX_DEPTH: usize = 200;

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn value(&mut self) -> Result<Literal, LiteralError> {
        match self.peek() {
            None => Err(self.error("expected a value")),
            Some('"' | '\'') => self.strings(),
            Some(open @ ('[' | '(' | '{')) => {
                if self.depth >= MAX_DEPTH {
                    return Err(self.error("too deeply nested"));
                }
                self.depth += 1;
                self.bump();
                let value = self.container(open);
                self.depth -= 1;
                value
            }
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.name(),
            Some(c) => Err(self.error(format!("unexpected character `{c}`"))),
        }
    }

    /// Body of a list, tuple or dict whose opening bracket was consumed.
    fn container(&mut self, open: char) -> Result<Literal, LiteralError> {
        match open {
            '[' => {
                let (items, _) = self.items(']')?;
                Ok(Literal::List(items))
            }
            '(' => {
                let (mut items, trailing_comma) = self.items(')')?;
                // `(x)` is just a parenthesised value, `(x,)` is a tuple.
                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Literal::Tuple(items))
                }
            }
            _ => self.dict(),
        }
    }

    /// One or more adjacent string literals, concatenated.
    fn strings(&mut self) -> Result<Literal, LiteralError> {
        let mut out = self.string()?;
        loop {
            let save = self.pos;
            self.skip_ws();
            if matches!(self.peek(), Some('"' | '\'')) {
                out.push_str(&self.string()?);
            } else {
                self.pos = save;
                return Ok(Literal::Str(out));
            }
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let start = self.pos;
        let quote = self.bump().ok_or_else(|| self.error("expected a string"))?;
        let triple = self.src[self.pos..].starts_with(&format!("{quote}{quote}"));
        if triple {
            self.pos += 2;
        }

        let mut out = String::new();
        loop {
            let c = self.bump().ok_or_else(|| LiteralError {
                offset: start,
                message: "unterminated string".into(),
            })?;
            match c {
                c if c == quote => {
                    if !triple {
                        return Ok(out);
                    }
                    let close = format!("{quote}{quote}");
                    if self.src[self.pos..].starts_with(&close) {
                        self.pos += 2;
                        return Ok(out);
                    }
                    out.push(c);
                }
                '\n' if !triple => {
                    return Err(LiteralError {
                        offset: start,
                        message: "unterminated string".into(),
                    });
                }
                '\\' => self.escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let c = self
            .bump()
            .ok_or_else(|| self.error("unterminated escape sequence"))?;
        match c {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '0' => out.push('\0'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            'x' => out.push(self.hex_escape(2)?),
            'u' => out.push(self.hex_escape(4)?),
            'U' => out.push(self.hex_escape(8)?),
            // Unknown escapes keep the backslash.
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, digits: usize) -> Result<char, LiteralError> {
        let end = self.pos + digits;
        let hex = self
            .src
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated escape sequence"))?;
        let code =
            u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid hex escape"))?;
        let c = char::from_u32(code).ok_or_else(|| self.error("invalid code point"))?;
        self.pos = end;
        Ok(c)
    }

    fn number(&mut self) -> Result<Literal, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
            self.skip_ws();
        }
        let digits_start = self.pos;
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => {}
                '.' => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    self.bump();
                    if matches!(self.peek(), Some('-' | '+')) {
                        self.bump();
                    }
                    continue;
                }
                _ => break,
            }
            self.bump();
        }

        let sign = if self.src[start..digits_start].starts_with('-') {
            "-"
        } else {
            ""
        };
        let body: String = self.src[digits_start..self.pos]
            .chars()
            .filter(|&c| c != '_')
            .collect();
        if body.is_empty() || body == "." {
            return Err(LiteralError {
                offset: start,
                message: "expected a number".into(),
            });
        }
        let text = format!("{sign}{body}");

        let parsed = if is_float {
            text.parse::<f64>().map(Literal::Float).ok()
        } else {
            text.parse::<i64>().map(Literal::Int).ok()
        };
        parsed.ok_or_else(|| LiteralError {
            offset: start,
            message: format!("invalid number `{text}`"),
        })
    }

    fn name(&mut self) -> Result<Literal, LiteralError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            self.bump();
        }
        match &self.src[start..self.pos] {
            "True" => Ok(Literal::Bool(true)),
            "False" => Ok(Literal::Bool(false)),
            "None" => Ok(Literal::None),
            word => Err(LiteralError {
                offset: start,
                message: format!("`{word}` is not a literal"),
            }),
        }
    }

    /// Comma-separated values up to `close`. Returns the items and whether
    /// the last item was followed by a comma.
    fn items(&mut self, close: char) -> Result<(Vec<Literal>, bool), LiteralError> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok((items, trailing_comma));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => trailing_comma = true,
                Some(c) if c == close => return Ok((items, false)),
                Some(c) => {
                    self.pos -= c.len_utf8();
                    return Err(self.error(format!("expected `,` or `{close}`, found `{c}`")));
                }
                None => return Err(self.error(format!("expected `{close}`"))),
            }
        }
    }

    fn dict(&mut self) -> Result<Literal, LiteralError> {
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Literal::Dict(entries));
            }
            let key = self.value()?;
            self.skip_ws();
            if self.bump() != Some(':') {
                return Err(self.error("expected `:` after dict key"));
            }
            self.skip_ws();
            let value = self.value()?;
            entries.push((key, value));
            self.skip_ws();
            match self.bump() {
                Some(',') => {}
                Some('}') => return Ok(Literal::Dict(entries)),
                _ => return Err(self.error("expected `,` or `}` in dict")),
            }
        }
    }
}
