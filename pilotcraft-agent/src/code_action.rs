//! Code-action parsing
//!
//! Some models answer with a `<code>` block of Python-style calls instead of
//! structured tool calls. This module understands the small subset those
//! blocks actually use: one call per line, literal arguments, optionally
//! wrapped in `print(...)` or assigned to a name. Nothing is executed.

use pilotcraft_error::{Error, Result};
use serde_json::{Map, Number, Value};

/// One call found in a code block
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCall {
    pub name: String,
    pub positional: Vec<Value>,
    pub keyword: Vec<(String, Value)>,
}

impl ParsedCall {
    /// Build the JSON argument object, binding positional values to
    /// `parameters` in order.
    pub fn into_arguments(self, parameters: &[String]) -> Result<Value> {
        if self.positional.len() > parameters.len() {
            return Err(Error::invalid_argument(format!(
                "{}() takes {} arguments but {} were given",
                self.name,
                parameters.len(),
                self.positional.len()
            )));
        }

        let mut args = Map::new();
        for (name, value) in parameters.iter().zip(self.positional) {
            args.insert(name.clone(), value);
        }
        for (name, value) in self.keyword {
            if args.contains_key(&name) {
                return Err(Error::invalid_argument(format!(
                    "{}() got multiple values for argument '{}'",
                    self.name, name
                )));
            }
            args.insert(name, value);
        }
        Ok(Value::Object(args))
    }
}

/// Parse the code blocks in a model reply. `None` when the reply has no
/// code at all.
pub fn parse_code_action(content: &str) -> Option<Result<Vec<ParsedCall>>> {
    let code = extract_code(content)?;
    Some(parse_calls(&code))
}

/// Contents of every `<code>` block, or of markdown fences when there are
/// none. An unterminated `<code>` block runs to the end of the text.
pub fn extract_code(content: &str) -> Option<String> {
    let mut blocks = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find("<code>") {
        let body = &rest[start + "<code>".len()..];
        match body.find("</code>") {
            Some(end) => {
                blocks.push(&body[..end]);
                rest = &body[end + "</code>".len()..];
            }
            None => {
                blocks.push(body);
                rest = "";
            }
        }
    }

    if blocks.is_empty() {
        let mut parts = content.split("```");
        parts.next();
        while let (Some(fenced), closing) = (parts.next(), parts.next()) {
            // Drop the language tag on the opening fence line
            let body = match fenced.split_once('\n') {
                Some((tag, body)) if !tag.contains('(') => body,
                _ => fenced,
            };
            blocks.push(body);
            if closing.is_none() {
                break;
            }
        }
    }

    let code: Vec<&str> = blocks.into_iter().map(str::trim).filter(|b| !b.is_empty()).collect();
    (!code.is_empty()).then(|| code.join("\n"))
}

/// Parse calls, one per non-empty line
pub fn parse_calls(code: &str) -> Result<Vec<ParsedCall>> {
    let mut calls = Vec::new();
    for raw in code.lines() {
        let line = strip_comment(raw).trim().trim_end_matches(';').trim();
        if line.is_empty() {
            continue;
        }
        let expr = unwrap_print(strip_assignment(line));
        let call = parse_call(expr).map_err(|e| e.with_context("line", line))?;
        calls.push(call);
    }
    Ok(calls)
}

fn parse_call(expr: &str) -> Result<ParsedCall> {
    let not_a_call = || Error::parse_failed(format!("expected a tool call, got '{}'", expr));

    let open = expr.find('(').ok_or_else(not_a_call)?;
    let name = expr[..open].trim();
    if !is_identifier(name) {
        return Err(not_a_call());
    }
    let close = scan(expr)
        .into_iter()
        .find(|&(i, c, depth)| i > open && c == ')' && depth == 1)
        .map(|(i, _, _)| i)
        .ok_or_else(|| Error::parse_failed(format!("unbalanced parentheses in '{}'", expr)))?;
    if close != expr.len() - 1 {
        return Err(not_a_call());
    }

    let mut call = ParsedCall {
        name: name.to_string(),
        positional: Vec::new(),
        keyword: Vec::new(),
    };
    for arg in split_top_level(&expr[open + 1..close], ',') {
        let arg = arg.trim();
        if arg.is_empty() {
            continue;
        }
        match keyword_split(arg) {
            Some((key, value)) => {
                if call.keyword.iter().any(|(k, _)| k == key) {
                    return Err(Error::parse_failed(format!("repeated keyword argument '{}'", key)));
                }
                call.keyword.push((key.to_string(), parse_literal(value)?));
            }
            None if call.keyword.is_empty() => call.positional.push(parse_literal(arg)?),
            None => {
                return Err(Error::parse_failed(format!(
                    "positional argument '{}' follows keyword argument",
                    arg
                )))
            }
        }
    }
    Ok(call)
}

fn parse_literal(text: &str) -> Result<Value> {
    let text = text.trim();
    let unsupported = || Error::parse_failed(format!("unsupported argument '{}'", text));

    match text {
        "True" => return Ok(Value::Bool(true)),
        "False" => return Ok(Value::Bool(false)),
        "None" => return Ok(Value::Null),
        _ => {}
    }

    if let Some(quote) = text.chars().next().filter(|c| *c == '\'' || *c == '"') {
        let inner = text
            .strip_prefix(quote)
            .and_then(|t| t.strip_suffix(quote))
            .filter(|_| text.len() >= 2)
            .ok_or_else(unsupported)?;
        return Ok(Value::String(unescape(inner)));
    }

    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        return split_top_level(inner, ',')
            .into_iter()
            .filter(|item| !item.trim().is_empty())
            .map(parse_literal)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array);
    }

    let digits = text.replace('_', "");
    if let Ok(int) = digits.parse::<i64>() {
        return Ok(Value::from(int));
    }
    digits
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(unsupported)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn strip_comment(line: &str) -> &str {
    match scan(line).into_iter().find(|&(_, c, _)| c == '#') {
        Some((i, _, _)) => &line[..i],
        None => line,
    }
}

/// `result = call(...)` -> `call(...)`
fn strip_assignment(line: &str) -> &str {
    match keyword_split(line) {
        Some((_, value)) => value.trim(),
        None => line,
    }
}

fn unwrap_print(mut expr: &str) -> &str {
    while let Some(inner) = expr.strip_prefix("print(").and_then(|e| e.strip_suffix(')')) {
        expr = inner.trim();
    }
    expr
}

/// Split `name = value` at a top-level single `=`
fn keyword_split(text: &str) -> Option<(&str, &str)> {
    let bytes = text.as_bytes();
    let (i, _, _) = scan(text).into_iter().find(|&(i, c, depth)| {
        c == '=' && depth == 0 && bytes.get(i + 1) != Some(&b'=') && (i == 0 || !b"=!<>".contains(&bytes[i - 1]))
    })?;
    let key = text[..i].trim();
    is_identifier(key).then(|| (key, &text[i + 1..]))
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c, depth) in scan(text) {
        if c == separator && depth == 0 {
            parts.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Characters outside string literals with the bracket depth before each
fn scan(text: &str) -> Vec<(usize, char, i32)> {
    let mut out = Vec::new();
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        out.push((i, c, depth));
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    out
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
