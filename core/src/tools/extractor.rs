//! Tool-call extraction from free-form model text.
//!
//! Grammars are tried in priority order. The first grammar that yields at
//! least one call wins and the remaining grammars are not consulted, so the
//! same invocation is never reported twice under two surface forms.
//!
//! Parameter text is parsed as a JSON object when it looks like one;
//! otherwise it is split on commas, then on `=`, and each value is coerced
//! by trying, in order: a JSON literal, a boolean literal, a numeric
//! literal, and finally the raw string with surrounding quotes stripped.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::message::{ToolCall, ToolCallSource};

/// One textual pattern recognized as a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// `#TOOL: name(key=value, ...)` or `#TOOL: name({"key": ...})`
    Directive,
    /// A fenced code block tagged `tool`, holding JSON or `name(args)` lines
    FencedBlock,
    /// An inline JSON object such as `{"tool": "name", "params": {...}}`
    InlineJson,
}

impl Grammar {
    /// Default priority order
    pub const PRIORITY: [Grammar; 3] = [Grammar::Directive, Grammar::FencedBlock, Grammar::InlineJson];

    pub fn source(&self) -> ToolCallSource {
        match self {
            Grammar::Directive => ToolCallSource::Directive,
            Grammar::FencedBlock => ToolCallSource::FencedBlock,
            Grammar::InlineJson => ToolCallSource::InlineJson,
        }
    }

    /// All matches of this grammar, in order of appearance
    pub fn scan(&self, text: &str) -> Vec<ToolCall> {
        match self {
            Grammar::Directive => scan_directives(text),
            Grammar::FencedBlock => scan_fenced_blocks(text),
            Grammar::InlineJson => scan_inline_json(text),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolCallExtractor {
    grammars: Vec<Grammar>,
}

impl Default for ToolCallExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCallExtractor {
    pub fn new() -> Self {
        Self::with_grammars(Grammar::PRIORITY.to_vec())
    }

    pub fn with_grammars(grammars: Vec<Grammar>) -> Self {
        Self { grammars }
    }

    pub fn grammars(&self) -> &[Grammar] {
        &self.grammars
    }

    /// Extract tool calls; text without any match yields an empty list
    pub fn extract(&self, text: &str) -> Vec<ToolCall> {
        for grammar in &self.grammars {
            let calls = grammar.scan(text);
            if !calls.is_empty() {
                debug!(target: "tool_extractor", grammar = ?grammar, count = calls.len(), "Extracted tool calls");
                return calls;
            }
        }
        Vec::new()
    }
}

/// Compiled grammar patterns.
///
/// Every pattern is a string literal covered by the unit tests below, so
/// compilation cannot fail at runtime.
struct Patterns {
    directive: Regex,
    fenced: Regex,
    call_line: Regex,
    inline_json_start: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        directive: compile(r"(?i)#TOOL:\s*([A-Za-z_][A-Za-z0-9_.:\-]*)\s*\("),
        fenced: compile(r"(?s)```(?:tool_call|tool-call|tool)[ \t]*\r?\n(.*?)```"),
        call_line: compile(r"(?s)^([A-Za-z_][A-Za-z0-9_.:\-]*)\s*\((.*)\)$"),
        inline_json_start: compile(r#"\{\s*"tool"\s*:"#),
    })
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern:?}: {e}"))
}

fn scan_directives(text: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut consumed_until = 0;
    for caps in patterns().directive.captures_iter(text) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        if whole.start < consumed_until {
            continue;
        }
        let Some((params, args_len)) = directive_arguments(&text[whole.end..]) else {
            debug!(target: "tool_extractor", name = %&caps[1], "Directive without closing ')'");
            continue;
        };
        consumed_until = whole.end + args_len;
        calls.push(ToolCall::new(&caps[1], params, ToolCallSource::Directive));
    }
    calls
}

/// Parse the argument list following `name(`. Returns the parameters and
/// the number of bytes consumed including the closing `)`.
fn directive_arguments(rest: &str) -> Option<(Map<String, Value>, usize)> {
    let leading = rest.len() - rest.trim_start().len();
    if rest[leading..].starts_with('{') {
        // JSON strings may contain ')', so let the deserializer find the end
        let mut stream = serde_json::Deserializer::from_str(&rest[leading..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = stream.next() {
            let after = leading + stream.byte_offset();
            let tail = &rest[after..];
            let gap = tail.len() - tail.trim_start().len();
            if tail[gap..].starts_with(')') {
                return Some((map, after + gap + 1));
            }
        }
    }
    let close = rest.find(')')?;
    Some((parse_params(&rest[..close]), close + 1))
}

fn scan_fenced_blocks(text: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    for caps in patterns().fenced.captures_iter(text) {
        let body = caps[1].trim();
        if body.starts_with('{') || body.starts_with('[') {
            match serde_json::from_str::<Value>(body) {
                Ok(Value::Array(items)) => {
                    calls.extend(items.iter().filter_map(|item| call_from_json(item, ToolCallSource::FencedBlock)));
                }
                Ok(value) => calls.extend(call_from_json(&value, ToolCallSource::FencedBlock)),
                Err(e) => debug!(target: "tool_extractor", error = %e, "Fenced tool block is not valid JSON"),
            }
            continue;
        }
        for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(line_caps) = patterns().call_line.captures(line) {
                let params = parse_params(&line_caps[2]);
                calls.push(ToolCall::new(&line_caps[1], params, ToolCallSource::FencedBlock));
            }
        }
    }
    calls
}

fn scan_inline_json(text: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut consumed_until = 0;
    for m in patterns().inline_json_start.find_iter(text) {
        if m.start() < consumed_until {
            continue;
        }
        let rest = &text[m.start()..];
        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                consumed_until = m.start() + stream.byte_offset();
                calls.extend(call_from_json(&value, ToolCallSource::InlineJson));
            }
            Some(Err(e)) => debug!(target: "tool_extractor", error = %e, "Inline tool object is not valid JSON"),
            None => {}
        }
    }
    calls
}

/// Build a call from `{"tool"|"name": ..., "params"|"parameters"|"arguments": ...}`
fn call_from_json(value: &Value, source: ToolCallSource) -> Option<ToolCall> {
    let obj = value.as_object()?;
    let name = obj
        .get("tool")
        .or_else(|| obj.get("name"))
        .and_then(|n| n.as_str())
        .map(str::trim)
        .filter(|n| !n.is_empty())?;
    let params = match obj
        .get("params")
        .or_else(|| obj.get("parameters"))
        .or_else(|| obj.get("arguments"))
    {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) => parse_params(raw),
        _ => Map::new(),
    };
    let mut call = ToolCall::new(name, params, source);
    call.id = obj.get("id").and_then(|i| i.as_str()).map(str::to_string);
    Some(call)
}

/// Parse the parameter text of one match
pub fn parse_params(raw: &str) -> Map<String, Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Map::new();
    }

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(map)) => return map,
            Ok(_) => {}
            Err(e) => {
                debug!(target: "tool_extractor", error = %e, "JSON-looking parameters failed to parse; using key=value")
            }
        }
    }

    let mut params = Map::new();
    for pair in trimmed.split(',') {
        let Some((key, value)) = pair.split_once('=') else {
            if !pair.trim().is_empty() {
                debug!(target: "tool_extractor", fragment = %pair.trim(), "Ignoring parameter without '='");
            }
            continue;
        };
        let key = strip_quotes(key.trim());
        if key.is_empty() {
            continue;
        }
        params.insert(key.to_string(), coerce_value(value));
    }
    params
}

/// Coerce one raw value: JSON literal, then boolean, then number, then string
pub fn coerce_value(raw: &str) -> Value {
    let raw = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return value;
    }

    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    if let Ok(int) = raw.parse::<i64>() {
        return json!(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        if float.is_finite() {
            return json!(float);
        }
    }

    Value::String(strip_quotes(raw).to_string())
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}
