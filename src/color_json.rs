//! Purpose: Render pretty JSON with optional ANSI colorization for CLI output.
//! Exports: colorize_json.
//! Role: Small, pure formatter used by CLI emission paths.
//! Invariants: When color is disabled, output equals serde_json::to_string_pretty.
//! Invariants: Depth, object-limit and cycle markers get their own color so truncation stands out.
use objpath::api::{Marker, MarkerKind};
use serde_json::Value;

const INDENT: &str = "  ";

// Conservative 8/16-color palette for broad terminal compatibility.
const COLOR_KEY: &str = "36";
const COLOR_STRING: &str = "32";
const COLOR_NUMBER: &str = "33";
const COLOR_BOOL: &str = "35";
const COLOR_NULL: &str = "39";
const COLOR_PUNCT: &str = "39";
const COLOR_LIMIT: &str = "2;33";
const COLOR_CYCLE: &str = "2;31";

pub fn colorize_json(value: &Value, use_color: bool) -> String {
    let mut out = Renderer {
        use_color,
        out: String::new(),
    };
    out.value(value, 0);
    out.out
}

struct Renderer {
    use_color: bool,
    out: String,
}

impl Renderer {
    fn value(&mut self, value: &Value, indent: usize) {
        match value {
            Value::Null => self.colored("null", COLOR_NULL),
            Value::Bool(val) => self.colored(if *val { "true" } else { "false" }, COLOR_BOOL),
            Value::Number(num) => self.colored(&num.to_string(), COLOR_NUMBER),
            Value::String(text) => {
                let color = match Marker::parse(value).map(|marker| marker.kind) {
                    Some(MarkerKind::Cycle) => COLOR_CYCLE,
                    Some(MarkerKind::Depth | MarkerKind::Objects) => COLOR_LIMIT,
                    None => COLOR_STRING,
                };
                self.colored(&encode(text), color);
            }
            Value::Array(items) => self.array(items, indent),
            Value::Object(map) => self.object(map, indent),
        }
    }

    fn array(&mut self, items: &[Value], indent: usize) {
        if items.is_empty() {
            self.colored("[]", COLOR_PUNCT);
            return;
        }
        self.colored("[", COLOR_PUNCT);
        self.out.push('\n');
        for (idx, item) in items.iter().enumerate() {
            self.indent(indent + 1);
            self.value(item, indent + 1);
            if idx + 1 < items.len() {
                self.colored(",", COLOR_PUNCT);
            }
            self.out.push('\n');
        }
        self.indent(indent);
        self.colored("]", COLOR_PUNCT);
    }

    fn object(&mut self, map: &serde_json::Map<String, Value>, indent: usize) {
        if map.is_empty() {
            self.colored("{}", COLOR_PUNCT);
            return;
        }
        self.colored("{", COLOR_PUNCT);
        self.out.push('\n');
        let len = map.len();
        for (idx, (key, value)) in map.iter().enumerate() {
            self.indent(indent + 1);
            self.colored(&encode(key), COLOR_KEY);
            self.colored(":", COLOR_PUNCT);
            self.out.push(' ');
            self.value(value, indent + 1);
            if idx + 1 < len {
                self.colored(",", COLOR_PUNCT);
            }
            self.out.push('\n');
        }
        self.indent(indent);
        self.colored("}", COLOR_PUNCT);
    }

    fn indent(&mut self, level: usize) {
        for _ in 0..level {
            self.out.push_str(INDENT);
        }
    }

    fn colored(&mut self, text: &str, color: &str) {
        if !self.use_color {
            self.out.push_str(text);
            return;
        }
        self.out.push_str("\u{1b}[");
        self.out.push_str(color);
        self.out.push('m');
        self.out.push_str(text);
        self.out.push_str("\u{1b}[0m");
    }
}

fn encode(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}
