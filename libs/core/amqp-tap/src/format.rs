//! Turning selected values into output records.

use owo_colors::OwoColorize;
use serde_json::Value;
use std::fmt::{self, Write as _};
use strum::{Display, EnumString, VariantNames};

/// How selected values are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    /// Compact JSON text
    #[default]
    Json,
    /// Bare strings, JSON text for anything else
    String,
    /// Human-oriented, optionally colorized rendering
    #[strum(to_string = "eyes", serialize = "pretty")]
    Eyes,
    /// The structured value itself
    Object,
}

/// One unit of tap output.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Text(String),
    Object(Value),
    /// The selected path did not exist in the message
    Absent,
}

impl Record {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Record::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Value> {
        match self {
            Record::Object(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Record::Absent)
    }
}

/// Text form used when writing records to a byte stream. Absent records render empty.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Text(text) => f.write_str(text),
            Record::Object(value) => write!(f, "{value}"),
            Record::Absent => Ok(()),
        }
    }
}

/// Renders values for the [`OutputFormat::Eyes`] format.
pub trait Inspector: Send + Sync {
    fn render(&self, value: &Value) -> String;
}

/// Multi-line inspector with optional ANSI colors.
#[derive(Debug, Clone)]
pub struct ColorInspector {
    color: bool,
    indent: usize,
}

impl ColorInspector {
    pub fn new(color: bool) -> Self {
        Self { color, indent: 2 }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    fn write_value(&self, out: &mut String, value: &Value, depth: usize) {
        match value {
            Value::Null => self.paint(out, "null", Token::Null),
            Value::Bool(b) => self.paint(out, if *b { "true" } else { "false" }, Token::Bool),
            Value::Number(n) => self.paint(out, &n.to_string(), Token::Number),
            Value::String(_) => self.paint(out, &value.to_string(), Token::String),
            Value::Array(items) if items.is_empty() => out.push_str("[]"),
            Value::Object(map) if map.is_empty() => out.push_str("{}"),
            Value::Array(items) => {
                out.push_str("[\n");
                for (i, item) in items.iter().enumerate() {
                    self.pad(out, depth + 1);
                    self.write_value(out, item, depth + 1);
                    out.push_str(if i + 1 < items.len() { ",\n" } else { "\n" });
                }
                self.pad(out, depth);
                out.push(']');
            }
            Value::Object(map) => {
                out.push_str("{\n");
                for (i, (key, item)) in map.iter().enumerate() {
                    self.pad(out, depth + 1);
                    self.paint(out, key, Token::Key);
                    out.push_str(": ");
                    self.write_value(out, item, depth + 1);
                    out.push_str(if i + 1 < map.len() { ",\n" } else { "\n" });
                }
                self.pad(out, depth);
                out.push('}');
            }
        }
    }

    fn pad(&self, out: &mut String, depth: usize) {
        out.extend(std::iter::repeat(' ').take(depth * self.indent));
    }

    fn paint(&self, out: &mut String, text: &str, token: Token) {
        if !self.color {
            out.push_str(text);
            return;
        }
        // Writing into a String cannot fail
        let _ = match token {
            Token::Key => write!(out, "{}", text.bold()),
            Token::String => write!(out, "{}", text.green()),
            Token::Number => write!(out, "{}", text.magenta()),
            Token::Bool => write!(out, "{}", text.blue()),
            Token::Null => write!(out, "{}", text.bright_black()),
        };
    }
}

#[derive(Clone, Copy)]
enum Token {
    Key,
    String,
    Number,
    Bool,
    Null,
}

impl Default for ColorInspector {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Inspector for ColorInspector {
    fn render(&self, value: &Value) -> String {
        let mut out = String::new();
        self.write_value(&mut out, value, 0);
        out
    }
}

/// Render a selection result as a record.
///
/// `None` (the selected path was missing) always yields [`Record::Absent`].
pub fn format_record(
    selected: Option<Value>,
    format: OutputFormat,
    inspector: &dyn Inspector,
) -> Result<Record, serde_json::Error> {
    let Some(value) = selected else {
        return Ok(Record::Absent);
    };

    let record = match format {
        OutputFormat::Json => Record::Text(serde_json::to_string(&value)?),
        OutputFormat::String => match value {
            Value::String(text) => Record::Text(text),
            other => Record::Text(serde_json::to_string(&other)?),
        },
        OutputFormat::Eyes => Record::Text(inspector.render(&value)),
        OutputFormat::Object => Record::Object(value),
    };
    Ok(record)
}
