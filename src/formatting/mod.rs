//! Parsing of Minecraft rich text into a canonical decorated-segment tree.
//!
//! Servers encode their MOTDs, version names and player names either as
//! strings with `§`-escaped formatting codes or as recursive JSON chat
//! objects. [`parse`] accepts both shapes and produces a [`FormattedText`]
//! holding the segment tree plus three derived renderings: the canonical
//! `§`-escaped re-encoding, the text with all formatting stripped, and an
//! HTML fragment.

mod color;
mod decorator;
mod item;

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

pub use color::Color;
pub use decorator::Decorator;
pub use item::FormatItem;

use crate::Error;

/// The result of parsing one rich-text input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedText {
    /// The ordered decorated segments.
    #[serde(skip)]
    pub tree: Vec<FormatItem>,
    /// The canonical `§`-escaped re-encoding of the tree.
    pub raw: String,
    /// The text content with all formatting removed.
    pub clean: String,
    /// An HTML rendering: an outer `<span>` wrapping one `<span>` per item.
    pub html: String,
}

impl FormattedText {
    fn from_tree(tree: Vec<FormatItem>) -> Self {
        let tree = normalize(tree);
        let raw = tree.iter().map(FormatItem::raw).collect();
        let clean = tree.iter().map(|item| item.text.as_str()).collect();
        let html = {
            let mut html = String::from("<span>");
            for item in &tree {
                html.push_str(&item.html());
            }
            html.push_str("</span>");
            html
        };

        Self {
            tree,
            raw,
            clean,
            html,
        }
    }
}

/// Parses the formatting of any string or chat object.
///
/// # Errors
///
/// Returns [`Error::UnsupportedInputShape`] if the value is neither a
/// string nor an object.
pub fn parse(input: &Value) -> Result<FormattedText, Error> {
    match input {
        Value::String(text) => Ok(parse_str(text)),
        Value::Object(object) => {
            let mut tree = Vec::new();
            walk(object, &Style::default(), &mut tree);
            Ok(FormattedText::from_tree(tree))
        }
        _ => Err(Error::UnsupportedInputShape),
    }
}

/// Parses a string containing `§`-escaped formatting codes.
#[must_use]
pub fn parse_str(input: &str) -> FormattedText {
    FormattedText::from_tree(parse_string_tree(input))
}

#[derive(Debug, Clone, Default)]
struct Style {
    color: Option<Color>,
    decorators: BTreeSet<Decorator>,
}

impl Style {
    fn item(&self, text: String) -> FormatItem {
        FormatItem {
            text,
            color: self.color,
            decorators: self.decorators.clone(),
        }
    }
}

const DECORATOR_FIELDS: [(&str, Decorator); 5] = [
    ("obfuscated", Decorator::Obfuscated),
    ("bold", Decorator::Bold),
    ("strikethrough", Decorator::Strikethrough),
    ("underlined", Decorator::Underline),
    ("italic", Decorator::Italic),
];

/// Recursive descent over a chat object. Each node sees the merged
/// properties of its ancestors and overlays its own before emitting text;
/// children are never mutated.
fn walk(node: &Map<String, Value>, inherited: &Style, tree: &mut Vec<FormatItem>) {
    let mut style = inherited.clone();

    if let Some(color) = node
        .get("color")
        .and_then(Value::as_str)
        .and_then(Color::from_name)
    {
        style.color = Some(color);
    }

    for (field, decorator) in DECORATOR_FIELDS {
        if let Some(value) = node.get(field) {
            if coerce_bool(value) {
                style.decorators.insert(decorator);
            } else {
                style.decorators.remove(&decorator);
            }
        }
    }

    if let Some(text) = node.get("text").and_then(Value::as_str) {
        tree.push(style.item(text.to_owned()));
    }

    if let Some(extra) = node.get("extra").and_then(Value::as_array) {
        for child in extra {
            match child {
                Value::String(text) => tree.push(style.item(text.clone())),
                Value::Object(object) => walk(object, &style, tree),
                _ => {}
            }
        }
    }
}

/// Lenient boolean coercion for chat properties: servers emit booleans,
/// `"true"`/`"false"` strings and the integer 1 interchangeably. Any other
/// shape is false rather than an error.
fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(boolean) => *boolean,
        Value::String(text) => text.eq_ignore_ascii_case("true"),
        Value::Number(number) => number.as_i64() == Some(1) || number.as_u64() == Some(1),
        _ => false,
    }
}

fn parse_string_tree(input: &str) -> Vec<FormatItem> {
    let mut tree = Vec::new();
    let mut item = FormatItem::empty();
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if ch == '\n' {
            tree.push(std::mem::replace(&mut item, FormatItem::empty()));
            item.text.push('\n');
            continue;
        }

        if ch != '\u{a7}' {
            item.text.push(ch);
            continue;
        }

        let Some(code) = chars.next() else {
            break;
        };

        if let Some(color) = Color::from_code(code) {
            // A color code resets any active decorators.
            if item.text.is_empty() && item.decorators.is_empty() {
                item.color = Some(color);
            } else {
                if !item.text.is_empty() {
                    tree.push(item);
                }
                item = FormatItem {
                    text: String::new(),
                    color: Some(color),
                    decorators: BTreeSet::new(),
                };
            }
        } else if let Some(decorator) = Decorator::from_code(code) {
            if item.text.is_empty() {
                item.decorators.insert(decorator);
            } else {
                let mut next = FormatItem {
                    text: String::new(),
                    color: item.color,
                    decorators: item.decorators.clone(),
                };
                next.decorators.insert(decorator);
                tree.push(std::mem::replace(&mut item, next));
            }
        } else if code == 'r' {
            if !item.text.is_empty() {
                tree.push(item);
            }
            item = FormatItem::empty();
        }
        // Unknown codes are consumed and ignored.
    }

    tree.push(item);
    tree
}

/// Drops empty items and merges adjacent items of identical format.
fn normalize(tree: Vec<FormatItem>) -> Vec<FormatItem> {
    let mut result: Vec<FormatItem> = Vec::with_capacity(tree.len());

    for item in tree {
        if item.text.is_empty() {
            continue;
        }

        match result.last_mut() {
            Some(last) if last.same_format(&item) => last.text.push_str(&item.text),
            _ => result.push(item),
        }
    }

    result
}
