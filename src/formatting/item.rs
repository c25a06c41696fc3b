use std::collections::BTreeSet;

use serde::Serialize;

use super::{Color, Decorator};

/// A run of text sharing one color and one set of decorators.
///
/// In a finalized tree the text is never empty; a `None` color inherits the
/// client default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatItem {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    pub decorators: BTreeSet<Decorator>,
}

impl FormatItem {
    pub(super) fn empty() -> Self {
        Self {
            text: String::new(),
            color: None,
            decorators: BTreeSet::new(),
        }
    }

    /// Whether this item carries the same color and decorator set as
    /// another, regardless of text.
    #[must_use]
    pub fn same_format(&self, other: &Self) -> bool {
        self.color == other.color && self.decorators == other.decorators
    }

    /// The `§`-escaped encoding of the item: color code, decorator codes,
    /// then the text.
    #[must_use]
    pub fn raw(&self) -> String {
        let mut result = String::new();
        if let Some(color) = self.color {
            result.push_str(&color.to_raw());
        }
        for decorator in &self.decorators {
            result.push_str(&decorator.to_raw());
        }
        result.push_str(&self.text);
        result
    }

    /// The HTML rendering of the item: a `<span>` with a `style` attribute
    /// for color and decorations, and the `minecraft-format-obfuscated`
    /// class when the obfuscated decorator is present.
    #[must_use]
    pub fn html(&self) -> String {
        let mut classes = Vec::new();
        let mut styles = Vec::new();
        let mut text_decoration = Vec::new();

        if let Some(color) = self.color {
            styles.push(format!("color: {};", color.hex()));
        }

        for decorator in &self.decorators {
            match decorator {
                Decorator::Obfuscated => classes.push("minecraft-format-obfuscated"),
                Decorator::Bold => styles.push("font-weight: bold;".to_string()),
                Decorator::Strikethrough => text_decoration.push("line-through"),
                Decorator::Underline => text_decoration.push("underline"),
                Decorator::Italic => styles.push("font-style: italic;".to_string()),
            }
        }

        if !text_decoration.is_empty() {
            styles.push(format!("text-decoration: {};", text_decoration.join(" ")));
        }

        let mut span = String::from("<span");
        if !classes.is_empty() {
            span.push_str(&format!(" class=\"{}\"", classes.join(" ")));
        }
        if !styles.is_empty() {
            span.push_str(&format!(" style=\"{}\"", styles.join("")));
        }
        span.push('>');
        span.push_str(&escape_html(&self.text));
        span.push_str("</span>");
        span
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
