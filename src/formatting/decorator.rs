use serde::Serialize;

/// A text decoration applied on top of a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decorator {
    Obfuscated,
    Bold,
    Strikethrough,
    Underline,
    Italic,
}

impl Decorator {
    /// Parses a single-character formatting code (`'k'`–`'o'`).
    pub const fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'k' => Self::Obfuscated,
            'l' => Self::Bold,
            'm' => Self::Strikethrough,
            'n' => Self::Underline,
            'o' => Self::Italic,
            _ => return None,
        })
    }

    /// The formatting code character of the decorator.
    pub const fn code(self) -> char {
        match self {
            Self::Obfuscated => 'k',
            Self::Bold => 'l',
            Self::Strikethrough => 'm',
            Self::Underline => 'n',
            Self::Italic => 'o',
        }
    }

    /// The `§`-escaped encoding of the decorator.
    pub fn to_raw(self) -> String {
        format!("\u{a7}{}", self.code())
    }
}
