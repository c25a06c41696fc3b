use serde::Serialize;

/// A named Minecraft text color.
///
/// Each color has a single-character code used in `§`-escaped strings and a
/// fixed RGB value used for HTML rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    White,
    MinecoinGold,
}

impl Color {
    /// Parses a single-character color code (`'0'`–`'9'`, `'a'`–`'g'`).
    pub const fn from_code(code: char) -> Option<Self> {
        Some(match code {
            '0' => Self::Black,
            '1' => Self::DarkBlue,
            '2' => Self::DarkGreen,
            '3' => Self::DarkAqua,
            '4' => Self::DarkRed,
            '5' => Self::DarkPurple,
            '6' => Self::Gold,
            '7' => Self::Gray,
            '8' => Self::DarkGray,
            '9' => Self::Blue,
            'a' => Self::Green,
            'b' => Self::Aqua,
            'c' => Self::Red,
            'd' => Self::LightPurple,
            'e' => Self::Yellow,
            'f' => Self::White,
            'g' => Self::MinecoinGold,
            _ => return None,
        })
    }

    /// Parses a color name as it appears in chat components, or a
    /// single-character code.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "black" => Self::Black,
            "dark_blue" => Self::DarkBlue,
            "dark_green" => Self::DarkGreen,
            "dark_aqua" => Self::DarkAqua,
            "dark_red" => Self::DarkRed,
            "dark_purple" => Self::DarkPurple,
            "gold" => Self::Gold,
            "gray" => Self::Gray,
            "dark_gray" => Self::DarkGray,
            "blue" => Self::Blue,
            "green" => Self::Green,
            "aqua" => Self::Aqua,
            "red" => Self::Red,
            "light_purple" => Self::LightPurple,
            "yellow" => Self::Yellow,
            "white" => Self::White,
            "minecoin_gold" => Self::MinecoinGold,
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(code), None) => return Self::from_code(code),
                    _ => return None,
                }
            }
        })
    }

    /// The formatting code character of the color.
    pub const fn code(self) -> char {
        match self {
            Self::Black => '0',
            Self::DarkBlue => '1',
            Self::DarkGreen => '2',
            Self::DarkAqua => '3',
            Self::DarkRed => '4',
            Self::DarkPurple => '5',
            Self::Gold => '6',
            Self::Gray => '7',
            Self::DarkGray => '8',
            Self::Blue => '9',
            Self::Green => 'a',
            Self::Aqua => 'b',
            Self::Red => 'c',
            Self::LightPurple => 'd',
            Self::Yellow => 'e',
            Self::White => 'f',
            Self::MinecoinGold => 'g',
        }
    }

    /// The hex RGB value of the color, prefixed with `#`.
    pub const fn hex(self) -> &'static str {
        match self {
            Self::Black => "#000000",
            Self::DarkBlue => "#0000aa",
            Self::DarkGreen => "#00aa00",
            Self::DarkAqua => "#00aaaa",
            Self::DarkRed => "#aa0000",
            Self::DarkPurple => "#aa00aa",
            Self::Gold => "#ffaa00",
            Self::Gray => "#aaaaaa",
            Self::DarkGray => "#555555",
            Self::Blue => "#5555ff",
            Self::Green => "#55ff55",
            Self::Aqua => "#55ffff",
            Self::Red => "#ff5555",
            Self::LightPurple => "#ff55ff",
            Self::Yellow => "#ffff55",
            Self::White => "#ffffff",
            Self::MinecoinGold => "#ddd605",
        }
    }

    /// The `§`-escaped encoding of the color.
    pub fn to_raw(self) -> String {
        format!("\u{a7}{}", self.code())
    }
}
