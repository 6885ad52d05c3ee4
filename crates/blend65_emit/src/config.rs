//! Emitter configuration.

use serde::{Deserialize, Serialize};

/// Which character to print before a hexadecimal literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HexPrefix {
    Dollar,
    ZeroX,
}

impl HexPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            HexPrefix::Dollar => "$",
            HexPrefix::ZeroX => "0x",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Indent applied before each instruction line. `0` spaces means a tab,
/// otherwise `n` literal spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndentWidth(pub u8);

impl IndentWidth {
    pub fn as_str(self) -> String {
        if self.0 == 0 {
            "\t".to_string()
        } else {
            " ".repeat(self.0 as usize)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmitterConfig {
    pub include_comments: bool,
    pub include_blank_lines: bool,
    pub indent_width: IndentWidth,
    pub uppercase_mnemonics: bool,
    pub hex_prefix: HexPrefix,
    pub include_cycle_counts: bool,
    pub line_ending: LineEnding,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            include_comments: true,
            include_blank_lines: true,
            indent_width: IndentWidth(4),
            uppercase_mnemonics: true,
            hex_prefix: HexPrefix::Dollar,
            include_cycle_counts: false,
            line_ending: LineEnding::Lf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_indent_when_width_is_zero() {
        assert_eq!(IndentWidth(0).as_str(), "\t");
    }

    #[test]
    fn space_indent_matches_width() {
        assert_eq!(IndentWidth(2).as_str(), "  ");
    }

    #[test]
    fn default_config_is_dollar_hex_uppercase() {
        let config = EmitterConfig::default();
        assert_eq!(config.hex_prefix.as_str(), "$");
        assert!(config.uppercase_mnemonics);
    }
}
