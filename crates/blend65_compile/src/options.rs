//! `CompileOptions`: a plain, `serde`-(de)serializable struct a host builds however
//! it likes. Reading `blend65.json` from disk, CLI parsing and glob
//! expansion are explicit non-goals and live outside this
//! crate; `CompileOptions` only describes the shape those hosts feed in.

use serde::{Deserialize, Serialize};

pub use blend65_codegen::{OptLevel, Target};

/// Controls what debug output accompanies the assembled program: none,
/// inline source comments, a VICE-style label list, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugMode {
    None,
    Inline,
    Vice,
    Both,
}

impl DebugMode {
    /// Whether per-instruction source-line comments should be attached.
    pub fn wants_inline(self) -> bool {
        matches!(self, DebugMode::Inline | DebugMode::Both)
    }

    /// Whether a VICE-style label list should be produced alongside the
    /// assembler text.
    pub fn wants_vice(self) -> bool {
        matches!(self, DebugMode::Vice | DebugMode::Both)
    }
}

/// The core always emits `asm` text; `Prg`/`Both` only record that the
/// caller additionally wants a `.prg`, which requires that external step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Asm,
    Prg,
    Both,
}

impl OutputFormat {
    pub fn wants_prg(self) -> bool {
        matches!(self, OutputFormat::Prg | OutputFormat::Both)
    }
}

/// Configuration inputs consumed by the compilation core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CompileOptions {
    pub target: Target,
    pub optimization_level: OptLevel,
    pub debug: DebugMode,
    pub output_format: OutputFormat,
    pub load_address: u16,
    pub basic_stub: bool,
    pub source_map: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            target: Target::C64,
            optimization_level: OptLevel::O0,
            debug: DebugMode::None,
            output_format: OutputFormat::Asm,
            load_address: 0x0801,
            basic_stub: false,
            source_map: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_c64_values() {
        let opts = CompileOptions::default();
        assert_eq!(opts.target, Target::C64);
        assert_eq!(opts.load_address, 0x0801);
        assert!(!opts.basic_stub);
    }

    #[test]
    fn round_trips_through_json() {
        let opts = CompileOptions { basic_stub: true, debug: DebugMode::Both, ..CompileOptions::default() };
        let json = serde_json::to_string(&opts).unwrap();
        let back: CompileOptions = serde_json::from_str(&json).unwrap();
        assert!(back.basic_stub);
        assert_eq!(back.debug, DebugMode::Both);
    }
}
