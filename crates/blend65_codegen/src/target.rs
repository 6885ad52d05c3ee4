//! Per-machine target configuration.
//!
//! `c64` is the only fully implemented target; `c128` and `x16` are
//! carried as placeholders that surface a clear `TargetNotImplemented`
//! diagnostic rather than silently miscompiling.

use std::fmt;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    C64,
    C64Ntsc,
    C128,
    X16,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Target::C64 => "c64",
            Target::C64Ntsc => "c64_ntsc",
            Target::C128 => "c128",
            Target::X16 => "x16",
        };
        write!(f, "{s}")
    }
}

/// The zero-page budget: reserved ranges no allocation may
/// ever touch, and the "safe" range available to the Static Frame
/// Allocator's priority placement.
#[derive(Debug, Clone)]
pub struct ZeroPageLayout {
    pub reserved_ranges: Vec<RangeInclusive<u16>>,
    pub safe_range: RangeInclusive<u16>,
}

impl ZeroPageLayout {
    pub fn usable_bytes(&self) -> u32 {
        (*self.safe_range.end() as u32) - (*self.safe_range.start() as u32) + 1
    }

    pub fn is_reserved(&self, addr: u16) -> bool {
        self.reserved_ranges.iter().any(|r| r.contains(&addr))
    }

    pub fn is_safe(&self, addr: u16) -> bool {
        self.safe_range.contains(&addr) && !self.is_reserved(addr)
    }
}

/// One contiguous region of the machine's address space, used by diagnostics and by the code generator to
/// decide where general-RAM variables may be placed.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    pub name: &'static str,
    pub range: RangeInclusive<u32>,
}

#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub target: Target,
    pub architecture: &'static str,
    pub cpu: &'static str,
    pub clock_mhz: f64,
    pub total_memory: u32,
    pub zero_page: ZeroPageLayout,
    pub graphics_chip: Option<(&'static str, u16)>,
    pub sound_chip: Option<(&'static str, u16)>,
    pub memory_regions: Vec<MemoryRegion>,
    pub implemented: bool,
    pub default_load_address: u16,
    pub basic_stub_origin: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetNotImplemented(pub Target);

impl fmt::Display for TargetNotImplemented {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target `{}` is not implemented", self.0)
    }
}

impl std::error::Error for TargetNotImplemented {}

impl TargetConfig {
    /// Resolves the target config for `target`, or `Err` for a
    /// placeholder target.
    pub fn for_target(target: Target) -> std::result::Result<TargetConfig, TargetNotImplemented> {
        let cfg = match target {
            Target::C64 => c64(Target::C64, 0.985_248),
            Target::C64Ntsc => c64(Target::C64Ntsc, 1.022_727),
            Target::C128 | Target::X16 => placeholder(target),
        };
        if cfg.implemented {
            Ok(cfg)
        } else {
            Err(TargetNotImplemented(target))
        }
    }
}

/// The C64 (PAL by default, NTSC via `clock_mhz` override): reserved ZP
/// `$00-$01` (6510 I/O port + data direction register) and `$90-$FF`
/// (KERNAL/BASIC workspace), safe ZP `$02-$8F` — 142 bytes.
fn c64(target: Target, clock_mhz: f64) -> TargetConfig {
    TargetConfig {
        target,
        architecture: "6502",
        cpu: "6510",
        clock_mhz,
        total_memory: 65536,
        zero_page: ZeroPageLayout {
            reserved_ranges: vec![0x00..=0x01, 0x90..=0xFF],
            safe_range: 0x02..=0x8F,
        },
        graphics_chip: Some(("VIC-II", 0xD000)),
        sound_chip: Some(("SID", 0xD400)),
        memory_regions: vec![
            MemoryRegion { name: "zero_page", range: 0x0000..=0x00FF },
            MemoryRegion { name: "basic_stub", range: 0x0801..=0x080F },
            MemoryRegion { name: "program", range: 0x0810..=0x9FFF },
            MemoryRegion { name: "io", range: 0xD000..=0xDFFF },
        ],
        implemented: true,
        default_load_address: 0x0801,
        basic_stub_origin: 0x0801,
    }
}

fn placeholder(target: Target) -> TargetConfig {
    TargetConfig {
        target,
        architecture: "6502",
        cpu: "unknown",
        clock_mhz: 0.0,
        total_memory: 0,
        zero_page: ZeroPageLayout { reserved_ranges: Vec::new(), safe_range: 0..=0 },
        graphics_chip: None,
        sound_chip: None,
        memory_regions: Vec::new(),
        implemented: false,
        default_load_address: 0,
        basic_stub_origin: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c64_zero_page_matches_known_constants() {
        let cfg = TargetConfig::for_target(Target::C64).unwrap();
        assert_eq!(cfg.zero_page.usable_bytes(), 142);
        assert!(cfg.zero_page.is_reserved(0x00));
        assert!(cfg.zero_page.is_reserved(0x90));
        assert!(cfg.zero_page.is_safe(0x02));
        assert!(cfg.zero_page.is_safe(0x8F));
        assert!(!cfg.zero_page.is_safe(0x90));
    }

    #[test]
    fn c128_and_x16_are_not_implemented() {
        assert!(TargetConfig::for_target(Target::C128).is_err());
        assert!(TargetConfig::for_target(Target::X16).is_err());
    }

    #[test]
    fn c64_and_ntsc_differ_only_by_clock() {
        let pal = TargetConfig::for_target(Target::C64).unwrap();
        let ntsc = TargetConfig::for_target(Target::C64Ntsc).unwrap();
        assert!(pal.clock_mhz < ntsc.clock_mhz);
        assert_eq!(pal.zero_page.usable_bytes(), ntsc.zero_page.usable_bytes());
    }
}
