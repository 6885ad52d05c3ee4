//! ASM-IL -> ACME assembler text.
//!
//! The emitter only reads [`AsmModule`]; it never mutates it and never fails — unsupported shapes are
//! a code generator concern.

use crate::config::{EmitterConfig, HexPrefix};
use blend65_base::Span;
use blend65_codegen::{AddressingMode, AsmItem, AsmModule, CommentStyle, DataPayload, LabelKind, Operand};
use std::collections::BTreeMap;

/// What [`emit`] produces: the rendered text, its line count and byte
/// count, and a map from emitted line number back to the source span that
/// produced it.
#[derive(Debug, Clone)]
pub struct EmitOutput {
    pub text: String,
    pub line_count: u32,
    pub total_bytes: u32,
    /// 1-based line number -> the span of the IL/AST construct that
    /// generated it. Only instruction lines that survived with a span
    /// attached are present.
    pub source_map: BTreeMap<u32, Span>,
}

fn hex_u8(v: u8, prefix: HexPrefix) -> String {
    format!("{}{:02X}", prefix.as_str(), v)
}

fn hex_addr(v: u16, digits: usize, prefix: HexPrefix) -> String {
    format!("{}{:0width$X}", prefix.as_str(), v, width = digits)
}

/// Zero-page-addressed modes print a 2-digit address; everything else
/// (absolute, indirect) prints the full 4-digit address.
fn is_short_address_mode(mode: AddressingMode) -> bool {
    matches!(
        mode,
        AddressingMode::ZeroPage | AddressingMode::ZeroPageX | AddressingMode::ZeroPageY | AddressingMode::IndirectX | AddressingMode::IndirectY
    )
}

fn render_operand(operand: &Operand, mode: AddressingMode, hex_prefix: HexPrefix) -> String {
    let base = match operand {
        Operand::Immediate(v) => format!("#{}", hex_u8(*v, hex_prefix)),
        Operand::Address(a) => hex_addr(*a, if is_short_address_mode(mode) { 2 } else { 4 }, hex_prefix),
        Operand::Label(name) => name.clone(),
    };
    match mode {
        AddressingMode::Implied | AddressingMode::Accumulator => String::new(),
        AddressingMode::Immediate | AddressingMode::ZeroPage | AddressingMode::Absolute | AddressingMode::Relative => base,
        AddressingMode::ZeroPageX | AddressingMode::AbsoluteX => format!("{base},X"),
        AddressingMode::ZeroPageY | AddressingMode::AbsoluteY => format!("{base},Y"),
        AddressingMode::Indirect => format!("({base})"),
        AddressingMode::IndirectX => format!("({base},X)"),
        AddressingMode::IndirectY => format!("({base}),Y"),
    }
}

/// `+`-prefixes exported labels, `.`-prefixes block/temp labels unless
/// already dotted. This is
/// a declaration-site marker only: references elsewhere use the bare
/// name, matching ACME's own `+label` export convention.
fn render_label_decl(name: &str, kind: LabelKind) -> String {
    match kind {
        LabelKind::Exported => {
            if name.starts_with('+') {
                name.to_string()
            } else {
                format!("+{name}")
            }
        }
        LabelKind::Block | LabelKind::Temp => {
            if name.starts_with('.') {
                name.to_string()
            } else {
                format!(".{name}")
            }
        }
        LabelKind::Function => name.to_string(),
    }
}

fn render_data(payload: &DataPayload, config: &EmitterConfig) -> String {
    match payload {
        DataPayload::Byte(values) => {
            let body = values.iter().map(|v| hex_u8(*v, config.hex_prefix)).collect::<Vec<_>>().join(", ");
            format!("!byte {body}")
        }
        DataPayload::Word(values) => {
            let body = values.iter().map(|v| hex_addr(*v, 4, config.hex_prefix)).collect::<Vec<_>>().join(", ");
            format!("!word {body}")
        }
        DataPayload::Text(s) => format!("!text \"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        DataPayload::Fill { count, value } => format!("!fill {count}, {}", hex_u8(*value, config.hex_prefix)),
    }
}

fn mnemonic_case(mnemonic: &str, config: &EmitterConfig) -> String {
    if config.uppercase_mnemonics {
        mnemonic.to_string()
    } else {
        mnemonic.to_lowercase()
    }
}

fn trailing_comment(comment: Option<&str>, cycle_note: Option<String>, config: &EmitterConfig) -> Option<String> {
    if !config.include_comments && cycle_note.is_none() {
        return None;
    }
    let text_part = if config.include_comments { comment } else { None };
    match (text_part, cycle_note) {
        (Some(text), Some(note)) => Some(format!("; {text} ({note})")),
        (Some(text), None) => Some(format!("; {text}")),
        (None, Some(note)) => Some(format!("; {note}")),
        (None, None) => None,
    }
}

/// Serializes `module` into ACME-compatible assembler text per `config`
///. Never fails: a module the code generator produced is
/// always a valid input.
pub fn emit(module: &AsmModule, config: &EmitterConfig) -> EmitOutput {
    let mut lines: Vec<String> = Vec::new();
    let mut source_map = BTreeMap::new();
    let indent = config.indent_width.as_str();

    for item in &module.items {
        match item {
            AsmItem::Origin(addr) => {
                lines.push(format!("*= {}", hex_addr(*addr, 4, config.hex_prefix)));
            }
            AsmItem::Label { name, kind, .. } => {
                lines.push(format!("{}:", render_label_decl(name, *kind)));
            }
            AsmItem::Instruction { mnemonic, mode, operand, cycles, bytes, comment, span } => {
                let mnem = mnemonic_case(mnemonic, config);
                let operand_text = operand.as_ref().map(|op| render_operand(op, *mode, config.hex_prefix)).unwrap_or_default();
                let mut line = indent.clone();
                line.push_str(&mnem);
                if !operand_text.is_empty() {
                    line.push(' ');
                    line.push_str(&operand_text);
                }
                let cycle_note = if config.include_cycle_counts {
                    Some(match cycles {
                        Some(c) => format!("{bytes}b {c}c"),
                        None => format!("{bytes}b ?c"),
                    })
                } else {
                    None
                };
                if let Some(suffix) = trailing_comment(comment.as_deref(), cycle_note, config) {
                    line.push(' ');
                    line.push_str(&suffix);
                }
                if let Some(s) = span {
                    source_map.insert(lines.len() as u32 + 1, *s);
                }
                lines.push(line);
            }
            AsmItem::Data { payload, comment } => {
                let mut line = indent.clone();
                line.push_str(&render_data(payload, config));
                if config.include_comments {
                    if let Some(c) = comment {
                        line.push_str(" ; ");
                        line.push_str(c);
                    }
                }
                lines.push(line);
            }
            AsmItem::Comment { text, style } => {
                if !config.include_comments {
                    continue;
                }
                match style {
                    CommentStyle::Standalone => lines.push(format!("; {text}")),
                    CommentStyle::Trailing => {
                        if let Some(last) = lines.last_mut() {
                            last.push_str(" ; ");
                            last.push_str(text);
                        } else {
                            lines.push(format!("; {text}"));
                        }
                    }
                }
            }
            AsmItem::BlankLine => {
                if config.include_blank_lines {
                    lines.push(String::new());
                }
            }
            AsmItem::Raw(text) => lines.push(text.clone()),
        }
    }

    let line_count = lines.len() as u32;
    let ending = config.line_ending.as_str();
    let mut text = lines.join(ending);
    if !text.is_empty() {
        text.push_str(ending);
    }
    let total_bytes = text.len() as u32;

    EmitOutput { text, line_count, total_bytes, source_map }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blend65_codegen::{AddressingMode, AsmItem, AsmModule, DataPayload, LabelKind, Operand};

    fn sample_module() -> AsmModule {
        let mut m = AsmModule::new();
        m.push(AsmItem::Origin(0x0810));
        m.push(AsmItem::Label { name: "_main".into(), kind: LabelKind::Exported, span: None });
        m.push(AsmItem::instr("LDA", AddressingMode::Immediate, Some(Operand::Immediate(0x2A))));
        m.push(AsmItem::instr("STA", AddressingMode::ZeroPage, Some(Operand::Address(0x02))));
        m.push(AsmItem::instr("RTS", AddressingMode::Implied, None));
        m
    }

    #[test]
    fn origin_emits_acme_star_equals() {
        let out = emit(&sample_module(), &EmitterConfig::default());
        assert!(out.text.lines().next().unwrap().starts_with("*= $0810"));
    }

    #[test]
    fn exported_label_gets_plus_prefix() {
        let out = emit(&sample_module(), &EmitterConfig::default());
        assert!(out.text.contains("+_main:"));
    }

    #[test]
    fn immediate_operand_uses_hash_and_hex() {
        let out = emit(&sample_module(), &EmitterConfig::default());
        assert!(out.text.contains("LDA #$2A"));
    }

    #[test]
    fn zero_page_address_prints_two_digits() {
        let out = emit(&sample_module(), &EmitterConfig::default());
        assert!(out.text.contains("STA $02"));
    }

    #[test]
    fn lowercase_mnemonics_config_is_honored() {
        let mut config = EmitterConfig::default();
        config.uppercase_mnemonics = false;
        let out = emit(&sample_module(), &config);
        assert!(out.text.contains("lda #$2A") || out.text.contains("lda #2A"));
    }

    #[test]
    fn hex_prefix_config_switches_to_0x() {
        let mut config = EmitterConfig::default();
        config.hex_prefix = HexPrefix::ZeroX;
        let out = emit(&sample_module(), &config);
        assert!(out.text.contains("0x0810"));
        assert!(!out.text.contains('$'));
    }

    #[test]
    fn suppressing_comments_drops_standalone_comment_lines() {
        let mut m = AsmModule::new();
        m.push(AsmItem::Comment { text: "hello".into(), style: CommentStyle::Standalone });
        m.push(AsmItem::instr("NOP", AddressingMode::Implied, None));
        let mut config = EmitterConfig::default();
        config.include_comments = false;
        let out = emit(&m, &config);
        assert!(!out.text.contains("hello"));
    }

    #[test]
    fn suppressing_blank_lines_removes_them() {
        let mut m = AsmModule::new();
        m.push(AsmItem::instr("NOP", AddressingMode::Implied, None));
        m.push(AsmItem::BlankLine);
        m.push(AsmItem::instr("RTS", AddressingMode::Implied, None));
        let mut config = EmitterConfig::default();
        config.include_blank_lines = false;
        let out = emit(&m, &config);
        assert_eq!(out.line_count, 2);
    }

    #[test]
    fn crlf_line_ending_is_honored() {
        let mut config = EmitterConfig::default();
        config.line_ending = crate::config::LineEnding::CrLf;
        let out = emit(&sample_module(), &config);
        assert!(out.text.contains("\r\n"));
    }

    #[test]
    fn data_directives_render_per_variant() {
        let mut m = AsmModule::new();
        m.push(AsmItem::Data { payload: DataPayload::Byte(vec![1, 2, 3]), comment: None });
        m.push(AsmItem::Data { payload: DataPayload::Word(vec![0x1234]), comment: None });
        m.push(AsmItem::Data { payload: DataPayload::Text("hi".into()), comment: None });
        m.push(AsmItem::Data { payload: DataPayload::Fill { count: 4, value: 0 }, comment: None });
        let out = emit(&m, &EmitterConfig::default());
        assert!(out.text.contains("!byte $01, $02, $03"));
        assert!(out.text.contains("!word $1234"));
        assert!(out.text.contains("!text \"hi\""));
        assert!(out.text.contains("!fill 4, $00"));
    }

    #[test]
    fn cycle_counts_append_when_enabled() {
        let mut config = EmitterConfig::default();
        config.include_cycle_counts = true;
        let out = emit(&sample_module(), &config);
        assert!(out.text.contains("2b 2c"));
    }

    #[test]
    fn instruction_span_is_recorded_in_source_map() {
        use blend65_base::{Position, Span};
        let mut m = AsmModule::new();
        let span = Span::point(Position::START);
        m.push(AsmItem::instr("NOP", AddressingMode::Implied, None).with_span(Some(span)));
        let out = emit(&m, &EmitterConfig::default());
        assert_eq!(out.source_map.len(), 1);
    }

    #[test]
    fn total_bytes_matches_rendered_text_length() {
        let out = emit(&sample_module(), &EmitterConfig::default());
        assert_eq!(out.total_bytes as usize, out.text.len());
    }
}
