//! VICE-style label list generation.
//!
//! Every [`AsmItem`] already carries its own encoded byte size, so a
//! single linear pass reproduces the addresses ACME itself would assign:
//! track a program counter that resets at each `Origin` and advances by
//! every item's `size_bytes()`, recording the counter whenever a `Label`
//! item is seen.

use blend65_codegen::{AsmItem, AsmModule};

/// `(label name, resolved address)` pairs in definition order.
pub fn label_addresses(module: &AsmModule) -> Vec<(String, u16)> {
    let mut pc: u32 = 0;
    let mut out = Vec::new();
    for item in &module.items {
        match item {
            AsmItem::Origin(addr) => pc = *addr as u32,
            AsmItem::Label { name, .. } => out.push((name.clone(), pc as u16)),
            _ => pc += item.size_bytes(),
        }
    }
    out
}

fn sanitize_label(name: &str) -> String {
    name.trim_start_matches(['+', '.', '_']).to_string()
}

/// Renders a VICE monitor `al <addr> .<label>` label list, one per line.
pub fn vice_label_file(module: &AsmModule) -> String {
    let mut text = String::new();
    for (name, addr) in label_addresses(module) {
        text.push_str(&format!("al {addr:04X} .{}\n", sanitize_label(&name)));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use blend65_codegen::{AddressingMode, LabelKind};

    #[test]
    fn label_address_tracks_running_program_counter() {
        let mut m = AsmModule::new();
        m.push(AsmItem::Origin(0x0810));
        m.push(AsmItem::Label { name: "_main".into(), kind: LabelKind::Exported, span: None });
        m.push(AsmItem::instr("LDA", AddressingMode::Immediate, Some(blend65_codegen::Operand::Immediate(1))));
        m.push(AsmItem::Label { name: ".Lb1".into(), kind: LabelKind::Block, span: None });
        let addrs = label_addresses(&m);
        assert_eq!(addrs, vec![("_main".to_string(), 0x0810), (".Lb1".to_string(), 0x0812)]);
    }

    #[test]
    fn vice_file_strips_decoration_prefixes() {
        let mut m = AsmModule::new();
        m.push(AsmItem::Origin(0x0810));
        m.push(AsmItem::Label { name: "_main".into(), kind: LabelKind::Exported, span: None });
        let text = vice_label_file(&m);
        assert_eq!(text, "al 0810 .main\n");
    }
}
