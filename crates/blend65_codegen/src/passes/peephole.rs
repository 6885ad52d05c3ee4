//! Optional O1+ peephole passes on ASM-IL: redundant-load elimination,
//! dead-store elimination to addresses never read, `JMP`-chain
//! collapsing, `TAX;TXA` pairs, and `ADC #1 -> INC` when carry is known
//! clear.
//!
//! Every pass here is a local, single-pass-manager-iteration rewrite over
//! the flat `AsmModule::items` list rather than a full dataflow analysis —
//! appropriate for a peephole optimizer, and safe because none of them
//! touch a side-effectful instruction.

use crate::asmil::{AddressingMode, AsmItem, AsmModule, Operand};
use crate::pass::AsmPass;
use rustc_hash::FxHashMap;

fn instr_parts(item: &AsmItem) -> Option<(&str, AddressingMode, Option<&Operand>)> {
    match item {
        AsmItem::Instruction { mnemonic, mode, operand, .. } => Some((mnemonic, *mode, operand.as_ref())),
        _ => None,
    }
}

fn same_target(a: Option<&Operand>, b: Option<&Operand>) -> bool {
    a == b
}

fn memory_addressing(mode: AddressingMode) -> bool {
    !matches!(mode, AddressingMode::Implied | AddressingMode::Accumulator | AddressingMode::Immediate | AddressingMode::Relative)
}

fn is_control_transfer(mnemonic: &str) -> bool {
    matches!(mnemonic, "JMP" | "JSR" | "RTS" | "RTI") || mnemonic.starts_with('B')
}

/// Removes an `LDA addr` that immediately follows an `STA` to the same
/// address — the accumulator already holds that value.
pub struct RedundantLoadPass;

impl AsmPass for RedundantLoadPass {
    fn name(&self) -> &'static str {
        "redundant-load-elimination"
    }

    fn run(&self, module: &mut AsmModule) -> bool {
        let mut changed = false;
        let mut i = 0;
        while i + 1 < module.items.len() {
            let remove = match (instr_parts(&module.items[i]), instr_parts(&module.items[i + 1])) {
                (Some(("STA", sm, so)), Some(("LDA", lm, lo))) => sm == lm && same_target(so, lo),
                _ => false,
            };
            if remove {
                module.items.remove(i + 1);
                changed = true;
            } else {
                i += 1;
            }
        }
        changed
    }
}

/// Removes a `STA addr` immediately shadowed by a second `STA` to the
/// same address within the same label-free run, when no load of that
/// address happened in between (the first store's value is never read).
pub struct DeadStoreEliminationPass;

impl AsmPass for DeadStoreEliminationPass {
    fn name(&self) -> &'static str {
        "dead-store-elimination"
    }

    fn run(&self, module: &mut AsmModule) -> bool {
        let mut to_remove = Vec::new();
        let mut last_store: FxHashMap<(String, AddressingMode), usize> = FxHashMap::default();
        for (idx, item) in module.items.iter().enumerate() {
            match item {
                // A label is a possible jump target: any store tracked up
                // to here might be read by a path that skips straight to
                // it, so forget everything rather than risk a false
                // elimination.
                AsmItem::Label { .. } => last_store.clear(),
                // Control transfer: the rest of the run might not execute
                // in sequence, so stop tracking entirely. Checked before
                // the memory-operand rule below since a JMP/JSR target is
                // a label, not a data read.
                AsmItem::Instruction { mnemonic, .. } if is_control_transfer(mnemonic) => last_store.clear(),
                AsmItem::Instruction { mnemonic, mode, operand: Some(op), .. } if matches!(*mnemonic, "STA" | "STX" | "STY") => {
                    let key = (format!("{op:?}"), *mode);
                    if let Some(&prev) = last_store.get(&key) {
                        to_remove.push(prev);
                    }
                    last_store.insert(key, idx);
                }
                // Any other instruction addressing memory (a load, a
                // compare, a read-modify-write like INC) reads that
                // address, so its last store is no longer provably dead.
                AsmItem::Instruction { mode, operand: Some(op), .. } if memory_addressing(*mode) => {
                    last_store.remove(&(format!("{op:?}"), *mode));
                }
                AsmItem::Instruction { .. } => {}
                _ => {}
            }
        }
        if to_remove.is_empty() {
            return false;
        }
        to_remove.sort_unstable();
        to_remove.dedup();
        for idx in to_remove.into_iter().rev() {
            module.items.remove(idx);
        }
        true
    }
}

/// Collapses `JMP a` where label `a` is immediately followed by another
/// unconditional `JMP b`, so the first jump targets `b` directly.
pub struct JmpChainCollapsePass;

impl AsmPass for JmpChainCollapsePass {
    fn name(&self) -> &'static str {
        "jmp-chain-collapse"
    }

    fn run(&self, module: &mut AsmModule) -> bool {
        let mut label_index: FxHashMap<String, usize> = FxHashMap::default();
        for (idx, item) in module.items.iter().enumerate() {
            if let AsmItem::Label { name, .. } = item {
                label_index.insert(name.clone(), idx);
            }
        }
        let final_targets: FxHashMap<String, String> = label_index
            .iter()
            .filter_map(|(label, &idx)| {
                let next = module.items[idx + 1..].iter().find(|i| !matches!(i, AsmItem::BlankLine | AsmItem::Comment { .. }))?;
                match next {
                    AsmItem::Instruction { mnemonic, operand: Some(Operand::Label(target)), .. } if *mnemonic == "JMP" => Some((label.clone(), target.clone())),
                    _ => None,
                }
            })
            .collect();

        let mut changed = false;
        for item in &mut module.items {
            if let AsmItem::Instruction { mnemonic, operand: Some(Operand::Label(target)), .. } = item {
                if *mnemonic == "JMP" || mnemonic.starts_with('B') {
                    if let Some(resolved) = final_targets.get(target) {
                        if resolved != target {
                            *target = resolved.clone();
                            changed = true;
                        }
                    }
                }
            }
        }
        changed
    }
}

/// Removes an adjacent `TAX; TXA` or `TXA; TAX` pair: the second transfer
/// undoes the first and the accumulator/X register end up unchanged.
pub struct TaxTxaPairPass;

impl AsmPass for TaxTxaPairPass {
    fn name(&self) -> &'static str {
        "tax-txa-pair-removal"
    }

    fn run(&self, module: &mut AsmModule) -> bool {
        let mut changed = false;
        let mut i = 0;
        while i + 1 < module.items.len() {
            let pair = match (instr_parts(&module.items[i]), instr_parts(&module.items[i + 1])) {
                (Some(("TAX", _, _)), Some(("TXA", _, _))) => true,
                (Some(("TXA", _, _)), Some(("TAX", _, _))) => true,
                _ => false,
            };
            if pair {
                module.items.drain(i..i + 2);
                changed = true;
            } else {
                i += 1;
            }
        }
        changed
    }
}

/// Rewrites `LDA X; CLC; ADC #1; STA X` into `INC X` when the accumulator
/// round-trips through the same address and the literal operand is
/// exactly 1 — `INC` leaves the same result and is shorter.
pub struct AdcIncPass;

impl AsmPass for AdcIncPass {
    fn name(&self) -> &'static str {
        "adc-one-to-inc"
    }

    fn run(&self, module: &mut AsmModule) -> bool {
        let mut changed = false;
        let mut i = 0;
        while i + 3 < module.items.len() {
            let window = [&module.items[i], &module.items[i + 1], &module.items[i + 2], &module.items[i + 3]];
            let matched = match (instr_parts(window[0]), instr_parts(window[1]), instr_parts(window[2]), instr_parts(window[3])) {
                (Some(("LDA", lm, Some(laddr))), Some(("CLC", ..)), Some(("ADC", AddressingMode::Immediate, Some(Operand::Immediate(1)))), Some(("STA", sm, Some(saddr)))) => {
                    lm == sm && laddr == saddr
                }
                _ => false,
            };
            if matched {
                let (mode, op) = match instr_parts(window[0]) {
                    Some((_, mode, Some(op))) => (mode, op.clone()),
                    _ => unreachable!(),
                };
                module.items.splice(i..i + 4, [AsmItem::instr("INC", mode, Some(op))]);
                changed = true;
            } else {
                i += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asmil::{AddressingMode, DataPayload};

    fn sta_lda(addr: u16) -> Vec<AsmItem> {
        vec![AsmItem::instr("STA", AddressingMode::ZeroPage, Some(Operand::Address(addr))), AsmItem::instr("LDA", AddressingMode::ZeroPage, Some(Operand::Address(addr)))]
    }

    #[test]
    fn redundant_load_is_removed() {
        let mut module = AsmModule { items: sta_lda(0x10) };
        let changed = RedundantLoadPass.run(&mut module);
        assert!(changed);
        assert_eq!(module.items.len(), 1);
    }

    #[test]
    fn dead_store_keeps_only_the_final_write() {
        let mut module = AsmModule {
            items: vec![
                AsmItem::instr("STA", AddressingMode::ZeroPage, Some(Operand::Address(0x10))),
                AsmItem::instr("STA", AddressingMode::ZeroPage, Some(Operand::Address(0x10))),
            ],
        };
        let changed = DeadStoreEliminationPass.run(&mut module);
        assert!(changed);
        assert_eq!(module.items.len(), 1);
    }

    #[test]
    fn jmp_chain_collapses_to_final_target() {
        let mut module = AsmModule {
            items: vec![
                AsmItem::instr("JMP", AddressingMode::Absolute, Some(Operand::Label("a".into()))),
                AsmItem::Label { name: "a".into(), kind: crate::asmil::LabelKind::Temp, span: None },
                AsmItem::instr("JMP", AddressingMode::Absolute, Some(Operand::Label("b".into()))),
            ],
        };
        let changed = JmpChainCollapsePass.run(&mut module);
        assert!(changed);
        let AsmItem::Instruction { operand: Some(Operand::Label(target)), .. } = &module.items[0] else { panic!() };
        assert_eq!(target, "b");
    }

    #[test]
    fn tax_txa_pair_is_removed() {
        let mut module = AsmModule { items: vec![AsmItem::instr("TAX", AddressingMode::Implied, None), AsmItem::instr("TXA", AddressingMode::Implied, None)] };
        let changed = TaxTxaPairPass.run(&mut module);
        assert!(changed);
        assert!(module.items.is_empty());
    }

    #[test]
    fn adc_one_becomes_inc() {
        let mut module = AsmModule {
            items: vec![
                AsmItem::instr("LDA", AddressingMode::ZeroPage, Some(Operand::Address(0x20))),
                AsmItem::instr("CLC", AddressingMode::Implied, None),
                AsmItem::instr("ADC", AddressingMode::Immediate, Some(Operand::Immediate(1))),
                AsmItem::instr("STA", AddressingMode::ZeroPage, Some(Operand::Address(0x20))),
            ],
        };
        let changed = AdcIncPass.run(&mut module);
        assert!(changed);
        assert_eq!(module.items.len(), 1);
        let AsmItem::Instruction { mnemonic, .. } = &module.items[0] else { panic!() };
        assert_eq!(*mnemonic, "INC");
    }

    #[test]
    fn unrelated_fill_data_is_left_alone() {
        let mut module = AsmModule { items: vec![AsmItem::Data { payload: DataPayload::Fill { count: 4, value: 0 }, comment: None }] };
        assert!(!RedundantLoadPass.run(&mut module));
        assert!(!DeadStoreEliminationPass.run(&mut module));
    }
}
