//! The ASM-IL model: a typed representation of
//! 6502 assembly built by the code generator, mutated in place by the
//! optimizer's peephole passes, and finally read (never mutated) by the
//! emitter.

use blend65_base::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
    Relative,
}

/// An instruction operand: an immediate value, a resolved absolute
/// address, or a not-yet-resolved label reference (a branch target or a
/// `JSR` callee) that the emitter prints by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Immediate(u8),
    Address(u16),
    Label(String),
}

impl Operand {
    pub fn as_address(&self) -> Option<u16> {
        match self {
            Operand::Address(a) => Some(*a),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Function,
    Block,
    Temp,
    Exported,
}

/// One data directive's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataPayload {
    Byte(Vec<u8>),
    Word(Vec<u16>),
    Text(String),
    /// `count` repetitions of `value`.
    Fill { count: u32, value: u8 },
}

impl DataPayload {
    /// Encoded size in bytes, used for [`crate::codegen::CodegenStats`]
    /// and the Static Frame Allocator's placement above program code.
    pub fn size_bytes(&self) -> u32 {
        match self {
            DataPayload::Byte(v) => v.len() as u32,
            DataPayload::Word(v) => v.len() as u32 * 2,
            DataPayload::Text(s) => s.len() as u32,
            DataPayload::Fill { count, .. } => *count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `; trailing comment on the same line as an instruction`.
    Trailing,
    /// `; comment on its own line`.
    Standalone,
}

/// One item in an [`AsmModule`]'s ordered item list.
#[derive(Debug, Clone)]
pub enum AsmItem {
    Origin(u16),
    Label { name: String, kind: LabelKind, span: Option<Span> },
    Instruction {
        mnemonic: &'static str,
        mode: AddressingMode,
        operand: Option<Operand>,
        cycles: Option<u8>,
        bytes: u8,
        comment: Option<String>,
        span: Option<Span>,
    },
    Data { payload: DataPayload, comment: Option<String> },
    Comment { text: String, style: CommentStyle },
    BlankLine,
    /// Verbatim text passed through unmodified, used for the BASIC
    /// auto-run stub's tokenized line.
    Raw(String),
}

impl AsmItem {
    pub fn instr(mnemonic: &'static str, mode: AddressingMode, operand: Option<Operand>) -> AsmItem {
        let (bytes, cycles) = crate::codegen::instruction_size_and_cycles(mnemonic, mode);
        AsmItem::Instruction { mnemonic, mode, operand, cycles, bytes, comment: None, span: None }
    }

    pub fn with_span(mut self, span: Option<Span>) -> AsmItem {
        if let AsmItem::Instruction { span: s, .. } = &mut self {
            *s = span;
        }
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> AsmItem {
        match &mut self {
            AsmItem::Instruction { comment: c, .. } | AsmItem::Data { comment: c, .. } => *c = Some(comment.into()),
            _ => {}
        }
        self
    }

    /// Static byte count this item contributes to the image, used by
    /// [`crate::codegen::CodegenStats`] and address-fixup passes.
    pub fn size_bytes(&self) -> u32 {
        match self {
            AsmItem::Instruction { bytes, .. } => *bytes as u32,
            AsmItem::Data { payload, .. } => payload.size_bytes(),
            _ => 0,
        }
    }
}

/// An ordered sequence of [`AsmItem`]s. The
/// optimizer mutates this in place; the emitter only reads it.
#[derive(Debug, Clone, Default)]
pub struct AsmModule {
    pub items: Vec<AsmItem>,
}

impl AsmModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: AsmItem) {
        self.items.push(item);
    }

    pub fn total_size(&self) -> u32 {
        self.items.iter().map(AsmItem::size_bytes).sum()
    }

    /// All labels defined anywhere in the module, in definition order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|i| match i {
            AsmItem::Label { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }
}
