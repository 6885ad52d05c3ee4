//! BASIC auto-run stub.
//!
//! A C64 BASIC program is a chain of lines, each `(next_line_ptr: u16 LE,
//! line_number: u16 LE, tokens..., 0x00)`; the final line's `next_line_ptr`
//! chains to a phantom line whose own pointer is `0x0000`, which BASIC's
//! `RUN` reads as end-of-program.

use blend65_codegen::{AsmItem, CommentStyle, DataPayload};

const SYS_TOKEN: u8 = 0x9E;
const BASIC_LOAD_ADDRESS: u16 = 0x0801;

/// Builds the tokenized bytes for `10 SYS <ml_start>` as a standalone
/// BASIC program (no other lines).
fn tokenize_sys_line(ml_start: u16) -> Vec<u8> {
    let digits = ml_start.to_string().into_bytes();
    let mut body = Vec::with_capacity(2 + digits.len());
    body.push(SYS_TOKEN);
    body.push(b' ');
    body.extend(digits);
    body.push(0x00); // end of line

    let entry_len = 2 + 2 + body.len(); // link + line number + body
    let next_line_ptr = BASIC_LOAD_ADDRESS.wrapping_add(entry_len as u16);

    let mut bytes = Vec::with_capacity(entry_len + 2);
    bytes.extend(next_line_ptr.to_le_bytes());
    bytes.extend(10u16.to_le_bytes()); // line number 10
    bytes.extend(body);
    bytes.extend([0x00, 0x00]); // terminating phantom line, next_ptr = 0
    bytes
}

/// Produces the `Origin`/`Data`/`Origin` items that prefix a machine-code
/// module with a `SYS`-launching BASIC stub. `ml_start` is
/// the address the machine code itself will be placed at.
pub fn emit(ml_start: u16) -> Vec<AsmItem> {
    let bytes = tokenize_sys_line(ml_start);
    vec![
        AsmItem::Origin(BASIC_LOAD_ADDRESS),
        AsmItem::Comment { text: format!("BASIC stub: 10 SYS {ml_start}"), style: CommentStyle::Standalone },
        AsmItem::Data { payload: DataPayload::Byte(bytes), comment: None },
        AsmItem::Origin(ml_start),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_sys_line_with_correct_link() {
        let bytes = tokenize_sys_line(2061);
        // link(2) + lineno(2) + token+space+4digits(6) + eol(1) = 11 -> 0x080c
        assert_eq!(&bytes[0..2], &0x080cu16.to_le_bytes());
        assert_eq!(&bytes[2..4], &10u16.to_le_bytes());
        assert_eq!(bytes[4], SYS_TOKEN);
        assert_eq!(&bytes[5..11], b" 2061\0");
        assert_eq!(&bytes[11..13], &[0x00, 0x00]);
    }

    #[test]
    fn stub_items_bracket_origin() {
        let items = emit(0x080d);
        assert!(matches!(items[0], AsmItem::Origin(0x0801)));
        assert!(matches!(items.last(), Some(AsmItem::Origin(0x080d))));
    }
}
