use std::fmt;

use crate::isa::{Instr, MEMORY_SIZE};

/// One entry of a disassembly listing.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DisasmLine {
    pub addr: u16,
    pub bytes: Vec<u8>,
    pub text: String,
}

/// Decode `program` from address 0, one instruction after another.
///
/// Bytes that do not decode are listed as `DATA` words, or as a single raw byte at the very end.
/// Anything past the end of machine memory is ignored.
pub fn disassemble(program: &[u8]) -> Vec<DisasmLine> {
    let program = &program[..program.len().min(MEMORY_SIZE)];
    let mut lines = Vec::new();
    let mut at = 0;

    while at < program.len() {
        let (width, text) = match Instr::decode(program, at as u16) {
            Ok(instr) => (instr.width() as usize, instr.to_string()),
            Err(_) if at + 1 < program.len() => {
                let word = u16::from_be_bytes([program[at], program[at + 1]]);
                (2, format!("DATA 0x{word:04x}"))
            }
            Err(_) => (1, format!(".byte 0x{:02x}", program[at])),
        };
        lines.push(DisasmLine {
            addr: at as u16,
            bytes: program[at..at + width].to_vec(),
            text,
        });
        at += width;
    }
    lines
}

impl fmt::Display for DisasmLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self
            .bytes
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "0x{:04x}  {:<11}  {}", self.addr, bytes, self.text)
    }
}
