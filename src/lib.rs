// Parsing
mod lexer;
mod parser;
pub use parser::AsmParser;
mod air;
pub use air::{Air, AirStmt, AsmLine, Operand};
mod symbol;
pub use symbol::{InsertError, Span, SrcOffset, SymbolTable};

// Instruction set
pub mod isa;
mod disasm;
pub use disasm::{disassemble, DisasmLine};

// Running
mod runtime;
pub use runtime::{Flags, RunState, Status};
mod output;
pub use output::{print_registers, Output};

mod error;
pub use error::{AsmError, Fault};

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;

/// Assemble a whole source file into the program loaded at address 0.
pub fn assemble(src: &str) -> Result<Vec<u8>, AsmError> {
    AsmParser::new(src)?.parse()?.emit()
}
