use std::{error::Error, fmt, io};

use miette::{miette, LabeledSpan, Report, Severity, SourceCode};

use crate::{isa::RegClass, symbol::Span};

/// Error assembling a source file. Every variant aborts assembly.
///
/// `line` counts from 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsmError {
    Syntax {
        line: usize,
        span: Span,
        reason: String,
    },
    UnknownInstruction {
        line: usize,
        span: Span,
        name: String,
    },
    InvalidRegister {
        line: usize,
        span: Span,
        name: String,
        expected: RegClass,
    },
    SymbolTableOverflow {
        line: usize,
        span: Span,
    },
    DuplicateLabel {
        line: usize,
        span: Span,
        name: String,
    },
    /// Only jump targets fail this way.
    UndefinedLabel {
        line: usize,
        span: Span,
        name: String,
    },
    LineTooLong {
        line: usize,
        span: Span,
    },
    TooManyLines {
        count: usize,
    },
}

impl AsmError {
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Syntax { span, .. }
            | Self::UnknownInstruction { span, .. }
            | Self::InvalidRegister { span, .. }
            | Self::SymbolTableOverflow { span, .. }
            | Self::DuplicateLabel { span, .. }
            | Self::UndefinedLabel { span, .. }
            | Self::LineTooLong { span, .. } => Some(*span),
            Self::TooManyLines { .. } => None,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "asm::syntax",
            Self::UnknownInstruction { .. } => "asm::unknown_instruction",
            Self::InvalidRegister { .. } => "asm::invalid_register",
            Self::SymbolTableOverflow { .. } => "asm::symbol_table_overflow",
            Self::DuplicateLabel { .. } => "asm::duplicate_label",
            Self::UndefinedLabel { .. } => "asm::undefined_label",
            Self::LineTooLong { .. } => "asm::line_too_long",
            Self::TooManyLines { .. } => "asm::too_many_lines",
        }
    }

    fn help(&self) -> String {
        match self {
            Self::Syntax { .. } => {
                "operands are separated by commas; values are labels or literals like 10, -3 or 0x1f"
                    .to_string()
            }
            Self::UnknownInstruction { .. } => {
                "a line is an optional label followed by an instruction or DATA".to_string()
            }
            Self::InvalidRegister { expected, .. } => {
                format!("this operand accepts {}", expected.describe())
            }
            Self::SymbolTableOverflow { .. } => format!(
                "at most {} labels are allowed per file",
                crate::symbol::SYMBOL_TABLE_CAPACITY
            ),
            Self::DuplicateLabel { .. } => "labels are only allowed once per file".to_string(),
            Self::UndefinedLabel { .. } => {
                "jump targets must be labels defined somewhere in the file".to_string()
            }
            Self::LineTooLong { .. } => format!(
                "lines must be shorter than {} characters",
                crate::lexer::MAX_LINE_LENGTH
            ),
            Self::TooManyLines { .. } => format!(
                "source files may be at most {} lines long",
                crate::lexer::MAX_LINES
            ),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "here",
            Self::UnknownInstruction { .. } => "unknown instruction",
            Self::InvalidRegister { .. } => "invalid register",
            Self::SymbolTableOverflow { .. } => "one label too many",
            Self::DuplicateLabel { .. } => "duplicate label",
            Self::UndefinedLabel { .. } => "undefined label",
            Self::LineTooLong { .. } => "line too long",
            Self::TooManyLines { .. } => "",
        }
    }

    /// Render as a diagnostic pointing into `src`.
    pub fn report<S>(self, src: S) -> Report
    where
        S: SourceCode + Send + Sync + 'static,
    {
        let labels = match self.span() {
            Some(span) => vec![LabeledSpan::at(span, self.label())],
            None => Vec::new(),
        };
        miette!(
            severity = Severity::Error,
            code = self.code(),
            help = self.help(),
            labels = labels,
            "{}",
            self
        )
        .with_source_code(src)
    }
}

impl Error for AsmError {}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { line, reason, .. } => write!(f, "Syntax error on line {line}: {reason}"),
            Self::UnknownInstruction { line, name, .. } => {
                write!(f, "Unknown instruction `{name}` on line {line}")
            }
            Self::InvalidRegister { line, name, .. } => {
                write!(f, "Invalid register `{name}` on line {line}")
            }
            Self::SymbolTableOverflow { line, .. } => {
                write!(f, "Symbol table overflow on line {line}")
            }
            Self::DuplicateLabel { line, name, .. } => {
                write!(f, "Duplicate label `{name}` on line {line}")
            }
            Self::UndefinedLabel { line, name, .. } => {
                write!(f, "Undefined label `{name}` on line {line}")
            }
            Self::LineTooLong { line, .. } => write!(f, "Line {line} is too long"),
            Self::TooManyLines { count } => write!(f, "Source has too many lines ({count})"),
        }
    }
}

/// Reason the machine stopped without reaching `HALT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    InvalidOpcode { opcode: u8, pc: u16 },
    InvalidRegister { code: u8, pc: u16 },
    MemoryOutOfBounds { addr: usize, pc: u16 },
    InvalidJumpTarget { target: u16, pc: u16 },
    ProgramTooLarge { len: usize },
    Io { kind: io::ErrorKind },
}

impl Fault {
    pub fn pc(&self) -> Option<u16> {
        match self {
            Self::InvalidOpcode { pc, .. }
            | Self::InvalidRegister { pc, .. }
            | Self::MemoryOutOfBounds { pc, .. }
            | Self::InvalidJumpTarget { pc, .. } => Some(*pc),
            Self::ProgramTooLarge { .. } | Self::Io { .. } => None,
        }
    }

    pub fn report(self) -> Report {
        let (code, help) = match self {
            Self::InvalidOpcode { .. } => (
                "run::invalid_opcode",
                "execution probably ran into data; make sure every path ends in HALT",
            ),
            Self::InvalidRegister { .. } => (
                "run::invalid_register",
                "the register byte does not name a register this instruction accepts",
            ),
            Self::MemoryOutOfBounds { .. } => (
                "run::out_of_bounds",
                "addresses must leave room for the whole value below 0x8000",
            ),
            Self::InvalidJumpTarget { .. } => (
                "run::invalid_jump",
                "jump targets must lie below 0x8000",
            ),
            Self::ProgramTooLarge { .. } => (
                "run::program_too_large",
                "programs are loaded at address 0 into 32768 bytes of memory",
            ),
            Self::Io { .. } => ("run::io", "the output stream could not be written"),
        };
        miette!(severity = Severity::Error, code = code, help = help, "{}", self)
    }
}

impl From<io::Error> for Fault {
    fn from(value: io::Error) -> Self {
        Fault::Io { kind: value.kind() }
    }
}

impl Error for Fault {}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOpcode { opcode, pc } => {
                write!(f, "Unknown opcode 0x{opcode:02x} at PC = 0x{pc:04x}")
            }
            Self::InvalidRegister { code, pc } => {
                write!(f, "Invalid register code {code} at PC = 0x{pc:04x}")
            }
            Self::MemoryOutOfBounds { addr, pc } => {
                write!(f, "Memory access out of bounds at address 0x{addr:04x} (PC = 0x{pc:04x})")
            }
            Self::InvalidJumpTarget { target, pc } => {
                write!(f, "Jump to invalid memory 0x{target:04x} at PC = 0x{pc:04x}")
            }
            Self::ProgramTooLarge { len } => {
                write!(f, "Program of {len} bytes does not fit in memory")
            }
            Self::Io { kind } => write!(f, "Failed to write output: {kind}"),
        }
    }
}
