use std::io::{self, Stdout, Write};

use colored::Colorize;

use crate::isa::Register;
use crate::runtime::RunState;

/// Text stream written by the `OUT` family of instructions.
///
/// Values are written back to back with no separators. Tracks whether the last character written
/// ended a line, so that status messages can start on a fresh one.
pub struct Output<W> {
    sink: W,
    line_start: bool,
}

impl Output<Stdout> {
    pub fn stdout() -> Self {
        Output::new(io::stdout())
    }
}

impl<W: Write> Output<W> {
    pub fn new(sink: W) -> Self {
        Output {
            sink,
            line_start: true,
        }
    }

    /// Print as a signed decimal integer.
    pub fn print_decimal(&mut self, value: u16) -> io::Result<()> {
        write!(self.sink, "{}", value as i16)?;
        self.line_start = false;
        Ok(())
    }

    /// Print a raw byte as a character.
    pub fn print_char(&mut self, ch: u8) -> io::Result<()> {
        self.sink.write_all(&[ch])?;
        self.line_start = ch == b'\n';
        Ok(())
    }

    pub fn is_line_start(&self) -> bool {
        self.line_start
    }

    pub fn start_new_line(&mut self) -> io::Result<()> {
        if !self.line_start {
            self.print_char(b'\n')?;
        }
        self.flush()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

/// Dump registers and flags to stderr.
pub fn print_registers(state: &RunState, minimal: bool) {
    let flags = state.flags();
    let flag_bits = format!(
        "{}{}{}",
        flags.zero as u8, flags.negative as u8, flags.overflow as u8
    );

    if minimal {
        for reg in Register::ALL {
            eprintln!("{} {}", reg, state.reg(reg));
        }
        eprintln!("PC {}", state.pc());
        eprintln!("ZNO {}", flag_bits);
        return;
    }

    eprintln!("{}", "┌───────────────────────────┐".dimmed());
    eprintln!(
        "{}        {}{}",
        "│".dimmed(),
        "hex     int    uint".italic(),
        " │".dimmed()
    );
    for reg in Register::ALL {
        let value = state.reg(reg);
        eprintln!(
            "{} {}  0x{:04x}  {:-6}  {:-6} {}",
            "│".dimmed(),
            reg.name().bold(),
            value,
            value as i16,
            value,
            "│".dimmed()
        );
    }
    eprintln!(
        "{} {}  0x{:04x}        {} {} {}",
        "│".dimmed(),
        "PC".bold(),
        state.pc(),
        "ZNO".bold(),
        flag_bits,
        "│".dimmed()
    );
    eprintln!("{}", "└───────────────────────────┘".dimmed());
}
