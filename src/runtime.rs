use std::io::Write;

use colored::Colorize;

use crate::{
    error::Fault,
    isa::{Instr, Opcode, Operands, Register, MEMORY_SIZE},
    output::Output,
};

/// Represents complete machine state during runtime.
pub struct RunState {
    /// System memory, 32KB in size
    mem: Box<[u8; MEMORY_SIZE]>,
    /// Program counter
    pc: u16,
    /// Indexed by register code
    reg: [u16; 4],
    flags: Flags,
    status: Status,
    /// Log each instruction to stderr before it executes
    trace: bool,
}

/// Condition flags, set by loads into general registers and by arithmetic.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Flags {
    pub zero: bool,
    pub negative: bool,
    /// Only arithmetic changes this flag
    pub overflow: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    Running,
    Halted,
    Faulted,
}

impl RunState {
    /// Load a raw program at address 0.
    pub fn from_raw(raw: &[u8]) -> Result<RunState, Fault> {
        if raw.len() > MEMORY_SIZE {
            return Err(Fault::ProgramTooLarge { len: raw.len() });
        }
        let mut mem = Box::new([0; MEMORY_SIZE]);
        mem[..raw.len()].copy_from_slice(raw);

        Ok(RunState {
            mem,
            pc: 0,
            reg: [0; 4],
            flags: Flags::default(),
            status: Status::Running,
            trace: false,
        })
    }

    pub fn set_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn reg(&self, reg: Register) -> u16 {
        self.reg[reg.code() as usize]
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn mem(&self) -> &[u8] {
        &self.mem[..]
    }

    /// Run until `HALT` or a fault.
    pub fn run<W: Write>(&mut self, out: &mut Output<W>) -> Result<(), Fault> {
        let result = loop {
            match self.step(out) {
                Ok(Status::Running) => continue,
                Ok(_) => break Ok(()),
                Err(fault) => break Err(fault),
            }
        };
        let flushed = out.flush();
        result.and(flushed.map_err(Fault::from))
    }

    /// Execute a single instruction. Does nothing once the machine has stopped.
    pub fn step<W: Write>(&mut self, out: &mut Output<W>) -> Result<Status, Fault> {
        if self.status != Status::Running {
            return Ok(self.status);
        }
        match self.exec(out) {
            Ok(()) => Ok(self.status),
            Err(fault) => {
                self.status = Status::Faulted;
                Err(fault)
            }
        }
    }

    fn exec<W: Write>(&mut self, out: &mut Output<W>) -> Result<(), Fault> {
        let pc = self.pc;
        let instr = Instr::decode(&self.mem[..], pc)?;
        if self.trace {
            eprintln!("{:>12} 0x{:04x}  {}", "Trace".cyan().bold(), pc, instr);
        }
        // PC incremented before instruction is performed
        self.pc = pc + instr.width();

        match (instr.opcode, instr.operands) {
            (Opcode::Halt, _) => self.status = Status::Halted,
            (Opcode::Load, Operands::RegImm(reg, value)) => self.load(reg, value),
            (Opcode::LoadInd, Operands::Pair { low, high }) => {
                let value = self.read_word(self.reg(high), pc)?;
                self.load(low, value);
            }
            (Opcode::Store, Operands::RegImm(reg, addr)) => {
                self.write_word(addr, self.reg(reg), pc)?
            }
            (Opcode::StoreInd, Operands::Pair { low, high }) => {
                self.write_word(self.reg(high), self.reg(low), pc)?
            }
            (Opcode::Jmp, Operands::Jump(target)) => self.jump(target, pc)?,
            (Opcode::JmpZ, Operands::Jump(target)) if self.flags.zero => self.jump(target, pc)?,
            (Opcode::JmpN, Operands::Jump(target)) if self.flags.negative => {
                self.jump(target, pc)?
            }
            (Opcode::JmpO, Operands::Jump(target)) if self.flags.overflow => {
                self.jump(target, pc)?
            }
            (Opcode::JmpZ | Opcode::JmpN | Opcode::JmpO, _) => (),
            (Opcode::Add, Operands::RegImm(reg, value)) => self.arith(reg, value, false),
            (Opcode::AddReg, Operands::Pair { low, high }) => {
                self.arith(low, self.reg(high), false)
            }
            (Opcode::Sub, Operands::RegImm(reg, value)) => self.arith(reg, value, true),
            (Opcode::SubReg, Operands::Pair { low, high }) => self.arith(low, self.reg(high), true),
            (Opcode::Out, Operands::Imm(value)) => out.print_decimal(value)?,
            (Opcode::OutChar, Operands::Imm(value)) => out.print_char(value as u8)?,
            (Opcode::OutReg, Operands::Reg(reg)) => out.print_decimal(self.reg(reg))?,
            (Opcode::OutRegChar, Operands::Reg(reg)) => out.print_char(self.reg(reg) as u8)?,
            (Opcode::OutInd, Operands::Reg(reg)) => {
                out.print_decimal(self.read_word(self.reg(reg), pc)?)?
            }
            (Opcode::OutIndChar, Operands::Reg(reg)) => {
                out.print_char(self.read_byte(self.reg(reg), pc)?)?
            }
            (opcode, operands) => unreachable!("{opcode:?} decoded with {operands:?}"),
        }
        Ok(())
    }

    fn load(&mut self, reg: Register, value: u16) {
        self.reg[reg.code() as usize] = value;
        if reg.is_general() {
            self.set_zn(value);
        }
    }

    /// Wrapping 16-bit `reg += rhs` or `reg -= rhs`, setting every flag.
    fn arith(&mut self, reg: Register, rhs: u16, subtract: bool) {
        let lhs = self.reg(reg) as i16;
        let (result, overflow) = if subtract {
            lhs.overflowing_sub(rhs as i16)
        } else {
            lhs.overflowing_add(rhs as i16)
        };
        let result = result as u16;
        self.reg[reg.code() as usize] = result;
        self.set_zn(result);
        self.flags.overflow = overflow;
    }

    #[inline]
    fn set_zn(&mut self, value: u16) {
        self.flags.zero = value == 0;
        self.flags.negative = value & 0x8000 != 0;
    }

    fn jump(&mut self, target: u16, pc: u16) -> Result<(), Fault> {
        if target as usize >= MEMORY_SIZE {
            return Err(Fault::InvalidJumpTarget { target, pc });
        }
        self.pc = target;
        Ok(())
    }

    fn check_bounds(addr: u16, len: usize, pc: u16) -> Result<usize, Fault> {
        let start = addr as usize;
        let last = start + len - 1;
        if last >= MEMORY_SIZE {
            let addr = start.max(MEMORY_SIZE);
            return Err(Fault::MemoryOutOfBounds { addr, pc });
        }
        Ok(start)
    }

    fn read_byte(&self, addr: u16, pc: u16) -> Result<u8, Fault> {
        let at = Self::check_bounds(addr, 1, pc)?;
        Ok(self.mem[at])
    }

    fn read_word(&self, addr: u16, pc: u16) -> Result<u16, Fault> {
        let at = Self::check_bounds(addr, 2, pc)?;
        Ok(u16::from_be_bytes([self.mem[at], self.mem[at + 1]]))
    }

    fn write_word(&mut self, addr: u16, value: u16, pc: u16) -> Result<(), Fault> {
        let at = Self::check_bounds(addr, 2, pc)?;
        self.mem[at..at + 2].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }
}
