//! Instruction set shared by the assembler, the machine and the disassembler.
//!
//! [`define_opcodes!`] holds the only opcode table. Every width, register class and operand layout
//! is derived from an opcode's [`Shape`], so the size the assembler assumes while collecting labels
//! is the size the encoder writes and the size the machine decodes.
//!
//! # Encoding
//!
//! | Shape     | Bytes | Layout                                                 |
//! |-----------|-------|--------------------------------------------------------|
//! | `Bare`    | 1     | opcode                                                 |
//! | `RegPair` | 2     | opcode, `hh0000ll` (high register, low register)       |
//! | `RegImm`  | 4     | opcode, register, big-endian u16                       |
//! | `Imm`     | 4     | opcode, unused, big-endian u16                         |
//! | `Reg`     | 2     | opcode, register                                       |
//! | `Jump`    | 4     | opcode, unused, big-endian target                      |
//! | `Data`    | 2     | big-endian u16, no opcode                              |

use std::fmt;
use std::str::FromStr;

use crate::error::Fault;

/// Size of machine memory in bytes.
pub const MEMORY_SIZE: usize = 0x8000;

/// Represents the CPU registers, by their 2-bit encoding.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    R2 = 0,
    R1 = 1,
    A2 = 2,
    A1 = 3,
}

impl Register {
    pub const ALL: [Register; 4] = [Register::R1, Register::R2, Register::A1, Register::A2];

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Register> {
        match code {
            0 => Some(Register::R2),
            1 => Some(Register::R1),
            2 => Some(Register::A2),
            3 => Some(Register::A1),
            _ => None,
        }
    }

    /// R1 and R2 hold data and set flags when loaded.
    pub fn is_general(self) -> bool {
        matches!(self, Register::R1 | Register::R2)
    }

    pub fn is_in(self, class: RegClass) -> bool {
        match class {
            RegClass::Any => true,
            RegClass::General => self.is_general(),
            RegClass::Address => !self.is_general(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::R1 => "R1",
            Register::R2 => "R2",
            Register::A1 => "A1",
            Register::A2 => "A2",
        }
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "R1" => Ok(Register::R1),
            "R2" => Ok(Register::R2),
            "A1" => Ok(Register::A1),
            "A2" => Ok(Register::A2),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of registers an operand slot accepts.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RegClass {
    Any,
    General,
    Address,
}

impl RegClass {
    pub fn describe(self) -> &'static str {
        match self {
            RegClass::Any => "R1, R2, A1 or A2",
            RegClass::General => "R1 or R2",
            RegClass::Address => "A1 or A2",
        }
    }
}

/// Operand layout of an instruction. Determines its width in bytes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Shape {
    Bare,
    /// Low register is written as the first operand, high register as the second.
    RegPair { low: RegClass, high: RegClass },
    RegImm(RegClass),
    Imm,
    Reg(RegClass),
    Jump,
    Data,
}

impl Shape {
    pub const fn width(self) -> u16 {
        match self {
            Shape::Bare => 1,
            Shape::RegPair { .. } | Shape::Reg(_) | Shape::Data => 2,
            Shape::RegImm(_) | Shape::Imm | Shape::Jump => 4,
        }
    }

    /// Number of comma-separated operands in source.
    pub const fn arity(self) -> usize {
        match self {
            Shape::Bare => 0,
            Shape::Imm | Shape::Reg(_) | Shape::Jump | Shape::Data => 1,
            Shape::RegPair { .. } | Shape::RegImm(_) => 2,
        }
    }
}

macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => $shape:expr
        ),* $(,)?
    ) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name,)*];

            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => $mnemonic,)*
                }
            }

            pub const fn shape(self) -> Shape {
                match self {
                    $(Opcode::$name => $shape,)*
                }
            }
        }

        impl TryFrom<u8> for Opcode {
            /// The unrecognised byte.
            type Error = u8;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($opcode => Ok(Opcode::$name),)*
                    other => Err(other),
                }
            }
        }
    };
}

define_opcodes! {
    /// HALT ; stop execution
    Halt = 0x31, "HALT" => Shape::Bare,
    /// LOAD reg, imm ; reg = imm
    Load = 0x60, "LOAD" => Shape::RegImm(RegClass::Any),
    /// LOADI reg, areg ; reg = mem[areg]
    LoadInd = 0x61, "LOADI" => Shape::RegPair { low: RegClass::Any, high: RegClass::Any },
    /// STORE reg, addr ; mem[addr] = reg
    Store = 0x62, "STORE" => Shape::RegImm(RegClass::General),
    /// STOREI reg, areg ; mem[areg] = reg
    StoreInd = 0x63, "STOREI" => Shape::RegPair { low: RegClass::Any, high: RegClass::Any },
    /// JMP label
    Jmp = 0x64, "JMP" => Shape::Jump,
    /// JMPZ label ; jump if Zero
    JmpZ = 0x65, "JMPZ" => Shape::Jump,
    /// JMPN label ; jump if Negative
    JmpN = 0x66, "JMPN" => Shape::Jump,
    /// JMPO label ; jump if Overflow
    JmpO = 0x67, "JMPO" => Shape::Jump,
    /// ADD reg, imm ; reg += imm
    Add = 0x68, "ADD" => Shape::RegImm(RegClass::General),
    /// ADDR dest, src ; dest += src
    AddReg = 0x69, "ADDR" => Shape::RegPair { low: RegClass::General, high: RegClass::General },
    /// SUB reg, imm ; reg -= imm
    Sub = 0x6a, "SUB" => Shape::RegImm(RegClass::General),
    /// SUBR dest, src ; dest -= src
    SubReg = 0x6b, "SUBR" => Shape::RegPair { low: RegClass::General, high: RegClass::General },
    /// OUT imm ; print signed decimal
    Out = 0x6c, "OUT" => Shape::Imm,
    /// OUTC imm ; print low byte as character
    OutChar = 0x6d, "OUTC" => Shape::Imm,
    /// OUTR reg
    OutReg = 0x6e, "OUTR" => Shape::Reg(RegClass::General),
    /// OUTRC reg
    OutRegChar = 0x6f, "OUTRC" => Shape::Reg(RegClass::General),
    /// OUTI areg ; print word at mem[areg]
    OutInd = 0x70, "OUTI" => Shape::Reg(RegClass::Address),
    /// OUTIC areg ; print byte at mem[areg]
    OutIndChar = 0x71, "OUTIC" => Shape::Reg(RegClass::Address),
}

impl Opcode {
    pub fn width(self) -> u16 {
        self.shape().width()
    }
}

/// Anything that may start a source statement: an opcode or the `DATA` directive.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mnemonic {
    Op(Opcode),
    Data,
}

impl Mnemonic {
    pub fn shape(self) -> Shape {
        match self {
            Mnemonic::Op(opcode) => opcode.shape(),
            Mnemonic::Data => Shape::Data,
        }
    }

    pub fn width(self) -> u16 {
        self.shape().width()
    }

    pub fn name(self) -> &'static str {
        match self {
            Mnemonic::Op(opcode) => opcode.mnemonic(),
            Mnemonic::Data => "DATA",
        }
    }
}

impl FromStr for Mnemonic {
    type Err = ();

    // Case-sensitive, anything else is a label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "DATA" {
            return Ok(Mnemonic::Data);
        }
        Opcode::ALL
            .iter()
            .find(|opcode| opcode.mnemonic() == s)
            .map(|&opcode| Mnemonic::Op(opcode))
            .ok_or(())
    }
}

/// Operand fields of an instruction. `V` is the type of 16-bit values, which stay unresolved
/// until labels are known.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operands<V = u16> {
    None,
    Pair { low: Register, high: Register },
    RegImm(Register, V),
    Imm(V),
    Reg(Register),
    Jump(V),
}

/// Fully resolved instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Instr {
    pub opcode: Opcode,
    pub operands: Operands,
}

impl Instr {
    pub fn new(opcode: Opcode, operands: Operands) -> Self {
        Instr { opcode, operands }
    }

    pub fn width(&self) -> u16 {
        self.opcode.width()
    }

    /// Append the binary form of this instruction to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        let start = buf.len();
        buf.push(self.opcode as u8);
        match self.operands {
            Operands::None => (),
            Operands::Pair { low, high } => buf.push(high.code() << 6 | low.code()),
            Operands::RegImm(reg, value) => {
                buf.push(reg.code());
                buf.extend_from_slice(&value.to_be_bytes());
            }
            Operands::Imm(value) | Operands::Jump(value) => {
                buf.push(0);
                buf.extend_from_slice(&value.to_be_bytes());
            }
            Operands::Reg(reg) => buf.push(reg.code()),
        }
        debug_assert_eq!(
            buf.len() - start,
            self.width() as usize,
            "{} encoded with operands of the wrong shape",
            self.opcode.mnemonic()
        );
    }

    /// Read the instruction starting at `at`.
    ///
    /// Fails on unknown opcodes, register codes outside the operand's class, and instructions
    /// running past the end of `mem`.
    pub fn decode(mem: &[u8], at: u16) -> Result<Instr, Fault> {
        let byte = |offs: u16| -> Result<u8, Fault> {
            let addr = at as usize + offs as usize;
            mem.get(addr)
                .copied()
                .ok_or(Fault::MemoryOutOfBounds { addr, pc: at })
        };
        let word = |offs: u16| -> Result<u16, Fault> {
            Ok(u16::from_be_bytes([byte(offs)?, byte(offs + 1)?]))
        };
        let reg = |code: u8, class: RegClass| -> Result<Register, Fault> {
            Register::from_code(code)
                .filter(|reg| reg.is_in(class))
                .ok_or(Fault::InvalidRegister { code, pc: at })
        };

        let opcode =
            Opcode::try_from(byte(0)?).map_err(|opcode| Fault::InvalidOpcode { opcode, pc: at })?;
        let operands = match opcode.shape() {
            Shape::Bare => Operands::None,
            Shape::RegPair { low, high } => {
                let packed = byte(1)?;
                Operands::Pair {
                    low: reg(packed & 0b11, low)?,
                    high: reg(packed >> 6 & 0b11, high)?,
                }
            }
            Shape::RegImm(class) => Operands::RegImm(reg(byte(1)?, class)?, word(2)?),
            Shape::Imm => Operands::Imm(word(2)?),
            Shape::Reg(class) => Operands::Reg(reg(byte(1)?, class)?),
            Shape::Jump => Operands::Jump(word(2)?),
            Shape::Data => unreachable!("no opcode has the data shape"),
        };
        Ok(Instr { opcode, operands })
    }
}

/// Append a `DATA` word.
pub fn encode_data(value: u16, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&value.to_be_bytes());
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.opcode.mnemonic();
        match self.operands {
            Operands::None => write!(f, "{name}"),
            Operands::Pair { low, high } => write!(f, "{name} {low}, {high}"),
            Operands::RegImm(reg, value) => write!(f, "{name} {reg}, {value}"),
            Operands::Imm(value) if self.opcode == Opcode::Out => {
                write!(f, "{name} {}", value as i16)
            }
            Operands::Imm(value) => write!(f, "{name} {value}"),
            Operands::Reg(reg) => write!(f, "{name} {reg}"),
            Operands::Jump(target) => write!(f, "{name} 0x{target:04x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_operands(shape: Shape) -> Operands {
        let pick = |class: RegClass| match class {
            RegClass::Address => Register::A1,
            _ => Register::R1,
        };
        match shape {
            Shape::Bare => Operands::None,
            Shape::RegPair { low, high } => Operands::Pair {
                low: pick(low),
                high: pick(high),
            },
            Shape::RegImm(class) => Operands::RegImm(pick(class), 0x1234),
            Shape::Imm => Operands::Imm(0xbeef),
            Shape::Reg(class) => Operands::Reg(pick(class)),
            Shape::Jump => Operands::Jump(0x0010),
            Shape::Data => unreachable!(),
        }
    }

    #[test]
    fn encoded_width_matches_table() {
        for &opcode in Opcode::ALL {
            let instr = Instr::new(opcode, sample_operands(opcode.shape()));
            let mut buf = Vec::new();
            instr.encode(&mut buf);
            assert_eq!(
                buf.len(),
                Mnemonic::Op(opcode).width() as usize,
                "{}",
                opcode.mnemonic()
            );
            assert_eq!(Instr::decode(&buf, 0), Ok(instr), "{}", opcode.mnemonic());
        }
        let mut buf = Vec::new();
        encode_data(0xfffe, &mut buf);
        assert_eq!(buf.len(), Mnemonic::Data.width() as usize);
    }

    #[test]
    fn opcode_values() {
        assert_eq!(Opcode::Halt as u8, 0x31);
        assert_eq!(Opcode::Load as u8, 0x60);
        assert_eq!(Opcode::JmpO as u8, 0x67);
        assert_eq!(Opcode::OutIndChar as u8, 0x71);
        assert_eq!(Opcode::try_from(0x6e), Ok(Opcode::OutReg));
        assert_eq!(Opcode::try_from(0x00), Err(0x00));
    }

    #[test]
    fn mnemonic_lookup() {
        assert_eq!("JMPZ".parse(), Ok(Mnemonic::Op(Opcode::JmpZ)));
        assert_eq!("DATA".parse(), Ok(Mnemonic::Data));
        assert_eq!("halt".parse::<Mnemonic>(), Err(()));
        assert_eq!("START".parse::<Mnemonic>(), Err(()));
        for &opcode in Opcode::ALL {
            assert_eq!(opcode.mnemonic().parse(), Ok(Mnemonic::Op(opcode)));
        }
    }

    #[test]
    fn register_codes() {
        assert_eq!(Register::R2.code(), 0);
        assert_eq!(Register::R1.code(), 1);
        assert_eq!(Register::A2.code(), 2);
        assert_eq!(Register::A1.code(), 3);
        for reg in Register::ALL {
            assert_eq!(Register::from_code(reg.code()), Some(reg));
            assert_eq!(reg.name().parse(), Ok(reg));
        }
        assert_eq!(Register::from_code(4), None);
    }

    #[test]
    fn register_pair_layout() {
        let mut buf = Vec::new();
        Instr::new(
            Opcode::LoadInd,
            Operands::Pair {
                low: Register::R1,
                high: Register::A1,
            },
        )
        .encode(&mut buf);
        assert_eq!(buf, [0x61, 0b1100_0001]);
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert_eq!(
            Instr::decode(&[0x00], 0),
            Err(Fault::InvalidOpcode { opcode: 0, pc: 0 })
        );
        // OUTI takes an address register
        assert_eq!(
            Instr::decode(&[0x70, 0x01], 0),
            Err(Fault::InvalidRegister { code: 1, pc: 0 })
        );
        assert_eq!(
            Instr::decode(&[0x60, 0x07, 0x00, 0x00], 0),
            Err(Fault::InvalidRegister { code: 7, pc: 0 })
        );
        assert_eq!(
            Instr::decode(&[0x64, 0x00, 0x00], 0),
            Err(Fault::MemoryOutOfBounds { addr: 3, pc: 0 })
        );
    }

    #[test]
    fn display() {
        let load = Instr::new(Opcode::Load, Operands::RegImm(Register::R1, 10));
        assert_eq!(load.to_string(), "LOAD R1, 10");
        let out = Instr::new(Opcode::Out, Operands::Imm(-3i16 as u16));
        assert_eq!(out.to_string(), "OUT -3");
        let jump = Instr::new(Opcode::JmpZ, Operands::Jump(12));
        assert_eq!(jump.to_string(), "JMPZ 0x000c");
        let pair = Instr::new(
            Opcode::AddReg,
            Operands::Pair {
                low: Register::R1,
                high: Register::R2,
            },
        );
        assert_eq!(pair.to_string(), "ADDR R1, R2");
    }
}
