use crate::{
    error::AsmError,
    isa::{encode_data, Instr, Mnemonic, Opcode, Operands},
    lexer::parse_literal,
    symbol::{Span, SymbolTable},
};

/// Assembly intermediate representation: statements with their addresses, and the labels
/// collected while assigning them.
#[derive(Debug)]
pub struct Air {
    /// AIR
    ast: Vec<AsmLine>,
    symbols: SymbolTable,
    /// Address given to each source line, blank lines included
    line_addrs: Vec<u16>,
}

impl Air {
    pub fn new() -> Self {
        Air {
            ast: Vec::new(),
            symbols: SymbolTable::new(),
            line_addrs: Vec::new(),
        }
    }

    pub(crate) fn add_stmt(&mut self, stmt: AsmLine) {
        self.ast.push(stmt)
    }

    pub(crate) fn record_line(&mut self, addr: u16) {
        self.line_addrs.push(addr)
    }

    pub(crate) fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Address of each source line, indexed from 0.
    pub fn line_addresses(&self) -> &[u16] {
        &self.line_addrs
    }

    pub fn get(&self, idx: usize) -> &AsmLine {
        &self.ast[idx]
    }

    pub fn len(&self) -> usize {
        self.ast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ast.is_empty()
    }

    /// Total size of the encoded program in bytes.
    pub fn size(&self) -> usize {
        self.ast
            .last()
            .map_or(0, |stmt| stmt.addr as usize + stmt.width() as usize)
    }

    /// Resolve every operand against the symbol table and encode the program.
    pub fn emit(&self) -> Result<Vec<u8>, AsmError> {
        let mut bytes = Vec::with_capacity(self.size());
        for stmt in &self.ast {
            debug_assert_eq!(bytes.len(), stmt.addr as usize);
            stmt.emit(&self.symbols, &mut bytes)?;
        }
        Ok(bytes)
    }
}

impl Default for Air {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a Air {
    type Item = &'a AsmLine;
    type IntoIter = std::slice::Iter<'a, AsmLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.ast.iter()
    }
}

/// Single statement, with the source location it came from.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AsmLine {
    /// Line number, counting from 1
    pub line: usize,
    pub span: Span,
    pub addr: u16,
    pub label: Option<String>,
    pub stmt: AirStmt,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AirStmt {
    /// Registers are resolved, values and jump targets are not.
    Instr {
        opcode: Opcode,
        operands: Operands<Operand>,
    },
    Data(Operand),
}

impl AirStmt {
    pub fn mnemonic(&self) -> Mnemonic {
        match self {
            AirStmt::Instr { opcode, .. } => Mnemonic::Op(*opcode),
            AirStmt::Data(_) => Mnemonic::Data,
        }
    }
}

/// Label or literal, as written.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Operand {
    pub text: String,
    pub span: Span,
}

impl AsmLine {
    pub fn width(&self) -> u16 {
        self.stmt.mnemonic().width()
    }

    fn emit(&self, symbols: &SymbolTable, bytes: &mut Vec<u8>) -> Result<(), AsmError> {
        match &self.stmt {
            AirStmt::Data(value) => encode_data(self.resolve_value(value, symbols)?, bytes),
            AirStmt::Instr { opcode, operands } => {
                let operands = match operands {
                    Operands::None => Operands::None,
                    Operands::Pair { low, high } => Operands::Pair {
                        low: *low,
                        high: *high,
                    },
                    Operands::RegImm(reg, value) => {
                        Operands::RegImm(*reg, self.resolve_value(value, symbols)?)
                    }
                    Operands::Imm(value) => Operands::Imm(self.resolve_value(value, symbols)?),
                    Operands::Reg(reg) => Operands::Reg(*reg),
                    Operands::Jump(target) => Operands::Jump(self.resolve_target(target, symbols)?),
                };
                Instr::new(*opcode, operands).encode(bytes);
            }
        }
        Ok(())
    }

    /// Labels take precedence over literals.
    fn resolve_value(&self, value: &Operand, symbols: &SymbolTable) -> Result<u16, AsmError> {
        if let Some(addr) = symbols.get(&value.text) {
            return Ok(addr);
        }
        let Some(lit) = parse_literal(&value.text) else {
            return Err(AsmError::Syntax {
                line: self.line,
                span: value.span,
                reason: format!("`{}` is neither a label nor a numeric literal", value.text),
            });
        };
        if !(i16::MIN as i64..=u16::MAX as i64).contains(&lit) {
            return Err(AsmError::Syntax {
                line: self.line,
                span: value.span,
                reason: format!("literal {lit} does not fit in 16 bits"),
            });
        }
        Ok(lit as u16)
    }

    /// Jump targets never fall back to literals.
    fn resolve_target(&self, target: &Operand, symbols: &SymbolTable) -> Result<u16, AsmError> {
        symbols
            .get(&target.text)
            .ok_or_else(|| AsmError::UndefinedLabel {
                line: self.line,
                span: target.span,
                name: target.text.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::{assemble, error::AsmError, AsmParser};

    #[test]
    fn scenario_straight_line() {
        let src = "LOAD R1, 10\nADD R1, 5\nOUTR R1\nHALT\n";
        assert_eq!(
            assemble(src).unwrap(),
            vec![0x60, 0x01, 0x00, 0x0A, 0x68, 0x01, 0x00, 0x05, 0x6E, 0x01, 0x31]
        );
    }

    #[test]
    fn scenario_conditional_jump() {
        let src = "START LOAD R1, 0\nJMPZ SKIP\nOUT 99\nSKIP HALT\n";
        let air = AsmParser::new(src).unwrap().parse().unwrap();
        assert_eq!(air.symbols().get("START"), Some(0));
        assert_eq!(air.symbols().get("SKIP"), Some(12));
        assert_eq!(
            air.emit().unwrap(),
            vec![
                0x60, 0x01, 0x00, 0x00, // LOAD R1, 0
                0x65, 0x00, 0x00, 0x0C, // JMPZ SKIP
                0x6C, 0x00, 0x00, 0x63, // OUT 99
                0x31, // HALT
            ]
        );
    }

    #[test]
    fn emitted_size_matches_assigned_addresses() {
        let src = "\
            LOAD A1, 100
            LOADI R2, A1
            STORE R2, 200
            STOREI R1, A2
            ADD R1, 1
            ADDR R1, R2
            SUB R2, 3
            SUBR R2, R1
            OUT -1
            OUTC 65
            OUTR R1
            OUTRC R2
            OUTI A1
            OUTIC A2
        TOP JMP TOP
            JMPZ TOP
            JMPN TOP
            JMPO TOP
            DATA 7
            HALT
        ";
        let air = AsmParser::new(src).unwrap().parse().unwrap();
        let bytes = air.emit().unwrap();
        assert_eq!(bytes.len(), air.size());
        for (i, stmt) in (&air).into_iter().enumerate() {
            let next = if i + 1 < air.len() {
                air.get(i + 1).addr as usize
            } else {
                bytes.len()
            };
            assert_eq!(next - stmt.addr as usize, stmt.width() as usize);
        }
    }

    #[test]
    fn labels_resolve_to_line_addresses() {
        let src = "\
JMP END
# comment line

LOOP ADD R1, 1
     JMPO DONE
     JMP LOOP
DONE OUTR R1
END  HALT
";
        let air = AsmParser::new(src).unwrap().parse().unwrap();
        let addrs = air.line_addresses();
        assert_eq!(air.symbols().get("LOOP"), Some(addrs[3]));
        assert_eq!(air.symbols().get("DONE"), Some(addrs[6]));
        assert_eq!(air.symbols().get("END"), Some(addrs[7]));
        assert_eq!(addrs, &[0, 4, 4, 4, 8, 12, 16, 18]);
        let bytes = air.emit().unwrap();
        assert_eq!(&bytes[0..4], &[0x64, 0x00, 0x00, 18]);
    }

    #[test]
    fn values_prefer_labels_over_literals() {
        let src = "DATA HERE\nHERE DATA -2\nDATA 0xBEEF\nOUT HERE\n";
        assert_eq!(
            assemble(src).unwrap(),
            vec![0x00, 0x02, 0xFF, 0xFE, 0xBE, 0xEF, 0x6C, 0x00, 0x00, 0x02]
        );
    }

    #[test]
    fn jump_to_literal_is_undefined() {
        let err = assemble("JMP 0\n").unwrap_err();
        assert!(matches!(err, AsmError::UndefinedLabel { line: 1, ref name, .. } if name == "0"));

        let err = assemble("HALT\nJMPN NOWHERE\n").unwrap_err();
        assert!(matches!(err, AsmError::UndefinedLabel { line: 2, .. }));
    }

    #[test]
    fn unknown_value_is_an_error() {
        let err = assemble("DATA MISPELLED\n").unwrap_err();
        assert!(matches!(err, AsmError::Syntax { line: 1, .. }));

        let err = assemble("LOAD R1, 70000\n").unwrap_err();
        assert!(matches!(err, AsmError::Syntax { line: 1, .. }));

        assert_eq!(
            assemble("LOAD R1, -32768\nLOAD R2, 65535\n").unwrap(),
            vec![0x60, 0x01, 0x80, 0x00, 0x60, 0x00, 0xFF, 0xFF]
        );
    }

    #[test]
    fn deterministic() {
        let src = "LOAD R1, 3\nL SUB R1, 1\nJMPZ E\nJMP L\nE HALT\n";
        assert_eq!(assemble(src).unwrap(), assemble(src).unwrap());
    }
}
