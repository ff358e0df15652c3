use crate::{
    air::{Air, AirStmt, AsmLine, Operand},
    error::AsmError,
    isa::{Mnemonic, Operands, RegClass, Register, Shape},
    lexer::{normalize, parse_literal, SourceLine, Token, TokenKind},
    symbol::InsertError,
};

/// First assembler pass: turns normalized lines into AIR, assigning every statement an address
/// and every label the address of its statement.
pub struct AsmParser<'a> {
    /// Reference to the source file
    src: &'a str,
    lines: Vec<SourceLine>,
    /// Address of the next statement
    location: u16,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Result<Self, AsmError> {
        Ok(AsmParser {
            src,
            lines: normalize(src)?,
            location: 0,
        })
    }

    fn get_span(&self, tok: &Token) -> &'a str {
        &self.src[tok.span.range()]
    }

    /// Create AIR out of the source lines
    pub fn parse(mut self) -> Result<Air, AsmError> {
        let mut air = Air::new();
        let lines = std::mem::take(&mut self.lines);
        for line in &lines {
            air.record_line(self.location);
            if line.is_blank() {
                continue;
            }
            let stmt = self.parse_line(line, &mut air)?;
            // At most `MAX_LINES` statements of at most 4 bytes
            self.location += stmt.width();
            air.add_stmt(stmt);
        }
        // Consume self to return AIR
        Ok(air)
    }

    fn parse_line(&self, line: &SourceLine, air: &mut Air) -> Result<AsmLine, AsmError> {
        let (first, rest) = line
            .toks
            .split_first()
            .expect("blank lines are skipped before parsing");
        self.expect_word(first, line)?;

        let (label, mnemonic, operands) = match self.get_span(first).parse::<Mnemonic>() {
            Ok(mnemonic) => (None, mnemonic, rest),
            // Not an instruction, so a label which must be followed by one
            Err(()) => {
                let Some((second, rest)) = rest
                    .split_first()
                    .filter(|(tok, _)| tok.kind == TokenKind::Word)
                else {
                    return Err(self.unknown_instruction(first, line));
                };
                let Ok(mnemonic) = self.get_span(second).parse::<Mnemonic>() else {
                    // `LOADX R1, 5` is a misspelled instruction, not a label
                    let culprit = if self.is_reserved(second) { first } else { second };
                    return Err(self.unknown_instruction(culprit, line));
                };
                self.define_label(first, line, air)?;
                (Some(self.get_span(first).to_string()), mnemonic, rest)
            }
        };

        let operands = self.split_operands(operands, line)?;
        let shape = mnemonic.shape();
        if operands.len() != shape.arity() {
            return Err(AsmError::Syntax {
                line: line.number,
                span: line.span,
                reason: format!(
                    "`{}` expects {} operand{}, found {}",
                    mnemonic.name(),
                    shape.arity(),
                    if shape.arity() == 1 { "" } else { "s" },
                    operands.len()
                ),
            });
        }

        let stmt = match mnemonic {
            Mnemonic::Data => AirStmt::Data(self.operand(operands[0])),
            Mnemonic::Op(opcode) => {
                let operands = match shape {
                    Shape::Bare => Operands::None,
                    Shape::RegPair { low, high } => Operands::Pair {
                        low: self.expect_reg(operands[0], low, line)?,
                        high: self.expect_reg(operands[1], high, line)?,
                    },
                    Shape::RegImm(class) => Operands::RegImm(
                        self.expect_reg(operands[0], class, line)?,
                        self.operand(operands[1]),
                    ),
                    Shape::Imm => Operands::Imm(self.operand(operands[0])),
                    Shape::Reg(class) => Operands::Reg(self.expect_reg(operands[0], class, line)?),
                    Shape::Jump => Operands::Jump(self.operand(operands[0])),
                    Shape::Data => unreachable!("only DATA has the data shape"),
                };
                AirStmt::Instr { opcode, operands }
            }
        };

        Ok(AsmLine {
            line: line.number,
            span: line.span,
            addr: self.location,
            label,
            stmt,
        })
    }

    /// Add a prefix label to the symbol table at the current location.
    fn define_label(&self, tok: &Token, line: &SourceLine, air: &mut Air) -> Result<(), AsmError> {
        let name = self.get_span(tok);
        if self.is_reserved(tok) {
            return Err(AsmError::Syntax {
                line: line.number,
                span: tok.span,
                reason: format!("`{name}` cannot be used as a label"),
            });
        }
        air.symbols_mut()
            .insert(name, self.location)
            .map_err(|err| match err {
                InsertError::Duplicate => AsmError::DuplicateLabel {
                    line: line.number,
                    span: tok.span,
                    name: name.to_string(),
                },
                InsertError::Full => AsmError::SymbolTableOverflow {
                    line: line.number,
                    span: tok.span,
                },
            })
    }

    /// Register names and numeric literals
    fn is_reserved(&self, tok: &Token) -> bool {
        let text = self.get_span(tok);
        text.parse::<Register>().is_ok() || parse_literal(text).is_some()
    }

    /// Check operands alternate with commas, and return the operands.
    fn split_operands<'t>(
        &self,
        toks: &'t [Token],
        line: &SourceLine,
    ) -> Result<Vec<&'t Token>, AsmError> {
        let mut operands = Vec::new();
        let mut expect_operand = true;
        for tok in toks {
            match (tok.kind, expect_operand) {
                (TokenKind::Word, true) => operands.push(tok),
                (TokenKind::Comma, false) => (),
                (TokenKind::Word, false) => {
                    return Err(self.syntax(tok, line, "expected `,` between operands"))
                }
                (TokenKind::Comma, true) => {
                    return Err(self.syntax(tok, line, "expected an operand, found `,`"))
                }
            }
            expect_operand = !expect_operand;
        }
        match toks.last() {
            Some(last) if last.kind == TokenKind::Comma => {
                Err(self.syntax(last, line, "trailing `,` after the last operand"))
            }
            _ => Ok(operands),
        }
    }

    fn operand(&self, tok: &Token) -> Operand {
        Operand {
            text: self.get_span(tok).to_string(),
            span: tok.span,
        }
    }

    fn expect_word(&self, tok: &Token, line: &SourceLine) -> Result<(), AsmError> {
        match tok.kind {
            TokenKind::Word => Ok(()),
            TokenKind::Comma => Err(self.syntax(
                tok,
                line,
                "lines should start with a label or an instruction",
            )),
        }
    }

    fn expect_reg(
        &self,
        tok: &Token,
        class: RegClass,
        line: &SourceLine,
    ) -> Result<Register, AsmError> {
        let name = self.get_span(tok);
        name.parse::<Register>()
            .ok()
            .filter(|reg| reg.is_in(class))
            .ok_or_else(|| AsmError::InvalidRegister {
                line: line.number,
                span: tok.span,
                name: name.to_string(),
                expected: class,
            })
    }

    fn unknown_instruction(&self, tok: &Token, line: &SourceLine) -> AsmError {
        AsmError::UnknownInstruction {
            line: line.number,
            span: tok.span,
            name: self.get_span(tok).to_string(),
        }
    }

    fn syntax(&self, tok: &Token, line: &SourceLine, reason: &str) -> AsmError {
        AsmError::Syntax {
            line: line.number,
            span: tok.span,
            reason: reason.to_string(),
        }
    }
}
