//! Opcode table.
//!
//! One entry per opcode byte: the operation, its addressing mode and the
//! base cycle count. Cycle counts are data, not derived from the
//! implementation. The only dynamic additions are the page-cross penalty on
//! indexed reads (flagged per entry) and the taken-branch penalty.

/// How an instruction finds its operand.
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
    /// `JMP ($xxxx)`, with the NMOS page-wrap bug.
    Indirect,
    /// `($zz,X)`
    IndexedIndirect,
    /// `($zz),Y`
    IndirectIndexed,
    Relative,
}

impl AddressingMode {
    /// Operand bytes following the opcode.
    #[must_use]
    pub const fn operand_len(self) -> u16 {
        match self {
            Self::Implied | Self::Accumulator => 0,
            Self::Immediate
            | Self::ZeroPage
            | Self::ZeroPageX
            | Self::ZeroPageY
            | Self::IndexedIndirect
            | Self::IndirectIndexed
            | Self::Relative => 1,
            Self::Absolute | Self::AbsoluteX | Self::AbsoluteY | Self::Indirect => 2,
        }
    }
}

/// Operation performed by an opcode, documented and undocumented.
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc,
    Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp,
    Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp, Rol, Ror, Rti,
    Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay, Tsx, Txa, Txs, Tya,
    // Undocumented NMOS operations.
    Alr, Anc, Ane, Arr, Dcp, Isc, Jam, Las, Lax, Lxa, Rla, Rra, Sax, Sbx,
    Sha, Shx, Shy, Slo, Sre, Tas,
}

impl Op {
    /// Assembler mnemonic.
    #[rustfmt::skip]
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Adc => "ADC", Self::And => "AND", Self::Asl => "ASL",
            Self::Bcc => "BCC", Self::Bcs => "BCS", Self::Beq => "BEQ",
            Self::Bit => "BIT", Self::Bmi => "BMI", Self::Bne => "BNE",
            Self::Bpl => "BPL", Self::Brk => "BRK", Self::Bvc => "BVC",
            Self::Bvs => "BVS", Self::Clc => "CLC", Self::Cld => "CLD",
            Self::Cli => "CLI", Self::Clv => "CLV", Self::Cmp => "CMP",
            Self::Cpx => "CPX", Self::Cpy => "CPY", Self::Dec => "DEC",
            Self::Dex => "DEX", Self::Dey => "DEY", Self::Eor => "EOR",
            Self::Inc => "INC", Self::Inx => "INX", Self::Iny => "INY",
            Self::Jmp => "JMP", Self::Jsr => "JSR", Self::Lda => "LDA",
            Self::Ldx => "LDX", Self::Ldy => "LDY", Self::Lsr => "LSR",
            Self::Nop => "NOP", Self::Ora => "ORA", Self::Pha => "PHA",
            Self::Php => "PHP", Self::Pla => "PLA", Self::Plp => "PLP",
            Self::Rol => "ROL", Self::Ror => "ROR", Self::Rti => "RTI",
            Self::Rts => "RTS", Self::Sbc => "SBC", Self::Sec => "SEC",
            Self::Sed => "SED", Self::Sei => "SEI", Self::Sta => "STA",
            Self::Stx => "STX", Self::Sty => "STY", Self::Tax => "TAX",
            Self::Tay => "TAY", Self::Tsx => "TSX", Self::Txa => "TXA",
            Self::Txs => "TXS", Self::Tya => "TYA", Self::Alr => "ALR",
            Self::Anc => "ANC", Self::Ane => "ANE", Self::Arr => "ARR",
            Self::Dcp => "DCP", Self::Isc => "ISC", Self::Jam => "JAM",
            Self::Las => "LAS", Self::Lax => "LAX", Self::Lxa => "LXA",
            Self::Rla => "RLA", Self::Rra => "RRA", Self::Sax => "SAX",
            Self::Sbx => "SBX", Self::Sha => "SHA", Self::Shx => "SHX",
            Self::Shy => "SHY", Self::Slo => "SLO", Self::Sre => "SRE",
            Self::Tas => "TAS",
        }
    }
}

/// Static description of one opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub op: Op,
    pub mode: AddressingMode,
    /// Cycles before page-cross and branch penalties.
    pub cycles: u8,
    /// Indexed read that costs one more cycle when the index crosses a page.
    pub page_penalty: bool,
    /// Not part of the documented instruction set.
    pub undocumented: bool,
}

impl Opcode {
    const fn new(op: Op, mode: AddressingMode, cycles: u8) -> Self {
        Self {
            op,
            mode,
            cycles,
            page_penalty: false,
            undocumented: false,
        }
    }

    const fn with_page_penalty(mut self) -> Self {
        self.page_penalty = true;
        self
    }

    const fn undocumented(mut self) -> Self {
        self.undocumented = true;
        self
    }

    /// Instruction length in bytes, opcode included.
    #[must_use]
    pub const fn size(&self) -> u16 {
        1 + self.mode.operand_len()
    }

    #[must_use]
    pub const fn mnemonic(&self) -> &'static str {
        self.op.mnemonic()
    }
}

use AddressingMode::{
    Absolute, AbsoluteX, AbsoluteY, Accumulator, Immediate, Implied, IndexedIndirect, Indirect,
    IndirectIndexed, Relative, ZeroPage, ZeroPageX, ZeroPageY,
};

/// The full NMOS 6502 opcode map.
#[rustfmt::skip]
pub static OPCODES: [Opcode; 256] = [
    /* $00 */ Opcode::new(Op::Brk, Implied, 7),
    /* $01 */ Opcode::new(Op::Ora, IndexedIndirect, 6),
    /* $02 */ Opcode::new(Op::Jam, Implied, 2).undocumented(),
    /* $03 */ Opcode::new(Op::Slo, IndexedIndirect, 8).undocumented(),
    /* $04 */ Opcode::new(Op::Nop, ZeroPage, 3).undocumented(),
    /* $05 */ Opcode::new(Op::Ora, ZeroPage, 3),
    /* $06 */ Opcode::new(Op::Asl, ZeroPage, 5),
    /* $07 */ Opcode::new(Op::Slo, ZeroPage, 5).undocumented(),
    /* $08 */ Opcode::new(Op::Php, Implied, 3),
    /* $09 */ Opcode::new(Op::Ora, Immediate, 2),
    /* $0A */ Opcode::new(Op::Asl, Accumulator, 2),
    /* $0B */ Opcode::new(Op::Anc, Immediate, 2).undocumented(),
    /* $0C */ Opcode::new(Op::Nop, Absolute, 4).undocumented(),
    /* $0D */ Opcode::new(Op::Ora, Absolute, 4),
    /* $0E */ Opcode::new(Op::Asl, Absolute, 6),
    /* $0F */ Opcode::new(Op::Slo, Absolute, 6).undocumented(),
    /* $10 */ Opcode::new(Op::Bpl, Relative, 2),
    /* $11 */ Opcode::new(Op::Ora, IndirectIndexed, 5).with_page_penalty(),
    /* $12 */ Opcode::new(Op::Jam, Implied, 2).undocumented(),
    /* $13 */ Opcode::new(Op::Slo, IndirectIndexed, 8).undocumented(),
    /* $14 */ Opcode::new(Op::Nop, ZeroPageX, 4).undocumented(),
    /* $15 */ Opcode::new(Op::Ora, ZeroPageX, 4),
    /* $16 */ Opcode::new(Op::Asl, ZeroPageX, 6),
    /* $17 */ Opcode::new(Op::Slo, ZeroPageX, 6).undocumented(),
    /* $18 */ Opcode::new(Op::Clc, Implied, 2),
    /* $19 */ Opcode::new(Op::Ora, AbsoluteY, 4).with_page_penalty(),
    /* $1A */ Opcode::new(Op::Nop, Implied, 2).undocumented(),
    /* $1B */ Opcode::new(Op::Slo, AbsoluteY, 7).undocumented(),
    /* $1C */ Opcode::new(Op::Nop, AbsoluteX, 4).with_page_penalty().undocumented(),
    /* $1D */ Opcode::new(Op::Ora, AbsoluteX, 4).with_page_penalty(),
    /* $1E */ Opcode::new(Op::Asl, AbsoluteX, 7),
    /* $1F */ Opcode::new(Op::Slo, AbsoluteX, 7).undocumented(),
    /* $20 */ Opcode::new(Op::Jsr, Absolute, 6),
    /* $21 */ Opcode::new(Op::And, IndexedIndirect, 6),
    /* $22 */ Opcode::new(Op::Jam, Implied, 2).undocumented(),
    /* $23 */ Opcode::new(Op::Rla, IndexedIndirect, 8).undocumented(),
    /* $24 */ Opcode::new(Op::Bit, ZeroPage, 3),
    /* $25 */ Opcode::new(Op::And, ZeroPage, 3),
    /* $26 */ Opcode::new(Op::Rol, ZeroPage, 5),
    /* $27 */ Opcode::new(Op::Rla, ZeroPage, 5).undocumented(),
    /* $28 */ Opcode::new(Op::Plp, Implied, 4),
    /* $29 */ Opcode::new(Op::And, Immediate, 2),
    /* $2A */ Opcode::new(Op::Rol, Accumulator, 2),
    /* $2B */ Opcode::new(Op::Anc, Immediate, 2).undocumented(),
    /* $2C */ Opcode::new(Op::Bit, Absolute, 4),
    /* $2D */ Opcode::new(Op::And, Absolute, 4),
    /* $2E */ Opcode::new(Op::Rol, Absolute, 6),
    /* $2F */ Opcode::new(Op::Rla, Absolute, 6).undocumented(),
    /* $30 */ Opcode::new(Op::Bmi, Relative, 2),
    /* $31 */ Opcode::new(Op::And, IndirectIndexed, 5).with_page_penalty(),
    /* $32 */ Opcode::new(Op::Jam, Implied, 2).undocumented(),
    /* $33 */ Opcode::new(Op::Rla, IndirectIndexed, 8).undocumented(),
    /* $34 */ Opcode::new(Op::Nop, ZeroPageX, 4).undocumented(),
    /* $35 */ Opcode::new(Op::And, ZeroPageX, 4),
    /* $36 */ Opcode::new(Op::Rol, ZeroPageX, 6),
    /* $37 */ Opcode::new(Op::Rla, ZeroPageX, 6).undocumented(),
    /* $38 */ Opcode::new(Op::Sec, Implied, 2),
    /* $39 */ Opcode::new(Op::And, AbsoluteY, 4).with_page_penalty(),
    /* $3A */ Opcode::new(Op::Nop, Implied, 2).undocumented(),
    /* $3B */ Opcode::new(Op::Rla, AbsoluteY, 7).undocumented(),
    /* $3C */ Opcode::new(Op::Nop, AbsoluteX, 4).with_page_penalty().undocumented(),
    /* $3D */ Opcode::new(Op::And, AbsoluteX, 4).with_page_penalty(),
    /* $3E */ Opcode::new(Op::Rol, AbsoluteX, 7),
    /* $3F */ Opcode::new(Op::Rla, AbsoluteX, 7).undocumented(),
    /* $40 */ Opcode::new(Op::Rti, Implied, 6),
    /* $41 */ Opcode::new(Op::Eor, IndexedIndirect, 6),
    /* $42 */ Opcode::new(Op::Jam, Implied, 2).undocumented(),
    /* $43 */ Opcode::new(Op::Sre, IndexedIndirect, 8).undocumented(),
    /* $44 */ Opcode::new(Op::Nop, ZeroPage, 3).undocumented(),
    /* $45 */ Opcode::new(Op::Eor, ZeroPage, 3),
    /* $46 */ Opcode::new(Op::Lsr, ZeroPage, 5),
    /* $47 */ Opcode::new(Op::Sre, ZeroPage, 5).undocumented(),
    /* $48 */ Opcode::new(Op::Pha, Implied, 3),
    /* $49 */ Opcode::new(Op::Eor, Immediate, 2),
    /* $4A */ Opcode::new(Op::Lsr, Accumulator, 2),
    /* $4B */ Opcode::new(Op::Alr, Immediate, 2).undocumented(),
    /* $4C */ Opcode::new(Op::Jmp, Absolute, 3),
    /* $4D */ Opcode::new(Op::Eor, Absolute, 4),
    /* $4E */ Opcode::new(Op::Lsr, Absolute, 6),
    /* $4F */ Opcode::new(Op::Sre, Absolute, 6).undocumented(),
    /* $50 */ Opcode::new(Op::Bvc, Relative, 2),
    /* $51 */ Opcode::new(Op::Eor, IndirectIndexed, 5).with_page_penalty(),
    /* $52 */ Opcode::new(Op::Jam, Implied, 2).undocumented(),
    /* $53 */ Opcode::new(Op::Sre, IndirectIndexed, 8).undocumented(),
    /* $54 */ Opcode::new(Op::Nop, ZeroPageX, 4).undocumented(),
    /* $55 */ Opcode::new(Op::Eor, ZeroPageX, 4),
    /* $56 */ Opcode::new(Op::Lsr, ZeroPageX, 6),
    /* $57 */ Opcode::new(Op::Sre, ZeroPageX, 6).undocumented(),
    /* $58 */ Opcode::new(Op::Cli, Implied, 2),
    /* $59 */ Opcode::new(Op::Eor, AbsoluteY, 4).with_page_penalty(),
    /* $5A */ Opcode::new(Op::Nop, Implied, 2).undocumented(),
    /* $5B */ Opcode::new(Op::Sre, AbsoluteY, 7).undocumented(),
    /* $5C */ Opcode::new(Op::Nop, AbsoluteX, 4).with_page_penalty().undocumented(),
    /* $5D */ Opcode::new(Op::Eor, AbsoluteX, 4).with_page_penalty(),
    /* $5E */ Opcode::new(Op::Lsr, AbsoluteX, 7),
    /* $5F */ Opcode::new(Op::Sre, AbsoluteX, 7).undocumented(),
    /* $60 */ Opcode::new(Op::Rts, Implied, 6),
    /* $61 */ Opcode::new(Op::Adc, IndexedIndirect, 6),
    /* $62 */ Opcode::new(Op::Jam, Implied, 2).undocumented(),
    /* $63 */ Opcode::new(Op::Rra, IndexedIndirect, 8).undocumented(),
    /* $64 */ Opcode::new(Op::Nop, ZeroPage, 3).undocumented(),
    /* $65 */ Opcode::new(Op::Adc, ZeroPage, 3),
    /* $66 */ Opcode::new(Op::Ror, ZeroPage, 5),
    /* $67 */ Opcode::new(Op::Rra, ZeroPage, 5).undocumented(),
    /* $68 */ Opcode::new(Op::Pla, Implied, 4),
    /* $69 */ Opcode::new(Op::Adc, Immediate, 2),
    /* $6A */ Opcode::new(Op::Ror, Accumulator, 2),
    /* $6B */ Opcode::new(Op::Arr, Immediate, 2).undocumented(),
    /* $6C */ Opcode::new(Op::Jmp, Indirect, 5),
    /* $6D */ Opcode::new(Op::Adc, Absolute, 4),
    /* $6E */ Opcode::new(Op::Ror, Absolute, 6),
    /* $6F */ Opcode::new(Op::Rra, Absolute, 6).undocumented(),
    /* $70 */ Opcode::new(Op::Bvs, Relative, 2),
    /* $71 */ Opcode::new(Op::Adc, IndirectIndexed, 5).with_page_penalty(),
    /* $72 */ Opcode::new(Op::Jam, Implied, 2).undocumented(),
    /* $73 */ Opcode::new(Op::Rra, IndirectIndexed, 8).undocumented(),
    /* $74 */ Opcode::new(Op::Nop, ZeroPageX, 4).undocumented(),
    /* $75 */ Opcode::new(Op::Adc, ZeroPageX, 4),
    /* $76 */ Opcode::new(Op::Ror, ZeroPageX, 6),
    /* $77 */ Opcode::new(Op::Rra, ZeroPageX, 6).undocumented(),
    /* $78 */ Opcode::new(Op::Sei, Implied, 2),
    /* $79 */ Opcode::new(Op::Adc, AbsoluteY, 4).with_page_penalty(),
    /* $7A */ Opcode::new(Op::Nop, Implied, 2).undocumented(),
    /* $7B */ Opcode::new(Op::Rra, AbsoluteY, 7).undocumented(),
    /* $7C */ Opcode::new(Op::Nop, AbsoluteX, 4).with_page_penalty().undocumented(),
    /* $7D */ Opcode::new(Op::Adc, AbsoluteX, 4).with_page_penalty(),
    /* $7E */ Opcode::new(Op::Ror, AbsoluteX, 7),
    /* $7F */ Opcode::new(Op::Rra, AbsoluteX, 7).undocumented(),
    /* $80 */ Opcode::new(Op::Nop, Immediate, 2).undocumented(),
    /* $81 */ Opcode::new(Op::Sta, IndexedIndirect, 6),
    /* $82 */ Opcode::new(Op::Nop, Immediate, 2).undocumented(),
    /* $83 */ Opcode::new(Op::Sax, IndexedIndirect, 6).undocumented(),
    /* $84 */ Opcode::new(Op::Sty, ZeroPage, 3),
    /* $85 */ Opcode::new(Op::Sta, ZeroPage, 3),
    /* $86 */ Opcode::new(Op::Stx, ZeroPage, 3),
    /* $87 */ Opcode::new(Op::Sax, ZeroPage, 3).undocumented(),
    /* $88 */ Opcode::new(Op::Dey, Implied, 2),
    /* $89 */ Opcode::new(Op::Nop, Immediate, 2).undocumented(),
    /* $8A */ Opcode::new(Op::Txa, Implied, 2),
    /* $8B */ Opcode::new(Op::Ane, Immediate, 2).undocumented(),
    /* $8C */ Opcode::new(Op::Sty, Absolute, 4),
    /* $8D */ Opcode::new(Op::Sta, Absolute, 4),
    /* $8E */ Opcode::new(Op::Stx, Absolute, 4),
    /* $8F */ Opcode::new(Op::Sax, Absolute, 4).undocumented(),
    /* $90 */ Opcode::new(Op::Bcc, Relative, 2),
    /* $91 */ Opcode::new(Op::Sta, IndirectIndexed, 6),
    /* $92 */ Opcode::new(Op::Jam, Implied, 2).undocumented(),
    /* $93 */ Opcode::new(Op::Sha, IndirectIndexed, 6).undocumented(),
    /* $94 */ Opcode::new(Op::Sty, ZeroPageX, 4),
    /* $95 */ Opcode::new(Op::Sta, ZeroPageX, 4),
    /* $96 */ Opcode::new(Op::Stx, ZeroPageY, 4),
    /* $97 */ Opcode::new(Op::Sax, ZeroPageY, 4).undocumented(),
    /* $98 */ Opcode::new(Op::Tya, Implied, 2),
    /* $99 */ Opcode::new(Op::Sta, AbsoluteY, 5),
    /* $9A */ Opcode::new(Op::Txs, Implied, 2),
    /* $9B */ Opcode::new(Op::Tas, AbsoluteY, 5).undocumented(),
    /* $9C */ Opcode::new(Op::Shy, AbsoluteX, 5).undocumented(),
    /* $9D */ Opcode::new(Op::Sta, AbsoluteX, 5),
    /* $9E */ Opcode::new(Op::Shx, AbsoluteY, 5).undocumented(),
    /* $9F */ Opcode::new(Op::Sha, AbsoluteY, 5).undocumented(),
    /* $A0 */ Opcode::new(Op::Ldy, Immediate, 2),
    /* $A1 */ Opcode::new(Op::Lda, IndexedIndirect, 6),
    /* $A2 */ Opcode::new(Op::Ldx, Immediate, 2),
    /* $A3 */ Opcode::new(Op::Lax, IndexedIndirect, 6).undocumented(),
    /* $A4 */ Opcode::new(Op::Ldy, ZeroPage, 3),
    /* $A5 */ Opcode::new(Op::Lda, ZeroPage, 3),
    /* $A6 */ Opcode::new(Op::Ldx, ZeroPage, 3),
    /* $A7 */ Opcode::new(Op::Lax, ZeroPage, 3).undocumented(),
    /* $A8 */ Opcode::new(Op::Tay, Implied, 2),
    /* $A9 */ Opcode::new(Op::Lda, Immediate, 2),
    /* $AA */ Opcode::new(Op::Tax, Implied, 2),
    /* $AB */ Opcode::new(Op::Lxa, Immediate, 2).undocumented(),
    /* $AC */ Opcode::new(Op::Ldy, Absolute, 4),
    /* $AD */ Opcode::new(Op::Lda, Absolute, 4),
    /* $AE */ Opcode::new(Op::Ldx, Absolute, 4),
    /* $AF */ Opcode::new(Op::Lax, Absolute, 4).undocumented(),
    /* $B0 */ Opcode::new(Op::Bcs, Relative, 2),
    /* $B1 */ Opcode::new(Op::Lda, IndirectIndexed, 5).with_page_penalty(),
    /* $B2 */ Opcode::new(Op::Jam, Implied, 2).undocumented(),
    /* $B3 */ Opcode::new(Op::Lax, IndirectIndexed, 5).with_page_penalty().undocumented(),
    /* $B4 */ Opcode::new(Op::Ldy, ZeroPageX, 4),
    /* $B5 */ Opcode::new(Op::Lda, ZeroPageX, 4),
    /* $B6 */ Opcode::new(Op::Ldx, ZeroPageY, 4),
    /* $B7 */ Opcode::new(Op::Lax, ZeroPageY, 4).undocumented(),
    /* $B8 */ Opcode::new(Op::Clv, Implied, 2),
    /* $B9 */ Opcode::new(Op::Lda, AbsoluteY, 4).with_page_penalty(),
    /* $BA */ Opcode::new(Op::Tsx, Implied, 2),
    /* $BB */ Opcode::new(Op::Las, AbsoluteY, 4).with_page_penalty().undocumented(),
    /* $BC */ Opcode::new(Op::Ldy, AbsoluteX, 4).with_page_penalty(),
    /* $BD */ Opcode::new(Op::Lda, AbsoluteX, 4).with_page_penalty(),
    /* $BE */ Opcode::new(Op::Ldx, AbsoluteY, 4).with_page_penalty(),
    /* $BF */ Opcode::new(Op::Lax, AbsoluteY, 4).with_page_penalty().undocumented(),
    /* $C0 */ Opcode::new(Op::Cpy, Immediate, 2),
    /* $C1 */ Opcode::new(Op::Cmp, IndexedIndirect, 6),
    /* $C2 */ Opcode::new(Op::Nop, Immediate, 2).undocumented(),
    /* $C3 */ Opcode::new(Op::Dcp, IndexedIndirect, 8).undocumented(),
    /* $C4 */ Opcode::new(Op::Cpy, ZeroPage, 3),
    /* $C5 */ Opcode::new(Op::Cmp, ZeroPage, 3),
    /* $C6 */ Opcode::new(Op::Dec, ZeroPage, 5),
    /* $C7 */ Opcode::new(Op::Dcp, ZeroPage, 5).undocumented(),
    /* $C8 */ Opcode::new(Op::Iny, Implied, 2),
    /* $C9 */ Opcode::new(Op::Cmp, Immediate, 2),
    /* $CA */ Opcode::new(Op::Dex, Implied, 2),
    /* $CB */ Opcode::new(Op::Sbx, Immediate, 2).undocumented(),
    /* $CC */ Opcode::new(Op::Cpy, Absolute, 4),
    /* $CD */ Opcode::new(Op::Cmp, Absolute, 4),
    /* $CE */ Opcode::new(Op::Dec, Absolute, 6),
    /* $CF */ Opcode::new(Op::Dcp, Absolute, 6).undocumented(),
    /* $D0 */ Opcode::new(Op::Bne, Relative, 2),
    /* $D1 */ Opcode::new(Op::Cmp, IndirectIndexed, 5).with_page_penalty(),
    /* $D2 */ Opcode::new(Op::Jam, Implied, 2).undocumented(),
    /* $D3 */ Opcode::new(Op::Dcp, IndirectIndexed, 8).undocumented(),
    /* $D4 */ Opcode::new(Op::Nop, ZeroPageX, 4).undocumented(),
    /* $D5 */ Opcode::new(Op::Cmp, ZeroPageX, 4),
    /* $D6 */ Opcode::new(Op::Dec, ZeroPageX, 6),
    /* $D7 */ Opcode::new(Op::Dcp, ZeroPageX, 6).undocumented(),
    /* $D8 */ Opcode::new(Op::Cld, Implied, 2),
    /* $D9 */ Opcode::new(Op::Cmp, AbsoluteY, 4).with_page_penalty(),
    /* $DA */ Opcode::new(Op::Nop, Implied, 2).undocumented(),
    /* $DB */ Opcode::new(Op::Dcp, AbsoluteY, 7).undocumented(),
    /* $DC */ Opcode::new(Op::Nop, AbsoluteX, 4).with_page_penalty().undocumented(),
    /* $DD */ Opcode::new(Op::Cmp, AbsoluteX, 4).with_page_penalty(),
    /* $DE */ Opcode::new(Op::Dec, AbsoluteX, 7),
    /* $DF */ Opcode::new(Op::Dcp, AbsoluteX, 7).undocumented(),
    /* $E0 */ Opcode::new(Op::Cpx, Immediate, 2),
    /* $E1 */ Opcode::new(Op::Sbc, IndexedIndirect, 6),
    /* $E2 */ Opcode::new(Op::Nop, Immediate, 2).undocumented(),
    /* $E3 */ Opcode::new(Op::Isc, IndexedIndirect, 8).undocumented(),
    /* $E4 */ Opcode::new(Op::Cpx, ZeroPage, 3),
    /* $E5 */ Opcode::new(Op::Sbc, ZeroPage, 3),
    /* $E6 */ Opcode::new(Op::Inc, ZeroPage, 5),
    /* $E7 */ Opcode::new(Op::Isc, ZeroPage, 5).undocumented(),
    /* $E8 */ Opcode::new(Op::Inx, Implied, 2),
    /* $E9 */ Opcode::new(Op::Sbc, Immediate, 2),
    /* $EA */ Opcode::new(Op::Nop, Implied, 2),
    /* $EB */ Opcode::new(Op::Sbc, Immediate, 2).undocumented(),
    /* $EC */ Opcode::new(Op::Cpx, Absolute, 4),
    /* $ED */ Opcode::new(Op::Sbc, Absolute, 4),
    /* $EE */ Opcode::new(Op::Inc, Absolute, 6),
    /* $EF */ Opcode::new(Op::Isc, Absolute, 6).undocumented(),
    /* $F0 */ Opcode::new(Op::Beq, Relative, 2),
    /* $F1 */ Opcode::new(Op::Sbc, IndirectIndexed, 5).with_page_penalty(),
    /* $F2 */ Opcode::new(Op::Jam, Implied, 2).undocumented(),
    /* $F3 */ Opcode::new(Op::Isc, IndirectIndexed, 8).undocumented(),
    /* $F4 */ Opcode::new(Op::Nop, ZeroPageX, 4).undocumented(),
    /* $F5 */ Opcode::new(Op::Sbc, ZeroPageX, 4),
    /* $F6 */ Opcode::new(Op::Inc, ZeroPageX, 6),
    /* $F7 */ Opcode::new(Op::Isc, ZeroPageX, 6).undocumented(),
    /* $F8 */ Opcode::new(Op::Sed, Implied, 2),
    /* $F9 */ Opcode::new(Op::Sbc, AbsoluteY, 4).with_page_penalty(),
    /* $FA */ Opcode::new(Op::Nop, Implied, 2).undocumented(),
    /* $FB */ Opcode::new(Op::Isc, AbsoluteY, 7).undocumented(),
    /* $FC */ Opcode::new(Op::Nop, AbsoluteX, 4).with_page_penalty().undocumented(),
    /* $FD */ Opcode::new(Op::Sbc, AbsoluteX, 4).with_page_penalty(),
    /* $FE */ Opcode::new(Op::Inc, AbsoluteX, 7),
    /* $FF */ Opcode::new(Op::Isc, AbsoluteX, 7).undocumented(),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_count() {
        let documented = OPCODES.iter().filter(|o| !o.undocumented).count();
        assert_eq!(documented, 151);
    }

    #[test]
    fn jam_opcodes() {
        let jams: Vec<usize> = OPCODES
            .iter()
            .enumerate()
            .filter(|(_, o)| o.op == Op::Jam)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(
            jams,
            vec![0x02, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2]
        );
    }

    #[test]
    fn lengths_follow_mode() {
        assert_eq!(OPCODES[0xA9].size(), 2);
        assert_eq!(OPCODES[0x4C].size(), 3);
        assert_eq!(OPCODES[0xEA].size(), 1);
        assert_eq!(OPCODES[0x6C].mode, Indirect);
    }

    #[test]
    fn only_indexed_reads_carry_page_penalty() {
        for (code, o) in OPCODES.iter().enumerate() {
            if o.page_penalty {
                assert!(
                    matches!(o.mode, AbsoluteX | AbsoluteY | IndirectIndexed),
                    "${code:02X} has a page penalty in mode {:?}",
                    o.mode
                );
            }
        }
    }
}
