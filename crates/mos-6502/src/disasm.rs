//! Disassembler for the monitor.

use emu_core::Bus;

use crate::opcodes::{AddressingMode, OPCODES};

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disassembly {
    pub address: u16,
    /// Opcode followed by operand bytes.
    pub bytes: Vec<u8>,
    /// Assembler text, e.g. `LDA $C000,X`.
    pub text: String,
    pub undocumented: bool,
}

impl Disassembly {
    /// Address of the following instruction.
    #[must_use]
    pub fn next_address(&self) -> u16 {
        self.address.wrapping_add(self.bytes.len() as u16)
    }
}

/// Decode the instruction at `address` using side-effect free reads.
pub fn disassemble<B: Bus>(bus: &mut B, address: u16) -> Disassembly {
    let opcode = bus.peek(address);
    let info = &OPCODES[usize::from(opcode)];
    let bytes: Vec<u8> = (0..info.size())
        .map(|i| bus.peek(address.wrapping_add(i)))
        .collect();
    let operand = format_operand(info.mode, address, &bytes[1..]);
    let text = if operand.is_empty() {
        info.mnemonic().to_string()
    } else {
        format!("{} {operand}", info.mnemonic())
    };
    Disassembly {
        address,
        bytes,
        text,
        undocumented: info.undocumented,
    }
}

fn format_operand(mode: AddressingMode, address: u16, operand: &[u8]) -> String {
    let byte = operand.first().copied().unwrap_or(0);
    let word = u16::from_le_bytes([byte, operand.get(1).copied().unwrap_or(0)]);
    match mode {
        AddressingMode::Implied => String::new(),
        AddressingMode::Accumulator => "A".to_string(),
        AddressingMode::Immediate => format!("#${byte:02X}"),
        AddressingMode::ZeroPage => format!("${byte:02X}"),
        AddressingMode::ZeroPageX => format!("${byte:02X},X"),
        AddressingMode::ZeroPageY => format!("${byte:02X},Y"),
        AddressingMode::Absolute => format!("${word:04X}"),
        AddressingMode::AbsoluteX => format!("${word:04X},X"),
        AddressingMode::AbsoluteY => format!("${word:04X},Y"),
        AddressingMode::Indirect => format!("(${word:04X})"),
        AddressingMode::IndexedIndirect => format!("(${byte:02X},X)"),
        AddressingMode::IndirectIndexed => format!("(${byte:02X}),Y"),
        AddressingMode::Relative => {
            let target = address.wrapping_add(2).wrapping_add(byte as i8 as u16);
            format!("${target:04X}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::SimpleBus;

    fn text_of(program: &[u8]) -> String {
        let mut bus = SimpleBus::new();
        bus.load(0xC000, program);
        disassemble(&mut bus, 0xC000).text
    }

    #[test]
    fn formats_by_mode() {
        assert_eq!(text_of(&[0xA9, 0x10]), "LDA #$10");
        assert_eq!(text_of(&[0xBD, 0x00, 0xD0]), "LDA $D000,X");
        assert_eq!(text_of(&[0x6C, 0xFC, 0xFF]), "JMP ($FFFC)");
        assert_eq!(text_of(&[0xB1, 0xFB]), "LDA ($FB),Y");
        assert_eq!(text_of(&[0x0A]), "ASL A");
    }

    #[test]
    fn branch_target_is_absolute() {
        assert_eq!(text_of(&[0xD0, 0xFE]), "BNE $C000");
        assert_eq!(text_of(&[0x10, 0x03]), "BPL $C005");
    }

    #[test]
    fn undocumented_opcodes_are_named() {
        let mut bus = SimpleBus::new();
        bus.load(0xC000, &[0xA7, 0x20]);
        let d = disassemble(&mut bus, 0xC000);
        assert_eq!(d.text, "LAX $20");
        assert!(d.undocumented);
        assert_eq!(d.next_address(), 0xC002);
    }
}
