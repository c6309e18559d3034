//! MOS 6502 CPU core with the full NMOS opcode map.
//!
//! `Mos6502::step()` executes one instruction and returns the number of
//! machine cycles it took, read from the opcode table. Undocumented opcodes
//! behave as on NMOS silicon; the JAM opcodes halt the CPU until reset and
//! raise an `IllegalOpcode` diagnostic.

mod cpu;
mod disasm;
pub mod flags;
pub mod opcodes;
mod registers;

pub use cpu::{INTERRUPT_CYCLES, IllegalOpcode, Mos6502};
pub use disasm::{Disassembly, disassemble};
pub use flags::Status;
pub use opcodes::{AddressingMode, OPCODES, Op, Opcode};
pub use registers::Registers;
