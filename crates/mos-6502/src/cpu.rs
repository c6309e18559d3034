//! 6502 instruction interpreter.
//!
//! `step()` runs one whole instruction: fetch, decode through the opcode
//! table, execute against the bus and retire. The cycle count it returns
//! comes from the table plus the page-cross and branch penalties. Interrupt
//! lines are polled at retire; a pending interrupt is taken by the next
//! `step()` in place of an opcode fetch and costs seven cycles.

use std::fmt;

use emu_core::{Bus, Cpu, Observable, Value};

use crate::flags::{self, C, D, I, N, V, Z};
use crate::opcodes::{AddressingMode, OPCODES, Op};
use crate::{Registers, Status};

/// Cycles taken by the reset, IRQ and NMI entry sequences.
pub const INTERRUPT_CYCLES: u32 = 7;

const NMI_VECTOR: u16 = 0xFFFA;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;

/// Diagnostic raised when the CPU executes one of the JAM opcodes.
///
/// The real part stops fetching until reset. This is never an error for the
/// host; the machine reports it and carries on ticking the chipset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalOpcode {
    pub opcode: u8,
    pub pc: u16,
}

impl fmt::Display for IllegalOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "illegal opcode ${:02X} at ${:04X}: CPU jammed until reset",
            self.opcode, self.pc
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    /// Reset line pulled; the vector is fetched on the next step.
    Reset,
    Jammed,
}

/// Decoded operand of the instruction being executed.
#[derive(Debug, Clone, Copy)]
enum Operand {
    None,
    Accumulator,
    Immediate(u8),
    Address(u16),
}

/// The MOS 6502 (and the 6510 core of the C64, which adds only the I/O port
/// handled by the machine's memory map).
#[derive(Debug)]
pub struct Mos6502 {
    pub regs: Registers,
    state: State,
    irq_line: bool,
    nmi_line: bool,
    nmi_pending: bool,
    /// I flag as the interrupt poll saw it at the end of the last
    /// instruction. CLI, SEI and PLP change I after the poll.
    poll_i: bool,
    jam: Option<IllegalOpcode>,
    jam_reported: bool,
    total_cycles: u64,
    instructions: u64,
}

impl Default for Mos6502 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mos6502 {
    /// A CPU with power-on registers. PC is left at zero; call `reset()` to
    /// fetch the reset vector, or set `regs.pc` directly.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            state: State::Running,
            irq_line: false,
            nmi_line: false,
            nmi_pending: false,
            poll_i: true,
            jam: None,
            jam_reported: false,
            total_cycles: 0,
            instructions: 0,
        }
    }

    /// Run one instruction or interrupt sequence. Returns cycles consumed.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let cycles = match self.state {
            State::Reset => {
                self.enter_reset(bus);
                INTERRUPT_CYCLES
            }
            // A jammed CPU holds the bus but the clock keeps running.
            State::Jammed => 1,
            State::Running => {
                if self.nmi_pending {
                    self.nmi_pending = false;
                    self.enter_interrupt(bus, NMI_VECTOR);
                    INTERRUPT_CYCLES
                } else if self.irq_line && !self.poll_i {
                    self.enter_interrupt(bus, IRQ_VECTOR);
                    INTERRUPT_CYCLES
                } else {
                    self.execute(bus)
                }
            }
        };
        self.total_cycles += u64::from(cycles);
        cycles
    }

    /// The reset line was pulled and the vector has not been fetched yet.
    #[must_use]
    pub fn reset_pending(&self) -> bool {
        self.state == State::Reset
    }

    /// Pulse the SO pin: sets V. The 1541 wires byte-ready here.
    pub fn set_overflow(&mut self) {
        self.regs.p.set_if(V, true);
    }

    /// The JAM that halted the CPU, reported once.
    pub fn take_illegal_opcode(&mut self) -> Option<IllegalOpcode> {
        if self.jam_reported {
            return None;
        }
        self.jam_reported = true;
        self.jam
    }

    /// Total cycles consumed since creation.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Instructions retired since creation.
    #[must_use]
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    fn enter_reset<B: Bus>(&mut self, bus: &mut B) {
        self.regs.s = 0xFD;
        self.regs.p.set_if(I, true);
        self.regs.pc = read_word(bus, RESET_VECTOR);
        self.state = State::Running;
        self.poll_i = true;
        self.nmi_pending = false;
    }

    fn enter_interrupt<B: Bus>(&mut self, bus: &mut B, vector: u16) {
        let [lo, hi] = self.regs.pc.to_le_bytes();
        self.push(bus, hi);
        self.push(bus, lo);
        self.push(bus, self.regs.p.to_byte_irq());
        self.regs.p.set_if(I, true);
        self.regs.pc = read_word(bus, vector);
        self.poll_i = true;
    }

    fn execute<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let opcode_pc = self.regs.pc;
        let opcode = bus.read(opcode_pc);
        self.regs.pc = opcode_pc.wrapping_add(1);

        let info = OPCODES[usize::from(opcode)];
        let i_before = self.regs.p.is_set(I);
        let (operand, crossed) = self.fetch_operand(bus, info.mode);

        let mut cycles = u32::from(info.cycles);
        if info.page_penalty && crossed {
            cycles += 1;
        }
        cycles += self.dispatch(bus, info.op, operand, crossed);

        if info.op == Op::Jam {
            self.regs.pc = opcode_pc;
            self.state = State::Jammed;
            self.jam = Some(IllegalOpcode {
                opcode,
                pc: opcode_pc,
            });
            self.jam_reported = false;
        }

        self.poll_i = match info.op {
            Op::Cli | Op::Sei | Op::Plp => i_before,
            _ => self.regs.p.is_set(I),
        };
        self.instructions += 1;
        cycles
    }

    fn next_byte<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn next_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.next_byte(bus);
        let hi = self.next_byte(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Resolve the operand. The flag reports an index crossing a page.
    fn fetch_operand<B: Bus>(&mut self, bus: &mut B, mode: AddressingMode) -> (Operand, bool) {
        match mode {
            AddressingMode::Implied => (Operand::None, false),
            AddressingMode::Accumulator => (Operand::Accumulator, false),
            AddressingMode::Immediate => (Operand::Immediate(self.next_byte(bus)), false),
            AddressingMode::ZeroPage => (Operand::Address(u16::from(self.next_byte(bus))), false),
            AddressingMode::ZeroPageX => {
                let zp = self.next_byte(bus).wrapping_add(self.regs.x);
                (Operand::Address(u16::from(zp)), false)
            }
            AddressingMode::ZeroPageY => {
                let zp = self.next_byte(bus).wrapping_add(self.regs.y);
                (Operand::Address(u16::from(zp)), false)
            }
            AddressingMode::Absolute => (Operand::Address(self.next_word(bus)), false),
            AddressingMode::AbsoluteX => {
                let base = self.next_word(bus);
                indexed(base, self.regs.x)
            }
            AddressingMode::AbsoluteY => {
                let base = self.next_word(bus);
                indexed(base, self.regs.y)
            }
            AddressingMode::Indirect => {
                let ptr = self.next_word(bus);
                // The high byte is fetched without carrying into the page.
                let hi_ptr = (ptr & 0xFF00) | u16::from((ptr as u8).wrapping_add(1));
                let target = u16::from_le_bytes([bus.read(ptr), bus.read(hi_ptr)]);
                (Operand::Address(target), false)
            }
            AddressingMode::IndexedIndirect => {
                let zp = self.next_byte(bus).wrapping_add(self.regs.x);
                (Operand::Address(read_zp_word(bus, zp)), false)
            }
            AddressingMode::IndirectIndexed => {
                let zp = self.next_byte(bus);
                let base = read_zp_word(bus, zp);
                indexed(base, self.regs.y)
            }
            AddressingMode::Relative => {
                let offset = self.next_byte(bus) as i8;
                let target = self.regs.pc.wrapping_add(offset as u16);
                (Operand::Address(target), false)
            }
        }
    }

    fn load<B: Bus>(&mut self, bus: &mut B, operand: Operand) -> u8 {
        match operand {
            Operand::Immediate(value) => value,
            Operand::Address(addr) => bus.read(addr),
            Operand::Accumulator => self.regs.a,
            Operand::None => 0,
        }
    }

    fn store<B: Bus>(bus: &mut B, operand: Operand, value: u8) {
        if let Operand::Address(addr) = operand {
            bus.write(addr, value);
        }
    }

    /// Read-modify-write. Memory operands see the unmodified value written
    /// back first, as the NMOS part does.
    fn modify<B: Bus>(&mut self, bus: &mut B, operand: Operand, f: fn(&mut Self, u8) -> u8) -> u8 {
        match operand {
            Operand::Address(addr) => {
                let old = bus.read(addr);
                bus.write(addr, old);
                let new = f(self, old);
                bus.write(addr, new);
                new
            }
            _ => {
                let a = self.regs.a;
                let new = f(self, a);
                self.regs.a = new;
                new
            }
        }
    }

    /// Execute the operation; returns extra cycles beyond the table count.
    fn dispatch<B: Bus>(&mut self, bus: &mut B, op: Op, operand: Operand, crossed: bool) -> u32 {
        match op {
            Op::Lda => {
                let v = self.load(bus, operand);
                self.regs.a = v;
                self.regs.p.update_nz(v);
            }
            Op::Ldx => {
                let v = self.load(bus, operand);
                self.regs.x = v;
                self.regs.p.update_nz(v);
            }
            Op::Ldy => {
                let v = self.load(bus, operand);
                self.regs.y = v;
                self.regs.p.update_nz(v);
            }
            Op::Sta => Self::store(bus, operand, self.regs.a),
            Op::Stx => Self::store(bus, operand, self.regs.x),
            Op::Sty => Self::store(bus, operand, self.regs.y),
            Op::Ora => {
                let v = self.load(bus, operand);
                self.do_ora(v);
            }
            Op::And => {
                let v = self.load(bus, operand);
                self.do_and(v);
            }
            Op::Eor => {
                let v = self.load(bus, operand);
                self.do_eor(v);
            }
            Op::Adc => {
                let v = self.load(bus, operand);
                self.do_adc(v);
            }
            Op::Sbc => {
                let v = self.load(bus, operand);
                self.do_sbc(v);
            }
            Op::Cmp => {
                let v = self.load(bus, operand);
                self.compare(self.regs.a, v);
            }
            Op::Cpx => {
                let v = self.load(bus, operand);
                self.compare(self.regs.x, v);
            }
            Op::Cpy => {
                let v = self.load(bus, operand);
                self.compare(self.regs.y, v);
            }
            Op::Bit => {
                let v = self.load(bus, operand);
                self.regs.p.set_if(Z, self.regs.a & v == 0);
                self.regs.p.set_if(N, v & 0x80 != 0);
                self.regs.p.set_if(V, v & 0x40 != 0);
            }
            Op::Asl => {
                self.modify(bus, operand, Self::do_asl);
            }
            Op::Lsr => {
                self.modify(bus, operand, Self::do_lsr);
            }
            Op::Rol => {
                self.modify(bus, operand, Self::do_rol);
            }
            Op::Ror => {
                self.modify(bus, operand, Self::do_ror);
            }
            Op::Inc => {
                self.modify(bus, operand, Self::do_inc);
            }
            Op::Dec => {
                self.modify(bus, operand, Self::do_dec);
            }
            Op::Bpl => return self.branch(operand, !self.regs.p.is_set(N)),
            Op::Bmi => return self.branch(operand, self.regs.p.is_set(N)),
            Op::Bvc => return self.branch(operand, !self.regs.p.is_set(V)),
            Op::Bvs => return self.branch(operand, self.regs.p.is_set(V)),
            Op::Bcc => return self.branch(operand, !self.regs.p.is_set(C)),
            Op::Bcs => return self.branch(operand, self.regs.p.is_set(C)),
            Op::Bne => return self.branch(operand, !self.regs.p.is_set(Z)),
            Op::Beq => return self.branch(operand, self.regs.p.is_set(Z)),
            Op::Brk => {
                // The byte after BRK is padding and is skipped on return.
                let ret = self.regs.pc.wrapping_add(1);
                let [lo, hi] = ret.to_le_bytes();
                self.push(bus, hi);
                self.push(bus, lo);
                self.push(bus, self.regs.p.to_byte_brk());
                self.regs.p.set_if(I, true);
                self.regs.pc = read_word(bus, IRQ_VECTOR);
            }
            Op::Jmp => {
                if let Operand::Address(addr) = operand {
                    self.regs.pc = addr;
                }
            }
            Op::Jsr => {
                let [lo, hi] = self.regs.pc.wrapping_sub(1).to_le_bytes();
                self.push(bus, hi);
                self.push(bus, lo);
                if let Operand::Address(addr) = operand {
                    self.regs.pc = addr;
                }
            }
            Op::Rts => {
                let lo = self.pull(bus);
                let hi = self.pull(bus);
                self.regs.pc = u16::from_le_bytes([lo, hi]).wrapping_add(1);
            }
            Op::Rti => {
                let p = self.pull(bus);
                self.regs.p = Status::from_byte(p & !flags::B);
                let lo = self.pull(bus);
                let hi = self.pull(bus);
                self.regs.pc = u16::from_le_bytes([lo, hi]);
            }
            Op::Pha => self.push(bus, self.regs.a),
            Op::Php => self.push(bus, self.regs.p.to_byte_brk()),
            Op::Pla => {
                let v = self.pull(bus);
                self.regs.a = v;
                self.regs.p.update_nz(v);
            }
            Op::Plp => {
                let p = self.pull(bus);
                self.regs.p = Status::from_byte(p & !flags::B);
            }
            Op::Clc => self.regs.p.set_if(C, false),
            Op::Sec => self.regs.p.set_if(C, true),
            Op::Cli => self.regs.p.set_if(I, false),
            Op::Sei => self.regs.p.set_if(I, true),
            Op::Cld => self.regs.p.set_if(D, false),
            Op::Sed => self.regs.p.set_if(D, true),
            Op::Clv => self.regs.p.set_if(V, false),
            Op::Tax => {
                self.regs.x = self.regs.a;
                self.regs.p.update_nz(self.regs.x);
            }
            Op::Tay => {
                self.regs.y = self.regs.a;
                self.regs.p.update_nz(self.regs.y);
            }
            Op::Txa => {
                self.regs.a = self.regs.x;
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Tya => {
                self.regs.a = self.regs.y;
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Tsx => {
                self.regs.x = self.regs.s;
                self.regs.p.update_nz(self.regs.x);
            }
            Op::Txs => self.regs.s = self.regs.x,
            Op::Inx => {
                self.regs.x = self.regs.x.wrapping_add(1);
                self.regs.p.update_nz(self.regs.x);
            }
            Op::Iny => {
                self.regs.y = self.regs.y.wrapping_add(1);
                self.regs.p.update_nz(self.regs.y);
            }
            Op::Dex => {
                self.regs.x = self.regs.x.wrapping_sub(1);
                self.regs.p.update_nz(self.regs.x);
            }
            Op::Dey => {
                self.regs.y = self.regs.y.wrapping_sub(1);
                self.regs.p.update_nz(self.regs.y);
            }
            Op::Nop => {
                // Undocumented NOPs with a memory operand still read it.
                if let Operand::Address(addr) = operand {
                    let _ = bus.read(addr);
                }
            }
            Op::Jam => {}
            _ => self.dispatch_undocumented(bus, op, operand, crossed),
        }
        0
    }

    fn dispatch_undocumented<B: Bus>(&mut self, bus: &mut B, op: Op, operand: Operand, crossed: bool) {
        match op {
            Op::Slo => {
                let m = self.modify(bus, operand, Self::do_asl);
                self.do_ora(m);
            }
            Op::Rla => {
                let m = self.modify(bus, operand, Self::do_rol);
                self.do_and(m);
            }
            Op::Sre => {
                let m = self.modify(bus, operand, Self::do_lsr);
                self.do_eor(m);
            }
            Op::Rra => {
                let m = self.modify(bus, operand, Self::do_ror);
                self.do_adc(m);
            }
            Op::Dcp => {
                let m = self.modify(bus, operand, Self::do_dec);
                self.compare(self.regs.a, m);
            }
            Op::Isc => {
                let m = self.modify(bus, operand, Self::do_inc);
                self.do_sbc(m);
            }
            Op::Sax => Self::store(bus, operand, self.regs.a & self.regs.x),
            Op::Lax => {
                let v = self.load(bus, operand);
                self.regs.a = v;
                self.regs.x = v;
                self.regs.p.update_nz(v);
            }
            Op::Anc => {
                let v = self.load(bus, operand);
                self.do_and(v);
                self.regs.p.set_if(C, self.regs.a & 0x80 != 0);
            }
            Op::Alr => {
                let v = self.load(bus, operand);
                let t = self.regs.a & v;
                self.regs.a = self.do_lsr(t);
            }
            Op::Arr => {
                let v = self.load(bus, operand);
                self.do_arr(v);
            }
            Op::Sbx => {
                let v = self.load(bus, operand);
                let t = self.regs.a & self.regs.x;
                self.regs.p.set_if(C, t >= v);
                self.regs.x = t.wrapping_sub(v);
                self.regs.p.update_nz(self.regs.x);
            }
            // Unstable on real parts; the magic constant $EE matches most C64s.
            Op::Ane => {
                let v = self.load(bus, operand);
                self.regs.a = (self.regs.a | 0xEE) & self.regs.x & v;
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Lxa => {
                let v = self.load(bus, operand);
                let r = (self.regs.a | 0xEE) & v;
                self.regs.a = r;
                self.regs.x = r;
                self.regs.p.update_nz(r);
            }
            Op::Las => {
                let v = self.load(bus, operand) & self.regs.s;
                self.regs.a = v;
                self.regs.x = v;
                self.regs.s = v;
                self.regs.p.update_nz(v);
            }
            Op::Sha => self.store_high_and(bus, operand, crossed, self.regs.a & self.regs.x),
            Op::Shx => self.store_high_and(bus, operand, crossed, self.regs.x),
            Op::Shy => self.store_high_and(bus, operand, crossed, self.regs.y),
            Op::Tas => {
                self.regs.s = self.regs.a & self.regs.x;
                self.store_high_and(bus, operand, crossed, self.regs.s);
            }
            _ => {}
        }
    }

    /// SHA/SHX/SHY/TAS: store `value & (H + 1)` where H is the high byte of
    /// the unindexed base. On a page cross the stored value replaces the
    /// high byte of the target address.
    fn store_high_and<B: Bus>(&mut self, bus: &mut B, operand: Operand, crossed: bool, value: u8) {
        let Operand::Address(addr) = operand else {
            return;
        };
        let hi = (addr >> 8) as u8;
        let h1 = if crossed { hi } else { hi.wrapping_add(1) };
        let result = value & h1;
        let target = if crossed {
            (u16::from(result) << 8) | (addr & 0x00FF)
        } else {
            addr
        };
        bus.write(target, result);
    }

    fn branch(&mut self, operand: Operand, taken: bool) -> u32 {
        let Operand::Address(target) = operand else {
            return 0;
        };
        if !taken {
            return 0;
        }
        let extra = if target & 0xFF00 == self.regs.pc & 0xFF00 { 1 } else { 2 };
        self.regs.pc = target;
        extra
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        let addr = self.regs.push();
        bus.write(addr, value);
    }

    fn pull<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let addr = self.regs.pop();
        bus.read(addr)
    }

    // ALU

    fn compare(&mut self, register: u8, value: u8) {
        self.regs.p.set_if(C, register >= value);
        self.regs.p.update_nz(register.wrapping_sub(value));
    }

    fn do_ora(&mut self, val: u8) {
        self.regs.a |= val;
        self.regs.p.update_nz(self.regs.a);
    }

    fn do_and(&mut self, val: u8) {
        self.regs.a &= val;
        self.regs.p.update_nz(self.regs.a);
    }

    fn do_eor(&mut self, val: u8) {
        self.regs.a ^= val;
        self.regs.p.update_nz(self.regs.a);
    }

    fn do_adc(&mut self, val: u8) {
        if self.regs.p.is_set(D) {
            self.do_adc_decimal(val);
        } else {
            self.do_adc_binary(val);
        }
    }

    fn do_adc_binary(&mut self, val: u8) {
        let a = self.regs.a;
        let sum = u16::from(a) + u16::from(val) + u16::from(self.regs.p.is_set(C));
        let result = sum as u8;
        self.regs.p.set_if(C, sum > 0xFF);
        self.regs.p.set_if(V, (a ^ result) & (val ^ result) & 0x80 != 0);
        self.regs.a = result;
        self.regs.p.update_nz(result);
    }

    /// NMOS BCD add: Z from the binary sum, N and V from the intermediate.
    fn do_adc_decimal(&mut self, val: u8) {
        let a = self.regs.a;
        let carry = u8::from(self.regs.p.is_set(C));

        let mut lo = (a & 0x0F) + (val & 0x0F) + carry;
        if lo > 9 {
            lo += 6;
        }
        let mut hi = (a >> 4) + (val >> 4) + u8::from(lo > 0x0F);

        let bin_result = a.wrapping_add(val).wrapping_add(carry);
        self.regs.p.set_if(Z, bin_result == 0);
        let intermediate = (hi << 4) | (lo & 0x0F);
        self.regs.p.set_if(N, intermediate & 0x80 != 0);
        self.regs
            .p
            .set_if(V, (a ^ intermediate) & !(a ^ val) & 0x80 != 0);

        if hi > 9 {
            hi += 6;
        }
        self.regs.p.set_if(C, hi > 0x0F);
        self.regs.a = (hi << 4) | (lo & 0x0F);
    }

    fn do_sbc(&mut self, val: u8) {
        if self.regs.p.is_set(D) {
            self.do_sbc_decimal(val);
        } else {
            self.do_adc_binary(!val);
        }
    }

    /// NMOS BCD subtract: all flags from the binary result.
    fn do_sbc_decimal(&mut self, val: u8) {
        let a = self.regs.a;
        let borrow = i16::from(!self.regs.p.is_set(C));

        let bin_result = i16::from(a) - i16::from(val) - borrow;
        self.regs.p.set_if(C, bin_result >= 0);
        self.regs.p.set_if(Z, (bin_result as u8) == 0);
        self.regs.p.set_if(N, bin_result & 0x80 != 0);
        self.regs.p.set_if(
            V,
            (i16::from(a) ^ bin_result) & (i16::from(a) ^ i16::from(val)) & 0x80 != 0,
        );

        let mut lo = i16::from(a & 0x0F) - i16::from(val & 0x0F) - borrow;
        let mut hi = i16::from(a >> 4) - i16::from(val >> 4);
        if lo < 0 {
            lo -= 6;
            hi -= 1;
        }
        if hi < 0 {
            hi -= 6;
        }
        self.regs.a = ((hi << 4) as u8) | ((lo & 0x0F) as u8);
    }

    fn do_arr(&mut self, val: u8) {
        let t = self.regs.a & val;
        let carry_in = u8::from(self.regs.p.is_set(C)) << 7;
        let mut result = (t >> 1) | carry_in;

        if self.regs.p.is_set(D) {
            self.regs.p.set_if(N, carry_in != 0);
            self.regs.p.set_if(Z, result == 0);
            self.regs.p.set_if(V, (t ^ result) & 0x40 != 0);
            if (t & 0x0F) + (t & 0x01) > 5 {
                result = (result & 0xF0) | (result.wrapping_add(6) & 0x0F);
            }
            let fix_high = u16::from(t & 0xF0) + u16::from(t & 0x10) > 0x50;
            self.regs.p.set_if(C, fix_high);
            if fix_high {
                result = result.wrapping_add(0x60);
            }
        } else {
            self.regs.p.update_nz(result);
            self.regs.p.set_if(C, result & 0x40 != 0);
            self.regs
                .p
                .set_if(V, ((result >> 6) ^ (result >> 5)) & 0x01 != 0);
        }
        self.regs.a = result;
    }

    fn do_asl(&mut self, val: u8) -> u8 {
        self.regs.p.set_if(C, val & 0x80 != 0);
        let result = val << 1;
        self.regs.p.update_nz(result);
        result
    }

    fn do_lsr(&mut self, val: u8) -> u8 {
        self.regs.p.set_if(C, val & 0x01 != 0);
        let result = val >> 1;
        self.regs.p.update_nz(result);
        result
    }

    fn do_rol(&mut self, val: u8) -> u8 {
        let carry = u8::from(self.regs.p.is_set(C));
        self.regs.p.set_if(C, val & 0x80 != 0);
        let result = (val << 1) | carry;
        self.regs.p.update_nz(result);
        result
    }

    fn do_ror(&mut self, val: u8) -> u8 {
        let carry = u8::from(self.regs.p.is_set(C)) << 7;
        self.regs.p.set_if(C, val & 0x01 != 0);
        let result = (val >> 1) | carry;
        self.regs.p.update_nz(result);
        result
    }

    fn do_inc(&mut self, val: u8) -> u8 {
        let result = val.wrapping_add(1);
        self.regs.p.update_nz(result);
        result
    }

    fn do_dec(&mut self, val: u8) -> u8 {
        let result = val.wrapping_sub(1);
        self.regs.p.update_nz(result);
        result
    }
}

fn indexed(base: u16, index: u8) -> (Operand, bool) {
    let addr = base.wrapping_add(u16::from(index));
    (Operand::Address(addr), addr & 0xFF00 != base & 0xFF00)
}

fn read_word<B: Bus>(bus: &mut B, addr: u16) -> u16 {
    u16::from_le_bytes([bus.read(addr), bus.read(addr.wrapping_add(1))])
}

fn read_zp_word<B: Bus>(bus: &mut B, zp: u8) -> u16 {
    u16::from_le_bytes([bus.read(u16::from(zp)), bus.read(u16::from(zp.wrapping_add(1)))])
}

impl Cpu for Mos6502 {
    type Registers = Registers;

    fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        Mos6502::step(self, bus)
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }

    fn registers(&self) -> Self::Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.state == State::Jammed
    }

    fn set_irq(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    fn set_nmi(&mut self, asserted: bool) {
        if asserted && !self.nmi_line {
            self.nmi_pending = true;
        }
        self.nmi_line = asserted;
    }

    fn reset(&mut self) {
        self.state = State::Reset;
        self.jam = None;
        self.jam_reported = false;
        self.nmi_pending = false;
    }
}

impl Observable for Mos6502 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(self.regs.pc.into()),
            "a" => Some(self.regs.a.into()),
            "x" => Some(self.regs.x.into()),
            "y" => Some(self.regs.y.into()),
            "s" | "sp" => Some(self.regs.s.into()),
            "p" | "status" => Some(self.regs.p.0.into()),
            "flags.c" => Some(self.regs.p.is_set(C).into()),
            "flags.z" => Some(self.regs.p.is_set(Z).into()),
            "flags.i" => Some(self.regs.p.is_set(I).into()),
            "flags.d" => Some(self.regs.p.is_set(D).into()),
            "flags.v" => Some(self.regs.p.is_set(V).into()),
            "flags.n" => Some(self.regs.p.is_set(N).into()),
            "cycles" => Some(Value::U64(self.total_cycles)),
            "instructions" => Some(Value::U64(self.instructions)),
            "halted" => Some(self.is_halted().into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pc",
            "a",
            "x",
            "y",
            "s",
            "p",
            "flags.c",
            "flags.z",
            "flags.i",
            "flags.d",
            "flags.v",
            "flags.n",
            "cycles",
            "instructions",
            "halted",
        ]
    }
}
