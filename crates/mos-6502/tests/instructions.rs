//! Instruction behaviour, stack layout and the undocumented opcodes.

use emu_core::{Bus, Cpu, SimpleBus};
use mos_6502::{Mos6502, flags};

/// Run one complete instruction and return its cycle count.
fn run_instruction(cpu: &mut Mos6502, bus: &mut SimpleBus) -> u32 {
    cpu.step(bus)
}

/// Load a program at $0200 and set PC there.
fn setup_program(bus: &mut SimpleBus, cpu: &mut Mos6502, program: &[u8]) {
    bus.load(0x0200, program);
    cpu.regs.pc = 0x0200;
}

fn run(cpu: &mut Mos6502, bus: &mut SimpleBus, count: usize) {
    for _ in 0..count {
        run_instruction(cpu, bus);
    }
}

#[test]
fn stack_pha_pla() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    let program = [
        0xA9, 0x42, // LDA #$42
        0xA2, 0xFF, // LDX #$FF
        0x9A, // TXS
        0x48, // PHA
        0xA9, 0x00, // LDA #$00
        0x68, // PLA
    ];
    setup_program(&mut bus, &mut cpu, &program);
    run(&mut cpu, &mut bus, 6);

    assert_eq!(cpu.regs.a, 0x42, "PLA should restore A");
    assert_eq!(cpu.regs.s, 0xFF, "SP should be back to $FF after PLA");
}

#[test]
fn stack_php_plp() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    let program = [
        0xA2, 0xFF, // LDX #$FF
        0x9A, // TXS
        0x38, // SEC
        0x08, // PHP
        0x18, // CLC
        0x28, // PLP
    ];
    setup_program(&mut bus, &mut cpu, &program);
    run(&mut cpu, &mut bus, 6);

    assert!(cpu.regs.p.is_set(flags::C), "PLP should restore carry flag");
    assert_eq!(cpu.regs.s, 0xFF);
}

#[test]
fn brk_stack_layout() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.write(0xFFFE, 0x00);
    bus.write(0xFFFF, 0x03);

    let program = [
        0xA2, 0xFF, // LDX #$FF    @ $0200
        0x9A, // TXS         @ $0202
        0x58, // CLI         @ $0203
        0x00, // BRK         @ $0204
        0xEA, // padding     @ $0205
    ];
    setup_program(&mut bus, &mut cpu, &program);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(run_instruction(&mut cpu, &mut bus), 7, "BRK takes 7 cycles");

    assert_eq!(cpu.pc(), 0x0300);
    assert_eq!(cpu.regs.s, 0xFC);
    assert!(cpu.regs.p.is_set(flags::I));

    // Return address skips the padding byte.
    assert_eq!(bus.read(0x01FF), 0x02);
    assert_eq!(bus.read(0x01FE), 0x06);
    let pushed_p = bus.read(0x01FD);
    assert_eq!(pushed_p & 0x30, 0x30, "pushed P has B and U set");
    assert_eq!(pushed_p & flags::I, 0, "pushed P has I clear after CLI");
}

#[test]
fn brk_then_rti_returns_past_padding() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.write(0xFFFE, 0x00);
    bus.write(0xFFFF, 0x03);
    bus.write(0x0300, 0x40); // RTI

    setup_program(&mut bus, &mut cpu, &[0x00, 0xEA, 0xA9, 0x07]);
    run(&mut cpu, &mut bus, 3); // BRK, RTI, LDA

    assert_eq!(cpu.regs.a, 0x07);
    assert_eq!(cpu.regs.s, 0xFD);
    assert!(!cpu.regs.p.is_set(flags::B), "B never exists in P itself");
}

#[test]
fn jsr_rts_round_trip() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.load(0x0300, &[0xE8, 0x60]); // INX; RTS
    setup_program(&mut bus, &mut cpu, &[0x20, 0x00, 0x03, 0xE8]);

    assert_eq!(run_instruction(&mut cpu, &mut bus), 6);
    assert_eq!(bus.read(0x01FD), 0x02);
    assert_eq!(bus.read(0x01FC), 0x02, "JSR pushes return address minus one");
    run(&mut cpu, &mut bus, 1);
    assert_eq!(run_instruction(&mut cpu, &mut bus), 6);
    assert_eq!(cpu.pc(), 0x0203);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.regs.x, 2);
}

#[test]
fn jmp_indirect_page_wrap_bug() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.write(0x10FF, 0x34);
    bus.write(0x1000, 0x12);
    bus.write(0x1100, 0x99);
    setup_program(&mut bus, &mut cpu, &[0x6C, 0xFF, 0x10]);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 0x1234);
}

#[test]
fn zero_page_index_wraps() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.write(0x007F, 0x55);
    // LDX #$FF; LDA $80,X
    setup_program(&mut bus, &mut cpu, &[0xA2, 0xFF, 0xB5, 0x80]);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.regs.a, 0x55);
}

#[test]
fn adc_binary_overflow() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    // CLC; LDA #$7F; ADC #$01
    setup_program(&mut bus, &mut cpu, &[0x18, 0xA9, 0x7F, 0x69, 0x01]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.regs.a, 0x80);
    assert!(cpu.regs.p.is_set(flags::V));
    assert!(cpu.regs.p.is_set(flags::N));
    assert!(!cpu.regs.p.is_set(flags::C));
}

#[test]
fn adc_decimal() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    // SED; CLC; LDA #$19; ADC #$28
    setup_program(&mut bus, &mut cpu, &[0xF8, 0x18, 0xA9, 0x19, 0x69, 0x28]);
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.regs.a, 0x47);
    assert!(!cpu.regs.p.is_set(flags::C));

    // SEC; LDA #$99; ADC #$00 -> $00 with carry
    setup_program(&mut bus, &mut cpu, &[0x38, 0xA9, 0x99, 0x69, 0x00]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.regs.a, 0x00);
    assert!(cpu.regs.p.is_set(flags::C));
}

#[test]
fn sbc_decimal() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    // SED; SEC; LDA #$42; SBC #$13
    setup_program(&mut bus, &mut cpu, &[0xF8, 0x38, 0xA9, 0x42, 0xE9, 0x13]);
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.regs.a, 0x29);
    assert!(cpu.regs.p.is_set(flags::C));
}

#[test]
fn illegal_lax_zeropage() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.write(0x0010, 0x42);
    setup_program(&mut bus, &mut cpu, &[0xA7, 0x10]);
    assert_eq!(run_instruction(&mut cpu, &mut bus), 3);

    assert_eq!(cpu.regs.a, 0x42);
    assert_eq!(cpu.regs.x, 0x42);
    assert!(!cpu.regs.p.is_set(flags::Z));
    assert!(!cpu.regs.p.is_set(flags::N));
}

#[test]
fn illegal_sax_zeropage() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.write(0x0010, 0xFF);
    let program = [
        0xA9, 0x0F, // LDA #$0F
        0xA2, 0xF0, // LDX #$F0
        0x87, 0x10, // SAX $10
    ];
    setup_program(&mut bus, &mut cpu, &program);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(bus.read(0x0010), 0x00, "SAX stores A AND X");
}

#[test]
fn illegal_slo_zeropage() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.write(0x0010, 0x40);
    setup_program(&mut bus, &mut cpu, &[0xA9, 0x01, 0x07, 0x10]);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(run_instruction(&mut cpu, &mut bus), 5);

    assert_eq!(bus.read(0x0010), 0x80);
    assert_eq!(cpu.regs.a, 0x81);
    assert!(!cpu.regs.p.is_set(flags::C));
    assert!(cpu.regs.p.is_set(flags::N));
}

#[test]
fn illegal_rla_zeropage() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.write(0x0010, 0x81);
    // SEC; LDA #$FF; RLA $10
    setup_program(&mut bus, &mut cpu, &[0x38, 0xA9, 0xFF, 0x27, 0x10]);
    run(&mut cpu, &mut bus, 3);

    assert_eq!(bus.read(0x0010), 0x03, "ROL with carry in");
    assert_eq!(cpu.regs.a, 0x03);
    assert!(cpu.regs.p.is_set(flags::C));
}

#[test]
fn illegal_sre_and_rra() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.write(0x0010, 0x03);
    bus.write(0x0011, 0x02);
    // LDA #$F0; SRE $10; CLC; RRA $11
    setup_program(&mut bus, &mut cpu, &[0xA9, 0xF0, 0x47, 0x10, 0x18, 0x67, 0x11]);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(bus.read(0x0010), 0x01);
    assert_eq!(cpu.regs.a, 0xF1);
    assert!(cpu.regs.p.is_set(flags::C));

    run(&mut cpu, &mut bus, 2);
    assert_eq!(bus.read(0x0011), 0x01);
    assert_eq!(cpu.regs.a, 0xF2);
}

#[test]
fn illegal_dcp_zeropage() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.write(0x0010, 0x43);
    setup_program(&mut bus, &mut cpu, &[0xA9, 0x42, 0xC7, 0x10]);
    run(&mut cpu, &mut bus, 2);

    assert_eq!(bus.read(0x0010), 0x42);
    assert!(cpu.regs.p.is_set(flags::Z), "A equals decremented memory");
    assert!(cpu.regs.p.is_set(flags::C));
}

#[test]
fn illegal_isc_zeropage() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.write(0x0010, 0x0F);
    // SEC; LDA #$20; ISC $10
    setup_program(&mut bus, &mut cpu, &[0x38, 0xA9, 0x20, 0xE7, 0x10]);
    run(&mut cpu, &mut bus, 3);

    assert_eq!(bus.read(0x0010), 0x10);
    assert_eq!(cpu.regs.a, 0x10);
    assert!(cpu.regs.p.is_set(flags::C));
}

#[test]
fn illegal_anc_immediate() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    setup_program(&mut bus, &mut cpu, &[0xA9, 0xFF, 0x0B, 0x80]);
    run(&mut cpu, &mut bus, 2);

    assert_eq!(cpu.regs.a, 0x80);
    assert!(cpu.regs.p.is_set(flags::C), "ANC copies N into C");
    assert!(cpu.regs.p.is_set(flags::N));
}

#[test]
fn illegal_alr_immediate() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    setup_program(&mut bus, &mut cpu, &[0xA9, 0xFF, 0x4B, 0x03]);
    run(&mut cpu, &mut bus, 2);

    assert_eq!(cpu.regs.a, 0x01);
    assert!(cpu.regs.p.is_set(flags::C));
}

#[test]
fn illegal_arr_immediate() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    // SEC; LDA #$FF; ARR #$C0
    setup_program(&mut bus, &mut cpu, &[0x38, 0xA9, 0xFF, 0x6B, 0xC0]);
    run(&mut cpu, &mut bus, 3);

    assert_eq!(cpu.regs.a, 0xE0);
    assert!(cpu.regs.p.is_set(flags::C), "C is bit 6 of the result");
    assert!(!cpu.regs.p.is_set(flags::V), "V is bit 6 xor bit 5");
}

#[test]
fn illegal_sbx_immediate() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    // LDA #$0F; LDX #$FF; SBX #$05
    setup_program(&mut bus, &mut cpu, &[0xA9, 0x0F, 0xA2, 0xFF, 0xCB, 0x05]);
    run(&mut cpu, &mut bus, 3);

    assert_eq!(cpu.regs.x, 0x0A);
    assert!(cpu.regs.p.is_set(flags::C));
    assert_eq!(cpu.regs.a, 0x0F, "A is untouched");
}

#[test]
fn illegal_las_absolute_y() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.write(0x1000, 0x3C);
    // LDX #$F0; TXS; LDY #$00; LAS $1000,Y
    setup_program(&mut bus, &mut cpu, &[0xA2, 0xF0, 0x9A, 0xA0, 0x00, 0xBB, 0x00, 0x10]);
    run(&mut cpu, &mut bus, 4);

    assert_eq!(cpu.regs.a, 0x30);
    assert_eq!(cpu.regs.x, 0x30);
    assert_eq!(cpu.regs.s, 0x30);
}

#[test]
fn illegal_shx_stores_x_and_high_byte() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    // LDX #$FF; LDY #$01; SHX $1000,Y
    setup_program(&mut bus, &mut cpu, &[0xA2, 0xFF, 0xA0, 0x01, 0x9E, 0x00, 0x10]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(bus.read(0x1001), 0x11);
}

#[test]
fn illegal_nop_variants_skip_operands() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    let program = [
        0x1A, // NOP
        0x80, 0xFF, // NOP #$FF
        0x04, 0x10, // NOP $10
        0x0C, 0x00, 0x10, // NOP $1000
        0xA9, 0x42, // LDA #$42
    ];
    setup_program(&mut bus, &mut cpu, &program);
    let cycles: Vec<u32> = (0..4).map(|_| run_instruction(&mut cpu, &mut bus)).collect();
    assert_eq!(cycles, vec![2, 2, 3, 4]);
    assert_eq!(cpu.pc(), 0x0208);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.a, 0x42);
}

#[test]
fn illegal_jam_halts_cpu() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    setup_program(&mut bus, &mut cpu, &[0x02, 0xA9, 0x42]);
    run_instruction(&mut cpu, &mut bus);

    let pc_before = cpu.pc();
    for _ in 0..10 {
        run_instruction(&mut cpu, &mut bus);
    }
    assert!(cpu.is_halted());
    assert_eq!(cpu.pc(), pc_before, "JAM should halt the CPU");
    assert_ne!(cpu.regs.a, 0x42, "LDA should not have executed");
}

#[test]
fn jammed_cpu_ignores_interrupts() {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.load(0xFFFA, &[0x00, 0x04]);
    setup_program(&mut bus, &mut cpu, &[0x12]);
    run_instruction(&mut cpu, &mut bus);
    cpu.set_nmi(true);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 0x0200);
}
