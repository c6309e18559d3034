//! Register and flag trace of a small known program.

use emu_core::{Bus, SimpleBus};
use mos_6502::Mos6502;
use pretty_assertions::assert_eq;

/// (PC after step, A, X, P, cycles)
type TraceRow = (u16, u8, u8, u8, u32);

/// Sum 5+4+3+2+1 into A and store it at $20.
const PROGRAM: [u8; 14] = [
    0xA2, 0x05, // $0200 LDX #$05
    0xA9, 0x00, // $0202 LDA #$00
    0x18, //       $0204 CLC
    0x86, 0x10, // $0205 STX $10
    0x65, 0x10, // $0207 ADC $10
    0xCA, //       $0209 DEX
    0xD0, 0xF8, // $020A BNE $0204
    0x85, 0x20, // $020C STA $20
];

#[rustfmt::skip]
const GOLDEN: [TraceRow; 28] = [
    (0x0202, 0x00, 0x05, 0x24, 2),
    (0x0204, 0x00, 0x05, 0x26, 2),
    (0x0205, 0x00, 0x05, 0x26, 2),
    (0x0207, 0x00, 0x05, 0x26, 3),
    (0x0209, 0x05, 0x05, 0x24, 3),
    (0x020A, 0x05, 0x04, 0x24, 2),
    (0x0204, 0x05, 0x04, 0x24, 3),
    (0x0205, 0x05, 0x04, 0x24, 2),
    (0x0207, 0x05, 0x04, 0x24, 3),
    (0x0209, 0x09, 0x04, 0x24, 3),
    (0x020A, 0x09, 0x03, 0x24, 2),
    (0x0204, 0x09, 0x03, 0x24, 3),
    (0x0205, 0x09, 0x03, 0x24, 2),
    (0x0207, 0x09, 0x03, 0x24, 3),
    (0x0209, 0x0C, 0x03, 0x24, 3),
    (0x020A, 0x0C, 0x02, 0x24, 2),
    (0x0204, 0x0C, 0x02, 0x24, 3),
    (0x0205, 0x0C, 0x02, 0x24, 2),
    (0x0207, 0x0C, 0x02, 0x24, 3),
    (0x0209, 0x0E, 0x02, 0x24, 3),
    (0x020A, 0x0E, 0x01, 0x24, 2),
    (0x0204, 0x0E, 0x01, 0x24, 3),
    (0x0205, 0x0E, 0x01, 0x24, 2),
    (0x0207, 0x0E, 0x01, 0x24, 3),
    (0x0209, 0x0F, 0x01, 0x24, 3),
    (0x020A, 0x0F, 0x00, 0x26, 2),
    (0x020C, 0x0F, 0x00, 0x26, 2),
    (0x020E, 0x0F, 0x00, 0x26, 3),
];

#[test]
fn sum_loop_matches_golden_trace() {
    let mut bus = SimpleBus::new();
    bus.load(0x0200, &PROGRAM);
    let mut cpu = Mos6502::new();
    cpu.regs.pc = 0x0200;

    let trace: Vec<TraceRow> = (0..GOLDEN.len())
        .map(|_| {
            let cycles = cpu.step(&mut bus);
            (cpu.regs.pc, cpu.regs.a, cpu.regs.x, cpu.regs.p.0, cycles)
        })
        .collect();

    assert_eq!(trace, GOLDEN.to_vec());
    assert_eq!(bus.read(0x0020), 15);
    assert_eq!(cpu.total_cycles(), 71);
    assert_eq!(cpu.instructions(), 28);
}
