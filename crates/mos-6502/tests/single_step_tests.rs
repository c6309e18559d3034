//! Tom Harte's `SingleStepTests` for the 6502.
//!
//! Each JSON case gives the state before and after one instruction plus the
//! list of bus cycles. `step()` must reach the final state and consume
//! exactly as many cycles as the list has entries.
//!
//! Test data lives in `test-data/65x02/6502/v1/XX.json`.

use emu_core::{Bus, SimpleBus};
use mos_6502::{Mos6502, OPCODES, Op, Status};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
struct TestCase {
    name: String,
    initial: CpuState,
    #[serde(rename = "final")]
    final_state: CpuState,
    cycles: Vec<(u16, u8, String)>,
}

#[derive(Deserialize)]
struct CpuState {
    pc: u16,
    s: u8,
    a: u8,
    x: u8,
    y: u8,
    p: u8,
    ram: Vec<(u16, u8)>,
}

fn setup(cpu: &mut Mos6502, bus: &mut SimpleBus, state: &CpuState) {
    for &(addr, value) in &state.ram {
        bus.write(addr, value);
    }
    cpu.regs.pc = state.pc;
    cpu.regs.s = state.s;
    cpu.regs.a = state.a;
    cpu.regs.x = state.x;
    cpu.regs.y = state.y;
    cpu.regs.p = Status::from_byte(state.p);
}

fn compare(cpu: &Mos6502, bus: &mut SimpleBus, expected: &CpuState) -> Vec<String> {
    let mut errors = Vec::new();
    let regs = [
        ("A", cpu.regs.a, expected.a),
        ("X", cpu.regs.x, expected.x),
        ("Y", cpu.regs.y, expected.y),
        ("S", cpu.regs.s, expected.s),
        ("P", cpu.regs.p.0, expected.p | 0x20),
    ];
    if cpu.regs.pc != expected.pc {
        errors.push(format!("PC: got ${:04X}, want ${:04X}", cpu.regs.pc, expected.pc));
    }
    for (name, got, want) in regs {
        if got != want {
            errors.push(format!("{name}: got ${got:02X}, want ${want:02X}"));
        }
    }
    for &(addr, want) in &expected.ram {
        let got = bus.read(addr);
        if got != want {
            errors.push(format!("RAM[${addr:04X}]: got ${got:02X}, want ${want:02X}"));
        }
    }
    errors
}

/// JAM and the unstable store/magic-constant opcodes vary between chips.
fn skipped(opcode: u8) -> bool {
    let op = OPCODES[usize::from(opcode)].op;
    matches!(
        op,
        Op::Jam | Op::Ane | Op::Lxa | Op::Sha | Op::Shx | Op::Shy | Op::Tas
    )
}

#[test]
#[ignore = "requires test-data/65x02"]
fn run_all() {
    let test_dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../test-data/65x02/6502/v1");
    if !test_dir.exists() {
        eprintln!("Test data not found at {}, skipping", test_dir.display());
        return;
    }

    let mut total_fail = 0u64;
    for opcode in 0..=0xFF_u8 {
        if skipped(opcode) {
            continue;
        }
        let path = test_dir.join(format!("{opcode:02x}.json"));
        let Ok(data) = fs::read_to_string(&path) else {
            continue;
        };
        let tests: Vec<TestCase> = serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("Failed to parse {}: {e}", path.display()));

        let mut failures = Vec::new();
        for test in &tests {
            let mut cpu = Mos6502::new();
            let mut bus = SimpleBus::new();
            setup(&mut cpu, &mut bus, &test.initial);

            let cycles = cpu.step(&mut bus);
            let mut errors = compare(&cpu, &mut bus, &test.final_state);
            if cycles as usize != test.cycles.len() {
                errors.push(format!("cycles: got {cycles}, want {}", test.cycles.len()));
            }
            if !errors.is_empty() {
                failures.push(format!("  FAIL [{}]: {}", test.name, errors.join(", ")));
            }
        }

        println!(
            "Opcode ${opcode:02X}: {}/{} passed",
            tests.len() - failures.len(),
            tests.len()
        );
        for msg in failures.iter().take(5) {
            println!("{msg}");
        }
        total_fail += failures.len() as u64;
    }

    assert_eq!(total_fail, 0, "{total_fail} tests failed");
}
