//! Synthetic ROMs and disks shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use emu_c64::{InputState, Machine, MachineConfig, Roms};
use format_d64::D64;
use format_prg::Prg;

/// INX; JMP $E000
pub const SPIN: &[u8] = &[0xE8, 0x4C, 0x00, 0xE0];

/// KERNAL image running `program` from $E000, interrupts on an RTI at $FF00.
pub fn roms(program: &[u8]) -> Roms {
    let mut kernal = vec![0xEA; 0x2000];
    kernal[..program.len()].copy_from_slice(program);
    kernal[0x1F00] = 0x40;
    kernal[0x1FFA..].copy_from_slice(&[0x00, 0xFF, 0x00, 0xE0, 0x00, 0xFF]);
    Roms::new(kernal, vec![0xBB; 0x2000], vec![0xCC; 0x1000], None).expect("ROM sizes")
}

pub fn machine(program: &[u8]) -> Machine {
    machine_with_config(program, &MachineConfig::default())
}

pub fn machine_with_config(program: &[u8], config: &MachineConfig) -> Machine {
    Machine::new(config, &roms(program), Arc::new(InputState::new())).expect("machine builds")
}

/// LDA #$02; STA $D020; JMP $C005
pub fn red_border_prg() -> Prg {
    Prg {
        load_address: 0xC000,
        data: vec![0xA9, 0x02, 0x8D, 0x20, 0xD0, 0x4C, 0x05, 0xC0],
    }
}

pub fn disk_with(files: &[(&str, &[u8])]) -> D64 {
    let mut disk = D64::blank("FIXTURE", *b"FX");
    for (name, bytes) in files {
        disk.write_file(name, bytes).expect("disk space");
    }
    disk
}
