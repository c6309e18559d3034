//! Autostart: load a program from drive 8 once BASIC is up, then run it.
//!
//! Arming starts a frame countdown long enough for the KERNAL to reach the
//! READY prompt. The program is then copied straight into RAM. A BASIC
//! program gets its end pointers set and `RUN` typed into the keyboard
//! buffer; anything else is entered by jumping to its load address.

use format_d64::D64;
use format_prg::Prg;
use mos_6502::Mos6502;

use crate::error::MachineError;
use crate::memory::Memory;

/// Autostart target that picks the first PRG on the disk.
pub const FIRST_PROGRAM: &str = "*";

const KEYBOARD_BUFFER: u16 = 0x0277;
const KEYBOARD_COUNT: u16 = 0x00C6;
const TXTTAB: u16 = 0x002B;
const VARTAB: u16 = 0x002D;
const ARYTAB: u16 = 0x002F;
const STREND: u16 = 0x0031;
const LOAD_END: u16 = 0x00AE;

/// `RUN` and return, in PETSCII.
const RUN: &[u8] = b"RUN\r";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutostartState {
    #[default]
    Idle,
    Waiting {
        frames_left: u32,
    },
    /// Program is in memory; waiting for `RUN` to be consumed.
    Injected,
    Done,
    Failed,
}

/// Something worth telling the host about.
#[derive(Debug)]
pub enum AutostartReport {
    Started { name: String, address: u16, basic: bool },
    Finished,
    Failed(MachineError),
}

#[derive(Debug, Default)]
pub struct Autostart {
    state: AutostartState,
    target: String,
}

impl Autostart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> AutostartState {
        self.state
    }

    /// Waiting or injected: the time warp should cover.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            AutostartState::Waiting { .. } | AutostartState::Injected
        )
    }

    /// Start the countdown for `target` (a name pattern, or `*`).
    pub fn arm(&mut self, target: &str, delay_frames: u32) {
        self.target = if target.is_empty() {
            FIRST_PROGRAM.to_string()
        } else {
            target.to_string()
        };
        self.state = AutostartState::Waiting {
            frames_left: delay_frames,
        };
        log::debug!("autostart armed for {:?} in {delay_frames} frames", self.target);
    }

    pub fn cancel(&mut self) {
        self.state = AutostartState::Idle;
    }

    /// Advance by one frame.
    pub fn on_frame(
        &mut self,
        cpu: &mut Mos6502,
        memory: &mut Memory,
        disk: Option<&D64>,
    ) -> Option<AutostartReport> {
        match self.state {
            AutostartState::Waiting { frames_left } if frames_left > 0 => {
                self.state = AutostartState::Waiting {
                    frames_left: frames_left - 1,
                };
                None
            }
            AutostartState::Waiting { .. } => Some(self.inject(cpu, memory, disk)),
            AutostartState::Injected if memory.ram_read(KEYBOARD_COUNT) == 0 => {
                self.state = AutostartState::Done;
                Some(AutostartReport::Finished)
            }
            _ => None,
        }
    }

    fn inject(&mut self, cpu: &mut Mos6502, memory: &mut Memory, disk: Option<&D64>) -> AutostartReport {
        match self.load(memory, disk) {
            Ok((name, prg)) => {
                let address = prg.load_address;
                let basic = prg.is_basic();
                if basic {
                    memory.load(KEYBOARD_BUFFER, RUN);
                    memory.ram_write(KEYBOARD_COUNT, RUN.len() as u8);
                    self.state = AutostartState::Injected;
                } else {
                    cpu.regs.pc = address;
                    self.state = AutostartState::Done;
                }
                log::info!("autostart: {name} at ${address:04X}");
                AutostartReport::Started {
                    name,
                    address,
                    basic,
                }
            }
            Err(e) => {
                log::warn!("autostart of {:?} failed: {e}", self.target);
                self.state = AutostartState::Failed;
                AutostartReport::Failed(e)
            }
        }
    }

    fn load(&self, memory: &mut Memory, disk: Option<&D64>) -> Result<(String, Prg), MachineError> {
        let disk = disk.ok_or(MachineError::DriveNotReady)?;
        let entry = if self.target == FIRST_PROGRAM {
            disk.first_program()?
        } else {
            disk.find_file(&self.target)?
        };
        let bytes = disk.read_chain(entry.track, entry.sector)?;
        let prg = Prg::parse(&bytes)
            .map_err(|e| MachineError::InvalidImageFormat(format!("{}: {e}", entry.name)))?;

        memory.load(prg.load_address, &prg.data);
        let end = prg.end_address().to_le_bytes();
        memory.load(LOAD_END, &end);
        if prg.is_basic() {
            memory.load(TXTTAB, &prg.load_address.to_le_bytes());
            for pointer in [VARTAB, ARYTAB, STREND] {
                memory.load(pointer, &end);
            }
        }
        Ok((entry.name, prg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::tests::test_roms;
    use pretty_assertions::assert_eq;

    fn disk_with(files: &[(&str, Prg)]) -> D64 {
        let mut d64 = D64::blank("AUTO", *b"01");
        for (name, prg) in files {
            d64.write_file(name, &prg.to_bytes()).expect("space");
        }
        d64
    }

    fn basic_prg() -> Prg {
        Prg {
            load_address: 0x0801,
            data: vec![0x0B, 0x08, 0x0A, 0x00, 0x9E, b'4', b'9', b'1', b'5', b'2', 0, 0, 0],
        }
    }

    fn code_prg() -> Prg {
        Prg {
            load_address: 0xC000,
            data: vec![0xA9, 0x02, 0x8D, 0x20, 0xD0, 0x4C, 0x05, 0xC0],
        }
    }

    #[test]
    fn waits_for_the_delay() {
        let mut autostart = Autostart::new();
        let mut cpu = Mos6502::new();
        let mut memory = Memory::new(&test_roms());
        let disk = disk_with(&[("GAME", code_prg())]);
        autostart.arm("GAME", 2);
        assert!(autostart.is_active());
        assert!(autostart.on_frame(&mut cpu, &mut memory, Some(&disk)).is_none());
        assert!(autostart.on_frame(&mut cpu, &mut memory, Some(&disk)).is_none());
        assert_eq!(autostart.state(), AutostartState::Waiting { frames_left: 0 });
        assert!(autostart.on_frame(&mut cpu, &mut memory, Some(&disk)).is_some());
    }

    #[test]
    fn machine_code_jumps_to_load_address() {
        let mut autostart = Autostart::new();
        let mut cpu = Mos6502::new();
        let mut memory = Memory::new(&test_roms());
        let disk = disk_with(&[("GAME", code_prg())]);
        autostart.arm("GAME", 0);
        let report = autostart.on_frame(&mut cpu, &mut memory, Some(&disk));
        assert!(matches!(
            report,
            Some(AutostartReport::Started {
                address: 0xC000,
                basic: false,
                ..
            })
        ));
        assert_eq!(cpu.regs.pc, 0xC000);
        assert_eq!(&memory.ram()[0xC000..0xC008], code_prg().data.as_slice());
        assert_eq!(autostart.state(), AutostartState::Done);
        assert!(!autostart.is_active());
    }

    #[test]
    fn basic_program_types_run() {
        let mut autostart = Autostart::new();
        let mut cpu = Mos6502::new();
        let mut memory = Memory::new(&test_roms());
        let disk = disk_with(&[("DATA", code_prg()), ("START", basic_prg())]);
        autostart.arm(FIRST_PROGRAM, 0);
        autostart.on_frame(&mut cpu, &mut memory, Some(&disk));
        // First PRG is DATA, a machine-code file.
        assert_eq!(cpu.regs.pc, 0xC000);

        let mut autostart = Autostart::new();
        let mut cpu = Mos6502::new();
        autostart.arm("ST*", 0);
        autostart.on_frame(&mut cpu, &mut memory, Some(&disk));
        assert_eq!(autostart.state(), AutostartState::Injected);
        assert_eq!(&memory.ram()[0x0277..0x027B], b"RUN\r");
        assert_eq!(memory.ram_read(0x00C6), 4);
        assert_eq!(memory.ram_read(0x002D), 0x0E);
        assert_eq!(memory.ram_read(0x002E), 0x08);
        assert_eq!(memory.ram_read(0x0031), 0x0E);

        // Still injected until the KERNAL empties the buffer.
        assert!(autostart.on_frame(&mut cpu, &mut memory, Some(&disk)).is_none());
        memory.ram_write(0x00C6, 0);
        assert!(matches!(
            autostart.on_frame(&mut cpu, &mut memory, Some(&disk)),
            Some(AutostartReport::Finished)
        ));
        assert_eq!(autostart.state(), AutostartState::Done);
    }

    #[test]
    fn missing_file_or_disk_fails() {
        let mut cpu = Mos6502::new();
        let mut memory = Memory::new(&test_roms());
        let disk = disk_with(&[("GAME", code_prg())]);

        let mut autostart = Autostart::new();
        autostart.arm("NOPE", 0);
        let report = autostart.on_frame(&mut cpu, &mut memory, Some(&disk));
        assert!(matches!(
            report,
            Some(AutostartReport::Failed(MachineError::FileNotFound(_)))
        ));
        assert_eq!(autostart.state(), AutostartState::Failed);

        let mut autostart = Autostart::new();
        autostart.arm("GAME", 0);
        let report = autostart.on_frame(&mut cpu, &mut memory, None);
        assert!(matches!(
            report,
            Some(AutostartReport::Failed(MachineError::DriveNotReady))
        ));
    }
}
