//! Virtual device 8: KERNAL LOAD serviced straight from the disk image.
//!
//! The KERNAL's LOAD vector lands on `$F49E` with the caller's registers
//! intact:
//!   A   = 0 (LOAD) or 1 (VERIFY)
//!   X/Y = start address for a relocating load
//!   $B7 = file name length, $BB/$BC = file name pointer
//!   $BA = device number, $B9 = secondary address (0 = relocate to X/Y)
//!
//! When the trap fires the file is copied into RAM, the end address is
//! left in X/Y and $AE/$AF, and the CPU returns to the caller of LOAD. A
//! name of `$` loads the directory as a BASIC program, as the drive does.

use format_d64::{D64, DirEntry};
use mos_6502::{Mos6502, flags};

use crate::error::MachineError;
use crate::iec::DRIVE_DEVICE;
use crate::memory::Memory;

/// KERNAL LOAD entry after the `$FFD5` jump.
pub const LOAD_TRAP: u16 = 0xF49E;

/// KERNAL error codes returned in A with carry set.
pub mod kernal_error {
    pub const FILE_NOT_FOUND: u8 = 4;
    pub const DEVICE_NOT_PRESENT: u8 = 5;
    pub const MISSING_FILE_NAME: u8 = 8;
}

const STATUS: u16 = 0x0090;
const SECONDARY: u16 = 0x00B9;
const DEVICE: u16 = 0x00BA;
const NAME_LEN: u16 = 0x00B7;
const NAME_PTR: u16 = 0x00BB;
const LOAD_END: u16 = 0x00AE;

/// ST bit set when VERIFY finds a difference.
const VERIFY_MISMATCH: u8 = 0x10;

/// What the trap did, for logging and events.
#[derive(Debug)]
pub enum TrapOutcome {
    Loaded { name: String, start: u16, end: u16 },
    Verified { name: String, matched: bool },
    Failed { name: String, error: MachineError },
}

/// Service a LOAD from device 8 if the CPU sits at the trap address.
///
/// Returns `None` (and changes nothing) for other devices, so the ROM
/// routine runs and talks to the serial bus itself.
pub fn service_load(cpu: &mut Mos6502, memory: &mut Memory, disk: Option<&D64>) -> Option<TrapOutcome> {
    if cpu.regs.pc != LOAD_TRAP || memory.ram_read(DEVICE) != DRIVE_DEVICE {
        return None;
    }
    let name = file_name(memory);
    let verify = cpu.regs.a != 0;
    let relocate = memory.ram_read(SECONDARY) == 0;
    let caller_start = u16::from_le_bytes([cpu.regs.x, cpu.regs.y]);

    let outcome = match fetch(disk, &name) {
        Ok(file) if file.len() >= 2 => {
            let start = if relocate {
                caller_start
            } else {
                u16::from_le_bytes([file[0], file[1]])
            };
            let payload = &file[2..];
            let end = start.wrapping_add(payload.len() as u16);
            let mut status = 0;
            let outcome = if verify {
                let matched = payload
                    .iter()
                    .enumerate()
                    .all(|(i, &b)| memory.ram_read(start.wrapping_add(i as u16)) == b);
                if !matched {
                    status |= VERIFY_MISMATCH;
                }
                TrapOutcome::Verified {
                    name: name.clone(),
                    matched,
                }
            } else {
                memory.load(start, payload);
                TrapOutcome::Loaded {
                    name: name.clone(),
                    start,
                    end,
                }
            };
            let [lo, hi] = end.to_le_bytes();
            cpu.regs.x = lo;
            cpu.regs.y = hi;
            memory.ram_write(LOAD_END, lo);
            memory.ram_write(LOAD_END + 1, hi);
            memory.ram_write(STATUS, status);
            cpu.regs.p.set_if(flags::C, false);
            outcome
        }
        Ok(_) => fail(cpu, &name, MachineError::FileNotFound(name.clone())),
        Err(error) => fail(cpu, &name, error),
    };
    return_to_caller(cpu, memory);
    Some(outcome)
}

fn fetch(disk: Option<&D64>, name: &str) -> Result<Vec<u8>, MachineError> {
    let disk = disk.ok_or(MachineError::DriveNotReady)?;
    if name.is_empty() {
        return Err(MachineError::FileNotFound(String::new()));
    }
    if name.starts_with('$') {
        let mut file = 0x0401u16.to_le_bytes().to_vec();
        file.extend(directory_program(disk, 0x0401)?);
        return Ok(file);
    }
    Ok(disk.read_file(name)?)
}

fn fail(cpu: &mut Mos6502, name: &str, error: MachineError) -> TrapOutcome {
    let code = match &error {
        MachineError::DriveNotReady => kernal_error::DEVICE_NOT_PRESENT,
        MachineError::FileNotFound(n) if n.is_empty() => kernal_error::MISSING_FILE_NAME,
        _ => kernal_error::FILE_NOT_FOUND,
    };
    cpu.regs.a = code;
    cpu.regs.p.set_if(flags::C, true);
    TrapOutcome::Failed {
        name: name.to_string(),
        error,
    }
}

/// Name bytes from the KERNAL's pointer, PETSCII shown as ASCII.
fn file_name(memory: &Memory) -> String {
    let len = memory.ram_read(NAME_LEN);
    let ptr = u16::from_le_bytes([memory.ram_read(NAME_PTR), memory.ram_read(NAME_PTR + 1)]);
    (0..u16::from(len))
        .map(|i| petscii_char(memory.read(ptr.wrapping_add(i))))
        .collect()
}

/// Pop the JSR return address and continue after the call, as RTS would.
fn return_to_caller(cpu: &mut Mos6502, memory: &Memory) {
    let sp = cpu.regs.s;
    let lo = memory.ram_read(0x0100 | u16::from(sp.wrapping_add(1)));
    let hi = memory.ram_read(0x0100 | u16::from(sp.wrapping_add(2)));
    cpu.regs.s = sp.wrapping_add(2);
    cpu.regs.pc = u16::from_le_bytes([lo, hi]).wrapping_add(1);
}

fn petscii_char(byte: u8) -> char {
    match byte {
        0x20..=0x5F => char::from(byte),
        0xC1..=0xDA => char::from(byte - 0x80),
        0xA0 => ' ',
        _ => '?',
    }
}

/// One line of a `LOAD"$",8` listing: line number and PETSCII text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLine {
    pub number: u16,
    pub text: Vec<u8>,
}

/// The lines the 1541 produces for `$`: header, one line per file, free blocks.
pub fn directory_listing(disk: &D64) -> Result<Vec<ListingLine>, MachineError> {
    let entries = disk.list_directory()?;
    let mut lines = Vec::with_capacity(entries.len() + 2);

    let mut header = vec![0x12, b'"'];
    header.extend(disk.disk_name_raw());
    header.extend(b"\" ");
    header.extend(disk.disk_id());
    header.extend(b" 2A");
    lines.push(ListingLine {
        number: 0,
        text: header,
    });

    lines.extend(entries.iter().map(entry_line));

    let mut footer = b"BLOCKS FREE.".to_vec();
    footer.extend([b' '; 13]);
    lines.push(ListingLine {
        number: disk.blocks_free(),
        text: footer,
    });
    Ok(lines)
}

fn entry_line(entry: &DirEntry) -> ListingLine {
    let name: Vec<u8> = entry
        .raw_name
        .iter()
        .copied()
        .take_while(|&b| b != 0xA0)
        .collect();
    let indent = match entry.blocks {
        0..=9 => 3,
        10..=99 => 2,
        _ => 1,
    };
    let mut text = vec![b' '; indent];
    text.push(b'"');
    text.extend(&name);
    text.push(b'"');
    text.extend(std::iter::repeat_n(b' ', 16 - name.len() + 1));
    text.push(if entry.closed { b' ' } else { b'*' });
    text.extend(entry.file_type.label().bytes());
    text.push(if entry.locked { b'<' } else { b' ' });
    ListingLine {
        number: entry.blocks,
        text,
    }
}

/// The listing as a tokenised BASIC program linked for `load_address`.
/// The two-byte load address itself is not included.
pub fn directory_program(disk: &D64, load_address: u16) -> Result<Vec<u8>, MachineError> {
    let mut program = Vec::new();
    for line in directory_listing(disk)? {
        let next = load_address
            .wrapping_add(program.len() as u16)
            .wrapping_add(4 + line.text.len() as u16 + 1);
        program.extend(next.to_le_bytes());
        program.extend(line.number.to_le_bytes());
        program.extend(&line.text);
        program.push(0);
    }
    program.extend([0, 0]);
    Ok(program)
}

/// The listing as plain text, one line per entry, for the monitor.
pub fn directory_text(disk: &D64) -> Result<String, MachineError> {
    let mut out = String::new();
    for line in directory_listing(disk)? {
        out.push_str(&line.number.to_string());
        out.push(' ');
        out.extend(line.text.iter().filter(|&&b| b != 0x12).map(|&b| petscii_char(b)));
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::tests::test_roms;
    use pretty_assertions::assert_eq;

    fn disk() -> D64 {
        let mut d64 = D64::blank("TEST DISK", *b"AB");
        d64.write_file("GAME", &[0x00, 0xC0, 0xA9, 0x02, 0x60]).expect("space");
        d64.write_file("DATA", &[0x00, 0x20, 1, 2, 3]).expect("space");
        d64
    }

    /// CPU at the trap with `JSR $FFD5` from $1000 on the stack.
    fn at_trap(memory: &mut Memory, name: &str, secondary: u8) -> Mos6502 {
        let mut cpu = Mos6502::new();
        cpu.regs.pc = LOAD_TRAP;
        cpu.regs.a = 0;
        cpu.regs.x = 0x01;
        cpu.regs.y = 0x08;
        cpu.regs.s = 0xFB;
        memory.ram_write(0x01FC, 0x02);
        memory.ram_write(0x01FD, 0x10);
        memory.ram_write(DEVICE, 8);
        memory.ram_write(SECONDARY, secondary);
        memory.ram_write(NAME_LEN, name.len() as u8);
        memory.ram_write(NAME_PTR, 0x00);
        memory.ram_write(NAME_PTR + 1, 0x02);
        memory.load(0x0200, name.as_bytes());
        cpu
    }

    #[test]
    fn loads_file_at_header_address() {
        let mut memory = Memory::new(&test_roms());
        let mut cpu = at_trap(&mut memory, "GAME", 1);
        let outcome = service_load(&mut cpu, &mut memory, Some(&disk()));
        assert!(matches!(
            outcome,
            Some(TrapOutcome::Loaded {
                start: 0xC000,
                end: 0xC003,
                ..
            })
        ));
        assert_eq!(&memory.ram()[0xC000..0xC003], &[0xA9, 0x02, 0x60]);
        assert_eq!((cpu.regs.x, cpu.regs.y), (0x03, 0xC0));
        assert_eq!(memory.ram_read(0xAE), 0x03);
        assert!(!cpu.regs.p.is_set(flags::C));
        assert_eq!(cpu.regs.pc, 0x1003);
        assert_eq!(cpu.regs.s, 0xFD);
    }

    #[test]
    fn secondary_zero_relocates_to_xy() {
        let mut memory = Memory::new(&test_roms());
        let mut cpu = at_trap(&mut memory, "G*", 0);
        service_load(&mut cpu, &mut memory, Some(&disk()));
        assert_eq!(&memory.ram()[0x0801..0x0804], &[0xA9, 0x02, 0x60]);
    }

    #[test]
    fn other_devices_fall_through() {
        let mut memory = Memory::new(&test_roms());
        let mut cpu = at_trap(&mut memory, "GAME", 1);
        memory.ram_write(DEVICE, 1);
        assert!(service_load(&mut cpu, &mut memory, Some(&disk())).is_none());
        assert_eq!(cpu.regs.pc, LOAD_TRAP);
    }

    #[test]
    fn missing_file_and_missing_disk_set_carry() {
        let mut memory = Memory::new(&test_roms());
        let mut cpu = at_trap(&mut memory, "NOPE", 1);
        service_load(&mut cpu, &mut memory, Some(&disk()));
        assert!(cpu.regs.p.is_set(flags::C));
        assert_eq!(cpu.regs.a, kernal_error::FILE_NOT_FOUND);

        let mut cpu = at_trap(&mut memory, "GAME", 1);
        let outcome = service_load(&mut cpu, &mut memory, None);
        assert!(matches!(
            outcome,
            Some(TrapOutcome::Failed {
                error: MachineError::DriveNotReady,
                ..
            })
        ));
        assert_eq!(cpu.regs.a, kernal_error::DEVICE_NOT_PRESENT);
    }

    #[test]
    fn verify_reports_mismatch_in_status() {
        let mut memory = Memory::new(&test_roms());
        let mut cpu = at_trap(&mut memory, "GAME", 1);
        cpu.regs.a = 1;
        service_load(&mut cpu, &mut memory, Some(&disk()));
        assert_eq!(memory.ram_read(STATUS), VERIFY_MISMATCH);

        memory.load(0xC000, &[0xA9, 0x02, 0x60]);
        let mut cpu = at_trap(&mut memory, "GAME", 1);
        cpu.regs.a = 1;
        let outcome = service_load(&mut cpu, &mut memory, Some(&disk()));
        assert!(matches!(outcome, Some(TrapOutcome::Verified { matched: true, .. })));
        assert_eq!(memory.ram_read(STATUS), 0);
    }

    #[test]
    fn directory_listing_lines() {
        let lines = directory_listing(&disk()).expect("listing");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].number, 0);
        assert_eq!(&lines[0].text[..11], b"\x12\"TEST DISK");
        assert_eq!(lines[1].number, 1);
        assert_eq!(lines[1].text, b"   \"GAME\"              PRG ".to_vec());
        assert_eq!(lines[3].number, 662);
    }

    #[test]
    fn directory_program_links_lines() {
        let program = directory_program(&disk(), 0x0801).expect("listing");
        let first_link = u16::from_le_bytes([program[0], program[1]]);
        let first_len = usize::from(first_link - 0x0801);
        assert_eq!(program[first_len - 1], 0);
        assert_eq!(&program[program.len() - 2..], &[0, 0]);
    }

    #[test]
    fn directory_text_for_monitor() {
        let text = directory_text(&disk()).expect("listing");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "0 \"TEST DISK       \" AB 2A");
        assert!(lines[2].contains("\"DATA\""));
        assert!(lines[3].starts_with("662 BLOCKS FREE."));
    }

    #[test]
    fn dollar_load_relocates_listing() {
        let mut memory = Memory::new(&test_roms());
        let mut cpu = at_trap(&mut memory, "$", 0);
        let outcome = service_load(&mut cpu, &mut memory, Some(&disk()));
        assert!(matches!(outcome, Some(TrapOutcome::Loaded { start: 0x0801, .. })));
        // Line number 0 of the header follows the link.
        assert_eq!(memory.ram_read(0x0803), 0);
        assert_eq!(memory.ram_read(0x0805), 0x12);
    }
}
