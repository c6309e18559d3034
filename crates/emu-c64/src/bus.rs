//! The CPU's view of the machine: banked memory plus the I/O area.
//!
//! Every access resolves through the 6510 port's bank configuration. I/O
//! addresses go to the chip selected by address bits 8-11; everything else
//! is RAM or ROM. CIA1 port reads sample the shared `InputState` first, so
//! host input is seen by the very next scan.

use std::sync::Arc;

use emu_core::Bus;

use crate::chipset::Chipset;
use crate::input::InputState;
use crate::memory::{Memory, Region};

/// Kind of data access a watchpoint fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Load,
    Store,
}

/// An armed watchpoint range, pushed down from the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watch {
    pub number: u32,
    pub start: u16,
    pub end: u16,
    pub kind: AccessKind,
}

/// First watched access since the last `take_watch_hit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchHit {
    pub number: u32,
    pub address: u16,
    pub kind: AccessKind,
}

pub struct C64Bus {
    pub memory: Memory,
    pub chipset: Chipset,
    input: Arc<InputState>,
    watches: Vec<Watch>,
    watch_hit: Option<WatchHit>,
}

impl C64Bus {
    #[must_use]
    pub fn new(memory: Memory, chipset: Chipset, input: Arc<InputState>) -> Self {
        Self {
            memory,
            chipset,
            input,
            watches: Vec::new(),
            watch_hit: None,
        }
    }

    #[must_use]
    pub fn input(&self) -> &Arc<InputState> {
        &self.input
    }

    /// Replace the armed watchpoints.
    pub fn set_watches(&mut self, watches: Vec<Watch>) {
        self.watches = watches;
        self.watch_hit = None;
    }

    pub fn take_watch_hit(&mut self) -> Option<WatchHit> {
        self.watch_hit.take()
    }

    fn check_watch(&mut self, address: u16, kind: AccessKind) {
        if self.watch_hit.is_some() || self.watches.is_empty() {
            return;
        }
        self.watch_hit = self
            .watches
            .iter()
            .find(|w| w.kind == kind && (w.start..=w.end).contains(&address))
            .map(|w| WatchHit {
                number: w.number,
                address,
                kind,
            });
    }

    fn sample_input(&mut self) {
        let cia1 = &mut self.chipset.cia1;
        let (pa, pb) = self
            .input
            .cia1_pins(cia1.port_a_output(), cia1.port_b_output());
        cia1.set_port_a_input(pa);
        cia1.set_port_b_input(pb);
    }

    fn io_read(&mut self, addr: u16) -> u8 {
        match addr {
            0xD000..=0xD3FF => self.chipset.vic.read((addr & 0x3F) as u8),
            0xD400..=0xD7FF => self.chipset.sid.read((addr & 0x1F) as u8),
            0xD800..=0xDBFF => 0xF0 | self.memory.colour_ram_read(addr - 0xD800),
            0xDC00..=0xDCFF => {
                self.sample_input();
                self.chipset.cia1.read((addr & 0x0F) as u8)
            }
            0xDD00..=0xDDFF => self.chipset.cia2.read((addr & 0x0F) as u8),
            _ => 0xFF,
        }
    }

    fn io_peek(&mut self, addr: u16) -> u8 {
        match addr {
            0xD000..=0xD3FF => self.chipset.vic.peek((addr & 0x3F) as u8),
            0xD400..=0xD7FF => self.chipset.sid.read((addr & 0x1F) as u8),
            0xD800..=0xDBFF => 0xF0 | self.memory.colour_ram_read(addr - 0xD800),
            0xDC00..=0xDCFF => {
                self.sample_input();
                self.chipset.cia1.peek((addr & 0x0F) as u8)
            }
            0xDD00..=0xDDFF => self.chipset.cia2.peek((addr & 0x0F) as u8),
            _ => 0xFF,
        }
    }

    fn io_write(&mut self, addr: u16, value: u8) {
        match addr {
            0xD000..=0xD3FF => self.chipset.vic.write((addr & 0x3F) as u8, value),
            0xD400..=0xD7FF => self.chipset.sid.write((addr & 0x1F) as u8, value),
            0xD800..=0xDBFF => self.memory.colour_ram_write(addr - 0xD800, value),
            0xDC00..=0xDCFF => self.chipset.cia1.write((addr & 0x0F) as u8, value),
            0xDD00..=0xDDFF => {
                let reg = (addr & 0x0F) as u8;
                self.chipset.cia2.write(reg, value);
                if reg == 0x00 || reg == 0x02 {
                    self.chipset.update_vic_bank();
                }
            }
            _ => {}
        }
    }
}

impl Bus for C64Bus {
    fn read(&mut self, address: u16) -> u8 {
        self.check_watch(address, AccessKind::Load);
        if self.memory.resolve(address) == Region::Io {
            self.io_read(address)
        } else {
            self.memory.read(address)
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        self.check_watch(address, AccessKind::Store);
        if self.memory.resolve(address) == Region::Io {
            self.io_write(address, value);
        } else {
            self.memory.write(address, value);
        }
    }

    fn peek(&mut self, address: u16) -> u8 {
        if self.memory.resolve(address) == Region::Io {
            self.io_peek(address)
        } else {
            self.memory.read(address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::C64Key;
    use crate::memory::tests::test_roms;
    use mos_sid_6581::SidModel;
    use mos_vic_ii::VideoStandard;

    fn make_bus() -> C64Bus {
        let memory = Memory::new(&test_roms());
        let chipset = Chipset::new(VideoStandard::Pal, SidModel::Mos6581, 44_100);
        C64Bus::new(memory, chipset, Arc::new(InputState::new()))
    }

    #[test]
    fn ram_round_trip_below_io() {
        let mut bus = make_bus();
        for addr in (0x0002..0xA000u32).step_by(97) {
            let addr = addr as u16;
            bus.write(addr, addr as u8 ^ 0x5A);
            assert_eq!(bus.read(addr), addr as u8 ^ 0x5A);
        }
    }

    #[test]
    fn rom_write_is_a_read_no_op() {
        let mut bus = make_bus();
        bus.write(0xE123, 0x42);
        assert_eq!(bus.read(0xE123), 0xEE);
        assert_eq!(bus.memory.ram_read(0xE123), 0x42);
    }

    #[test]
    fn vic_registers_mirror_every_64_bytes() {
        let mut bus = make_bus();
        bus.write(0xD020, 0x02);
        assert_eq!(bus.read(0xD020) & 0x0F, 0x02);
        assert_eq!(bus.read(0xD060) & 0x0F, 0x02);
        assert_eq!(bus.read(0xD3E0) & 0x0F, 0x02);
    }

    #[test]
    fn colour_ram_reads_high_nibble_set() {
        let mut bus = make_bus();
        bus.write(0xD800, 0x3E);
        assert_eq!(bus.read(0xD800), 0xFE);
    }

    #[test]
    fn open_io_reads_ff() {
        let mut bus = make_bus();
        assert_eq!(bus.read(0xDE00), 0xFF);
        assert_eq!(bus.read(0xDFFF), 0xFF);
    }

    #[test]
    fn io_write_does_not_touch_ram() {
        let mut bus = make_bus();
        let before = bus.memory.ram_read(0xD020);
        bus.write(0xD020, 0x07);
        assert_eq!(bus.memory.ram_read(0xD020), before);
    }

    #[test]
    fn keyboard_scan_through_cia1() {
        let mut bus = make_bus();
        bus.write(0xDC02, 0xFF);
        bus.write(0xDC03, 0x00);
        bus.input().press(C64Key::Return);
        bus.write(0xDC00, !0x02);
        assert_eq!(bus.read(0xDC01), !0x01);
        bus.write(0xDC00, !0x01);
        assert_eq!(bus.read(0xDC01), 0xFF);
    }

    #[test]
    fn cia2_write_switches_vic_bank() {
        let mut bus = make_bus();
        bus.write(0xDD00, 0x00);
        assert_eq!(bus.chipset.vic.bank(), 3);
    }

    #[test]
    fn watch_records_first_matching_access() {
        let mut bus = make_bus();
        bus.set_watches(vec![Watch {
            number: 1,
            start: 0xC000,
            end: 0xC0FF,
            kind: AccessKind::Store,
        }]);
        let _ = bus.read(0xC010);
        assert_eq!(bus.take_watch_hit(), None);
        bus.write(0xC010, 1);
        assert_eq!(
            bus.take_watch_hit(),
            Some(WatchHit {
                number: 1,
                address: 0xC010,
                kind: AccessKind::Store
            })
        );
        let _ = bus.peek(0xC010);
        assert_eq!(bus.take_watch_hit(), None);
    }
}
