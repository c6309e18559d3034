//! Address decoding for the 1541's 6502.
//!
//!   $0000-$07FF: 2K RAM, mirrored through $17FF
//!   $1800-$1BFF: VIA1, IEC interface (16 registers, mirrored)
//!   $1C00-$1FFF: VIA2, disk controller (16 registers, mirrored)
//!   $C000-$FFFF: 16K DOS ROM
//!
//! Nothing answers at $2000-$BFFF; reads there see the high address byte
//! left on the bus.

use emu_core::Bus;
use mos_via_6522::Via6522;

pub struct Drive1541Bus {
    ram: [u8; 0x800],
    rom: Box<[u8]>,
    pub via1: Via6522,
    pub via2: Via6522,
}

impl Drive1541Bus {
    /// `rom` must be the 16K DOS image; the caller validates its size.
    #[must_use]
    pub fn new(rom: &[u8]) -> Self {
        debug_assert_eq!(rom.len(), 0x4000);
        Self {
            ram: [0; 0x800],
            rom: rom.into(),
            via1: Via6522::new(),
            via2: Via6522::new(),
        }
    }

    /// Reset both VIAs; RAM keeps its contents.
    pub fn reset(&mut self) {
        self.via1.reset();
        self.via2.reset();
    }

    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    fn rom_byte(&self, addr: u16) -> u8 {
        self.rom
            .get(usize::from(addr - 0xC000))
            .copied()
            .unwrap_or(0xFF)
    }
}

impl Bus for Drive1541Bus {
    fn read(&mut self, address: u16) -> u8 {
        match address {
            0x0000..=0x17FF => self.ram[usize::from(address & 0x07FF)],
            0x1800..=0x1BFF => self.via1.read((address & 0x0F) as u8),
            0x1C00..=0x1FFF => self.via2.read((address & 0x0F) as u8),
            0xC000..=0xFFFF => self.rom_byte(address),
            _ => (address >> 8) as u8,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x17FF => self.ram[usize::from(address & 0x07FF)] = value,
            0x1800..=0x1BFF => self.via1.write((address & 0x0F) as u8, value),
            0x1C00..=0x1FFF => self.via2.write((address & 0x0F) as u8, value),
            _ => {}
        }
    }

    fn peek(&mut self, address: u16) -> u8 {
        match address {
            // Register reads clear interrupt flags; show RAM-side state only.
            0x1800..=0x1FFF => 0xFF,
            _ => self.read(address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bus() -> Drive1541Bus {
        let mut rom = vec![0xEA; 0x4000];
        rom[0x3FFC] = 0x00;
        rom[0x3FFD] = 0xC0;
        Drive1541Bus::new(&rom)
    }

    #[test]
    fn ram_is_mirrored() {
        let mut bus = make_bus();
        bus.write(0x0010, 0x42);
        assert_eq!(bus.read(0x0010), 0x42);
        assert_eq!(bus.read(0x0810), 0x42);
        assert_eq!(bus.read(0x1010), 0x42);
    }

    #[test]
    fn rom_is_read_only() {
        let mut bus = make_bus();
        assert_eq!(bus.read(0xC000), 0xEA);
        assert_eq!(bus.read(0xFFFC), 0x00);
        assert_eq!(bus.read(0xFFFD), 0xC0);
        bus.write(0xC000, 0x00);
        assert_eq!(bus.read(0xC000), 0xEA);
    }

    #[test]
    fn vias_are_mirrored() {
        let mut bus = make_bus();
        bus.write(0x1803, 0xFF);
        assert_eq!(bus.read(0x1813), 0xFF);
        bus.write(0x1C02, 0x6F);
        assert_eq!(bus.read(0x1FF2), 0x6F);
    }

    #[test]
    fn unmapped_reads_open_bus() {
        let mut bus = make_bus();
        assert_eq!(bus.read(0x8000), 0x80);
    }
}
