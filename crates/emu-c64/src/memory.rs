//! C64 memory: 64K RAM, the three ROMs, colour RAM and the 6510 port.
//!
//! # Banking
//!
//! Bits 0-2 of the 6510 port at $01 (LORAM, HIRAM, CHAREN) choose what the
//! CPU sees in the upper 24K. No cartridge is ever present, so GAME and
//! EXROM are high.
//!
//! | CHAREN | HIRAM | LORAM | $A000-$BFFF | $D000-$DFFF | $E000-$FFFF |
//! |--------|-------|-------|-------------|-------------|-------------|
//! | x      | 1     | 1     | BASIC       | I/O or CHAR | KERNAL      |
//! | x      | 1     | 0     | RAM         | I/O or CHAR | KERNAL      |
//! | x      | 0     | 1     | RAM         | I/O or CHAR | RAM         |
//! | x      | 0     | 0     | RAM         | RAM         | RAM         |
//!
//! "I/O or CHAR" is I/O with CHAREN set and character ROM with it clear.
//! Writes to a ROM address always land in the RAM underneath.
//!
//! The VIC-II sees its own 16K bank, with the character ROM at
//! $1000-$1FFF in banks 0 and 2.

use mos_vic_ii::VicMemory;

use crate::config::Roms;

const LORAM: u8 = 0x01;
const HIRAM: u8 = 0x02;
const CHAREN: u8 = 0x04;

/// Pull-ups seen on port bits configured as inputs.
const PORT_PULLUPS: u8 = 0x37;

/// Backing store an address resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// The 6510 port registers at $00/$01.
    Port,
    Ram,
    Basic,
    Kernal,
    Chargen,
    Io,
}

/// Low three bits of the 6510 port as a bank configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankConfig(pub u8);

impl BankConfig {
    /// Power-on configuration: BASIC, I/O and KERNAL visible.
    pub const DEFAULT: Self = Self(0x07);

    fn loram(self) -> bool {
        self.0 & LORAM != 0
    }

    fn hiram(self) -> bool {
        self.0 & HIRAM != 0
    }

    fn charen(self) -> bool {
        self.0 & CHAREN != 0
    }

    #[must_use]
    pub fn resolve(self, addr: u16) -> Region {
        match addr {
            0x0000..=0x0001 => Region::Port,
            0xA000..=0xBFFF if self.loram() && self.hiram() => Region::Basic,
            0xD000..=0xDFFF if self.loram() || self.hiram() => {
                if self.charen() {
                    Region::Io
                } else {
                    Region::Chargen
                }
            }
            0xE000..=0xFFFF if self.hiram() => Region::Kernal,
            _ => Region::Ram,
        }
    }
}

pub struct Memory {
    ram: Box<[u8; 0x10000]>,
    kernal: Box<[u8]>,
    basic: Box<[u8]>,
    chargen: Box<[u8]>,
    /// 4-bit colour nibbles, $D800-$DBFF.
    colour_ram: [u8; 1024],
    port_ddr: u8,
    port_data: u8,
}

impl Memory {
    /// Memory with the power-on RAM pattern and the given ROMs.
    #[must_use]
    pub fn new(roms: &Roms) -> Self {
        let mut memory = Self {
            ram: Box::new([0; 0x10000]),
            kernal: roms.kernal.clone().into_boxed_slice(),
            basic: roms.basic.clone().into_boxed_slice(),
            chargen: roms.chargen.clone().into_boxed_slice(),
            colour_ram: [0; 1024],
            port_ddr: 0,
            port_data: 0,
        };
        memory.power_on();
        memory
    }

    /// Fill RAM with the power-up pattern (64 bytes of $00, 64 of $FF, ...)
    /// and reset the port.
    pub fn power_on(&mut self) {
        for (addr, byte) in self.ram.iter_mut().enumerate() {
            *byte = if addr & 0x40 == 0 { 0x00 } else { 0xFF };
        }
        self.colour_ram.fill(0);
        self.reset_port();
    }

    /// Port state after the KERNAL's reset routine: DDR $2F, data $37.
    pub fn reset_port(&mut self) {
        self.port_ddr = 0x2F;
        self.port_data = 0x37;
    }

    /// Port levels: driven bits from the data register, inputs pulled up.
    #[must_use]
    pub fn port_value(&self) -> u8 {
        (self.port_data & self.port_ddr) | (PORT_PULLUPS & !self.port_ddr)
    }

    #[must_use]
    pub fn bank_config(&self) -> BankConfig {
        BankConfig(self.port_value() & 0x07)
    }

    /// Force a bank configuration by driving port bits 0-2.
    pub fn set_bank(&mut self, config: BankConfig) {
        self.port_ddr |= 0x07;
        self.port_data = (self.port_data & !0x07) | (config.0 & 0x07);
    }

    #[must_use]
    pub fn resolve(&self, addr: u16) -> Region {
        self.bank_config().resolve(addr)
    }

    /// CPU-visible byte for every region except I/O, which the bus routes.
    /// An I/O address answers with the RAM beneath.
    #[must_use]
    pub fn read(&self, addr: u16) -> u8 {
        let i = usize::from(addr);
        match self.resolve(addr) {
            Region::Port if addr == 0 => self.port_ddr,
            Region::Port => self.port_value(),
            Region::Basic => self.basic[i - 0xA000],
            Region::Kernal => self.kernal[i - 0xE000],
            Region::Chargen => self.chargen[i - 0xD000],
            Region::Ram | Region::Io => self.ram[i],
        }
    }

    /// CPU write: always RAM (including beneath ROM and I/O). $00 and $01
    /// also latch the port registers.
    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000 => self.port_ddr = value,
            0x0001 => self.port_data = value,
            _ => {}
        }
        self.ram[usize::from(addr)] = value;
    }

    /// RAM regardless of banking.
    #[must_use]
    pub fn ram_read(&self, addr: u16) -> u8 {
        self.ram[usize::from(addr)]
    }

    pub fn ram_write(&mut self, addr: u16, value: u8) {
        self.ram[usize::from(addr)] = value;
    }

    /// Copy `data` into RAM at `start`, wrapping at $FFFF.
    pub fn load(&mut self, start: u16, data: &[u8]) {
        for (offset, &byte) in data.iter().enumerate() {
            self.ram_write(start.wrapping_add(offset as u16), byte);
        }
    }

    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.ram[..]
    }

    #[must_use]
    pub fn colour_ram_read(&self, offset: u16) -> u8 {
        debug_assert!(offset < 0x400);
        self.colour_ram[usize::from(offset & 0x3FF)]
    }

    /// Only the low nibble is stored.
    pub fn colour_ram_write(&mut self, offset: u16, value: u8) {
        debug_assert!(offset < 0x400);
        self.colour_ram[usize::from(offset & 0x3FF)] = value & 0x0F;
    }
}

impl VicMemory for Memory {
    fn vic_read(&self, bank: u8, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        if bank & 1 == 0 && (0x1000..0x2000).contains(&addr) {
            self.chargen[usize::from(addr - 0x1000)]
        } else {
            self.ram[usize::from(bank & 0x03) * 0x4000 + usize::from(addr)]
        }
    }

    fn colour_read(&self, offset: u16) -> u8 {
        self.colour_ram[usize::from(offset & 0x3FF)]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_roms() -> Roms {
        Roms {
            kernal: vec![0xEE; 8192],
            basic: vec![0xBB; 8192],
            chargen: vec![0xCC; 4096],
            dos1541: None,
        }
    }

    fn make_memory() -> Memory {
        Memory::new(&test_roms())
    }

    #[test]
    fn default_banking_sees_roms() {
        let mem = make_memory();
        assert_eq!(mem.port_value(), 0x37);
        assert_eq!(mem.read(0xA000), 0xBB);
        assert_eq!(mem.read(0xE000), 0xEE);
        assert_eq!(mem.resolve(0xD000), Region::Io);
    }

    #[test]
    fn rom_writes_land_in_ram() {
        let mut mem = make_memory();
        mem.write(0xA000, 0x42);
        assert_eq!(mem.read(0xA000), 0xBB);
        assert_eq!(mem.ram_read(0xA000), 0x42);
    }

    #[test]
    fn bank_table() {
        use Region::{Basic, Chargen, Io, Kernal, Ram};
        let expected = [
            (0, Ram, Ram, Ram),
            (1, Ram, Chargen, Ram),
            (2, Ram, Chargen, Kernal),
            (3, Basic, Chargen, Kernal),
            (4, Ram, Ram, Ram),
            (5, Ram, Io, Ram),
            (6, Ram, Io, Kernal),
            (7, Basic, Io, Kernal),
        ];
        for (bits, a000, d000, e000) in expected {
            let config = BankConfig(bits);
            assert_eq!(config.resolve(0xA000), a000, "bits {bits}");
            assert_eq!(config.resolve(0xD000), d000, "bits {bits}");
            assert_eq!(config.resolve(0xE000), e000, "bits {bits}");
            assert_eq!(config.resolve(0x8000), Ram);
        }
    }

    #[test]
    fn all_ram_banking() {
        let mut mem = make_memory();
        mem.set_bank(BankConfig(0));
        mem.ram_write(0xA000, 0x42);
        mem.ram_write(0xD000, 0x43);
        mem.ram_write(0xE000, 0x44);
        assert_eq!(mem.read(0xA000), 0x42);
        assert_eq!(mem.read(0xD000), 0x43);
        assert_eq!(mem.read(0xE000), 0x44);
    }

    #[test]
    fn char_rom_visible_when_charen_clear() {
        let mut mem = make_memory();
        mem.write(0x0001, 0x33);
        assert_eq!(mem.read(0xD000), 0xCC);
    }

    #[test]
    fn port_inputs_float_high() {
        let mut mem = make_memory();
        mem.write(0x0000, 0x00);
        assert_eq!(mem.read(0x0001), PORT_PULLUPS);
        mem.write(0x0000, 0xFF);
        mem.write(0x0001, 0x55);
        assert_eq!(mem.read(0x0000), 0xFF);
        assert_eq!(mem.read(0x0001), 0x55);
    }

    #[test]
    fn port_writes_also_land_in_ram() {
        let mut mem = make_memory();
        mem.write(0x0000, 0x2F);
        mem.write(0x0001, 0x35);
        assert_eq!(mem.ram_read(0x0000), 0x2F);
        assert_eq!(mem.ram_read(0x0001), 0x35);
        // The CPU still sees the port, not the RAM copy.
        mem.write(0x0000, 0x00);
        assert_eq!(mem.read(0x0001), PORT_PULLUPS);
        assert_eq!(mem.ram_read(0x0001), 0x35);
    }

    #[test]
    fn power_on_pattern() {
        let mem = make_memory();
        assert_eq!(mem.ram_read(0x0400), 0x00);
        assert_eq!(mem.ram_read(0x0440), 0xFF);
        assert_eq!(mem.ram_read(0x047F), 0xFF);
        assert_eq!(mem.ram_read(0x0480), 0x00);
    }

    #[test]
    fn vic_sees_char_rom_in_banks_0_and_2() {
        let mut mem = make_memory();
        mem.ram_write(0x5000, 0xAA);
        mem.ram_write(0x0000 + 0x0400, 0x11);
        assert_eq!(mem.vic_read(0, 0x1000), 0xCC);
        assert_eq!(mem.vic_read(2, 0x1FFF), 0xCC);
        assert_eq!(mem.vic_read(1, 0x1000), 0xAA);
        assert_eq!(mem.vic_read(0, 0x0400), 0x11);
    }

    #[test]
    fn colour_ram_keeps_low_nibble() {
        let mut mem = make_memory();
        mem.colour_ram_write(1, 0xFF);
        assert_eq!(mem.colour_ram_read(1), 0x0F);
        assert_eq!(mem.colour_read(1), 0x0F);
    }
}
