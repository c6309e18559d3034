//! Memory and I/O bus interface.

/// Memory and I/O bus interface.
///
/// Components access memory and peripherals through this trait. The bus
/// handles address decoding and routing to the appropriate device. Every
/// `u16` address is valid: the implementation decides whether it is backed
/// by RAM, ROM or a register block.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, address: u16, value: u8);

    /// Read without side effects, for debuggers and disassemblers.
    ///
    /// Defaults to `read`, which is correct for plain RAM buses.
    fn peek(&mut self, address: u16) -> u8 {
        self.read(address)
    }
}

/// Flat 64 KiB RAM bus.
///
/// Used by CPU tests and anywhere a bare address space is enough.
pub struct SimpleBus {
    ram: Box<[u8; 0x1_0000]>,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: Box::new([0; 0x1_0000]),
        }
    }

    /// Copy `data` into RAM starting at `address`, wrapping at $FFFF.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            let addr = address.wrapping_add(i as u16);
            self.ram[usize::from(addr)] = byte;
        }
    }

    /// Direct view of the address space.
    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.ram[..]
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u16) -> u8 {
        self.ram[usize::from(address)]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.ram[usize::from(address)] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_wraps_at_top_of_memory() {
        let mut bus = SimpleBus::new();
        bus.load(0xFFFF, &[0x11, 0x22]);
        assert_eq!(bus.read(0xFFFF), 0x11);
        assert_eq!(bus.read(0x0000), 0x22);
    }

    #[test]
    fn peek_defaults_to_read() {
        let mut bus = SimpleBus::new();
        bus.write(0x1234, 0x56);
        assert_eq!(bus.peek(0x1234), 0x56);
    }
}
