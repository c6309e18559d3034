//! IEC serial bus between CIA2 and the 1541's VIA1.
//!
//! ATN, CLK and DATA are open-collector lines with pull-ups: a line reads
//! high only while nobody pulls it low. CIA2 drives PA3-5 (1 = pull low)
//! and reads CLK and DATA back on PA6-7 (0 = line low).
//!
//! The bus also watches the handshake. When the C64 pulls ATN and no
//! device answers by pulling DATA within the KERNAL's own timeout window,
//! the bus records that the addressed device is not responding.

/// Cycles the KERNAL waits for a listener to pull DATA after ATN.
pub const HANDSHAKE_TIMEOUT: u32 = 1000;

/// The one device number on this bus.
pub const DRIVE_DEVICE: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Computer = 0,
    Drive = 1,
}

#[derive(Debug, Clone, Default)]
struct Line {
    pulls: [bool; 2],
}

impl Line {
    fn set(&mut self, side: Side, pull_low: bool) {
        self.pulls[side as usize] = pull_low;
    }

    fn high(&self) -> bool {
        !self.pulls.iter().any(|&p| p)
    }

    fn pulled_by(&self, side: Side) -> bool {
        self.pulls[side as usize]
    }
}

#[derive(Debug, Clone, Default)]
pub struct IecBus {
    atn: Line,
    clk: Line,
    data: Line,
    /// Cycles ATN has been held with DATA unanswered.
    waiting: u32,
    /// Set once per ATN assertion, so a hung bus reports only once.
    reported: bool,
    timeout: Option<u8>,
}

impl IecBus {
    /// All lines released.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply CIA2 port A output: PA3 ATN, PA4 CLK, PA5 DATA, 1 = pull low.
    pub fn set_c64_outputs(&mut self, port_a: u8) {
        self.atn.set(Side::Computer, port_a & 0x08 != 0);
        self.clk.set(Side::Computer, port_a & 0x10 != 0);
        self.data.set(Side::Computer, port_a & 0x20 != 0);
    }

    /// CIA2 port A input pins: PA6 CLK, PA7 DATA (0 = low), the rest high.
    #[must_use]
    pub fn c64_inputs(&self) -> u8 {
        let mut pins = 0x3F;
        if self.clk() {
            pins |= 0x40;
        }
        if self.data() {
            pins |= 0x80;
        }
        pins
    }

    pub fn set_drive_clk(&mut self, pull_low: bool) {
        self.clk.set(Side::Drive, pull_low);
    }

    pub fn set_drive_data(&mut self, pull_low: bool) {
        self.data.set(Side::Drive, pull_low);
    }

    /// Drop everything the drive pulls, e.g. when it is powered off.
    pub fn release_drive(&mut self) {
        self.clk.set(Side::Drive, false);
        self.data.set(Side::Drive, false);
    }

    /// ATN line level (true = high, released).
    #[must_use]
    pub fn atn(&self) -> bool {
        self.atn.high()
    }

    #[must_use]
    pub fn clk(&self) -> bool {
        self.clk.high()
    }

    #[must_use]
    pub fn data(&self) -> bool {
        self.data.high()
    }

    /// Advance the handshake watchdog by `cycles`.
    pub fn tick(&mut self, cycles: u32) {
        if !self.atn.pulled_by(Side::Computer) {
            self.waiting = 0;
            self.reported = false;
            return;
        }
        if self.data.pulled_by(Side::Drive) {
            self.waiting = 0;
            return;
        }
        self.waiting = self.waiting.saturating_add(cycles);
        if self.waiting >= HANDSHAKE_TIMEOUT && !self.reported {
            self.reported = true;
            self.timeout = Some(DRIVE_DEVICE);
            log::debug!("IEC: no answer to ATN after {} cycles", self.waiting);
        }
    }

    /// Device whose handshake timed out since the last call.
    pub fn take_timeout(&mut self) -> Option<u8> {
        self.timeout.take()
    }
}
