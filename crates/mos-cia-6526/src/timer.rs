//! The CIA's two 16-bit interval timers.

/// Control register bits shared by CRA and CRB.
pub(crate) const START: u8 = 0x01;
pub(crate) const ONE_SHOT: u8 = 0x08;
pub(crate) const FORCE_LOAD: u8 = 0x10;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Timer {
    pub(crate) counter: u16,
    pub(crate) latch: u16,
    /// Control register with the strobe bit stripped.
    pub(crate) control: u8,
    force_load: bool,
}

impl Timer {
    pub(crate) const fn new() -> Self {
        Self {
            counter: 0xFFFF,
            latch: 0xFFFF,
            control: 0,
            force_load: false,
        }
    }

    pub(crate) fn running(&self) -> bool {
        self.control & START != 0
    }

    pub(crate) fn write_latch_lo(&mut self, value: u8) {
        self.latch = (self.latch & 0xFF00) | u16::from(value);
    }

    /// A stopped timer also takes the new latch into its counter.
    pub(crate) fn write_latch_hi(&mut self, value: u8) {
        self.latch = (self.latch & 0x00FF) | (u16::from(value) << 8);
        if !self.running() {
            self.counter = self.latch;
        }
    }

    pub(crate) fn write_control(&mut self, value: u8) {
        self.control = value & !FORCE_LOAD;
        if value & FORCE_LOAD != 0 {
            self.force_load = true;
        }
    }

    /// Advance by one input pulse. Returns true on underflow.
    ///
    /// The counter reaches zero and underflows on the following pulse, so a
    /// latch of N signals after N+1 pulses.
    pub(crate) fn tick(&mut self, pulse: bool) -> bool {
        if self.force_load {
            self.counter = self.latch;
            self.force_load = false;
        }
        if !self.running() || !pulse {
            return false;
        }
        if self.counter == 0 {
            self.counter = self.latch;
            if self.control & ONE_SHOT != 0 {
                self.control &= !START;
            }
            true
        } else {
            self.counter -= 1;
            false
        }
    }
}
