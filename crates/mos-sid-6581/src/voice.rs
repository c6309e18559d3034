//! SID voice: oscillator and waveform generation.
//!
//! A 24-bit phase accumulator is advanced by the 16-bit frequency register
//! every cycle. The upper 12 bits feed four waveform generators; selecting
//! several at once ANDs their outputs together.

/// Control register bits ($D404/$D40B/$D412).
pub mod control {
    pub const GATE: u8 = 0x01;
    pub const SYNC: u8 = 0x02;
    pub const RING: u8 = 0x04;
    pub const TEST: u8 = 0x08;
    pub const TRIANGLE: u8 = 0x10;
    pub const SAWTOOTH: u8 = 0x20;
    pub const PULSE: u8 = 0x40;
    pub const NOISE: u8 = 0x80;
}

const ACCUMULATOR_MASK: u32 = 0x00FF_FFFF;
const MSB: u32 = 0x0080_0000;
const NOISE_CLOCK_BIT: u32 = 0x0008_0000;
const NOISE_SEED: u32 = 0x7F_FFF8;

#[derive(Debug, Clone)]
pub struct Voice {
    pub accumulator: u32,
    pub frequency: u16,
    /// 12-bit pulse width.
    pub pulse_width: u16,
    pub control: u8,
    shift: u32,
    /// Accumulator MSB before the last clock, for sync edge detection.
    previous_msb: bool,
}

impl Voice {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accumulator: 0,
            frequency: 0,
            pulse_width: 0,
            control: 0,
            shift: NOISE_SEED,
            previous_msb: false,
        }
    }

    /// Advance the accumulator one cycle and clock the noise register on a
    /// rising edge of accumulator bit 19. The test bit holds both in reset.
    pub fn clock(&mut self) {
        self.previous_msb = self.msb();
        if self.control & control::TEST != 0 {
            self.accumulator = 0;
            self.shift = NOISE_SEED;
            return;
        }
        let before = self.accumulator;
        self.accumulator = before.wrapping_add(u32::from(self.frequency)) & ACCUMULATOR_MASK;
        if before & NOISE_CLOCK_BIT == 0 && self.accumulator & NOISE_CLOCK_BIT != 0 {
            let feedback = ((self.shift >> 22) ^ (self.shift >> 17)) & 1;
            self.shift = ((self.shift << 1) | feedback) & 0x7F_FFFF;
        }
    }

    /// Rising edge of the MSB during the last clock; drives hard sync.
    #[must_use]
    pub fn msb_rose(&self) -> bool {
        !self.previous_msb && self.msb()
    }

    /// Hard sync: restart the accumulator.
    pub fn sync(&mut self) {
        self.accumulator = 0;
    }

    #[must_use]
    pub fn msb(&self) -> bool {
        self.accumulator & MSB != 0
    }

    #[must_use]
    pub fn gate(&self) -> bool {
        self.control & control::GATE != 0
    }

    /// 12-bit waveform output. `ring_msb` is the MSB of the modulating voice.
    #[must_use]
    pub fn output(&self, ring_msb: bool) -> u16 {
        let mut out = 0x0FFF;
        let mut selected = false;
        let mut select = |bits: u16| {
            out &= bits;
            selected = true;
        };
        if self.control & control::TRIANGLE != 0 {
            select(self.triangle(ring_msb));
        }
        if self.control & control::SAWTOOTH != 0 {
            select(self.sawtooth());
        }
        if self.control & control::PULSE != 0 {
            select(self.pulse());
        }
        if self.control & control::NOISE != 0 {
            select(self.noise());
        }
        if selected { out } else { 0 }
    }

    fn triangle(&self, ring_msb: bool) -> u16 {
        let ring = self.control & control::RING != 0 && ring_msb;
        let fold = self.msb() ^ ring;
        let ramp = (self.accumulator >> 11) & 0x0FFF;
        (if fold { ramp ^ 0x0FFF } else { ramp }) as u16
    }

    fn sawtooth(&self) -> u16 {
        (self.accumulator >> 12) as u16
    }

    fn pulse(&self) -> u16 {
        if self.sawtooth() >= self.pulse_width & 0x0FFF { 0x0FFF } else { 0 }
    }

    /// Eight shift-register taps form the top eight output bits.
    fn noise(&self) -> u16 {
        const TAPS: [u32; 8] = [20, 18, 14, 11, 9, 5, 2, 0];
        TAPS.iter().enumerate().fold(0u16, |acc, (i, &tap)| {
            acc | ((((self.shift >> tap) & 1) as u16) << (11 - i))
        })
    }
}

impl Default for Voice {
    fn default() -> Self {
        Self::new()
    }
}
