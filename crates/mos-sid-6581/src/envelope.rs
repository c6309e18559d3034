//! ADSR envelope generator.
//!
//! A 15-bit rate counter divides the clock by the period selected from
//! [`RATE_PERIODS`]. Attack steps the 8-bit level up linearly. Decay and
//! release step it down through a second divider whose period grows as the
//! level falls, giving the SID its piecewise-exponential curve.

/// Cycles per envelope step for each 4-bit rate setting.
pub const RATE_PERIODS: [u16; 16] = [
    9, 32, 63, 95, 149, 220, 267, 313, 392, 977, 1954, 3126, 3907, 11_720, 19_532, 31_251,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub level: u8,
    pub phase: Phase,
    /// Attack/decay register ($D405 etc.).
    pub attack_decay: u8,
    /// Sustain/release register ($D406 etc.).
    pub sustain_release: u8,
    rate_counter: u16,
    exp_counter: u8,
    gate: bool,
}

impl Envelope {
    #[must_use]
    pub fn new() -> Self {
        Self {
            level: 0,
            phase: Phase::Release,
            attack_decay: 0,
            sustain_release: 0,
            rate_counter: 0,
            exp_counter: 0,
            gate: false,
        }
    }

    /// Sustain level: the nibble repeated in both halves.
    fn sustain_level(&self) -> u8 {
        (self.sustain_release >> 4) * 0x11
    }

    fn period(&self) -> u16 {
        let rate = match self.phase {
            Phase::Attack => self.attack_decay >> 4,
            Phase::Decay => self.attack_decay & 0x0F,
            Phase::Sustain => return 0,
            Phase::Release => self.sustain_release & 0x0F,
        };
        RATE_PERIODS[usize::from(rate)]
    }

    fn exp_period(&self) -> u8 {
        match self.level {
            0x5E..=0xFF => 1,
            0x37..=0x5D => 2,
            0x1B..=0x36 => 4,
            0x0F..=0x1A => 8,
            0x07..=0x0E => 16,
            _ => 30,
        }
    }

    /// Clock once per cycle with the voice's current gate bit.
    pub fn clock(&mut self, gate: bool) {
        if gate != self.gate {
            self.gate = gate;
            self.phase = if gate { Phase::Attack } else { Phase::Release };
            self.rate_counter = 0;
            self.exp_counter = 0;
        }

        if self.phase == Phase::Sustain {
            return;
        }
        self.rate_counter += 1;
        if self.rate_counter < self.period() {
            return;
        }
        self.rate_counter = 0;

        match self.phase {
            Phase::Attack => {
                self.level = self.level.saturating_add(1);
                if self.level == 0xFF {
                    self.phase = Phase::Decay;
                }
            }
            Phase::Decay | Phase::Release => {
                self.exp_counter += 1;
                if self.exp_counter < self.exp_period() {
                    return;
                }
                self.exp_counter = 0;
                let floor = if self.phase == Phase::Decay { self.sustain_level() } else { 0 };
                if self.level > floor {
                    self.level -= 1;
                }
                if self.phase == Phase::Decay && self.level <= floor {
                    self.phase = Phase::Sustain;
                }
            }
            Phase::Sustain => {}
        }
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(env: &mut Envelope, gate: bool, cycles: u32) {
        for _ in 0..cycles {
            env.clock(gate);
        }
    }

    #[test]
    fn fastest_attack_takes_255_steps() {
        let mut env = Envelope::new();
        env.sustain_release = 0xF0;
        run(&mut env, true, 9 * 255 - 1);
        assert_eq!(env.level, 0xFE);
        run(&mut env, true, 1);
        assert_eq!(env.level, 0xFF);
        assert_eq!(env.phase, Phase::Decay);
    }

    #[test]
    fn decay_stops_at_sustain() {
        let mut env = Envelope::new();
        env.sustain_release = 0x80;
        run(&mut env, true, 200_000);
        assert_eq!(env.phase, Phase::Sustain);
        assert_eq!(env.level, 0x88);
    }

    #[test]
    fn release_reaches_zero() {
        let mut env = Envelope::new();
        env.sustain_release = 0xF0;
        run(&mut env, true, 3000);
        run(&mut env, false, 50_000);
        assert_eq!(env.phase, Phase::Release);
        assert_eq!(env.level, 0);
    }

    #[test]
    fn gate_during_release_restarts_attack() {
        let mut env = Envelope::new();
        env.sustain_release = 0xF9;
        run(&mut env, true, 3000);
        run(&mut env, false, 100);
        env.clock(true);
        assert_eq!(env.phase, Phase::Attack);
    }
}
