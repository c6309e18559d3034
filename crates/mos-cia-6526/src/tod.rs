//! Time-of-day clock: BCD tenths, seconds, minutes and 12-hour hours.

const PM: u8 = 0x80;

fn bcd_increment(value: u8) -> u8 {
    if value & 0x0F == 9 {
        (value & 0xF0) + 0x10
    } else {
        value + 1
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TimeOfDay {
    /// Tenths, seconds, minutes, hours.
    clock: [u8; 4],
    alarm: [u8; 4],
    /// Snapshot taken when hours are read, released by reading tenths.
    latch: Option<[u8; 4]>,
    /// Writing hours halts the clock until tenths are written.
    halted: bool,
    prescaler: u8,
}

impl TimeOfDay {
    pub(crate) const fn new() -> Self {
        Self {
            clock: [0, 0, 0, 0x01],
            alarm: [0; 4],
            latch: None,
            halted: true,
            prescaler: 0,
        }
    }

    pub(crate) fn read(&mut self, index: usize) -> u8 {
        match index {
            3 => {
                let snapshot = *self.latch.get_or_insert(self.clock);
                snapshot[3]
            }
            0 => {
                let value = self.latch.map_or(self.clock[0], |l| l[0]);
                self.latch = None;
                value
            }
            _ => self.latch.map_or(self.clock[index], |l| l[index]),
        }
    }

    pub(crate) fn write(&mut self, index: usize, value: u8, set_alarm: bool) {
        let masked = match index {
            0 => value & 0x0F,
            1 | 2 => value & 0x7F,
            _ => value & 0x9F,
        };
        if set_alarm {
            self.alarm[index] = masked;
            return;
        }
        self.clock[index] = masked;
        match index {
            3 => self.halted = true,
            0 => {
                self.halted = false;
                self.prescaler = 0;
            }
            _ => {}
        }
    }

    /// Feed one mains-frequency pulse. Returns true when the alarm matches.
    pub(crate) fn pulse(&mut self, fifty_hz: bool) -> bool {
        if self.halted {
            return false;
        }
        self.prescaler += 1;
        let divider = if fifty_hz { 5 } else { 6 };
        if self.prescaler < divider {
            return false;
        }
        self.prescaler = 0;
        self.advance_tenth();
        self.clock == self.alarm
    }

    fn advance_tenth(&mut self) {
        let [tenths, seconds, minutes, hours] = &mut self.clock;
        if *tenths < 9 {
            *tenths += 1;
            return;
        }
        *tenths = 0;
        if *seconds != 0x59 {
            *seconds = bcd_increment(*seconds);
            return;
        }
        *seconds = 0;
        if *minutes != 0x59 {
            *minutes = bcd_increment(*minutes);
            return;
        }
        *minutes = 0;
        let pm = *hours & PM;
        *hours = match *hours & 0x1F {
            0x11 => 0x12 | (pm ^ PM),
            0x12 => 0x01 | pm,
            h => bcd_increment(h) | pm,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(clock: [u8; 4]) -> TimeOfDay {
        let mut tod = TimeOfDay::new();
        tod.write(3, clock[3], false);
        tod.write(2, clock[2], false);
        tod.write(1, clock[1], false);
        tod.write(0, clock[0], false);
        tod
    }

    #[test]
    fn halted_until_tenths_written() {
        let mut tod = TimeOfDay::new();
        for _ in 0..50 {
            tod.pulse(true);
        }
        assert_eq!(tod.read(0), 0);
        tod.write(0, 0, false);
        for _ in 0..5 {
            tod.pulse(true);
        }
        assert_eq!(tod.read(0), 1);
    }

    #[test]
    fn sixty_hz_needs_six_pulses() {
        let mut tod = running([0, 0, 0, 1]);
        for _ in 0..5 {
            tod.pulse(false);
        }
        assert_eq!(tod.read(0), 0);
        tod.pulse(false);
        assert_eq!(tod.read(0), 1);
    }

    #[test]
    fn bcd_rollover_into_pm() {
        let mut tod = running([9, 0x59, 0x59, 0x11]);
        for _ in 0..5 {
            tod.pulse(true);
        }
        assert_eq!(tod.read(3), 0x92);
        assert_eq!(tod.read(2), 0x00);
        assert_eq!(tod.read(1), 0x00);
        assert_eq!(tod.read(0), 0);
    }

    #[test]
    fn twelve_wraps_to_one() {
        let mut tod = running([9, 0x59, 0x59, 0x92]);
        for _ in 0..5 {
            tod.pulse(true);
        }
        assert_eq!(tod.read(3), 0x81);
    }

    #[test]
    fn reading_hours_latches_until_tenths() {
        let mut tod = running([0, 0x10, 0, 1]);
        assert_eq!(tod.read(3), 1);
        for _ in 0..10 {
            tod.pulse(true);
        }
        assert_eq!(tod.read(1), 0x10);
        assert_eq!(tod.read(0), 0);
        assert_eq!(tod.read(0), 2);
    }

    #[test]
    fn alarm_matches() {
        let mut tod = running([0, 0, 0, 1]);
        tod.write(0, 1, true);
        tod.write(3, 1, true);
        let fired: Vec<bool> = (0..5).map(|_| tod.pulse(true)).collect();
        assert_eq!(fired, [false, false, false, false, true]);
    }
}
