//! The C64's fixed set of peripherals, advanced together one cycle at a time.

use emu_core::{Observable, Tickable, Value};
use mos_cia_6526::Cia6526;
use mos_sid_6581::{Sid, SidModel};
use mos_vic_ii::{Vic, VideoStandard};

use crate::memory::Memory;

pub struct Chipset {
    pub vic: Vic,
    pub sid: Sid,
    /// Keyboard, joysticks, system IRQ.
    pub cia1: Cia6526,
    /// VIC bank, IEC bus, NMI.
    pub cia2: Cia6526,
    /// Cycles between mains-frequency TOD pulses.
    tod_period: u32,
    tod_counter: u32,
    cycles: u64,
}

impl Chipset {
    #[must_use]
    pub fn new(standard: VideoStandard, sid_model: SidModel, sample_rate: u32) -> Self {
        let mut chipset = Self {
            vic: Vic::new(standard),
            sid: Sid::new(sid_model, standard.clock_hz(), sample_rate),
            cia1: Cia6526::new(),
            cia2: Cia6526::new(),
            tod_period: tod_period(standard),
            tod_counter: 0,
            cycles: 0,
        };
        chipset.reset();
        chipset
    }

    /// Reset every chip and restore the KERNAL's port setup on both CIAs.
    pub fn reset(&mut self) {
        self.vic.reset();
        self.sid.reset();
        self.cia1.reset();
        self.cia2.reset();
        // CIA2 PA0-1 output high selects VIC bank 0; PA3-5 drive the IEC lines.
        self.cia2.write(0x02, 0x3F);
        self.cia2.write(0x00, 0x03);
        self.tod_counter = 0;
    }

    /// Advance VIC-II, SID and both CIAs by one machine cycle.
    pub fn tick(&mut self, memory: &Memory) {
        self.vic.tick(memory);
        self.sid.tick();
        self.cia1.tick();
        self.cia2.tick();
        self.tod_counter += 1;
        if self.tod_counter >= self.tod_period {
            self.tod_counter = 0;
            self.cia1.tod_pulse();
            self.cia2.tod_pulse();
        }
        self.cycles += 1;
    }

    /// Level of the CPU's IRQ input: VIC-II and CIA1 are wired-OR.
    #[must_use]
    pub fn irq(&self) -> bool {
        self.vic.irq_active() || self.cia1.irq_active()
    }

    /// Level of the NMI input (CIA2).
    #[must_use]
    pub fn nmi(&self) -> bool {
        self.cia2.irq_active()
    }

    /// Follow CIA2 PA0-1 (inverted) into the VIC-II bank.
    pub fn update_vic_bank(&mut self) {
        let bank = !self.cia2.port_a_output() & 0x03;
        self.vic.set_bank(bank);
    }

    /// Cycles ticked since creation.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

fn tod_period(standard: VideoStandard) -> u32 {
    (standard.clock_hz() / u64::from(standard.mains_hz())) as u32
}

impl Observable for Chipset {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("vic.") {
            return self.vic.query(rest);
        }
        if let Some(rest) = path.strip_prefix("sid.") {
            return self.sid.query(rest);
        }
        if let Some(rest) = path.strip_prefix("cia1.") {
            return self.cia1.query(rest);
        }
        if let Some(rest) = path.strip_prefix("cia2.") {
            return self.cia2.query(rest);
        }
        match path {
            "cycles" => Some(self.cycles.into()),
            "vic_bank" => Some(self.vic.bank().into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["vic.<path>", "sid.<path>", "cia1.<path>", "cia2.<path>", "cycles", "vic_bank"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::tests::test_roms;

    #[test]
    fn tick_advances_raster() {
        let memory = Memory::new(&test_roms());
        let mut chipset = Chipset::new(VideoStandard::Pal, SidModel::Mos6581, 44_100);
        let frame = VideoStandard::Pal.cycles_per_frame();
        for _ in 0..frame {
            chipset.tick(&memory);
        }
        assert_eq!(chipset.cycles(), u64::from(frame));
        assert!(chipset.vic.take_frame_complete());
        assert_eq!(chipset.vic.raster_line(), 0);
    }

    #[test]
    fn vic_bank_follows_cia2() {
        let mut chipset = Chipset::new(VideoStandard::Pal, SidModel::Mos6581, 44_100);
        chipset.update_vic_bank();
        assert_eq!(chipset.vic.bank(), 0);
        chipset.cia2.write(0x00, 0x01);
        chipset.update_vic_bank();
        assert_eq!(chipset.vic.bank(), 2);
    }

    #[test]
    fn cia1_timer_raises_irq() {
        let memory = Memory::new(&test_roms());
        let mut chipset = Chipset::new(VideoStandard::Pal, SidModel::Mos6581, 44_100);
        chipset.cia1.write(0x04, 0x10);
        chipset.cia1.write(0x05, 0x00);
        chipset.cia1.write(0x0D, 0x81);
        chipset.cia1.write(0x0E, 0x11);
        for _ in 0..40 {
            chipset.tick(&memory);
        }
        assert!(chipset.irq());
        assert!(!chipset.nmi());
    }

    #[test]
    fn tod_pulses_at_mains_rate() {
        assert_eq!(tod_period(VideoStandard::Pal), 985_248 / 50);
        assert_eq!(tod_period(VideoStandard::Ntsc), 1_022_727 / 60);
    }
}
