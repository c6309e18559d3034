//! MOS 6526 Complex Interface Adapter.
//!
//! The C64 has two:
//! - CIA1 ($DC00): keyboard matrix, joysticks, Timer A/B → IRQ
//! - CIA2 ($DD00): VIC-II bank select, IEC serial bus, Timer A/B → NMI
//!
//! The chip knows nothing about what is wired to its ports. The machine
//! drives the external pins with [`Cia6526::set_port_a_input`] and
//! [`Cia6526::set_port_b_input`] and reads back what the CIA drives with
//! [`Cia6526::port_a_output`] and [`Cia6526::port_b_output`].
//!
//! # Registers
//!
//! | Reg | Read               | Write               |
//! |-----|--------------------|---------------------|
//! | $0  | Port A pins        | Port A output       |
//! | $1  | Port B pins        | Port B output       |
//! | $2  | DDR A              | DDR A               |
//! | $3  | DDR B              | DDR B               |
//! | $4  | Timer A low        | Timer A latch low   |
//! | $5  | Timer A high       | Timer A latch high  |
//! | $6  | Timer B low        | Timer B latch low   |
//! | $7  | Timer B high       | Timer B latch high  |
//! | $8  | TOD tenths         | TOD/alarm tenths    |
//! | $9  | TOD seconds        | TOD/alarm seconds   |
//! | $A  | TOD minutes        | TOD/alarm minutes   |
//! | $B  | TOD hours          | TOD/alarm hours     |
//! | $C  | Serial data        | Serial data         |
//! | $D  | ICR (read clears)  | ICR mask set/clear  |
//! | $E  | Control A          | Control A           |
//! | $F  | Control B          | Control B           |

mod timer;
mod tod;

use emu_core::{Observable, Tickable, Value};
use timer::Timer;
use tod::TimeOfDay;

/// Interrupt source bits in the ICR.
pub mod icr {
    pub const TIMER_A: u8 = 0x01;
    pub const TIMER_B: u8 = 0x02;
    pub const ALARM: u8 = 0x04;
    pub const SERIAL: u8 = 0x08;
    pub const FLAG: u8 = 0x10;
}

/// MOS 6526 CIA.
pub struct Cia6526 {
    pra: u8,
    prb: u8,
    ddra: u8,
    ddrb: u8,
    pins_a: u8,
    pins_b: u8,
    timer_a: Timer,
    timer_b: Timer,
    tod: TimeOfDay,
    sdr: u8,
    icr_data: u8,
    icr_mask: u8,
}

impl Cia6526 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pra: 0,
            prb: 0,
            ddra: 0,
            ddrb: 0,
            pins_a: 0xFF,
            pins_b: 0xFF,
            timer_a: Timer::new(),
            timer_b: Timer::new(),
            tod: TimeOfDay::new(),
            sdr: 0,
            icr_data: 0,
            icr_mask: 0,
        }
    }

    /// Power-on state. External pin levels are kept.
    pub fn reset(&mut self) {
        let (a, b) = (self.pins_a, self.pins_b);
        *self = Self::new();
        self.pins_a = a;
        self.pins_b = b;
    }

    /// True while an enabled interrupt source is pending.
    #[must_use]
    pub fn irq_active(&self) -> bool {
        self.icr_data & self.icr_mask & 0x1F != 0
    }

    /// Drive port A's external pins (1 = high, i.e. released).
    pub fn set_port_a_input(&mut self, pins: u8) {
        self.pins_a = pins;
    }

    /// Drive port B's external pins.
    pub fn set_port_b_input(&mut self, pins: u8) {
        self.pins_b = pins;
    }

    /// Port A as seen from outside: output bits driven, inputs pulled high.
    #[must_use]
    pub fn port_a_output(&self) -> u8 {
        (self.pra & self.ddra) | !self.ddra
    }

    /// Port B as seen from outside.
    #[must_use]
    pub fn port_b_output(&self) -> u8 {
        (self.prb & self.ddrb) | !self.ddrb
    }

    /// Falling edge on the FLAG pin (cassette read, serial SRQ).
    pub fn trigger_flag(&mut self) {
        self.icr_data |= icr::FLAG;
    }

    /// One pulse of the mains-frequency TOD input.
    pub fn tod_pulse(&mut self) {
        let fifty_hz = self.timer_a.control & 0x80 != 0;
        if self.tod.pulse(fifty_hz) {
            self.icr_data |= icr::ALARM;
        }
    }

    /// Read a register. Reading the ICR acknowledges all pending sources.
    pub fn read(&mut self, reg: u8) -> u8 {
        match reg & 0x0F {
            0x08..=0x0B => self.tod.read(usize::from(reg & 0x03)),
            0x0D => {
                let value = self.peek(0x0D);
                self.icr_data = 0;
                value
            }
            r => self.peek(r),
        }
    }

    /// Read without side effects, for the monitor.
    #[must_use]
    pub fn peek(&self, reg: u8) -> u8 {
        match reg & 0x0F {
            0x00 => self.port_a_output() & self.pins_a,
            0x01 => self.port_b_output() & self.pins_b,
            0x02 => self.ddra,
            0x03 => self.ddrb,
            0x04 => self.timer_a.counter as u8,
            0x05 => (self.timer_a.counter >> 8) as u8,
            0x06 => self.timer_b.counter as u8,
            0x07 => (self.timer_b.counter >> 8) as u8,
            0x08..=0x0B => {
                let mut tod = self.tod;
                tod.read(usize::from(reg & 0x03))
            }
            0x0C => self.sdr,
            0x0D => {
                let any = if self.irq_active() { 0x80 } else { 0 };
                self.icr_data | any
            }
            0x0E => self.timer_a.control,
            _ => self.timer_b.control,
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        match reg & 0x0F {
            0x00 => self.pra = value,
            0x01 => self.prb = value,
            0x02 => self.ddra = value,
            0x03 => self.ddrb = value,
            0x04 => self.timer_a.write_latch_lo(value),
            0x05 => self.timer_a.write_latch_hi(value),
            0x06 => self.timer_b.write_latch_lo(value),
            0x07 => self.timer_b.write_latch_hi(value),
            0x08..=0x0B => {
                let set_alarm = self.timer_b.control & 0x80 != 0;
                self.tod.write(usize::from(reg & 0x03), value, set_alarm);
            }
            0x0C => {
                self.sdr = value;
                if self.timer_a.control & 0x40 != 0 {
                    self.icr_data |= icr::SERIAL;
                }
            }
            0x0D => {
                if value & 0x80 != 0 {
                    self.icr_mask |= value & 0x1F;
                } else {
                    self.icr_mask &= !(value & 0x1F);
                }
            }
            0x0E => self.timer_a.write_control(value),
            _ => self.timer_b.write_control(value),
        }
    }
}

impl Default for Cia6526 {
    fn default() -> Self {
        Self::new()
    }
}

impl Tickable for Cia6526 {
    fn tick(&mut self) {
        let a_underflow = self.timer_a.tick(true);
        if a_underflow {
            self.icr_data |= icr::TIMER_A;
        }
        // CRB bits 6-5: 00 counts phi2, 1x counts Timer A underflows.
        let b_pulse = match (self.timer_b.control >> 5) & 0x03 {
            0b00 => true,
            0b01 => false,
            _ => a_underflow,
        };
        if self.timer_b.tick(b_pulse) {
            self.icr_data |= icr::TIMER_B;
        }
    }
}

const QUERY_PATHS: &[&str] = &[
    "pra", "prb", "ddra", "ddrb", "timer_a", "timer_a.latch", "timer_b", "timer_b.latch", "cra",
    "crb", "icr", "icr_mask", "irq", "tod",
];

impl Observable for Cia6526 {
    fn query(&self, path: &str) -> Option<Value> {
        Some(match path {
            "pra" => self.pra.into(),
            "prb" => self.prb.into(),
            "ddra" => self.ddra.into(),
            "ddrb" => self.ddrb.into(),
            "timer_a" => self.timer_a.counter.into(),
            "timer_a.latch" => self.timer_a.latch.into(),
            "timer_b" => self.timer_b.counter.into(),
            "timer_b.latch" => self.timer_b.latch.into(),
            "cra" => self.timer_a.control.into(),
            "crb" => self.timer_b.control.into(),
            "icr" => self.icr_data.into(),
            "icr_mask" => self.icr_mask.into(),
            "irq" => self.irq_active().into(),
            "tod" => {
                let mut tod = self.tod;
                let [t, s, m, h] = [0, 1, 2, 3].map(|i| tod.read(i));
                Value::String(format!(
                    "{:02X}:{m:02X}:{s:02X}.{t} {}",
                    h & 0x1F,
                    if h & 0x80 != 0 { "PM" } else { "AM" }
                ))
            }
            _ => return None,
        })
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}
