//! MOS 6522 Versatile Interface Adapter (VIA).
//!
//! The 1541 carries two of these. VIA1 at $1800 talks to the IEC serial
//! bus; VIA2 at $1C00 runs the stepper, spindle motor, LED and the GCR
//! read/write head.
//!
//! # Registers ($0-$F)
//!
//! | Reg | Name | Description                              |
//! |-----|------|------------------------------------------|
//! | $0  | ORB  | Port B data (clears CB1/CB2 flags)       |
//! | $1  | ORA  | Port A data (clears CA1/CA2 flags)       |
//! | $2  | DDRB | Port B data direction (1 = output)       |
//! | $3  | DDRA | Port A data direction (1 = output)       |
//! | $4  | T1CL | T1 counter low (read clears T1 flag)     |
//! | $5  | T1CH | T1 counter high (write starts T1)        |
//! | $6  | T1LL | T1 latch low                             |
//! | $7  | T1LH | T1 latch high (write clears T1 flag)     |
//! | $8  | T2CL | T2 counter low (read clears T2 flag)     |
//! | $9  | T2CH | T2 counter high (write starts T2)        |
//! | $A  | SR   | Shift register                           |
//! | $B  | ACR  | Auxiliary control                        |
//! | $C  | PCR  | Peripheral control                       |
//! | $D  | IFR  | Interrupt flags                          |
//! | $E  | IER  | Interrupt enable                         |
//! | $F  | ORA  | Port A data, no handshake                |

use emu_core::{Observable, Tickable, Value};

/// Register offsets.
pub mod reg {
    pub const ORB: u8 = 0x0;
    pub const ORA: u8 = 0x1;
    pub const DDRB: u8 = 0x2;
    pub const DDRA: u8 = 0x3;
    pub const T1CL: u8 = 0x4;
    pub const T1CH: u8 = 0x5;
    pub const T1LL: u8 = 0x6;
    pub const T1LH: u8 = 0x7;
    pub const T2CL: u8 = 0x8;
    pub const T2CH: u8 = 0x9;
    pub const SR: u8 = 0xA;
    pub const ACR: u8 = 0xB;
    pub const PCR: u8 = 0xC;
    pub const IFR: u8 = 0xD;
    pub const IER: u8 = 0xE;
    pub const ORA_NH: u8 = 0xF;
}

/// Interrupt flag bits, shared by IFR and IER.
pub mod irq {
    pub const CA2: u8 = 0x01;
    pub const CA1: u8 = 0x02;
    pub const SR: u8 = 0x04;
    pub const CB2: u8 = 0x08;
    pub const CB1: u8 = 0x10;
    pub const T2: u8 = 0x20;
    pub const T1: u8 = 0x40;
}

/// One 8-bit port: output register, direction, external pins, input latch.
#[derive(Debug, Clone, Copy)]
struct Port {
    output: u8,
    ddr: u8,
    pins: u8,
    latched: u8,
}

impl Port {
    const fn new() -> Self {
        Self {
            output: 0,
            ddr: 0,
            pins: 0xFF,
            latched: 0xFF,
        }
    }

    fn driven(self) -> u8 {
        self.output & self.ddr
    }

    fn read(self, use_latch: bool) -> u8 {
        let inputs = if use_latch { self.latched } else { self.pins };
        self.driven() | (inputs & !self.ddr)
    }
}

/// A 16-bit down-counter with latch.
#[derive(Debug, Clone, Copy)]
struct Timer {
    counter: u16,
    latch: u16,
    /// Cleared after a one-shot underflow so the flag fires only once.
    armed: bool,
}

impl Timer {
    const fn new() -> Self {
        Self {
            counter: 0xFFFF,
            latch: 0xFFFF,
            armed: false,
        }
    }

    /// Decrement; true when the counter wrapped past zero.
    fn count(&mut self) -> bool {
        let (next, wrapped) = self.counter.overflowing_sub(1);
        self.counter = next;
        wrapped
    }
}

/// Edge-detected control input (CA1 or CB1).
#[derive(Debug, Clone, Copy)]
struct ControlLine {
    level: bool,
}

impl ControlLine {
    /// Store the new level, reporting whether the configured edge occurred.
    fn set(&mut self, level: bool, positive_edge: bool) -> bool {
        let fired = if positive_edge {
            !self.level && level
        } else {
            self.level && !level
        };
        self.level = level;
        fired
    }
}

/// MOS 6522 Versatile Interface Adapter.
pub struct Via6522 {
    port_a: Port,
    port_b: Port,
    t1: Timer,
    t2: Timer,
    sr: u8,
    sr_bits: u8,
    acr: u8,
    pcr: u8,
    ifr: u8,
    ier: u8,
    ca1: ControlLine,
    cb1: ControlLine,
    pb7: bool,
    /// Pulse-mode CA2 output, low for one cycle after a port A access.
    ca2_pulse: bool,
}

impl Via6522 {
    /// Create a VIA in its power-on state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            port_a: Port::new(),
            port_b: Port::new(),
            t1: Timer::new(),
            t2: Timer::new(),
            sr: 0,
            sr_bits: 0,
            acr: 0,
            pcr: 0,
            ifr: 0,
            ier: 0,
            ca1: ControlLine { level: true },
            cb1: ControlLine { level: true },
            pb7: false,
            ca2_pulse: false,
        }
    }

    /// Return to power-on state. External pin levels are kept.
    pub fn reset(&mut self) {
        let (pins_a, pins_b) = (self.port_a.pins, self.port_b.pins);
        *self = Self::new();
        self.port_a.pins = pins_a;
        self.port_b.pins = pins_b;
    }

    /// True while an enabled interrupt is pending.
    #[must_use]
    pub fn irq_active(&self) -> bool {
        self.ifr & self.ier & 0x7F != 0
    }

    /// Drive the external port A pins.
    pub fn set_port_a_input(&mut self, pins: u8) {
        self.port_a.pins = pins;
    }

    /// Drive the external port B pins.
    pub fn set_port_b_input(&mut self, pins: u8) {
        self.port_b.pins = pins;
    }

    /// Levels the VIA drives onto port A (inputs read as high).
    #[must_use]
    pub fn port_a_output(&self) -> u8 {
        self.port_a.driven() | !self.port_a.ddr
    }

    /// Levels the VIA drives onto port B (inputs read as high).
    ///
    /// PB7 follows the T1 toggle when ACR bit 7 is set.
    #[must_use]
    pub fn port_b_output(&self) -> u8 {
        let out = self.port_b.driven() | !self.port_b.ddr;
        self.with_pb7(out)
    }

    /// Level of the CA2 pin when configured as an output.
    ///
    /// Manual modes drive it directly; handshake and pulse modes idle high.
    #[must_use]
    pub fn ca2_output(&self) -> bool {
        match (self.pcr >> 1) & 0x07 {
            0b110 => false,
            0b101 => !self.ca2_pulse,
            _ => true,
        }
    }

    /// Level of the CB2 pin when configured as an output.
    #[must_use]
    pub fn cb2_output(&self) -> bool {
        (self.pcr >> 5) & 0x07 != 0b110
    }

    /// Set the CA1 input. Latches port A when ACR bit 0 is set.
    pub fn set_ca1(&mut self, level: bool) {
        if self.ca1.set(level, self.pcr & 0x01 != 0) {
            self.ifr |= irq::CA1;
            if self.acr & 0x01 != 0 {
                self.port_a.latched = self.port_a.pins;
            }
        }
    }

    /// Set the CB1 input. Latches port B when ACR bit 1 is set.
    pub fn set_cb1(&mut self, level: bool) {
        if self.cb1.set(level, self.pcr & 0x10 != 0) {
            self.ifr |= irq::CB1;
            if self.acr & 0x02 != 0 {
                self.port_b.latched = self.port_b.pins;
            }
        }
    }

    /// Count one PB6 pulse for Timer 2 in pulse-counting mode.
    pub fn pulse_pb6(&mut self) {
        if self.acr & 0x20 != 0 && self.t2.count() && self.t2.armed {
            self.ifr |= irq::T2;
            self.t2.armed = false;
        }
    }

    pub fn read(&mut self, register: u8) -> u8 {
        match register & 0x0F {
            reg::ORB => {
                self.ifr &= !(irq::CB1 | irq::CB2);
                let value = self.port_b.read(self.acr & 0x02 != 0);
                self.with_pb7(value)
            }
            reg::ORA => {
                self.ifr &= !(irq::CA1 | irq::CA2);
                self.strobe_ca2();
                self.port_a.read(self.acr & 0x01 != 0)
            }
            reg::DDRB => self.port_b.ddr,
            reg::DDRA => self.port_a.ddr,
            reg::T1CL => {
                self.ifr &= !irq::T1;
                self.t1.counter as u8
            }
            reg::T1CH => (self.t1.counter >> 8) as u8,
            reg::T1LL => self.t1.latch as u8,
            reg::T1LH => (self.t1.latch >> 8) as u8,
            reg::T2CL => {
                self.ifr &= !irq::T2;
                self.t2.counter as u8
            }
            reg::T2CH => (self.t2.counter >> 8) as u8,
            reg::SR => {
                self.ifr &= !irq::SR;
                self.sr_bits = 0;
                self.sr
            }
            reg::ACR => self.acr,
            reg::PCR => self.pcr,
            reg::IFR => {
                let any = if self.irq_active() { 0x80 } else { 0 };
                (self.ifr & 0x7F) | any
            }
            reg::IER => self.ier | 0x80,
            _ => self.port_a.read(self.acr & 0x01 != 0),
        }
    }

    pub fn write(&mut self, register: u8, value: u8) {
        match register & 0x0F {
            reg::ORB => {
                self.ifr &= !(irq::CB1 | irq::CB2);
                self.port_b.output = value;
            }
            reg::ORA => {
                self.ifr &= !(irq::CA1 | irq::CA2);
                self.strobe_ca2();
                self.port_a.output = value;
            }
            reg::DDRB => self.port_b.ddr = value,
            reg::DDRA => self.port_a.ddr = value,
            reg::T1CL | reg::T1LL => {
                self.t1.latch = (self.t1.latch & 0xFF00) | u16::from(value);
            }
            reg::T1CH => {
                self.t1.latch = (self.t1.latch & 0x00FF) | (u16::from(value) << 8);
                self.t1.counter = self.t1.latch;
                self.t1.armed = true;
                self.ifr &= !irq::T1;
                self.pb7 = false;
            }
            reg::T1LH => {
                self.t1.latch = (self.t1.latch & 0x00FF) | (u16::from(value) << 8);
                self.ifr &= !irq::T1;
            }
            reg::T2CL => {
                self.t2.latch = (self.t2.latch & 0xFF00) | u16::from(value);
            }
            reg::T2CH => {
                self.t2.counter = (self.t2.latch & 0x00FF) | (u16::from(value) << 8);
                self.t2.armed = true;
                self.ifr &= !irq::T2;
            }
            reg::SR => {
                self.sr = value;
                self.sr_bits = 0;
                self.ifr &= !irq::SR;
            }
            reg::ACR => self.acr = value,
            reg::PCR => self.pcr = value,
            reg::IFR => self.ifr &= !value,
            reg::IER => {
                if value & 0x80 != 0 {
                    self.ier |= value & 0x7F;
                } else {
                    self.ier &= !(value & 0x7F);
                }
            }
            _ => self.port_a.output = value,
        }
    }

    fn with_pb7(&self, value: u8) -> u8 {
        if self.acr & 0x80 != 0 {
            (value & 0x7F) | if self.pb7 { 0x80 } else { 0 }
        } else {
            value
        }
    }

    fn strobe_ca2(&mut self) {
        if (self.pcr >> 1) & 0x07 == 0b101 {
            self.ca2_pulse = true;
        }
    }

    fn tick_t1(&mut self) {
        if !self.t1.count() {
            return;
        }
        let free_run = self.acr & 0x40 != 0;
        if free_run {
            self.t1.counter = self.t1.latch;
            self.ifr |= irq::T1;
            if self.acr & 0x80 != 0 {
                self.pb7 = !self.pb7;
            }
        } else if self.t1.armed {
            self.ifr |= irq::T1;
            self.t1.armed = false;
            if self.acr & 0x80 != 0 {
                self.pb7 = true;
            }
        }
    }

    fn tick_t2(&mut self) {
        if self.acr & 0x20 != 0 {
            return;
        }
        if self.t2.count() && self.t2.armed {
            self.ifr |= irq::T2;
            self.t2.armed = false;
        }
    }

    /// Shift register modes clocked by phi2 (ACR bits 4-2 = x10).
    fn tick_sr(&mut self) {
        let mode = (self.acr >> 2) & 0x07;
        if mode & 0x03 != 0b10 || self.sr_bits >= 8 {
            return;
        }
        self.sr = self.sr.rotate_left(1);
        self.sr_bits += 1;
        if self.sr_bits == 8 {
            self.ifr |= irq::SR;
        }
    }
}

impl Default for Via6522 {
    fn default() -> Self {
        Self::new()
    }
}

impl Tickable for Via6522 {
    fn tick(&mut self) {
        self.ca2_pulse = false;
        self.tick_t1();
        self.tick_t2();
        self.tick_sr();
    }
}

const QUERY_PATHS: &[&str] = &[
    "ora", "orb", "ddra", "ddrb", "t1", "t1_latch", "t2", "acr", "pcr", "ifr", "ier", "irq",
];

impl Observable for Via6522 {
    fn query(&self, path: &str) -> Option<Value> {
        Some(match path {
            "ora" => self.port_a.output.into(),
            "orb" => self.port_b.output.into(),
            "ddra" => self.port_a.ddr.into(),
            "ddrb" => self.port_b.ddr.into(),
            "t1" => self.t1.counter.into(),
            "t1_latch" => self.t1.latch.into(),
            "t2" => self.t2.counter.into(),
            "acr" => self.acr.into(),
            "pcr" => self.pcr.into(),
            "ifr" => self.ifr.into(),
            "ier" => self.ier.into(),
            "irq" => self.irq_active().into(),
            _ => return None,
        })
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::Ticks;

    fn started_t1(latch: u16, acr: u8) -> Via6522 {
        let mut via = Via6522::new();
        via.write(reg::ACR, acr);
        via.write(reg::T1CL, latch as u8);
        via.write(reg::T1CH, (latch >> 8) as u8);
        via
    }

    #[test]
    fn timer1_underflows_after_latch_plus_one() {
        let mut via = started_t1(3, 0x00);
        assert_eq!(via.query("t1"), Some(Value::U16(3)));
        via.tick_n(Ticks::new(3));
        assert_eq!(via.ifr & irq::T1, 0);
        via.tick();
        assert_ne!(via.ifr & irq::T1, 0);
    }

    #[test]
    fn timer1_one_shot_fires_once() {
        let mut via = started_t1(2, 0x00);
        via.tick_n(Ticks::new(3));
        assert_ne!(via.ifr & irq::T1, 0);
        via.write(reg::IFR, irq::T1);
        via.tick_n(Ticks::new(0x1_0000));
        assert_eq!(via.ifr & irq::T1, 0);
    }

    #[test]
    fn timer1_free_run_reloads() {
        let mut via = started_t1(2, 0x40);
        via.tick_n(Ticks::new(3));
        assert_ne!(via.ifr & irq::T1, 0);
        assert_eq!(via.t1.counter, 2);
    }

    #[test]
    fn writing_t1_high_clears_flag() {
        let mut via = Via6522::new();
        via.ifr = irq::T1;
        via.write(reg::T1CL, 10);
        via.write(reg::T1CH, 0);
        assert_eq!(via.ifr & irq::T1, 0);
        assert_eq!(via.t1.counter, 10);
    }

    #[test]
    fn reading_counters_clears_flags() {
        let mut via = Via6522::new();
        via.ifr = irq::T1 | irq::T2;
        let _ = via.read(reg::T1CL);
        assert_eq!(via.ifr, irq::T2);
        let _ = via.read(reg::T2CL);
        assert_eq!(via.ifr, 0);
    }

    #[test]
    fn timer2_one_shot() {
        let mut via = Via6522::new();
        via.write(reg::T2CL, 3);
        via.write(reg::T2CH, 0);
        via.tick_n(Ticks::new(4));
        assert_ne!(via.ifr & irq::T2, 0);
    }

    #[test]
    fn timer2_counts_pb6_pulses() {
        let mut via = Via6522::new();
        via.write(reg::ACR, 0x20);
        via.write(reg::T2CL, 1);
        via.write(reg::T2CH, 0);
        via.tick_n(Ticks::new(100));
        assert_eq!(via.ifr & irq::T2, 0);
        via.pulse_pb6();
        via.pulse_pb6();
        assert_ne!(via.ifr & irq::T2, 0);
    }

    #[test]
    fn ier_set_and_clear() {
        let mut via = Via6522::new();
        via.write(reg::IER, 0x80 | irq::T1 | irq::CB1);
        assert_eq!(via.read(reg::IER), 0x80 | irq::T1 | irq::CB1);
        via.write(reg::IER, irq::T1);
        assert_eq!(via.read(reg::IER), 0x80 | irq::CB1);
    }

    #[test]
    fn irq_needs_flag_and_enable() {
        let mut via = Via6522::new();
        via.ifr = irq::T1;
        assert!(!via.irq_active());
        via.write(reg::IER, 0x80 | irq::T1);
        assert!(via.irq_active());
        assert_eq!(via.read(reg::IFR), 0x80 | irq::T1);
    }

    #[test]
    fn ca1_edge_follows_pcr() {
        let mut via = Via6522::new();
        via.set_ca1(false);
        assert_ne!(via.ifr & irq::CA1, 0, "negative edge by default");

        let mut via = Via6522::new();
        via.write(reg::PCR, 0x01);
        via.set_ca1(false);
        assert_eq!(via.ifr & irq::CA1, 0);
        via.set_ca1(true);
        assert_ne!(via.ifr & irq::CA1, 0);
    }

    #[test]
    fn cb1_sets_flag_and_orb_read_clears_it() {
        let mut via = Via6522::new();
        via.set_cb1(false);
        assert_ne!(via.ifr & irq::CB1, 0);
        let _ = via.read(reg::ORB);
        assert_eq!(via.ifr & irq::CB1, 0);
    }

    #[test]
    fn port_a_latches_on_ca1() {
        let mut via = Via6522::new();
        via.write(reg::ACR, 0x01);
        via.set_port_a_input(0x55);
        via.set_ca1(false);
        via.set_port_a_input(0xAA);
        assert_eq!(via.read(reg::ORA_NH), 0x55);
        via.write(reg::ACR, 0x00);
        assert_eq!(via.read(reg::ORA_NH), 0xAA);
    }

    #[test]
    fn port_read_mixes_outputs_and_pins() {
        let mut via = Via6522::new();
        via.write(reg::DDRA, 0x0F);
        via.write(reg::ORA, 0xAB);
        via.set_port_a_input(0xC0);
        assert_eq!(via.read(reg::ORA_NH), 0xCB);
        assert_eq!(via.port_a_output(), 0xFB);
    }

    #[test]
    fn ora_no_handshake_keeps_flags() {
        let mut via = Via6522::new();
        via.ifr = irq::CA1 | irq::CA2;
        let _ = via.read(reg::ORA_NH);
        assert_eq!(via.ifr, irq::CA1 | irq::CA2);
        let _ = via.read(reg::ORA);
        assert_eq!(via.ifr, 0);
    }

    #[test]
    fn pb7_toggles_in_free_run() {
        let mut via = started_t1(1, 0xC0);
        via.write(reg::DDRB, 0x80);
        assert_eq!(via.port_b_output() & 0x80, 0);
        via.tick_n(Ticks::new(2));
        assert_eq!(via.port_b_output() & 0x80, 0x80);
        via.tick_n(Ticks::new(2));
        assert_eq!(via.port_b_output() & 0x80, 0);
    }

    #[test]
    fn manual_ca2_and_cb2_outputs() {
        let mut via = Via6522::new();
        assert!(via.ca2_output());
        assert!(via.cb2_output());
        via.write(reg::PCR, 0b1100_1100);
        assert!(!via.ca2_output());
        assert!(!via.cb2_output());
        via.write(reg::PCR, 0b1110_1110);
        assert!(via.ca2_output());
        assert!(via.cb2_output());
    }

    #[test]
    fn shift_register_flags_after_eight_phi2_shifts() {
        let mut via = Via6522::new();
        via.write(reg::ACR, 0b0001_1000);
        via.write(reg::SR, 0x81);
        via.tick_n(Ticks::new(7));
        assert_eq!(via.ifr & irq::SR, 0);
        via.tick();
        assert_ne!(via.ifr & irq::SR, 0);
        assert_eq!(via.read(reg::SR), 0x81);
    }

    #[test]
    fn reset_keeps_pins() {
        let mut via = started_t1(5, 0x40);
        via.set_port_b_input(0x12);
        via.reset();
        assert_eq!(via.read(reg::ACR), 0);
        assert_eq!(via.read(reg::ORB), 0x12);
    }
}
