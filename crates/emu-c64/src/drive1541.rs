//! 1541 floppy drive: its own 6502, two VIAs and a spinning GCR track.
//!
//!   VIA1 ($1800): IEC interface
//!     Port B: bit 0 = DATA IN, bit 1 = DATA OUT, bit 2 = CLK IN,
//!             bit 3 = CLK OUT, bit 4 = ATN acknowledge, bits 5-6 = device
//!             number jumpers, bit 7 = ATN IN. Inputs read 1 while the line
//!             is low (they pass through inverters).
//!     CA1:    ATN IN, so the DOS gets an interrupt when ATN is asserted.
//!
//!   VIA2 ($1C00): disk controller
//!     Port A: GCR byte under the head
//!     Port B: bits 0-1 = stepper phase, bit 2 = motor, bit 3 = LED,
//!             bit 4 = write protect (0 = protected), bits 5-6 = density,
//!             bit 7 = SYNC (0 = in sync)
//!     CA1:    byte ready (falling edge), also pulses the CPU's SO pin
//!     CA2:    SO enable
//!     CB2:    0 = write mode
//!
//! The drive runs behind the computer: after each C64 instruction the
//! machine hands over that many cycles and the drive executes whole
//! instructions until it has used them up, carrying the overshoot into the
//! next call.

use emu_core::{Cpu, Observable, Tickable, Value};
use format_d64::D64;
use mos_6502::{IllegalOpcode, Mos6502};

use crate::drive1541_bus::Drive1541Bus;
use crate::iec::IecBus;

/// Half-track positions 0..=83 cover tracks 1-42.
const MAX_HALF_TRACK: u8 = 83;
/// Bytes of an unformatted (or half-) track: no sync anywhere.
const BLANK_TRACK_LEN: usize = 7692;

pub struct Drive1541 {
    cpu: Mos6502,
    bus: Drive1541Bus,
    disk: Option<D64>,
    /// 0 = track 1; odd positions sit between tracks.
    half_track: u8,
    gcr_track: Vec<u8>,
    gcr_position: usize,
    /// Cycles since the last byte passed under the head.
    byte_counter: u32,
    /// One-bits at the end of the previous byte, for SYNC detection.
    ones_run: u32,
    in_sync: bool,
    prev_phase: u8,
    motor_on: bool,
    led_on: bool,
    write_mode: bool,
    track_dirty: bool,
    /// Cycles owed to (positive) or run ahead of (negative) the computer.
    budget: i64,
    cycles: u64,
    led_cycles: u64,
    led_window: u64,
}

impl Drive1541 {
    /// A powered-off drive with `rom` as its DOS; call `reset` to start it.
    #[must_use]
    pub fn new(rom: &[u8]) -> Self {
        let mut drive = Self {
            cpu: Mos6502::new(),
            bus: Drive1541Bus::new(rom),
            disk: None,
            half_track: 34,
            gcr_track: Vec::new(),
            gcr_position: 0,
            byte_counter: 0,
            ones_run: 0,
            in_sync: false,
            prev_phase: 0,
            motor_on: false,
            led_on: false,
            write_mode: false,
            track_dirty: false,
            budget: 0,
            cycles: 0,
            led_cycles: 0,
            led_window: 0,
        };
        drive.reset();
        drive
    }

    /// Pull the drive's reset line. The disk stays in; the head stays put.
    pub fn reset(&mut self) {
        self.flush_track();
        self.bus.reset();
        self.cpu.reset();
        self.budget = 0;
        self.motor_on = false;
        self.led_on = false;
        self.write_mode = false;
        self.prev_phase = self.bus.via2.port_b_output() & 0x03;
        self.update_static_pins();
    }

    pub fn insert_disk(&mut self, disk: D64) {
        log::info!("1541: disk \"{}\" inserted", disk.disk_name());
        self.flush_track();
        self.disk = Some(disk);
        self.encode_current_track();
        self.update_static_pins();
    }

    /// Take the disk out, writing back anything still in the track buffer.
    pub fn eject_disk(&mut self) -> Option<D64> {
        self.flush_track();
        let disk = self.disk.take();
        self.encode_current_track();
        self.update_static_pins();
        if disk.is_some() {
            log::info!("1541: disk ejected");
        }
        disk
    }

    #[must_use]
    pub fn has_disk(&self) -> bool {
        self.disk.is_some()
    }

    #[must_use]
    pub fn disk(&self) -> Option<&D64> {
        self.disk.as_ref()
    }

    /// The mounted image with any pending head writes applied.
    pub fn disk_synced(&mut self) -> Option<&D64> {
        self.flush_track();
        self.disk.as_ref()
    }

    /// Current track (1-42), rounded down on a half-track.
    #[must_use]
    pub fn track(&self) -> u8 {
        self.half_track / 2 + 1
    }

    #[must_use]
    pub fn half_track(&self) -> u8 {
        self.half_track
    }

    #[must_use]
    pub fn motor_on(&self) -> bool {
        self.motor_on
    }

    #[must_use]
    pub fn led_on(&self) -> bool {
        self.led_on
    }

    #[must_use]
    pub fn cpu(&self) -> &Mos6502 {
        &self.cpu
    }

    pub fn take_illegal_opcode(&mut self) -> Option<IllegalOpcode> {
        self.cpu.take_illegal_opcode()
    }

    /// Cycles run since creation.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Average LED brightness (0..=1000) since the last call.
    pub fn take_led_intensity(&mut self) -> u16 {
        let intensity = if self.led_window == 0 {
            if self.led_on { 1000 } else { 0 }
        } else {
            (self.led_cycles * 1000 / self.led_window) as u16
        };
        self.led_cycles = 0;
        self.led_window = 0;
        intensity
    }

    /// Run for `cycles` computer cycles against the shared IEC bus.
    pub fn run(&mut self, cycles: u32, iec: &mut IecBus) {
        self.budget += i64::from(cycles);
        while self.budget > 0 {
            self.read_iec(iec);
            let taken = self.cpu.step(&mut self.bus);
            self.write_iec(iec);
            // The drive's own CLK/DATA changes show on port B straight away.
            self.read_iec(iec);
            self.update_mechanics();
            for _ in 0..taken {
                self.tick();
            }
            let irq = self.bus.via1.irq_active() || self.bus.via2.irq_active();
            self.cpu.set_irq(irq);
            self.budget -= i64::from(taken);
        }
    }

    /// IEC lines into VIA1 port B and CA1.
    fn read_iec(&mut self, iec: &IecBus) {
        let atn_asserted = !iec.atn();
        let mut pins = 0x00;
        if !iec.data() {
            pins |= 0x01;
        }
        if !iec.clk() {
            pins |= 0x04;
        }
        if atn_asserted {
            pins |= 0x80;
        }
        self.bus.via1.set_port_b_input(pins);
        self.bus.via1.set_ca1(atn_asserted);
    }

    /// VIA1 outputs onto the bus, with the ATN acknowledge gate: DATA is
    /// pulled while ATN IN and ATNA disagree.
    fn write_iec(&self, iec: &mut IecBus) {
        let pb = self.bus.via1.port_b_output();
        let atn_asserted = !iec.atn();
        let atna = pb & 0x10 != 0;
        iec.set_drive_data(pb & 0x02 != 0 || atn_asserted != atna);
        iec.set_drive_clk(pb & 0x08 != 0);
    }

    /// Motor, LED, stepper and read/write mode from VIA2.
    fn update_mechanics(&mut self) {
        let pb = self.bus.via2.port_b_output();
        self.motor_on = pb & 0x04 != 0;
        self.led_on = pb & 0x08 != 0;

        let phase = pb & 0x03;
        if phase != self.prev_phase {
            self.step_head(phase);
            self.prev_phase = phase;
        }

        let writing = !self.bus.via2.cb2_output();
        if writing != self.write_mode {
            self.write_mode = writing;
            if !writing {
                self.flush_track();
            }
        }
    }

    /// Four-phase stepper: +1 phase moves in a half-track, -1 moves out.
    fn step_head(&mut self, phase: u8) {
        let before = self.half_track;
        match phase.wrapping_sub(self.prev_phase) & 0x03 {
            1 if self.half_track < MAX_HALF_TRACK => self.half_track += 1,
            3 if self.half_track > 0 => self.half_track -= 1,
            _ => {}
        }
        if self.half_track != before {
            self.flush_track();
            self.encode_current_track();
            log::trace!("1541: head to half-track {}", self.half_track);
        }
    }

    /// Write protect and the density/SYNC pins that do not depend on timing.
    fn update_static_pins(&mut self) {
        let write_enabled = if self.disk.is_some() { 0x10 } else { 0x00 };
        let sync = if self.in_sync { 0x00 } else { 0x80 };
        self.bus.via2.set_port_b_input(0x6F | write_enabled | sync);
    }

    fn cycles_per_byte(&self) -> u32 {
        let density = (self.bus.via2.port_b_output() >> 5) & 0x03;
        32 - 2 * u32::from(density)
    }

    /// One cycle of disk rotation plus the VIA timers.
    fn tick(&mut self) {
        self.bus.via1.tick();
        self.bus.via2.tick();
        self.cycles += 1;
        self.led_window += 1;
        if self.led_on {
            self.led_cycles += 1;
        }

        if !self.motor_on || self.gcr_track.is_empty() {
            return;
        }
        self.byte_counter += 1;
        if self.byte_counter == 2 {
            self.bus.via2.set_ca1(true);
        }
        if self.byte_counter < self.cycles_per_byte() {
            return;
        }
        self.byte_counter = 0;

        if self.write_mode {
            self.gcr_track[self.gcr_position] = self.bus.via2.port_a_output();
            self.track_dirty = true;
            self.in_sync = false;
            self.byte_ready();
        } else {
            let byte = self.gcr_track[self.gcr_position];
            self.bus.via2.set_port_a_input(byte);
            self.in_sync = byte == 0xFF && self.ones_run + 8 >= 10;
            self.ones_run = if byte == 0xFF {
                self.ones_run + 8
            } else {
                byte.trailing_ones()
            };
            // The byte-ready line stays quiet while the head reads a sync mark.
            if !self.in_sync {
                self.byte_ready();
            }
        }
        self.update_static_pins();
        self.gcr_position = (self.gcr_position + 1) % self.gcr_track.len();
    }

    fn byte_ready(&mut self) {
        self.bus.via2.set_ca1(false);
        if self.bus.via2.ca2_output() {
            self.cpu.set_overflow();
        }
    }

    /// Decode a written track back into the image.
    fn flush_track(&mut self) {
        if !std::mem::take(&mut self.track_dirty) || self.half_track & 1 != 0 {
            return;
        }
        let track = self.track();
        let Some(disk) = self.disk.as_mut() else {
            return;
        };
        for sector in format_gcr::decode_track(&self.gcr_track) {
            if sector.track != track {
                continue;
            }
            if let Err(e) = disk.write_sector(track, sector.sector, &sector.data) {
                log::warn!("1541: cannot store {track}/{}: {e}", sector.sector);
            }
        }
        log::debug!("1541: flushed writes on track {track}");
    }

    fn encode_current_track(&mut self) {
        let on_half_track = self.half_track & 1 != 0;
        self.gcr_track = match &self.disk {
            Some(_) if on_half_track => vec![0x00; BLANK_TRACK_LEN],
            Some(disk) => {
                let encoded = format_gcr::encode_track(disk, self.track());
                if encoded.is_empty() {
                    vec![0x00; BLANK_TRACK_LEN]
                } else {
                    encoded
                }
            }
            None => Vec::new(),
        };
        if self.gcr_position >= self.gcr_track.len() {
            self.gcr_position = 0;
        }
        self.ones_run = 0;
        self.in_sync = false;
    }
}

impl Observable for Drive1541 {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("ram.") {
            let addr = u16::from_str_radix(rest.trim_start_matches("0x"), 16).ok()?;
            return self.bus.ram().get(usize::from(addr)).map(|&b| b.into());
        }
        match path {
            "pc" => Some(self.cpu.pc().into()),
            "track" => Some(self.track().into()),
            "half_track" => Some(self.half_track.into()),
            "motor" => Some(self.motor_on.into()),
            "led" => Some(self.led_on.into()),
            "disk" => Some(self.disk.is_some().into()),
            "cycles" => Some(self.cycles.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["pc", "track", "half_track", "motor", "led", "disk", "cycles", "ram.<hex>"]
    }
}
