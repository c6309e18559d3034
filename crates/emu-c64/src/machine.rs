//! The C64 with its 1541: CPU, banked memory, chipset, IEC bus and drive.
//!
//! The machine advances one CPU instruction at a time:
//!
//! 1. While the VIC-II holds BA low the chipset runs alone (stolen cycles).
//! 2. The CPU runs one instruction (or interrupt sequence).
//! 3. The chipset is ticked once per cycle the CPU took.
//! 4. The drive catches up on the same number of cycles over the IEC bus.
//! 5. Watch hits, JAMs and the frame-complete latch are collected.
//!
//! Frame boundaries also drive autostart and the LED average, and queue the
//! frame and audio events. Events accumulate until the owner takes them.

use std::sync::Arc;

use emu_core::{Bus, Cpu, Observable, Value};
use format_d64::{D64, DirEntry};
use mos_6502::{IllegalOpcode, Mos6502};
use mos_sid_6581::SidModel;
use mos_vic_ii::{VideoStandard, apply_pal_blur};

use crate::autostart::{Autostart, AutostartReport, AutostartState};
use crate::bus::{C64Bus, Watch, WatchHit};
use crate::chipset::Chipset;
use crate::config::{C64Model, MachineConfig, Roms};
use crate::drive1541::Drive1541;
use crate::error::MachineError;
use crate::events::MachineEvent;
use crate::iec::{DRIVE_DEVICE, IecBus};
use crate::input::InputState;
use crate::memory::{Memory, Region};
use crate::resources::{Resource, Resources};
use crate::vdrive::{self, LOAD_TRAP, TrapOutcome};

/// What one call to [`Machine::step`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Step {
    /// Machine cycles, stolen cycles included.
    pub cycles: u32,
    pub frame_complete: bool,
    pub watch: Option<WatchHit>,
    pub jam: Option<IllegalOpcode>,
}

/// Drive 8: the true-emulated 1541 when a DOS ROM is present, otherwise just
/// a slot holding the image for the virtual device.
struct DiskSlot {
    drive: Option<Drive1541>,
    loose: Option<D64>,
}

impl DiskSlot {
    fn insert(&mut self, disk: D64) -> Option<D64> {
        match &mut self.drive {
            Some(drive) => {
                let old = drive.eject_disk();
                drive.insert_disk(disk);
                old
            }
            None => self.loose.replace(disk),
        }
    }

    fn eject(&mut self) -> Option<D64> {
        match &mut self.drive {
            Some(drive) => drive.eject_disk(),
            None => self.loose.take(),
        }
    }

    /// The image as the host should see it, head writes included.
    fn disk(&mut self) -> Option<&D64> {
        match &mut self.drive {
            Some(drive) => drive.disk_synced(),
            None => self.loose.as_ref(),
        }
    }

    fn peek(&self) -> Option<&D64> {
        match &self.drive {
            Some(drive) => drive.disk(),
            None => self.loose.as_ref(),
        }
    }
}

pub struct Machine {
    cpu: Mos6502,
    bus: C64Bus,
    iec: IecBus,
    slot: DiskSlot,
    resources: Resources,
    model: C64Model,
    autostart: Autostart,
    events: Vec<MachineEvent>,
    last_led: u16,
    cycles: u64,
    frames: u64,
}

impl Machine {
    /// Build a powered-on machine. Resource overrides from `config` are
    /// applied before the chips are created.
    pub fn new(config: &MachineConfig, roms: &Roms, input: Arc<InputState>) -> Result<Self, MachineError> {
        let mut resources = Resources::new();
        resources.store(Resource::MachineVideoStandard, config.model.resource_value());
        resources.set(Resource::SoundSampleRate.name(), i64::from(config.sample_rate))?;
        for (name, &value) in &config.resources {
            resources.set(name, value)?;
        }
        let drive = roms.dos1541.as_deref().map(Drive1541::new);
        if drive.is_none() {
            log::warn!("no 1541 DOS ROM: using the virtual drive");
            resources.store(Resource::DriveTrueEmulation, 0);
            resources.store(Resource::VirtualDevices, 1);
        }

        let model = C64Model::from_resource_value(resources.get(Resource::MachineVideoStandard))
            .unwrap_or_default();
        let chipset = new_chipset(model.standard(), &resources);
        let memory = Memory::new(roms);
        let mut machine = Self {
            cpu: Mos6502::new(),
            bus: C64Bus::new(memory, chipset, input),
            iec: IecBus::new(),
            slot: DiskSlot { drive, loose: None },
            resources,
            model,
            autostart: Autostart::new(),
            events: Vec::new(),
            last_led: 0,
            cycles: 0,
            frames: 0,
        };
        machine.cpu.reset();
        log::info!(
            "C64 {:?}, true drive {}, virtual devices {}",
            model,
            machine.true_drive(),
            machine.virtual_devices()
        );
        Ok(machine)
    }

    /// Run one instruction and everything that happens alongside it.
    pub fn step(&mut self) -> Step {
        if self.virtual_devices()
            && self.cpu.regs.pc == LOAD_TRAP
            && self.bus.memory.resolve(LOAD_TRAP) == Region::Kernal
        {
            self.service_load_trap();
        }

        let mut stolen = 0;
        while self.bus.chipset.vic.ba_low() {
            self.bus.chipset.tick(&self.bus.memory);
            stolen += 1;
        }

        let taken = self.cpu.step(&mut self.bus);
        for _ in 0..taken {
            self.bus.chipset.tick(&self.bus.memory);
        }
        self.cpu.set_irq(self.bus.chipset.irq());
        self.cpu.set_nmi(self.bus.chipset.nmi());

        let cycles = stolen + taken;
        self.run_drive(cycles);
        self.cycles += u64::from(cycles);

        let mut step = Step {
            cycles,
            watch: self.bus.take_watch_hit(),
            ..Step::default()
        };
        if let Some(jam) = self.cpu.take_illegal_opcode() {
            log::warn!("{jam}");
            self.events.push(MachineEvent::Diagnostic {
                text: jam.to_string(),
            });
            step.jam = Some(jam);
        }
        if self.bus.chipset.vic.take_frame_complete() {
            self.end_frame();
            step.frame_complete = true;
        }
        step
    }

    /// Run a pending reset sequence so PC holds the reset vector. Register
    /// edits made before that would otherwise be overwritten by it.
    pub fn settle_reset(&mut self) {
        if self.cpu.reset_pending() {
            self.step();
        }
    }

    /// Run whole instructions until at least `cycles` have passed.
    /// Returns the cycles actually run.
    pub fn run_cycles(&mut self, cycles: u64) -> u64 {
        let start = self.cycles;
        while self.cycles - start < cycles {
            self.step();
        }
        self.cycles - start
    }

    /// Run until the VIC-II completes a frame. Returns the cycles run.
    pub fn run_frame(&mut self) -> u64 {
        let start = self.cycles;
        while !self.step().frame_complete {}
        self.cycles - start
    }

    fn run_drive(&mut self, cycles: u32) {
        self.iec.set_c64_outputs(self.bus.chipset.cia2.port_a_output());
        let true_drive = self.true_drive();
        match &mut self.slot.drive {
            Some(drive) if true_drive => {
                drive.run(cycles, &mut self.iec);
                if let Some(jam) = drive.take_illegal_opcode() {
                    log::warn!("1541: {jam}");
                    self.events.push(MachineEvent::Diagnostic {
                        text: format!("drive {DRIVE_DEVICE}: {jam}"),
                    });
                }
            }
            _ => self.iec.release_drive(),
        }
        self.iec.tick(cycles);
        if let Some(drive) = self.iec.take_timeout() {
            log::warn!("drive {drive} not responding");
            self.events.push(MachineEvent::DeviceNotResponding { drive });
        }
        self.bus.chipset.cia2.set_port_a_input(self.iec.c64_inputs());
    }

    fn service_load_trap(&mut self) {
        let outcome = vdrive::service_load(&mut self.cpu, &mut self.bus.memory, self.slot.disk());
        match outcome {
            Some(TrapOutcome::Loaded { name, start, end }) => {
                log::info!("virtual drive: loaded \"{name}\" ${start:04X}-${end:04X}");
            }
            Some(TrapOutcome::Verified { name, matched }) => {
                log::info!("virtual drive: verified \"{name}\": {}", if matched { "ok" } else { "differs" });
            }
            Some(TrapOutcome::Failed { name, error }) => {
                log::warn!("virtual drive: load \"{name}\" failed: {error}");
                self.events.push(MachineEvent::Diagnostic {
                    text: error.to_string(),
                });
            }
            None => {}
        }
    }

    fn end_frame(&mut self) {
        self.frames += 1;

        let vic = &self.bus.chipset.vic;
        let width = vic.framebuffer_width();
        let height = vic.framebuffer_height();
        let mut pixels = vic.framebuffer().to_vec();
        let blur = self.resources.get(Resource::PalBlur) as u16;
        apply_pal_blur(&mut pixels, width as usize, blur);
        self.events.push(MachineEvent::FrameReady {
            pixels,
            width,
            height,
        });

        let samples = self.bus.chipset.sid.audio_mut().drain_all();
        if !samples.is_empty() {
            self.events.push(MachineEvent::AudioReady { samples });
        }

        if let Some(drive) = &mut self.slot.drive {
            let intensity = drive.take_led_intensity();
            if intensity != self.last_led {
                self.last_led = intensity;
                self.events.push(MachineEvent::DriveLed {
                    drive: DRIVE_DEVICE,
                    intensity,
                });
            }
        }

        let report = self
            .autostart
            .on_frame(&mut self.cpu, &mut self.bus.memory, self.slot.disk());
        match report {
            Some(AutostartReport::Started { name, address, .. }) => {
                self.events.push(MachineEvent::Diagnostic {
                    text: format!("autostart: \"{name}\" at ${address:04X}"),
                });
            }
            Some(AutostartReport::Failed(e)) => {
                self.events.push(MachineEvent::Diagnostic {
                    text: format!("autostart failed: {e}"),
                });
            }
            Some(AutostartReport::Finished) | None => {}
        }
    }

    /// Hard: power-on RAM, every chip and the drive reset. Soft: the CPU's
    /// reset line only.
    pub fn reset(&mut self, hard: bool) {
        if hard {
            log::info!("hard reset");
            self.bus.memory.power_on();
            self.bus.chipset.reset();
            self.bus.chipset.sid.audio_mut().restart();
            self.iec = IecBus::new();
            if let Some(drive) = &mut self.slot.drive {
                drive.reset();
            }
            if self.autostart.state() == AutostartState::Injected {
                self.autostart.cancel();
            }
        } else {
            log::info!("soft reset");
        }
        self.cpu.reset();
    }

    /// Mount `disk` in drive `device`. Swapping never resets anything.
    pub fn attach_disk(&mut self, device: u8, disk: D64) -> Result<(), MachineError> {
        check_device(device)?;
        log::info!("drive {device}: attached \"{}\"", disk.disk_name());
        self.slot.insert(disk);
        Ok(())
    }

    /// Unmount the disk, returning it with any writes applied.
    pub fn detach_disk(&mut self, device: u8) -> Result<Option<D64>, MachineError> {
        check_device(device)?;
        Ok(self.slot.eject())
    }

    /// The mounted image, head writes included.
    pub fn disk(&mut self) -> Option<&D64> {
        self.slot.disk()
    }

    /// Directory of the disk in `device`.
    pub fn directory(&mut self, device: u8) -> Result<Vec<DirEntry>, MachineError> {
        check_device(device)?;
        let disk = self.slot.disk().ok_or(MachineError::DriveNotReady)?;
        Ok(disk.list_directory()?)
    }

    /// Directory of `device` as the listing text `LOAD"$",8` would show.
    pub fn directory_text(&mut self, device: u8) -> Result<String, MachineError> {
        check_device(device)?;
        let disk = self.slot.disk().ok_or(MachineError::DriveNotReady)?;
        vdrive::directory_text(disk)
    }

    pub fn read_file(&mut self, device: u8, name: &str) -> Result<Vec<u8>, MachineError> {
        check_device(device)?;
        let disk = self.slot.disk().ok_or(MachineError::DriveNotReady)?;
        Ok(disk.read_file(name)?)
    }

    /// Arm autostart for `target` after the configured delay.
    pub fn arm_autostart(&mut self, target: &str) {
        let delay = match self.resources.get(Resource::AutostartDelay) {
            0 => 2 * self.model.standard().mains_hz(),
            frames => frames as u32,
        };
        self.autostart.arm(target, delay);
    }

    #[must_use]
    pub fn autostart_state(&self) -> AutostartState {
        self.autostart.state()
    }

    /// Autostart is still loading and wants the machine in warp.
    #[must_use]
    pub fn autostart_wants_warp(&self) -> bool {
        self.autostart.is_active() && self.resources.flag(Resource::AutostartWarp)
    }

    /// Validate and apply a resource by name.
    pub fn set_resource(&mut self, name: &str, value: i64) -> Result<Resource, MachineError> {
        let resource = Resources::validate(name, value)?;
        self.apply_resource(resource, value)?;
        Ok(resource)
    }

    /// Apply a resource value already checked against its range.
    pub fn apply_resource(&mut self, resource: Resource, value: i64) -> Result<(), MachineError> {
        if resource == Resource::DriveTrueEmulation && value != 0 && self.slot.drive.is_none() {
            return Err(MachineError::RomMissing("1541 DOS ROM not loaded".into()));
        }
        if !self.resources.store(resource, value) {
            return Ok(());
        }
        log::debug!("resource {resource} = {value}");
        match resource {
            Resource::ColorSaturation
            | Resource::ColorContrast
            | Resource::ColorBrightness
            | Resource::ColorGamma => {
                let palette = self.resources.colour_adjust().palette();
                self.bus.chipset.vic.set_colours(palette);
            }
            Resource::DriveTrueEmulation => {
                let enabled = value != 0;
                if let Some(drive) = &mut self.slot.drive {
                    drive.reset();
                }
                self.iec.release_drive();
                self.events.push(MachineEvent::DriveEnabled {
                    drive: DRIVE_DEVICE,
                    enabled,
                });
            }
            Resource::SidModel => {
                let model = SidModel::from_index(value as u8).unwrap_or_default();
                self.bus.chipset.sid.set_model(model);
            }
            Resource::SoundSampleRate => {
                self.bus.chipset.sid.audio_mut().set_sample_rate(value as u32);
            }
            Resource::MachineVideoStandard => {
                self.model = C64Model::from_resource_value(value).unwrap_or_default();
                self.bus.chipset = new_chipset(self.model.standard(), &self.resources);
                self.reset(true);
            }
            Resource::PalBlur
            | Resource::WarpMode
            | Resource::VirtualDevices
            | Resource::AutostartWarp
            | Resource::AutostartDelay => {}
        }
        Ok(())
    }

    #[must_use]
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    #[must_use]
    pub fn true_drive(&self) -> bool {
        self.resources.flag(Resource::DriveTrueEmulation)
    }

    /// LOAD from device 8 is served by the trap rather than the drive.
    #[must_use]
    pub fn virtual_devices(&self) -> bool {
        self.resources.flag(Resource::VirtualDevices) && !self.true_drive()
    }

    /// Cap buffered audio, dropping the oldest samples (warp mode).
    pub fn set_audio_limit(&mut self, limit: Option<usize>) {
        self.bus.chipset.sid.audio_mut().set_limit(limit);
    }

    /// Push the monitor's watchpoints down to the bus.
    pub fn set_watches(&mut self, watches: Vec<Watch>) {
        self.bus.set_watches(watches);
    }

    /// Read without side effects.
    pub fn peek(&mut self, address: u16) -> u8 {
        self.bus.peek(address)
    }

    /// Write through the CPU's memory map without tripping watchpoints.
    pub fn poke(&mut self, address: u16, value: u8) {
        self.bus.write(address, value);
        let _ = self.bus.take_watch_hit();
    }

    /// Events queued since the last call, in emission order.
    pub fn take_events(&mut self) -> Vec<MachineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Queue an event from outside the run loop (monitor, scheduler).
    pub fn push_event(&mut self, event: MachineEvent) {
        self.events.push(event);
    }

    #[must_use]
    pub fn cpu(&self) -> &Mos6502 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Mos6502 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &C64Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut C64Bus {
        &mut self.bus
    }

    #[must_use]
    pub fn drive(&self) -> Option<&Drive1541> {
        self.slot.drive.as_ref()
    }

    #[must_use]
    pub fn iec(&self) -> &IecBus {
        &self.iec
    }

    #[must_use]
    pub fn model(&self) -> C64Model {
        self.model
    }

    #[must_use]
    pub fn standard(&self) -> VideoStandard {
        self.model.standard()
    }

    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        self.bus.chipset.vic.framebuffer()
    }

    #[must_use]
    pub fn framebuffer_width(&self) -> u32 {
        self.bus.chipset.vic.framebuffer_width()
    }

    #[must_use]
    pub fn framebuffer_height(&self) -> u32 {
        self.bus.chipset.vic.framebuffer_height()
    }

    /// Machine cycles since power-on, stolen cycles included.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

fn check_device(device: u8) -> Result<(), MachineError> {
    if device == DRIVE_DEVICE {
        Ok(())
    } else {
        Err(MachineError::NoSuchDrive(device))
    }
}

fn new_chipset(standard: VideoStandard, resources: &Resources) -> Chipset {
    let sid_model =
        SidModel::from_index(resources.get(Resource::SidModel) as u8).unwrap_or_default();
    let rate = resources.get(Resource::SoundSampleRate) as u32;
    let mut chipset = Chipset::new(standard, sid_model, rate);
    chipset.vic.set_colours(resources.colour_adjust().palette());
    chipset
}

impl Observable for Machine {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            return self.cpu.query(rest);
        }
        if let Some(rest) = path.strip_prefix("drive.") {
            return self.slot.drive.as_ref()?.query(rest);
        }
        if let Some(hex) = path.strip_prefix("memory.") {
            let addr = u16::from_str_radix(hex.trim_start_matches("0x"), 16).ok()?;
            return Some(self.bus.memory.read(addr).into());
        }
        if let Some(rest) = path.strip_prefix("iec.") {
            return match rest {
                "atn" => Some(self.iec.atn().into()),
                "clk" => Some(self.iec.clk().into()),
                "data" => Some(self.iec.data().into()),
                _ => None,
            };
        }
        match path {
            "cycles" => Some(self.cycles.into()),
            "frames" => Some(self.frames.into()),
            "disk" => Some(self.slot.peek().is_some().into()),
            "autostart" => Some(format!("{:?}", self.autostart.state()).as_str().into()),
            "bank" => Some(self.bus.memory.bank_config().0.into()),
            _ => self.bus.chipset.query(path),
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<reg>",
            "drive.<path>",
            "memory.<hex>",
            "iec.atn",
            "iec.clk",
            "iec.data",
            "cycles",
            "frames",
            "disk",
            "autostart",
            "bank",
            "vic.<path>",
            "sid.<path>",
            "cia1.<path>",
            "cia2.<path>",
        ]
    }
}
