//! The host's handle on a machine running on its own thread.
//!
//! Every control call becomes a [`Command`] on a bounded queue that the
//! worker drains at instruction boundaries. Calls that can fail for reasons
//! the host should hear about straight away (a bad disk image, an unknown
//! resource) are checked here before anything is queued. Joystick and
//! keyboard state bypass the queue: the CIA samples the shared atomics.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, TrySendError};
use format_d64::D64;

use crate::config::{MachineConfig, Roms};
use crate::error::MachineError;
use crate::events::MachineEventSink;
use crate::iec::DRIVE_DEVICE;
use crate::input::InputState;
use crate::machine::Machine;
use crate::resources::{Resource, Resources};
use crate::scheduler::{Command, RunState, Scheduler, Shared, THREAD_NAME};

/// Commands the host may queue ahead of the worker.
const QUEUE_DEPTH: usize = 256;

pub struct MachineSession {
    commands: Sender<Command>,
    shared: Arc<Shared>,
    input: Arc<InputState>,
    /// The run loop, until `start` moves it onto its thread.
    pending: Option<Scheduler>,
    worker: Option<JoinHandle<()>>,
    stopped: bool,
    media: Vec<PathBuf>,
    media_index: usize,
    has_dos: bool,
}

impl MachineSession {
    /// Build the machine without starting it. Media and autostart from the
    /// config are queued so they take effect on `start`.
    pub fn new(
        config: &MachineConfig,
        roms: &Roms,
        sink: impl MachineEventSink + 'static,
    ) -> Result<Self, MachineError> {
        let input = Arc::new(InputState::new());
        let machine = Machine::new(config, roms, Arc::clone(&input))?;
        let shared = Arc::new(Shared::default());
        shared.set_warp(machine.resources().flag(Resource::WarpMode));
        let (commands, rx) = crossbeam_channel::bounded(QUEUE_DEPTH);
        let scheduler = Scheduler::new(machine, rx, Arc::clone(&shared), Box::new(sink));

        let mut session = Self {
            commands,
            shared,
            input,
            pending: Some(scheduler),
            worker: None,
            stopped: false,
            media: Vec::new(),
            media_index: 0,
            has_dos: roms.dos1541.is_some(),
        };
        if !config.media.is_empty() || config.autostart.is_some() {
            session.configure(config.media.clone(), config.autostart.clone())?;
        }
        Ok(session)
    }

    /// Replace the media list, mount its first image in drive 8 and, with a
    /// target, arm autostart (`*` for the first program).
    pub fn configure(
        &mut self,
        media_paths: Vec<PathBuf>,
        autostart_target: Option<String>,
    ) -> Result<(), MachineError> {
        let first = media_paths.first().map(|path| mount(path)).transpose()?;
        self.media = media_paths;
        self.media_index = 0;
        if let Some(disk) = first {
            self.send(Command::AttachDisk {
                drive: DRIVE_DEVICE,
                disk: Box::new(disk),
            })?;
        }
        if let Some(target) = autostart_target {
            self.send(Command::Autostart(target))?;
        }
        Ok(())
    }

    /// Spawn the worker thread. Starting twice is a no-op.
    pub fn start(&mut self) -> Result<(), MachineError> {
        if self.stopped {
            return Err(MachineError::SessionStopped);
        }
        let Some(scheduler) = self.pending.take() else {
            return Ok(());
        };
        self.shared.set_state(RunState::Running);
        let worker = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || scheduler.run())?;
        self.worker = Some(worker);
        log::info!("machine started");
        Ok(())
    }

    /// Stop the worker and wait for it. Terminal: later calls fail with
    /// [`MachineError::SessionStopped`].
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(worker) = self.worker.take() {
            // Blocking is fine: the worker drains the queue as it runs.
            if self.commands.send(Command::Stop).is_ok() {
                self.shared.notify();
            }
            if worker.join().is_err() {
                log::error!("machine thread panicked");
            }
        } else if let Some(scheduler) = self.pending.take() {
            scheduler.finish();
        }
        self.shared.set_state(RunState::Stopped);
    }

    pub fn pause(&self) -> Result<(), MachineError> {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> Result<(), MachineError> {
        self.send(Command::Resume)
    }

    /// Flip warp, returning the new setting.
    pub fn toggle_warp(&self) -> bool {
        let enabled = self.shared.toggle_warp();
        self.shared.notify();
        log::debug!("warp requested {}", if enabled { "on" } else { "off" });
        enabled
    }

    pub fn reset(&self, hard: bool) -> Result<(), MachineError> {
        self.send(Command::Reset { hard })
    }

    /// Load `path` and mount it. Image errors come back from this call.
    pub fn attach_disk(&self, drive: u8, path: impl AsRef<Path>) -> Result<(), MachineError> {
        check_drive(drive)?;
        let disk = mount(path.as_ref())?;
        self.send(Command::AttachDisk {
            drive,
            disk: Box::new(disk),
        })
    }

    pub fn detach_disk(&self, drive: u8) -> Result<(), MachineError> {
        check_drive(drive)?;
        self.send(Command::DetachDisk { drive })
    }

    /// Suspend at the next instruction boundary and show the prompt.
    pub fn activate_monitor(&self) -> Result<(), MachineError> {
        self.send(Command::ActivateMonitor)
    }

    pub fn submit_monitor_line(&self, text: &str) -> Result<(), MachineError> {
        self.send(Command::MonitorLine(text.to_string()))
    }

    pub fn set_joystick_bit(&self, port: u8, bit: u8) {
        self.input.set_joystick_bit(port, bit);
    }

    pub fn clear_joystick_bit(&self, port: u8, bit: u8) {
        self.input.clear_joystick_bit(port, bit);
    }

    pub fn set_key(&self, row: u8, col: u8, pressed: bool) {
        self.input.set_key(row, col, pressed);
    }

    /// Shared input state, for hosts that map their own keys.
    #[must_use]
    pub fn input(&self) -> Arc<InputState> {
        Arc::clone(&self.input)
    }

    /// Validate and queue a resource change.
    pub fn set_resource(&self, name: &str, value: i64) -> Result<(), MachineError> {
        let resource = Resources::validate(name, value)?;
        if resource == Resource::DriveTrueEmulation && value != 0 && !self.has_dos {
            return Err(MachineError::RomMissing("1541 DOS ROM not loaded".into()));
        }
        if resource == Resource::WarpMode {
            self.shared.set_warp(value != 0);
        }
        self.send(Command::SetResource { resource, value })
    }

    /// Mount the next image of the media list in drive 8, wrapping around.
    /// Returns the image now mounted, or `None` without a list.
    pub fn next_media(&mut self) -> Result<Option<PathBuf>, MachineError> {
        if self.media.is_empty() {
            return Ok(None);
        }
        let index = (self.media_index + 1) % self.media.len();
        let path = self.media[index].clone();
        let disk = mount(&path)?;
        self.send(Command::AttachDisk {
            drive: DRIVE_DEVICE,
            disk: Box::new(disk),
        })?;
        self.media_index = index;
        log::info!("media {}/{}: {}", index + 1, self.media.len(), path.display());
        Ok(Some(path))
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.shared.state()
    }

    fn send(&self, command: Command) -> Result<(), MachineError> {
        if self.stopped {
            return Err(MachineError::SessionStopped);
        }
        let sent = if self.worker.is_some() {
            self.commands
                .send(command)
                .map_err(|_| MachineError::SessionStopped)
        } else {
            // Not started: nothing is draining, so never block.
            self.commands.try_send(command).map_err(|e| match e {
                TrySendError::Full(_) => MachineError::CommandQueueFull,
                TrySendError::Disconnected(_) => MachineError::SessionStopped,
            })
        };
        self.shared.notify();
        sent
    }
}

impl Drop for MachineSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn check_drive(drive: u8) -> Result<(), MachineError> {
    if drive == DRIVE_DEVICE {
        Ok(())
    } else {
        Err(MachineError::NoSuchDrive(drive))
    }
}

fn mount(path: &Path) -> Result<D64, MachineError> {
    D64::mount(path).map_err(|e| {
        log::warn!("cannot mount {}: {e}", path.display());
        MachineError::from(e)
    })
}
