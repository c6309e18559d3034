//! The run loop that owns the machine on its worker thread.
//!
//! Commands from the session arrive on a bounded channel. While running the
//! loop only looks at the channel when the session raises the attention flag
//! or a frame completes, so the per-instruction cost is one atomic load.
//! Paused and in the monitor, the loop blocks on the channel instead.
//!
//! Real-time pacing sleeps to absolute deadlines measured from the instant
//! the loop last synchronised, so time spent emulating never accumulates as
//! drift. More than one frame behind (a slow host, a debugger stop) and the
//! timeline restarts from now rather than racing to catch up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use format_d64::D64;

use crate::events::{MachineEvent, MachineEventSink};
use crate::machine::Machine;
use crate::monitor::{Monitor, MonitorAction};
use crate::resources::Resource;

/// Name of the worker thread.
pub const THREAD_NAME: &str = "c64-machine";

/// How long an idle loop waits for a command before rechecking warp.
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Frames after which the pacing timeline is rebased onto its last deadline.
const REBASE_FRAMES: u32 = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RunState {
    #[default]
    Stopped = 0,
    Running = 1,
    Paused = 2,
    WarpRunning = 3,
    InMonitor = 4,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Paused,
            3 => Self::WarpRunning,
            4 => Self::InMonitor,
            _ => Self::Stopped,
        }
    }
}

/// Flags the session and the worker both touch.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    state: AtomicU8,
    warp: AtomicBool,
    attention: AtomicBool,
}

impl Shared {
    pub(crate) fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: RunState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Flip the user warp flag, returning the new value.
    pub(crate) fn toggle_warp(&self) -> bool {
        !self.warp.fetch_xor(true, Ordering::AcqRel)
    }

    pub(crate) fn set_warp(&self, enabled: bool) {
        self.warp.store(enabled, Ordering::Release);
    }

    pub(crate) fn warp(&self) -> bool {
        self.warp.load(Ordering::Acquire)
    }

    /// Ask the worker to look at its queue at the next instruction boundary.
    pub(crate) fn notify(&self) {
        self.attention.store(true, Ordering::Release);
    }

    fn take_attention(&self) -> bool {
        self.attention.swap(false, Ordering::AcqRel)
    }
}

/// Requests queued by the session.
#[derive(Debug)]
pub(crate) enum Command {
    Pause,
    Resume,
    Reset { hard: bool },
    AttachDisk { drive: u8, disk: Box<D64> },
    DetachDisk { drive: u8 },
    Autostart(String),
    ActivateMonitor,
    MonitorLine(String),
    SetResource { resource: Resource, value: i64 },
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Running,
    Paused,
    InMonitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Where one instruction left the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Instruction,
    Frame,
    Suspended,
}

/// Absolute-deadline frame pacing.
struct Pacer {
    frame: Duration,
    start: Instant,
    frames: u32,
}

impl Pacer {
    fn new(frame: Duration) -> Self {
        Self {
            frame,
            start: Instant::now(),
            frames: 0,
        }
    }

    fn resync(&mut self) {
        self.start = Instant::now();
        self.frames = 0;
    }

    fn set_frame(&mut self, frame: Duration) {
        self.frame = frame;
        self.resync();
    }

    /// Sleep until the frame just emulated is due.
    fn wait_next_frame(&mut self) {
        self.frames += 1;
        let deadline = self.start + self.frame * self.frames;
        let now = Instant::now();
        if now > deadline + self.frame {
            log::debug!("{:?} behind real time, resynchronising", now - deadline);
            self.resync();
            return;
        }
        if self.frames == REBASE_FRAMES {
            self.start = deadline;
            self.frames = 0;
        }
        wait_until(deadline);
    }
}

/// Sleep for the bulk of the wait, then spin the last millisecond.
fn wait_until(deadline: Instant) {
    let now = Instant::now();
    if now >= deadline {
        return;
    }
    let remaining = deadline - now;
    if remaining > Duration::from_micros(1500) {
        thread::sleep(remaining - Duration::from_micros(1000));
    }
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

pub(crate) struct Scheduler {
    machine: Machine,
    monitor: Monitor,
    commands: Receiver<Command>,
    shared: Arc<Shared>,
    sink: Box<dyn MachineEventSink>,
    mode: Mode,
    /// Effective warp: the user flag or an autostart in progress.
    warp: bool,
    pacer: Pacer,
}

impl Scheduler {
    pub(crate) fn new(
        machine: Machine,
        commands: Receiver<Command>,
        shared: Arc<Shared>,
        sink: Box<dyn MachineEventSink>,
    ) -> Self {
        let frame = machine.standard().master_clock().frame_duration();
        Self {
            machine,
            monitor: Monitor::new(),
            commands,
            shared,
            sink,
            mode: Mode::Running,
            warp: false,
            pacer: Pacer::new(frame),
        }
    }

    /// Worker thread body. Returns once stopped or the session is gone.
    pub(crate) fn run(mut self) {
        log::info!("run loop started");
        self.mode = Mode::Running;
        self.refresh_warp();
        self.pacer.resync();
        self.publish();
        loop {
            let flow = match self.mode {
                Mode::Running => self.run_frame(),
                Mode::Paused | Mode::InMonitor => self.idle(),
            };
            if flow == Flow::Stop {
                break;
            }
        }
        self.finish();
    }

    /// Flush what is left and announce the stop. Also used for a session
    /// that is stopped without ever being started.
    pub(crate) fn finish(mut self) {
        self.shared.set_state(RunState::Stopped);
        self.forward_events();
        self.sink.on_event(MachineEvent::MachineStopped);
        log::info!("run loop stopped after {} frames", self.machine.frames());
    }

    /// Run instructions to the end of a frame, a command, or a monitor stop.
    fn run_frame(&mut self) -> Flow {
        loop {
            if self.shared.take_attention() {
                let flow = self.drain();
                self.forward_events();
                if flow == Flow::Stop || self.mode != Mode::Running {
                    return flow;
                }
            }
            match self.instruction() {
                Boundary::Instruction => {}
                Boundary::Suspended => return Flow::Continue,
                Boundary::Frame => {
                    let flow = self.drain();
                    self.refresh_warp();
                    self.forward_events();
                    if flow == Flow::Continue && self.mode == Mode::Running && !self.warp {
                        self.pacer.wait_next_frame();
                    }
                    return flow;
                }
            }
        }
    }

    fn instruction(&mut self) -> Boundary {
        if self.monitor.has_exec_checkpoints() && !self.machine.cpu().reset_pending() {
            let pc = self.machine.cpu().regs.pc;
            if let Some(number) = self.monitor.check_exec(pc) {
                self.enter_monitor(Some(format!("BREAK: {number}  C:${pc:04x}")));
                return Boundary::Suspended;
            }
        }

        let step = self.machine.step();
        let mut reason = step.jam.map(|jam| jam.to_string());
        if let Some(hit) = step.watch {
            reason = Some(self.monitor.record_watch(hit));
        }
        if reason.is_some() {
            self.enter_monitor(reason);
            Boundary::Suspended
        } else if step.frame_complete {
            Boundary::Frame
        } else {
            Boundary::Instruction
        }
    }

    /// Block briefly on the queue while nothing is running.
    fn idle(&mut self) -> Flow {
        let flow = match self.commands.recv_timeout(IDLE_POLL) {
            Ok(command) => {
                let flow = self.handle(command);
                if flow == Flow::Continue {
                    self.drain()
                } else {
                    flow
                }
            }
            Err(RecvTimeoutError::Timeout) => Flow::Continue,
            Err(RecvTimeoutError::Disconnected) => Flow::Stop,
        };
        self.shared.take_attention();
        self.refresh_warp();
        self.forward_events();
        flow
    }

    fn drain(&mut self) -> Flow {
        loop {
            match self.commands.try_recv() {
                Ok(command) => {
                    if self.handle(command) == Flow::Stop {
                        return Flow::Stop;
                    }
                }
                Err(TryRecvError::Empty) => return Flow::Continue,
                Err(TryRecvError::Disconnected) => {
                    log::debug!("session dropped its sender");
                    return Flow::Stop;
                }
            }
        }
    }

    fn handle(&mut self, command: Command) -> Flow {
        log::trace!("command {command:?}");
        match command {
            Command::Pause => {
                if self.mode == Mode::Running {
                    self.mode = Mode::Paused;
                }
            }
            Command::Resume => {
                if self.mode == Mode::Paused {
                    self.resume();
                }
            }
            Command::Reset { hard } => {
                self.machine.reset(hard);
                if self.monitor.is_active() {
                    self.monitor.leave(&self.machine);
                }
                self.resume();
            }
            Command::AttachDisk { drive, disk } => {
                if let Err(e) = self.machine.attach_disk(drive, *disk) {
                    self.diagnostic(format!("attach failed: {e}"));
                }
            }
            Command::DetachDisk { drive } => match self.machine.detach_disk(drive) {
                Ok(Some(disk)) => log::info!("drive {drive}: detached \"{}\"", disk.disk_name()),
                Ok(None) => {}
                Err(e) => self.diagnostic(format!("detach failed: {e}")),
            },
            Command::Autostart(target) => self.machine.arm_autostart(&target),
            Command::ActivateMonitor => {
                if self.mode != Mode::InMonitor {
                    self.enter_monitor(None);
                }
            }
            Command::MonitorLine(line) => {
                if self.mode == Mode::InMonitor {
                    if self.monitor.execute(&line, &mut self.machine) == MonitorAction::Resume {
                        self.resume();
                    }
                } else {
                    self.diagnostic("monitor is not active".into());
                }
            }
            Command::SetResource { resource, value } => {
                if resource == Resource::WarpMode {
                    self.shared.set_warp(value != 0);
                }
                match self.machine.apply_resource(resource, value) {
                    Ok(()) if resource == Resource::MachineVideoStandard => {
                        self.pacer
                            .set_frame(self.machine.standard().master_clock().frame_duration());
                    }
                    Ok(()) => {}
                    Err(e) => self.diagnostic(e.to_string()),
                }
            }
            Command::Stop => return Flow::Stop,
        }
        self.refresh_warp();
        self.publish();
        Flow::Continue
    }

    fn resume(&mut self) {
        self.mode = Mode::Running;
        self.pacer.resync();
    }

    fn enter_monitor(&mut self, reason: Option<String>) {
        log::debug!("entering monitor at ${:04X}", self.machine.cpu().regs.pc);
        self.mode = Mode::InMonitor;
        self.monitor.enter(&mut self.machine, reason.as_deref());
        self.publish();
        self.forward_events();
    }

    /// Pick up changes to the user warp flag or the autostart's wish for it.
    fn refresh_warp(&mut self) {
        let warp = self.shared.warp() || self.machine.autostart_wants_warp();
        if warp == self.warp {
            return;
        }
        self.warp = warp;
        log::info!("warp {}", if warp { "on" } else { "off" });
        let limit = warp.then(|| {
            let rate = self.machine.resources().get(Resource::SoundSampleRate) as usize;
            rate / self.machine.standard().mains_hz() as usize
        });
        self.machine.set_audio_limit(limit);
        if !warp {
            self.pacer.resync();
        }
        self.machine.push_event(MachineEvent::WarpChanged { enabled: warp });
        self.publish();
    }

    fn publish(&self) {
        let state = match self.mode {
            Mode::Running if self.warp => RunState::WarpRunning,
            Mode::Running => RunState::Running,
            Mode::Paused => RunState::Paused,
            Mode::InMonitor => RunState::InMonitor,
        };
        self.shared.set_state(state);
    }

    fn diagnostic(&mut self, text: String) {
        log::warn!("{text}");
        self.machine.push_event(MachineEvent::Diagnostic { text });
    }

    fn forward_events(&mut self) {
        for event in self.machine.take_events() {
            self.sink.on_event(event);
        }
    }
}
