//! Commodore 64 with a 1541 disk drive, run on its own worker thread.
//!
//! The C64 master clock ticks at CPU cycle rate (985,248 Hz PAL). The
//! VIC-II, CIAs and SID tick once per CPU cycle and the 1541 catches up on
//! the same cycles after every instruction. One PAL frame is 312 raster
//! lines x 63 cycles = 19,656 cycles (~50.12 Hz).
//!
//! [`Machine`] is the deterministic core and can be driven directly. A
//! [`MachineSession`] owns one on a `c64-machine` thread, paces it to real
//! time, and reports back through a [`MachineEventSink`].

pub mod autostart;
pub mod bus;
#[cfg(feature = "screenshot")]
pub mod capture;
pub mod chipset;
pub mod config;
pub mod drive1541;
mod drive1541_bus;
mod error;
pub mod events;
pub mod host;
pub mod iec;
pub mod input;
pub mod machine;
pub mod memory;
pub mod monitor;
pub mod resources;
pub mod scheduler;
pub mod session;
pub mod vdrive;

pub use autostart::AutostartState;
pub use bus::C64Bus;
pub use config::{C64Model, MachineConfig, RomPaths, Roms};
pub use drive1541::Drive1541;
pub use error::MachineError;
pub use events::{ChannelSink, MachineEvent, MachineEventSink, RecordingSink};
pub use input::{C64Key, InputState};
pub use machine::{Machine, Step};
pub use monitor::{Monitor, MonitorState, MonitorSyntaxError};
pub use resources::{Resource, Resources};
pub use scheduler::RunState;
pub use session::MachineSession;
