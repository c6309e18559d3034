//! Core traits and types for the C64 machine core.
//!
//! Every chip in the workspace is driven by the same machine cycle. The CPU
//! reports how many cycles an instruction took and the rest of the machine
//! is ticked that many times.

mod bus;
mod clock;
mod cpu;
mod observable;
mod tickable;
mod ticks;

pub use bus::{Bus, SimpleBus};
pub use clock::MasterClock;
pub use cpu::Cpu;
pub use observable::{Observable, Value};
pub use tickable::Tickable;
pub use ticks::Ticks;
