//! CPU core trait.

use crate::Bus;

/// A CPU core that executes whole instructions.
///
/// `step` runs one instruction (or one interrupt entry sequence) and returns
/// the number of machine cycles the real part would have taken. The caller
/// advances the rest of the machine by that many cycles.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Execute one instruction against `bus` and return its cycle count.
    ///
    /// The bus is passed in, not owned, so it can be shared with the
    /// chipset between steps.
    fn step<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Returns the current program counter.
    fn pc(&self) -> u16;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Returns true if the CPU has stopped fetching instructions.
    fn is_halted(&self) -> bool;

    /// Drive the IRQ input. The line is level-sensitive.
    fn set_irq(&mut self, asserted: bool);

    /// Drive the NMI input. An interrupt fires on the falling edge.
    fn set_nmi(&mut self, asserted: bool);

    /// Pull the reset line. The vector is read on the next `step`.
    fn reset(&mut self);
}
