//! Master clock configuration and the wall-clock mapping.

use std::time::Duration;

use crate::Ticks;

/// Machine clock of a video standard.
///
/// Holds the CPU frequency and the number of cycles in one video frame.
/// The scheduler uses it to turn emulated cycles into wall-clock deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// CPU clock in Hz (985,248 for a PAL C64).
    pub frequency_hz: u64,
    /// Cycles in one complete video frame.
    pub cycles_per_frame: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64, cycles_per_frame: u64) -> Self {
        Self {
            frequency_hz,
            cycles_per_frame,
        }
    }

    /// Cycles per frame as `Ticks`.
    #[must_use]
    pub const fn ticks_per_frame(&self) -> Ticks {
        Ticks::new(self.cycles_per_frame)
    }

    /// Wall-clock length of one frame.
    #[must_use]
    pub fn frame_duration(&self) -> Duration {
        self.duration_of(Ticks::new(self.cycles_per_frame))
    }

    /// Wall-clock time the real machine takes to run `ticks` cycles.
    #[must_use]
    pub fn duration_of(&self, ticks: Ticks) -> Duration {
        let nanos = u128::from(ticks.get()) * 1_000_000_000 / u128::from(self.frequency_hz.max(1));
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Frames per second, as a float for display.
    #[must_use]
    pub fn frame_rate(&self) -> f64 {
        self.frequency_hz as f64 / self.cycles_per_frame.max(1) as f64
    }
}
