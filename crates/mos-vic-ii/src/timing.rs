//! Raster geometry of the PAL 6569 and NTSC 6567R8.

use emu_core::MasterClock;

/// Video standard, selecting the VIC-II revision and the CPU clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoStandard {
    #[default]
    Pal,
    Ntsc,
}

impl VideoStandard {
    /// Raster lines per frame.
    #[must_use]
    pub const fn lines_per_frame(self) -> u16 {
        match self {
            Self::Pal => 312,
            Self::Ntsc => 263,
        }
    }

    /// CPU cycles per raster line.
    #[must_use]
    pub const fn cycles_per_line(self) -> u8 {
        match self {
            Self::Pal => 63,
            Self::Ntsc => 65,
        }
    }

    #[must_use]
    pub const fn cycles_per_frame(self) -> u32 {
        self.lines_per_frame() as u32 * self.cycles_per_line() as u32
    }

    /// CPU clock in Hz.
    #[must_use]
    pub const fn clock_hz(self) -> u64 {
        match self {
            Self::Pal => 985_248,
            Self::Ntsc => 1_022_727,
        }
    }

    #[must_use]
    pub const fn master_clock(self) -> MasterClock {
        MasterClock::new(self.clock_hz(), self.cycles_per_frame() as u64)
    }

    /// First raster line copied into the framebuffer.
    #[must_use]
    pub const fn first_visible_line(self) -> u16 {
        match self {
            Self::Pal => 6,
            Self::Ntsc => 14,
        }
    }

    /// Last raster line copied into the framebuffer (exclusive).
    #[must_use]
    pub const fn last_visible_line(self) -> u16 {
        match self {
            Self::Pal => 290,
            Self::Ntsc => 261,
        }
    }

    #[must_use]
    pub const fn visible_lines(self) -> u16 {
        self.last_visible_line() - self.first_visible_line()
    }

    /// Cycle in which sprite 0's DMA begins; each sprite takes two.
    #[must_use]
    pub const fn sprite_dma_cycle(self) -> u8 {
        match self {
            Self::Pal => 58,
            Self::Ntsc => 60,
        }
    }

    /// Mains frequency that drives the CIA time-of-day clocks.
    #[must_use]
    pub const fn mains_hz(self) -> u32 {
        match self {
            Self::Pal => 50,
            Self::Ntsc => 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pal_frame() {
        assert_eq!(VideoStandard::Pal.cycles_per_frame(), 19_656);
        assert_eq!(VideoStandard::Pal.visible_lines(), 284);
    }

    #[test]
    fn ntsc_frame() {
        assert_eq!(VideoStandard::Ntsc.cycles_per_frame(), 17_095);
        let fps = VideoStandard::Ntsc.master_clock().frame_rate();
        assert!((fps - 59.83).abs() < 0.01, "{fps}");
    }
}
