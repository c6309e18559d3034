//! State-variable multi-mode filter.
//!
//! Two integrators in a loop give simultaneous low-, band- and high-pass
//! outputs; $D418 bits 4-6 pick which are summed. The 6581 has a bent
//! cutoff curve with a high floor and strong resonance, the 8580 a wider
//! and more linear one.

use crate::SidModel;

#[derive(Debug, Clone)]
pub struct Filter {
    model: SidModel,
    low: f32,
    band: f32,
    /// 11-bit cutoff.
    pub cutoff: u16,
    /// Resonance (bits 4-7) and voice routing (bits 0-3), as in $D417.
    pub res_filt: u8,
    /// Mode bits from $D418 (0x10 LP, 0x20 BP, 0x40 HP).
    pub mode: u8,
}

impl Filter {
    #[must_use]
    pub fn new(model: SidModel) -> Self {
        Self {
            model,
            low: 0.0,
            band: 0.0,
            cutoff: 0,
            res_filt: 0,
            mode: 0,
        }
    }

    pub fn set_model(&mut self, model: SidModel) {
        self.model = model;
    }

    /// Clear integrator state.
    pub fn reset(&mut self) {
        self.low = 0.0;
        self.band = 0.0;
    }

    /// True when voice `n` (0-2) is routed through the filter.
    #[must_use]
    pub fn routes(&self, voice: usize) -> bool {
        self.res_filt & (1 << voice) != 0
    }

    fn cutoff_coefficient(&self) -> f32 {
        let x = f32::from(self.cutoff) / 2047.0;
        match self.model {
            SidModel::Mos6581 => (0.003 + 0.02 * x + 0.33 * x * x).clamp(0.002, 0.36),
            SidModel::Mos8580 => 0.001 + 0.549 * x,
        }
    }

    /// Damping term: higher resonance means less damping.
    fn damping(&self) -> f32 {
        let r = f32::from(self.res_filt >> 4) / 15.0;
        match self.model {
            SidModel::Mos6581 => 1.4 - r * 1.1,
            SidModel::Mos8580 => 1.4 - r * 0.8,
        }
    }

    /// Run one sample through the filter, returning the selected outputs.
    pub fn clock(&mut self, input: f32) -> f32 {
        let f = self.cutoff_coefficient();
        let high = input - self.low - self.damping() * self.band;
        self.band += f * high;
        self.low += f * self.band;

        let mut out = 0.0;
        if self.mode & 0x10 != 0 {
            out += self.low;
        }
        if self.mode & 0x20 != 0 {
            out += self.band;
        }
        if self.mode & 0x40 != 0 {
            out += high;
        }
        out
    }
}
