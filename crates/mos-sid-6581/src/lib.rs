//! MOS 6581/8580 SID (Sound Interface Device).
//!
//! Three voices, each with a 24-bit oscillator, four waveforms and an ADSR
//! envelope, share a multi-mode filter and a 4-bit master volume. The chip
//! is clocked at the CPU rate and feeds an [`AudioStream`] that resamples to
//! the host rate.
//!
//! # Register map ($D400-$D41C)
//!
//! | Addr    | Register                    |
//! |---------|-----------------------------|
//! | $00-$06 | Voice 1: freq, PW, control, AD, SR |
//! | $07-$0D | Voice 2                     |
//! | $0E-$14 | Voice 3                     |
//! | $15-$16 | Filter cutoff (11 bits)     |
//! | $17     | Resonance + filter routing  |
//! | $18     | Filter mode + volume        |
//! | $19-$1A | Paddles (read-only)         |
//! | $1B     | OSC3 (read-only)            |
//! | $1C     | ENV3 (read-only)            |

mod envelope;
mod filter;
mod stream;
mod voice;

pub use envelope::{Envelope, Phase, RATE_PERIODS};
pub use filter::Filter;
pub use stream::{AudioStream, DEFAULT_SAMPLE_RATE};
pub use voice::{control, Voice};

use emu_core::{Observable, Tickable, Value};

/// SID revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SidModel {
    #[default]
    Mos6581,
    Mos8580,
}

impl SidModel {
    /// Numeric form used by the `SidModel` resource: 0 = 6581, 1 = 8580.
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Mos6581),
            1 => Some(Self::Mos8580),
            _ => None,
        }
    }

    #[must_use]
    pub fn index(self) -> u8 {
        match self {
            Self::Mos6581 => 0,
            Self::Mos8580 => 1,
        }
    }
}

/// Modulation source for voice `n`: sync and ring both use the previous voice.
const fn source(voice: usize) -> usize {
    (voice + 2) % 3
}

/// Full-scale mix of three voices.
const MIX_SCALE: f32 = 3.0 * 2048.0;

pub struct Sid {
    model: SidModel,
    pub voices: [Voice; 3],
    pub envelopes: [Envelope; 3],
    pub filter: Filter,
    volume: u8,
    voice3_off: bool,
    /// Last byte written; write-only registers read back as this.
    bus_value: u8,
    stream: AudioStream,
}

impl Sid {
    /// `clock_hz` is the CPU clock, `sample_rate` the host audio rate.
    #[must_use]
    pub fn new(model: SidModel, clock_hz: u64, sample_rate: u32) -> Self {
        Self {
            model,
            voices: [Voice::new(), Voice::new(), Voice::new()],
            envelopes: [Envelope::new(), Envelope::new(), Envelope::new()],
            filter: Filter::new(model),
            volume: 0,
            voice3_off: false,
            bus_value: 0,
            stream: AudioStream::new(clock_hz, sample_rate),
        }
    }

    #[must_use]
    pub fn model(&self) -> SidModel {
        self.model
    }

    pub fn set_model(&mut self, model: SidModel) {
        self.model = model;
        self.filter.set_model(model);
    }

    /// Silence all registers and restart the audio stream.
    pub fn reset(&mut self) {
        self.voices = [Voice::new(), Voice::new(), Voice::new()];
        self.envelopes = [Envelope::new(), Envelope::new(), Envelope::new()];
        self.filter = Filter::new(self.model);
        self.volume = 0;
        self.voice3_off = false;
        self.bus_value = 0;
        self.stream.restart();
    }

    #[must_use]
    pub fn audio(&self) -> &AudioStream {
        &self.stream
    }

    pub fn audio_mut(&mut self) -> &mut AudioStream {
        &mut self.stream
    }

    /// Read a register. Only the paddles, OSC3 and ENV3 are readable.
    #[must_use]
    pub fn read(&self, reg: u8) -> u8 {
        match reg & 0x1F {
            // No paddles attached: the POT lines float high.
            0x19 | 0x1A => 0xFF,
            0x1B => (self.voices[2].output(self.voices[1].msb()) >> 4) as u8,
            0x1C => self.envelopes[2].level,
            _ => self.bus_value,
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        let reg = reg & 0x1F;
        self.bus_value = value;
        if reg < 0x15 {
            let n = usize::from(reg / 7);
            let voice = &mut self.voices[n];
            match reg % 7 {
                0 => voice.frequency = (voice.frequency & 0xFF00) | u16::from(value),
                1 => voice.frequency = (voice.frequency & 0x00FF) | (u16::from(value) << 8),
                2 => voice.pulse_width = (voice.pulse_width & 0x0F00) | u16::from(value),
                3 => {
                    voice.pulse_width = (voice.pulse_width & 0x00FF) | (u16::from(value & 0x0F) << 8);
                }
                4 => voice.control = value,
                5 => self.envelopes[n].attack_decay = value,
                _ => self.envelopes[n].sustain_release = value,
            }
            return;
        }
        match reg {
            0x15 => self.filter.cutoff = (self.filter.cutoff & 0x07F8) | u16::from(value & 0x07),
            0x16 => self.filter.cutoff = (self.filter.cutoff & 0x0007) | (u16::from(value) << 3),
            0x17 => self.filter.res_filt = value,
            0x18 => {
                self.volume = value & 0x0F;
                self.filter.mode = value & 0x70;
                self.voice3_off = value & 0x80 != 0;
            }
            _ => {}
        }
    }

    /// Mixed output of the current cycle, roughly -1.0..1.0.
    fn mix(&mut self) -> f32 {
        let mut direct = 0.0;
        let mut filtered = 0.0;
        for n in 0..3 {
            let wave = self.voices[n].output(self.voices[source(n)].msb());
            let amplitude =
                (f32::from(wave) - 2048.0) * f32::from(self.envelopes[n].level) / 255.0;
            if self.filter.routes(n) {
                filtered += amplitude;
            } else if !(n == 2 && self.voice3_off) {
                direct += amplitude;
            }
        }
        let out = self.filter.clock(filtered) + direct;
        out * f32::from(self.volume) / 15.0 / MIX_SCALE
    }
}

impl Default for Sid {
    fn default() -> Self {
        Self::new(SidModel::Mos6581, 985_248, DEFAULT_SAMPLE_RATE)
    }
}

impl Tickable for Sid {
    fn tick(&mut self) {
        for voice in &mut self.voices {
            voice.clock();
        }
        for n in 0..3 {
            if self.voices[n].control & control::SYNC != 0 && self.voices[source(n)].msb_rose() {
                self.voices[n].sync();
            }
        }
        for (env, voice) in self.envelopes.iter_mut().zip(&self.voices) {
            env.clock(voice.gate());
        }
        let sample = self.mix();
        self.stream.push_cycle(sample);
    }
}

const QUERY_PATHS: &[&str] = &[
    "model",
    "volume",
    "cutoff",
    "res_filt",
    "voice1.frequency",
    "voice1.control",
    "voice1.envelope",
    "voice2.frequency",
    "voice2.control",
    "voice2.envelope",
    "voice3.frequency",
    "voice3.control",
    "voice3.envelope",
    "audio.queued",
    "audio.dropped",
];

impl Observable for Sid {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some((voice, field)) = path.split_once('.') {
            let n = match voice {
                "voice1" => 0,
                "voice2" => 1,
                "voice3" => 2,
                "audio" => {
                    return match field {
                        "queued" => Some(Value::U64(self.stream.len() as u64)),
                        "dropped" => Some(self.stream.dropped().into()),
                        _ => None,
                    };
                }
                _ => return None,
            };
            return match field {
                "frequency" => Some(self.voices[n].frequency.into()),
                "control" => Some(self.voices[n].control.into()),
                "envelope" => Some(self.envelopes[n].level.into()),
                _ => None,
            };
        }
        Some(match path {
            "model" => match self.model {
                SidModel::Mos6581 => "6581".into(),
                SidModel::Mos8580 => "8580".into(),
            },
            "volume" => self.volume.into(),
            "cutoff" => self.filter.cutoff.into(),
            "res_filt" => self.filter.res_filt.into(),
            _ => return None,
        })
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::Ticks;

    /// Voice 1 sawtooth with instant attack and full sustain.
    fn sawtooth_sid(frequency: u16) -> Sid {
        let mut sid = Sid::default();
        sid.write(0x00, frequency as u8);
        sid.write(0x01, (frequency >> 8) as u8);
        sid.write(0x05, 0x00);
        sid.write(0x06, 0xF0);
        sid.write(0x04, control::SAWTOOTH | control::GATE);
        sid.write(0x18, 0x0F);
        sid
    }

    #[test]
    fn silent_without_volume() {
        let mut sid = Sid::default();
        sid.tick_n(Ticks::new(19_656));
        let samples = sid.audio_mut().drain_all();
        assert!(!samples.is_empty());
        assert!(samples.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn sawtooth_swings_both_ways() {
        // 440 Hz at the PAL clock.
        let mut sid = sawtooth_sid(7479);
        sid.tick_n(Ticks::new(40_000));
        let samples = sid.audio_mut().drain_all();
        assert!(samples.len() > 1000);
        assert!(samples.iter().any(|&s| s > 0.01));
        assert!(samples.iter().any(|&s| s < -0.01));
    }

    #[test]
    fn filter_attenuates_routed_voice() {
        let rms = |filtered: bool| {
            let mut sid = sawtooth_sid(0xFFFF);
            if filtered {
                sid.write(0x16, 0x00);
                sid.write(0x17, 0x01);
                sid.write(0x18, 0x1F);
            }
            sid.tick_n(Ticks::new(60_000));
            let samples = sid.audio_mut().drain_all();
            let settled = &samples[200..];
            (settled.iter().map(|s| s * s).sum::<f32>() / settled.len() as f32).sqrt()
        };
        let direct = rms(false);
        let filtered = rms(true);
        assert!(filtered < direct * 0.8, "filtered {filtered}, direct {direct}");
    }

    #[test]
    fn osc3_and_env3_are_readable() {
        let mut sid = Sid::default();
        sid.write(0x0E, 0xFF);
        sid.write(0x0F, 0xFF);
        sid.write(0x13, 0x00);
        sid.write(0x14, 0xF0);
        sid.write(0x12, control::SAWTOOTH | control::GATE);
        sid.tick_n(Ticks::new(3000));
        assert_ne!(sid.read(0x1B), 0);
        assert_eq!(sid.read(0x1C), 0xFF);
    }

    #[test]
    fn write_only_registers_read_last_write() {
        let mut sid = Sid::default();
        sid.write(0x04, 0x41);
        assert_eq!(sid.read(0x04), 0x41);
        assert_eq!(sid.read(0x19), 0xFF);
    }

    #[test]
    fn hard_sync_resets_slave() {
        let mut sid = Sid::default();
        sid.voices[0].frequency = 0x0100;
        sid.voices[0].control = control::SYNC;
        sid.voices[2].frequency = 0x8000;
        sid.voices[2].accumulator = 0x007F_FFFF;
        sid.voices[0].accumulator = 0x0010_0000;
        sid.tick();
        assert_eq!(sid.voices[0].accumulator, 0);
    }

    #[test]
    fn reset_restarts_stream() {
        let mut sid = sawtooth_sid(1000);
        sid.tick_n(Ticks::new(1000));
        assert!(!sid.audio().is_empty());
        sid.reset();
        assert!(sid.audio().is_empty());
        assert_eq!(sid.query("volume"), Some(Value::U8(0)));
    }

    #[test]
    fn model_switch() {
        let mut sid = Sid::default();
        sid.set_model(SidModel::Mos8580);
        assert_eq!(sid.query("model"), Some(Value::String("8580".into())));
        assert_eq!(SidModel::from_index(1), Some(SidModel::Mos8580));
        assert_eq!(SidModel::from_index(2), None);
    }
}
