//! Typed resource table, addressed by VICE resource names.
//!
//! Every resource is an integer with an inclusive range; booleans are 0/1.
//! The host validates a change with [`Resources::validate`] before it is
//! queued, so a bad name or value is reported synchronously.

use std::fmt;
use std::ops::RangeInclusive;

use mos_vic_ii::{BLUR_MAX, COLOUR_MAX, ColourAdjust, NEUTRAL};

use crate::error::MachineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    ColorSaturation,
    ColorContrast,
    ColorBrightness,
    ColorGamma,
    PalBlur,
    WarpMode,
    DriveTrueEmulation,
    VirtualDevices,
    AutostartWarp,
    /// Frames to wait before injecting; 0 means two seconds' worth.
    AutostartDelay,
    /// 0 = 6581, 1 = 8580.
    SidModel,
    SoundSampleRate,
    /// 1 = PAL, 2 = NTSC.
    MachineVideoStandard,
}

impl Resource {
    pub const ALL: [Self; 13] = [
        Self::ColorSaturation,
        Self::ColorContrast,
        Self::ColorBrightness,
        Self::ColorGamma,
        Self::PalBlur,
        Self::WarpMode,
        Self::DriveTrueEmulation,
        Self::VirtualDevices,
        Self::AutostartWarp,
        Self::AutostartDelay,
        Self::SidModel,
        Self::SoundSampleRate,
        Self::MachineVideoStandard,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ColorSaturation => "VICIIColorSaturation",
            Self::ColorContrast => "VICIIColorContrast",
            Self::ColorBrightness => "VICIIColorBrightness",
            Self::ColorGamma => "VICIIColorGamma",
            Self::PalBlur => "VICIIPALBlur",
            Self::WarpMode => "WarpMode",
            Self::DriveTrueEmulation => "DriveTrueEmulation",
            Self::VirtualDevices => "VirtualDevices",
            Self::AutostartWarp => "AutostartWarp",
            Self::AutostartDelay => "AutostartDelay",
            Self::SidModel => "SidModel",
            Self::SoundSampleRate => "SoundSampleRate",
            Self::MachineVideoStandard => "MachineVideoStandard",
        }
    }

    /// Case-insensitive, as VICE treats resource names.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn range(self) -> RangeInclusive<i64> {
        match self {
            Self::ColorSaturation | Self::ColorContrast | Self::ColorBrightness | Self::ColorGamma => {
                0..=i64::from(COLOUR_MAX)
            }
            Self::PalBlur => 0..=i64::from(BLUR_MAX),
            Self::WarpMode | Self::DriveTrueEmulation | Self::VirtualDevices | Self::AutostartWarp
            | Self::SidModel => 0..=1,
            Self::AutostartDelay => 0..=1000,
            Self::SoundSampleRate => 8000..=192_000,
            Self::MachineVideoStandard => 1..=2,
        }
    }

    #[must_use]
    pub fn default_value(self) -> i64 {
        match self {
            Self::ColorSaturation | Self::ColorContrast | Self::ColorBrightness | Self::ColorGamma => {
                i64::from(NEUTRAL)
            }
            Self::PalBlur
            | Self::WarpMode
            | Self::VirtualDevices
            | Self::AutostartDelay
            | Self::SidModel => 0,
            Self::DriveTrueEmulation | Self::AutostartWarp | Self::MachineVideoStandard => 1,
            Self::SoundSampleRate => i64::from(mos_sid_6581::DEFAULT_SAMPLE_RATE),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resources {
    values: [i64; Resource::ALL.len()],
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            values: Resource::ALL.map(Resource::default_value),
        }
    }
}

impl Resources {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a name/value pair without applying it.
    pub fn validate(name: &str, value: i64) -> Result<Resource, MachineError> {
        let resource =
            Resource::from_name(name).ok_or_else(|| MachineError::UnknownResource(name.to_string()))?;
        if resource.range().contains(&value) {
            Ok(resource)
        } else {
            Err(MachineError::InvalidResourceValue {
                name: resource.name().to_string(),
                value: value.to_string(),
            })
        }
    }

    #[must_use]
    pub fn get(&self, resource: Resource) -> i64 {
        self.values[resource as usize]
    }

    #[must_use]
    pub fn flag(&self, resource: Resource) -> bool {
        self.get(resource) != 0
    }

    /// Store a value already checked against the resource's range.
    /// Returns true when it changed.
    pub fn store(&mut self, resource: Resource, value: i64) -> bool {
        debug_assert!(resource.range().contains(&value));
        std::mem::replace(&mut self.values[resource as usize], value) != value
    }

    pub fn set(&mut self, name: &str, value: i64) -> Result<Resource, MachineError> {
        let resource = Self::validate(name, value)?;
        self.store(resource, value);
        Ok(resource)
    }

    /// The four colour resources as a palette adjustment.
    #[must_use]
    pub fn colour_adjust(&self) -> ColourAdjust {
        let get = |r| self.get(r) as u16;
        ColourAdjust {
            saturation: get(Resource::ColorSaturation),
            contrast: get(Resource::ColorContrast),
            brightness: get(Resource::ColorBrightness),
            gamma: get(Resource::ColorGamma),
        }
    }

    /// Every resource with its current value, in table order.
    pub fn iter(&self) -> impl Iterator<Item = (Resource, i64)> + '_ {
        Resource::ALL.into_iter().map(|r| (r, self.get(r)))
    }
}
