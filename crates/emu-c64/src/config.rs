//! Machine configuration: model, ROM images, media and resource overrides.
//!
//! `MachineConfig` is what the host hands to a session, usually parsed from
//! a JSON file. `Roms` holds the validated ROM bytes the machine is built
//! from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mos_vic_ii::VideoStandard;
use serde::{Deserialize, Serialize};

use crate::error::MachineError;

pub const KERNAL_SIZE: usize = 8192;
pub const BASIC_SIZE: usize = 8192;
pub const CHARGEN_SIZE: usize = 4096;
pub const DOS1541_SIZE: usize = 16384;

/// C64 model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum C64Model {
    /// 6569 VIC-II, 985,248 Hz CPU.
    #[default]
    Pal,
    /// 6567R8 VIC-II, 1,022,727 Hz CPU.
    Ntsc,
}

impl C64Model {
    #[must_use]
    pub fn standard(self) -> VideoStandard {
        match self {
            Self::Pal => VideoStandard::Pal,
            Self::Ntsc => VideoStandard::Ntsc,
        }
    }

    /// Value of the `MachineVideoStandard` resource.
    #[must_use]
    pub fn resource_value(self) -> i64 {
        match self {
            Self::Pal => 1,
            Self::Ntsc => 2,
        }
    }

    #[must_use]
    pub fn from_resource_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Pal),
            2 => Some(Self::Ntsc),
            _ => None,
        }
    }
}

/// Where the ROM images live on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RomPaths {
    pub kernal: PathBuf,
    pub basic: PathBuf,
    pub chargen: PathBuf,
    /// Without a DOS ROM only the virtual drive is available.
    pub dos1541: Option<PathBuf>,
}

impl Default for RomPaths {
    fn default() -> Self {
        Self {
            kernal: PathBuf::from("roms/kernal.bin"),
            basic: PathBuf::from("roms/basic.bin"),
            chargen: PathBuf::from("roms/chargen.bin"),
            dos1541: Some(PathBuf::from("roms/dos1541.bin")),
        }
    }
}

/// Session configuration, as loaded from the host's JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub model: C64Model,
    pub roms: RomPaths,
    pub sample_rate: u32,
    /// Resource overrides applied after defaults, by VICE resource name.
    pub resources: BTreeMap<String, i64>,
    /// Disk images in the order `next_media` rotates through them.
    pub media: Vec<PathBuf>,
    /// Program to autostart from the first disk; `*` picks the first PRG.
    pub autostart: Option<String>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            model: C64Model::Pal,
            roms: RomPaths::default(),
            sample_rate: mos_sid_6581::DEFAULT_SAMPLE_RATE,
            resources: BTreeMap::new(),
            media: Vec::new(),
            autostart: None,
        }
    }
}

impl MachineConfig {
    /// Parse a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MachineError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, MachineError> {
        serde_json::from_str(text).map_err(|e| {
            MachineError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }
}

/// ROM images, size-checked. Only [`Roms::new`] and [`Roms::load`] build
/// one, so the memory map can index them without bounds surprises.
#[derive(Debug, Clone)]
pub struct Roms {
    pub(crate) kernal: Vec<u8>,
    pub(crate) basic: Vec<u8>,
    pub(crate) chargen: Vec<u8>,
    pub(crate) dos1541: Option<Vec<u8>>,
}

impl Roms {
    /// Build from bytes already in memory.
    pub fn new(
        kernal: Vec<u8>,
        basic: Vec<u8>,
        chargen: Vec<u8>,
        dos1541: Option<Vec<u8>>,
    ) -> Result<Self, MachineError> {
        check_size("KERNAL", &kernal, KERNAL_SIZE)?;
        check_size("BASIC", &basic, BASIC_SIZE)?;
        check_size("character", &chargen, CHARGEN_SIZE)?;
        if let Some(dos) = &dos1541 {
            check_size("1541 DOS", dos, DOS1541_SIZE)?;
        }
        Ok(Self {
            kernal,
            basic,
            chargen,
            dos1541,
        })
    }

    #[must_use]
    pub fn kernal(&self) -> &[u8] {
        &self.kernal
    }

    #[must_use]
    pub fn basic(&self) -> &[u8] {
        &self.basic
    }

    #[must_use]
    pub fn chargen(&self) -> &[u8] {
        &self.chargen
    }

    #[must_use]
    pub fn dos1541(&self) -> Option<&[u8]> {
        self.dos1541.as_deref()
    }

    /// Read every image named in `paths`. A missing DOS ROM is not an error.
    pub fn load(paths: &RomPaths) -> Result<Self, MachineError> {
        let read = |name: &str, path: &Path| {
            std::fs::read(path)
                .map_err(|e| MachineError::RomMissing(format!("{name} ({}): {e}", path.display())))
        };
        let kernal = read("KERNAL", &paths.kernal)?;
        let basic = read("BASIC", &paths.basic)?;
        let chargen = read("character", &paths.chargen)?;
        let dos1541 = match &paths.dos1541 {
            Some(path) => match std::fs::read(path) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    log::warn!(
                        "1541 DOS ROM {} unavailable ({e}); true drive emulation disabled",
                        path.display()
                    );
                    None
                }
            },
            None => None,
        };
        Self::new(kernal, basic, chargen, dos1541)
    }
}

fn check_size(name: &str, rom: &[u8], expected: usize) -> Result<(), MachineError> {
    if rom.len() == expected {
        Ok(())
    } else {
        Err(MachineError::RomMissing(format!(
            "{name} ROM must be {expected} bytes, got {}",
            rom.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = MachineConfig::default();
        assert_eq!(config.model, C64Model::Pal);
        assert_eq!(config.sample_rate, 44_100);
        assert!(config.media.is_empty());
        assert_eq!(config.autostart, None);
    }

    #[test]
    fn parses_partial_json() {
        let config = MachineConfig::from_json(
            r#"{
                "model": "ntsc",
                "media": ["games.d64"],
                "autostart": "GAME",
                "resources": { "WarpMode": 1 }
            }"#,
        )
        .expect("valid config");
        assert_eq!(config.model, C64Model::Ntsc);
        assert_eq!(config.media, vec![PathBuf::from("games.d64")]);
        assert_eq!(config.autostart.as_deref(), Some("GAME"));
        assert_eq!(config.resources.get("WarpMode"), Some(&1));
        assert_eq!(config.roms, RomPaths::default());
    }

    #[test]
    fn rejects_bad_json() {
        assert!(matches!(
            MachineConfig::from_json("{ \"model\": \"secam\" }"),
            Err(MachineError::Io(_))
        ));
    }

    #[test]
    fn rom_sizes_are_checked() {
        let ok = Roms::new(vec![0; 8192], vec![0; 8192], vec![0; 4096], None);
        assert!(ok.is_ok());
        let bad = Roms::new(vec![0; 100], vec![0; 8192], vec![0; 4096], None);
        assert!(matches!(bad, Err(MachineError::RomMissing(_))));
        let bad_dos = Roms::new(vec![0; 8192], vec![0; 8192], vec![0; 4096], Some(vec![0; 10]));
        assert!(matches!(bad_dos, Err(MachineError::RomMissing(_))));
    }

    #[test]
    fn short_kernal_is_refused() {
        let err = Roms::new(vec![0; 4096], vec![0; 8192], vec![0; 4096], None)
            .expect_err("half a KERNAL");
        assert_eq!(err.to_string(), "ROM missing: KERNAL ROM must be 8192 bytes, got 4096");
    }

    #[test]
    fn accessors_expose_checked_images() {
        let roms = Roms::new(vec![1; 8192], vec![2; 8192], vec![3; 4096], Some(vec![4; 16384]))
            .expect("sizes match");
        assert_eq!(roms.kernal()[8191], 1);
        assert_eq!(roms.basic().len(), 8192);
        assert_eq!(roms.chargen()[0], 3);
        assert_eq!(roms.dos1541().map(<[u8]>::len), Some(16384));
    }

    #[test]
    fn video_standard_resource_values() {
        assert_eq!(C64Model::from_resource_value(1), Some(C64Model::Pal));
        assert_eq!(C64Model::from_resource_value(2), Some(C64Model::Ntsc));
        assert_eq!(C64Model::from_resource_value(3), None);
        assert_eq!(C64Model::Ntsc.standard(), VideoStandard::Ntsc);
    }
}
