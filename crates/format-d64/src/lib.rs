//! D64 disk image parser.
//!
//! A D64 image is a sector dump of a 1541 disk with variable sectors per
//! track:
//!   Tracks  1-17: 21 sectors
//!   Tracks 18-24: 19 sectors
//!   Tracks 25-30: 18 sectors
//!   Tracks 31-40: 17 sectors
//!
//! 35 tracks make 683 sectors x 256 bytes = 174,848 bytes. Images may carry
//! one error byte per sector after the data (175,531 bytes), and extended
//! images have 40 tracks (196,608 / 197,376 bytes).
//!
//! Track 18 holds the BAM (sector 0) and the directory (from sector 1).

mod bam;
mod directory;

use std::fmt;
use std::path::Path;

pub use directory::{DirEntry, FileType};

/// Bytes per sector.
pub const SECTOR_SIZE: usize = 256;
/// 35 tracks, no error table.
pub const D64_SIZE: usize = 174_848;
/// 35 tracks with one error byte per sector.
pub const D64_SIZE_WITH_ERRORS: usize = 175_531;
/// 40 tracks, no error table.
pub const D64_SIZE_40: usize = 196_608;
/// 40 tracks with one error byte per sector.
pub const D64_SIZE_40_WITH_ERRORS: usize = 197_376;

/// Directory and BAM track.
pub const DIRECTORY_TRACK: u8 = 18;

const MAX_TRACKS: usize = 40;

/// Sectors per track, indexed by track number (1-based, so index 0 is unused).
const SECTORS_PER_TRACK: [u8; MAX_TRACKS + 1] = [
    0, // track 0 doesn't exist
    21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, // 1-17
    19, 19, 19, 19, 19, 19, 19, // 18-24
    18, 18, 18, 18, 18, 18, // 25-30
    17, 17, 17, 17, 17, 17, 17, 17, 17, 17, // 31-40
];

/// Index of the first sector of each track (1-indexed).
const TRACK_FIRST_SECTOR: [usize; MAX_TRACKS + 1] = {
    let mut firsts = [0usize; MAX_TRACKS + 1];
    let mut track = 1;
    let mut index = 0;
    while track <= MAX_TRACKS {
        firsts[track] = index;
        index += SECTORS_PER_TRACK[track] as usize;
        track += 1;
    }
    firsts
};

#[derive(Debug)]
pub enum D64Error {
    /// Wrong size, broken BAM link or a corrupt sector chain.
    InvalidImageFormat(String),
    FileNotFound(String),
    FileExists(String),
    DiskFull,
    InvalidSector { track: u8, sector: u8 },
    Io(std::io::Error),
}

impl fmt::Display for D64Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidImageFormat(reason) => write!(f, "invalid D64 image: {reason}"),
            Self::FileNotFound(name) => write!(f, "file not found: {name}"),
            Self::FileExists(name) => write!(f, "file exists: {name}"),
            Self::DiskFull => write!(f, "disk full"),
            Self::InvalidSector { track, sector } => {
                write!(f, "illegal track or sector: {track}/{sector}")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for D64Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for D64Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// A parsed D64 disk image.
#[derive(Debug, Clone)]
pub struct D64 {
    /// Sector data followed by the error table, if the image has one.
    data: Vec<u8>,
    tracks: u8,
    has_errors: bool,
    modified: bool,
}

impl D64 {
    /// Parse a D64 image from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, D64Error> {
        let (tracks, has_errors) = match data.len() {
            D64_SIZE => (35, false),
            D64_SIZE_WITH_ERRORS => (35, true),
            D64_SIZE_40 => (40, false),
            D64_SIZE_40_WITH_ERRORS => (40, true),
            other => {
                return Err(D64Error::InvalidImageFormat(format!(
                    "{other} bytes (expected {D64_SIZE}, {D64_SIZE_WITH_ERRORS}, \
                     {D64_SIZE_40} or {D64_SIZE_40_WITH_ERRORS})"
                )));
            }
        };
        let image = Self {
            data: data.to_vec(),
            tracks,
            has_errors,
            modified: false,
        };
        image.check_bam_link()?;
        Ok(image)
    }

    /// Read an image from disk.
    pub fn mount(path: impl AsRef<Path>) -> Result<Self, D64Error> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let image = Self::from_bytes(&bytes)?;
        log::info!("mounted {} ({} tracks)", path.display(), image.tracks);
        Ok(image)
    }

    /// A freshly formatted 35-track disk, as `NEW"name,id"` leaves it.
    #[must_use]
    pub fn blank(name: &str, id: [u8; 2]) -> Self {
        let mut image = Self {
            data: vec![0; D64_SIZE],
            tracks: 35,
            has_errors: false,
            modified: false,
        };
        image.format_bam(name, id);
        image
    }

    /// The BAM's first bytes link to the first directory sector; a link that
    /// points off the disk means the image is not a 1541 disk.
    fn check_bam_link(&self) -> Result<(), D64Error> {
        let bam = self.sector(DIRECTORY_TRACK, 0);
        let (track, sector) = (bam[0], bam[1]);
        if track != 0 && self.sector_offset(track, sector).is_none() {
            return Err(D64Error::InvalidImageFormat(format!(
                "BAM links to {track}/{sector}"
            )));
        }
        Ok(())
    }

    /// Number of tracks (35 or 40).
    #[must_use]
    pub fn tracks(&self) -> u8 {
        self.tracks
    }

    /// Number of sectors on a given track (1-40).
    ///
    /// Returns 0 for invalid track numbers.
    #[must_use]
    pub fn sectors_per_track(track: u8) -> u8 {
        SECTORS_PER_TRACK
            .get(usize::from(track))
            .copied()
            .unwrap_or(0)
    }

    fn sector_index(&self, track: u8, sector: u8) -> Option<usize> {
        if track == 0 || track > self.tracks || sector >= Self::sectors_per_track(track) {
            return None;
        }
        Some(TRACK_FIRST_SECTOR[usize::from(track)] + usize::from(sector))
    }

    /// Byte offset of a given sector within the image.
    #[must_use]
    pub fn sector_offset(&self, track: u8, sector: u8) -> Option<usize> {
        self.sector_index(track, sector).map(|i| i * SECTOR_SIZE)
    }

    /// Read a 256-byte sector, or `None` for an invalid track/sector.
    #[must_use]
    pub fn read_sector(&self, track: u8, sector: u8) -> Option<&[u8]> {
        let offset = self.sector_offset(track, sector)?;
        Some(&self.data[offset..offset + SECTOR_SIZE])
    }

    /// Internal access for sectors known to exist (track 18 and BAM-derived).
    fn sector(&self, track: u8, sector: u8) -> &[u8] {
        let offset = self
            .sector_offset(track, sector)
            .unwrap_or(TRACK_FIRST_SECTOR[usize::from(DIRECTORY_TRACK)] * SECTOR_SIZE);
        &self.data[offset..offset + SECTOR_SIZE]
    }

    /// Write 256 bytes to a sector.
    pub fn write_sector(&mut self, track: u8, sector: u8, data: &[u8]) -> Result<(), D64Error> {
        let offset = self
            .sector_offset(track, sector)
            .filter(|_| data.len() == SECTOR_SIZE)
            .ok_or(D64Error::InvalidSector { track, sector })?;
        let target = &mut self.data[offset..offset + SECTOR_SIZE];
        if target != data {
            target.copy_from_slice(data);
            self.modified = true;
        }
        Ok(())
    }

    /// Error code recorded for a sector (1 = OK), if the image has an error table.
    #[must_use]
    pub fn sector_error(&self, track: u8, sector: u8) -> Option<u8> {
        if !self.has_errors {
            return None;
        }
        let index = self.sector_index(track, sector)?;
        let table = TRACK_FIRST_SECTOR[usize::from(self.tracks)]
            + usize::from(Self::sectors_per_track(self.tracks));
        self.data.get(table * SECTOR_SIZE + index).copied()
    }

    /// Disk ID from the BAM (bytes $A2-$A3).
    #[must_use]
    pub fn disk_id(&self) -> [u8; 2] {
        let bam = self.sector(DIRECTORY_TRACK, 0);
        [bam[0xA2], bam[0xA3]]
    }

    /// Disk name from the BAM, with the $A0 padding stripped.
    #[must_use]
    pub fn disk_name(&self) -> String {
        let bam = self.sector(DIRECTORY_TRACK, 0);
        directory::petscii_to_string(&bam[0x90..0xA0])
    }

    /// Disk name as stored, padding included, for directory headers.
    #[must_use]
    pub fn disk_name_raw(&self) -> [u8; 16] {
        let mut name = [0xA0; 16];
        name.copy_from_slice(&self.sector(DIRECTORY_TRACK, 0)[0x90..0xA0]);
        name
    }

    /// True once any sector has changed since the image was loaded.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Raw image data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// A copy of the image, byte-identical to the input if nothing was written.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Save the image to disk.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), D64Error> {
        std::fs::write(path.as_ref(), &self.data)?;
        log::debug!("saved {}", path.as_ref().display());
        Ok(())
    }
}
