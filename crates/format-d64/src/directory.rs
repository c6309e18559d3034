//! Directory listing and file chains.
//!
//! The directory is a chain of sectors on track 18 starting at 18/1. Each
//! sector holds eight 32-byte entries; the first two bytes of the sector are
//! the link to the next one. A file is a chain of data sectors: bytes 0-1
//! link to the next sector, and a link track of 0 marks the last sector, whose
//! link sector byte is the index of its last used byte.

use crate::{D64, D64Error, DIRECTORY_TRACK, SECTOR_SIZE};

const ENTRY_SIZE: usize = 32;
const PADDING: u8 = 0xA0;

/// CBM DOS file type, from the low bits of the entry's type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Del,
    Seq,
    Prg,
    Usr,
    Rel,
    Unknown(u8),
}

impl FileType {
    fn from_byte(byte: u8) -> Self {
        match byte & 0x07 {
            0 => Self::Del,
            1 => Self::Seq,
            2 => Self::Prg,
            3 => Self::Usr,
            4 => Self::Rel,
            other => Self::Unknown(other),
        }
    }

    /// Three-letter name as shown in a directory listing.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Del => "DEL",
            Self::Seq => "SEQ",
            Self::Prg => "PRG",
            Self::Usr => "USR",
            Self::Rel => "REL",
            Self::Unknown(_) => "???",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Name with the padding stripped, PETSCII mapped to ASCII.
    pub name: String,
    /// The 16 name bytes as stored.
    pub raw_name: [u8; 16],
    pub file_type: FileType,
    /// Size in blocks as recorded in the entry.
    pub blocks: u16,
    /// First data sector.
    pub track: u8,
    pub sector: u8,
    /// Unclosed files show as `*PRG` in a listing.
    pub closed: bool,
    pub locked: bool,
}

/// Map PETSCII name bytes to a printable string, stopping at the padding.
pub(crate) fn petscii_to_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != PADDING)
        .map(|&b| match b {
            0x20..=0x5F => char::from(b),
            0xC1..=0xDA => char::from(b - 0x80),
            _ => '?',
        })
        .collect()
}

/// ASCII to a padded 16-byte PETSCII name (letters become upper case).
pub(crate) fn string_to_petscii(name: &str) -> [u8; 16] {
    let mut out = [PADDING; 16];
    for (slot, c) in out.iter_mut().zip(name.chars()) {
        let c = c.to_ascii_uppercase();
        *slot = if (' '..='_').contains(&c) { c as u8 } else { b'?' };
    }
    out
}

/// CBM DOS name matching: `?` matches any character, `*` the rest of the name.
#[must_use]
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    let mut name_chars = name.chars();
    for p in pattern.chars() {
        if p == '*' {
            return true;
        }
        match name_chars.next() {
            Some(n) if p == '?' || p.eq_ignore_ascii_case(&n) => {}
            _ => return false,
        }
    }
    name_chars.next().is_none()
}

/// Visits each sector of a chain once, failing on a loop or a link off the disk.
pub(crate) struct ChainWalker {
    visited: Vec<bool>,
}

impl ChainWalker {
    pub(crate) fn new() -> Self {
        Self {
            visited: vec![false; crate::D64_SIZE_40 / SECTOR_SIZE],
        }
    }

    pub(crate) fn visit(&mut self, image: &D64, track: u8, sector: u8) -> Result<(), D64Error> {
        let index = image.sector_index(track, sector).ok_or_else(|| {
            D64Error::InvalidImageFormat(format!("chain links to {track}/{sector}"))
        })?;
        if std::mem::replace(&mut self.visited[index], true) {
            return Err(D64Error::InvalidImageFormat(format!(
                "chain loops at {track}/{sector}"
            )));
        }
        Ok(())
    }
}

impl D64 {
    /// Directory sectors in chain order, as (track, sector).
    pub(crate) fn directory_sectors(&self) -> Result<Vec<(u8, u8)>, D64Error> {
        let mut walker = ChainWalker::new();
        let mut sectors = Vec::new();
        let (mut track, mut sector) = (DIRECTORY_TRACK, 1);
        while track != 0 {
            walker.visit(self, track, sector)?;
            sectors.push((track, sector));
            let data = self.sector(track, sector);
            (track, sector) = (data[0], data[1]);
        }
        Ok(sectors)
    }

    /// All directory entries in on-disk order. Free and scratched slots
    /// (type byte 0) are skipped.
    pub fn list_directory(&self) -> Result<Vec<DirEntry>, D64Error> {
        let mut entries = Vec::new();
        for (track, sector) in self.directory_sectors()? {
            let data = self.sector(track, sector);
            for raw in data.chunks_exact(ENTRY_SIZE) {
                let type_byte = raw[2];
                if type_byte == 0 {
                    continue;
                }
                let mut raw_name = [0u8; 16];
                raw_name.copy_from_slice(&raw[5..21]);
                entries.push(DirEntry {
                    name: petscii_to_string(&raw_name),
                    raw_name,
                    file_type: FileType::from_byte(type_byte),
                    blocks: u16::from_le_bytes([raw[30], raw[31]]),
                    track: raw[3],
                    sector: raw[4],
                    closed: type_byte & 0x80 != 0,
                    locked: type_byte & 0x40 != 0,
                });
            }
        }
        Ok(entries)
    }

    /// First entry whose name matches `pattern` (CBM wildcards allowed).
    pub fn find_file(&self, pattern: &str) -> Result<DirEntry, D64Error> {
        self.list_directory()?
            .into_iter()
            .find(|e| e.file_type != FileType::Del && matches_pattern(pattern, &e.name))
            .ok_or_else(|| D64Error::FileNotFound(pattern.to_string()))
    }

    /// First PRG file on the disk, the usual autostart target.
    pub fn first_program(&self) -> Result<DirEntry, D64Error> {
        self.list_directory()?
            .into_iter()
            .find(|e| e.file_type == FileType::Prg)
            .ok_or_else(|| D64Error::FileNotFound("*".to_string()))
    }

    /// Contents of the file named `pattern`.
    pub fn read_file(&self, pattern: &str) -> Result<Vec<u8>, D64Error> {
        let entry = self.find_file(pattern)?;
        self.read_chain(entry.track, entry.sector)
    }

    /// Follow a sector chain from `track`/`sector` and collect its payload.
    pub fn read_chain(&self, track: u8, sector: u8) -> Result<Vec<u8>, D64Error> {
        let mut walker = ChainWalker::new();
        let mut out = Vec::new();
        let (mut track, mut sector) = (track, sector);
        loop {
            walker.visit(self, track, sector)?;
            let data = self.sector(track, sector);
            if data[0] == 0 {
                let last = usize::from(data[1]).max(1);
                out.extend_from_slice(&data[2..=last]);
                return Ok(out);
            }
            out.extend_from_slice(&data[2..]);
            (track, sector) = (data[0], data[1]);
        }
    }

    /// Write `raw` as entry `slot` (0-7) of directory sector `track`/`sector`.
    pub(crate) fn write_dir_entry(
        &mut self,
        track: u8,
        sector: u8,
        slot: usize,
        raw: &[u8; ENTRY_SIZE],
    ) -> Result<(), D64Error> {
        let mut data = [0u8; SECTOR_SIZE];
        data.copy_from_slice(self.sector(track, sector));
        let start = slot * ENTRY_SIZE;
        // The link bytes of slot 0 belong to the sector, not the entry.
        data[start + 2..start + ENTRY_SIZE].copy_from_slice(&raw[2..]);
        self.write_sector(track, sector, &data)
    }

    /// First free directory slot (type byte 0), as (track, sector, slot).
    pub(crate) fn free_dir_slot(&self) -> Result<Option<(u8, u8, usize)>, D64Error> {
        for (track, sector) in self.directory_sectors()? {
            let data = self.sector(track, sector);
            if let Some(slot) = data.chunks_exact(ENTRY_SIZE).position(|e| e[2] == 0) {
                return Ok(Some((track, sector, slot)));
            }
        }
        Ok(None)
    }

    /// Build a directory entry for a new closed PRG file.
    pub(crate) fn prg_entry(name: &str, track: u8, sector: u8, blocks: u16) -> [u8; ENTRY_SIZE] {
        let mut raw = [0u8; ENTRY_SIZE];
        raw[2] = 0x82;
        raw[3] = track;
        raw[4] = sector;
        raw[5..21].copy_from_slice(&string_to_petscii(name));
        raw[30..32].copy_from_slice(&blocks.to_le_bytes());
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn petscii_names() {
        assert_eq!(petscii_to_string(b"GAME\xA0\xA0\xA0"), "GAME");
        assert_eq!(petscii_to_string(&[0xC1, 0x42]), "AB");
        assert_eq!(&string_to_petscii("game")[..5], b"GAME\xA0");
    }

    #[test]
    fn wildcard_matching() {
        assert!(matches_pattern("GAME", "GAME"));
        assert!(matches_pattern("game", "GAME"));
        assert!(matches_pattern("G*", "GAME"));
        assert!(matches_pattern("*", "ANYTHING"));
        assert!(matches_pattern("G?ME", "GAME"));
        assert!(!matches_pattern("GAM", "GAME"));
        assert!(!matches_pattern("GAMES", "GAME"));
    }

    #[test]
    fn blank_disk_has_empty_directory() {
        let d64 = D64::blank("EMPTY", *b"00");
        assert_eq!(d64.list_directory().expect("valid"), Vec::new());
        assert!(matches!(d64.read_file("X"), Err(D64Error::FileNotFound(_))));
    }

    #[test]
    fn directory_loop_is_detected() {
        let mut d64 = D64::blank("LOOP", *b"00");
        let mut sector = [0u8; SECTOR_SIZE];
        sector[0] = 18;
        sector[1] = 1;
        d64.write_sector(18, 1, &sector).expect("valid");
        assert!(matches!(
            d64.list_directory(),
            Err(D64Error::InvalidImageFormat(_))
        ));
    }

    #[test]
    fn file_chain_loop_is_detected() {
        let mut d64 = D64::blank("LOOP", *b"00");
        d64.write_file("A", &[0; 600]).expect("space");
        let entry = d64.find_file("A").expect("present");
        let mut data = [0u8; SECTOR_SIZE];
        data.copy_from_slice(d64.read_sector(entry.track, entry.sector).expect("valid"));
        data[0] = entry.track;
        data[1] = entry.sector;
        d64.write_sector(entry.track, entry.sector, &data).expect("valid");
        assert!(matches!(d64.read_file("A"), Err(D64Error::InvalidImageFormat(_))));
    }

    #[test]
    fn short_last_sector_uses_link_byte() {
        let mut d64 = D64::blank("T", *b"00");
        let mut data = [0u8; SECTOR_SIZE];
        data[1] = 4;
        data[2..5].copy_from_slice(&[7, 8, 9]);
        d64.write_sector(1, 0, &data).expect("valid");
        assert_eq!(d64.read_chain(1, 0).expect("valid"), vec![7, 8, 9]);
    }
}
