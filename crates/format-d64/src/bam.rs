//! Block availability map and file allocation.
//!
//! The BAM lives in 18/0. For each track 1-35 it holds four bytes at
//! `4 * track`: a free-sector count and a 24-bit map where a set bit marks a
//! free sector. Extended tracks 36-40 have no standard BAM and are never
//! allocated.

use crate::directory::string_to_petscii;
use crate::{D64, D64Error, DIRECTORY_TRACK, SECTOR_SIZE};

/// Highest track covered by the BAM.
const BAM_TRACKS: u8 = 35;
/// Sector step between consecutive blocks of a file.
const FILE_INTERLEAVE: u8 = 10;
/// Sector step between directory blocks.
const DIRECTORY_INTERLEAVE: u8 = 3;
/// Payload bytes per data sector.
const BLOCK_PAYLOAD: usize = SECTOR_SIZE - 2;

impl D64 {
    fn bam(&self) -> [u8; SECTOR_SIZE] {
        let mut bam = [0u8; SECTOR_SIZE];
        bam.copy_from_slice(self.sector(DIRECTORY_TRACK, 0));
        bam
    }

    fn set_bam(&mut self, bam: &[u8; SECTOR_SIZE]) -> Result<(), D64Error> {
        self.write_sector(DIRECTORY_TRACK, 0, bam)
    }

    /// Write an empty BAM and directory, as the DOS format command does.
    pub(crate) fn format_bam(&mut self, name: &str, id: [u8; 2]) {
        let mut bam = [0u8; SECTOR_SIZE];
        bam[0] = DIRECTORY_TRACK;
        bam[1] = 1;
        bam[2] = b'A';
        for track in 1..=BAM_TRACKS {
            let sectors = Self::sectors_per_track(track);
            let map = (1u32 << sectors) - 1;
            let at = usize::from(track) * 4;
            bam[at] = sectors;
            bam[at + 1..at + 4].copy_from_slice(&map.to_le_bytes()[..3]);
        }
        bam[0x90..0xA0].copy_from_slice(&string_to_petscii(name));
        bam[0xA0..0xAB].copy_from_slice(&[
            0xA0, 0xA0, id[0], id[1], 0xA0, b'2', b'A', 0xA0, 0xA0, 0xA0, 0xA0,
        ]);
        for sector in [0, 1] {
            let at = usize::from(DIRECTORY_TRACK) * 4;
            bam[at + 1 + sector / 8] &= !(1 << (sector % 8));
            bam[at] -= 1;
        }

        let mut directory = [0u8; SECTOR_SIZE];
        directory[1] = 0xFF;
        let bam_offset = self.sector_offset(DIRECTORY_TRACK, 0).unwrap_or(0);
        self.data[bam_offset..bam_offset + SECTOR_SIZE].copy_from_slice(&bam);
        self.data[bam_offset + SECTOR_SIZE..bam_offset + 2 * SECTOR_SIZE]
            .copy_from_slice(&directory);
    }

    /// True when the BAM marks `track`/`sector` as free.
    #[must_use]
    pub fn is_free(&self, track: u8, sector: u8) -> bool {
        if track == 0 || track > BAM_TRACKS || sector >= Self::sectors_per_track(track) {
            return false;
        }
        let at = usize::from(track) * 4 + 1 + usize::from(sector / 8);
        self.sector(DIRECTORY_TRACK, 0)[at] & (1 << (sector % 8)) != 0
    }

    /// Free blocks as `LOAD"$",8` reports them: track 18 is not counted.
    #[must_use]
    pub fn blocks_free(&self) -> u16 {
        let bam = self.sector(DIRECTORY_TRACK, 0);
        (1..=BAM_TRACKS)
            .filter(|&t| t != DIRECTORY_TRACK)
            .map(|t| u16::from(bam[usize::from(t) * 4]))
            .sum()
    }

    fn mark_used(&mut self, track: u8, sector: u8) -> Result<(), D64Error> {
        let mut bam = self.bam();
        let at = usize::from(track) * 4;
        bam[at + 1 + usize::from(sector / 8)] &= !(1 << (sector % 8));
        bam[at] = bam[at].saturating_sub(1);
        self.set_bam(&bam)
    }

    /// First free sector on `track` at or after `start`, wrapping around.
    fn free_sector_from(&self, track: u8, start: u8) -> Option<u8> {
        let sectors = Self::sectors_per_track(track);
        (0..sectors)
            .map(|i| (start + i) % sectors)
            .find(|&s| self.is_free(track, s))
    }

    /// Data tracks ordered by distance from the directory, alternating sides.
    fn tracks_outward() -> impl Iterator<Item = u8> {
        (1..DIRECTORY_TRACK).flat_map(|d| {
            [DIRECTORY_TRACK.checked_sub(d), Some(DIRECTORY_TRACK + d)]
                .into_iter()
                .flatten()
                .filter(|t| (1..=BAM_TRACKS).contains(t))
        })
    }

    /// Next block of a file after `previous`, or its first block.
    fn next_data_block(&self, previous: Option<(u8, u8)>) -> Option<(u8, u8)> {
        if let Some((track, sector)) = previous {
            let sectors = Self::sectors_per_track(track);
            let start = (sector + FILE_INTERLEAVE) % sectors;
            if let Some(s) = self.free_sector_from(track, start) {
                return Some((track, s));
            }
            // Keep moving away from the directory before trying the other side.
            let further: Vec<u8> = if track < DIRECTORY_TRACK {
                (1..track).rev().collect()
            } else {
                (track + 1..=BAM_TRACKS).collect()
            };
            if let Some(found) = further
                .into_iter()
                .find_map(|t| self.free_sector_from(t, 0).map(|s| (t, s)))
            {
                return Some(found);
            }
        }
        Self::tracks_outward().find_map(|t| self.free_sector_from(t, 0).map(|s| (t, s)))
    }

    /// Free directory slot, growing the directory chain on track 18 if needed.
    fn claim_dir_slot(&mut self) -> Result<(u8, u8, usize), D64Error> {
        if let Some(slot) = self.free_dir_slot()? {
            return Ok(slot);
        }
        let sectors = self.directory_sectors()?;
        let &(last_track, last_sector) = sectors.last().ok_or(D64Error::DiskFull)?;
        let start = (last_sector + DIRECTORY_INTERLEAVE) % Self::sectors_per_track(DIRECTORY_TRACK);
        let new = self
            .free_sector_from(DIRECTORY_TRACK, start)
            .ok_or(D64Error::DiskFull)?;
        self.mark_used(DIRECTORY_TRACK, new)?;

        let mut fresh = [0u8; SECTOR_SIZE];
        fresh[1] = 0xFF;
        self.write_sector(DIRECTORY_TRACK, new, &fresh)?;
        let mut link = [0u8; SECTOR_SIZE];
        link.copy_from_slice(self.sector(last_track, last_sector));
        link[0] = DIRECTORY_TRACK;
        link[1] = new;
        self.write_sector(last_track, last_sector, &link)?;
        Ok((DIRECTORY_TRACK, new, 0))
    }

    /// Store `data` as a closed PRG file named `name`.
    ///
    /// Blocks are taken from the BAM starting next to the directory track
    /// with the DOS interleave; track 18 is never used for data.
    pub fn write_file(&mut self, name: &str, data: &[u8]) -> Result<(), D64Error> {
        let stored_name = crate::directory::petscii_to_string(&string_to_petscii(name));
        if self.list_directory()?.iter().any(|e| e.name == stored_name) {
            return Err(D64Error::FileExists(stored_name));
        }
        let chunks: Vec<&[u8]> = if data.is_empty() {
            vec![&[]]
        } else {
            data.chunks(BLOCK_PAYLOAD).collect()
        };
        let blocks = u16::try_from(chunks.len()).map_err(|_| D64Error::DiskFull)?;
        if blocks > self.blocks_free() {
            return Err(D64Error::DiskFull);
        }
        let (dir_track, dir_sector, slot) = self.claim_dir_slot()?;

        let mut chain = Vec::with_capacity(chunks.len());
        let mut previous = None;
        for _ in &chunks {
            let block = self.next_data_block(previous).ok_or(D64Error::DiskFull)?;
            self.mark_used(block.0, block.1)?;
            chain.push(block);
            previous = Some(block);
        }

        for (i, chunk) in chunks.iter().enumerate() {
            let mut sector = [0u8; SECTOR_SIZE];
            if let Some(&(next_track, next_sector)) = chain.get(i + 1) {
                sector[0] = next_track;
                sector[1] = next_sector;
            } else {
                sector[1] = (chunk.len() + 1) as u8;
            }
            sector[2..2 + chunk.len()].copy_from_slice(chunk);
            let (track, s) = chain[i];
            self.write_sector(track, s, &sector)?;
        }

        let (first_track, first_sector) = chain[0];
        let entry = Self::prg_entry(name, first_track, first_sector, blocks);
        self.write_dir_entry(dir_track, dir_sector, slot, &entry)?;
        log::debug!(
            "wrote {stored_name}: {blocks} blocks from {first_track}/{first_sector}"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileType;
    use pretty_assertions::assert_eq;

    #[test]
    fn blank_disk_has_664_blocks_free() {
        let d64 = D64::blank("NEW", *b"01");
        assert_eq!(d64.blocks_free(), 664);
        assert!(!d64.is_free(18, 0));
        assert!(!d64.is_free(18, 1));
        assert!(d64.is_free(18, 2));
        assert!(d64.is_free(1, 20));
        assert!(!d64.is_free(1, 21));
    }

    #[test]
    fn write_then_read_file() {
        let mut d64 = D64::blank("FILES", *b"01");
        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        d64.write_file("GAME", &payload).expect("space");

        let entries = d64.list_directory().expect("valid");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "GAME");
        assert_eq!(entries[0].file_type, FileType::Prg);
        assert_eq!(entries[0].blocks, 4);
        assert!(entries[0].closed);
        assert_eq!(d64.read_file("GAME").expect("present"), payload);
        assert_eq!(d64.blocks_free(), 660);
    }

    #[test]
    fn allocation_avoids_directory_track_with_interleave() {
        let mut d64 = D64::blank("I", *b"01");
        d64.write_file("A", &[0; 254 * 3]).expect("space");
        let entry = d64.find_file("A").expect("present");
        assert_eq!((entry.track, entry.sector), (17, 0));
        let first = d64.read_sector(17, 0).expect("valid");
        assert_eq!((first[0], first[1]), (17, 10));
        let second = d64.read_sector(17, 10).expect("valid");
        assert_eq!((second[0], second[1]), (17, 20));
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut d64 = D64::blank("D", *b"01");
        d64.write_file("ONE", &[1]).expect("space");
        assert!(matches!(d64.write_file("one", &[2]), Err(D64Error::FileExists(_))));
    }

    #[test]
    fn directory_grows_past_eight_entries() {
        let mut d64 = D64::blank("MANY", *b"01");
        for i in 0..20 {
            d64.write_file(&format!("FILE{i}"), &[i as u8]).expect("space");
        }
        let names: Vec<String> = d64
            .list_directory()
            .expect("valid")
            .into_iter()
            .map(|e| e.name)
            .collect();
        let expected: Vec<String> = (0..20).map(|i| format!("FILE{i}")).collect();
        assert_eq!(names, expected);
        assert_eq!(d64.directory_sectors().expect("valid"), vec![(18, 1), (18, 4), (18, 7)]);
    }

    #[test]
    fn disk_full() {
        let mut d64 = D64::blank("FULL", *b"01");
        d64.write_file("BIG", &vec![0xEA; 254 * 664]).expect("fits exactly");
        assert_eq!(d64.blocks_free(), 0);
        assert!(matches!(d64.write_file("MORE", &[1]), Err(D64Error::DiskFull)));
    }

    #[test]
    fn empty_file_takes_one_block() {
        let mut d64 = D64::blank("E", *b"01");
        d64.write_file("NOTHING", &[]).expect("space");
        assert_eq!(d64.read_file("NOTHING").expect("present"), Vec::<u8>::new());
        assert_eq!(d64.blocks_free(), 663);
    }
}
