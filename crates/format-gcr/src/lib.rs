//! GCR (Group Code Recording) encoding for D64 sectors.
//!
//! The 1541 drive stores data on disk using GCR encoding: every 4 bits
//! are mapped to a unique 5-bit pattern that guarantees no more than
//! two consecutive zeros (essential for reliable clock recovery).
//!
//! Each sector on disk consists of:
//!   - Sync mark: 5 bytes of $FF (40 one-bits)
//!   - Header block: 10 GCR bytes (8 raw → 10 GCR)
//!   - Header gap: 9 bytes of $55
//!   - Sync mark: 5 bytes of $FF
//!   - Data block: 325 GCR bytes (260 raw → 325 GCR)
//!   - Inter-sector gap: 9 bytes of $55
//!
//! The rest of the track up to its nominal length is filled with gap bytes.
//!
//! Zone-dependent byte rate at the 1 MHz drive clock:
//!   Zone 0 (tracks  1-17): 26 cycles/byte
//!   Zone 1 (tracks 18-24): 28 cycles/byte
//!   Zone 2 (tracks 25-30): 30 cycles/byte
//!   Zone 3 (tracks 31-40): 32 cycles/byte

use format_d64::{D64, SECTOR_SIZE};

/// 4-bit to 5-bit GCR encoding table.
const GCR_ENCODE: [u8; 16] = [
    0x0A, 0x0B, 0x12, 0x13, 0x0E, 0x0F, 0x16, 0x17,
    0x09, 0x19, 0x1A, 0x1B, 0x0D, 0x1D, 0x1E, 0x15,
];

/// 5-bit to 4-bit GCR decoding table; invalid codes are $FF.
const GCR_DECODE: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // 00-07: invalid
    0xFF, 0x08, 0x00, 0x01, 0xFF, 0x0C, 0x04, 0x05, // 08-0F
    0xFF, 0xFF, 0x02, 0x03, 0xFF, 0x0F, 0x06, 0x07, // 10-17
    0xFF, 0x09, 0x0A, 0x0B, 0xFF, 0x0D, 0x0E, 0xFF, // 18-1F
];

const SYNC_LEN: usize = 5;
const GAP_BYTE: u8 = 0x55;
const HEADER_GAP: usize = 9;
const SECTOR_GAP: usize = 9;
const HEADER_GCR: usize = 10;
const DATA_GCR: usize = 325;

/// GCR bytes of one encoded sector, gaps included.
pub const SECTOR_GCR_LEN: usize =
    SYNC_LEN + HEADER_GCR + HEADER_GAP + SYNC_LEN + DATA_GCR + SECTOR_GAP;

/// Header block marker.
const HEADER_MARKER: u8 = 0x08;
/// Data block marker.
const DATA_MARKER: u8 = 0x07;

/// Speed zone (0-3) for a given track number.
#[must_use]
pub fn speed_zone(track: u8) -> u8 {
    match track {
        18..=24 => 1,
        25..=30 => 2,
        31..=42 => 3,
        _ => 0,
    }
}

/// Drive cycles per GCR byte for a given track.
#[must_use]
pub fn cycles_per_byte(track: u8) -> u32 {
    [26, 28, 30, 32][usize::from(speed_zone(track))]
}

/// Nominal GCR bytes on one revolution of a track.
#[must_use]
pub fn track_length(track: u8) -> usize {
    [7692, 7142, 6666, 6250][usize::from(speed_zone(track))]
}

/// Decode 5 GCR bytes into 4 raw bytes.
///
/// Returns `None` if any GCR nybble is invalid.
#[must_use]
pub fn decode_gcr_group(input: &[u8; 5]) -> Option<[u8; 4]> {
    let bits = input
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
    let mut out = [0u8; 4];
    for (i, byte) in out.iter_mut().enumerate() {
        let hi = GCR_DECODE[((bits >> (35 - i * 10)) & 0x1F) as usize];
        let lo = GCR_DECODE[((bits >> (30 - i * 10)) & 0x1F) as usize];
        if hi == 0xFF || lo == 0xFF {
            return None;
        }
        *byte = (hi << 4) | lo;
    }
    Some(out)
}

/// Encode 4 raw bytes into 5 GCR bytes.
///
/// Four bytes = eight nibbles = 40 GCR bits = 5 GCR bytes.
#[must_use]
pub fn encode_gcr_group(input: &[u8; 4]) -> [u8; 5] {
    let bits = input.iter().fold(0u64, |acc, &b| {
        let hi = u64::from(GCR_ENCODE[usize::from(b >> 4)]);
        let lo = u64::from(GCR_ENCODE[usize::from(b & 0x0F)]);
        (acc << 10) | (hi << 5) | lo
    });
    let mut out = [0u8; 5];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = (bits >> (32 - i * 8)) as u8;
    }
    out
}

fn encode_groups(raw: &[u8]) -> Vec<u8> {
    raw.chunks_exact(4)
        .flat_map(|c| encode_gcr_group(&[c[0], c[1], c[2], c[3]]))
        .collect()
}

fn decode_groups(gcr: &[u8]) -> Option<Vec<u8>> {
    let mut raw = Vec::with_capacity(gcr.len() / 5 * 4);
    for c in gcr.chunks_exact(5) {
        raw.extend_from_slice(&decode_gcr_group(&[c[0], c[1], c[2], c[3], c[4]])?);
    }
    Some(raw)
}

/// Encode a sector header.
///
/// Raw header: $08, checksum, sector, track, id2, id1, $0F, $0F.
#[must_use]
pub fn encode_header(track: u8, sector: u8, disk_id: [u8; 2]) -> [u8; HEADER_GCR] {
    let checksum = sector ^ track ^ disk_id[0] ^ disk_id[1];
    let raw = [
        HEADER_MARKER, checksum, sector, track, disk_id[1], disk_id[0], 0x0F, 0x0F,
    ];
    let mut out = [0u8; HEADER_GCR];
    out.copy_from_slice(&encode_groups(&raw));
    out
}

/// Decode a header block into (track, sector), checking marker and checksum.
#[must_use]
pub fn decode_header(gcr: &[u8]) -> Option<(u8, u8)> {
    let raw = decode_groups(gcr.get(..HEADER_GCR)?)?;
    let (sector, track) = (raw[2], raw[3]);
    let valid = raw[0] == HEADER_MARKER && raw[1] == sector ^ track ^ raw[4] ^ raw[5];
    valid.then_some((track, sector))
}

/// Encode a data block.
///
/// Raw: $07, 256 data bytes, checksum, $00, $00 = 260 bytes = 65 groups.
#[must_use]
pub fn encode_data_block(sector_data: &[u8; SECTOR_SIZE]) -> Vec<u8> {
    let checksum = sector_data.iter().fold(0u8, |acc, &b| acc ^ b);
    let mut raw = Vec::with_capacity(260);
    raw.push(DATA_MARKER);
    raw.extend_from_slice(sector_data);
    raw.extend_from_slice(&[checksum, 0x00, 0x00]);
    encode_groups(&raw)
}

/// Decode a data block (325 GCR bytes) into its 256 data bytes.
///
/// Returns `None` on an invalid code, a wrong marker or a checksum mismatch.
#[must_use]
pub fn decode_data_block(gcr: &[u8]) -> Option<[u8; SECTOR_SIZE]> {
    let raw = decode_groups(gcr.get(..DATA_GCR)?)?;
    if raw[0] != DATA_MARKER {
        return None;
    }
    let mut data = [0u8; SECTOR_SIZE];
    data.copy_from_slice(&raw[1..=SECTOR_SIZE]);
    let checksum = data.iter().fold(0u8, |acc, &b| acc ^ b);
    (checksum == raw[SECTOR_SIZE + 1]).then_some(data)
}

/// Encode a complete sector (sync + header + gap + sync + data + gap).
#[must_use]
pub fn encode_sector(track: u8, sector: u8, data: &[u8; SECTOR_SIZE], disk_id: [u8; 2]) -> Vec<u8> {
    let mut out = Vec::with_capacity(SECTOR_GCR_LEN);
    out.extend_from_slice(&[0xFF; SYNC_LEN]);
    out.extend_from_slice(&encode_header(track, sector, disk_id));
    out.extend_from_slice(&[GAP_BYTE; HEADER_GAP]);
    out.extend_from_slice(&[0xFF; SYNC_LEN]);
    out.extend_from_slice(&encode_data_block(data));
    out.extend_from_slice(&[GAP_BYTE; SECTOR_GAP]);
    out
}

/// Encode a complete track from a D64 image.
///
/// Returns the GCR byte stream the head reads in a loop, padded with gap
/// bytes to the track's nominal length. Tracks the image does not have come
/// back empty (unformatted).
#[must_use]
pub fn encode_track(d64: &D64, track: u8) -> Vec<u8> {
    let num_sectors = D64::sectors_per_track(track);
    let disk_id = d64.disk_id();

    let mut gcr_track = Vec::with_capacity(track_length(track));
    for sector in 0..num_sectors {
        let Some(data) = d64.read_sector(track, sector) else {
            return Vec::new();
        };
        let mut block = [0u8; SECTOR_SIZE];
        block.copy_from_slice(data);
        gcr_track.extend_from_slice(&encode_sector(track, sector, &block, disk_id));
    }
    if gcr_track.len() < track_length(track) {
        gcr_track.resize(track_length(track), GAP_BYTE);
    }
    gcr_track
}

/// A sector recovered from a GCR track image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSector {
    pub track: u8,
    pub sector: u8,
    pub data: [u8; SECTOR_SIZE],
}

/// Scan a circular GCR track for header/data pairs and decode them.
///
/// Blocks may wrap past the end of the buffer. Sectors whose header or data
/// block fails to decode are left out.
#[must_use]
pub fn decode_track(gcr: &[u8]) -> Vec<DecodedSector> {
    let len = gcr.len();
    if len == 0 {
        return Vec::new();
    }
    // Linearise one revolution plus enough to finish a block that wraps.
    let wrap = (SECTOR_GCR_LEN * 2).min(len);
    let stream: Vec<u8> = gcr.iter().chain(&gcr[..wrap]).copied().collect();

    let mut sectors: Vec<DecodedSector> = Vec::new();
    let mut pos = 0;
    while pos < len {
        let Some(header_at) = next_block(&stream, pos) else {
            break;
        };
        pos = header_at;
        if header_at >= len + SYNC_LEN {
            break;
        }
        let Some((track, sector)) = decode_header(&stream[header_at..]) else {
            pos += 1;
            continue;
        };
        let Some(data_at) = next_block(&stream, header_at + HEADER_GCR) else {
            break;
        };
        pos = data_at;
        let Some(data) = stream.get(data_at..).and_then(decode_data_block) else {
            continue;
        };
        if !sectors.iter().any(|s| s.sector == sector) {
            sectors.push(DecodedSector {
                track,
                sector,
                data,
            });
        }
        pos = data_at + DATA_GCR;
    }
    sectors
}

/// Position of the first byte after the next sync mark at or after `from`.
fn next_block(stream: &[u8], from: usize) -> Option<usize> {
    let mut run = 0;
    for (i, &b) in stream.iter().enumerate().skip(from) {
        if b == 0xFF {
            run += 1;
        } else if run >= 2 {
            // Two $FF bytes exceed the ten one-bits the drive needs for SYNC.
            return Some(i);
        } else {
            run = 0;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn gcr_group_encode_known_values() {
        // 01010_01010_... = 01010010 10010100 10100101 00101001 01001010
        assert_eq!(encode_gcr_group(&[0, 0, 0, 0]), [0x52, 0x94, 0xA5, 0x29, 0x4A]);
        // 10101_10101_... = 10101101 01101011 01011010 11010110 10110101
        assert_eq!(
            encode_gcr_group(&[0xFF; 4]),
            [0xAD, 0x6B, 0x5A, 0xD6, 0xB5]
        );
    }

    #[test]
    fn gcr_group_decodes_every_nibble() {
        for n in 0..=0xFFu8 {
            let raw = [n, n.wrapping_mul(3), !n, n ^ 0x5A];
            assert_eq!(decode_gcr_group(&encode_gcr_group(&raw)), Some(raw));
        }
        assert_eq!(decode_gcr_group(&[0; 5]), None);
    }

    #[test]
    fn sector_layout() {
        let encoded = encode_sector(1, 0, &[0u8; 256], [0x41, 0x42]);
        assert_eq!(&encoded[0..5], &[0xFF; 5]);
        assert_eq!(&encoded[15..24], &[0x55; 9]);
        assert_eq!(&encoded[24..29], &[0xFF; 5]);
        assert_eq!(&encoded[354..363], &[0x55; 9]);
        assert_eq!(encoded.len(), SECTOR_GCR_LEN);
        assert_eq!(decode_header(&encoded[5..]), Some((1, 0)));
    }

    #[test]
    fn data_block_checksum() {
        let mut data = [0u8; 256];
        data[0] = 0xAB;
        data[1] = 0xCD;
        let mut encoded = encode_data_block(&data);
        assert_eq!(encoded.len(), 325);
        assert_eq!(decode_data_block(&encoded), Some(data));
        // Turns the low nibble of the first data byte into another valid code.
        encoded[1] ^= 0x01;
        assert_eq!(decode_data_block(&encoded), None);
    }

    #[test]
    fn track_length_matches_zone() {
        let d64 = D64::blank("ZONES", *b"01");
        assert_eq!(encode_track(&d64, 1).len(), 7692);
        assert_eq!(encode_track(&d64, 18).len(), 7142);
        assert_eq!(encode_track(&d64, 25).len(), 6666);
        assert_eq!(encode_track(&d64, 31).len(), 6250);
        assert!(encode_track(&d64, 36).is_empty());
    }

    #[test]
    fn zone_timing() {
        assert_eq!(speed_zone(17), 0);
        assert_eq!(speed_zone(18), 1);
        assert_eq!(speed_zone(30), 2);
        assert_eq!(speed_zone(35), 3);
        assert_eq!(cycles_per_byte(1), 26);
        assert_eq!(cycles_per_byte(18), 28);
        assert_eq!(cycles_per_byte(25), 30);
        assert_eq!(cycles_per_byte(31), 32);
    }

    #[test]
    fn track_decodes_back_to_sectors() {
        let mut d64 = D64::blank("DECODE", *b"01");
        let mut sector = [0u8; 256];
        sector[0] = 0x12;
        sector[255] = 0x34;
        d64.write_sector(5, 7, &sector).expect("valid");

        let mut gcr = encode_track(&d64, 5);
        // Rotate so that a sector straddles the end of the buffer.
        gcr.rotate_left(200);
        let decoded = decode_track(&gcr);
        assert_eq!(decoded.len(), 21);
        let found = decoded.iter().find(|s| s.sector == 7).expect("sector 7");
        assert_eq!(found.track, 5);
        assert_eq!(found.data, sector);
    }
}
