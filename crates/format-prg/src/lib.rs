//! PRG file parser.
//!
//! A PRG file is the simplest C64 binary format: a 2-byte little-endian
//! load address followed by the data bytes.

use std::fmt;

/// Start of BASIC program text on a stock C64.
pub const BASIC_START: u16 = 0x0801;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrgError {
    /// Fewer than the two header bytes plus one data byte.
    TooShort(usize),
    /// The data would run past $FFFF.
    TooLong { load_address: u16, len: usize },
}

impl fmt::Display for PrgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort(len) => {
                write!(f, "PRG file too short: {len} bytes (need at least 3)")
            }
            Self::TooLong { load_address, len } => {
                write!(f, "PRG of {len} bytes at ${load_address:04X} runs past $FFFF")
            }
        }
    }
}

impl std::error::Error for PrgError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prg {
    pub load_address: u16,
    pub data: Vec<u8>,
}

impl Prg {
    /// Split a PRG image into load address and payload.
    pub fn parse(bytes: &[u8]) -> Result<Self, PrgError> {
        if bytes.len() < 3 {
            return Err(PrgError::TooShort(bytes.len()));
        }
        let load_address = u16::from_le_bytes([bytes[0], bytes[1]]);
        let data = bytes[2..].to_vec();
        if usize::from(load_address) + data.len() > 0x1_0000 {
            return Err(PrgError::TooLong {
                load_address,
                len: data.len(),
            });
        }
        Ok(Self { load_address, data })
    }

    /// One past the last loaded byte, as the KERNAL leaves it in $AE/$AF.
    #[must_use]
    pub fn end_address(&self) -> u16 {
        self.load_address.wrapping_add(self.data.len() as u16)
    }

    /// True when the program loads at the start of BASIC text.
    #[must_use]
    pub fn is_basic(&self) -> bool {
        self.load_address == BASIC_START
    }

    /// Header and payload back as a PRG image.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + 2);
        out.extend_from_slice(&self.load_address.to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    /// Address of a `SYS nnnn` in the first BASIC line, the usual machine
    /// code entry of a BASIC stub.
    #[must_use]
    pub fn sys_address(&self) -> Option<u16> {
        if !self.is_basic() {
            return None;
        }
        // Skip the link pointer and line number; 0x9E is the SYS token.
        let line = self.data.get(4..)?;
        let end = line.iter().position(|&b| b == 0).unwrap_or(line.len());
        let line = &line[..end];
        let sys = line.iter().position(|&b| b == 0x9E)?;
        let digits: String = line[sys + 1..]
            .iter()
            .skip_while(|&&b| b == b' ')
            .take_while(|b| b.is_ascii_digit())
            .map(|&b| char::from(b))
            .collect();
        digits.parse().ok()
    }
}
