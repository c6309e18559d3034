//! Errors returned by the machine and its session handle.

use std::fmt;

use format_d64::D64Error;

#[derive(Debug)]
pub enum MachineError {
    /// A disk image failed validation.
    InvalidImageFormat(String),
    /// Drive 8 has no disk, or the request needs a disk.
    DriveNotReady,
    /// The IEC handshake watchdog expired for this device.
    DeviceNotResponding(u8),
    /// Only device 8 is emulated.
    NoSuchDrive(u8),
    /// A file named in a request is not on the disk.
    FileNotFound(String),
    UnknownResource(String),
    InvalidResourceValue { name: String, value: String },
    /// A ROM image is absent or has the wrong size.
    RomMissing(String),
    /// The worker thread has exited; the session accepts no more commands.
    SessionStopped,
    /// The command queue is full and the worker is not draining it.
    CommandQueueFull,
    Io(std::io::Error),
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidImageFormat(reason) => write!(f, "invalid disk image: {reason}"),
            Self::DriveNotReady => write!(f, "74, DRIVE NOT READY"),
            Self::DeviceNotResponding(device) => write!(f, "drive {device} not responding"),
            Self::NoSuchDrive(device) => write!(f, "no drive emulated at device {device}"),
            Self::FileNotFound(name) => write!(f, "62, FILE NOT FOUND: {name}"),
            Self::UnknownResource(name) => write!(f, "unknown resource {name}"),
            Self::InvalidResourceValue { name, value } => {
                write!(f, "invalid value {value:?} for resource {name}")
            }
            Self::RomMissing(what) => write!(f, "ROM missing: {what}"),
            Self::SessionStopped => write!(f, "machine session has stopped"),
            Self::CommandQueueFull => write!(f, "machine command queue is full"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for MachineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MachineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<D64Error> for MachineError {
    fn from(e: D64Error) -> Self {
        match e {
            D64Error::InvalidImageFormat(reason) => Self::InvalidImageFormat(reason),
            D64Error::InvalidSector { track, sector } => {
                Self::InvalidImageFormat(format!("no sector {track}/{sector}"))
            }
            D64Error::FileNotFound(name) => Self::FileNotFound(name),
            D64Error::FileExists(name) => {
                Self::InvalidImageFormat(format!("file {name} already exists"))
            }
            D64Error::DiskFull => Self::InvalidImageFormat("disk full".to_string()),
            D64Error::Io(e) => Self::Io(e),
        }
    }
}
