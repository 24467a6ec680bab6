//! Error types for romflasher-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Rejected caller input, detected before any device access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentError {
    /// Segment is zero or below the start of the banked range
    SegmentOutOfRange {
        /// Segment that was given
        segment: u16,
    },
    /// Segment is not on a block boundary
    SegmentMisaligned {
        /// Segment that was given
        segment: u16,
    },
    /// Destination physical address is not block aligned
    DestinationMisaligned {
        /// Physical address that was given
        address: u32,
    },
    /// Programmed range leaves the banked range
    RangeOutOfBounds {
        /// First physical address of the range
        start: u32,
        /// Length of the range in bytes
        len: u32,
    },
    /// Image size override is zero, too large or not a 2 KiB multiple
    InvalidSizeOverride {
        /// Requested size in bytes
        bytes: u32,
    },
}

/// Failures while building a [`RomImage`](crate::image::RomImage)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLoadError {
    /// The source contained no data
    Empty,
    /// Source length is not a multiple of the ROM unit
    Misaligned {
        /// Bytes read from the source
        len: usize,
        /// Required multiple
        unit: usize,
    },
    /// Source is larger than the biggest supported image
    TooLarge {
        /// Bytes offered by the source
        len: usize,
        /// Largest accepted image
        max: usize,
    },
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Invalid address, alignment, range or size argument
    InvalidArgument(ArgumentError),
    /// ROM image could not be built from its source
    ImageLoad(ImageLoadError),
    /// No known chip answered the software ID sequence
    DeviceNotDetected {
        /// Vendor byte read back
        vendor_id: u8,
        /// Device byte read back
        device_id: u8,
    },
    /// Sector erase did not complete in time
    EraseTimeout {
        /// Address of the block being erased
        address: u32,
    },
    /// Byte program did not complete in time
    ProgramTimeout {
        /// Address of the byte being programmed
        address: u32,
    },
    /// Read-back data differs from the image
    VerifyMismatch {
        /// First differing address
        address: u32,
        /// Byte from the image
        expected: u8,
        /// Byte read from the device
        found: u8,
    },
    /// Operator declined to continue
    UserAborted,
    /// Tick source never advanced during calibration
    TickStalled,
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SegmentOutOfRange { segment } => write!(
                f,
                "memory address {:04X} must be between A000 and F800",
                segment
            ),
            Self::SegmentMisaligned { segment } => {
                write!(f, "memory address {:04X} must be on a 4K boundary", segment)
            }
            Self::DestinationMisaligned { address } => {
                write!(f, "destination 0x{:05X} is not 4K aligned", address)
            }
            Self::RangeOutOfBounds { start, len } => write!(
                f,
                "{}K at 0x{:05X} runs past the end of the ROM area",
                len / 1024,
                start
            ),
            Self::InvalidSizeOverride { bytes } => write!(
                f,
                "size override of {} bytes must be a non-zero multiple of 2K up to 256K",
                bytes
            ),
        }
    }
}

impl fmt::Display for ImageLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "ROM image file is empty"),
            Self::Misaligned { len, unit } => write!(
                f,
                "ROM image is {} bytes, must be a multiple of {}K",
                len,
                unit / 1024
            ),
            Self::TooLarge { len, max } => write!(
                f,
                "ROM image is {} bytes, exceeds max size of {}K",
                len,
                max / 1024
            ),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(e) => write!(f, "invalid argument: {}", e),
            Self::ImageLoad(e) => write!(f, "{}", e),
            Self::DeviceNotDetected {
                vendor_id,
                device_id,
            } => write!(
                f,
                "no supported flash ROM detected (ID {:02X}:{:02X})",
                vendor_id, device_id
            ),
            Self::EraseTimeout { address } => {
                write!(f, "timeout erasing block at 0x{:05X}", address)
            }
            Self::ProgramTimeout { address } => {
                write!(f, "timeout programming byte at 0x{:05X}", address)
            }
            Self::VerifyMismatch {
                address,
                expected,
                found,
            } => write!(
                f,
                "verify failed at 0x{:05X}: expected 0x{:02X}, found 0x{:02X}",
                address, expected, found
            ),
            Self::UserAborted => write!(f, "aborted by user"),
            Self::TickStalled => write!(f, "timer tick never advanced during calibration"),
        }
    }
}

impl From<ArgumentError> for Error {
    fn from(e: ArgumentError) -> Self {
        Error::InvalidArgument(e)
    }
}

impl From<ImageLoadError> for Error {
    fn from(e: ImageLoadError) -> Self {
        Error::ImageLoad(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ArgumentError {}

#[cfg(feature = "std")]
impl std::error::Error for ImageLoadError {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
