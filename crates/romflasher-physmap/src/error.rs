//! Error types for physical memory access

use std::io;
use thiserror::Error;

/// Physical backend errors
#[derive(Debug, Error)]
pub enum PhysmapError {
    /// /dev/mem could not be opened
    #[error("Failed to open /dev/mem: {0} (are you root?)")]
    Open(#[source] io::Error),

    /// mmap of a physical range failed
    #[error("Failed to map {size:#x} bytes at physical address {address:#x}: {source}")]
    Map {
        address: u64,
        size: usize,
        #[source]
        source: io::Error,
    },

    /// Not available on this platform
    #[error("{0}")]
    NotSupported(&'static str),
}
