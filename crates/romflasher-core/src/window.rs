//! Command sequence window placement
//!
//! The flash chip only decodes the low address lines when it latches command
//! cycles, so unlock and command writes can be issued through any 32 KiB
//! aligned window that maps onto the chip. The window has to be chosen so
//! that those writes really reach the chip being programmed and not some
//! other ROM or RAM that happens to share the upper memory area.

use crate::bus::MemoryBus;
use crate::error::ArgumentError;

/// Size of one erase sector / programming block
pub const BLOCK_SIZE: u32 = 4 * 1024;
/// Granularity of command sequence windows
pub const WINDOW_SIZE: u32 = 32 * 1024;
/// Stride used when scanning the window for other option ROMs
pub const SCAN_STRIDE: u32 = 2 * 1024;
/// Option ROM header signature
pub const ROM_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// First physical address of the banked ROM area
pub const BANKED_START: u32 = 0xA_0000;
/// One past the last physical address of the banked ROM area
pub const BANKED_END: u32 = 0x10_0000;

/// Destination and command window for one programming run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressWindow {
    /// Physical address the image is programmed to
    pub destination: u32,
    /// Physical base of the command sequence window
    pub base: u32,
    /// Window size in bytes
    pub size: u32,
}

impl AddressWindow {
    /// One past the last address of the window
    pub fn end(&self) -> u32 {
        self.base + self.size
    }

    /// Whether `[start, start + len)` lies entirely inside the window
    pub fn covers(&self, start: u32, len: u32) -> bool {
        start >= self.base && start.saturating_add(len) <= self.end()
    }

    /// Whether commands go through a different address than the destination
    pub fn is_relocated(&self) -> bool {
        self.base != self.destination
    }

    /// Real-mode segment of the window base
    pub fn base_segment(&self) -> u16 {
        (self.base >> 4) as u16
    }

    /// Real-mode segment of the destination
    pub fn destination_segment(&self) -> u16 {
        (self.destination >> 4) as u16
    }
}

/// Convert a real-mode segment to a physical destination address
///
/// The segment must be inside the banked area and on a block boundary.
pub fn segment_to_address(segment: u16) -> core::result::Result<u32, ArgumentError> {
    if segment == 0 || (segment as u32) < (BANKED_START >> 4) {
        return Err(ArgumentError::SegmentOutOfRange { segment });
    }
    if (segment as u32) % (BLOCK_SIZE >> 4) != 0 {
        return Err(ArgumentError::SegmentMisaligned { segment });
    }
    Ok((segment as u32) << 4)
}

/// Check that `[destination, destination + len)` is a legal target range
pub fn validate_range(destination: u32, len: u32) -> core::result::Result<(), ArgumentError> {
    if destination % BLOCK_SIZE != 0 {
        return Err(ArgumentError::DestinationMisaligned {
            address: destination,
        });
    }
    let end = destination as u64 + len as u64;
    if destination < BANKED_START || end > BANKED_END as u64 {
        return Err(ArgumentError::RangeOutOfBounds {
            start: destination,
            len,
        });
    }
    Ok(())
}

/// Choose the command sequence window for a destination range
///
/// The window is normally the 32 KiB aligned window containing the
/// destination. When that window does not cover the programmed range but
/// the next window up lies completely inside it, the next window is used
/// so every command cycle hits the chip being programmed. Otherwise the
/// rounded-down window is kept even though coverage is partial.
pub fn plan_window(destination: u32, len: u32) -> AddressWindow {
    let mut base = destination & !(WINDOW_SIZE - 1);
    let end = destination.saturating_add(len);

    if base < destination && base.saturating_add(2 * WINDOW_SIZE) <= end {
        base += WINDOW_SIZE;
    }

    AddressWindow {
        destination,
        base,
        size: WINDOW_SIZE,
    }
}

/// Check whether `addr` starts with an option ROM header
pub fn has_rom_signature<B: MemoryBus + ?Sized>(bus: &mut B, addr: u32) -> bool {
    let mut header = [0u8; 2];
    bus.read(addr, &mut header);
    header == ROM_SIGNATURE
}

/// Look for other ROMs mapped inside the command window
///
/// Scans the window in [`SCAN_STRIDE`] steps, skipping the range about to
/// be programmed. A hit only means another ROM image is visible; if it lives
/// in a second flash chip it may be disturbed by the command cycles.
pub fn detect_overlap<B: MemoryBus + ?Sized>(
    bus: &mut B,
    window: &AddressWindow,
    destination: u32,
    len: u32,
) -> bool {
    let skip_end = destination.saturating_add(len);
    let mut addr = window.base;

    while addr < window.end() {
        if addr >= destination && addr < skip_end {
            addr += SCAN_STRIDE;
            continue;
        }
        if has_rom_signature(bus, addr) {
            log::debug!("Found option ROM signature at 0x{:05X}", addr);
            return true;
        }
        addr += SCAN_STRIDE;
    }

    false
}
