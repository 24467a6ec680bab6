//! JEDEC parallel flash command protocol
//!
//! Command bytes and trigger offsets for the SST39SF-style software command
//! set, plus the helpers that put them on the bus. Offsets are relative to
//! the sequence window base chosen by [`crate::window::plan_window`].

use crate::bus::MemoryBus;
use crate::window::AddressWindow;
use bitflags::bitflags;

// ============================================================================
// Trigger offsets
// ============================================================================

/// First unlock cycle and command cycle offset
pub const UNLOCK1_OFFSET: u32 = 0x5555;
/// Second unlock cycle offset
pub const UNLOCK2_OFFSET: u32 = 0x2AAA;

// ============================================================================
// Command bytes
// ============================================================================

/// First unlock byte
pub const UNLOCK1: u8 = 0xAA;
/// Second unlock byte
pub const UNLOCK2: u8 = 0x55;
/// Software ID entry
pub const SOFTWARE_ID_ENTRY: u8 = 0x90;
/// Software ID exit
pub const SOFTWARE_ID_EXIT: u8 = 0xF0;
/// Erase setup, followed by a second unlock
pub const ERASE_SETUP: u8 = 0x80;
/// Sector erase, written to the target sector
pub const SECTOR_ERASE: u8 = 0x30;
/// Byte program, followed by the data byte at its address
pub const BYTE_PROGRAM: u8 = 0xA0;

/// Value of an erased byte (all bits set)
pub const ERASED_VALUE: u8 = 0xFF;

bitflags! {
    /// Status bits driven on the data lines while an operation is running
    ///
    /// During program or erase the chip does not return array data. DQ7 reads
    /// as the complement of the byte being written, DQ6 toggles on every read
    /// and some parts raise DQ5 when the internal timer expires.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PollStatus: u8 {
        /// Data# polling bit
        const DATA_POLL = 1 << 7;
        /// Toggle bit
        const TOGGLE = 1 << 6;
        /// Exceeded timing limits
        const TIMING_EXCEEDED = 1 << 5;
    }
}

impl PollStatus {
    /// Status byte a busy chip presents while writing `target`
    ///
    /// `toggle` is the current state of the toggle bit.
    pub fn busy(target: u8, toggle: bool) -> u8 {
        let mut status = PollStatus::empty();
        if target & PollStatus::DATA_POLL.bits() == 0 {
            status |= PollStatus::DATA_POLL;
        }
        if toggle {
            status |= PollStatus::TOGGLE;
        }
        status.bits()
    }

    /// Decode the status bits of a byte read while polling
    pub fn decode(value: u8) -> Self {
        PollStatus::from_bits_truncate(value)
    }
}

/// Issue the two unlock cycles
pub fn unlock<B: MemoryBus + ?Sized>(bus: &mut B, window: &AddressWindow) {
    bus.write8(window.base + UNLOCK1_OFFSET, UNLOCK1);
    bus.write8(window.base + UNLOCK2_OFFSET, UNLOCK2);
}

/// Issue an unlocked command byte at the command offset
pub fn command<B: MemoryBus + ?Sized>(bus: &mut B, window: &AddressWindow, cmd: u8) {
    unlock(bus, window);
    bus.write8(window.base + UNLOCK1_OFFSET, cmd);
}

/// Enter software ID mode
pub fn software_id_entry<B: MemoryBus + ?Sized>(bus: &mut B, window: &AddressWindow) {
    command(bus, window, SOFTWARE_ID_ENTRY);
}

/// Leave software ID mode (single cycle, no unlock)
pub fn software_id_exit<B: MemoryBus + ?Sized>(bus: &mut B, window: &AddressWindow) {
    bus.write8(window.base + UNLOCK1_OFFSET, SOFTWARE_ID_EXIT);
}

/// Poll `addr` until it reads `value` or `timeout` reads have been made
///
/// Returns the last value read when the wait times out.
pub fn wait_for_value<B: MemoryBus + ?Sized>(
    bus: &mut B,
    addr: u32,
    value: u8,
    timeout: u32,
) -> core::result::Result<(), u8> {
    let mut last = bus.read8(addr);
    if last == value {
        return Ok(());
    }
    for _ in 1..timeout {
        last = bus.read8(addr);
        if last == value {
            return Ok(());
        }
    }
    Err(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::RamBus;
    use crate::window::plan_window;

    #[test]
    fn test_command_cycles_land_on_window_offsets() {
        let mut bus = RamBus::filled(0);
        let window = plan_window(0xD0000, 0x2000);
        command(&mut bus, &window, BYTE_PROGRAM);
        assert_eq!(bus.memory[0xD5555], BYTE_PROGRAM);
        assert_eq!(bus.memory[0xD2AAA], UNLOCK2);
    }

    #[test]
    fn test_busy_status() {
        let status = PollStatus::decode(PollStatus::busy(0x00, true));
        assert!(status.contains(PollStatus::DATA_POLL | PollStatus::TOGGLE));

        let status = PollStatus::decode(PollStatus::busy(0xFF, false));
        assert!(status.is_empty());
    }

    #[test]
    fn test_wait_for_value() {
        let mut bus = RamBus::filled(0x12);
        assert_eq!(wait_for_value(&mut bus, 0xC0000, 0x12, 1), Ok(()));
        assert_eq!(wait_for_value(&mut bus, 0xC0000, 0xFF, 100), Err(0x12));
    }
}
