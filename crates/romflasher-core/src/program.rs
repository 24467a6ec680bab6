//! Sector erase and byte program
//!
//! Both operations are multi-cycle command sequences followed by data
//! polling: the chip returns status bits instead of array data until the
//! operation finishes, so the target address is read until it shows the
//! expected value or the polling budget runs out.
//!
//! The functions take the bus as it is borrowed from the caller's
//! [`CriticalSection`](crate::bus::CriticalSection); they do not open one
//! themselves.

use crate::bus::MemoryBus;
use crate::error::{Error, Result};
use crate::image::Block;
use crate::protocol::{self, PollStatus, ERASED_VALUE};
use crate::window::{AddressWindow, BLOCK_SIZE};

/// Whether the device already holds `block` at `dest`
pub fn block_matches<B: MemoryBus + ?Sized>(bus: &mut B, dest: u32, block: &Block) -> bool {
    let mut current = [0u8; BLOCK_SIZE as usize];
    bus.read(dest, &mut current);
    current == *block
}

/// Erase the sector at `dest`
///
/// # Errors
/// * `EraseTimeout` - `dest` did not read as erased within `timeout` polls
pub fn erase_block<B: MemoryBus + ?Sized>(
    bus: &mut B,
    window: &AddressWindow,
    dest: u32,
    timeout: u32,
) -> Result<()> {
    log::trace!("Erasing sector at 0x{:05X}", dest);

    protocol::command(bus, window, protocol::ERASE_SETUP);
    protocol::unlock(bus, window);
    bus.write8(dest, protocol::SECTOR_ERASE);

    protocol::wait_for_value(bus, dest, ERASED_VALUE, timeout).map_err(|last| {
        log::debug!(
            "Erase at 0x{:05X} still busy after {} polls (last read 0x{:02X}, {:?})",
            dest,
            timeout,
            last,
            PollStatus::decode(last)
        );
        Error::EraseTimeout { address: dest }
    })
}

/// Program `source` byte by byte starting at `dest`
///
/// The sector must already be erased. Stops at the first byte that does not
/// complete in time.
///
/// # Errors
/// * `ProgramTimeout` - a byte did not read back within `timeout` polls
pub fn program_block<B: MemoryBus + ?Sized>(
    bus: &mut B,
    window: &AddressWindow,
    source: &Block,
    dest: u32,
    timeout: u32,
) -> Result<()> {
    log::trace!("Programming sector at 0x{:05X}", dest);

    for (offset, &value) in source.iter().enumerate() {
        let addr = dest + offset as u32;

        protocol::command(bus, window, protocol::BYTE_PROGRAM);
        bus.write8(addr, value);

        if let Err(last) = protocol::wait_for_value(bus, addr, value, timeout) {
            log::debug!(
                "Program at 0x{:05X} (0x{:02X}) still busy after {} polls (last read 0x{:02X}, {:?})",
                addr,
                value,
                timeout,
                last,
                PollStatus::decode(last)
            );
            return Err(Error::ProgramTimeout { address: addr });
        }
    }

    Ok(())
}
