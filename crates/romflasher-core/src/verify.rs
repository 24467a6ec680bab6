//! Read-back verification

use crate::bus::MemoryBus;
use crate::error::{Error, Result};
use crate::image::RomImage;
use crate::window::BLOCK_SIZE;

/// Compare the device contents at `destination` with `image`
///
/// # Errors
/// * `VerifyMismatch` - with the first differing address
pub fn verify<B: MemoryBus + ?Sized>(bus: &mut B, destination: u32, image: &RomImage) -> Result<()> {
    let mut current = [0u8; BLOCK_SIZE as usize];

    for (addr, block) in image.placed_at(destination) {
        bus.read(addr, &mut current);
        if current == *block {
            continue;
        }

        // Block differs, report the first byte
        if let Some((i, (&found, &expected))) = current
            .iter()
            .zip(block.iter())
            .enumerate()
            .find(|(_, (a, b))| a != b)
        {
            return Err(Error::VerifyMismatch {
                address: addr + i as u32,
                expected,
                found,
            });
        }
    }

    Ok(())
}
