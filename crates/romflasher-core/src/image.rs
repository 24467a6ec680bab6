//! ROM images split into programming blocks

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{ArgumentError, Error, ImageLoadError, Result};
use crate::window::BLOCK_SIZE;

/// Option ROM images come in multiples of 2 KiB
pub const ROM_UNIT: usize = 2 * 1024;
/// Largest image accepted
pub const MAX_IMAGE_SIZE: usize = 256 * 1024;

/// One programming block
pub type Block = [u8; BLOCK_SIZE as usize];

/// An image padded out to whole blocks
///
/// Blocks are zero-filled past the end of the source data. The image is
/// immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomImage {
    blocks: Vec<Block>,
    original_len: usize,
}

impl RomImage {
    /// Build an image from raw bytes
    ///
    /// Without `size_override` the whole source is used and must not exceed
    /// [`MAX_IMAGE_SIZE`]. With an override (bytes, a non-zero multiple of
    /// [`ROM_UNIT`] up to [`MAX_IMAGE_SIZE`]) the source is truncated to it and
    /// zero blocks are added until the override is reached.
    ///
    /// # Errors
    /// * `InvalidArgument` - the override is not acceptable
    /// * `ImageLoad` - the source is empty, misaligned or too large
    pub fn from_bytes(data: &[u8], size_override: Option<u32>) -> Result<Self> {
        if let Some(bytes) = size_override {
            let size = bytes as usize;
            if size == 0 || size > MAX_IMAGE_SIZE || size % ROM_UNIT != 0 {
                return Err(ArgumentError::InvalidSizeOverride { bytes }.into());
            }
        } else if data.len() > MAX_IMAGE_SIZE {
            return Err(ImageLoadError::TooLarge {
                len: data.len(),
                max: MAX_IMAGE_SIZE,
            }
            .into());
        }

        let limit = size_override.map_or(MAX_IMAGE_SIZE, |b| b as usize);
        let source = &data[..data.len().min(limit)];

        if source.is_empty() {
            return Err(Error::ImageLoad(ImageLoadError::Empty));
        }
        if source.len() % ROM_UNIT != 0 {
            return Err(Error::ImageLoad(ImageLoadError::Misaligned {
                len: source.len(),
                unit: ROM_UNIT,
            }));
        }

        let wanted = source.len().max(size_override.unwrap_or(0) as usize);
        let block_size = BLOCK_SIZE as usize;
        let count = wanted.div_ceil(block_size);

        let mut blocks = vec![[0u8; BLOCK_SIZE as usize]; count];
        for (block, chunk) in blocks.iter_mut().zip(source.chunks(block_size)) {
            block[..chunk.len()].copy_from_slice(chunk);
        }

        let image = Self {
            blocks,
            original_len: source.len(),
        };

        if image.original_len < image.padded_len() {
            log::info!(
                "{}K image will be rounded up to {}K (4K multiple) with zeros",
                image.original_len / 1024,
                image.padded_len() / 1024
            );
        }

        Ok(image)
    }

    /// Blocks in programming order
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Bytes taken from the source
    pub fn original_len(&self) -> usize {
        self.original_len
    }

    /// Bytes that will be programmed (whole blocks)
    pub fn padded_len(&self) -> usize {
        self.blocks.len() * BLOCK_SIZE as usize
    }

    /// Iterate over `(address, block)` pairs for an image placed at `base`
    pub fn placed_at(&self, base: u32) -> impl Iterator<Item = (u32, &Block)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .map(move |(i, block)| (base + i as u32 * BLOCK_SIZE, block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8 + 1).collect()
    }

    #[test]
    fn test_exact_blocks() {
        let data = pattern(8192);
        let image = RomImage::from_bytes(&data, None).unwrap();
        assert_eq!(image.block_count(), 2);
        assert_eq!(image.original_len(), 8192);
        assert_eq!(image.padded_len(), 8192);
        assert_eq!(&image.blocks()[1][..], &data[4096..]);
    }

    #[test]
    fn test_rounds_up_with_zeros() {
        let data = pattern(6144);
        let image = RomImage::from_bytes(&data, None).unwrap();
        assert_eq!(image.block_count(), 2);
        assert_eq!(image.original_len(), 6144);
        assert_eq!(image.padded_len(), 8192);
        assert_eq!(&image.blocks()[1][..2048], &data[4096..]);
        assert!(image.blocks()[1][2048..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rejects_misaligned_source() {
        let data = pattern(3000);
        assert_eq!(
            RomImage::from_bytes(&data, None),
            Err(Error::ImageLoad(ImageLoadError::Misaligned {
                len: 3000,
                unit: ROM_UNIT
            }))
        );
    }

    #[test]
    fn test_rejects_empty_source() {
        assert_eq!(
            RomImage::from_bytes(&[], None),
            Err(Error::ImageLoad(ImageLoadError::Empty))
        );
    }

    #[test]
    fn test_rejects_oversize_source() {
        let data = vec![0u8; MAX_IMAGE_SIZE + ROM_UNIT];
        assert!(matches!(
            RomImage::from_bytes(&data, None),
            Err(Error::ImageLoad(ImageLoadError::TooLarge { .. }))
        ));
    }

    #[test]
    fn test_override_truncates() {
        let data = pattern(32 * 1024);
        let image = RomImage::from_bytes(&data, Some(8 * 1024)).unwrap();
        assert_eq!(image.block_count(), 2);
        assert_eq!(image.original_len(), 8 * 1024);
        assert_eq!(&image.blocks()[0][..], &data[..4096]);
    }

    #[test]
    fn test_override_pads() {
        let data = pattern(4096);
        let image = RomImage::from_bytes(&data, Some(32 * 1024)).unwrap();
        assert_eq!(image.block_count(), 8);
        assert_eq!(image.original_len(), 4096);
        assert!(image.blocks()[1..].iter().all(|b| b.iter().all(|&x| x == 0)));
    }

    #[test]
    fn test_override_allows_oversize_source() {
        let data = vec![0x11u8; MAX_IMAGE_SIZE * 2];
        let image = RomImage::from_bytes(&data, Some(MAX_IMAGE_SIZE as u32)).unwrap();
        assert_eq!(image.padded_len(), MAX_IMAGE_SIZE);
    }

    #[test]
    fn test_override_validation() {
        let data = pattern(4096);
        for bytes in [0u32, 3000, (MAX_IMAGE_SIZE + ROM_UNIT) as u32] {
            assert_eq!(
                RomImage::from_bytes(&data, Some(bytes)),
                Err(Error::InvalidArgument(ArgumentError::InvalidSizeOverride {
                    bytes
                }))
            );
        }
    }

    #[test]
    fn test_placed_at() {
        let image = RomImage::from_bytes(&pattern(8192), None).unwrap();
        let addrs: Vec<u32> = image.placed_at(0xD0000).map(|(a, _)| a).collect();
        assert_eq!(addrs, vec![0xD0000, 0xD1000]);
    }
}
