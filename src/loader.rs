//! ROM image file loading

use romflasher_core::image::RomImage;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: romflasher_core::Error,
    },
}

/// Read `path` and split it into programming blocks
pub fn load_image(path: &Path, size_override: Option<u32>) -> Result<RomImage, LoadError> {
    let data = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Read {} bytes from {}", data.len(), path.display());

    RomImage::from_bytes(&data, size_override).map_err(|source| LoadError::Image {
        path: path.to_path_buf(),
        source,
    })
}
