//! romflasher-core - Engine for programming parallel flash ROMs
//!
//! This crate programs JEDEC-compatible parallel NOR flash chips (the SST39SF0x0
//! family) that are visible to the host through the legacy upper memory area
//! (physical `0xA0000..0x100000`) instead of through a dedicated flash controller.
//! All device access goes through the [`bus::MemoryBus`] trait, so the same
//! engine drives real hardware and the in-memory emulator used by the tests.
//!
//! The engine is built from small pieces, leaves first:
//!
//! - [`timing`] - busy-wait calibration against a coarse tick source
//! - [`window`] - placement of the 32 KiB command sequence window
//! - [`chip`] - software ID probing and the known chip table
//! - [`program`] - sector erase and byte program with data polling
//! - [`verify`] - read-back comparison
//! - [`flow`] - the state machine tying everything together
//!
//! # Example
//!
//! ```ignore
//! use romflasher_core::flow::{self, FlashRequest, Unattended};
//! use romflasher_core::image::RomImage;
//!
//! let image = RomImage::from_bytes(&data, None)?;
//! let request = FlashRequest::new(0xD0000, &image);
//! let outcome = flow::run(&mut bus, &mut ticks, &request, &mut Unattended)?;
//! println!("{}", outcome.status);
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bus;
pub mod chip;
pub mod error;
pub mod flow;
pub mod image;
pub mod program;
pub mod protocol;
pub mod timing;
pub mod verify;
pub mod window;

pub use error::{ArgumentError, Error, ImageLoadError, Result};
