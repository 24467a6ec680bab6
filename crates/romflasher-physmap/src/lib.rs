//! romflasher-physmap - Real hardware access for romflasher
//!
//! Maps the banked ROM area (A000-FFFF) through `/dev/mem`, giving a
//! [`LegacyWindow`] memory bus. That needs root and a kernel that allows
//! `/dev/mem` access below 1 MiB (`CONFIG_STRICT_DEVMEM` permits this range
//! on x86).
//!
//! Timing comes from [`ClockTicks`], a coarse counter over the monotonic
//! clock. [`BdaTicks`] reads the BIOS data area counter instead, which only
//! advances where firmware still services the timer interrupt.

mod error;
mod mapping;
mod ticks;
mod window;

pub use error::PhysmapError;
pub use ticks::{BdaTicks, ClockTicks, BDA_TICK_ADDRESS, BIOS_TICK_US, CLOCK_TICK_US};
pub use window::LegacyWindow;
