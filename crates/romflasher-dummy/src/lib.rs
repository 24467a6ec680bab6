//! romflasher-dummy - In-memory flash ROM emulator for testing
//!
//! This crate provides a simulated 1 MiB real-mode address space with an
//! SST39SF0x0 chip mapped into the upper memory area. The chip runs the same
//! software command state machine as the real part, including data polling,
//! so the engine in `romflasher-core` can be exercised without hardware.
//! A matching simulated tick source is provided for calibration.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod emulator;
mod ticks;

pub use emulator::{DummyConfig, DummyRom, Faults};
pub use ticks::DummyTicks;

#[cfg(test)]
mod flow_tests;
