//! Calibrate command implementation

use crate::programmers;
use indicatif::{ProgressBar, ProgressStyle};
use romflasher_core::timing::{self, TimingLimits};
use std::time::Duration;

/// Address polled while calibrating (system BIOS, always mapped)
const PROBE_ADDRESS: u32 = 0xF0000;

/// Measure loops per millisecond and print the derived timeouts
pub fn run_calibrate(
    programmer: &str,
    limits: &TimingLimits,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut target = programmers::open_programmer(programmer)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Calibrating timeout timer...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = timing::calibrate(&mut *target.ticks, &mut *target.bus, PROBE_ADDRESS, limits);
    pb.finish_and_clear();
    let profile = result?;

    println!("Calibration ({}):", target.name);
    println!("  Loops per ms:          {}", profile.loops_per_ms);
    println!(
        "  Byte program timeout:  {} loops ({} us)",
        profile.byte_write_timeout_loops, limits.byte_write_timeout_us
    );
    println!(
        "  Sector erase timeout:  {} loops ({} ms)",
        profile.sector_erase_timeout_loops, limits.sector_erase_timeout_ms
    );
    Ok(true)
}
