//! Busy-wait calibration
//!
//! The target has no high resolution timer, so every timeout is expressed as
//! a number of polling reads. This module measures how many polling reads fit
//! into one period of a coarse tick (the 18.2 Hz BIOS timer on a PC) and turns
//! that into loop counts for the datasheet timeouts.

use crate::bus::{MemoryBus, TickSource};
use crate::error::{Error, Result};

/// Datasheet maximum byte program time is 20us, this is 10x that
pub const BYTE_WRITE_TIMEOUT_US: u32 = 200;
/// Datasheet maximum sector erase time is 25ms, this is 10x that
pub const SECTOR_ERASE_TIMEOUT_MS: u32 = 250;
/// Tick reads allowed while waiting for the first tick boundary
pub const MAX_TICK_WAIT_LOOPS: u32 = 0x4000_0000;
/// Polling reads counted in one tick period before the count is clamped
pub const MAX_CALIBRATION_LOOPS: u32 = u32::MAX;

/// Timeout limits used to derive a [`TimingProfile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingLimits {
    /// Byte program timeout in microseconds
    pub byte_write_timeout_us: u32,
    /// Sector erase timeout in milliseconds
    pub sector_erase_timeout_ms: u32,
    /// Give up calibration if the tick has not moved after this many reads
    pub max_tick_wait_loops: u32,
    /// Clamp for the reads counted during one tick period
    pub max_calibration_loops: u32,
}

impl Default for TimingLimits {
    fn default() -> Self {
        Self {
            byte_write_timeout_us: BYTE_WRITE_TIMEOUT_US,
            sector_erase_timeout_ms: SECTOR_ERASE_TIMEOUT_MS,
            max_tick_wait_loops: MAX_TICK_WAIT_LOOPS,
            max_calibration_loops: MAX_CALIBRATION_LOOPS,
        }
    }
}

/// Calibrated polling budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingProfile {
    /// Polling reads per millisecond on this host
    pub loops_per_ms: u32,
    /// Polling reads allowed for one byte program
    pub byte_write_timeout_loops: u32,
    /// Polling reads allowed for one sector erase
    pub sector_erase_timeout_loops: u32,
}

impl TimingProfile {
    /// Derive the timeouts from a loops-per-millisecond figure
    pub fn from_loops_per_ms(loops_per_ms: u32, limits: &TimingLimits) -> Self {
        let loops_per_ms = loops_per_ms.max(1);
        let byte = (loops_per_ms as u64 * limits.byte_write_timeout_us as u64 / 1000).max(1);
        let erase = (loops_per_ms as u64 * limits.sector_erase_timeout_ms as u64).max(1);

        Self {
            loops_per_ms,
            byte_write_timeout_loops: saturate(byte),
            sector_erase_timeout_loops: saturate(erase),
        }
    }
}

fn saturate(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}

/// Measure polling speed against `ticks`
///
/// Waits for a tick boundary, then counts reads of `probe_addr` until the
/// next boundary. Reading the flash itself gives the slow bus timing that
/// the real polling loops will see.
///
/// # Errors
/// * `TickStalled` - the tick did not change within `limits.max_tick_wait_loops` reads
pub fn calibrate<T, B>(
    ticks: &mut T,
    bus: &mut B,
    probe_addr: u32,
    limits: &TimingLimits,
) -> Result<TimingProfile>
where
    T: TickSource + ?Sized,
    B: MemoryBus + ?Sized,
{
    let start = ticks.now();
    let mut waited = 0u32;
    let boundary = loop {
        let now = ticks.now();
        if now != start {
            break now;
        }
        waited += 1;
        if waited >= limits.max_tick_wait_loops {
            log::error!("Tick source stuck at {} after {} reads", start, waited);
            return Err(Error::TickStalled);
        }
    };

    let mut count = 0u32;
    while ticks.now() == boundary {
        let _ = bus.read8(probe_addr);
        if count >= limits.max_calibration_loops {
            log::warn!("Calibration counter saturated, treating host as very slow");
            break;
        }
        count += 1;
    }

    let period_us = ticks.period_us().max(1);
    let loops_per_ms = saturate(count as u64 * 1000 / period_us as u64);
    log::debug!(
        "{} polling reads in one {}us tick ({} per ms)",
        count,
        period_us,
        loops_per_ms
    );

    Ok(TimingProfile::from_loops_per_ms(loops_per_ms, limits))
}
