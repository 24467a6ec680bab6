//! Tick sources for calibration

use std::time::Instant;

use romflasher_core::bus::TickSource;

use crate::error::PhysmapError;
use crate::mapping::PhysMap;

/// Physical address of the BIOS data area tick count (0040:006C)
pub const BDA_TICK_ADDRESS: u64 = 0x46C;
/// PC BIOS timer period (65536 / 1.193182 MHz)
pub const BIOS_TICK_US: u32 = 54_925;
/// Period of [`ClockTicks`]
pub const CLOCK_TICK_US: u32 = 1_000;

/// Tick source counting whole milliseconds of the monotonic clock
///
/// Wraps after about 49 days, which the calibration only sees as one more
/// tick boundary.
pub struct ClockTicks {
    start: Instant,
}

impl ClockTicks {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for ClockTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for ClockTicks {
    fn now(&mut self) -> u32 {
        let elapsed = self.start.elapsed();
        (elapsed.as_micros() / CLOCK_TICK_US as u128) as u32
    }

    fn period_us(&self) -> u32 {
        CLOCK_TICK_US
    }
}

/// Tick source reading the BIOS data area counter
///
/// Only useful while something still advances the counter, e.g. under
/// firmware or an emulator that keeps the BIOS timer interrupt running.
/// When the counter never moves calibration fails with `TickStalled`.
pub struct BdaTicks {
    map: PhysMap,
}

impl BdaTicks {
    /// Map the BIOS data area tick counter
    pub fn open() -> Result<Self, PhysmapError> {
        let map = PhysMap::new(BDA_TICK_ADDRESS, 4)?;
        Ok(Self { map })
    }
}

impl TickSource for BdaTicks {
    fn now(&mut self) -> u32 {
        self.map.read32(0)
    }

    fn period_us(&self) -> u32 {
        BIOS_TICK_US
    }
}
