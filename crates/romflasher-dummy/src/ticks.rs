//! Simulated BIOS timer

use romflasher_core::bus::TickSource;

/// PC BIOS timer period (65536 / 1.193182 MHz)
pub const BIOS_TICK_US: u32 = 54_925;

/// Tick source that advances after a fixed number of reads
///
/// Because calibration reads the tick once per polling loop, the calibrated
/// rate comes out as `reads_per_tick * 1000 / period_us` loops per
/// millisecond, independent of how fast the test host is.
#[derive(Debug, Clone)]
pub struct DummyTicks {
    reads: u64,
    reads_per_tick: u32,
    period_us: u32,
}

impl DummyTicks {
    /// Tick every `reads_per_tick` reads with the BIOS timer period
    pub fn new(reads_per_tick: u32) -> Self {
        Self {
            reads: 0,
            reads_per_tick: reads_per_tick.max(1),
            period_us: BIOS_TICK_US,
        }
    }

    /// Ticks simulating a host that manages `loops_per_ms` polls per millisecond
    pub fn with_rate(loops_per_ms: u32) -> Self {
        let reads = (loops_per_ms as u64 * BIOS_TICK_US as u64 / 1000).min(u32::MAX as u64);
        Self::new(reads as u32)
    }
}

impl Default for DummyTicks {
    fn default() -> Self {
        Self::with_rate(100)
    }
}

impl TickSource for DummyTicks {
    fn now(&mut self) -> u32 {
        self.reads += 1;
        (self.reads / self.reads_per_tick as u64) as u32
    }

    fn period_us(&self) -> u32 {
        self.period_us
    }
}
