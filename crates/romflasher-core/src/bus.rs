//! Device access traits
//!
//! The engine never touches memory directly. Everything goes through a
//! [`MemoryBus`], which maps physical addresses in the legacy ROM area to
//! byte reads and writes, and a [`TickSource`], which provides the coarse
//! free-running timer used for calibration.
//!
//! Multi-step command sequences must not be interleaved with any other access
//! to the window, so they run under a [`CriticalSection`] guard.

use core::ops::{Deref, DerefMut};

/// Byte-wide access to the banked memory window
///
/// Addresses are absolute physical addresses (`segment << 4`). Reads take
/// `&mut self` because reads from a flash chip in a command or busy state
/// have side effects (toggle bits, status output).
pub trait MemoryBus {
    /// Read one byte
    fn read8(&mut self, addr: u32) -> u8;

    /// Write one byte
    fn write8(&mut self, addr: u32, value: u8);

    /// Read a run of bytes starting at `addr`
    fn read(&mut self, addr: u32, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.read8(addr + i as u32);
        }
    }

    /// Suppress anything that could touch the window asynchronously
    ///
    /// Called when a [`CriticalSection`] is opened. The default does nothing,
    /// which is correct for backends that are never shared.
    fn enter_critical(&mut self) {}

    /// Undo [`enter_critical`](Self::enter_critical)
    fn exit_critical(&mut self) {}
}

/// Coarse free-running timer
pub trait TickSource {
    /// Current counter value. Only changes between calls matter.
    fn now(&mut self) -> u32;

    /// Length of one tick in microseconds
    fn period_us(&self) -> u32;
}

/// Scoped critical section over a [`MemoryBus`]
///
/// Entering happens in [`CriticalSection::new`] and leaving happens on drop,
/// so every early return (timeouts included) releases the section.
pub struct CriticalSection<'a, B: MemoryBus + ?Sized> {
    bus: &'a mut B,
}

impl<'a, B: MemoryBus + ?Sized> CriticalSection<'a, B> {
    /// Enter a critical section on `bus`
    pub fn new(bus: &'a mut B) -> Self {
        log::trace!("entering critical section");
        bus.enter_critical();
        Self { bus }
    }
}

impl<B: MemoryBus + ?Sized> Deref for CriticalSection<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.bus
    }
}

impl<B: MemoryBus + ?Sized> DerefMut for CriticalSection<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.bus
    }
}

impl<B: MemoryBus + ?Sized> Drop for CriticalSection<'_, B> {
    fn drop(&mut self) {
        self.bus.exit_critical();
        log::trace!("left critical section");
    }
}
