//! Memory bus over the banked ROM area

use std::sync::{Condvar, Mutex};

use romflasher_core::bus::MemoryBus;
use romflasher_core::window::{BANKED_END, BANKED_START};

use crate::error::PhysmapError;
use crate::mapping::PhysMap;

/// Held by whichever window is inside a critical section
static FLASH_LOCK: Mutex<bool> = Mutex::new(false);
static FLASH_LOCK_FREE: Condvar = Condvar::new();

fn lock_flash() {
    let mut held = FLASH_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    while *held {
        held = FLASH_LOCK_FREE
            .wait(held)
            .unwrap_or_else(|e| e.into_inner());
    }
    *held = true;
}

fn unlock_flash() {
    let mut held = FLASH_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    *held = false;
    FLASH_LOCK_FREE.notify_one();
}

/// Scheduling state saved while running at real-time priority
#[cfg(target_os = "linux")]
struct SavedScheduling {
    policy: libc::c_int,
    param: libc::sched_param,
}

#[cfg(target_os = "linux")]
fn raise_priority() -> Option<SavedScheduling> {
    unsafe {
        let policy = libc::sched_getscheduler(0);
        let mut param: libc::sched_param = std::mem::zeroed();
        if policy < 0 || libc::sched_getparam(0, &mut param) != 0 {
            return None;
        }

        let mut fifo: libc::sched_param = std::mem::zeroed();
        fifo.sched_priority = libc::sched_get_priority_max(libc::SCHED_FIFO);
        if libc::sched_setscheduler(0, libc::SCHED_FIFO, &fifo) != 0 {
            log::warn!(
                "Could not switch to SCHED_FIFO: {}",
                std::io::Error::last_os_error()
            );
            return None;
        }
        Some(SavedScheduling { policy, param })
    }
}

#[cfg(target_os = "linux")]
fn restore_priority(saved: SavedScheduling) {
    let rc = unsafe { libc::sched_setscheduler(0, saved.policy, &saved.param) };
    if rc != 0 {
        log::warn!(
            "Could not restore scheduling policy: {}",
            std::io::Error::last_os_error()
        );
    }
}

/// The banked ROM area A0000-FFFFF mapped from `/dev/mem`
///
/// Addresses passed to the [`MemoryBus`] methods are physical. Accesses
/// outside the banked area read as 0xFF and drop writes.
///
/// Userspace cannot mask interrupts, so a critical section here means
/// holding a process-wide lock and running at `SCHED_FIFO` priority. That
/// keeps other threads of this process off the chip and keeps the polling
/// loops from being preempted for long enough to blow their budgets.
pub struct LegacyWindow {
    map: PhysMap,
    depth: u32,
    #[cfg(target_os = "linux")]
    saved: Option<SavedScheduling>,
}

impl LegacyWindow {
    /// Map the banked ROM area
    pub fn open() -> Result<Self, PhysmapError> {
        let map = PhysMap::new(BANKED_START as u64, (BANKED_END - BANKED_START) as usize)?;
        log::info!(
            "Mapped legacy ROM window {:#07x}-{:#07x}",
            BANKED_START,
            BANKED_END - 1
        );
        Ok(Self {
            map,
            depth: 0,
            #[cfg(target_os = "linux")]
            saved: None,
        })
    }

    #[cfg(target_os = "linux")]
    fn start_realtime(&mut self) {
        self.saved = raise_priority();
    }

    #[cfg(target_os = "linux")]
    fn stop_realtime(&mut self) {
        if let Some(saved) = self.saved.take() {
            restore_priority(saved);
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn start_realtime(&mut self) {}

    #[cfg(not(target_os = "linux"))]
    fn stop_realtime(&mut self) {}

    fn offset(&self, addr: u32) -> Option<usize> {
        if (BANKED_START..BANKED_END).contains(&addr) {
            Some((addr - BANKED_START) as usize)
        } else {
            None
        }
    }
}

impl MemoryBus for LegacyWindow {
    fn read8(&mut self, addr: u32) -> u8 {
        match self.offset(addr) {
            Some(offset) => self.map.read8(offset),
            None => {
                log::trace!("read outside banked area at {:#x}", addr);
                0xFF
            }
        }
    }

    fn write8(&mut self, addr: u32, value: u8) {
        match self.offset(addr) {
            Some(offset) => self.map.write8(offset, value),
            None => log::warn!("Dropping write outside banked area at {:#x}", addr),
        }
    }

    fn enter_critical(&mut self) {
        self.depth += 1;
        if self.depth > 1 {
            return;
        }
        lock_flash();
        self.start_realtime();
    }

    fn exit_critical(&mut self) {
        match self.depth {
            0 => return,
            1 => {}
            _ => {
                self.depth -= 1;
                return;
            }
        }
        self.depth = 0;
        self.stop_realtime();
        unlock_flash();
    }
}

impl Drop for LegacyWindow {
    fn drop(&mut self) {
        if self.depth > 0 {
            self.depth = 1;
            self.exit_critical();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_flash_lock_excludes_second_holder() {
        lock_flash();
        let acquired = Arc::new(AtomicBool::new(false));
        let flag = acquired.clone();
        let waiter = thread::spawn(move || {
            lock_flash();
            flag.store(true, Ordering::SeqCst);
            unlock_flash();
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));
        unlock_flash();
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    #[ignore] // Requires root and /dev/mem access
    fn test_open_legacy_window() {
        let mut window = LegacyWindow::open().unwrap();
        let _ = window.read8(0xF0000);
    }
}
