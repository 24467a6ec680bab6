//! Physical memory mapping
//!
//! Wraps an `mmap` of `/dev/mem`. Opening with `O_SYNC` gives an uncached
//! mapping, so every volatile access reaches the bus as a real cycle, which
//! the flash command protocol depends on.

use crate::error::PhysmapError;

/// A mapped region of physical memory
#[cfg(target_os = "linux")]
pub struct PhysMap {
    /// Start of the requested range inside the mapping
    ptr: *mut u8,
    /// Bytes requested
    len: usize,
    /// Page offset of `ptr` from the start of the mapping
    offset: usize,
    /// Bytes actually mapped
    map_size: usize,
    phys_addr: u64,
}

#[cfg(target_os = "linux")]
impl PhysMap {
    /// Map `len` bytes of physical memory starting at `phys_addr`
    pub fn new(phys_addr: u64, len: usize) -> Result<Self, PhysmapError> {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;
        use std::os::unix::io::AsRawFd;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open("/dev/mem")
            .map_err(PhysmapError::Open)?;

        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
        let page_mask = page_size - 1;
        let offset = (phys_addr as usize) & page_mask;
        let aligned_addr = phys_addr & !(page_mask as u64);
        let map_size = (len + offset + page_mask) & !page_mask;

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                aligned_addr as libc::off_t,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(PhysmapError::Map {
                address: phys_addr,
                size: len,
                source: std::io::Error::last_os_error(),
            });
        }

        log::debug!(
            "Mapped {:#x} bytes of physical memory at {:#x}",
            map_size,
            aligned_addr
        );

        Ok(Self {
            ptr: unsafe { (ptr as *mut u8).add(offset) },
            len,
            offset,
            map_size,
            phys_addr,
        })
    }

    /// Read a byte at `offset` from the start of the range
    #[inline]
    pub fn read8(&self, offset: usize) -> u8 {
        assert!(offset < self.len, "physmap read outside mapping");
        unsafe { core::ptr::read_volatile(self.ptr.add(offset)) }
    }

    /// Read an aligned 32-bit value
    #[inline]
    pub fn read32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.len, "physmap read outside mapping");
        debug_assert!((self.phys_addr as usize + offset) & 3 == 0, "unaligned 32-bit read");
        unsafe { core::ptr::read_volatile(self.ptr.add(offset) as *const u32) }
    }

    /// Write a byte at `offset` from the start of the range
    #[inline]
    pub fn write8(&self, offset: usize, value: u8) {
        assert!(offset < self.len, "physmap write outside mapping");
        unsafe { core::ptr::write_volatile(self.ptr.add(offset), value) }
    }
}

#[cfg(target_os = "linux")]
impl Drop for PhysMap {
    fn drop(&mut self) {
        unsafe {
            let base = self.ptr.sub(self.offset);
            libc::munmap(base as *mut libc::c_void, self.map_size);
        }
    }
}

// The mapping is plain device memory with no thread affinity
#[cfg(target_os = "linux")]
unsafe impl Send for PhysMap {}

// Stub for other platforms
#[cfg(not(target_os = "linux"))]
pub struct PhysMap {
    _private: (),
}

#[cfg(not(target_os = "linux"))]
impl PhysMap {
    /// Always fails: physical memory access needs Linux /dev/mem
    pub fn new(_phys_addr: u64, _len: usize) -> Result<Self, PhysmapError> {
        Err(PhysmapError::NotSupported(
            "Physical memory mapping only supported on Linux",
        ))
    }

    pub fn read8(&self, _offset: usize) -> u8 {
        0xFF
    }
    pub fn read32(&self, _offset: usize) -> u32 {
        0
    }
    pub fn write8(&self, _offset: usize, _value: u8) {}
}
