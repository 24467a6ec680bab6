//! Chip identification
//!
//! Parts are identified through the JEDEC software ID mode: after the entry
//! sequence the chip returns its vendor ID at offset 0 and its device ID at
//! offset 1 instead of array data, until the exit command is written.

use core::fmt;

use crate::bus::{CriticalSection, MemoryBus};
use crate::protocol;
use crate::window::AddressWindow;

/// SST (Microchip) JEDEC vendor ID
pub const VENDOR_SST: u8 = 0xBF;

/// Reads discarded after entering ID mode to let the chip switch over
const ID_SETTLE_READS: usize = 3;

/// A supported flash part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipInfo {
    /// JEDEC vendor ID
    pub vendor_id: u8,
    /// Device ID
    pub device_id: u8,
    /// Part name
    pub name: &'static str,
    /// Capacity in bytes
    pub size: u32,
}

/// Parts answering the software ID sequence that this engine can program
pub static KNOWN_CHIPS: &[ChipInfo] = &[
    ChipInfo {
        vendor_id: VENDOR_SST,
        device_id: 0xB4,
        name: "SST39SF512",
        size: 64 * 1024,
    },
    ChipInfo {
        vendor_id: VENDOR_SST,
        device_id: 0xB5,
        name: "SST39SF010",
        size: 128 * 1024,
    },
    ChipInfo {
        vendor_id: VENDOR_SST,
        device_id: 0xB6,
        name: "SST39SF020",
        size: 256 * 1024,
    },
    ChipInfo {
        vendor_id: VENDOR_SST,
        device_id: 0xB7,
        name: "SST39SF040",
        size: 512 * 1024,
    },
];

/// Find a known chip by its ID bytes
pub fn lookup(vendor_id: u8, device_id: u8) -> Option<&'static ChipInfo> {
    KNOWN_CHIPS
        .iter()
        .find(|c| c.vendor_id == vendor_id && c.device_id == device_id)
}

/// Find a known chip by name (case-insensitive)
pub fn find_by_name(name: &str) -> Option<&'static ChipInfo> {
    KNOWN_CHIPS.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

/// ID bytes read from the device and the part they resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Vendor byte
    pub vendor_id: u8,
    /// Device byte
    pub device_id: u8,
    /// Part name if the pair is known
    pub name: Option<&'static str>,
}

impl DeviceIdentity {
    /// Resolve an ID pair against [`KNOWN_CHIPS`]
    pub fn from_ids(vendor_id: u8, device_id: u8) -> Self {
        Self {
            vendor_id,
            device_id,
            name: lookup(vendor_id, device_id).map(|c| c.name),
        }
    }

    /// Full chip description, if known
    pub fn chip(&self) -> Option<&'static ChipInfo> {
        lookup(self.vendor_id, self.device_id)
    }

    /// Whether the pair matched a known part
    pub fn is_known(&self) -> bool {
        self.name.is_some()
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "{} ({:02X}:{:02X})", name, self.vendor_id, self.device_id),
            None => write!(f, "unknown ({:02X}:{:02X})", self.vendor_id, self.device_id),
        }
    }
}

/// Run the software ID sequence and return whatever the device answered
pub fn read_identity<B: MemoryBus + ?Sized>(bus: &mut B, window: &AddressWindow) -> DeviceIdentity {
    let dest = window.destination;
    let (vendor_id, device_id) = {
        let mut cs = CriticalSection::new(bus);

        protocol::software_id_entry(&mut *cs, window);
        for _ in 0..ID_SETTLE_READS {
            let _ = cs.read8(dest);
        }
        let vendor_id = cs.read8(dest);
        let device_id = cs.read8(dest + 1);
        protocol::software_id_exit(&mut *cs, window);

        (vendor_id, device_id)
    };

    let identity = DeviceIdentity::from_ids(vendor_id, device_id);
    log::debug!("Software ID at 0x{:05X}: {}", dest, identity);
    identity
}

/// Identify the chip behind `window`
///
/// Returns `None` if the ID pair is not a known part.
pub fn identify<B: MemoryBus + ?Sized>(
    bus: &mut B,
    window: &AddressWindow,
) -> Option<DeviceIdentity> {
    Some(read_identity(bus, window)).filter(DeviceIdentity::is_known)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_parts() {
        assert_eq!(lookup(0xBF, 0xB4).map(|c| c.name), Some("SST39SF512"));
        assert_eq!(lookup(0xBF, 0xB5).map(|c| c.name), Some("SST39SF010"));
        assert_eq!(lookup(0xBF, 0xB6).map(|c| c.name), Some("SST39SF020"));
        assert_eq!(lookup(0xBF, 0xB7).map(|c| c.name), Some("SST39SF040"));
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup(0x01, 0xB6).is_none());
        assert!(lookup(0xBF, 0xB8).is_none());
        assert!(!DeviceIdentity::from_ids(0xFF, 0xFF).is_known());
    }

    #[test]
    fn test_find_by_name() {
        assert_eq!(find_by_name("sst39sf020").map(|c| c.size), Some(256 * 1024));
        assert!(find_by_name("W25Q128").is_none());
    }
}
