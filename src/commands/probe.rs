//! Probe command implementation

use crate::programmers;
use romflasher_core::chip;
use romflasher_core::window::{self, BLOCK_SIZE};

/// Run the software ID sequence at `segment` and report what answered
pub fn run_probe(programmer: &str, segment: u16) -> Result<bool, Box<dyn std::error::Error>> {
    let dest = super::destination(segment)?;
    window::validate_range(dest, BLOCK_SIZE)?;
    let plan = window::plan_window(dest, BLOCK_SIZE);

    let mut target = programmers::open_programmer(programmer)?;

    let identity = chip::read_identity(&mut *target.bus, &plan);
    let signed = window::has_rom_signature(&mut *target.bus, dest);

    println!("Probed segment {:04X} through window {:04X}", segment, plan.base_segment());
    println!("  ID:     {:02X}:{:02X}", identity.vendor_id, identity.device_id);

    match identity.chip() {
        Some(info) => {
            println!("  Chip:   {}", info.name);
            println!("  Size:   {} bytes ({} KiB)", info.size, info.size / 1024);
            if signed {
                println!("  Option ROM signature present");
            }
            Ok(true)
        }
        None => {
            println!("No supported flash ROM detected");
            Ok(false)
        }
    }
}
