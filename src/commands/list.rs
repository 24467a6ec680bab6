//! List commands implementation

use crate::programmers;
use romflasher_core::chip::KNOWN_CHIPS;

/// List all supported programmers
pub fn list_programmers() {
    println!("Supported programmers:");
    println!();
    for p in programmers::available_programmers() {
        println!("  {:10} - {}", p.name, p.description);
    }
}

/// List all supported chips
pub fn list_chips() {
    println!("Supported flash chips:");
    println!();
    println!("{:<12} {:>10} {:>10}", "Name", "Size", "ID");
    println!("{}", "-".repeat(34));

    for chip in KNOWN_CHIPS {
        let id_str = format!("{:02X}:{:02X}", chip.vendor_id, chip.device_id);
        println!("{:<12} {:>10} {:>10}", chip.name, format_size(chip.size), id_str);
    }
}

fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
