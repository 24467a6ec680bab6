//! CLI command implementations
//!
//! Each command checks its arguments and loads its inputs before opening the
//! programmer, so bad input never touches hardware. Commands return whether
//! they reached their goal, which decides the exit status.

mod calibrate;
mod flash;
mod list;
mod probe;
mod verify;

pub use calibrate::run_calibrate;
pub use flash::run_flash;
pub use list::{list_chips, list_programmers};
pub use probe::run_probe;
pub use verify::run_verify;

use romflasher_core::window;

/// Convert a segment argument to a physical address, logging the result
fn destination(segment: u16) -> Result<u32, romflasher_core::Error> {
    let address = window::segment_to_address(segment)?;
    log::debug!("Segment {:04X} is physical address {:#07x}", segment, address);
    Ok(address)
}
