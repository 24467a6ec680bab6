//! Verify command implementation

use crate::loader;
use crate::programmers;
use indicatif::{ProgressBar, ProgressStyle};
use romflasher_core::{verify, window};
use std::path::Path;
use std::time::Duration;

/// Compare the flash at `segment` with an image file
pub fn run_verify(
    programmer: &str,
    segment: u16,
    input: &Path,
    size: Option<u32>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let dest = super::destination(segment)?;
    let image = loader::load_image(input, size)?;
    window::validate_range(dest, image.padded_len() as u32)?;

    let mut target = programmers::open_programmer(programmer)?;

    println!(
        "Verifying {} KiB from {:?} at segment {:04X}",
        image.padded_len() / 1024,
        input,
        segment
    );

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Verifying...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = verify::verify(&mut *target.bus, dest, &image);
    pb.finish_and_clear();

    match result {
        Ok(()) => {
            println!("Verification passed!");
            Ok(true)
        }
        Err(e) => {
            println!("Verification FAILED: {}", e);
            Ok(false)
        }
    }
}
