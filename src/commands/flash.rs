//! Flash command implementation

use crate::loader;
use crate::programmers::{self, Target};
use indicatif::{ProgressBar, ProgressStyle};
use romflasher_core::flow::{self, FlashObserver, FlashPlan, FlashRequest, FlashState, Status};
use romflasher_core::image::RomImage;
use romflasher_core::timing::{TimingLimits, TimingProfile};
use romflasher_core::window;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;

/// Interpret one line of a yes/no answer
fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" => Some(true),
        "n" => Some(false),
        _ => None,
    }
}

/// Ask until the operator answers y or n; end of input means no
fn ask_yes_no<R: BufRead>(input: &mut R, question: &str) -> bool {
    loop {
        print!("{} (y/n) ", question);
        let _ = io::stdout().flush();

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        if let Some(answer) = parse_answer(&line) {
            return answer;
        }
    }
}

/// Terminal front end for a programming run
struct ConsoleObserver {
    assume_yes: bool,
    spinner: Option<ProgressBar>,
    bar: Option<ProgressBar>,
}

impl ConsoleObserver {
    fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            spinner: None,
            bar: None,
        }
    }

    fn spin(&mut self, message: &'static str) {
        self.stop_spinner();
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(pb);
    }

    fn stop_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    fn stop_bar(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish();
        }
    }
}

impl FlashObserver for ConsoleObserver {
    fn state_changed(&mut self, state: FlashState) {
        match state {
            FlashState::Init => self.spin("Calibrating timeout timer..."),
            FlashState::Calibrated => self.stop_spinner(),
            FlashState::Terminal(_) => {
                self.stop_spinner();
                self.stop_bar();
            }
            _ => {}
        }
    }

    fn calibrated(&mut self, profile: &TimingProfile) {
        log::debug!(
            "Timeouts: {} loops per byte, {} loops per sector",
            profile.byte_write_timeout_loops,
            profile.sector_erase_timeout_loops
        );
    }

    fn confirm(&mut self, plan: &FlashPlan) -> bool {
        let window = &plan.window;
        println!("Flash ROM:   {}", plan.device);
        println!(
            "Programming: {}K at segment {:04X}",
            plan.len / 1024,
            window.destination_segment()
        );
        if window.is_relocated() {
            println!("Sequences:   through segment {:04X}", window.base_segment());
        }
        if plan.overlap {
            println!(
                "WARNING: another ROM image is mapped inside the 32K window at {:04X}.",
                window.base_segment()
            );
            println!("         Programming may disturb it if it lives on the same chip.");
        }

        if self.assume_yes {
            return true;
        }
        ask_yes_no(&mut io::stdin().lock(), "Do you wish to continue?")
    }

    fn programming(&mut self, total_blocks: usize) {
        let pb = ProgressBar::new(total_blocks as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        self.bar = Some(pb);
    }

    fn block_skipped(&mut self, _index: usize, address: u32) {
        if let Some(pb) = &self.bar {
            pb.set_message(format!("{:05X} unchanged", address));
            pb.inc(1);
        }
    }

    fn block_flashed(&mut self, _index: usize, address: u32) {
        if let Some(pb) = &self.bar {
            pb.set_message(format!("{:05X} written", address));
            pb.inc(1);
        }
    }

    fn verifying(&mut self) {
        self.stop_bar();
        self.spin("Verifying...");
    }
}

/// Program an image file at `segment`
pub fn run_flash(
    programmer: &str,
    segment: u16,
    input: &Path,
    size: Option<u32>,
    assume_yes: bool,
    limits: TimingLimits,
) -> Result<bool, Box<dyn std::error::Error>> {
    let dest = super::destination(segment)?;
    let image = loader::load_image(input, size)?;
    window::validate_range(dest, image.padded_len() as u32)?;
    println!(
        "Read {} bytes from {:?} ({} blocks)",
        image.original_len(),
        input,
        image.block_count()
    );

    let mut target = programmers::open_programmer(programmer)?;
    flash_image(&mut target, segment, &image, assume_yes, limits)
}

/// Program an already loaded image into an opened target
fn flash_image(
    target: &mut Target,
    segment: u16,
    image: &RomImage,
    assume_yes: bool,
    limits: TimingLimits,
) -> Result<bool, Box<dyn std::error::Error>> {
    let dest = super::destination(segment)?;
    let request = FlashRequest::new(dest, image).with_limits(limits);
    let mut observer = ConsoleObserver::new(assume_yes);
    let outcome = flow::run(&mut *target.bus, &mut *target.ticks, &request, &mut observer)?;

    match outcome.status {
        Status::Success => println!(
            "Programming complete: {} blocks written, {} unchanged",
            outcome.blocks_flashed, outcome.blocks_skipped
        ),
        Status::AlreadyUpToDate => println!("Flash ROM already up to date, nothing written"),
        status => match outcome.error {
            Some(e) => println!("Programming failed: {}", e),
            None => println!("Programming failed: {}", status),
        },
    }

    if outcome.requires_restart() {
        println!();
        println!("The ROM at segment {:04X} has changed.", segment);
        println!("Restart the system before using it; the old code may still be running.");
    }

    Ok(outcome.status.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("y\n"), Some(true));
        assert_eq!(parse_answer(" N "), Some(false));
        assert_eq!(parse_answer("yes"), None);
        assert_eq!(parse_answer(""), None);
    }

    #[test]
    fn test_prompt_repeats_until_valid() {
        let mut input = Cursor::new("maybe\n\nY\n");
        assert!(ask_yes_no(&mut input, "Continue?"));
        let mut input = Cursor::new("x\nn\n");
        assert!(!ask_yes_no(&mut input, "Continue?"));
    }

    #[test]
    fn test_prompt_eof_declines() {
        let mut input = Cursor::new("");
        assert!(!ask_yes_no(&mut input, "Continue?"));
    }

    fn write_image(name: &str, len: usize) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("romflasher-{}-{}.rom", name, std::process::id()));
        let mut data = vec![0u8; len];
        data[0] = 0x55;
        data[1] = 0xAA;
        data[2] = (len / 512) as u8;
        std::fs::write(&path, &data).unwrap();
        path
    }

    #[test]
    fn test_bad_segment_rejected_before_open() {
        let path = write_image("badseg", 8192);
        for programmer in ["physmap", "ch341a"] {
            let err = run_flash(programmer, 0x9000, &path, None, true, TimingLimits::default())
                .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<romflasher_core::Error>(),
                Some(romflasher_core::Error::InvalidArgument(_))
            ));
        }
        std::fs::remove_file(path).unwrap();
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_flash_dummy_end_to_end() {
        let path = write_image("flash", 8192);
        assert!(run_flash("dummy", 0xD000, &path, None, true, TimingLimits::default()).unwrap());

        // Same target twice: the second pass finds nothing to write
        let image = loader::load_image(&path, None).unwrap();
        let mut target = programmers::open_programmer("dummy").unwrap();
        assert!(flash_image(&mut target, 0xD000, &image, true, TimingLimits::default()).unwrap());
        assert!(flash_image(&mut target, 0xD000, &image, true, TimingLimits::default()).unwrap());

        std::fs::remove_file(path).unwrap();
    }
}
