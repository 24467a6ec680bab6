//! End-to-end runs of the core state machine against the emulator

use alloc::vec::Vec;

use romflasher_core::chip;
use romflasher_core::flow::{self, FlashObserver, FlashPlan, FlashRequest, FlashState, Status};
use romflasher_core::image::RomImage;
use romflasher_core::window::{plan_window, AddressWindow};
use romflasher_core::{ArgumentError, Error};

use crate::{DummyConfig, DummyRom, DummyTicks, Faults};

struct Recorder {
    answer: bool,
    states: Vec<FlashState>,
    plans: Vec<FlashPlan>,
    overlaps: usize,
    flashed: Vec<u32>,
    skipped: Vec<u32>,
    verified: bool,
}

impl Recorder {
    fn answering(answer: bool) -> Self {
        Self {
            answer,
            states: Vec::new(),
            plans: Vec::new(),
            overlaps: 0,
            flashed: Vec::new(),
            skipped: Vec::new(),
            verified: false,
        }
    }
}

impl FlashObserver for Recorder {
    fn state_changed(&mut self, state: FlashState) {
        self.states.push(state);
    }

    fn overlap_warning(&mut self, _window: &AddressWindow) {
        self.overlaps += 1;
    }

    fn confirm(&mut self, plan: &FlashPlan) -> bool {
        self.plans.push(*plan);
        self.answer
    }

    fn block_skipped(&mut self, _index: usize, address: u32) {
        self.skipped.push(address);
    }

    fn block_flashed(&mut self, _index: usize, address: u32) {
        self.flashed.push(address);
    }

    fn verifying(&mut self) {
        self.verified = true;
    }
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) ^ (i >> 8) as u8)
        .collect()
}

fn flash(rom: &mut DummyRom, dest: u32, image: &RomImage, observer: &mut Recorder) -> flow::ProgrammingOutcome {
    let mut ticks = DummyTicks::default();
    let request = FlashRequest::new(dest, image);
    flow::run(rom, &mut ticks, &request, observer).unwrap()
}

#[test]
fn test_identifies_sst39sf020() {
    let mut rom = DummyRom::new(DummyConfig {
        vendor_id: 0xBF,
        device_id: 0xB6,
        ..DummyConfig::default()
    });
    let window = plan_window(0xD0000, 0x2000);
    let identity = chip::identify(&mut rom, &window).unwrap();
    assert_eq!(identity.name, Some("SST39SF020"));
    assert_eq!(identity.chip().map(|c| c.size), Some(256 * 1024));
}

#[test]
fn test_unknown_vendor_is_not_detected() {
    let mut rom = DummyRom::new(DummyConfig {
        vendor_id: 0x01,
        device_id: 0xB6,
        ..DummyConfig::default()
    });
    let window = plan_window(0xD0000, 0x2000);
    assert!(chip::identify(&mut rom, &window).is_none());

    let image = RomImage::from_bytes(&pattern(8192, 1), None).unwrap();
    let mut observer = Recorder::answering(true);
    let outcome = flash(&mut rom, 0xD0000, &image, &mut observer);
    assert_eq!(outcome.status, Status::DeviceNotDetected);
    assert_eq!(
        outcome.error,
        Some(Error::DeviceNotDetected {
            vendor_id: 0x01,
            device_id: 0xB6
        })
    );
    assert!(observer.plans.is_empty());
    assert_eq!(rom.erase_count(), 0);
    assert!(!outcome.requires_restart());
}

#[test]
fn test_flash_8k_inside_covering_window() {
    let mut rom = DummyRom::new_default();
    let data = pattern(8192, 7);
    let image = RomImage::from_bytes(&data, None).unwrap();
    let mut observer = Recorder::answering(true);

    let outcome = flash(&mut rom, 0xD1000, &image, &mut observer);

    assert_eq!(outcome.status, Status::Success);
    assert_eq!(outcome.blocks_flashed, 2);
    assert_eq!(outcome.blocks_skipped, 0);
    assert_eq!(outcome.window.map(|w| w.base), Some(0xD0000));
    assert_eq!(outcome.device.and_then(|d| d.name), Some("SST39SF020"));
    assert_eq!(rom.contents(0xD1000, 8192), &data[..]);
    assert_eq!(observer.flashed, [0xD1000, 0xD2000]);
    assert!(observer.verified);
    assert_eq!(observer.overlaps, 0);
    assert_eq!(
        observer.states,
        [
            FlashState::Init,
            FlashState::Calibrated,
            FlashState::WindowPlanned,
            FlashState::DeviceIdentified,
            FlashState::Confirmed,
            FlashState::Programming,
            FlashState::Verifying,
            FlashState::Terminal(Status::Success),
        ]
    );
    assert!(outcome.requires_restart());
}

#[test]
fn test_round_trip_leaves_padded_image() {
    for (len, dest, seed) in [
        (2048usize, 0xC0000u32, 3u8),
        (6144, 0xC8000, 9),
        (32 * 1024, 0xD8000, 17),
        (64 * 1024, 0xE0000, 42),
    ] {
        let mut rom = DummyRom::new_default();
        let image = RomImage::from_bytes(&pattern(len, seed), None).unwrap();
        let mut observer = Recorder::answering(true);

        let outcome = flash(&mut rom, dest, &image, &mut observer);
        assert_eq!(outcome.status, Status::Success, "{} bytes at {:05X}", len, dest);

        let expected: Vec<u8> = image.blocks().iter().flatten().copied().collect();
        assert_eq!(rom.contents(dest, image.padded_len()), &expected[..]);
        assert_eq!(rom.unguarded_writes(), 0);
        assert_eq!(rom.critical_depth(), 0);
    }
}

#[test]
fn test_rerun_is_already_up_to_date() {
    let mut rom = DummyRom::new_default();
    let image = RomImage::from_bytes(&pattern(16 * 1024, 5), None).unwrap();

    let first = flash(&mut rom, 0xC8000, &image, &mut Recorder::answering(true));
    assert_eq!(first.status, Status::Success);
    let erases = rom.erase_count();
    let programs = rom.program_count();

    let mut observer = Recorder::answering(true);
    let second = flash(&mut rom, 0xC8000, &image, &mut observer);
    assert_eq!(second.status, Status::AlreadyUpToDate);
    assert_eq!(second.blocks_flashed, 0);
    assert_eq!(second.blocks_skipped, 4);
    assert_eq!(observer.skipped, [0xC8000, 0xC9000, 0xCA000, 0xCB000]);
    assert_eq!(rom.erase_count(), erases);
    assert_eq!(rom.program_count(), programs);
    assert!(!observer.verified);
    assert!(!second.requires_restart());
}

#[test]
fn test_only_changed_blocks_are_flashed() {
    let mut rom = DummyRom::new_default();
    let mut data = pattern(16 * 1024, 11);
    let image = RomImage::from_bytes(&data, None).unwrap();
    flash(&mut rom, 0xC8000, &image, &mut Recorder::answering(true));

    data[0x2100] ^= 0xFF;
    let image = RomImage::from_bytes(&data, None).unwrap();
    let mut observer = Recorder::answering(true);
    let outcome = flash(&mut rom, 0xC8000, &image, &mut observer);

    assert_eq!(outcome.status, Status::Success);
    assert_eq!(outcome.blocks_flashed, 1);
    assert_eq!(outcome.blocks_skipped, 3);
    assert_eq!(observer.flashed, [0xCA000]);
    assert_eq!(rom.contents(0xC8000, data.len()), &data[..]);
}

#[test]
fn test_stuck_erase_times_out() {
    let mut rom = DummyRom::new(DummyConfig {
        faults: Faults {
            stuck_erase: true,
            ..Faults::default()
        },
        ..DummyConfig::default()
    });
    let image = RomImage::from_bytes(&pattern(8192, 2), None).unwrap();
    let mut observer = Recorder::answering(true);

    let outcome = flash(&mut rom, 0xD0000, &image, &mut observer);

    assert_eq!(outcome.status, Status::EraseTimeout);
    assert_eq!(outcome.error, Some(Error::EraseTimeout { address: 0xD0000 }));
    assert_eq!(outcome.blocks_flashed, 0);
    assert_eq!(rom.erase_count(), 1);
    assert!(!observer.verified);
    assert_eq!(rom.critical_depth(), 0);
    assert!(outcome.requires_restart());
}

#[test]
fn test_stuck_program_times_out() {
    let mut rom = DummyRom::new(DummyConfig {
        faults: Faults {
            stuck_program: true,
            ..Faults::default()
        },
        ..DummyConfig::default()
    });
    let image = RomImage::from_bytes(&pattern(8192, 2), None).unwrap();
    let mut observer = Recorder::answering(true);

    let outcome = flash(&mut rom, 0xD0000, &image, &mut observer);

    assert_eq!(outcome.status, Status::ProgramTimeout);
    assert_eq!(outcome.error, Some(Error::ProgramTimeout { address: 0xD0000 }));
    assert_eq!(rom.program_count(), 1);
    assert!(observer.flashed.is_empty());
    assert_eq!(rom.critical_depth(), 0);
}

#[test]
fn test_disturbed_byte_fails_verify() {
    let mut rom = DummyRom::new(DummyConfig {
        faults: Faults {
            disturb: Some((0xD0100, 0x00)),
            ..Faults::default()
        },
        ..DummyConfig::default()
    });
    let data = alloc::vec![0x5Au8; 8192];
    let image = RomImage::from_bytes(&data, None).unwrap();
    let mut observer = Recorder::answering(true);

    let outcome = flash(&mut rom, 0xD0000, &image, &mut observer);

    assert_eq!(outcome.status, Status::VerifyMismatch);
    assert_eq!(
        outcome.error,
        Some(Error::VerifyMismatch {
            address: 0xD0100,
            expected: 0x5A,
            found: 0x00
        })
    );
    assert_eq!(outcome.blocks_flashed, 2);
    assert!(observer.verified);
}

#[test]
fn test_declined_confirmation_writes_nothing() {
    let mut rom = DummyRom::new_default();
    let image = RomImage::from_bytes(&pattern(8192, 4), None).unwrap();
    let mut observer = Recorder::answering(false);

    let outcome = flash(&mut rom, 0xD0000, &image, &mut observer);

    assert_eq!(outcome.status, Status::UserAborted);
    assert_eq!(observer.plans.len(), 1);
    assert_eq!(observer.plans[0].len, 8192);
    assert_eq!(rom.erase_count(), 0);
    assert_eq!(rom.program_count(), 0);
    assert!(!outcome.requires_restart());
}

#[test]
fn test_overlap_warns_but_programs() {
    let mut rom = DummyRom::new_default();
    // Second option ROM header at D400, inside the D000 command window
    rom.array_mut()[0x14000] = 0x55;
    rom.array_mut()[0x14001] = 0xAA;
    let image = RomImage::from_bytes(&pattern(8192, 8), None).unwrap();
    let mut observer = Recorder::answering(true);

    let outcome = flash(&mut rom, 0xD0000, &image, &mut observer);

    assert_eq!(outcome.status, Status::Success);
    assert_eq!(observer.overlaps, 1);
    assert!(observer.plans[0].overlap);
    assert!(observer.states.contains(&FlashState::OverlapWarned));
}

#[test]
fn test_out_of_range_destination_is_rejected_before_access() {
    let mut rom = DummyRom::new_default();
    let image = RomImage::from_bytes(&pattern(64 * 1024, 1), None).unwrap();
    let mut ticks = DummyTicks::default();
    let request = FlashRequest::new(0xF8000, &image);
    let mut observer = Recorder::answering(true);

    let result = flow::run(&mut rom, &mut ticks, &request, &mut observer);

    assert_eq!(
        result,
        Err(Error::InvalidArgument(ArgumentError::RangeOutOfBounds {
            start: 0xF8000,
            len: 64 * 1024
        }))
    );
    assert!(observer.states.is_empty());
    assert_eq!(rom.critical_entries(), 0);
}
