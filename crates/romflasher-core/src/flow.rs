//! Programming run state machine
//!
//! A run walks through these states:
//!
//! ```text
//! Init -> Calibrated -> WindowPlanned -> DeviceIdentified -> [OverlapWarned]
//!      -> Confirmed -> Programming -> Verifying -> Terminal(status)
//! ```
//!
//! Every terminal status is final. Nothing is retried: timeouts already carry
//! a 10x margin over the datasheet, and flash has no way to roll back blocks
//! that were already rewritten. Once any block has been touched the caller
//! must restart or re-initialize the target, because the firmware that was
//! just replaced may still be running from it
//! (see [`ProgrammingOutcome::requires_restart`]).

use core::fmt;

use crate::bus::{CriticalSection, MemoryBus, TickSource};
use crate::chip::{self, DeviceIdentity};
use crate::error::{Error, Result};
use crate::image::{Block, RomImage};
use crate::program;
use crate::timing::{self, TimingLimits, TimingProfile};
use crate::verify;
use crate::window::{self, AddressWindow};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// At least one block was programmed and everything verified
    Success,
    /// Device already held the image, nothing was written
    AlreadyUpToDate,
    /// A sector erase timed out
    EraseTimeout,
    /// A byte program timed out
    ProgramTimeout,
    /// Read-back differed from the image
    VerifyMismatch,
    /// No known chip answered the ID sequence
    DeviceNotDetected,
    /// Operator declined at the confirmation prompt
    UserAborted,
}

impl Status {
    /// Terminal status for a device-facing error
    ///
    /// Returns `None` for errors that are reported before a run starts.
    pub fn from_error(error: &Error) -> Option<Self> {
        match error {
            Error::DeviceNotDetected { .. } => Some(Self::DeviceNotDetected),
            Error::EraseTimeout { .. } => Some(Self::EraseTimeout),
            Error::ProgramTimeout { .. } => Some(Self::ProgramTimeout),
            Error::VerifyMismatch { .. } => Some(Self::VerifyMismatch),
            Error::UserAborted => Some(Self::UserAborted),
            _ => None,
        }
    }

    /// Whether the run reached its goal
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::AlreadyUpToDate)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "programming complete",
            Self::AlreadyUpToDate => "flash ROM already up to date",
            Self::EraseTimeout => "timeout erasing block",
            Self::ProgramTimeout => "timeout programming block",
            Self::VerifyMismatch => "verify failed",
            Self::DeviceNotDetected => "flash ROM not detected",
            Self::UserAborted => "aborted by user",
        };
        f.write_str(text)
    }
}

/// States of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashState {
    /// Arguments validated, nothing touched yet
    Init,
    /// Polling budgets known
    Calibrated,
    /// Command window chosen
    WindowPlanned,
    /// A known chip answered
    DeviceIdentified,
    /// Another ROM was seen inside the command window
    OverlapWarned,
    /// Operator agreed to continue
    Confirmed,
    /// Blocks are being erased and programmed
    Programming,
    /// Reading back
    Verifying,
    /// Run finished
    Terminal(Status),
}

/// What a run is about to do, shown before asking for confirmation
#[derive(Debug, Clone, Copy)]
pub struct FlashPlan {
    /// Destination and command window
    pub window: AddressWindow,
    /// The identified chip
    pub device: DeviceIdentity,
    /// Bytes that will be programmed
    pub len: usize,
    /// Whether another ROM shares the command window
    pub overlap: bool,
}

/// Receives progress and makes the confirmation decision
///
/// Everything except [`confirm`](Self::confirm) defaults to doing nothing.
pub trait FlashObserver {
    /// Called on every state change
    fn state_changed(&mut self, _state: FlashState) {}

    /// Called once calibration finished
    fn calibrated(&mut self, _profile: &TimingProfile) {}

    /// Called when another ROM is visible in the command window
    fn overlap_warning(&mut self, _window: &AddressWindow) {}

    /// Decide whether to go ahead with `plan`
    fn confirm(&mut self, plan: &FlashPlan) -> bool;

    /// Called before the first block
    fn programming(&mut self, _total_blocks: usize) {}

    /// Called for a block that already matched
    fn block_skipped(&mut self, _index: usize, _address: u32) {}

    /// Called after a block was erased and programmed
    fn block_flashed(&mut self, _index: usize, _address: u32) {}

    /// Called before read-back starts
    fn verifying(&mut self) {}
}

/// An observer that confirms every plan
pub struct Unattended;

impl FlashObserver for Unattended {
    fn confirm(&mut self, _plan: &FlashPlan) -> bool {
        true
    }
}

/// Inputs for one run
#[derive(Debug, Clone, Copy)]
pub struct FlashRequest<'a> {
    /// Physical destination address
    pub destination: u32,
    /// Image to program
    pub image: &'a RomImage,
    /// Timeout configuration
    pub limits: TimingLimits,
}

impl<'a> FlashRequest<'a> {
    /// Request with default timing limits
    pub fn new(destination: u32, image: &'a RomImage) -> Self {
        Self {
            destination,
            image,
            limits: TimingLimits::default(),
        }
    }

    /// Use custom timing limits
    pub fn with_limits(mut self, limits: TimingLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgrammingOutcome {
    /// How the run ended
    pub status: Status,
    /// Blocks erased and programmed
    pub blocks_flashed: usize,
    /// Blocks that already matched
    pub blocks_skipped: usize,
    /// Calibrated budgets
    pub profile: Option<TimingProfile>,
    /// Window used for command cycles
    pub window: Option<AddressWindow>,
    /// What answered the ID sequence
    pub device: Option<DeviceIdentity>,
    /// Error behind a failure status
    pub error: Option<Error>,
}

impl ProgrammingOutcome {
    fn new() -> Self {
        Self {
            status: Status::Success,
            blocks_flashed: 0,
            blocks_skipped: 0,
            profile: None,
            window: None,
            device: None,
            error: None,
        }
    }

    /// Whether flash contents may have changed
    ///
    /// When true the target must be restarted before the new ROM is used.
    pub fn requires_restart(&self) -> bool {
        matches!(
            self.status,
            Status::Success | Status::EraseTimeout | Status::ProgramTimeout | Status::VerifyMismatch
        )
    }
}

struct Run<'o, O: FlashObserver + ?Sized> {
    observer: &'o mut O,
    outcome: ProgrammingOutcome,
}

impl<O: FlashObserver + ?Sized> Run<'_, O> {
    fn enter(&mut self, state: FlashState) {
        log::debug!("-> {:?}", state);
        self.observer.state_changed(state);
    }

    fn finish(mut self, status: Status, error: Option<Error>) -> ProgrammingOutcome {
        self.outcome.status = status;
        self.outcome.error = error;
        self.enter(FlashState::Terminal(status));
        self.outcome
    }

    /// End the run on a device-facing error
    ///
    /// Errors without a terminal [`Status`] are handed back to the caller.
    fn fail(self, error: Error) -> Result<ProgrammingOutcome> {
        log::error!("{}", error);
        match Status::from_error(&error) {
            Some(status) => Ok(self.finish(status, Some(error))),
            None => Err(error),
        }
    }
}

/// Compare, and if needed erase and program one block
///
/// Returns whether the block was written.
fn flash_block<B: MemoryBus + ?Sized>(
    bus: &mut B,
    window: &AddressWindow,
    addr: u32,
    block: &Block,
    profile: &TimingProfile,
) -> Result<bool> {
    let mut cs = CriticalSection::new(bus);

    if program::block_matches(&mut *cs, addr, block) {
        return Ok(false);
    }

    program::erase_block(&mut *cs, window, addr, profile.sector_erase_timeout_loops)?;
    program::program_block(&mut *cs, window, block, addr, profile.byte_write_timeout_loops)?;
    Ok(true)
}

/// Program `request.image` at `request.destination`
///
/// Device-facing failures end the run with a failure [`Status`] in the
/// returned outcome.
///
/// # Errors
/// * `InvalidArgument` - the destination range is misaligned or out of range
/// * `TickStalled` - calibration could not see the tick advance
pub fn run<B, T, O>(
    bus: &mut B,
    ticks: &mut T,
    request: &FlashRequest<'_>,
    observer: &mut O,
) -> Result<ProgrammingOutcome>
where
    B: MemoryBus + ?Sized,
    T: TickSource + ?Sized,
    O: FlashObserver + ?Sized,
{
    let dest = request.destination;
    let image = request.image;
    let len = image.padded_len() as u32;

    window::validate_range(dest, len)?;

    let mut run = Run {
        observer,
        outcome: ProgrammingOutcome::new(),
    };
    run.enter(FlashState::Init);

    let profile = timing::calibrate(ticks, bus, dest, &request.limits)?;
    log::info!("Calibrated timeout timer: {} loops per ms", profile.loops_per_ms);
    run.outcome.profile = Some(profile);
    run.observer.calibrated(&profile);
    run.enter(FlashState::Calibrated);

    let window = window::plan_window(dest, len);
    if !window.covers(dest, len) {
        log::warn!(
            "Command window {:04X} only partly covers {}K at {:04X}",
            window.base_segment(),
            len / 1024,
            window.destination_segment()
        );
    }
    run.outcome.window = Some(window);
    run.enter(FlashState::WindowPlanned);

    let device = chip::read_identity(bus, &window);
    run.outcome.device = Some(device);
    if !device.is_known() {
        return run.fail(Error::DeviceNotDetected {
            vendor_id: device.vendor_id,
            device_id: device.device_id,
        });
    }
    if let Some(info) = device.chip() {
        if info.size < len {
            log::warn!(
                "{}K image is larger than the {}K {}",
                len / 1024,
                info.size / 1024,
                info.name
            );
        }
    }
    run.enter(FlashState::DeviceIdentified);

    let overlap = window::detect_overlap(bus, &window, dest, len);
    if overlap {
        log::warn!(
            "Another ROM image was found in the 32K programming range starting at {:04X}",
            window.base_segment()
        );
        run.observer.overlap_warning(&window);
        run.enter(FlashState::OverlapWarned);
    }

    let plan = FlashPlan {
        window,
        device,
        len: image.padded_len(),
        overlap,
    };
    if !run.observer.confirm(&plan) {
        log::info!("Exiting without programming");
        return Ok(run.finish(Status::UserAborted, Some(Error::UserAborted)));
    }
    run.enter(FlashState::Confirmed);

    run.enter(FlashState::Programming);
    run.observer.programming(image.block_count());
    for (index, (addr, block)) in image.placed_at(dest).enumerate() {
        match flash_block(bus, &window, addr, block, &profile) {
            Ok(true) => {
                run.outcome.blocks_flashed += 1;
                run.observer.block_flashed(index, addr);
            }
            Ok(false) => {
                log::debug!("Block {} at 0x{:05X} unchanged", index, addr);
                run.outcome.blocks_skipped += 1;
                run.observer.block_skipped(index, addr);
            }
            Err(e) => return run.fail(e),
        }
    }

    if run.outcome.blocks_flashed == 0 {
        return Ok(run.finish(Status::AlreadyUpToDate, None));
    }

    run.enter(FlashState::Verifying);
    run.observer.verifying();
    match verify::verify(bus, dest, image) {
        Ok(()) => Ok(run.finish(Status::Success, None)),
        Err(e) => run.fail(e),
    }
}
