//! SST39SF0x0 emulator on a simulated address space

use alloc::vec;
use alloc::vec::Vec;

use romflasher_core::bus::MemoryBus;
use romflasher_core::chip::{ChipInfo, KNOWN_CHIPS};
use romflasher_core::protocol::{self, PollStatus};
use romflasher_core::window::BLOCK_SIZE;

/// Size of the simulated real-mode address space
const ADDRESS_SPACE: usize = 0x10_0000;
/// Address lines the chip decodes during command cycles (A14-A0)
const COMMAND_ADDR_MASK: u32 = 0x7FFF;

/// Injected misbehavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    /// Sector erase never finishes
    pub stuck_erase: bool,
    /// Byte program never finishes
    pub stuck_program: bool,
    /// Once the byte at this physical address is programmed, the next
    /// program operation disturbs it to the given value
    pub disturb: Option<(u32, u8)>,
}

/// Configuration for the dummy ROM
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Vendor ID answered in software ID mode
    pub vendor_id: u8,
    /// Device ID answered in software ID mode
    pub device_id: u8,
    /// Chip capacity in bytes
    pub size: u32,
    /// Physical address the chip is mapped at
    pub base: u32,
    /// Value read from memory outside the chip
    pub fill: u8,
    /// Status reads before a byte program completes
    pub program_busy_polls: u32,
    /// Status reads before a sector erase completes
    pub erase_busy_polls: u32,
    /// Injected faults
    pub faults: Faults,
}

impl DummyConfig {
    /// Configuration for a known chip mapped at `base`
    pub fn for_chip(chip: &ChipInfo, base: u32) -> Self {
        Self {
            vendor_id: chip.vendor_id,
            device_id: chip.device_id,
            size: chip.size,
            base,
            ..Self::default()
        }
    }
}

impl Default for DummyConfig {
    fn default() -> Self {
        // SST39SF020 (256K) mapped into C000-FFFF
        let chip = &KNOWN_CHIPS[2];
        Self {
            vendor_id: chip.vendor_id,
            device_id: chip.device_id,
            size: chip.size,
            base: 0xC_0000,
            fill: 0xFF,
            program_busy_polls: 3,
            erase_busy_polls: 100,
            faults: Faults::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandState {
    Read,
    Unlock1,
    Unlock2,
    SoftwareId,
    EraseSetup,
    EraseUnlock1,
    EraseUnlock2,
    ProgramArmed,
}

#[derive(Debug, Clone, Copy)]
struct Busy {
    offset: u32,
    target: u8,
    remaining: u32,
    stuck: bool,
}

/// Dummy ROM
///
/// Emulates an SST39SF chip inside a 1 MiB address space. Memory outside the
/// chip reads as the configured fill and ignores writes, like an empty ISA
/// bus or mask ROM.
pub struct DummyRom {
    config: DummyConfig,
    memory: Vec<u8>,
    array: Vec<u8>,
    state: CommandState,
    busy: Option<Busy>,
    toggle: bool,
    disturb_armed: bool,
    critical_depth: u32,
    critical_entries: u32,
    unguarded_writes: u32,
    erase_count: u32,
    program_count: u32,
}

impl DummyRom {
    /// Create a dummy ROM with an erased chip
    pub fn new(config: DummyConfig) -> Self {
        let memory = vec![config.fill; ADDRESS_SPACE];
        let array = vec![protocol::ERASED_VALUE; config.size as usize];
        Self {
            config,
            memory,
            array,
            state: CommandState::Read,
            busy: None,
            toggle: false,
            disturb_armed: false,
            critical_depth: 0,
            critical_entries: 0,
            unguarded_writes: 0,
            erase_count: 0,
            program_count: 0,
        }
    }

    /// Create a dummy ROM with the default configuration (SST39SF020 at C000)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Chip contents
    pub fn array(&self) -> &[u8] {
        &self.array
    }

    /// Mutable chip contents, bypassing the command protocol
    pub fn array_mut(&mut self) -> &mut [u8] {
        &mut self.array
    }

    /// Mutable memory outside the chip (for placing other ROMs)
    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    /// Chip contents at a physical address range
    pub fn contents(&self, addr: u32, len: usize) -> &[u8] {
        let start = (addr - self.config.base) as usize;
        &self.array[start..start + len]
    }

    /// Number of sector erases performed
    pub fn erase_count(&self) -> u32 {
        self.erase_count
    }

    /// Number of bytes programmed
    pub fn program_count(&self) -> u32 {
        self.program_count
    }

    /// Number of critical sections entered
    pub fn critical_entries(&self) -> u32 {
        self.critical_entries
    }

    /// Current critical section nesting
    pub fn critical_depth(&self) -> u32 {
        self.critical_depth
    }

    /// Writes to the chip made outside any critical section
    pub fn unguarded_writes(&self) -> u32 {
        self.unguarded_writes
    }

    /// Whether the chip has left read mode
    pub fn in_command_mode(&self) -> bool {
        self.state != CommandState::Read || self.busy.is_some()
    }

    fn chip_offset(&self, addr: u32) -> Option<u32> {
        let base = self.config.base;
        if addr >= base && addr - base < self.config.size {
            Some(addr - base)
        } else {
            None
        }
    }

    fn start_busy(&mut self, offset: u32, target: u8, polls: u32, stuck: bool) {
        self.busy = Some(Busy {
            offset,
            target,
            remaining: polls,
            stuck,
        });
    }

    fn erase_sector(&mut self, offset: u32) {
        let start = (offset & !(BLOCK_SIZE - 1)) as usize;
        let end = (start + BLOCK_SIZE as usize).min(self.array.len());
        log::trace!("dummy: erase sector at chip offset 0x{:05X}", start);
        self.array[start..end].fill(protocol::ERASED_VALUE);
        self.erase_count += 1;
        self.start_busy(
            offset,
            protocol::ERASED_VALUE,
            self.config.erase_busy_polls,
            self.config.faults.stuck_erase,
        );
    }

    fn program_byte(&mut self, offset: u32, value: u8) {
        if let Some((addr, decayed)) = self.config.faults.disturb {
            if let Some(target) = self.chip_offset(addr) {
                if self.disturb_armed && target != offset {
                    log::trace!("dummy: disturbing chip offset 0x{:05X}", target);
                    self.array[target as usize] = decayed;
                    self.config.faults.disturb = None;
                } else if target == offset {
                    self.disturb_armed = true;
                }
            }
        }

        // Programming can only clear bits
        self.array[offset as usize] &= value;
        self.program_count += 1;
        self.start_busy(
            offset,
            value,
            self.config.program_busy_polls,
            self.config.faults.stuck_program,
        );
    }

    fn chip_write(&mut self, offset: u32, value: u8) {
        if self.busy.is_some() {
            return;
        }

        let cmd_addr = offset & COMMAND_ADDR_MASK;
        let unlock1 = cmd_addr == protocol::UNLOCK1_OFFSET && value == protocol::UNLOCK1;
        let unlock2 = cmd_addr == protocol::UNLOCK2_OFFSET && value == protocol::UNLOCK2;

        self.state = match self.state {
            CommandState::Read | CommandState::SoftwareId if unlock1 => CommandState::Unlock1,
            CommandState::Read => CommandState::Read,
            CommandState::SoftwareId => {
                if value == protocol::SOFTWARE_ID_EXIT {
                    CommandState::Read
                } else {
                    CommandState::SoftwareId
                }
            }
            CommandState::Unlock1 if unlock2 => CommandState::Unlock2,
            CommandState::Unlock2 if cmd_addr == protocol::UNLOCK1_OFFSET => match value {
                protocol::SOFTWARE_ID_ENTRY => CommandState::SoftwareId,
                protocol::BYTE_PROGRAM => CommandState::ProgramArmed,
                protocol::ERASE_SETUP => CommandState::EraseSetup,
                _ => CommandState::Read,
            },
            CommandState::EraseSetup if unlock1 => CommandState::EraseUnlock1,
            CommandState::EraseUnlock1 if unlock2 => CommandState::EraseUnlock2,
            CommandState::EraseUnlock2 if value == protocol::SECTOR_ERASE => {
                self.erase_sector(offset);
                CommandState::Read
            }
            CommandState::ProgramArmed => {
                self.program_byte(offset, value);
                CommandState::Read
            }
            _ => CommandState::Read,
        };
    }

    fn chip_read(&mut self, offset: u32) -> u8 {
        if let Some(mut busy) = self.busy {
            if busy.stuck || busy.remaining > 0 {
                if !busy.stuck {
                    busy.remaining -= 1;
                }
                self.busy = Some(busy);
                self.toggle = !self.toggle;
                return PollStatus::busy(busy.target, self.toggle);
            }
            self.busy = None;
            log::trace!("dummy: operation at 0x{:05X} complete", busy.offset);
        }

        match self.state {
            CommandState::SoftwareId => {
                if offset & 1 == 0 {
                    self.config.vendor_id
                } else {
                    self.config.device_id
                }
            }
            _ => self.array[offset as usize],
        }
    }
}

impl MemoryBus for DummyRom {
    fn read8(&mut self, addr: u32) -> u8 {
        match self.chip_offset(addr) {
            Some(offset) => self.chip_read(offset),
            None => self.memory.get(addr as usize).copied().unwrap_or(0xFF),
        }
    }

    fn write8(&mut self, addr: u32, value: u8) {
        if let Some(offset) = self.chip_offset(addr) {
            if self.critical_depth == 0 {
                self.unguarded_writes += 1;
            }
            self.chip_write(offset, value);
        }
    }

    fn enter_critical(&mut self) {
        self.critical_depth += 1;
        self.critical_entries += 1;
    }

    fn exit_critical(&mut self) {
        self.critical_depth = self.critical_depth.saturating_sub(1);
    }
}
