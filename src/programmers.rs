//! Programmer registration and dispatch
//!
//! A programmer supplies the two things the engine needs: a memory bus that
//! reaches the flash chip and a tick source for calibration.

use romflasher_core::bus::{MemoryBus, TickSource};

/// Programmer used when neither -p nor the config file names one
pub const DEFAULT_PROGRAMMER: &str = "physmap";

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Short description
    pub description: &'static str,
}

/// An opened programmer
pub struct Target {
    /// Programmer name, for messages
    pub name: &'static str,
    /// Bus the flash chip answers on, addressed physically
    pub bus: Box<dyn MemoryBus>,
    /// Time base for calibrating the polling loops
    pub ticks: Box<dyn TickSource>,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        description: "Emulated SST39SF chip in memory (chip=<name>,base=<segment>,fill=<hex>)",
    });

    #[cfg(feature = "physmap")]
    programmers.push(ProgrammerInfo {
        name: "physmap",
        description: "Legacy ROM window through /dev/mem - requires root (ticks=clock|bda)",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");
    for p in &programmers {
        help.push_str(&format!("  {:10} - {}\n", p.name, p.description));
    }
    help
}

/// Parse a programmer string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_programmer_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Open the programmer described by `programmer`
pub fn open_programmer(programmer: &str) -> Result<Target, Box<dyn std::error::Error>> {
    let (name, options) = parse_programmer_string(programmer);

    match name {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&options),

        #[cfg(feature = "physmap")]
        "physmap" => {
            let tick_choice = parse_physmap_ticks(&options)?;

            log::info!("Opening physmap programmer...");
            let bus = romflasher_physmap::LegacyWindow::open().map_err(|e| {
                format!(
                    "Failed to map the legacy ROM window: {}\n\
                     Make sure you are root and the kernel allows /dev/mem access.",
                    e
                )
            })?;
            let ticks: Box<dyn TickSource> = match tick_choice {
                PhysmapTicks::Clock => Box::new(romflasher_physmap::ClockTicks::new()),
                PhysmapTicks::Bda => Box::new(
                    romflasher_physmap::BdaTicks::open()
                        .map_err(|e| format!("Failed to map the BIOS data area: {}", e))?,
                ),
            };
            log::debug!("physmap tick source: {:?}", tick_choice);

            Ok(Target {
                name: "physmap",
                bus: Box::new(bus),
                ticks,
            })
        }

        _ => Err(unknown_programmer_error(name)),
    }
}

/// Tick sources the physmap programmer can calibrate against
#[cfg(feature = "physmap")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhysmapTicks {
    /// Monotonic clock in 1 ms steps
    Clock,
    /// BIOS data area counter at 0040:006C
    Bda,
}

#[cfg(feature = "physmap")]
fn parse_physmap_ticks(options: &[(&str, &str)]) -> Result<PhysmapTicks, String> {
    let mut ticks = PhysmapTicks::Clock;
    for (key, value) in options {
        match (*key, *value) {
            ("ticks", "clock") => ticks = PhysmapTicks::Clock,
            ("ticks", "bda") => ticks = PhysmapTicks::Bda,
            ("ticks", other) => {
                return Err(format!("Unknown physmap tick source '{}' (clock or bda)", other))
            }
            _ => return Err(format!("Unknown physmap option '{}'", key)),
        }
    }
    Ok(ticks)
}

#[cfg(feature = "dummy")]
fn open_dummy(options: &[(&str, &str)]) -> Result<Target, Box<dyn std::error::Error>> {
    use romflasher_core::chip;
    use romflasher_dummy::{DummyConfig, DummyRom, DummyTicks};

    let mut config = DummyConfig::default();

    for (key, value) in options {
        match *key {
            "chip" => {
                let info = chip::find_by_name(value)
                    .ok_or_else(|| format!("Unknown chip '{}' (see list-chips)", value))?;
                config.vendor_id = info.vendor_id;
                config.device_id = info.device_id;
                config.size = info.size;
            }
            "base" => {
                let segment = u16::from_str_radix(value, 16)
                    .map_err(|e| format!("Invalid base segment '{}': {}", value, e))?;
                config.base = (segment as u32) << 4;
            }
            "fill" => {
                config.fill = u8::from_str_radix(value.trim_start_matches("0x"), 16)
                    .map_err(|e| format!("Invalid fill byte '{}': {}", value, e))?;
            }
            _ => return Err(format!("Unknown dummy option '{}'", key).into()),
        }
    }

    log::info!(
        "Dummy programmer: {} bytes at {:#07x}",
        config.size,
        config.base
    );

    Ok(Target {
        name: "dummy",
        bus: Box::new(DummyRom::new(config)),
        ticks: Box::new(DummyTicks::default()),
    })
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown programmer: {}\n\n", name);
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'romflasher list-programmers' for more details");
    msg.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_programmer_string() {
        assert_eq!(parse_programmer_string("physmap"), ("physmap", vec![]));
        assert_eq!(
            parse_programmer_string("dummy:chip=SST39SF010,base=D000"),
            ("dummy", vec![("chip", "SST39SF010"), ("base", "D000")])
        );
    }

    #[test]
    fn test_unknown_programmer() {
        assert!(open_programmer("ch341a").is_err());
    }

    #[cfg(feature = "physmap")]
    #[test]
    fn test_physmap_tick_option() {
        assert_eq!(parse_physmap_ticks(&[]), Ok(PhysmapTicks::Clock));
        assert_eq!(parse_physmap_ticks(&[("ticks", "bda")]), Ok(PhysmapTicks::Bda));
        assert_eq!(parse_physmap_ticks(&[("ticks", "clock")]), Ok(PhysmapTicks::Clock));
        assert!(parse_physmap_ticks(&[("ticks", "rtc")]).is_err());
        assert!(parse_physmap_ticks(&[("speed", "3")]).is_err());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy_with_options() {
        let mut target = open_programmer("dummy:chip=SST39SF512,base=E000,fill=00").unwrap();
        assert_eq!(target.name, "dummy");
        // Erased chip at E000, fill below it
        assert_eq!(target.bus.read8(0xE0000), 0xFF);
        assert_eq!(target.bus.read8(0xD0000), 0x00);
        assert!(open_programmer("dummy:chip=nonsense").is_err());
        assert!(open_programmer("dummy:speed=3").is_err());
    }
}
