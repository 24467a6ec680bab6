//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a real-mode segment given as up to 4 hex digits
///
/// Range and alignment are checked later, when the segment is turned into a
/// physical address.
pub fn parse_segment(s: &str) -> Result<u16, String> {
    if s.is_empty() || s.len() > 4 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("Segment must be 1 to 4 hex digits, got '{}'", s));
    }
    u16::from_str_radix(s, 16).map_err(|e| format!("Invalid segment '{}': {}", s, e))
}

/// Parse an image size in KiB ("64" or "64K") into bytes
pub fn parse_size_kib(s: &str) -> Result<u32, String> {
    let digits = s.strip_suffix(['K', 'k']).unwrap_or(s);
    let kib: u32 = digits
        .parse()
        .map_err(|e| format!("Invalid size '{}': {}", s, e))?;
    kib.checked_mul(1024)
        .ok_or_else(|| format!("Size '{}' is too large", s))
}

#[derive(Parser)]
#[command(name = "romflasher")]
#[command(author, version, about = "Parallel flash option ROM programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Programmer to use, as name[:key=value,...] (see list-programmers)
    #[arg(short, long, global = true)]
    pub programmer: Option<String>,

    /// Configuration file (TOML)
    /// Defaults to ./romflasher.toml, then /etc/romflasher/romflasher.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Program an image into the flash ROM at a segment
    Flash {
        /// Destination segment (hex, e.g. D000)
        #[arg(value_parser = parse_segment)]
        segment: u16,

        /// ROM image file
        image: PathBuf,

        /// Program exactly this many KiB (truncates or pads the image)
        #[arg(short, long, value_parser = parse_size_kib)]
        size: Option<u32>,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Identify the flash ROM behind a segment
    Probe {
        /// Segment the chip is mapped at (hex)
        #[arg(value_parser = parse_segment)]
        segment: u16,
    },

    /// Compare flash contents against an image
    Verify {
        /// Segment the image was programmed to (hex)
        #[arg(value_parser = parse_segment)]
        segment: u16,

        /// ROM image file
        image: PathBuf,

        /// Compare exactly this many KiB (truncates or pads the image)
        #[arg(short, long, value_parser = parse_size_kib)]
        size: Option<u32>,
    },

    /// Measure the polling loop speed and show the derived timeouts
    Calibrate,

    /// List supported flash chips
    ListChips,

    /// List supported programmers
    ListProgrammers,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segment() {
        assert_eq!(parse_segment("D000"), Ok(0xD000));
        assert_eq!(parse_segment("c800"), Ok(0xC800));
        assert_eq!(parse_segment("A"), Ok(0x000A));
        assert!(parse_segment("0xE000").is_err());
        assert!(parse_segment("0xE0").is_err());
        assert!(parse_segment("+D00").is_err());
        assert!(parse_segment("D0000").is_err());
        assert!(parse_segment("").is_err());
        assert!(parse_segment("0x").is_err());
        assert!(parse_segment("XYZ").is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size_kib("64"), Ok(64 * 1024));
        assert_eq!(parse_size_kib("32K"), Ok(32 * 1024));
        assert_eq!(parse_size_kib("2k"), Ok(2048));
        assert!(parse_size_kib("lots").is_err());
        assert!(parse_size_kib("5000000").is_err());
    }

    #[test]
    fn test_cli_parses_flash() {
        let cli = Cli::try_parse_from([
            "romflasher",
            "-p",
            "dummy:chip=SST39SF010",
            "flash",
            "D000",
            "rom.bin",
            "--size",
            "32",
            "--yes",
        ])
        .unwrap();
        assert_eq!(cli.programmer.as_deref(), Some("dummy:chip=SST39SF010"));
        match cli.command {
            Commands::Flash {
                segment,
                image,
                size,
                yes,
            } => {
                assert_eq!(segment, 0xD000);
                assert_eq!(image, PathBuf::from("rom.bin"));
                assert_eq!(size, Some(32 * 1024));
                assert!(yes);
            }
            _ => panic!("expected flash"),
        }
    }

    #[test]
    fn test_cli_rejects_long_segment() {
        assert!(Cli::try_parse_from(["romflasher", "probe", "12345"]).is_err());
    }
}
