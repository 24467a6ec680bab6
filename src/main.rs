//! romflasher - Programs parallel flash option ROMs in place
//!
//! Reprograms SST39SF0x0 flash chips that are mapped into the PC upper memory
//! area, such as the boot ROM socket of a network card, through the same
//! window the BIOS uses to run them.
//!
//! # Architecture
//!
//! All device logic lives in `romflasher-core` and only sees a memory bus and
//! a tick source. This binary picks a programmer that supplies those two
//! (`physmap` for real hardware, `dummy` for an emulated chip), loads the
//! image and configuration, and drives the core state machine with a
//! terminal front end.

mod cli;
mod commands;
mod config;
mod loader;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::ListProgrammers => {
            commands::list_programmers();
            return Ok(true);
        }
        Commands::ListChips => {
            commands::list_chips();
            return Ok(true);
        }
        _ => {}
    }

    let config = Config::load(cli.config.as_deref())?;
    let limits = config.timing.limits();
    let programmer = cli
        .programmer
        .or(config.programmer)
        .unwrap_or_else(|| programmers::DEFAULT_PROGRAMMER.to_string());

    match cli.command {
        Commands::Flash {
            segment,
            image,
            size,
            yes,
        } => commands::run_flash(&programmer, segment, &image, size, yes, limits),
        Commands::Probe { segment } => commands::run_probe(&programmer, segment),
        Commands::Verify {
            segment,
            image,
            size,
        } => commands::run_verify(&programmer, segment, &image, size),
        Commands::Calibrate => commands::run_calibrate(&programmer, &limits),
        Commands::ListProgrammers | Commands::ListChips => Ok(true),
    }
}
