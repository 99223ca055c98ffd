//! Biometric Record Conversion CLI Tool
//!
//! A command-line utility for converting and validating ISO/IEC 19794
//! biometric records.

use bdir_transcode::cli::{run, Cli};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
