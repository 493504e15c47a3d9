//! capsurgeon — batch capture-file editor.
//!
//! Reads one capture, threads every record through the configured
//! transformation pipeline and writes the survivors, optionally split
//! across a series of files. Run `capsurgeon --help` for the flags.

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cap_edit::capfile::{FileType, ENCAP_NAMES};
use cap_edit::pipeline;

mod cli;

use cli::Cli;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code: u8 = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let default_directive = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .init();

    // An empty -F / -T value asks for the list of supported names.
    if cli.file_type.as_deref() == Some("") {
        eprintln!("capsurgeon: the available capture file types are:");
        for file_type in FileType::all() {
            eprintln!("    {} - {}", file_type.name(), file_type.description());
        }
        return ExitCode::from(1);
    }
    if cli.encap.as_deref() == Some("") {
        eprintln!("capsurgeon: the available encapsulation types are:");
        for &(name, _) in ENCAP_NAMES {
            eprintln!("    {name}");
        }
        return ExitCode::from(1);
    }

    let (config, infile, outfile) = match cli.into_config() {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("capsurgeon: {e}");
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    match pipeline::run(&config, &infile, &outfile) {
        Ok(summary) => {
            tracing::debug!(
                records_read = summary.records_read,
                records_written = summary.records_written,
                "finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("capsurgeon: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
