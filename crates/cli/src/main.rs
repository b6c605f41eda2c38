use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use callsweep::commands::{
    analyze_command, regions_command, run_spec_command, symbols_command, OutputFormat,
};
use callsweep::init_tracing;
use clap::{Parser, Subcommand};

/// Disassembly-driven call-graph extractor.
///
/// This CLI is a thin wrapper around `callsweep-core` (exposed in code as
/// `callsweep_core`). All substantive logic lives in the library so it can be
/// tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "callsweep",
    version,
    about = "Extract the call graph reachable from a function as an assembly listing",
    long_about = None
)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode the function at `start` and everything it calls.
    ///
    /// `start` and `end` accept a symbol name or a numeric address
    /// (0x hex, 0o/leading-zero octal, 0b binary, decimal). Pass `-` as start
    /// to begin at the executable's entry point.
    Analyze {
        /// Path to the executable.
        path: PathBuf,

        /// Start symbol or address.
        start: String,

        /// Optional end symbol or address.
        end: Option<String>,

        /// Override the word size (32 or 64).
        #[arg(short = 'm', long = "mode")]
        mode: Option<u32>,

        /// Emit a JSON report instead of the listing.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Run an analysis described by a YAML or JSON spec file.
    Run {
        /// Path to the spec file.
        spec: PathBuf,
    },

    /// List the static and dynamic symbols of an executable.
    Symbols {
        path: PathBuf,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the memory regions built from an executable's loadable segments.
    Regions {
        path: PathBuf,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn run(command: Command) -> Result<String> {
    match command {
        Command::Analyze { path, start, end, mode, json } => {
            let format = if json { OutputFormat::Json } else { OutputFormat::Listing };
            analyze_command(&path, &start, end.as_deref(), mode, format)
        }
        Command::Run { spec } => run_spec_command(&spec),
        Command::Symbols { path, json } => symbols_command(&path, json),
        Command::Regions { path, json } => regions_command(&path, json),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(output) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(err) = stdout.write_all(output.as_bytes()).and_then(|_| stdout.flush()) {
                eprintln!("callsweep: failed to write output: {err}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("callsweep: {err:#}");
            ExitCode::FAILURE
        }
    }
}
