//! Purpose: `recfile` CLI entry point: export a container file as RFC 4180 CSV.
//! Role: Binary crate root; parses args, opens the container, streams CSV to a file or stdout.
//! Invariants: Missing positionals print a one-line usage message and touch no files.
//! Invariants: Errors are reported as one line on stdout; exit 0 unless `--strict`.
//! Invariants: Diagnostics go to stderr via `tracing`; stdout carries CSV or messages only.
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, error::ErrorKind as ClapErrorKind};
use recfile::api::{
    ContainerReader, Error, ErrorKind, ExportOptions, export_container, to_exit_code,
};
use recfile::csv::DEFAULT_FLOAT_DIGITS;
use tracing_subscriber::EnvFilter;

const USAGE_LINE: &str = "Usage: recfile <input file> <csv output file>.";
const STDOUT_PATH: &str = "-";

#[derive(Parser, Debug)]
#[command(name = "recfile", version, about = "Export a recfile container as CSV")]
struct Cli {
    /// Container file to read.
    input: Option<PathBuf>,
    /// CSV file to write, or `-` for stdout.
    output: Option<PathBuf>,
    /// Arguments past the output path are accepted and ignored.
    #[arg(hide = true)]
    _ignored: Vec<OsString>,
    /// Significant digits for floating-point cells (15..=17).
    #[arg(long, default_value_t = DEFAULT_FLOAT_DIGITS)]
    float_digits: usize,
    /// Omit the header row of field names.
    #[arg(long)]
    no_header: bool,
    /// Exit with a nonzero status when the export fails.
    #[arg(long)]
    strict: bool,
}

fn main() {
    init_tracing();
    let args: Vec<OsString> = std::env::args_os().collect();
    let strict = args.iter().any(|arg| arg == "--strict");
    let exit_code = match run(args) {
        Ok(()) => 0,
        Err(err) => {
            println!("{err}");
            if strict { to_exit_code(err.kind()) } else { 0 }
        }
    };
    std::process::exit(exit_code);
}

fn run(args: Vec<OsString>) -> Result<(), Error> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                return err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                });
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage).with_message(clap_error_summary(&err)));
            }
        },
    };

    let (Some(input), Some(output)) = (cli.input.as_deref(), cli.output.as_deref()) else {
        println!("{USAGE_LINE}");
        return Ok(());
    };
    let options = ExportOptions {
        float_digits: cli.float_digits,
        header: !cli.no_header,
    };
    options.validate()?;

    let mut reader = ContainerReader::open(input)?;
    let rows = if output == Path::new(STDOUT_PATH) {
        export_container(&mut reader, io::stdout().lock(), options)?
    } else {
        let file = File::create(output).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to create csv output")
                .with_path(output)
                .with_source(err)
        })?;
        let mut out = BufWriter::new(file);
        let rows = export_container(&mut reader, &mut out, options)?;
        out.flush().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to flush csv output")
                .with_path(output)
                .with_source(err)
        })?;
        rows
    };
    tracing::info!(input = %input.display(), rows, "export complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
