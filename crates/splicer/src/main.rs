//! Splicer CLI - recursive include preprocessor.
//!
//! Reads a root document, replaces every include directive with the
//! contents of the named file, and writes the merged text to stdout or a
//! file.

mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use commands::SpliceArgs;
use output::Output;

/// Splicer - recursive include preprocessor.
#[derive(Parser)]
#[command(name = "splicer", version, about)]
struct Cli {
    #[command(flatten)]
    args: SpliceArgs,
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables DEBUG level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = cli.args.execute(&output) {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
