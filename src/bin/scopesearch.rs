//! scopesearch CLI binary.

use std::io::Write;
use std::process;

use clap::Parser;
use env_logger::{Builder, Env};
use log::LevelFilter;

use scopesearch::cli::args::*;
use scopesearch::cli::commands::*;

fn main() {
    // Parse command line arguments using clap
    let args = ScopeSearchArgs::parse();

    // RUST_LOG refines the level picked by the verbosity flags
    let log_level = match args.verbosity() {
        0 => LevelFilter::Error, // Quiet mode
        1 => LevelFilter::Warn,  // Default
        2 => LevelFilter::Info,  // Verbose
        _ => LevelFilter::Debug, // Very verbose (3+)
    };

    Builder::from_env(Env::default())
        .filter_level(log_level)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    // Execute the command
    if let Err(e) = execute_command(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
