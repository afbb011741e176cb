//! codesub CLI entry point.

use clap::Parser;
use codesub::cli::{self, Cli, Commands, EXIT_ERROR};
use codesub::logging::{self, Verbosity};

fn main() {
    let cli = Cli::parse();
    logging::init(Verbosity::from_flags(cli.verbose, cli.quiet));
    codesub::init();

    let result = match &cli.command {
        Commands::Scan(args) => cli::run_scan(args),
        Commands::Index(args) => cli::run_index(args),
        Commands::Subscribe(args) => cli::run_subscribe(args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
