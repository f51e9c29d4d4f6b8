// Entrypoint for the CLI application.
// Parses arguments, installs logging and maps any failure to exit status 1.

use clap::Parser;
use jenkinsfile_validator::{cli, logging};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = cli::Cli::parse();
    logging::init(args.verbose);

    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
