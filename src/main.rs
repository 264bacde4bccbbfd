//! Binary entrypoint for the `architect` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    // Recording is handled in commands::dispatch via ARCHITECT_RECORD=<dir>.
    match architect::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
