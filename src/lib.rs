//! `architect` turns a natural-language project description into a scaffolded
//! project through a staged LLM pipeline: analysis, architecture, file
//! structure, code, and dependencies.
//!
//! The [`pipeline::Pipeline`] is the library entry point. The `architect`
//! binary wraps it in a CLI and an HTTP API ([`server`]).

pub mod adapters;
pub mod artifact;
pub mod cassette;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod ports;
pub mod server;
pub mod validate;

use clap::Parser;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    logging::init(cli.verbose);
    commands::dispatch(&cli)
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn run_errors_on_unknown_subcommand() {
        let result = run(["architect", "unknown"]);
        assert!(result.is_err());
    }

    #[test]
    fn run_errors_on_missing_description() {
        let err = run(["architect", "analyze", "--name", "blog"]).unwrap_err();
        assert!(err.contains("--description"));
    }
}
