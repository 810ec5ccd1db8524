mod commands;
mod helpers;

use clap::Parser;
use dendro_core::domain::DendroError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();

    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let surfaced = error.as_dendro_error();
            eprintln!("{}", surfaced.diagnostic_line());
            eprintln!("{}", surfaced.fatal_exit_line());
            surfaced.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            helpers::init_tracing(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "dendro", version, about = "Boreal dendroclimatology pipeline")]
struct Cli {
    /// Log per-series detail; RUST_LOG takes precedence
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Run the full pipeline described by a JSON configuration
    Run(commands::RunArgs),
    /// Detrend every column of a wide year-by-series table
    Detrend(commands::DetrendArgs),
    /// Derive monthly climate indices and growing seasons from daily records
    Climate(commands::ClimateArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Run(args) => commands::run_pipeline_command(args),
        CliCommand::Detrend(args) => commands::run_detrend_command(args),
        CliCommand::Climate(args) => commands::run_climate_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(DendroError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_dendro_error(&self) -> DendroError {
        match self {
            Self::Usage(message) => DendroError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => DendroError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, parse_and_dispatch};
    use dendro_core::domain::DendroErrorCategory;

    fn args(values: &[&str]) -> Vec<String> {
        std::iter::once("dendro")
            .chain(values.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn unknown_subcommands_are_usage_errors() {
        let error = parse_and_dispatch(args(&["plot"])).expect_err("unknown command");
        assert!(matches!(error, CliError::Usage(_)));
        assert_eq!(
            error.as_dendro_error().category(),
            DendroErrorCategory::Input
        );
    }

    #[test]
    fn invalid_detrend_form_is_rejected_by_the_parser() {
        let error = parse_and_dispatch(args(&[
            "detrend", "--input", "in.csv", "--output", "out.csv", "--form", "loess",
        ]))
        .expect_err("unknown form");
        assert!(matches!(error, CliError::Usage(_)));
    }

    #[test]
    fn help_exits_cleanly() {
        assert_eq!(parse_and_dispatch(args(&["--help"])).expect("help"), 0);
    }
}
