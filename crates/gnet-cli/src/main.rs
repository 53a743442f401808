mod args;
mod chain;
mod cmd;
mod exit;
mod logging;
mod output;

use std::ffi::OsString;

use clap::{CommandFactory, Parser};

use crate::cmd::{BusOptions, Command};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::Output;

#[derive(Parser, Debug)]
#[command(
    name = "gnetctl",
    version,
    about = "Control a Genelec monitor group or individual SAM monitors"
)]
struct Cli {
    /// Print results as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(flatten)]
    bus: BusOptions,

    #[command(subcommand)]
    command: Command,
}

/// Parse a command line holding one or more subcommands
///
/// Returns the options together with the first subcommand, and the
/// subcommands chained after it.
fn parse_chain<I, T>(args: I) -> Result<(Cli, Vec<Command>), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut lines = chain::split(&Cli::command(), args.into_iter().map(Into::into)).into_iter();
    let first = Cli::try_parse_from(lines.next().unwrap_or_default())?;
    let rest = lines
        .map(|line| Cli::try_parse_from(line).map(|cli| cli.command))
        .collect::<Result<_, _>>()?;
    Ok((first, rest))
}

fn main() {
    let (cli, chained) = parse_chain(std::env::args_os()).unwrap_or_else(|e| e.exit());
    init_logging(cli.log_format, cli.log_level);
    tracing::debug!("gnetctl {} (gnet-core {})", env!("CARGO_PKG_VERSION"), gnet_core::VERSION);

    let commands = std::iter::once(cli.command).chain(chained);
    match cmd::run(commands, &cli.bus, Output::new(cli.json)) {
        Ok(()) => std::process::exit(exit::SUCCESS),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(exit::code_for(&err));
        }
    }
}
