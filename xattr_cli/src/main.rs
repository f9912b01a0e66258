mod app;
mod command;
mod config;
mod opt;
mod util;

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error as ThisError;

use app::{App, AppError};
use command::{Invocation, UsageError};
use config::{Config, Settings};
use opt::Opts;
use util::fmt_err;
use xattr_core::xattr::SystemProvider;

/// Exit code of a run that failed while working on the files
pub const EXIT_FAILURE: u8 = 1;
/// Exit code of a malformed invocation
pub const EXIT_USAGE: u8 = 2;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    App(#[from] AppError),
}

/// How a run ended, before anything about it is reported.
#[derive(Debug)]
enum Outcome {
    Help,
    /// The options were rejected, with the message rendered by clap.
    BadOptions(String),
    Finished(Result<(), Error>),
}

fn main() -> ExitCode {
    pretty_env_logger::init();

    let args: Vec<OsString> = std::env::args_os().collect();
    let program = opt::program_name(&args);

    let (outcome, pretty) = match Opts::try_parse_from(&args) {
        Err(e) if !e.use_stderr() => {
            // --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => (Outcome::BadOptions(e.to_string()), false),
        Ok(opts) if opts.help => (Outcome::Help, opts.pretty),
        Ok(opts) => {
            let settings = Settings::new(&opts, &Config::load_or_default());
            log::trace!("{settings:?}");
            (Outcome::Finished(run(&opts, settings)), settings.pretty)
        }
    };

    let code = report(outcome, &program, pretty, &mut io::stdout(), &mut io::stderr());
    ExitCode::from(code)
}

fn run(opts: &Opts, settings: Settings) -> Result<(), Error> {
    let invocation = Invocation::parse(&opts.args)?;
    let stdout = io::stdout();

    App::new(
        SystemProvider::new(settings.no_dereference),
        stdout.lock(),
        io::stderr(),
        settings,
    )
    .run(&invocation)
    .map_err(Error::from)
}

/// Writes whatever `outcome` calls for to `out` and `err` and returns the exit code.
fn report<O, E>(outcome: Outcome, program: &str, pretty: bool, out: &mut O, err: &mut E) -> u8
where
    O: Write,
    E: Write,
{
    // nothing sensible is left to do if the streams themselves fail
    let code = match outcome {
        Outcome::Finished(Ok(())) => return 0,
        Outcome::Help => EXIT_USAGE,
        Outcome::BadOptions(msg) => {
            let _ = err.write_all(msg.as_bytes());
            EXIT_USAGE
        }
        Outcome::Finished(Err(Error::Usage(e))) => {
            let _ = writeln!(err, "{}", fmt_err(e, pretty));
            EXIT_USAGE
        }
        Outcome::Finished(Err(e)) => {
            let _ = writeln!(err, "{}", fmt_err(e, pretty));
            let _ = err.flush();
            return EXIT_FAILURE;
        }
    };

    let _ = err.flush();
    let _ = out.write_all(opt::usage(program).as_bytes());
    let _ = out.flush();
    code
}
