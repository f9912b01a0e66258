//! Options used by the main executable
use std::ffi::OsString;
use std::fmt::Write;
use std::path::Path;

use clap::Parser;

pub const APP_NAME: &str = "xattr";
pub const APP_VERSION: &str = "0.1.0";
pub const APP_ABOUT: &str = "Tool to list and manage extended attributes of files.";

#[derive(Debug, Parser)]
#[clap(
    name = APP_NAME,
    version = APP_VERSION,
    about = APP_ABOUT,
    disable_help_flag = true,
)]
pub struct Opts {
    #[arg(short = 'h')]
    /// Display the help and exit
    pub help: bool,
    #[arg(short, long)]
    /// Report failures and carry on with the remaining files instead of stopping at the first
    /// one.
    pub keep_going: bool,
    #[arg(short = 'P', long)]
    /// Act on symbolic links themselves instead of the files they point to.
    pub no_dereference: bool,
    #[arg(short, long)]
    /// Colorize error messages.
    pub pretty: bool,
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    /// The command followed by its arguments and files
    pub args: Vec<OsString>,
}

const OPTIONS: &[(&str, &str)] = &[
    ("-h", "display this help and exit"),
    (
        "-k, --keep-going",
        "report failures and continue with the remaining files",
    ),
    (
        "-P, --no-dereference",
        "act on symbolic links themselves, not their targets",
    ),
    ("-p, --pretty", "colorize error messages"),
    ("-V, --version", "print version and exit"),
];

const COMMANDS: &[(&str, &str)] = &[
    ("clear", "clear file(s) all extended attributes"),
    ("get <a>", "get file(s) extended attribute <a> value"),
    ("list|ls", "list file(s) extended attributes"),
    ("remove|rm <a>", "remove file(s) extended attribute <a>"),
    ("set <a> <v>", "set file(s) extended attribute <a> value to <v>"),
];

/// Name of the executable as invoked, falling back to [APP_NAME](APP_NAME).
pub fn program_name(args: &[OsString]) -> String {
    args.first()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| APP_NAME.to_string())
}

/// Renders the usage text printed for `-h` and on usage errors.
pub fn usage(program: &str) -> String {
    let mut out = format!("Usage: {program} [options] <command> [arg] file [file...]\n");

    out.push_str("\nOptions:\n");
    for (flag, about) in OPTIONS {
        let _ = writeln!(out, "  {flag:<22}{about}");
    }

    out.push_str("\nCommands:\n");
    for (cmd, about) in COMMANDS {
        let _ = writeln!(out, "  {cmd:<18}{about}");
    }

    out
}
