use colored::Colorize;
use std::ffi::OsStr;
use std::fmt::Display;
use std::io::{self, Write};

/// Formats a fatal error the way it is written to stderr.
pub fn fmt_err<E: Display>(err: E, pretty: bool) -> String {
    if pretty {
        format!("{} {}", "error:".red().bold(), err.to_string().white().bold())
    } else {
        format!("error: {err}")
    }
}

/// Writes `s` without any conversion where the platform allows it.
pub fn write_os<W: Write>(out: &mut W, s: &OsStr) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        out.write_all(s.as_bytes())
    }
    #[cfg(not(unix))]
    {
        out.write_all(s.to_string_lossy().as_bytes())
    }
}
