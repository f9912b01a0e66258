//! Turns the positional arguments into a typed invocation.
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum UsageError {
    #[error("missing command")]
    MissingCommand,
    #[error("unsupported command {0:?}")]
    Unsupported(String),
    /// Carries the command token as typed, aliases included.
    #[error("{0}: missing arguments")]
    MissingArguments(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    List,
    Get,
    Set,
    Remove,
    Clear,
}

impl Command {
    /// Least number of arguments following the command token, at least one of them a file.
    pub fn min_args(&self) -> usize {
        match self {
            Command::List | Command::Clear => 1,
            Command::Get | Command::Remove => 2,
            Command::Set => 3,
        }
    }
}

impl FromStr for Command {
    type Err = UsageError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list" | "ls" => Ok(Command::List),
            "get" => Ok(Command::Get),
            "set" => Ok(Command::Set),
            "remove" | "rm" => Ok(Command::Remove),
            "clear" => Ok(Command::Clear),
            _ => Err(UsageError::Unsupported(s.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::List => "list",
            Command::Get => "get",
            Command::Set => "set",
            Command::Remove => "remove",
            Command::Clear => "clear",
        };
        f.write_str(name)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    List {
        files: Vec<PathBuf>,
    },
    Get {
        name: OsString,
        files: Vec<PathBuf>,
    },
    Set {
        name: OsString,
        value: Vec<u8>,
        files: Vec<PathBuf>,
    },
    Remove {
        name: OsString,
        files: Vec<PathBuf>,
    },
    Clear {
        files: Vec<PathBuf>,
    },
}

impl Invocation {
    /// Parses `args` where the first element is the command token and the rest are its
    /// arguments.
    pub fn parse(args: &[OsString]) -> Result<Self, UsageError> {
        let (token, rest) = args.split_first().ok_or(UsageError::MissingCommand)?;
        let token = token
            .to_str()
            .ok_or_else(|| UsageError::Unsupported(token.to_string_lossy().into_owned()))?;
        let cmd: Command = token.parse()?;

        if rest.len() < cmd.min_args() {
            return Err(UsageError::MissingArguments(token.to_string()));
        }

        let files =
            |args: &[OsString]| -> Vec<PathBuf> { args.iter().map(PathBuf::from).collect() };

        Ok(match cmd {
            Command::List => Invocation::List { files: files(rest) },
            Command::Clear => Invocation::Clear { files: files(rest) },
            Command::Get => Invocation::Get {
                name: rest[0].clone(),
                files: files(&rest[1..]),
            },
            Command::Remove => Invocation::Remove {
                name: rest[0].clone(),
                files: files(&rest[1..]),
            },
            Command::Set => Invocation::Set {
                name: rest[0].clone(),
                value: os_bytes(&rest[1]),
                files: files(&rest[2..]),
            },
        })
    }

    pub fn command(&self) -> Command {
        match self {
            Invocation::List { .. } => Command::List,
            Invocation::Get { .. } => Command::Get,
            Invocation::Set { .. } => Command::Set,
            Invocation::Remove { .. } => Command::Remove,
            Invocation::Clear { .. } => Command::Clear,
        }
    }
}

#[cfg(unix)]
fn os_bytes(s: &OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    s.as_bytes().to_vec()
}

#[cfg(not(unix))]
fn os_bytes(s: &OsStr) -> Vec<u8> {
    s.to_string_lossy().into_owned().into_bytes()
}
