pub mod xattr;

use std::{ffi, io};
use thiserror::Error;

#[cfg(target_os = "linux")]
const ENOATTR: i32 = libc::ENODATA;
#[cfg(all(unix, not(target_os = "linux")))]
const ENOATTR: i32 = libc::ENOATTR;

#[derive(Debug, Error)]
/// Default error used throughout this crate
pub enum Error {
    #[error("{0}")]
    NotExist(io::Error),
    #[error("extended attributes are not supported - {0}")]
    Unsupported(io::Error),
    #[error("xattributes limit reached on the file - {0}")]
    ListFull(io::Error),
    #[error("xattrs changed while getting their size")]
    AttrsChanged,
    #[error("provided string was invalid - {0}")]
    InvalidString(#[from] ffi::NulError),
    #[error("{0}")]
    Other(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error means that the attribute, or the file itself, doesn't exist.
    pub fn is_not_exist(&self) -> bool {
        matches!(self, Error::NotExist(_))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            return Error::NotExist(err);
        }
        classify(err)
    }
}

#[cfg(unix)]
fn classify(err: io::Error) -> Error {
    match err.raw_os_error() {
        Some(code) if code == ENOATTR || code == libc::ENOENT => Error::NotExist(err),
        Some(code) if code == libc::ENOTSUP || code == libc::EOPNOTSUPP => Error::Unsupported(err),
        Some(libc::ENOSPC) | Some(libc::E2BIG) => Error::ListFull(err),
        _ => Error::Other(err),
    }
}

#[cfg(not(unix))]
fn classify(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::Unsupported => Error::Unsupported(err),
        _ => Error::Other(err),
    }
}
