#![allow(unused_variables)]
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;

use crate::{Error, Result};

fn unsupported() -> Error {
    Error::Unsupported(io::Error::new(
        io::ErrorKind::Unsupported,
        "extended attributes are not available on this platform",
    ))
}

pub fn set_xattr(path: &Path, name: &OsStr, value: &[u8], symlink: bool) -> Result<()> {
    Err(unsupported())
}

pub fn get_xattr(path: &Path, name: &OsStr, symlink: bool) -> Result<Vec<u8>> {
    Err(unsupported())
}

pub fn list_xattrs(path: &Path, symlink: bool) -> Result<Vec<OsString>> {
    Err(unsupported())
}

pub fn remove_xattr(path: &Path, name: &OsStr, symlink: bool) -> Result<()> {
    Err(unsupported())
}
