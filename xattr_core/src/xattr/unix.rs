#![cfg(unix)]
#[cfg(target_os = "macos")]
use libc::XATTR_NOFOLLOW;
use libc::{getxattr, listxattr, removexattr, setxattr};
#[cfg(target_os = "linux")]
use libc::{lgetxattr, llistxattr, lremovexattr, lsetxattr};
use std::ffi::{CStr, CString, OsStr, OsString};
use std::io;
use std::os::raw::{c_char, c_void};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

use crate::{Error, Result};

//################################################################################
// Wrappers
//################################################################################

#[cfg(target_os = "linux")]
unsafe fn __getxattr(
    path: *const c_char,
    name: *const c_char,
    value: *mut c_void,
    size: usize,
    symlink: bool,
) -> isize {
    let func = if symlink { lgetxattr } else { getxattr };

    func(path, name, value, size)
}

#[cfg(target_os = "macos")]
unsafe fn __getxattr(
    path: *const c_char,
    name: *const c_char,
    value: *mut c_void,
    size: usize,
    symlink: bool,
) -> isize {
    let opts = if symlink { XATTR_NOFOLLOW } else { 0 };

    getxattr(path, name, value, size, 0, opts)
}

#[cfg(target_os = "linux")]
unsafe fn __setxattr(
    path: *const c_char,
    name: *const c_char,
    value: *const c_void,
    size: usize,
    symlink: bool,
) -> isize {
    let func = if symlink { lsetxattr } else { setxattr };

    func(path, name, value, size, 0) as isize
}

#[cfg(target_os = "macos")]
unsafe fn __setxattr(
    path: *const c_char,
    name: *const c_char,
    value: *const c_void,
    size: usize,
    symlink: bool,
) -> isize {
    let opts = if symlink { XATTR_NOFOLLOW } else { 0 };

    setxattr(path, name, value, size, 0, opts) as isize
}

#[cfg(target_os = "linux")]
unsafe fn __removexattr(path: *const c_char, name: *const c_char, symlink: bool) -> isize {
    let func = if symlink { lremovexattr } else { removexattr };

    func(path, name) as isize
}

#[cfg(target_os = "macos")]
unsafe fn __removexattr(path: *const c_char, name: *const c_char, symlink: bool) -> isize {
    let opts = if symlink { XATTR_NOFOLLOW } else { 0 };

    removexattr(path, name, opts) as isize
}

#[cfg(target_os = "linux")]
unsafe fn __listxattr(path: *const c_char, list: *mut c_char, size: usize, symlink: bool) -> isize {
    let func = if symlink { llistxattr } else { listxattr };

    func(path, list, size)
}

#[cfg(target_os = "macos")]
unsafe fn __listxattr(path: *const c_char, list: *mut c_char, size: usize, symlink: bool) -> isize {
    let opts = if symlink { XATTR_NOFOLLOW } else { 0 };

    listxattr(path, list, size, opts)
}

//################################################################################
// Impl
//################################################################################

pub fn remove_xattr(path: &Path, name: &OsStr, symlink: bool) -> Result<()> {
    let path = CString::new(path.as_os_str().as_bytes())?;
    let name = CString::new(name.as_bytes())?;

    let ret = unsafe { __removexattr(path.as_ptr(), name.as_ptr(), symlink) };
    if ret != 0 {
        return Err(Error::from(io::Error::last_os_error()));
    }

    Ok(())
}

pub fn set_xattr(path: &Path, name: &OsStr, value: &[u8], symlink: bool) -> Result<()> {
    let path = CString::new(path.as_os_str().as_bytes())?;
    let name = CString::new(name.as_bytes())?;

    let ret = unsafe {
        __setxattr(
            path.as_ptr(),
            name.as_ptr(),
            value.as_ptr() as *const c_void,
            value.len(),
            symlink,
        )
    };

    if ret != 0 {
        return Err(Error::from(io::Error::last_os_error()));
    }

    Ok(())
}

pub fn get_xattr(path: &Path, name: &OsStr, symlink: bool) -> Result<Vec<u8>> {
    let path = CString::new(path.as_os_str().as_bytes())?;
    let name = CString::new(name.as_bytes())?;

    retry_on_change(|| read_xattr(path.as_c_str(), name.as_c_str(), symlink))
}

pub fn list_xattrs(path: &Path, symlink: bool) -> Result<Vec<OsString>> {
    let cpath = CString::new(path.as_os_str().as_bytes())?;
    let raw = retry_on_change(|| list_xattrs_raw(cpath.as_c_str(), symlink))?;

    Ok(parse_xattrs(&raw))
}

//################################################################################
// Other
//################################################################################

/// Number of times a size query and the read following it are attempted before
/// [Error::AttrsChanged] is returned.
const MAX_ATTEMPTS: usize = 3;

fn retry_on_change<T, F>(mut f: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 1;
    loop {
        match f() {
            Err(Error::AttrsChanged) if attempt < MAX_ATTEMPTS => {
                log::debug!("attributes changed during read, attempt {attempt}");
                attempt += 1;
            }
            res => return res,
        }
    }
}

/// `ERANGE` on the second call of a size query means the data grew in between.
fn size_changed_or(err: io::Error) -> Error {
    if err.raw_os_error() == Some(libc::ERANGE) {
        Error::AttrsChanged
    } else {
        Error::from(err)
    }
}

fn read_xattr(path: &CStr, name: &CStr, symlink: bool) -> Result<Vec<u8>> {
    let size = get_xattr_size(path, name, symlink)?;
    if size == 0 {
        return Ok(Vec::new());
    }

    let mut buf = vec![0u8; size];
    let ret = unsafe {
        __getxattr(
            path.as_ptr(),
            name.as_ptr(),
            buf.as_mut_ptr() as *mut c_void,
            size,
            symlink,
        )
    };

    if ret == -1 {
        return Err(size_changed_or(io::Error::last_os_error()));
    }

    // the value may have shrunk since its size was queried
    buf.truncate(ret as usize);

    Ok(buf)
}

fn get_xattr_size(path: &CStr, name: &CStr, symlink: bool) -> Result<usize> {
    let ret = unsafe { __getxattr(path.as_ptr(), name.as_ptr(), ptr::null_mut(), 0, symlink) };

    if ret == -1 {
        return Err(Error::from(io::Error::last_os_error()));
    }

    Ok(ret as usize)
}

fn get_xattrs_list_size(path: &CStr, symlink: bool) -> Result<usize> {
    let ret = unsafe { __listxattr(path.as_ptr(), ptr::null_mut(), 0, symlink) };

    if ret == -1 {
        return Err(Error::from(io::Error::last_os_error()));
    }

    Ok(ret as usize)
}

fn list_xattrs_raw(path: &CStr, symlink: bool) -> Result<Vec<u8>> {
    let size = get_xattrs_list_size(path, symlink)?;
    if size == 0 {
        return Ok(Vec::new());
    }

    let mut buf = vec![0u8; size];
    let ret = unsafe { __listxattr(path.as_ptr(), buf.as_mut_ptr() as *mut c_char, size, symlink) };

    if ret == -1 {
        return Err(size_changed_or(io::Error::last_os_error()));
    }

    buf.truncate(ret as usize);

    Ok(buf)
}

/// Splits the NUL separated list returned by `listxattr` into names.
fn parse_xattrs(input: &[u8]) -> Vec<OsString> {
    input
        .split(|ch| *ch == b'\0')
        .filter(|key| !key.is_empty())
        .map(|key| OsStr::from_bytes(key).to_os_string())
        .collect()
}

#[test]
fn parses_xattrs_from_raw() {
    let raw = b"user.key1\0user.key2\0user.key3\0security.testing\0";

    let attrs = parse_xattrs(raw);
    let mut it = attrs.iter();

    assert_eq!(it.next(), Some(&OsString::from("user.key1")));
    assert_eq!(it.next(), Some(&OsString::from("user.key2")));
    assert_eq!(it.next(), Some(&OsString::from("user.key3")));
    assert_eq!(it.next(), Some(&OsString::from("security.testing")));
    assert_eq!(it.next(), None);
}

#[test]
fn parses_empty_xattr_list() {
    assert!(parse_xattrs(b"").is_empty());
}

#[test]
fn retries_reads_that_raced_a_change() {
    let mut calls = 0;
    let res = retry_on_change(|| {
        calls += 1;
        if calls < MAX_ATTEMPTS {
            Err(Error::AttrsChanged)
        } else {
            Ok(calls)
        }
    });
    assert_eq!(res.unwrap(), MAX_ATTEMPTS);
}

#[test]
fn gives_up_after_bounded_attempts() {
    let mut calls = 0;
    let res: Result<()> = retry_on_change(|| {
        calls += 1;
        Err(Error::AttrsChanged)
    });
    assert!(matches!(res, Err(Error::AttrsChanged)));
    assert_eq!(calls, MAX_ATTEMPTS);

    let mut calls = 0;
    let res: Result<()> = retry_on_change(|| {
        calls += 1;
        Err(Error::from(io::Error::from_raw_os_error(libc::EACCES)))
    });
    assert!(matches!(res, Err(Error::Other(_))));
    assert_eq!(calls, 1);
}
