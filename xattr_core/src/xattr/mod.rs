//! Safe wrappers for manipulating extended attributes
#[cfg(any(target_os = "linux", target_os = "macos"))]
mod unix;
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod unsupported;

#[cfg(any(target_os = "linux", target_os = "macos"))]
use unix::{
    get_xattr as _get_xattr, list_xattrs as _list_xattrs, remove_xattr as _remove_xattr,
    set_xattr as _set_xattr,
};
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
use unsupported::{
    get_xattr as _get_xattr, list_xattrs as _list_xattrs, remove_xattr as _remove_xattr,
    set_xattr as _set_xattr,
};

use crate::Result;
use std::ffi::{OsStr, OsString};
use std::path::Path;

/// Operations needed to inspect and modify the extended attributes of a file.
pub trait Provider {
    /// Names of all attributes of `path`, in the order the filesystem returns them.
    fn list(&self, path: &Path) -> Result<Vec<OsString>>;
    fn get(&self, path: &Path, name: &OsStr) -> Result<Vec<u8>>;
    /// Creates the attribute or overwrites its current value.
    fn set(&self, path: &Path, name: &OsStr, value: &[u8]) -> Result<()>;
    fn remove(&self, path: &Path, name: &OsStr) -> Result<()>;
}

impl<T: Provider + ?Sized> Provider for &T {
    fn list(&self, path: &Path) -> Result<Vec<OsString>> {
        (**self).list(path)
    }

    fn get(&self, path: &Path, name: &OsStr) -> Result<Vec<u8>> {
        (**self).get(path, name)
    }

    fn set(&self, path: &Path, name: &OsStr, value: &[u8]) -> Result<()> {
        (**self).set(path, name, value)
    }

    fn remove(&self, path: &Path, name: &OsStr) -> Result<()> {
        (**self).remove(path, name)
    }
}

/// [Provider](Provider) backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemProvider {
    symlink: bool,
}

impl SystemProvider {
    /// When `symlink` is true, symbolic links are not followed and the attributes of the link
    /// itself are used.
    pub fn new(symlink: bool) -> Self {
        Self { symlink }
    }
}

impl Provider for SystemProvider {
    fn list(&self, path: &Path) -> Result<Vec<OsString>> {
        log::debug!("listing extended attributes of {}", path.display());
        if self.symlink {
            list_link_xattrs(path)
        } else {
            list_xattrs(path)
        }
    }

    fn get(&self, path: &Path, name: &OsStr) -> Result<Vec<u8>> {
        log::debug!("getting {:?} of {}", name, path.display());
        if self.symlink {
            get_link_xattr(path, name)
        } else {
            get_xattr(path, name)
        }
    }

    fn set(&self, path: &Path, name: &OsStr, value: &[u8]) -> Result<()> {
        log::debug!(
            "setting {:?} of {} ({} bytes)",
            name,
            path.display(),
            value.len()
        );
        if self.symlink {
            set_link_xattr(path, name, value)
        } else {
            set_xattr(path, name, value)
        }
    }

    fn remove(&self, path: &Path, name: &OsStr) -> Result<()> {
        log::debug!("removing {:?} of {}", name, path.display());
        if self.symlink {
            remove_link_xattr(path, name)
        } else {
            remove_xattr(path, name)
        }
    }
}

/// Sets the value of the extended attribute identified by `name` and associated with the given
/// `path` in the filesystem. An existing value is overwritten.
pub fn set_xattr<P, S>(path: P, name: S, value: &[u8]) -> Result<()>
where
    P: AsRef<Path>,
    S: AsRef<OsStr>,
{
    _set_xattr(path.as_ref(), name.as_ref(), value, false)
}

/// Retrieves the raw value of the extended attribute identified by `name` and associated with
/// the given `path` in the filesystem.
pub fn get_xattr<P, S>(path: P, name: S) -> Result<Vec<u8>>
where
    P: AsRef<Path>,
    S: AsRef<OsStr>,
{
    _get_xattr(path.as_ref(), name.as_ref(), false)
}

/// Retrieves the names of all extended attributes associated with the given `path`.
pub fn list_xattrs<P>(path: P) -> Result<Vec<OsString>>
where
    P: AsRef<Path>,
{
    _list_xattrs(path.as_ref(), false)
}

/// Removes the extended attribute identified by `name` and associated with the given `path` in
/// the filesystem.
pub fn remove_xattr<P, S>(path: P, name: S) -> Result<()>
where
    P: AsRef<Path>,
    S: AsRef<OsStr>,
{
    _remove_xattr(path.as_ref(), name.as_ref(), false)
}

/// Provides identical functionality to [`set_xattr`](set_xattr) except in the case of a symbolic
/// link where the extended attribute is set on the link itself, not the file that it refers to.
pub fn set_link_xattr<P, S>(path: P, name: S, value: &[u8]) -> Result<()>
where
    P: AsRef<Path>,
    S: AsRef<OsStr>,
{
    _set_xattr(path.as_ref(), name.as_ref(), value, true)
}

/// Provides identical functionality to [`get_xattr`](get_xattr) except in the case of a symbolic
/// link where the extended attribute is retrieved from the link not the file that it refers to.
pub fn get_link_xattr<P, S>(path: P, name: S) -> Result<Vec<u8>>
where
    P: AsRef<Path>,
    S: AsRef<OsStr>,
{
    _get_xattr(path.as_ref(), name.as_ref(), true)
}

/// Provides identical functionality to [`list_xattrs`](list_xattrs) except in the case of a
/// symbolic link where the names are retrieved from the link not the file it refers to.
pub fn list_link_xattrs<P>(path: P) -> Result<Vec<OsString>>
where
    P: AsRef<Path>,
{
    _list_xattrs(path.as_ref(), true)
}

/// Provides identical functionality to [`remove_xattr`](remove_xattr) except in the case of a
/// symbolic link where the extended attribute is removed from the link not the file that it
/// refers to.
pub fn remove_link_xattr<P, S>(path: P, name: S) -> Result<()>
where
    P: AsRef<Path>,
    S: AsRef<OsStr>,
{
    _remove_xattr(path.as_ref(), name.as_ref(), true)
}
