use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error as ThisError;
use xattr_core::xattr::Provider;

use crate::command::Invocation;
use crate::config::Settings;
use crate::util::{fmt_err, write_os};

/// A provider error together with the file it happened on.
#[derive(Debug)]
pub struct Failure {
    pub path: PathBuf,
    pub source: xattr_core::Error,
}

impl Failure {
    fn new(path: &Path, source: xattr_core::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.source)
    }
}

#[derive(Debug, ThisError)]
pub enum AppError {
    #[error("unable to list extended attributes: {0}")]
    List(Failure),
    #[error("unable to get extended attribute {name:?}: {failure}")]
    Get { name: OsString, failure: Failure },
    #[error("unable to set extended attribute {name:?}: {failure}")]
    Set { name: OsString, failure: Failure },
    #[error("unable to remove extended attribute {name:?}: {failure}")]
    Remove { name: OsString, failure: Failure },
    #[error("unable to clear extended attributes: {0}")]
    ClearList(Failure),
    #[error("unable to clear extended attribute {name:?}: {failure}")]
    ClearRemove { name: OsString, failure: Failure },
    #[error("failed to write output - {0}")]
    Output(#[from] io::Error),
    #[error("{0} operation(s) failed")]
    Failures(usize),
}

/// Runs invocations against a [Provider](Provider), writing results to `out` and, in
/// keep-going mode, failures to `err`.
pub struct App<P, O, E> {
    provider: P,
    out: O,
    err: E,
    settings: Settings,
    failures: usize,
}

impl<P, O, E> App<P, O, E>
where
    P: Provider,
    O: Write,
    E: Write,
{
    pub fn new(provider: P, out: O, err: E, settings: Settings) -> Self {
        Self {
            provider,
            out,
            err,
            settings,
            failures: 0,
        }
    }

    pub fn run(&mut self, invocation: &Invocation) -> Result<(), AppError> {
        log::trace!("running `{}`", invocation.command());
        self.failures = 0;

        let result = match invocation {
            Invocation::List { files } => self.list(files),
            Invocation::Get { name, files } => self.get(name, files),
            Invocation::Set { name, value, files } => self.set(name, value, files),
            Invocation::Remove { name, files } => self.remove(name, files),
            Invocation::Clear { files } => self.clear(files),
        };
        // whatever was printed before a failure stays printed
        let flushed = self.out.flush();
        result?;
        flushed?;

        if self.failures > 0 {
            return Err(AppError::Failures(self.failures));
        }
        Ok(())
    }

    /// Aborts with `err`, or in keep-going mode reports it and lets the caller carry on.
    fn fail(&mut self, err: AppError) -> Result<(), AppError> {
        if !self.settings.keep_going {
            return Err(err);
        }
        writeln!(self.err, "{}", fmt_err(&err, self.settings.pretty))?;
        self.failures += 1;
        Ok(())
    }

    fn ok(&mut self) -> Result<(), AppError> {
        if self.failures == 0 {
            writeln!(self.out, "OK")?;
        }
        Ok(())
    }

    fn list(&mut self, files: &[PathBuf]) -> Result<(), AppError> {
        let with_headers = files.len() > 1;

        for path in files {
            let names = match self.provider.list(path) {
                Ok(names) => names,
                Err(e) => {
                    self.fail(AppError::List(Failure::new(path, e)))?;
                    continue;
                }
            };

            if with_headers {
                write_os(&mut self.out, path.as_os_str())?;
                writeln!(self.out, ":")?;
            }
            for name in &names {
                if with_headers {
                    write!(self.out, "  ")?;
                }
                write_os(&mut self.out, name)?;
                writeln!(self.out)?;
            }
        }

        Ok(())
    }

    fn get(&mut self, name: &OsStr, files: &[PathBuf]) -> Result<(), AppError> {
        if let [path] = files {
            match self.provider.get(path, name) {
                Ok(value) => {
                    self.out.write_all(&value)?;
                    writeln!(self.out)?;
                }
                Err(e) if e.is_not_exist() => {
                    log::trace!("{:?} not set on {}", name, path.display());
                }
                Err(e) => self.fail(AppError::Get {
                    name: name.to_os_string(),
                    failure: Failure::new(path, e),
                })?,
            }
            return Ok(());
        }

        for path in files {
            let value = match self.provider.get(path, name) {
                Ok(value) => value,
                Err(e) if e.is_not_exist() => Vec::new(),
                Err(e) => {
                    self.fail(AppError::Get {
                        name: name.to_os_string(),
                        failure: Failure::new(path, e),
                    })?;
                    continue;
                }
            };

            write_os(&mut self.out, path.as_os_str())?;
            write!(self.out, ": ")?;
            self.out.write_all(&value)?;
            writeln!(self.out)?;
        }

        Ok(())
    }

    fn set(&mut self, name: &OsStr, value: &[u8], files: &[PathBuf]) -> Result<(), AppError> {
        for path in files {
            if let Err(e) = self.provider.set(path, name, value) {
                self.fail(AppError::Set {
                    name: name.to_os_string(),
                    failure: Failure::new(path, e),
                })?;
            }
        }

        self.ok()
    }

    fn remove(&mut self, name: &OsStr, files: &[PathBuf]) -> Result<(), AppError> {
        for path in files {
            match self.provider.remove(path, name) {
                Ok(()) => {}
                Err(e) if e.is_not_exist() => {
                    log::trace!("{:?} already absent from {}", name, path.display());
                }
                Err(e) => self.fail(AppError::Remove {
                    name: name.to_os_string(),
                    failure: Failure::new(path, e),
                })?,
            }
        }

        self.ok()
    }

    fn clear(&mut self, files: &[PathBuf]) -> Result<(), AppError> {
        for path in files {
            let names = match self.provider.list(path) {
                Ok(names) => names,
                Err(e) => {
                    self.fail(AppError::ClearList(Failure::new(path, e)))?;
                    continue;
                }
            };

            for name in &names {
                match self.provider.remove(path, name) {
                    Ok(()) => {}
                    // removed by someone else in the meantime
                    Err(e) if e.is_not_exist() => {}
                    Err(e) => self.fail(AppError::ClearRemove {
                        name: name.clone(),
                        failure: Failure::new(path, e),
                    })?,
                }
            }
        }

        self.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashSet};
    use xattr_core::{Error, Result};

    type Attrs = Vec<(OsString, Vec<u8>)>;

    /// Keeps attributes in memory. Every operation on a `broken` path fails with a permission
    /// error, removing a `protected` name fails the same way, and a `phantom` name is listed on
    /// every file without being stored.
    #[derive(Default)]
    struct MemoryProvider {
        files: RefCell<BTreeMap<PathBuf, Attrs>>,
        broken: HashSet<PathBuf>,
        protected: HashSet<OsString>,
        phantom: Option<OsString>,
    }

    fn denied() -> Error {
        Error::Other(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "permission denied",
        ))
    }

    fn not_exist() -> Error {
        Error::NotExist(io::Error::new(io::ErrorKind::NotFound, "no such attribute"))
    }

    impl MemoryProvider {
        fn file(self, path: &str, attrs: &[(&str, &str)]) -> Self {
            self.files.borrow_mut().insert(
                PathBuf::from(path),
                attrs
                    .iter()
                    .map(|(k, v)| (OsString::from(k), v.as_bytes().to_vec()))
                    .collect(),
            );
            self
        }

        fn broken(mut self, path: &str) -> Self {
            self.broken.insert(PathBuf::from(path));
            self.files.borrow_mut().insert(PathBuf::from(path), vec![]);
            self
        }

        fn protected(mut self, name: &str) -> Self {
            self.protected.insert(OsString::from(name));
            self
        }

        fn phantom(mut self, name: &str) -> Self {
            self.phantom = Some(OsString::from(name));
            self
        }

        fn check(&self, path: &Path) -> Result<()> {
            if self.broken.contains(path) {
                return Err(denied());
            }
            if !self.files.borrow().contains_key(path) {
                return Err(not_exist());
            }
            Ok(())
        }

        fn value(&self, path: &str, name: &str) -> Option<Vec<u8>> {
            self.get(Path::new(path), OsStr::new(name)).ok()
        }
    }

    impl Provider for MemoryProvider {
        fn list(&self, path: &Path) -> Result<Vec<OsString>> {
            self.check(path)?;
            let mut names: Vec<_> = self.files.borrow()[path]
                .iter()
                .map(|(k, _)| k.clone())
                .collect();
            names.extend(self.phantom.clone());
            Ok(names)
        }

        fn get(&self, path: &Path, name: &OsStr) -> Result<Vec<u8>> {
            self.check(path)?;
            self.files.borrow()[path]
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .ok_or_else(not_exist)
        }

        fn set(&self, path: &Path, name: &OsStr, value: &[u8]) -> Result<()> {
            self.check(path)?;
            let mut files = self.files.borrow_mut();
            let attrs = files.get_mut(path).ok_or_else(not_exist)?;
            match attrs.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_vec(),
                None => attrs.push((name.to_os_string(), value.to_vec())),
            }
            Ok(())
        }

        fn remove(&self, path: &Path, name: &OsStr) -> Result<()> {
            self.check(path)?;
            if self.protected.contains(name) {
                return Err(denied());
            }
            let mut files = self.files.borrow_mut();
            let attrs = files.get_mut(path).ok_or_else(not_exist)?;
            let before = attrs.len();
            attrs.retain(|(k, _)| k != name);
            if attrs.len() == before {
                return Err(not_exist());
            }
            Ok(())
        }
    }

    struct Output {
        result: std::result::Result<(), AppError>,
        out: String,
        err: String,
    }

    fn run_with(provider: &MemoryProvider, args: &[&str], settings: Settings) -> Output {
        let args: Vec<OsString> = args.iter().map(OsString::from).collect();
        let invocation = Invocation::parse(&args).unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();

        let result = App::new(provider, &mut out, &mut err, settings).run(&invocation);

        Output {
            result,
            out: String::from_utf8(out).unwrap(),
            err: String::from_utf8(err).unwrap(),
        }
    }

    fn run(provider: &MemoryProvider, args: &[&str]) -> Output {
        run_with(provider, args, Settings::default())
    }

    fn keep_going() -> Settings {
        Settings {
            keep_going: true,
            ..Default::default()
        }
    }

    #[test]
    fn lists_single_file_in_provider_order() {
        let provider = MemoryProvider::default()
            .file("a.txt", &[("user.b", "1"), ("user.a", "2")]);

        let output = run(&provider, &["list", "a.txt"]);
        assert!(output.result.is_ok());
        assert_eq!(output.out, "user.b\nuser.a\n");
    }

    #[test]
    fn lists_file_without_attributes() {
        let provider = MemoryProvider::default().file("a.txt", &[]);

        let output = run(&provider, &["ls", "a.txt"]);
        assert!(output.result.is_ok());
        assert!(output.out.is_empty());
    }

    #[test]
    fn lists_multiple_files_with_headers() {
        let provider = MemoryProvider::default()
            .file("a.txt", &[("user.foo", "1"), ("user.bar", "2")])
            .file("b.txt", &[]);

        let output = run(&provider, &["list", "a.txt", "b.txt"]);
        assert!(output.result.is_ok());
        assert_eq!(output.out, "a.txt:\n  user.foo\n  user.bar\nb.txt:\n");
    }

    #[test]
    fn list_aborts_on_first_failure() {
        let provider = MemoryProvider::default()
            .file("a.txt", &[("user.foo", "1")])
            .file("c.txt", &[("user.foo", "1")])
            .broken("b.txt");

        let output = run(&provider, &["list", "a.txt", "b.txt", "c.txt"]);
        assert_eq!(output.out, "a.txt:\n  user.foo\n");
        assert_eq!(
            output.result.unwrap_err().to_string(),
            "unable to list extended attributes: b.txt: permission denied"
        );
    }

    #[test]
    fn list_treats_missing_file_as_fatal() {
        let provider = MemoryProvider::default();

        let output = run(&provider, &["list", "missing.txt"]);
        assert!(matches!(output.result, Err(AppError::List(_))));
    }

    #[test]
    fn gets_single_value() {
        let provider = MemoryProvider::default()
            .file("a.txt", &[("user.foo", "bar")]);

        let output = run(&provider, &["get", "user.foo", "a.txt"]);
        assert!(output.result.is_ok());
        assert_eq!(output.out, "bar\n");
    }

    #[test]
    fn get_of_missing_attribute_prints_nothing() {
        let provider = MemoryProvider::default().file("a.txt", &[]);

        let output = run(&provider, &["get", "user.missing", "a.txt"]);
        assert!(output.result.is_ok());
        assert!(output.out.is_empty());
        assert!(output.err.is_empty());
    }

    #[test]
    fn get_fails_on_other_errors() {
        let provider = MemoryProvider::default().broken("a.txt");

        let output = run(&provider, &["get", "user.foo", "a.txt"]);
        assert!(output.out.is_empty());
        assert_eq!(
            output.result.unwrap_err().to_string(),
            "unable to get extended attribute \"user.foo\": a.txt: permission denied"
        );
    }

    #[test]
    fn gets_from_multiple_files_with_empty_values_for_missing() {
        let provider = MemoryProvider::default()
            .file("a.txt", &[])
            .file("b.txt", &[("user.foo", "bar")]);

        let output = run(&provider, &["get", "user.foo", "a.txt", "b.txt", "gone.txt"]);
        assert!(output.result.is_ok());
        assert_eq!(output.out, "a.txt: \nb.txt: bar\ngone.txt: \n");

        let output = run(&provider, &["get", "user.missing", "a.txt", "b.txt"]);
        assert_eq!(output.out, "a.txt: \nb.txt: \n");
    }

    #[test]
    fn get_from_multiple_files_aborts_on_failure() {
        let provider = MemoryProvider::default()
            .file("a.txt", &[("user.foo", "1")])
            .file("c.txt", &[("user.foo", "3")])
            .broken("b.txt");

        let output = run(&provider, &["get", "user.foo", "a.txt", "b.txt", "c.txt"]);
        assert!(matches!(output.result, Err(AppError::Get { .. })));
        assert_eq!(output.out, "a.txt: 1\n");
    }

    #[test]
    fn sets_and_reads_back() {
        let provider = MemoryProvider::default().file("a.txt", &[]);

        let output = run(&provider, &["set", "user.foo", "bar", "a.txt"]);
        assert!(output.result.is_ok());
        assert_eq!(output.out, "OK\n");

        let output = run(&provider, &["get", "user.foo", "a.txt"]);
        assert_eq!(output.out, "bar\n");

        run(&provider, &["set", "user.foo", "baz", "a.txt"]);
        assert_eq!(provider.value("a.txt", "user.foo"), Some(b"baz".to_vec()));
    }

    #[test]
    fn set_keeps_changes_made_before_a_failure() {
        let provider = MemoryProvider::default()
            .file("a.txt", &[])
            .file("c.txt", &[])
            .broken("b.txt");

        let output = run(
            &provider,
            &["set", "user.foo", "bar", "a.txt", "b.txt", "c.txt"],
        );
        assert!(output.out.is_empty());
        assert_eq!(
            output.result.unwrap_err().to_string(),
            "unable to set extended attribute \"user.foo\": b.txt: permission denied"
        );
        assert_eq!(provider.value("a.txt", "user.foo"), Some(b"bar".to_vec()));
        assert_eq!(provider.value("c.txt", "user.foo"), None);
    }

    #[test]
    fn remove_is_idempotent() {
        let provider = MemoryProvider::default()
            .file("a.txt", &[("user.foo", "bar")]);

        for _ in 0..2 {
            let output = run(&provider, &["remove", "user.foo", "a.txt"]);
            assert!(output.result.is_ok());
            assert_eq!(output.out, "OK\n");
        }
        assert_eq!(provider.value("a.txt", "user.foo"), None);

        let output = run(&provider, &["rm", "user.foo", "missing.txt"]);
        assert!(output.result.is_ok());
        assert_eq!(output.out, "OK\n");
    }

    #[test]
    fn remove_aborts_on_other_errors() {
        let provider = MemoryProvider::default()
            .file("a.txt", &[("user.foo", "bar")])
            .protected("user.foo");

        let output = run(&provider, &["rm", "user.foo", "a.txt"]);
        assert!(output.out.is_empty());
        assert_eq!(
            output.result.unwrap_err().to_string(),
            "unable to remove extended attribute \"user.foo\": a.txt: permission denied"
        );
    }

    #[test]
    fn clear_is_idempotent() {
        let provider = MemoryProvider::default()
            .file("c.txt", &[("user.foo", "1"), ("user.bar", "2")]);

        let output = run(&provider, &["clear", "c.txt"]);
        assert!(output.result.is_ok());
        assert_eq!(output.out, "OK\n");

        let output = run(&provider, &["list", "c.txt"]);
        assert!(output.out.is_empty());

        let output = run(&provider, &["clear", "c.txt"]);
        assert!(output.result.is_ok());
        assert_eq!(output.out, "OK\n");
    }

    #[test]
    fn clear_skips_attributes_that_vanished() {
        let provider = MemoryProvider::default()
            .file("a.txt", &[("user.foo", "1")])
            .phantom("user.gone");

        let output = run(&provider, &["clear", "a.txt"]);
        assert!(output.result.is_ok());
        assert_eq!(output.out, "OK\n");
        assert_eq!(provider.value("a.txt", "user.foo"), None);
    }

    #[test]
    fn clear_reports_enumeration_and_removal_failures() {
        let provider = MemoryProvider::default()
            .file("a.txt", &[("user.foo", "1")])
            .broken("b.txt");

        let output = run(&provider, &["clear", "a.txt", "b.txt"]);
        assert!(output.out.is_empty());
        assert_eq!(
            output.result.unwrap_err().to_string(),
            "unable to clear extended attributes: b.txt: permission denied"
        );
        assert_eq!(provider.value("a.txt", "user.foo"), None);

        let provider = MemoryProvider::default()
            .file("a.txt", &[("user.keep", "1"), ("user.foo", "2")])
            .protected("user.keep");
        let output = run(&provider, &["clear", "a.txt"]);
        assert!(matches!(output.result, Err(AppError::ClearRemove { .. })));
        assert_eq!(provider.value("a.txt", "user.foo"), Some(b"2".to_vec()));
    }

    #[test]
    fn keep_going_processes_remaining_files() {
        let provider = MemoryProvider::default().file("a.txt", &[]).broken("b.txt");

        let output = run_with(
            &provider,
            &["set", "user.foo", "bar", "b.txt", "a.txt"],
            keep_going(),
        );
        assert!(output.out.is_empty());
        assert_eq!(
            output.err,
            "error: unable to set extended attribute \"user.foo\": b.txt: permission denied\n"
        );
        assert_eq!(output.result.unwrap_err().to_string(), "1 operation(s) failed");
        assert_eq!(provider.value("a.txt", "user.foo"), Some(b"bar".to_vec()));
    }

    #[test]
    fn keep_going_omits_failed_files_from_output() {
        let provider = MemoryProvider::default()
            .file("a.txt", &[("user.foo", "1")])
            .file("c.txt", &[("user.foo", "3")])
            .broken("b.txt");

        let output = run_with(
            &provider,
            &["get", "user.foo", "a.txt", "b.txt", "c.txt"],
            keep_going(),
        );
        assert_eq!(output.out, "a.txt: 1\nc.txt: 3\n");
        assert!(matches!(output.result, Err(AppError::Failures(1))));

        let output = run_with(&provider, &["ls", "a.txt", "b.txt", "c.txt"], keep_going());
        assert_eq!(output.out, "a.txt:\n  user.foo\nc.txt:\n  user.foo\n");
        assert_eq!(output.err.lines().count(), 1);
    }

    #[test]
    fn keep_going_succeeds_without_failures() {
        let provider = MemoryProvider::default()
            .file("a.txt", &[("user.foo", "1")]);

        let output = run_with(&provider, &["clear", "a.txt"], keep_going());
        assert!(output.result.is_ok());
        assert_eq!(output.out, "OK\n");
        assert!(output.err.is_empty());
    }

    #[test]
    fn passes_values_through_unmodified() {
        let provider = MemoryProvider::default().file("a.txt", &[]);
        provider
            .set(Path::new("a.txt"), OsStr::new("user.bin"), b"\xff\x00\n")
            .unwrap();

        let args: Vec<OsString> = ["get", "user.bin", "a.txt"]
            .iter()
            .map(OsString::from)
            .collect();
        let mut out = Vec::new();
        App::new(&provider, &mut out, io::sink(), Settings::default())
            .run(&Invocation::parse(&args).unwrap())
            .unwrap();
        assert_eq!(out, b"\xff\x00\n\n");
    }
}
