//! Locating the MP2D executable and querying and comparing its version.

use std::{
    cmp::Ordering,
    collections::HashMap,
    env,
    path::{Path, PathBuf},
    process::Command,
    sync::{Arc, Mutex},
};

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;

/// oldest MP2D release the harness can drive
pub const MIN_VERSION: &str = "1.1";

const INSTALL_HINT: &str = "Please install via `conda install mp2d -c psi4`";

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bv?([0-9]+(?:\.[0-9]+)*)\b").expect("valid regex")
});

/// Resolve `program` to an executable path. Names containing a path separator
/// are used as given, others are searched for on `PATH`.
pub fn locate_program(program: &str) -> Result<PathBuf, Error> {
    let not_found = || {
        Error::Availability(format!(
            "Program {program} not found in path. {INSTALL_HINT}"
        ))
    };
    if program.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(program);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(not_found())
        };
    }
    let path = env::var_os("PATH").ok_or_else(not_found)?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
        .ok_or_else(not_found)
}

/// A dotted numeric version like 1.1 or v1.1.2. Missing trailing components
/// compare equal to zero
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Version(Vec<u64>);

impl Version {
    /// extract the first dotted number from `s`, if there is one
    pub fn parse(s: &str) -> Option<Self> {
        let caps = VERSION_RE.captures(s)?;
        caps[1]
            .split('.')
            .map(|p| p.parse().ok())
            .collect::<Option<Vec<u64>>>()
            .map(Self)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let n = self.0.len().max(other.0.len());
        for i in 0..n {
            let a = self.0.get(i).copied().unwrap_or(0);
            let b = other.0.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                o => return o,
            }
        }
        Ordering::Equal
    }
}

/// whether `installed` is at least `minimum`. output that contains no version
/// at all is never new enough
pub fn is_new_enough(installed: &str, minimum: &str) -> bool {
    match (Version::parse(installed), Version::parse(minimum)) {
        (Some(i), Some(m)) => i >= m,
        _ => false,
    }
}

/// Cache of program versions keyed by executable path. Entries are never
/// invalidated: the installed binary is assumed not to change while the
/// process runs. Concurrent misses on the same path may query the program
/// twice, which is harmless.
#[derive(Debug, Default)]
pub struct VersionCache {
    versions: Mutex<HashMap<PathBuf, String>>,
}

static GLOBAL: Lazy<Arc<VersionCache>> = Lazy::new(Arc::default);

impl VersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// the process-wide cache
    pub fn global() -> Arc<Self> {
        GLOBAL.clone()
    }

    /// record `version` for `exe` without running it
    pub fn insert(&self, exe: &Path, version: &str) {
        self.lock().insert(exe.to_owned(), version.to_owned());
    }

    /// Return the version of the executable at `exe`, running `exe --version`
    /// the first time it is requested.
    pub fn get_version(&self, exe: &Path) -> Result<String, Error> {
        if let Some(v) = self.lock().get(exe) {
            return Ok(v.clone());
        }
        info!("querying version of {}", exe.display());
        let output = Command::new(exe).arg("--version").output()?;
        let raw = String::from_utf8_lossy(&output.stdout);
        let raw = raw.trim();
        // anything older than 1.1 answers --version with an input error, which
        // still fails the version comparison
        let version = match Version::parse(raw) {
            Some(v) => v
                .0
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join("."),
            None => raw.to_owned(),
        };
        self.lock().insert(exe.to_owned(), version.clone());
        Ok(version)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, String>> {
        // a poisoned cache still holds valid entries
        self.versions.lock().unwrap_or_else(|e| e.into_inner())
    }
}
