//! Search path for `#include`, `#require` and `\res MCU:` files.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::trace;

use crate::error::Error;

/// Default search path: the working directory, then `mcu` and `lib` below it.
pub const DEFAULT_SEARCH_PATH: &str = ".;./mcu;./lib";

/// Ordered list of directories searched for source and resource files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl Default for SearchPath {
    fn default() -> Self {
        Self::parse(DEFAULT_SEARCH_PATH)
    }
}

impl SearchPath {
    /// Parse a `;`-separated directory list. Empty entries are ignored.
    pub fn parse(list: &str) -> Self {
        Self {
            dirs: list
                .split(';')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .collect(),
        }
    }

    /// Build a search path from explicit directories.
    pub fn from_dirs<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }

    /// Directories in search order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Locate `name`.
    ///
    /// The name is first tried as given. A name containing a path separator
    /// (`/` or `\`) is never searched for; otherwise each directory is tried
    /// in order and the first existing file wins.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let literal = Path::new(name);
        if literal.is_file() {
            return Some(literal.to_path_buf());
        }
        if name.contains(['/', '\\']) {
            return None;
        }
        self.dirs
            .iter()
            .map(|dir| dir.join(name))
            .inspect(|candidate| trace!("Trying {}", candidate.display()))
            .find(|candidate| candidate.is_file())
    }
}

impl FromStr for SearchPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for SearchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self
            .dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect();
        f.write_str(&joined.join(";"))
    }
}

/// Bare file name: everything after the last `/` or `\`.
pub fn bare_name(name: &str) -> &str {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
}
