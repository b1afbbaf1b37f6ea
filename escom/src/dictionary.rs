//! Symbol dictionary for `\res` directives.
//!
//! Resource files (`*.efr`) describe the registers of one MCU:
//!
//! ```text
//! \ STM8S103 resources
//! 7F60 equ CFG_GCR    \ Global configuration register
//! 500F equ PD_ODR
//! ```
//!
//! Symbols are looked up when a source file exports them to the target as
//! constants.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};

/// One named value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolEntry {
    /// Symbol name (case-sensitive).
    pub name: String,
    /// Symbol value.
    pub value: u32,
}

/// Insertion-ordered map from symbol name to value.
#[derive(Debug, Default, Clone)]
pub struct SymbolDictionary {
    entries: Vec<SymbolEntry>,
    index: HashMap<String, usize>,
}

impl SymbolDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a symbol or overwrite its value, keeping its original position.
    pub fn define(&mut self, name: &str, value: u32) {
        if let Some(&i) = self.index.get(name) {
            self.entries[i].value = value;
        } else {
            self.index.insert(name.to_string(), self.entries.len());
            self.entries.push(SymbolEntry {
                name: name.to_string(),
                value,
            });
        }
    }

    /// Value of `name`, if defined.
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.index
            .get(name)
            .map(|&i| self.entries[i].value)
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Symbols in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.entries.iter()
    }

    /// Load every `<hex> equ <name>` line of a resource file.
    ///
    /// Returns the number of symbols defined. Only failing to open or read the
    /// file is an error; lines that do not match are skipped.
    pub fn load_resource_file(&mut self, path: &Path) -> Result<usize> {
        let open_failed = |source| Error::OpenFailed {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(open_failed)?;
        let count = self
            .load_resource(BufReader::new(file))
            .map_err(open_failed)?;
        debug!("Loaded {count} symbols from {}", path.display());
        Ok(count)
    }

    /// Load resource lines from any buffered reader.
    pub fn load_resource<R: BufRead>(&mut self, reader: R) -> std::io::Result<usize> {
        let mut count = 0;
        for line in reader.split(b'\n') {
            let line = line?;
            if let Some((name, value)) = parse_resource_line(&String::from_utf8_lossy(&line)) {
                self.define(name, value);
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Parse one resource line into `(name, value)`.
///
/// The line needs at least three tokens, the second being exactly `equ` and
/// the first a hexadecimal number. Comment lines (starting with `\`) never match.
pub fn parse_resource_line(line: &str) -> Option<(&str, u32)> {
    if line.starts_with('\\') {
        return None;
    }
    let mut tokens = line.split_whitespace();
    let value = tokens.next()?;
    let keyword = tokens.next()?;
    let name = tokens.next()?;
    if keyword != "equ" {
        return None;
    }
    Some((name, parse_hex(value)?))
}

/// Parse a hexadecimal number, with or without a `$` / `0x` prefix.
pub fn parse_hex(text: &str) -> Option<u32> {
    let digits = text
        .strip_prefix('$')
        .or_else(|| text.strip_prefix("0x"))
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).ok()
}
