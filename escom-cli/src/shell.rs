//! Operator commands typed at the console.
//!
//! A console line starting with `#` is handled by escom itself instead of
//! being forwarded to the target:
//!
//! ```text
//! #ls [dir]      #dir [dir]     list files
//! #cd <dir>                     change working directory
//! #i <file>      #include <file>  upload a file
//! #r <file>      #require <file>  upload a file unless the target knows it
//! #cat <file>                   show a file
//! ```

use std::fs;
use std::io;
use std::path::Path;

/// A parsed `#` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand<'a> {
    /// `#ls` / `#dir`.
    List(Option<&'a str>),
    /// `#cd`.
    ChangeDir(Option<&'a str>),
    /// `#i` / `#include`.
    Include(Option<&'a str>),
    /// `#r` / `#require`.
    Require(Option<&'a str>),
    /// `#cat`.
    Cat(Option<&'a str>),
    /// Anything else after `#`.
    Unknown(&'a str),
}

impl<'a> ShellCommand<'a> {
    /// Parse a console line. Returns `None` unless it starts with `#`.
    pub fn parse(line: &'a str) -> Option<Self> {
        let command = line.strip_prefix('#')?;
        let mut tokens = command.split_whitespace();
        let name = tokens.next().unwrap_or("");
        let arg = tokens.next();
        Some(match name {
            "ls" | "dir" => Self::List(arg),
            "cd" => Self::ChangeDir(arg),
            "i" | "include" => Self::Include(arg),
            "r" | "require" => Self::Require(arg),
            "cat" => Self::Cat(arg),
            _ => Self::Unknown(name),
        })
    }
}

/// Directory entries, sorted, with a trailing `/` on subdirectories.
pub fn list_dir(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let mut name = entry
            .file_name()
            .to_string_lossy()
            .into_owned();
        if entry
            .file_type()
            .is_ok_and(|t| t.is_dir())
        {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}
