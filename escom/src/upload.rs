//! Upload engine: streams Forth source files to the target.
//!
//! Each line of a source file is either handled locally (comments, `\res`
//! directives, nested `#include` / `#require`) or sent to the target and
//! checked against its reply. The first error signalled by the target aborts
//! the file and every file that included it.
//!
//! ```text
//! \ blink.fs
//! \res MCU: STM8S103
//! \res export PD_ODR PD_DDR
//! #require hw/delay.fs
//! : blink  PD_ODR c@ 32 xor PD_ODR c! ;   \ toggle PD5
//! \\ everything below is ignored
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::dictionary::{SymbolDictionary, parse_hex};
use crate::error::{Error, Result};
use crate::link::Link;
use crate::port::Port;
use crate::reply::{INITIAL_MARGIN, ReplyKind, beautify};
use crate::search::{SearchPath, bare_name};

/// Maximum nesting of `#include` / `#require`.
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// One file being uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    /// Resolved path of the file.
    pub path: PathBuf,
    /// Whether the file was pulled in by `#require`.
    pub conditional: bool,
    /// Nesting level, 1 for the file the operator asked for.
    pub depth: usize,
}

/// Progress reported while uploading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// A file is about to be streamed.
    Opened(UploadTask),
    /// `#require` found the word already defined; the file was not sent.
    Skipped {
        /// Name as written in the directive.
        name: String,
    },
    /// Empty source line.
    Blank,
    /// Comment line, not sent.
    Comment(String),
    /// `\res` directive, handled locally.
    Resource(String),
    /// Symbols loaded from a resource file.
    SymbolsLoaded {
        /// Resource file.
        path: PathBuf,
        /// Number of symbols defined.
        count: usize,
    },
    /// A symbol was sent to the target as a constant.
    Exported {
        /// Symbol name.
        name: String,
        /// Symbol value.
        value: u32,
    },
    /// `#include` / `#require` line and the target's reply to it.
    Directive {
        /// The line as sent.
        line: String,
        /// Reply text, not classified.
        reply: String,
    },
    /// Reply to a source line, aligned for display.
    Reply {
        /// Sent line and target output.
        text: String,
        /// Reply classification.
        kind: ReplyKind,
    },
    /// Something odd that does not abort the upload.
    Warning(String),
    /// Streaming of a file ended, successfully or not.
    Closed(PathBuf),
}

/// What one source line asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// Empty line.
    Blank,
    /// `\\`: ignore the rest of the file.
    Stop,
    /// `\res ...` with any trailing comment removed.
    Resource(&'a str),
    /// Comment line.
    Comment(&'a str),
    /// `#include <file>` or `#require <file>`.
    Include {
        /// The whole directive line.
        line: &'a str,
        /// First operand, if any.
        file: Option<&'a str>,
        /// `#require` rather than `#include`.
        conditional: bool,
    },
    /// Forth source to send, trailing comment removed.
    Source(&'a str),
}

/// Classify one physical source line. Trailing CR/LF are ignored.
pub fn classify_line(line: &str) -> LineKind<'_> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return LineKind::Blank;
    }
    if line.starts_with("\\\\") {
        return LineKind::Stop;
    }
    if line.starts_with("\\res") {
        return LineKind::Resource(strip_comment(line));
    }
    if line.starts_with('\\') {
        return LineKind::Comment(line);
    }
    let conditional = line.starts_with("#require");
    if conditional || line.starts_with("#include") {
        return LineKind::Include {
            line,
            file: line.split_whitespace().nth(1),
            conditional,
        };
    }
    match strip_comment(line) {
        "" => LineKind::Comment(line),
        source => LineKind::Source(source),
    }
}

/// Remove a trailing `\` comment.
///
/// The comment starts at the first `\` after the first column that stands as
/// a word of its own: preceded by whitespace and followed by whitespace or the
/// end of the line.
pub fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for i in 1..bytes.len() {
        if bytes[i] == b'\\'
            && bytes[i - 1].is_ascii_whitespace()
            && bytes
                .get(i + 1)
                .is_none_or(u8::is_ascii_whitespace)
        {
            return line[..i].trim_end();
        }
    }
    line
}

/// Uploads source files over a [`Link`].
///
/// Owns the symbol dictionary for the session, so symbols loaded by one
/// upload stay available to the next.
pub struct Uploader<P: Port> {
    link: Link<P>,
    dictionary: SymbolDictionary,
    search: SearchPath,
}

impl<P: Port> Uploader<P> {
    /// Create an uploader with an empty dictionary.
    pub fn new(link: Link<P>, search: SearchPath) -> Self {
        Self {
            link,
            dictionary: SymbolDictionary::new(),
            search,
        }
    }

    /// Borrow the link.
    pub fn link(&self) -> &Link<P> {
        &self.link
    }

    /// Mutably borrow the link, e.g. to forward console lines.
    pub fn link_mut(&mut self) -> &mut Link<P> {
        &mut self.link
    }

    /// Symbols known so far.
    pub fn dictionary(&self) -> &SymbolDictionary {
        &self.dictionary
    }

    /// Search path used for source and resource files.
    pub fn search_path(&self) -> &SearchPath {
        &self.search
    }

    /// Release the link.
    pub fn into_link(self) -> Link<P> {
        self.link
    }

    /// Upload `name`, located through the search path.
    ///
    /// With `conditional` set the file is only sent when the target does not
    /// yet know a word named like the file (`#require`).
    pub fn include_file(
        &mut self,
        name: &str,
        conditional: bool,
        events: &mut dyn FnMut(&UploadEvent),
    ) -> Result<()> {
        self.include_at(name, conditional, 1, events)
    }

    /// Ask the target whether `word` is defined (`' <word> DROP`).
    pub fn probe_word(&mut self, word: &str) -> Result<bool> {
        let probe = format!("' {word} DROP");
        let reply = self.link.exchange(&probe)?;
        if !reply.is_terminated() {
            return Err(Error::ProbeTimeout(probe));
        }
        Ok(!reply.is_error())
    }

    fn include_at(
        &mut self,
        name: &str,
        conditional: bool,
        depth: usize,
        events: &mut dyn FnMut(&UploadEvent),
    ) -> Result<()> {
        let path = self
            .search
            .resolve(name)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;
        if depth > MAX_INCLUDE_DEPTH {
            return Err(Error::IncludeTooDeep {
                path,
                limit: MAX_INCLUDE_DEPTH,
            });
        }
        let file = File::open(&path).map_err(|source| Error::OpenFailed {
            path: path.clone(),
            source,
        })?;

        if conditional {
            let word = bare_name(name);
            if self.probe_word(word)? {
                info!("{word} already on target, not uploading {}", path.display());
                events(&UploadEvent::Skipped {
                    name: name.to_string(),
                });
                return Ok(());
            }
        }

        let task = UploadTask {
            path,
            conditional,
            depth,
        };
        info!("Uploading {} (depth {depth})", task.path.display());
        events(&UploadEvent::Opened(task.clone()));
        let result = self.stream(&task, BufReader::new(file), events);
        events(&UploadEvent::Closed(task.path.clone()));
        result
    }

    fn stream(
        &mut self,
        task: &UploadTask,
        reader: impl BufRead,
        events: &mut dyn FnMut(&UploadEvent),
    ) -> Result<()> {
        let mut margin = INITIAL_MARGIN;
        for raw in reader.split(b'\n') {
            let raw = raw.map_err(|source| Error::OpenFailed {
                path: task.path.clone(),
                source,
            })?;
            let line = String::from_utf8_lossy(&raw);
            match classify_line(&line) {
                LineKind::Blank => events(&UploadEvent::Blank),
                LineKind::Stop => {
                    debug!("Stop marker in {}", task.path.display());
                    break;
                },
                LineKind::Comment(text) => events(&UploadEvent::Comment(text.to_string())),
                LineKind::Resource(directive) => {
                    events(&UploadEvent::Resource(directive.to_string()));
                    self.handle_res(task, directive, events)?;
                },
                LineKind::Include {
                    line,
                    file,
                    conditional,
                } => {
                    let reply = self.link.exchange(line)?;
                    events(&UploadEvent::Directive {
                        line: line.to_string(),
                        reply: reply.display_text(),
                    });
                    match file {
                        Some(file) => self.include_at(file, conditional, task.depth + 1, events)?,
                        None => {
                            warn!("`{line}` names no file");
                            events(&UploadEvent::Warning(format!("`{line}` names no file, skipped")));
                        },
                    }
                },
                LineKind::Source(source) => self.send_source(task, source, &mut margin, events)?,
            }
        }
        Ok(())
    }

    fn send_source(
        &mut self,
        task: &UploadTask,
        source: &str,
        margin: &mut usize,
        events: &mut dyn FnMut(&UploadEvent),
    ) -> Result<()> {
        let reply = self.link.exchange(source)?;
        let text = reply.display_text();

        // only the last line carries the prompt
        let (head, last) = match text.rsplit_once('\n') {
            Some((head, last)) => (Some(head), last),
            None => (None, text.as_str()),
        };
        *margin = (*margin).max(last.chars().count());
        let aligned = beautify(last, self.link.profile().ok_marker(), *margin);
        let text = match head {
            Some(head) => format!("{head}\n{aligned}"),
            None => aligned,
        };

        events(&UploadEvent::Reply {
            text: text.clone(),
            kind: reply.kind(),
        });
        if reply.is_error() {
            return Err(Error::UploadRejected {
                file: task.path.clone(),
                reply: text,
            });
        }
        if !reply.is_terminated() {
            warn!("No prompt after `{source}`");
            events(&UploadEvent::Warning(format!("No prompt after `{source}`")));
        }
        Ok(())
    }

    fn handle_res(
        &mut self,
        task: &UploadTask,
        directive: &str,
        events: &mut dyn FnMut(&UploadEvent),
    ) -> Result<()> {
        let tokens: Vec<&str> = directive
            .split_whitespace()
            .collect();
        let invalid = || Error::InvalidDirective(directive.to_string());
        let keyword = *tokens.get(1).ok_or_else(invalid)?;

        if keyword.eq_ignore_ascii_case("MCU:") {
            let cpu = tokens.get(2).ok_or_else(invalid)?;
            self.load_mcu(cpu, events)
        } else if keyword.eq_ignore_ascii_case("export") {
            if tokens.len() < 3 {
                return Err(invalid());
            }
            for name in &tokens[2..] {
                self.export_symbol(task, name, events)?;
            }
            Ok(())
        } else if tokens
            .get(2)
            .is_some_and(|t| t.eq_ignore_ascii_case("equ"))
        {
            let value = parse_hex(keyword).ok_or_else(invalid)?;
            let name = tokens.get(3).ok_or_else(invalid)?;
            debug!("{name} = ${value:X}");
            self.dictionary.define(name, value);
            Ok(())
        } else {
            warn!("Ignoring unknown directive `{directive}`");
            events(&UploadEvent::Warning(format!("Unknown directive `{directive}` ignored")));
            Ok(())
        }
    }

    fn load_mcu(&mut self, cpu: &str, events: &mut dyn FnMut(&UploadEvent)) -> Result<()> {
        let file = format!("{cpu}.efr");
        let path = self
            .search
            .resolve(&file)
            .ok_or_else(|| Error::FileNotFound(file.clone()))?;
        let count = self
            .dictionary
            .load_resource_file(&path)?;
        events(&UploadEvent::SymbolsLoaded { path, count });
        Ok(())
    }

    fn export_symbol(
        &mut self,
        task: &UploadTask,
        name: &str,
        events: &mut dyn FnMut(&UploadEvent),
    ) -> Result<()> {
        let value = self
            .dictionary
            .lookup(name)
            .ok_or_else(|| Error::UndefinedSymbol(name.to_string()))?;
        if self.probe_word(name)? {
            debug!("{name} already defined on target");
            return Ok(());
        }

        let definition = format!("${value:X} CONSTANT {name}");
        let reply = self.link.exchange(&definition)?;
        if reply.is_error() {
            return Err(Error::UploadRejected {
                file: task.path.clone(),
                reply: reply.display_text(),
            });
        }
        if !reply.is_terminated() {
            return Err(Error::ProbeTimeout(definition));
        }
        events(&UploadEvent::Exported {
            name: name.to_string(),
            value,
        });
        Ok(())
    }
}
