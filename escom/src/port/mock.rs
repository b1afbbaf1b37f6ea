//! Simulated Forth target for unit tests.
//!
//! Echoes every line it receives and answers like a small interactive
//! interpreter: `' <word> DROP` succeeds only for known words,
//! `<n> CONSTANT <name>` and `: <name> ...` make a word known, lines matching
//! a rejection pattern get a BEL-marked error reply. Replies can be handed
//! out a few bytes per read to mimic a slow serial line.

use std::collections::{HashSet, VecDeque};
use std::io::{self, Read, Write};
use std::time::Duration;

use crate::error::Result;
use crate::port::Port;

/// Route engine logs through the test harness; `RUST_LOG=trace` shows every byte.
pub(crate) fn init_test_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .try_init();
}

pub(crate) struct MockTarget {
    marker: &'static str,
    echo: bool,
    known_words: HashSet<String>,
    reject: Vec<String>,
    silent: Vec<String>,
    received: Vec<String>,
    partial: Vec<u8>,
    pending: VecDeque<u8>,
    chunk: usize,
    timeout: Duration,
}

impl MockTarget {
    pub(crate) fn stm8ef() -> Self {
        Self::with_marker("ok")
    }

    pub(crate) fn mecrisp() -> Self {
        Self::with_marker("ok.")
    }

    fn with_marker(marker: &'static str) -> Self {
        Self {
            marker,
            echo: true,
            known_words: HashSet::new(),
            reject: Vec::new(),
            silent: Vec::new(),
            received: Vec::new(),
            partial: Vec::new(),
            pending: VecDeque::new(),
            chunk: usize::MAX,
            timeout: Duration::from_millis(50),
        }
    }

    pub(crate) fn with_word(mut self, word: &str) -> Self {
        self.known_words.insert(word.to_string());
        self
    }

    pub(crate) fn rejecting(mut self, pattern: &str) -> Self {
        self.reject.push(pattern.to_string());
        self
    }

    pub(crate) fn silent_on(mut self, pattern: &str) -> Self {
        self.silent.push(pattern.to_string());
        self
    }

    /// Hand out at most `size` bytes per read, like a slow line does.
    pub(crate) fn chunked(mut self, size: usize) -> Self {
        self.chunk = size.max(1);
        self
    }

    pub(crate) fn without_echo(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Queue unsolicited output, as if the target printed on its own.
    pub(crate) fn queue(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes);
    }

    /// Lines received so far, without their terminator.
    pub(crate) fn received(&self) -> &[String] {
        &self.received
    }

    pub(crate) fn knows(&self, word: &str) -> bool {
        self.known_words.contains(word)
    }

    fn respond(&mut self, line: &str) {
        self.received.push(line.to_string());
        if self.echo {
            self.pending.extend(line.as_bytes());
        }
        if self.silent.iter().any(|p| line.contains(p.as_str())) {
            return;
        }

        let reply = if let Some(word) = line
            .strip_prefix("' ")
            .and_then(|rest| rest.strip_suffix(" DROP"))
        {
            if self.known_words.contains(word.trim()) {
                format!(" {}\r\n", self.marker)
            } else {
                format!(" {}?\x07\r\n", word.trim())
            }
        } else if self.reject.iter().any(|p| line.contains(p.as_str())) {
            " ?\x07\r\n".to_string()
        } else {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                [_, "CONSTANT", name, ..] | [":", name, ..] => {
                    self.known_words.insert((*name).to_string());
                },
                _ => {},
            }
            format!(" {}\r\n", self.marker)
        };
        self.pending.extend(reply.as_bytes());
    }
}

impl Read for MockTarget {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf
            .len()
            .min(self.pending.len())
            .min(self.chunk);
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if byte == b'\r' {
                let line = String::from_utf8_lossy(&self.partial).into_owned();
                self.partial.clear();
                self.respond(&line);
            } else {
                self.partial.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for MockTarget {
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn name(&self) -> &str {
        "mock"
    }
}
