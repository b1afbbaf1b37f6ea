//! Line-oriented link to the target.
//!
//! The serial stream has no framing. The link sends one line at a time with
//! the target's terminator and collects the reply until a line terminator
//! arrives or the target stays quiet for a bounded number of read timeouts.

use std::io::ErrorKind;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::display::clean_device_text;
use crate::echo::echo_filter;
use crate::error::Result;
use crate::port::{DEFAULT_IDLE_TIMEOUT, Port};
use crate::reply::{ReplyKind, TargetProfile, ends_with_terminator, trim_terminators};

/// Read timeout while an exchange is in progress.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// Read timeouts tolerated for one reply before it is abandoned.
pub const DEFAULT_MAX_ATTEMPTS: usize = 12;

const READ_CHUNK: usize = 256;

/// Timeouts used by the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    /// Read timeout while idle-polling for unsolicited output.
    pub idle_timeout: Duration,
    /// Read timeout while waiting for the reply to a sent line.
    pub reply_timeout: Duration,
    /// Read timeouts tolerated per reply. Reads that deliver bytes do not count.
    ///
    /// The whole reply is also bounded by `reply_timeout * max_attempts`.
    pub max_attempts: usize,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Reply collected after sending one line.
#[derive(Debug, Clone)]
pub struct ReplyBuffer {
    sent: Vec<u8>,
    raw: Vec<u8>,
    output_start: usize,
    terminated: bool,
    kind: ReplyKind,
}

impl ReplyBuffer {
    fn new(sent: &[u8], raw: Vec<u8>, terminated: bool, profile: TargetProfile) -> Self {
        let output_start = raw.len() - echo_filter(sent, &raw).len();
        let kind = profile.classify(&raw[output_start..]);
        Self {
            sent: sent.to_vec(),
            raw,
            output_start,
            terminated,
            kind,
        }
    }

    /// Everything read, echo included.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// What the target said after echoing the line.
    pub fn output(&self) -> &[u8] {
        &self.raw[self.output_start..]
    }

    /// Classification of [`output`](Self::output).
    pub fn kind(&self) -> ReplyKind {
        self.kind
    }

    /// Whether the target signalled an error.
    pub fn is_error(&self) -> bool {
        self.kind == ReplyKind::Error
    }

    /// Whether a line terminator arrived before the reads ran out.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Sent line followed by the target's output, without trailing newlines.
    ///
    /// The echo is replaced by what was sent, so targets that do not echo
    /// display the same as targets that do.
    pub fn display_text(&self) -> String {
        let mut text = String::from_utf8_lossy(trim_terminators(&self.sent)).into_owned();
        text.push_str(&String::from_utf8_lossy(self.output()));
        clean_device_text(&text)
            .trim_end_matches('\n')
            .to_string()
    }
}

/// Line reader/writer over a [`Port`].
pub struct Link<P: Port> {
    port: P,
    profile: TargetProfile,
    timing: LinkTiming,
}

impl<P: Port> Link<P> {
    /// Wrap an opened port.
    pub fn new(port: P, profile: TargetProfile, timing: LinkTiming) -> Self {
        Self {
            port,
            profile,
            timing,
        }
    }

    /// Active target profile.
    pub fn profile(&self) -> TargetProfile {
        self.profile
    }

    /// Timing in use.
    pub fn timing(&self) -> LinkTiming {
        self.timing
    }

    /// Borrow the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutably borrow the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Release the underlying port.
    pub fn into_inner(self) -> P {
        self.port
    }

    fn use_timeout(&mut self, timeout: Duration) -> Result<()> {
        if self.port.timeout() != timeout {
            self.port.set_timeout(timeout)?;
        }
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Send one line, replacing any line ending with the target's terminator.
    ///
    /// Returns the bytes written.
    pub fn write_line(&mut self, line: &str) -> Result<Vec<u8>> {
        let mut bytes = line
            .trim_end_matches(['\r', '\n'])
            .as_bytes()
            .to_vec();
        bytes.extend_from_slice(
            self.profile
                .terminator()
                .as_bytes(),
        );
        trace!("TX {:?}", String::from_utf8_lossy(&bytes));
        self.port.write_all_bytes(&bytes)?;
        Ok(bytes)
    }

    /// One short read for unsolicited output. Empty when nothing arrived.
    pub fn poll(&mut self) -> Result<Vec<u8>> {
        self.use_timeout(self.timing.idle_timeout)?;
        let mut buf = [0u8; READ_CHUNK];
        let n = self.read_chunk(&mut buf)?;
        if n > 0 {
            trace!("RX {:?}", String::from_utf8_lossy(&buf[..n]));
        }
        Ok(buf[..n].to_vec())
    }

    /// Poll until the target goes quiet and return everything read.
    pub fn drain(&mut self) -> Result<Vec<u8>> {
        let mut all = Vec::new();
        loop {
            let chunk = self.poll()?;
            if chunk.is_empty() {
                return Ok(all);
            }
            all.extend_from_slice(&chunk);
        }
    }

    /// Collect the reply to `sent`.
    ///
    /// Line terminators left over from the previous reply are skipped. Reading
    /// stops at the first chunk that ends a line, after
    /// [`LinkTiming::max_attempts`] reads that time out, or when the reply
    /// window runs out while bytes keep trickling in.
    pub fn read_reply(&mut self, sent: &[u8]) -> Result<ReplyBuffer> {
        self.use_timeout(self.timing.reply_timeout)?;
        let window = self
            .timing
            .reply_timeout
            .saturating_mul(u32::try_from(self.timing.max_attempts).unwrap_or(u32::MAX));
        let start = Instant::now();
        let mut raw = Vec::new();
        let mut buf = [0u8; READ_CHUNK];
        let mut terminated = false;
        let mut timeouts = 0;

        while timeouts < self.timing.max_attempts {
            let n = self.read_chunk(&mut buf)?;
            if n == 0 {
                timeouts += 1;
                continue;
            }
            let chunk = &buf[..n];
            if raw.is_empty() {
                let skip = chunk
                    .iter()
                    .take_while(|&&b| b == b'\r' || b == b'\n')
                    .count();
                raw.extend_from_slice(&chunk[skip..]);
            } else {
                raw.extend_from_slice(chunk);
            }
            if ends_with_terminator(&raw) {
                terminated = true;
                break;
            }
            if start.elapsed() >= window {
                break;
            }
        }

        let reply = ReplyBuffer::new(sent, raw, terminated, self.profile);
        debug!(
            "{} RX {:?} ({:?}{})",
            self.port.name(),
            String::from_utf8_lossy(reply.raw()),
            reply.kind(),
            if terminated { "" } else { ", unterminated" }
        );
        Ok(reply)
    }

    /// Send `line` and collect its reply.
    pub fn exchange(&mut self, line: &str) -> Result<ReplyBuffer> {
        let sent = self.write_line(line)?;
        self.read_reply(&sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::{MockTarget, init_test_logging};

    fn link(target: MockTarget) -> Link<MockTarget> {
        init_test_logging();
        Link::new(target, TargetProfile::Stm8ef, LinkTiming::default())
    }

    #[test]
    fn test_logging_setup_is_repeatable() {
        init_test_logging();
        init_test_logging();
        log::debug!("test logger installed");
    }

    #[test]
    fn test_write_line_normalizes_ending() {
        let mut link = link(MockTarget::stm8ef());
        assert_eq!(link.write_line("words\n").unwrap(), b"words\r");
        assert_eq!(link.write_line("1 2 +\r\n").unwrap(), b"1 2 +\r");
        assert_eq!(link.port().received(), ["words", "1 2 +"]);
    }

    #[test]
    fn test_exchange_ok() {
        let mut link = link(MockTarget::stm8ef());
        let reply = link.exchange("1 2 + .").unwrap();
        assert!(reply.is_terminated());
        assert_eq!(reply.kind(), ReplyKind::PromptOk);
        assert_eq!(reply.output(), b" ok\r\n");
        assert_eq!(reply.display_text(), "1 2 + . ok");
    }

    #[test]
    fn test_exchange_error() {
        let mut link = link(MockTarget::stm8ef().rejecting("frob"));
        let reply = link.exchange("frob").unwrap();
        assert!(reply.is_error());
    }

    #[test]
    fn test_display_without_echo_matches_echo() {
        let mut link = link(MockTarget::stm8ef().without_echo());
        let reply = link.exchange("1 2 + .").unwrap();
        assert_eq!(reply.display_text(), "1 2 + . ok");
    }

    #[test]
    fn test_unterminated_reply_gives_up() {
        let mut link = link(MockTarget::stm8ef().silent_on("key"));
        let reply = link.exchange("key").unwrap();
        assert!(!reply.is_terminated());
        assert_eq!(reply.kind(), ReplyKind::Plain);
    }

    #[test]
    fn test_trickling_reply_is_collected() {
        let mut link = link(MockTarget::stm8ef().chunked(1));
        let reply = link.exchange(": double dup + ;").unwrap();
        assert!(reply.is_terminated());
        assert_eq!(reply.kind(), ReplyKind::PromptOk);
        assert_eq!(reply.display_text(), ": double dup + ; ok");
    }

    #[test]
    fn test_reply_split_between_cr_and_lf() {
        // "dup ok\r" fills the first read, the LF waits for the next exchange
        let mut link = link(MockTarget::stm8ef().chunked(7));
        let first = link.exchange("dup").unwrap();
        assert_eq!(first.raw(), b"dup ok\r");
        assert_eq!(first.kind(), ReplyKind::PromptOk);

        let second = link.exchange("drop").unwrap();
        assert_eq!(second.raw(), b"drop ok\r\n");
        assert_eq!(second.kind(), ReplyKind::PromptOk);
    }

    #[test]
    fn test_error_in_last_chunk() {
        let mut link = link(MockTarget::stm8ef().rejecting("frob").chunked(3));
        let reply = link.exchange("frob").unwrap();
        assert!(reply.is_terminated());
        assert!(reply.is_error());
        assert_eq!(reply.raw(), b"frob ?\x07\r\n");
    }

    #[test]
    fn test_leftover_terminators_are_skipped() {
        let mut target = MockTarget::stm8ef();
        target.queue(b"\n");
        let mut link = link(target);
        let reply = link.exchange("dup").unwrap();
        assert_eq!(reply.raw(), b"dup ok\r\n");
        assert_eq!(reply.kind(), ReplyKind::PromptOk);
    }

    #[test]
    fn test_poll_and_drain() {
        let mut target = MockTarget::stm8ef();
        target.queue(b"stm8eForth v2.2\r\n");
        let mut link = link(target);
        assert_eq!(link.drain().unwrap(), b"stm8eForth v2.2\r\n");
        assert!(link.poll().unwrap().is_empty());
        assert_eq!(link.port().timeout(), DEFAULT_IDLE_TIMEOUT);
    }
}
