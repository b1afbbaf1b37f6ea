//! Echo filtering.
//!
//! Most Forth targets echo every character they receive before printing
//! their own output. Walking the sent and received bytes in lock-step
//! isolates what the target actually said.

/// Return the part of `received` that is not an echo of `sent`.
///
/// Both slices are compared from the start; the result begins at the first
/// byte where they differ. If `received` is entirely an echo (a prefix of
/// `sent`), the result is empty.
pub fn echo_filter<'a>(sent: &[u8], received: &'a [u8]) -> &'a [u8] {
    let echoed = sent
        .iter()
        .zip(received)
        .take_while(|(s, r)| s == r)
        .count();
    &received[echoed..]
}

/// Tracks the echo still expected from the last line sent.
///
/// The target's echo can trickle in over several reads. The tracker consumes
/// the expected echo as it arrives and stops filtering at the first
/// divergence.
#[derive(Debug, Default, Clone)]
pub struct EchoTracker {
    expected: Vec<u8>,
}

impl EchoTracker {
    /// Create a tracker with no pending echo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record bytes that were just sent and will be echoed back.
    pub fn expect(&mut self, sent: &[u8]) {
        self.expected.clear();
        self.expected.extend_from_slice(sent);
    }

    /// Bytes still expected as echo.
    pub fn pending(&self) -> &[u8] {
        &self.expected
    }

    /// Strip the echoed prefix of `received` and return the rest.
    pub fn filter<'a>(&mut self, received: &'a [u8]) -> &'a [u8] {
        let rest = echo_filter(&self.expected, received);
        let echoed = received.len() - rest.len();
        if rest.is_empty() {
            self.expected.drain(..echoed);
        } else {
            self.expected.clear();
        }
        rest
    }
}
