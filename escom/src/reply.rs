//! Reply classification for the target's interactive prompt.
//!
//! The remote interpreter gives no structured acknowledgement. A line is
//! finished when the interpreter prints its prompt marker (`ok` for STM8EF,
//! `ok.` for Mecrisp) followed by a line terminator, and an error is marked
//! with a BEL character somewhere in the reply.
//!
//! Target-specific markers live in one rule table keyed by [`TargetProfile`];
//! supporting another Forth dialect means adding a row.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Control byte the target emits when it rejects input.
pub const ERROR_SIGNAL: u8 = 0x07;

/// Display column the prompt marker is aligned to before any reply widened it.
pub const INITIAL_MARGIN: usize = 85;

/// Supported Forth targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TargetProfile {
    /// STM8 eForth.
    #[default]
    Stm8ef,
    /// Mecrisp Forth (Stellaris, Across, ...).
    Mecrisp,
}

struct PromptRule {
    profile: TargetProfile,
    name: &'static str,
    ok_marker: &'static str,
    terminator: &'static str,
}

const PROMPT_RULES: &[PromptRule] = &[
    PromptRule {
        profile: TargetProfile::Stm8ef,
        name: "stm8ef",
        ok_marker: "ok",
        terminator: "\r",
    },
    PromptRule {
        profile: TargetProfile::Mecrisp,
        name: "mecrisp",
        ok_marker: "ok.",
        terminator: "\r",
    },
];

impl TargetProfile {
    /// All known profiles.
    pub const ALL: [Self; 2] = [Self::Stm8ef, Self::Mecrisp];

    fn rule(self) -> &'static PromptRule {
        PROMPT_RULES
            .iter()
            .find(|r| r.profile == self)
            .unwrap_or(&PROMPT_RULES[0])
    }

    /// Configuration name of the profile.
    pub fn name(self) -> &'static str {
        self.rule().name
    }

    /// Marker the prompt ends with when a line was accepted.
    pub fn ok_marker(self) -> &'static str {
        self.rule().ok_marker
    }

    /// Line terminator the target expects after each input line.
    pub fn terminator(self) -> &'static str {
        self.rule().terminator
    }

    /// Classify one line of device output.
    pub fn classify(self, line: &[u8]) -> ReplyKind {
        classify(line, self)
    }
}

impl fmt::Display for TargetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PROMPT_RULES
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(s.trim()))
            .map(|r| r.profile)
            .ok_or_else(|| Error::Config(format!("unknown target `{s}` (expected stm8ef or mecrisp)")))
    }
}

/// Outcome of one device reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// The prompt marker closed the line: the target is idle again.
    PromptOk,
    /// The target signalled an error.
    Error,
    /// Neither: informational output.
    Plain,
}

fn is_terminator(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}

/// Strip trailing CR/LF bytes.
pub fn trim_terminators(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| !is_terminator(b))
        .map_or(0, |i| i + 1);
    &line[..end]
}

/// Whether the last byte of `bytes` ends a line.
pub fn ends_with_terminator(bytes: &[u8]) -> bool {
    bytes
        .last()
        .is_some_and(|&b| is_terminator(b))
}

/// Classify a device line (echo already removed) for `profile`.
///
/// An error signal anywhere in the line wins over a prompt marker.
pub fn classify(line: &[u8], profile: TargetProfile) -> ReplyKind {
    if line.contains(&ERROR_SIGNAL) {
        return ReplyKind::Error;
    }
    let body = trim_terminators(line);
    if body.len() < line.len() && ends_with_marker(body, profile.ok_marker()) {
        ReplyKind::PromptOk
    } else {
        ReplyKind::Plain
    }
}

fn ends_with_marker(body: &[u8], marker: &str) -> bool {
    let marker = marker.as_bytes();
    body.len() >= marker.len() && body[body.len() - marker.len()..].eq_ignore_ascii_case(marker)
}

/// Right-align the prompt marker at the end of `body` to column `margin`.
///
/// `body` is a reply without its terminator. Lines that do not end with
/// `marker` are returned unchanged, as are lines already wider than `margin`.
pub fn beautify(body: &str, marker: &str, margin: usize) -> String {
    if !ends_with_marker(body.as_bytes(), marker) {
        return body.to_string();
    }
    let split = body.len() - marker.len();
    // `marker` is ASCII, so `split` is a char boundary whenever the suffix matched
    let (text, ok) = body.split_at(split);
    let width = margin.saturating_sub(ok.len());
    format!("{text:<width$}{ok}")
}
