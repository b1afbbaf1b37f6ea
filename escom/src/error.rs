//! Error types for escom.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for escom operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for escom operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the serial link.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The search path was exhausted without finding the file.
    #[error("{0} not found")]
    FileNotFound(String),

    /// A file was found but could not be opened or read.
    #[error("Unable to open {}: {source}", path.display())]
    OpenFailed {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// `\res export` named a symbol the dictionary does not hold.
    #[error("Undefined symbol {0}")]
    UndefinedSymbol(String),

    /// The target signalled an error (BEL) for a line we sent.
    #[error("Upload of {} rejected by target: {reply}", file.display())]
    UploadRejected {
        /// File being uploaded when the target complained.
        file: PathBuf,
        /// The device reply, as displayed.
        reply: String,
    },

    /// No line terminator arrived within the bounded number of reads.
    #[error("Timeout waiting for reply to `{0}`")]
    ProbeTimeout(String),

    /// Nested inclusion went deeper than the allowed limit.
    #[error("Include depth limit ({limit}) exceeded at {}", path.display())]
    IncludeTooDeep {
        /// File that would have exceeded the limit.
        path: PathBuf,
        /// The configured limit.
        limit: usize,
    },

    /// A `\res` line is missing an operand or carries a malformed value.
    #[error("Invalid directive: {0}")]
    InvalidDirective(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error comes from the serial link itself.
    ///
    /// Transport failures end the session; every other error only aborts the
    /// current upload.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Io(_) => true,
            #[cfg(feature = "native")]
            Self::Serial(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        let io_err = Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(io_err.is_transport());
        assert!(!Error::UndefinedSymbol("PD_ODR".into()).is_transport());
        assert!(!Error::ProbeTimeout("' x DROP".into()).is_transport());
    }

    #[test]
    fn test_messages_carry_context() {
        let err = Error::UploadRejected {
            file: PathBuf::from("lib/blink.fs"),
            reply: "foo?".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("lib/blink.fs"));
        assert!(msg.contains("foo?"));
        assert_eq!(Error::FileNotFound("STM8S103.efr".into()).to_string(), "STM8S103.efr not found");
    }
}
