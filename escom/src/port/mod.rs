//! Port abstraction for the serial link to the target.
//!
//! The upload engine never touches `serialport` directly; it talks to a
//! [`Port`], which keeps the engine testable against a simulated target and
//! leaves room for other transports.
//!
//! ```text
//! +------------------+
//! |  Upload engine   |
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! |  Link (lines)    |
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! |   Port trait     |
//! +--------+---------+
//!          |
//!          v
//! +--------+---------+
//! | Native SerialPort|
//! |   (serialport)   |
//! +------------------+
//! ```

#[cfg(feature = "native")]
pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Default read timeout while idle-polling the target.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(50);

/// Serial port configuration.
///
/// The link always runs 8N1 without flow control; only the device and the
/// speed are configurable.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM5").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Initial read timeout.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 9600,
            timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial port information.
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Product string (if available).
    pub product: Option<String>,
}

/// Byte transport to the target.
///
/// Reads that time out must surface as `io::ErrorKind::TimedOut` (or return
/// zero bytes); the link treats both as "nothing arrived yet".
pub trait Port: Read + Write + Send {
    /// Set the read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Get the current timeout.
    fn timeout(&self) -> Duration;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}

/// Trait for listing available serial ports.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;
}

#[cfg(feature = "native")]
pub use native::{NativePort, NativePortEnumerator};
