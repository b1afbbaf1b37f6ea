//! # escom
//!
//! Serial link and source upload engine for embedded Forth targets.
//!
//! This crate provides the core of the `escom` terminal:
//!
//! - a line-oriented link to the target with echo filtering
//! - reply classification for the target's `ok` prompt and BEL error signal
//! - conditional, recursive source upload (`#include` / `#require`)
//! - MCU resource files and `\res` symbol export
//!
//! ## Supported Targets
//!
//! - STM8 eForth (`ok` prompt)
//! - Mecrisp Forth (`ok.` prompt)
//!
//! ## Features
//!
//! - `native` (default): Native serial port support via the `serialport` crate
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use escom::{Link, LinkTiming, SearchPath, TargetProfile, Uploader};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "native")]
//!     {
//!         let port = escom::NativePort::open_simple("/dev/ttyUSB0", 9600)?;
//!         let link = Link::new(port, TargetProfile::Stm8ef, LinkTiming::default());
//!         let mut uploader = Uploader::new(link, SearchPath::default());
//!
//!         uploader.include_file("blink.fs", true, &mut |event| println!("{event:?}"))?;
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bridge;
pub mod dictionary;
pub mod display;
pub mod echo;
pub mod error;
pub mod link;
pub mod port;
pub mod reply;
pub mod search;
pub mod upload;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
pub use {
    bridge::{UsbBridge, candidate_ports},
    dictionary::{SymbolDictionary, SymbolEntry},
    display::{clean_device_text, drain_utf8_lossy},
    echo::{EchoTracker, echo_filter},
    error::{Error, Result},
    link::{Link, LinkTiming, ReplyBuffer},
    port::{Port, PortEnumerator, PortInfo, SerialConfig},
    reply::{ReplyKind, TargetProfile, beautify, classify},
    search::SearchPath,
    upload::{MAX_INCLUDE_DEPTH, UploadEvent, UploadTask, Uploader},
};
