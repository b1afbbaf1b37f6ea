//! USB-serial bridge recognition.
//!
//! Forth development boards are usually reached through one of a handful of
//! USB-to-UART bridges. Ports behind a known bridge are offered first when the
//! serial device is not given explicitly.
//!
//! - CH340/CH341 (VID: 0x1A86)
//! - CP210x (VID: 0x10C4)
//! - FTDI (VID: 0x0403)
//! - PL2303 (VID: 0x067B)
//! - ST-Link V2-1 virtual COM port (VID: 0x0483, PID: 0x374B/0x3752)

use log::trace;

use crate::port::PortInfo;

/// Known USB-to-UART bridges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbBridge {
    /// CH340/CH341 USB-to-Serial converter.
    Ch340,
    /// Silicon Labs CP210x USB-to-Serial converter.
    Cp210x,
    /// FTDI FT232 family.
    Ftdi,
    /// Prolific PL2303.
    Pl2303,
    /// ST-Link virtual COM port (Nucleo and Discovery boards).
    StLink,
    /// Anything else.
    Unknown,
}

impl UsbBridge {
    /// Classify a USB VID/PID pair.
    #[must_use]
    pub fn from_vid_pid(vid: u16, pid: u16) -> Self {
        match (vid, pid) {
            (0x1A86, _) => Self::Ch340,
            (0x10C4, _) => Self::Cp210x,
            (0x0403, _) => Self::Ftdi,
            (0x067B, _) => Self::Pl2303,
            (0x0483, 0x374B | 0x3752) => Self::StLink,
            _ => Self::Unknown,
        }
    }

    /// Classify a listed port.
    pub fn of(port: &PortInfo) -> Self {
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => Self::from_vid_pid(vid, pid),
            _ => Self::Unknown,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ch340 => "CH340/CH341",
            Self::Cp210x => "CP210x",
            Self::Ftdi => "FTDI",
            Self::Pl2303 => "PL2303",
            Self::StLink => "ST-Link VCP",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether this is a recognised bridge.
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Ports worth offering to the operator: those behind a known bridge, or all
/// of them when none is recognised.
pub fn candidate_ports(ports: &[PortInfo]) -> Vec<&PortInfo> {
    let known: Vec<&PortInfo> = ports
        .iter()
        .filter(|p| {
            let bridge = UsbBridge::of(p);
            trace!("{}: {}", p.name, bridge.name());
            bridge.is_known()
        })
        .collect();
    if known.is_empty() {
        ports.iter().collect()
    } else {
        known
    }
}
