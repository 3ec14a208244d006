//! Printer port status.
//!
//! The status is the single byte returned by the USB printer class
//! `GET_PORT_STATUS` request (class request 1 to the printer interface).
//! It is the standard class request, not a Brother vendor request, and not
//! the 32 byte status reply the printer sends after `ESC i S`.

use bitflags::bitflags;
use rusb::{Direction, Recipient, RequestType};
use std::{fmt, str::FromStr};

/// `bRequest` of the printer class GET_PORT_STATUS request.
pub(crate) const GET_PORT_STATUS: u8 = 0x01;

/// `bmRequestType` of GET_PORT_STATUS: device to host, class, interface.
pub(crate) fn port_status_request_type() -> u8 {
    rusb::request_type(Direction::In, RequestType::Class, Recipient::Interface)
}

bitflags! {
    /// Bits of the port status byte.
    pub struct PortStatus: u8 {
        /// Set when the printer reports no error.
        const NOT_ERROR = 0b0000_1000;
        /// Set when the printer is online.
        const SELECTED = 0b0001_0000;
        const PAPER_EMPTY = 0b0010_0000;
    }
}

impl PortStatus {
    pub fn from_byte(byte: u8) -> Self {
        Self::from_bits_truncate(byte)
    }

    /// A printer is ready when it is selected, reports no error and has media.
    pub fn is_ready(&self) -> bool {
        self.contains(Self::NOT_ERROR | Self::SELECTED) && !self.contains(Self::PAPER_EMPTY)
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut problems = Vec::new();
        if !self.contains(Self::NOT_ERROR) {
            problems.push("error reported");
        }
        if !self.contains(Self::SELECTED) {
            problems.push("offline");
        }
        if self.contains(Self::PAPER_EMPTY) {
            problems.push("no media");
        }
        if problems.is_empty() {
            write!(f, "ready (status {:#04x})", self.bits())
        } else {
            write!(f, "{} (status {:#04x})", problems.join(", "), self.bits())
        }
    }
}

/// What to do with the port status before a print job is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Read the status and refuse the job before any byte is sent when the
    /// printer is not ready.
    Abort,
    /// Read the status and only log a warning when the printer is not ready.
    Warn,
    /// Do not query the status.
    Skip,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::Abort
    }
}

impl FromStr for StatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "warn" => Ok(Self::Warn),
            "skip" => Ok(Self::Skip),
            _ => Err(format!(
                "unknown status policy '{}', expected abort, warn or skip",
                s
            )),
        }
    }
}
