//! Error types for label printing.
//!
//! Every failure is terminal for the request that hit it. The variants keep
//! the failure kinds apart so callers can tell a missing printer from a broken
//! transfer or a printer reporting it is not ready.

use crate::status::PortStatus;
use rusb;
use thiserror::Error;

/// Main error type for label printing operations.
#[derive(Error, Debug)]
pub enum Error {
    /// USB communication error.
    ///
    /// Wraps underlying rusb errors for transfer failures, timeouts, or
    /// permission problems.
    #[error("Printer communication failed: {0}")]
    UsbError(#[from] rusb::Error),

    /// No device with the configured vendor and product ID is attached.
    #[error("Printer not found (vendor {vendor_id:04x}, product {product_id:04x})")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("Device is missing a bulk OUT endpoint")]
    MissingEndpoint,

    /// The printer accepted fewer bytes than were supplied.
    #[error("Printer communication failed: wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// The port status read before printing reports an error or not-ready state.
    #[error("Printer is not ready: {0}")]
    NotReady(PortStatus),

    #[error("Spooler has no printers")]
    NoPrinters,

    /// A spooler command could not be run or exited unsuccessfully.
    #[error("Spooler error: {0}")]
    Spooler(String),

    #[error("Text is too long: {len} characters, at most {max} allowed")]
    TextTooLong { len: usize, max: usize },

    #[error("Built-in font could not be loaded")]
    FontUnavailable,

    /// Preview image could not be written.
    #[error("Image error: {0}")]
    Image(String),

    /// Invalid configuration parameter provided.
    #[error("Invalid configuration parameter: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// `true` for failures caused by the request itself rather than the printer.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::TextTooLong { .. })
    }

    /// `true` when the printer or spooler is absent or refuses work.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. } | Self::NotReady(_) | Self::NoPrinters
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_not_found_names_ids() {
        let err = Error::DeviceNotFound {
            vendor_id: 0x04f9,
            product_id: 0x209c,
        };
        assert_eq!(
            err.to_string(),
            "Printer not found (vendor 04f9, product 209c)"
        );
        assert!(err.is_unavailable());
        assert!(!err.is_client_error());
    }

    #[test]
    fn transfer_failures_read_as_communication_errors() {
        let err = Error::from(rusb::Error::Timeout);
        assert!(err.to_string().starts_with("Printer communication failed"));

        let err = Error::ShortWrite {
            written: 64,
            expected: 128,
        };
        assert!(err.to_string().starts_with("Printer communication failed"));
        assert!(!err.is_unavailable());
    }
}
