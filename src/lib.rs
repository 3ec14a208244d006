//! Text label printing for Brother QL printers
//!
//! This crate renders a text string to a monochrome label bitmap, encodes it
//! in the Brother raster command set and sends it to a QL printer over USB.
//! Alternatively the text can be handed to a CUPS spooler. A small HTTP
//! service exposes both through one `POST /print` route.
//!
//! # Example
//!
//! ```rust,no_run
//! use labelprint::{Media, Model, PrintBackend, UsbConfig, UsbPrinter};
//!
//! let config = UsbConfig::new(Model::QL810W, Media::Continuous62);
//! let printer = UsbPrinter::new(config).unwrap();
//! printer.print_text("Hello").unwrap();
//! ```
//!
//! Rendering and encoding work without a printer:
//!
//! ```rust
//! use labelprint::{raster, render_text, RenderOptions};
//!
//! let label = render_text("Hello", &RenderOptions::default()).unwrap();
//! assert_eq!(label.width(), labelprint::LABEL_WIDTH);
//! let stream = raster::encode(&label);
//! assert_eq!(stream.last(), Some(&0x1A));
//! ```

mod backend;
mod bitmap;
mod error;
mod media;
mod model;
pub mod raster;
mod render;
pub mod server;
mod spooler;
mod status;
mod usb;

pub use crate::{
    backend::PrintBackend,
    bitmap::{Bitmap, BACKGROUND, MARK},
    error::Error,
    media::Media,
    model::Model,
    raster::RasterEncoder,
    render::{render_image, render_text, RenderOptions},
    spooler::{Spooler, SpoolerConfig},
    status::{PortStatus, StatusPolicy},
    usb::{UsbConfig, UsbPrinter},
};

/// USB vendor ID shared by all Brother printers.
pub const BROTHER_VENDOR_ID: u16 = 0x04F9;

/// Printable width in dots of 62 mm continuous tape.
///
/// Label bitmaps for the default media are rendered at this width, which
/// packs into 87 bytes per raster row.
pub const LABEL_WIDTH: u32 = 696;

/// Longest text accepted for one label unless configured otherwise.
pub const DEFAULT_MAX_TEXT_LEN: usize = 512;
