//! # labelprint CLI
//!
//! ```bash
//! # Run the HTTP service against a USB attached QL-810W
//! labelprint serve --listen 0.0.0.0:8000
//!
//! # Same, but hand jobs to the first CUPS destination
//! labelprint serve --backend cups --cups-server print.local:631
//!
//! # Print one label, or only preview it
//! labelprint print "Hello"
//! labelprint render "Hello" --png hello.png
//!
//! # Print a black and white PNG as it is
//! labelprint print-image logo.png
//!
//! # Inspect the printer after loading new tape
//! labelprint status
//! ```
//!
//! Every flag can also come from a `LABELPRINT_*` environment variable or a
//! `.env` file in the working directory.

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{error, info};
use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use labelprint::{
    raster::RasterEncoder,
    render_image, render_text, Bitmap,
    server::{self, ServerConfig},
    Error, Media, Model, PrintBackend, RenderOptions, Spooler, SpoolerConfig, StatusPolicy,
    UsbConfig, UsbPrinter, BROTHER_VENDOR_ID, DEFAULT_MAX_TEXT_LEN,
};

/// labelprint - print text labels on Brother QL printers
#[derive(Parser, Debug)]
#[command(name = "labelprint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP print service
    Serve {
        /// Address to listen on
        #[arg(long, env = "LABELPRINT_LISTEN", default_value = "0.0.0.0:8000")]
        listen: String,

        /// Directory served under /static
        #[arg(long, env = "LABELPRINT_STATIC_DIR", default_value = "static")]
        static_dir: PathBuf,

        /// Longest accepted text in characters
        #[arg(long, env = "LABELPRINT_MAX_TEXT_LEN", default_value_t = DEFAULT_MAX_TEXT_LEN)]
        max_text_len: usize,

        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Print one label
    Print {
        /// Text to print
        text: String,

        /// Longest accepted text in characters
        #[arg(long, env = "LABELPRINT_MAX_TEXT_LEN", default_value_t = DEFAULT_MAX_TEXT_LEN)]
        max_text_len: usize,

        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Print a PNG image on the USB printer
    PrintImage {
        /// Image file, at most as wide as the tape prints
        image: PathBuf,

        /// Gray levels below this print as marks
        #[arg(long, default_value_t = 128)]
        threshold: u8,

        #[command(flatten)]
        usb: UsbArgs,
    },

    /// Render a label to PNG without printing
    Render {
        /// Text to render
        text: String,

        /// Output PNG file
        #[arg(long, value_name = "FILE")]
        png: PathBuf,

        /// Also write the raster command stream to this file
        #[arg(long, value_name = "FILE")]
        raw: Option<PathBuf>,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Read the port status of the USB printer
    Status {
        #[command(flatten)]
        usb: UsbArgs,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum BackendKind {
    /// Raster over USB
    Usb,
    /// Text job through CUPS
    Cups,
}

#[derive(Args, Debug)]
struct BackendArgs {
    /// Where labels go
    #[arg(long, value_enum, env = "LABELPRINT_BACKEND", default_value = "usb")]
    backend: BackendKind,

    #[command(flatten)]
    usb: UsbArgs,

    #[command(flatten)]
    cups: CupsArgs,
}

#[derive(Args, Debug)]
struct UsbArgs {
    /// Printer model, selects the USB product ID
    #[arg(long, env = "LABELPRINT_MODEL", default_value = "QL-810W")]
    model: Model,

    /// USB vendor ID, decimal or 0x-prefixed hex
    #[arg(long, env = "LABELPRINT_VENDOR_ID", value_parser = parse_usb_id)]
    vendor_id: Option<u16>,

    /// USB product ID, overrides the model
    #[arg(long, env = "LABELPRINT_PRODUCT_ID", value_parser = parse_usb_id)]
    product_id: Option<u16>,

    /// Only use the printer with this serial number
    #[arg(long, env = "LABELPRINT_SERIAL")]
    serial: Option<String>,

    /// Split writes at the endpoint's max packet size
    #[arg(long, env = "LABELPRINT_CHUNKED")]
    chunked: bool,

    /// Pause between chunks in milliseconds
    #[arg(long, env = "LABELPRINT_CHUNK_DELAY_MS", default_value_t = 10)]
    chunk_delay_ms: u64,

    /// USB transfer timeout in milliseconds
    #[arg(long, env = "LABELPRINT_TIMEOUT_MS", default_value_t = 5000)]
    timeout_ms: u64,

    /// What to do when the printer reports it is not ready: abort, warn or skip
    #[arg(long, env = "LABELPRINT_STATUS_POLICY", default_value = "abort")]
    status_policy: StatusPolicy,

    /// Send the 400 byte invalidate preamble first
    #[arg(long, env = "LABELPRINT_INVALIDATE")]
    invalidate: bool,

    /// Cut the tape after each label
    #[arg(long, env = "LABELPRINT_AUTO_CUT")]
    auto_cut: bool,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args, Debug)]
struct CupsArgs {
    /// CUPS server as host or host:port, local default when omitted
    #[arg(long, env = "LABELPRINT_CUPS_SERVER")]
    cups_server: Option<String>,

    /// lpstat executable
    #[arg(long, env = "LABELPRINT_LPSTAT", default_value = "lpstat")]
    lpstat: String,

    /// lp executable
    #[arg(long, env = "LABELPRINT_LP", default_value = "lp")]
    lp: String,
}

#[derive(Args, Debug)]
struct LayoutArgs {
    /// Tape width in mm
    #[arg(long, env = "LABELPRINT_MEDIA", default_value = "62")]
    media: Media,

    /// Print text across the tape instead of along it
    #[arg(long, env = "LABELPRINT_NO_ROTATE")]
    no_rotate: bool,

    /// Glyph magnification
    #[arg(long, env = "LABELPRINT_FONT_SCALE", default_value_t = 2)]
    font_scale: u32,

    /// Blank dots before and after the text
    #[arg(long, env = "LABELPRINT_MARGIN", default_value_t = 10)]
    margin: u32,
}

impl LayoutArgs {
    fn options(&self) -> Result<RenderOptions, Error> {
        let options = RenderOptions {
            width: self.media.printable_dots(),
            margin: self.margin,
            scale: self.font_scale,
            rotate: !self.no_rotate,
        };
        options.validate()?;
        Ok(options)
    }
}

impl UsbArgs {
    fn config(&self) -> Result<UsbConfig, Error> {
        let vendor_id = self.vendor_id.unwrap_or(BROTHER_VENDOR_ID);
        let product_id = self.product_id.unwrap_or_else(|| self.model.pid());

        let config = UsbConfig::new(self.model, self.layout.media)
            .ids(vendor_id, product_id)
            .serial(self.serial.clone())
            .chunked(self.chunked)
            .chunk_delay(Duration::from_millis(self.chunk_delay_ms))
            .timeout(Duration::from_millis(self.timeout_ms))
            .status_policy(self.status_policy)
            .render_options(self.layout.options()?)
            .encoder(
                RasterEncoder::new()
                    .invalidate(self.invalidate)
                    .auto_cut(self.auto_cut),
            );
        Ok(config)
    }
}

impl CupsArgs {
    fn config(&self) -> SpoolerConfig {
        SpoolerConfig {
            server: self.cups_server.clone(),
            lpstat: self.lpstat.clone(),
            lp: self.lp.clone(),
            ..SpoolerConfig::default()
        }
    }
}

impl BackendArgs {
    fn build(&self) -> Result<Arc<dyn PrintBackend>, Error> {
        match self.backend {
            BackendKind::Usb => Ok(Arc::new(UsbPrinter::new(self.usb.config()?)?)),
            BackendKind::Cups => Ok(Arc::new(Spooler::new(self.cups.config()))),
        }
    }
}

fn check_text_len(text: &str, max: usize) -> Result<(), Error> {
    let len = text.chars().count();
    if len > max {
        return Err(Error::TextTooLong { len, max });
    }
    Ok(())
}

/// Parses `0x04f9` style hex or plain decimal.
fn parse_usb_id(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid USB id '{}': {}", s, e))
}

fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            listen,
            static_dir,
            max_text_len,
            backend,
        } => {
            let config = ServerConfig {
                listen_addr: listen,
                static_dir,
                max_text_len,
            };
            let backend = backend.build()?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(config, backend))
        }
        Commands::Print {
            text,
            max_text_len,
            backend,
        } => {
            check_text_len(&text, max_text_len)?;
            let backend = backend.build()?;
            backend.print_text(&text)?;
            info!("Printed on {}", backend.describe());
            Ok(())
        }
        Commands::PrintImage {
            image,
            threshold,
            usb,
        } => {
            let gray = image::open(&image)
                .map_err(|e| Error::Image(format!("Failed to open {}: {}", image.display(), e)))?
                .to_luma8();
            let bitmap = Bitmap::from_luma(&gray, threshold);
            let label = render_image(&bitmap, &usb.layout.options()?)?;

            let printer = UsbPrinter::new(usb.config()?)?;
            printer.print_bitmap(&label)?;
            info!(
                "Printed {}x{} image on {}",
                label.width(),
                label.height(),
                printer.describe()
            );
            Ok(())
        }
        Commands::Render {
            text,
            png,
            raw,
            layout,
        } => {
            let bitmap = render_text(&text, &layout.options()?)?;
            bitmap
                .to_luma()
                .save(&png)
                .map_err(|e| Error::Image(format!("Failed to save PNG: {}", e)))?;
            println!(
                "Saved {}x{} label for {} tape to {}",
                bitmap.width(),
                bitmap.height(),
                layout.media,
                png.display()
            );

            if let Some(raw) = raw {
                let stream = RasterEncoder::new().encode(&bitmap);
                fs::write(&raw, &stream)?;
                println!("Saved {} byte raster stream to {}", stream.len(), raw.display());
            }
            Ok(())
        }
        Commands::Status { usb } => {
            let printer = UsbPrinter::new(usb.config()?)?;
            let status = printer.check_status()?;
            println!("{}", status);
            Ok(())
        }
    }
}
