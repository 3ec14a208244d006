//! The seam between the request handlers and the two print pipelines.

use crate::error::Error;

/// Something that can put a line of text on a label.
///
/// Implementations block until the job has been handed to the printer or
/// spooler, so async callers run them on a blocking thread.
pub trait PrintBackend: Send + Sync {
    /// Prints `text` as one label.
    fn print_text(&self, text: &str) -> Result<(), Error>;

    /// Short human readable name of the target, used in logs.
    fn describe(&self) -> String;
}
