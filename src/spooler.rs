//! # CUPS spooler transport
//!
//! Hands the text to a CUPS server through the standard command line tools:
//!
//! - `lpstat -e` lists the destinations, one name per line
//! - `lp -d <destination> <file>` submits the job
//!
//! With a server configured both tools get `-h <server>`, so the spooler may
//! be remote. The first destination listed is used. Nothing waits for the
//! job to finish.

use log::{debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};
use uuid::Uuid;

use crate::{backend::PrintBackend, error::Error};

/// Spooler settings.
#[derive(Debug, Clone)]
pub struct SpoolerConfig {
    /// CUPS server as `host` or `host:port`. `None` uses the local default.
    pub server: Option<String>,
    /// Path or name of the `lpstat` tool.
    pub lpstat: String,
    /// Path or name of the `lp` tool.
    pub lp: String,
    /// Directory for the temporary job files.
    pub spool_dir: PathBuf,
}

impl Default for SpoolerConfig {
    fn default() -> Self {
        SpoolerConfig {
            server: None,
            lpstat: "lpstat".to_string(),
            lp: "lp".to_string(),
            spool_dir: std::env::temp_dir(),
        }
    }
}

/// Print backend submitting plain text jobs to CUPS.
pub struct Spooler {
    config: SpoolerConfig,
}

impl Spooler {
    pub fn new(config: SpoolerConfig) -> Self {
        Spooler { config }
    }

    fn command(&self, program: &str) -> Command {
        let mut command = Command::new(program);
        if let Some(server) = &self.config.server {
            command.arg("-h").arg(server);
        }
        command
    }

    /// Destinations known to the spooler, in the order it reports them.
    pub fn printers(&self) -> Result<Vec<String>, Error> {
        let output = self
            .command(&self.config.lpstat)
            .arg("-e")
            .output()
            .map_err(|e| {
                Error::Spooler(format!("Failed to run '{} -e': {}", self.config.lpstat, e))
            })?;

        let printers = parse_destinations(&String::from_utf8_lossy(&output.stdout));
        if printers.is_empty() && !output.status.success() {
            return Err(Error::Spooler(format!(
                "lpstat failed: {}",
                stderr_of(&output)
            )));
        }
        debug!("Spooler destinations: {:?}", printers);
        Ok(printers)
    }

    /// Submits `text` to the first destination and returns the job id `lp`
    /// reported, if any.
    pub fn submit(&self, text: &str) -> Result<Option<String>, Error> {
        let printer = self
            .printers()?
            .into_iter()
            .next()
            .ok_or(Error::NoPrinters)?;

        let file = SpoolFile::create(&self.config.spool_dir, text)?;
        debug!("Spooling {} bytes via {}", text.len(), file.path().display());

        let output = self
            .command(&self.config.lp)
            .arg("-d")
            .arg(&printer)
            .arg(file.path())
            .output()
            .map_err(|e| Error::Spooler(format!("Failed to run '{}': {}", self.config.lp, e)))?;

        if !output.status.success() {
            return Err(Error::Spooler(format!(
                "lp to {} failed: {}",
                printer,
                stderr_of(&output)
            )));
        }

        let job = parse_request_id(&String::from_utf8_lossy(&output.stdout));
        info!(
            "Submitted job {} to {}",
            job.as_deref().unwrap_or("(unknown)"),
            printer
        );
        Ok(job)
    }
}

impl PrintBackend for Spooler {
    fn print_text(&self, text: &str) -> Result<(), Error> {
        self.submit(text).map(|_| ())
    }

    fn describe(&self) -> String {
        match &self.config.server {
            Some(server) => format!("CUPS at {}", server),
            None => "local CUPS".to_string(),
        }
    }
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Destination names from `lpstat -e` output.
fn parse_destinations(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.split_whitespace().next().unwrap_or(line).to_string())
        .collect()
}

/// Job id from `request id is <job> (1 file(s))`.
fn parse_request_id(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        line.trim()
            .strip_prefix("request id is ")
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string)
    })
}

/// Job payload on disk, removed when dropped.
struct SpoolFile {
    path: PathBuf,
}

impl SpoolFile {
    fn create(dir: &Path, contents: &str) -> Result<Self, Error> {
        let path = dir.join(format!("label-{}.txt", Uuid::new_v4()));
        fs::write(&path, contents)?;
        Ok(SpoolFile { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SpoolFile {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            debug!("Failed to remove {}: {}", self.path.display(), err);
        }
    }
}
