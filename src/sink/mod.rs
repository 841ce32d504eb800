//! Drivers for the physical label printer.
//!
//! A driver is only ever used through a [`SinkSession`], which the print
//! serializer creates while it holds the device lock. Dropping the session
//! closes the driver, so the device is released on every path out of a print,
//! including early returns on error.

use clap::ValueEnum;
use log::{
    debug,
    warn,
};
use serde::Deserialize;

use crate::{
    error::PrintError,
    render::Bitmap,
};

pub mod lp;
pub mod spool;

pub use lp::LpSink;
pub use spool::SpoolSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SinkKind {
    /// Submit pages to a CUPS queue with `lp`.
    #[default]
    Lp,
    /// Write pages as PNG files into a directory.
    Spool,
}

/// Every step may fail; the caller treats any failure as a failed job.
pub trait SinkDriver: Send {
    fn open(&mut self, printer: &str) -> Result<(), PrintError>;
    fn begin_page(&mut self, title: &str) -> Result<(), PrintError>;
    fn write_bitmap(&mut self, bitmap: &Bitmap) -> Result<(), PrintError>;
    fn end_page(&mut self) -> Result<(), PrintError>;
    fn close(&mut self) -> Result<(), PrintError>;
}

/// An open printer. Closed on drop.
pub struct SinkSession<'a> {
    driver: &'a mut dyn SinkDriver,
    printer: String,
}

impl<'a> SinkSession<'a> {
    pub fn open(driver: &'a mut dyn SinkDriver, printer: &str) -> Result<Self, PrintError> {
        driver.open(printer)?;
        debug!("Opened printer {}", printer);

        Ok(Self {
            driver,
            printer: printer.to_string(),
        })
    }

    /// Stream `bitmap` as a single page.
    pub fn print_page(&mut self, title: &str, bitmap: &Bitmap) -> Result<(), PrintError> {
        self.driver.begin_page(title)?;
        self.driver.write_bitmap(bitmap)?;
        self.driver.end_page()
    }
}

impl Drop for SinkSession<'_> {
    fn drop(&mut self) {
        match self.driver.close() {
            Ok(()) => debug!("Closed printer {}", self.printer),
            Err(e) => warn!("Failed to close printer {}; error = {}", self.printer, e),
        }
    }
}
