use std::{
    path::PathBuf,
    process::Command,
};

use image::ImageFormat;
use log::{
    debug,
    info,
};
use tempfile::TempDir;

use crate::{
    error::PrintError,
    render::Bitmap,
    sink::SinkDriver,
};

/// Submits each page to a CUPS queue. The page is written as a PNG into a
/// private temp directory that lives for as long as the printer is open.
#[derive(Debug)]
pub struct LpSink {
    command: String,
    printer: Option<String>,
    spool: Option<TempDir>,
    page: Option<Page>,
}

#[derive(Debug)]
struct Page {
    title: String,
    path: PathBuf,
    written: bool,
}

impl LpSink {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            printer: None,
            spool: None,
            page: None,
        }
    }
}

impl Default for LpSink {
    fn default() -> Self {
        Self::new("lp")
    }
}

impl SinkDriver for LpSink {
    fn open(&mut self, printer: &str) -> Result<(), PrintError> {
        let spool = tempfile::tempdir().map_err(|e| PrintError::Open {
            printer: printer.to_string(),
            reason: e.to_string(),
        })?;

        self.printer = Some(printer.to_string());
        self.spool = Some(spool);
        Ok(())
    }

    fn begin_page(&mut self, title: &str) -> Result<(), PrintError> {
        let spool = self.spool.as_ref().ok_or(PrintError::NotOpen)?;

        self.page = Some(Page {
            title: title.to_string(),
            path: spool.path().join("page.png"),
            written: false,
        });
        Ok(())
    }

    fn write_bitmap(&mut self, bitmap: &Bitmap) -> Result<(), PrintError> {
        let page = self.page.as_mut().ok_or(PrintError::NoPage)?;

        bitmap.save_with_format(&page.path, ImageFormat::Png)?;
        page.written = true;
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), PrintError> {
        let printer = self.printer.as_deref().ok_or(PrintError::NotOpen)?;
        let page = self.page.take().ok_or(PrintError::NoPage)?;
        if !page.written {
            return Err(PrintError::Write("page has no content".to_string()));
        }

        debug!("Submitting {} to {} via {}", page.path.display(), printer, self.command);
        let output = Command::new(&self.command)
            .arg("-d")
            .arg(printer)
            .arg("-t")
            .arg(&page.title)
            .arg(&page.path)
            .output()?;

        if !output.status.success() {
            return Err(PrintError::Spooler {
                command: self.command.clone(),
                status: output.status,
            });
        }

        info!("Spooler accepted page: {}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    }

    fn close(&mut self) -> Result<(), PrintError> {
        self.page = None;
        self.printer = None;
        if let Some(spool) = self.spool.take() {
            spool.close()?;
        }
        Ok(())
    }
}
