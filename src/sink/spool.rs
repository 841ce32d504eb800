use std::path::PathBuf;

use chrono::Local;
use image::ImageFormat;
use log::info;

use crate::{
    error::PrintError,
    render::Bitmap,
    sink::SinkDriver,
};

/// Writes every page into a directory as `<timestamp>-<printer>-<n>.png`.
#[derive(Debug)]
pub struct SpoolSink {
    dir: PathBuf,
    printer: Option<String>,
    page: Option<PathBuf>,
    pages: u64,
}

impl SpoolSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            printer: None,
            page: None,
            pages: 0,
        }
    }
}

impl SinkDriver for SpoolSink {
    fn open(&mut self, printer: &str) -> Result<(), PrintError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| PrintError::Open {
            printer: printer.to_string(),
            reason: format!("{}: {}", self.dir.display(), e),
        })?;
        self.printer = Some(printer.to_string());
        Ok(())
    }

    fn begin_page(&mut self, _title: &str) -> Result<(), PrintError> {
        let printer = self.printer.as_deref().ok_or(PrintError::NotOpen)?;
        let safe: String = printer
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();

        self.pages += 1;
        let name = format!("{}-{}-{}.png", Local::now().format("%Y%m%d%H%M%S%3f"), safe, self.pages);
        self.page = Some(self.dir.join(name));
        Ok(())
    }

    fn write_bitmap(&mut self, bitmap: &Bitmap) -> Result<(), PrintError> {
        let path = self.page.as_ref().ok_or(PrintError::NoPage)?;
        bitmap.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), PrintError> {
        let path = self.page.take().ok_or(PrintError::NoPage)?;
        info!("Spooled page to {}", path.display());
        Ok(())
    }

    fn close(&mut self) -> Result<(), PrintError> {
        self.page = None;
        self.printer = None;
        Ok(())
    }
}
