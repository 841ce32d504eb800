use std::{
    fs::{
        File,
        OpenOptions,
    },
    path::{
        Path,
        PathBuf,
    },
};

use anyhow::{
    Context,
    Result,
};
use chrono::Local;
use env_logger::{
    Env,
    Target,
};

/// `<dir>/YYYY-MM-DD.log` for today.
pub fn log_file_path(dir: &Path) -> PathBuf {
    dir.join(format!("{}.log", Local::now().format("%Y-%m-%d")))
}

pub fn open_log_file(dir: &Path) -> Result<File> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating log directory {}", dir.display()))?;
    let path = log_file_path(dir);

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))
}

/// Install the global logger. `RUST_LOG` picks the filter, `info` otherwise.
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));

    if let Some(dir) = log_dir {
        builder.target(Target::Pipe(Box::new(open_log_file(dir)?)));
    }

    builder.try_init().context("installing logger")
}
