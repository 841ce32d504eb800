use std::process::ExitStatus;

use thiserror::Error;

/// Everything that can go wrong while serving a print request.
///
/// Only `Bind` is fatal, and only at startup. Every other variant is caught at
/// the connection boundary and turned into a response for that one client.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed request: {0}")]
    Decode(#[from] DecodeError),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("print failed: {0}")]
    Print(#[from] PrintError),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is a JSON {found}, expected an object")]
    NotObject { found: &'static str },

    #[error("payload exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot encode QR symbol: {0}")]
    Qr(String),

    #[error("cannot load font {path}: {reason}")]
    Font { path: String, reason: String },

    #[error("render task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("printer {printer} could not be opened: {reason}")]
    Open { printer: String, reason: String },

    #[error("sink is not open")]
    NotOpen,

    #[error("no page in progress")]
    NoPage,

    #[error("page write failed: {0}")]
    Write(String),

    #[error("spooler command `{command}` exited with {status}")]
    Spooler { command: String, status: ExitStatus },

    #[error("bitmap encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("print task aborted: {0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;
