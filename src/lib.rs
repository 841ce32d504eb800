//! Label print server: accepts JSON badge requests on a TCP socket, renders a
//! QR label and sends it to a single label printer, one job at a time.

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod logging;
pub mod model;
pub mod print;
pub mod render;
pub mod server;
pub mod sink;

pub use connection::ConnectionHandler;
pub use error::ServerError;
pub use events::{
    EventNotifier,
    JobEvent,
    Phase,
};
pub use model::{
    Job,
    JobResult,
    Outcome,
    Response,
};
pub use print::PrintSerializer;
pub use render::{
    LabelRenderer,
    Renderer,
};
pub use server::Listener;
pub use sink::SinkDriver;
