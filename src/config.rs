use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

use anyhow::{
    Context,
    Result,
};
use clap::Parser;
use serde::Deserialize;

use crate::{
    codec::Framing,
    render::DEFAULT_FONTS,
    sink::SinkKind,
};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_PRINTER: &str = "BIXOLON XD5-40d - BPL-Z";
pub const DEFAULT_CONFIG: &str = "conf/config.json";
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
/// Prints QR badge labels for jobs sent over a local TCP socket
pub struct Cli {
    /// JSON configuration file; missing file means built-in defaults
    #[clap(short, long, env = "LABELPRINT_CONFIG")]
    pub config: Option<PathBuf>,
    /// What address to bind to
    #[clap(short, long, env = "LABELPRINT_ADDRESS")]
    pub address: Option<String>,
    /// What port to bind to
    #[clap(short, long, env = "LABELPRINT_PORT")]
    pub port: Option<u16>,
    /// Printer queue name handed to the sink
    #[clap(long, env = "LABELPRINT_PRINTER")]
    pub printer: Option<String>,
    /// Which sink driver prints the labels
    #[clap(long, value_enum, env = "LABELPRINT_SINK")]
    pub sink: Option<SinkKind>,
    /// Directory for the spool sink
    #[clap(long, env = "LABELPRINT_SPOOL_DIR")]
    pub spool_dir: Option<PathBuf>,
    /// Command used by the lp sink
    #[clap(long, env = "LABELPRINT_LP_COMMAND")]
    pub lp_command: Option<String>,
    /// How the end of a request is detected
    #[clap(long, value_enum, env = "LABELPRINT_FRAMING")]
    pub framing: Option<Framing>,
    /// Maximum request size in bytes
    #[clap(short, long, env = "LABELPRINT_MAX_PAYLOAD")]
    pub max_payload: Option<usize>,
    /// Seconds to wait for a request before giving up, 0 to wait forever
    #[clap(short = 't', long, env = "LABELPRINT_READ_TIMEOUT")]
    pub read_timeout: Option<u64>,
    /// Connections served at once, 0 for no limit
    #[clap(long, env = "LABELPRINT_MAX_CONNECTIONS")]
    pub max_connections: Option<usize>,
    /// Append logs to DIR/YYYY-MM-DD.log instead of stderr
    #[clap(short, long, env = "LABELPRINT_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
    /// Font file to try before the built-in list, may be repeated
    #[clap(short, long)]
    pub font: Vec<PathBuf>,
}

/// UI pacing delays. They only shape how long observers get to show each
/// phase and have no effect on the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Before rendering starts.
    pub render_delay: Duration,
    /// Before the printer is opened.
    pub connect_delay: Duration,
    /// Between the response write and the "finished" event.
    pub finish_delay: Duration,
}

impl Pacing {
    pub const NONE: Pacing = Pacing {
        render_delay: Duration::ZERO,
        connect_delay: Duration::ZERO,
        finish_delay: Duration::ZERO,
    };
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            render_delay: Duration::from_millis(500),
            connect_delay: Duration::from_millis(300),
            finish_delay: Duration::from_millis(500),
        }
    }
}

/// On-disk configuration. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerSection,
    pub printer: PrinterSection,
    pub limits: LimitsSection,
    pub pacing: PacingSection,
    pub fonts: Vec<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub framing: Option<Framing>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PrinterSection {
    pub name: Option<String>,
    pub sink: Option<SinkKind>,
    pub spool_dir: Option<PathBuf>,
    pub lp_command: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub max_payload: Option<usize>,
    pub read_timeout_secs: Option<u64>,
    pub max_connections: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PacingSection {
    pub render_delay_ms: Option<u64>,
    pub connect_delay_ms: Option<u64>,
    pub finish_delay_ms: Option<u64>,
}

impl FileConfig {
    /// A missing file is an empty config; an unreadable or invalid one is an
    /// error the caller may choose to ignore.
    pub fn load_if_present(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
    }
}

/// Fully resolved settings: CLI and environment over file over defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub printer: String,
    pub sink: SinkKind,
    pub spool_dir: PathBuf,
    pub lp_command: String,
    pub framing: Framing,
    pub max_payload: usize,
    pub read_timeout: Option<Duration>,
    pub max_connections: Option<usize>,
    pub pacing: Pacing,
    pub fonts: Vec<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    pub fn merge(cli: Cli, file: FileConfig) -> Self {
        let defaults = Pacing::default();
        let ms = |value: Option<u64>, fallback: Duration| value.map(Duration::from_millis).unwrap_or(fallback);

        let read_timeout = cli
            .read_timeout
            .or(file.limits.read_timeout_secs)
            .unwrap_or(DEFAULT_READ_TIMEOUT_SECS);
        let max_connections = cli.max_connections.or(file.limits.max_connections).unwrap_or(0);

        let mut fonts = cli.font;
        fonts.extend(file.fonts);
        fonts.extend(DEFAULT_FONTS.iter().map(PathBuf::from));

        Self {
            host: cli.address.or(file.server.host).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file.server.port).unwrap_or(DEFAULT_PORT),
            printer: cli.printer.or(file.printer.name).unwrap_or_else(|| DEFAULT_PRINTER.to_string()),
            sink: cli.sink.or(file.printer.sink).unwrap_or_default(),
            spool_dir: cli.spool_dir.or(file.printer.spool_dir).unwrap_or_else(|| PathBuf::from("spool")),
            lp_command: cli.lp_command.or(file.printer.lp_command).unwrap_or_else(|| "lp".to_string()),
            framing: cli.framing.or(file.server.framing).unwrap_or_default(),
            max_payload: cli.max_payload.or(file.limits.max_payload).unwrap_or(DEFAULT_MAX_PAYLOAD),
            read_timeout: (read_timeout > 0).then(|| Duration::from_secs(read_timeout)),
            max_connections: (max_connections > 0).then_some(max_connections),
            pacing: Pacing {
                render_delay: ms(file.pacing.render_delay_ms, defaults.render_delay),
                connect_delay: ms(file.pacing.connect_delay_ms, defaults.connect_delay),
                finish_delay: ms(file.pacing.finish_delay_ms, defaults.finish_delay),
            },
            fonts,
            log_dir: cli.log_dir.or(file.log_dir),
        }
    }
}
