use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use labelprint::{
    config::{
        Cli,
        FileConfig,
        Settings,
    },
    events::spawn_event_logger,
    logging,
    sink::{
        LpSink,
        SinkDriver,
        SinkKind,
        SpoolSink,
    },
    ConnectionHandler,
    EventNotifier,
    LabelRenderer,
    Listener,
    PrintSerializer,
};
use log::{
    error,
    info,
    warn,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_path();
    let (file, config_error) = match FileConfig::load_if_present(&config_path) {
        Ok(file) => (file, None),
        Err(e) => (FileConfig::default(), Some(e)),
    };
    let settings = Settings::merge(cli, file);

    logging::init(settings.log_dir.as_deref())?;
    if let Some(e) = config_error {
        warn!("Ignoring configuration {}; error = {:#}", config_path.display(), e);
    }

    info!(
        "Starting labelprint on {}:{} for printer {:?} [sink={:?}, framing={:?}]",
        settings.host, settings.port, settings.printer, settings.sink, settings.framing
    );

    let notifier = EventNotifier::default();
    let events = spawn_event_logger(&notifier);

    let renderer = LabelRenderer::with_font_candidates(&settings.fonts);
    if !renderer.has_font() {
        warn!("Text lines are disabled; pass --font to print names on the labels");
    }
    let renderer = Arc::new(renderer);
    let sink: Box<dyn SinkDriver> = match settings.sink {
        SinkKind::Lp => Box::new(LpSink::new(settings.lp_command.clone())),
        SinkKind::Spool => Box::new(SpoolSink::new(settings.spool_dir.clone())),
    };

    let serializer = Arc::new(PrintSerializer::new(
        settings.printer.clone(),
        renderer,
        sink,
        notifier.clone(),
        settings.pacing,
    ));
    let handler = Arc::new(
        ConnectionHandler::new(serializer, notifier.clone())
            .framing(settings.framing)
            .max_payload(settings.max_payload)
            .read_timeout(settings.read_timeout)
            .finish_delay(settings.pacing.finish_delay),
    );
    let listener = Arc::new(Listener::new(handler).max_connections(settings.max_connections));

    let stopper = Arc::clone(&listener);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => stopper.stop(),
            Err(e) => error!("Cannot listen for Ctrl-C; error = {}", e),
        }
    });

    if let Err(e) = listener.start(&settings.host, settings.port).await {
        error!("Server failed to start; error = {}", e);
        return Err(e.into());
    }

    drop(notifier);
    events.abort();
    info!("Shut down");
    Ok(())
}
