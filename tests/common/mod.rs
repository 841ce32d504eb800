#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        Mutex,
    },
    time::{
        Duration,
        Instant,
    },
};

use chrono::{
    Local,
    NaiveDate,
};
use labelprint::{
    codec::Framing,
    config::Pacing,
    error::{
        PrintError,
        RenderError,
    },
    render::Bitmap,
    ConnectionHandler,
    EventNotifier,
    Job,
    JobEvent,
    LabelRenderer,
    Listener,
    PrintSerializer,
    Renderer,
    ServerError,
    SinkDriver,
};
use tokio::{
    io::{
        AsyncReadExt,
        AsyncWriteExt,
    },
    net::TcpStream,
    task::JoinHandle,
};

#[derive(Debug, Default)]
pub struct SinkLog {
    pub calls: Vec<&'static str>,
    pub windows: Vec<(Instant, Instant)>,
    pub pages: usize,
    open_since: Option<Instant>,
}

/// Records every driver call and how long the printer stayed open.
pub struct MockSink {
    log: Arc<Mutex<SinkLog>>,
    fail_write: bool,
    write_delay: Duration,
}

impl SinkDriver for MockSink {
    fn open(&mut self, _printer: &str) -> Result<(), PrintError> {
        let mut log = self.log.lock().unwrap();
        log.calls.push("open");
        log.open_since = Some(Instant::now());
        Ok(())
    }

    fn begin_page(&mut self, _title: &str) -> Result<(), PrintError> {
        self.log.lock().unwrap().calls.push("begin");
        Ok(())
    }

    fn write_bitmap(&mut self, _bitmap: &Bitmap) -> Result<(), PrintError> {
        self.log.lock().unwrap().calls.push("write");
        std::thread::sleep(self.write_delay);
        if self.fail_write {
            return Err(PrintError::Write("printer offline".to_string()));
        }
        self.log.lock().unwrap().pages += 1;
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), PrintError> {
        self.log.lock().unwrap().calls.push("end");
        Ok(())
    }

    fn close(&mut self) -> Result<(), PrintError> {
        let mut log = self.log.lock().unwrap();
        log.calls.push("close");
        if let Some(start) = log.open_since.take() {
            log.windows.push((start, Instant::now()));
        }
        Ok(())
    }
}

/// Real label renderer that also remembers which job it drew on which day.
pub struct RecordingRenderer {
    inner: LabelRenderer,
    pub seen: Arc<Mutex<Vec<(Job, NaiveDate)>>>,
}

impl Renderer for RecordingRenderer {
    fn render(&self, job: &Job) -> Result<Bitmap, RenderError> {
        let today = Local::now().date_naive();
        self.seen.lock().unwrap().push((job.clone(), today));
        self.inner.render_on(job, today)
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub fail_write: bool,
    pub write_delay: Duration,
    pub finish_delay: Duration,
    pub framing: Framing,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            fail_write: false,
            write_delay: Duration::from_millis(10),
            finish_delay: Duration::from_millis(20),
            framing: Framing::ShortRead,
        }
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub listener: Arc<Listener>,
    pub serve: JoinHandle<Result<(), ServerError>>,
    pub sink: Arc<Mutex<SinkLog>>,
    pub rendered: Arc<Mutex<Vec<(Job, NaiveDate)>>>,
    pub events: Arc<Mutex<Vec<JobEvent>>>,
}

pub async fn start(options: Options) -> TestServer {
    let sink = Arc::new(Mutex::new(SinkLog::default()));
    let rendered = Arc::new(Mutex::new(Vec::new()));
    let events = Arc::new(Mutex::new(Vec::new()));

    let notifier = EventNotifier::new(1024);
    let mut rx = notifier.subscribe();
    let collected = Arc::clone(&events);
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            collected.lock().unwrap().push(event);
        }
    });

    let renderer = RecordingRenderer {
        inner: LabelRenderer::new(None),
        seen: Arc::clone(&rendered),
    };
    let driver = MockSink {
        log: Arc::clone(&sink),
        fail_write: options.fail_write,
        write_delay: options.write_delay,
    };
    let pacing = Pacing {
        finish_delay: options.finish_delay,
        ..Pacing::NONE
    };

    let serializer = Arc::new(PrintSerializer::new(
        "test printer",
        Arc::new(renderer),
        Box::new(driver),
        notifier.clone(),
        pacing,
    ));
    let handler = Arc::new(
        ConnectionHandler::new(serializer, notifier)
            .framing(options.framing)
            .read_timeout(Some(Duration::from_secs(5)))
            .finish_delay(pacing.finish_delay),
    );
    let listener = Arc::new(Listener::new(handler));

    let socket = Listener::bind("127.0.0.1", 0).await.unwrap();
    let addr = socket.local_addr().unwrap();
    let serving = Arc::clone(&listener);
    let serve = tokio::spawn(async move { serving.serve(socket).await });

    TestServer {
        addr,
        listener,
        serve,
        sink,
        rendered,
        events,
    }
}

/// Send `payload`, half-close, and read the reply until the server closes.
pub async fn send(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(payload).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    reply
}

/// Events are delivered asynchronously; give the collector a moment.
pub async fn wait_for_events(server: &TestServer, count: usize) -> Vec<JobEvent> {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let events = server.events.lock().unwrap().clone();
        if events.len() >= count || Instant::now() > deadline {
            return events;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
