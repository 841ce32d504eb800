mod common;

use std::time::Duration;

use chrono::Local;
use common::{
    send,
    start,
    wait_for_events,
    Options,
};
use labelprint::{
    codec::{
        Framing,
        EOT,
    },
    render::LabelRenderer,
    JobEvent,
    Listener,
    ServerError,
};
use tokio::{
    io::{
        AsyncReadExt,
        AsyncWriteExt,
    },
    net::TcpStream,
    time::timeout,
};

const BADGE: &[u8] = r#"{"qr_data":"T000000001087","name":"홍길동","employee_id":"T00000000108","department":"싸이버원"}"#.as_bytes();

#[tokio::test]
async fn successful_print_replies_001() {
    let server = start(Options::default()).await;

    assert_eq!(send(server.addr, BADGE).await, b"001");

    let sink = server.sink.lock().unwrap();
    assert_eq!(sink.calls, ["open", "begin", "write", "end", "close"]);
    assert_eq!(sink.pages, 1);
}

#[tokio::test]
async fn badge_without_issue_date_is_stamped_today() {
    let server = start(Options::default()).await;

    assert_eq!(send(server.addr, BADGE).await, b"001");

    let rendered = server.rendered.lock().unwrap();
    assert_eq!(rendered.len(), 1);
    let (job, day) = &rendered[0];
    assert_eq!(job.qr_payload, "T000000001087");
    assert_eq!(job.issue_date, None);

    let lines = LabelRenderer::text_lines(job, *day);
    assert_eq!(lines[0], "이름: 홍길동");
    assert_eq!(lines[3], format!("발급: {}", day.format("%Y-%m-%d")));
    assert!((Local::now().date_naive() - *day).num_days() <= 1);
}

#[tokio::test]
async fn malformed_json_never_reaches_the_printer() {
    let server = start(Options::default()).await;

    let reply = send(server.addr, b"{\"qr_data\": ").await;
    let body: serde_json::Value = serde_json::from_slice(&reply).unwrap();

    assert_eq!(body["status"], "error");
    assert!(body["message"].is_string());
    assert!(body["timestamp"].is_string());
    assert!(server.sink.lock().unwrap().calls.is_empty());
    assert!(server.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn well_formed_non_object_json_never_reaches_the_printer() {
    let server = start(Options::default()).await;

    let payloads: [&[u8]; 5] = [b"[]", br#"["T1","name"]"#, br#""x""#, b"42", b"null"];
    for payload in payloads {
        let reply = send(server.addr, payload).await;
        let body: serde_json::Value = serde_json::from_slice(&reply).unwrap();

        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("expected an object"));
    }

    assert!(server.sink.lock().unwrap().calls.is_empty());
    assert!(server.rendered.lock().unwrap().is_empty());
    assert!(server.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn printer_failure_replies_999_and_releases_printer() {
    let server = start(Options {
        fail_write: true,
        ..Options::default()
    })
    .await;

    assert_eq!(send(server.addr, BADGE).await, b"999");
    assert_eq!(server.sink.lock().unwrap().calls, ["open", "begin", "write", "close"]);

    // The printer is usable again afterwards.
    assert_eq!(send(server.addr, BADGE).await, b"999");
    assert_eq!(server.sink.lock().unwrap().windows.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_prints_never_overlap() {
    let server = start(Options {
        write_delay: Duration::from_millis(30),
        finish_delay: Duration::ZERO,
        ..Options::default()
    })
    .await;

    let clients: Vec<_> = (0..4).map(|_| tokio::spawn(send(server.addr, BADGE))).collect();
    for client in clients {
        assert_eq!(client.await.unwrap(), b"001");
    }

    let mut windows = server.sink.lock().unwrap().windows.clone();
    assert_eq!(windows.len(), 4);
    windows.sort();
    for pair in windows.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "print windows overlap");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_clients_get_separate_lifecycles() {
    let server = start(Options::default()).await;

    let (a, b) = tokio::join!(send(server.addr, BADGE), send(server.addr, BADGE));
    assert_eq!(a.len(), 3);
    assert_eq!(b.len(), 3);

    let events = wait_for_events(&server, 2 * 6).await;
    let lifecycle: Vec<_> = events
        .iter()
        .filter(|e| !matches!(e, JobEvent::Status { .. }))
        .collect();

    assert_eq!(lifecycle.len(), 4);
    assert!(matches!(lifecycle[0], JobEvent::Started { .. }));
    assert!(matches!(lifecycle[1], JobEvent::Finished { .. }));
    assert!(matches!(lifecycle[2], JobEvent::Started { .. }));
    assert!(matches!(lifecycle[3], JobEvent::Finished { .. }));
    assert_eq!(lifecycle[0].job_id(), lifecycle[1].job_id());
    assert_eq!(lifecycle[2].job_id(), lifecycle[3].job_id());
    assert_ne!(lifecycle[0].job_id(), lifecycle[2].job_id());

    // Status updates sit inside their own job's pair.
    let second_start = events.iter().position(|e| e == lifecycle[2]).unwrap();
    assert!(events[..second_start].iter().all(|e| e.job_id() == lifecycle[0].job_id()));
}

#[tokio::test]
async fn stop_halts_accepting_but_finishes_inflight_jobs() {
    let server = start(Options {
        write_delay: Duration::from_millis(300),
        ..Options::default()
    })
    .await;

    let mut inflight = TcpStream::connect(server.addr).await.unwrap();
    inflight.write_all(BADGE).await.unwrap();
    inflight.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    server.listener.stop();
    let stopped = timeout(Duration::from_secs(1), server.serve).await;
    assert!(matches!(stopped, Ok(Ok(Ok(())))));

    assert!(TcpStream::connect(server.addr).await.is_err());

    let mut reply = Vec::new();
    inflight.read_to_end(&mut reply).await.unwrap();
    assert_eq!(reply, b"001");
}

#[tokio::test]
async fn stop_is_idempotent_and_works_before_serving() {
    let server = start(Options::default()).await;

    server.listener.stop();
    server.listener.stop();
    assert!(server.listener.is_stopped());
    assert!(timeout(Duration::from_secs(1), server.serve).await.is_ok());
}

#[tokio::test]
async fn occupied_address_is_a_bind_error() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let err = Listener::bind("127.0.0.1", port).await.unwrap_err();
    assert!(matches!(err, ServerError::Bind { .. }));
}

#[tokio::test]
async fn eot_framing_does_not_need_half_close() {
    let server = start(Options {
        framing: Framing::Eot,
        ..Options::default()
    })
    .await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(BADGE).await.unwrap();
    stream.write_all(&[EOT]).await.unwrap();

    let mut reply = Vec::new();
    timeout(Duration::from_secs(2), stream.read_to_end(&mut reply))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, b"001");
}
