#![cfg(feature = "graylog")]

use std::time::Duration;

use fedlog::{LogCall, LoggerConfig, LoggerHandle, Variant};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::time::timeout;

async fn read_frame(stream: &mut tokio::net::TcpStream) -> Vec<u8> {
    let mut frame = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).await.unwrap();
        if byte[0] == 0 {
            return frame;
        }
        frame.push(byte[0]);
    }
}

#[tokio::test]
async fn records_arrive_as_nul_terminated_gelf() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut handle = LoggerHandle::new(
        LoggerConfig::new("WKR_w1")
            .variant(Variant::Graylog)
            .server("127.0.0.1", port),
    );
    handle.initialise().unwrap();

    handle
        .warning(LogCall::new("ping").field("x", 42).field("id", "abc"))
        .unwrap();
    handle.info("pong").unwrap();

    let (mut stream, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .unwrap()
        .unwrap();

    let first: Value = serde_json::from_slice(&read_frame(&mut stream).await).unwrap();
    assert_eq!(first["version"], "1.1");
    assert_eq!(first["short_message"], "ping");
    assert_eq!(first["level"], 4);
    assert_eq!(first["_x"], 42);
    assert_eq!(first["_id_"], "abc");
    assert_eq!(first["_logger"], "WKR_w1");
    assert!(first.get("_id").is_none());

    let second: Value = timeout(Duration::from_secs(5), read_frame(&mut stream))
        .await
        .map(|frame| serde_json::from_slice(&frame).unwrap())
        .unwrap();
    assert_eq!(second["short_message"], "pong");
    assert_eq!(second["level"], 6);
}

#[tokio::test]
async fn unreachable_server_does_not_fail_the_caller() {
    // bind then drop, so nothing listens on the port
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut handle = LoggerHandle::new(
        LoggerConfig::new("DIR_main")
            .variant(Variant::Graylog)
            .server("127.0.0.1", port),
    );
    handle.initialise().unwrap();

    for i in 0..10 {
        assert!(handle.info(LogCall::new("lost").field("i", i)).unwrap().is_some());
    }
}

#[test]
fn graylog_needs_a_runtime() {
    let mut handle = LoggerHandle::new(
        LoggerConfig::new("DIR_main")
            .variant(Variant::Graylog)
            .server("127.0.0.1", 12201),
    );
    let err = handle.initialise().unwrap_err();
    assert!(err.to_string().contains("runtime"));
}
