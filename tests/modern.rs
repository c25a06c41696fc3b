//! Modern status probe tests against an in-process fixture server.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use common::{put_string, put_varint, read_string, read_varint, write_packet};
use mcprobe::options::ModernOptions;
use mcprobe::Error;

fn options() -> ModernOptions {
    ModernOptions {
        enable_srv: false,
        ..ModernOptions::default()
    }
}

/// Serves one status exchange, replying with the given JSON document and
/// echoing a ping when the client sends one.
async fn spawn_fixture(response: serde_json::Value) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        // Handshake
        let _length = read_varint(&mut stream).await.unwrap();
        assert_eq!(read_varint(&mut stream).await, Some(0x00));
        let _protocol = read_varint(&mut stream).await.unwrap();
        let _hostname = read_string(&mut stream).await.unwrap();
        let _port = stream.read_u16().await.unwrap();
        assert_eq!(read_varint(&mut stream).await, Some(1));

        // Status request
        let _length = read_varint(&mut stream).await.unwrap();
        assert_eq!(read_varint(&mut stream).await, Some(0x00));

        // Status response
        let mut body = Vec::new();
        put_varint(&mut body, 0x00);
        put_string(&mut body, &response.to_string());
        write_packet(&mut stream, &body).await;

        // Ping, unless the client hung up
        if let Some(_length) = read_varint(&mut stream).await {
            if read_varint(&mut stream).await == Some(0x01) {
                let payload = stream.read_i64().await.unwrap();
                let mut body = Vec::new();
                put_varint(&mut body, 0x01);
                body.extend_from_slice(&payload.to_be_bytes());
                write_packet(&mut stream, &body).await;
            }
        }
    });

    addr
}

#[tokio::test]
async fn full_status_round_trip() {
    let addr = spawn_fixture(json!({
        "version": {"name": "§cPurpur 1.20", "protocol": 763},
        "players": {
            "online": 5,
            "max": 20,
            "sample": [
                {"name": "§bNotch", "id": "069a79f444e94726a5befca90e38aaf5"},
                {"name": "Jeb", "id": [1, 2, 3, 4]},
            ],
        },
        "description": {"text": "Hello ", "extra": [{"color": "red", "text": "world"}]},
        "favicon": "data:image/png;base64,AAAA",
    }))
    .await;

    let status = mcprobe::status::modern(&addr.ip().to_string(), addr.port(), options())
        .await
        .unwrap();

    assert_eq!(status.version.name.clean, "Purpur 1.20");
    assert_eq!(status.version.protocol, 763);
    assert_eq!(status.motd.clean, "Hello world");
    assert!(status.motd.raw.contains("§c"));
    assert_eq!(status.players.online, Some(5));
    assert_eq!(status.players.max, Some(20));
    assert_eq!(status.players.sample.len(), 2);
    assert_eq!(
        status.players.sample[0].id,
        "069a79f444e94726a5befca90e38aaf5"
    );
    assert_eq!(status.players.sample[0].name.clean, "Notch");
    assert_eq!(
        status.players.sample[1].id,
        "00000001000000020000000300000004"
    );
    assert_eq!(status.favicon.as_deref(), Some("data:image/png;base64,AAAA"));
    assert!(status.mods.is_none());
    assert!(status.srv.is_none());
}

#[tokio::test]
async fn invalid_player_id_shape_fails() {
    let addr = spawn_fixture(json!({
        "description": "x",
        "players": {"sample": [{"name": "ghost", "id": 7}]},
    }))
    .await;

    let err = mcprobe::status::modern(&addr.ip().to_string(), addr.port(), options())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidPlayerId));
}

#[tokio::test]
async fn skipping_the_ping_reports_zero_latency() {
    let addr = spawn_fixture(json!({"description": "no ping"})).await;

    let status = mcprobe::status::modern(
        &addr.ip().to_string(),
        addr.port(),
        ModernOptions {
            ping: false,
            ..options()
        },
    )
    .await
    .unwrap();

    assert_eq!(status.latency, Duration::ZERO);
    assert_eq!(status.motd.clean, "no ping");
}

#[tokio::test]
async fn raw_status_returns_the_document_untouched() {
    let addr = spawn_fixture(json!({
        "description": "raw",
        "customField": {"nested": [1, 2, 3]},
    }))
    .await;

    let raw = mcprobe::status::modern_raw(&addr.ip().to_string(), addr.port(), options())
        .await
        .unwrap();

    assert_eq!(raw["description"], json!("raw"));
    assert_eq!(raw["customField"]["nested"], json!([1, 2, 3]));
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let err = mcprobe::status::modern(
        &addr.ip().to_string(),
        addr.port(),
        ModernOptions {
            timeout: Duration::from_millis(50),
            ..options()
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::DeadlineExceeded));
}
