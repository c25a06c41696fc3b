//! Legacy status probe tests against an in-process fixture server.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use mcprobe::options::LegacyOptions;
use mcprobe::Error;

fn options() -> LegacyOptions {
    LegacyOptions {
        enable_srv: false,
        ..LegacyOptions::default()
    }
}

/// Serves one legacy exchange: expects the two-byte probe and replies with
/// the given UTF-16 payload, length-prefixed in code units.
async fn spawn_fixture(payload: &str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let units: Vec<u16> = payload.encode_utf16().collect();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut probe = [0u8; 2];
        stream.read_exact(&mut probe).await.unwrap();
        assert_eq!(probe, [0xFE, 0x01]);

        let mut reply = vec![0xFF];
        reply.extend_from_slice(&u16::try_from(units.len()).unwrap().to_be_bytes());
        for unit in units {
            reply.extend_from_slice(&unit.to_be_bytes());
        }
        stream.write_all(&reply).await.unwrap();
    });

    addr
}

#[tokio::test]
async fn parses_the_1_4_layout() {
    let addr = spawn_fixture("\u{a7}1\0127\0Name\0MOTD\07\020").await;

    let status = mcprobe::status::legacy(&addr.ip().to_string(), addr.port(), options())
        .await
        .unwrap();

    let version = status.version.unwrap();
    assert_eq!(version.protocol, 127);
    assert_eq!(version.name.clean, "Name");
    assert_eq!(status.motd.clean, "MOTD");
    assert_eq!(status.players.online, 7);
    assert_eq!(status.players.max, 20);
}

#[tokio::test]
async fn parses_the_pre_1_4_layout() {
    let addr = spawn_fixture("A Minecraft Server\u{a7}12\u{a7}64").await;

    let status = mcprobe::status::legacy(&addr.ip().to_string(), addr.port(), options())
        .await
        .unwrap();

    assert!(status.version.is_none());
    assert_eq!(status.motd.clean, "A Minecraft Server");
    assert_eq!(status.players.online, 12);
    assert_eq!(status.players.max, 64);
}

#[tokio::test]
async fn counts_utf16_code_units_not_bytes() {
    // Every non-ASCII character here needs two bytes on the wire; a byte
    // count would truncate the payload.
    let addr = spawn_fixture("\u{a7}1\0127\01.6.4\0Grüße aus München\05\010").await;

    let status = mcprobe::status::legacy(&addr.ip().to_string(), addr.port(), options())
        .await
        .unwrap();

    assert_eq!(status.motd.clean, "Grüße aus München");
    assert_eq!(status.players.online, 5);
    assert_eq!(status.players.max, 10);
}

#[tokio::test]
async fn rejects_replies_with_missing_fields() {
    let addr = spawn_fixture("\u{a7}1\0127\0Name").await;

    let err = mcprobe::status::legacy(&addr.ip().to_string(), addr.port(), options())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InsufficientFields { expected: 6, .. }));
}
