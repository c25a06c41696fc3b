//! Shared helpers for driving the fixture servers the integration tests
//! run against.

#![allow(dead_code)]

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads a VarInt from the fixture side of a connection.
pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Option<i32> {
    let mut result = 0i32;
    for i in 0..5 {
        let byte = reader.read_u8().await.ok()?;
        result |= i32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Some(result);
        }
    }
    None
}

/// Appends a VarInt to a buffer.
pub fn put_varint(buf: &mut Vec<u8>, val: i32) {
    #[allow(clippy::cast_sign_loss)]
    let mut val = val as u32;
    loop {
        if val & !0x7F == 0 {
            buf.push(val as u8);
            return;
        }
        buf.push((val as u8 & 0x7F) | 0x80);
        val >>= 7;
    }
}

/// Appends a VarInt-prefixed string to a buffer.
pub fn put_string(buf: &mut Vec<u8>, val: &str) {
    put_varint(buf, val.len() as i32);
    buf.extend_from_slice(val.as_bytes());
}

/// Reads a VarInt-prefixed string from the fixture side.
pub async fn read_string<R: AsyncRead + Unpin>(reader: &mut R) -> Option<String> {
    let len = read_varint(reader).await?;
    let mut buf = vec![0; usize::try_from(len).ok()?];
    reader.read_exact(&mut buf).await.ok()?;
    String::from_utf8(buf).ok()
}

/// Writes a body wrapped in the VarInt length envelope.
pub async fn write_packet<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) {
    let mut frame = Vec::with_capacity(body.len() + 5);
    put_varint(&mut frame, body.len() as i32);
    frame.extend_from_slice(body);
    writer.write_all(&frame).await.unwrap();
    writer.flush().await.unwrap();
}
