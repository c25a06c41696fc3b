//! Framing primitives shared by the wire protocols: VarInts,
//! length-prefixed strings, null-terminated strings and the
//! length-enveloped packet format used by modern Java servers.

use std::io::{self, Read};

use byteorder::ReadBytesExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::Error;

const SEGMENT_BITS: u8 = 0x7F;
const CONTINUE_BIT: u8 = 0x80;

pub(crate) trait ReadProtoExt: AsyncRead + Unpin {
    /// Reads a signed 32-bit LEB128 VarInt, one byte per iteration.
    async fn read_varint(&mut self) -> Result<i32, Error> {
        let mut result = 0i32;
        for i in 0..5 {
            let byte = self.read_u8().await?;
            result |= i32::from(byte & SEGMENT_BITS) << (7 * i);
            if byte & CONTINUE_BIT == 0 {
                return Ok(result);
            }
        }
        Err(Error::VarIntTooBig)
    }

    /// Reads a VarInt-prefixed UTF-8 string.
    async fn read_string(&mut self) -> Result<String, Error> {
        let len = usize::try_from(self.read_varint().await?)?;
        let mut buf = vec![0; len];
        self.read_exact(&mut buf).await?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl<T> ReadProtoExt for T where T: AsyncRead + Unpin {}

pub(crate) trait WriteProtoExt: AsyncWrite + Unpin {
    /// Writes a payload wrapped in the VarInt length envelope.
    async fn write_packet(&mut self, body: &[u8]) -> io::Result<()> {
        let mut frame = Vec::with_capacity(body.len() + 5);
        put_varint(&mut frame, i32::try_from(body.len()).unwrap_or(i32::MAX));
        frame.extend_from_slice(body);
        self.write_all(&frame).await?;
        self.flush().await
    }
}

impl<T> WriteProtoExt for T where T: AsyncWrite + Unpin {}

/// Appends a VarInt to a packet body under construction.
pub(crate) fn put_varint(buf: &mut Vec<u8>, val: i32) {
    #[allow(clippy::cast_sign_loss)]
    let mut val = val as u32;
    loop {
        if val & !u32::from(SEGMENT_BITS) == 0 {
            #[allow(clippy::cast_possible_truncation)]
            buf.push(val as u8);
            return;
        }
        #[allow(clippy::cast_possible_truncation)]
        buf.push((val as u8 & SEGMENT_BITS) | CONTINUE_BIT);
        val >>= 7;
    }
}

/// Appends a VarInt-prefixed UTF-8 string to a packet body.
pub(crate) fn put_string(buf: &mut Vec<u8>, val: &str) {
    put_varint(buf, i32::try_from(val.len()).unwrap_or(i32::MAX));
    buf.extend_from_slice(val.as_bytes());
}

pub(crate) trait ReadCursorExt: Read {
    /// Reads bytes until NUL, decoding them as ISO-8859-1. Query servers
    /// reply with Latin-1 MOTDs that a UTF-8 decode would corrupt.
    fn read_nt_string(&mut self) -> io::Result<String> {
        let mut result = String::new();
        loop {
            let byte = self.read_u8()?;
            if byte == 0x00 {
                break;
            }
            result.push(char::from(byte));
        }
        Ok(result)
    }
}

impl<T> ReadCursorExt for T where T: Read {}
