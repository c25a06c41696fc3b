//! The GameSpy-derived UDP query protocol, supported by Java servers with
//! `enable-query=true`.
//! <https://wiki.vg/Query>

use std::collections::HashMap;
use std::io::{Cursor, Read};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::formatting;
use crate::options::QueryOptions;
use crate::proto::ReadCursorExt;
use crate::response::{QueryBasic, QueryFull};
use crate::util::{self, SrvProtocol, DEFAULT_JAVA_PORT};
use crate::Error;

const MAGIC: [u8; 2] = [0xFE, 0xFD];
const HANDSHAKE_TYPE: u8 = 0x09;
const STAT_TYPE: u8 = 0x00;
/// Session IDs must carry a zero top nibble in every byte.
const SESSION_MASK: i32 = 0x0F0F_0F0F;

/// Runs a query against the server and returns basic information.
///
/// # Errors
///
/// Fails on connection problems, session mismatches, or malformed stat
/// responses.
pub async fn basic(host: &str, port: u16, options: QueryOptions) -> Result<QueryBasic, Error> {
    let mut cursor = stat_exchange(host, port, &options, false).await?;

    // https://wiki.vg/Query#Response_2
    Ok(QueryBasic {
        motd: formatting::parse_str(&cursor.read_nt_string()?),
        game_type: cursor.read_nt_string()?,
        map: cursor.read_nt_string()?,
        online_players: cursor.read_nt_string()?.parse()?,
        max_players: cursor.read_nt_string()?.parse()?,
        // The one little-endian integer in the protocol.
        host_port: cursor.read_u16::<LittleEndian>()?,
        host_ip: cursor.read_nt_string()?,
    })
}

/// Runs a query against the server and returns the full key/value and
/// player listing.
///
/// # Errors
///
/// Fails on connection problems, session mismatches, or malformed stat
/// responses.
pub async fn full(host: &str, port: u16, options: QueryOptions) -> Result<QueryFull, Error> {
    let mut cursor = stat_exchange(host, port, &options, true).await?;

    // https://wiki.vg/Query#Response_3
    let mut padding = [0u8; 11];
    cursor.read_exact(&mut padding)?;

    let mut data = HashMap::new();

    loop {
        let key = cursor.read_nt_string()?;

        if key.is_empty() {
            break;
        }

        data.insert(key, cursor.read_nt_string()?);
    }

    let mut padding = [0u8; 10];
    cursor.read_exact(&mut padding)?;

    let mut players = Vec::new();

    loop {
        let name = cursor.read_nt_string()?;

        if name.is_empty() {
            break;
        }

        players.push(name);
    }

    Ok(QueryFull { data, players })
}

/// Performs the two-round-trip exchange and returns a cursor positioned at
/// the start of the stat payload.
async fn stat_exchange(
    host: &str,
    port: u16,
    options: &QueryOptions,
    full: bool,
) -> Result<Cursor<Vec<u8>>, Error> {
    let srv = util::resolve_srv(
        SrvProtocol::Tcp,
        host,
        port,
        DEFAULT_JAVA_PORT,
        options.enable_srv,
    )
    .await;

    let (connect_host, connect_port) = srv
        .as_ref()
        .map_or((host, port), |record| (record.host.as_str(), record.port));

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    util::timed(options.timeout, socket.connect((connect_host, connect_port))).await?;

    let session_id = if options.session_id == 0 {
        rand::random::<i32>() & SESSION_MASK
    } else {
        options.session_id & SESSION_MASK
    };

    // Handshake request
    // https://wiki.vg/Query#Request
    let mut packet = Vec::with_capacity(7);
    packet.extend_from_slice(&MAGIC);
    packet.push(HANDSHAKE_TYPE);
    packet.extend_from_slice(&session_id.to_be_bytes());
    util::timed(options.timeout, socket.send(&packet)).await?;

    // Handshake response
    // https://wiki.vg/Query#Response
    let datagram = recv_datagram(&socket, options).await?;
    let mut cursor = Cursor::new(datagram);
    check_header(&mut cursor, HANDSHAKE_TYPE, session_id)?;

    let challenge: i32 = cursor.read_nt_string()?.trim().parse()?;

    if options.debug {
        debug!(session_id, challenge, "completed query handshake");
    }

    // Stat request; the full variant is padded to 8 payload bytes.
    // https://wiki.vg/Query#Request_2
    let mut packet = Vec::with_capacity(15);
    packet.extend_from_slice(&MAGIC);
    packet.push(STAT_TYPE);
    packet.extend_from_slice(&session_id.to_be_bytes());
    packet.extend_from_slice(&challenge.to_be_bytes());
    if full {
        packet.extend_from_slice(&[0x00; 4]);
    }
    util::timed(options.timeout, socket.send(&packet)).await?;

    let datagram = recv_datagram(&socket, options).await?;
    let mut cursor = Cursor::new(datagram);
    check_header(&mut cursor, STAT_TYPE, session_id)?;

    Ok(cursor)
}

async fn recv_datagram(socket: &UdpSocket, options: &QueryOptions) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0u8; 64 * 1024];
    let received = util::timed(options.timeout, socket.recv(&mut buf)).await?;
    buf.truncate(received);
    Ok(buf)
}

fn check_header(
    cursor: &mut Cursor<Vec<u8>>,
    expected_type: u8,
    session_id: i32,
) -> Result<(), Error> {
    let packet_type = cursor.read_u8()?;

    if packet_type != expected_type {
        return Err(Error::UnexpectedPacketType {
            expected: i32::from(expected_type),
            received: i32::from(packet_type),
        });
    }

    let received = cursor.read_i32::<BigEndian>()?;

    if received != session_id {
        return Err(Error::SessionIdMismatch {
            expected: session_id,
            received,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::check_header;
    use crate::Error;

    #[test]
    fn header_session_mismatch_is_rejected() {
        let mut datagram = vec![0x00];
        datagram.extend_from_slice(&7i32.to_be_bytes());

        let err = check_header(&mut Cursor::new(datagram), 0x00, 8).unwrap_err();
        assert!(matches!(
            err,
            Error::SessionIdMismatch { expected: 8, received: 7 }
        ));
    }

    #[test]
    fn header_type_mismatch_is_rejected() {
        let mut datagram = vec![0x09];
        datagram.extend_from_slice(&1i32.to_be_bytes());

        let err = check_header(&mut Cursor::new(datagram), 0x00, 1).unwrap_err();
        assert!(matches!(err, Error::UnexpectedPacketType { .. }));
    }
}
