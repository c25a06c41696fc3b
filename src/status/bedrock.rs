//! The Bedrock Edition status probe, built on the RakNet unconnected
//! ping/pong exchange.
//! <https://wiki.vg/Raknet_Protocol#Unconnected_Ping>

use std::io::{Cursor, Read};
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, ReadBytesExt};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::formatting;
use crate::options::BedrockOptions;
use crate::response::{BedrockStatus, SrvRecord};
use crate::util::{self, SrvProtocol, DEFAULT_BEDROCK_PORT};
use crate::Error;

/// RakNet's offline message data ID, sent and echoed verbatim.
const UNCONNECTED_MAGIC: [u8; 16] = [
    0x00, 0xFF, 0xFF, 0x00, 0xFE, 0xFE, 0xFE, 0xFE, 0xFD, 0xFD, 0xFD, 0xFD, 0x12, 0x34, 0x56, 0x78,
];

/// Retrieves the status of a Bedrock Edition server.
///
/// # Errors
///
/// Fails on connection problems, protocol violations, or unparsable
/// numeric slots in the server-id string.
pub async fn bedrock(
    host: &str,
    port: u16,
    options: BedrockOptions,
) -> Result<BedrockStatus, Error> {
    let srv = util::resolve_srv(
        SrvProtocol::Udp,
        host,
        port,
        DEFAULT_BEDROCK_PORT,
        options.enable_srv,
    )
    .await;

    let (connect_host, connect_port) = srv
        .as_ref()
        .map_or((host, port), |record| (record.host.as_str(), record.port));

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    util::timed(options.timeout, socket.connect((connect_host, connect_port))).await?;

    let client_guid = if options.client_guid == 0 {
        rand::random()
    } else {
        options.client_guid
    };

    let time = i64::try_from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis(),
    )
    .unwrap_or_default();

    // Unconnected ping
    let mut packet = Vec::with_capacity(33);
    packet.push(0x01);
    packet.extend_from_slice(&time.to_be_bytes());
    packet.extend_from_slice(&UNCONNECTED_MAGIC);
    packet.extend_from_slice(&client_guid.to_be_bytes());
    util::timed(options.timeout, socket.send(&packet)).await?;

    if options.debug {
        debug!(client_guid, "wrote unconnected ping packet");
    }

    let mut buf = vec![0u8; 64 * 1024];
    let received = util::timed(options.timeout, socket.recv(&mut buf)).await?;
    buf.truncate(received);

    let (server_guid, server_id) = parse_pong(&buf)?;

    if options.debug {
        debug!(server_guid, "read unconnected pong packet");
    }

    parse_server_id(server_guid, &server_id, srv)
}

// Unconnected pong
fn parse_pong(datagram: &[u8]) -> Result<(i64, String), Error> {
    let mut cursor = Cursor::new(datagram);

    let packet_type = cursor.read_u8()?;

    if packet_type != 0x1C {
        return Err(Error::UnexpectedPacketType {
            expected: 0x1C,
            received: i32::from(packet_type),
        });
    }

    // Echoed time, then the server GUID.
    cursor.read_i64::<BigEndian>()?;
    let server_guid = cursor.read_i64::<BigEndian>()?;

    let mut magic = [0u8; 16];
    cursor.read_exact(&mut magic)?;

    let length = cursor.read_u16::<BigEndian>()?;
    let mut data = vec![0u8; usize::from(length)];
    cursor.read_exact(&mut data)?;

    Ok((server_guid, String::from_utf8_lossy(&data).into_owned()))
}

/// Splits the `;`-delimited server-id record into its positional slots.
/// Missing or whitespace-only slots are left absent; MOTD lines 1 and 2
/// are joined with a newline before formatting parse.
fn parse_server_id(
    server_guid: i64,
    server_id: &str,
    srv: Option<SrvRecord>,
) -> Result<BedrockStatus, Error> {
    let mut status = BedrockStatus {
        server_guid,
        edition: None,
        motd: None,
        protocol_version: None,
        version: None,
        online_players: None,
        max_players: None,
        server_id: None,
        gamemode: None,
        gamemode_id: None,
        port_ipv4: None,
        port_ipv6: None,
        srv,
    };

    let mut motd: Option<String> = None;

    for (slot, value) in server_id.split(';').enumerate() {
        if value.trim().is_empty() {
            continue;
        }

        match slot {
            0 => status.edition = Some(value.to_owned()),
            1 => motd = Some(value.to_owned()),
            2 => status.protocol_version = Some(value.parse()?),
            3 => status.version = Some(value.to_owned()),
            4 => status.online_players = Some(value.parse()?),
            5 => status.max_players = Some(value.parse()?),
            6 => status.server_id = Some(value.to_owned()),
            7 => {
                motd = Some(match motd.take() {
                    Some(first) => format!("{first}\n{value}"),
                    None => format!("\n{value}"),
                });
            }
            8 => status.gamemode = Some(value.to_owned()),
            9 => status.gamemode_id = Some(value.parse()?),
            10 => status.port_ipv4 = Some(narrow_port(value.parse()?)),
            11 => status.port_ipv6 = Some(narrow_port(value.parse()?)),
            _ => {}
        }
    }

    status.motd = motd.map(|text| formatting::parse_str(&text));

    Ok(status)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn narrow_port(value: i64) -> u16 {
    value as u16
}
