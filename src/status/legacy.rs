//! The legacy (pre-1.7) server list ping.
//! <https://wiki.vg/Server_List_Ping#1.4_to_1.5>

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::formatting;
use crate::options::LegacyOptions;
use crate::response::{LegacyPlayers, LegacyStatus, SrvRecord, Version};
use crate::util::{self, SrvProtocol, DEFAULT_JAVA_PORT};
use crate::Error;

/// Retrieves the status of a legacy Java Edition server, with reduced
/// properties compared to [`super::modern`].
///
/// # Errors
///
/// Fails on connection problems, protocol violations, or a reply that does
/// not carry the expected field count.
pub async fn legacy(host: &str, port: u16, options: LegacyOptions) -> Result<LegacyStatus, Error> {
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

    let mut stream = util::timed(
        options.timeout,
        TcpStream::connect((connect_host, connect_port)),
    )
    .await?;

    if options.debug {
        debug!(host = connect_host, port = connect_port, "connected to server");
    }

    // https://wiki.vg/Server_List_Ping#Client_to_server
    util::timed(options.timeout, async {
        stream.write_all(&[0xFE, 0x01]).await?;
        stream.flush().await
    })
    .await?;

    if options.debug {
        debug!("wrote legacy status probe");
    }

    let units = util::timed(options.timeout, read_payload(&mut stream)).await?;

    parse_payload(&units, srv)
}

// https://wiki.vg/Server_List_Ping#Server_to_client
async fn read_payload(stream: &mut TcpStream) -> Result<Vec<u16>, Error> {
    let packet_type = stream.read_u8().await?;

    if packet_type != 0xFF {
        return Err(Error::UnexpectedPacketType {
            expected: 0xFF,
            received: i32::from(packet_type),
        });
    }

    // The length counts UTF-16 code units, not bytes.
    let unit_count = stream.read_u16().await?;
    let mut buf = vec![0u8; usize::from(unit_count) * 2];
    stream.read_exact(&mut buf).await?;

    Ok(buf
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

fn parse_payload(units: &[u16], srv: Option<SrvRecord>) -> Result<LegacyStatus, Error> {
    let text = String::from_utf16_lossy(units);

    // A reply opening with the §1 marker uses the 1.4+ layout.
    if units.len() >= 2 && units[0] == 0x00A7 && units[1] == 0x0031 {
        let fields: Vec<&str> = text.split('\0').collect();

        if fields.len() < 6 {
            return Err(Error::InsufficientFields {
                expected: 6,
                received: fields.len(),
            });
        }

        return Ok(LegacyStatus {
            version: Some(Version {
                name: formatting::parse_str(fields[2]),
                protocol: fields[1].parse()?,
            }),
            players: LegacyPlayers {
                online: fields[4].parse()?,
                max: fields[5].parse()?,
            },
            motd: formatting::parse_str(fields[3]),
            srv,
        });
    }

    let fields: Vec<&str> = text.split('\u{a7}').collect();

    if fields.len() < 3 {
        return Err(Error::InsufficientFields {
            expected: 3,
            received: fields.len(),
        });
    }

    Ok(LegacyStatus {
        version: None,
        players: LegacyPlayers {
            online: fields[1].parse()?,
            max: fields[2].parse()?,
        },
        motd: formatting::parse_str(fields[0]),
        srv,
    })
}

#[cfg(test)]
mod tests {
    use super::parse_payload;
    use crate::Error;

    fn units(text: &str) -> Vec<u16> {
        text.encode_utf16().collect()
    }

    #[test]
    fn parses_the_modern_legacy_layout() {
        let status =
            parse_payload(&units("\u{a7}1\0127\0Name\0MOTD\07\020"), None).unwrap();

        let version = status.version.unwrap();
        assert_eq!(version.protocol, 127);
        assert_eq!(version.name.clean, "Name");
        assert_eq!(status.motd.clean, "MOTD");
        assert_eq!(status.players.online, 7);
        assert_eq!(status.players.max, 20);
    }

    #[test]
    fn parses_the_beta_layout() {
        let status = parse_payload(&units("A Minecraft Server\u{a7}12\u{a7}20"), None).unwrap();

        assert!(status.version.is_none());
        assert_eq!(status.motd.clean, "A Minecraft Server");
        assert_eq!(status.players.online, 12);
        assert_eq!(status.players.max, 20);
    }

    #[test]
    fn preserves_non_ascii_motd_text() {
        let status =
            parse_payload(&units("\u{a7}1\0127\01.6.4\0Motd with ü and …\01\02"), None).unwrap();

        assert_eq!(status.motd.clean, "Motd with ü and …");
    }

    #[test]
    fn rejects_missing_fields() {
        let err = parse_payload(&units("\u{a7}1\0127\0Name"), None).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientFields { expected: 6, received: 3 }
        ));

        let err = parse_payload(&units("only a motd"), None).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientFields { expected: 3, received: 1 }
        ));
    }
}
