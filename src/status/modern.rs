//! The modern (Java 1.7+) server list ping.
//! <https://wiki.vg/Server_List_Ping>

use std::io;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::debug;

use crate::formatting;
use crate::options::ModernOptions;
use crate::proto::{put_string, put_varint, ReadProtoExt, WriteProtoExt};
use crate::response::{Mod, ModInfo, ModernStatus, Players, SamplePlayer, SrvRecord, Version};
use crate::util::{self, SrvProtocol, DEFAULT_JAVA_PORT};
use crate::Error;

#[derive(Debug, Default, Deserialize)]
struct RawStatus {
    #[serde(default)]
    version: RawVersion,
    #[serde(default)]
    players: RawPlayers,
    description: Option<Value>,
    favicon: Option<String>,
    modinfo: Option<RawModInfo>,
    #[serde(rename = "forgeData")]
    forge_data: Option<RawForgeData>,
}

#[derive(Debug, Default, Deserialize)]
struct RawVersion {
    #[serde(default)]
    name: String,
    #[serde(default)]
    protocol: i64,
}

#[derive(Debug, Default, Deserialize)]
struct RawPlayers {
    online: Option<i64>,
    max: Option<i64>,
    #[serde(default)]
    sample: Vec<RawPlayer>,
}

#[derive(Debug, Deserialize)]
struct RawPlayer {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawModInfo {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(rename = "modList", default)]
    list: Vec<RawMod>,
}

#[derive(Debug, Deserialize)]
struct RawMod {
    #[serde(rename = "modid", default)]
    id: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct RawForgeData {
    mods: Option<Vec<RawForgeMod>>,
}

#[derive(Debug, Deserialize)]
struct RawForgeMod {
    #[serde(rename = "modId", default)]
    id: String,
    #[serde(rename = "modmarker", default)]
    version: String,
}

/// Retrieves the status of any 1.7+ Java Edition server.
///
/// # Errors
///
/// Fails on connection problems, protocol violations, or a response that
/// cannot be converted into a [`ModernStatus`].
pub async fn modern(host: &str, port: u16, options: ModernOptions) -> Result<ModernStatus, Error> {
    let (mut stream, srv) = dial(host, port, &options).await?;

    util::timed(
        options.timeout,
        write_handshake(&mut stream, options.protocol_version, host, port),
    )
    .await?;
    util::timed(options.timeout, write_status_request(&mut stream)).await?;

    if options.debug {
        debug!("wrote handshake and status request packets");
    }

    let raw: RawStatus = util::timed(options.timeout, read_status_response(&mut stream)).await?;

    if options.debug {
        debug!("read status response packet");
    }

    let latency = if options.ping {
        let latency = util::timed(options.timeout, ping_round_trip(&mut stream)).await?;

        if options.debug {
            debug!(?latency, "completed ping exchange");
        }

        latency
    } else {
        Duration::ZERO
    };

    build_status(raw, srv, latency)
}

/// Retrieves the raw, unconverted status JSON of any 1.7+ Java Edition
/// server.
///
/// # Errors
///
/// Fails on connection problems or protocol violations; the payload itself
/// is returned as-is.
pub async fn modern_raw(
    host: &str,
    port: u16,
    options: ModernOptions,
) -> Result<Map<String, Value>, Error> {
    let (mut stream, _srv) = dial(host, port, &options).await?;

    util::timed(
        options.timeout,
        write_handshake(&mut stream, options.protocol_version, host, port),
    )
    .await?;
    util::timed(options.timeout, write_status_request(&mut stream)).await?;

    let result = util::timed(options.timeout, read_status_response(&mut stream)).await?;

    if options.ping {
        util::timed(options.timeout, ping_round_trip(&mut stream)).await?;
    }

    Ok(result)
}

async fn dial(
    host: &str,
    port: u16,
    options: &ModernOptions,
) -> Result<(TcpStream, Option<SrvRecord>), Error> {
    let srv = util::resolve_srv(
        SrvProtocol::Tcp,
        host,
        port,
        DEFAULT_JAVA_PORT,
        options.enable_srv,
    )
    .await;

    if options.debug {
        if let Some(record) = &srv {
            debug!(host = record.host.as_str(), port = record.port, "found an SRV record");
        }
    }

    let (connect_host, connect_port) = srv
        .as_ref()
        .map_or((host, port), |record| (record.host.as_str(), record.port));

    let stream = util::timed(
        options.timeout,
        TcpStream::connect((connect_host, connect_port)),
    )
    .await?;

    if options.debug {
        debug!(host = connect_host, port = connect_port, "connected to server");
    }

    Ok((stream, srv))
}

// https://wiki.vg/Server_List_Ping#Handshake
async fn write_handshake(
    stream: &mut TcpStream,
    protocol_version: i32,
    host: &str,
    port: u16,
) -> io::Result<()> {
    // The handshake carries the hostname the caller asked for, not the SRV
    // target; some servers route on it.
    let mut body = Vec::new();
    put_varint(&mut body, 0x00);
    put_varint(&mut body, protocol_version);
    put_string(&mut body, host);
    body.extend_from_slice(&port.to_be_bytes());
    put_varint(&mut body, 1);

    stream.write_packet(&body).await
}

// https://wiki.vg/Server_List_Ping#Request
async fn write_status_request(stream: &mut TcpStream) -> io::Result<()> {
    let mut body = Vec::new();
    put_varint(&mut body, 0x00);

    stream.write_packet(&body).await
}

// https://wiki.vg/Server_List_Ping#Response
async fn read_status_response<T: DeserializeOwned>(stream: &mut TcpStream) -> Result<T, Error> {
    stream.read_varint().await?;

    let packet_type = stream.read_varint().await?;

    if packet_type != 0x00 {
        return Err(Error::UnexpectedPacketType {
            expected: 0x00,
            received: packet_type,
        });
    }

    let data = stream.read_string().await?;

    Ok(serde_json::from_str(&data)?)
}

// https://wiki.vg/Server_List_Ping#Ping
async fn ping_round_trip(stream: &mut TcpStream) -> Result<Duration, Error> {
    let payload: i64 = rand::random();

    let mut body = Vec::new();
    put_varint(&mut body, 0x01);
    body.extend_from_slice(&payload.to_be_bytes());
    stream.write_packet(&body).await?;

    let start = Instant::now();

    stream.read_varint().await?;

    let packet_type = stream.read_varint().await?;

    if packet_type != 0x01 {
        return Err(Error::UnexpectedPacketType {
            expected: 0x01,
            received: packet_type,
        });
    }

    if stream.read_i64().await? != payload {
        return Err(Error::UnexpectedPayload);
    }

    Ok(start.elapsed())
}

fn build_status(
    raw: RawStatus,
    srv: Option<SrvRecord>,
    latency: Duration,
) -> Result<ModernStatus, Error> {
    let motd = formatting::parse(raw.description.as_ref().ok_or(Error::UnsupportedInputShape)?)?;

    let mut sample = Vec::with_capacity(raw.players.sample.len());

    for player in &raw.players.sample {
        sample.push(SamplePlayer {
            id: normalize_player_id(&player.id)?,
            name: formatting::parse_str(&player.name),
        });
    }

    Ok(ModernStatus {
        version: Version {
            name: formatting::parse_str(&raw.version.name),
            protocol: raw.version.protocol,
        },
        players: Players {
            online: raw.players.online,
            max: raw.players.max,
            sample,
        },
        motd,
        mods: mod_info(&raw),
        favicon: raw.favicon,
        srv,
        latency,
    })
}

fn mod_info(raw: &RawStatus) -> Option<ModInfo> {
    // forgeData wins over modinfo when a server sends both.
    if let Some(mods) = raw.forge_data.as_ref().and_then(|data| data.mods.as_ref()) {
        return Some(ModInfo {
            kind: "FML2".to_owned(),
            list: mods
                .iter()
                .map(|entry| Mod {
                    id: entry.id.clone(),
                    version: entry.version.clone(),
                })
                .collect(),
        });
    }

    raw.modinfo
        .as_ref()
        .filter(|info| !info.kind.is_empty())
        .map(|info| ModInfo {
            kind: info.kind.clone(),
            list: info
                .list
                .iter()
                .map(|entry| Mod {
                    id: entry.id.clone(),
                    version: entry.version.clone(),
                })
                .collect(),
        })
}

/// Normalizes the player `id` field, which servers send either as a UUID
/// string or as an array of four 32-bit halves.
#[allow(clippy::cast_sign_loss)]
fn normalize_player_id(value: &Value) -> Result<String, Error> {
    match value {
        Value::String(id) => Ok(id.clone()),
        Value::Array(halves) if halves.len() == 4 => {
            let mut id = String::with_capacity(32);

            for half in halves {
                let half = half.as_i64().ok_or(Error::InvalidPlayerId)?;
                let half = u32::try_from(half)
                    .or_else(|_| i32::try_from(half).map(|signed| signed as u32))
                    .map_err(|_| Error::InvalidPlayerId)?;
                id.push_str(&format!("{half:08x}"));
            }

            Ok(id)
        }
        _ => Err(Error::InvalidPlayerId),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use std::time::Duration;

    use super::{build_status, normalize_player_id, RawStatus};
    use crate::Error;

    #[test]
    fn player_id_string_passes_through() {
        let id = normalize_player_id(&json!("853c80ef3c3749fdaa49938b674adae6")).unwrap();
        assert_eq!(id, "853c80ef3c3749fdaa49938b674adae6");
    }

    #[test]
    fn player_id_array_becomes_lowercase_hex() {
        let id = normalize_player_id(&json!([1, 2, 3, 4])).unwrap();
        assert_eq!(id, "00000001000000020000000300000004");
        assert_eq!(id.len(), 32);

        let id = normalize_player_id(&json!([-1, 0, 16, 255])).unwrap();
        assert_eq!(id, "ffffffff0000000000000010000000ff");
    }

    #[test]
    fn player_id_other_shapes_fail() {
        assert!(matches!(
            normalize_player_id(&json!(7)),
            Err(Error::InvalidPlayerId)
        ));
        assert!(matches!(
            normalize_player_id(&json!([1, 2, 3])),
            Err(Error::InvalidPlayerId)
        ));
        assert!(matches!(
            normalize_player_id(&json!([1.5, 2, 3, 4])),
            Err(Error::InvalidPlayerId)
        ));
    }

    #[test]
    fn forge_data_wins_over_modinfo() {
        let raw: RawStatus = serde_json::from_value(json!({
            "version": {"name": "1.19.2", "protocol": 760},
            "description": "modded",
            "modinfo": {"type": "FML", "modList": [{"modid": "old", "version": "1"}]},
            "forgeData": {"mods": [{"modId": "new", "modmarker": "2"}]},
        }))
        .unwrap();

        let status = build_status(raw, None, Duration::ZERO).unwrap();
        let mods = status.mods.unwrap();
        assert_eq!(mods.kind, "FML2");
        assert_eq!(mods.list.len(), 1);
        assert_eq!(mods.list[0].id, "new");
        assert_eq!(mods.list[0].version, "2");
    }

    #[test]
    fn modinfo_used_without_forge_data() {
        let raw: RawStatus = serde_json::from_value(json!({
            "description": "modded",
            "modinfo": {"type": "FML", "modList": [{"modid": "old", "version": "1"}]},
        }))
        .unwrap();

        let status = build_status(raw, None, Duration::ZERO).unwrap();
        let mods = status.mods.unwrap();
        assert_eq!(mods.kind, "FML");
        assert_eq!(mods.list[0].id, "old");
    }

    #[test]
    fn missing_description_is_rejected() {
        let raw: RawStatus = serde_json::from_value(json!({
            "version": {"name": "x", "protocol": 5},
        }))
        .unwrap();

        assert!(matches!(
            build_status(raw, None, Duration::ZERO),
            Err(Error::UnsupportedInputShape)
        ));
    }
}
