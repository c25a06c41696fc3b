//! The typed result model returned by the probe functions. All values are
//! immutable snapshots created by a single probe call.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::formatting::FormattedText;

/// A DNS SRV record consulted before dialing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SrvRecord {
    pub host: String,
    pub port: u16,
}

/// The status of a modern (Java 1.7+) server.
#[derive(Debug, Clone, Serialize)]
pub struct ModernStatus {
    pub version: Version,
    pub players: Players,
    pub motd: FormattedText,
    /// The server icon, usually a `data:image/png;base64,` URL.
    pub favicon: Option<String>,
    /// The SRV record used to reach the server, if any.
    pub srv: Option<SrvRecord>,
    /// Forge mod information, when the server advertises any.
    pub mods: Option<ModInfo>,
    /// Round-trip time measured by the ping/pong exchange; zero when the
    /// ping was skipped.
    #[serde(skip)]
    pub latency: Duration,
}

/// Version information as reported by a server.
#[derive(Debug, Clone, Serialize)]
pub struct Version {
    /// The version name, which in practice arrives in a wide variety of
    /// formats and may carry formatting codes.
    pub name: FormattedText,
    pub protocol: i64,
}

/// Player counts and the advertised online sample.
#[derive(Debug, Clone, Serialize)]
pub struct Players {
    pub online: Option<i64>,
    pub max: Option<i64>,
    /// A sample of online players. Servers often leave this empty or use
    /// it for advertising.
    pub sample: Vec<SamplePlayer>,
}

/// One entry of the player sample.
#[derive(Debug, Clone, Serialize)]
pub struct SamplePlayer {
    /// The player UUID, normalized to lowercase hex when the server sends
    /// the four-integer form.
    pub id: String,
    pub name: FormattedText,
}

/// Mod metadata from either the FML `modinfo` or Forge `forgeData` shape.
#[derive(Debug, Clone, Serialize)]
pub struct ModInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub list: Vec<Mod>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Mod {
    pub id: String,
    pub version: String,
}

/// The status of a legacy (pre-1.7) server.
#[derive(Debug, Clone, Serialize)]
pub struct LegacyStatus {
    /// Absent for pre-1.4 servers, whose reply carries no version fields.
    pub version: Option<Version>,
    pub players: LegacyPlayers,
    pub motd: FormattedText,
    pub srv: Option<SrvRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegacyPlayers {
    pub online: i64,
    pub max: i64,
}

/// The status of a Bedrock server. Every field beyond the GUID may be
/// absent when the server omits the corresponding server-id slot.
#[derive(Debug, Clone, Serialize)]
pub struct BedrockStatus {
    pub server_guid: i64,
    pub edition: Option<String>,
    pub motd: Option<FormattedText>,
    pub protocol_version: Option<i64>,
    pub version: Option<String>,
    pub online_players: Option<i64>,
    pub max_players: Option<i64>,
    pub server_id: Option<String>,
    pub gamemode: Option<String>,
    pub gamemode_id: Option<i64>,
    pub port_ipv4: Option<u16>,
    pub port_ipv6: Option<u16>,
    pub srv: Option<SrvRecord>,
}

/// The result of a basic query stat.
#[derive(Debug, Clone, Serialize)]
pub struct QueryBasic {
    pub motd: FormattedText,
    pub game_type: String,
    pub map: String,
    pub online_players: u64,
    pub max_players: u64,
    pub host_port: u16,
    pub host_ip: String,
}

/// The result of a full query stat.
#[derive(Debug, Clone, Serialize)]
pub struct QueryFull {
    /// The raw key/value section as sent by the server.
    pub data: HashMap<String, String>,
    pub players: Vec<String>,
}
