//! Option structs accepted by the probe functions. Every struct implements
//! `Default` with the values a plain status ping would use.

use std::time::{Duration, SystemTime};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for [`crate::status::modern`] and [`crate::status::modern_raw`].
#[derive(Debug, Clone)]
pub struct ModernOptions {
    /// Consult `_minecraft._tcp` SRV records before dialing when the
    /// default port is used and the host is not an IP literal.
    pub enable_srv: bool,
    /// Deadline applied to the dial and re-armed for each packet phase.
    pub timeout: Duration,
    /// The protocol version advertised in the handshake; `-1` means "any".
    pub protocol_version: i32,
    /// Whether to run the ping/pong exchange and measure latency.
    pub ping: bool,
    /// Emit step-level log lines; does not alter protocol behavior.
    pub debug: bool,
}

impl Default for ModernOptions {
    fn default() -> Self {
        Self {
            enable_srv: true,
            timeout: DEFAULT_TIMEOUT,
            protocol_version: -1,
            ping: true,
            debug: false,
        }
    }
}

/// Options for [`crate::status::legacy`].
#[derive(Debug, Clone)]
pub struct LegacyOptions {
    pub enable_srv: bool,
    pub timeout: Duration,
    pub debug: bool,
}

impl Default for LegacyOptions {
    fn default() -> Self {
        Self {
            enable_srv: true,
            timeout: DEFAULT_TIMEOUT,
            debug: false,
        }
    }
}

/// Options for [`crate::status::bedrock`].
#[derive(Debug, Clone)]
pub struct BedrockOptions {
    /// Consult `_minecraft._udp` SRV records before dialing.
    pub enable_srv: bool,
    pub timeout: Duration,
    /// The client GUID written into the unconnected ping; a random value
    /// is chosen per call when zero.
    pub client_guid: i64,
    pub debug: bool,
}

impl Default for BedrockOptions {
    fn default() -> Self {
        Self {
            enable_srv: true,
            timeout: DEFAULT_TIMEOUT,
            client_guid: 0,
            debug: false,
        }
    }
}

/// Options for [`crate::query::basic`] and [`crate::query::full`].
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub enable_srv: bool,
    pub timeout: Duration,
    /// The session ID sent in the handshake, masked with `0x0F0F0F0F`; a
    /// random masked value is chosen per call when zero.
    pub session_id: i32,
    pub debug: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enable_srv: true,
            timeout: DEFAULT_TIMEOUT,
            session_id: 0,
            debug: false,
        }
    }
}

/// Options for [`crate::rcon::Client::dial`].
#[derive(Debug, Clone)]
pub struct RconOptions {
    pub enable_srv: bool,
    /// Deadline applied to the dial and to each login/command write.
    pub timeout: Duration,
    pub debug: bool,
}

impl Default for RconOptions {
    fn default() -> Self {
        Self {
            enable_srv: true,
            timeout: DEFAULT_TIMEOUT,
            debug: false,
        }
    }
}

/// Options for [`crate::vote::send_vote`].
#[derive(Debug, Clone)]
pub struct VoteOptions {
    /// The name of the service sending the vote.
    pub service_name: String,
    /// The Minecraft username the vote is for.
    pub username: String,
    /// The shared token required by Votifier 2 servers.
    pub token: String,
    /// The server RSA public key required by Votifier 1 servers, as the
    /// PEM body without the surrounding header lines.
    pub public_key: String,
    /// The player UUID, included in Votifier 2 payloads when non-empty.
    pub uuid: String,
    /// The voter IP address reported in Votifier 1 payloads; defaults to
    /// `127.0.0.1` when empty.
    pub ip_address: String,
    pub timestamp: SystemTime,
    pub timeout: Duration,
    pub debug: bool,
}

impl Default for VoteOptions {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            username: String::new(),
            token: String::new(),
            public_key: String::new(),
            uuid: String::new(),
            ip_address: String::new(),
            timestamp: SystemTime::now(),
            timeout: DEFAULT_TIMEOUT,
            debug: false,
        }
    }
}
