#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
//! `mcprobe` is a Rust crate that probes Minecraft game servers and returns
//! structured descriptions of their state. It speaks the four server-list
//! protocols (modern Java 1.7+, legacy Java, Bedrock/RakNet and the
//! GameSpy-derived UDP query), plus the two authenticated side channels
//! (RCON and Votifier v1/v2).
//!
//! Server-supplied rich text (MOTDs, version names, player names) is parsed
//! into a canonical decorated-segment tree with raw, clean and HTML
//! renderings — see the [`formatting`] module.
//!
//! Every probe takes a per-phase timeout through its options struct and is
//! an ordinary future: dropping it cancels the probe and closes the socket.
//!
//! ```no_run
//! # async {
//! use mcprobe::options::ModernOptions;
//!
//! let status = mcprobe::status::modern("mc.hypixel.net", 25565, ModernOptions::default()).await?;
//! println!("{} / {:?} players", status.motd.clean, status.players.online);
//! # Ok::<(), mcprobe::Error>(())
//! # };
//! ```

pub mod formatting;
pub mod options;
pub mod query;
pub mod rcon;
pub mod response;
pub mod status;
pub mod util;
pub mod vote;

mod proto;

pub use response::{
    BedrockStatus, LegacyPlayers, LegacyStatus, Mod, ModInfo, ModernStatus, Players, QueryBasic,
    QueryFull, SamplePlayer, SrvRecord, Version,
};

/// Errors that can occur while probing a server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("an I/O error occurred: {0}")]
    IoError(#[from] std::io::Error),
    #[error("a JSON error occurred: {0}")]
    JsonErr(#[from] serde_json::Error),
    #[error("an invalid address was provided")]
    InvalidAddress,
    #[error("DNS lookup for the host provided failed")]
    DnsLookupFailed,
    #[error("the operation did not complete before the deadline")]
    DeadlineExceeded,
    #[error("the connection was closed by the remote host")]
    Closed,
    #[error("VarInt is longer than the protocol allows")]
    VarIntTooBig,
    #[error("VarInt length was negative or too large")]
    InvalidVarInt(#[from] std::num::TryFromIntError),
    #[error("received unexpected packet type (expected={expected:#04x}, received={received:#04x})")]
    UnexpectedPacketType { expected: i32, received: i32 },
    #[error("session ID mismatch (expected={expected}, received={received})")]
    SessionIdMismatch { expected: i32, received: i32 },
    #[error("received unexpected ping payload")]
    UnexpectedPayload,
    #[error("not enough fields in server response (expected={expected}, received={received})")]
    InsufficientFields { expected: usize, received: usize },
    #[error("failed to parse a numeric field: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),
    #[error("input is neither a string nor a chat object")]
    UnsupportedInputShape,
    #[error("player ID is neither a UUID string nor a four-integer array")]
    InvalidPlayerId,
    #[error("invalid public key value")]
    InvalidPublicKey,
    #[error("not connected to the server")]
    NotConnected,
    #[error("already successfully logged in")]
    AlreadyLoggedIn,
    #[error("incorrect RCON password")]
    InvalidPassword,
    #[error("not authenticated with the server")]
    NotAuthenticated,
    #[error("received unexpected request ID (expected={expected}, received={received})")]
    UnexpectedRequestId { expected: i32, received: i32 },
    #[error("unknown Votifier version: {0}")]
    UnknownServerVersion(String),
    #[error("missing required option: {0}")]
    OptionMissing(&'static str),
    #[error("server returned an error: {0}")]
    ServerReportedError(String),
    #[error("received unexpected server response: {0}")]
    UnexpectedResponse(String),
}
